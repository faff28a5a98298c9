//! Optimal token-position assignment for proximity scoring.
//!
//! Given each query token's occurrence positions inside one document,
//! pick one position per token minimizing the summed adjacent gap
//!
//! ```text
//! sum over i of | x[i+1] - x[i] - len(token[i]) |
//! ```
//!
//! so in-order, adjacent occurrences cost 0. Solved with a layer-by-layer
//! DP over the position arrays. The transition from layer i to layer i+1
//! only considers the two positions bracketing the current one (the
//! nearest position below and its successor); the optimum never needs a
//! farther jump because any such assignment is dominated by one through
//! a bracketing position.

/// Minimum proximity cost and the chosen byte position for each token.
///
/// `layers[i]` holds the ascending byte offsets of token `i` in the
/// document and `token_bytes[i]` its byte length. Returns `None` when
/// there are no tokens or any token has no occurrences.
pub fn optimal_token_spans(
    layers: &[&[usize]],
    token_bytes: &[usize],
) -> Option<(i32, Vec<usize>)> {
    let n = layers.len();
    if n == 0 || layers.iter().any(|layer| layer.is_empty()) {
        return None;
    }

    // path[i][j] = index in layer i-1 from which layer i's position j was
    // best reached; path[0] is unused
    let mut path: Vec<Vec<usize>> = layers.iter().map(|layer| vec![0; layer.len()]).collect();

    let mut cur: Vec<Option<i64>> = vec![Some(0); layers[0].len()];
    for i in 1..n {
        let prev_locs = layers[i - 1];
        let next_locs = layers[i];
        let mut next: Vec<Option<i64>> = vec![None; next_locs.len()];

        let mut k = 0usize;
        for (j, &loc) in prev_locs.iter().enumerate() {
            let Some(cost) = cur[j] else { continue };
            while k + 1 < next_locs.len() && next_locs[k + 1] < loc {
                k += 1;
            }
            for to in [k, k + 1] {
                if to >= next_locs.len() {
                    continue;
                }
                let gap = next_locs[to] as i64 - loc as i64 - token_bytes[i - 1] as i64;
                let value = cost + gap.abs();
                if next[to].map_or(true, |best| value < best) {
                    next[to] = Some(value);
                    path[i][to] = j;
                }
            }
        }
        cur = next;
    }

    let mut best: Option<i64> = None;
    let mut cursor = 0usize;
    for (j, value) in cur.iter().enumerate() {
        if let Some(value) = *value {
            if best.map_or(true, |b| value < b) {
                best = Some(value);
                cursor = j;
            }
        }
    }
    let best = best?;

    let mut spans = vec![0usize; n];
    for i in (0..n).rev() {
        if i != n - 1 {
            cursor = path[i + 1][cursor];
        }
        spans[i] = layers[i][cursor];
    }
    Some((best as i32, spans))
}
