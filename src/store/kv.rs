//! fjall-backed storage pipeline: one embedded keyspace per shard.

use std::path::PathBuf;

use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use parking_lot::RwLock;
use tracing::warn;

use crate::error::FathomError;
use crate::models::{DocId, DocumentPayload, FieldData};
use crate::store::{varint, StoragePipeline};
use crate::Result;

/// Default shard count of the bundled pipeline
pub const DEFAULT_STORAGE_SHARDS: usize = 8;

const DOCUMENTS_PARTITION: &str = "documents";

struct ShardDb {
    keyspace: Keyspace,
    documents: PartitionHandle,
}

/// Persistent document store on fjall, laid out as one keyspace directory
/// `db.N` per shard under the storage folder.
pub struct KvPipeline {
    folder: PathBuf,
    shard_count: usize,
    shards: RwLock<Vec<Option<ShardDb>>>,
}

impl KvPipeline {
    /// `shard_count` of zero selects [`DEFAULT_STORAGE_SHARDS`]
    pub fn new(folder: impl Into<PathBuf>, shard_count: usize) -> Self {
        let shard_count = if shard_count == 0 {
            DEFAULT_STORAGE_SHARDS
        } else {
            shard_count
        };
        Self {
            folder: folder.into(),
            shard_count,
            shards: RwLock::new((0..shard_count).map(|_| None).collect()),
        }
    }

    fn shard_path(&self, shard: usize) -> PathBuf {
        self.folder.join(format!("db.{shard}"))
    }

    fn open_shard(&self, shard: usize) -> Result<ShardDb> {
        let path = self.shard_path(shard);
        let keyspace = Config::new(&path)
            .open()
            .map_err(|e| FathomError::Storage(format!("failed to open {}: {e}", path.display())))?;
        let documents = keyspace
            .open_partition(DOCUMENTS_PARTITION, PartitionCreateOptions::default())
            .map_err(|e| {
                FathomError::Storage(format!("failed to open documents partition: {e}"))
            })?;
        Ok(ShardDb {
            keyspace,
            documents,
        })
    }

    fn check_shard(&self, shard: usize) -> Result<()> {
        if shard >= self.shard_count {
            return Err(FathomError::Storage(format!(
                "shard {shard} out of range (have {})",
                self.shard_count
            )));
        }
        Ok(())
    }
}

impl<F: FieldData> StoragePipeline<F> for KvPipeline {
    fn init(&self) -> Result<()> {
        std::fs::create_dir_all(&self.folder)?;
        let mut shards = self.shards.write();
        for shard in 0..self.shard_count {
            shards[shard] = Some(self.open_shard(shard)?);
        }
        Ok(())
    }

    fn storage_shards(&self) -> usize {
        self.shard_count
    }

    fn conn(&self, shard: usize) -> Result<()> {
        self.check_shard(shard)?;
        let db = self.open_shard(shard)?;
        self.shards.write()[shard] = Some(db);
        Ok(())
    }

    fn close_shard(&self, shard: usize) -> Result<()> {
        self.check_shard(shard)?;
        if let Some(db) = self.shards.write()[shard].take() {
            db.keyspace
                .persist(PersistMode::SyncAll)
                .map_err(|e| FathomError::Storage(format!("failed to persist shard {shard}: {e}")))?;
        }
        Ok(())
    }

    fn recover(
        &self,
        shard: usize,
        sink: &mut dyn FnMut(DocId, DocumentPayload<F>),
    ) -> Result<()> {
        self.check_shard(shard)?;
        let shards = self.shards.read();
        let db = shards[shard]
            .as_ref()
            .ok_or_else(|| FathomError::Storage(format!("shard {shard} is not open")))?;

        for entry in db.documents.iter() {
            let (key, value) = match entry {
                Ok(pair) => pair,
                Err(err) => {
                    warn!(shard, %err, "skipping unreadable record");
                    continue;
                }
            };
            let Some((doc_id, _)) = varint::decode_u64(&key) else {
                warn!(shard, "skipping record with malformed key");
                continue;
            };
            match bincode::deserialize::<DocumentPayload<F>>(&value) {
                Ok(payload) => sink(doc_id, payload),
                Err(err) => {
                    warn!(shard, doc_id, %err, "skipping undecodable record");
                }
            }
        }
        Ok(())
    }

    fn set(&self, shard: usize, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_shard(shard)?;
        let shards = self.shards.read();
        let db = shards[shard]
            .as_ref()
            .ok_or_else(|| FathomError::Storage(format!("shard {shard} is not open")))?;
        db.documents
            .insert(key, value)
            .map_err(|e| FathomError::Storage(e.to_string()))
    }

    fn delete(&self, shard: usize, key: &[u8]) -> Result<()> {
        self.check_shard(shard)?;
        let shards = self.shards.read();
        let db = shards[shard]
            .as_ref()
            .ok_or_else(|| FathomError::Storage(format!("shard {shard} is not open")))?;
        db.documents
            .remove(key)
            .map_err(|e| FathomError::Storage(e.to_string()))
    }
}
