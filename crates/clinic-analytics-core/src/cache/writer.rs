//! Cache writer: the ordered shard-then-summary replace sequence.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::{
    digest_shards, CacheError, CacheLayout, CacheResult, PatientShard, SummaryDocument,
    DEFAULT_SHARD_SIZE, MAX_SHARDS,
};
use crate::db::DocumentStore;
use crate::models::AnalyticsSnapshot;

/// Outcome of a completed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    pub run_id: String,
    pub patient_count: u32,
    pub shard_count: u32,
    /// Stale shards removed in step 1
    pub shards_deleted: u32,
}

/// Persists a snapshot as shard documents plus one summary document.
pub struct CacheWriter<'a> {
    store: &'a dyn DocumentStore,
    layout: CacheLayout,
    shard_size: usize,
}

impl<'a> CacheWriter<'a> {
    /// Create a writer with the default layout and shard size.
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self {
            store,
            layout: CacheLayout::default(),
            shard_size: DEFAULT_SHARD_SIZE,
        }
    }

    pub fn with_layout(mut self, layout: CacheLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_shard_size(mut self, shard_size: usize) -> Self {
        self.shard_size = shard_size;
        self
    }

    /// Replace the cached snapshot. Each step is idempotent; rerunning after a
    /// failure converges on the same documents.
    pub fn write(&self, snapshot: &AnalyticsSnapshot, now: DateTime<Utc>) -> CacheResult<WriteSummary> {
        if self.shard_size == 0 {
            return Err(CacheError::InvalidShardSize);
        }
        let shard_count = snapshot.patients.len().div_ceil(self.shard_size);
        if shard_count > MAX_SHARDS {
            return Err(CacheError::TooManyShards {
                count: shard_count,
                limit: MAX_SHARDS,
            });
        }

        let run_id = uuid::Uuid::new_v4().to_string();

        // 1. Delete old shards
        let shards_deleted = self.delete_shards()?;

        // 2 + 3. Chunk and write shards
        let mut bodies = Vec::with_capacity(shard_count);
        for (index, chunk) in snapshot.patients.chunks(self.shard_size).enumerate() {
            let shard = PatientShard {
                run_id: run_id.clone(),
                index: index as u32,
                patients: chunk.to_vec(),
            };
            let id = self.layout.shard_id(index);
            let body = serde_json::to_string(&shard)?;

            self.store
                .put_document(&id, &body)
                .map_err(|source| CacheError::Persistence {
                    step: format!("writing shard {}", id),
                    source,
                })?;
            debug!(shard = %id, patients = chunk.len(), bytes = body.len(), "Wrote patient shard");
            bodies.push(body);
        }

        // 4. Summary last
        let summary = SummaryDocument {
            run_id: run_id.clone(),
            kpis: snapshot.kpis.clone(),
            monthly_buckets: snapshot.monthly_buckets.clone(),
            last_updated: now,
            total_patients: snapshot.patients.len() as u32,
            shard_count: bodies.len() as u32,
            shard_size: self.shard_size as u32,
            patients_digest: digest_shards(bodies.iter().map(String::as_str)),
        };
        let summary_id = self.layout.summary_id();
        let body = serde_json::to_string(&summary)?;
        self.store
            .put_document(&summary_id, &body)
            .map_err(|source| CacheError::Persistence {
                step: format!("writing summary {}", summary_id),
                source,
            })?;

        info!(
            run_id = %run_id,
            patients = summary.total_patients,
            shards = summary.shard_count,
            deleted = shards_deleted,
            "Analytics cache replaced"
        );

        Ok(WriteSummary {
            run_id,
            patient_count: summary.total_patients,
            shard_count: summary.shard_count,
            shards_deleted,
        })
    }

    fn delete_shards(&self) -> CacheResult<u32> {
        let prefix = self.layout.shard_prefix();
        let ids = self
            .store
            .list_document_ids(&prefix)
            .map_err(|source| CacheError::Persistence {
                step: "listing old shards".into(),
                source,
            })?;

        let mut deleted = 0;
        for id in ids {
            if self
                .store
                .delete_document(&id)
                .map_err(|source| CacheError::Persistence {
                    step: format!("deleting shard {}", id),
                    source,
                })?
            {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}
