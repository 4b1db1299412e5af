//! Sharded persistence of computed analytics.
//!
//! The patient list can outgrow a single document, so it is split into
//! fixed-size shard documents. The replace sequence stands in for a
//! multi-document transaction the store does not offer:
//!
//! 1. delete every existing shard
//! 2. split the new list into chunks of `shard_size`
//! 3. write each chunk as `<namespace>/patients_NNNN`
//! 4. write `<namespace>/summary` last (KPIs, chart, bookkeeping; never patients)
//!
//! A reader racing a writer between steps 1 and 3 sees a short patient list,
//! but the summary is always entirely old or entirely new. The summary
//! carries a digest of the shard bodies, so such a read is reported as
//! inconsistent instead of passing silently. Overlapping writers can
//! interleave their shard deletes and writes; callers serialize refreshes.

mod reader;
mod writer;

pub use reader::*;
pub use writer::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::db::StoreError;
use crate::models::{KpiSnapshot, MonthlyBucket, PatientAggregate};

/// Patients per shard document.
pub const DEFAULT_SHARD_SIZE: usize = 400;

/// Most shards one snapshot may span. Shard IDs carry four digits.
pub const MAX_SHARDS: usize = 9_999;

/// Default document namespace.
pub const DEFAULT_NAMESPACE: &str = "analytics";

/// Cache errors.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed while {step}: {source}")]
    Persistence {
        step: String,
        #[source]
        source: StoreError,
    },

    #[error("Shard size must be positive")]
    InvalidShardSize,

    #[error("{count} shards exceed the limit of {limit}")]
    TooManyShards { count: usize, limit: usize },
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Document naming for one cache namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLayout {
    namespace: String,
}

impl CacheLayout {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// ID of the aggregate document.
    pub fn summary_id(&self) -> String {
        format!("{}/summary", self.namespace)
    }

    /// Common prefix of every shard ID.
    pub fn shard_prefix(&self) -> String {
        format!("{}/patients_", self.namespace)
    }

    /// Zero-padded shard ID, so lexical order is shard order for indexes
    /// below [`MAX_SHARDS`].
    pub fn shard_id(&self, index: usize) -> String {
        format!("{}{:04}", self.shard_prefix(), index)
    }
}

impl Default for CacheLayout {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

/// One slice of the patient list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientShard {
    /// Refresh pass that wrote the shard
    pub run_id: String,
    pub index: u32,
    pub patients: Vec<PatientAggregate>,
}

/// The aggregate document, written last. Never holds the patient list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryDocument {
    pub run_id: String,
    pub kpis: KpiSnapshot,
    pub monthly_buckets: Vec<MonthlyBucket>,
    pub last_updated: DateTime<Utc>,
    pub total_patients: u32,
    pub shard_count: u32,
    pub shard_size: u32,
    /// SHA-256 over the shard bodies in shard order
    pub patients_digest: String,
}

/// Digest of shard bodies, in order.
pub fn digest_shards<'a, I>(bodies: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut hasher = Sha256::new();
    for body in bodies {
        hasher.update(body.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}
