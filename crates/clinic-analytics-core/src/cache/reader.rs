//! Cache reader: summary first, then shards in name order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{digest_shards, CacheLayout, CacheResult, PatientShard, SummaryDocument};
use crate::db::DocumentStore;
use crate::models::{AnalyticsSnapshot, KpiSnapshot};

/// A snapshot reconstructed from the cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedAnalytics {
    pub snapshot: AnalyticsSnapshot,
    pub last_updated: DateTime<Utc>,
    pub run_id: String,
    /// False when the shards read do not match the summary (a writer was mid-replace)
    pub consistent: bool,
}

/// What `read_cache` reports to the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CacheReadout {
    Cached(CachedAnalytics),
    /// Nothing computed yet, or the store could not be read
    NeverComputed {
        kpis: KpiSnapshot,
        reason: Option<String>,
    },
}

impl CacheReadout {
    pub fn never_computed(reason: Option<String>) -> Self {
        CacheReadout::NeverComputed {
            kpis: KpiSnapshot::empty(),
            reason,
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, CacheReadout::Cached(_))
    }

    /// KPIs to render, all-zero when never computed.
    pub fn kpis(&self) -> &KpiSnapshot {
        match self {
            CacheReadout::Cached(cached) => &cached.snapshot.kpis,
            CacheReadout::NeverComputed { kpis, .. } => kpis,
        }
    }
}

/// Reconstructs the cached snapshot from its documents.
pub struct CacheReader<'a> {
    store: &'a dyn DocumentStore,
    layout: CacheLayout,
}

impl<'a> CacheReader<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self {
            store,
            layout: CacheLayout::default(),
        }
    }

    pub fn with_layout(mut self, layout: CacheLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Load the summary and every shard. `None` when no summary exists.
    pub fn read(&self) -> CacheResult<Option<CachedAnalytics>> {
        let Some(body) = self.store.get_document(&self.layout.summary_id())? else {
            return Ok(None);
        };
        let summary: SummaryDocument = serde_json::from_str(&body)?;

        let ids = self.store.list_document_ids(&self.layout.shard_prefix())?;
        let mut bodies = Vec::with_capacity(ids.len());
        let mut patients = Vec::with_capacity(summary.total_patients as usize);
        for id in &ids {
            // A shard deleted between listing and reading is skipped; the digest catches it
            let Some(body) = self.store.get_document(id)? else {
                continue;
            };
            let shard: PatientShard = serde_json::from_str(&body)?;
            patients.extend(shard.patients);
            bodies.push(body);
        }

        let digest = digest_shards(bodies.iter().map(String::as_str));
        let consistent = digest == summary.patients_digest
            && bodies.len() as u32 == summary.shard_count
            && patients.len() as u32 == summary.total_patients;
        if !consistent {
            warn!(
                run_id = %summary.run_id,
                expected_patients = summary.total_patients,
                read_patients = patients.len(),
                expected_shards = summary.shard_count,
                read_shards = bodies.len(),
                "Patient shards do not match the summary; a refresh may be in progress"
            );
        }

        Ok(Some(CachedAnalytics {
            snapshot: AnalyticsSnapshot {
                kpis: summary.kpis,
                patients,
                monthly_buckets: summary.monthly_buckets,
            },
            last_updated: summary.last_updated,
            run_id: summary.run_id,
            consistent,
        }))
    }

    /// Read, degrading every failure to a never-computed readout.
    pub fn readout(&self) -> CacheReadout {
        match self.read() {
            Ok(Some(cached)) => CacheReadout::Cached(cached),
            Ok(None) => CacheReadout::never_computed(None),
            Err(e) => {
                warn!(error = %e, "Analytics cache unreadable");
                CacheReadout::never_computed(Some(e.to_string()))
            }
        }
    }
}
