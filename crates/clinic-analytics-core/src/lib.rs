//! Clinic Analytics Core Library
//!
//! Reconstructs a patient directory and retention KPIs from practitioner
//! calendars. Nothing is entered by hand: a booking is a calendar event whose
//! title follows `N:<name>T:<phone>`.
//!
//! # Architecture
//!
//! ```text
//! Practitioner calendars (one source each, fetched concurrently)
//!                 │
//!           Title Parser ──(mismatch)──► warn + drop
//!                 │
//!          VisitRecord stream
//!                 │
//!   Phone Normalizer + Name Canonicalizer
//!                 │
//!   Identity Resolver ─► PatientAggregate + Status
//!                 │
//!        ┌────────┴────────┐
//!        ▼                 ▼
//!    KPI Engine     Chart Bucketizer
//!        └────────┬────────┘
//!                 ▼
//!   Cache Writer: shards (400 patients each), summary last
//!                 │
//!            Cache Reader ─► dashboard
//! ```
//!
//! # Modules
//!
//! - [`harvest`]: concurrent calendar fetch and title parsing
//! - [`resolver`]: title grammar, normalization and identity resolution
//! - [`analytics`]: status classification, KPIs and chart buckets
//! - [`cache`]: sharded snapshot persistence
//! - [`db`]: SQLite-backed document store
//! - [`config`]: runtime settings
//! - [`models`]: domain types

pub mod analytics;
pub mod cache;
pub mod config;
pub mod db;
pub mod harvest;
pub mod models;
pub mod resolver;

// Re-export commonly used types
pub use cache::{CacheReader, CacheReadout, CacheWriter, CachedAnalytics};
pub use config::{PractitionerConfig, Settings};
pub use db::{Database, DocumentStore};
pub use harvest::{harvest, HarvestOutcome, HarvestStats, SourceFailure};
pub use models::{
    AnalyticsSnapshot, KpiSnapshot, MonthlyBucket, PatientAggregate, PatientStatus, ResolvedPatient,
    VisitRecord,
};
pub use resolver::{IdentityResolver, Normalizer};

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use clinic_calendar::CalendarSource;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// =========================================================================
// Error Type
// =========================================================================

/// Errors raised while assembling the service. Operations themselves never fail.
#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    #[error("Store error: {0}")]
    Store(#[from] db::StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

// =========================================================================
// Operation Results
// =========================================================================

/// Result of a full recomputation. `error` is set when the numbers are partial.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AnalyticsReport {
    pub kpis: KpiSnapshot,
    pub patients: Vec<PatientAggregate>,
    pub monthly_buckets: Vec<MonthlyBucket>,
    pub error: Option<String>,
    pub failures: Vec<SourceFailure>,
    pub stats: HarvestStats,
}

impl AnalyticsReport {
    fn new(snapshot: AnalyticsSnapshot, outcome: HarvestOutcome, source_count: usize) -> Self {
        let error = describe_failures(&outcome.failures, source_count);
        Self {
            kpis: snapshot.kpis,
            patients: snapshot.patients,
            monthly_buckets: snapshot.monthly_buckets,
            error,
            failures: outcome.failures,
            stats: outcome.stats,
        }
    }

    /// The report as a cacheable snapshot.
    pub fn snapshot(&self) -> AnalyticsSnapshot {
        AnalyticsSnapshot {
            kpis: self.kpis.clone(),
            patients: self.patients.clone(),
            monthly_buckets: self.monthly_buckets.clone(),
        }
    }
}

fn describe_failures(failures: &[SourceFailure], source_count: usize) -> Option<String> {
    if failures.is_empty() {
        return None;
    }
    let names: Vec<&str> = failures.iter().map(|f| f.practitioner.as_str()).collect();
    Some(format!(
        "{} of {} calendar sources unavailable: {}",
        failures.len(),
        source_count,
        names.join(", ")
    ))
}

/// Result of a cache refresh. The computed analytics are returned even when
/// persisting them failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefreshOutcome {
    pub success: bool,
    pub message: String,
    pub patient_count: u32,
    pub shard_count: u32,
    pub analytics: AnalyticsReport,
}

// =========================================================================
// Main API Object
// =========================================================================

/// The analytics service: calendar sources in, cached snapshot out.
pub struct ClinicAnalytics {
    store: Arc<dyn DocumentStore>,
    sources: Vec<Arc<dyn CalendarSource>>,
    resolver: IdentityResolver,
    settings: Settings,
    zone: FixedOffset,
    /// Overlapping refreshes would interleave their shard writes
    refresh_lock: tokio::sync::Mutex<()>,
}

impl ClinicAnalytics {
    /// Create a service over an existing store and sources.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        sources: Vec<Arc<dyn CalendarSource>>,
        settings: Settings,
    ) -> AnalyticsResult<Self> {
        settings.validate()?;
        let zone = settings.zone()?;

        Ok(Self {
            store,
            sources,
            resolver: IdentityResolver::new(),
            settings,
            zone,
            refresh_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Open the configured database and build the configured sources.
    pub fn from_settings(settings: Settings) -> AnalyticsResult<Self> {
        let db = Database::open(&settings.database_path)?
            .with_max_document_bytes(settings.max_document_bytes);
        let sources = settings.build_sources()?;
        Self::new(Arc::new(db), sources, settings)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Current instant in the clinic's calendar zone.
    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.zone)
    }

    /// Harvest every source and recompute everything as of `now`.
    pub async fn compute_analytics(&self, now: DateTime<FixedOffset>) -> AnalyticsReport {
        let now = now.with_timezone(&self.zone);
        let window = self.settings.harvest_window(now);

        let outcome = harvest(&self.sources, window, now, self.settings.fetch_timeout()).await;
        let resolved = self.resolver.resolve(&outcome.records, now);
        let snapshot = analytics::analyze(&resolved, now);

        info!(
            records = outcome.records.len(),
            patients = snapshot.patients.len(),
            active = snapshot.kpis.total_active_patients,
            "Analytics computed"
        );

        AnalyticsReport::new(snapshot, outcome, self.sources.len())
    }

    /// Recompute and persist. Refreshes are serialized.
    pub async fn refresh_cache(&self, now: DateTime<FixedOffset>) -> RefreshOutcome {
        let _guard = self.refresh_lock.lock().await;

        let analytics = self.compute_analytics(now).await;
        let snapshot = analytics.snapshot();
        let store = Arc::clone(&self.store);
        let shard_size = self.settings.shard_size;
        let written_at = now.with_timezone(&Utc);

        let write = tokio::task::spawn_blocking(move || {
            CacheWriter::new(store.as_ref())
                .with_shard_size(shard_size)
                .write(&snapshot, written_at)
        })
        .await;

        match write {
            Ok(Ok(summary)) => {
                let mut message = format!(
                    "Cached {} patients in {} shards",
                    summary.patient_count, summary.shard_count
                );
                if let Some(error) = &analytics.error {
                    message = format!("{} ({})", message, error);
                }
                RefreshOutcome {
                    success: true,
                    message,
                    patient_count: summary.patient_count,
                    shard_count: summary.shard_count,
                    analytics,
                }
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Analytics cache write failed");
                Self::failed_refresh(format!("Cache write failed: {}", e), analytics)
            }
            Err(e) => {
                warn!(error = %e, "Analytics cache write task failed");
                Self::failed_refresh(format!("Cache write task failed: {}", e), analytics)
            }
        }
    }

    fn failed_refresh(message: String, analytics: AnalyticsReport) -> RefreshOutcome {
        RefreshOutcome {
            success: false,
            message,
            patient_count: analytics.patients.len() as u32,
            shard_count: 0,
            analytics,
        }
    }

    /// Read the last cached snapshot. Store failures read as never computed.
    pub fn read_cache(&self) -> CacheReadout {
        CacheReader::new(self.store.as_ref()).readout()
    }
}
