//! Cache round-trip integration tests.

use chrono::{Duration, TimeZone, Utc};
use clinic_analytics_core::cache::{CacheReader, CacheWriter, DEFAULT_SHARD_SIZE};
use clinic_analytics_core::db::{Database, DocumentStore};
use clinic_analytics_core::models::{AnalyticsSnapshot, KpiSnapshot, PatientAggregate, PatientStatus};

fn synthetic_patients(count: usize) -> Vec<PatientAggregate> {
    let base = Utc.with_ymd_and_hms(2023, 1, 1, 15, 0, 0).unwrap();

    (0..count)
        .map(|i| {
            let first = base + Duration::hours(i as i64);
            PatientAggregate {
                canonical_key: format!("paciente {:05}|+54911{:08}", i, i),
                display_name: format!("Paciente {:05}", i),
                primary_phone: format!("+54911{:08}", i),
                total_past_visits: (i % 7) as u32 + 1,
                total_future_visits: (i % 2) as u32,
                first_visit_timestamp: first,
                last_visit_timestamp: Some(first + Duration::days(30)),
                next_future_visit_timestamp: None,
                status: if i % 3 == 0 {
                    PatientStatus::Frecuente
                } else {
                    PatientStatus::Activo
                },
                practitioners: vec!["Dra. López".to_string()],
            }
        })
        .collect()
}

fn snapshot(count: usize) -> AnalyticsSnapshot {
    AnalyticsSnapshot {
        kpis: KpiSnapshot {
            total_active_patients: count as u32,
            visit_frequency_per_year: 4.0,
            ..KpiSnapshot::empty()
        },
        patients: synthetic_patients(count),
        monthly_buckets: vec![],
    }
}

#[test]
fn test_thousand_patients_round_trip_in_three_shards() {
    let db = Database::open_in_memory().unwrap();
    let original = snapshot(1000);
    let now = Utc.with_ymd_and_hms(2024, 6, 15, 15, 0, 0).unwrap();

    let written = CacheWriter::new(&db).write(&original, now).unwrap();
    assert_eq!(DEFAULT_SHARD_SIZE, 400);
    assert_eq!(written.patient_count, 1000);
    assert_eq!(written.shard_count, 3);

    let shard_ids = db.list_document_ids("analytics/patients_").unwrap();
    assert_eq!(
        shard_ids,
        vec![
            "analytics/patients_0000",
            "analytics/patients_0001",
            "analytics/patients_0002",
        ]
    );

    let cached = CacheReader::new(&db).read().unwrap().unwrap();
    assert!(cached.consistent);
    assert_eq!(cached.run_id, written.run_id);
    assert_eq!(cached.last_updated, now);
    assert_eq!(cached.snapshot.patients.len(), 1000);

    for (read, expected) in cached.snapshot.patients.iter().zip(&original.patients) {
        assert_eq!(read.canonical_key, expected.canonical_key);
        assert_eq!(read.display_name, expected.display_name);
        assert_eq!(read.total_past_visits, expected.total_past_visits);
    }
    assert_eq!(cached.snapshot, original);
}

#[test]
fn test_shrinking_list_leaves_no_stale_shards() {
    let db = Database::open_in_memory().unwrap();

    CacheWriter::new(&db).write(&snapshot(1000), Utc::now()).unwrap();
    CacheWriter::new(&db).write(&snapshot(10), Utc::now()).unwrap();

    assert_eq!(db.list_document_ids("analytics/patients_").unwrap().len(), 1);
    let cached = CacheReader::new(&db).read().unwrap().unwrap();
    assert_eq!(cached.snapshot.patients.len(), 10);
    assert!(cached.consistent);
}

#[test]
fn test_summary_never_holds_patients() {
    let db = Database::open_in_memory().unwrap();
    CacheWriter::new(&db).write(&snapshot(50), Utc::now()).unwrap();

    let summary = db.get_document("analytics/summary").unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_str(&summary).unwrap();

    assert!(value.get("patients").is_none());
    assert_eq!(value["total_patients"], 50);
    assert_eq!(value["shard_count"], 1);
}

#[test]
fn test_file_backed_cache_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("analytics.db");

    {
        let db = Database::open(&path).unwrap();
        CacheWriter::new(&db).write(&snapshot(450), Utc::now()).unwrap();
    }

    let db = Database::open(&path).unwrap();
    let cached = CacheReader::new(&db).read().unwrap().unwrap();
    assert_eq!(cached.snapshot.patients.len(), 450);
    assert!(cached.consistent);
}
