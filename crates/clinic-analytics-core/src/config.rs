//! Runtime configuration.
//!
//! Resolved once at startup from an optional JSON file, then overridden by
//! `CLINIC_*` environment variables, then validated. Services receive the
//! resolved [`Settings`] and never read the environment themselves.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use clinic_calendar::{CalendarSource, JsonExportSource, TimeWindow};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analytics::months_before;
use crate::cache::DEFAULT_SHARD_SIZE;
use crate::db::DEFAULT_MAX_DOCUMENT_BYTES;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "CLINIC_";

const MAX_OFFSET_MINUTES: i32 = 14 * 60;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.into(),
    }
}

/// Where one practitioner's calendar is read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PractitionerConfig {
    pub name: String,
    /// Exported events JSON file; takes precedence over `calendar_id`
    #[serde(default)]
    pub export_path: Option<PathBuf>,
    /// Remote calendar ID (requires the `http` feature)
    #[serde(default)]
    pub calendar_id: Option<String>,
}

/// Resolved runtime settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database_path: PathBuf,
    pub shard_size: usize,
    pub max_document_bytes: usize,
    pub fetch_timeout_secs: u64,
    /// Harvest window reaches this many calendar months into the past
    pub lookback_months: u32,
    /// Harvest window reaches this many days into the future
    pub lookahead_days: u32,
    /// Clinic calendar zone, minutes east of UTC
    pub utc_offset_minutes: i32,
    /// Bearer token for remote calendars
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    pub practitioners: Vec<PractitionerConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("clinic-analytics.db"),
            shard_size: DEFAULT_SHARD_SIZE,
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            fetch_timeout_secs: 30,
            lookback_months: 12,
            lookahead_days: 90,
            utc_offset_minutes: -180,
            access_token: None,
            practitioners: Vec::new(),
        }
    }
}

impl Settings {
    /// Parse settings from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read settings from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Load from an optional file, apply process environment overrides, validate.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_overrides(std::env::vars())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Apply `CLINIC_*` overrides from `(key, value)` pairs. Unknown keys are ignored.
    pub fn apply_overrides<I>(&mut self, vars: I) -> ConfigResult<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match name {
                "DATABASE_PATH" => self.database_path = PathBuf::from(value),
                "SHARD_SIZE" => self.shard_size = parse_var(&key, &value)?,
                "MAX_DOCUMENT_BYTES" => self.max_document_bytes = parse_var(&key, &value)?,
                "FETCH_TIMEOUT_SECS" => self.fetch_timeout_secs = parse_var(&key, &value)?,
                "LOOKBACK_MONTHS" => self.lookback_months = parse_var(&key, &value)?,
                "LOOKAHEAD_DAYS" => self.lookahead_days = parse_var(&key, &value)?,
                "UTC_OFFSET_MINUTES" => self.utc_offset_minutes = parse_var(&key, &value)?,
                "ACCESS_TOKEN" => self.access_token = Some(value),
                _ => {}
            }
        }
        Ok(())
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.shard_size == 0 {
            return Err(invalid("shard_size", "must be positive"));
        }
        if self.max_document_bytes == 0 {
            return Err(invalid("max_document_bytes", "must be positive"));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(invalid("fetch_timeout_secs", "must be positive"));
        }
        if self.lookback_months == 0 {
            return Err(invalid("lookback_months", "must be positive"));
        }
        if self.utc_offset_minutes.abs() > MAX_OFFSET_MINUTES {
            return Err(invalid(
                "utc_offset_minutes",
                format!("{} is outside ±{}", self.utc_offset_minutes, MAX_OFFSET_MINUTES),
            ));
        }
        for practitioner in &self.practitioners {
            if practitioner.name.trim().is_empty() {
                return Err(invalid("practitioners.name", "cannot be empty"));
            }
            if practitioner.export_path.is_none() && practitioner.calendar_id.is_none() {
                return Err(invalid(
                    "practitioners",
                    format!("{} has neither export_path nor calendar_id", practitioner.name),
                ));
            }
        }
        Ok(())
    }

    /// The clinic's calendar zone.
    pub fn zone(&self) -> ConfigResult<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .ok_or_else(|| invalid("utc_offset_minutes", "not a valid offset"))
    }

    pub fn fetch_timeout(&self) -> StdDuration {
        StdDuration::from_secs(self.fetch_timeout_secs)
    }

    /// Harvest window around `now`, in the clinic zone carried by `now`.
    pub fn harvest_window(&self, now: DateTime<FixedOffset>) -> TimeWindow {
        let end = now + Duration::days(i64::from(self.lookahead_days));
        TimeWindow::new(months_before(now, self.lookback_months), end.with_timezone(&Utc))
            .with_zone(*now.offset())
    }

    /// Build one calendar source per configured practitioner.
    pub fn build_sources(&self) -> ConfigResult<Vec<Arc<dyn CalendarSource>>> {
        self.practitioners
            .iter()
            .map(|p| self.build_source(p))
            .collect()
    }

    fn build_source(&self, practitioner: &PractitionerConfig) -> ConfigResult<Arc<dyn CalendarSource>> {
        if let Some(path) = &practitioner.export_path {
            return Ok(Arc::new(JsonExportSource::new(&practitioner.name, path)));
        }

        match &practitioner.calendar_id {
            Some(calendar_id) => self.remote_source(&practitioner.name, calendar_id),
            None => Err(invalid(
                "practitioners",
                format!("{} has neither export_path nor calendar_id", practitioner.name),
            )),
        }
    }

    #[cfg(feature = "http")]
    fn remote_source(&self, name: &str, calendar_id: &str) -> ConfigResult<Arc<dyn CalendarSource>> {
        let token = self
            .access_token
            .as_deref()
            .ok_or_else(|| invalid("access_token", "required for remote calendars"))?;
        let source = clinic_calendar::GoogleCalendarSource::new(name, calendar_id, token, self.fetch_timeout())
            .map_err(|e| invalid("practitioners", e.to_string()))?;
        Ok(Arc::new(source))
    }

    #[cfg(not(feature = "http"))]
    fn remote_source(&self, name: &str, _calendar_id: &str) -> ConfigResult<Arc<dyn CalendarSource>> {
        Err(invalid(
            "practitioners",
            format!("{} uses a remote calendar; rebuild with the http feature", name),
        ))
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| invalid(key, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();

        assert_eq!(settings.shard_size, 400);
        assert_eq!(settings.max_document_bytes, 1_048_576);
        assert_eq!(settings.utc_offset_minutes, -180);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings = Settings::from_json(
            r#"{
                "shard_size": 250,
                "practitioners": [{"name": "Dra. López", "export_path": "lopez.json"}]
            }"#,
        )
        .unwrap();

        assert_eq!(settings.shard_size, 250);
        assert_eq!(settings.lookback_months, 12);
        assert_eq!(settings.practitioners[0].calendar_id, None);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = Settings::default();
        settings
            .apply_overrides(vars(&[
                ("CLINIC_SHARD_SIZE", "100"),
                ("CLINIC_UTC_OFFSET_MINUTES", "60"),
                ("CLINIC_DATABASE_PATH", "/tmp/a.db"),
                ("PATH", "/usr/bin"),
            ]))
            .unwrap();

        assert_eq!(settings.shard_size, 100);
        assert_eq!(settings.utc_offset_minutes, 60);
        assert_eq!(settings.database_path, PathBuf::from("/tmp/a.db"));
    }

    #[test]
    fn test_bad_env_value() {
        let mut settings = Settings::default();
        let result = settings.apply_overrides(vars(&[("CLINIC_SHARD_SIZE", "many")]));

        assert!(matches!(result, Err(ConfigError::InvalidValue { field, .. }) if field == "CLINIC_SHARD_SIZE"));
    }

    #[test]
    fn test_validate_rejects_zero_and_far_offsets() {
        let zero_shards = Settings {
            shard_size: 0,
            ..Settings::default()
        };
        assert!(zero_shards.validate().is_err());

        let far_offset = Settings {
            utc_offset_minutes: 15 * 60,
            ..Settings::default()
        };
        assert!(far_offset.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_sourceless_practitioner() {
        let settings = Settings {
            practitioners: vec![PractitionerConfig {
                name: "Dr. Ruiz".into(),
                export_path: None,
                calendar_id: None,
            }],
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_harvest_window() {
        let settings = Settings::default();
        let zone = settings.zone().unwrap();
        let now = zone.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();

        let window = settings.harvest_window(now);

        assert_eq!(window.start, Utc.with_ymd_and_hms(2023, 6, 15, 15, 0, 0).unwrap());
        assert_eq!(window.end, Utc.with_ymd_and_hms(2024, 9, 13, 15, 0, 0).unwrap());
        assert_eq!(window.zone, zone);
    }

    #[test]
    fn test_build_export_sources() {
        let settings = Settings {
            practitioners: vec![PractitionerConfig {
                name: "Dra. López".into(),
                export_path: Some(PathBuf::from("lopez.json")),
                calendar_id: Some("ignored".into()),
            }],
            ..Settings::default()
        };

        let sources = settings.build_sources().unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].practitioner(), "Dra. López");
    }

    #[test]
    fn test_from_file_missing() {
        let result = Settings::from_file("/nonexistent/clinic.json");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
