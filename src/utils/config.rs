use crate::core::{
    ACCURACY_REJECT_THRESHOLD_M, COARSE_DISTANCE_FILTER_M, CYCLE_PERIOD, MAX_FIX_AGE, WINDOW_DURATION,
};
use crate::validation::FixValidator;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Tunables for the sampling duty cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Delay from the first delivery of a cycle to the next acquisition window (milliseconds)
    pub cycle_period_ms: u64,
    /// How long sampling stays on once a cycle is armed (milliseconds)
    pub window_duration_ms: u64,
    /// Fixes at or above this accuracy radius are rejected (meters)
    pub accuracy_reject_threshold_m: f64,
    /// Fixes at or above this age are rejected (milliseconds)
    pub max_fix_age_ms: u64,
    /// Distance filter used while acquiring in coarse mode (meters)
    pub coarse_distance_filter_m: f64,
    /// Run an upload cycle on this period; `None` leaves uploads to the caller
    pub upload_interval_ms: Option<u64>,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid {parameter} = {value}: {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            cycle_period_ms: CYCLE_PERIOD.as_millis() as u64,
            window_duration_ms: WINDOW_DURATION.as_millis() as u64,
            accuracy_reject_threshold_m: ACCURACY_REJECT_THRESHOLD_M,
            max_fix_age_ms: MAX_FIX_AGE.as_millis() as u64,
            coarse_distance_filter_m: COARSE_DISTANCE_FILTER_M,
            upload_interval_ms: None,
        }
    }
}

/// Whole milliseconds, rounding any fractional part up
fn ceil_millis(duration: Duration) -> u64 {
    let millis = duration.as_millis() + u128::from(duration.subsec_nanos() % 1_000_000 != 0);
    u64::try_from(millis).unwrap_or(u64::MAX)
}

fn invalid(parameter: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidParameter {
        parameter: parameter.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

impl TrackerConfig {
    /// Load and validate a JSON config file. Missing fields take their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: TrackerConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config as pretty-printed JSON
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&path, content).map_err(|source| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cycle_period_ms == 0 {
            return Err(invalid("cycle_period_ms", self.cycle_period_ms, "must be positive"));
        }
        if self.window_duration_ms == 0 {
            return Err(invalid("window_duration_ms", self.window_duration_ms, "must be positive"));
        }
        if self.window_duration_ms >= self.cycle_period_ms {
            return Err(invalid(
                "window_duration_ms",
                self.window_duration_ms,
                "must be shorter than cycle_period_ms",
            ));
        }
        if !(self.accuracy_reject_threshold_m > 0.0) {
            return Err(invalid(
                "accuracy_reject_threshold_m",
                self.accuracy_reject_threshold_m,
                "must be positive",
            ));
        }
        if self.max_fix_age_ms == 0 {
            return Err(invalid("max_fix_age_ms", self.max_fix_age_ms, "must be positive"));
        }
        if !(self.coarse_distance_filter_m >= 0.0) {
            return Err(invalid(
                "coarse_distance_filter_m",
                self.coarse_distance_filter_m,
                "must not be negative",
            ));
        }
        if self.upload_interval_ms == Some(0) {
            return Err(invalid("upload_interval_ms", 0, "must be positive when set"));
        }
        Ok(())
    }

    pub fn cycle_period(&self) -> Duration {
        Duration::from_millis(self.cycle_period_ms)
    }

    pub fn window_duration(&self) -> Duration {
        Duration::from_millis(self.window_duration_ms)
    }

    pub fn max_fix_age(&self) -> Duration {
        Duration::from_millis(self.max_fix_age_ms)
    }

    pub fn upload_interval(&self) -> Option<Duration> {
        self.upload_interval_ms.map(Duration::from_millis)
    }

    pub fn validator(&self) -> FixValidator {
        FixValidator::new(self.accuracy_reject_threshold_m, self.max_fix_age())
    }

    /// Sub-millisecond remainders round up, so only a zero duration
    /// produces a zero (invalid) period
    pub fn with_cycle_period(mut self, period: Duration) -> Self {
        self.cycle_period_ms = ceil_millis(period);
        self
    }

    pub fn with_window_duration(mut self, window: Duration) -> Self {
        self.window_duration_ms = ceil_millis(window);
        self
    }

    pub fn with_upload_interval(mut self, interval: Duration) -> Self {
        self.upload_interval_ms = Some(ceil_millis(interval));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TrackerConfig::default();
        assert_eq!(config.cycle_period(), Duration::from_secs(60));
        assert_eq!(config.window_duration(), Duration::from_secs(7));
        assert_eq!(config.accuracy_reject_threshold_m, 2000.0);
        assert_eq!(config.max_fix_age(), Duration::from_secs(30));
        assert!(config.upload_interval().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_window_must_fit_in_cycle() {
        let config = TrackerConfig::default()
            .with_cycle_period(Duration::from_secs(5))
            .with_window_duration(Duration::from_secs(5));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidParameter { ref parameter, .. }) if parameter == "window_duration_ms"
        ));
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = TrackerConfig::default();
        config.accuracy_reject_threshold_m = 0.0;
        assert!(config.validate().is_err());

        let mut config = TrackerConfig::default();
        config.max_fix_age_ms = 0;
        assert!(config.validate().is_err());

        let mut config = TrackerConfig::default();
        config.upload_interval_ms = Some(0);
        assert!(config.validate().is_err());

        let mut config = TrackerConfig::default();
        config.coarse_distance_filter_m = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = TrackerConfig::from_json(r#"{ "cycle_period_ms": 20000, "upload_interval_ms": 60000 }"#).unwrap();
        assert_eq!(config.cycle_period(), Duration::from_secs(20));
        assert_eq!(config.window_duration(), Duration::from_secs(7));
        assert_eq!(config.upload_interval(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(TrackerConfig::from_json("{ not json"), Err(ConfigError::Parse(_))));
        assert!(matches!(
            TrackerConfig::from_json(r#"{ "window_duration_ms": 0 }"#),
            Err(ConfigError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.json");

        let config = TrackerConfig::default()
            .with_cycle_period(Duration::from_secs(30))
            .with_upload_interval(Duration::from_secs(90));
        config.save_to_file(&path).unwrap();

        let loaded = TrackerConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_builders_round_sub_millisecond_up() {
        let config = TrackerConfig::default()
            .with_upload_interval(Duration::from_micros(500))
            .with_window_duration(Duration::from_micros(6_999_001));
        assert_eq!(config.upload_interval_ms, Some(1));
        assert_eq!(config.window_duration_ms, 7_000);
        assert!(config.validate().is_ok());

        let config = TrackerConfig::default().with_upload_interval(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = TrackerConfig::from_file(dir.path().join("absent.json"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_validator_from_config() {
        let mut config = TrackerConfig::default();
        config.accuracy_reject_threshold_m = 100.0;
        config.max_fix_age_ms = 5_000;
        let validator = config.validator();
        assert_eq!(validator.accuracy_threshold_m(), 100.0);
        assert_eq!(validator.max_age(), Duration::from_secs(5));
    }
}
