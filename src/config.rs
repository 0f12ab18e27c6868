//! Runtime configuration.
//!
//! Settings come from `SENTRY_*` environment variables, optionally seeded from
//! a `.env` file in the working directory.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::retention::RetentionPolicy;
use crate::sensor::PinNumbering;
use crate::sentry::LoopTiming;

/// Default local directory for captured photos.
const DEFAULT_SAVE_DIR: &str = "photos";

/// Default sensor pin (physical header position).
const DEFAULT_SENSOR_PIN: u8 = 29;

/// Default still-capture program.
const DEFAULT_CAMERA_COMMAND: &str = "rpicam-still";

/// Everything the sentry needs to start.
#[derive(Debug, Clone)]
pub struct SentryConfig {
    /// URL of the boolean arm flag.
    pub state_url: String,

    /// Service-account key used for storage and messaging.
    pub credentials_path: PathBuf,

    pub save_dir: PathBuf,
    pub bucket: String,
    pub topic: String,

    pub sensor_pin: u8,
    pub pin_numbering: PinNumbering,

    /// Offset of the GPIO chip in the sysfs numbering.
    pub gpio_base: u32,

    pub tick_interval: Duration,
    pub cooldown: Duration,
    pub settle_delay: Duration,
    pub probe_timeout: Duration,

    /// Bound on each storage, messaging and token request.
    pub http_timeout: Duration,

    /// Bound on one camera capture call.
    pub capture_timeout: Duration,

    /// How long shutdown waits for in-flight events.
    pub drain_grace: Duration,

    pub retention: RetentionPolicy,
    pub camera_command: String,
}

impl SentryConfig {
    /// Load from the process environment, after applying any `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        Ok(Self {
            state_url: required("SENTRY_STATE_URL")?,
            credentials_path: PathBuf::from(required("SENTRY_CREDENTIALS_PATH")?),
            save_dir: lookup("SENTRY_SAVE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SAVE_DIR)),
            bucket: required("SENTRY_BUCKET")?,
            topic: required("SENTRY_TOPIC")?,
            sensor_pin: parsed(&lookup, "SENTRY_SENSOR_PIN", DEFAULT_SENSOR_PIN)?,
            pin_numbering: parsed(&lookup, "SENTRY_PIN_NUMBERING", PinNumbering::Board)?,
            gpio_base: parsed(&lookup, "SENTRY_GPIO_BASE", 0)?,
            tick_interval: seconds(&lookup, "SENTRY_TICK_SECS", 1.0)?,
            cooldown: seconds(&lookup, "SENTRY_COOLDOWN_SECS", 10.0)?,
            settle_delay: seconds(&lookup, "SENTRY_SETTLE_SECS", 1.0)?,
            probe_timeout: seconds(&lookup, "SENTRY_PROBE_TIMEOUT_SECS", 5.0)?,
            http_timeout: seconds(&lookup, "SENTRY_HTTP_TIMEOUT_SECS", 30.0)?,
            capture_timeout: seconds(&lookup, "SENTRY_CAPTURE_TIMEOUT_SECS", 30.0)?,
            drain_grace: seconds(&lookup, "SENTRY_DRAIN_SECS", 5.0)?,
            retention: parsed(&lookup, "SENTRY_RETENTION", RetentionPolicy::default())?,
            camera_command: lookup("SENTRY_CAMERA_COMMAND")
                .unwrap_or_else(|| DEFAULT_CAMERA_COMMAND.to_string()),
        })
    }

    pub fn timing(&self) -> LoopTiming {
        LoopTiming {
            tick_interval: self.tick_interval,
            cooldown: self.cooldown,
        }
    }
}

fn parsed<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

fn seconds<F>(lookup: &F, key: &'static str, default: f64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs: f64 = parsed(lookup, key, default)?;
    Duration::try_from_secs_f64(secs).map_err(|e| ConfigError::Invalid {
        key,
        value: secs.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 4] = [
        ("SENTRY_STATE_URL", "https://db.example.test/geofence/isActive.json"),
        ("SENTRY_CREDENTIALS_PATH", "/etc/sentry/key.json"),
        ("SENTRY_BUCKET", "geofence-demo.firebasestorage.app"),
        ("SENTRY_TOPIC", "geofenceAlert"),
    ];

    #[test]
    fn test_defaults() {
        let config = SentryConfig::from_lookup(lookup(&REQUIRED)).unwrap();

        assert_eq!(config.save_dir, PathBuf::from("photos"));
        assert_eq!(config.sensor_pin, 29);
        assert_eq!(config.pin_numbering, PinNumbering::Board);
        assert_eq!(config.gpio_base, 0);
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.cooldown, Duration::from_secs(10));
        assert_eq!(config.settle_delay, Duration::from_secs(1));
        assert_eq!(config.drain_grace, Duration::from_secs(5));
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.capture_timeout, Duration::from_secs(30));
        assert_eq!(config.retention, RetentionPolicy::KeepLatest(100));
        assert_eq!(config.camera_command, "rpicam-still");
    }

    #[test]
    fn test_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("SENTRY_SENSOR_PIN", "17"),
            ("SENTRY_PIN_NUMBERING", "bcm"),
            ("SENTRY_GPIO_BASE", "512"),
            ("SENTRY_COOLDOWN_SECS", "2.5"),
            ("SENTRY_RETENTION", "delete-after-upload"),
            ("SENTRY_HTTP_TIMEOUT_SECS", "12"),
            ("SENTRY_CAPTURE_TIMEOUT_SECS", "8"),
        ]);

        let config = SentryConfig::from_lookup(lookup(&pairs)).unwrap();

        assert_eq!(config.sensor_pin, 17);
        assert_eq!(config.pin_numbering, PinNumbering::Bcm);
        assert_eq!(config.gpio_base, 512);
        assert_eq!(config.cooldown, Duration::from_millis(2500));
        assert_eq!(config.retention, RetentionPolicy::DeleteAfterUpload);
        assert_eq!(config.http_timeout, Duration::from_secs(12));
        assert_eq!(config.capture_timeout, Duration::from_secs(8));
    }

    #[test]
    fn test_missing_required() {
        let err = SentryConfig::from_lookup(lookup(&REQUIRED[1..])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SENTRY_STATE_URL")));
    }

    #[test]
    fn test_blank_required_is_missing() {
        let mut pairs = REQUIRED.to_vec();
        pairs[3] = ("SENTRY_TOPIC", "  ");
        let err = SentryConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SENTRY_TOPIC")));
    }

    #[test]
    fn test_invalid_values() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("SENTRY_COOLDOWN_SECS", "-1"));
        assert!(matches!(
            SentryConfig::from_lookup(lookup(&pairs)).unwrap_err(),
            ConfigError::Invalid {
                key: "SENTRY_COOLDOWN_SECS",
                ..
            }
        ));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("SENTRY_SENSOR_PIN", "300"));
        assert!(matches!(
            SentryConfig::from_lookup(lookup(&pairs)).unwrap_err(),
            ConfigError::Invalid {
                key: "SENTRY_SENSOR_PIN",
                ..
            }
        ));
    }
}
