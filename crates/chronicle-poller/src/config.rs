//! Poller settings read from the environment.
//!
//! | Variable               | Default                 |
//! |------------------------|-------------------------|
//! | `STORE_URL`            | `http://127.0.0.1:3000` |
//! | `POLL_TYPES`           | every patient event tag |
//! | `POLL_BATCH_SIZE`      | `100`                   |
//! | `POLL_INTERVAL_MS`     | `500`                   |
//! | `POLL_MAX_INTERVAL_MS` | `10000`                 |
//! | `STORE_TIMEOUT_MS`     | `2000`                  |

use std::str::FromStr;
use std::time::Duration;

use chronicle_core::event::EventTypeTag;
use chronicle_event_store::DEFAULT_STORE_TIMEOUT;
use chronicle_patient::domain::events::patient_registry;

use crate::error::AppError;
use crate::poller::PollerConfig;

const DEFAULT_STORE_URL: &str = "http://127.0.0.1:3000";

/// Everything the poller binary needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerSettings {
    /// Base URL of the remote store.
    pub store_url: String,
    /// Event types to follow, one loop each.
    pub types: Vec<EventTypeTag>,
    /// Loop tuning.
    pub poller: PollerConfig,
    /// Per-call budget for store requests.
    pub store_timeout: Duration,
}

impl PollerSettings {
    /// Reads settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is present but malformed.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, which returns the raw value of a
    /// variable or `None` when unset.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is present but malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let defaults = PollerConfig::default();
        let store_url = lookup("STORE_URL").unwrap_or_else(|| DEFAULT_STORE_URL.to_owned());
        let types = match lookup("POLL_TYPES") {
            Some(raw) => parse_types(&raw)?,
            None => patient_registry()?.tags(),
        };
        let batch_size = parse_or(&lookup, "POLL_BATCH_SIZE", defaults.batch_size)?;
        let interval = millis_or(&lookup, "POLL_INTERVAL_MS", defaults.interval)?;
        let max_interval = millis_or(&lookup, "POLL_MAX_INTERVAL_MS", defaults.max_interval)?;
        let store_timeout = millis_or(&lookup, "STORE_TIMEOUT_MS", DEFAULT_STORE_TIMEOUT)?;

        if batch_size == 0 {
            return Err(AppError::Config("POLL_BATCH_SIZE must be positive".into()));
        }
        if max_interval < interval {
            return Err(AppError::Config(
                "POLL_MAX_INTERVAL_MS must not be below POLL_INTERVAL_MS".into(),
            ));
        }

        Ok(Self {
            store_url,
            types,
            poller: PollerConfig {
                batch_size,
                interval,
                max_interval,
            },
            store_timeout,
        })
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} is invalid ({raw}): {e}"))),
    }
}

fn millis_or(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration, AppError> {
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    parse_or(lookup, key, default_ms).map(Duration::from_millis)
}

fn parse_types(raw: &str) -> Result<Vec<EventTypeTag>, AppError> {
    let types = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i32>()
                .ok()
                .filter(|tag| *tag > 0)
                .map(EventTypeTag)
                .ok_or_else(|| AppError::Config(format!("POLL_TYPES has an invalid tag: {s}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if types.is_empty() {
        return Err(AppError::Config("POLL_TYPES must name at least one tag".into()));
    }
    Ok(types)
}
