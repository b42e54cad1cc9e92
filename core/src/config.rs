//! Client configuration.
//!
//! Built once when a `VisionClient` is constructed and read-only afterwards.
//! Deserializable so hosts can keep it in their own config files; durations
//! are written as seconds.

use std::time::Duration;

use serde::Deserialize;

use crate::transport::DEFAULT_MAX_RESPONSE_BYTES;

/// Default number of status fetches before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 100;

/// Default wait before each status fetch.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Poll loop bounds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PollOptions {
    pub max_attempts: u32,
    #[serde(with = "duration_secs")]
    pub interval: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl PollOptions {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Worst-case time spent sleeping in one poll loop.
    pub fn max_wait(&self) -> Duration {
        self.interval.saturating_mul(self.max_attempts)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Log every request, response and progress tick at `info`.
    pub verbose: bool,
    pub poll: PollOptions,
    /// Per-exchange timeout; `None` waits indefinitely.
    #[serde(with = "optional_duration_secs")]
    pub timeout: Option<Duration>,
    pub max_response_bytes: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            poll: PollOptions::default(),
            timeout: None,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

impl ClientConfig {
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_poll(mut self, poll: PollOptions) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_response_bytes(mut self, limit: u64) -> Self {
        self.max_response_bytes = limit;
        self
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

mod optional_duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<f64>::deserialize(deserializer)?
            .map(|secs| Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_conventions() {
        let config = ClientConfig::default();
        assert!(!config.verbose);
        assert_eq!(config.poll.max_attempts, 100);
        assert_eq!(config.poll.interval, Duration::from_secs(10));
        assert_eq!(config.poll.max_wait(), Duration::from_secs(1000));
        assert!(config.timeout.is_none());
    }

    #[test]
    fn deserializes_partial_config() {
        let config: ClientConfig = serde_json::from_str(
            r#"{"verbose": true, "poll": {"interval": 0.5}, "timeout": 30}"#,
        )
        .unwrap();
        assert!(config.verbose);
        assert_eq!(config.poll.max_attempts, 100);
        assert_eq!(config.poll.interval, Duration::from_millis(500));
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn negative_durations_are_rejected() {
        let result: Result<PollOptions, _> = serde_json::from_str(r#"{"interval": -1}"#);
        assert!(result.is_err());
    }
}
