//! Configuration types for comic-fetch

use crate::error::{Error, Result};
use crate::naming::Padding;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::PathBuf, time::Duration};

/// HTTP fetch behavior (concurrency, timeouts, request headers)
///
/// Used as a flattened sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Maximum fetches in flight at once within a batch (default: 10)
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,

    /// Total timeout for one attempt, headers and body included (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// TCP/TLS connect timeout for the shared client (default: 10 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// User-Agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Extra headers sent with every request (e.g. `Accept`)
    #[serde(default = "default_headers")]
    pub headers: HashMap<String, String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: default_concurrency_limit(),
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
            user_agent: default_user_agent(),
            headers: default_headers(),
        }
    }
}

/// Retry behavior for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per resource, the first one included (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay unit for backoff (default: 1 second)
    #[serde(default = "default_base_delay", with = "duration_serde")]
    pub base_delay: Duration,

    /// Upper bound for a single backoff sleep (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// How the delay grows with the attempt number (default: linear)
    #[serde(default)]
    pub backoff: Backoff,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
            max_delay: default_max_delay(),
            backoff: Backoff::default(),
            jitter: false,
        }
    }
}

/// Backoff growth strategy
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// `attempt × base_delay`
    #[default]
    Linear,
    /// `base_delay × multiplier^(attempt - 1)`
    Exponential {
        /// Growth factor between consecutive delays
        multiplier: f64,
    },
}

impl Backoff {
    /// Delay to sleep after failed attempt number `attempt` (1-based)
    ///
    /// Never exceeds `max`, however large `attempt` grows.
    pub fn delay(&self, base: Duration, attempt: u32, max: Duration) -> Duration {
        match self {
            Backoff::Linear => base.checked_mul(attempt).unwrap_or(max).min(max),
            Backoff::Exponential { multiplier } => {
                let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
                let secs = base.as_secs_f64() * multiplier.powi(exponent);
                if !secs.is_finite() || secs >= max.as_secs_f64() {
                    return max;
                }
                Duration::try_from_secs_f64(secs).unwrap_or(max).min(max)
            }
        }
    }
}

/// What happens to an episode when some of its images fail
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFailurePolicy {
    /// Failed images are left out and the image list shrinks
    #[default]
    Drop,
    /// Any failed image removes the episode from the manifest
    FailEpisode,
}

/// Output naming conventions
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NamingConfig {
    /// Ordinal padding for files and episode folders (default: 3 digits)
    #[serde(default)]
    pub padding: Padding,
}

/// Comic collection settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CollectConfig {
    /// Root directory for comic folders (default: "comics")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// First episode (1-based) to download; earlier episodes are skipped (default: 1)
    #[serde(default = "default_start_episode")]
    pub start_episode: u32,

    /// Handling of episodes with failed images
    #[serde(default)]
    pub on_image_failure: ImageFailurePolicy,

    /// Skip episodes the source reports as locked (default: true)
    #[serde(default = "default_true")]
    pub skip_locked: bool,

    /// Base name of the manifest files written into `output_dir` (default: "comics")
    #[serde(default = "default_manifest_name")]
    pub manifest_name: String,

    /// Also write `<manifest_name>.xml` next to the JSON manifest (default: false)
    #[serde(default)]
    pub write_xml: bool,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            start_episode: default_start_episode(),
            on_image_failure: ImageFailurePolicy::default(),
            skip_locked: true,
            manifest_name: default_manifest_name(),
            write_xml: false,
        }
    }
}

/// Main configuration
///
/// Sub-configs other than `retry` are flattened, so a config file is a single
/// flat table with a nested `retry` section.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP fetch settings
    #[serde(flatten)]
    pub fetch: FetchConfig,

    /// Retry settings
    #[serde(default)]
    pub retry: RetryConfig,

    /// Naming settings
    #[serde(flatten)]
    pub naming: NamingConfig,

    /// Collection settings
    #[serde(flatten)]
    pub collect: CollectConfig,
}

impl Config {
    /// Check the limits that would make a batch impossible to run
    pub fn validate(&self) -> Result<()> {
        if self.fetch.concurrency_limit == 0 {
            return Err(Error::config(
                "concurrency_limit",
                "concurrency_limit must be at least 1",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::config(
                "max_attempts",
                "max_attempts must be at least 1",
            ));
        }
        if self.fetch.request_timeout.is_zero() {
            return Err(Error::config(
                "request_timeout",
                "request_timeout must be greater than zero",
            ));
        }
        if let Backoff::Exponential { multiplier } = self.retry.backoff
            && !(multiplier.is_finite() && multiplier >= 1.0)
        {
            return Err(Error::config(
                "backoff",
                "exponential multiplier must be a finite number >= 1.0",
            ));
        }
        if let Padding::Fixed(0) = self.naming.padding {
            return Err(Error::config("padding", "fixed padding width must be >= 1"));
        }
        if self.collect.start_episode == 0 {
            return Err(Error::config(
                "start_episode",
                "start_episode is 1-based and must be at least 1",
            ));
        }
        Ok(())
    }
}

// Default value functions
fn default_concurrency_limit() -> usize {
    10
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_user_agent() -> String {
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_headers() -> HashMap<String, String> {
    HashMap::from([(
        "Accept".to_string(),
        "image/avif,image/webp,image/apng,image/*,*/*;q=0.8".to_string(),
    )])
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("comics")
}

fn default_start_episode() -> u32 {
    1
}

fn default_manifest_name() -> String {
    "comics".to_string()
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config: Config = serde_json::from_str("{}").expect("deserialize failed");

        assert_eq!(config.fetch.concurrency_limit, 10);
        assert_eq!(config.fetch.request_timeout, Duration::from_secs(30));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.backoff, Backoff::Linear);
        assert!(!config.retry.jitter);
        assert_eq!(config.naming.padding, Padding::Fixed(3));
        assert_eq!(config.collect.on_image_failure, ImageFailurePolicy::Drop);
        assert_eq!(config.collect.start_episode, 1);
        assert!(config.collect.skip_locked);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn flat_document_overrides_fields() {
        let json = r#"{
            "concurrency_limit": 20,
            "request_timeout": 60,
            "padding": "none",
            "on_image_failure": "fail_episode",
            "output_dir": "mangapark",
            "retry": {
                "max_attempts": 5,
                "base_delay": 2,
                "backoff": { "exponential": { "multiplier": 2.0 } },
                "jitter": true
            }
        }"#;

        let config: Config = serde_json::from_str(json).expect("deserialize failed");

        assert_eq!(config.fetch.concurrency_limit, 20);
        assert_eq!(config.fetch.request_timeout, Duration::from_secs(60));
        assert_eq!(config.naming.padding, Padding::None);
        assert_eq!(
            config.collect.on_image_failure,
            ImageFailurePolicy::FailEpisode
        );
        assert_eq!(config.collect.output_dir, PathBuf::from("mangapark"));
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay, Duration::from_secs(2));
        assert_eq!(
            config.retry.backoff,
            Backoff::Exponential { multiplier: 2.0 }
        );
        assert!(config.retry.jitter);
    }

    #[test]
    fn validate_rejects_zero_limits() {
        let mut config = Config::default();
        config.fetch.concurrency_limit = 0;
        match config.validate() {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("concurrency_limit")),
            other => panic!("expected config error, got {other:?}"),
        }

        let mut config = Config::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.naming.padding = Padding::Fixed(0);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.collect.start_episode = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn linear_backoff_grows_with_attempt() {
        let base = Duration::from_secs(2);
        let max = Duration::from_secs(60);
        assert_eq!(Backoff::Linear.delay(base, 1, max), Duration::from_secs(2));
        assert_eq!(Backoff::Linear.delay(base, 2, max), Duration::from_secs(4));
        assert_eq!(Backoff::Linear.delay(base, 3, max), Duration::from_secs(6));
    }

    #[test]
    fn large_attempt_numbers_clamp_to_max_delay() {
        let mut config = Config::default();
        config.retry.max_attempts = 80;
        config.retry.backoff = Backoff::Exponential { multiplier: 2.0 };
        assert!(config.validate().is_ok());

        let base = Duration::from_secs(1);
        let max = Duration::from_secs(30);
        let backoff = config.retry.backoff;
        assert_eq!(backoff.delay(base, 70, max), max);
        assert_eq!(backoff.delay(base, u32::MAX, max), max);

        let huge = Backoff::Exponential {
            multiplier: f64::MAX,
        };
        assert_eq!(huge.delay(base, 3, max), max);

        assert_eq!(Backoff::Linear.delay(Duration::MAX, u32::MAX, max), max);
        assert_eq!(
            Backoff::Linear.delay(Duration::MAX, 2, Duration::MAX),
            Duration::MAX
        );
    }

    #[test]
    fn exponential_backoff_is_capped() {
        let backoff = Backoff::Exponential { multiplier: 2.0 };
        let base = Duration::from_secs(1);
        let max = Duration::from_secs(5);
        assert_eq!(backoff.delay(base, 1, max), Duration::from_secs(1));
        assert_eq!(backoff.delay(base, 2, max), Duration::from_secs(2));
        assert_eq!(backoff.delay(base, 3, max), Duration::from_secs(4));
        assert_eq!(backoff.delay(base, 4, max), Duration::from_secs(5));
    }
}
