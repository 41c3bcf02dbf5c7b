//! Configuration types for the distribution monitor
//!
//! This module defines all configuration structures used throughout the crate.
//! Everything is validated before the monitor starts; an invalid configuration
//! is a startup failure, never a per-cycle one.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Zone the probe records are created in (e.g. "example.com")
    pub domain: String,

    /// Zone API configuration
    pub api: ApiConfig,

    /// Time between the start of two consecutive cycles
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Time between two distribution queries within a cycle
    #[serde(default = "default_poll", with = "humantime_serde")]
    pub poll: Duration,

    /// Deadline for one cycle, from creation until distribution is confirmed
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Deadline for deleting the probe record once a cycle has ended
    #[serde(default = "default_cleanup_timeout", with = "humantime_serde")]
    pub cleanup_timeout: Duration,

    /// Maximum number of cycles in flight at once
    ///
    /// `0` allows unbounded overlap: a new cycle starts on every tick
    /// regardless of how many earlier cycles are still polling. With a
    /// positive bound, ticks arriving while the bound is reached are skipped.
    #[serde(default)]
    pub max_in_flight: usize,

    /// Align the first tick to a wall-clock multiple of `interval`
    #[serde(default = "default_align_ticks")]
    pub align_ticks: bool,
}

impl MonitorConfig {
    /// Create a new configuration with defaults
    pub fn new(domain: impl Into<String>, api: ApiConfig) -> Self {
        Self {
            domain: domain.into(),
            api,
            interval: default_interval(),
            poll: default_poll(),
            timeout: default_timeout(),
            cleanup_timeout: default_cleanup_timeout(),
            max_in_flight: 0,
            align_ticks: default_align_ticks(),
        }
    }

    /// Set the interval between cycles
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the poll interval within a cycle
    pub fn with_poll(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    /// Set the per-cycle timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the cleanup timeout
    pub fn with_cleanup_timeout(mut self, cleanup_timeout: Duration) -> Self {
        self.cleanup_timeout = cleanup_timeout;
        self
    }

    /// Bound the number of overlapping cycles (`0` = unbounded)
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        validate_domain_name(&self.domain)?;
        self.api.validate()?;

        if self.interval < Duration::from_secs(1) {
            return Err(crate::Error::config(format!(
                "Interval must be at least 1s. Got: {:?}",
                self.interval
            )));
        }

        if self.poll.is_zero() {
            return Err(crate::Error::config("Poll interval must be > 0"));
        }

        if self.timeout.is_zero() {
            return Err(crate::Error::config("Cycle timeout must be > 0"));
        }

        if self.cleanup_timeout.is_zero() {
            return Err(crate::Error::config("Cleanup timeout must be > 0"));
        }

        if self.poll >= self.timeout {
            tracing::warn!(
                poll = ?self.poll,
                timeout = ?self.timeout,
                "Poll interval is not shorter than the cycle timeout; cycles will time out before the first check"
            );
        }

        Ok(())
    }
}

/// Zone API configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApiConfig {
    /// DNSimple API v2
    Dnsimple {
        /// API access token
        token: String,
        /// Account ID (resolved via whoami when absent)
        #[serde(default)]
        account_id: Option<String>,
        /// Use the sandbox environment
        #[serde(default)]
        sandbox: bool,
    },

    /// Custom zone API
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ApiConfig {
    /// Validate the API configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ApiConfig::Dnsimple { token, account_id, .. } => {
                if token.is_empty() {
                    return Err(crate::Error::config("DNSimple API token cannot be empty"));
                }
                if account_id.as_ref().is_some_and(|id| id.trim().is_empty()) {
                    return Err(crate::Error::config(
                        "DNSimple account ID cannot be blank when set",
                    ));
                }
                Ok(())
            }
            ApiConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom API factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("Custom API config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the API type name
    pub fn type_name(&self) -> &str {
        match self {
            ApiConfig::Dnsimple { .. } => "dnsimple",
            ApiConfig::Custom { factory, .. } => factory,
        }
    }
}

// Tokens never appear in Debug output
impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiConfig::Dnsimple {
                account_id,
                sandbox,
                ..
            } => f
                .debug_struct("Dnsimple")
                .field("token", &"<REDACTED>")
                .field("account_id", account_id)
                .field("sandbox", sandbox)
                .finish(),
            ApiConfig::Custom { factory, .. } => f
                .debug_struct("Custom")
                .field("factory", factory)
                .field("config", &"<REDACTED>")
                .finish(),
        }
    }
}

/// Output format of the result reporter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// One structured tracing event per field set
    #[default]
    Text,
    /// The whole result serialized as JSON
    Json,
}

impl std::str::FromStr for ReportFormat {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            other => Err(crate::Error::config(format!(
                "Report format '{}' is not valid. Valid formats: text, json",
                other
            ))),
        }
    }
}

/// Result reporter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Output format
    #[serde(default)]
    pub format: ReportFormat,

    /// Log a summary every N results (`0` disables summaries)
    #[serde(default = "default_summary_every")]
    pub summary_every: usize,

    /// Number of recent successful cycles kept for the summary statistics
    #[serde(default = "default_summary_window")]
    pub summary_window: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: ReportFormat::default(),
            summary_every: default_summary_every(),
            summary_window: default_summary_window(),
        }
    }
}

/// Validate that a string is a valid domain name
///
/// This implements basic DNS domain name validation per RFC 1035.
/// It's not comprehensive but catches common errors.
pub fn validate_domain_name(domain: &str) -> Result<(), crate::Error> {
    if domain.is_empty() {
        return Err(crate::Error::config("Domain name cannot be empty"));
    }

    if domain.len() > 253 {
        return Err(crate::Error::config(format!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        )));
    }

    for label in domain.split('.') {
        if label.is_empty() {
            return Err(crate::Error::config(format!(
                "Domain name has empty label: '{}'",
                domain
            )));
        }

        if label.len() > 63 {
            return Err(crate::Error::config(format!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            )));
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(crate::Error::config(format!(
                "Domain label contains invalid characters. Label: '{}'. \
                Valid: alphanumeric and hyphen only.",
                label
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(crate::Error::config(format!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            )));
        }
    }

    Ok(())
}

fn default_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_poll() -> Duration {
    Duration::from_secs(2)
}

fn default_timeout() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_cleanup_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_align_ticks() -> bool {
    true
}

fn default_summary_every() -> usize {
    60
}

fn default_summary_window() -> usize {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dnsimple(token: &str) -> ApiConfig {
        ApiConfig::Dnsimple {
            token: token.to_string(),
            account_id: None,
            sandbox: false,
        }
    }

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::new("example.com", dnsimple("token"));

        assert_eq!(config.interval, Duration::from_secs(60));
        assert_eq!(config.poll, Duration::from_secs(2));
        assert_eq!(config.timeout, Duration::from_secs(600));
        assert_eq!(config.max_in_flight, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_domain_and_token_required() {
        assert!(MonitorConfig::new("", dnsimple("token")).validate().is_err());
        assert!(MonitorConfig::new("example.com", dnsimple("")).validate().is_err());
    }

    #[test]
    fn test_duration_bounds() {
        let base = MonitorConfig::new("example.com", dnsimple("token"));

        assert!(base.clone().with_interval(Duration::from_millis(500)).validate().is_err());
        assert!(base.clone().with_poll(Duration::ZERO).validate().is_err());
        assert!(base.clone().with_timeout(Duration::ZERO).validate().is_err());
        assert!(base.clone().with_cleanup_timeout(Duration::ZERO).validate().is_err());
        assert!(base.with_interval(Duration::from_secs(1)).validate().is_ok());
    }

    #[test]
    fn test_domain_validation() {
        assert!(validate_domain_name("example.com").is_ok());
        assert!(validate_domain_name("sub.example-site.co.uk").is_ok());

        assert!(validate_domain_name("example..com").is_err());
        assert!(validate_domain_name("-example.com").is_err());
        assert!(validate_domain_name("exa mple.com").is_err());
        assert!(validate_domain_name(&format!("{}.com", "a".repeat(64))).is_err());
    }

    #[test]
    fn test_deserialize_with_humantime_durations() {
        let json = serde_json::json!({
            "domain": "example.com",
            "api": { "type": "dnsimple", "token": "abc" },
            "interval": "30s",
            "poll": "500ms",
            "timeout": "5m",
        });

        let config: MonitorConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.interval, Duration::from_secs(30));
        assert_eq!(config.poll, Duration::from_millis(500));
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert_eq!(config.cleanup_timeout, Duration::from_secs(60));
        assert!(config.align_ticks);
        assert_eq!(config.api.type_name(), "dnsimple");
    }

    #[test]
    fn test_token_not_exposed_in_debug() {
        let config = MonitorConfig::new("example.com", dnsimple("secret_token_12345"));
        let debug_str = format!("{:?}", config);

        assert!(!debug_str.contains("secret_token_12345"));
        assert!(debug_str.contains("REDACTED"));
    }

    #[test]
    fn test_report_format_parse() {
        assert_eq!("json".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert_eq!("TEXT".parse::<ReportFormat>().unwrap(), ReportFormat::Text);
        assert!("xml".parse::<ReportFormat>().is_err());
    }
}
