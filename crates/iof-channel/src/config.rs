//! Channel configuration.
//!
//! Loaded from code (`Default` + `with_*`), environment variables, or a TOML
//! file. Every loader runs [`ChannelConfig::validate`].

use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::{ConfigError, RetiredCorrelations, Role};

/// Default time a correlated request waits for its reply.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(30);

/// Options for one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Role this configuration is meant for. `None` accepts either.
    pub role: Option<Role>,

    /// Deadline for correlated replies. `None` waits forever.
    pub reply_timeout: Option<Duration>,

    /// Report a connection failure if the handshake takes longer. `None` never reports.
    pub handshake_timeout: Option<Duration>,

    /// How long answered or expired correlation ids are remembered.
    pub retired_reply_window: Duration,

    /// Tag attached to every log line of this channel.
    pub log_prefix: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            role: None,
            reply_timeout: Some(DEFAULT_REPLY_TIMEOUT),
            handshake_timeout: None,
            retired_reply_window: RetiredCorrelations::DEFAULT_WINDOW,
            log_prefix: "iof".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    role: Option<String>,
    reply_timeout_ms: Option<u64>,
    handshake_timeout_ms: Option<u64>,
    retired_reply_window_ms: Option<u64>,
    log_prefix: Option<String>,
}

impl ChannelConfig {
    /// Restrict to `role`.
    #[must_use]
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    /// Set (or disable) the reply deadline.
    #[must_use]
    pub fn with_reply_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// Set (or disable) the handshake deadline.
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set the retired-id window.
    #[must_use]
    pub fn with_retired_reply_window(mut self, window: Duration) -> Self {
        self.retired_reply_window = window;
        self
    }

    /// Set the log tag.
    #[must_use]
    pub fn with_log_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.log_prefix = prefix.into();
        self
    }

    /// Reject zero durations. A zero deadline would fail every request.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reply_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::ZeroDuration {
                field: "reply_timeout",
            });
        }
        if self.handshake_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::ZeroDuration {
                field: "handshake_timeout",
            });
        }
        if self.retired_reply_window.is_zero() {
            return Err(ConfigError::ZeroDuration {
                field: "retired_reply_window",
            });
        }
        Ok(())
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `IOF_ROLE`: `initiator`/`window` or `responder`/`iframe` (default: either)
    /// - `IOF_REPLY_TIMEOUT_MS`: reply deadline, `0` disables (default: 30000)
    /// - `IOF_HANDSHAKE_TIMEOUT_MS`: handshake deadline, `0` disables (default: off)
    /// - `IOF_RETIRED_WINDOW_MS`: retired id window (default: 120000)
    /// - `IOF_LOG_PREFIX`: log tag (default: iof)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`ChannelConfig::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(role) = lookup("IOF_ROLE") {
            config.role = Some(role.parse()?);
        }
        if let Some(ms) = parse_millis(&lookup, "IOF_REPLY_TIMEOUT_MS")? {
            config.reply_timeout = non_zero(ms);
        }
        if let Some(ms) = parse_millis(&lookup, "IOF_HANDSHAKE_TIMEOUT_MS")? {
            config.handshake_timeout = non_zero(ms);
        }
        if let Some(ms) = parse_millis(&lookup, "IOF_RETIRED_WINDOW_MS")? {
            config.retired_reply_window = Duration::from_millis(ms);
        }
        if let Some(prefix) = lookup("IOF_LOG_PREFIX") {
            config.log_prefix = prefix;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Format
    ///
    /// ```toml
    /// role = "responder"
    /// reply_timeout_ms = 30000      # 0 disables
    /// handshake_timeout_ms = 5000   # 0 disables
    /// retired_reply_window_ms = 120000
    /// log_prefix = "editor"
    /// ```
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let defaults = Self::default();
        let config = Self {
            role: file.role.as_deref().map(str::parse).transpose()?,
            reply_timeout: file
                .reply_timeout_ms
                .map_or(defaults.reply_timeout, non_zero),
            handshake_timeout: file
                .handshake_timeout_ms
                .map_or(defaults.handshake_timeout, non_zero),
            retired_reply_window: file
                .retired_reply_window_ms
                .map_or(defaults.retired_reply_window, Duration::from_millis),
            log_prefix: file.log_prefix.unwrap_or(defaults.log_prefix),
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_toml_str(&content)
    }
}

fn parse_millis<F>(lookup: &F, key: &str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| {
            value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            })
        })
        .transpose()
}

fn non_zero(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}
