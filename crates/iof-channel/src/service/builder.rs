//! Role-checked channel construction.

use std::sync::Arc;

use crate::adapters::SystemTimeSource;
use crate::config::ChannelConfig;
use crate::domain::{ChannelError, ConfigError, Role};
use crate::ports::{MessageTransport, TimeSource};
use crate::service::{Initiator, Responder};

/// Origin wildcard accepted by the responder to mean "any".
pub const ANY_ORIGIN: &str = "*";

/// Builds either role from one transport and configuration.
///
/// # Example
///
/// ```rust,ignore
/// let host = ChannelBuilder::new(transport)
///     .config(ChannelConfig::default().with_role(Role::Initiator))
///     .initiate(frame_handle, "https://frame.example")?;
/// ```
pub struct ChannelBuilder<T: MessageTransport> {
    transport: T,
    config: ChannelConfig,
    time: Arc<dyn TimeSource>,
}

impl<T: MessageTransport + 'static> ChannelBuilder<T> {
    /// Builder with default configuration and the system clock.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            config: ChannelConfig::default(),
            time: Arc::new(SystemTimeSource::new()),
        }
    }

    /// Use `config`.
    #[must_use]
    pub fn config(mut self, config: ChannelConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `time` for reply and handshake deadlines.
    #[must_use]
    pub fn time_source(mut self, time: impl TimeSource + 'static) -> Self {
        self.time = Arc::new(time);
        self
    }

    /// Open a channel to a known counterpart and send the handshake.
    ///
    /// # Errors
    ///
    /// - `RoleMismatch` if the configuration is for the responder role
    /// - `InvalidOrigin`/`WildcardOrigin` for an unusable target origin
    /// - `Transport` if the handshake could not be sent
    pub fn initiate(
        self,
        target: T::Handle,
        target_origin: impl Into<String>,
    ) -> Result<Initiator<T>, ChannelError> {
        self.check_role(Role::Initiator, "initiate")?;
        let target_origin = target_origin.into();
        validate_origin(&target_origin)?;
        if target_origin == ANY_ORIGIN {
            return Err(ConfigError::WildcardOrigin.into());
        }
        Initiator::start(self.transport, self.config, self.time, target, target_origin)
    }

    /// Open a channel that waits for its counterpart.
    ///
    /// `expected_origin` of `None` or `"*"` accepts the first sender from any
    /// origin.
    ///
    /// # Errors
    ///
    /// - `RoleMismatch` if the configuration is for the initiator role
    /// - `InvalidOrigin` for an unusable expected origin
    pub fn listen(self, expected_origin: Option<String>) -> Result<Responder<T>, ChannelError> {
        self.check_role(Role::Responder, "listen")?;
        let expected_origin = match expected_origin {
            Some(origin) => {
                validate_origin(&origin)?;
                (origin != ANY_ORIGIN).then_some(origin)
            }
            None => None,
        };
        Ok(Responder::start(
            self.transport,
            self.config,
            self.time,
            expected_origin,
        ))
    }

    fn check_role(&self, wanted: Role, attempted: &'static str) -> Result<(), ConfigError> {
        match self.config.role {
            Some(configured) if configured != wanted => Err(ConfigError::RoleMismatch {
                configured,
                attempted,
            }),
            _ => self.config.validate(),
        }
    }
}

/// Reject empty origins and origins containing whitespace.
pub fn validate_origin(origin: &str) -> Result<(), ConfigError> {
    if origin.is_empty() || origin.chars().any(char::is_whitespace) {
        return Err(ConfigError::InvalidOrigin(origin.to_string()));
    }
    Ok(())
}
