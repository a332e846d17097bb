//! # Emitter configuration.
//!
//! [`Options`] is consumed once at construction. The wrap policy it carries
//! ([`WrapPolicy`]) is immutable for the emitter's lifetime; only the
//! max-listener threshold can be adjusted afterwards.
//!
//! ## Defaults
//! - `catch_future_errors = true`
//! - `check_sync_returns_future = false`
//! - `error_policy = ErrorPolicy::Log`
//! - `max_listeners = 10`
//! - `logger = TracingLogger`

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::ParsePolicyError;
use crate::logger::{Logger, TracingLogger};

/// Soft per-key listener limit; crossing it logs a warning.
pub const DEFAULT_MAX_LISTENERS: usize = 10;

/// What happens to a listener failure once it is caught.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ErrorPolicy {
    /// Swallow the failure; it is still returned as the listener's value.
    Silent,
    /// Report the failure through the [`Logger`] and carry on.
    #[default]
    Log,
    /// Propagate the failure to whoever dispatched the event.
    Throw,
}

impl ErrorPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorPolicy::Silent => "silent",
            ErrorPolicy::Log => "log",
            ErrorPolicy::Throw => "throw",
        }
    }
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorPolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "silent" => Ok(ErrorPolicy::Silent),
            "log" => Ok(ErrorPolicy::Log),
            "throw" => Ok(ErrorPolicy::Throw),
            _ => Err(ParsePolicyError(s.to_string())),
        }
    }
}

/// Decides which listeners get wrapped and how wrapped failures are routed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WrapPolicy {
    /// Intercept failures of listener futures (and of the call itself).
    pub catch_future_errors: bool,
    /// Also wrap listeners built with [`Listener::deferred`](crate::Listener::deferred)
    /// or [`Listener::sync`](crate::Listener::sync), not only natively async ones.
    pub check_sync_returns_future: bool,
    pub error_policy: ErrorPolicy,
}

impl Default for WrapPolicy {
    fn default() -> Self {
        Self {
            catch_future_errors: true,
            check_sync_returns_future: false,
            error_policy: ErrorPolicy::Log,
        }
    }
}

impl WrapPolicy {
    /// Returns whether a listener with the given async tag gets wrapped.
    #[inline]
    pub fn should_wrap(&self, is_async: bool) -> bool {
        self.catch_future_errors && (is_async || self.check_sync_returns_future)
    }
}

/// Construction options for [`Emitter`](crate::Emitter), [`Channel`](crate::Channel)
/// and [`Waterfall`](crate::Waterfall).
#[derive(Clone)]
pub struct Options<K> {
    pub logger: Arc<dyn Logger>,
    pub catch_future_errors: bool,
    pub check_sync_returns_future: bool,
    pub error_policy: ErrorPolicy,
    /// Keys whose slots are created up front.
    pub events: Vec<K>,
    pub max_listeners: usize,
}

impl<K> Default for Options<K> {
    fn default() -> Self {
        let wrap = WrapPolicy::default();
        Self {
            logger: Arc::new(TracingLogger),
            catch_future_errors: wrap.catch_future_errors,
            check_sync_returns_future: wrap.check_sync_returns_future,
            error_policy: wrap.error_policy,
            events: Vec::new(),
            max_listeners: DEFAULT_MAX_LISTENERS,
        }
    }
}

impl<K> Options<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_logger(mut self, logger: impl Logger) -> Self {
        self.logger = Arc::new(logger);
        self
    }

    pub fn with_shared_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_catch_future_errors(mut self, enabled: bool) -> Self {
        self.catch_future_errors = enabled;
        self
    }

    pub fn with_check_sync_returns_future(mut self, enabled: bool) -> Self {
        self.check_sync_returns_future = enabled;
        self
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn with_events(mut self, events: impl IntoIterator<Item = K>) -> Self {
        self.events = events.into_iter().collect();
        self
    }

    pub fn with_max_listeners(mut self, max: usize) -> Self {
        self.max_listeners = max;
        self
    }

    /// The wrap policy these options describe.
    #[inline]
    pub fn wrap_policy(&self) -> WrapPolicy {
        WrapPolicy {
            catch_future_errors: self.catch_future_errors,
            check_sync_returns_future: self.check_sync_returns_future,
            error_policy: self.error_policy,
        }
    }
}

/// Per-registration options for `on`.
#[derive(Clone, Debug, Default)]
pub struct OnOptions {
    /// Insert before every existing listener instead of after.
    pub prepend: bool,
    /// Unsubscribe automatically once this token is cancelled.
    pub signal: Option<CancellationToken>,
}

impl OnOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prepend(mut self) -> Self {
        self.prepend = true;
        self
    }

    pub fn with_signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }
}
