//! Error types surfaced by dispatch and wait operations.
//!
//! - [`Error`]: a listener failure that the configured [`ErrorPolicy`](crate::ErrorPolicy)
//!   decided to propagate to the dispatching caller.
//! - [`WaitError`]: the non-event outcomes of [`WaitFor`](crate::WaitFor).
//!
//! Wait outcomes are control flow, not listener faults, so they never pass
//! through the error policy or the logger.

use std::time::Duration;
use thiserror::Error;

/// Errors propagated out of a dispatch call.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    /// A listener failed and the error policy asked for the failure to propagate.
    #[error("listener failed: {0:#}")]
    Listener(anyhow::Error),
}

impl Error {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            Error::Listener(_) => "listener_failed",
        }
    }

    /// Consumes the error, returning the listener's own error value.
    pub fn into_inner(self) -> anyhow::Error {
        match self {
            Error::Listener(error) => error,
        }
    }
}

/// Outcomes of a [`WaitFor`](crate::WaitFor) other than the awaited event.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WaitError {
    /// The deadline elapsed before a matching event.
    #[error("wait_for {label} timed out after {}ms", .timeout.as_millis())]
    Timeout {
        /// Event key (or channel name) being waited on.
        label: String,
        /// The configured timeout.
        timeout: Duration,
    },

    /// The wait was cancelled through [`WaitFor::cancel`](crate::WaitFor::cancel)
    /// or a [`WaitCanceller`](crate::WaitCanceller).
    #[error("wait_for {label} cancelled")]
    Cancelled {
        /// Event key (or channel name) being waited on.
        label: String,
    },

    /// The external cancellation token fired.
    #[error("wait_for {label} aborted by signal")]
    Aborted {
        /// Event key (or channel name) being waited on.
        label: String,
    },

    /// The registration was removed from the emitter (for example by `clear`)
    /// before a matching event arrived.
    #[error("wait_for {label} closed before the event fired")]
    Closed {
        /// Event key (or channel name) being waited on.
        label: String,
    },
}

impl WaitError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            WaitError::Timeout { .. } => "wait_timeout",
            WaitError::Cancelled { .. } => "wait_cancelled",
            WaitError::Aborted { .. } => "wait_aborted",
            WaitError::Closed { .. } => "wait_closed",
        }
    }

    /// True for [`WaitError::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, WaitError::Timeout { .. })
    }
}

/// Returned when parsing an unknown [`ErrorPolicy`](crate::ErrorPolicy) name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown error policy {0:?}, expected one of: silent, log, throw")]
pub struct ParsePolicyError(pub String);
