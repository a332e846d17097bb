//! # Logger collaborator.
//!
//! The emitter reports two kinds of diagnostics:
//! - **warnings**: the max-listener threshold was crossed, or a future could
//!   not be spawned because no tokio runtime is available;
//! - **errors**: listener failures routed through [`ErrorPolicy::Log`](crate::ErrorPolicy::Log),
//!   and failures of spawned listener futures nobody else will observe.
//!
//! Both calls are synchronous and fire-and-forget.

/// Sink for emitter diagnostics.
pub trait Logger: Send + Sync + 'static {
    fn warn(&self, message: &str);

    fn error(&self, error: &anyhow::Error);
}

/// Default [`Logger`] forwarding to the `tracing` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn warn(&self, message: &str) {
        tracing::warn!("{message}");
    }

    fn error(&self, error: &anyhow::Error) {
        tracing::error!("listener failed: {error:#}");
    }
}
