use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::handle::Subscription;
use crate::listener::Fault;
use crate::logger::Logger;

/// Spawns a listener future nobody will await.
///
/// A raised failure has nowhere left to propagate, so it is reported through
/// the logger. Handled failures were already routed by the wrapper.
pub(crate) fn detach<R>(future: BoxFuture<'static, Result<R, Fault>>, logger: &Arc<dyn Logger>)
where
    R: Send + 'static,
{
    let Ok(handle) = Handle::try_current() else {
        logger.warn("no tokio runtime available, dropping listener future");
        return;
    };
    let logger = logger.clone();
    handle.spawn(async move {
        match future.await {
            Err(Fault::Raised(error)) => logger.error(&error),
            Err(Fault::Handled(error)) => tracing::debug!("detached listener failed: {error:#}"),
            Ok(_) => {}
        }
    });
}

/// Unsubscribes once `signal` fires; exits early if the subscription goes first.
pub(crate) fn unsubscribe_on(
    signal: CancellationToken,
    subscription: Subscription,
    logger: &Arc<dyn Logger>,
) {
    let Some(closed) = subscription.closed() else {
        return;
    };
    let Ok(handle) = Handle::try_current() else {
        logger.warn("no tokio runtime available, signal will not remove the listener");
        return;
    };
    handle.spawn(async move {
        tokio::select! {
            _ = signal.cancelled() => {
                subscription.unsubscribe();
            }
            _ = closed.cancelled() => {}
        }
    });
}
