//! Policy-driven listener wrapping.
//!
//! A wrapped listener routes its own failures through the [`ErrorPolicy`]
//! before the dispatcher sees them: under `Log` and `Silent` the error becomes
//! the listener's (failed) value, under `Throw` it keeps propagating. The
//! wrapper records the listener it was built from as its origin, which is
//! also how repeated wrapping is detected.

use futures::{FutureExt, TryFutureExt};
use std::sync::Arc;

use crate::listener::{Fault, Listener, Output};
use crate::logger::Logger;
use crate::options::{ErrorPolicy, WrapPolicy};

/// Applies an [`ErrorPolicy`] to listener faults.
#[derive(Clone)]
pub(crate) struct Router {
    policy: ErrorPolicy,
    logger: Arc<dyn Logger>,
}

impl Router {
    pub(crate) fn new(policy: ErrorPolicy, logger: Arc<dyn Logger>) -> Self {
        Self { policy, logger }
    }

    /// Raised faults come back `Handled` unless the policy is `Throw`.
    pub(crate) fn route(&self, fault: Fault) -> Fault {
        let Fault::Raised(error) = fault else {
            return fault;
        };
        match self.policy {
            ErrorPolicy::Log => {
                self.logger.error(&error);
                Fault::Handled(error)
            }
            ErrorPolicy::Silent => Fault::Handled(error),
            ErrorPolicy::Throw => Fault::Raised(error),
        }
    }
}

/// Wraps `listener` according to `policy`, or returns it unchanged.
pub(crate) fn wrap<A, R>(
    listener: Listener<A, R>,
    policy: &WrapPolicy,
    router: &Router,
) -> Listener<A, R>
where
    A: 'static,
    R: Send + 'static,
{
    if listener.origin().is_some() || !policy.should_wrap(listener.is_async()) {
        return listener;
    }

    let original = listener.clone();
    let router = router.clone();
    let is_async = listener.is_async();

    Listener::from_output(
        move |args| match original.invoke(args) {
            Output::Ready(result) => Output::Ready(result.map_err(|fault| router.route(fault))),
            Output::Pending(future) => {
                let router = router.clone();
                Output::Pending(future.map_err(move |fault| router.route(fault)).boxed())
            }
        },
        is_async,
        Some(listener),
    )
}
