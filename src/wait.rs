//! # Waiting for a single event.
//!
//! [`WaitFor`] resolves with a clone of the next matching payload, or with a
//! [`WaitError`] if something else settles it first:
//!
//! ```text
//!            ┌── event ───────► Ok(args)
//! wait_for ──┼── deadline ────► Err(Timeout)
//!            ├── signal ──────► Err(Aborted)
//!            ├── cancel() ────► Err(Cancelled)
//!            └── removed ─────► Err(Closed)
//! ```
//!
//! Whichever comes first wins. A fired signal disables the registration at
//! once, even before the future is polled again. The registration is removed
//! as soon as the future completes or is dropped.

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, ready};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::emitter::Emitter;
use crate::error::WaitError;
use crate::event::{Key, Payload};
use crate::handle::{ScopedSubscription, Subscription};
use crate::listener::{Limit, Listener, Predicate, limit};

/// Options for [`Emitter::wait_for`].
pub struct WaitOptions<A> {
    /// Give up after this long; `None` waits indefinitely.
    pub timeout: Option<Duration>,
    pub prepend: bool,
    pub signal: Option<CancellationToken>,
    /// Only payloads accepted by the filter settle the wait.
    pub filter: Option<Predicate<A>>,
}

impl<A> Default for WaitOptions<A> {
    fn default() -> Self {
        Self {
            timeout: None,
            prepend: false,
            signal: None,
            filter: None,
        }
    }
}

impl<A> Clone for WaitOptions<A> {
    fn clone(&self) -> Self {
        Self {
            timeout: self.timeout,
            prepend: self.prepend,
            signal: self.signal.clone(),
            filter: self.filter.clone(),
        }
    }
}

impl<A> fmt::Debug for WaitOptions<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitOptions")
            .field("timeout", &self.timeout)
            .field("prepend", &self.prepend)
            .field("signal", &self.signal)
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

impl<A> WaitOptions<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn prepend(mut self) -> Self {
        self.prepend = true;
        self
    }

    pub fn with_signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&A) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }
}

/// Future returned by [`Emitter::wait_for`].
#[must_use = "a wait does nothing unless polled, and dropping it removes its listener"]
pub struct WaitFor<A> {
    future: BoxFuture<'static, Result<A, WaitError>>,
    cancel: CancellationToken,
    registration: Option<ScopedSubscription>,
}

impl<A> WaitFor<A> {
    /// Settles the wait with [`WaitError::Cancelled`] unless it already settled.
    pub fn cancel(&self) {
        self.canceller().cancel();
    }

    /// A detached handle that can cancel this wait from elsewhere.
    pub fn canceller(&self) -> WaitCanceller {
        WaitCanceller {
            token: self.cancel.clone(),
            subscription: self
                .registration
                .as_ref()
                .map(|registration| registration.subscription().clone())
                .unwrap_or_default(),
        }
    }
}

impl<A> Future for WaitFor<A> {
    type Output = Result<A, WaitError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let output = ready!(this.future.as_mut().poll(cx));
        this.registration.take();
        Poll::Ready(output)
    }
}

impl<A> fmt::Debug for WaitFor<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitFor")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("registered", &self.registration.is_some())
            .finish()
    }
}

/// Cancels a [`WaitFor`] from outside the task awaiting it.
#[derive(Clone, Debug)]
pub struct WaitCanceller {
    token: CancellationToken,
    subscription: Subscription,
}

impl WaitCanceller {
    pub fn cancel(&self) {
        self.token.cancel();
        self.subscription.unsubscribe();
    }
}

pub(crate) fn wait_for<K, A, R>(
    emitter: &Emitter<K, A, R>,
    key: K,
    label: String,
    options: WaitOptions<A>,
) -> WaitFor<A>
where
    K: Key,
    A: Payload + Clone,
    R: Default + Send + 'static,
{
    let cancel = CancellationToken::new();
    let WaitOptions {
        timeout,
        prepend,
        signal,
        filter,
    } = options;

    if signal.as_ref().is_some_and(|signal| signal.is_cancelled()) {
        return WaitFor {
            future: future::ready(Err(WaitError::Aborted { label })).boxed(),
            cancel,
            registration: None,
        };
    }

    let deadline = timeout.map(|timeout| Instant::now() + timeout);
    let (tx, rx) = oneshot::channel::<A>();
    let sender = Mutex::new(Some(tx));
    let capture = Listener::sync(move |args: &A| {
        if let Some(tx) = sender.lock().ok().and_then(|mut slot| slot.take()) {
            tx.send(args.clone()).ok();
        }
        Ok(R::default())
    });

    let gate = signal.clone();
    let accept: Predicate<A> = Arc::new(move |args: &A| {
        !gate.as_ref().is_some_and(CancellationToken::is_cancelled)
            && filter.as_ref().is_none_or(|filter| filter(args))
    });
    let removed = CancellationToken::new();
    let limits = Limit {
        prepend,
        predicate: Some(accept),
        signal: signal.clone(),
        removed: Some(removed.clone()),
    };
    let subscription = limit(emitter, key, capture, 1, limits);
    tracing::trace!(%label, ?timeout, "waiting for event");

    let token = cancel.clone();
    let future = async move {
        let aborted = async {
            match &signal {
                Some(signal) => signal.cancelled().await,
                None => future::pending().await,
            }
        };
        let expired = async {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => future::pending().await,
            }
        };

        tokio::select! {
            biased;
            received = rx => match received {
                Ok(args) => Ok(args),
                Err(_) if token.is_cancelled() => Err(WaitError::Cancelled { label }),
                Err(_) => Err(WaitError::Closed { label }),
            },
            _ = token.cancelled() => Err(WaitError::Cancelled { label }),
            _ = aborted => Err(WaitError::Aborted { label }),
            _ = removed.cancelled() => Err(WaitError::Closed { label }),
            _ = expired => Err(WaitError::Timeout {
                label,
                timeout: timeout.unwrap_or_default(),
            }),
        }
    }
    .boxed();

    WaitFor {
        future,
        cancel,
        registration: Some(subscription.scoped()),
    }
}
