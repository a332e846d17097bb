//! Step-through dispatch.
//!
//! [`Fire`] calls one listener per `next()` and reports what happened without
//! awaiting anything. [`fire_async_listeners`] awaits each listener before
//! yielding its outcome. Both stop calling listeners as soon as they are
//! dropped.

use async_stream::stream;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt, TryFutureExt};
use std::fmt;
use std::sync::Arc;

use crate::listener::{Fault, Listener, Output};

/// Outcome of one synchronous step.
pub enum Fired<A, R> {
    Success {
        listener: Listener<A, R>,
        result: R,
    },
    Error {
        listener: Listener<A, R>,
        error: anyhow::Error,
    },
    /// The listener returned a future; it is handed over unawaited.
    Async {
        listener: Listener<A, R>,
        future: BoxFuture<'static, anyhow::Result<R>>,
    },
}

impl<A, R> Fired<A, R> {
    pub fn listener(&self) -> &Listener<A, R> {
        match self {
            Fired::Success { listener, .. }
            | Fired::Error { listener, .. }
            | Fired::Async { listener, .. } => listener,
        }
    }
}

impl<A, R: fmt::Debug> fmt::Debug for Fired<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fired::Success { listener, result } => f
                .debug_struct("Success")
                .field("listener", listener)
                .field("result", result)
                .finish(),
            Fired::Error { listener, error } => f
                .debug_struct("Error")
                .field("listener", listener)
                .field("error", error)
                .finish(),
            Fired::Async { listener, .. } => f
                .debug_struct("Async")
                .field("listener", listener)
                .finish_non_exhaustive(),
        }
    }
}

/// Outcome of one awaited step.
#[derive(Debug)]
pub enum Settled<A, R> {
    Success { listener: Listener<A, R>, value: R },
    Error { listener: Listener<A, R>, error: anyhow::Error },
}

impl<A, R> Settled<A, R> {
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, Settled::Success { .. })
    }

    pub fn into_result(self) -> anyhow::Result<R> {
        match self {
            Settled::Success { value, .. } => Ok(value),
            Settled::Error { error, .. } => Err(error),
        }
    }
}

/// Lazy iterator over a fixed listener sequence.
pub struct Fire<A, R> {
    listeners: Arc<[Listener<A, R>]>,
    args: A,
    index: usize,
}

impl<A: 'static, R: Send + 'static> Iterator for Fire<A, R> {
    type Item = Fired<A, R>;

    fn next(&mut self) -> Option<Self::Item> {
        let listener = self.listeners.get(self.index)?.clone();
        self.index += 1;
        Some(match listener.invoke(&self.args) {
            Output::Ready(Ok(result)) => Fired::Success { listener, result },
            Output::Ready(Err(fault)) => Fired::Error {
                listener,
                error: fault.into_error(),
            },
            Output::Pending(future) => Fired::Async {
                listener,
                future: future.map_err(Fault::into_error).boxed(),
            },
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.listeners.len() - self.index;
        (remaining, Some(remaining))
    }
}

impl<A: 'static, R: Send + 'static> ExactSizeIterator for Fire<A, R> {}

/// Steps through `listeners` with `args`, one call per `next()`.
pub fn fire_listeners<A, R>(listeners: impl Into<Arc<[Listener<A, R>]>>, args: A) -> Fire<A, R> {
    Fire {
        listeners: listeners.into(),
        args,
        index: 0,
    }
}

/// Calls `listeners` one by one, awaiting each before yielding its outcome.
pub fn fire_async_listeners<A, R>(
    listeners: impl Into<Arc<[Listener<A, R>]>>,
    args: A,
) -> BoxStream<'static, Settled<A, R>>
where
    A: Send + Sync + 'static,
    R: Send + 'static,
{
    let listeners = listeners.into();
    stream! {
        for index in 0..listeners.len() {
            let listener = listeners[index].clone();
            let result = match listener.invoke(&args) {
                Output::Ready(result) => result,
                Output::Pending(future) => future.await,
            };
            yield match result {
                Ok(value) => Settled::Success { listener, value },
                Err(fault) => Settled::Error { listener, error: fault.into_error() },
            };
        }
    }
    .boxed()
}
