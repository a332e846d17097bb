mod from_fn;
mod when;
mod with_times;
pub(crate) mod wrap;

use futures::future::BoxFuture;
use futures::{FutureExt, TryFutureExt};
use std::fmt;
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;

use crate::registry::Entry;

pub use from_fn::*;
pub use when::When;
pub(crate) use with_times::{Limit, limit};

/// Predicate gating a limited registration or a wait.
pub type Predicate<A> = Arc<dyn Fn(&A) -> bool + Send + Sync>;

/// Future returned by asynchronous listeners.
pub type ListenerFuture<R> = BoxFuture<'static, anyhow::Result<R>>;

/// A listener failure, tagged with whether the error policy already saw it.
pub(crate) enum Fault {
    /// Routed through the policy; carried as the listener's value.
    Handled(anyhow::Error),
    /// Still propagating to the dispatcher.
    Raised(anyhow::Error),
}

impl Fault {
    pub(crate) fn into_error(self) -> anyhow::Error {
        match self {
            Fault::Handled(error) | Fault::Raised(error) => error,
        }
    }
}

/// What one invocation produced.
pub(crate) enum Output<R> {
    Ready(Result<R, Fault>),
    Pending(BoxFuture<'static, Result<R, Fault>>),
}

enum Call<A, R> {
    Ready(Box<dyn Fn(&A) -> anyhow::Result<R> + Send + Sync>),
    Pending(Box<dyn Fn(&A) -> ListenerFuture<R> + Send + Sync>),
    Output(Box<dyn Fn(&A) -> Output<R> + Send + Sync>),
}

/// Tokens scoping one registered entry.
#[derive(Clone, Default)]
pub(crate) struct Lifetime {
    /// The entry counts as removed once this fires.
    pub(crate) signal: Option<CancellationToken>,
    /// Cancelled when the registry drops the entry.
    pub(crate) removed: Option<CancellationToken>,
}

pub(crate) struct Inner<A, R> {
    call: Call<A, R>,
    is_async: bool,
    origin: Option<Listener<A, R>>,
    lifetime: Lifetime,
}

/// A registered callback with identity.
///
/// Cloning is cheap and preserves identity: [`Emitter::off`](crate::Emitter::off)
/// accepts any clone of the listener that was registered, or of the listener
/// it was wrapped from.
pub struct Listener<A, R = ()>(Arc<Inner<A, R>>);

impl<A, R> Clone for Listener<A, R> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<A, R> fmt::Debug for Listener<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("ptr", &Arc::as_ptr(&self.0))
            .field("is_async", &self.0.is_async)
            .field("wrapped", &self.0.origin.is_some())
            .finish()
    }
}

impl<A, R> Listener<A, R> {
    /// True when built with [`Listener::future`].
    #[inline]
    pub fn is_async(&self) -> bool {
        self.0.is_async
    }

    /// The listener this one was derived from, if it is a wrapper.
    #[inline]
    pub fn origin(&self) -> Option<&Listener<A, R>> {
        self.0.origin.as_ref()
    }

    /// The user-supplied listener at the bottom of any wrapping.
    #[inline]
    pub fn root(&self) -> &Listener<A, R> {
        self.origin().unwrap_or(self)
    }

    #[inline]
    pub fn ptr_eq(&self, other: &Listener<A, R>) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<A: 'static, R: Send + 'static> Listener<A, R> {
    pub(crate) fn from_output<F>(f: F, is_async: bool, origin: Option<Listener<A, R>>) -> Self
    where
        F: Fn(&A) -> Output<R> + Send + Sync + 'static,
    {
        Self::scoped(f, is_async, origin, Lifetime::default())
    }

    pub(crate) fn scoped<F>(
        f: F,
        is_async: bool,
        origin: Option<Listener<A, R>>,
        lifetime: Lifetime,
    ) -> Self
    where
        F: Fn(&A) -> Output<R> + Send + Sync + 'static,
    {
        Self(Arc::new(Inner {
            call: Call::Output(Box::new(f)),
            is_async,
            origin,
            lifetime,
        }))
    }

    pub(crate) fn invoke(&self, args: &A) -> Output<R> {
        match &self.0.call {
            Call::Ready(f) => Output::Ready(f(args).map_err(Fault::Raised)),
            Call::Pending(f) => Output::Pending(f(args).map_err(Fault::Raised).boxed()),
            Call::Output(f) => f(args),
        }
    }
}

impl<A, R> Entry for Listener<A, R>
where
    A: 'static,
    R: Send + 'static,
{
    type Weak = Weak<Inner<A, R>>;

    fn downgrade(&self) -> Self::Weak {
        Arc::downgrade(&self.0)
    }

    fn is(&self, weak: &Self::Weak) -> bool {
        std::ptr::eq(Arc::as_ptr(&self.0), weak.as_ptr())
    }

    fn matches(&self, target: &Self) -> bool {
        self.ptr_eq(target) || self.origin().is_some_and(|origin| origin.ptr_eq(target))
    }

    fn bind(self, signal: CancellationToken) -> Self {
        let lifetime = Lifetime {
            signal: Some(signal),
            removed: self.0.lifetime.removed.clone(),
        };
        let is_async = self.is_async();
        let origin = self.root().clone();
        Self::scoped(move |args| self.invoke(args), is_async, Some(origin), lifetime)
    }

    fn is_expired(&self) -> bool {
        self.0.lifetime.signal.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    fn retire(&self) {
        if let Some(removed) = &self.0.lifetime.removed {
            removed.cancel();
        }
    }
}
