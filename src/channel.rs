use futures::future::BoxFuture;
use futures::stream::BoxStream;

use crate::emitter::Emitter;
use crate::error::Error;
use crate::event::Payload;
use crate::fire::{Fire, Settled};
use crate::handle::Subscription;
use crate::listener::{Listener, When};
use crate::options::{OnOptions, Options};
use crate::wait::{self, WaitFor, WaitOptions};

/// An [`Emitter`] with a single implicit event.
pub struct Channel<A, R = ()> {
    emitter: Emitter<(), A, R>,
}

impl<A, R> Clone for Channel<A, R> {
    fn clone(&self) -> Self {
        Self {
            emitter: self.emitter.clone(),
        }
    }
}

impl<A: Payload, R: Send + 'static> Default for Channel<A, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Payload, R: Send + 'static> std::fmt::Debug for Channel<A, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("listeners", &self.count())
            .field("max_listeners", &self.max_listeners())
            .finish()
    }
}

impl<A, R> Channel<A, R>
where
    A: Payload,
    R: Send + 'static,
{
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    /// `options.events` is ignored.
    pub fn with_options(options: Options<()>) -> Self {
        Self {
            emitter: Emitter::with_options(options.with_events([])),
        }
    }

    #[inline]
    pub fn max_listeners(&self) -> usize {
        self.emitter.max_listeners()
    }

    #[inline]
    pub fn set_max_listeners(&self, max: usize) {
        self.emitter.set_max_listeners(max);
    }

    pub fn wrap(&self, listener: Listener<A, R>) -> Listener<A, R> {
        self.emitter.wrap(listener)
    }

    pub fn on(&self, listener: Listener<A, R>) -> Subscription {
        self.emitter.on((), listener)
    }

    pub fn on_front(&self, listener: Listener<A, R>) -> Subscription {
        self.emitter.on_front((), listener)
    }

    pub fn on_with(&self, listener: Listener<A, R>, options: OnOptions) -> Subscription {
        self.emitter.on_with((), listener, options)
    }

    pub fn off(&self, listener: &Listener<A, R>) -> bool {
        self.emitter.off(&(), listener)
    }

    pub fn clear(&self) {
        self.emitter.clear(None);
    }

    pub fn count(&self) -> usize {
        self.emitter.count(&())
    }

    pub fn listeners(&self) -> Vec<Listener<A, R>> {
        self.emitter.listeners(&())
    }

    pub fn emit(&self, args: A) -> Result<usize, Error> {
        self.emitter.emit(&(), args)
    }

    pub fn emit_collect(
        &self,
        args: A,
    ) -> BoxFuture<'static, Result<Vec<anyhow::Result<R>>, Error>> {
        self.emitter.emit_collect(&(), args)
    }

    pub fn fire(&self, args: A) -> Fire<A, R> {
        self.emitter.fire(&(), args)
    }

    pub fn fire_async(&self, args: A) -> BoxStream<'static, Settled<A, R>> {
        self.emitter.fire_async(&(), args)
    }
}

impl<A, R> Channel<A, R>
where
    A: Payload,
    R: Default + Send + 'static,
{
    pub fn once(&self, listener: Listener<A, R>) -> Subscription {
        self.emitter.once((), listener)
    }

    pub fn once_front(&self, listener: Listener<A, R>) -> Subscription {
        self.emitter.once_front((), listener)
    }

    /// # Panics
    /// Panics if `times` is zero.
    pub fn many(&self, times: usize, listener: Listener<A, R>) -> Subscription {
        self.emitter.many((), times, listener)
    }

    /// # Panics
    /// Panics if `times` is zero.
    pub fn many_front(&self, times: usize, listener: Listener<A, R>) -> Subscription {
        self.emitter.many_front((), times, listener)
    }

    pub fn when<P>(&self, predicate: P) -> When<(), A, R>
    where
        P: Fn(&A) -> bool + Send + Sync + 'static,
    {
        self.emitter.when((), predicate)
    }

    /// Like [`Emitter::wait_for`]; errors are labelled `channel`.
    pub fn wait_for(&self, options: WaitOptions<A>) -> WaitFor<A>
    where
        A: Clone,
    {
        wait::wait_for(&self.emitter, (), "channel".to_string(), options)
    }
}
