//! # Keyed event emitter.
//!
//! [`Emitter`] groups listeners by key and dispatches to them in registration
//! order. All dispatch strategies share one registry and one wrap policy:
//!
//! - [`Emitter::emit`]: call everything now, spawn returned futures.
//! - [`Emitter::emit_collect`]: call everything now, await all results together.
//! - [`Emitter::fire`] / [`Emitter::fire_async`]: step through listeners lazily.
//!
//! Limited registrations (`once`, `many`, `when`) and [`Emitter::wait_for`]
//! are built on the same registration path.

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use futures::stream::BoxStream;
use std::fmt;
use std::sync::Arc;

use crate::error::Error;
use crate::event::{Key, Payload};
use crate::fire::{self, Fire, Settled};
use crate::handle::Subscription;
use crate::listener::wrap::{self, Router};
use crate::listener::{Fault, Limit, Listener, Output, When, limit};
use crate::options::{OnOptions, Options, WrapPolicy};
use crate::registry::Registry;
use crate::task;
use crate::wait::{self, WaitFor, WaitOptions};

struct Inner<K, A, R> {
    registry: Arc<Registry<K, Listener<A, R>>>,
    policy: WrapPolicy,
    router: Router,
}

/// Keyed publish/subscribe hub.
///
/// `K` names events, `A` is the payload handed to every listener by
/// reference and `R` is what listeners return. Clones share the same
/// listeners.
pub struct Emitter<K, A, R = ()> {
    inner: Arc<Inner<K, A, R>>,
}

impl<K, A, R> Clone for Emitter<K, A, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: Key, A: Payload, R: Send + 'static> Default for Emitter<K, A, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Key, A: Payload, R: Send + 'static> fmt::Debug for Emitter<K, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("events", &self.event_names())
            .field("max_listeners", &self.max_listeners())
            .field("policy", &self.inner.policy)
            .finish()
    }
}

impl<K, A, R> Emitter<K, A, R>
where
    K: Key,
    A: Payload,
    R: Send + 'static,
{
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    pub fn with_options(options: Options<K>) -> Self {
        let policy = options.wrap_policy();
        let registry = Registry::new(options.max_listeners, options.logger.clone());
        registry.preallocate(options.events);
        tracing::debug!(
            max_listeners = options.max_listeners,
            error_policy = %policy.error_policy,
            "emitter created"
        );
        Self {
            inner: Arc::new(Inner {
                registry: Arc::new(registry),
                policy,
                router: Router::new(policy.error_policy, options.logger),
            }),
        }
    }

    #[inline]
    pub fn max_listeners(&self) -> usize {
        self.inner.registry.max_listeners()
    }

    /// Adjusts the per-key warning threshold. Existing listeners are kept.
    #[inline]
    pub fn set_max_listeners(&self, max: usize) {
        self.inner.registry.set_max_listeners(max);
    }

    /// Applies this emitter's wrap policy to `listener`.
    ///
    /// Useful when building lists for [`fire_listeners`](crate::fire_listeners).
    pub fn wrap(&self, listener: Listener<A, R>) -> Listener<A, R> {
        wrap::wrap(listener, &self.inner.policy, &self.inner.router)
    }

    /// Registers an already prepared listener, bypassing the wrapper.
    pub(crate) fn attach(
        &self,
        key: K,
        listener: Listener<A, R>,
        options: OnOptions,
    ) -> Subscription {
        self.inner.registry.register(key, listener, options)
    }

    pub fn on(&self, key: K, listener: Listener<A, R>) -> Subscription {
        self.on_with(key, listener, OnOptions::new())
    }

    /// Like [`Emitter::on`], but the listener runs before every existing one.
    pub fn on_front(&self, key: K, listener: Listener<A, R>) -> Subscription {
        self.on_with(key, listener, OnOptions::new().prepend())
    }

    pub fn on_with(&self, key: K, listener: Listener<A, R>, options: OnOptions) -> Subscription {
        let listener = self.wrap(listener);
        self.attach(key, listener, options)
    }

    /// Removes the first listener that is `listener` or was derived from it.
    ///
    /// Returns `false` if nothing matched.
    pub fn off(&self, key: &K, listener: &Listener<A, R>) -> bool {
        self.inner.registry.unregister(key, listener)
    }

    /// Removes the listeners of `key`, or of every key when `None`.
    pub fn clear(&self, key: Option<&K>) {
        self.inner.registry.clear(key);
    }

    pub fn count(&self, key: &K) -> usize {
        self.inner.registry.count(key)
    }

    /// A copy of the current listener sequence for `key`.
    pub fn listeners(&self, key: &K) -> Vec<Listener<A, R>> {
        self.inner.registry.listeners(key)
    }

    /// Keys with at least one listener.
    pub fn event_names(&self) -> Vec<K> {
        self.inner.registry.keys()
    }

    fn snapshot(&self, key: &K) -> Arc<[Listener<A, R>]> {
        self.inner
            .registry
            .snapshot(key)
            .unwrap_or_else(|| Arc::from(Vec::new()))
    }

    /// Calls every listener of `key` in order and returns how many there were.
    ///
    /// Returned futures are spawned on the current tokio runtime. A failing
    /// listener never stops the ones after it; under
    /// [`ErrorPolicy::Throw`](crate::ErrorPolicy::Throw) the first failure is
    /// returned once all listeners ran.
    pub fn emit(&self, key: &K, args: A) -> Result<usize, Error> {
        let listeners = self.snapshot(key);
        let logger = self.inner.registry.logger();
        let mut raised = None;

        for listener in listeners.iter() {
            match listener.invoke(&args) {
                Output::Ready(Ok(_)) | Output::Ready(Err(Fault::Handled(_))) => {}
                Output::Ready(Err(fault)) => {
                    if let Fault::Raised(error) = self.inner.router.route(fault) {
                        if raised.is_none() {
                            raised = Some(error);
                        } else {
                            tracing::debug!(?key, "further listener failure: {error:#}");
                        }
                    }
                }
                Output::Pending(future) => task::detach(future, logger),
            }
        }

        match raised {
            Some(error) => Err(Error::Listener(error)),
            None => Ok(listeners.len()),
        }
    }

    /// Calls every listener of `key` now and resolves once all results are in.
    ///
    /// Results keep registration order. Failures the error policy handled are
    /// `Err` entries; a failure still raised after routing (or from an
    /// unwrapped future) fails the whole call, but only once every listener
    /// future has settled.
    pub fn emit_collect(
        &self,
        key: &K,
        args: A,
    ) -> BoxFuture<'static, Result<Vec<anyhow::Result<R>>, Error>> {
        let listeners = self.snapshot(key);
        let outputs: Vec<_> = listeners
            .iter()
            .map(|listener| match listener.invoke(&args) {
                Output::Ready(result) => {
                    let result = result.map_err(|fault| self.inner.router.route(fault));
                    future::ready(settle(result)).boxed()
                }
                Output::Pending(future) => future.map(settle).boxed(),
            })
            .collect();

        future::join_all(outputs)
            .map(|settled| settled.into_iter().collect::<Result<Vec<_>, _>>())
            .boxed()
    }

    /// Steps through the listeners of `key` one call at a time.
    pub fn fire(&self, key: &K, args: A) -> Fire<A, R> {
        fire::fire_listeners(self.snapshot(key), args)
    }

    /// Like [`Emitter::fire`], awaiting each listener before yielding it.
    pub fn fire_async(&self, key: &K, args: A) -> BoxStream<'static, Settled<A, R>> {
        fire::fire_async_listeners(self.snapshot(key), args)
    }
}

impl<K, A, R> Emitter<K, A, R>
where
    K: Key,
    A: Payload,
    R: Default + Send + 'static,
{
    /// Registers `listener` for a single call.
    pub fn once(&self, key: K, listener: Listener<A, R>) -> Subscription {
        limit(self, key, listener, 1, Limit::placed(false))
    }

    pub fn once_front(&self, key: K, listener: Listener<A, R>) -> Subscription {
        limit(self, key, listener, 1, Limit::placed(true))
    }

    /// Registers `listener` for at most `times` calls.
    ///
    /// # Panics
    /// Panics if `times` is zero.
    pub fn many(&self, key: K, times: usize, listener: Listener<A, R>) -> Subscription {
        limit(self, key, listener, times, Limit::placed(false))
    }

    /// # Panics
    /// Panics if `times` is zero.
    pub fn many_front(&self, key: K, times: usize, listener: Listener<A, R>) -> Subscription {
        limit(self, key, listener, times, Limit::placed(true))
    }

    /// Limited registrations on `key` that only count calls accepted by `predicate`.
    pub fn when<P>(&self, key: K, predicate: P) -> When<K, A, R>
    where
        P: Fn(&A) -> bool + Send + Sync + 'static,
    {
        When::new(self.clone(), key, Arc::new(predicate))
    }

    /// Resolves with the arguments of the next matching dispatch of `key`.
    ///
    /// Dropping the returned future removes its registration.
    pub fn wait_for(&self, key: K, options: WaitOptions<A>) -> WaitFor<A>
    where
        A: Clone,
    {
        let label = format!("{key:?}");
        wait::wait_for(self, key, label, options)
    }
}

fn settle<R>(result: Result<R, Fault>) -> Result<anyhow::Result<R>, Error> {
    match result {
        Ok(value) => Ok(Ok(value)),
        Err(Fault::Handled(error)) => Ok(Err(error)),
        Err(Fault::Raised(error)) => Err(Error::Listener(error)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::testing::Recorder;
    use crate::options::ErrorPolicy;
    use futures::StreamExt;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Log = Arc<Mutex<Vec<String>>>;

    fn push(log: &Log, tag: &'static str) -> Listener<&'static str> {
        let log = log.clone();
        Listener::sync(move |_| {
            log.lock().unwrap().push(tag.to_string());
            Ok(())
        })
    }

    fn with_recorder(policy: ErrorPolicy) -> (Emitter<&'static str, &'static str>, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let options = Options::new()
            .with_shared_logger(recorder.clone())
            .with_error_policy(policy);
        (Emitter::with_options(options), recorder)
    }

    #[test]
    fn emit_without_listeners_returns_zero() {
        let emitter = Emitter::<&str, u8>::new();
        assert_eq!(emitter.emit(&"nothing", 1).unwrap(), 0);
    }

    #[test]
    fn emit_runs_in_registration_order() {
        let emitter = Emitter::<&str, &str>::new();
        let log = Log::default();
        emitter.on("x", push(&log, "A"));
        emitter.on("x", push(&log, "B"));
        emitter.on_front("x", push(&log, "C"));

        assert_eq!(emitter.emit(&"x", "go").unwrap(), 3);
        assert_eq!(*log.lock().unwrap(), vec!["C", "A", "B"]);
    }

    #[test]
    fn removal_during_emit_does_not_affect_current_dispatch() {
        let emitter = Emitter::<&str, &str>::new();
        let log = Log::default();
        let b = push(&log, "B");
        let remover = {
            let emitter = emitter.clone();
            let b = b.clone();
            let log = log.clone();
            Listener::sync(move |_| {
                log.lock().unwrap().push("A".into());
                emitter.off(&"x", &b);
                Ok(())
            })
        };
        emitter.on("x", remover);
        emitter.on("x", b);

        assert_eq!(emitter.emit(&"x", "first").unwrap(), 2);
        assert_eq!(*log.lock().unwrap(), vec!["A", "B"]);
        assert_eq!(emitter.count(&"x"), 1);
    }

    #[test]
    fn log_policy_keeps_going_and_logs() {
        let (emitter, recorder) = with_recorder(ErrorPolicy::Log);
        let log = Log::default();
        emitter.on("x", Listener::sync(|_| anyhow::bail!("first")));
        emitter.on("x", push(&log, "after"));

        assert_eq!(emitter.emit(&"x", "go").unwrap(), 2);
        assert_eq!(*log.lock().unwrap(), vec!["after"]);
        assert_eq!(recorder.errors(), vec!["first".to_string()]);
    }

    #[test]
    fn throw_policy_returns_first_failure_after_all_listeners() {
        let (emitter, recorder) = with_recorder(ErrorPolicy::Throw);
        let log = Log::default();
        emitter.on("x", Listener::sync(|_| anyhow::bail!("first")));
        emitter.on("x", Listener::sync(|_| anyhow::bail!("second")));
        emitter.on("x", push(&log, "after"));

        let err = emitter.emit(&"x", "go").unwrap_err();
        assert_eq!(err.into_inner().to_string(), "first");
        assert_eq!(*log.lock().unwrap(), vec!["after"]);
        assert!(recorder.errors().is_empty());
    }

    #[test]
    fn silent_policy_swallows() {
        let (emitter, recorder) = with_recorder(ErrorPolicy::Silent);
        emitter.on("x", Listener::sync(|_| anyhow::bail!("quiet")));
        assert_eq!(emitter.emit(&"x", "go").unwrap(), 1);
        assert!(recorder.errors().is_empty());
    }

    #[tokio::test]
    async fn emit_spawns_futures_and_logs_their_failures() {
        let (emitter, recorder) = with_recorder(ErrorPolicy::Log);
        let done = Arc::new(AtomicUsize::new(0));
        let probe = done.clone();
        emitter.on(
            "x",
            Listener::future(move |_| {
                let probe = probe.clone();
                async move {
                    probe.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        );
        emitter.on("x", Listener::future(|_| async { Err(anyhow::anyhow!("rejected")) }));

        assert_eq!(emitter.emit(&"x", "go").unwrap(), 2);
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.errors(), vec!["rejected".to_string()]);
    }

    #[tokio::test]
    async fn emit_collect_keeps_order_and_handled_errors() {
        let options = Options::new().with_logger(Recorder::default());
        let emitter = Emitter::<&str, u32, u32>::with_options(options);
        emitter.on("n", Listener::sync(|n| Ok(n + 1)));
        emitter.on(
            "n",
            Listener::future(|n| {
                let n = *n;
                async move { Ok(n * 10) }
            }),
        );
        emitter.on("n", Listener::future(|_| async { Err(anyhow::anyhow!("handled")) }));

        let results = emitter.emit_collect(&"n", 4).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap(), &5);
        assert_eq!(results[1].as_ref().unwrap(), &40);
        assert_eq!(results[2].as_ref().unwrap_err().to_string(), "handled");
    }

    #[tokio::test]
    async fn emit_collect_invokes_before_awaiting() {
        let emitter = Emitter::<&str, u8>::new();
        let calls = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let calls = calls.clone();
            emitter.on(
                "x",
                Listener::future(move |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok(()) }
                }),
            );
        }
        let pending = emitter.emit_collect(&"x", 0);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(pending.await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn emit_collect_rejects_on_unwrapped_future_failure() {
        let emitter = Emitter::<&str, u8>::with_options(
            Options::new()
                .with_logger(Recorder::default())
                .with_catch_future_errors(false),
        );
        emitter.on("x", Listener::sync(|_| Ok(())));
        emitter.on("x", Listener::future(|_| async { Err(anyhow::anyhow!("escaped")) }));

        let err = emitter.emit_collect(&"x", 0).await.unwrap_err();
        assert_eq!(err.to_string(), "listener failed: escaped");
    }

    #[test]
    fn off_accepts_original_of_wrapped_listener() {
        let emitter = Emitter::<&str, u8>::new();
        let listener = Listener::future(|_| async { Ok(()) });
        emitter.on("x", listener.clone());
        let stored = emitter.listeners(&"x");
        assert!(!stored[0].ptr_eq(&listener));
        assert!(stored[0].origin().is_some_and(|o| o.ptr_eq(&listener)));
        assert!(emitter.off(&"x", &listener));
        assert!(!emitter.off(&"x", &listener));
        assert!(emitter.event_names().is_empty());
    }

    #[test]
    fn same_listener_twice_is_removed_one_at_a_time() {
        let emitter = Emitter::<&str, u8>::new();
        let listener = Listener::sync(|_| Ok(()));
        emitter.on("x", listener.clone());
        emitter.on("x", listener.clone());
        assert!(emitter.off(&"x", &listener));
        assert_eq!(emitter.count(&"x"), 1);
    }

    #[test]
    fn exceeding_max_listeners_warns_and_is_adjustable() {
        let recorder = Arc::new(Recorder::default());
        let emitter = Emitter::<&str, u8>::with_options(
            Options::new()
                .with_shared_logger(recorder.clone())
                .with_max_listeners(1),
        );
        emitter.on("x", Listener::sync(|_| Ok(())));
        emitter.on("x", Listener::sync(|_| Ok(())));
        assert_eq!(recorder.warnings().len(), 1);

        emitter.set_max_listeners(5);
        assert_eq!(emitter.max_listeners(), 5);
        emitter.on("x", Listener::sync(|_| Ok(())));
        assert_eq!(recorder.warnings().len(), 1);
        assert_eq!(emitter.count(&"x"), 3);
    }

    #[test]
    fn preallocated_events_are_not_listed() {
        let emitter = Emitter::<&str, u8>::with_options(Options::new().with_events(["a", "b"]));
        assert!(emitter.event_names().is_empty());
        emitter.on("b", Listener::sync(|_| Ok(())));
        assert_eq!(emitter.event_names(), vec!["b"]);
    }

    #[tokio::test]
    async fn signal_removes_listener() {
        let emitter = Emitter::<&str, u8>::new();
        let signal = tokio_util::sync::CancellationToken::new();
        emitter.on_with(
            "x",
            Listener::sync(|_| Ok(())),
            OnOptions::new().with_signal(signal.clone()),
        );
        assert_eq!(emitter.count(&"x"), 1);
        signal.cancel();
        tokio::task::yield_now().await;
        assert_eq!(emitter.count(&"x"), 0);
    }

    #[test]
    fn fired_signal_skips_listener_before_cleanup_task_runs() {
        let (emitter, _) = with_recorder(ErrorPolicy::Log);
        let log = Log::default();
        let signal = tokio_util::sync::CancellationToken::new();
        let listener = push(&log, "L");
        emitter.on_with("x", listener.clone(), OnOptions::new().with_signal(signal.clone()));
        emitter.on("x", push(&log, "kept"));

        signal.cancel();
        assert_eq!(emitter.emit(&"x", "go").unwrap(), 1);
        assert_eq!(*log.lock().unwrap(), vec!["kept"]);
        assert_eq!(emitter.count(&"x"), 1);
        assert!(!emitter.off(&"x", &listener));
    }

    #[tokio::test(start_paused = true)]
    async fn emit_collect_failure_waits_for_slow_siblings() {
        let (emitter, _) = with_recorder(ErrorPolicy::Throw);
        let done = Arc::new(AtomicUsize::new(0));
        let tally = done.clone();
        emitter.on(
            "x",
            Listener::future(move |_| {
                let tally = tally.clone();
                async move {
                    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                    tally.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        );
        emitter.on("x", Listener::future(|_| async { Err(anyhow::anyhow!("fast")) }));

        let err = emitter.emit_collect(&"x", "go").await.unwrap_err();
        assert_eq!(err.into_inner().to_string(), "fast");
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn once_and_many() {
        let emitter = Emitter::<&str, &str>::new();
        let log = Log::default();
        emitter.once("x", push(&log, "once"));
        emitter.many("x", 2, push(&log, "many"));
        emitter.once_front("x", push(&log, "front"));

        for _ in 0..3 {
            emitter.emit(&"x", "go").unwrap();
        }
        assert_eq!(*log.lock().unwrap(), vec!["front", "once", "many", "many"]);
        assert_eq!(emitter.count(&"x"), 0);
    }

    #[tokio::test]
    async fn fire_async_settles_each_listener() {
        let options = Options::new().with_logger(Recorder::default());
        let emitter = Emitter::<&str, u8, u8>::with_options(options);
        emitter.on("x", Listener::sync(|n| Ok(n + 1)));
        emitter.on("x", Listener::future(|_| async { Err(anyhow::anyhow!("late")) }));

        let settled: Vec<_> = emitter.fire_async(&"x", 1).collect().await;
        assert!(matches!(settled[0], Settled::Success { value: 2, .. }));
        assert!(matches!(settled[1], Settled::Error { .. }));
    }
}
