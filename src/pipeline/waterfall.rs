use std::fmt;
use std::sync::Arc;

use crate::event::Key;
use crate::handle::Subscription;
use crate::options::{OnOptions, Options};
use crate::pipeline::{Flow, Step, run_waterfall};
use crate::registry::Registry;

/// Keyed registry of waterfall steps.
///
/// Steps run in registration order on every [`Waterfall::waterfall`] call,
/// each deciding whether the chain continues. Only the logger, the
/// max-listener threshold and the pre-allocated events of [`Options`] apply;
/// steps are never wrapped.
pub struct Waterfall<K, A, R = A> {
    registry: Arc<Registry<K, Step<A, R>>>,
}

impl<K, A, R> Clone for Waterfall<K, A, R> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<K: Key, A: 'static, R: 'static> Default for Waterfall<K, A, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Key, A: 'static, R: 'static> fmt::Debug for Waterfall<K, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Waterfall")
            .field("events", &self.event_names())
            .field("max_listeners", &self.registry.max_listeners())
            .finish()
    }
}

impl<K, A, R> Waterfall<K, A, R>
where
    K: Key,
    A: 'static,
    R: 'static,
{
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    pub fn with_options(options: Options<K>) -> Self {
        let registry = Registry::new(options.max_listeners, options.logger);
        registry.preallocate(options.events);
        Self {
            registry: Arc::new(registry),
        }
    }

    #[inline]
    pub fn max_listeners(&self) -> usize {
        self.registry.max_listeners()
    }

    #[inline]
    pub fn set_max_listeners(&self, max: usize) {
        self.registry.set_max_listeners(max);
    }

    pub fn on(&self, key: K, step: Step<A, R>) -> Subscription {
        self.on_with(key, step, OnOptions::new())
    }

    pub fn on_front(&self, key: K, step: Step<A, R>) -> Subscription {
        self.on_with(key, step, OnOptions::new().prepend())
    }

    pub fn on_with(&self, key: K, step: Step<A, R>, options: OnOptions) -> Subscription {
        self.registry.register(key, step, options)
    }

    pub fn off(&self, key: &K, step: &Step<A, R>) -> bool {
        self.registry.unregister(key, step)
    }

    pub fn clear(&self, key: Option<&K>) {
        self.registry.clear(key);
    }

    pub fn count(&self, key: &K) -> usize {
        self.registry.count(key)
    }

    pub fn listeners(&self, key: &K) -> Vec<Step<A, R>> {
        self.registry.listeners(key)
    }

    pub fn event_names(&self) -> Vec<K> {
        self.registry.keys()
    }

    /// Runs the steps of `key`, ending in `terminal` unless one interrupts.
    pub fn waterfall_with<F>(&self, key: &K, args: A, terminal: F) -> Flow<R>
    where
        F: FnOnce(A) -> R,
    {
        match self.registry.snapshot(key) {
            Some(steps) => run_waterfall(&steps, args, terminal),
            None => run_waterfall(&[], args, terminal),
        }
    }
}

impl<K, A, R> Waterfall<K, A, R>
where
    K: Key,
    A: 'static,
    R: Default + 'static,
{
    /// Runs the steps of `key`; reaching the end yields `R::default()`.
    pub fn waterfall(&self, key: &K, args: A) -> Flow<R> {
        self.waterfall_with(key, args, |_| R::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Next;
    use std::sync::Mutex;

    fn add(n: i32) -> Step<i32, i32> {
        Step::new(move |v, next: Next<'_, i32, i32>| next.call(v + n))
    }

    #[test]
    fn waterfall_follows_registration_order() {
        let pipeline = Waterfall::<&str, i32>::new();
        pipeline.on("calc", add(1));
        pipeline.on("calc", Step::new(|v, next| next.call(v * 2)));
        assert_eq!(pipeline.waterfall_with(&"calc", 5, |v| v - 3), Flow { ok: true, value: 9 });

        pipeline.on_front("calc", add(10));
        assert_eq!(pipeline.waterfall_with(&"calc", 5, |v| v), Flow { ok: true, value: 32 });
    }

    #[test]
    fn interruption_skips_terminal() {
        let pipeline = Waterfall::<&str, i32>::new();
        pipeline.on("calc", add(1));
        pipeline.on("calc", Step::new(|v, _| v * 2));
        let flow = pipeline.waterfall_with(&"calc", 5, |_| panic!("terminal must not run"));
        assert_eq!(flow, Flow { ok: false, value: 12 });
    }

    #[test]
    fn unknown_key_runs_terminal_only() {
        let pipeline = Waterfall::<&str, i32>::new();
        assert_eq!(pipeline.waterfall(&"nothing", 5), Flow { ok: true, value: 0 });
        assert_eq!(pipeline.waterfall_with(&"nothing", 5, |v| v), Flow { ok: true, value: 5 });
    }

    #[test]
    fn off_and_subscription_remove_steps() {
        let pipeline = Waterfall::<&str, i32>::new();
        let first = add(1);
        pipeline.on("calc", first.clone());
        let second = pipeline.on("calc", add(2));
        assert_eq!(pipeline.count(&"calc"), 2);

        assert!(pipeline.off(&"calc", &first));
        assert!(!pipeline.off(&"calc", &first));
        assert!(second.unsubscribe());
        assert!(pipeline.event_names().is_empty());
    }

    #[test]
    fn step_can_register_during_run_without_affecting_it() {
        let pipeline = Waterfall::<&str, i32>::new();
        let calls = std::sync::Arc::new(Mutex::new(0));
        let registrar = {
            let pipeline = pipeline.clone();
            let calls = calls.clone();
            Step::new(move |v, next: Next<'_, i32, i32>| {
                *calls.lock().unwrap() += 1;
                pipeline.on("calc", add(100));
                next.call(v)
            })
        };
        pipeline.on("calc", registrar);

        assert_eq!(pipeline.waterfall_with(&"calc", 1, |v| v).value, 1);
        assert_eq!(pipeline.count(&"calc"), 2);
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn fired_signal_drops_step_before_next_run() {
        let pipeline = Waterfall::<&str, i32>::new();
        let signal = tokio_util::sync::CancellationToken::new();
        pipeline.on_with("calc", add(1), OnOptions::new().with_signal(signal.clone()));
        pipeline.on("calc", add(2));

        signal.cancel();
        assert_eq!(pipeline.waterfall_with(&"calc", 5, |v| v), Flow { ok: true, value: 7 });
        assert_eq!(pipeline.count(&"calc"), 1);
    }
}
