use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;

use crate::emitter::Emitter;
use crate::event::{Key, Payload};
use crate::handle::Subscription;
use crate::listener::{Lifetime, Listener, Output, Predicate};
use crate::options::OnOptions;

/// Placement and gating of a limited registration.
pub(crate) struct Limit<A> {
    pub(crate) prepend: bool,
    /// Only invocations accepted here count.
    pub(crate) predicate: Option<Predicate<A>>,
    pub(crate) signal: Option<CancellationToken>,
    /// Cancelled when the registry drops the entry, whatever the cause.
    pub(crate) removed: Option<CancellationToken>,
}

impl<A> Limit<A> {
    pub(crate) fn placed(prepend: bool) -> Self {
        Self {
            prepend,
            predicate: None,
            signal: None,
            removed: None,
        }
    }
}

/// Remaining invocations of a limited registration.
#[derive(Debug)]
pub(crate) struct Countdown {
    remaining: CachePadded<AtomicUsize>,
}

impl Countdown {
    pub(crate) fn new(times: usize) -> Self {
        assert!(times > 0, "times must be greater than zero, got {times}");
        Self {
            remaining: CachePadded::new(AtomicUsize::new(times)),
        }
    }

    /// Takes one unit. `Some(true)` means it was the last one.
    #[inline]
    pub(crate) fn claim(&self) -> Option<bool> {
        self.remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .ok()
            .map(|prev| prev == 1)
    }

    #[inline]
    pub(crate) fn is_exhausted(&self) -> bool {
        self.remaining.load(Ordering::Acquire) == 0
    }
}

/// Registers `listener` under `key` for at most `times` accepted invocations.
///
/// Invocations rejected by the predicate do not count and yield `R::default()`.
/// The registration removes itself right after the last accepted invocation,
/// and can be removed earlier through the returned handle or by passing the
/// original `listener` to `off`.
///
/// # Panics
/// Panics if `times` is zero.
pub(crate) fn limit<K, A, R>(
    emitter: &Emitter<K, A, R>,
    key: K,
    listener: Listener<A, R>,
    times: usize,
    limits: Limit<A>,
) -> Subscription
where
    K: Key,
    A: Payload,
    R: Default + Send + 'static,
{
    let Limit {
        prepend,
        predicate,
        signal,
        removed,
    } = limits;
    let countdown = Arc::new(Countdown::new(times));
    let slot: Arc<OnceLock<Subscription>> = Arc::new(OnceLock::new());
    let is_async = listener.is_async();
    let origin = listener.root().clone();
    let wrapped = emitter.wrap(listener);

    let handler = {
        let countdown = countdown.clone();
        let slot = slot.clone();
        Listener::scoped(
            move |args| {
                if predicate.as_ref().is_some_and(|accept| !accept(args)) {
                    return Output::Ready(Ok(R::default()));
                }
                let Some(last) = countdown.claim() else {
                    return Output::Ready(Ok(R::default()));
                };
                let output = wrapped.invoke(args);
                if last {
                    if let Some(subscription) = slot.get() {
                        subscription.unsubscribe();
                    }
                }
                output
            },
            is_async,
            Some(origin),
            Lifetime {
                signal: None,
                removed,
            },
        )
    };

    let subscription = slot
        .get_or_init(|| emitter.attach(key, handler, OnOptions { prepend, signal }))
        .clone();
    // Exhausted by a dispatch on another thread before the slot was filled.
    if countdown.is_exhausted() {
        subscription.unsubscribe();
    }
    subscription
}
