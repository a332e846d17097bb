use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;

/// Removal handle returned by every registration.
///
/// Clones share state: whichever clone unsubscribes first removes the entry,
/// every later call is a no-op returning `false`.
#[derive(Clone, Default)]
pub struct Subscription(Option<Arc<Shared>>);

struct Shared {
    active: AtomicBool,
    /// Cancelled once the entry is gone, so signal watchers can exit.
    closed: CancellationToken,
    detach: Box<dyn Fn() -> bool + Send + Sync>,
}

impl Subscription {
    pub(crate) fn new<F>(detach: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Self(Some(Arc::new(Shared {
            active: AtomicBool::new(true),
            closed: CancellationToken::new(),
            detach: Box::new(detach),
        })))
    }

    /// A handle for a registration that never happened.
    #[inline]
    pub fn inert() -> Self {
        Self(None)
    }

    /// Removes the registered entry.
    ///
    /// Returns `true` only for the call that actually removed it.
    pub fn unsubscribe(&self) -> bool {
        let Some(shared) = &self.0 else {
            return false;
        };
        if !shared.active.swap(false, Ordering::AcqRel) {
            return false;
        }
        shared.closed.cancel();
        (shared.detach)()
    }

    /// False once unsubscribed through any clone, or for an inert handle.
    ///
    /// Removal by `off` or `clear` is not tracked here.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.0
            .as_ref()
            .is_some_and(|shared| shared.active.load(Ordering::Acquire))
    }

    /// Token cancelled when this handle unsubscribes.
    pub(crate) fn closed(&self) -> Option<CancellationToken> {
        self.0.as_ref().map(|shared| shared.closed.clone())
    }

    /// Turns the handle into a guard that unsubscribes on drop.
    #[inline]
    pub fn scoped(self) -> ScopedSubscription {
        ScopedSubscription(self)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// A [`Subscription`] that unsubscribes when dropped.
#[derive(Debug)]
pub struct ScopedSubscription(Subscription);

impl ScopedSubscription {
    /// Releases the guard without unsubscribing.
    pub fn into_inner(mut self) -> Subscription {
        std::mem::take(&mut self.0)
    }

    #[inline]
    pub fn subscription(&self) -> &Subscription {
        &self.0
    }

    pub fn unsubscribe(&self) -> bool {
        self.0.unsubscribe()
    }
}

impl Drop for ScopedSubscription {
    fn drop(&mut self) {
        self.0.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting() -> (Subscription, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let probe = calls.clone();
        let subscription = Subscription::new(move || {
            probe.fetch_add(1, Ordering::SeqCst);
            true
        });
        (subscription, calls)
    }

    #[test]
    fn unsubscribe_runs_detach_once_across_clones() {
        let (subscription, calls) = counting();
        let clone = subscription.clone();
        assert!(subscription.is_active());
        assert!(clone.unsubscribe());
        assert!(!subscription.unsubscribe());
        assert!(!clone.unsubscribe());
        assert!(!subscription.is_active());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_cancels_closed_token() {
        let (subscription, _) = counting();
        let closed = subscription.closed().unwrap();
        assert!(!closed.is_cancelled());
        subscription.unsubscribe();
        assert!(closed.is_cancelled());
    }

    #[test]
    fn inert_handle_does_nothing() {
        let subscription = Subscription::inert();
        assert!(!subscription.is_active());
        assert!(!subscription.unsubscribe());
        assert!(subscription.closed().is_none());
    }

    #[test]
    fn scoped_unsubscribes_on_drop() {
        let (subscription, calls) = counting();
        {
            let _guard = subscription.clone().scoped();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!subscription.is_active());
    }

    #[test]
    fn into_inner_keeps_registration() {
        let (subscription, calls) = counting();
        let released = subscription.scoped().into_inner();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(released.unsubscribe());
    }
}
