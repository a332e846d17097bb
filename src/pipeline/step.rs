use std::cell::Cell;
use std::fmt;
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;

use crate::registry::Entry;

type StepFn<A, R> = dyn for<'n> Fn(A, Next<'n, A, R>) -> R + Send + Sync;

/// One stage of a waterfall.
///
/// A step receives the current arguments and a [`Next`] continuation. Calling
/// [`Next::call`] hands (possibly new) arguments to the following step;
/// returning without calling it interrupts the chain, and the step's own
/// return value becomes the waterfall's value.
pub struct Step<A, R> {
    call: Arc<StepFn<A, R>>,
    signal: Option<CancellationToken>,
}

impl<A, R> Step<A, R> {
    pub fn new<F>(f: F) -> Self
    where
        F: for<'n> Fn(A, Next<'n, A, R>) -> R + Send + Sync + 'static,
    {
        Self {
            call: Arc::new(f),
            signal: None,
        }
    }

    #[inline]
    pub fn ptr_eq(&self, other: &Step<A, R>) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.call), Arc::as_ptr(&other.call))
    }
}

impl<A, R> Clone for Step<A, R> {
    fn clone(&self) -> Self {
        Self {
            call: Arc::clone(&self.call),
            signal: self.signal.clone(),
        }
    }
}

impl<A, R> fmt::Debug for Step<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("ptr", &Arc::as_ptr(&self.call).cast::<()>())
            .field("bound", &self.signal.is_some())
            .finish()
    }
}

impl<A: 'static, R: 'static> Entry for Step<A, R> {
    type Weak = Weak<StepFn<A, R>>;

    fn downgrade(&self) -> Self::Weak {
        Arc::downgrade(&self.call)
    }

    fn is(&self, weak: &Self::Weak) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.call), weak.as_ptr())
    }

    fn matches(&self, target: &Self) -> bool {
        self.ptr_eq(target)
    }

    fn bind(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }

    fn is_expired(&self) -> bool {
        self.signal.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}

/// Continuation handed to each [`Step`].
pub struct Next<'n, A, R> {
    rest: &'n [Step<A, R>],
    terminal: Box<dyn FnOnce(A) -> R + 'n>,
    interrupted: &'n Cell<bool>,
    called: &'n Cell<bool>,
}

impl<'n, A, R> Next<'n, A, R> {
    /// Runs the rest of the chain with `args` and returns its value.
    pub fn call(self, args: A) -> R {
        self.called.set(true);
        dispatch(self.rest, args, self.terminal, self.interrupted)
    }

    /// Steps left after the current one, not counting the terminal.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.rest.len()
    }
}

impl<A, R> fmt::Debug for Next<'_, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").field("remaining", &self.rest.len()).finish_non_exhaustive()
    }
}

pub(crate) fn dispatch<'a, A, R>(
    steps: &'a [Step<A, R>],
    args: A,
    terminal: Box<dyn FnOnce(A) -> R + 'a>,
    interrupted: &'a Cell<bool>,
) -> R {
    let Some((step, rest)) = steps.split_first() else {
        return terminal(args);
    };
    let called = Cell::new(false);
    let next = Next {
        rest,
        terminal,
        interrupted,
        called: &called,
    };
    let value = (step.call)(args, next);
    if !called.get() {
        interrupted.set(true);
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_follows_clones() {
        let a = Step::<u8, u8>::new(|v, next| next.call(v));
        let b = Step::<u8, u8>::new(|v, next| next.call(v));
        assert!(a.matches(&a.clone()));
        assert!(!a.matches(&b));
        assert!(a.is(&a.downgrade()));
        assert!(!b.is(&a.downgrade()));
    }

    #[test]
    fn dispatch_runs_suffix_then_terminal() {
        let seen = Cell::new(usize::MAX);
        let steps = [
            Step::<u8, u8>::new(|v, next| next.call(v)),
            Step::new(|v, next| next.call(v)),
        ];
        let interrupted = Cell::new(false);
        let value = dispatch(
            &steps[1..],
            3,
            Box::new(|v: u8| {
                seen.set(0);
                v
            }),
            &interrupted,
        );
        assert_eq!(value, 3);
        assert_eq!(seen.get(), 0);
        assert!(!interrupted.get());
    }
}
