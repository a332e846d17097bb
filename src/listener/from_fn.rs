use futures::FutureExt;
use std::sync::Arc;

use crate::listener::{Call, Inner, Lifetime, Listener};

impl<A: 'static, R: Send + 'static> Listener<A, R> {
    /// A synchronous listener.
    #[inline]
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&A) -> anyhow::Result<R> + Send + Sync + 'static,
    {
        Self(Arc::new(Inner {
            call: Call::Ready(Box::new(f)),
            is_async: false,
            origin: None,
            lifetime: Lifetime::default(),
        }))
    }

    /// A natively asynchronous listener.
    ///
    /// The closure runs synchronously at dispatch time and must copy whatever
    /// it needs out of the borrowed arguments before returning its future.
    #[inline]
    pub fn future<F, Fut>(f: F) -> Self
    where
        F: Fn(&A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
    {
        Self(Arc::new(Inner {
            call: Call::Pending(Box::new(move |args| f(args).boxed())),
            is_async: true,
            origin: None,
            lifetime: Lifetime::default(),
        }))
    }

    /// A synchronous function that hands back a future.
    ///
    /// Behaves like [`Listener::future`] at dispatch time, but is not tagged as
    /// async, so it is only wrapped when `check_sync_returns_future` is set.
    #[inline]
    pub fn deferred<F, Fut>(f: F) -> Self
    where
        F: Fn(&A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
    {
        Self(Arc::new(Inner {
            call: Call::Pending(Box::new(move |args| f(args).boxed())),
            is_async: false,
            origin: None,
            lifetime: Lifetime::default(),
        }))
    }
}

/// Shorthand for [`Listener::sync`].
#[inline]
pub fn from_fn<A, R, F>(f: F) -> Listener<A, R>
where
    A: 'static,
    R: Send + 'static,
    F: Fn(&A) -> anyhow::Result<R> + Send + Sync + 'static,
{
    Listener::sync(f)
}

/// Shorthand for [`Listener::future`].
#[inline]
pub fn from_async_fn<A, R, F, Fut>(f: F) -> Listener<A, R>
where
    A: 'static,
    R: Send + 'static,
    F: Fn(&A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
{
    Listener::future(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::{Fault, Output};

    #[test]
    fn constructors_set_async_tag() {
        assert!(!Listener::<u8>::sync(|_| Ok(())).is_async());
        assert!(Listener::<u8>::future(|_| async { Ok(()) }).is_async());
        assert!(!Listener::<u8>::deferred(|_| async { Ok(()) }).is_async());
        assert!(from_async_fn(|_: &u8| async { Ok(()) }).is_async());
        assert!(from_fn(|_: &u8| Ok(())).origin().is_none());
    }

    #[tokio::test]
    async fn future_listener_returns_pending_output() {
        let double = Listener::<u32, u32>::future(|n| {
            let n = *n;
            async move { Ok(n * 2) }
        });
        match double.invoke(&21) {
            Output::Pending(future) => assert_eq!(future.await.ok(), Some(42)),
            Output::Ready(_) => panic!("expected a pending output"),
        }
    }

    #[tokio::test]
    async fn deferred_failure_is_raised() {
        let failing = Listener::<u32, u32>::deferred(|_| async { Err(anyhow::anyhow!("late")) });
        match failing.invoke(&0) {
            Output::Pending(future) => match future.await {
                Err(Fault::Raised(error)) => assert_eq!(error.to_string(), "late"),
                _ => panic!("expected a raised fault"),
            },
            Output::Ready(_) => panic!("expected a pending output"),
        }
    }
}
