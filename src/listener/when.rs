use crate::emitter::Emitter;
use crate::event::{Key, Payload};
use crate::handle::Subscription;
use crate::listener::{Limit, Listener, Predicate, limit};

/// Limited registrations pre-bound to a key and a predicate.
///
/// Created by [`Emitter::when`]. Every call registers an independent entry
/// with its own countdown.
pub struct When<K, A, R = ()> {
    emitter: Emitter<K, A, R>,
    key: K,
    predicate: Predicate<A>,
}

impl<K, A, R> When<K, A, R>
where
    K: Key,
    A: Payload,
    R: Default + Send + 'static,
{
    pub(crate) fn new(emitter: Emitter<K, A, R>, key: K, predicate: Predicate<A>) -> Self {
        Self {
            emitter,
            key,
            predicate,
        }
    }

    fn limit(&self, listener: Listener<A, R>, times: usize, prepend: bool) -> Subscription {
        limit(
            &self.emitter,
            self.key.clone(),
            listener,
            times,
            Limit {
                predicate: Some(self.predicate.clone()),
                ..Limit::placed(prepend)
            },
        )
    }

    pub fn once(&self, listener: Listener<A, R>) -> Subscription {
        self.limit(listener, 1, false)
    }

    pub fn once_front(&self, listener: Listener<A, R>) -> Subscription {
        self.limit(listener, 1, true)
    }

    /// # Panics
    /// Panics if `times` is zero.
    pub fn many(&self, times: usize, listener: Listener<A, R>) -> Subscription {
        self.limit(listener, times, false)
    }

    /// # Panics
    /// Panics if `times` is zero.
    pub fn many_front(&self, times: usize, listener: Listener<A, R>) -> Subscription {
        self.limit(listener, times, true)
    }
}
