//! # Per-key listener storage.
//!
//! Each key maps to an immutable `Arc<[E]>`. Every mutation builds a new
//! slice and swaps it in atomically, so a dispatch that cloned the `Arc`
//! keeps iterating over the exact sequence it started with, whatever
//! listeners do to the registry meanwhile.
//!
//! ```text
//! register ──┐                          ┌──► emit / fire (snapshot: Arc clone)
//! unregister ┼──► compute(key) ──► Arc<[E]>
//! clear ─────┘   (copy-on-write)        └──► listeners() (Vec copy)
//! ```

use crossbeam_utils::CachePadded;
use papaya::Operation;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

use crate::event::Key;
use crate::handle::Subscription;
use crate::logger::Logger;
use crate::options::OnOptions;
use crate::task;

/// Something the registry can store and later find again.
pub(crate) trait Entry: Clone + Send + Sync + 'static {
    /// Non-owning identity handle kept by subscriptions.
    type Weak: Send + Sync + 'static;

    fn downgrade(&self) -> Self::Weak;

    /// Identity comparison against a downgraded handle.
    fn is(&self, weak: &Self::Weak) -> bool;

    /// Identity or origin comparison, used by `off`.
    fn matches(&self, target: &Self) -> bool;

    /// Ties the entry to `signal`; once it fires the entry counts as removed.
    fn bind(self, signal: CancellationToken) -> Self;

    fn is_expired(&self) -> bool;

    /// Called once the registry has dropped the entry.
    fn retire(&self) {}
}

pub(crate) struct Registry<K, E> {
    slots: papaya::HashMap<K, Arc<[E]>>,
    max_listeners: CachePadded<AtomicUsize>,
    logger: Arc<dyn Logger>,
}

impl<K: Key, E: Entry> Registry<K, E> {
    pub(crate) fn new(max_listeners: usize, logger: Arc<dyn Logger>) -> Self {
        Self {
            slots: papaya::HashMap::new(),
            max_listeners: CachePadded::new(AtomicUsize::new(max_listeners)),
            logger,
        }
    }

    /// Creates empty slots; existing slots are left untouched.
    pub(crate) fn preallocate(&self, keys: impl IntoIterator<Item = K>) {
        let slots = self.slots.pin();
        for key in keys {
            slots.get_or_insert_with(key, || Arc::from(Vec::new()));
        }
    }

    #[inline]
    pub(crate) fn logger(&self) -> &Arc<dyn Logger> {
        &self.logger
    }

    #[inline]
    pub(crate) fn max_listeners(&self) -> usize {
        self.max_listeners.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_max_listeners(&self, max: usize) {
        self.max_listeners.store(max, Ordering::Relaxed);
    }

    /// Registers `entry` and returns the handle that removes exactly it.
    pub(crate) fn register(self: &Arc<Self>, key: K, entry: E, options: OnOptions) -> Subscription {
        if options.signal.as_ref().is_some_and(|signal| signal.is_cancelled()) {
            return Subscription::inert();
        }

        let entry = match &options.signal {
            Some(signal) => entry.bind(signal.clone()),
            None => entry,
        };
        let identity = entry.downgrade();
        let len = self.insert(key.clone(), entry, options.prepend);
        let max = self.max_listeners();
        if len > max {
            self.logger.warn(&format!(
                "max listeners exceeded (possible leak): \
                 {key:?} has {len} listeners, limit is {max}"
            ));
        }
        tracing::trace!(?key, len, prepend = options.prepend, "listener registered");

        let registry = Arc::downgrade(self);
        let subscription = Subscription::new(move || {
            registry
                .upgrade()
                .is_some_and(|registry| registry.remove_entry(&key, &identity))
        });

        if let Some(signal) = options.signal {
            task::unsubscribe_on(signal, subscription.clone(), &self.logger);
        }
        subscription
    }

    /// Copy-on-write insert; returns the new sequence length.
    fn insert(&self, key: K, entry: E, prepend: bool) -> usize {
        let mut len = 0;
        self.slots.pin().compute(key, |slot| {
            let prev: &[E] = slot.map(|(_, list)| &list[..]).unwrap_or(&[]);
            let mut next = Vec::with_capacity(prev.len() + 1);
            if prepend {
                next.push(entry.clone());
                next.extend_from_slice(prev);
            } else {
                next.extend_from_slice(prev);
                next.push(entry.clone());
            }
            len = next.len();
            Operation::Insert::<_, ()>(Arc::from(next))
        });
        len
    }

    /// Removes the first entry matching `target` by identity or origin.
    pub(crate) fn unregister(&self, key: &K, target: &E) -> bool {
        self.remove_first(key, |entry| entry.matches(target))
    }

    /// Removes the first entry that is exactly `identity`.
    pub(crate) fn remove_entry(&self, key: &K, identity: &E::Weak) -> bool {
        self.remove_first(key, |entry| entry.is(identity))
    }

    fn remove_first(&self, key: &K, predicate: impl Fn(&E) -> bool) -> bool {
        let mut removed = None;
        self.slots.pin().compute(key.clone(), |slot| {
            removed = None;
            let Some((_, list)) = slot else {
                return Operation::Abort(());
            };
            let Some(index) = list.iter().position(&predicate) else {
                return Operation::Abort(());
            };
            removed = Some(list[index].clone());
            if list.len() == 1 {
                return Operation::Remove;
            }
            let next: Vec<E> = list
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != index)
                .map(|(_, entry)| entry.clone())
                .collect();
            Operation::Insert(Arc::from(next))
        });
        let Some(entry) = removed else {
            return false;
        };
        entry.retire();
        tracing::trace!(?key, "listener removed");
        true
    }

    /// Drops every entry of `key` whose signal already fired.
    fn prune(&self, key: &K) {
        let mut expired = Vec::new();
        self.slots.pin().compute(key.clone(), |slot| {
            expired.clear();
            let Some((_, list)) = slot else {
                return Operation::Abort(());
            };
            let (gone, kept): (Vec<E>, Vec<E>) = list.iter().cloned().partition(E::is_expired);
            if gone.is_empty() {
                return Operation::Abort(());
            }
            expired = gone;
            if kept.is_empty() {
                Operation::Remove
            } else {
                Operation::Insert(Arc::from(kept))
            }
        });
        for entry in &expired {
            entry.retire();
        }
        if !expired.is_empty() {
            tracing::trace!(?key, expired = expired.len(), "aborted listeners pruned");
        }
    }

    /// Drops one key's sequence, or every sequence when `key` is `None`.
    pub(crate) fn clear(&self, key: Option<&K>) {
        let keys = match key {
            Some(key) => vec![key.clone()],
            None => self.slots.pin().keys().cloned().collect(),
        };
        let slots = self.slots.pin();
        for key in keys {
            if let Some(list) = slots.remove(&key) {
                list.iter().for_each(E::retire);
            }
        }
    }

    /// The live sequence, for read-only use within one dispatch.
    ///
    /// Entries whose signal fired are removed first, so they are never
    /// handed to a dispatch started after the signal.
    pub(crate) fn snapshot(&self, key: &K) -> Option<Arc<[E]>> {
        let list = self.slots.pin().get(key).cloned()?;
        if !list.iter().any(E::is_expired) {
            return Some(list);
        }
        self.prune(key);
        let list = self.slots.pin().get(key).cloned()?;
        if list.iter().any(E::is_expired) {
            // Bound to a signal that fired after the prune.
            return Some(list.iter().filter(|entry| !entry.is_expired()).cloned().collect());
        }
        Some(list)
    }

    pub(crate) fn listeners(&self, key: &K) -> Vec<E> {
        self.snapshot(key).map(|list| list.to_vec()).unwrap_or_default()
    }

    pub(crate) fn count(&self, key: &K) -> usize {
        self.snapshot(key).map_or(0, |list| list.len())
    }

    /// Keys currently holding at least one live entry.
    pub(crate) fn keys(&self) -> Vec<K> {
        self.slots
            .pin()
            .iter()
            .filter(|(_, list)| list.iter().any(|entry| !entry.is_expired()))
            .map(|(key, _)| key.clone())
            .collect()
    }
}
