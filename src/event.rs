use std::fmt::Debug;
use std::hash::Hash;

/// Identifier under which listeners are grouped.
pub trait Key: Hash + Eq + Clone + Debug + Send + Sync + 'static {}

impl<T: Hash + Eq + Clone + Debug + Send + Sync + 'static> Key for T {}

/// Argument payload handed to every listener of one dispatch.
pub trait Payload: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Payload for T {}
