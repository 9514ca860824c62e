//! Concurrency primitives used to serialize bracket updates.
//!
//! Advancement reads a target match, fills a slot and writes it back. Two
//! results feeding the same node must not interleave that sequence, so every
//! write to a node happens under that node's entry in a [`KeyedMutex`].

pub mod keyed_mutex;

pub use keyed_mutex::{KeyedGuard, KeyedMutex, LockError};
