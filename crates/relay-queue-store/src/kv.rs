//! Key-value backend trait.

use crate::StoreResult;

/// Durable named byte entries.
///
/// `set` must be all-or-nothing: after a crash a reader sees either the
/// previous value or the new one, never a mix.
pub trait KeyValueStore: Send + Sync {
    /// Retrieve a value
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Replace a value
    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()>;
}
