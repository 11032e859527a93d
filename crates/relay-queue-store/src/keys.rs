//! Storage key constants.

/// Storage keys used by the relay
pub struct StorageKeys;

impl StorageKeys {
    /// Pending reports queue (JSON array of queue items)
    pub const PENDING_REPORTS: &'static str = "@offline_reports";
}
