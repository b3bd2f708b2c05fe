use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced by the explicit save path (`save_now`).
///
/// Scheduled saves never return these to a caller; they end up in
/// `save_error` and `save_status` instead.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Save failed: {0}")]
    Store(#[from] StoreError),

    #[error("Store acknowledged the create without a record id")]
    MissingRecordId,

    #[error("Sync session is closed")]
    Closed,
}

impl SyncError {
    /// Only store failures classified as transient are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::Store(e) if e.is_transient())
    }
}
