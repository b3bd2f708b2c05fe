//! RemoteStore: the user-document resource the sync engine persists to.
//!
//! The engine only ever talks to the `RemoteStore` trait. Failures are
//! classified here, at the transport boundary, so retry policy upstream is a
//! match on [`ErrorClass`] and never a look at message text.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::remote::{CreateAck, CreateRecord, RemoteRecord, UpdateRecord};

pub mod http;
#[cfg(test)]
pub(crate) mod testing;

/// How a store failure should be treated by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Worth retrying: network failure, 5xx, rate limiting, referential race.
    Transient,
    /// Retrying will not help: validation errors, malformed payloads.
    Permanent,
    /// No authenticated user on the other side.
    Unauthorized,
    NotFound,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Store error (status {status}): {message}")]
    Api {
        status: u16,
        message: String,
        class: ErrorClass,
    },

    #[error("Malformed store response: {0}")]
    Malformed(String),
}

impl StoreError {
    pub fn class(&self) -> ErrorClass {
        match self {
            // Anything that failed on the wire (connect, timeout, reset) is transient.
            // A body that could not be decoded is not.
            StoreError::Http(e) if e.is_decode() => ErrorClass::Permanent,
            StoreError::Http(_) => ErrorClass::Transient,
            StoreError::Api { class, .. } => *class,
            StoreError::Malformed(_) => ErrorClass::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

/// Maps an HTTP status code to an error class.
///
/// 409 is how the store reports a write that raced the creation of the user
/// row it references; it resolves on its own, so it is transient.
pub fn classify_status(status: u16) -> ErrorClass {
    match status {
        401 | 403 => ErrorClass::Unauthorized,
        404 => ErrorClass::NotFound,
        409 | 429 => ErrorClass::Transient,
        500..=599 => ErrorClass::Transient,
        _ => ErrorClass::Permanent,
    }
}

/// The remote user-document resource.
///
/// Carried by the engine as `Arc<dyn RemoteStore>` so tests can substitute a
/// scripted store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Returns the most recently updated record for the current user, if any.
    async fn fetch_latest(&self) -> Result<Option<RemoteRecord>, StoreError>;

    /// Creates a new record. The acknowledgement may lack an id.
    async fn create(&self, record: CreateRecord<'_>) -> Result<CreateAck, StoreError>;

    /// Replaces the content of an existing record.
    async fn update(&self, record: UpdateRecord<'_>) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(401), ErrorClass::Unauthorized);
        assert_eq!(classify_status(403), ErrorClass::Unauthorized);
        assert_eq!(classify_status(404), ErrorClass::NotFound);
        assert_eq!(classify_status(409), ErrorClass::Transient);
        assert_eq!(classify_status(429), ErrorClass::Transient);
        assert_eq!(classify_status(503), ErrorClass::Transient);
        assert_eq!(classify_status(400), ErrorClass::Permanent);
        assert_eq!(classify_status(422), ErrorClass::Permanent);
    }

    #[test]
    fn test_api_error_carries_its_class() {
        let err = StoreError::Api {
            status: 502,
            message: "Bad gateway".to_string(),
            class: classify_status(502),
        };
        assert!(err.is_transient());
        assert!(!StoreError::Malformed("no id".to_string()).is_transient());
    }
}
