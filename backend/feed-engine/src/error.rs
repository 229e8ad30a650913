//! Error types for the feed engine.

use crate::models::ContentType;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by storage adapters.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Backing store could not serve the request
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Store call exceeded its deadline
    #[error("Store timeout: {0}")]
    Timeout(String),

    /// Write conflicted with existing state
    #[error("Store conflict: {0}")]
    Conflict(String),
}

/// Errors surfaced by engine components.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A content family's adapter call failed
    #[error("Content store unavailable for {content_type}: {source}")]
    StoreUnavailable {
        content_type: ContentType,
        #[source]
        source: StoreError,
    },

    /// Subscription or behavior store failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Malformed subscription filter
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(Uuid),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl EngineError {
    pub fn store(content_type: ContentType, source: StoreError) -> Self {
        EngineError::StoreUnavailable {
            content_type,
            source,
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

pub type Result<T> = std::result::Result<T, EngineError>;
