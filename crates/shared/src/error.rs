use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error body the server attaches to failed HTTP calls, e.g.
/// `{"detail": "Player not found"}` from a `/join-queue` with a stale id.
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
#[error("{detail}")]
pub struct ApiError {
    pub detail: String,
}

impl ApiError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}
