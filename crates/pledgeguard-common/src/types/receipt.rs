//! Write-surface result envelope

use serde::{Deserialize, Serialize};

/// `{ref, finalState}` returned by every successful write
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt<T> {
    /// Id of the record the write touched (campaign, request, node, ...)
    pub reference: String,
    /// Snapshot of that record after the write committed
    pub state: T,
}

impl<T> Receipt<T> {
    pub fn new(reference: impl Into<String>, state: T) -> Self {
        Self {
            reference: reference.into(),
            state,
        }
    }
}
