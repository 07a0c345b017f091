//! Circulation backend contract.
//!
//! The station actor only needs two backend calls. Implementations borrow a
//! pooled connection per call and must bound every call with a timeout, so
//! a slow backend stalls the calling station and nobody else.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::message::Item;

/// Result of a backend transaction or lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemResult {
    pub barcode: String,
    /// Display title
    pub title: String,
    pub unknown: bool,
    pub transaction_failed: bool,
}

impl From<ItemResult> for Item {
    fn from(r: ItemResult) -> Self {
        Item {
            barcode: r.barcode,
            title: r.title,
            unknown: r.unknown,
            transaction_failed: r.transaction_failed,
        }
    }
}

/// Backend call failure. The message is forwarded verbatim to the UI.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct CallError {
    pub message: String,
}

impl CallError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Circulation backend adapter.
#[async_trait]
pub trait Circulation: Send + Sync {
    /// Check an item in at the given branch.
    async fn checkin(&self, branch: &str, barcode: &str) -> Result<ItemResult, CallError>;

    /// Look up an item without changing its status.
    async fn item_status(&self, barcode: &str) -> Result<ItemResult, CallError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_result_into_item() {
        let item: Item = ItemResult {
            barcode: "A1".to_string(),
            title: "Dune".to_string(),
            unknown: false,
            transaction_failed: true,
        }
        .into();
        assert_eq!(item.barcode, "A1");
        assert_eq!(item.title, "Dune");
        assert!(item.transaction_failed);
    }

    #[test]
    fn test_call_error_display_is_verbatim() {
        let err = CallError::new("SIP login failed");
        assert_eq!(err.to_string(), "SIP login failed");
    }
}
