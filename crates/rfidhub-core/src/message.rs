//! UI protocol messages.
//!
//! Every frame exchanged with the browser is a single JSON object:
//!
//! ```json
//! {"action": "CHECKIN", "branch": "hutl", "item": {"barcode": "03011234", "title": "..",
//!  "unknown": false, "transactionFailed": false}, "rfidError": true, "errorMessage": ".."}
//! ```
//!
//! Only `action` is mandatory. Absent optionals and `false` error flags are
//! omitted when serializing.

use serde::{Deserialize, Serialize};

/// Action carried by a UI message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    /// Device link status (emitted by the hub only)
    #[serde(rename = "CONNECT")]
    Connect,
    #[serde(rename = "CHECKIN")]
    Checkin,
    #[serde(rename = "CHECKOUT")]
    Checkout,
    /// End the current scan batch
    #[serde(rename = "END")]
    End,
    /// Backend item lookup without touching the device
    #[serde(rename = "ITEM-INFO")]
    ItemInfo,
    /// Program a tag with an item barcode
    #[serde(rename = "WRITE")]
    Write,
    #[serde(rename = "RETRY-ALARM-ON")]
    RetryAlarmOn,
    #[serde(rename = "RETRY-ALARM-OFF")]
    RetryAlarmOff,
}

impl Action {
    /// Wire name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Connect => "CONNECT",
            Action::Checkin => "CHECKIN",
            Action::Checkout => "CHECKOUT",
            Action::End => "END",
            Action::ItemInfo => "ITEM-INFO",
            Action::Write => "WRITE",
            Action::RetryAlarmOn => "RETRY-ALARM-ON",
            Action::RetryAlarmOff => "RETRY-ALARM-OFF",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Item as shown in the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Item {
    pub barcode: String,
    pub title: String,
    /// The backend does not know this barcode
    pub unknown: bool,
    /// The backend rejected the transaction
    pub transaction_failed: bool,
}

/// Message exchanged with the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<Item>,
    /// Failure on the device side
    #[serde(default, skip_serializing_if = "is_false")]
    pub rfid_error: bool,
    /// Failure on the circulation backend side
    #[serde(default, skip_serializing_if = "is_false")]
    pub sip_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Message {
    /// Create a bare message for an action.
    pub fn new(action: Action) -> Self {
        Self {
            action,
            branch: None,
            item: None,
            rfid_error: false,
            sip_error: false,
            error_message: None,
        }
    }

    /// Device-side failure report.
    pub fn rfid_error(action: Action, error_message: impl Into<String>) -> Self {
        Self {
            rfid_error: true,
            error_message: Some(error_message.into()),
            ..Self::new(action)
        }
    }

    /// Backend-side failure report.
    pub fn sip_error(action: Action, error_message: impl Into<String>) -> Self {
        Self {
            sip_error: true,
            error_message: Some(error_message.into()),
            ..Self::new(action)
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_item(mut self, item: Item) -> Self {
        self.item = Some(item);
        self
    }

    /// Barcode of the attached item, if any.
    pub fn barcode(&self) -> Option<&str> {
        self.item.as_ref().map(|i| i.barcode.as_str())
    }

    /// Whether the message reports any failure.
    pub fn is_error(&self) -> bool {
        self.rfid_error || self.sip_error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_message_serialization() {
        let json = serde_json::to_string(&Message::new(Action::Connect)).unwrap();
        assert_eq!(json, r#"{"action":"CONNECT"}"#);
    }

    #[test]
    fn test_error_message_serialization() {
        let msg = Message::rfid_error(Action::Connect, "connection refused");
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(
            json,
            r#"{"action":"CONNECT","rfidError":true,"errorMessage":"connection refused"}"#
        );
    }

    #[test]
    fn test_item_uses_camel_case() {
        let msg = Message::new(Action::Checkin).with_item(Item {
            barcode: "A1".to_string(),
            title: "Title".to_string(),
            unknown: false,
            transaction_failed: true,
        });
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["item"]["transactionFailed"], true);
        assert_eq!(value["item"]["unknown"], false);
        assert!(value.get("branch").is_none());
    }

    #[test]
    fn test_deserialize_ui_actions() {
        let msg: Message =
            serde_json::from_str(r#"{"action":"RETRY-ALARM-ON","item":{"barcode":"A1"}}"#)
                .unwrap();
        assert_eq!(msg.action, Action::RetryAlarmOn);
        assert_eq!(msg.barcode(), Some("A1"));
        assert!(!msg.is_error());

        let msg: Message =
            serde_json::from_str(r#"{"action":"CHECKIN","branch":"hutl"}"#).unwrap();
        assert_eq!(msg.action, Action::Checkin);
        assert_eq!(msg.branch.as_deref(), Some("hutl"));
    }

    #[test]
    fn test_unknown_action_rejected() {
        assert!(serde_json::from_str::<Message>(r#"{"action":"DANCE"}"#).is_err());
        assert!(serde_json::from_str::<Message>(r#"{"branch":"x"}"#).is_err());
    }

    #[test]
    fn test_action_display_matches_wire_name() {
        for action in [Action::ItemInfo, Action::RetryAlarmOff, Action::Write] {
            let json = serde_json::to_string(&action).unwrap();
            assert_eq!(json, format!("\"{}\"", action));
        }
    }
}
