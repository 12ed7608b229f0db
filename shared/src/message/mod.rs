//! Push-channel message types
//!
//! These types are shared between the backend push channels (socket and
//! stream) and the clients. Messages are content-free change notifications:
//! receivers must always refetch the canonical sale, never trust any state
//! embedded in a message.

use serde::{Deserialize, Serialize};

/// Reference to a sale carried by a change notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRef {
    pub id: String,
}

/// Push message as sent over both the socket and the stream channel
///
/// Wire shape: `{"type":"sale:update","payload":{"id":"<saleId>"}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum PushMessage {
    #[serde(rename = "sale:update")]
    SaleUpdate(SaleRef),
}

impl PushMessage {
    pub fn sale_update(id: impl Into<String>) -> Self {
        PushMessage::SaleUpdate(SaleRef { id: id.into() })
    }

    /// Sale id the notification refers to
    pub fn sale_id(&self) -> &str {
        match self {
            PushMessage::SaleUpdate(sale) => &sale.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let msg = PushMessage::sale_update("sale-42");
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"sale:update","payload":{"id":"sale-42"}}"#);
    }

    #[test]
    fn test_decode_wire_shape() {
        let msg: PushMessage =
            serde_json::from_str(r#"{"type":"sale:update","payload":{"id":"s1"}}"#).unwrap();
        assert_eq!(msg.sale_id(), "s1");
    }
}
