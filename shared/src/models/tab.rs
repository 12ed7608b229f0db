//! Tab (comanda) model

use serde::{Deserialize, Serialize};

use super::sale::SaleStatus;

/// Named, table-independent running order
///
/// A tab shares the sale status machine; it is the named handle to a sale
/// with channel kind `Tab`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tab {
    pub id: String,
    /// Display name or number shown on kitchen/bar screens
    pub name: String,
    pub status: SaleStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<String>,
    /// Open sale currently attached to this tab
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale_id: Option<String>,
}

impl Tab {
    pub fn new(id: String, name: String) -> Self {
        Self {
            id,
            name,
            status: SaleStatus::Open,
            customer: None,
            sale_id: None,
        }
    }
}
