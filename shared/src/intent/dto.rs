//! Request DTOs sent to the sale mutation endpoints

use serde::{Deserialize, Serialize};

use crate::models::{SizeInfo, VariationInfo};

fn default_qty() -> i32 {
    1
}

/// POST /sale/{id}/items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddItemInput {
    pub product_id: String,
    #[serde(default = "default_qty")]
    pub quantity: i32,
    /// Required for has-size products, mutually exclusive with `variation`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<SizeInfo>,
    /// Required for has-variation products
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variation: Option<VariationInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl AddItemInput {
    pub fn new(product_id: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            quantity: 1,
            size: None,
            variation: None,
            note: None,
        }
    }

    pub fn with_quantity(mut self, quantity: i32) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_size(mut self, size: SizeInfo) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_variation(mut self, variation: VariationInfo) -> Self {
        self.variation = Some(variation);
        self
    }
}

/// PATCH /sale/{id}/items/{productId}
///
/// Quantity is always absolute, never a delta. `item_id` disambiguates when
/// the same product appears as multiple distinct line items; it is required
/// in that case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetQuantityInput {
    pub quantity: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
}

/// POST /sale/{id}/payments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInput {
    pub method: String,
    pub amount: f64,
    /// Cash handed over; change is computed by the backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tendered: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl PaymentInput {
    pub fn new(method: impl Into<String>, amount: f64) -> Self {
        Self {
            method: method.into(),
            amount,
            tendered: None,
            note: None,
        }
    }
}

/// POST /sale/{id}/finalize
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeInput {
    pub payment_method: String,
}

/// POST /table/{id}/open
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenTableInput {
    /// Responsible party, required to occupy a table
    pub responsible: String,
    #[serde(default = "default_qty")]
    pub guest_count: i32,
}
