//! Product model

use serde::{Deserialize, Serialize};

/// Product entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    /// Base price, used when no size overrides it
    pub price: f64,
    /// Product must resolve a size before any quantity operation
    #[serde(default)]
    pub has_size: bool,
    /// Available sizes (empty unless `has_size`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sizes: Vec<SizeInfo>,
    /// Product must resolve a variation payload before any quantity operation
    #[serde(default)]
    pub has_variation: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl Product {
    /// Effective unit price for a selected size, falling back to base price
    pub fn unit_price(&self, size: Option<&SizeInfo>) -> f64 {
        size.and_then(|s| s.price).unwrap_or(self.price)
    }
}

/// Size selection (e.g. small/medium/large draft)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeInfo {
    pub id: String,
    pub name: String,
    /// Price override for this size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_name: Option<String>,
}

/// Variation payload (e.g. half-and-half composition)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariationInfo {
    pub id: String,
    pub name: String,
    /// Components of a composed variation, if any
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_modifier: Option<f64>,
}
