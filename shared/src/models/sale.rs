//! Sale model - the umbrella order entity
//!
//! A sale holds line items and totals for a counter sale, a table order,
//! a named tab or a delivery order. The backend recomputes totals on every
//! mutation; clients mirror the result and never trust their own arithmetic
//! as final.

use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};

use super::product::{SizeInfo, VariationInfo};
use crate::types::Timestamp;

/// Sale channel kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleChannel {
    #[default]
    Counter,
    Table,
    Tab,
    Delivery,
}

/// Sale status - Finalized and Canceled are terminal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleStatus {
    #[default]
    Open,
    Finalized,
    Canceled,
}

impl SaleStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SaleStatus::Finalized | SaleStatus::Canceled)
    }
}

/// Line item - one product entry in a sale
///
/// `id` is the line-item instance identity; the same product can appear as
/// multiple distinct line items with different sizes or variations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: String,
    pub product_id: String,
    /// Product name snapshot
    pub name: String,
    pub unit_price: f64,
    /// Integer quantity; 0 is never persisted (it means "removed")
    pub quantity: i32,
    /// unit_price * quantity, rounded by the backend
    pub subtotal: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<SizeInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variation: Option<VariationInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Partial payment record, append-only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub payment_id: String,
    pub method: String,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tendered: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub timestamp: Timestamp,
}

/// Sale entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    pub id: String,
    pub channel: SaleChannel,
    pub status: SaleStatus,
    pub items: Vec<LineItem>,
    pub subtotal: f64,
    #[serde(default)]
    pub discount: f64,
    pub total: f64,
    /// Chosen at finalize, null while open
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<String>,
    #[serde(default)]
    pub guest_count: i32,
    #[serde(default)]
    pub payments: Vec<PaymentRecord>,
    /// Assigned by the backend at finalize
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Sale {
    /// Create a new empty open sale
    pub fn new(id: String, channel: SaleChannel) -> Self {
        let now = crate::types::now_millis();
        Self {
            id,
            channel,
            status: SaleStatus::Open,
            items: Vec::new(),
            subtotal: 0.0,
            discount: 0.0,
            total: 0.0,
            payment_method: None,
            table_id: None,
            tab_id: None,
            guest_count: 1,
            payments: Vec::new(),
            receipt_number: None,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == SaleStatus::Open
    }

    /// Sum of registered payments
    pub fn paid_amount(&self) -> f64 {
        self.payments.iter().map(|p| p.amount).sum()
    }

    /// Remaining amount to pay, never negative
    pub fn remaining_balance(&self) -> f64 {
        (self.total - self.paid_amount()).max(0.0)
    }

    /// Find a line item by instance id
    pub fn find_item(&self, item_id: &str) -> Option<&LineItem> {
        self.items.iter().find(|i| i.id == item_id)
    }

    /// All line items carrying the given product id
    pub fn items_for_product(&self, product_id: &str) -> Vec<&LineItem> {
        self.items
            .iter()
            .filter(|i| i.product_id == product_id)
            .collect()
    }

    /// Recompute subtotal/total from line items
    ///
    /// `total = sum(item.subtotal) - discount`. Done in Decimal and rounded
    /// to 2 places. The backend runs this authoritatively on every mutation;
    /// the client mirror runs it only to derive display totals.
    pub fn recompute_totals(&mut self) {
        let mut subtotal = Decimal::ZERO;
        for item in &mut self.items {
            let line = Decimal::from_f64(item.unit_price).unwrap_or_default()
                * Decimal::from(item.quantity);
            let line = line.round_dp(2);
            item.subtotal = line.to_f64().unwrap_or(0.0);
            subtotal += line;
        }
        let discount = Decimal::from_f64(self.discount).unwrap_or_default();
        let total = (subtotal - discount).max(Decimal::ZERO).round_dp(2);
        self.subtotal = subtotal.round_dp(2).to_f64().unwrap_or(0.0);
        self.total = total.to_f64().unwrap_or(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(product_id: &str, unit_price: f64, quantity: i32) -> LineItem {
        LineItem {
            id: uuid::Uuid::new_v4().to_string(),
            product_id: product_id.to_string(),
            name: format!("Product {product_id}"),
            unit_price,
            quantity,
            subtotal: 0.0,
            size: None,
            variation: None,
            note: None,
        }
    }

    #[test]
    fn test_recompute_totals() {
        let mut sale = Sale::new("sale-1".into(), SaleChannel::Counter);
        sale.items.push(item("10", 12.50, 3));
        sale.items.push(item("11", 4.75, 2));
        sale.recompute_totals();
        assert_eq!(sale.items[0].subtotal, 37.50);
        assert_eq!(sale.subtotal, 47.00);
        assert_eq!(sale.total, 47.00);
    }

    #[test]
    fn test_recompute_totals_with_discount() {
        let mut sale = Sale::new("sale-1".into(), SaleChannel::Table);
        sale.items.push(item("10", 10.0, 2));
        sale.discount = 5.0;
        sale.recompute_totals();
        assert_eq!(sale.total, 15.0);
    }

    #[test]
    fn test_remaining_balance_never_negative() {
        let mut sale = Sale::new("sale-1".into(), SaleChannel::Counter);
        sale.total = 20.0;
        sale.payments.push(PaymentRecord {
            payment_id: "p1".into(),
            method: "cash".into(),
            amount: 25.0,
            tendered: None,
            change: None,
            note: None,
            timestamp: 0,
        });
        assert_eq!(sale.remaining_balance(), 0.0);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!SaleStatus::Open.is_terminal());
        assert!(SaleStatus::Finalized.is_terminal());
        assert!(SaleStatus::Canceled.is_terminal());
    }
}
