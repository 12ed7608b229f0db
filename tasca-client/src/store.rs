//! Sale store - local mirror of the currently displayed sale
//!
//! Single mutable slot per displayed sale, owned by the screen session.
//! Canonical responses replace the slot wholesale; the mirror is never
//! merged field by field. Display totals are always recomputed from the
//! mirrored line items, so there is never a second independently stored
//! total.

use parking_lot::RwLock;
use shared::Sale;
use shared::models::SaleStatus;

/// Totals derived from the mirror for display
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DisplayTotals {
    pub subtotal: f64,
    pub discount: f64,
    pub total: f64,
    pub item_count: usize,
}

/// Local mirror slot for one displayed sale
#[derive(Debug, Default)]
pub struct SaleStore {
    slot: RwLock<Option<Sale>>,
}

impl SaleStore {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }

    /// Replace the mirror wholesale with a canonical sale
    pub fn replace(&self, sale: Sale) {
        *self.slot.write() = Some(sale);
    }

    /// Drop the mirror (navigation away)
    pub fn clear(&self) {
        *self.slot.write() = None;
    }

    /// Snapshot of the current mirror, if any
    pub fn current(&self) -> Option<Sale> {
        self.slot.read().clone()
    }

    pub fn sale_id(&self) -> Option<String> {
        self.slot.read().as_ref().map(|s| s.id.clone())
    }

    pub fn status(&self) -> Option<SaleStatus> {
        self.slot.read().as_ref().map(|s| s.status)
    }

    pub fn is_empty(&self) -> bool {
        self.slot.read().is_none()
    }

    /// Totals recomputed from the mirrored items
    ///
    /// The mirror effectively holds only line items; stored totals are
    /// overwritten by the next canonical replace anyway.
    pub fn display_totals(&self) -> DisplayTotals {
        match self.slot.read().as_ref() {
            None => DisplayTotals::default(),
            Some(sale) => {
                let mut scratch = sale.clone();
                scratch.recompute_totals();
                DisplayTotals {
                    subtotal: scratch.subtotal,
                    discount: scratch.discount,
                    total: scratch.total,
                    item_count: scratch.items.len(),
                }
            }
        }
    }

    /// Apply a local prediction to the mirror
    ///
    /// Returns false when no sale is displayed.
    pub(crate) fn predict<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut Sale),
    {
        let mut slot = self.slot.write();
        match slot.as_mut() {
            Some(sale) => {
                f(sale);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::{LineItem, SaleChannel};

    fn sale_with_items() -> Sale {
        let mut sale = Sale::new("sale-1".into(), SaleChannel::Counter);
        sale.items.push(LineItem {
            id: "i1".into(),
            product_id: "10".into(),
            name: "Caipirinha".into(),
            unit_price: 12.50,
            quantity: 2,
            subtotal: 25.0,
            size: None,
            variation: None,
            note: None,
        });
        sale
    }

    #[test]
    fn test_replace_and_snapshot() {
        let store = SaleStore::new();
        assert!(store.is_empty());

        store.replace(sale_with_items());
        assert_eq!(store.sale_id().as_deref(), Some("sale-1"));
        assert_eq!(store.status(), Some(SaleStatus::Open));

        let snapshot = store.current().unwrap();
        store.predict(|sale| sale.items[0].quantity = 5);
        assert_eq!(store.current().unwrap().items[0].quantity, 5);

        // restoring the snapshot undoes the prediction
        store.replace(snapshot);
        assert_eq!(store.current().unwrap().items[0].quantity, 2);
    }

    #[test]
    fn test_display_totals_recomputed_from_items() {
        let store = SaleStore::new();
        let mut sale = sale_with_items();
        // poison the stored totals; display must not trust them
        sale.total = 999.0;
        sale.subtotal = 999.0;
        store.replace(sale);

        let totals = store.display_totals();
        assert_eq!(totals.total, 25.0);
        assert_eq!(totals.item_count, 1);
    }

    #[test]
    fn test_predict_on_empty_store() {
        let store = SaleStore::new();
        assert!(!store.predict(|sale| sale.discount = 1.0));
    }
}
