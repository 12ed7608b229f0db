//! In-process canonical backend
//!
//! Owns the authoritative sales and tables, performs backend-side
//! validation, recomputes totals on every mutation and broadcasts a
//! content-free `sale:update` push message that the realtime sources
//! subscribe to. Used by tests and by single-device deployments where
//! the backend runs in the same process.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use shared::error::{ApiError, codes};
use shared::intent::{AddItemInput, FinalizeInput, OpenTableInput, PaymentInput, SetQuantityInput};
use shared::message::PushMessage;
use shared::models::{
    DiningTable, LineItem, PaymentRecord, Product, Sale, SaleChannel, SaleStatus, Tab, TableStatus,
};
use shared::types::{Timestamp, now_millis};
use tokio::sync::broadcast;

use super::{SaleGateway, TableOpened};
use crate::error::{ClientError, ClientResult};
use crate::payment::{self, PAYMENT_TOLERANCE, to_decimal, to_f64};

/// Push channel capacity
const PUSH_CHANNEL_CAPACITY: usize = 256;

/// Maximum allowed quantity per line item
const MAX_QUANTITY: i32 = 9999;

/// In-memory canonical store of sales, tables and tabs
pub struct MemoryGateway {
    sales: DashMap<String, Sale>,
    tables: DashMap<String, DiningTable>,
    tabs: DashMap<String, Tab>,
    products: DashMap<String, Product>,
    push_tx: broadcast::Sender<PushMessage>,
    receipt_seq: AtomicU64,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGateway {
    pub fn new() -> Self {
        let (push_tx, _) = broadcast::channel(PUSH_CHANNEL_CAPACITY);
        Self {
            sales: DashMap::new(),
            tables: DashMap::new(),
            tabs: DashMap::new(),
            products: DashMap::new(),
            push_tx,
            receipt_seq: AtomicU64::new(0),
        }
    }

    /// Subscribe to the push channel (socket-equivalent in-process feed)
    pub fn subscribe_push(&self) -> broadcast::Receiver<PushMessage> {
        self.push_tx.subscribe()
    }

    pub fn seed_product(&self, product: Product) {
        self.products.insert(product.id.clone(), product);
    }

    pub fn fetch_product(&self, product_id: &str) -> Option<Product> {
        self.products.get(product_id).map(|p| p.value().clone())
    }

    pub fn seed_table(&self, table: DiningTable) {
        self.tables.insert(table.id.clone(), table);
    }

    /// Create a new empty open sale (counter/delivery staff action)
    pub fn create_sale(&self, channel: SaleChannel) -> Sale {
        let sale = Sale::new(uuid::Uuid::new_v4().to_string(), channel);
        self.sales.insert(sale.id.clone(), sale.clone());
        self.notify(&sale.id);
        sale
    }

    /// Open a named tab together with its backing sale
    pub fn create_tab(&self, name: impl Into<String>, customer: Option<String>) -> (Tab, Sale) {
        let mut sale = Sale::new(uuid::Uuid::new_v4().to_string(), SaleChannel::Tab);
        let mut tab = Tab::new(uuid::Uuid::new_v4().to_string(), name.into());
        tab.customer = customer;
        tab.sale_id = Some(sale.id.clone());
        sale.tab_id = Some(tab.id.clone());
        self.tabs.insert(tab.id.clone(), tab.clone());
        self.sales.insert(sale.id.clone(), sale.clone());
        self.notify(&sale.id);
        (tab, sale)
    }

    pub fn tab(&self, tab_id: &str) -> Option<Tab> {
        self.tabs.get(tab_id).map(|t| t.value().clone())
    }

    fn notify(&self, sale_id: &str) {
        // No receivers is fine; polling still observes the change
        let _ = self.push_tx.send(PushMessage::sale_update(sale_id));
        tracing::debug!(sale_id = %sale_id, "sale:update broadcast");
    }

    fn next_receipt_number(&self) -> String {
        let count = self.receipt_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let date_str = chrono::Utc::now().format("%Y%m%d");
        format!("REC{date_str}{}", 10000 + count)
    }

    fn open_sale_mut(&self, sale_id: &str) -> ClientResult<dashmap::mapref::one::RefMut<'_, String, Sale>> {
        let sale = self
            .sales
            .get_mut(sale_id)
            .ok_or_else(|| ApiError::not_found(format!("Sale {sale_id} not found")))?;
        if sale.status != SaleStatus::Open {
            return Err(ApiError::new(
                codes::SALE_NOT_OPEN,
                format!("Sale {sale_id} is {:?}", sale.status),
            )
            .into());
        }
        Ok(sale)
    }

    /// Resolve the target line item index for a quantity operation
    ///
    /// Without an explicit item id the product must map to exactly one line
    /// item; ambiguity is an error, never a guess.
    fn resolve_item(
        sale: &Sale,
        product_id: &str,
        item_id: Option<&str>,
    ) -> Result<usize, ApiError> {
        if let Some(item_id) = item_id {
            return sale
                .items
                .iter()
                .position(|i| i.id == item_id && i.product_id == product_id)
                .ok_or_else(|| {
                    ApiError::new(
                        codes::ITEM_NOT_FOUND,
                        format!("Line item {item_id} not found for product {product_id}"),
                    )
                });
        }
        let mut candidates = sale
            .items
            .iter()
            .enumerate()
            .filter(|(_, i)| i.product_id == product_id);
        let first = candidates.next();
        let second = candidates.next();
        match (first, second) {
            (None, _) => Err(ApiError::new(
                codes::ITEM_NOT_FOUND,
                format!("Product {product_id} is not in the sale"),
            )),
            (Some(_), Some(_)) => Err(ApiError::new(
                codes::ITEM_AMBIGUOUS,
                format!("Product {product_id} maps to multiple line items; item_id is required"),
            )),
            (Some((idx, _)), None) => Ok(idx),
        }
    }

    fn free_attached_resource(&self, sale: &Sale, terminal: SaleStatus) {
        if let Some(table_id) = &sale.table_id
            && let Some(mut table) = self.tables.get_mut(table_id)
        {
            table.status = TableStatus::Free;
            table.sale_id = None;
            table.responsible = None;
        }
        if let Some(tab_id) = &sale.tab_id
            && let Some(mut tab) = self.tabs.get_mut(tab_id)
        {
            tab.status = terminal;
            tab.sale_id = None;
        }
    }

    fn remove_item_at(&self, sale_id: &str, idx: usize) -> ClientResult<Sale> {
        let mut sale = self.open_sale_mut(sale_id)?;
        sale.items.remove(idx);
        sale.recompute_totals();
        sale.updated_at = now_millis();
        let result = sale.clone();
        drop(sale);
        self.notify(sale_id);
        Ok(result)
    }
}

#[async_trait]
impl SaleGateway for MemoryGateway {
    async fn fetch_sale(&self, sale_id: &str) -> ClientResult<Sale> {
        self.sales
            .get(sale_id)
            .map(|s| s.value().clone())
            .ok_or_else(|| ApiError::not_found(format!("Sale {sale_id} not found")).into())
    }

    async fn changed_since(&self, since: Timestamp) -> ClientResult<Vec<Sale>> {
        let mut changed: Vec<Sale> = self
            .sales
            .iter()
            .filter(|s| s.status == SaleStatus::Open && s.updated_at > since)
            .map(|s| s.value().clone())
            .collect();
        changed.sort_by_key(|s| s.updated_at);
        Ok(changed)
    }

    async fn add_item(&self, sale_id: &str, input: &AddItemInput) -> ClientResult<Sale> {
        let product = self
            .products
            .get(&input.product_id)
            .map(|p| p.value().clone())
            .ok_or_else(|| {
                ApiError::not_found(format!("Product {} not found", input.product_id))
            })?;
        if !product.is_active {
            return Err(ApiError::validation(format!("Product {} is inactive", product.id)).into());
        }
        if input.quantity <= 0 || input.quantity > MAX_QUANTITY {
            return Err(ApiError::validation(format!(
                "quantity must be in 1..={MAX_QUANTITY}, got {}",
                input.quantity
            ))
            .into());
        }
        if input.size.is_some() && input.variation.is_some() {
            return Err(
                ApiError::validation("size and variation selection are mutually exclusive").into(),
            );
        }
        if product.has_size && input.size.is_none() {
            return Err(ApiError::new(
                codes::SIZE_REQUIRED,
                format!("Product {} requires a size selection", product.id),
            )
            .into());
        }
        if product.has_variation && input.variation.is_none() {
            return Err(ApiError::new(
                codes::VARIATION_REQUIRED,
                format!("Product {} requires a variation payload", product.id),
            )
            .into());
        }

        let mut sale = self.open_sale_mut(sale_id)?;
        let size_id = input.size.as_ref().map(|s| s.id.clone());
        let variation_id = input.variation.as_ref().map(|v| v.id.clone());
        let existing = sale.items.iter_mut().find(|i| {
            i.product_id == product.id
                && i.size.as_ref().map(|s| s.id.clone()) == size_id
                && i.variation.as_ref().map(|v| v.id.clone()) == variation_id
                && i.note == input.note
        });
        match existing {
            Some(item) => {
                item.quantity = (item.quantity + input.quantity).min(MAX_QUANTITY);
            }
            None => {
                let base = to_decimal(product.unit_price(input.size.as_ref()));
                let modifier = input
                    .variation
                    .as_ref()
                    .and_then(|v| v.price_modifier)
                    .map(to_decimal)
                    .unwrap_or_default();
                sale.items.push(LineItem {
                    id: uuid::Uuid::new_v4().to_string(),
                    product_id: product.id.clone(),
                    name: product.name.clone(),
                    unit_price: to_f64((base + modifier).round_dp(2)),
                    quantity: input.quantity,
                    subtotal: 0.0,
                    size: input.size.clone(),
                    variation: input.variation.clone(),
                    note: input.note.clone(),
                });
            }
        }
        sale.recompute_totals();
        sale.updated_at = now_millis();
        let result = sale.clone();
        drop(sale);
        self.notify(sale_id);
        Ok(result)
    }

    async fn set_item_quantity(
        &self,
        sale_id: &str,
        product_id: &str,
        input: &SetQuantityInput,
    ) -> ClientResult<Sale> {
        if input.quantity > MAX_QUANTITY {
            return Err(ApiError::validation(format!(
                "quantity exceeds maximum allowed ({MAX_QUANTITY})"
            ))
            .into());
        }
        let idx = {
            let sale = self.open_sale_mut(sale_id)?;
            Self::resolve_item(&sale, product_id, input.item_id.as_deref())?
        };
        // Absolute quantity <= 0 means removal
        if input.quantity <= 0 {
            return self.remove_item_at(sale_id, idx);
        }
        let mut sale = self.open_sale_mut(sale_id)?;
        if sale.items[idx].quantity == input.quantity {
            // Retry with the same absolute value: no additional effect
            return Ok(sale.clone());
        }
        sale.items[idx].quantity = input.quantity;
        sale.recompute_totals();
        sale.updated_at = now_millis();
        let result = sale.clone();
        drop(sale);
        self.notify(sale_id);
        Ok(result)
    }

    async fn remove_item(
        &self,
        sale_id: &str,
        product_id: &str,
        item_id: Option<&str>,
    ) -> ClientResult<Sale> {
        let idx = {
            let sale = self.open_sale_mut(sale_id)?;
            Self::resolve_item(&sale, product_id, item_id)?
        };
        self.remove_item_at(sale_id, idx)
    }

    async fn finalize(&self, sale_id: &str, input: &FinalizeInput) -> ClientResult<Sale> {
        let mut sale = self.open_sale_mut(sale_id)?;
        if sale.items.is_empty() {
            return Err(ApiError::new(codes::EMPTY_SALE, "Sale has no items").into());
        }
        if sale.payments.is_empty() {
            // Full single-method finalize: implicit payment of the whole total
            let total = sale.total;
            sale.payments.push(PaymentRecord {
                payment_id: uuid::Uuid::new_v4().to_string(),
                method: input.payment_method.clone(),
                amount: total,
                tendered: None,
                change: None,
                note: None,
                timestamp: now_millis(),
            });
        }
        let remaining = payment::remaining_balance(&sale);
        if remaining > PAYMENT_TOLERANCE {
            return Err(ApiError::new(
                codes::BALANCE_UNPAID,
                format!("Unpaid balance of {:.2} remains", to_f64(remaining)),
            )
            .with_detail("remaining", to_f64(remaining))
            .into());
        }
        sale.status = SaleStatus::Finalized;
        sale.payment_method = Some(input.payment_method.clone());
        sale.receipt_number = Some(self.next_receipt_number());
        sale.updated_at = now_millis();
        let result = sale.clone();
        drop(sale);
        self.free_attached_resource(&result, SaleStatus::Finalized);
        self.notify(sale_id);
        Ok(result)
    }

    async fn register_payment(&self, sale_id: &str, input: &PaymentInput) -> ClientResult<Sale> {
        let mut sale = self.open_sale_mut(sale_id)?;
        payment::validate_payment(input)
            .map_err(|e| ApiError::new(codes::INVALID_AMOUNT, e.to_string()))?;
        let remaining = payment::remaining_balance(&sale);
        if to_decimal(input.amount) > remaining + PAYMENT_TOLERANCE {
            return Err(ApiError::new(
                codes::OVERPAYMENT,
                format!(
                    "Payment amount ({:.2}) exceeds remaining unpaid ({:.2})",
                    input.amount,
                    to_f64(remaining)
                ),
            )
            .into());
        }
        sale.payments.push(PaymentRecord {
            payment_id: uuid::Uuid::new_v4().to_string(),
            method: input.method.clone(),
            amount: input.amount,
            tendered: input.tendered,
            change: payment::change_for(input),
            note: input.note.clone(),
            timestamp: now_millis(),
        });
        sale.updated_at = now_millis();
        let result = sale.clone();
        drop(sale);
        self.notify(sale_id);
        Ok(result)
    }

    async fn cancel_sale(&self, sale_id: &str, reason: Option<&str>) -> ClientResult<Sale> {
        let mut sale = self.open_sale_mut(sale_id)?;
        sale.status = SaleStatus::Canceled;
        sale.cancel_reason = reason.map(|r| r.to_string());
        sale.updated_at = now_millis();
        let result = sale.clone();
        drop(sale);
        self.free_attached_resource(&result, SaleStatus::Canceled);
        self.notify(sale_id);
        Ok(result)
    }

    async fn fetch_table(&self, table_id: &str) -> ClientResult<DiningTable> {
        self.tables
            .get(table_id)
            .map(|t| t.value().clone())
            .ok_or_else(|| ApiError::not_found(format!("Table {table_id} not found")).into())
    }

    async fn open_table(
        &self,
        table_id: &str,
        input: &OpenTableInput,
    ) -> ClientResult<TableOpened> {
        if input.responsible.trim().is_empty() {
            return Err(
                ApiError::validation("a responsible party is required to open a table").into(),
            );
        }
        let mut table = self
            .tables
            .get_mut(table_id)
            .ok_or_else(|| ApiError::not_found(format!("Table {table_id} not found")))?;
        if table.status != TableStatus::Free {
            return Err(ApiError::new(
                codes::TABLE_NOT_FREE,
                format!("Table {} is {:?}", table.number, table.status),
            )
            .into());
        }
        let mut sale = Sale::new(uuid::Uuid::new_v4().to_string(), SaleChannel::Table);
        sale.table_id = Some(table.id.clone());
        sale.guest_count = input.guest_count.max(1);
        table.status = TableStatus::Occupied;
        table.responsible = Some(input.responsible.clone());
        table.sale_id = Some(sale.id.clone());
        let opened = TableOpened {
            table: table.clone(),
            sale: sale.clone(),
        };
        drop(table);
        self.sales.insert(sale.id.clone(), sale);
        self.notify(&opened.sale.id);
        Ok(opened)
    }

    async fn release_table(&self, table_id: &str) -> ClientResult<DiningTable> {
        let mut table = self
            .tables
            .get_mut(table_id)
            .ok_or_else(|| ApiError::not_found(format!("Table {table_id} not found")))?;
        match table.status {
            TableStatus::Free => Ok(table.clone()),
            TableStatus::Reserved | TableStatus::Maintenance => {
                table.status = TableStatus::Free;
                table.responsible = None;
                Ok(table.clone())
            }
            TableStatus::Occupied => {
                let sale_id = table.sale_id.clone().ok_or_else(|| {
                    ClientError::Internal(format!("occupied table {table_id} has no sale"))
                })?;
                let empty = self
                    .sales
                    .get(&sale_id)
                    .map(|s| s.items.is_empty())
                    .unwrap_or(true);
                if !empty {
                    return Err(ApiError::new(
                        codes::BALANCE_UNPAID,
                        "Table has an open sale with items; finalize or cancel it first",
                    )
                    .into());
                }
                table.status = TableStatus::Free;
                table.responsible = None;
                table.sale_id = None;
                let released = table.clone();
                drop(table);
                // Releasing an empty order discards it without payment
                if let Some(mut sale) = self.sales.get_mut(&sale_id) {
                    sale.status = SaleStatus::Canceled;
                    sale.cancel_reason = Some("released".to_string());
                    sale.updated_at = now_millis();
                }
                self.notify(&sale_id);
                Ok(released)
            }
        }
    }

    async fn reserve_table(&self, table_id: &str) -> ClientResult<DiningTable> {
        let mut table = self
            .tables
            .get_mut(table_id)
            .ok_or_else(|| ApiError::not_found(format!("Table {table_id} not found")))?;
        match table.status {
            TableStatus::Free | TableStatus::Reserved => {
                table.status = TableStatus::Reserved;
                Ok(table.clone())
            }
            status => Err(ApiError::new(
                codes::INVALID_TRANSITION,
                format!("Cannot reserve a {status:?} table"),
            )
            .into()),
        }
    }

    async fn set_maintenance(&self, table_id: &str) -> ClientResult<DiningTable> {
        let mut table = self
            .tables
            .get_mut(table_id)
            .ok_or_else(|| ApiError::not_found(format!("Table {table_id} not found")))?;
        match table.status {
            TableStatus::Free | TableStatus::Reserved | TableStatus::Maintenance => {
                table.status = TableStatus::Maintenance;
                table.responsible = None;
                Ok(table.clone())
            }
            TableStatus::Occupied => Err(ApiError::new(
                codes::INVALID_TRANSITION,
                "Cannot put an occupied table into maintenance",
            )
            .into()),
        }
    }
}
