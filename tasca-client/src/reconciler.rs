//! Optimistic reconciler
//!
//! Wraps the mutation gateway: applies an immediate local prediction to the
//! sale mirror, tracks one monotonically increasing request sequence per
//! `(sale, product)` key, and discards any gateway response that is not the
//! most recent for its key. Rapid user actions can produce responses out of
//! request order; per-key sequencing, not locking, is what keeps the mirror
//! converging on the canonical result of the last issued call.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use shared::Sale;
use shared::intent::{AddItemInput, FinalizeInput, PaymentInput, SetQuantityInput};
use shared::models::{LineItem, Product, SaleStatus};

use crate::error::{ClientError, ClientResult};
use crate::gateway::SaleGateway;
use crate::payment::{self, to_decimal, to_f64};
use crate::store::SaleStore;

/// Whether this client edits the sale or only observes it
///
/// Observer clients (kitchen/bar displays, secondary screens) never predict
/// and always wait for canonical data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientMode {
    #[default]
    Editor,
    Observer,
}

/// Sequencing key: one counter slot per (sale, target) pair
type OpKey = (String, String);

/// Pseudo-target for operations not tied to a product
const PAYMENT_TARGET: &str = "@payment";

/// Post-mutation quantity expectation used for drift detection
struct RequestedQty {
    product_id: String,
    item_id: Option<String>,
    quantity: i32,
}

/// Optimistic reconciler for one displayed sale
pub struct OptimisticReconciler<G> {
    gateway: Arc<G>,
    store: Arc<SaleStore>,
    mode: ClientMode,
    seq: AtomicU64,
    latest: Mutex<HashMap<OpKey, u64>>,
}

impl<G: SaleGateway> OptimisticReconciler<G> {
    pub fn new(gateway: Arc<G>, store: Arc<SaleStore>, mode: ClientMode) -> Self {
        Self {
            gateway,
            store,
            mode,
            seq: AtomicU64::new(0),
            latest: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<SaleStore> {
        &self.store
    }

    pub fn mode(&self) -> ClientMode {
        self.mode
    }

    /// Fetch a sale and make it the displayed sale
    pub async fn display(&self, sale_id: &str) -> ClientResult<Sale> {
        let sale = self.gateway.fetch_sale(sale_id).await?;
        self.store.replace(sale.clone());
        Ok(sale)
    }

    /// Full canonical refetch of the displayed sale
    pub async fn refresh(&self) -> ClientResult<Sale> {
        let sale_id = self.displayed_sale_id()?;
        self.display(&sale_id).await
    }

    /// Append or increment a product on the displayed sale
    pub async fn add_item(&self, product: &Product, input: &AddItemInput) -> ClientResult<()> {
        if input.product_id != product.id {
            return Err(ClientError::validation("input does not match the product"));
        }
        if input.quantity <= 0 {
            return Err(ClientError::validation("quantity must be positive"));
        }
        if input.size.is_some() && input.variation.is_some() {
            return Err(ClientError::validation(
                "size and variation selection are mutually exclusive",
            ));
        }
        if product.has_size && input.size.is_none() {
            return Err(ClientError::validation(format!(
                "product {} requires a size selection",
                product.id
            )));
        }
        if product.has_variation && input.variation.is_none() {
            return Err(ClientError::validation(format!(
                "product {} requires a variation payload",
                product.id
            )));
        }
        let sale_id = self.require_open()?;

        let (key, token, snapshot) = self.begin(&sale_id, &product.id);
        if self.mode == ClientMode::Editor {
            let input = input.clone();
            let name = product.name.clone();
            let unit_price = predicted_unit_price(product, &input);
            self.store.predict(move |sale| {
                predict_add(sale, &input, unit_price, name);
            });
        }
        let result = self.gateway.add_item(&sale_id, input).await;
        self.complete(key, token, snapshot, result, None).await?;
        Ok(())
    }

    /// Set the absolute quantity of a line item
    ///
    /// `item_id` is required as soon as the product maps to more than one
    /// line item; its absence is an error, never a guess. An absolute
    /// quantity of zero or less removes the item.
    pub async fn set_item_quantity(
        &self,
        product_id: &str,
        quantity: i32,
        item_id: Option<&str>,
    ) -> ClientResult<()> {
        if quantity <= 0 {
            return self.remove_item(product_id, item_id).await;
        }
        let sale_id = self.require_open()?;
        self.check_unambiguous(product_id, item_id)?;

        let (key, token, snapshot) = self.begin(&sale_id, product_id);
        if self.mode == ClientMode::Editor {
            let product_id = product_id.to_string();
            let item_id = item_id.map(|s| s.to_string());
            self.store.predict(move |sale| {
                if let Some(item) = resolve_item_mut(sale, &product_id, item_id.as_deref()) {
                    item.quantity = quantity;
                }
            });
        }
        let input = SetQuantityInput {
            quantity,
            item_id: item_id.map(|s| s.to_string()),
        };
        let result = self
            .gateway
            .set_item_quantity(&sale_id, product_id, &input)
            .await;
        let requested = RequestedQty {
            product_id: product_id.to_string(),
            item_id: item_id.map(|s| s.to_string()),
            quantity,
        };
        self.complete(key, token, snapshot, result, Some(requested))
            .await?;
        Ok(())
    }

    /// Remove a line item from the displayed sale
    pub async fn remove_item(&self, product_id: &str, item_id: Option<&str>) -> ClientResult<()> {
        let sale_id = self.require_open()?;
        self.check_unambiguous(product_id, item_id)?;

        let (key, token, snapshot) = self.begin(&sale_id, product_id);
        if self.mode == ClientMode::Editor {
            let product_id = product_id.to_string();
            let item_id = item_id.map(|s| s.to_string());
            self.store.predict(move |sale| {
                sale.items.retain(|i| match &item_id {
                    Some(id) => i.id != *id,
                    None => i.product_id != product_id,
                });
            });
        }
        let result = self.gateway.remove_item(&sale_id, product_id, item_id).await;
        let requested = RequestedQty {
            product_id: product_id.to_string(),
            item_id: item_id.map(|s| s.to_string()),
            quantity: 0,
        };
        self.complete(key, token, snapshot, result, Some(requested))
            .await?;
        Ok(())
    }

    /// Register a partial payment; never changes the sale status
    pub async fn register_payment(&self, input: &PaymentInput) -> ClientResult<()> {
        let sale_id = self.require_open()?;
        if let Some(sale) = self.store.current() {
            // Unmet preconditions are blocked before the call goes out
            payment::validate_payment_against(&sale, input)?;
        }

        let (key, token, snapshot) = self.begin(&sale_id, PAYMENT_TARGET);
        if self.mode == ClientMode::Editor {
            let input = input.clone();
            self.store.predict(move |sale| {
                sale.payments.push(shared::models::PaymentRecord {
                    payment_id: format!("pending-{}", uuid::Uuid::new_v4()),
                    method: input.method.clone(),
                    amount: input.amount,
                    tendered: input.tendered,
                    change: payment::change_for(&input),
                    note: input.note.clone(),
                    timestamp: shared::types::now_millis(),
                });
            });
        }
        let result = self.gateway.register_payment(&sale_id, input).await;
        self.complete(key, token, snapshot, result, None).await?;
        Ok(())
    }

    /// Finalize the displayed sale
    ///
    /// Never predicted: the terminal transition waits for canonical data.
    pub async fn finalize(&self, payment_method: &str) -> ClientResult<Sale> {
        let sale_id = self.require_open()?;
        if let Some(sale) = self.store.current() {
            if sale.items.is_empty() {
                return Err(ClientError::validation("sale has no items"));
            }
            // With partial payments on record the gate is checked locally
            // first; a full single-method finalize is settled by the backend
            if !sale.payments.is_empty()
                && let Err(blocked) = payment::check_finalize(&sale)
            {
                return Err(ClientError::validation(blocked.to_string()));
            }
        }

        let (key, token, snapshot) = self.begin(&sale_id, PAYMENT_TARGET);
        let input = FinalizeInput {
            payment_method: payment_method.to_string(),
        };
        let result = self.gateway.finalize(&sale_id, &input).await;
        match self.complete(key, token, snapshot, result, None).await? {
            Some(sale) => Ok(sale),
            // A superseded finalize response; the mirror already holds newer
            // canonical state
            None => self
                .store
                .current()
                .ok_or(ClientError::Closed),
        }
    }

    /// Explicit staff cancel; no balance requirement
    pub async fn cancel(&self, reason: Option<&str>) -> ClientResult<Sale> {
        let sale_id = self.require_open()?;
        let (key, token, snapshot) = self.begin(&sale_id, PAYMENT_TARGET);
        let result = self.gateway.cancel_sale(&sale_id, reason).await;
        match self.complete(key, token, snapshot, result, None).await? {
            Some(sale) => Ok(sale),
            None => self.store.current().ok_or(ClientError::Closed),
        }
    }

    fn displayed_sale_id(&self) -> ClientResult<String> {
        self.store
            .sale_id()
            .ok_or_else(|| ClientError::validation("no sale displayed"))
    }

    /// Quantity operations are blocked entirely once the sale left Open
    fn require_open(&self) -> ClientResult<String> {
        let sale_id = self.displayed_sale_id()?;
        match self.store.status() {
            Some(SaleStatus::Open) => Ok(sale_id),
            Some(status) => Err(ClientError::validation(format!(
                "sale is {status:?}; no further mutations are possible"
            ))),
            None => Err(ClientError::validation("no sale displayed")),
        }
    }

    /// Local mirror of the backend's ambiguity rule, checked pre-flight
    fn check_unambiguous(&self, product_id: &str, item_id: Option<&str>) -> ClientResult<()> {
        if item_id.is_some() {
            return Ok(());
        }
        if let Some(sale) = self.store.current()
            && sale.items_for_product(product_id).len() > 1
        {
            return Err(ClientError::validation(format!(
                "product {product_id} maps to multiple line items; item_id is required"
            )));
        }
        Ok(())
    }

    /// Snapshot the mirror and issue the next sequence token for the key
    fn begin(&self, sale_id: &str, target: &str) -> (OpKey, u64, Option<Sale>) {
        let key = (sale_id.to_string(), target.to_string());
        let token = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        self.latest.lock().insert(key.clone(), token);
        (key, token, self.store.current())
    }

    fn is_latest(&self, key: &OpKey, token: u64) -> bool {
        self.latest.lock().get(key).copied() == Some(token)
    }

    /// Apply a gateway response under the per-key sequencing rules
    ///
    /// Returns `Ok(None)` when the response was stale and discarded.
    async fn complete(
        &self,
        key: OpKey,
        token: u64,
        snapshot: Option<Sale>,
        result: ClientResult<Sale>,
        requested: Option<RequestedQty>,
    ) -> ClientResult<Option<Sale>> {
        match result {
            Ok(canonical) => {
                if !self.is_latest(&key, token) {
                    // Superseded by a newer call for the same key
                    tracing::debug!(
                        sale_id = %key.0,
                        target = %key.1,
                        token,
                        "stale response discarded"
                    );
                    return Ok(None);
                }
                self.store.replace(canonical.clone());
                if let Some(requested) = requested
                    && observed_quantity(&canonical, &requested) != requested.quantity
                {
                    tracing::debug!(
                        sale_id = %canonical.id,
                        product_id = %requested.product_id,
                        "post-mutation quantity drift, refetching"
                    );
                    let refreshed = self.refresh().await?;
                    return Ok(Some(refreshed));
                }
                Ok(Some(canonical))
            }
            Err(err) => {
                if self.is_latest(&key, token) {
                    // Roll the prediction back and resync with the backend's
                    // actual state
                    if let Some(snapshot) = snapshot {
                        self.store.replace(snapshot);
                    }
                    if let Err(refetch_err) = self.refresh().await {
                        tracing::warn!(
                            sale_id = %key.0,
                            error = %refetch_err,
                            "resync after failed mutation also failed"
                        );
                    }
                }
                Err(err)
            }
        }
    }
}

/// Unit price the prediction uses until canonical data arrives
fn predicted_unit_price(product: &Product, input: &AddItemInput) -> f64 {
    let base = to_decimal(product.unit_price(input.size.as_ref()));
    let modifier = input
        .variation
        .as_ref()
        .and_then(|v| v.price_modifier)
        .map(to_decimal)
        .unwrap_or_default();
    to_f64((base + modifier).round_dp(2))
}

/// Mirror-side prediction of the backend's append-or-increment rule
fn predict_add(sale: &mut Sale, input: &AddItemInput, unit_price: f64, name: String) {
    let size_id = input.size.as_ref().map(|s| s.id.clone());
    let variation_id = input.variation.as_ref().map(|v| v.id.clone());
    let existing = sale.items.iter_mut().find(|i| {
        i.product_id == input.product_id
            && i.size.as_ref().map(|s| s.id.clone()) == size_id
            && i.variation.as_ref().map(|v| v.id.clone()) == variation_id
            && i.note == input.note
    });
    match existing {
        Some(item) => item.quantity += input.quantity,
        None => sale.items.push(LineItem {
            id: format!("pending-{}", uuid::Uuid::new_v4()),
            product_id: input.product_id.clone(),
            name,
            unit_price,
            quantity: input.quantity,
            subtotal: 0.0,
            size: input.size.clone(),
            variation: input.variation.clone(),
            note: input.note.clone(),
        }),
    }
}

fn resolve_item_mut<'a>(
    sale: &'a mut Sale,
    product_id: &str,
    item_id: Option<&str>,
) -> Option<&'a mut LineItem> {
    match item_id {
        Some(item_id) => sale.items.iter_mut().find(|i| i.id == item_id),
        None => sale.items.iter_mut().find(|i| i.product_id == product_id),
    }
}

/// Quantity the canonical sale holds for the targeted line item (0 = absent)
fn observed_quantity(sale: &Sale, requested: &RequestedQty) -> i32 {
    match &requested.item_id {
        Some(item_id) => sale.find_item(item_id).map(|i| i.quantity).unwrap_or(0),
        None => sale
            .items_for_product(&requested.product_id)
            .first()
            .map(|i| i.quantity)
            .unwrap_or(0),
    }
}
