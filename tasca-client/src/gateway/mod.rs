//! Mutation gateway - the seam between the engine and the backend
//!
//! All operations return the canonical post-mutation sale; they are
//! idempotent with respect to final state. Two implementations exist:
//! [`HttpGateway`] for a networked backend and [`MemoryGateway`] for the
//! in-process mode used by tests and single-device deployments.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::intent::{AddItemInput, FinalizeInput, OpenTableInput, PaymentInput, SetQuantityInput};
use shared::models::{DiningTable, Sale};
use shared::types::Timestamp;

use crate::error::ClientResult;

mod http;
mod memory;

pub use http::HttpGateway;
pub use memory::MemoryGateway;

/// Canonical result of opening a table: the occupied table and its
/// newly created sale
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableOpened {
    pub table: DiningTable,
    pub sale: Sale,
}

/// Backend operation set for sales and table transitions
#[async_trait]
pub trait SaleGateway: Send + Sync {
    /// GET /sale/{id} - canonical sale, used for all reconciliation refetches
    async fn fetch_sale(&self, sale_id: &str) -> ClientResult<Sale>;

    /// GET /sale?status=open&since={ts} - polling diff query
    async fn changed_since(&self, since: Timestamp) -> ClientResult<Vec<Sale>>;

    /// POST /sale/{id}/items - append or increment
    async fn add_item(&self, sale_id: &str, input: &AddItemInput) -> ClientResult<Sale>;

    /// PATCH /sale/{id}/items/{productId} - absolute quantity, never a delta
    async fn set_item_quantity(
        &self,
        sale_id: &str,
        product_id: &str,
        input: &SetQuantityInput,
    ) -> ClientResult<Sale>;

    /// DELETE /sale/{id}/items/{productId}
    async fn remove_item(
        &self,
        sale_id: &str,
        product_id: &str,
        item_id: Option<&str>,
    ) -> ClientResult<Sale>;

    /// POST /sale/{id}/finalize - gated by the remaining balance
    async fn finalize(&self, sale_id: &str, input: &FinalizeInput) -> ClientResult<Sale>;

    /// POST /sale/{id}/payments - append a partial payment
    async fn register_payment(&self, sale_id: &str, input: &PaymentInput) -> ClientResult<Sale>;

    /// POST /sale/{id}/cancel - explicit staff cancel, no balance requirement
    async fn cancel_sale(&self, sale_id: &str, reason: Option<&str>) -> ClientResult<Sale>;

    /// GET /table/{id}
    async fn fetch_table(&self, table_id: &str) -> ClientResult<DiningTable>;

    /// POST /table/{id}/open - occupy a free table with a new open sale
    async fn open_table(&self, table_id: &str, input: &OpenTableInput)
    -> ClientResult<TableOpened>;

    /// POST /table/{id}/release - back to free (discards an empty order)
    async fn release_table(&self, table_id: &str) -> ClientResult<DiningTable>;

    /// POST /table/{id}/reserve
    async fn reserve_table(&self, table_id: &str) -> ClientResult<DiningTable>;

    /// POST /table/{id}/maintenance
    async fn set_maintenance(&self, table_id: &str) -> ClientResult<DiningTable>;
}
