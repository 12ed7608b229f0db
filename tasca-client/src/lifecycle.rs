//! Lifecycle manager
//!
//! Finite-state machines for table status and sale/tab status, with the
//! pre-conditions required to transition between them. Pure transition
//! predicates are kept separate from the guarded operations so the matrix
//! is testable on its own; the manager validates locally, drives the
//! transition through the gateway and republishes on the event hub.

use std::sync::Arc;

use shared::Sale;
use shared::intent::OpenTableInput;
use shared::models::{DiningTable, SaleStatus, TableStatus};

use crate::error::{ClientError, ClientResult};
use crate::events::{EngineEvent, EventHub, Topic};
use crate::gateway::{SaleGateway, TableOpened};
use crate::payment::{self, PAYMENT_TOLERANCE};
use crate::reconciler::OptimisticReconciler;

/// Table state machine matrix
///
/// `Maintenance -> Free` is the only transition out of maintenance.
pub fn table_transition_allowed(from: TableStatus, to: TableStatus) -> bool {
    use TableStatus::*;
    matches!(
        (from, to),
        (Free, Occupied)
            | (Occupied, Free)
            | (Free, Reserved)
            | (Reserved, Free)
            | (Free, Maintenance)
            | (Reserved, Maintenance)
            | (Maintenance, Free)
    )
}

/// Sale/tab state machine: both end states are terminal
pub fn sale_transition_allowed(from: SaleStatus, to: SaleStatus) -> bool {
    matches!(
        (from, to),
        (SaleStatus::Open, SaleStatus::Finalized) | (SaleStatus::Open, SaleStatus::Canceled)
    )
}

/// Guarded lifecycle operations for tables and sales
pub struct LifecycleManager<G> {
    gateway: Arc<G>,
    hub: Arc<EventHub>,
}

impl<G: SaleGateway> LifecycleManager<G> {
    pub fn new(gateway: Arc<G>, hub: Arc<EventHub>) -> Self {
        Self { gateway, hub }
    }

    /// `Free -> Occupied`: requires a responsible party; the backend creates
    /// the attached open sale in the same step
    pub async fn open_table(
        &self,
        table: &DiningTable,
        responsible: &str,
        guest_count: i32,
    ) -> ClientResult<TableOpened> {
        if responsible.trim().is_empty() {
            return Err(ClientError::validation(
                "a responsible party is required to open a table",
            ));
        }
        if !table_transition_allowed(table.status, TableStatus::Occupied) {
            return Err(ClientError::validation(format!(
                "table {} is {:?} and cannot be opened",
                table.number, table.status
            )));
        }
        let opened = self
            .gateway
            .open_table(
                &table.id,
                &OpenTableInput {
                    responsible: responsible.to_string(),
                    guest_count,
                },
            )
            .await?;
        self.publish_table(&opened.table);
        Ok(opened)
    }

    /// `Occupied -> Free` without payment
    ///
    /// Permitted only when the attached open sale has no items (releasing an
    /// empty order). An open sale with items must be finalized or canceled
    /// first; releasing it here is rejected before the call goes out.
    pub async fn release_table(
        &self,
        table: &DiningTable,
        sale: Option<&Sale>,
    ) -> ClientResult<DiningTable> {
        if table.status == TableStatus::Occupied
            && let Some(sale) = sale
            && sale.is_open()
            && !sale.items.is_empty()
        {
            let remaining = payment::remaining_balance(sale);
            if remaining > PAYMENT_TOLERANCE {
                return Err(ClientError::validation(format!(
                    "table {} has an open sale with an unpaid balance of {:.2}",
                    table.number,
                    payment::to_f64(remaining)
                )));
            }
            return Err(ClientError::validation(format!(
                "table {} has an open sale with items; finalize it instead",
                table.number
            )));
        }
        let released = self.gateway.release_table(&table.id).await?;
        self.publish_table(&released);
        Ok(released)
    }

    /// `Free -> Reserved`
    pub async fn reserve_table(&self, table: &DiningTable) -> ClientResult<DiningTable> {
        if !table_transition_allowed(table.status, TableStatus::Reserved) {
            return Err(ClientError::validation(format!(
                "table {} is {:?} and cannot be reserved",
                table.number, table.status
            )));
        }
        let reserved = self.gateway.reserve_table(&table.id).await?;
        self.publish_table(&reserved);
        Ok(reserved)
    }

    /// `{Free|Reserved} -> Maintenance`
    pub async fn set_maintenance(&self, table: &DiningTable) -> ClientResult<DiningTable> {
        if !table_transition_allowed(table.status, TableStatus::Maintenance) {
            return Err(ClientError::validation(format!(
                "table {} is {:?} and cannot go into maintenance",
                table.number, table.status
            )));
        }
        let updated = self.gateway.set_maintenance(&table.id).await?;
        self.publish_table(&updated);
        Ok(updated)
    }

    /// `Maintenance -> Free`, the only way out of maintenance
    pub async fn reopen_table(&self, table: &DiningTable) -> ClientResult<DiningTable> {
        if table.status != TableStatus::Maintenance {
            return Err(ClientError::validation(format!(
                "table {} is not in maintenance",
                table.number
            )));
        }
        let reopened = self.gateway.release_table(&table.id).await?;
        self.publish_table(&reopened);
        Ok(reopened)
    }

    /// Finalize the displayed sale and republish the freed table/tab
    pub async fn finalize_sale(
        &self,
        reconciler: &OptimisticReconciler<G>,
        payment_method: &str,
    ) -> ClientResult<Sale> {
        let sale = reconciler.finalize(payment_method).await?;
        self.publish_attached(&sale).await;
        Ok(sale)
    }

    /// Cancel the displayed sale (explicit staff action, no balance
    /// requirement) and republish the freed table/tab
    pub async fn cancel_sale(
        &self,
        reconciler: &OptimisticReconciler<G>,
        reason: Option<&str>,
    ) -> ClientResult<Sale> {
        let sale = reconciler.cancel(reason).await?;
        self.publish_attached(&sale).await;
        Ok(sale)
    }

    fn publish_table(&self, table: &DiningTable) {
        self.hub.publish(
            Topic::Tables,
            EngineEvent::TableChanged {
                table_id: table.id.clone(),
                status: table.status,
            },
        );
    }

    async fn publish_attached(&self, sale: &Sale) {
        if let Some(table_id) = &sale.table_id {
            match self.gateway.fetch_table(table_id).await {
                Ok(table) => self.publish_table(&table),
                Err(err) => {
                    tracing::warn!(table_id = %table_id, error = %err, "freed table refetch failed")
                }
            }
        }
        if let Some(tab_id) = &sale.tab_id {
            self.hub.publish(
                Topic::Tabs,
                EngineEvent::TabChanged {
                    tab_id: tab_id.clone(),
                    status: sale.status,
                },
            );
        }
    }
}
