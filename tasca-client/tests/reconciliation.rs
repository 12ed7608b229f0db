//! Reconciliation properties: stale-response suppression and drift repair

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use shared::intent::{AddItemInput, FinalizeInput, OpenTableInput, PaymentInput, SetQuantityInput};
use shared::models::{DiningTable, Product, Sale, SaleChannel};
use shared::types::Timestamp;
use tasca_client::gateway::TableOpened;
use tasca_client::{
    ClientMode, ClientResult, MemoryGateway, OptimisticReconciler, SaleGateway, SaleStore,
};

fn product(id: &str, price: f64) -> Product {
    Product {
        id: id.to_string(),
        name: format!("Product {id}"),
        price,
        has_size: false,
        sizes: vec![],
        has_variation: false,
        is_active: true,
    }
}

/// Wrapper around the canonical backend that delays responses by a scripted
/// duration per quantity call, and optionally tampers with the reported
/// quantity to simulate canonical drift.
struct ScriptedGateway {
    inner: Arc<MemoryGateway>,
    delays: Mutex<VecDeque<Duration>>,
    tamper_quantity: Mutex<Option<i32>>,
}

impl ScriptedGateway {
    fn new(inner: Arc<MemoryGateway>, delays: Vec<Duration>) -> Self {
        Self {
            inner,
            delays: Mutex::new(delays.into()),
            tamper_quantity: Mutex::new(None),
        }
    }

    fn tamper_next(&self, quantity: i32) {
        *self.tamper_quantity.lock() = Some(quantity);
    }

    async fn hold(&self) {
        let delay = self.delays.lock().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl SaleGateway for ScriptedGateway {
    async fn fetch_sale(&self, sale_id: &str) -> ClientResult<Sale> {
        self.inner.fetch_sale(sale_id).await
    }
    async fn changed_since(&self, since: Timestamp) -> ClientResult<Vec<Sale>> {
        self.inner.changed_since(since).await
    }
    async fn add_item(&self, sale_id: &str, input: &AddItemInput) -> ClientResult<Sale> {
        let result = self.inner.add_item(sale_id, input).await;
        self.hold().await;
        result
    }
    async fn set_item_quantity(
        &self,
        sale_id: &str,
        product_id: &str,
        input: &SetQuantityInput,
    ) -> ClientResult<Sale> {
        let mut result = self.inner.set_item_quantity(sale_id, product_id, input).await;
        if let (Ok(sale), Some(tampered)) = (&mut result, self.tamper_quantity.lock().take())
            && let Some(item) = sale.items.iter_mut().find(|i| i.product_id == product_id)
        {
            item.quantity = tampered;
        }
        self.hold().await;
        result
    }
    async fn remove_item(
        &self,
        sale_id: &str,
        product_id: &str,
        item_id: Option<&str>,
    ) -> ClientResult<Sale> {
        let result = self.inner.remove_item(sale_id, product_id, item_id).await;
        self.hold().await;
        result
    }
    async fn finalize(&self, sale_id: &str, input: &FinalizeInput) -> ClientResult<Sale> {
        self.inner.finalize(sale_id, input).await
    }
    async fn register_payment(&self, sale_id: &str, input: &PaymentInput) -> ClientResult<Sale> {
        self.inner.register_payment(sale_id, input).await
    }
    async fn cancel_sale(&self, sale_id: &str, reason: Option<&str>) -> ClientResult<Sale> {
        self.inner.cancel_sale(sale_id, reason).await
    }
    async fn fetch_table(&self, table_id: &str) -> ClientResult<DiningTable> {
        self.inner.fetch_table(table_id).await
    }
    async fn open_table(&self, table_id: &str, input: &OpenTableInput) -> ClientResult<TableOpened> {
        self.inner.open_table(table_id, input).await
    }
    async fn release_table(&self, table_id: &str) -> ClientResult<DiningTable> {
        self.inner.release_table(table_id).await
    }
    async fn reserve_table(&self, table_id: &str) -> ClientResult<DiningTable> {
        self.inner.reserve_table(table_id).await
    }
    async fn set_maintenance(&self, table_id: &str) -> ClientResult<DiningTable> {
        self.inner.set_maintenance(table_id).await
    }
}

async fn seeded_backend() -> (Arc<MemoryGateway>, Sale) {
    let backend = Arc::new(MemoryGateway::new());
    backend.seed_product(product("10", 10.0));
    let sale = backend.create_sale(SaleChannel::Counter);
    let sale = backend
        .add_item(&sale.id, &AddItemInput::new("10"))
        .await
        .unwrap();
    (backend, sale)
}

#[tokio::test(start_paused = true)]
async fn last_issued_call_wins_for_every_arrival_order() {
    // Three rapid absolute-quantity calls (2, 5, 7). Whatever order the
    // responses arrive in, the mirror must end up at the canonical result
    // of the last issued call.
    let delay_scripts: [[u64; 3]; 4] = [
        [300, 200, 100], // fully reversed arrival
        [100, 300, 200], // middle one last
        [300, 100, 200], // first one last
        [100, 200, 300], // in-order arrival
    ];

    for delays in delay_scripts {
        let (backend, sale) = seeded_backend().await;
        let scripted = Arc::new(ScriptedGateway::new(
            Arc::clone(&backend),
            delays.iter().map(|ms| Duration::from_millis(*ms)).collect(),
        ));
        let store = Arc::new(SaleStore::new());
        store.replace(backend.fetch_sale(&sale.id).await.unwrap());
        let reconciler =
            OptimisticReconciler::new(Arc::clone(&scripted), Arc::clone(&store), ClientMode::Editor);

        let (a, b, c) = tokio::join!(
            reconciler.set_item_quantity("10", 2, None),
            reconciler.set_item_quantity("10", 5, None),
            reconciler.set_item_quantity("10", 7, None),
        );
        a.unwrap();
        b.unwrap();
        c.unwrap();

        let mirrored = store.current().unwrap();
        assert_eq!(
            mirrored.items[0].quantity, 7,
            "arrival order {delays:?} must not matter"
        );
        assert_eq!(mirrored.total, 70.0);
        // And the mirror matches the backend's canonical state
        assert_eq!(mirrored, backend.fetch_sale(&sale.id).await.unwrap());
    }
}

#[tokio::test]
async fn quantity_drift_triggers_one_extra_refetch() {
    // The gateway reports a canonical quantity that disagrees with the
    // requested absolute quantity; the reconciler issues one extra full
    // refetch and converges on the true canonical state.
    let (backend, sale) = seeded_backend().await;
    let scripted = Arc::new(ScriptedGateway::new(Arc::clone(&backend), vec![]));
    let store = Arc::new(SaleStore::new());
    store.replace(backend.fetch_sale(&sale.id).await.unwrap());
    let reconciler =
        OptimisticReconciler::new(Arc::clone(&scripted), Arc::clone(&store), ClientMode::Editor);

    scripted.tamper_next(99);
    reconciler.set_item_quantity("10", 4, None).await.unwrap();

    let mirrored = store.current().unwrap();
    assert_eq!(mirrored.items[0].quantity, 4);
    assert_eq!(mirrored, backend.fetch_sale(&sale.id).await.unwrap());
}

#[tokio::test]
async fn retrying_the_same_absolute_quantity_is_idempotent() {
    let (backend, sale) = seeded_backend().await;
    let store = Arc::new(SaleStore::new());
    store.replace(sale.clone());
    let reconciler =
        OptimisticReconciler::new(Arc::clone(&backend), Arc::clone(&store), ClientMode::Editor);

    reconciler.set_item_quantity("10", 3, None).await.unwrap();
    let first = store.current().unwrap();
    reconciler.set_item_quantity("10", 3, None).await.unwrap();
    let second = store.current().unwrap();

    assert_eq!(first.items[0].quantity, 3);
    assert_eq!(second.items[0].quantity, 3);
    assert_eq!(first.total, second.total);
}
