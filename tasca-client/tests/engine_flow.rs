//! End-to-end engine flows against the in-process canonical backend

use std::sync::Arc;
use std::time::Duration;

use shared::intent::{AddItemInput, PaymentInput};
use shared::models::{DiningTable, Product, SaleChannel, SaleStatus, TableStatus};
use tasca_client::cash_session::{CashSessionAggregator, EntryFilter};
use tasca_client::payment::{self, to_f64};
use tasca_client::{
    ClientConfig, ClientMode, EventHub, LifecycleManager, MemoryGateway, OptimisticReconciler,
    SaleGateway, SaleStore, SaleWatcherBuilder,
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

fn backend() -> Arc<MemoryGateway> {
    let gateway = Arc::new(MemoryGateway::new());
    gateway.seed_product(product("10", 12.50));
    gateway.seed_product(product("11", 25.00));
    gateway.seed_table(DiningTable::new("t1".into(), 1, 4));
    gateway
}

fn editor(gateway: &Arc<MemoryGateway>) -> OptimisticReconciler<MemoryGateway> {
    OptimisticReconciler::new(
        Arc::clone(gateway),
        Arc::new(SaleStore::new()),
        ClientMode::Editor,
    )
}

#[tokio::test]
async fn counter_sale_item_editing_flow() {
    // Scenario A: add -> absolute set -> remove, totals tracked throughout
    let gateway = backend();
    let sale = gateway.create_sale(SaleChannel::Counter);
    let reconciler = editor(&gateway);
    reconciler.display(&sale.id).await.unwrap();

    reconciler
        .add_item(&product("10", 12.50), &AddItemInput::new("10"))
        .await
        .unwrap();
    let mirrored = reconciler.store().current().unwrap();
    assert_eq!(mirrored.total, 12.50);
    assert_eq!(reconciler.store().display_totals().total, 12.50);

    reconciler.set_item_quantity("10", 3, None).await.unwrap();
    let mirrored = reconciler.store().current().unwrap();
    assert_eq!(mirrored.items[0].quantity, 3);
    assert_eq!(mirrored.total, 37.50);

    reconciler.remove_item("10", None).await.unwrap();
    let mirrored = reconciler.store().current().unwrap();
    assert!(mirrored.items.is_empty());
    assert_eq!(mirrored.total, 0.0);
}

#[tokio::test]
async fn split_payment_gates_finalize() {
    // Scenario B: 50.00 total; 20.00 paid -> finalize fails;
    // 30.00 more -> finalize succeeds
    let gateway = backend();
    let sale = gateway.create_sale(SaleChannel::Counter);
    let reconciler = editor(&gateway);
    reconciler.display(&sale.id).await.unwrap();

    reconciler
        .add_item(&product("11", 25.00), &AddItemInput::new("11").with_quantity(2))
        .await
        .unwrap();
    assert_eq!(reconciler.store().current().unwrap().total, 50.00);

    reconciler
        .register_payment(&PaymentInput::new("cash", 20.0))
        .await
        .unwrap();
    let mirrored = reconciler.store().current().unwrap();
    assert_eq!(to_f64(payment::remaining_balance(&mirrored)), 30.0);

    let err = reconciler.finalize("cash").await.unwrap_err();
    assert!(err.is_validation());
    assert_eq!(
        reconciler.store().status(),
        Some(SaleStatus::Open),
        "failed finalize must not change status"
    );

    reconciler
        .register_payment(&PaymentInput::new("card", 30.0))
        .await
        .unwrap();
    let mirrored = reconciler.store().current().unwrap();
    assert_eq!(to_f64(payment::remaining_balance(&mirrored)), 0.0);

    let finalized = reconciler.finalize("card").await.unwrap();
    assert_eq!(finalized.status, SaleStatus::Finalized);
    assert!(finalized.receipt_number.is_some());
    assert_eq!(finalized.payment_method.as_deref(), Some("card"));
}

#[tokio::test]
async fn table_occupancy_follows_sale_lifecycle() {
    // Scenario E: free -> open(Ana) -> occupied; release with an unpaid item
    // rejected; finalize with full payment frees the table
    let gateway = backend();
    let hub = EventHub::new();
    let manager = LifecycleManager::new(Arc::clone(&gateway), Arc::clone(&hub));

    let table = gateway.fetch_table("t1").await.unwrap();
    assert_eq!(table.status, TableStatus::Free);

    let opened = manager.open_table(&table, "Ana", 2).await.unwrap();
    assert_eq!(opened.table.status, TableStatus::Occupied);
    assert_eq!(opened.table.sale_id.as_deref(), Some(opened.sale.id.as_str()));

    let reconciler = editor(&gateway);
    reconciler.display(&opened.sale.id).await.unwrap();
    reconciler
        .add_item(&product("10", 12.50), &AddItemInput::new("10"))
        .await
        .unwrap();

    let table = gateway.fetch_table("t1").await.unwrap();
    let sale = reconciler.store().current().unwrap();
    let err = manager.release_table(&table, Some(&sale)).await.unwrap_err();
    assert!(err.is_validation());
    assert!(gateway.fetch_table("t1").await.unwrap().is_occupied());

    let finalized = manager.finalize_sale(&reconciler, "cash").await.unwrap();
    assert_eq!(finalized.status, SaleStatus::Finalized);

    let table = gateway.fetch_table("t1").await.unwrap();
    assert_eq!(table.status, TableStatus::Free);
    assert!(table.sale_id.is_none());
    assert!(table.responsible.is_none());
}

#[tokio::test]
async fn table_cannot_occupy_without_sale() {
    // Occupied implies an attached open sale; the only way in is open_table
    let gateway = backend();
    let hub = EventHub::new();
    let manager = LifecycleManager::new(Arc::clone(&gateway), Arc::clone(&hub));

    let table = gateway.fetch_table("t1").await.unwrap();
    let opened = manager.open_table(&table, "Ana", 2).await.unwrap();
    let table = gateway.fetch_table("t1").await.unwrap();
    assert!(table.is_occupied());
    assert!(table.sale_id.is_some());

    // A second open on the same table is rejected
    let err = manager.open_table(&table, "Bruno", 2).await.unwrap_err();
    assert!(err.is_validation());

    // Canceling the sale releases the occupancy
    let reconciler = editor(&gateway);
    reconciler.display(&opened.sale.id).await.unwrap();
    manager
        .cancel_sale(&reconciler, Some("customer left"))
        .await
        .unwrap();
    let table = gateway.fetch_table("t1").await.unwrap();
    assert_eq!(table.status, TableStatus::Free);
    assert!(table.sale_id.is_none());
}

#[tokio::test]
async fn tab_shares_the_sale_state_machine() {
    let gateway = backend();
    let (tab, sale) = gateway.create_tab("Mesa do fundo", Some("Carla".into()));
    assert_eq!(tab.status, SaleStatus::Open);

    let reconciler = editor(&gateway);
    reconciler.display(&sale.id).await.unwrap();
    reconciler
        .add_item(&product("10", 12.50), &AddItemInput::new("10"))
        .await
        .unwrap();
    let finalized = reconciler.finalize("cash").await.unwrap();
    assert_eq!(finalized.status, SaleStatus::Finalized);

    let tab = gateway.tab(&tab.id).unwrap();
    assert_eq!(tab.status, SaleStatus::Finalized);
    assert!(tab.sale_id.is_none());

    // Terminal: nothing mutates a finalized sale
    let err = reconciler
        .add_item(&product("10", 12.50), &AddItemInput::new("10"))
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn cash_session_collects_finalized_payments() {
    let gateway = backend();
    let mut aggregator = CashSessionAggregator::open("cs-1");

    // Two sales finalized while the session is open
    for _ in 0..2 {
        let sale = gateway.create_sale(SaleChannel::Counter);
        let reconciler = editor(&gateway);
        reconciler.display(&sale.id).await.unwrap();
        reconciler
            .add_item(&product("11", 25.00), &AddItemInput::new("11"))
            .await
            .unwrap();
        reconciler
            .register_payment(&PaymentInput::new("Cash", 10.0))
            .await
            .unwrap();
        reconciler
            .register_payment(&PaymentInput::new("CARD", 15.0))
            .await
            .unwrap();
        let finalized = reconciler.finalize("card").await.unwrap();
        aggregator.observe_sale(&finalized);
        // Redundant observation after a refetch records nothing new
        aggregator.observe_sale(&finalized);
    }

    assert_eq!(aggregator.entries().len(), 4);
    let totals = aggregator.method_totals(&EntryFilter::default());
    assert_eq!(totals.get("cash"), Some(&20.0));
    assert_eq!(totals.get("card"), Some(&30.0));

    aggregator.close();
    let late = gateway.create_sale(SaleChannel::Counter);
    let reconciler = editor(&gateway);
    reconciler.display(&late.id).await.unwrap();
    reconciler
        .add_item(&product("10", 12.50), &AddItemInput::new("10"))
        .await
        .unwrap();
    let finalized = reconciler.finalize("cash").await.unwrap();
    assert!(aggregator.observe_sale(&finalized).is_empty());
}

#[tokio::test(start_paused = true)]
async fn observer_screen_converges_on_editor_changes() {
    // Two devices: an editing screen and a passive observer display. The
    // observer receives push notifications and converges on canonical state
    // without ever predicting.
    let gateway = backend();
    let sale = gateway.create_sale(SaleChannel::Counter);

    let editor_screen = editor(&gateway);
    editor_screen.display(&sale.id).await.unwrap();

    let observer_store = Arc::new(SaleStore::new());
    observer_store.replace(sale.clone());
    let watcher = SaleWatcherBuilder::new(
        Arc::clone(&gateway),
        Arc::clone(&observer_store),
        sale.id.clone(),
        &ClientConfig::default(),
    )
    .with_socket(gateway.subscribe_push())
    .with_polling()
    .spawn();

    editor_screen
        .add_item(&product("10", 12.50), &AddItemInput::new("10"))
        .await
        .unwrap();
    editor_screen.set_item_quantity("10", 3, None).await.unwrap();

    tokio::time::sleep(Duration::from_secs(2)).await;

    let observed = observer_store.current().unwrap();
    assert_eq!(observed.items.len(), 1);
    assert_eq!(observed.items[0].quantity, 3);
    assert_eq!(observed.total, 37.50);

    watcher.join().await;
}
