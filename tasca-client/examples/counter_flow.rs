//! Counter sale walkthrough against the in-process backend
//!
//! Run with: cargo run --example counter_flow -p tasca-client

use std::sync::Arc;

use shared::intent::{AddItemInput, PaymentInput};
use shared::models::{Product, SaleChannel};
use tasca_client::cash_session::{CashSessionAggregator, EntryFilter};
use tasca_client::{ClientMode, MemoryGateway, OptimisticReconciler, SaleStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tasca_client::logger::init_logger();

    let backend = Arc::new(MemoryGateway::new());
    backend.seed_product(Product {
        id: "chopp".into(),
        name: "Chopp Pilsen".into(),
        price: 9.50,
        has_size: false,
        sizes: vec![],
        has_variation: false,
        is_active: true,
    });
    backend.seed_product(Product {
        id: "coxinha".into(),
        name: "Coxinha".into(),
        price: 7.00,
        has_size: false,
        sizes: vec![],
        has_variation: false,
        is_active: true,
    });

    let sale = backend.create_sale(SaleChannel::Counter);
    let reconciler = OptimisticReconciler::new(
        Arc::clone(&backend),
        Arc::new(SaleStore::new()),
        ClientMode::Editor,
    );
    reconciler.display(&sale.id).await?;

    reconciler
        .add_item(
            &backend.fetch_product("chopp").unwrap(),
            &AddItemInput::new("chopp").with_quantity(2),
        )
        .await?;
    reconciler
        .add_item(
            &backend.fetch_product("coxinha").unwrap(),
            &AddItemInput::new("coxinha").with_quantity(3),
        )
        .await?;

    let totals = reconciler.store().display_totals();
    tracing::info!(total = totals.total, items = totals.item_count, "cart ready");

    reconciler
        .register_payment(&PaymentInput::new("cash", 20.0))
        .await?;
    reconciler
        .register_payment(&PaymentInput::new("card", 20.0))
        .await?;
    let finalized = reconciler.finalize("card").await?;
    tracing::info!(
        receipt = finalized.receipt_number.as_deref().unwrap_or("-"),
        "sale finalized"
    );

    let mut register = CashSessionAggregator::open("morning-shift");
    register.observe_sale(&finalized);
    for (method, total) in register.method_totals(&EntryFilter::default()) {
        tracing::info!(method = %method, total, "collected");
    }

    Ok(())
}
