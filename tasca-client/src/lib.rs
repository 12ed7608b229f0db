//! Tasca client engine
//!
//! Order synchronization and reconciliation engine for the Tasca POS.
//! Keeps one shared, mutable sale consistent across an optimistic local
//! mirror on the editing device, the canonical backend copy, and passive
//! observers fed by redundant notification channels.
//!
//! # Architecture
//!
//! ```text
//! UI intent ──► OptimisticReconciler ──► SaleGateway ──► backend
//!                     │                        │
//!                     ▼                        ▼
//!                 SaleStore ◄─── canonical Sale
//!                     ▲
//!                     │ full refetch
//!              SaleWatcher (push-socket / push-stream / poller, coalesced)
//! ```
//!
//! Lifecycle guards, the payment reconciliation gate and the cash session
//! aggregator sit next to the store and re-evaluate on every canonical
//! update.

pub mod cash_session;
pub mod config;
pub mod error;
pub mod events;
pub mod gateway;
pub mod lifecycle;
pub mod logger;
pub mod payment;
pub mod realtime;
pub mod reconciler;
pub mod store;

pub use cash_session::CashSessionAggregator;
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use events::{EngineEvent, EventHub, Topic};
pub use gateway::{HttpGateway, MemoryGateway, SaleGateway};
pub use lifecycle::LifecycleManager;
pub use realtime::{SaleWatcher, SaleWatcherBuilder};
pub use reconciler::{ClientMode, OptimisticReconciler};
pub use store::SaleStore;
