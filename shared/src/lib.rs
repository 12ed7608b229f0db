//! Shared types for the Tasca POS engine
//!
//! Common types used across crates: domain models, intent DTOs,
//! push-channel message types and wire error structures.

pub mod error;
pub mod intent;
pub mod message;
pub mod models;
pub mod types;

// Re-exports
pub use serde::{Deserialize, Serialize};

// Message re-exports (for convenient access)
pub use message::{PushMessage, SaleRef};

// Model re-exports
pub use models::{
    CashEntry, CashSession, DiningTable, LineItem, PaymentRecord, Product, Sale, SaleChannel,
    SaleStatus, SizeInfo, Tab, TableStatus, VariationInfo,
};
