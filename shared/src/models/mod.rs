//! Domain models shared between backend and clients

pub mod cash_session;
pub mod dining_table;
pub mod product;
pub mod sale;
pub mod tab;

pub use cash_session::{CashEntry, CashSession};
pub use dining_table::{DiningTable, TableStatus};
pub use product::{Product, SizeInfo, VariationInfo};
pub use sale::{LineItem, PaymentRecord, Sale, SaleChannel, SaleStatus};
pub use tab::Tab;
