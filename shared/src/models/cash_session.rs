//! Cash session model
//!
//! A bounded collection window during which finalized payments are
//! aggregated for register reconciliation. Entries are append-only;
//! corrections happen on the underlying sale, never here.

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// One registered payment observed while the session was open
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashEntry {
    pub entry_id: String,
    pub sale_id: String,
    pub amount: f64,
    pub method: String,
    pub timestamp: Timestamp,
}

/// Cash register session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashSession {
    pub id: String,
    pub open: bool,
    pub opened_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<Timestamp>,
    #[serde(default)]
    pub entries: Vec<CashEntry>,
}

impl CashSession {
    pub fn open_now(id: String) -> Self {
        Self {
            id,
            open: true,
            opened_at: crate::types::now_millis(),
            closed_at: None,
            entries: Vec::new(),
        }
    }

    pub fn close(&mut self) {
        self.open = false;
        self.closed_at = Some(crate::types::now_millis());
    }
}
