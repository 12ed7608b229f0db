//! Dining Table Model

use serde::{Deserialize, Serialize};

/// Table status
///
/// `Occupied` holds exactly while an open sale references the table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableStatus {
    #[default]
    Free,
    Occupied,
    Reserved,
    Maintenance,
}

/// Dining table entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiningTable {
    pub id: String,
    pub number: i32,
    pub capacity: i32,
    pub status: TableStatus,
    /// Responsible party (waiter or customer name)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responsible: Option<String>,
    /// Open sale currently attached to this table
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale_id: Option<String>,
}

impl DiningTable {
    pub fn new(id: String, number: i32, capacity: i32) -> Self {
        Self {
            id,
            number,
            capacity,
            status: TableStatus::Free,
            responsible: None,
            sale_id: None,
        }
    }

    pub fn is_occupied(&self) -> bool {
        self.status == TableStatus::Occupied
    }
}
