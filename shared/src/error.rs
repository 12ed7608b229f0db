//! Wire error format shared between backend and clients
//!
//! The backend answers failed requests with a JSON body of this shape;
//! the HTTP gateway decodes it back into a typed client error.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes grouped by domain
///
/// - 0xxx: general
/// - 4xxx: sale/order
/// - 5xxx: payment
/// - 7xxx: table
pub mod codes {
    pub const NOT_FOUND: i32 = 404;
    pub const VALIDATION: i32 = 400;
    pub const INTERNAL: i32 = 500;

    pub const SALE_NOT_OPEN: i32 = 4001;
    pub const ITEM_NOT_FOUND: i32 = 4002;
    pub const ITEM_AMBIGUOUS: i32 = 4003;
    pub const SIZE_REQUIRED: i32 = 4004;
    pub const VARIATION_REQUIRED: i32 = 4005;
    pub const EMPTY_SALE: i32 = 4006;

    pub const BALANCE_UNPAID: i32 = 5001;
    pub const INVALID_AMOUNT: i32 = 5002;
    pub const OVERPAYMENT: i32 = 5003;

    pub const TABLE_OCCUPIED: i32 = 7001;
    pub const TABLE_NOT_FREE: i32 = 7002;
    pub const INVALID_TRANSITION: i32 = 7003;
}

/// API error body returned by the backend
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("[{code}] {message}")]
pub struct ApiError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(codes::NOT_FOUND, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(codes::VALIDATION, message)
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        let map = self
            .details
            .get_or_insert_with(|| serde_json::Value::Object(Default::default()));
        if let serde_json::Value::Object(obj) = map {
            obj.insert(key.to_string(), value.into());
        }
        self
    }

    /// Whether this error represents an unmet precondition rather than
    /// a transport or server fault
    pub fn is_validation(&self) -> bool {
        self.code == codes::VALIDATION || (4000..8000).contains(&self.code)
    }
}
