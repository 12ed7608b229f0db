//! Payment reconciliation engine
//!
//! Tracks partial payments against a sale's total and computes the
//! remaining balance that gates the finalize transition. All arithmetic is
//! done in `Decimal` internally; `f64` only crosses the wire.

use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use shared::Sale;
use shared::intent::PaymentInput;
use shared::models::SaleStatus;

use crate::error::{ClientError, ClientResult};

/// Tolerance absorbing floating rounding on the finalize gate (0.05)
pub const PAYMENT_TOLERANCE: Decimal = Decimal::from_parts(5, 0, 0, false, 2);

/// Maximum allowed payment amount
const MAX_PAYMENT_AMOUNT: f64 = 1_000_000.0;

/// Convert an f64 wire value to Decimal
#[inline]
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

/// Convert a Decimal back to the f64 wire representation
#[inline]
pub fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Remaining amount to pay, never negative
pub fn remaining_balance(sale: &Sale) -> Decimal {
    let paid: Decimal = sale.payments.iter().map(|p| to_decimal(p.amount)).sum();
    (to_decimal(sale.total) - paid).max(Decimal::ZERO)
}

/// Reason a finalize is currently blocked
#[derive(Debug, Clone, PartialEq)]
pub enum FinalizeBlocked {
    /// Sale is not open (already finalized or canceled)
    NotOpen(SaleStatus),
    /// Sale has no items
    EmptySale,
    /// Balance above tolerance remains unpaid
    UnpaidBalance(f64),
}

impl std::fmt::Display for FinalizeBlocked {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FinalizeBlocked::NotOpen(status) => write!(f, "sale is not open ({status:?})"),
            FinalizeBlocked::EmptySale => write!(f, "sale has no items"),
            FinalizeBlocked::UnpaidBalance(remaining) => {
                write!(f, "unpaid balance of {remaining:.2} remains")
            }
        }
    }
}

/// Finalize gate: `status == Open && !items.is_empty() && remaining <= ε`
pub fn check_finalize(sale: &Sale) -> Result<(), FinalizeBlocked> {
    if sale.status != SaleStatus::Open {
        return Err(FinalizeBlocked::NotOpen(sale.status));
    }
    if sale.items.is_empty() {
        return Err(FinalizeBlocked::EmptySale);
    }
    let remaining = remaining_balance(sale);
    if remaining > PAYMENT_TOLERANCE {
        return Err(FinalizeBlocked::UnpaidBalance(to_f64(remaining)));
    }
    Ok(())
}

/// Validate a payment input before sending it anywhere
pub fn validate_payment(input: &PaymentInput) -> ClientResult<()> {
    if !input.amount.is_finite() {
        return Err(ClientError::validation(format!(
            "payment amount must be a finite number, got {}",
            input.amount
        )));
    }
    if input.amount <= 0.0 {
        return Err(ClientError::validation("payment amount must be positive"));
    }
    if input.amount > MAX_PAYMENT_AMOUNT {
        return Err(ClientError::validation(format!(
            "payment amount exceeds maximum allowed ({MAX_PAYMENT_AMOUNT})"
        )));
    }
    if input.method.trim().is_empty() {
        return Err(ClientError::validation("payment method is required"));
    }
    if let Some(tendered) = input.tendered {
        if !tendered.is_finite() {
            return Err(ClientError::validation("tendered must be a finite number"));
        }
        if to_decimal(tendered) < to_decimal(input.amount) - PAYMENT_TOLERANCE {
            return Err(ClientError::validation(format!(
                "tendered {:.2} is less than required {:.2}",
                tendered, input.amount
            )));
        }
    }
    Ok(())
}

/// Overpayment guard: amount must not exceed the remaining balance
/// (plus tolerance)
pub fn validate_payment_against(sale: &Sale, input: &PaymentInput) -> ClientResult<()> {
    validate_payment(input)?;
    let remaining = remaining_balance(sale);
    if to_decimal(input.amount) > remaining + PAYMENT_TOLERANCE {
        return Err(ClientError::validation(format!(
            "payment amount ({:.2}) exceeds remaining unpaid ({:.2})",
            input.amount,
            to_f64(remaining)
        )));
    }
    Ok(())
}

/// Change owed on a cash payment, never negative
pub fn change_for(input: &PaymentInput) -> Option<f64> {
    input.tendered.map(|tendered| {
        let diff = to_decimal(tendered) - to_decimal(input.amount);
        to_f64(diff.max(Decimal::ZERO))
    })
}
