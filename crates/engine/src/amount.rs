//! Amount helpers.
//!
//! Ledger balances are plain `f64` values in currency units, compared with a
//! fixed tolerance of [`EPSILON`] to absorb rounding.
//!
//! # Examples
//!
//! ```rust
//! use engine::amount::{format_amount, parse_amount};
//!
//! assert_eq!(parse_amount("10,5").unwrap(), 10.5);
//! assert_eq!(format_amount(10.5), "10.50");
//! assert!(parse_amount("12.345").is_err());
//! ```

use crate::{EngineError, ResultEngine};

/// Tolerance used by every amount comparison in the engine.
pub const EPSILON: f64 = 0.01;

/// Returns `true` if the amount is within [`EPSILON`] of zero.
#[must_use]
pub fn nearly_zero(amount: f64) -> bool {
    amount.abs() <= EPSILON
}

/// Returns `true` if `a` and `b` differ by at most [`EPSILON`].
#[must_use]
pub fn nearly_equal(a: f64, b: f64) -> bool {
    nearly_zero(a - b)
}

/// Formats an amount with two decimals.
#[must_use]
pub fn format_amount(amount: f64) -> String {
    format!("{amount:.2}")
}

/// Checks that an amount is finite and not negative.
pub(crate) fn ensure_non_negative(amount: f64, label: &str) -> ResultEngine<()> {
    if !amount.is_finite() {
        return Err(EngineError::InvalidAmount(format!("{label} must be finite")));
    }
    if amount < 0.0 {
        return Err(EngineError::InvalidAmount(format!(
            "{label} must not be negative"
        )));
    }
    Ok(())
}

/// Parses a user supplied amount.
///
/// Accepts `.` or `,` as decimal separator.
///
/// Validation rules:
/// - max 2 fractional digits (rejects `12.345`)
/// - no sign (amounts are always owed amounts, direction comes from context)
/// - rejects empty/invalid strings
pub fn parse_amount(s: &str) -> ResultEngine<f64> {
    let invalid = || EngineError::InvalidAmount(format!("invalid amount: {}", s.trim()));

    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidAmount("empty amount".to_string()));
    }

    let normalized = trimmed.replace(',', ".");
    let mut parts = normalized.split('.');
    let units = parts.next().ok_or_else(invalid)?;
    let fraction = parts.next();
    if parts.next().is_some() {
        return Err(invalid());
    }

    if units.is_empty() || !units.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    if let Some(frac) = fraction {
        if !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        if frac.len() > 2 {
            return Err(EngineError::InvalidAmount("too many decimals".to_string()));
        }
    }

    let amount: f64 = normalized.trim_end_matches('.').parse().map_err(|_| invalid())?;
    if !amount.is_finite() {
        return Err(EngineError::InvalidAmount("amount too large".to_string()));
    }
    Ok(amount)
}
