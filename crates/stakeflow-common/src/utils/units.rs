use alloy_primitives::{
    utils::{format_units, parse_units},
    U256,
};

use crate::errors::{Error, Result};

/// Converts a user-entered decimal amount into base units.
pub fn parse_token_amount(text: &str, decimals: u8) -> Result<U256> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.starts_with('-') {
        return Err(Error::InvalidAmount(format!("'{}' is not a positive amount", text)));
    }
    let value = parse_units(trimmed, decimals)
        .map_err(|e| Error::InvalidAmount(format!("'{}': {}", text, e)))?
        .get_absolute();
    if value.is_zero() {
        return Err(Error::InvalidAmount("amount must be greater than zero".into()));
    }
    Ok(value)
}

/// Renders base units as a decimal string without trailing zeros.
pub fn format_token_amount(value: U256, decimals: u8) -> String {
    match format_units(value, decimals) {
        Ok(formatted) => trim_decimal(&formatted),
        Err(_) => value.to_string(),
    }
}

/// Lossy conversion for the display ledger, which keeps `f64` token units.
pub fn token_amount_to_f64(value: U256, decimals: u8) -> f64 {
    format_token_amount(value, decimals).parse().unwrap_or(0.0)
}

/// Parses a ledger amount entered by a user, rejecting non-positive values.
pub fn parse_ledger_amount(text: &str) -> Result<f64> {
    let amount: f64 = text
        .trim()
        .parse()
        .map_err(|_| Error::InvalidAmount(format!("'{}' is not a number", text)))?;
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::InvalidAmount("amount must be greater than zero".into()));
    }
    Ok(amount)
}

fn trim_decimal(value: &str) -> String {
    if !value.contains('.') {
        return value.to_string();
    }
    let trimmed = value.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
