//! Aggregator responses come in several shapes. These helpers reduce them
//! to the few fields the bridge needs, failing when a required one is absent.

use {
    alloy_primitives::{Address, Bytes, U256},
    serde_json::Value,
    stakeflow_common::{Error, Result, TransactionRequest},
};

const AMOUNT_OUT_KEYS: [&str; 3] = ["toTokenAmount", "amountOut", "toAmount"];
const GAS_KEYS: [&str; 3] = ["estimateGasFee", "estimatedGas", "gas"];
const ROUTER_KEYS: [&str; 2] = ["router", "to"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedQuote {
    pub amount_out: U256,
    pub estimated_gas: Option<U256>,
    pub router_address: Option<Address>,
}

/// Rejects bodies that report an error through the envelope.
pub fn check_envelope(body: &Value) -> Result<()> {
    let message = ["error", "msg", "message"]
        .iter()
        .filter_map(|key| body.get(*key))
        .find_map(|value| match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Object(obj) => obj
                .get("message")
                .and_then(Value::as_str)
                .map(String::from),
            _ => None,
        });
    let Some(message) = message else {
        return Ok(());
    };

    let success_code = match body.get("code") {
        Some(Value::String(code)) => code == "0",
        Some(Value::Number(code)) => code.as_i64() == Some(0),
        _ => false,
    };
    if success_code {
        Ok(())
    } else {
        Err(Error::Provider(message))
    }
}

/// The object carrying the result: `data`, `result` or the body itself,
/// with single-element arrays unwrapped at either level.
pub fn payload(body: &Value) -> Option<&Value> {
    // A top-level `data` string is calldata, not a wrapper.
    let wrapped = |key: &str| body.get(key).filter(|v| v.is_object() || v.is_array());
    let outer = wrapped("data").or_else(|| wrapped("result")).unwrap_or(body);
    let outer = first_if_array(outer)?;
    match outer.get("data") {
        Some(inner @ Value::Array(_)) => first_if_array(inner),
        _ => Some(outer),
    }
}

fn first_if_array(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.first(),
        other => Some(other),
    }
}

pub fn normalize_quote(body: &Value) -> Result<NormalizedQuote> {
    let payload = payload(body).ok_or_else(|| Error::Provider("empty quote response".into()))?;

    let amount_out = AMOUNT_OUT_KEYS
        .iter()
        .filter_map(|key| payload.get(*key))
        .chain(
            ["toTokenAmount", "amountOut"]
                .iter()
                .filter_map(|key| payload.get("quote").and_then(|q| q.get(*key))),
        )
        .find_map(parse_quantity)
        .filter(|amount| !amount.is_zero())
        .ok_or_else(|| Error::Provider("quote has no output amount".into()))?;

    let estimated_gas = GAS_KEYS
        .iter()
        .filter_map(|key| payload.get(*key))
        .find_map(parse_quantity);
    let router_address = ROUTER_KEYS
        .iter()
        .filter_map(|key| payload.get(*key))
        .filter_map(Value::as_str)
        .find_map(|s| s.parse::<Address>().ok());

    Ok(NormalizedQuote {
        amount_out,
        estimated_gas,
        router_address,
    })
}

pub fn normalize_swap(body: &Value) -> Result<TransactionRequest> {
    let invalid = || Error::Provider("Invalid swap tx payload".into());
    let payload = payload(body).ok_or_else(invalid)?;
    let tx = payload.get("tx").filter(|tx| tx.is_object()).unwrap_or(payload);

    let to = tx
        .get("to")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<Address>().ok())
        .ok_or_else(invalid)?;
    let data = tx
        .get("data")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<Bytes>().ok())
        .ok_or_else(invalid)?;
    let value = tx.get("value").and_then(parse_quantity);

    Ok(TransactionRequest { to, data, value })
}

/// Accepts decimal strings, `0x` hex strings and JSON integers.
pub fn parse_quantity(value: &Value) -> Option<U256> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                Some(hex) if hex.is_empty() => Some(U256::ZERO),
                Some(hex) => U256::from_str_radix(hex, 16).ok(),
                None => U256::from_str_radix(s, 10).ok(),
            }
        }
        Value::Number(n) => n.as_u64().map(U256::from),
        _ => None,
    }
}
