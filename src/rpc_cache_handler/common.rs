use std::str::FromStr;

use alloy_primitives::U64;
use anyhow::{bail, Context};
use serde_json::Value;

use crate::block_data::Block;

pub(crate) enum ParamsSpec {
    Exact(usize),
    Between(usize, usize),
}

/// Missing params (`null`) are read as an empty list.
pub(crate) fn require_array_params(params: &Value, spec: ParamsSpec) -> anyhow::Result<&[Value]> {
    let params: &[Value] = match params {
        Value::Null => &[],
        Value::Array(params) => params,
        _ => bail!("params not found or not an array"),
    };

    match spec {
        ParamsSpec::Exact(n) if params.len() != n => {
            bail!("expected {n} params, got {}", params.len())
        }
        ParamsSpec::Between(min, max) if params.len() < min || params.len() > max => {
            bail!("expected {min} to {max} params, got {}", params.len())
        }
        _ => Ok(params),
    }
}

/// Decimal (canonical) or `0x` hex string, or a plain JSON integer. Block tags
/// such as `latest` are rejected since they do not name a fixed block.
pub(crate) fn extract_block_number(value: &Value) -> anyhow::Result<u64> {
    match value {
        Value::String(s) => parse_block_number(s),
        Value::Number(n) => n.as_u64().context("block number out of range"),
        _ => bail!("block number not a string or integer"),
    }
}

pub(crate) fn parse_block_number(s: &str) -> anyhow::Result<u64> {
    let s = s.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("0x") {
        bail!("empty block number");
    }

    let number = U64::from_str(s).with_context(|| format!("`{s}` is not a fixed block number"))?;
    Ok(number.to::<u64>())
}

/// Lowercases a `0x` prefixed hex string so differently cased hashes share a key.
pub(crate) fn normalize_hash(s: &str) -> anyhow::Result<String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .context("hash is missing the 0x prefix")?;
    hex::decode(digits).context("hash is not a hex string")?;

    Ok(format!("0x{}", digits.to_ascii_lowercase()))
}

pub(crate) fn extract_hash(value: &Value) -> anyhow::Result<String> {
    normalize_hash(value.as_str().context("hash not a string")?)
}

pub(crate) fn extract_include_full_tx(params: &[Value], index: usize) -> anyhow::Result<bool> {
    match params.get(index) {
        None | Some(Value::Null) => Ok(false),
        Some(value) => value
            .as_bool()
            .with_context(|| format!("params[{index}] not a bool")),
    }
}

/// Renders a stored block. Without full transactions, the transaction list is
/// replaced by the transaction hashes.
pub(crate) fn format_block(stored: String, include_full_tx: bool) -> anyhow::Result<String> {
    if include_full_tx {
        return Ok(stored);
    }

    let block: Block = serde_json::from_str(&stored).context("cached block is corrupted")?;
    let hashes: Vec<&str> = block.transactions.iter().map(|tx| tx.hash.as_str()).collect();

    let mut value = serde_json::to_value(&block)?;
    value["transactions"] = serde_json::to_value(hashes)?;

    Ok(value.to_string())
}
