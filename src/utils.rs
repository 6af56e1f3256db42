use std::str::FromStr;

use alloy_primitives::U64;
use anyhow::{bail, Context};
use reqwest::Url;
use serde::Serialize;
use serde_json::{json, Value};

/// Asks an upstream which chain it serves, to catch a mislabelled endpoint.
pub async fn get_chain_id(client: &reqwest::Client, rpc_url: Url) -> anyhow::Result<u64> {
    let request_payload = json!({
        "jsonrpc": "2.0",
        "method": "eth_chainId",
        "params": [],
        "id": 1
    });

    let response = do_rpc_request(client, rpc_url, &request_payload).await?;
    chain_id_from_response(&response)
}

fn chain_id_from_response(response: &Value) -> anyhow::Result<u64> {
    if let Some(error) = response.get("error").filter(|error| !error.is_null()) {
        bail!("eth_chainId failed: {error}");
    }

    let chain_id = response
        .get("result")
        .and_then(Value::as_str)
        .with_context(|| format!("no chain id in response: {response}"))?;
    if !chain_id.starts_with("0x") {
        bail!("chain id `{chain_id}` is not a hex quantity");
    }

    let chain_id = U64::from_str(chain_id).with_context(|| format!("chain id `{chain_id}` is invalid"))?;
    Ok(chain_id.to::<u64>())
}

pub async fn do_rpc_request<T: Serialize + ?Sized>(
    client: &reqwest::Client,
    rpc_url: Url,
    body: &T,
) -> anyhow::Result<Value> {
    let response = client.post(rpc_url).json(body).send().await?;
    let response = response.error_for_status()?;

    Ok(response.json::<Value>().await?)
}
