use anyhow::Context;
use serde_json::Value;

use crate::rpc_cache_handler::common::{self, ParamsSpec};
use crate::rpc_cache_handler::{IndexedBlock, RpcCacheHandler};

#[derive(Default, Clone)]
pub struct Handler;

impl RpcCacheHandler for Handler {
    type Request = String;

    fn method_name(&self) -> &'static str {
        "eth_getTransactionByHash"
    }

    fn decode_params(&self, params: &Value) -> anyhow::Result<String> {
        let params = common::require_array_params(params, ParamsSpec::Exact(1))?;
        common::extract_hash(&params[0]).context("params[0] not a valid transaction hash")
    }

    fn cache_keys(&self, hash: &String) -> Vec<String> {
        vec![hash.clone()]
    }

    fn index_entries(&self, block: &IndexedBlock) -> anyhow::Result<Vec<(String, String)>> {
        let body = block.data.block.as_ref().context("record has no block")?;

        body.transactions
            .iter()
            .map(|tx| {
                let hash = common::normalize_hash(&tx.hash)
                    .with_context(|| format!("transaction hash `{}` is invalid", tx.hash))?;

                let mut value = serde_json::to_value(tx)?;
                if value.get("blockHash").is_none() {
                    value["blockHash"] = Value::String(body.hash.clone());
                }
                if value.get("blockNumber").is_none() {
                    value["blockNumber"] = Value::String(body.number.clone());
                }

                Ok((hash, value.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::block_data::{Block, BlockData, Transaction};
    use serde_json::json;

    static HANDLER: Handler = Handler;

    #[test]
    fn test_invalid_params_len() {
        assert_eq!(
            HANDLER.decode_params(&json!([])).unwrap_err().to_string(),
            "expected 1 params, got 0"
        );
    }

    #[test]
    fn test_index_adds_block_reference() {
        let tx: Transaction =
            serde_json::from_value(json!({ "hash": "0xBBBB", "from": "0xcccc" })).unwrap();
        let data = BlockData {
            chain_id: 1,
            block: Some(Block {
                hash: "0xaaaa".to_string(),
                number: "1".to_string(),
                transactions: vec![tx],
                ..Default::default()
            }),
            ..Default::default()
        };
        let block = IndexedBlock {
            chain_id: 1,
            number: 1,
            latest: 1,
            data: &data,
        };

        let entries = HANDLER.index_entries(&block).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "0xbbbb");

        let value: Value = serde_json::from_str(&entries[0].1).unwrap();
        assert_eq!(value["blockHash"], "0xaaaa");
        assert_eq!(value["blockNumber"], "1");
        assert_eq!(value["from"], "0xcccc");
    }
}
