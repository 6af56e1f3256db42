use anyhow::Context;
use serde_json::Value;

use crate::rpc_cache_handler::common::{self, ParamsSpec};
use crate::rpc_cache_handler::{IndexedBlock, RpcCacheHandler};

#[derive(Default, Clone)]
pub struct Handler;

#[derive(Debug)]
pub struct Request {
    hash: String,
    include_full_tx: bool,
}

impl RpcCacheHandler for Handler {
    type Request = Request;

    fn method_name(&self) -> &'static str {
        "eth_getBlockByHash"
    }

    fn decode_params(&self, params: &Value) -> anyhow::Result<Request> {
        let params = common::require_array_params(params, ParamsSpec::Between(1, 2))?;

        let hash = common::extract_hash(&params[0]).context("params[0] not a valid block hash")?;
        let include_full_tx = common::extract_include_full_tx(params, 1)?;

        Ok(Request {
            hash,
            include_full_tx,
        })
    }

    fn cache_keys(&self, request: &Request) -> Vec<String> {
        vec![request.hash.clone()]
    }

    fn index_entries(&self, block: &IndexedBlock) -> anyhow::Result<Vec<(String, String)>> {
        let body = block.data.block.as_ref().context("record has no block")?;
        let hash = common::normalize_hash(&body.hash).context("block hash is invalid")?;

        Ok(vec![(hash, serde_json::to_string(body)?)])
    }

    fn merge(&self, request: &Request, values: Vec<String>) -> anyhow::Result<String> {
        let stored = values.into_iter().next().context("no cached block")?;
        common::format_block(stored, request.include_full_tx)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::block_data::{Block, BlockData};
    use serde_json::json;

    static HANDLER: Handler = Handler;

    #[test]
    fn test_hash_is_case_insensitive() {
        let request = HANDLER.decode_params(&json!(["0xAAAA", true])).unwrap();
        assert_eq!(HANDLER.cache_keys(&request), vec!["0xaaaa"]);
    }

    #[test]
    fn test_invalid_hash() {
        let err = HANDLER.decode_params(&json!(["0xzz"])).unwrap_err();
        assert_eq!(err.to_string(), "params[0] not a valid block hash");
    }

    #[test]
    fn test_invalid_block_hash_fails_indexing() {
        let data = BlockData {
            chain_id: 1,
            block: Some(Block {
                hash: "not-a-hash".to_string(),
                number: "1".to_string(),
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

        assert!(HANDLER.index_entries(&block).is_err());
    }
}
