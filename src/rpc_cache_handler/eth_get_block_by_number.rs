use anyhow::Context;
use serde_json::Value;

use crate::rpc_cache_handler::common::{self, ParamsSpec};
use crate::rpc_cache_handler::{IndexedBlock, RpcCacheHandler};

#[derive(Default, Clone)]
pub struct Handler;

#[derive(Debug)]
pub struct Request {
    number: u64,
    include_full_tx: bool,
}

impl RpcCacheHandler for Handler {
    type Request = Request;

    fn method_name(&self) -> &'static str {
        "eth_getBlockByNumber"
    }

    fn decode_params(&self, params: &Value) -> anyhow::Result<Request> {
        let params = common::require_array_params(params, ParamsSpec::Between(1, 2))?;

        let number = common::extract_block_number(&params[0])
            .context("params[0] not a valid block number")?;
        let include_full_tx = common::extract_include_full_tx(params, 1)?;

        Ok(Request {
            number,
            include_full_tx,
        })
    }

    // both renderings come from the same stored block
    fn cache_keys(&self, request: &Request) -> Vec<String> {
        vec![request.number.to_string()]
    }

    fn index_entries(&self, block: &IndexedBlock) -> anyhow::Result<Vec<(String, String)>> {
        let body = block.data.block.as_ref().context("record has no block")?;
        Ok(vec![(block.number.to_string(), serde_json::to_string(body)?)])
    }

    fn merge(&self, request: &Request, values: Vec<String>) -> anyhow::Result<String> {
        let stored = values.into_iter().next().context("no cached block")?;
        common::format_block(stored, request.include_full_tx)
    }
}
