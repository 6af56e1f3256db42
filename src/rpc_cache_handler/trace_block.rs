use anyhow::Context;
use serde_json::Value;

use crate::rpc_cache_handler::common::{self, ParamsSpec};
use crate::rpc_cache_handler::{IndexedBlock, RpcCacheHandler};

#[derive(Default, Clone)]
pub struct Handler;

impl RpcCacheHandler for Handler {
    type Request = u64;

    fn method_name(&self) -> &'static str {
        "trace_block"
    }

    fn decode_params(&self, params: &Value) -> anyhow::Result<u64> {
        let params = common::require_array_params(params, ParamsSpec::Exact(1))?;
        common::extract_block_number(&params[0]).context("params[0] not a valid block number")
    }

    fn cache_keys(&self, number: &u64) -> Vec<String> {
        vec![number.to_string()]
    }

    fn index_entries(&self, block: &IndexedBlock) -> anyhow::Result<Vec<(String, String)>> {
        Ok(vec![(
            block.number.to_string(),
            serde_json::to_string(&block.data.traces)?,
        )])
    }
}
