use serde_json::Value;

use crate::rpc_cache_handler::common::{self, ParamsSpec};
use crate::rpc_cache_handler::{IndexedBlock, RpcCacheHandler};

const LATEST_KEY: &str = "latest";

#[derive(Default, Clone)]
pub struct Handler;

impl RpcCacheHandler for Handler {
    type Request = ();

    fn method_name(&self) -> &'static str {
        "eth_blockNumber"
    }

    fn decode_params(&self, params: &Value) -> anyhow::Result<()> {
        common::require_array_params(params, ParamsSpec::Exact(0))?;
        Ok(())
    }

    fn cache_keys(&self, _: &()) -> Vec<String> {
        vec![LATEST_KEY.to_string()]
    }

    fn index_entries(&self, block: &IndexedBlock) -> anyhow::Result<Vec<(String, String)>> {
        Ok(vec![(LATEST_KEY.to_string(), block.latest.to_string())])
    }

    // the cached value is the bare decimal number
    fn to_json(&self, value: &str) -> anyhow::Result<Value> {
        Ok(Value::String(value.to_string()))
    }
}
