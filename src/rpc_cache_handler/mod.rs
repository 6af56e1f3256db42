use std::collections::HashMap;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::block_data::BlockData;

pub(crate) mod common;
mod eth_block_number;
mod eth_get_block_by_hash;
mod eth_get_block_by_number;
mod eth_get_logs;
mod eth_get_transaction_by_hash;
mod trace_block;

/// A block record that passed validation, as seen by the handlers while it is
/// being ingested.
pub struct IndexedBlock<'a> {
    pub chain_id: u64,
    pub number: u64,
    /// Highest block number of the chain once this record is counted.
    pub latest: u64,
    pub data: &'a BlockData,
}

/// One cacheable JSON-RPC method.
///
/// Keys returned by a handler are local to its method and chain; the cache
/// scopes them. A range method returns one key per block and gets all the
/// cached values back in key order in [`RpcCacheHandler::merge`].
pub trait RpcCacheHandler: Send + Sync {
    type Request;

    fn method_name(&self) -> &'static str;

    fn decode_params(&self, params: &Value) -> Result<Self::Request>;

    fn cache_keys(&self, request: &Self::Request) -> Vec<String>;

    fn index_entries(&self, block: &IndexedBlock) -> Result<Vec<(String, String)>>;

    fn merge(&self, _request: &Self::Request, values: Vec<String>) -> Result<String> {
        values.into_iter().next().context("no cached value")
    }

    fn to_json(&self, value: &str) -> Result<Value> {
        serde_json::from_str(value).context("cached value is not valid json")
    }
}

/// Object-safe view over any [`RpcCacheHandler`], used by the registry.
pub trait CacheMethod: Send + Sync {
    fn method_name(&self) -> &'static str;

    /// Resolves `params` through `read`. `Ok(None)` as soon as one key is not
    /// readable.
    fn resolve(&self, params: &Value, read: &dyn Fn(&str) -> Option<String>)
        -> Result<Option<String>>;

    fn index_entries(&self, block: &IndexedBlock) -> Result<Vec<(String, String)>>;

    fn to_json(&self, value: &str) -> Result<Value>;
}

impl<H: RpcCacheHandler> CacheMethod for H {
    fn method_name(&self) -> &'static str {
        RpcCacheHandler::method_name(self)
    }

    fn resolve(
        &self,
        params: &Value,
        read: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Option<String>> {
        let request = self.decode_params(params)?;
        let keys = self.cache_keys(&request);

        let mut values = Vec::with_capacity(keys.len());
        for key in &keys {
            match read(key) {
                Some(value) => values.push(value),
                None => return Ok(None),
            }
        }

        self.merge(&request, values).map(Some)
    }

    fn index_entries(&self, block: &IndexedBlock) -> Result<Vec<(String, String)>> {
        RpcCacheHandler::index_entries(self, block)
    }

    fn to_json(&self, value: &str) -> Result<Value> {
        RpcCacheHandler::to_json(self, value)
    }
}

pub type CacheMethodFactory = fn() -> Box<dyn CacheMethod>;

pub fn get_factory<T>() -> CacheMethodFactory
where
    T: Default + RpcCacheHandler + 'static,
{
    || Box::<T>::default()
}

pub fn factories() -> Vec<CacheMethodFactory> {
    vec![
        get_factory::<eth_block_number::Handler>(),
        get_factory::<eth_get_block_by_hash::Handler>(),
        get_factory::<eth_get_block_by_number::Handler>(),
        get_factory::<eth_get_logs::Handler>(),
        get_factory::<eth_get_transaction_by_hash::Handler>(),
        get_factory::<trace_block::Handler>(),
    ]
}

/// Handlers by method name.
#[derive(Default)]
pub struct MethodRegistry {
    handlers: HashMap<&'static str, Box<dyn CacheMethod>>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_handlers() -> Self {
        let mut registry = Self::new();
        for factory in factories() {
            registry.register(factory());
        }
        registry
    }

    /// Adds a handler, replacing any previous one for the same method.
    pub fn register(&mut self, handler: Box<dyn CacheMethod>) {
        self.handlers.insert(handler.method_name(), handler);
    }

    pub fn get(&self, method: &str) -> Option<&dyn CacheMethod> {
        self.handlers.get(method).map(|handler| handler.as_ref())
    }

    pub fn handlers(&self) -> impl Iterator<Item = &dyn CacheMethod> {
        self.handlers.values().map(|handler| handler.as_ref())
    }

    pub fn method_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_handlers() {
        let registry = MethodRegistry::with_default_handlers();
        assert_eq!(
            registry.method_names(),
            vec![
                "eth_blockNumber",
                "eth_getBlockByHash",
                "eth_getBlockByNumber",
                "eth_getLogs",
                "eth_getTransactionByHash",
                "trace_block",
            ]
        );
        assert!(registry.get("eth_call").is_none());
    }

    #[test]
    fn test_resolve_misses_on_first_unreadable_key() {
        let registry = MethodRegistry::with_default_handlers();
        let handler = registry.get("eth_getLogs").unwrap();
        let params = serde_json::json!([{ "fromBlock": "1", "toBlock": "3" }]);

        let read = |key: &str| (key != "2").then(|| "[]".to_string());
        assert_eq!(handler.resolve(&params, &read).unwrap(), None);

        let read = |_: &str| Some("[]".to_string());
        assert_eq!(handler.resolve(&params, &read).unwrap(), Some("[]".to_string()));
    }
}
