pub mod memory_backend;

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use anyhow::Context;
use dashmap::DashMap;
use serde_json::Value;

use crate::block_data::{BlockData, BlocksData};
use crate::rpc_cache_handler::{common, CacheMethod, IndexedBlock, MethodRegistry};

/// Flat key/value store with per-entry expiry. No JSON-RPC knowledge.
pub trait CacheBackend: Send + Sync {
    /// `None` if the key was never written or its TTL has elapsed.
    fn read(&self, key: &str) -> Option<String>;
    fn write(&self, key: String, value: String, ttl: Duration);
    /// Drops every expired entry and returns how many were dropped.
    fn remove_expired(&self) -> usize;
    fn len(&self) -> usize;
}

/// Outcome of one [`JsonRpcCache::append`] call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub ingested: usize,
    pub skipped: usize,
}

/// Chain-aware cache answering read-only JSON-RPC methods from ingested block
/// data.
///
/// Every entry lives for the TTL given at construction, counted from its own
/// write. `append` holds the write side of `gate` while a batch lands, and
/// reads hold the read side while they collect their keys, so a reader never
/// observes a block with only part of its method entries written.
pub struct JsonRpcCache {
    ttl: Duration,
    backend: Box<dyn CacheBackend>,
    registry: MethodRegistry,
    latest_blocks: DashMap<u64, u64>,
    gate: RwLock<()>,
}

fn cache_key(chain_id: u64, method: &str, params_key: &str) -> String {
    format!("{chain_id}:{method}:{params_key}")
}

impl JsonRpcCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_registry(ttl, MethodRegistry::with_default_handlers())
    }

    pub fn with_registry(ttl: Duration, registry: MethodRegistry) -> Self {
        Self::with_backend(ttl, registry, Box::new(memory_backend::MemoryBackend::new()))
    }

    pub fn with_backend(
        ttl: Duration,
        registry: MethodRegistry,
        backend: Box<dyn CacheBackend>,
    ) -> Self {
        Self {
            ttl,
            backend,
            registry,
            latest_blocks: DashMap::new(),
            gate: RwLock::new(()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn registry(&self) -> &MethodRegistry {
        &self.registry
    }

    /// Highest block number ever ingested for the chain.
    pub fn latest_block(&self, chain_id: u64) -> Option<u64> {
        self.latest_blocks.get(&chain_id).map(|latest| *latest)
    }

    /// Number of live or not yet swept entries.
    pub fn len(&self) -> usize {
        self.backend.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ingests a batch. A record without a block or a parsable number is
    /// skipped without affecting the others. A handler failing on a record
    /// only loses that handler's entries. Re-ingesting a block overwrites its
    /// previous entries.
    pub fn append(&self, batch: &BlocksData) -> IngestReport {
        let mut report = IngestReport::default();
        let _gate = self.gate.write().unwrap_or_else(PoisonError::into_inner);

        for data in &batch.blocks {
            match self.index_block(data) {
                Ok((number, entries)) => {
                    self.latest_blocks
                        .entry(data.chain_id)
                        .and_modify(|latest| *latest = (*latest).max(number))
                        .or_insert(number);

                    for (key, value) in entries {
                        self.backend.write(key, value, self.ttl);
                    }
                    report.ingested += 1;
                }
                Err(err) => {
                    tracing::warn!(chain_id = data.chain_id, "skipping block record: {err:#}");
                    report.skipped += 1;
                }
            }
        }

        tracing::debug!(
            ingested = report.ingested,
            skipped = report.skipped,
            "appended block batch"
        );

        report
    }

    fn index_block(&self, data: &BlockData) -> anyhow::Result<(u64, Vec<(String, String)>)> {
        let block = data.block.as_ref().context("record has no block")?;
        let number = common::parse_block_number(&block.number).context("invalid block number")?;

        let latest = self
            .latest_block(data.chain_id)
            .map_or(number, |latest| latest.max(number));

        let indexed = IndexedBlock {
            chain_id: data.chain_id,
            number,
            latest,
            data,
        };

        let mut entries = Vec::new();
        for handler in self.registry.handlers() {
            let method = handler.method_name();
            let handler_entries = match handler.index_entries(&indexed) {
                Ok(handler_entries) => handler_entries,
                Err(err) => {
                    tracing::warn!(
                        chain_id = data.chain_id,
                        method,
                        "{method} cannot index block {number}: {err:#}"
                    );
                    continue;
                }
            };

            entries.extend(
                handler_entries
                    .into_iter()
                    .map(|(params_key, value)| (cache_key(data.chain_id, method, &params_key), value)),
            );
        }

        Ok((number, entries))
    }

    /// Looks up a JSON-RPC call by its raw `params` array. Unknown methods,
    /// undecodable params, and partially cached ranges are all misses.
    pub fn get(&self, chain_id: u64, method: &str, raw_params: &[u8]) -> Option<String> {
        let params: Value = match serde_json::from_slice(raw_params) {
            Ok(params) => params,
            Err(err) => {
                tracing::debug!(chain_id, method, "params are not valid json: {err}");
                return None;
            }
        };

        self.resolve(chain_id, method, &params)
            .map(|(_, value)| value)
    }

    /// Like [`JsonRpcCache::get`], returning the result ready to be embedded in
    /// a JSON-RPC response.
    pub fn get_value(&self, chain_id: u64, method: &str, params: &Value) -> Option<Value> {
        let (handler, value) = self.resolve(chain_id, method, params)?;

        match handler.to_json(&value) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::error!(chain_id, method, "fail to decode cached value: {err:#}");
                None
            }
        }
    }

    fn resolve(&self, chain_id: u64, method: &str, params: &Value) -> Option<(&dyn CacheMethod, String)> {
        let handler = self.registry.get(method)?;

        let _gate = self.gate.read().unwrap_or_else(PoisonError::into_inner);
        let read = |params_key: &str| self.backend.read(&cache_key(chain_id, method, params_key));

        match handler.resolve(params, &read) {
            Ok(Some(value)) => Some((handler, value)),
            Ok(None) => None,
            Err(err) => {
                tracing::debug!(
                    chain_id,
                    method,
                    params = format_args!("{}", params),
                    "not served from cache: {err:#}"
                );
                None
            }
        }
    }

    /// Active sweep of expired entries; reads expire entries lazily anyway.
    pub fn remove_expired(&self) -> usize {
        self.backend.remove_expired()
    }
}
