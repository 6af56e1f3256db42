//! Chain-aware JSON-RPC response cache.
//!
//! Block, log and trace data is pushed in per chain through
//! [`JsonRpcCache::append`]; a closed set of read-only JSON-RPC methods is then
//! answered from it through [`JsonRpcCache::get`]. Every failure on the read
//! path is a miss, so a caller can always fall through to the upstream node.

pub mod block_data;
pub mod cache;
pub mod rpc_cache_handler;

pub use block_data::{Block, BlockData, BlocksData, LogEntry, Trace, Transaction};
pub use cache::{IngestReport, JsonRpcCache};
pub use rpc_cache_handler::{IndexedBlock, MethodRegistry, RpcCacheHandler};
