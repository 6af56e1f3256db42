use anyhow::{bail, Context};
use serde_json::Value;

use crate::block_data::LogEntry;
use crate::rpc_cache_handler::common::{self, ParamsSpec};
use crate::rpc_cache_handler::{IndexedBlock, RpcCacheHandler};

/// Widest block range answered from the cache; wider filters are misses.
pub const MAX_BLOCK_RANGE: u64 = 10_000;

#[derive(Default, Clone)]
pub struct Handler;

#[derive(Debug, PartialEq)]
pub struct LogFilter {
    from_block: u64,
    to_block: u64,
    /// Any-of, lowercased. Empty matches every address.
    addresses: Vec<String>,
    /// Positional; `None` is a wildcard, otherwise any-of, lowercased.
    topics: Vec<Option<Vec<String>>>,
}

impl LogFilter {
    fn matches(&self, log: &LogEntry) -> bool {
        if !self.addresses.is_empty()
            && !self
                .addresses
                .iter()
                .any(|address| address.eq_ignore_ascii_case(&log.address))
        {
            return false;
        }

        // a log with fewer topics than the filter names never matches, even on wildcards
        if self.topics.len() > log.topics.len() {
            return false;
        }

        self.topics
            .iter()
            .enumerate()
            .all(|(position, wanted)| match wanted {
                None => true,
                Some(wanted) if wanted.is_empty() => true,
                Some(wanted) => log.topics.get(position).is_some_and(|topic| {
                    wanted.iter().any(|w| w.eq_ignore_ascii_case(topic))
                }),
            })
    }
}

fn extract_hex_list(value: &Value, field: &str) -> anyhow::Result<Vec<String>> {
    match value {
        Value::String(s) => Ok(vec![s.to_ascii_lowercase()]),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_ascii_lowercase)
                    .with_context(|| format!("`{field}` entries must be strings"))
            })
            .collect(),
        _ => bail!("`{field}` must be a string or a list of strings"),
    }
}

impl RpcCacheHandler for Handler {
    type Request = LogFilter;

    fn method_name(&self) -> &'static str {
        "eth_getLogs"
    }

    fn decode_params(&self, params: &Value) -> anyhow::Result<LogFilter> {
        let params = common::require_array_params(params, ParamsSpec::Exact(1))?;

        let filter = params[0].as_object().context("params[0] not a filter object")?;

        if filter.contains_key("blockHash") {
            bail!("blockHash filters are not cached");
        }

        let from_block = common::extract_block_number(filter.get("fromBlock").unwrap_or(&Value::Null))
            .context("`fromBlock` is not a valid block number")?;
        let to_block = common::extract_block_number(filter.get("toBlock").unwrap_or(&Value::Null))
            .context("`toBlock` is not a valid block number")?;

        if from_block > to_block {
            bail!("`fromBlock` is after `toBlock`");
        }
        if to_block - from_block >= MAX_BLOCK_RANGE {
            bail!("block range is wider than {MAX_BLOCK_RANGE} blocks");
        }

        let addresses = match filter.get("address") {
            None | Some(Value::Null) => vec![],
            Some(value) => extract_hex_list(value, "address")?,
        };

        let topics: Vec<Option<Vec<String>>> = match filter.get("topics") {
            None | Some(Value::Null) => vec![],
            Some(Value::Array(positions)) => positions
                .iter()
                .map(|position| match position {
                    Value::Null => Ok(None),
                    value => extract_hex_list(value, "topics").map(Some),
                })
                .collect::<anyhow::Result<_>>()?,
            Some(_) => bail!("`topics` must be a list"),
        };

        Ok(LogFilter {
            from_block,
            to_block,
            addresses,
            topics,
        })
    }

    fn cache_keys(&self, filter: &LogFilter) -> Vec<String> {
        (filter.from_block..=filter.to_block)
            .map(|number| number.to_string())
            .collect()
    }

    fn index_entries(&self, block: &IndexedBlock) -> anyhow::Result<Vec<(String, String)>> {
        Ok(vec![(
            block.number.to_string(),
            serde_json::to_string(&block.data.logs)?,
        )])
    }

    // values arrive in ascending block order
    fn merge(&self, filter: &LogFilter, values: Vec<String>) -> anyhow::Result<String> {
        let mut logs = Vec::new();
        for value in values {
            let block_logs: Vec<LogEntry> =
                serde_json::from_str(&value).context("cached logs are corrupted")?;
            logs.extend(block_logs.into_iter().filter(|log| filter.matches(log)));
        }

        Ok(serde_json::to_string(&logs)?)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    static HANDLER: Handler = Handler;

    fn logs_value(logs: Value) -> String {
        logs.to_string()
    }

    #[test]
    fn test_block_range() {
        let params = json!([
          {
            "address": ["0xB59F67A8BFF5D8CD03F6AC17265C550ED8F33907"],
            "fromBlock": "100",
            "toBlock": "0x66",
            "topics": [
              "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef",
              null,
              ["0x01", "0x02"]
            ]
          },
        ]);

        let filter = HANDLER.decode_params(&params).unwrap();
        assert_eq!(HANDLER.cache_keys(&filter), vec!["100", "101", "102"]);
        assert_eq!(
            filter.addresses,
            vec!["0xb59f67a8bff5d8cd03f6ac17265c550ed8f33907"]
        );
        assert_eq!(filter.topics[1], None);
        assert_eq!(
            filter.topics[2],
            Some(vec!["0x01".to_string(), "0x02".to_string()])
        );
    }

    #[test]
    fn test_key_order_and_whitespace_do_not_matter() {
        let a: Value = serde_json::from_str(r#"[{"fromBlock":"1","toBlock":"2"}]"#).unwrap();
        let b: Value =
            serde_json::from_str("[ {\n \"toBlock\" : \"2\",  \"fromBlock\": \"1\" } ]").unwrap();

        assert_eq!(
            HANDLER.decode_params(&a).unwrap(),
            HANDLER.decode_params(&b).unwrap()
        );
    }

    #[test]
    fn test_invalid_block_number() {
        let err = HANDLER
            .decode_params(&json!([{ "fromBlock": "0x12345ggggggg", "toBlock": "0x12345" }]))
            .unwrap_err();
        assert_eq!(err.to_string(), "`fromBlock` is not a valid block number");

        let err = HANDLER
            .decode_params(&json!([{ "fromBlock": "0x12345", "toBlock": "latest" }]))
            .unwrap_err();
        assert_eq!(err.to_string(), "`toBlock` is not a valid block number");

        let err = HANDLER
            .decode_params(&json!([{ "toBlock": "1" }]))
            .unwrap_err();
        assert_eq!(err.to_string(), "`fromBlock` is not a valid block number");
    }

    #[test]
    fn test_invalid_ranges() {
        let err = HANDLER
            .decode_params(&json!([{ "fromBlock": "5", "toBlock": "4" }]))
            .unwrap_err();
        assert_eq!(err.to_string(), "`fromBlock` is after `toBlock`");

        let err = HANDLER
            .decode_params(&json!([{ "fromBlock": "0", "toBlock": "10000" }]))
            .unwrap_err();
        assert_eq!(err.to_string(), "block range is wider than 10000 blocks");

        assert!(HANDLER
            .decode_params(&json!([{ "fromBlock": "0", "toBlock": "9999" }]))
            .is_ok());
    }

    #[test]
    fn test_block_hash_not_cached() {
        let err = HANDLER
            .decode_params(&json!([{ "blockHash": "0x1234" }]))
            .unwrap_err();
        assert_eq!(err.to_string(), "blockHash filters are not cached");
    }

    #[test]
    fn test_merge_filters_in_block_order() {
        let filter = HANDLER
            .decode_params(&json!([{
                "fromBlock": "1",
                "toBlock": "2",
                "address": "0xCCCC",
                "topics": [["0xeeee", "0xffff"]]
            }]))
            .unwrap();

        let merged = HANDLER
            .merge(
                &filter,
                vec![
                    logs_value(json!([
                        { "address": "0xcccc", "topics": ["0xeeee"], "logIndex": "0x0" },
                        { "address": "0xdddd", "topics": ["0xeeee"], "logIndex": "0x1" }
                    ])),
                    logs_value(json!([
                        { "address": "0xcccc", "topics": [], "logIndex": "0x0" },
                        { "address": "0xcccc", "topics": ["0xffff", "0x01"], "logIndex": "0x1" }
                    ])),
                ],
            )
            .unwrap();

        let merged: Value = serde_json::from_str(&merged).unwrap();
        assert_eq!(
            merged,
            json!([
                { "address": "0xcccc", "topics": ["0xeeee"], "logIndex": "0x0" },
                { "address": "0xcccc", "topics": ["0xffff", "0x01"], "logIndex": "0x1" }
            ])
        );
    }

    #[test]
    fn test_trailing_wildcard_requires_topic() {
        let filter = HANDLER
            .decode_params(&json!([{
                "fromBlock": "1",
                "toBlock": "1",
                "topics": ["0xaa", null]
            }]))
            .unwrap();

        let merged = HANDLER
            .merge(
                &filter,
                vec![logs_value(json!([
                    { "address": "0x01", "topics": ["0xaa"], "logIndex": "0x0" },
                    { "address": "0x01", "topics": ["0xaa", "0xbb"], "logIndex": "0x1" },
                    { "address": "0x01", "topics": ["0xbb", "0xaa"], "logIndex": "0x2" }
                ]))],
            )
            .unwrap();

        let merged: Value = serde_json::from_str(&merged).unwrap();
        assert_eq!(
            merged,
            json!([{ "address": "0x01", "topics": ["0xaa", "0xbb"], "logIndex": "0x1" }])
        );
    }

    #[test]
    fn test_merge_without_filter_keeps_everything() {
        let filter = HANDLER
            .decode_params(&json!([{ "fromBlock": "1", "toBlock": "2" }]))
            .unwrap();

        let merged = HANDLER
            .merge(
                &filter,
                vec![
                    logs_value(json!([{ "address": "0x01", "topics": [] }])),
                    logs_value(json!([])),
                ],
            )
            .unwrap();

        assert_eq!(merged, r#"[{"address":"0x01","topics":[]}]"#);
    }
}
