use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A batch of block records, possibly spanning several chains.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlocksData {
    #[serde(default)]
    pub blocks: Vec<BlockData>,
}

/// One block with the logs and traces attributed to it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockData {
    pub chain_id: u64,
    pub block: Option<Block>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    #[serde(default)]
    pub traces: Vec<Trace>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub hash: String,
    /// Decimal block number; `0x` hex is tolerated.
    pub number: String,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub uncles: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub address: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trace {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default)]
    pub trace_address: Vec<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BlocksData {
    /// Deserializes a batch record by record, so one bad record does not
    /// reject the others. Returns the batch and the number of dropped records.
    pub fn from_value_lenient(mut value: Value) -> (Self, usize) {
        let records = match value.get_mut("blocks").map(Value::take) {
            Some(Value::Array(records)) => records,
            _ => return (Self::default(), 0),
        };

        let mut skipped = 0;
        let blocks = records
            .into_iter()
            .filter_map(|record| match serde_json::from_value::<BlockData>(record) {
                Ok(block) => Some(block),
                Err(err) => {
                    tracing::warn!("dropping undecodable block record: {err}");
                    skipped += 1;
                    None
                }
            })
            .collect();

        (Self { blocks }, skipped)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_fields_are_kept() {
        let record: BlockData = serde_json::from_value(json!({
            "chainId": 1,
            "block": {
                "hash": "0xaaaa",
                "number": "1",
                "parentHash": "0x9999",
                "transactions": [{ "hash": "0xbbbb", "from": "0xcccc" }],
                "uncles": ["0xdddd"]
            },
            "logs": [{ "address": "0xcccc", "topics": ["0xeeee"], "logIndex": "0x0" }],
            "traces": [{ "action": { "from": "0xcccc" }, "traceAddress": [1] }]
        }))
        .unwrap();

        let block = record.block.as_ref().unwrap();
        assert_eq!(block.extra["parentHash"], "0x9999");
        assert_eq!(block.transactions[0].extra["from"], "0xcccc");
        assert_eq!(record.logs[0].extra["logIndex"], "0x0");
        assert_eq!(record.traces[0].trace_address, vec![1]);

        let encoded = serde_json::to_value(&record).unwrap();
        assert_eq!(encoded["block"]["parentHash"], "0x9999");
        assert_eq!(encoded["traces"][0]["traceAddress"], json!([1]));
        assert!(encoded["traces"][0].get("result").is_none());
    }

    #[test]
    fn test_lenient_batch() {
        let (batch, skipped) = BlocksData::from_value_lenient(json!({
            "blocks": [
                { "chainId": 1, "block": { "hash": "0xaaaa", "number": "1" } },
                { "chainId": "not a number" },
                { "chainId": 2, "block": { "hash": "0xffff", "number": "100" } }
            ]
        }));

        assert_eq!(skipped, 1);
        assert_eq!(batch.blocks.len(), 2);
        assert_eq!(batch.blocks[1].chain_id, 2);
    }

    #[test]
    fn test_lenient_batch_without_blocks() {
        let (batch, skipped) = BlocksData::from_value_lenient(json!({ "something": [] }));
        assert!(batch.blocks.is_empty());
        assert_eq!(skipped, 0);

        let (batch, _) = BlocksData::from_value_lenient(json!([1, 2, 3]));
        assert!(batch.blocks.is_empty());
    }
}
