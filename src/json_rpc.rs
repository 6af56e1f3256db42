use actix_web::HttpResponse;
use serde::Serialize;
use serde_json::{json, Value};

const JSON_RPC_VERSION: &str = "2.0";

#[derive(PartialEq, Eq, Hash, Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(u64),
    String(String),
}

impl TryFrom<Value> for RequestId {
    type Error = anyhow::Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Number(number) => number
                .as_u64()
                .map(RequestId::Number)
                .ok_or_else(|| anyhow::anyhow!("invalid request id")),
            Value::String(string) => Ok(RequestId::String(string)),
            _ => Err(anyhow::anyhow!("invalid request id")),
        }
    }
}

/// A call extracted from the incoming body, kept with its position in the batch.
#[derive(Debug, Clone)]
pub struct RpcCall {
    pub index: usize,
    pub id: RequestId,
    pub method: String,
    pub params: Value,
}

impl RpcCall {
    pub fn parse(index: usize, mut raw: Value) -> Result<Self, (Option<RequestId>, DefinedError)> {
        if !raw.is_object() {
            return Err((None, DefinedError::InvalidRequest));
        }

        let id = RequestId::try_from(raw["id"].take()).map_err(|_| (None, DefinedError::InvalidRequest))?;

        let method = match raw["method"].take() {
            Value::String(method) => method,
            _ => return Err((Some(id), DefinedError::MethodNotFound)),
        };

        Ok(Self {
            index,
            id,
            method,
            params: raw["params"].take(),
        })
    }
}

impl Serialize for RpcCall {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        json!({
            "jsonrpc": JSON_RPC_VERSION,
            "id": self.id,
            "method": self.method,
            "params": self.params,
        })
        .serialize(serializer)
    }
}

#[derive(Serialize, Clone, Debug)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Option<RequestId>,
    #[serde(flatten)]
    pub payload: Payload,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "lowercase")]
pub enum Payload {
    Result(Value),
    Error(Value),
}

impl JsonRpcResponse {
    pub fn from_result(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSON_RPC_VERSION,
            id: Some(id),
            payload: Payload::Result(result),
        }
    }

    pub fn from_error(id: Option<RequestId>, error: DefinedError) -> Self {
        Self::from_custom_error(id, error.to_value())
    }

    /// Error object relayed as is, e.g. from the upstream node.
    pub fn from_custom_error(id: Option<RequestId>, error: Value) -> Self {
        Self {
            jsonrpc: JSON_RPC_VERSION,
            id,
            payload: Payload::Error(error),
        }
    }
}

impl From<JsonRpcResponse> for HttpResponse {
    fn from(val: JsonRpcResponse) -> Self {
        HttpResponse::Ok().json(val)
    }
}

/// Source: https://www.jsonrpc.org/specification
#[derive(Clone, Debug)]
pub enum DefinedError {
    InvalidRequest,
    MethodNotFound,
    InternalError(Option<Value>),
}

impl DefinedError {
    pub fn code_and_message(&self) -> (i64, &'static str) {
        match self {
            DefinedError::InvalidRequest => (-32600, "JSON is not a valid request object"),
            DefinedError::MethodNotFound => (-32601, "Method does not exist"),
            DefinedError::InternalError(_) => (-32603, "Internal JSON-RPC error"),
        }
    }

    pub fn to_value(&self) -> Value {
        let (code, message) = self.code_and_message();
        let mut error = json!({ "code": code, "message": message });

        if let DefinedError::InternalError(Some(data)) = self {
            error["data"] = data.clone();
        }

        error
    }
}
