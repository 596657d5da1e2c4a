//! RPC envelope (§6): `{id, method, params}` requests, `{id, result}` or
//! `{id, error}` replies, carried as `Data` frames over a `CryptoSocket`.

use crate::error::NetError;
use crate::rpc::codec;
use crate::rpc::value::KgrValue;

#[derive(Debug, Clone, PartialEq)]
pub enum RpcEnvelope {
    Request { id: i64, method: String, params: KgrValue },
    Result { id: i64, result: KgrValue },
    Error { id: i64, error: String },
}

impl RpcEnvelope {
    pub fn to_bytes(&self) -> Vec<u8> {
        codec::encode(&self.to_value())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<RpcEnvelope, NetError> {
        Self::from_value(&codec::decode(bytes)?)
    }

    fn to_value(&self) -> KgrValue {
        match self {
            RpcEnvelope::Request { id, method, params } => {
                crate::kgr_object! { "id" => *id, "method" => method.as_str(), "params" => params.clone() }
            }
            RpcEnvelope::Result { id, result } => {
                crate::kgr_object! { "id" => *id, "result" => result.clone() }
            }
            RpcEnvelope::Error { id, error } => {
                crate::kgr_object! { "id" => *id, "error" => error.as_str() }
            }
        }
    }

    fn from_value(value: &KgrValue) -> Result<RpcEnvelope, NetError> {
        let object = value.as_object().ok_or_else(|| NetError::Protocol("envelope is not an object".to_string()))?;
        let id = object.get("id").and_then(KgrValue::as_i64).ok_or_else(|| NetError::Protocol("envelope missing id".to_string()))?;
        if let Some(method) = object.get("method").and_then(KgrValue::as_str) {
            let params = object.get("params").cloned().unwrap_or(KgrValue::Null);
            return Ok(RpcEnvelope::Request { id, method: method.to_string(), params });
        }
        if let Some(error) = object.get("error").and_then(KgrValue::as_str) {
            return Ok(RpcEnvelope::Error { id, error: error.to_string() });
        }
        if let Some(result) = object.get("result") {
            return Ok(RpcEnvelope::Result { id, result: result.clone() });
        }
        Err(NetError::Protocol("envelope has neither method, result nor error".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips() {
        let envelope = RpcEnvelope::Request { id: 1, method: "ping".to_string(), params: KgrValue::Null };
        assert_eq!(RpcEnvelope::from_bytes(&envelope.to_bytes()).unwrap(), envelope);
    }

    #[test]
    fn result_round_trips() {
        let envelope = RpcEnvelope::Result { id: 2, result: KgrValue::String("pong".to_string()) };
        assert_eq!(RpcEnvelope::from_bytes(&envelope.to_bytes()).unwrap(), envelope);
    }

    #[test]
    fn error_round_trips() {
        let envelope = RpcEnvelope::Error { id: 3, error: "boom".to_string() };
        assert_eq!(RpcEnvelope::from_bytes(&envelope.to_bytes()).unwrap(), envelope);
    }
}
