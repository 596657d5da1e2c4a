//! `KgrValue` — the small dynamic-value format method messages are carried
//! in over a `Pipe` (§6: "null / i64 / f64 / bool / utf8-string / array /
//! object(string→value)").
//!
//! Exact wire serialisation of the RPC envelope is delegated to an external
//! collaborator per §6; this type is the in-process representation every
//! `Service`/`Pipe` passes around, and (behind the `serde` feature, the way
//! the teacher gates its own optional `serde` support) the shape that gets
//! serialised when a `NetInterface` needs to put one on the wire.

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum KgrValue {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
    Array(Vec<KgrValue>),
    Object(BTreeMap<String, KgrValue>),
}

impl KgrValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            KgrValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            KgrValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, KgrValue>> {
        match self {
            KgrValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn field(&self, key: &str) -> Option<&KgrValue> {
        self.as_object().and_then(|map| map.get(key))
    }
}

impl From<i64> for KgrValue {
    fn from(v: i64) -> Self {
        KgrValue::Int(v)
    }
}

impl From<&str> for KgrValue {
    fn from(v: &str) -> Self {
        KgrValue::String(v.to_string())
    }
}

impl From<String> for KgrValue {
    fn from(v: String) -> Self {
        KgrValue::String(v)
    }
}

impl From<bool> for KgrValue {
    fn from(v: bool) -> Self {
        KgrValue::Bool(v)
    }
}

/// Builds a `KgrValue::Object` from `(key, value)` pairs.
#[macro_export]
macro_rules! kgr_object {
    ($($key:expr => $value:expr),* $(,)?) => {{
        let mut map = std::collections::BTreeMap::new();
        $(map.insert($key.to_string(), $crate::rpc::value::KgrValue::from($value));)*
        $crate::rpc::value::KgrValue::Object(map)
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_field_lookup() {
        let value = kgr_object! { "service" => "editor", "pipe" => 7i64 };
        assert_eq!(value.field("service").and_then(|v| v.as_str()), Some("editor"));
        assert_eq!(value.field("pipe").and_then(|v| v.as_i64()), Some(7));
        assert_eq!(value.field("missing"), None);
    }
}
