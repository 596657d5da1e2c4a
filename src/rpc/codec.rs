//! Wire encoding for `KgrValue` (§6: "serialised as a small dynamic-value
//! format"). A flat tagged encoding — the spec delegates the exact bytes
//! to an external collaborator, so this is our own, used consistently by
//! both ends of a connection.

use std::collections::BTreeMap;

use crate::error::NetError;
use crate::rpc::value::KgrValue;

const TAG_NULL: u8 = 0;
const TAG_INT: u8 = 1;
const TAG_FLOAT: u8 = 2;
const TAG_BOOL: u8 = 3;
const TAG_STRING: u8 = 4;
const TAG_ARRAY: u8 = 5;
const TAG_OBJECT: u8 = 6;

pub fn encode(value: &KgrValue) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(value, &mut out);
    out
}

fn encode_into(value: &KgrValue, out: &mut Vec<u8>) {
    match value {
        KgrValue::Null => out.push(TAG_NULL),
        KgrValue::Int(v) => {
            out.push(TAG_INT);
            out.extend_from_slice(&v.to_le_bytes());
        }
        KgrValue::Float(v) => {
            out.push(TAG_FLOAT);
            out.extend_from_slice(&v.to_le_bytes());
        }
        KgrValue::Bool(v) => {
            out.push(TAG_BOOL);
            out.push(*v as u8);
        }
        KgrValue::String(v) => {
            out.push(TAG_STRING);
            out.extend_from_slice(&(v.len() as u32).to_le_bytes());
            out.extend_from_slice(v.as_bytes());
        }
        KgrValue::Array(items) => {
            out.push(TAG_ARRAY);
            out.extend_from_slice(&(items.len() as u32).to_le_bytes());
            for item in items {
                encode_into(item, out);
            }
        }
        KgrValue::Object(fields) => {
            out.push(TAG_OBJECT);
            out.extend_from_slice(&(fields.len() as u32).to_le_bytes());
            for (key, item) in fields {
                out.extend_from_slice(&(key.len() as u32).to_le_bytes());
                out.extend_from_slice(key.as_bytes());
                encode_into(item, out);
            }
        }
    }
}

pub fn decode(buf: &[u8]) -> Result<KgrValue, NetError> {
    let (value, consumed) = decode_from(buf)?;
    if consumed != buf.len() {
        return Err(NetError::Protocol("trailing bytes after decoded value".to_string()));
    }
    Ok(value)
}

fn take<'a>(buf: &'a [u8], len: usize) -> Result<&'a [u8], NetError> {
    buf.get(..len).ok_or_else(|| NetError::Protocol("truncated value".to_string()))
}

fn decode_u32(buf: &[u8]) -> Result<(u32, usize), NetError> {
    let bytes = take(buf, 4)?;
    Ok((u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]), 4))
}

fn decode_from(buf: &[u8]) -> Result<(KgrValue, usize), NetError> {
    let tag = *buf.first().ok_or_else(|| NetError::Protocol("empty value".to_string()))?;
    let mut offset = 1;
    let value = match tag {
        TAG_NULL => KgrValue::Null,
        TAG_INT => {
            let bytes = take(&buf[offset..], 8)?;
            offset += 8;
            KgrValue::Int(i64::from_le_bytes(bytes.try_into().unwrap()))
        }
        TAG_FLOAT => {
            let bytes = take(&buf[offset..], 8)?;
            offset += 8;
            KgrValue::Float(f64::from_le_bytes(bytes.try_into().unwrap()))
        }
        TAG_BOOL => {
            let bytes = take(&buf[offset..], 1)?;
            offset += 1;
            KgrValue::Bool(bytes[0] != 0)
        }
        TAG_STRING => {
            let (len, used) = decode_u32(&buf[offset..])?;
            offset += used;
            let bytes = take(&buf[offset..], len as usize)?;
            offset += len as usize;
            KgrValue::String(String::from_utf8(bytes.to_vec()).map_err(|_| NetError::Protocol("invalid utf8".to_string()))?)
        }
        TAG_ARRAY => {
            let (len, used) = decode_u32(&buf[offset..])?;
            offset += used;
            let mut items = Vec::with_capacity(len as usize);
            for _ in 0..len {
                let (item, consumed) = decode_from(&buf[offset..])?;
                offset += consumed;
                items.push(item);
            }
            KgrValue::Array(items)
        }
        TAG_OBJECT => {
            let (len, used) = decode_u32(&buf[offset..])?;
            offset += used;
            let mut fields = BTreeMap::new();
            for _ in 0..len {
                let (key_len, used) = decode_u32(&buf[offset..])?;
                offset += used;
                let key_bytes = take(&buf[offset..], key_len as usize)?;
                offset += key_len as usize;
                let key = String::from_utf8(key_bytes.to_vec()).map_err(|_| NetError::Protocol("invalid utf8 key".to_string()))?;
                let (item, consumed) = decode_from(&buf[offset..])?;
                offset += consumed;
                fields.insert(key, item);
            }
            KgrValue::Object(fields)
        }
        other => return Err(NetError::Protocol(format!("unknown value tag {other}"))),
    };
    Ok((value, offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kgr_object;

    #[test]
    fn round_trips_nested_object() {
        let value = kgr_object! {
            "id" => 7i64,
            "name" => "editor",
            "ok" => true
        };
        let bytes = encode(&value);
        assert_eq!(decode(&bytes).unwrap(), value);
    }

    #[test]
    fn round_trips_array_and_float() {
        let value = KgrValue::Array(vec![KgrValue::Float(1.5), KgrValue::Null, KgrValue::Int(-3)]);
        let bytes = encode(&value);
        assert_eq!(decode(&bytes).unwrap(), value);
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let value = KgrValue::String("hello".to_string());
        let bytes = encode(&value);
        assert!(decode(&bytes[..bytes.len() - 1]).is_err());
    }
}
