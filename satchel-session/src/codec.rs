//! Payload codecs
//!
//! A codec turns the attribute mapping into the bytes a handler stores and
//! back. Decoding never fails: an empty, truncated or foreign payload reads
//! as an empty mapping so a corrupt record degrades to a fresh session.

use satchel_core::{codec_error, SatchelResult, Serialization};
use serde_json::{Map, Value};
use std::fmt::Debug;
use tracing::warn;

pub trait Codec: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn encode(&self, attributes: &Map<String, Value>) -> SatchelResult<Vec<u8>>;

    fn decode(&self, payload: &[u8]) -> Map<String, Value>;
}

/// Codec for a configured [`Serialization`]
pub fn codec_for(serialization: Serialization) -> Box<dyn Codec> {
    match serialization {
        Serialization::Native => Box::new(NativeCodec),
        Serialization::Json => Box::new(JsonCodec),
    }
}

/// Compact binary MessagePack encoding
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeCodec;

impl Codec for NativeCodec {
    fn name(&self) -> &'static str {
        "native"
    }

    fn encode(&self, attributes: &Map<String, Value>) -> SatchelResult<Vec<u8>> {
        rmp_serde::to_vec(attributes)
            .map_err(|e| codec_error!("Failed to encode session payload", "native_codec", e))
    }

    fn decode(&self, payload: &[u8]) -> Map<String, Value> {
        if payload.is_empty() {
            return Map::new();
        }

        match rmp_serde::from_slice::<Value>(payload) {
            Ok(value) => into_mapping(value, self.name()),
            Err(e) => {
                warn!(codec = self.name(), error = %e, "Discarding undecodable session payload");
                Map::new()
            }
        }
    }
}

/// JSON object whose top-level keys mirror the attribute mapping
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode(&self, attributes: &Map<String, Value>) -> SatchelResult<Vec<u8>> {
        Ok(serde_json::to_vec(attributes)?)
    }

    fn decode(&self, payload: &[u8]) -> Map<String, Value> {
        if payload.iter().all(u8::is_ascii_whitespace) {
            return Map::new();
        }

        match serde_json::from_slice::<Value>(payload) {
            Ok(value) => into_mapping(value, self.name()),
            Err(e) => {
                warn!(codec = self.name(), error = %e, "Discarding undecodable session payload");
                Map::new()
            }
        }
    }
}

fn into_mapping(value: Value, codec: &str) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => {
            warn!(codec, kind = kind_of(&other), "Session payload is not a mapping");
            Map::new()
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Map<String, Value> {
        match json!({
            "_token": "abc",
            "foo": "bar",
            "count": 3,
            "ratio": 0.5,
            "nested": {"list": [1, null, true]},
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_native_roundtrip_preserves_order() {
        let codec = NativeCodec;
        let payload = codec.encode(&sample()).unwrap();
        let decoded = codec.decode(&payload);

        assert_eq!(decoded, sample());
        let keys: Vec<&String> = decoded.keys().collect();
        assert_eq!(keys, vec!["_token", "foo", "count", "ratio", "nested"]);
    }

    #[test]
    fn test_json_payload_shape() {
        let payload = JsonCodec.encode(&sample()).unwrap();
        let text = String::from_utf8(payload).unwrap();
        assert!(text.starts_with(r#"{"_token":"abc","foo":"bar""#));
    }

    #[test]
    fn test_decode_tolerates_garbage() {
        for codec in [codec_for(Serialization::Native), codec_for(Serialization::Json)] {
            assert!(codec.decode(b"").is_empty());
            assert!(codec.decode(b"\xff\x00garbage").is_empty());
        }
        assert!(JsonCodec.decode(b"   ").is_empty());
        assert!(JsonCodec.decode(b"[1, 2]").is_empty());
        assert!(JsonCodec.decode(b"{\"truncated\":").is_empty());
    }

    #[test]
    fn test_codec_for() {
        assert_eq!(codec_for(Serialization::Native).name(), "native");
        assert_eq!(codec_for(Serialization::Json).name(), "json");
    }
}
