//! Decoding of inscription metadata.
//!
//! Inscriptions may carry a metadata blob: CBOR, hex-encoded by the ord
//! server. [`decode_metadata`] turns it into JSON for storage. Decoding
//! never fails the harvest; an undecodable blob simply has no decoded
//! form.
//!
//! CBOR has a few things JSON does not, mapped as follows:
//!
//! | CBOR | JSON |
//! |------|------|
//! | byte string | lowercase hex string |
//! | tag | the tagged value |
//! | integer outside the 64-bit range | decimal string |
//! | integer / bool map key | its decimal / `true` / `false` text |
//! | NaN or infinite float | `null` |
//!
//! Nesting (arrays, maps and tags) is capped at [`MAX_METADATA_DEPTH`].
//! Decoding and conversion recurse once per level, and the stored row
//! document must stay readable by `serde_json`, whose reader stops at 128
//! levels. Deeper blobs are treated as undecodable.

use ciborium::Value as Cbor;
use serde_json::{Map, Number, Value as Json};

/// Maximum nesting depth accepted when decoding a blob.
///
/// The row document adds one level around the metadata, so a blob at this
/// depth still round-trips through `serde_json`.
pub const MAX_METADATA_DEPTH: usize = 100;

#[derive(Debug, thiserror::Error)]
enum MetadataError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("invalid CBOR: {0}")]
    Cbor(String),
    #[error("unsupported map key: {0}")]
    UnsupportedKey(String),
    #[error("unsupported CBOR value: {0}")]
    UnsupportedValue(String),
}

/// Decodes a hex-encoded CBOR metadata blob into JSON.
///
/// Returns `None` if the input is not valid hex, not valid CBOR, nests
/// deeper than [`MAX_METADATA_DEPTH`], or contains something with no JSON
/// equivalent (such as an array used as a map key).
#[must_use]
pub fn decode_metadata(metadata_hex: &str) -> Option<Json> {
    match try_decode(metadata_hex) {
        Ok(value) => Some(value),
        Err(e) => {
            log::debug!("Could not decode inscription metadata: {e}");
            None
        }
    }
}

fn try_decode(metadata_hex: &str) -> Result<Json, MetadataError> {
    let bytes = hex::decode(metadata_hex.trim())?;
    let value: Cbor =
        ciborium::de::from_reader_with_recursion_limit(bytes.as_slice(), MAX_METADATA_DEPTH)
            .map_err(|e| MetadataError::Cbor(format!("{e:?}")))?;
    cbor_to_json(value)
}

fn cbor_to_json(value: Cbor) -> Result<Json, MetadataError> {
    Ok(match value {
        Cbor::Null => Json::Null,
        Cbor::Bool(b) => Json::Bool(b),
        Cbor::Text(s) => Json::String(s),
        Cbor::Bytes(b) => Json::String(hex::encode(b)),
        Cbor::Float(f) => Number::from_f64(f).map_or(Json::Null, Json::Number),
        Cbor::Integer(i) => integer_to_json(i128::from(i)),
        Cbor::Tag(_, inner) => cbor_to_json(*inner)?,
        Cbor::Array(items) => Json::Array(
            items
                .into_iter()
                .map(cbor_to_json)
                .collect::<Result<_, _>>()?,
        ),
        Cbor::Map(entries) => {
            let mut map = Map::with_capacity(entries.len());
            for (key, value) in entries {
                map.insert(map_key(key)?, cbor_to_json(value)?);
            }
            Json::Object(map)
        }
        other => return Err(MetadataError::UnsupportedValue(format!("{other:?}"))),
    })
}

fn integer_to_json(i: i128) -> Json {
    if let Ok(n) = i64::try_from(i) {
        Json::Number(n.into())
    } else if let Ok(n) = u64::try_from(i) {
        Json::Number(n.into())
    } else {
        Json::String(i.to_string())
    }
}

fn map_key(key: Cbor) -> Result<String, MetadataError> {
    match key {
        Cbor::Text(s) => Ok(s),
        Cbor::Integer(i) => Ok(i128::from(i).to_string()),
        Cbor::Bool(b) => Ok(b.to_string()),
        Cbor::Tag(_, inner) => map_key(*inner),
        other => Err(MetadataError::UnsupportedKey(format!("{other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_text_map() {
        // {"name": "ord", "n": 7}
        let decoded = decode_metadata("a2646e616d65636f7264616e07").unwrap();
        assert_eq!(decoded, json!({"name": "ord", "n": 7}));
    }

    #[test]
    fn decodes_nested_arrays_and_negative_numbers() {
        // [1, [-2, true], null]
        let decoded = decode_metadata("83018221f5f6").unwrap();
        assert_eq!(decoded, json!([1, [-2, true], null]));
    }

    #[test]
    fn byte_strings_become_hex() {
        // h'deadbeef'
        let decoded = decode_metadata("44deadbeef").unwrap();
        assert_eq!(decoded, json!("deadbeef"));
    }

    #[test]
    fn integer_keys_become_strings() {
        // {1: "a"}
        let decoded = decode_metadata("a1016161").unwrap();
        assert_eq!(decoded, json!({"1": "a"}));
    }

    #[test]
    fn tags_unwrap_to_inner_value() {
        // 1(1690000000), an epoch timestamp
        let decoded = decode_metadata("c11a64bb5a80").unwrap();
        assert_eq!(decoded, json!(1_690_000_000));
    }

    #[test]
    fn large_unsigned_integers_stay_numeric() {
        // 18446744073709551615
        let decoded = decode_metadata("1bffffffffffffffff").unwrap();
        assert_eq!(decoded, json!(u64::MAX));
    }

    #[test]
    fn invalid_hex_yields_none() {
        assert!(decode_metadata("zz").is_none());
    }

    #[test]
    fn truncated_cbor_yields_none() {
        // map header promising one pair, then nothing
        assert!(decode_metadata("a1").is_none());
    }

    #[test]
    fn array_map_keys_yield_none() {
        // {[1]: 2}
        assert!(decode_metadata("a1810102").is_none());
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert_eq!(decode_metadata(" 07\n"), Some(json!(7)));
    }

    /// `depth` nested one-element arrays around the integer 0.
    fn nested_arrays(depth: usize) -> String {
        format!("{}00", "81".repeat(depth))
    }

    fn json_depth(value: &Json) -> usize {
        let mut depth = 0;
        let mut current = value;
        while let Some(inner) = current.as_array().and_then(|items| items.first()) {
            depth += 1;
            current = inner;
        }
        depth
    }

    #[test]
    fn decodes_blob_at_max_depth() {
        let decoded = decode_metadata(&nested_arrays(MAX_METADATA_DEPTH)).unwrap();
        assert_eq!(json_depth(&decoded), MAX_METADATA_DEPTH);
    }

    #[test]
    fn blob_past_max_depth_yields_none() {
        assert!(decode_metadata(&nested_arrays(MAX_METADATA_DEPTH + 1)).is_none());
    }

    #[test]
    fn very_deep_blob_yields_none_without_overflowing() {
        assert!(decode_metadata(&nested_arrays(20_000)).is_none());
        assert!(decode_metadata(&nested_arrays(65_536)).is_none());
    }

    #[test]
    fn deep_tags_count_toward_depth() {
        // tag 1 wrapping tag 1 wrapping ... 0
        let blob = format!("{}00", "c1".repeat(MAX_METADATA_DEPTH + 1));
        assert!(decode_metadata(&blob).is_none());
    }

    #[test]
    fn wide_arrays_are_not_limited() {
        // 65535 zeros in one array
        let blob = format!("99ffff{}", "00".repeat(65_535));
        let decoded = decode_metadata(&blob).unwrap();
        assert_eq!(decoded.as_array().map(Vec::len), Some(65_535));
    }
}
