#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Data types shared across the ord harvester.
//!
//! The ord server exposes inscriptions per block: a paginated listing of
//! inscription IDs ([`BlockPage`]) and a detail document per ID
//! ([`Inscription`]). Harvested inscriptions are stored as
//! [`InscriptionRow`] documents.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A block height. Blocks are the unit of harvesting: each one is
/// enumerated, aggregated, and persisted before the next begins.
pub type Height = u64;

/// One block's aggregated inscriptions, keyed by inscription ID.
///
/// Inserting an ID that is already present overwrites the previous entry,
/// so an ID listed twice yields a single record.
pub type UnitResultSet = BTreeMap<String, Inscription>;

/// One page of the block listing endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPage {
    /// Inscription IDs on this page, in source order.
    #[serde(default)]
    pub inscriptions: Vec<String>,
    /// Whether another page follows this one.
    #[serde(default)]
    pub more: bool,
    /// Zero-based page index echoed back by the server.
    #[serde(default)]
    pub page_index: u32,
}

/// A decoded sat charm (e.g. "uncommon", "cursed") with its icon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Charm {
    pub title: String,
    pub icon: String,
}

/// The full detail payload the ord server returns for one inscription.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inscription {
    pub inscription_id: String,
    pub inscription_number: i64,
    /// Height of the block the inscription was revealed in. This is the
    /// back-reference to the harvesting unit.
    pub genesis_height: Height,
    #[serde(default)]
    pub genesis_fee: Option<u64>,
    /// Unix timestamp (seconds) of the genesis block.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub children: Vec<String>,
    #[serde(default)]
    pub content_length: Option<u64>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub content_encoding: Option<String>,
    /// Inline content for text-like inscriptions (JSON, markdown, plain
    /// text). Absent for binary content.
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub output_value: Option<u64>,
    #[serde(default)]
    pub sat: Option<u64>,
    #[serde(default)]
    pub satpoint: Option<String>,
    #[serde(default)]
    pub satpoint_outpoint: Option<String>,
    #[serde(default)]
    pub satpoint_offset: Option<u64>,
    /// Bit set of charms on the inscribed sat.
    #[serde(default)]
    pub charms: Option<u16>,
    #[serde(default)]
    pub charms_extended: Vec<Charm>,
    #[serde(default)]
    pub sat_rarity: Option<String>,
    /// Hex-encoded CBOR metadata blob.
    #[serde(default)]
    pub metadata_hex: Option<String>,
    /// Metadata the server already decoded, when it provides it.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub meta_protocol: Option<String>,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default)]
    pub recursive_refs: Vec<String>,
    #[serde(default)]
    pub tx_id: Option<String>,
    #[serde(default)]
    pub block_hash: Option<String>,
}

/// The stored form of an inscription.
///
/// Quantities that can exceed the range other consumers of the store can
/// represent exactly (sat ordinals, output values, offsets, fees) are kept
/// as decimal strings. Absent optional fields are omitted from the
/// serialized document rather than written as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InscriptionRow {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub id: String,
    pub number: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genesis_address: Option<String>,
    pub genesis_block_height: Height,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genesis_block_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genesis_tx_id: Option<String>,
    pub genesis_timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genesis_fee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sat_ordinal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sat_rarity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_length: Option<u64>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub recursive: bool,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub recursive_refs: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub children: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charms: Option<u16>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub charms_extended: Vec<Charm>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_hex: Option<String>,
    /// Decoded form of `metadata_hex`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metaprotocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sat: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub satpoint: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_block_page() {
        let page: BlockPage = serde_json::from_str(
            r#"{"inscriptions":["a1i0","b2i0"],"more":true,"page_index":3}"#,
        )
        .unwrap();
        assert_eq!(page.inscriptions, vec!["a1i0", "b2i0"]);
        assert!(page.more);
        assert_eq!(page.page_index, 3);
    }

    #[test]
    fn block_page_defaults_missing_fields() {
        let page: BlockPage = serde_json::from_str("{}").unwrap();
        assert!(page.inscriptions.is_empty());
        assert!(!page.more);
    }

    #[test]
    fn parses_minimal_inscription() {
        let ins: Inscription = serde_json::from_str(
            r#"{"inscription_id":"abci0","inscription_number":-7,"genesis_height":767430}"#,
        )
        .unwrap();
        assert_eq!(ins.inscription_id, "abci0");
        assert_eq!(ins.inscription_number, -7);
        assert_eq!(ins.genesis_height, 767_430);
        assert!(ins.sat.is_none());
        assert!(ins.charms_extended.is_empty());
    }

    #[test]
    fn parses_full_inscription() {
        let ins: Inscription = serde_json::from_value(serde_json::json!({
            "address": "bc1pxyz",
            "children": ["c1i0"],
            "content_length": 42,
            "content_type": "text/plain;charset=utf-8",
            "genesis_fee": 3_000,
            "genesis_height": 800_000,
            "inscription_id": "deadbeefi0",
            "inscription_number": 1_234,
            "output_value": 546,
            "sat": 1_953_125_000_000_000u64,
            "satpoint": "deadbeef:0:0",
            "timestamp": 1_690_000_000,
            "charms": 4,
            "charms_extended": [{"title": "uncommon", "icon": "🌱"}],
            "sat_rarity": "uncommon",
            "metadata_hex": "a1616101",
            "recursive": true,
            "recursive_refs": ["r1i0"],
            "tx_id": "deadbeef",
            "block_hash": "0000abc",
            "satpoint_outpoint": "deadbeef:0",
            "satpoint_offset": 0
        }))
        .unwrap();
        assert_eq!(ins.sat, Some(1_953_125_000_000_000));
        assert_eq!(ins.charms_extended[0].title, "uncommon");
        assert!(ins.recursive);
        assert_eq!(ins.satpoint_offset, Some(0));
    }
}
