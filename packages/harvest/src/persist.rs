//! Turning a block's inscriptions into stored rows.

use chrono::{DateTime, Utc};
use ord_harvest_database::InscriptionStore;
use ord_harvest_models::{Height, Inscription, InscriptionRow, UnitResultSet};

use crate::metadata::decode_metadata;

/// Builds the stored row for `inscription`, stamped with `now` as both
/// creation and update time.
///
/// Sat ordinals, output values, offsets and fees become decimal strings.
/// `metadata` holds the decoded `metadata_hex` when the inscription has
/// one, otherwise whatever decoded metadata the source supplied.
#[must_use]
pub fn to_row(inscription: &Inscription, now: DateTime<Utc>) -> InscriptionRow {
    let metadata = match inscription.metadata_hex.as_deref() {
        Some(hex) => decode_metadata(hex),
        None => inscription.metadata.clone(),
    };

    InscriptionRow {
        created_at: now,
        updated_at: now,
        id: inscription.inscription_id.clone(),
        number: inscription.inscription_number,
        address: inscription.address.clone(),
        genesis_address: inscription.address.clone(),
        genesis_block_height: inscription.genesis_height,
        genesis_block_hash: inscription.block_hash.clone(),
        genesis_tx_id: inscription.tx_id.clone(),
        genesis_timestamp: inscription.timestamp,
        genesis_fee: inscription.genesis_fee.map(|fee| fee.to_string()),
        tx_id: inscription.tx_id.clone(),
        location: inscription.satpoint.clone(),
        output: inscription.satpoint_outpoint.clone(),
        value: inscription.output_value.map(|value| value.to_string()),
        offset: inscription.satpoint_offset.map(|offset| offset.to_string()),
        sat_ordinal: inscription.sat.map(|sat| sat.to_string()),
        sat_rarity: inscription.sat_rarity.clone(),
        content_type: inscription.content_type.clone(),
        content_length: inscription.content_length,
        timestamp: DateTime::from_timestamp(inscription.timestamp, 0).unwrap_or_default(),
        recursive: inscription.recursive,
        recursive_refs: inscription.recursive_refs.clone(),
        children: inscription.children.clone(),
        charms: inscription.charms,
        charms_extended: inscription.charms_extended.clone(),
        metadata_hex: inscription.metadata_hex.clone(),
        metadata,
        metaprotocol: inscription.meta_protocol.clone(),
        content_encoding: inscription.content_encoding.clone(),
        content: inscription.content.clone(),
        next: inscription.next.clone(),
        parent: inscription.parent.clone(),
        previous: inscription.previous.clone(),
        sat: inscription.sat.map(|sat| sat.to_string()),
        satpoint: inscription.satpoint.clone(),
    }
}

/// Writes a block's inscriptions to `store` and returns how many rows were
/// newly written.
///
/// An empty set writes nothing. Rows already stored are left as they
/// are. Write failures are logged rather than returned, so the harvest
/// moves on to the next block either way.
pub fn persist<St: InscriptionStore + ?Sized>(
    store: &St,
    height: Height,
    records: &UnitResultSet,
) -> u64 {
    if records.is_empty() {
        return 0;
    }

    let now = Utc::now();
    let rows: Vec<InscriptionRow> = records.values().map(|ins| to_row(ins, now)).collect();

    match store.insert_unordered(&rows) {
        Ok(outcome) => {
            if outcome.failed > 0 {
                log::error!(
                    "Block {height}: {} of {} rows failed to write",
                    outcome.failed,
                    rows.len(),
                );
            }
            outcome.inserted
        }
        Err(e) => {
            log::error!("Block {height}: failed to write {} rows: {e}", rows.len());
            0
        }
    }
}
