use std::sync::atomic::{AtomicU64, Ordering};

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{MALFORMED_LOG_EVERY, MALFORMED_LOG_FIRST};
use crate::error::DecodeError;
use crate::wire::delta::{decode_delta, DeltaUpdate};
use crate::wire::entity::{decode_entity, Entity};

static MALFORMED_RECORDS: AtomicU64 = AtomicU64::new(0);

/// Decoded push-feed message.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    InitialDump(Vec<Entity>),
    Update(Vec<DeltaUpdate>),
}

impl Envelope {
    pub fn len(&self) -> usize {
        match self {
            Envelope::InitialDump(entities) => entities.len(),
            Envelope::Update(deltas) => deltas.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An envelope plus the number of records that failed to decode and were dropped.
#[derive(Debug)]
pub struct DecodedEnvelope {
    pub envelope: Envelope,
    pub dropped: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEnvelope {
    message_type: Option<Value>,
    records: Option<Value>,
}

/// Decode one envelope.
///
/// Only bytes that are not a JSON object at all are an error. An unrecognised
/// `messageType` degrades to an empty update batch, and each record is decoded
/// on its own so that a malformed record is dropped without touching the rest.
pub fn decode_envelope(raw: &[u8]) -> Result<DecodedEnvelope, DecodeError> {
    let env: RawEnvelope = serde_json::from_slice(raw).map_err(DecodeError::InvalidEnvelope)?;
    let records: &[Value] = env
        .records
        .as_ref()
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut dropped = 0usize;
    let envelope = match env.message_type.as_ref().and_then(Value::as_str) {
        Some("INITIAL_DUMP") => {
            let entities = records
                .iter()
                .filter_map(|r| match decode_entity(r) {
                    Ok(entity) => Some(entity),
                    Err(e) => {
                        dropped += 1;
                        note_malformed(&e);
                        None
                    }
                })
                .collect();
            Envelope::InitialDump(entities)
        }
        Some("UPDATE") => {
            let deltas = records
                .iter()
                .filter_map(|r| match decode_delta(r) {
                    Ok(delta) => Some(delta),
                    Err(e) => {
                        dropped += 1;
                        note_malformed(&e);
                        None
                    }
                })
                .collect();
            Envelope::Update(deltas)
        }
        other => {
            debug!(message_type = ?other, "[INGEST] ignoring envelope with unrecognised messageType");
            Envelope::Update(Vec::new())
        }
    };

    Ok(DecodedEnvelope { envelope, dropped })
}

fn note_malformed(err: &DecodeError) {
    let count = MALFORMED_RECORDS.fetch_add(1, Ordering::Relaxed) + 1;
    if count <= MALFORMED_LOG_FIRST || count % MALFORMED_LOG_EVERY == 0 {
        warn!(count, "[INGEST] dropped record: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_dump_drops_only_the_malformed_record() {
        let raw = br#"{"messageType":"INITIAL_DUMP","records":[
            {"_type":"MATCH","id":"M1"},
            {"_type":"MARKET_OUTCOME_RELATION","id":"R1"},
            {"_type":"OUTCOME","id":"O1","headerNameKey":"home"}
        ]}"#;
        let decoded = decode_envelope(raw).unwrap();
        assert_eq!(decoded.dropped, 1);
        match decoded.envelope {
            Envelope::InitialDump(entities) => {
                assert_eq!(entities.len(), 2);
                assert_eq!(entities[0].kind(), "MATCH");
                assert_eq!(entities[1].kind(), "OUTCOME");
            }
            other => panic!("expected InitialDump, got {other:?}"),
        }
    }

    #[test]
    fn update_batch_isolates_bad_deltas() {
        let raw = br#"{"messageType":"UPDATE","records":[
            {"entityType":"BETTING_OFFER","changeType":"UPDATE","id":"B1","changedProperties":{"odds":1.95}},
            {"changeType":"UPDATE","id":"B2"},
            {"entityType":"SPORT","changeType":"UPDATE","id":"S1","changedProperties":{}}
        ]}"#;
        let decoded = decode_envelope(raw).unwrap();
        assert_eq!(decoded.dropped, 1);
        match decoded.envelope {
            Envelope::Update(deltas) => {
                assert_eq!(deltas.len(), 2);
                assert!(matches!(deltas[0], DeltaUpdate::OfferChanged { .. }));
                assert_eq!(deltas[1], DeltaUpdate::Unknown("SPORT".to_string()));
            }
            other => panic!("expected Update, got {other:?}"),
        }
    }

    #[test]
    fn unknown_message_type_is_an_empty_update() {
        let raw = br#"{"messageType":"initial_dump","records":[{"_type":"MATCH","id":"M1"}]}"#;
        let decoded = decode_envelope(raw).unwrap();
        assert_eq!(decoded.envelope, Envelope::Update(Vec::new()));
        assert_eq!(decoded.dropped, 0);
    }

    #[test]
    fn missing_records_is_an_empty_batch() {
        let decoded = decode_envelope(br#"{"messageType":"INITIAL_DUMP"}"#).unwrap();
        assert!(decoded.envelope.is_empty());
    }

    #[test]
    fn non_string_fields_degrade_to_empty_update() {
        for raw in [
            &br#"{"messageType":7,"records":[]}"#[..],
            &br#"{"messageType":null,"records":[{"_type":"MATCH","id":"M1"}]}"#[..],
            &br#"{"messageType":["INITIAL_DUMP"],"records":{}}"#[..],
            &br#"{"messageType":"INITIAL_DUMP","records":"M1"}"#[..],
        ] {
            let decoded = decode_envelope(raw).unwrap();
            assert!(decoded.envelope.is_empty());
            assert_eq!(decoded.dropped, 0);
        }
        let decoded = decode_envelope(br#"{"messageType":{"kind":"UPDATE"}}"#).unwrap();
        assert_eq!(decoded.envelope, Envelope::Update(Vec::new()));
    }

    #[test]
    fn non_json_is_invalid_envelope() {
        assert!(matches!(decode_envelope(b"not json"), Err(DecodeError::InvalidEnvelope(_))));
    }
}
