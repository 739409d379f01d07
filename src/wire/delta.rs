use serde::Deserialize;
use serde_json::Value;

use crate::error::DecodeError;
use crate::types::{MatchInfo, ScorePatch};

/// One `UPDATE`-mode record, classified by `(entityType, changeType)`.
#[derive(Debug, Clone, PartialEq)]
pub enum DeltaUpdate {
    /// `(BETTING_OFFER, UPDATE)`: at least one field is present.
    OfferChanged {
        id: String,
        odds: Option<f64>,
        is_live: Option<bool>,
        is_available: Option<bool>,
    },
    /// `(MARKET, UPDATE)`: at least one field is present.
    MarketAvailability {
        id: String,
        is_available: Option<bool>,
        is_closed: Option<bool>,
    },
    /// `(EVENT_INFO, UPDATE)`
    ScoreChanged { id: String, patch: ScorePatch },
    /// `(EVENT_INFO, CREATE)`
    MatchInfoReplaced(MatchInfo),
    /// A recognised shape whose changed fields are all outside the tracked set.
    Untracked { entity_type: String, id: String },
    Unknown(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDelta {
    entity_type: Option<String>,
    change_type: Option<String>,
    id: Option<String>,
    changed_properties: Option<Value>,
    entity: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OfferChanges {
    odds: Option<f64>,
    is_live: Option<bool>,
    is_available: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarketChanges {
    is_available: Option<bool>,
    is_closed: Option<bool>,
}

/// Classify and decode a single delta record.
pub fn decode_delta(record: &Value) -> Result<DeltaUpdate, DecodeError> {
    let raw = RawDelta::deserialize(record).map_err(|_| DecodeError::UnknownUpdateType)?;
    let (Some(entity_type), Some(change_type)) = (raw.entity_type, raw.change_type) else {
        return Err(DecodeError::UnknownUpdateType);
    };

    let invalid = |id: &str, reason: String| DecodeError::InvalidUpdateFormat {
        entity_type: entity_type.clone(),
        id: id.to_string(),
        reason,
    };

    match (entity_type.as_str(), change_type.as_str()) {
        ("BETTING_OFFER", "UPDATE") => {
            let id = raw.id.ok_or_else(|| invalid("", "missing id".to_string()))?;
            let changes: OfferChanges = changed_properties(raw.changed_properties.as_ref())
                .map_err(|reason| invalid(&id, reason))?;
            if changes.odds.is_none() && changes.is_live.is_none() && changes.is_available.is_none() {
                return Ok(DeltaUpdate::Untracked { entity_type: entity_type.clone(), id });
            }
            Ok(DeltaUpdate::OfferChanged {
                id,
                odds: changes.odds,
                is_live: changes.is_live,
                is_available: changes.is_available,
            })
        }
        ("MARKET", "UPDATE") => {
            let id = raw.id.ok_or_else(|| invalid("", "missing id".to_string()))?;
            let changes: MarketChanges = changed_properties(raw.changed_properties.as_ref())
                .map_err(|reason| invalid(&id, reason))?;
            if changes.is_available.is_none() && changes.is_closed.is_none() {
                return Ok(DeltaUpdate::Untracked { entity_type: entity_type.clone(), id });
            }
            Ok(DeltaUpdate::MarketAvailability {
                id,
                is_available: changes.is_available,
                is_closed: changes.is_closed,
            })
        }
        ("EVENT_INFO", "UPDATE") => {
            let id = raw.id.ok_or_else(|| invalid("", "missing id".to_string()))?;
            let patch: ScorePatch = changed_properties(raw.changed_properties.as_ref())
                .map_err(|reason| invalid(&id, reason))?;
            if patch.is_empty() {
                return Ok(DeltaUpdate::Untracked { entity_type: entity_type.clone(), id });
            }
            Ok(DeltaUpdate::ScoreChanged { id, patch })
        }
        ("EVENT_INFO", "CREATE") => {
            let id = raw.id.unwrap_or_default();
            let entity = raw
                .entity
                .ok_or_else(|| invalid(&id, "CREATE without entity".to_string()))?;
            let info = MatchInfo::deserialize(&entity).map_err(|e| invalid(&id, e.to_string()))?;
            Ok(DeltaUpdate::MatchInfoReplaced(info))
        }
        _ => Ok(DeltaUpdate::Unknown(entity_type.clone())),
    }
}

fn changed_properties<T>(props: Option<&Value>) -> Result<T, String>
where
    T: for<'de> Deserialize<'de>,
{
    match props {
        Some(v) if v.is_object() => T::deserialize(v).map_err(|e| e.to_string()),
        Some(_) => Err("changedProperties is not an object".to_string()),
        None => Err("missing changedProperties".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn odds_only_offer_update() {
        let record = json!({
            "entityType": "BETTING_OFFER", "changeType": "UPDATE", "id": "B1",
            "changedProperties": {"odds": 2.5}
        });
        assert_eq!(
            decode_delta(&record).unwrap(),
            DeltaUpdate::OfferChanged { id: "B1".to_string(), odds: Some(2.5), is_live: None, is_available: None }
        );
    }

    #[test]
    fn offer_update_outside_tracked_fields_is_untracked() {
        let record = json!({
            "entityType": "BETTING_OFFER", "changeType": "UPDATE", "id": "B1",
            "changedProperties": {"lastChangedTime": 1700000000000i64}
        });
        assert!(matches!(decode_delta(&record).unwrap(), DeltaUpdate::Untracked { .. }));
    }

    #[test]
    fn market_update() {
        let record = json!({
            "entityType": "MARKET", "changeType": "UPDATE", "id": "MK1",
            "changedProperties": {"isClosed": true}
        });
        assert_eq!(
            decode_delta(&record).unwrap(),
            DeltaUpdate::MarketAvailability { id: "MK1".to_string(), is_available: None, is_closed: Some(true) }
        );
    }

    #[test]
    fn event_info_create_carries_full_entity() {
        let record = json!({
            "entityType": "EVENT_INFO", "changeType": "CREATE", "id": "I1",
            "entity": {"_type": "EVENT_INFO", "id": "I1", "matchId": "M1", "paramFloat1": 0.0}
        });
        match decode_delta(&record).unwrap() {
            DeltaUpdate::MatchInfoReplaced(info) => {
                assert_eq!(info.id, "I1");
                assert_eq!(info.match_id.as_deref(), Some("M1"));
            }
            other => panic!("expected MatchInfoReplaced, got {other:?}"),
        }
    }

    #[test]
    fn event_info_update_is_a_score_patch() {
        let record = json!({
            "entityType": "EVENT_INFO", "changeType": "UPDATE", "id": "I1",
            "changedProperties": {"paramFloat2": 3.0}
        });
        match decode_delta(&record).unwrap() {
            DeltaUpdate::ScoreChanged { id, patch } => {
                assert_eq!(id, "I1");
                assert_eq!(patch.param_float2, Some(3.0));
                assert!(patch.param_float1.is_none());
            }
            other => panic!("expected ScoreChanged, got {other:?}"),
        }
    }

    #[test]
    fn unrecognised_pairing_is_unknown() {
        let record = json!({"entityType": "MATCH", "changeType": "DELETE", "id": "M1"});
        assert_eq!(decode_delta(&record).unwrap(), DeltaUpdate::Unknown("MATCH".to_string()));
    }

    #[test]
    fn missing_change_type_is_unknown_update_type() {
        let record = json!({"entityType": "BETTING_OFFER", "id": "B1"});
        assert!(matches!(decode_delta(&record), Err(DecodeError::UnknownUpdateType)));
    }

    #[test]
    fn mistyped_field_is_invalid_format() {
        let record = json!({
            "entityType": "BETTING_OFFER", "changeType": "UPDATE", "id": "B1",
            "changedProperties": {"odds": "high"}
        });
        assert!(matches!(decode_delta(&record), Err(DecodeError::InvalidUpdateFormat { .. })));
    }

    #[test]
    fn create_without_entity_is_invalid_format() {
        let record = json!({"entityType": "EVENT_INFO", "changeType": "CREATE", "id": "I1"});
        assert!(matches!(decode_delta(&record), Err(DecodeError::InvalidUpdateFormat { .. })));
    }
}
