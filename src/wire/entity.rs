use serde::Deserialize;
use serde_json::Value;

use crate::error::DecodeError;
use crate::types::{
    BettingOffer, Location, Market, MarketOutcomeRelation, Match, MatchInfo, Outcome, Tournament,
};

/// One dump record, classified by its `_type` discriminator.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Match(Match),
    MatchInfo(MatchInfo),
    Tournament(Tournament),
    BettingOffer(BettingOffer),
    Outcome(Outcome),
    Market(Market),
    /// A market flagged as featured; stored as a market and fed into the
    /// main-market ordering.
    MainMarket(Market),
    MarketOutcomeRelation(MarketOutcomeRelation),
    Location(Location),
    /// Accepted and discarded.
    EventPartScore,
    Unknown(String),
}

impl Entity {
    pub fn kind(&self) -> &str {
        match self {
            Entity::Match(_) => "MATCH",
            Entity::MatchInfo(_) => "EVENT_INFO",
            Entity::Tournament(_) => "TOURNAMENT",
            Entity::BettingOffer(_) => "BETTING_OFFER",
            Entity::Outcome(_) => "OUTCOME",
            Entity::Market(_) => "MARKET",
            Entity::MainMarket(_) => "MAIN_MARKET",
            Entity::MarketOutcomeRelation(_) => "MARKET_OUTCOME_RELATION",
            Entity::Location(_) => "LOCATION",
            Entity::EventPartScore => "EVENT_PART_SCORE",
            Entity::Unknown(kind) => kind,
        }
    }
}

/// Classify and decode a single record.
///
/// Unrecognised discriminators become `Entity::Unknown`; a recognised record
/// with a missing or mistyped required field is a `MalformedRecord`.
pub fn decode_entity(record: &Value) -> Result<Entity, DecodeError> {
    let Some(kind) = record.get("_type").and_then(Value::as_str) else {
        return Err(DecodeError::MalformedRecord {
            entity_type: "<untyped>".to_string(),
            source: serde::de::Error::missing_field("_type"),
        });
    };

    let malformed = |source: serde_json::Error| DecodeError::MalformedRecord {
        entity_type: kind.to_string(),
        source,
    };

    let entity = match kind {
        "MATCH" => Entity::Match(Match::deserialize(record).map_err(malformed)?),
        "EVENT_INFO" => Entity::MatchInfo(MatchInfo::deserialize(record).map_err(malformed)?),
        "TOURNAMENT" => Entity::Tournament(Tournament::deserialize(record).map_err(malformed)?),
        "BETTING_OFFER" => {
            Entity::BettingOffer(BettingOffer::deserialize(record).map_err(malformed)?)
        }
        "OUTCOME" => Entity::Outcome(Outcome::deserialize(record).map_err(malformed)?),
        "MARKET" => Entity::Market(Market::deserialize(record).map_err(malformed)?),
        "MAIN_MARKET" => {
            let mut market = Market::deserialize(record).map_err(malformed)?;
            market.is_main_market = true;
            Entity::MainMarket(market)
        }
        "MARKET_OUTCOME_RELATION" => Entity::MarketOutcomeRelation(
            MarketOutcomeRelation::deserialize(record).map_err(malformed)?,
        ),
        "LOCATION" => Entity::Location(Location::deserialize(record).map_err(malformed)?),
        "EVENT_PART_SCORE" => Entity::EventPartScore,
        other => Entity::Unknown(other.to_string()),
    };
    Ok(entity)
}
