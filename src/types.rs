use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Match
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: String,
    /// Competition (tournament) id.
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub parent_name: Option<String>,
    #[serde(default)]
    pub home_participant_id: Option<String>,
    #[serde(default)]
    pub home_participant_name: Option<String>,
    #[serde(default)]
    pub away_participant_id: Option<String>,
    #[serde(default)]
    pub away_participant_name: Option<String>,
    /// Millisecond UTC epoch.
    #[serde(default)]
    pub start_time: Option<i64>,
    #[serde(default)]
    pub sport_id: Option<String>,
    #[serde(default)]
    pub sport_name: Option<String>,
    #[serde(default)]
    pub short_sport_name: Option<String>,
    #[serde(default)]
    pub venue_id: Option<String>,
    #[serde(default)]
    pub number_of_markets: Option<u32>,
    #[serde(default)]
    pub root_part_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Market / Outcome / BettingOffer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Market {
    pub id: String,
    /// Owning match id.
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub betting_type_id: Option<String>,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub param_float1: Option<f64>,
    #[serde(default)]
    pub param_float2: Option<f64>,
    #[serde(default)]
    pub param_float3: Option<f64>,
    #[serde(default)]
    pub event_part_id: Option<String>,
    #[serde(default)]
    pub is_available: Option<bool>,
    #[serde(default)]
    pub is_closed: Option<bool>,
    /// Set by the decoder for `MAIN_MARKET` records, never read off the wire.
    #[serde(skip_deserializing)]
    pub is_main_market: bool,
}

impl Market {
    /// Applies a `MARKET` `UPDATE` delta. Absent fields keep their value.
    pub fn patched(&self, is_available: Option<bool>, is_closed: Option<bool>) -> Self {
        let mut market = self.clone();
        if is_available.is_some() {
            market.is_available = is_available;
        }
        if is_closed.is_some() {
            market.is_closed = is_closed;
        }
        market
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub id: String,
    /// Business code name used for ordering ("home", "draw", "over", ...).
    #[serde(default)]
    pub header_name_key: Option<String>,
    #[serde(default)]
    pub header_name: Option<String>,
    #[serde(default)]
    pub translated_name: Option<String>,
    #[serde(default)]
    pub param_float1: Option<f64>,
    #[serde(default)]
    pub param_float2: Option<f64>,
    #[serde(default)]
    pub param_float3: Option<f64>,
    #[serde(default)]
    pub param_boolean1: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BettingOffer {
    pub id: String,
    /// The outcome this offer prices. Offers are joined into projections by this id.
    #[serde(default)]
    pub outcome_id: Option<String>,
    #[serde(default)]
    pub odds: Option<f64>,
    #[serde(default)]
    pub status_id: Option<String>,
    #[serde(default)]
    pub is_live: Option<bool>,
    #[serde(default)]
    pub is_available: Option<bool>,
}

impl BettingOffer {
    /// Applies a `BETTING_OFFER` `UPDATE` delta. Absent fields keep their value.
    pub fn patched(&self, odds: Option<f64>, is_live: Option<bool>, is_available: Option<bool>) -> Self {
        let mut offer = self.clone();
        if odds.is_some() {
            offer.odds = odds;
        }
        if is_live.is_some() {
            offer.is_live = is_live;
        }
        if is_available.is_some() {
            offer.is_available = is_available;
        }
        offer
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketOutcomeRelation {
    pub id: String,
    pub market_id: String,
    pub outcome_id: String,
}

// ---------------------------------------------------------------------------
// Tournament / Location / MatchInfo
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tournament {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub sport_id: Option<String>,
    #[serde(default)]
    pub venue_id: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub short_name: Option<String>,
    /// ISO country code.
    #[serde(default)]
    pub code: Option<String>,
}

/// Score-like parameters attached to a match (`EVENT_INFO`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchInfo {
    pub id: String,
    #[serde(default, alias = "eventId")]
    pub match_id: Option<String>,
    #[serde(default)]
    pub type_id: Option<String>,
    #[serde(default)]
    pub event_part_id: Option<String>,
    #[serde(default)]
    pub param_float1: Option<f64>,
    #[serde(default)]
    pub param_float2: Option<f64>,
    #[serde(default)]
    pub param_event_part_name1: Option<String>,
}

impl MatchInfo {
    /// Applies an `EVENT_INFO` `UPDATE` delta. Absent fields keep their value.
    pub fn patched(&self, patch: &ScorePatch) -> Self {
        let mut info = self.clone();
        if patch.param_float1.is_some() {
            info.param_float1 = patch.param_float1;
        }
        if patch.param_float2.is_some() {
            info.param_float2 = patch.param_float2;
        }
        if patch.param_event_part_name1.is_some() {
            info.param_event_part_name1 = patch.param_event_part_name1.clone();
        }
        info
    }
}

/// Partial score fields carried by an `EVENT_INFO` `UPDATE` delta.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScorePatch {
    #[serde(default)]
    pub param_float1: Option<f64>,
    #[serde(default)]
    pub param_float2: Option<f64>,
    #[serde(default)]
    pub param_event_part_name1: Option<String>,
}

impl ScorePatch {
    pub fn is_empty(&self) -> bool {
        self.param_float1.is_none()
            && self.param_float2.is_none()
            && self.param_event_part_name1.is_none()
    }
}

// ---------------------------------------------------------------------------
// List buckets
// ---------------------------------------------------------------------------

/// Named subscription scope grouping a subset of match ids for projection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(into = "String")]
pub enum ListType {
    FavoriteMatches,
    FavoriteCompetitionMatches,
    Custom(String),
}

impl ListType {
    pub fn as_str(&self) -> &str {
        match self {
            ListType::FavoriteMatches => "favoriteMatches",
            ListType::FavoriteCompetitionMatches => "favoriteCompetitionMatches",
            ListType::Custom(s) => s,
        }
    }
}

impl From<&str> for ListType {
    fn from(s: &str) -> Self {
        match s {
            "favoriteMatches" => ListType::FavoriteMatches,
            "favoriteCompetitionMatches" => ListType::FavoriteCompetitionMatches,
            other => ListType::Custom(other.to_string()),
        }
    }
}

impl From<ListType> for String {
    fn from(l: ListType) -> Self {
        l.as_str().to_string()
    }
}

impl std::fmt::Display for ListType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
