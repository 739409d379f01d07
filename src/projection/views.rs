use serde::Serialize;

use crate::types::BettingOffer;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Participant {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Venue {
    pub id: String,
    pub name: String,
    pub iso_code: String,
}

/// Live-priced offer as shown next to an outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OfferView {
    pub id: String,
    pub odds: f64,
    pub status_id: String,
    pub is_live: bool,
    pub is_available: bool,
}

impl From<&BettingOffer> for OfferView {
    fn from(offer: &BettingOffer) -> Self {
        Self {
            id: offer.id.clone(),
            odds: offer.odds.unwrap_or(0.0),
            status_id: offer.status_id.clone().unwrap_or_default(),
            is_live: offer.is_live.unwrap_or(false),
            is_available: offer.is_available.unwrap_or(true),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeView {
    pub id: String,
    pub code_name: String,
    pub type_name: String,
    pub translated_name: String,
    pub name_digit1: Option<f64>,
    pub name_digit2: Option<f64>,
    pub name_digit3: Option<f64>,
    pub param_boolean1: Option<bool>,
    pub market_id: String,
    pub market_name: String,
    pub offer: OfferView,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketView {
    pub id: String,
    /// Betting-type id, empty when the market carries none.
    pub type_id: String,
    pub name: String,
    pub name_digit1: Option<f64>,
    pub name_digit2: Option<f64>,
    pub name_digit3: Option<f64>,
    pub event_part_id: Option<String>,
    pub is_main_market: bool,
    pub is_available: bool,
    pub is_closed: bool,
    pub outcomes: Vec<OutcomeView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchView {
    pub id: String,
    pub competition_id: String,
    pub competition_name: String,
    pub home: Participant,
    pub away: Participant,
    /// Millisecond UTC epoch, 0 when unknown.
    pub start_time: i64,
    pub sport_id: String,
    pub sport_name: String,
    pub venue: Option<Venue>,
    pub number_of_markets: u32,
    pub root_part_id: String,
    pub markets: Vec<MarketView>,
}
