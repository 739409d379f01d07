use tracing::trace;

use crate::projection::sorting::{market_rank, outcome_rank};
use crate::projection::views::{MarketView, MatchView, OfferView, OutcomeView, Participant, Venue};
use crate::state::Repository;
use crate::types::{ListType, Market, Match};

/// Read-only join over the repository producing `Match → Market → Outcome →
/// Offer` views. Dangling references are dropped, never reported as errors.
pub struct Assembler<'a> {
    repo: &'a Repository,
}

impl<'a> Assembler<'a> {
    pub fn new(repo: &'a Repository) -> Self {
        Self { repo }
    }

    /// Views for every match in `list_type`'s bucket, in bucket order.
    pub fn build_matches(&self, list_type: &ListType) -> Vec<MatchView> {
        let main_market_order = self.repo.main_market_order();
        self.repo
            .query(list_type)
            .iter()
            .filter_map(|id| {
                let raw = self.repo.get_match(id);
                if raw.is_none() {
                    trace!(match_id = %id, "[ASSEMBLER] bucket references unknown match");
                }
                raw
            })
            .map(|raw| self.build_match(&raw, &main_market_order))
            .collect()
    }

    pub fn build_match(&self, raw: &Match, main_market_order: &[String]) -> MatchView {
        let mut markets: Vec<MarketView> = self
            .repo
            .markets_for_match(&raw.id)
            .iter()
            .filter_map(|id| self.repo.get_market(id))
            .map(|market| self.build_market(&market))
            .collect();
        markets.sort_by_key(|m| market_rank(&m.type_id, main_market_order));

        let venue = raw
            .venue_id
            .as_deref()
            .and_then(|id| self.repo.get_location(id))
            .map(|loc| Venue {
                id: loc.id,
                name: loc.name.unwrap_or_default(),
                iso_code: loc.code.unwrap_or_default(),
            });

        MatchView {
            id: raw.id.clone(),
            competition_id: raw.parent_id.clone().unwrap_or_default(),
            competition_name: raw.parent_name.clone().unwrap_or_default(),
            home: Participant {
                id: raw.home_participant_id.clone().unwrap_or_default(),
                name: raw.home_participant_name.clone().unwrap_or_default(),
            },
            away: Participant {
                id: raw.away_participant_id.clone().unwrap_or_default(),
                name: raw.away_participant_name.clone().unwrap_or_default(),
            },
            start_time: raw.start_time.unwrap_or(0),
            sport_id: raw.sport_id.clone().unwrap_or_default(),
            sport_name: raw.sport_name.clone().unwrap_or_default(),
            venue,
            number_of_markets: raw.number_of_markets.unwrap_or(0),
            root_part_id: raw.root_part_id.clone().unwrap_or_default(),
            markets,
        }
    }

    fn build_market(&self, market: &Market) -> MarketView {
        let market_name = market.short_name.clone().unwrap_or_default();

        let mut outcomes: Vec<OutcomeView> = self
            .repo
            .outcomes_for_market(&market.id)
            .iter()
            .filter_map(|outcome_id| {
                let outcome = self.repo.get_outcome(outcome_id)?;
                let offer = self.repo.offer_for_outcome(outcome_id)?;
                Some(OutcomeView {
                    id: outcome.id,
                    code_name: outcome.header_name_key.unwrap_or_default(),
                    type_name: outcome.header_name.unwrap_or_default(),
                    translated_name: outcome.translated_name.unwrap_or_default(),
                    name_digit1: outcome.param_float1,
                    name_digit2: outcome.param_float2,
                    name_digit3: outcome.param_float3,
                    param_boolean1: outcome.param_boolean1,
                    market_id: market.id.clone(),
                    market_name: market_name.clone(),
                    offer: OfferView::from(&offer),
                })
            })
            .collect();
        outcomes.sort_by_key(|o| outcome_rank(&o.code_name));

        MarketView {
            id: market.id.clone(),
            type_id: market.betting_type_id.clone().unwrap_or_default(),
            name: market_name,
            name_digit1: market.param_float1,
            name_digit2: market.param_float2,
            name_digit3: market.param_float3,
            event_part_id: market.event_part_id.clone(),
            is_main_market: market.is_main_market,
            is_available: market.is_available.unwrap_or(true),
            is_closed: market.is_closed.unwrap_or(false),
            outcomes,
        }
    }
}
