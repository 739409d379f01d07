use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::error::InvariantViolation;
use crate::state::channels::{ChannelRegistry, Subscription};
use crate::types::{
    BettingOffer, ListType, Location, Market, MarketOutcomeRelation, Match, MatchInfo, Outcome,
    Tournament,
};
use crate::wire::{DeltaUpdate, Entity};

/// Outcome of applying one dump or update batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ApplyStats {
    /// Records that changed or created an entity.
    pub applied: usize,
    /// Unknown, untracked or sink records.
    pub ignored: usize,
    /// Updates whose target id is not in the store.
    pub missing: usize,
}

/// Ordered copy of every table and index, for comparisons and diagnostics.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct StoreSnapshot {
    pub matches: BTreeMap<String, Match>,
    pub markets: BTreeMap<String, Market>,
    pub outcomes: BTreeMap<String, Outcome>,
    pub offers: BTreeMap<String, BettingOffer>,
    pub relations: BTreeMap<String, MarketOutcomeRelation>,
    pub tournaments: BTreeMap<String, Tournament>,
    pub locations: BTreeMap<String, Location>,
    pub match_info: BTreeMap<String, MatchInfo>,
    pub markets_for_match: BTreeMap<String, Vec<String>>,
    pub outcomes_for_market: BTreeMap<String, Vec<String>>,
    pub offer_for_outcome: BTreeMap<String, String>,
    pub list_buckets: BTreeMap<String, Vec<String>>,
    pub main_market_order: Vec<String>,
}

#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct StoreCounts {
    pub matches: usize,
    pub markets: usize,
    pub outcomes: usize,
    pub offers: usize,
    pub relations: usize,
    pub tournaments: usize,
    pub locations: usize,
    pub match_info: usize,
    pub live_channels: usize,
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// Normalized entity store. Writers are serialized by `write_lock`; readers go
/// straight to the tables and never see a half-written record.
pub struct Repository {
    write_lock: Mutex<()>,

    matches: DashMap<String, Match>,
    markets: DashMap<String, Market>,
    outcomes: DashMap<String, Outcome>,
    /// offer_id → offer
    offers: DashMap<String, BettingOffer>,
    relations: DashMap<String, MarketOutcomeRelation>,
    tournaments: DashMap<String, Tournament>,
    locations: DashMap<String, Location>,
    match_info: DashMap<String, MatchInfo>,

    /// match_id → market ids, first-seen order
    markets_for_match: DashMap<String, Vec<String>>,
    /// market_id → outcome ids, first-seen order
    outcomes_for_market: DashMap<String, Vec<String>>,
    /// outcome_id → offer_id
    offer_for_outcome: DashMap<String, String>,
    /// location_id → tournament ids
    tournaments_for_location: DashMap<String, Vec<String>>,
    /// match_id → match info ids
    match_info_for_match: DashMap<String, Vec<String>>,

    list_buckets: RwLock<HashMap<ListType, Vec<String>>>,
    /// Betting-type ids of main markets, in the order they were announced.
    main_market_order: RwLock<Vec<String>>,

    offer_channels: ChannelRegistry<BettingOffer>,
    /// Same offers, keyed by the outcome id they back.
    outcome_offer_channels: ChannelRegistry<BettingOffer>,
    market_channels: ChannelRegistry<Market>,
    match_info_channels: ChannelRegistry<MatchInfo>,
    /// Match ids that have at least one MatchInfo, first-seen order.
    matches_with_info: watch::Sender<Vec<String>>,
}

impl Repository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Upsert every entity of a dump. Match ids are appended to `list_type`'s
    /// bucket. With `should_clear`, all buckets and the main-market order are
    /// emptied first.
    pub fn apply_initial_dump(
        &self,
        entities: Vec<Entity>,
        list_type: &ListType,
        should_clear: bool,
    ) -> ApplyStats {
        let _guard = self.write_lock.lock();
        let mut stats = ApplyStats::default();

        if should_clear {
            self.list_buckets.write().clear();
            self.main_market_order.write().clear();
        }

        for entity in entities {
            match entity {
                Entity::Match(m) => self.upsert_match(m, list_type),
                Entity::MatchInfo(info) => self.upsert_match_info(info),
                Entity::Tournament(t) => self.upsert_tournament(t),
                Entity::BettingOffer(offer) => self.upsert_offer(offer),
                Entity::Outcome(outcome) => {
                    self.outcomes.insert(outcome.id.clone(), outcome);
                }
                Entity::Market(market) | Entity::MainMarket(market) => self.upsert_market(market),
                Entity::MarketOutcomeRelation(rel) => {
                    if !self.upsert_relation(rel) {
                        stats.ignored += 1;
                        continue;
                    }
                }
                Entity::Location(location) => {
                    self.locations.insert(location.id.clone(), location);
                }
                Entity::EventPartScore => {
                    stats.ignored += 1;
                    continue;
                }
                Entity::Unknown(kind) => {
                    debug!(kind = %kind, "[STORE] ignoring unknown entity type");
                    stats.ignored += 1;
                    continue;
                }
            }
            stats.applied += 1;
        }

        info!(
            list_type = %list_type,
            should_clear,
            applied = stats.applied,
            ignored = stats.ignored,
            "[STORE] initial dump applied"
        );
        stats
    }

    /// Apply field-level deltas. Targets must already exist: only
    /// `MatchInfoReplaced` creates.
    pub fn apply_update_batch(&self, deltas: Vec<DeltaUpdate>) -> ApplyStats {
        let _guard = self.write_lock.lock();
        let mut stats = ApplyStats::default();

        for delta in deltas {
            match delta {
                DeltaUpdate::OfferChanged { id, odds, is_live, is_available } => {
                    let updated = match self.offers.get_mut(&id) {
                        Some(mut offer) => {
                            *offer = offer.patched(odds, is_live, is_available);
                            offer.clone()
                        }
                        None => {
                            stats.missing += 1;
                            continue;
                        }
                    };
                    self.publish_offer(updated);
                }
                DeltaUpdate::MarketAvailability { id, is_available, is_closed } => {
                    let updated = match self.markets.get_mut(&id) {
                        Some(mut market) => {
                            *market = market.patched(is_available, is_closed);
                            market.clone()
                        }
                        None => {
                            stats.missing += 1;
                            continue;
                        }
                    };
                    self.market_channels.publish(&id, updated);
                }
                DeltaUpdate::ScoreChanged { id, patch } => {
                    let updated = match self.match_info.get_mut(&id) {
                        Some(mut info) => {
                            *info = info.patched(&patch);
                            info.clone()
                        }
                        None => {
                            stats.missing += 1;
                            continue;
                        }
                    };
                    self.match_info_channels.publish(&id, updated);
                }
                DeltaUpdate::MatchInfoReplaced(info) => self.upsert_match_info(info),
                DeltaUpdate::Untracked { .. } => {
                    stats.ignored += 1;
                    continue;
                }
                DeltaUpdate::Unknown(kind) => {
                    debug!(kind = %kind, "[STORE] ignoring unknown delta type");
                    stats.ignored += 1;
                    continue;
                }
            }
            stats.applied += 1;
        }

        debug!(
            applied = stats.applied,
            ignored = stats.ignored,
            missing = stats.missing,
            "[STORE] update batch applied"
        );
        stats
    }

    /// Replace the whole location table.
    pub fn store_locations(&self, locations: Vec<Location>) {
        let _guard = self.write_lock.lock();
        self.locations.clear();
        for location in locations {
            self.locations.insert(location.id.clone(), location);
        }
    }

    /// Drop live channels nobody listens to. They are recreated on demand.
    pub fn prune_idle_channels(&self) -> usize {
        self.offer_channels.prune_idle()
            + self.outcome_offer_channels.prune_idle()
            + self.market_channels.prune_idle()
            + self.match_info_channels.prune_idle()
    }

    fn upsert_match(&self, m: Match, list_type: &ListType) {
        {
            let mut buckets = self.list_buckets.write();
            let bucket = buckets.entry(list_type.clone()).or_default();
            if !bucket.contains(&m.id) {
                bucket.push(m.id.clone());
            }
        }
        self.matches.insert(m.id.clone(), m);
    }

    fn upsert_market(&self, market: Market) {
        let id = market.id.clone();
        let previous_event = self.markets.get(&id).and_then(|m| m.event_id.clone());
        if let Some(prev) = previous_event {
            if market.event_id.as_deref() != Some(prev.as_str()) {
                remove_from(&self.markets_for_match, &prev, &id);
            }
        }
        if let Some(event_id) = &market.event_id {
            push_unique(&self.markets_for_match, event_id, &id);
        }
        if market.is_main_market {
            if let Some(betting_type) = &market.betting_type_id {
                let mut order = self.main_market_order.write();
                if !order.contains(betting_type) {
                    order.push(betting_type.clone());
                }
            }
        }
        self.markets.insert(id.clone(), market.clone());
        self.market_channels.publish(&id, market);
    }

    fn upsert_offer(&self, offer: BettingOffer) {
        let previous_outcome = self.offers.get(&offer.id).and_then(|o| o.outcome_id.clone());
        self.offers.insert(offer.id.clone(), offer.clone());

        if let Some(prev) = previous_outcome {
            if offer.outcome_id.as_deref() != Some(prev.as_str())
                && self
                    .offer_for_outcome
                    .remove_if(&prev, |_, offer_id| *offer_id == offer.id)
                    .is_some()
            {
                self.outcome_offer_channels.retract(&prev);
            }
        }
        if let Some(outcome_id) = &offer.outcome_id {
            self.offer_for_outcome.insert(outcome_id.clone(), offer.id.clone());
        }
        self.publish_offer(offer);
    }

    fn publish_offer(&self, offer: BettingOffer) {
        if let Some(outcome_id) = &offer.outcome_id {
            self.outcome_offer_channels.publish(outcome_id, offer.clone());
        }
        let id = offer.id.clone();
        self.offer_channels.publish(&id, offer);
    }

    /// Returns false if the relation was rejected.
    fn upsert_relation(&self, rel: MarketOutcomeRelation) -> bool {
        let conflicting = self
            .relations
            .get(&rel.id)
            .map(|existing| existing.market_id != rel.market_id || existing.outcome_id != rel.outcome_id)
            .unwrap_or(false);
        if conflicting {
            report_violation(InvariantViolation(format!(
                "relation {} re-sent with a different (market, outcome) pair ({}, {})",
                rel.id, rel.market_id, rel.outcome_id
            )));
            return false;
        }
        push_unique(&self.outcomes_for_market, &rel.market_id, &rel.outcome_id);
        self.relations.insert(rel.id.clone(), rel);
        true
    }

    fn upsert_tournament(&self, tournament: Tournament) {
        let id = tournament.id.clone();
        let previous_venue = self.tournaments.get(&id).and_then(|t| t.venue_id.clone());
        if let Some(prev) = previous_venue {
            if tournament.venue_id.as_deref() != Some(prev.as_str()) {
                remove_from(&self.tournaments_for_location, &prev, &id);
            }
        }
        if let Some(venue_id) = &tournament.venue_id {
            push_unique(&self.tournaments_for_location, venue_id, &id);
        }
        self.tournaments.insert(id, tournament);
    }

    fn upsert_match_info(&self, info: MatchInfo) {
        let id = info.id.clone();
        if let Some(match_id) = &info.match_id {
            push_unique(&self.match_info_for_match, match_id, &id);
            self.matches_with_info.send_if_modified(|ids| {
                if ids.contains(match_id) {
                    false
                } else {
                    ids.push(match_id.clone());
                    true
                }
            });
        }
        self.match_info.insert(id.clone(), info.clone());
        self.match_info_channels.publish(&id, info);
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Match ids of a bucket in first-seen order.
    pub fn query(&self, list_type: &ListType) -> Vec<String> {
        self.list_buckets.read().get(list_type).cloned().unwrap_or_default()
    }

    /// Stored matches of a bucket, in bucket order. Dangling ids are skipped.
    pub fn raw_matches(&self, list_type: &ListType) -> Vec<Match> {
        self.query(list_type)
            .iter()
            .filter_map(|id| self.get_match(id))
            .collect()
    }

    pub fn get_match(&self, id: &str) -> Option<Match> {
        self.matches.get(id).map(|m| m.clone())
    }

    pub fn get_market(&self, id: &str) -> Option<Market> {
        self.markets.get(id).map(|m| m.clone())
    }

    pub fn get_outcome(&self, id: &str) -> Option<Outcome> {
        self.outcomes.get(id).map(|o| o.clone())
    }

    pub fn get_offer(&self, id: &str) -> Option<BettingOffer> {
        self.offers.get(id).map(|o| o.clone())
    }

    /// The offer backing `outcome_id`.
    pub fn offer_for_outcome(&self, outcome_id: &str) -> Option<BettingOffer> {
        let offer_id = self.offer_for_outcome.get(outcome_id)?.clone();
        self.get_offer(&offer_id)
    }

    pub fn get_location(&self, id: &str) -> Option<Location> {
        self.locations.get(id).map(|l| l.clone())
    }

    pub fn markets_for_match(&self, match_id: &str) -> Vec<String> {
        self.markets_for_match.get(match_id).map(|ids| ids.clone()).unwrap_or_default()
    }

    pub fn outcomes_for_market(&self, market_id: &str) -> Vec<String> {
        self.outcomes_for_market.get(market_id).map(|ids| ids.clone()).unwrap_or_default()
    }

    pub fn main_market_order(&self) -> Vec<String> {
        self.main_market_order.read().clone()
    }

    pub fn match_info_for_match(&self, match_id: &str) -> Vec<MatchInfo> {
        let ids = self.match_info_for_match.get(match_id).map(|ids| ids.clone()).unwrap_or_default();
        ids.iter().filter_map(|id| self.match_info.get(id).map(|i| i.clone())).collect()
    }

    pub fn tournaments_for_location(&self, location_id: &str) -> Vec<Tournament> {
        let ids = self
            .tournaments_for_location
            .get(location_id)
            .map(|ids| ids.clone())
            .unwrap_or_default();
        ids.iter().filter_map(|id| self.tournaments.get(id).map(|t| t.clone())).collect()
    }

    // -----------------------------------------------------------------------
    // Live channels
    // -----------------------------------------------------------------------

    pub fn subscribe_offer(&self, offer_id: &str) -> Subscription<BettingOffer> {
        self.offer_channels.subscribe(offer_id, self.get_offer(offer_id))
    }

    /// Live offer backing `outcome_id`. Works before the offer is known.
    pub fn subscribe_offer_for_outcome(&self, outcome_id: &str) -> Subscription<BettingOffer> {
        self.outcome_offer_channels
            .subscribe(outcome_id, self.offer_for_outcome(outcome_id))
    }

    pub fn subscribe_market(&self, market_id: &str) -> Subscription<Market> {
        self.market_channels.subscribe(market_id, self.get_market(market_id))
    }

    pub fn subscribe_match_info(&self, info_id: &str) -> Subscription<MatchInfo> {
        let current = self.match_info.get(info_id).map(|i| i.clone());
        self.match_info_channels.subscribe(info_id, current)
    }

    pub fn subscribe_matches_with_info(&self) -> watch::Receiver<Vec<String>> {
        self.matches_with_info.subscribe()
    }

    // -----------------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------------

    pub fn counts(&self) -> StoreCounts {
        StoreCounts {
            matches: self.matches.len(),
            markets: self.markets.len(),
            outcomes: self.outcomes.len(),
            offers: self.offers.len(),
            relations: self.relations.len(),
            tournaments: self.tournaments.len(),
            locations: self.locations.len(),
            match_info: self.match_info.len(),
            live_channels: self.offer_channels.len()
                + self.outcome_offer_channels.len()
                + self.market_channels.len()
                + self.match_info_channels.len(),
        }
    }

    /// Consistent copy of the whole store, taken under the write lock.
    pub fn snapshot(&self) -> StoreSnapshot {
        let _guard = self.write_lock.lock();
        StoreSnapshot {
            matches: copy_table(&self.matches),
            markets: copy_table(&self.markets),
            outcomes: copy_table(&self.outcomes),
            offers: copy_table(&self.offers),
            relations: copy_table(&self.relations),
            tournaments: copy_table(&self.tournaments),
            locations: copy_table(&self.locations),
            match_info: copy_table(&self.match_info),
            markets_for_match: copy_table(&self.markets_for_match),
            outcomes_for_market: copy_table(&self.outcomes_for_market),
            offer_for_outcome: copy_table(&self.offer_for_outcome),
            list_buckets: self
                .list_buckets
                .read()
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            main_market_order: self.main_market_order.read().clone(),
        }
    }
}

impl Default for Repository {
    fn default() -> Self {
        Self {
            write_lock: Mutex::new(()),
            matches: DashMap::new(),
            markets: DashMap::new(),
            outcomes: DashMap::new(),
            offers: DashMap::new(),
            relations: DashMap::new(),
            tournaments: DashMap::new(),
            locations: DashMap::new(),
            match_info: DashMap::new(),
            markets_for_match: DashMap::new(),
            outcomes_for_market: DashMap::new(),
            offer_for_outcome: DashMap::new(),
            tournaments_for_location: DashMap::new(),
            match_info_for_match: DashMap::new(),
            list_buckets: RwLock::new(HashMap::new()),
            main_market_order: RwLock::new(Vec::new()),
            offer_channels: ChannelRegistry::new(),
            outcome_offer_channels: ChannelRegistry::new(),
            market_channels: ChannelRegistry::new(),
            match_info_channels: ChannelRegistry::new(),
            matches_with_info: watch::channel(Vec::new()).0,
        }
    }
}

fn push_unique(index: &DashMap<String, Vec<String>>, key: &str, value: &str) {
    let mut ids = index.entry(key.to_string()).or_default();
    if !ids.iter().any(|v| v == value) {
        ids.push(value.to_string());
    }
}

fn remove_from(index: &DashMap<String, Vec<String>>, key: &str, value: &str) {
    if let Some(mut ids) = index.get_mut(key) {
        ids.retain(|v| v != value);
    }
}

fn copy_table<V: Clone>(table: &DashMap<String, V>) -> BTreeMap<String, V> {
    table.iter().map(|e| (e.key().clone(), e.value().clone())).collect()
}

/// Impossible store states abort debug builds and are logged in release.
fn report_violation(violation: InvariantViolation) {
    if cfg!(debug_assertions) {
        panic!("{violation}");
    }
    error!("[STORE] {violation}");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
