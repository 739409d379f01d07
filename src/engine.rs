use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::projection::{Assembler, MatchView};
use crate::state::{ApplyStats, Repository, Subscription};
use crate::types::{BettingOffer, ListType, Location, Market, Match, MatchInfo, Tournament};
use crate::wire::{decode_envelope, Envelope};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestMode {
    InitialDump,
    Update,
    /// The bytes were not an envelope at all.
    Rejected,
}

/// What one `ingest` call did. Ingestion never fails; this is diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub mode: IngestMode,
    /// Records dropped because they failed to decode.
    pub dropped: usize,
    pub stats: ApplyStats,
}

/// Lifetime ingest counters.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct IngestTotals {
    pub envelopes: u64,
    pub dumps: u64,
    pub updates: u64,
    pub rejected_envelopes: u64,
    pub dropped_records: u64,
    pub missing_targets: u64,
}

/// Where the next `INITIAL_DUMP` goes and whether it starts a fresh cycle.
#[derive(Debug, Clone)]
struct DumpRouting {
    list_type: ListType,
    clear_next: bool,
}

#[derive(Default)]
struct Counters {
    envelopes: AtomicU64,
    dumps: AtomicU64,
    updates: AtomicU64,
    rejected_envelopes: AtomicU64,
    dropped_records: AtomicU64,
    missing_targets: AtomicU64,
}

/// Engine-facing API: one ingestion path, any number of readers and subscribers.
pub struct Engine {
    repo: Arc<Repository>,
    routing: Mutex<DumpRouting>,
    counters: Counters,
}

impl Engine {
    pub fn new(list_type: ListType) -> Self {
        Self {
            repo: Repository::new(),
            routing: Mutex::new(DumpRouting { list_type, clear_next: false }),
            counters: Counters::default(),
        }
    }

    pub fn repository(&self) -> &Arc<Repository> {
        &self.repo
    }

    /// File subsequent dumps under `list_type`. With `clear`, the next dump
    /// starts a fresh cycle: buckets and main-market order are emptied first.
    pub fn route_dumps(&self, list_type: ListType, clear: bool) {
        let mut routing = self.routing.lock();
        routing.list_type = list_type;
        routing.clear_next |= clear;
    }

    /// Decode and apply one envelope. Every failure is absorbed here.
    pub fn ingest(&self, raw: &[u8]) -> IngestReport {
        self.counters.envelopes.fetch_add(1, Ordering::Relaxed);

        let decoded = match decode_envelope(raw) {
            Ok(d) => d,
            Err(e) => {
                self.counters.rejected_envelopes.fetch_add(1, Ordering::Relaxed);
                warn!("[INGEST] rejected envelope: {e}");
                return IngestReport {
                    mode: IngestMode::Rejected,
                    dropped: 0,
                    stats: ApplyStats::default(),
                };
            }
        };
        self.counters
            .dropped_records
            .fetch_add(decoded.dropped as u64, Ordering::Relaxed);

        let (mode, stats) = match decoded.envelope {
            Envelope::InitialDump(entities) => {
                self.counters.dumps.fetch_add(1, Ordering::Relaxed);
                let (list_type, clear) = {
                    let mut routing = self.routing.lock();
                    let clear = std::mem::take(&mut routing.clear_next);
                    (routing.list_type.clone(), clear)
                };
                if clear {
                    let pruned = self.repo.prune_idle_channels();
                    debug!(pruned, "[INGEST] pruned idle live channels");
                }
                let stats = self.repo.apply_initial_dump(entities, &list_type, clear);
                (IngestMode::InitialDump, stats)
            }
            Envelope::Update(deltas) => {
                self.counters.updates.fetch_add(1, Ordering::Relaxed);
                (IngestMode::Update, self.repo.apply_update_batch(deltas))
            }
        };
        self.counters
            .missing_targets
            .fetch_add(stats.missing as u64, Ordering::Relaxed);

        IngestReport { mode, dropped: decoded.dropped, stats }
    }

    /// Bucket the next `INITIAL_DUMP` is filed under.
    pub fn dump_target(&self) -> ListType {
        self.routing.lock().list_type.clone()
    }

    /// Start a new subscription cycle for `list_type`: the next dump replaces
    /// the bucket contents instead of appending. Only the bucket dumps are
    /// currently routed to can be cycled; returns false for any other.
    pub fn start_cycle(&self, list_type: &ListType) -> bool {
        let mut routing = self.routing.lock();
        if routing.list_type != *list_type {
            warn!(
                requested = %list_type,
                routed = %routing.list_type,
                "[INGEST] refusing to cycle a bucket the feed does not fill"
            );
            return false;
        }
        routing.clear_next = true;
        info!(list_type = %list_type, "[INGEST] new subscription cycle");
        true
    }

    /// Assembled views for a bucket. With `clear`, also starts a new
    /// subscription cycle (see `start_cycle`); routing is never changed here.
    pub fn matches(&self, list_type: &ListType, clear: bool) -> Vec<MatchView> {
        if clear {
            self.start_cycle(list_type);
        }
        Assembler::new(&self.repo).build_matches(list_type)
    }

    /// Live offer backing `outcome_id`: current value first, then every change.
    pub fn subscribe_offer(&self, outcome_id: &str) -> Subscription<BettingOffer> {
        self.repo.subscribe_offer_for_outcome(outcome_id)
    }

    pub fn subscribe_market(&self, market_id: &str) -> Subscription<Market> {
        self.repo.subscribe_market(market_id)
    }

    pub fn subscribe_match_info(&self, info_id: &str) -> Subscription<MatchInfo> {
        self.repo.subscribe_match_info(info_id)
    }

    pub fn subscribe_matches_with_info(&self) -> watch::Receiver<Vec<String>> {
        self.repo.subscribe_matches_with_info()
    }

    pub fn raw_matches(&self, list_type: &ListType) -> Vec<Match> {
        self.repo.raw_matches(list_type)
    }

    pub fn match_info_for_match(&self, match_id: &str) -> Vec<MatchInfo> {
        self.repo.match_info_for_match(match_id)
    }

    pub fn tournaments_for_location(&self, location_id: &str) -> Vec<Tournament> {
        self.repo.tournaments_for_location(location_id)
    }

    pub fn store_locations(&self, locations: Vec<Location>) {
        let count = locations.len();
        self.repo.store_locations(locations);
        info!(count, "[STORE] location table replaced");
    }

    pub fn totals(&self) -> IngestTotals {
        IngestTotals {
            envelopes: self.counters.envelopes.load(Ordering::Relaxed),
            dumps: self.counters.dumps.load(Ordering::Relaxed),
            updates: self.counters.updates.load(Ordering::Relaxed),
            rejected_envelopes: self.counters.rejected_envelopes.load(Ordering::Relaxed),
            dropped_records: self.counters.dropped_records.load(Ordering::Relaxed),
            missing_targets: self.counters.missing_targets.load(Ordering::Relaxed),
        }
    }
}
