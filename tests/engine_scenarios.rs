use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use odds_aggregator::types::ListType;
use odds_aggregator::{Engine, IngestMode};

const FAV: ListType = ListType::FavoriteMatches;

fn dump(records: &str) -> Vec<u8> {
    format!(r#"{{"messageType":"INITIAL_DUMP","records":[{records}]}}"#).into_bytes()
}

fn update(records: &str) -> Vec<u8> {
    format!(r#"{{"messageType":"UPDATE","records":[{records}]}}"#).into_bytes()
}

const M1_FULL: &str = r#"
    {"_type":"MATCH","id":"M1","homeParticipantName":"Lions","awayParticipantName":"Tigers","startTime":1700000000000},
    {"_type":"MARKET","id":"MK1","eventId":"M1","bettingTypeId":"1X2","shortName":"Match Result"},
    {"_type":"OUTCOME","id":"O1","headerNameKey":"home"},
    {"_type":"MARKET_OUTCOME_RELATION","id":"R1","marketId":"MK1","outcomeId":"O1"},
    {"_type":"BETTING_OFFER","id":"B1","outcomeId":"O1","odds":1.80}
"#;

#[test]
fn end_to_end_dump_projects_one_priced_outcome() {
    let engine = Engine::new(FAV);
    let report = engine.ingest(&dump(M1_FULL));
    assert_eq!(report.mode, IngestMode::InitialDump);
    assert_eq!(report.dropped, 0);

    let views = engine.matches(&FAV, false);
    assert_eq!(views.len(), 1);
    let m1 = &views[0];
    assert_eq!(m1.id, "M1");
    assert_eq!(m1.home.name, "Lions");
    assert_eq!(m1.markets.len(), 1);
    assert_eq!(m1.markets[0].id, "MK1");
    assert_eq!(m1.markets[0].outcomes.len(), 1);
    let outcome = &m1.markets[0].outcomes[0];
    assert_eq!(outcome.id, "O1");
    assert_eq!(outcome.offer.id, "B1");
    assert!((outcome.offer.odds - 1.80).abs() < 1e-9);
}

#[test]
fn reapplying_the_same_dump_is_idempotent() {
    let engine = Engine::new(FAV);
    engine.ingest(&dump(M1_FULL));
    let once = engine.repository().snapshot();
    engine.ingest(&dump(M1_FULL));
    assert_eq!(engine.repository().snapshot(), once);
}

#[test]
fn malformed_record_is_isolated_from_the_rest_of_the_batch() {
    let engine = Engine::new(FAV);
    let report = engine.ingest(&dump(
        r#"
        {"_type":"MATCH","id":"M1"},
        {"_type":"MATCH","id":"M2"},
        {"_type":"BETTING_OFFER","odds":"not-a-number"},
        {"_type":"MATCH","id":"M3"}
    "#,
    ));
    assert_eq!(report.dropped, 1);
    assert_eq!(engine.repository().counts().matches, 3);
    assert_eq!(engine.repository().query(&FAV), vec!["M1", "M2", "M3"]);
}

#[test]
fn delta_patches_only_the_fields_it_carries() {
    let engine = Engine::new(FAV);
    engine.ingest(&dump(
        r#"{"_type":"BETTING_OFFER","id":"B1","outcomeId":"O1","odds":1.80,"isLive":false,"isAvailable":true,"statusId":"1"}"#,
    ));
    engine.ingest(&update(
        r#"{"entityType":"BETTING_OFFER","changeType":"UPDATE","id":"B1","changedProperties":{"isLive":true}}"#,
    ));

    let offer = engine.repository().get_offer("B1").unwrap();
    assert_eq!(offer.is_live, Some(true));
    assert_eq!(offer.odds, Some(1.80));
    assert_eq!(offer.is_available, Some(true));
    assert_eq!(offer.status_id.as_deref(), Some("1"));
    assert_eq!(offer.outcome_id.as_deref(), Some("O1"));
}

#[test]
fn update_for_unknown_entity_does_not_create_it() {
    let engine = Engine::new(FAV);
    let before = engine.repository().snapshot();
    let report = engine.ingest(&update(
        r#"
        {"entityType":"BETTING_OFFER","changeType":"UPDATE","id":"B404","changedProperties":{"odds":3.0}},
        {"entityType":"MARKET","changeType":"UPDATE","id":"MK404","changedProperties":{"isClosed":true}}
    "#,
    ));
    assert_eq!(report.mode, IngestMode::Update);
    assert_eq!(report.stats.missing, 2);
    assert_eq!(engine.repository().snapshot(), before);
}

#[test]
fn markets_follow_main_market_order_with_unknown_types_last() {
    let engine = Engine::new(FAV);
    engine.ingest(&dump(
        r#"
        {"_type":"MAIN_MARKET","id":"MM1","bettingTypeId":"1X2"},
        {"_type":"MAIN_MARKET","id":"MM2","bettingTypeId":"OU"},
        {"_type":"MATCH","id":"M1"},
        {"_type":"MARKET","id":"MK-OU","eventId":"M1","bettingTypeId":"OU"},
        {"_type":"MARKET","id":"MK-X","eventId":"M1","bettingTypeId":"UNKNOWN"},
        {"_type":"MARKET","id":"MK-1X2","eventId":"M1","bettingTypeId":"1X2"}
    "#,
    ));

    let views = engine.matches(&FAV, false);
    let types: Vec<_> = views[0].markets.iter().map(|m| m.type_id.as_str()).collect();
    assert_eq!(types, vec!["1X2", "OU", "UNKNOWN"]);
}

#[tokio::test]
async fn live_offer_subscriber_sees_current_value_then_one_change() {
    let engine = Engine::new(FAV);
    engine.ingest(&dump(M1_FULL));

    let mut sub = engine.subscribe_offer("O1");
    let first = sub.next().await.unwrap();
    assert!((first.odds.unwrap() - 1.80).abs() < 1e-9);

    engine.ingest(&update(
        r#"{"entityType":"BETTING_OFFER","changeType":"UPDATE","id":"B1","changedProperties":{"odds":1.95}}"#,
    ));
    let changed = tokio::time::timeout(Duration::from_secs(1), sub.next())
        .await
        .unwrap()
        .unwrap();
    assert!((changed.odds.unwrap() - 1.95).abs() < 1e-9);
    assert!(!sub.has_pending());

    let views = engine.matches(&FAV, false);
    assert!((views[0].markets[0].outcomes[0].offer.odds - 1.95).abs() < 1e-9);
}

#[test]
fn dangling_references_are_dropped_from_views() {
    let engine = Engine::new(FAV);
    engine.ingest(&dump(
        r#"
        {"_type":"MATCH","id":"M1","venueId":"L404"},
        {"_type":"MARKET","id":"MK1","eventId":"M1","bettingTypeId":"1X2"},
        {"_type":"MARKET_OUTCOME_RELATION","id":"R1","marketId":"MK1","outcomeId":"O404"},
        {"_type":"OUTCOME","id":"O2","headerNameKey":"draw"},
        {"_type":"MARKET_OUTCOME_RELATION","id":"R2","marketId":"MK1","outcomeId":"O2"},
        {"_type":"BETTING_OFFER","id":"B2","outcomeId":"O2","odds":3.40},
        {"_type":"OUTCOME","id":"O3","headerNameKey":"away"},
        {"_type":"MARKET_OUTCOME_RELATION","id":"R3","marketId":"MK1","outcomeId":"O3"}
    "#,
    ));

    let views = engine.matches(&FAV, false);
    assert_eq!(views.len(), 1);
    assert!(views[0].venue.is_none());
    assert_eq!(views[0].markets.len(), 1);
    let ids: Vec<_> = views[0].markets[0].outcomes.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["O2"]);
    assert!((views[0].markets[0].outcomes[0].offer.odds - 3.40).abs() < 1e-9);
}

#[test]
fn garbage_envelope_is_rejected_without_touching_the_store() {
    let engine = Engine::new(FAV);
    engine.ingest(&dump(M1_FULL));
    let before = engine.repository().snapshot();

    let report = engine.ingest(b"{not json");
    assert_eq!(report.mode, IngestMode::Rejected);
    assert_eq!(engine.repository().snapshot(), before);
    assert_eq!(engine.totals().rejected_envelopes, 1);
}

#[test]
fn new_cycle_replaces_bucket_but_keeps_entities() {
    let engine = Engine::new(FAV);
    engine.ingest(&dump(M1_FULL));
    engine.matches(&FAV, true);
    engine.ingest(&dump(r#"{"_type":"MATCH","id":"M2"}"#));

    assert_eq!(engine.repository().query(&FAV), vec!["M2"]);
    assert!(engine.repository().get_match("M1").is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn readers_see_whole_offers_while_deltas_stream_in() {
    const DELTAS: usize = 3000;
    let published: Vec<f64> = (0..DELTAS).map(|i| 1.01 + i as f64 / 100.0).collect();

    let engine = Arc::new(Engine::new(FAV));
    engine.ingest(&dump(M1_FULL));

    // Held open and never polled.
    let idle = engine.subscribe_offer("O1");

    let done = Arc::new(AtomicBool::new(false));
    let reader = {
        let engine = Arc::clone(&engine);
        let done = Arc::clone(&done);
        let mut allowed = published.clone();
        allowed.push(1.80);
        tokio::spawn(async move {
            let mut reads = 0usize;
            while !done.load(Ordering::Acquire) {
                let views = engine.matches(&FAV, false);
                assert_eq!(views.len(), 1);
                let outcomes = &views[0].markets[0].outcomes;
                assert_eq!(outcomes.len(), 1);
                let offer = &outcomes[0].offer;
                assert_eq!(offer.id, "B1");
                assert!(allowed.iter().any(|odds| (odds - offer.odds).abs() < 1e-9));
                reads += 1;
                tokio::task::yield_now().await;
            }
            reads
        })
    };

    let ingest = tokio::time::timeout(Duration::from_secs(10), async {
        for odds in &published {
            let report = engine.ingest(&update(&format!(
                r#"{{"entityType":"BETTING_OFFER","changeType":"UPDATE","id":"B1","changedProperties":{{"odds":{odds}}}}}"#
            )));
            assert_eq!(report.stats.applied, 1);
            tokio::task::yield_now().await;
        }
    })
    .await;
    done.store(true, Ordering::Release);

    assert!(ingest.is_ok(), "ingestion stalled behind an idle subscriber");
    assert!(reader.await.unwrap() > 0);

    let last = published[DELTAS - 1];
    assert!((idle.current().unwrap().odds.unwrap() - last).abs() < 1e-9);
    assert!(idle.has_pending());
}
