use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::engine::{Engine, IngestTotals};
use crate::error::AppError;
use crate::projection::{MatchView, OfferView};
use crate::state::StoreCounts;
use crate::types::{ListType, Match, MatchInfo};

#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<Engine>,
    pub health: Arc<HealthState>,
    pub latency: Arc<LatencyStats>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/matches/:list_type", get(get_matches))
        .route("/matches/:list_type/raw", get(get_raw_matches))
        .route("/matches/:list_type/cycle", post(post_cycle))
        .route("/match-info/:match_id", get(get_match_info))
        .route("/offers/:outcome_id", get(get_offer))
        .route("/ws/offers/:outcome_id", get(ws_offer))
        .route("/health", get(get_health))
        .route("/stats/latency", get(get_stats_latency))
        .route("/stats/store", get(get_stats_store))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    pub feed_connected: bool,
    pub last_envelope_at_ns: u64,
}

#[derive(Serialize)]
pub struct LatencyResponse {
    pub samples: u64,
    pub p50_us: Option<u64>,
    pub p95_us: Option<u64>,
    pub p99_us: Option<u64>,
}

#[derive(Serialize)]
pub struct StoreStatsResponse {
    pub counts: StoreCounts,
    pub ingest: IngestTotals,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_matches(
    State(state): State<ApiState>,
    Path(list_type): Path<String>,
) -> Json<Vec<MatchView>> {
    Json(state.engine.matches(&ListType::from(list_type.as_str()), false))
}

/// Arms a new subscription cycle for the bucket the feed fills and returns
/// its current views.
async fn post_cycle(
    State(state): State<ApiState>,
    Path(list_type): Path<String>,
) -> Result<Json<Vec<MatchView>>, AppError> {
    let list_type = ListType::from(list_type.as_str());
    if !state.engine.start_cycle(&list_type) {
        return Err(AppError::Conflict(format!(
            "feed dumps are routed to {}, not {list_type}",
            state.engine.dump_target()
        )));
    }
    Ok(Json(state.engine.matches(&list_type, false)))
}

async fn get_raw_matches(
    State(state): State<ApiState>,
    Path(list_type): Path<String>,
) -> Json<Vec<Match>> {
    Json(state.engine.raw_matches(&ListType::from(list_type.as_str())))
}

async fn get_match_info(
    State(state): State<ApiState>,
    Path(match_id): Path<String>,
) -> Json<Vec<MatchInfo>> {
    Json(state.engine.match_info_for_match(&match_id))
}

async fn get_offer(
    State(state): State<ApiState>,
    Path(outcome_id): Path<String>,
) -> Result<Json<OfferView>, AppError> {
    state
        .engine
        .repository()
        .offer_for_outcome(&outcome_id)
        .map(|offer| Json(OfferView::from(&offer)))
        .ok_or_else(|| AppError::NotFound(format!("no offer for outcome {outcome_id}")))
}

async fn ws_offer(
    ws: WebSocketUpgrade,
    State(state): State<ApiState>,
    Path(outcome_id): Path<String>,
) -> Response {
    ws.on_upgrade(move |socket| stream_offer(socket, state.engine, outcome_id))
}

/// Pushes the current offer (if any) and every later change as JSON text
/// frames until either side goes away.
async fn stream_offer(mut socket: WebSocket, engine: Arc<Engine>, outcome_id: String) {
    let mut subscription = engine.subscribe_offer(&outcome_id);
    debug!(outcome_id = %outcome_id, "[API] offer stream opened");

    loop {
        tokio::select! {
            offer = subscription.next() => {
                let Some(offer) = offer else { break };
                let body = match serde_json::to_string(&OfferView::from(&offer)) {
                    Ok(body) => body,
                    Err(e) => {
                        warn!("[API] failed to encode offer {}: {e}", offer.id);
                        continue;
                    }
                };
                if socket.send(Message::Text(body)).await.is_err() {
                    break;
                }
            }

            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    subscription.cancel();
    debug!(outcome_id = %outcome_id, "[API] offer stream closed");
}

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        feed_connected: state.health.feed_connected(),
        last_envelope_at_ns: state.health.last_envelope_at_ns(),
    })
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencyResponse> {
    let (p50_us, p95_us, p99_us) = state.latency.percentiles();
    Json(LatencyResponse {
        samples: state.latency.len(),
        p50_us,
        p95_us,
        p99_us,
    })
}

async fn get_stats_store(State(state): State<ApiState>) -> Json<StoreStatsResponse> {
    Json(StoreStatsResponse {
        counts: state.engine.repository().counts(),
        ingest: state.engine.totals(),
    })
}
