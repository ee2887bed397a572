use axum::{
    extract::{Path, Query, State as AxumState},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, get_service, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tracing::{error, info};

use crate::bracket::{MatchView, NextMatch, Participant, TournamentState};
use crate::config::now_ms;
use crate::error::ArenaError;
use crate::ledger::{BettingView, Wager};
use crate::stats::{HistoryEntry, StatsSummary};
use crate::types::*;

// ── Error mapping ──────────────────────────────────────────────────────

pub struct ApiError(ArenaError);

impl From<ArenaError> for ApiError {
    fn from(err: ArenaError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ArenaError::UnknownMatch(_) | ArenaError::NoActiveTournament => StatusCode::NOT_FOUND,
            ArenaError::MatchNotReady(_)
            | ArenaError::MatchInProgress(_)
            | ArenaError::BettingClosed(_)
            | ArenaError::InsufficientPoints { .. }
            | ArenaError::ResultUnavailable { .. } => StatusCode::CONFLICT,
            ArenaError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };
        let body = json!({ "error": self.0.to_string(), "kind": self.0.kind() });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ── Payloads ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextPayload {
    pub status: &'static str,
    #[serde(rename = "match")]
    pub next: Option<MatchView>,
    pub champion: Option<Participant>,
    pub betting: Option<BettingView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPayload {
    #[serde(rename = "match")]
    pub decided: Option<MatchView>,
    pub state: Option<TournamentState>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BetPayload {
    pub wager: Wager,
    pub points: u64,
}

// ── Router ─────────────────────────────────────────────────────────────

pub fn api_router(state: SharedCoordinator, static_dir: Option<PathBuf>) -> Router {
    let router = Router::new()
        .route("/state.json", get(get_state_json))
        .route("/bracket.txt", get(get_bracket_text))
        .route("/next", get(get_next_match))
        .route("/tournament", post(post_tournament))
        .route("/matches/:id/start", post(post_start_match))
        .route("/matches/:id/result", post(post_match_result))
        .route("/matches/:id/replay", post(post_replay_match))
        .route("/bets", post(post_bet))
        .route("/points/:bettor", get(get_points))
        .route("/stats", get(get_stats_summary))
        .route("/stats/reset", post(post_reset_stats))
        .route("/stats/:name", get(get_character_stats))
        .route("/history", get(get_history))
        .route("/help", get(get_help));

    let router = match static_dir {
        Some(dir) => router.nest_service("/overlay", get_service(ServeDir::new(dir))),
        None => router,
    };
    router.with_state(state)
}

pub async fn serve(state: SharedCoordinator, static_dir: Option<PathBuf>, addr: &str) {
    let app = api_router(state, static_dir);
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("API server failed to bind {addr}: {e}");
            return;
        }
    };
    info!("API server listening at http://{addr}/");
    if let Err(e) = axum::serve(listener, app).await {
        error!("API server error: {e}");
    }
}

// ── Handlers ───────────────────────────────────────────────────────────

async fn get_state_json(AxumState(state): AxumState<SharedCoordinator>) -> impl IntoResponse {
    let guard = state.lock().unwrap_or_else(|e| e.into_inner());
    Json(guard.snapshot(now_ms()))
}

async fn get_bracket_text(AxumState(state): AxumState<SharedCoordinator>) -> Result<String, ApiError> {
    let guard = state.lock().unwrap_or_else(|e| e.into_inner());
    Ok(guard.bracket_text()?)
}

async fn get_next_match(AxumState(state): AxumState<SharedCoordinator>) -> ApiResult<NextPayload> {
    let now = now_ms();
    let mut guard = state.lock().unwrap_or_else(|e| e.into_inner());
    let payload = match guard.next_match(now)? {
        NextMatch::Ready(view) => {
            let betting = guard.ledger().betting_view(view.id, now);
            NextPayload { status: "ready", next: Some(view), champion: None, betting }
        }
        NextMatch::RoundExhausted => NextPayload { status: "roundExhausted", next: None, champion: None, betting: None },
        NextMatch::Complete { champion } => {
            NextPayload { status: "complete", next: None, champion: Some(champion), betting: None }
        }
    };
    Ok(Json(payload))
}

async fn post_tournament(
    AxumState(state): AxumState<SharedCoordinator>,
    Json(request): Json<NewTournamentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let now = now_ms();
    let mut guard = state.lock().unwrap_or_else(|e| e.into_inner());
    let snapshot = if request.participants.is_empty() {
        guard.random_tournament(request.count, now)?
    } else {
        guard.new_tournament(&request.participants, request.size, now)?
    };
    Ok((StatusCode::CREATED, Json(snapshot)))
}

async fn post_start_match(
    AxumState(state): AxumState<SharedCoordinator>,
    Path(id): Path<u64>,
) -> ApiResult<MatchView> {
    let mut guard = state.lock().unwrap_or_else(|e| e.into_inner());
    Ok(Json(guard.start_match(id, now_ms())?))
}

async fn post_match_result(
    AxumState(state): AxumState<SharedCoordinator>,
    Path(id): Path<u64>,
    Json(request): Json<ReportResultRequest>,
) -> ApiResult<ResultPayload> {
    let mut guard = state.lock().unwrap_or_else(|e| e.into_inner());
    guard.report_result_by_name(id, &request.winner, request.duration_ms, now_ms())?;
    let bracket = guard.bracket();
    Ok(Json(ResultPayload {
        decided: bracket.and_then(|b| b.match_view(id)),
        state: bracket.map(|b| b.state()),
    }))
}

async fn post_replay_match(
    AxumState(state): AxumState<SharedCoordinator>,
    Path(id): Path<u64>,
) -> ApiResult<MatchView> {
    let mut guard = state.lock().unwrap_or_else(|e| e.into_inner());
    Ok(Json(guard.replay_match(id, now_ms())?))
}

async fn post_bet(
    AxumState(state): AxumState<SharedCoordinator>,
    Json(request): Json<PlaceBetRequest>,
) -> ApiResult<BetPayload> {
    let mut guard = state.lock().unwrap_or_else(|e| e.into_inner());
    let wager = guard.place_bet_by_name(
        &request.bettor,
        &request.participant,
        request.amount,
        request.match_id,
        now_ms(),
    )?;
    let points = guard.points(&request.bettor);
    Ok(Json(BetPayload { wager, points }))
}

async fn get_points(
    AxumState(state): AxumState<SharedCoordinator>,
    Path(bettor): Path<String>,
) -> Json<PointsPayload> {
    let mut guard = state.lock().unwrap_or_else(|e| e.into_inner());
    let points = guard.points(&bettor);
    Json(PointsPayload { bettor, points })
}

async fn get_stats_summary(AxumState(state): AxumState<SharedCoordinator>) -> impl IntoResponse {
    let guard = state.lock().unwrap_or_else(|e| e.into_inner());
    Json(guard.stats().summary())
}

async fn get_character_stats(
    AxumState(state): AxumState<SharedCoordinator>,
    Path(name): Path<String>,
) -> Response {
    let guard = state.lock().unwrap_or_else(|e| e.into_inner());
    match guard.stats_for(&name) {
        Some(stats) => Json(stats).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("no recorded matches for {name}"), "kind": "unknownCharacter" })),
        )
            .into_response(),
    }
}

async fn post_reset_stats(AxumState(state): AxumState<SharedCoordinator>) -> ApiResult<StatsSummary> {
    let mut guard = state.lock().unwrap_or_else(|e| e.into_inner());
    guard.reset_stats()?;
    Ok(Json(guard.stats().summary()))
}

async fn get_history(
    AxumState(state): AxumState<SharedCoordinator>,
    Query(query): Query<HistoryQuery>,
) -> Json<Vec<HistoryEntry>> {
    let guard = state.lock().unwrap_or_else(|e| e.into_inner());
    Json(guard.history(query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT)))
}

async fn get_help() -> impl IntoResponse {
    Json(CHAT_COMMANDS.to_vec())
}
