//! HTTP transport for peers: JSON actions, the binary map, and an SSE feed
//! of session events. The server ticks the session on a fixed interval.

use std::{convert::Infallible, fs, net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{delete, get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::{
    net::TcpListener,
    sync::{broadcast, Mutex},
};
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tracing::{error, info};

use crate::{
    authority::Actor,
    catalog::Improvement,
    config::ServerConfig,
    engine::{Engine, EngineBuilder, EngineSettings},
    error::GameError,
    placement::BuildRequest,
    research::ResearchItem,
    scenario::Scenario,
    session::{Player, PlayerId, Session, SessionSnapshot},
    territory::NationId,
    tiles::{TileField, TileId, TileState},
    trade::{DealId, DealState, TradeDeal, TradeTerms},
};

pub struct WebServerConfig {
    pub scenario: Scenario,
    pub server: ServerConfig,
    /// Saved map loaded over the generated one before serving.
    pub map: Option<PathBuf>,
}

#[derive(Clone)]
struct AppState {
    session: Arc<Mutex<Session>>,
    broadcaster: broadcast::Sender<String>,
}

pub async fn run(config: WebServerConfig) -> Result<()> {
    let WebServerConfig {
        scenario,
        server,
        map,
    } = config;
    let mut session = scenario.build_session();
    if let Some(path) = map {
        let data = fs::read(&path).with_context(|| format!("Failed to read map {}", path.display()))?;
        session
            .load_map(&data)
            .with_context(|| format!("Failed to load map {}", path.display()))?;
    }
    let engine = EngineBuilder::new(EngineSettings {
        scenario_name: scenario.name.clone(),
        tick_seconds: server.tick_seconds(),
        snapshot_interval_ticks: server.snapshot.interval_ticks,
        snapshot_dir: server.snapshot.output_dir.clone(),
    })
    .with_standard_systems()
    .build();

    let (tx, _) = broadcast::channel::<String>(512);
    let state = AppState {
        session: Arc::new(Mutex::new(session)),
        broadcaster: tx,
    };

    tokio::spawn(tick_loop(
        engine,
        state.clone(),
        Duration::from_millis(server.tick_millis.max(1)),
    ));

    let addr: SocketAddr = format!("{}:{}", server.host, server.port)
        .parse()
        .with_context(|| format!("invalid address {}:{}", server.host, server.port))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, scenario = %scenario.name, "web.listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/players", post(join))
        .route("/api/players/:player", delete(leave))
        .route("/api/players/:player/nation", post(select_nation))
        .route("/api/tiles/:tile", get(get_tile).put(set_tile_field))
        .route("/api/build", post(build))
        .route("/api/research", post(unlock_research))
        .route("/api/offers", post(submit_offer))
        .route("/api/deals", get(deals))
        .route("/api/deals/:deal/respond", post(respond_to_deal))
        .route("/api/state", get(latest_state))
        .route("/api/map", get(export_map).put(import_map))
        .route("/api/events", get(stream_events))
        .with_state(state)
}

async fn tick_loop(mut engine: Engine, state: AppState, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        let report = {
            let mut session = state.session.lock().await;
            engine.tick(&mut session)
        };
        match report {
            Ok(report) => {
                for event in &report.events {
                    if let Ok(payload) = serde_json::to_string(event) {
                        let _ = state.broadcaster.send(payload);
                    }
                }
            }
            Err(err) => error!(error = %err, tick = engine.current_tick(), "web.tick_failed"),
        }
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("web.shutting_down");
}

/// A domain error rendered as `{code, message}` with a matching status.
pub struct ApiError(pub GameError);

impl From<GameError> for ApiError {
    fn from(value: GameError) -> Self {
        Self(value)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

pub fn status_of(err: &GameError) -> StatusCode {
    match err {
        GameError::NotAuthorized { .. }
        | GameError::NotController { .. }
        | GameError::BuildRequired { .. }
        | GameError::OpenModeRequired(_) => StatusCode::FORBIDDEN,
        GameError::DuplicateSubmission(_) | GameError::NationTaken(_) => StatusCode::CONFLICT,
        GameError::InvalidPlacement(_)
        | GameError::WaterRecession { .. }
        | GameError::TargetUnavailable(_)
        | GameError::ResearchLocked(_)
        | GameError::InsufficientGold(..) => StatusCode::UNPROCESSABLE_ENTITY,
        GameError::UnknownTile(_)
        | GameError::UnknownNation(_)
        | GameError::UnknownPlayer(_)
        | GameError::UnknownDeal(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_REQUEST,
    }
}

fn code_of(err: &GameError) -> &'static str {
    match err {
        GameError::NotAuthorized { .. } => "not_authorized",
        GameError::NotController { .. } => "not_controller",
        GameError::BuildRequired { .. } => "build_required",
        GameError::WaterRecession { .. } => "water_recession",
        GameError::OpenModeRequired(_) => "open_mode_required",
        GameError::InvalidPlacement(_) => "invalid_placement",
        GameError::UnknownFormatVersion(_) => "unknown_format_version",
        GameError::TruncatedMap { .. } => "truncated_map",
        GameError::InvalidMapByte { .. } => "invalid_map_byte",
        GameError::TargetUnavailable(_) => "target_unavailable",
        GameError::DuplicateSubmission(_) => "duplicate_submission",
        GameError::SelfTrade(_) => "self_trade",
        GameError::StaleOwner { .. } => "stale_owner",
        GameError::UnknownTile(_) => "unknown_tile",
        GameError::UnknownNation(_) => "unknown_nation",
        GameError::UnknownPlayer(_) => "unknown_player",
        GameError::UnknownDeal(_) => "unknown_deal",
        GameError::NationTaken(_) => "nation_taken",
        GameError::InvalidFieldValue { .. } => "invalid_field_value",
        GameError::ResearchLocked(_) => "research_locked",
        GameError::InsufficientGold(..) => "insufficient_gold",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: code_of(&self.0),
            message: self.0.to_string(),
        };
        (status_of(&self.0), Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Deserialize)]
struct JoinRequest {
    name: String,
}

#[derive(Serialize)]
struct JoinResponse {
    player: PlayerId,
}

async fn join(State(state): State<AppState>, Json(req): Json<JoinRequest>) -> Json<JoinResponse> {
    let player = state.session.lock().await.join(&req.name);
    Json(JoinResponse { player })
}

async fn leave(State(state): State<AppState>, Path(player): Path<PlayerId>) -> ApiResult<StatusCode> {
    state.session.lock().await.disconnect(player)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct NationRequest {
    nation: NationId,
}

async fn select_nation(
    State(state): State<AppState>,
    Path(player): Path<PlayerId>,
    Json(req): Json<NationRequest>,
) -> ApiResult<Json<Player>> {
    let mut session = state.session.lock().await;
    session.select_nation(player, req.nation)?;
    Ok(Json(session.player(player)?.clone()))
}

#[derive(Serialize)]
struct TileView {
    tile: TileId,
    state: TileState,
    owner_writer: Actor,
}

async fn get_tile(State(state): State<AppState>, Path(tile): Path<TileId>) -> ApiResult<Json<TileView>> {
    let session = state.session.lock().await;
    Ok(Json(TileView {
        tile,
        state: session.tiles().get(tile)?,
        owner_writer: session.tiles().writer_of(tile, TileField::Special)?,
    }))
}

#[derive(Deserialize)]
struct FieldRequest {
    player: PlayerId,
    field: TileField,
    value: u8,
}

#[derive(Serialize)]
struct FieldResponse {
    changed: bool,
}

async fn set_tile_field(
    State(state): State<AppState>,
    Path(tile): Path<TileId>,
    Json(req): Json<FieldRequest>,
) -> ApiResult<Json<FieldResponse>> {
    let mut session = state.session.lock().await;
    let actor = session.actor_of(req.player)?;
    let changed = session.set_tile_field(actor, tile, req.field, req.value)?;
    Ok(Json(FieldResponse { changed }))
}

/// Without a player the request acts as the server, which only works in
/// open mode. Map imports follow the same rule.
#[derive(Deserialize)]
struct BuildBody {
    player: Option<PlayerId>,
    #[serde(flatten)]
    request: BuildRequest,
}

#[derive(Serialize)]
struct BuildResponse {
    improvement: Improvement,
}

async fn build(State(state): State<AppState>, Json(body): Json<BuildBody>) -> ApiResult<Json<BuildResponse>> {
    let mut session = state.session.lock().await;
    let actor = match body.player {
        Some(player) => session.actor_of(player)?,
        None => Actor::Server,
    };
    let improvement = session.build(actor, body.request)?;
    Ok(Json(BuildResponse { improvement }))
}

#[derive(Deserialize)]
struct ResearchRequest {
    player: PlayerId,
    item: ResearchItem,
}

async fn unlock_research(
    State(state): State<AppState>,
    Json(req): Json<ResearchRequest>,
) -> ApiResult<StatusCode> {
    let mut session = state.session.lock().await;
    let actor = session.actor_of(req.player)?;
    session.unlock_research(actor, req.item)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct OfferRequest {
    player: PlayerId,
    target: NationId,
    #[serde(flatten)]
    terms: TradeTerms,
}

async fn submit_offer(State(state): State<AppState>, Json(req): Json<OfferRequest>) -> ApiResult<StatusCode> {
    state
        .session
        .lock()
        .await
        .submit_offer(req.player, req.target, req.terms)?;
    Ok(StatusCode::ACCEPTED)
}

async fn deals(State(state): State<AppState>) -> Json<Vec<TradeDeal>> {
    let session = state.session.lock().await;
    Json(session.trade().deals().cloned().collect())
}

#[derive(Deserialize)]
struct RespondRequest {
    player: PlayerId,
    accept: bool,
}

#[derive(Serialize)]
struct RespondResponse {
    state: DealState,
}

async fn respond_to_deal(
    State(state): State<AppState>,
    Path(deal): Path<DealId>,
    Json(req): Json<RespondRequest>,
) -> ApiResult<Json<RespondResponse>> {
    let mut session = state.session.lock().await;
    let actor = session.actor_of(req.player)?;
    let outcome = session.respond_to_deal(actor, deal, req.accept)?;
    Ok(Json(RespondResponse { state: outcome }))
}

async fn latest_state(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.session.lock().await.snapshot())
}

async fn export_map(State(state): State<AppState>) -> Response {
    let bytes = state.session.lock().await.save_map();
    ([(header::CONTENT_TYPE, "application/octet-stream")], bytes).into_response()
}

#[derive(Serialize)]
struct MapResponse {
    tiles: usize,
}

async fn import_map(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<MapResponse>> {
    let tiles = state
        .session
        .lock()
        .await
        .import_map(Actor::Server, &body)?;
    Ok(Json(MapResponse { tiles }))
}

async fn stream_events(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.broadcaster.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(payload) => Some(Ok(Event::default().data(payload))),
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(2))
            .text("keep-alive"),
    )
}
