pub mod config;

use std::sync::Arc;
use std::time::Instant;

use arbor_bvh::{Bvh, RenderBuffers, build_bvh};
use arbor_core::Segment;
use arbor_grammar::{
    Axiom, Grammar, GrammarError, HybridConfig, PresetLibrary, RewriteConfig, Rule,
    generate_seeded,
};
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{Method, StatusCode};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, warn};

pub use config::Config;

const DEFAULT_ALPHA: f64 = 0.5;

/// Shared, read-only service state. Every request generates from its own seed,
/// so handlers never need to coordinate.
#[derive(Debug, Clone)]
pub struct AppState {
    library: Arc<PresetLibrary>,
    rewrite: RewriteConfig,
}

impl AppState {
    /// Generations above `max_segments` are rejected before any post-pass runs.
    pub fn new(library: PresetLibrary, max_segments: usize) -> Self {
        Self {
            library: Arc::new(library),
            rewrite: RewriteConfig {
                max_segments,
                ..RewriteConfig::default()
            },
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/presets", get(presets))
        .route("/generate", post(generate))
        .route("/generate/buffers", post(generate_buffers))
        .route("/hybridize", post(hybridize))
        .route("/validate", post(validate))
        .route("/ws", get(websocket))
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    preset: Option<String>,
    grammar: Option<Grammar>,
    seed: Option<u64>,
    #[serde(default)]
    include_index: bool,
}

#[derive(Debug, Deserialize)]
struct HybridizeRequest {
    a: Option<String>,
    b: Option<String>,
    alpha: Option<f64>,
    seed: Option<u64>,
    retention: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ValidateRequest {
    axiom: String,
    #[serde(default)]
    rules: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsClientMessage {
    Generate {
        preset: Option<String>,
        grammar: Option<Grammar>,
        seed: Option<u64>,
        #[serde(default)]
        include_index: bool,
    },
    Regenerate {
        seed: Option<u64>,
    },
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct PresetsResponse {
    presets: Vec<Grammar>,
}

/// One immutable generation result.
#[derive(Debug, Serialize)]
struct Snapshot {
    seed: u64,
    preset: String,
    segments: Vec<Segment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    index: Option<Bvh>,
    stats: GenerateStats,
}

#[derive(Debug, Serialize)]
struct GenerateStats {
    segment_count: usize,
    symbol_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    node_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    radius_noise: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    taper: Option<f64>,
    time_ms: f64,
}

#[derive(Debug, Serialize)]
struct HybridizeResponse {
    seed: u64,
    grammar: Grammar,
}

#[derive(Debug, Serialize)]
struct ValidateResponse {
    valid: bool,
    errors: Vec<String>,
    axiom_symbols: usize,
    rule_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsServerMessage {
    Snapshot(Snapshot),
    Error { message: String },
}

#[derive(Debug)]
struct WsSession {
    grammar: Grammar,
    include_index: bool,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn payload_too_large(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<GrammarError> for ApiError {
    fn from(err: GrammarError) -> Self {
        match err {
            GrammarError::UnknownPreset(_) => Self::not_found(err.to_string()),
            GrammarError::SymbolLimit { .. }
            | GrammarError::IterationLimit { .. }
            | GrammarError::SegmentLimit { .. }
            | GrammarError::MedialLimit { .. } => Self::payload_too_large(err.to_string()),
            other => Self::bad_request(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn presets(State(state): State<AppState>) -> Json<PresetsResponse> {
    Json(PresetsResponse {
        presets: state.library.grammars().to_vec(),
    })
}

async fn generate(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Snapshot>, ApiError> {
    let request: GenerateRequest = parse_json(&body)?;
    let grammar = resolve_grammar(&state.library, request.preset, request.grammar)?;
    let snapshot = run_snapshot(&state, grammar, request.seed, request.include_index).await?;
    Ok(Json(snapshot))
}

async fn generate_buffers(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request: GenerateRequest = parse_json(&body)?;
    let grammar = resolve_grammar(&state.library, request.preset, request.grammar)?;
    let snapshot = run_snapshot(&state, grammar, request.seed, true).await?;

    let bvh = snapshot
        .index
        .unwrap_or_else(|| build_bvh(&snapshot.segments));
    let bytes = RenderBuffers::encode(&snapshot.segments, &bvh).to_bytes();

    let mut response = Response::new(Body::from(bytes));
    let headers = response.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(
        HeaderName::from_static("x-arbor-seed"),
        HeaderValue::from(snapshot.seed),
    );
    Ok(response)
}

async fn hybridize(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<HybridizeResponse>, ApiError> {
    let request: HybridizeRequest = parse_json(&body)?;
    let config = HybridConfig {
        rule_retention: request
            .retention
            .unwrap_or(HybridConfig::default().rule_retention),
    };
    if !(0.0..=1.0).contains(&config.rule_retention) {
        return Err(ApiError::bad_request("retention must be within [0, 1]"));
    }

    let seed = request.seed.unwrap_or_else(rand::random::<u64>);
    let mut rng = StdRng::seed_from_u64(seed);
    let grammar = match (request.a, request.b) {
        (Some(a), Some(b)) => {
            let (a, b) = (state.library.get(&a)?, state.library.get(&b)?);
            let alpha = request.alpha.unwrap_or(DEFAULT_ALPHA);
            config.crossbreed(a, b, alpha, &mut rng)
        }
        (None, None) if request.alpha.is_some() => {
            return Err(ApiError::bad_request(
                "alpha applies only to a named pair; pass a and b",
            ));
        }
        (None, None) => config.random_hybrid(state.library.grammars(), &mut rng)?,
        _ => {
            return Err(ApiError::bad_request(
                "pass both a and b, or neither for a random pair",
            ));
        }
    };

    debug!(seed, offspring = %grammar.name, "hybridized presets");
    Ok(Json(HybridizeResponse { seed, grammar }))
}

async fn validate(body: Bytes) -> Json<ValidateResponse> {
    let request = match parse_json::<ValidateRequest>(&body) {
        Ok(request) => request,
        Err(err) => {
            return Json(ValidateResponse {
                valid: false,
                errors: vec![err.message],
                axiom_symbols: 0,
                rule_count: 0,
            });
        }
    };

    let mut errors = Vec::new();
    let axiom_symbols = match Axiom::parse(&request.axiom) {
        Ok(axiom) => axiom.symbols().len(),
        Err(err) => {
            errors.push(format!("axiom: {err}"));
            0
        }
    };

    let mut rule_count = 0;
    for (index, text) in request.rules.iter().enumerate() {
        match Rule::parse(text) {
            Ok(_) => rule_count += 1,
            Err(err) => errors.push(format!("rule {}: {err}", index + 1)),
        }
    }

    Json(ValidateResponse {
        valid: errors.is_empty(),
        errors,
        axiom_symbols,
        rule_count,
    })
}

async fn websocket(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

async fn handle_websocket(mut socket: WebSocket, state: AppState) {
    let mut session: Option<WsSession> = None;
    debug!("websocket session opened");

    while let Some(message) = socket.recv().await {
        let outcome = match message {
            Ok(Message::Text(text)) => {
                handle_ws_text_message(&mut socket, &state, text.as_str(), &mut session).await
            }
            Ok(Message::Binary(_)) => {
                send_ws_error(&mut socket, "binary messages are not supported").await
            }
            Ok(Message::Ping(payload)) => socket
                .send(Message::Pong(payload))
                .await
                .map_err(|_| ()),
            Ok(Message::Pong(_)) => Ok(()),
            Ok(Message::Close(_)) | Err(_) => break,
        };
        if outcome.is_err() {
            break;
        }
    }

    debug!("websocket session closed");
}

async fn handle_ws_text_message(
    socket: &mut WebSocket,
    state: &AppState,
    raw_message: &str,
    session: &mut Option<WsSession>,
) -> Result<(), ()> {
    let message = match serde_json::from_str::<WsClientMessage>(raw_message) {
        Ok(message) => message,
        Err(err) => return send_ws_error(socket, format!("invalid message: {err}")).await,
    };

    let (grammar, seed, include_index) = match message {
        WsClientMessage::Generate {
            preset,
            grammar,
            seed,
            include_index,
        } => match resolve_grammar(&state.library, preset, grammar) {
            Ok(grammar) => (grammar, seed, include_index),
            Err(err) => return send_ws_error(socket, err.message).await,
        },
        WsClientMessage::Regenerate { seed } => match session.as_ref() {
            Some(current) => (current.grammar.clone(), seed, current.include_index),
            None => {
                return send_ws_error(socket, "regenerate needs a prior generate message").await;
            }
        },
    };

    match run_snapshot(state, grammar.clone(), seed, include_index).await {
        Ok(snapshot) => {
            *session = Some(WsSession {
                grammar,
                include_index,
            });
            send_ws_message(socket, WsServerMessage::Snapshot(snapshot)).await
        }
        Err(err) => send_ws_error(socket, err.message).await,
    }
}

async fn send_ws_error(socket: &mut WebSocket, message: impl Into<String>) -> Result<(), ()> {
    send_ws_message(
        socket,
        WsServerMessage::Error {
            message: message.into(),
        },
    )
    .await
}

async fn send_ws_message(socket: &mut WebSocket, message: WsServerMessage) -> Result<(), ()> {
    let payload = serde_json::to_string(&message).map_err(|_| ())?;
    socket
        .send(Message::Text(payload.into()))
        .await
        .map_err(|_| ())
}

fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    if body.is_empty() {
        return Err(ApiError::bad_request("request body is required"));
    }

    serde_json::from_slice(body)
        .map_err(|err| ApiError::bad_request(format!("invalid JSON body: {err}")))
}

/// An inline grammar wins over a preset name; one of the two is required.
fn resolve_grammar(
    library: &PresetLibrary,
    preset: Option<String>,
    grammar: Option<Grammar>,
) -> Result<Grammar, ApiError> {
    match (preset, grammar) {
        (_, Some(grammar)) => Ok(grammar),
        (Some(name), None) => Ok(library.get(&name)?.clone()),
        (None, None) => Err(ApiError::bad_request(
            "either preset or grammar is required",
        )),
    }
}

/// Generates off the async workers; a fresh seed is drawn when none is given.
async fn run_snapshot(
    state: &AppState,
    grammar: Grammar,
    seed: Option<u64>,
    include_index: bool,
) -> Result<Snapshot, ApiError> {
    let seed = seed.unwrap_or_else(rand::random::<u64>);
    let rewrite = state.rewrite;

    tokio::task::spawn_blocking(move || build_snapshot(&grammar, seed, include_index, &rewrite))
    .await
    .map_err(|err| {
        warn!(error = %err, "generation task failed");
        ApiError::internal(format!("generation task failed: {err}"))
    })?
}

fn build_snapshot(
    grammar: &Grammar,
    seed: u64,
    include_index: bool,
    rewrite: &RewriteConfig,
) -> Result<Snapshot, ApiError> {
    let start = Instant::now();
    let generation = generate_seeded(grammar, rewrite, seed)?;
    let index = include_index.then(|| build_bvh(&generation.segments));
    let time_ms = start.elapsed().as_secs_f64() * 1000.0;

    Ok(Snapshot {
        seed,
        preset: grammar.name.clone(),
        stats: GenerateStats {
            segment_count: generation.segments.len(),
            symbol_count: generation.symbols,
            node_count: index.as_ref().map(|bvh| bvh.nodes.len()),
            radius_noise: generation.radius_noise,
            taper: generation.taper,
            time_ms,
        },
        segments: generation.segments,
        index,
    })
}
