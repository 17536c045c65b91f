use crate::audit::{AuditSink, HttpAuditSink};
use crate::config::Config;
use crate::omdb::{OmdbApi, OmdbClient};
use crate::rate_limit::RateLimiter;
use crate::resolver::{MovieInfo, Resolution, Resolver};
use crate::telegram::{ReplySink, TelegramClient, Update};
use crate::tmdb::{TmdbApi, TmdbClient};
use anyhow::Result;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use constant_time_eq::constant_time_eq;
use serde::Deserialize;
use serde_json::json;
use std::{net::SocketAddr, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

const MAX_BODY_BYTES: usize = 1024 * 1024; // 1MB safety cap

const WELCOME_MSG: &str = "Welcome! Send a movie name.";
const HELP_MSG: &str = "Send a movie name. Example: Jailer";
const PONG_MSG: &str = "pong";
const SLOW_DOWN_MSG: &str = "Too many requests. Slow down.";
const NOT_FOUND_MSG: &str = "Not found. Try another title.";
const UNAVAILABLE_MSG: &str = "Service temporarily unavailable. Try again later.";

#[derive(Clone)]
pub struct AppState {
    pub bot_token: String,
    pub webhook_secret: String,
    pub resolver: Arc<Resolver>,
    pub limiter: Arc<RateLimiter>,
    pub replies: Arc<dyn ReplySink>,
    pub audit: Option<Arc<dyn AuditSink>>,
}

/// Terminal state of one dispatched update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    Suppressed,
    Ignored,
}

pub async fn run_server(config: Config) -> Result<()> {
    let tmdb: Option<Arc<dyn TmdbApi>> = match &config.tmdb_api_key {
        Some(key) => Some(Arc::new(TmdbClient::new(key.clone())?)),
        None => {
            warn!("TMDB_API_KEY not set, primary lookup disabled");
            None
        }
    };
    let omdb: Option<Arc<dyn OmdbApi>> = match &config.omdb_api_key {
        Some(key) => Some(Arc::new(OmdbClient::new(key.clone())?)),
        None => {
            warn!("OMDB_API_KEY not set, secondary lookup disabled");
            None
        }
    };
    let audit: Option<Arc<dyn AuditSink>> = match &config.audit_url {
        Some(url) => Some(Arc::new(HttpAuditSink::new(url.clone())?)),
        None => {
            info!("AUDIT_URL not set, search logging disabled");
            None
        }
    };

    let telegram = TelegramClient::new(config.bot_token.clone())?;

    let state = AppState {
        bot_token: config.bot_token.clone(),
        webhook_secret: config.webhook_secret.clone(),
        resolver: Arc::new(Resolver::new(tmdb, omdb, config.cache_ttl_seconds)),
        limiter: Arc::new(RateLimiter::new(config.rl_window_seconds, config.rl_limit)),
        replies: Arc::new(telegram.clone()),
        audit,
    };

    if let Some(base) = &config.base_url {
        let url = format!(
            "{}/webhook/{}?secret={}",
            base, config.bot_token, config.webhook_secret
        );
        match telegram.set_webhook(&url).await {
            Ok(()) => info!("Webhook registered with Telegram"),
            Err(e) => warn!("Failed to register webhook: {}", e),
        }
    } else {
        warn!("WEBHOOK_URL not set, skipping webhook registration");
    }

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = telegram.delete_webhook().await {
        warn!("Failed to remove webhook on shutdown: {}", e);
    }
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/webhook/:token", post(handle_webhook))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

#[derive(Debug, Deserialize)]
struct WebhookParams {
    #[serde(default)]
    secret: String,
}

async fn handle_webhook(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(params): Query<WebhookParams>,
    body: Bytes,
) -> impl IntoResponse {
    if !constant_time_eq(token.as_bytes(), state.bot_token.as_bytes()) {
        warn!("Webhook rejected: bad token");
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "ok": false, "error": "bad token" })),
        );
    }
    if !constant_time_eq(params.secret.as_bytes(), state.webhook_secret.as_bytes()) {
        warn!("Webhook rejected: bad secret");
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "ok": false, "error": "bad secret" })),
        );
    }

    if body.len() > MAX_BODY_BYTES {
        warn!(
            "Rejecting request: body too large ({} bytes > {} bytes)",
            body.len(),
            MAX_BODY_BYTES
        );
        return (
            StatusCode::PAYLOAD_TOO_LARGE,
            Json(json!({ "ok": false, "error": "body too large" })),
        );
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(u) => u,
        Err(e) => {
            warn!("Rejecting request: invalid update payload: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "ok": false, "error": "invalid payload" })),
            );
        }
    };

    let outcome = dispatch(&state, update).await;
    tracing::debug!("Dispatch finished: {:?}", outcome);
    (StatusCode::OK, Json(json!({ "ok": true })))
}

/// Drive one update through the pipeline: rate check, audit, resolve, render.
///
/// Lookup failures never escape here; the sender always sees one of the
/// fixed messages or a formatted result.
pub async fn dispatch(state: &AppState, update: Update) -> DispatchOutcome {
    let Some(message) = update.message else {
        return DispatchOutcome::Ignored;
    };
    let Some(text) = message.text else {
        return DispatchOutcome::Ignored;
    };
    let chat_id = message.chat.id;
    let user_id = message.from.map(|u| u.id).unwrap_or(0);

    if let Some(command) = text.trim().strip_prefix('/') {
        return handle_command(state, chat_id, command).await;
    }

    if !state.limiter.allow(user_id).await {
        info!("Rate limited user {}", user_id);
        send_text(state, chat_id, SLOW_DOWN_MSG).await;
        return DispatchOutcome::Suppressed;
    }

    let query = text.trim().to_string();

    if let Some(audit) = &state.audit {
        let audit = audit.clone();
        let q = query.clone();
        tokio::spawn(async move {
            if let Err(e) = audit.record_search(user_id, &q).await {
                warn!("Audit log failed: {}", e);
            }
        });
    }

    match state.resolver.resolve(&query).await {
        Resolution::Found(info) => {
            let caption = format_caption(&info);
            match &info.poster {
                Some(url) => {
                    if let Err(e) = state.replies.send_photo(chat_id, url, &caption).await {
                        error!("Failed to send photo reply: {}", e);
                    }
                }
                None => send_text(state, chat_id, &caption).await,
            }
        }
        Resolution::NotFound => send_text(state, chat_id, NOT_FOUND_MSG).await,
        Resolution::Unavailable => send_text(state, chat_id, UNAVAILABLE_MSG).await,
    }
    DispatchOutcome::Delivered
}

/// Bot commands answer directly and skip rate limiting and auditing.
/// Unrecognized commands are dropped without a reply.
async fn handle_command(state: &AppState, chat_id: i64, command: &str) -> DispatchOutcome {
    let reply = match command.split_whitespace().next().unwrap_or("") {
        "start" => WELCOME_MSG,
        "help" => HELP_MSG,
        "ping" => PONG_MSG,
        _ => return DispatchOutcome::Ignored,
    };
    send_text(state, chat_id, reply).await;
    DispatchOutcome::Delivered
}

async fn send_text(state: &AppState, chat_id: i64, text: &str) {
    if let Err(e) = state.replies.send_text(chat_id, text).await {
        error!("Failed to send reply: {}", e);
    }
}

fn format_caption(info: &MovieInfo) -> String {
    format!(
        "{} ({})\n{} / 10 ({})",
        info.title, info.year, info.rating, info.source
    )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        term.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}
