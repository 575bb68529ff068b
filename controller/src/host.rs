use std::{
    collections::HashMap,
    io::ErrorKind,
    net::SocketAddr,
    path::PathBuf,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chime_common::{ControllerConfig, ControllerSession, RuntimeConfig, SessionError, Time};
use chrono::Utc;
use chrono_tz::Tz;
use serde::Serialize;
use tokio::{net::TcpListener, sync::Mutex};
use tracing::{info, warn};

use crate::link::{establish_link, SharedSession, TcpLink};

#[derive(Clone)]
struct AppState {
    session: SharedSession,
    config: Arc<ControllerConfig>,
    next_link_id: Arc<AtomicU64>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut runtime = load_runtime_config().await.unwrap_or_else(|err| {
        warn!("failed to load runtime config: {err:#}");
        RuntimeConfig::default()
    });
    let mut config = runtime.controller;
    if let Ok(addr) = std::env::var("CHIME_DEVICE_ADDR") {
        config.device_addr = addr;
    }
    if let Some(port) = std::env::var("CHIME_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
    {
        config.http_port = port;
    }
    if let Ok(timezone) = std::env::var("CHIME_TIMEZONE") {
        config.timezone = timezone;
    }
    runtime.controller = config;
    runtime.sanitize();

    let app_state = AppState {
        session: Arc::new(Mutex::new(ControllerSession::new())),
        config: Arc::new(runtime.controller),
        next_link_id: Arc::new(AtomicU64::new(1)),
    };

    let app = Router::new()
        .route("/api/status", get(handle_get_status))
        .route("/api/connect", post(handle_connect))
        .route("/api/disconnect", post(handle_disconnect))
        .route("/api/alarm", post(handle_set_alarm))
        .with_state(app_state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], app_state.config.http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind controller server at {addr}"))?;

    info!(
        "controller listening on http://{addr}, device at {}",
        app_state.config.device_addr
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(app_state))
        .await?;
    Ok(())
}

/// Says goodbye to the device before the process exits.
async fn shutdown_signal(state: AppState) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
        return;
    }
    let mut session = state.session.lock().await;
    if session.is_connected() {
        session.disconnect();
        info!("disconnected from device on shutdown");
        // Give the writer task a moment to flush the goodbye frame.
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.session.lock().await.status();
    Json(status)
}

async fn handle_connect(State(state): State<AppState>) -> impl IntoResponse {
    if state.session.lock().await.is_connected() {
        return handle_get_status(State(state)).await.into_response();
    }

    let timeout = Duration::from_millis(state.config.connect_timeout_ms);
    let stream = match establish_link(&state.config.device_addr, timeout).await {
        Ok(stream) => stream,
        Err(err) => {
            warn!("connect failed: {err}");
            return session_error_response(&err);
        }
    };

    let id = state.next_link_id.fetch_add(1, Ordering::Relaxed);
    let link = TcpLink::open(
        id,
        stream,
        state.session.clone(),
        state.config.max_frame_bytes,
    );
    let now = now_in_timezone(&state.config.timezone);

    let connected = state.session.lock().await.connect(link, now);
    if let Err(err) = connected {
        warn!("device link {id} failed during handshake: {err}");
        return session_error_response(&err);
    }

    info!("device link {id} connected, calibrating to {now}");
    handle_get_status(State(state)).await.into_response()
}

async fn handle_disconnect(State(state): State<AppState>) -> impl IntoResponse {
    {
        let mut session = state.session.lock().await;
        if session.is_connected() {
            session.disconnect();
            info!("disconnected from device");
        }
    }
    handle_get_status(State(state)).await.into_response()
}

async fn handle_set_alarm(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let time = match parse_alarm_value(&params) {
        Ok(time) => time,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, message),
    };

    let sent = state.session.lock().await.set_alarm_time(time);
    if let Err(err) = sent {
        warn!("alarm request failed: {err}");
        return session_error_response(&err);
    }

    info!("requested alarm at {time}");
    // The mirror only moves once the device echoes the new alarm.
    handle_get_status(State(state)).await.into_response()
}

fn parse_alarm_value(params: &HashMap<String, String>) -> Result<Time, &'static str> {
    let Some(value) = params.get("value") else {
        return Err("Missing 'value' parameter");
    };
    value
        .parse::<Time>()
        .map_err(|_| "Invalid time. Use H-M-S with H 0-23, M and S 0-59")
}

fn now_in_timezone(timezone: &str) -> Time {
    match timezone.parse::<Tz>() {
        Ok(tz) => Time::from_chrono(&Utc::now().with_timezone(&tz)),
        Err(_) => {
            warn!("unknown timezone {timezone:?}, using local time");
            Time::from_chrono(&chrono::Local::now())
        }
    }
}

fn session_error_response(err: &SessionError) -> axum::response::Response {
    let status = match err {
        SessionError::NotConnected => StatusCode::CONFLICT,
        SessionError::NoDeviceFound(_) | SessionError::LinkLost(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    };
    error_response(status, &err.to_string())
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

async fn load_runtime_config() -> anyhow::Result<RuntimeConfig> {
    let path = std::env::var("CHIME_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./.chime"))
        .join("runtime.json");

    match tokio::fs::read(&path).await {
        Ok(raw) => RuntimeConfig::from_json_slice(&raw)
            .with_context(|| format!("invalid runtime config at {}", path.display())),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
        Err(err) => Err(err.into()),
    }
}
