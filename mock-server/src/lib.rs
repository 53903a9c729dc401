//! In-memory stand-in for the TimeTagger v2 API.
//!
//! Serves the same JSON contract as the real service under `/api/v2`, keeps
//! everything in a `RwLock`ed map, and checks the `authtoken` header on every
//! route. Good enough for integration tests and poking at by hand.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub key: String,
    pub t1: i64,
    pub t2: i64,
    #[serde(default)]
    pub ds: Option<String>,
    pub mt: i64,
    #[serde(default)]
    pub st: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Setting {
    pub key: String,
    pub value: Value,
    pub mt: i64,
    #[serde(default)]
    pub st: f64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct WriteResponse {
    pub accepted: Vec<String>,
    pub failed: Vec<String>,
    pub errors: Vec<String>,
}

#[derive(Default)]
pub struct Store {
    records: HashMap<String, Record>,
    settings: HashMap<String, Setting>,
}

#[derive(Clone)]
pub struct AppState {
    token: Arc<str>,
    store: Arc<RwLock<Store>>,
}

#[derive(Deserialize)]
struct TimerangeQuery {
    timerange: String,
}

#[derive(Deserialize)]
struct SinceQuery {
    since: f64,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

pub fn app(token: &str) -> Router {
    let state = AppState {
        token: Arc::from(token),
        store: Arc::new(RwLock::new(Store::default())),
    };
    let api = Router::new()
        .route("/records", get(fetch_records).put(put_records))
        .route("/settings", get(fetch_settings).put(put_settings))
        .route("/updates", get(fetch_updates))
        .with_state(state);
    Router::new().nest("/api/v2", api)
}

pub async fn run(listener: TcpListener, token: &str) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!("mock TimeTagger API listening on http://{addr}/api/v2/");
    }
    axum::serve(listener, app(token)).await
}

/// Fractional seconds since the epoch, like the server-assigned `st`.
fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, String)> {
    let presented = headers.get("authtoken").and_then(|v| v.to_str().ok());
    if presented == Some(&*state.token) {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid authtoken".to_string()))
    }
}

fn parse_timerange(raw: &str) -> Option<(i64, i64)> {
    let (start, end) = raw.split_once('-')?;
    Some((start.trim().parse().ok()?, end.trim().parse().ok()?))
}

fn sorted_records<'a>(records: impl Iterator<Item = &'a Record>) -> Vec<Record> {
    let mut out: Vec<Record> = records.cloned().collect();
    out.sort_by(|a, b| a.t1.cmp(&b.t1).then_with(|| a.key.cmp(&b.key)));
    out
}

fn sorted_settings<'a>(settings: impl Iterator<Item = &'a Setting>) -> Vec<Setting> {
    let mut out: Vec<Setting> = settings.cloned().collect();
    out.sort_by(|a, b| a.key.cmp(&b.key));
    out
}

async fn fetch_records(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TimerangeQuery>,
) -> ApiResult<Value> {
    authorize(&state, &headers)?;
    let (start, end) = parse_timerange(&query.timerange).ok_or((
        StatusCode::BAD_REQUEST,
        format!("invalid timerange {:?}", query.timerange),
    ))?;
    let store = state.store.read().await;
    let records = sorted_records(
        store
            .records
            .values()
            .filter(|r| r.t1 <= end && r.t2 >= start),
    );
    Ok(Json(serde_json::json!({ "records": records })))
}

async fn fetch_settings(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Value> {
    authorize(&state, &headers)?;
    let store = state.store.read().await;
    let settings = sorted_settings(store.settings.values());
    Ok(Json(serde_json::json!({ "settings": settings })))
}

/// Anything stored after `since`. A client that has never synced
/// (`since <= 0`) is told to reset and fetch everything.
async fn fetch_updates(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SinceQuery>,
) -> ApiResult<Value> {
    authorize(&state, &headers)?;
    let server_time = (now_secs() * 1000.0) as i64;
    let reset = query.since <= 0.0;
    let store = state.store.read().await;
    let (records, settings) = if reset {
        (Vec::new(), Vec::new())
    } else {
        (
            sorted_records(store.records.values().filter(|r| r.st > query.since)),
            sorted_settings(store.settings.values().filter(|s| s.st > query.since)),
        )
    };
    Ok(Json(serde_json::json!({
        "server_time": server_time,
        "reset": i32::from(reset),
        "records": records,
        "settings": settings,
    })))
}

async fn put_records(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(records): Json<Vec<Record>>,
) -> ApiResult<WriteResponse> {
    authorize(&state, &headers)?;
    let st = now_secs();
    let mut response = WriteResponse::default();
    let mut store = state.store.write().await;
    for mut record in records {
        if record.key.is_empty() {
            response.errors.push("record without key".to_string());
            continue;
        }
        if record.t2 < record.t1 {
            response
                .errors
                .push(format!("record {} ends before it starts", record.key));
            response.failed.push(record.key);
            continue;
        }
        record.st = st;
        response.accepted.push(record.key.clone());
        store.records.insert(record.key.clone(), record);
    }
    debug!(
        accepted = response.accepted.len(),
        failed = response.failed.len(),
        "stored records"
    );
    Ok(Json(response))
}

async fn put_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(settings): Json<Vec<Setting>>,
) -> ApiResult<WriteResponse> {
    authorize(&state, &headers)?;
    let st = now_secs();
    let mut response = WriteResponse::default();
    let mut store = state.store.write().await;
    for mut setting in settings {
        if setting.key.is_empty() {
            response.errors.push("setting without key".to_string());
            continue;
        }
        setting.st = st;
        response.accepted.push(setting.key.clone());
        store.settings.insert(setting.key.clone(), setting);
    }
    debug!(accepted = response.accepted.len(), "stored settings");
    Ok(Json(response))
}
