//! # HTTP Routes
//!
//! | Route                      | Pool   | Body                            |
//! |----------------------------|--------|---------------------------------|
//! | `GET /lrange/{key}`        | slave  | JSON array of list members      |
//! | `GET /rpush/{key}/{value}` | master | same as `/lrange/{key}` after   |
//! | `GET /info`                | master | raw `INFO` text                 |
//! | `GET /env`                 | -      | JSON object of the environment  |
//! | anything else              | -      | file from the static directory  |
//!
//! Store calls are blocking, so each one runs on the blocking pool.

use std::collections::BTreeMap;
use std::ffi::OsString;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListKey {
    key: String,
}

#[derive(Debug, Deserialize)]
pub struct ListPush {
    key: String,
    value: String,
}

/// Builds the router with `state` injected.
///
/// Paths no route matches are served from `static_dir`, with `index.html`
/// standing in for directories. A missing directory just yields 404s.
pub fn build_router(state: AppState, static_dir: impl AsRef<std::path::Path>) -> Router {
    Router::new()
        .route("/lrange/{key}", get(list_range))
        .route("/rpush/{key}/{value}", get(list_push))
        .route("/info", get(info))
        .route("/env", get(env_dump))
        .fallback_service(ServeDir::new(static_dir.as_ref()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn list_range(State(state): State<AppState>, Path(path): Path<ListKey>) -> ApiResult<Response> {
    read_list(state, path.key).await
}

async fn list_push(State(state): State<AppState>, Path(path): Path<ListPush>) -> ApiResult<Response> {
    let master = state.master.clone();
    let (key, value) = (path.key.clone(), path.value);
    let len = tokio::task::spawn_blocking(move || master.rpush(&key, &value)).await??;
    debug!(key = %path.key, len, "appended to list");

    read_list(state, path.key).await
}

async fn info(State(state): State<AppState>) -> ApiResult<Response> {
    let master = state.master.clone();
    let info = tokio::task::spawn_blocking(move || master.info()).await??;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Bytes::from(info),
    )
        .into_response())
}

async fn env_dump() -> ApiResult<Response> {
    pretty_json(&environment(std::env::vars_os()))
}

async fn read_list(state: AppState, key: String) -> ApiResult<Response> {
    let slave = state.slave.clone();
    let members = tokio::task::spawn_blocking(move || slave.lrange_all(&key)).await??;
    pretty_json(&members)
}

/// Collects environment pairs into a sorted map, lossily decoding non-UTF-8.
pub fn environment<I>(vars: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .map(|(key, value)| {
            (
                key.to_string_lossy().into_owned(),
                value.to_string_lossy().into_owned(),
            )
        })
        .collect()
}

fn pretty_json<T: Serialize + ?Sized>(value: &T) -> ApiResult<Response> {
    let body = serde_json::to_vec_pretty(value)?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_is_sorted_and_keeps_equals_in_values() {
        let vars = vec![
            (OsString::from("ZETA"), OsString::from("last")),
            (OsString::from("OPTS"), OsString::from("a=b=c")),
            (OsString::from("ALPHA"), OsString::new()),
        ];
        let map = environment(vars);
        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["ALPHA", "OPTS", "ZETA"]);
        assert_eq!(map["OPTS"], "a=b=c");
        assert_eq!(map["ALPHA"], "");
    }

    #[test]
    fn pretty_json_sets_json_content_type() {
        let response = pretty_json(&["a", "b"]).expect("encode");
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
    }
}
