//! HTTP server assembly for Courier.
//!
//! Mounts the JSON API from `courier-api` under `/api`, wraps it in request
//! tracing, and defines the runtime configuration read by the binary.

pub mod observer;

use std::{path::PathBuf, sync::Arc};

use axum::Router;
use courier_core::store::MessageStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `courier.toml` and
/// `COURIER_*` environment variables.
#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:       String,
  #[serde(default = "default_port")]
  pub port:       u16,
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
}

fn default_host() -> String { "127.0.0.1".to_string() }

fn default_port() -> u16 { 8080 }

fn default_store_path() -> PathBuf { PathBuf::from("courier.db") }

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the application router for `store`.
pub fn router<S>(store: Arc<S>) -> Router
where
  S: MessageStore + 'static,
{
  Router::new()
    .nest("/api", courier_api::api_router(store))
    .layer(TraceLayer::new_for_http())
}

// ─── Integration tests ────────────────────────────────────────────────────────
