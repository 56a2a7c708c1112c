// src/api.rs
//! HTTP surface: ad-hoc classification and order (re)classification.
//!
//! - GET  /health
//! - GET  /taxonomy
//! - POST /classify            `{ "text": <any> }`
//! - POST /classify/explain    `{ "text": <any> }`
//! - POST /classify/batch      `[<any>, ...]`
//! - POST /orders/classify     `[OrderRow, ...]`
//! - POST /orders/reclassify   `[ClassifiedOrder, ...]` (`?force=true` to redo all)
//! - GET  /metrics             (only when METRICS_ENABLED=1)

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use metrics::counter;
use serde::Deserialize;
use serde_json::Value;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::classify::{Classification, ClassifiedText, Classifier, Explanation};
use crate::config::Settings;
use crate::metrics::{ensure_metrics_described, Metrics, CLASSIFICATIONS_TOTAL};
use crate::orders::{self, ClassifiedBatch, ClassifiedOrder, OrderRow};
use crate::taxonomy::Taxonomy;

#[derive(Clone)]
pub struct AppState {
    pub classifier: Classifier,
    pub settings: Settings,
}

impl AppState {
    pub fn new(classifier: Classifier, settings: Settings) -> Self {
        Self {
            classifier,
            settings,
        }
    }

    /// Settings and taxonomy from the environment; fails on a bad taxonomy path.
    pub fn from_env() -> anyhow::Result<Self> {
        let settings = Settings::from_env();
        let taxonomy = settings.taxonomy()?;
        Ok(Self::new(Classifier::new(taxonomy), settings))
    }
}

/// Router with all classification routes, state applied.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/taxonomy", get(get_taxonomy))
        .route("/classify", post(classify_one))
        .route("/classify/explain", post(explain_one))
        .route("/classify/batch", post(classify_batch))
        .route("/orders/classify", post(classify_orders))
        .route("/orders/reclassify", post(reclassify_orders))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Full application: routes plus `/metrics` when enabled in settings.
pub fn build_app(state: AppState) -> anyhow::Result<Router> {
    let metrics = if state.settings.metrics_enabled {
        Some(Metrics::init(state.classifier.taxonomy())?)
    } else {
        None
    };
    let app = router(state);
    Ok(match metrics {
        Some(m) => app.merge(m.router()),
        None => app,
    })
}

#[derive(Deserialize)]
struct ClassifyReq {
    #[serde(default)]
    text: Value,
}

#[derive(Deserialize)]
struct ReclassifyParams {
    #[serde(default)]
    force: bool,
}

async fn get_taxonomy(State(state): State<AppState>) -> Json<Taxonomy> {
    Json(state.classifier.taxonomy().clone())
}

async fn classify_one(
    State(state): State<AppState>,
    Json(body): Json<ClassifyReq>,
) -> Json<Classification> {
    let c = state.classifier.classify_value(&body.text);
    record(&c);
    if state.settings.dev_log {
        dev_log_classification("classify", &body.text, &c);
    }
    Json(c)
}

async fn explain_one(
    State(state): State<AppState>,
    Json(body): Json<ClassifyReq>,
) -> Json<Explanation> {
    let e = match body.text.as_str() {
        Some(s) => state.classifier.explain(s),
        None => state.classifier.explain(""),
    };
    if state.settings.dev_log {
        dev_log_classification("explain", &body.text, &e.classification);
    }
    Json(e)
}

async fn classify_batch(
    State(state): State<AppState>,
    Json(items): Json<Vec<Value>>,
) -> Json<Vec<ClassifiedText>> {
    let out = state.classifier.classify_pairs(&items);
    for item in &out {
        record(&item.classification);
    }
    Json(out)
}

async fn classify_orders(
    State(state): State<AppState>,
    Json(rows): Json<Vec<OrderRow>>,
) -> Result<Json<ClassifiedBatch>, (StatusCode, String)> {
    let classifier = state.classifier.clone();
    let batch = tokio::task::spawn_blocking(move || orders::classify_orders(&classifier, rows))
        .await
        .map_err(join_failed)?;
    Ok(Json(batch))
}

async fn reclassify_orders(
    State(state): State<AppState>,
    Query(params): Query<ReclassifyParams>,
    Json(rows): Json<Vec<ClassifiedOrder>>,
) -> Result<Json<ClassifiedBatch>, (StatusCode, String)> {
    let classifier = state.classifier.clone();
    let batch = tokio::task::spawn_blocking(move || {
        orders::reclassify_orders(&classifier, rows, params.force)
    })
    .await
    .map_err(join_failed)?;
    Ok(Json(batch))
}

fn join_failed(e: tokio::task::JoinError) -> (StatusCode, String) {
    error!(error = %e, "classification worker failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "classification worker failed".to_string(),
    )
}

fn record(c: &Classification) {
    ensure_metrics_described();
    counter!(CLASSIFICATIONS_TOTAL, "depth" => c.confidence.as_str()).increment(1);
}

/// Short, stable id for a defect text, so dev logs never carry raw text.
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

fn dev_log_classification(event: &str, text: &Value, c: &Classification) {
    let id = match text {
        Value::String(s) => anon_hash(s),
        other => format!("<{}>", json_kind(other)),
    };
    info!(
        target: "classifier",
        %id, event,
        group = %c.group,
        subgroup = %c.subgroup,
        subsubgroup = %c.subsubgroup,
        confidence = c.confidence.value()
    );
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
