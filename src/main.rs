//! Defect classification service: binary entrypoint.
//! Boots the Axum HTTP server with the taxonomy loaded once at startup.

use defect_classifier::api::{build_app, AppState};
use shuttle_axum::ShuttleAxum;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact tracing logs; RUST_LOG overrides the default filter.
/// `try_init` because the Shuttle runtime may already own the global subscriber.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("defect_classifier=info,classifier=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    // Fail fast on a configured-but-broken taxonomy.
    let state = AppState::from_env()?;
    let taxonomy = state.classifier.taxonomy();
    info!(
        groups = taxonomy.groups().len(),
        nodes = taxonomy.node_count(),
        keywords = taxonomy.keyword_count(),
        custom = state.settings.taxonomy_path.is_some(),
        "taxonomy loaded"
    );

    let router = build_app(state)?;
    Ok(router.into())
}
