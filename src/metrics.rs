// src/metrics.rs
use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

use crate::taxonomy::Taxonomy;

pub const CLASSIFICATIONS_TOTAL: &str = "classifications_total";
pub const ORDERS_CLASSIFIED_TOTAL: &str = "orders_classified_total";
pub const ORDERS_UNCLASSIFIED_TOTAL: &str = "orders_unclassified_total";
pub const ORDERS_BATCH_MS: &str = "orders_batch_ms";
pub const TAXONOMY_NODES: &str = "taxonomy_nodes";

/// One recorder per process; later `init` calls reuse it.
static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            CLASSIFICATIONS_TOTAL,
            "Classification results, labelled by match depth."
        );
        describe_counter!(
            ORDERS_CLASSIFIED_TOTAL,
            "Order rows classified at group level or deeper."
        );
        describe_counter!(
            ORDERS_UNCLASSIFIED_TOTAL,
            "Order rows left Unclassified."
        );
        describe_histogram!(ORDERS_BATCH_MS, "Order batch classification time in milliseconds.");
        describe_gauge!(TAXONOMY_NODES, "Nodes in the active taxonomy.");
    });
}

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder (once) and publish the taxonomy size.
    pub fn init(taxonomy: &Taxonomy) -> Result<Self> {
        let handle = HANDLE
            .get_or_try_init(|| PrometheusBuilder::new().install_recorder())
            .context("prometheus: install recorder")?
            .clone();

        ensure_metrics_described();
        gauge!(TAXONOMY_NODES).set(taxonomy.node_count() as f64);

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
