// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod classify;
pub mod config;
pub mod metrics;
pub mod normalize;
pub mod orders;
pub mod taxonomy;

// ---- Re-exports for stable public API ----
pub use crate::api::{build_app, router, AppState};
pub use crate::classify::{
    classify, classify_many, default_classifier, Classification, Classifier, Confidence,
    GENERAL, UNCLASSIFIED,
};
pub use crate::normalize::normalize;
pub use crate::orders::{classify_orders, reclassify_orders, BatchReport, ClassifiedOrder, OrderRow};
pub use crate::taxonomy::Taxonomy;
