// src/orders.rs
//! Ingestion-side glue: classify whole service-order rows.
//!
//! The spreadsheet importer hands over rows already reduced to an order
//! number, a `defect_text` cell and whatever business fields it kept. Those
//! fields pass through untouched; the four classification fields are merged
//! next to them. Aggregate reporting (how much stayed Unclassified) lives
//! here, in the caller, not in the classifier.

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use rayon::prelude::*;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::info;

use crate::classify::{Classification, Classifier, Confidence, UNCLASSIFIED};
use crate::metrics::{
    ensure_metrics_described, CLASSIFICATIONS_TOTAL, ORDERS_BATCH_MS, ORDERS_CLASSIFIED_TOTAL,
    ORDERS_UNCLASSIFIED_TOTAL,
};
use crate::normalize::is_blank;

/// One imported service-order row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRow {
    #[serde(deserialize_with = "order_number_from_any")]
    pub order_number: String,
    /// Raw cell value; anything but a string classifies as Unclassified.
    #[serde(default)]
    pub defect_text: Value,
    /// Other business fields (dates, totals, personnel, engine metadata).
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl OrderRow {
    pub fn new(order_number: impl Into<String>, defect_text: impl Into<Value>) -> Self {
        Self {
            order_number: order_number.into(),
            defect_text: defect_text.into(),
            fields: Map::new(),
        }
    }

    fn has_text(&self) -> bool {
        self.defect_text.as_str().is_some_and(|s| !is_blank(s))
    }
}

/// Spreadsheet exports often carry the order number as a number.
fn order_number_from_any<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "order_number must be a string or number, got {other}"
        ))),
    }
}

fn unclassified_label() -> String {
    UNCLASSIFIED.to_string()
}

/// Row plus its classification, as handed to persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedOrder {
    #[serde(flatten)]
    pub row: OrderRow,
    #[serde(default = "unclassified_label")]
    pub defect_group: String,
    #[serde(default = "unclassified_label")]
    pub defect_subgroup: String,
    #[serde(default = "unclassified_label")]
    pub defect_subsubgroup: String,
    #[serde(default)]
    pub classification_confidence: Confidence,
}

impl ClassifiedOrder {
    pub fn from_parts(row: OrderRow, c: Classification) -> Self {
        Self {
            row,
            defect_group: c.group,
            defect_subgroup: c.subgroup,
            defect_subsubgroup: c.subsubgroup,
            classification_confidence: c.confidence,
        }
    }

    pub fn classification(&self) -> Classification {
        Classification {
            group: self.defect_group.clone(),
            subgroup: self.defect_subgroup.clone(),
            subsubgroup: self.defect_subsubgroup.clone(),
            confidence: self.classification_confidence,
        }
    }

    fn apply(&mut self, c: Classification) {
        self.defect_group = c.group;
        self.defect_subgroup = c.subgroup;
        self.defect_subsubgroup = c.subsubgroup;
        self.classification_confidence = c.confidence;
    }

    /// Rows still lacking a group that do have text worth another pass.
    pub fn needs_reclassification(&self) -> bool {
        let missing = self.defect_group.trim().is_empty() || self.defect_group == UNCLASSIFIED;
        missing && self.row.has_text()
    }
}

/// Aggregate outcome of one batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub total: usize,
    /// Rows actually sent through the classifier.
    pub processed: usize,
    /// Processed rows whose classification differs from what they had.
    pub changed: usize,
    pub by_depth: BTreeMap<&'static str, usize>,
    pub by_group: BTreeMap<String, usize>,
    pub unclassified: usize,
    pub unclassified_pct: f64,
    pub elapsed_ms: u64,
    pub generated_at: Option<DateTime<Utc>>,
}

impl BatchReport {
    fn tally<'a>(orders: impl IntoIterator<Item = &'a ClassifiedOrder>) -> Self {
        let mut r = BatchReport::default();
        for c in Confidence::ALL {
            r.by_depth.insert(c.as_str(), 0);
        }
        for o in orders {
            r.total += 1;
            *r.by_depth
                .entry(o.classification_confidence.as_str())
                .or_default() += 1;
            if o.classification_confidence == Confidence::Unmatched {
                r.unclassified += 1;
            } else {
                *r.by_group.entry(o.defect_group.clone()).or_default() += 1;
            }
        }
        if r.total > 0 {
            r.unclassified_pct = (r.unclassified as f64) * 100.0 / (r.total as f64);
        }
        r
    }

    /// Share of rows classified at group level or deeper, 0..=100.
    pub fn classified_pct(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            100.0 - self.unclassified_pct
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedBatch {
    pub orders: Vec<ClassifiedOrder>,
    pub report: BatchReport,
}

/// Classify every row (in parallel), preserving input order.
pub fn classify_orders(classifier: &Classifier, rows: Vec<OrderRow>) -> ClassifiedBatch {
    let started = Instant::now();

    let orders: Vec<ClassifiedOrder> = rows
        .into_par_iter()
        .map(|row| {
            let c = classifier.classify_value(&row.defect_text);
            ClassifiedOrder::from_parts(row, c)
        })
        .collect();

    let mut report = BatchReport::tally(&orders);
    report.processed = orders.len();
    report.changed = orders.len();
    finish(&mut report, started, "classify");
    ClassifiedBatch { orders, report }
}

/// Re-run classification on rows that still need it, or on every row when
/// `force` is set (e.g. after a taxonomy change).
pub fn reclassify_orders(
    classifier: &Classifier,
    orders: Vec<ClassifiedOrder>,
    force: bool,
) -> ClassifiedBatch {
    let started = Instant::now();

    let results: Vec<(ClassifiedOrder, bool, bool)> = orders
        .into_par_iter()
        .map(|mut o| {
            if !(force || o.needs_reclassification()) {
                return (o, false, false);
            }
            let fresh = classifier.classify_value(&o.row.defect_text);
            let changed = fresh != o.classification();
            o.apply(fresh);
            (o, true, changed)
        })
        .collect();

    let processed = results.iter().filter(|(_, p, _)| *p).count();
    let changed = results.iter().filter(|(_, _, c)| *c).count();
    let orders: Vec<ClassifiedOrder> = results.into_iter().map(|(o, _, _)| o).collect();

    let mut report = BatchReport::tally(&orders);
    report.processed = processed;
    report.changed = changed;
    finish(&mut report, started, "reclassify");
    ClassifiedBatch { orders, report }
}

fn finish(report: &mut BatchReport, started: Instant, op: &'static str) {
    report.elapsed_ms = started.elapsed().as_millis() as u64;
    report.generated_at = Some(Utc::now());

    ensure_metrics_described();
    for (depth, n) in &report.by_depth {
        counter!(CLASSIFICATIONS_TOTAL, "depth" => *depth).increment(*n as u64);
    }
    counter!(ORDERS_CLASSIFIED_TOTAL).increment((report.total - report.unclassified) as u64);
    counter!(ORDERS_UNCLASSIFIED_TOTAL).increment(report.unclassified as u64);
    histogram!(ORDERS_BATCH_MS).record(report.elapsed_ms as f64);

    info!(
        op,
        total = report.total,
        processed = report.processed,
        changed = report.changed,
        unclassified = report.unclassified,
        unclassified_pct = report.unclassified_pct,
        elapsed_ms = report.elapsed_ms,
        "order batch classified"
    );
}
