// src/classify.rs
//! # Cascade matcher
//! Pure, deterministic mapping `defect text -> Classification`. No I/O, no
//! shared mutable state; safe to call from any number of threads.
//!
//! Policy: walk the taxonomy top-down. At each level the first node (in
//! declaration order) with a keyword contained in the normalized text wins
//! and is committed to; there is no backtracking and no best-match search.
//! Confidence depends only on how deep the walk got:
//! sub-subgroup 0.9, subgroup 0.7, group 0.5, nothing 0.0.

use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use crate::config;
use crate::normalize::normalize;
use crate::taxonomy::{Group, SubSubgroup, Subgroup, Taxonomy};

/// Label for a field the walk never reached because nothing matched at all.
pub const UNCLASSIFIED: &str = "Unclassified";
/// Label for a level below the deepest match.
pub const GENERAL: &str = "General";

/// Match depth, exposed as a fixed confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Confidence {
    #[default]
    Unmatched,
    Group,
    Subgroup,
    SubSubgroup,
}

impl Confidence {
    pub const ALL: [Confidence; 4] = [
        Confidence::Unmatched,
        Confidence::Group,
        Confidence::Subgroup,
        Confidence::SubSubgroup,
    ];

    pub fn value(self) -> f64 {
        match self {
            Confidence::Unmatched => 0.0,
            Confidence::Group => 0.5,
            Confidence::Subgroup => 0.7,
            Confidence::SubSubgroup => 0.9,
        }
    }

    /// Inverse of [`Confidence::value`]; anything off the fixed scale is `None`.
    pub fn from_value(v: f64) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| (c.value() - v).abs() < 1e-6)
    }

    /// Short label used for metrics and reports.
    pub fn as_str(self) -> &'static str {
        match self {
            Confidence::Unmatched => "unclassified",
            Confidence::Group => "group",
            Confidence::Subgroup => "subgroup",
            Confidence::SubSubgroup => "subsubgroup",
        }
    }
}

impl Serialize for Confidence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.value())
    }
}

impl<'de> Deserialize<'de> for Confidence {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = f64::deserialize(deserializer)?;
        Confidence::from_value(v).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "confidence {v} is not one of 0.0, 0.5, 0.7, 0.9"
            ))
        })
    }
}

/// Output of one classification call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Classification {
    pub group: String,
    pub subgroup: String,
    pub subsubgroup: String,
    pub confidence: Confidence,
}

impl Classification {
    /// Terminal/fallback result.
    pub fn unclassified() -> Self {
        Self {
            group: UNCLASSIFIED.to_string(),
            subgroup: UNCLASSIFIED.to_string(),
            subsubgroup: UNCLASSIFIED.to_string(),
            confidence: Confidence::Unmatched,
        }
    }

    pub fn is_classified(&self) -> bool {
        self.confidence != Confidence::Unmatched
    }
}

impl Default for Classification {
    fn default() -> Self {
        Self::unclassified()
    }
}

/// `{original, classification}` pair returned by the multi-text call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedText {
    pub original: Value,
    pub classification: Classification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Group,
    Subgroup,
    SubSubgroup,
}

/// One step of the audit trail: which node matched and through which keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelMatch {
    pub level: Level,
    pub node: String,
    pub keyword: String,
}

/// Classification plus the evidence that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    pub normalized_text: String,
    pub classification: Classification,
    pub trail: Vec<LevelMatch>,
}

/// Borrowed result of one walk; turned into owned output by the callers.
#[derive(Debug, Default)]
struct Walk<'t, 'k> {
    group: Option<(&'t Group, &'k str)>,
    subgroup: Option<(&'t Subgroup, &'k str)>,
    subsubgroup: Option<(&'t SubSubgroup, &'k str)>,
}

impl Walk<'_, '_> {
    fn classification(&self) -> Classification {
        match (self.group, self.subgroup, self.subsubgroup) {
            (Some((g, _)), Some((s, _)), Some((l, _))) => Classification {
                group: g.name.clone(),
                subgroup: s.name.clone(),
                subsubgroup: l.name.clone(),
                confidence: Confidence::SubSubgroup,
            },
            (Some((g, _)), Some((s, _)), None) => Classification {
                group: g.name.clone(),
                subgroup: s.name.clone(),
                subsubgroup: GENERAL.to_string(),
                confidence: Confidence::Subgroup,
            },
            (Some((g, _)), None, _) => Classification {
                group: g.name.clone(),
                subgroup: GENERAL.to_string(),
                subsubgroup: GENERAL.to_string(),
                confidence: Confidence::Group,
            },
            (None, _, _) => Classification::unclassified(),
        }
    }

    fn trail(&self) -> Vec<LevelMatch> {
        let mut out = Vec::with_capacity(3);
        if let Some((g, kw)) = self.group {
            out.push(LevelMatch {
                level: Level::Group,
                node: g.name.clone(),
                keyword: kw.to_string(),
            });
        }
        if let Some((s, kw)) = self.subgroup {
            out.push(LevelMatch {
                level: Level::Subgroup,
                node: s.name.clone(),
                keyword: kw.to_string(),
            });
        }
        if let Some((l, kw)) = self.subsubgroup {
            out.push(LevelMatch {
                level: Level::SubSubgroup,
                node: l.name.clone(),
                keyword: kw.to_string(),
            });
        }
        out
    }
}

/// Classifier over one immutable taxonomy. Cloning shares the tree.
#[derive(Debug, Clone)]
pub struct Classifier {
    taxonomy: Arc<Taxonomy>,
}

impl Classifier {
    pub fn new(taxonomy: Taxonomy) -> Self {
        Self {
            taxonomy: Arc::new(taxonomy),
        }
    }

    pub fn from_shared(taxonomy: Arc<Taxonomy>) -> Self {
        Self { taxonomy }
    }

    /// Classifier over the table shipped with the crate.
    pub fn builtin() -> anyhow::Result<Self> {
        Ok(Self::new(Taxonomy::builtin()?))
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    /// Classify one free-text defect description.
    pub fn classify(&self, text: &str) -> Classification {
        let normalized = normalize(text);
        self.walk(&normalized).classification()
    }

    /// `None` degrades to Unclassified.
    pub fn classify_opt(&self, text: Option<&str>) -> Classification {
        match text {
            Some(t) => self.classify(t),
            None => Classification::unclassified(),
        }
    }

    /// Untyped input (e.g. a spreadsheet cell). Only JSON strings are
    /// classified; null, numbers, bools, arrays and objects are Unclassified.
    pub fn classify_value(&self, value: &Value) -> Classification {
        match value {
            Value::String(s) => self.classify(s),
            _ => Classification::unclassified(),
        }
    }

    /// Classify a sequence, returning results in input order.
    pub fn classify_many<'a, I>(&self, texts: I) -> Vec<Classification>
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        texts.into_iter().map(|t| self.classify_opt(t)).collect()
    }

    /// Classify untyped values and keep each original next to its result.
    pub fn classify_pairs(&self, values: &[Value]) -> Vec<ClassifiedText> {
        values
            .iter()
            .map(|v| ClassifiedText {
                original: v.clone(),
                classification: self.classify_value(v),
            })
            .collect()
    }

    /// Same walk as [`Classifier::classify`], plus the keyword hit at each level.
    pub fn explain(&self, text: &str) -> Explanation {
        let normalized_text = normalize(text);
        let walk = self.walk(&normalized_text);
        let classification = walk.classification();
        let trail = walk.trail();
        Explanation {
            normalized_text,
            classification,
            trail,
        }
    }

    fn walk<'t>(&'t self, normalized: &str) -> Walk<'t, 't> {
        let mut walk = Walk::default();
        if normalized.is_empty() {
            return walk;
        }

        // 1) first matching group, committed to
        let Some((group, kw)) = self
            .taxonomy
            .groups()
            .iter()
            .find_map(|g| g.keywords.first_match(normalized).map(|kw| (g, kw)))
        else {
            return walk;
        };
        walk.group = Some((group, kw));

        // 2) first matching subgroup of that group
        let Some((sub, kw)) = group
            .subgroups
            .iter()
            .find_map(|s| s.keywords.first_match(normalized).map(|kw| (s, kw)))
        else {
            return walk;
        };
        walk.subgroup = Some((sub, kw));

        // 3) first matching sub-subgroup of that subgroup
        walk.subsubgroup = sub
            .subsubgroups
            .iter()
            .find_map(|l| l.keywords.first_match(normalized).map(|kw| (l, kw)));

        walk
    }
}

static DEFAULT_CLASSIFIER: Lazy<Classifier> = Lazy::new(|| {
    match config::load_taxonomy() {
        Ok(t) => Classifier::new(t),
        Err(e) => {
            warn!(error = %e, "configured taxonomy unusable, falling back to built-in table");
            Classifier::builtin().expect("valid built-in taxonomy")
        }
    }
});

/// Process-wide classifier, built on first use and never mutated.
pub fn default_classifier() -> &'static Classifier {
    &DEFAULT_CLASSIFIER
}

/// Classify with the default classifier.
pub fn classify(text: Option<&str>) -> Classification {
    default_classifier().classify_opt(text)
}

/// Classify a sequence with the default classifier, preserving order.
pub fn classify_many<'a, I>(texts: I) -> Vec<Classification>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    default_classifier().classify_many(texts)
}
