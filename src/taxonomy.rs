// src/taxonomy.rs
//! Three-level defect taxonomy: Group -> Subgroup -> Sub-subgroup.
//!
//! The tree is declared in TOML (see `config/taxonomy.toml`) and validated
//! once into typed nodes. Sibling order in the `Vec`s is declaration order,
//! which is also the tie-break order used by the cascade matcher. Nothing here
//! is mutated after construction.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::classify::{GENERAL, UNCLASSIFIED};
use crate::normalize::normalize;

/// Built-in taxonomy table, compiled into the binary.
pub const BUILTIN_TAXONOMY_TOML: &str = include_str!("../config/taxonomy.toml");

/* ----------------------------
Config schema (from TOML)
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
struct TaxonomyFile {
    #[serde(default)]
    groups: Vec<GroupCfg>,
}

#[derive(Debug, Clone, Deserialize)]
struct GroupCfg {
    name: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    subgroups: Vec<SubgroupCfg>,
}

#[derive(Debug, Clone, Deserialize)]
struct SubgroupCfg {
    name: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    subsubgroups: Vec<LeafCfg>,
}

#[derive(Debug, Clone, Deserialize)]
struct LeafCfg {
    name: String,
    #[serde(default)]
    keywords: Vec<String>,
}

/* ----------------------------
Validated tree
---------------------------- */

/// Keywords of one node: the declared spelling plus the normalized form used
/// for matching (pre-normalized once at build time).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordSet {
    declared: Vec<String>,
    normalized: Vec<String>,
}

impl KeywordSet {
    fn build(declared: Vec<String>, path: &str) -> Result<Self> {
        if declared.is_empty() {
            bail!("{path}: keyword list is empty");
        }
        let mut normalized = Vec::with_capacity(declared.len());
        let mut seen = HashSet::new();
        for kw in &declared {
            let n = normalize(kw);
            if n.is_empty() {
                bail!("{path}: keyword {kw:?} is empty after normalization");
            }
            // "óleo" and "oleo" collapse to the same form; keep the first.
            if seen.insert(n.clone()) {
                normalized.push(n);
            }
        }
        Ok(Self {
            declared,
            normalized,
        })
    }

    /// Keywords as written in the table.
    pub fn declared(&self) -> &[String] {
        &self.declared
    }

    /// Distinct normalized keywords, in declaration order.
    pub fn normalized(&self) -> &[String] {
        &self.normalized
    }

    /// Substring containment against already-normalized text.
    /// Not word-boundary aware: "ar" matches inside "parafuso".
    #[inline]
    pub fn matches(&self, normalized_text: &str) -> bool {
        self.first_match(normalized_text).is_some()
    }

    /// The first keyword (normalized form) contained in `normalized_text`.
    pub fn first_match(&self, normalized_text: &str) -> Option<&str> {
        self.normalized
            .iter()
            .find(|kw| normalized_text.contains(kw.as_str()))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.normalized.len()
    }

    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }
}

impl Serialize for KeywordSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.declared)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubSubgroup {
    pub name: String,
    pub keywords: KeywordSet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subgroup {
    pub name: String,
    pub keywords: KeywordSet,
    pub subsubgroups: Vec<SubSubgroup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    pub name: String,
    pub keywords: KeywordSet,
    pub subgroups: Vec<Subgroup>,
}

impl Group {
    pub fn subgroup(&self, name: &str) -> Option<&Subgroup> {
        self.subgroups.iter().find(|s| s.name == name)
    }
}

impl Subgroup {
    pub fn subsubgroup(&self, name: &str) -> Option<&SubSubgroup> {
        self.subsubgroups.iter().find(|s| s.name == name)
    }
}

/// Immutable, validated taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Taxonomy {
    groups: Vec<Group>,
}

impl Taxonomy {
    /// The table shipped with the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_TAXONOMY_TOML).context("built-in taxonomy")
    }

    /// Load from a TOML file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading taxonomy from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("invalid taxonomy in {}", path.display()))
    }

    /// Parse and validate a TOML string.
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let file: TaxonomyFile =
            toml::from_str(toml_str).map_err(|e| anyhow!("taxonomy TOML error: {e}"))?;
        Self::from_file(file)
    }

    fn from_file(file: TaxonomyFile) -> Result<Self> {
        if file.groups.is_empty() {
            bail!("taxonomy declares no groups");
        }

        let mut group_names = HashSet::new();
        let mut groups = Vec::with_capacity(file.groups.len());
        for g in file.groups {
            let gpath = format!("group `{}`", g.name);
            check_name(&g.name, &gpath, &mut group_names)?;

            let mut sub_names = HashSet::new();
            let mut subgroups = Vec::with_capacity(g.subgroups.len());
            for s in g.subgroups {
                let spath = format!("{gpath} > subgroup `{}`", s.name);
                check_name(&s.name, &spath, &mut sub_names)?;

                let mut leaf_names = HashSet::new();
                let mut subsubgroups = Vec::with_capacity(s.subsubgroups.len());
                for l in s.subsubgroups {
                    let lpath = format!("{spath} > sub-subgroup `{}`", l.name);
                    check_name(&l.name, &lpath, &mut leaf_names)?;
                    subsubgroups.push(SubSubgroup {
                        keywords: KeywordSet::build(l.keywords, &lpath)?,
                        name: l.name,
                    });
                }

                subgroups.push(Subgroup {
                    keywords: KeywordSet::build(s.keywords, &spath)?,
                    name: s.name,
                    subsubgroups,
                });
            }

            groups.push(Group {
                keywords: KeywordSet::build(g.keywords, &gpath)?,
                name: g.name,
                subgroups,
            });
        }

        Ok(Self { groups })
    }

    /// Groups in declaration (tie-break) order.
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Total number of nodes across all three levels.
    pub fn node_count(&self) -> usize {
        self.groups
            .iter()
            .map(|g| {
                1 + g
                    .subgroups
                    .iter()
                    .map(|s| 1 + s.subsubgroups.len())
                    .sum::<usize>()
            })
            .sum()
    }

    /// Total number of distinct normalized keywords, summed per node.
    pub fn keyword_count(&self) -> usize {
        self.groups
            .iter()
            .map(|g| {
                g.keywords.len()
                    + g.subgroups
                        .iter()
                        .map(|s| {
                            s.keywords.len()
                                + s.subsubgroups
                                    .iter()
                                    .map(|l| l.keywords.len())
                                    .sum::<usize>()
                        })
                        .sum::<usize>()
            })
            .sum()
    }
}

fn check_name(name: &str, path: &str, seen: &mut HashSet<String>) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        bail!("{path}: name is empty");
    }
    if trimmed.eq_ignore_ascii_case(GENERAL) || trimmed.eq_ignore_ascii_case(UNCLASSIFIED) {
        bail!("{path}: `{trimmed}` is a reserved label");
    }
    if !seen.insert(trimmed.to_string()) {
        bail!("{path}: duplicate sibling name");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = r#"
[[groups]]
name = "Leaks"
keywords = ["vazamento"]

  [[groups.subgroups]]
  name = "Fluid Leak"
  keywords = ["óleo", "oleo", "água"]

    [[groups.subgroups.subsubgroups]]
    name = "Oil"
    keywords = ["óleo"]

[[groups]]
name = "Electrical"
keywords = ["bateria"]
"#;

    #[test]
    fn builtin_table_is_valid() {
        let t = Taxonomy::builtin().expect("builtin taxonomy");
        let names: Vec<&str> = t.groups().iter().map(|g| g.name.as_str()).collect();
        for required in [
            "Leaks",
            "Performance/Operation",
            "Noise/Vibration",
            "Electrical",
            "Cooling System",
            "Lubrication",
            "Transmission",
            "Wear/Maintenance",
        ] {
            assert!(names.contains(&required), "missing group {required}");
        }
        assert_eq!(names[0], "Leaks");
        assert!(t.node_count() > t.groups().len());
    }

    #[test]
    fn keeps_declaration_order_and_dedups_normalized_keywords() {
        let t = Taxonomy::from_toml_str(SMALL).unwrap();
        assert_eq!(t.groups()[0].name, "Leaks");
        assert_eq!(t.groups()[1].name, "Electrical");

        let fluid = t.group("Leaks").unwrap().subgroup("Fluid Leak").unwrap();
        assert_eq!(fluid.keywords.declared().len(), 3);
        assert_eq!(fluid.keywords.normalized(), ["oleo", "agua"]);
        assert!(fluid.subsubgroup("Oil").is_some());
        assert!(t.group("Electrical").unwrap().subgroups.is_empty());
    }

    #[test]
    fn counts() {
        let t = Taxonomy::from_toml_str(SMALL).unwrap();
        assert_eq!(t.node_count(), 4);
        // vazamento + (oleo, agua) + oleo + bateria
        assert_eq!(t.keyword_count(), 5);
    }

    #[test]
    fn substring_match_is_not_word_aware() {
        let set = KeywordSet::build(vec!["ar".into()], "test").unwrap();
        assert!(set.matches("vazamento no parafuso"));
        assert_eq!(set.first_match("parafuso"), Some("ar"));
        assert!(!set.matches("oleo"));
    }

    #[test]
    fn rejects_punctuation_only_keyword() {
        let err = KeywordSet::build(vec!["!!".into()], "group `X`").unwrap_err();
        assert!(err.to_string().contains("empty after normalization"));
    }

    #[test]
    fn serializes_declared_keywords() {
        let t = Taxonomy::from_toml_str(SMALL).unwrap();
        let v = serde_json::to_value(&t).unwrap();
        assert_eq!(v["groups"][0]["name"], "Leaks");
        assert_eq!(v["groups"][0]["subgroups"][0]["keywords"][0], "óleo");
    }
}
