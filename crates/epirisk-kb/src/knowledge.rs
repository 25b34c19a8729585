//! Knowledge base tables and loading.
//!
//! On disk the knowledge base is a directory of JSON files:
//!
//! | File | Contents |
//! |------|----------|
//! | `allele_proxies.json` | `"rsid:genotype"` → tag |
//! | `star_allele_proxies.json` | `"GENE*allele"` → tag |
//! | `guidelines.json` | `single_tags`, `epistasis_pairs`, `pathway_burden` |
//! | `drug_gene_map.json` | `"rxnorm:<code>"` → `{name, genes}` |
//! | `alternatives.json` | lower-case drug name → `[{rxnorm, name, note}]` |
//! | `metadata.json` (optional) | `{version}` |
//!
//! A copy of the tables is compiled into the crate and served by
//! [`KnowledgeBase::bundled`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use epirisk_common::entities::normalize_genotype;
use epirisk_common::error::{EpiRiskError, Result};

pub const DEFAULT_KNOWLEDGE_VERSION: &str = "rules-20250104";

pub const ALLELE_PROXIES_FILE: &str = "allele_proxies.json";
pub const STAR_ALLELE_PROXIES_FILE: &str = "star_allele_proxies.json";
pub const GUIDELINES_FILE: &str = "guidelines.json";
pub const DRUG_GENE_MAP_FILE: &str = "drug_gene_map.json";
pub const ALTERNATIVES_FILE: &str = "alternatives.json";
pub const METADATA_FILE: &str = "metadata.json";

const BUNDLED_ALLELE_PROXIES: &str = include_str!("../data/allele_proxies.json");
const BUNDLED_STAR_ALLELE_PROXIES: &str = include_str!("../data/star_allele_proxies.json");
const BUNDLED_GUIDELINES: &str = include_str!("../data/guidelines.json");
const BUNDLED_DRUG_GENE_MAP: &str = include_str!("../data/drug_gene_map.json");
const BUNDLED_ALTERNATIVES: &str = include_str!("../data/alternatives.json");
const BUNDLED_METADATA: &str = include_str!("../data/metadata.json");

// ── Table entries ────────────────────────────────────────────────────────────

/// Weight and supporting evidence for a single functional tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagWeight {
    pub weight: f64,
    #[serde(default)]
    pub evidence: Vec<String>,
}

/// Weight of an epistatic tag pair, optionally restricted to some drugs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairWeight {
    pub weight: f64,
    #[serde(default)]
    pub evidence: Vec<String>,
    /// Empty means the pair applies to every drug.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub drugs: Vec<String>,
}

impl PairWeight {
    /// Whether the pair fires for `drug_name` (case-insensitive).
    pub fn applies_to(&self, drug_name: &str) -> bool {
        self.drugs.is_empty() || self.drugs.iter().any(|d| d.eq_ignore_ascii_case(drug_name))
    }
}

fn default_burden_weight() -> f64 { 0.20 }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathwayBurden {
    #[serde(default = "default_burden_weight")]
    pub weight: f64,
    #[serde(default)]
    pub evidence: Vec<String>,
}

impl Default for PathwayBurden {
    fn default() -> Self {
        Self { weight: default_burden_weight(), evidence: vec![] }
    }
}

/// Scoring guideline tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Guidelines {
    #[serde(default)]
    pub single_tags: HashMap<String, TagWeight>,
    #[serde(default)]
    pub epistasis_pairs: HashMap<String, PairWeight>,
    #[serde(default)]
    pub pathway_burden: PathwayBurden,
}

/// Drug name and the genes of its metabolic/transport/target pathway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugEntry {
    pub name: String,
    #[serde(default)]
    pub genes: Vec<String>,
}

/// A candidate substitute medication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    pub rxnorm: String,
    pub name: String,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Metadata {
    #[serde(default)]
    version: Option<String>,
}

// ── Knowledge base ───────────────────────────────────────────────────────────

/// The immutable knowledge base. Construct once, share as `Arc<KnowledgeBase>`.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    allele_proxies: HashMap<String, String>,
    star_allele_proxies: HashMap<String, String>,
    guidelines: Guidelines,
    /// Ordered so name scans are deterministic.
    drug_gene_map: BTreeMap<String, DrugEntry>,
    alternatives: HashMap<String, Vec<Alternative>>,
    version: String,
}

impl KnowledgeBase {
    /// Assemble and validate a knowledge base from its tables.
    pub fn from_tables(
        allele_proxies: HashMap<String, String>,
        star_allele_proxies: HashMap<String, String>,
        guidelines: Guidelines,
        drug_gene_map: BTreeMap<String, DrugEntry>,
        alternatives: HashMap<String, Vec<Alternative>>,
        version: impl Into<String>,
    ) -> Result<Self> {
        let allele_proxies = allele_proxies
            .into_iter()
            .map(|(key, tag)| (normalise_allele_key(&key), tag))
            .collect();
        let alternatives = alternatives
            .into_iter()
            .map(|(drug, alts)| (drug.trim().to_lowercase(), alts))
            .collect();

        let kb = Self {
            allele_proxies,
            star_allele_proxies,
            guidelines,
            drug_gene_map,
            alternatives,
            version: version.into(),
        };
        kb.validate()?;
        Ok(kb)
    }

    /// Tables compiled into the crate.
    pub fn bundled() -> Result<Self> {
        Self::from_json_sources(
            BUNDLED_ALLELE_PROXIES,
            BUNDLED_STAR_ALLELE_PROXIES,
            BUNDLED_GUIDELINES,
            BUNDLED_DRUG_GENE_MAP,
            BUNDLED_ALTERNATIVES,
            Some(BUNDLED_METADATA),
        )
    }

    /// Load every table from `dir`.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(EpiRiskError::KnowledgeBase(format!(
                "knowledge directory not found: {}",
                dir.display()
            )));
        }

        let read = |name: &str| -> Result<String> {
            let path = dir.join(name);
            std::fs::read_to_string(&path).map_err(|e| {
                EpiRiskError::KnowledgeBase(format!("cannot read {}: {e}", path.display()))
            })
        };

        let metadata_path = dir.join(METADATA_FILE);
        let metadata = if metadata_path.exists() {
            Some(std::fs::read_to_string(&metadata_path)?)
        } else {
            None
        };

        let kb = Self::from_json_sources(
            &read(ALLELE_PROXIES_FILE)?,
            &read(STAR_ALLELE_PROXIES_FILE)?,
            &read(GUIDELINES_FILE)?,
            &read(DRUG_GENE_MAP_FILE)?,
            &read(ALTERNATIVES_FILE)?,
            metadata.as_deref(),
        )?;
        info!("Knowledge base {} loaded from {}", kb.version, dir.display());
        Ok(kb)
    }

    /// Load from `dir` when it holds a knowledge base, otherwise use the
    /// bundled tables.
    pub fn load_or_bundled(dir: Option<&Path>) -> Result<Self> {
        match dir {
            Some(d) if d.join(GUIDELINES_FILE).exists() => Self::load_dir(d),
            Some(d) => {
                info!("No knowledge tables in {}, using bundled knowledge base", d.display());
                Self::bundled()
            }
            None => Self::bundled(),
        }
    }

    fn from_json_sources(
        allele_proxies: &str,
        star_allele_proxies: &str,
        guidelines: &str,
        drug_gene_map: &str,
        alternatives: &str,
        metadata: Option<&str>,
    ) -> Result<Self> {
        let version = match metadata {
            Some(raw) => serde_json::from_str::<Metadata>(raw)?.version,
            None => None,
        }
        .unwrap_or_else(|| DEFAULT_KNOWLEDGE_VERSION.to_string());

        let kb = Self::from_tables(
            serde_json::from_str(allele_proxies)?,
            serde_json::from_str(star_allele_proxies)?,
            serde_json::from_str(guidelines)?,
            serde_json::from_str(drug_gene_map)?,
            serde_json::from_str(alternatives)?,
            version,
        )?;
        debug!(
            "Knowledge base: {} allele proxies, {} star proxies, {} tags, {} pairs, {} drugs",
            kb.allele_proxies.len(),
            kb.star_allele_proxies.len(),
            kb.guidelines.single_tags.len(),
            kb.guidelines.epistasis_pairs.len(),
            kb.drug_gene_map.len()
        );
        Ok(kb)
    }

    /// Reject negative or non-finite weights and nameless drugs.
    pub fn validate(&self) -> Result<()> {
        let bad_weight = |w: f64| !w.is_finite() || w < 0.0;

        if let Some((tag, tw)) = self.guidelines.single_tags.iter().find(|(_, tw)| bad_weight(tw.weight)) {
            return Err(EpiRiskError::KnowledgeBase(format!(
                "tag {tag} has invalid weight {}",
                tw.weight
            )));
        }
        if let Some((pair, pw)) = self.guidelines.epistasis_pairs.iter().find(|(_, pw)| bad_weight(pw.weight)) {
            return Err(EpiRiskError::KnowledgeBase(format!(
                "pair {pair} has invalid weight {}",
                pw.weight
            )));
        }
        if bad_weight(self.guidelines.pathway_burden.weight) {
            return Err(EpiRiskError::KnowledgeBase(format!(
                "pathway burden has invalid weight {}",
                self.guidelines.pathway_burden.weight
            )));
        }
        if let Some(key) = self
            .drug_gene_map
            .iter()
            .find(|(_, entry)| entry.name.trim().is_empty())
            .map(|(k, _)| k)
        {
            return Err(EpiRiskError::KnowledgeBase(format!("drug {key} has no name")));
        }
        Ok(())
    }

    // ── Lookups ──────────────────────────────────────────────────────────────

    /// Tag for an `rsid:genotype` key.
    pub fn allele_tag(&self, key: &str) -> Option<&str> {
        self.allele_proxies.get(key).map(String::as_str)
    }

    /// Tag for a `GENE*allele` key.
    pub fn star_tag(&self, key: &str) -> Option<&str> {
        self.star_allele_proxies.get(key).map(String::as_str)
    }

    pub fn tag_weight(&self, tag: &str) -> Option<&TagWeight> {
        self.guidelines.single_tags.get(tag)
    }

    /// Pair entry stored under exactly `"{a}+{b}"`.
    pub fn pair(&self, a: &str, b: &str) -> Option<&PairWeight> {
        self.guidelines.epistasis_pairs.get(&format!("{a}+{b}"))
    }

    pub fn pathway_burden(&self) -> &PathwayBurden {
        &self.guidelines.pathway_burden
    }

    pub fn drug_by_key(&self, key: &str) -> Option<&DrugEntry> {
        self.drug_gene_map.get(key)
    }

    /// All drug entries in key order.
    pub fn drugs(&self) -> impl Iterator<Item = (&str, &DrugEntry)> {
        self.drug_gene_map.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Alternatives for a drug name (trimmed, case-insensitive).
    pub fn alternatives_for(&self, drug_name: &str) -> &[Alternative] {
        self.alternatives
            .get(&drug_name.trim().to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every weighted tag, sorted.
    pub fn known_tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.guidelines.single_tags.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    /// Every drug name, sorted and deduplicated.
    pub fn drug_names(&self) -> Vec<&str> {
        self.drug_gene_map
            .values()
            .map(|d| d.name.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn guidelines(&self) -> &Guidelines {
        &self.guidelines
    }
}

/// Normalise the genotype half of an `rsid:genotype` key.
fn normalise_allele_key(key: &str) -> String {
    match key.rsplit_once(':') {
        Some((rsid, genotype)) => format!("{}:{}", rsid.trim(), normalize_genotype(genotype)),
        None => key.to_string(),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_bundled_knowledge_base_loads() {
        let kb = KnowledgeBase::bundled().unwrap();
        assert_eq!(kb.version(), DEFAULT_KNOWLEDGE_VERSION);
        assert_eq!(kb.allele_tag("rs3892097:AA"), Some("CYP2D6_loss"));
        assert_eq!(kb.star_tag("CYP2D6*4"), Some("CYP2D6_loss"));
        assert!(kb.tag_weight("CYP2D6_loss").unwrap().weight >= 0.15);
        assert!(kb.pair("CYP2D6_loss", "CYP3A4_rs776746_TT").is_some());
        assert!((kb.pathway_burden().weight - 0.20).abs() < 1e-9);
    }

    #[test]
    fn test_bundled_alternatives_case_insensitive() {
        let kb = KnowledgeBase::bundled().unwrap();
        let alts = kb.alternatives_for("  Codeine ");
        assert!(alts.iter().any(|a| a.name == "morphine"));
        assert!(kb.alternatives_for("not-a-drug").is_empty());
    }

    #[test]
    fn test_known_tags_sorted_and_drug_names_unique() {
        let kb = KnowledgeBase::bundled().unwrap();
        let tags = kb.known_tags();
        let mut sorted = tags.clone();
        sorted.sort();
        assert_eq!(tags, sorted);

        let names = kb.drug_names();
        let unique: BTreeSet<_> = names.iter().collect();
        assert_eq!(names.len(), unique.len());
    }

    #[test]
    fn test_allele_keys_normalised_on_load() {
        let mut proxies = HashMap::new();
        proxies.insert("rs1799853:TC".to_string(), "CYP2C9_reduced".to_string());
        let kb = KnowledgeBase::from_tables(
            proxies,
            HashMap::new(),
            Guidelines::default(),
            BTreeMap::new(),
            HashMap::new(),
            "test",
        )
        .unwrap();
        assert_eq!(kb.allele_tag("rs1799853:CT"), Some("CYP2C9_reduced"));
    }

    #[test]
    fn test_negative_weight_rejected() {
        let mut guidelines = Guidelines::default();
        guidelines.single_tags.insert(
            "CYP2D6_loss".into(),
            TagWeight { weight: -0.1, evidence: vec![] },
        );
        let err = KnowledgeBase::from_tables(
            HashMap::new(),
            HashMap::new(),
            guidelines,
            BTreeMap::new(),
            HashMap::new(),
            "test",
        )
        .unwrap_err();
        assert!(err.to_string().contains("CYP2D6_loss"));
    }

    #[test]
    fn test_pair_drug_restriction() {
        let unrestricted = PairWeight { weight: 0.1, evidence: vec![], drugs: vec![] };
        assert!(unrestricted.applies_to("anything"));

        let restricted = PairWeight { weight: 0.1, evidence: vec![], drugs: vec!["Codeine".into()] };
        assert!(restricted.applies_to("codeine"));
        assert!(!restricted.applies_to("morphine"));
    }

    #[test]
    fn test_load_dir_roundtrip_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        for (name, body) in [
            (ALLELE_PROXIES_FILE, BUNDLED_ALLELE_PROXIES),
            (STAR_ALLELE_PROXIES_FILE, BUNDLED_STAR_ALLELE_PROXIES),
            (GUIDELINES_FILE, BUNDLED_GUIDELINES),
            (DRUG_GENE_MAP_FILE, BUNDLED_DRUG_GENE_MAP),
            (ALTERNATIVES_FILE, BUNDLED_ALTERNATIVES),
        ] {
            std::fs::write(dir.path().join(name), body).unwrap();
        }
        std::fs::write(dir.path().join(METADATA_FILE), r#"{"version": "site-42"}"#).unwrap();

        let kb = KnowledgeBase::load_or_bundled(Some(dir.path())).unwrap();
        assert_eq!(kb.version(), "site-42");

        let empty = tempfile::tempdir().unwrap();
        let fallback = KnowledgeBase::load_or_bundled(Some(empty.path())).unwrap();
        assert_eq!(fallback.version(), DEFAULT_KNOWLEDGE_VERSION);
        assert!(KnowledgeBase::load_dir(&empty.path().join("missing")).is_err());
    }
}
