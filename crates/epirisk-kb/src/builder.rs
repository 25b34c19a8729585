//! Programmatic construction of small knowledge bases, mostly for tests.

use std::collections::{BTreeMap, HashMap};

use epirisk_common::error::Result;

use crate::knowledge::{
    Alternative, DrugEntry, Guidelines, KnowledgeBase, PairWeight, PathwayBurden, TagWeight,
    DEFAULT_KNOWLEDGE_VERSION,
};

/// Fluent builder over the knowledge base tables.
///
/// ```ignore
/// let kb = KnowledgeBaseBuilder::new()
///     .allele("rs3892097:AA", "CYP2D6_loss")
///     .tag("CYP2D6_loss", 0.35, &["Poor metabolizer"])
///     .drug("2670", "codeine", &["CYP2D6", "CYP3A4"])
///     .build()?;
/// ```
#[derive(Debug, Default)]
pub struct KnowledgeBaseBuilder {
    allele_proxies: HashMap<String, String>,
    star_allele_proxies: HashMap<String, String>,
    guidelines: Guidelines,
    drug_gene_map: BTreeMap<String, DrugEntry>,
    alternatives: HashMap<String, Vec<Alternative>>,
    version: Option<String>,
}

impl KnowledgeBaseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allele(mut self, key: &str, tag: &str) -> Self {
        self.allele_proxies.insert(key.to_string(), tag.to_string());
        self
    }

    pub fn star(mut self, key: &str, tag: &str) -> Self {
        self.star_allele_proxies.insert(key.to_string(), tag.to_string());
        self
    }

    pub fn tag(mut self, tag: &str, weight: f64, evidence: &[&str]) -> Self {
        self.guidelines.single_tags.insert(
            tag.to_string(),
            TagWeight { weight, evidence: to_strings(evidence) },
        );
        self
    }

    /// Add a pair stored under `"{a}+{b}"`. An empty `drugs` slice leaves it unrestricted.
    pub fn pair(mut self, a: &str, b: &str, weight: f64, evidence: &[&str], drugs: &[&str]) -> Self {
        self.guidelines.epistasis_pairs.insert(
            format!("{a}+{b}"),
            PairWeight { weight, evidence: to_strings(evidence), drugs: to_strings(drugs) },
        );
        self
    }

    pub fn burden(mut self, weight: f64, evidence: &[&str]) -> Self {
        self.guidelines.pathway_burden = PathwayBurden { weight, evidence: to_strings(evidence) };
        self
    }

    /// Register a drug under `rxnorm:<code>`.
    pub fn drug(mut self, rxnorm: &str, name: &str, genes: &[&str]) -> Self {
        self.drug_gene_map.insert(
            format!("rxnorm:{rxnorm}"),
            DrugEntry { name: name.to_string(), genes: to_strings(genes) },
        );
        self
    }

    pub fn alternative(mut self, for_drug: &str, rxnorm: &str, name: &str, note: &str) -> Self {
        self.alternatives
            .entry(for_drug.to_string())
            .or_default()
            .push(Alternative {
                rxnorm: rxnorm.to_string(),
                name: name.to_string(),
                note: note.to_string(),
            });
        self
    }

    pub fn version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    pub fn build(self) -> Result<KnowledgeBase> {
        KnowledgeBase::from_tables(
            self.allele_proxies,
            self.star_allele_proxies,
            self.guidelines,
            self.drug_gene_map,
            self.alternatives,
            self.version.unwrap_or_else(|| DEFAULT_KNOWLEDGE_VERSION.to_string()),
        )
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_populates_tables() {
        let kb = KnowledgeBaseBuilder::new()
            .allele("rs3892097:AA", "CYP2D6_loss")
            .star("CYP2D6*4", "CYP2D6_loss")
            .tag("CYP2D6_loss", 0.35, &["Poor metabolizer"])
            .pair("CYP2D6_loss", "CYP3A4_reduced", 0.2, &[], &["codeine"])
            .drug("2670", "codeine", &["CYP2D6", "CYP3A4"])
            .alternative("Codeine", "7052", "morphine", "Not CYP2D6 dependent")
            .version("fixture-1")
            .build()
            .unwrap();

        assert_eq!(kb.version(), "fixture-1");
        assert_eq!(kb.allele_tag("rs3892097:AA"), Some("CYP2D6_loss"));
        assert_eq!(kb.star_tag("CYP2D6*4"), Some("CYP2D6_loss"));
        assert_eq!(kb.drug_by_key("rxnorm:2670").map(|d| d.name.as_str()), Some("codeine"));
        assert_eq!(kb.alternatives_for("codeine").len(), 1);
        assert!(kb.pair("CYP2D6_loss", "CYP3A4_reduced").unwrap().applies_to("CODEINE"));
        assert!((kb.pathway_burden().weight - 0.20).abs() < 1e-9);
    }

    #[test]
    fn test_builder_rejects_invalid_burden() {
        let result = KnowledgeBaseBuilder::new().burden(f64::NAN, &[]).build();
        assert!(result.is_err());
    }
}
