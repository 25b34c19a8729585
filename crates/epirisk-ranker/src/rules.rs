//! Deterministic rule scoring.
//!
//! score = clamp(base + Σ tag weights + Σ pair weights + burden, 0, 1)
//!
//! - tag weights come from `single_tags`; only weights ≥ 0.15 are explained
//! - pairs are probed in both key orders and may be restricted to drugs
//! - burden is added once when two or more genes carry impairing tags

use std::collections::BTreeSet;

use tracing::debug;

use epirisk_common::entities::{extract_gene, FunctionalTag, Rationale, RiskLabel, ScoreResult};
use epirisk_kb::KnowledgeBase;

use crate::mapper::GeneIndex;

/// Starting value of every deterministic score.
pub const BASE_SCORE: f64 = 0.05;

/// Tags weighted at or above this get a `SingleTag` rationale.
pub const RATIONALE_WEIGHT_THRESHOLD: f64 = 0.15;

/// Additive components of one deterministic score, before clamping.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreComponents {
    pub base: f64,
    pub tag_sum: f64,
    pub pair_sum: f64,
    pub burden: f64,
}

impl ScoreComponents {
    pub fn total(&self) -> f64 {
        (self.base + self.tag_sum + self.pair_sum + self.burden).clamp(0.0, 1.0)
    }
}

/// Score a tag set for `drug_name`. Never fails; an empty set scores
/// [`BASE_SCORE`].
pub fn score_deterministic(
    kb: &KnowledgeBase,
    tags: &BTreeSet<FunctionalTag>,
    gene_to_tags: &GeneIndex,
    drug_name: &str,
) -> ScoreResult {
    let mut components = ScoreComponents { base: BASE_SCORE, ..Default::default() };
    let mut rationales = Vec::new();

    // Single tags
    for tag in tags {
        let Some(tw) = kb.tag_weight(tag) else { continue };
        components.tag_sum += tw.weight;
        if tw.weight >= RATIONALE_WEIGHT_THRESHOLD {
            rationales.push(Rationale::SingleTag { tag: tag.clone(), evidence: tw.evidence.clone() });
        }
    }

    // Epistatic pairs
    let ordered: Vec<&FunctionalTag> = tags.iter().collect();
    for (i, a) in ordered.iter().enumerate() {
        for b in &ordered[i + 1..] {
            let Some(pair) = kb.pair(a, b).or_else(|| kb.pair(b, a)) else { continue };
            if !pair.applies_to(drug_name) {
                continue;
            }
            components.pair_sum += pair.weight;
            rationales.push(Rationale::EpistasisPair {
                pair: [(*a).clone(), (*b).clone()],
                genes: vec![extract_gene(a).to_string(), extract_gene(b).to_string()],
                evidence: pair.evidence.clone(),
            });
        }
    }

    // Pathway burden
    let affected = burden_genes(kb, gene_to_tags);
    if affected.len() >= 2 {
        let burden = kb.pathway_burden();
        components.burden = burden.weight;
        rationales.push(Rationale::PathwayBurden { genes: affected, evidence: burden.evidence.clone() });
    }

    let score = components.total();
    debug!(
        drug = drug_name,
        tags = tags.len(),
        ?components,
        score,
        "Deterministic score"
    );

    ScoreResult { score, label: RiskLabel::from_score(score), rationales }
}

/// Genes with at least one impairing tag.
///
/// A tag impairs when it is weighted and mentions "loss", or when it
/// mentions "reduced" at all, weighted or not.
pub fn burden_genes(kb: &KnowledgeBase, gene_to_tags: &GeneIndex) -> Vec<String> {
    gene_to_tags
        .iter()
        .filter(|(_, gene_tags)| {
            gene_tags.iter().any(|tag| {
                let lower = tag.to_lowercase();
                (kb.tag_weight(tag).is_some() && lower.contains("loss")) || lower.contains("reduced")
            })
        })
        .map(|(gene, _)| gene.clone())
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────────────
