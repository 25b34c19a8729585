//! Drug → pathway gene resolution and tag filtering.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use epirisk_common::entities::{extract_gene, FunctionalTag};
use epirisk_kb::{Alternative, KnowledgeBase};

use crate::mapper::GeneIndex;

/// A resolved medication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugInfo {
    pub name: String,
    pub genes: Vec<String>,
    pub rxnorm: Option<String>,
}

/// Resolve a medication by RxNorm code, falling back to an exact
/// case-insensitive name match.
pub fn get_drug_info(kb: &KnowledgeBase, name: Option<&str>, code: Option<&str>) -> Option<DrugInfo> {
    if let Some(code) = code.map(str::trim).filter(|c| !c.is_empty()) {
        if let Some(entry) = kb.drug_by_key(&format!("rxnorm:{code}")) {
            return Some(DrugInfo {
                name: entry.name.clone(),
                genes: entry.genes.clone(),
                rxnorm: Some(code.to_string()),
            });
        }
    }

    let wanted = name.map(str::trim).filter(|n| !n.is_empty())?;
    kb.drugs()
        .find(|(_, entry)| entry.name.trim().eq_ignore_ascii_case(wanted))
        .map(|(key, entry)| DrugInfo {
            name: entry.name.clone(),
            genes: entry.genes.clone(),
            rxnorm: key.strip_prefix("rxnorm:").map(str::to_string),
        })
}

/// Keep tags whose gene is in the pathway. Order and duplicates are preserved.
pub fn filter_tags_by_pathway<'a, I>(tags: I, pathway_genes: &[String]) -> Vec<FunctionalTag>
where
    I: IntoIterator<Item = &'a FunctionalTag>,
{
    let genes = upper_set(pathway_genes);
    tags.into_iter()
        .filter(|tag| genes.contains(&extract_gene(tag).to_uppercase()))
        .cloned()
        .collect()
}

/// Keep gene index entries for pathway genes.
pub fn filter_gene_index(gene_to_tags: &GeneIndex, pathway_genes: &[String]) -> GeneIndex {
    let genes = upper_set(pathway_genes);
    gene_to_tags
        .iter()
        .filter(|(gene, _)| genes.contains(&gene.to_uppercase()))
        .map(|(gene, tags)| (gene.clone(), tags.clone()))
        .collect()
}

/// Static substitute list for a drug.
pub fn get_alternatives<'kb>(kb: &'kb KnowledgeBase, drug_name: &str) -> &'kb [Alternative] {
    kb.alternatives_for(drug_name)
}

pub(crate) fn upper_set(genes: &[String]) -> HashSet<String> {
    genes.iter().map(|g| g.trim().to_uppercase()).collect()
}
