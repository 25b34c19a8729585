//! Variant → functional tag mapping.

use std::collections::{BTreeMap, BTreeSet};

use tracing::trace;

use epirisk_common::entities::{extract_gene, FunctionalTag, SnpCall, StarCall, VariantRecord};
use epirisk_kb::KnowledgeBase;

/// Gene symbol → tags observed for that gene.
pub type GeneIndex = BTreeMap<String, Vec<FunctionalTag>>;

/// Result of mapping one patient's variants.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagMapping {
    pub tags: BTreeSet<FunctionalTag>,
    pub gene_to_tags: GeneIndex,
}

impl TagMapping {
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Map every record to knowledge-base tags.
///
/// SNP hits are appended to the gene index as-is, so repeated hits for the
/// same tag show up more than once. Star-allele hits are only appended when
/// the gene does not already list the tag.
pub fn map_variants_to_tags(kb: &KnowledgeBase, variants: &[VariantRecord]) -> TagMapping {
    let mut mapping = TagMapping::default();

    for variant in variants {
        if let Some(call) = variant.snp_call() {
            map_snp(kb, call, &mut mapping);
        }
        if let Some(call) = variant.star_call() {
            map_diplotype(kb, call, &mut mapping);
        }
    }

    mapping
}

fn map_snp(kb: &KnowledgeBase, call: &SnpCall, mapping: &mut TagMapping) {
    let key = call.key();
    let Some(tag) = kb.allele_tag(&key) else {
        trace!("No allele proxy for {key}");
        return;
    };

    mapping.tags.insert(tag.to_string());
    let gene = extract_gene(tag);
    if !gene.is_empty() {
        mapping
            .gene_to_tags
            .entry(gene.to_string())
            .or_default()
            .push(tag.to_string());
    }
}

fn map_diplotype(kb: &KnowledgeBase, call: &StarCall, mapping: &mut TagMapping) {
    for allele in parse_star_diplotype(&call.star) {
        let key = format!("{}{}", call.gene, allele);
        let Some(tag) = kb.star_tag(&key) else {
            trace!("No star-allele proxy for {key}");
            continue;
        };

        mapping.tags.insert(tag.to_string());
        let gene_tags = mapping.gene_to_tags.entry(call.gene.clone()).or_default();
        if !gene_tags.iter().any(|t| t == tag) {
            gene_tags.push(tag.to_string());
        }
    }
}

/// Split a diplotype into its alleles, each prefixed with `*`, sorted.
///
/// `*4/*4` → `[*4, *4]`, `*2/*1` → `[*1, *2]`, `17` → `[*17]`.
pub fn parse_star_diplotype(star: &str) -> Vec<String> {
    let mut alleles: Vec<String> = star
        .split('/')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(|a| if a.starts_with('*') { a.to_string() } else { format!("*{a}") })
        .collect();
    alleles.sort();
    alleles
}
