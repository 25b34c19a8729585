//! Feature encoding for statistical predictors.
//!
//! Layout, derived from the knowledge base vocabulary:
//!
//! ```text
//! [ tag_<t>     for t in sorted known tags                  ]
//! [ pair_<a>_<b> for a < b in sorted known tags              ]
//! [ drug_<d>    for d in sorted, deduplicated drug names    ]
//! ```
//!
//! A pair slot is set only when both tags are present and their genes lie
//! in the target drug's pathway. Retraining against a changed knowledge
//! base requires regenerating the encoding.

use std::collections::{BTreeSet, HashSet};

use epirisk_common::entities::{extract_gene, FunctionalTag};
use epirisk_kb::KnowledgeBase;

use crate::pathways::upper_set;

/// Length of the feature vector for `kb`.
pub fn feature_len(kb: &KnowledgeBase) -> usize {
    let t = kb.known_tags().len();
    t + t * t.saturating_sub(1) / 2 + kb.drug_names().len()
}

/// Encode a patient's tags for `drug_name`.
pub fn build_feature_vector(
    kb: &KnowledgeBase,
    tags: &BTreeSet<FunctionalTag>,
    drug_name: &str,
    pathway_genes: &[String],
) -> Vec<f32> {
    let known = kb.known_tags();
    let mut features = Vec::with_capacity(feature_len(kb));

    for tag in &known {
        features.push(one_hot(tags.contains(*tag)));
    }

    let genes = upper_set(pathway_genes);
    let in_pathway: HashSet<&str> = tags
        .iter()
        .filter(|t| genes.contains(&extract_gene(t).to_uppercase()))
        .map(String::as_str)
        .collect();
    for (i, a) in known.iter().enumerate() {
        for b in &known[i + 1..] {
            features.push(one_hot(in_pathway.contains(a) && in_pathway.contains(b)));
        }
    }

    for drug in kb.drug_names() {
        features.push(one_hot(drug.eq_ignore_ascii_case(drug_name.trim())));
    }

    features
}

/// Names matching [`build_feature_vector`] position by position.
pub fn feature_names(kb: &KnowledgeBase) -> Vec<String> {
    let known = kb.known_tags();
    let mut names: Vec<String> = known.iter().map(|t| format!("tag_{t}")).collect();
    for (i, a) in known.iter().enumerate() {
        for b in &known[i + 1..] {
            names.push(format!("pair_{a}_{b}"));
        }
    }
    names.extend(kb.drug_names().into_iter().map(|d| format!("drug_{d}")));
    names
}

fn one_hot(set: bool) -> f32 {
    if set { 1.0 } else { 0.0 }
}
