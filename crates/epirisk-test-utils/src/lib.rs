//! Shared fixtures for Epi-Risk tests.
//!
//! The fixture knowledge base is small and stable so score assertions in
//! downstream crates do not move when the bundled tables are re-curated.

use std::collections::BTreeSet;

use epirisk_common::entities::{FunctionalTag, RawVariant, VariantRecord};
use epirisk_kb::{KnowledgeBase, KnowledgeBaseBuilder};


pub const FIXTURE_KNOWLEDGE_VERSION: &str = "fixture-20250104";

/// Opioid, antiplatelet and anticoagulant slice of the knowledge base.
///
/// Weights: `CYP2D6_loss` 0.35, `CYP3A4_rs776746_TT` 0.10, `CYP2C19_loss`
/// 0.30, `CYP3A4_reduced` 0.10, `ABCB1_reduced_function` 0.05.
/// `tapentadol` is listed as a codeine alternative but has no drug entry.
pub fn fixture_kb() -> KnowledgeBase {
    fixture_builder()
        .build()
        .expect("fixture knowledge base is valid")
}

/// Builder pre-loaded with the fixture tables, for tests that extend them.
pub fn fixture_builder() -> KnowledgeBaseBuilder {
    KnowledgeBaseBuilder::new()
        // rsID proxies
        .allele("rs3892097:AA", "CYP2D6_loss")
        .allele("rs3892097:AG", "CYP2D6_reduced")
        .allele("rs776746:TT", "CYP3A4_rs776746_TT")
        .allele("rs35599367:CT", "CYP3A4_reduced")
        .allele("rs4244285:AA", "CYP2C19_loss")
        .allele("rs1045642:AA", "ABCB1_reduced_function")
        .allele("rs9923231:TT", "VKORC1_sensitive")
        .allele("rs1057910:AC", "CYP2C9_reduced")
        .allele("rs4149056:CT", "SLCO1B1_reduced")
        // star alleles
        .star("CYP2D6*1", "CYP2D6_normal")
        .star("CYP2D6*4", "CYP2D6_loss")
        .star("CYP2C19*1", "CYP2C19_normal")
        .star("CYP2C19*2", "CYP2C19_loss")
        .star("CYP2C19*17", "CYP2C19_increased")
        // weights
        .tag("CYP2D6_loss", 0.35, &["CYP2D6 poor metabolizer", "Reduced opioid activation"])
        .tag("CYP2D6_reduced", 0.15, &["CYP2D6 intermediate metabolizer"])
        .tag("CYP2D6_normal", 0.0, &[])
        .tag("CYP3A4_rs776746_TT", 0.10, &["Altered CYP3A activity"])
        .tag("CYP3A4_reduced", 0.10, &["CYP3A4*22 reduced expression"])
        .tag("CYP2C19_loss", 0.30, &["CYP2C19 poor metabolizer"])
        .tag("CYP2C19_normal", 0.0, &[])
        .tag("CYP2C19_increased", 0.10, &["CYP2C19 rapid metabolizer"])
        .tag("ABCB1_reduced_function", 0.05, &["ABCB1 efflux variant"])
        .tag("VKORC1_sensitive", 0.20, &["VKORC1 warfarin sensitivity"])
        .tag("CYP2C9_reduced", 0.15, &["CYP2C9 intermediate metabolizer"])
        .tag("SLCO1B1_reduced", 0.25, &["SLCO1B1 decreased function"])
        // pairs
        .pair(
            "CYP2D6_loss",
            "CYP3A4_rs776746_TT",
            0.25,
            &["Both opioid clearance routes impaired"],
            &["codeine", "tramadol"],
        )
        .pair(
            "CYP2C19_loss",
            "ABCB1_reduced_function",
            0.15,
            &["Impaired activation and absorption"],
            &["clopidogrel"],
        )
        .pair(
            "CYP2C9_reduced",
            "VKORC1_sensitive",
            0.20,
            &["Reduced clearance with target sensitivity"],
            &["warfarin"],
        )
        .burden(0.20, &["Multiple gene impairment in same pathway indicates higher risk"])
        // drugs
        .drug("2670", "codeine", &["CYP2D6", "CYP3A4", "UGT2B7"])
        .drug("10689", "tramadol", &["CYP2D6", "CYP3A4"])
        .drug("7052", "morphine", &["UGT2B7", "OPRM1"])
        .drug("32968", "clopidogrel", &["CYP2C19", "CYP3A4", "ABCB1"])
        .drug("613391", "prasugrel", &["CYP3A4"])
        .drug("1116632", "ticagrelor", &["CYP3A4", "SLCO1B1"])
        .drug("11289", "warfarin", &["CYP2C9", "VKORC1"])
        .drug("1364430", "apixaban", &["CYP3A4", "ABCB1"])
        // alternatives
        .alternative("codeine", "7052", "morphine", "No CYP2D6 activation required")
        .alternative("codeine", "10689", "tramadol", "CYP2D6 dependent prodrug")
        .alternative("codeine", "787390", "tapentadol", "Glucuronidated")
        .alternative("clopidogrel", "613391", "prasugrel", "Activation not CYP2C19 dependent")
        .alternative("clopidogrel", "1116632", "ticagrelor", "Direct-acting P2Y12 inhibitor")
        .alternative("warfarin", "1364430", "apixaban", "No CYP2C9/VKORC1 dependence")
        .version(FIXTURE_KNOWLEDGE_VERSION)
}

/// Ordered tag set from string literals.
pub fn tag_set(tags: &[&str]) -> BTreeSet<FunctionalTag> {
    tags.iter().map(|t| t.to_string()).collect()
}

/// Gene index from `(gene, tags)` literals.
pub fn gene_index(entries: &[(&str, &[&str])]) -> std::collections::BTreeMap<String, Vec<FunctionalTag>> {
    entries
        .iter()
        .map(|(gene, tags)| (gene.to_string(), tags.iter().map(|t| t.to_string()).collect()))
        .collect()
}

/// Poor CYP2D6 metabolizer with the rs776746 TT genotype.
pub fn cyp2d6_poor_metabolizer() -> Vec<RawVariant> {
    vec![RawVariant::snp("rs3892097", "AA"), RawVariant::snp("rs776746", "TT")]
}

/// Clopidogrel non-responder: CYP2C19 loss, CYP3A4 reduced, ABCB1 variant.
pub fn clopidogrel_non_responder() -> Vec<RawVariant> {
    vec![
        RawVariant::diplotype("CYP2C19", "*2/*2"),
        RawVariant::snp("rs35599367", "C/T"),
        RawVariant::snp("rs1045642", "AA"),
    ]
}

pub fn records(rows: &[RawVariant]) -> Vec<VariantRecord> {
    VariantRecord::from_raw_rows(rows)
}

/// JSON body for `POST /v1/score`.
pub fn score_request_json(variants: &[RawVariant], medication_name: &str) -> serde_json::Value {
    serde_json::json!({
        "variants": variants,
        "medication_name": medication_name,
    })
}
