//! Safety re-scoring of substitute medications.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use epirisk_common::entities::{
    round_score, AlternativeAssessment, FunctionalTag, RiskLabel, SafetyStatus, ScoreResult,
    ValidatedAlternatives, VariantRecord,
};
use epirisk_kb::{Alternative, KnowledgeBase};

use crate::mapper::map_variants_to_tags;
use crate::pathways::{filter_gene_index, filter_tags_by_pathway, get_alternatives, get_drug_info};
use crate::rules::score_deterministic;

pub const UNKNOWN_PROFILE_WARNING: &str = "Unknown genetic risk profile for this medication";

/// Risk assigned to an alternative with no pathway data.
pub const UNRESOLVED_RISK: f64 = 0.5;

/// Risk assigned when none of the patient's tags touch the alternative's pathway.
pub const NO_INTERACTION_RISK: f64 = 0.05;

/// Score every static alternative of `drug_name` against the patient's variants.
pub fn get_safe_alternatives(
    kb: &KnowledgeBase,
    drug_name: &str,
    variants: &[VariantRecord],
) -> ValidatedAlternatives {
    let candidates = get_alternatives(kb, drug_name);
    if candidates.is_empty() {
        debug!("No alternatives listed for {drug_name}");
        return ValidatedAlternatives::default();
    }

    let assessments = candidates
        .iter()
        .map(|alt| assess_alternative(kb, alt, variants))
        .collect();
    bucket(assessments)
}

/// Score one alternative.
pub fn assess_alternative(
    kb: &KnowledgeBase,
    alt: &Alternative,
    variants: &[VariantRecord],
) -> AlternativeAssessment {
    let code = Some(alt.rxnorm.as_str()).filter(|c| !c.is_empty());
    let Some(info) = get_drug_info(kb, Some(&alt.name), code) else {
        warn!("Alternative {} ({}) has no pathway data", alt.name, alt.rxnorm);
        return AlternativeAssessment {
            rxnorm: alt.rxnorm.clone(),
            name: alt.name.clone(),
            note: alt.note.clone(),
            risk_score: UNRESOLVED_RISK,
            risk_label: RiskLabel::Moderate,
            safety_status: SafetyStatus::CautionRequired,
            warnings: vec![UNKNOWN_PROFILE_WARNING.to_string()],
        };
    };

    let mapping = map_variants_to_tags(kb, variants);
    let tags: BTreeSet<FunctionalTag> =
        filter_tags_by_pathway(&mapping.tags, &info.genes).into_iter().collect();

    let result = if tags.is_empty() {
        ScoreResult {
            score: NO_INTERACTION_RISK,
            label: RiskLabel::from_score(NO_INTERACTION_RISK),
            rationales: vec![],
        }
    } else {
        let index = filter_gene_index(&mapping.gene_to_tags, &info.genes);
        score_deterministic(kb, &tags, &index, &info.name)
    };

    let warnings = result
        .rationales
        .iter()
        .filter_map(|r| r.evidence().first().cloned())
        .collect();

    AlternativeAssessment {
        rxnorm: alt.rxnorm.clone(),
        name: alt.name.clone(),
        note: alt.note.clone(),
        risk_score: round_score(result.score),
        risk_label: result.label,
        safety_status: SafetyStatus::from(result.label),
        warnings,
    }
}

/// Split by safety status, each bucket ascending by risk.
fn bucket(assessments: Vec<AlternativeAssessment>) -> ValidatedAlternatives {
    let mut out = ValidatedAlternatives::default();
    for assessment in assessments {
        match assessment.safety_status {
            SafetyStatus::Safe => out.safe_alternatives.push(assessment),
            SafetyStatus::CautionRequired => out.caution_required.push(assessment),
            SafetyStatus::NotRecommended => out.not_recommended.push(assessment),
        }
    }

    for list in [&mut out.safe_alternatives, &mut out.caution_required, &mut out.not_recommended] {
        list.sort_by(|a, b| a.risk_score.total_cmp(&b.risk_score));
    }
    out.no_safe_alternatives = out.safe_alternatives.is_empty();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use epirisk_test_utils::{clopidogrel_non_responder, cyp2d6_poor_metabolizer, fixture_kb, records};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_no_listed_alternatives() {
        let kb = fixture_kb();
        let result = get_safe_alternatives(&kb, "morphine", &records(&cyp2d6_poor_metabolizer()));
        assert!(result.is_empty());
        assert!(result.no_safe_alternatives);
    }

    #[test]
    fn test_unresolved_alternative_is_conservative() {
        let kb = fixture_kb();
        let result = get_safe_alternatives(&kb, "codeine", &records(&cyp2d6_poor_metabolizer()));
        let tapentadol = result.iter().find(|a| a.name == "tapentadol").unwrap();
        assert_eq!(tapentadol.risk_score, 0.5);
        assert_eq!(tapentadol.risk_label, RiskLabel::Moderate);
        assert_eq!(tapentadol.safety_status, SafetyStatus::CautionRequired);
        assert_eq!(tapentadol.warnings, vec![UNKNOWN_PROFILE_WARNING.to_string()]);
    }

    #[test]
    fn test_codeine_alternatives_for_poor_metabolizer() {
        let kb = fixture_kb();
        let result = get_safe_alternatives(&kb, "codeine", &records(&cyp2d6_poor_metabolizer()));

        // morphine pathway has no patient tags
        let names: Vec<_> = result.safe_alternatives.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["morphine"]);
        assert_eq!(result.safe_alternatives[0].risk_score, 0.05);
        assert!(!result.no_safe_alternatives);

        // tramadol shares the CYP2D6/CYP3A4 pair: 0.05 + 0.35 + 0.10 + 0.25
        let tramadol = result.not_recommended.iter().find(|a| a.name == "tramadol").unwrap();
        assert_eq!(tramadol.risk_score, 0.75);
        assert_eq!(tramadol.warnings[0], "CYP2D6 poor metabolizer");
    }

    #[test]
    fn test_buckets_disjoint_and_cover_list() {
        let kb = fixture_kb();
        let variants = records(&clopidogrel_non_responder());
        let result = get_safe_alternatives(&kb, "clopidogrel", &variants);
        assert_eq!(result.len(), kb.alternatives_for("clopidogrel").len());

        let mut names: Vec<_> = result.iter().map(|a| a.name.clone()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), result.len());
    }

    #[test]
    fn test_buckets_sorted_by_risk() {
        let assessments = [0.6, 0.4, 0.5]
            .into_iter()
            .enumerate()
            .map(|(i, risk)| AlternativeAssessment {
                rxnorm: i.to_string(),
                name: format!("drug{i}"),
                note: String::new(),
                risk_score: risk,
                risk_label: RiskLabel::Moderate,
                safety_status: SafetyStatus::CautionRequired,
                warnings: vec![],
            })
            .collect();
        let out = bucket(assessments);
        let risks: Vec<f64> = out.caution_required.iter().map(|a| a.risk_score).collect();
        assert_eq!(risks, vec![0.4, 0.5, 0.6]);
        assert!(out.no_safe_alternatives);
    }
}
