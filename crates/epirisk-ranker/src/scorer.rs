//! Request-level scoring facade.
//!
//! resolve drug → map variants → filter to pathway → score (predictor or
//! rules) → validate alternatives → assemble response.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use epirisk_common::entities::{
    round_score, FunctionalTag, RawVariant, RiskLabel, ScoreResponse, ScoreResult, VariantRecord,
};
use epirisk_common::error::{EpiRiskError, Result};
use epirisk_kb::KnowledgeBase;

use crate::alternatives::get_safe_alternatives;
use crate::features::build_feature_vector;
use crate::mapper::{map_variants_to_tags, GeneIndex};
use crate::pathways::{filter_gene_index, filter_tags_by_pathway, get_drug_info, DrugInfo};
use crate::predictor::{PredictorSlot, RiskPredictor};
use crate::rules::score_deterministic;

/// `model_version` reported when the rules produced the score.
pub const DETERMINISTIC_MODEL_VERSION: &str = "rules-0.1.0";

/// One scoring request as accepted by the API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreRequest {
    pub variants: Vec<RawVariant>,
    #[serde(default)]
    pub medication_name: Option<String>,
    #[serde(default)]
    pub rxnorm: Option<String>,
    /// Patient context (age, sex, ancestry). Accepted, not yet scored.
    #[serde(default)]
    pub context: Option<serde_json::Value>,
}

impl ScoreRequest {
    fn medication_label(&self) -> String {
        self.medication_name
            .as_deref()
            .or(self.rxnorm.as_deref())
            .unwrap_or("<none>")
            .to_string()
    }
}

/// Scores requests against a shared knowledge base and optional predictor.
#[derive(Debug)]
pub struct RiskScorer {
    kb: Arc<KnowledgeBase>,
    predictor: Arc<PredictorSlot>,
}

impl RiskScorer {
    pub fn new(kb: Arc<KnowledgeBase>, predictor: Arc<PredictorSlot>) -> Self {
        Self { kb, predictor }
    }

    /// Rules-only scorer.
    pub fn deterministic(kb: Arc<KnowledgeBase>) -> Self {
        Self::new(kb, Arc::new(PredictorSlot::empty()))
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.kb
    }

    pub fn predictor_slot(&self) -> &Arc<PredictorSlot> {
        &self.predictor
    }

    /// Version of the currently active model.
    pub fn model_version(&self) -> String {
        self.predictor
            .snapshot()
            .map(|p| p.version().to_string())
            .unwrap_or_else(|| DETERMINISTIC_MODEL_VERSION.to_string())
    }

    pub fn score(&self, request: &ScoreRequest) -> Result<ScoreResponse> {
        let trace_id = Uuid::new_v4().to_string();

        let drug = get_drug_info(
            &self.kb,
            request.medication_name.as_deref(),
            request.rxnorm.as_deref(),
        )
        .ok_or_else(|| EpiRiskError::UnknownMedication(request.medication_label()))?;

        let variants = VariantRecord::from_raw_rows(&request.variants);
        let mapping = map_variants_to_tags(&self.kb, &variants);
        let pathway_tags: BTreeSet<FunctionalTag> =
            filter_tags_by_pathway(&mapping.tags, &drug.genes).into_iter().collect();
        let pathway_index = filter_gene_index(&mapping.gene_to_tags, &drug.genes);

        debug!(
            %trace_id,
            drug = %drug.name,
            variants = variants.len(),
            tags = mapping.tags.len(),
            pathway_tags = pathway_tags.len(),
            "Mapped variants"
        );

        let (result, model_version) = match self.predictor.snapshot() {
            Some(predictor) => match self.score_with_predictor(predictor.as_ref(), &pathway_tags, &drug) {
                Ok(result) => (result, predictor.version().to_string()),
                Err(e) => {
                    warn!(%trace_id, "Predictor {} failed, using rules: {e}", predictor.version());
                    (self.score_rules(&pathway_tags, &pathway_index, &drug), DETERMINISTIC_MODEL_VERSION.to_string())
                }
            },
            None => (self.score_rules(&pathway_tags, &pathway_index, &drug), DETERMINISTIC_MODEL_VERSION.to_string()),
        };

        let suggested_alternatives = get_safe_alternatives(&self.kb, &drug.name, &variants);

        info!(
            %trace_id,
            drug = %drug.name,
            score = result.score,
            label = %result.label,
            model = %model_version,
            "Scored request"
        );

        Ok(ScoreResponse {
            risk_score: round_score(result.score),
            risk_label: result.label,
            rationales: result.rationales,
            suggested_alternatives,
            trace_id,
            model_version,
            knowledge_version: self.kb.version().to_string(),
        })
    }

    fn score_rules(&self, tags: &BTreeSet<FunctionalTag>, index: &GeneIndex, drug: &DrugInfo) -> ScoreResult {
        score_deterministic(&self.kb, tags, index, &drug.name)
    }

    /// Predictor probability labelled by the rule thresholds. Rationales
    /// come from the rules with an empty gene index.
    fn score_with_predictor(
        &self,
        predictor: &dyn RiskPredictor,
        tags: &BTreeSet<FunctionalTag>,
        drug: &DrugInfo,
    ) -> Result<ScoreResult> {
        let features = build_feature_vector(&self.kb, tags, &drug.name, &drug.genes);
        let probability = predictor
            .predict_probability(&features)
            .map_err(|e| EpiRiskError::PredictorUnavailable(e.to_string()))?;
        if !probability.is_finite() {
            return Err(EpiRiskError::PredictorUnavailable(format!(
                "non-finite probability {probability}"
            )));
        }

        let score = probability.clamp(0.0, 1.0);
        let explained = score_deterministic(&self.kb, tags, &GeneIndex::new(), &drug.name);
        Ok(ScoreResult { score, label: RiskLabel::from_score(score), rationales: explained.rationales })
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use epirisk_common::entities::Rationale;
    use epirisk_test_utils::{clopidogrel_non_responder, cyp2d6_poor_metabolizer, fixture_kb, FIXTURE_KNOWLEDGE_VERSION};
    use pretty_assertions::assert_eq;

    struct FixedPredictor(f64);

    impl RiskPredictor for FixedPredictor {
        fn predict_probability(&self, _features: &[f32]) -> anyhow::Result<f64> {
            Ok(self.0)
        }
        fn version(&self) -> &str {
            "fixed-1"
        }
    }

    struct FailingPredictor;

    impl RiskPredictor for FailingPredictor {
        fn predict_probability(&self, _features: &[f32]) -> anyhow::Result<f64> {
            anyhow::bail!("model exploded")
        }
        fn version(&self) -> &str {
            "broken-1"
        }
    }

    fn request(variants: Vec<RawVariant>, drug: &str) -> ScoreRequest {
        ScoreRequest { variants, medication_name: Some(drug.into()), ..Default::default() }
    }

    #[test]
    fn test_deterministic_codeine_score() {
        let scorer = RiskScorer::deterministic(Arc::new(fixture_kb()));
        let response = scorer.score(&request(cyp2d6_poor_metabolizer(), "codeine")).unwrap();

        assert_eq!(response.risk_score, 0.75);
        assert_eq!(response.risk_label, RiskLabel::High);
        assert_eq!(response.model_version, DETERMINISTIC_MODEL_VERSION);
        assert_eq!(response.knowledge_version, FIXTURE_KNOWLEDGE_VERSION);
        assert!(Uuid::parse_str(&response.trace_id).is_ok());
        assert!(response
            .rationales
            .iter()
            .any(|r| matches!(r, Rationale::EpistasisPair { .. })));
        assert!(!response.suggested_alternatives.no_safe_alternatives);
    }

    #[test]
    fn test_trace_ids_are_unique() {
        let scorer = RiskScorer::deterministic(Arc::new(fixture_kb()));
        let req = request(cyp2d6_poor_metabolizer(), "codeine");
        let a = scorer.score(&req).unwrap();
        let b = scorer.score(&req).unwrap();
        assert_ne!(a.trace_id, b.trace_id);
    }

    #[test]
    fn test_unknown_medication_fails() {
        let scorer = RiskScorer::deterministic(Arc::new(fixture_kb()));
        let err = scorer.score(&request(cyp2d6_poor_metabolizer(), "notadrug")).unwrap_err();
        assert!(matches!(err, EpiRiskError::UnknownMedication(ref m) if m == "notadrug"));
    }

    #[test]
    fn test_rxnorm_lookup() {
        let scorer = RiskScorer::deterministic(Arc::new(fixture_kb()));
        let req = ScoreRequest {
            variants: cyp2d6_poor_metabolizer(),
            rxnorm: Some("2670".into()),
            ..Default::default()
        };
        assert_eq!(scorer.score(&req).unwrap().risk_label, RiskLabel::High);
    }

    #[test]
    fn test_off_pathway_variants_ignored() {
        let scorer = RiskScorer::deterministic(Arc::new(fixture_kb()));
        let response = scorer.score(&request(cyp2d6_poor_metabolizer(), "warfarin")).unwrap();
        assert_eq!(response.risk_score, 0.05);
        assert_eq!(response.risk_label, RiskLabel::Low);
        assert!(response.rationales.is_empty());
    }

    #[test]
    fn test_malformed_rows_dropped() {
        let scorer = RiskScorer::deterministic(Arc::new(fixture_kb()));
        let mut variants = cyp2d6_poor_metabolizer();
        variants.push(RawVariant { rsid: Some("rs1".into()), ..Default::default() });
        variants.push(RawVariant::default());
        let response = scorer.score(&request(variants, "codeine")).unwrap();
        assert_eq!(response.risk_score, 0.75);
    }

    #[test]
    fn test_pathway_burden_through_facade() {
        let scorer = RiskScorer::deterministic(Arc::new(fixture_kb()));
        let response = scorer.score(&request(clopidogrel_non_responder(), "clopidogrel")).unwrap();
        assert_eq!(response.risk_score, 0.85);
        let burden = response.rationales.iter().find_map(|r| match r {
            Rationale::PathwayBurden { genes, .. } => Some(genes.len()),
            _ => None,
        });
        assert_eq!(burden, Some(3));
    }

    #[test]
    fn test_predictor_score_with_rule_rationales() {
        let kb = Arc::new(fixture_kb());
        let slot = Arc::new(PredictorSlot::with(Arc::new(FixedPredictor(0.4))));
        let scorer = RiskScorer::new(kb, slot);

        let response = scorer.score(&request(clopidogrel_non_responder(), "clopidogrel")).unwrap();
        assert_eq!(response.risk_score, 0.4);
        assert_eq!(response.risk_label, RiskLabel::Moderate);
        assert_eq!(response.model_version, "fixed-1");
        // Empty gene index in predictor mode: no burden rationale
        assert!(response.rationales.iter().all(|r| !matches!(r, Rationale::PathwayBurden { .. })));
        assert!(response.rationales.iter().any(|r| matches!(r, Rationale::SingleTag { .. })));
    }

    #[test]
    fn test_predictor_failure_falls_back_to_rules() {
        let kb = Arc::new(fixture_kb());
        let slot = Arc::new(PredictorSlot::with(Arc::new(FailingPredictor)));
        let scorer = RiskScorer::new(kb, slot);

        let response = scorer.score(&request(cyp2d6_poor_metabolizer(), "codeine")).unwrap();
        assert_eq!(response.risk_score, 0.75);
        assert_eq!(response.model_version, DETERMINISTIC_MODEL_VERSION);
    }

    #[test]
    fn test_non_finite_probability_falls_back() {
        let kb = Arc::new(fixture_kb());
        let slot = Arc::new(PredictorSlot::with(Arc::new(FixedPredictor(f64::NAN))));
        let scorer = RiskScorer::new(kb, slot);
        let response = scorer.score(&request(cyp2d6_poor_metabolizer(), "codeine")).unwrap();
        assert_eq!(response.model_version, DETERMINISTIC_MODEL_VERSION);
    }

    #[test]
    fn test_model_version_follows_slot() {
        let scorer = RiskScorer::deterministic(Arc::new(fixture_kb()));
        assert_eq!(scorer.model_version(), DETERMINISTIC_MODEL_VERSION);
        scorer.predictor_slot().swap(Arc::new(FixedPredictor(0.1)));
        assert_eq!(scorer.model_version(), "fixed-1");
    }
}
