/// Core domain types shared by the knowledge base, the ranker and the web layer.
/// Wire shapes (serde) match the JSON returned by the scoring API.

use serde::{Deserialize, Serialize};

use crate::error::EpiRiskError;

/// A knowledge-base vocabulary token such as `CYP2D6_loss`.
pub type FunctionalTag = String;

// ---------------------------------------------------------------------------
// Tag / genotype helpers
// ---------------------------------------------------------------------------

/// Gene symbol encoded in a functional tag: everything before the first `_`,
/// or the whole tag when it has no underscore.
///
/// `CYP3A4_rs776746_TT` → `CYP3A4`, `HLA-B_5701_positive` → `HLA-B`.
pub fn extract_gene(tag: &str) -> &str {
    tag.split('_').next().unwrap_or(tag)
}

/// Normalise a genotype call.
///
/// Strips `/`, `|`, `,` and spaces, uppercases, and sorts the alleles when
/// exactly two alphabetic characters remain. Idempotent.
///
/// `A/G` → `AG`, `g|a` → `AG`, `T|C` → `CT`.
pub fn normalize_genotype(genotype: &str) -> String {
    let trimmed = genotype.trim();
    if trimmed.is_empty() || matches!(trimmed.to_lowercase().as_str(), "nan" | "none") {
        return String::new();
    }

    let clean: String = trimmed
        .chars()
        .filter(|c| !matches!(c, '/' | '|' | ',') && !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect();

    if clean.chars().count() == 2 && clean.chars().all(char::is_alphabetic) {
        let mut alleles: Vec<char> = clean.chars().collect();
        alleles.sort_unstable();
        return alleles.into_iter().collect();
    }

    clean
}

// ---------------------------------------------------------------------------
// Variant records
// ---------------------------------------------------------------------------

/// Loose wire shape of a variant row, as produced by the extractor or posted
/// to the JSON endpoint. Turned into a [`VariantRecord`] before scoring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawVariant {
    /// rsID, e.g. `rs3892097`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rsid: Option<String>,
    /// Genotype, e.g. `AA`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genotype: Option<String>,
    /// Gene symbol, e.g. `CYP2D6`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gene: Option<String>,
    /// Star diplotype, e.g. `*4/*4`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub star: Option<String>,
}

impl RawVariant {
    pub fn snp(rsid: &str, genotype: &str) -> Self {
        Self { rsid: Some(rsid.to_string()), genotype: Some(genotype.to_string()), ..Default::default() }
    }

    pub fn diplotype(gene: &str, star: &str) -> Self {
        Self { gene: Some(gene.to_string()), star: Some(star.to_string()), ..Default::default() }
    }
}

/// SNP call keyed by rsID. The genotype is always normalised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnpCall {
    pub rsid: String,
    pub genotype: String,
}

impl SnpCall {
    pub fn new(rsid: &str, genotype: &str) -> Self {
        Self { rsid: rsid.trim().to_string(), genotype: normalize_genotype(genotype) }
    }

    /// Allele-proxy lookup key, `rsid:genotype`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.rsid, self.genotype)
    }
}

/// Star-allele diplotype for one gene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarCall {
    pub gene: String,
    pub star: String,
}

impl StarCall {
    pub fn new(gene: &str, star: &str) -> Self {
        Self { gene: gene.trim().to_string(), star: star.trim().to_string() }
    }
}

/// A validated variant observation.
///
/// A row carrying both an rsID call and a diplotype is kept as `Combined`
/// and both halves are mapped independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantRecord {
    Snp(SnpCall),
    Diplotype(StarCall),
    Combined(SnpCall, StarCall),
}

impl VariantRecord {
    pub fn snp(rsid: &str, genotype: &str) -> Self {
        VariantRecord::Snp(SnpCall::new(rsid, genotype))
    }

    pub fn diplotype(gene: &str, star: &str) -> Self {
        VariantRecord::Diplotype(StarCall::new(gene, star))
    }

    pub fn snp_call(&self) -> Option<&SnpCall> {
        match self {
            VariantRecord::Snp(call) | VariantRecord::Combined(call, _) => Some(call),
            VariantRecord::Diplotype(_) => None,
        }
    }

    pub fn star_call(&self) -> Option<&StarCall> {
        match self {
            VariantRecord::Diplotype(call) | VariantRecord::Combined(_, call) => Some(call),
            VariantRecord::Snp(_) => None,
        }
    }

    /// Convert raw rows, dropping the ones that match neither shape.
    pub fn from_raw_rows(rows: &[RawVariant]) -> Vec<VariantRecord> {
        rows.iter()
            .filter_map(|row| match VariantRecord::try_from(row.clone()) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::debug!("Dropping variant row: {e}");
                    None
                }
            })
            .collect()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl TryFrom<RawVariant> for VariantRecord {
    type Error = EpiRiskError;

    fn try_from(raw: RawVariant) -> Result<Self, Self::Error> {
        let snp = match (non_empty(raw.rsid.clone()), non_empty(raw.genotype.clone())) {
            (Some(rsid), Some(genotype)) => Some(SnpCall::new(&rsid, &genotype)),
            _ => None,
        };
        let star = match (non_empty(raw.gene.clone()), non_empty(raw.star.clone())) {
            (Some(gene), Some(star)) => Some(StarCall::new(&gene, &star)),
            _ => None,
        };

        match (snp, star) {
            (Some(s), Some(d)) => Ok(VariantRecord::Combined(s, d)),
            (Some(s), None) => Ok(VariantRecord::Snp(s)),
            (None, Some(d)) => Ok(VariantRecord::Diplotype(d)),
            (None, None) => Err(EpiRiskError::MalformedVariant(format!(
                "expected rsid+genotype or gene+star, got {raw:?}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Scores and rationales
// ---------------------------------------------------------------------------

/// Scores below this are `low`.
pub const LOW_RISK_UPPER: f64 = 0.33;
/// Scores below this (and at least [`LOW_RISK_UPPER`]) are `moderate`.
pub const MODERATE_RISK_UPPER: f64 = 0.66;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLabel {
    Low,
    Moderate,
    High,
}

impl RiskLabel {
    pub fn from_score(score: f64) -> Self {
        if score < LOW_RISK_UPPER {
            RiskLabel::Low
        } else if score < MODERATE_RISK_UPPER {
            RiskLabel::Moderate
        } else {
            RiskLabel::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLabel::Low => "low",
            RiskLabel::Moderate => "moderate",
            RiskLabel::High => "high",
        }
    }
}

impl std::fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Human-readable explanation attached to a score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Rationale {
    SingleTag {
        tag: FunctionalTag,
        evidence: Vec<String>,
    },
    EpistasisPair {
        pair: [FunctionalTag; 2],
        genes: Vec<String>,
        evidence: Vec<String>,
    },
    PathwayBurden {
        genes: Vec<String>,
        evidence: Vec<String>,
    },
}

impl Rationale {
    pub fn evidence(&self) -> &[String] {
        match self {
            Rationale::SingleTag { evidence, .. }
            | Rationale::EpistasisPair { evidence, .. }
            | Rationale::PathwayBurden { evidence, .. } => evidence,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Rationale::SingleTag { .. } => "single_tag",
            Rationale::EpistasisPair { .. } => "epistasis_pair",
            Rationale::PathwayBurden { .. } => "pathway_burden",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub score: f64,
    pub label: RiskLabel,
    pub rationales: Vec<Rationale>,
}

// ---------------------------------------------------------------------------
// Alternatives
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SafetyStatus {
    Safe,
    CautionRequired,
    NotRecommended,
}

impl From<RiskLabel> for SafetyStatus {
    fn from(label: RiskLabel) -> Self {
        match label {
            RiskLabel::Low => SafetyStatus::Safe,
            RiskLabel::Moderate => SafetyStatus::CautionRequired,
            RiskLabel::High => SafetyStatus::NotRecommended,
        }
    }
}

/// A candidate substitute medication scored against the patient's variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativeAssessment {
    pub rxnorm: String,
    pub name: String,
    pub note: String,
    pub risk_score: f64,
    pub risk_label: RiskLabel,
    pub safety_status: SafetyStatus,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedAlternatives {
    pub safe_alternatives: Vec<AlternativeAssessment>,
    pub caution_required: Vec<AlternativeAssessment>,
    pub not_recommended: Vec<AlternativeAssessment>,
    pub no_safe_alternatives: bool,
}

impl Default for ValidatedAlternatives {
    fn default() -> Self {
        Self {
            safe_alternatives: vec![],
            caution_required: vec![],
            not_recommended: vec![],
            no_safe_alternatives: true,
        }
    }
}

impl ValidatedAlternatives {
    pub fn len(&self) -> usize {
        self.safe_alternatives.len() + self.caution_required.len() + self.not_recommended.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &AlternativeAssessment> {
        self.safe_alternatives
            .iter()
            .chain(self.caution_required.iter())
            .chain(self.not_recommended.iter())
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// Full result of one scoring request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResponse {
    pub risk_score: f64,
    pub risk_label: RiskLabel,
    pub rationales: Vec<Rationale>,
    pub suggested_alternatives: ValidatedAlternatives,
    pub trace_id: String,
    pub model_version: String,
    pub knowledge_version: String,
}

/// Round a score to three decimals for presentation.
pub fn round_score(score: f64) -> f64 {
    (score * 1000.0).round() / 1000.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_extract_gene() {
        assert_eq!(extract_gene("CYP2D6_loss"), "CYP2D6");
        assert_eq!(extract_gene("CYP3A4_rs776746_TT"), "CYP3A4");
        assert_eq!(extract_gene("HLA-B_5701_positive"), "HLA-B");
        assert_eq!(extract_gene("NOUNDERSCORE"), "NOUNDERSCORE");
        assert_eq!(extract_gene(""), "");
    }

    #[test]
    fn test_normalize_genotype_order_independent() {
        assert_eq!(normalize_genotype("A/G"), "AG");
        assert_eq!(normalize_genotype("G/A"), "AG");
        assert_eq!(normalize_genotype("g|a"), "AG");
        assert_eq!(normalize_genotype("T|C"), "CT");
        assert_eq!(normalize_genotype("C, T"), "CT");
    }

    #[test]
    fn test_normalize_genotype_idempotent_and_edge_cases() {
        assert_eq!(normalize_genotype(normalize_genotype("T/C").as_str()), "CT");
        assert_eq!(normalize_genotype("nan"), "");
        assert_eq!(normalize_genotype("  "), "");
        // Longer calls are cleaned but not reordered
        assert_eq!(normalize_genotype("del/ins"), "DELINS");
        assert_eq!(normalize_genotype("A1"), "A1");
    }

    #[test]
    fn test_variant_shapes() {
        let snp = VariantRecord::try_from(RawVariant::snp("rs3892097", "A/A")).unwrap();
        assert_eq!(snp, VariantRecord::snp("rs3892097", "AA"));
        assert_eq!(snp.snp_call().unwrap().key(), "rs3892097:AA");
        assert!(snp.star_call().is_none());

        let star = VariantRecord::try_from(RawVariant::diplotype("CYP2D6", "*4/*4")).unwrap();
        assert!(matches!(star, VariantRecord::Diplotype(_)));

        let both = RawVariant {
            rsid: Some("rs3892097".into()),
            genotype: Some("AA".into()),
            gene: Some("CYP2D6".into()),
            star: Some("*4/*4".into()),
        };
        let combined = VariantRecord::try_from(both).unwrap();
        assert!(combined.snp_call().is_some() && combined.star_call().is_some());
    }

    #[test]
    fn test_malformed_variant_rows_dropped() {
        let rows = vec![
            RawVariant { rsid: Some("rs1".into()), ..Default::default() },
            RawVariant { gene: Some("CYP2D6".into()), star: Some("  ".into()), ..Default::default() },
            RawVariant::snp("rs3892097", "AA"),
        ];
        assert!(VariantRecord::try_from(rows[0].clone()).is_err());
        let records = VariantRecord::from_raw_rows(&rows);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_label_thresholds() {
        assert_eq!(RiskLabel::from_score(0.0), RiskLabel::Low);
        assert_eq!(RiskLabel::from_score(0.329), RiskLabel::Low);
        assert_eq!(RiskLabel::from_score(0.33), RiskLabel::Moderate);
        assert_eq!(RiskLabel::from_score(0.659), RiskLabel::Moderate);
        assert_eq!(RiskLabel::from_score(0.66), RiskLabel::High);
        assert_eq!(RiskLabel::from_score(1.0), RiskLabel::High);
    }

    #[test]
    fn test_safety_status_from_label() {
        assert_eq!(SafetyStatus::from(RiskLabel::Low), SafetyStatus::Safe);
        assert_eq!(SafetyStatus::from(RiskLabel::Moderate), SafetyStatus::CautionRequired);
        assert_eq!(SafetyStatus::from(RiskLabel::High), SafetyStatus::NotRecommended);
    }

    #[test]
    fn test_rationale_wire_format() {
        let r = Rationale::EpistasisPair {
            pair: ["CYP2D6_loss".into(), "CYP3A4_rs776746_TT".into()],
            genes: vec!["CYP2D6".into(), "CYP3A4".into()],
            evidence: vec!["Combined loss impairs codeine activation".into()],
        };
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["type"], "epistasis_pair");
        assert_eq!(v["pair"][1], "CYP3A4_rs776746_TT");
        assert_eq!(
            serde_json::to_value(SafetyStatus::CautionRequired).unwrap(),
            "CAUTION_REQUIRED"
        );
        assert_eq!(serde_json::to_value(RiskLabel::Moderate).unwrap(), "moderate");
    }

    #[test]
    fn test_round_score() {
        assert_eq!(round_score(0.123456), 0.123);
        assert_eq!(round_score(0.7499), 0.75);
    }
}
