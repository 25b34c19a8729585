//! Column inference and row normalisation for lab-report variant tables.
//!
//! Reports name their columns inconsistently (`SNP`, `rs_id`, `Call`,
//! `Diplotype`, ...). [`infer_column_mapping`] resolves the headers to
//! semantic columns and [`normalize_variant_row`] turns one row into a
//! [`RawVariant`].

use lazy_static::lazy_static;
use regex::Regex;

use epirisk_common::entities::{normalize_genotype, RawVariant};

lazy_static! {
    static ref STAR_ALLELE_RE: Regex =
        Regex::new(r"([A-Z0-9]+)\*(\d+[A-Z]*)/\*(\d+[A-Z]*)").unwrap();
    static ref SUPERSCRIPT_RE: Regex =
        Regex::new(r"[\u{2070}-\u{209F}\u{00B0}-\u{00BE}]+").unwrap();
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
}

const RSID_HEADERS: &[&str] = &["rsid", "snp", "rs_id", "variant_id"];
const GENOTYPE_HEADERS: &[&str] = &["genotype", "call", "gt", "alleles", "result"];
const GENE_HEADERS: &[&str] = &["gene", "gene_symbol", "gene_name"];
const VARIANT_HEADERS: &[&str] = &["variant", "variant_name", "hgvs"];
const STAR_HEADERS: &[&str] = &["star", "star_allele", "diplotype", "haplotype"];
const ALLELE1_HEADERS: &[&str] = &["allele1", "allele_1", "a1"];
const ALLELE2_HEADERS: &[&str] = &["allele2", "allele_2", "a2"];
const ZYGOSITY_HEADERS: &[&str] = &["zyg", "zygosity", "het_hom"];

/// Column indices of the semantic fields found in a header row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    pub rsid: Option<usize>,
    pub genotype: Option<usize>,
    pub gene: Option<usize>,
    pub variant: Option<usize>,
    pub star: Option<usize>,
    pub allele1: Option<usize>,
    pub allele2: Option<usize>,
    pub zygosity: Option<usize>,
}

impl ColumnMapping {
    pub fn is_empty(&self) -> bool {
        *self == ColumnMapping::default()
    }

    /// True when rows can yield an rsID call or a diplotype.
    pub fn is_usable(&self) -> bool {
        self.rsid.is_some() || self.star.is_some() || self.genotype.is_some()
    }
}

/// `" Gene Symbol "` → `gene_symbol`.
pub fn normalize_column_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// Resolve headers to semantic columns. The first synonym present wins.
pub fn infer_column_mapping<S: AsRef<str>>(headers: &[S]) -> ColumnMapping {
    let normalized: Vec<String> = headers.iter().map(|h| normalize_column_name(h.as_ref())).collect();
    let find = |synonyms: &[&str]| {
        synonyms
            .iter()
            .find_map(|syn| normalized.iter().position(|h| h == syn))
    };

    ColumnMapping {
        rsid: find(RSID_HEADERS),
        genotype: find(GENOTYPE_HEADERS),
        gene: find(GENE_HEADERS),
        variant: find(VARIANT_HEADERS),
        star: find(STAR_HEADERS),
        allele1: find(ALLELE1_HEADERS),
        allele2: find(ALLELE2_HEADERS),
        zygosity: find(ZYGOSITY_HEADERS),
    }
}

/// Join two allele columns into a sorted genotype.
///
/// A homozygous zygosity hint wins over disagreeing alleles.
pub fn combine_alleles(allele1: &str, allele2: &str, zygosity: Option<&str>) -> String {
    let a1 = allele1.trim().to_uppercase();
    let mut a2 = allele2.trim().to_uppercase();
    if a1.is_empty() || a2.is_empty() {
        return String::new();
    }

    if zygosity.is_some_and(|z| z.to_lowercase().contains("hom")) && a1 != a2 {
        a2 = a1.clone();
    }

    let mut pair = [a1, a2];
    pair.sort();
    pair.concat()
}

/// Star-allele notation split into gene and sorted diplotype.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StarAllele {
    pub gene: String,
    pub allele1: String,
    pub allele2: String,
}

impl StarAllele {
    /// `*1/*4`
    pub fn star(&self) -> String {
        format!("{}/{}", self.allele1, self.allele2)
    }
}

/// Parse `GENE*N/*M` anywhere in `text` (case-insensitive).
///
/// `CYP2C19*2/*1` → gene `CYP2C19`, star `*1/*2`.
pub fn parse_star_allele(text: &str) -> Option<StarAllele> {
    let upper = text.to_uppercase();
    let caps = STAR_ALLELE_RE.captures(&upper)?;
    let mut alleles = [format!("*{}", &caps[2]), format!("*{}", &caps[3])];
    alleles.sort();
    let [allele1, allele2] = alleles;
    Some(StarAllele { gene: caps[1].to_string(), allele1, allele2 })
}

/// Strip superscript footnote markers and collapse whitespace.
pub fn clean_table_text(text: &str) -> String {
    let stripped = SUPERSCRIPT_RE.replace_all(text, "");
    WHITESPACE_RE.replace_all(&stripped, " ").trim().to_string()
}

/// Sort the alleles of a `*N/*M` diplotype written without a gene.
fn sort_diplotype(star: &str) -> String {
    let mut alleles: Vec<&str> = star.split('/').map(str::trim).collect();
    alleles.sort();
    alleles.join("/")
}

fn cell<'a>(row: &'a [String], idx: Option<usize>) -> Option<&'a str> {
    let value = row.get(idx?)?.trim();
    if value.is_empty() || matches!(value.to_lowercase().as_str(), "nan" | "none" | "null" | "-") {
        None
    } else {
        Some(value)
    }
}

/// Turn one table row into a variant.
///
/// Tried in order:
/// 1. star column holding full `GENE*N/*M` notation
/// 2. gene column plus a star column containing `*`
/// 3. rsID plus genotype
/// 4. rsID plus two allele columns (with optional zygosity)
/// 5. genotype column that embeds the rsID, e.g. `rs3892097 A/A`
pub fn normalize_variant_row(row: &[String], mapping: &ColumnMapping) -> Option<RawVariant> {
    let rsid = cell(row, mapping.rsid);
    let genotype = cell(row, mapping.genotype);
    let gene = cell(row, mapping.gene);
    let star = cell(row, mapping.star);

    if let Some(parsed) = star.and_then(parse_star_allele) {
        return Some(RawVariant::diplotype(&parsed.gene, &parsed.star()));
    }

    if let (Some(gene), Some(star)) = (gene, star) {
        if star.contains('*') {
            return Some(RawVariant::diplotype(&gene.to_uppercase(), &sort_diplotype(star)));
        }
    }

    if let (Some(rsid), Some(genotype)) = (rsid, genotype) {
        let genotype = normalize_genotype(genotype);
        if !genotype.is_empty() {
            return Some(RawVariant::snp(rsid, &genotype));
        }
    }

    if let (Some(rsid), Some(a1), Some(a2)) =
        (rsid, cell(row, mapping.allele1), cell(row, mapping.allele2))
    {
        let genotype = combine_alleles(a1, a2, cell(row, mapping.zygosity));
        if !genotype.is_empty() {
            return Some(RawVariant::snp(rsid, &genotype));
        }
    }

    if let (None, Some(text)) = (rsid, genotype) {
        let embedded = text
            .split_whitespace()
            .find(|part| part.to_lowercase().starts_with("rs"))?;
        let genotype = normalize_genotype(&text.replacen(embedded, "", 1));
        if !genotype.is_empty() {
            return Some(RawVariant::snp(embedded, &genotype));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_infer_column_mapping_synonyms() {
        let mapping = infer_column_mapping(&["SNP", " Call ", "Gene Symbol", "Diplotype", "Zygosity"]);
        assert_eq!(mapping.rsid, Some(0));
        assert_eq!(mapping.genotype, Some(1));
        assert_eq!(mapping.gene, Some(2));
        assert_eq!(mapping.star, Some(3));
        assert_eq!(mapping.zygosity, Some(4));
        assert!(mapping.variant.is_none());

        assert!(infer_column_mapping(&["patient", "date"]).is_empty());
    }

    #[test]
    fn test_combine_alleles() {
        assert_eq!(combine_alleles("g", "A", None), "AG");
        assert_eq!(combine_alleles("T", "C", Some("Homozygous")), "TT");
        assert_eq!(combine_alleles("T", "", None), "");
    }

    #[test]
    fn test_parse_star_allele() {
        let parsed = parse_star_allele("cyp2c19*2/*1").unwrap();
        assert_eq!(parsed.gene, "CYP2C19");
        assert_eq!(parsed.star(), "*1/*2");
        assert!(parse_star_allele("*1/*2").is_none());
        assert!(parse_star_allele("").is_none());
    }

    #[test]
    fn test_clean_table_text() {
        assert_eq!(clean_table_text("  CYP2D6\u{00B9}   *4/*4 \n"), "CYP2D6 *4/*4");
    }

    #[test]
    fn test_row_priority() {
        let mapping = infer_column_mapping(&["rsid", "genotype", "gene", "star"]);

        let star_notation = normalize_variant_row(&row(&["", "", "", "CYP2D6*4/*1"]), &mapping);
        assert_eq!(star_notation, Some(RawVariant::diplotype("CYP2D6", "*1/*4")));

        let gene_and_star = normalize_variant_row(&row(&["rs1", "AA", "cyp2d6", "*4/*1"]), &mapping);
        assert_eq!(gene_and_star, Some(RawVariant::diplotype("CYP2D6", "*1/*4")));

        let snp = normalize_variant_row(&row(&["rs3892097", "G/A", "", ""]), &mapping);
        assert_eq!(snp, Some(RawVariant::snp("rs3892097", "AG")));

        assert_eq!(normalize_variant_row(&row(&["", "", "", ""]), &mapping), None);
        assert_eq!(normalize_variant_row(&row(&["rs1", "nan", "", ""]), &mapping), None);
    }

    #[test]
    fn test_allele_columns_and_embedded_rsid() {
        let mapping = infer_column_mapping(&["rs_id", "allele_1", "allele_2", "zyg"]);
        let variant = normalize_variant_row(&row(&["rs4244285", "A", "G", "het"]), &mapping);
        assert_eq!(variant, Some(RawVariant::snp("rs4244285", "AG")));

        let mapping = infer_column_mapping(&["result"]);
        let embedded = normalize_variant_row(&row(&["rs776746 T/T"]), &mapping);
        assert_eq!(embedded, Some(RawVariant::snp("rs776746", "TT")));
    }
}
