//! Variant tables from PDF lab reports.
//!
//! Text is pulled page by page with `lopdf`; each line is split into cells
//! and the first line that looks like a variant header starts a table.

use lazy_static::lazy_static;
use lopdf::Document as PdfDoc;
use regex::Regex;
use tracing::{debug, info, warn};

use epirisk_common::entities::RawVariant;
use epirisk_common::error::{EpiRiskError, Result};

use crate::normalise::{clean_table_text, infer_column_mapping, normalize_variant_row, ColumnMapping};

lazy_static! {
    static ref CELL_SPLIT_RE: Regex = Regex::new(r"\t|\||\s{2,}").unwrap();
}

/// Extract variants from PDF bytes.
pub fn parse_pdf(bytes: &[u8]) -> Result<Vec<RawVariant>> {
    let pdf = PdfDoc::load_mem(bytes)
        .map_err(|e| EpiRiskError::Extraction(format!("unreadable PDF: {e}")))?;

    let mut text = String::new();
    for (page_num, _) in pdf.get_pages() {
        match pdf.extract_text(&[page_num]) {
            Ok(page_text) => {
                text.push_str(&page_text);
                text.push('\n');
            }
            Err(e) => warn!("Skipping PDF page {page_num}: {e}"),
        }
    }

    let variants = parse_text_table(&text);
    if variants.is_empty() {
        return Err(EpiRiskError::Extraction(
            "Could not extract variant tables from PDF. \
             Ensure the PDF contains structured tables with variant data."
                .to_string(),
        ));
    }

    info!("Parsed {} variants from PDF", variants.len());
    Ok(variants)
}

/// Split a text line into table cells.
///
/// Tabs, pipes or runs of two or more spaces delimit cells; a line with
/// none of those falls back to single spaces.
pub fn split_cells(line: &str) -> Vec<String> {
    let cells: Vec<String> = CELL_SPLIT_RE
        .split(line)
        .map(clean_table_text)
        .filter(|c| !c.is_empty())
        .collect();
    if cells.len() > 1 {
        return cells;
    }
    line.split_whitespace().map(clean_table_text).collect()
}

/// Find every header row with a usable mapping and normalise the rows
/// beneath it until the next header.
pub fn parse_text_table(text: &str) -> Vec<RawVariant> {
    let mut mapping: Option<ColumnMapping> = None;
    let mut variants = Vec::new();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let cells = split_cells(line);

        let candidate = infer_column_mapping(&cells);
        if candidate.is_usable() {
            debug!("PDF table header: {cells:?}");
            mapping = Some(candidate);
            continue;
        }

        if let Some(m) = &mapping {
            if let Some(v) = normalize_variant_row(&cells, m) {
                variants.push(v);
            }
        }
    }

    variants
}
