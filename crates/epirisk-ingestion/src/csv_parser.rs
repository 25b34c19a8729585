//! Variant tables from CSV/TSV uploads.

use tracing::{debug, info};

use epirisk_common::entities::RawVariant;
use epirisk_common::error::{EpiRiskError, Result};

use crate::normalise::{infer_column_mapping, normalize_variant_row};

/// Decode as UTF-8, falling back to Latin-1 (every byte maps to a char).
pub fn decode_text(bytes: &[u8]) -> String {
    let text = match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            debug!("CSV is not UTF-8, decoding as Latin-1");
            bytes.iter().map(|&b| b as char).collect()
        }
    };
    text.trim_start_matches('\u{feff}').to_string()
}

/// Tab when the header line has tabs but no commas, otherwise comma.
fn sniff_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or_default();
    if header.contains('\t') && !header.contains(',') {
        b'\t'
    } else {
        b','
    }
}

/// Parse a delimited variant table.
///
/// An empty file yields no variants; a header with no recognisable
/// variant columns is an `Extraction` error.
pub fn parse_csv(bytes: &[u8]) -> Result<Vec<RawVariant>> {
    let text = decode_text(bytes);
    if text.trim().is_empty() {
        return Ok(vec![]);
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(&text))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| EpiRiskError::Extraction(format!("unreadable CSV header: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();

    let mapping = infer_column_mapping(&headers);
    if mapping.is_empty() {
        return Err(EpiRiskError::Extraction(format!(
            "Could not identify variant columns. Found columns: {headers:?}"
        )));
    }

    let mut variants = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record
            .map_err(|e| EpiRiskError::Extraction(format!("malformed CSV row {}: {e}", line + 2)))?;
        let row: Vec<String> = record.iter().map(str::to_string).collect();
        if row.iter().all(|c| c.is_empty()) {
            continue;
        }
        match normalize_variant_row(&row, &mapping) {
            Some(v) => variants.push(v),
            None => debug!("Skipping CSV row {}: no variant found", line + 2),
        }
    }

    info!("Parsed {} variants from CSV", variants.len());
    Ok(variants)
}
