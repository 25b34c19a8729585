//! epirisk-ingestion: turns uploaded lab reports into variant rows.
//!
//! Supported inputs: CSV/TSV tables and PDF reports with text tables.
//! Every parser yields [`RawVariant`]s with genotypes normalised and star
//! diplotypes sorted.

pub mod normalise;
pub mod csv_parser;
pub mod pdf_parser;

use tracing::info;

use epirisk_common::entities::RawVariant;
use epirisk_common::error::{EpiRiskError, Result};

/// Upload formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Csv,
    Pdf,
}

impl FileKind {
    /// Detect from the file extension, then the content type.
    pub fn detect(filename: &str, content_type: Option<&str>) -> Option<Self> {
        let name = filename.to_lowercase();
        let ctype = content_type.unwrap_or_default().to_lowercase();

        if name.ends_with(".csv") || name.ends_with(".tsv") || ctype.contains("csv") || ctype.contains("tab-separated") {
            Some(FileKind::Csv)
        } else if name.ends_with(".pdf") || ctype.contains("pdf") {
            Some(FileKind::Pdf)
        } else {
            None
        }
    }
}

/// Extract variant rows from an uploaded file.
pub fn extract_variants(filename: &str, content_type: Option<&str>, bytes: &[u8]) -> Result<Vec<RawVariant>> {
    let kind = FileKind::detect(filename, content_type).ok_or_else(|| {
        EpiRiskError::Extraction(format!(
            "Unsupported file type. Expected CSV or PDF, got: {filename}"
        ))
    })?;

    info!("Parsing {kind:?} file: {filename} ({} bytes)", bytes.len());
    match kind {
        FileKind::Csv => csv_parser::parse_csv(bytes),
        FileKind::Pdf => pdf_parser::parse_pdf(bytes),
    }
}
