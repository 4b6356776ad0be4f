use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::{DiseaseRecord, CATALOG_FIELDS};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed catalog row at line {line}: {message}")]
    Parse { line: u64, message: String },
    #[error("Catalog contains no usable rows")]
    Empty,
}

/// Dialect of the catalog file.
#[derive(Debug, Clone, Copy)]
pub struct CatalogOptions {
    pub delimiter: u8,
    pub quote: u8,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            delimiter: b';',
            quote: b'"',
        }
    }
}

impl CatalogOptions {
    pub fn new(delimiter: char, quote: char) -> Self {
        let defaults = Self::default();
        Self {
            delimiter: u8::try_from(delimiter).unwrap_or(defaults.delimiter),
            quote: u8::try_from(quote).unwrap_or(defaults.quote),
        }
    }
}

/// Reads and parses the catalog at `path`.
pub fn load_catalog(path: &Path, options: CatalogOptions) -> Result<Vec<DiseaseRecord>, CatalogError> {
    let bytes = fs::read(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let records = parse_catalog(&bytes, options)?;
    tracing::info!("Loaded {} catalog rows from {}", records.len(), path.display());
    Ok(records)
}

/// Parses catalog bytes. The file has no header row; columns are
/// `name`, `document`, `source` in that order.
pub fn parse_catalog(bytes: &[u8], options: CatalogOptions) -> Result<Vec<DiseaseRecord>, CatalogError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(options.delimiter)
        .quote(options.quote)
        .from_reader(bytes);

    let mut records = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let row = result.map_err(|e| CatalogError::Parse {
            line: e.position().map(|p| p.line()).unwrap_or(0),
            message: e.to_string(),
        })?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);

        if has_runaway_quote(&row) {
            return Err(CatalogError::Parse {
                line,
                message: "unterminated quoted field".to_string(),
            });
        }

        let field = |idx: usize| row.get(idx).unwrap_or("").trim().to_string();
        let record = DiseaseRecord {
            row: index,
            name: field(0),
            document: field(1),
            source: field(2),
        };

        if record.document.is_empty() {
            tracing::warn!("Skipping catalog line {}: empty document field", line);
            continue;
        }
        records.push(record);
    }

    if records.is_empty() {
        return Err(CatalogError::Empty);
    }
    Ok(records)
}

/// An open quote that never closes swallows the rest of the file into one
/// field. Names and sources never span lines, and neither does the last
/// field of a short row, so a line break there means the quote ran away.
fn has_runaway_quote(row: &csv::StringRecord) -> bool {
    let spans_lines = |idx: usize| row.get(idx).is_some_and(|f| f.contains('\n'));
    let short_row_tail = row.len() < CATALOG_FIELDS.len() && row.len() > 0 && spans_lines(row.len() - 1);
    spans_lines(0) || spans_lines(2) || short_row_tail
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_semicolon_rows_with_quoted_fields() {
        let data = b"Influenza;\"Fever; cough; myalgia.\";https://msd/flu\n\
Diabetes mellitus;Impaired insulin secretion.;https://msd/diabetes\n";

        let records = parse_catalog(data, CatalogOptions::default()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "Influenza");
        assert_eq!(records[0].document, "Fever; cough; myalgia.");
        assert_eq!(records[1].source, "https://msd/diabetes");
    }

    #[test]
    fn short_rows_fill_missing_fields_and_blank_documents_are_skipped() {
        let data = b"Gout;Uric acid crystal deposition\nEmpty;;https://msd/empty\n";

        let records = parse_catalog(data, CatalogOptions::default()).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Gout");
        assert_eq!(records[0].source, "");
    }

    #[test]
    fn catalog_without_usable_rows_is_an_error() {
        let err = parse_catalog(b"", CatalogOptions::default()).unwrap_err();
        assert!(matches!(err, CatalogError::Empty));
    }

    #[test]
    fn invalid_utf8_reports_the_line() {
        let data = b"Ok;fine;src\nBad;\xff\xfe;src\n";
        let err = parse_catalog(data, CatalogOptions::default()).unwrap_err();
        match err {
            CatalogError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unterminated_quote_is_a_parse_error() {
        let data = b"Influenza;\"unterminated;https://msd/flu\nGout;Urate crystals.;https://msd/gout\n";
        let err = parse_catalog(data, CatalogOptions::default()).unwrap_err();
        match err {
            CatalogError::Parse { line, message } => {
                assert_eq!(line, 1);
                assert!(message.contains("unterminated"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unterminated_quote_in_source_is_a_parse_error() {
        let data = b"Influenza;Fever.;\"https://msd/flu\nGout;Urate crystals.;https://msd/gout\n";
        assert!(matches!(
            parse_catalog(data, CatalogOptions::default()),
            Err(CatalogError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn quoted_document_may_span_lines() {
        let data = b"Influenza;\"Fever.\nCough.\";https://msd/flu\n";
        let records = parse_catalog(data, CatalogOptions::default()).unwrap();
        assert_eq!(records[0].document, "Fever.\nCough.");
        assert_eq!(records[0].source, "https://msd/flu");
    }

    #[test]
    fn rows_keep_their_catalog_position_when_others_are_skipped() {
        let data = b"Flu;Fever.;https://msd/flu\nEmpty; ;https://msd/empty\nGout;Urate crystals.;https://msd/gout\n";
        let records = parse_catalog(data, CatalogOptions::default()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].row, 0);
        assert_eq!(records[1].row, 2);
        assert_eq!(records[1].to_document().metadata.row, 2);
    }

    #[test]
    fn load_catalog_reports_missing_file() {
        let err = load_catalog(Path::new("/nonexistent/msd.csv"), CatalogOptions::default())
            .unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
    }
}
