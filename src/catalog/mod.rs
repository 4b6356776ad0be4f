//! Disease catalog: the semicolon-delimited table of disease facts.
//!
//! Each row carries a disease name, a free-text description and a source
//! citation. Rows are rendered into [`Document`]s before splitting.

mod loader;

pub use loader::{load_catalog, parse_catalog, CatalogError, CatalogOptions};

use serde::{Deserialize, Serialize};

/// Column names, in file order.
pub const CATALOG_FIELDS: [&str; 3] = ["name", "document", "source"];

/// One row of the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiseaseRecord {
    /// Zero-based row in the catalog file, counting skipped rows.
    #[serde(default)]
    pub row: usize,
    pub name: String,
    pub document: String,
    pub source: String,
}

/// Metadata that follows a record's text through splitting and indexing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub source: String,
    /// Zero-based row in the catalog.
    pub row: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub page_content: String,
    pub metadata: DocumentMetadata,
}

impl DiseaseRecord {
    /// Renders the record as `column: value` lines.
    pub fn to_document(&self) -> Document {
        let values = [&self.name, &self.document, &self.source];
        let page_content = CATALOG_FIELDS
            .iter()
            .zip(values)
            .map(|(field, value)| format!("{}: {}", field, value.trim()))
            .collect::<Vec<_>>()
            .join("\n");

        Document {
            page_content,
            metadata: DocumentMetadata {
                source: self.source.trim().to_string(),
                row: self.row,
            },
        }
    }
}

pub fn to_documents(records: &[DiseaseRecord]) -> Vec<Document> {
    records.iter().map(DiseaseRecord::to_document).collect()
}
