use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub const PDF_MAGIC: &[u8] = b"%PDF";

/// One selected chapter/source PDF, as uploaded or fetched from the catalog.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub name: String,
    pub bytes: Bytes,
}

impl SourceDocument {
    pub fn new(name: impl Into<String>, bytes: Bytes) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn has_pdf_magic(&self) -> bool {
        self.bytes.starts_with(PDF_MAGIC)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedDocument {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub page_count: usize,
    pub filename: String,
}
