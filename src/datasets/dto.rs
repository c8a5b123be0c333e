use serde::{Deserialize, Serialize};

use crate::datasets::repo_types::FileRecord;

/// Body of row create/update.
#[derive(Debug, Clone, Deserialize)]
pub struct RowInput {
    pub position: f64,
    #[serde(default)]
    pub input_text: String,
}

/// Optional paging and filtering for row listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RowQuery {
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: i64,
    pub search: Option<String>,
}

impl RowQuery {
    /// Blank search terms are treated as absent.
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Serialize)]
pub struct IngestSummary {
    pub file: FileRecord,
    pub rows: usize,
}
