use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::db::{FileId, RowId, UserId};

/// Uploaded CSV file owned by one user.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FileRecord {
    pub id: FileId,
    pub filename: String,
    pub uploaded_by: UserId,
    #[serde(with = "time::serde::rfc3339")]
    pub uploaded_at: OffsetDateTime,
}

/// One editable row; `position` orders rows within a file.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RowRecord {
    pub id: RowId,
    pub file_id: FileId,
    pub position: f64,
    pub input_text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRow {
    pub position: f64,
    pub input_text: String,
}
