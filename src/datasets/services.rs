use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::auth::claims::Identity;
use crate::cancel::{ensure_live, with_cancel};
use crate::datasets::{
    dto::{IngestSummary, RowInput, RowQuery},
    ingest::parse_rows,
    repo::DatasetRepo,
    repo_types::{FileRecord, NewRow, RowRecord},
};
use crate::db::{FileId, RowId};
use crate::error::{AppError, Result};

const FILE_NOT_FOUND: &str = "File not found or access denied";
const ROW_NOT_FOUND: &str = "Row not found";

/// Parses `bytes` and stores the file with all its rows atomically.
pub async fn ingest(
    repo: &dyn DatasetRepo,
    identity: &Identity,
    filename: &str,
    bytes: &[u8],
    cancel: &CancellationToken,
) -> Result<IngestSummary> {
    let filename = filename.trim();
    if filename.is_empty() {
        return Err(AppError::validation("filename is required"));
    }

    let rows = parse_rows(bytes, cancel)?;
    let file = with_cancel(
        cancel,
        repo.create_file_with_rows(identity.user_id, filename, &rows, cancel),
    )
    .await?;

    info!(file_id = file.id, user_id = identity.user_id, rows = rows.len(), "csv ingested");
    Ok(IngestSummary {
        file,
        rows: rows.len(),
    })
}

pub async fn list_files(
    repo: &dyn DatasetRepo,
    identity: &Identity,
    cancel: &CancellationToken,
) -> Result<Vec<FileRecord>> {
    with_cancel(cancel, repo.list_files(identity.user_id)).await
}

pub async fn list_rows(
    repo: &dyn DatasetRepo,
    identity: &Identity,
    file_id: FileId,
    query: &RowQuery,
    cancel: &CancellationToken,
) -> Result<Vec<RowRecord>> {
    with_cancel(cancel, async {
        ensure_owned(repo, identity, file_id).await?;
        repo.list_rows(file_id, query).await
    })
    .await
}

/// Stores a row at the caller's position; the write and any renumber it
/// forces commit together.
pub async fn create_row(
    repo: &dyn DatasetRepo,
    identity: &Identity,
    file_id: FileId,
    input: RowInput,
    cancel: &CancellationToken,
) -> Result<RowRecord> {
    let row = validate(input)?;
    with_cancel(cancel, ensure_owned(repo, identity, file_id)).await?;
    let created = repo.insert_row(file_id, &row, cancel).await?;
    info!(file_id, row_id = created.id, position = created.position, "row created");
    Ok(created)
}

pub async fn update_row(
    repo: &dyn DatasetRepo,
    identity: &Identity,
    file_id: FileId,
    row_id: RowId,
    input: RowInput,
    cancel: &CancellationToken,
) -> Result<RowRecord> {
    let row = validate(input)?;
    ensure_live(cancel)?;
    repo.update_owned_row(identity.user_id, file_id, row_id, &row, cancel)
        .await?
        .ok_or_else(|| AppError::not_found(ROW_NOT_FOUND))
}

pub async fn delete_row(
    repo: &dyn DatasetRepo,
    identity: &Identity,
    file_id: FileId,
    row_id: RowId,
    cancel: &CancellationToken,
) -> Result<()> {
    let removed = with_cancel(cancel, repo.delete_owned_row(identity.user_id, file_id, row_id)).await?;
    if removed == 0 {
        return Err(AppError::not_found(ROW_NOT_FOUND));
    }
    info!(file_id, row_id, "row deleted");
    Ok(())
}

async fn ensure_owned(repo: &dyn DatasetRepo, identity: &Identity, file_id: FileId) -> Result<()> {
    if repo.file_owned_by(identity.user_id, file_id).await? {
        Ok(())
    } else {
        warn!(file_id, user_id = identity.user_id, "file not owned by caller");
        Err(AppError::not_found(FILE_NOT_FOUND))
    }
}

fn validate(input: RowInput) -> Result<NewRow> {
    if input.input_text.is_empty() {
        return Err(AppError::validation("Input text cannot be empty"));
    }
    if !input.position.is_finite() {
        return Err(AppError::validation("position must be a finite number"));
    }
    Ok(NewRow {
        position: input.position,
        input_text: input.input_text,
    })
}
