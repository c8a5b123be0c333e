use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::{get, post, put},
    Router,
};
use bytes::Bytes;
use tracing::{debug, instrument};

use crate::{
    auth::extractors::AuthUser,
    cancel::Cancel,
    datasets::{
        dto::{IngestSummary, RowInput, RowQuery},
        repo_types::{FileRecord, RowRecord},
        services,
    },
    db::{FileId, RowId},
    error::{AppError, Result},
    extract::{Ids, Params, Payload},
    response::ApiResponse,
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/files", get(list_files))
        .route("/files/:file_id", get(list_rows))
}

pub fn write_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/upload",
            post(upload_csv).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/files/:file_id/rows", post(create_row))
        .route(
            "/files/:file_id/rows/:row_id",
            put(update_row).delete(delete_row),
        )
}

/// POST /upload (multipart): `file` holds the CSV bytes, `filename` names it.
#[instrument(skip(state, identity, cancel, mp), fields(user_id = identity.user_id))]
pub async fn upload_csv(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Cancel(cancel): Cancel,
    mut mp: Multipart,
) -> Result<ApiResponse<IngestSummary>> {
    let mut data: Option<Bytes> = None;
    let mut filename: Option<String> = None;
    let mut part_name: Option<String> = None;

    while let Some(field) = mp.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                part_name = field.file_name().map(str::to_string);
                data = Some(field.bytes().await?);
            }
            Some("filename") => filename = Some(field.text().await?),
            other => debug!(field = ?other, "ignoring multipart field"),
        }
    }

    let data = data.ok_or_else(|| AppError::validation("file is required"))?;
    let filename = filename
        .filter(|f| !f.trim().is_empty())
        .or(part_name)
        .unwrap_or_default();

    let summary = services::ingest(
        state.datasets.as_ref(),
        &identity,
        &filename,
        &data,
        &cancel,
    )
    .await?;
    Ok(ApiResponse::created("File uploaded successfully", summary))
}

#[instrument(skip(state, identity, cancel), fields(user_id = identity.user_id))]
pub async fn list_files(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Cancel(cancel): Cancel,
) -> Result<ApiResponse<Vec<FileRecord>>> {
    let files = services::list_files(state.datasets.as_ref(), &identity, &cancel).await?;
    Ok(ApiResponse::with_body("Success", files))
}

#[instrument(skip(state, identity, cancel), fields(user_id = identity.user_id))]
pub async fn list_rows(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Cancel(cancel): Cancel,
    Ids(file_id): Ids<FileId>,
    Params(query): Params<RowQuery>,
) -> Result<ApiResponse<Vec<RowRecord>>> {
    let rows =
        services::list_rows(state.datasets.as_ref(), &identity, file_id, &query, &cancel).await?;
    Ok(ApiResponse::with_body("Success", rows))
}

#[instrument(skip(state, identity, cancel, input), fields(user_id = identity.user_id))]
pub async fn create_row(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Cancel(cancel): Cancel,
    Ids(file_id): Ids<FileId>,
    Payload(input): Payload<RowInput>,
) -> Result<ApiResponse<RowRecord>> {
    let row = services::create_row(state.datasets.as_ref(), &identity, file_id, input, &cancel).await?;
    Ok(ApiResponse::created("Row created successfully", row))
}

#[instrument(skip(state, identity, cancel, input), fields(user_id = identity.user_id))]
pub async fn update_row(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Cancel(cancel): Cancel,
    Ids((file_id, row_id)): Ids<(FileId, RowId)>,
    Payload(input): Payload<RowInput>,
) -> Result<ApiResponse<RowRecord>> {
    let row = services::update_row(
        state.datasets.as_ref(),
        &identity,
        file_id,
        row_id,
        input,
        &cancel,
    )
    .await?;
    Ok(ApiResponse::with_body("Row updated successfully", row))
}

#[instrument(skip(state, identity, cancel), fields(user_id = identity.user_id))]
pub async fn delete_row(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Cancel(cancel): Cancel,
    Ids((file_id, row_id)): Ids<(FileId, RowId)>,
) -> Result<ApiResponse<()>> {
    services::delete_row(state.datasets.as_ref(), &identity, file_id, row_id, &cancel).await?;
    Ok(ApiResponse::message("Row deleted successfully"))
}
