use csv::{ReaderBuilder, StringRecord};
use tokio_util::sync::CancellationToken;

use crate::cancel::ensure_live;
use crate::datasets::{ordering::initial_position, repo_types::NewRow};
use crate::error::{AppError, Result};

/// Zero-based column holding the editable text.
const TEXT_COLUMN: usize = 2;

/// Parses an uploaded CSV into rows ready for insertion.
///
/// The first record is the header and is dropped. Records shorter than three
/// columns keep an empty text rather than being skipped.
pub fn parse_rows(bytes: &[u8], cancel: &CancellationToken) -> Result<Vec<NewRow>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);
    let mut record = StringRecord::new();

    let has_header = reader
        .read_record(&mut record)
        .map_err(|e| AppError::MalformedInput(format!("error reading CSV header: {e}")))?;
    if !has_header {
        return Err(AppError::MalformedInput(
            "error reading CSV header: file is empty".into(),
        ));
    }

    let mut rows = Vec::new();
    while reader.read_record(&mut record)? {
        ensure_live(cancel)?;
        rows.push(NewRow {
            position: initial_position(rows.len()),
            input_text: record.get(TEXT_COLUMN).unwrap_or_default().to_string(),
        });
    }
    Ok(rows)
}
