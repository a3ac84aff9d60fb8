use axum::{
    extract::{Multipart, State},
    http::{header, StatusCode},
    response::IntoResponse,
};

use crate::error::{Error, Result};
use crate::routes::generate::read_upload_form;
use crate::AppState;

/// Merge selected chapter PDFs and hand the combined paper back for export.
pub async fn merge_documents(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let form = read_upload_form(multipart).await?;

    let mut sources = form.files;
    for url in &form.payload.source_urls {
        sources.push(state.assembler.fetch_source(url).await?);
    }
    if sources.is_empty() {
        return Err(Error::BadRequest(
            "Select at least one chapter PDF to merge".to_string(),
        ));
    }

    let merged = state.assembler.merge(sources)?;
    let disposition = format!("attachment; filename=\"{}\"", merged.filename);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        merged.bytes,
    ))
}
