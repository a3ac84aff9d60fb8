use axum::{
    extract::{FromRequest, Multipart, Request, State},
    http::header,
    response::IntoResponse,
    Json,
};
use std::path::Path as StdPath;
use validator::Validate;

use crate::dto::generate_dto::{GenerateQuestionsPayload, GenerateQuestionsResponse};
use crate::error::{Error, Result};
use crate::models::document::{SourceDocument, PDF_MAGIC};
use crate::services::generation_service::render_prompt;
use crate::AppState;

/// Everything the multipart form can carry; the JSON body is the same
/// payload minus uploaded files.
pub(crate) struct UploadForm {
    pub payload: GenerateQuestionsPayload,
    pub files: Vec<SourceDocument>,
}

pub(crate) async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm> {
    let mut query = String::new();
    let mut count: usize = 0;
    let mut max_batch = None;
    let mut source_urls = Vec::new();
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or_default().to_string();

        match field_name.as_str() {
            "pdf" | "file" => {
                let filename = field
                    .file_name()
                    .unwrap_or("upload.pdf")
                    .to_string();
                let data = field.bytes().await?;
                validate_upload(&filename, &data)?;
                files.push(SourceDocument::new(filename, data));
            }
            "query" => query = field.text().await?,
            "count" => {
                let raw = field.text().await?;
                count = raw.trim().parse().map_err(|_| {
                    Error::BadRequest(format!("Invalid count: {}", raw.trim()))
                })?;
            }
            "max_batch" => {
                let raw = field.text().await?;
                max_batch = Some(raw.trim().parse().map_err(|_| {
                    Error::BadRequest(format!("Invalid max_batch: {}", raw.trim()))
                })?);
            }
            "source_url" | "source_urls" => source_urls.push(field.text().await?),
            other => {
                tracing::debug!(field = other, "ignoring unknown multipart field");
            }
        }
    }

    Ok(UploadForm {
        payload: GenerateQuestionsPayload {
            query,
            count,
            max_batch,
            source_urls,
        },
        files,
    })
}

/// Rejected before any merge or network call, with a specific message.
fn validate_upload(filename: &str, data: &[u8]) -> Result<()> {
    let ext = StdPath::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_else(|| "bin".to_string());
    if ext != "pdf" {
        return Err(Error::BadRequest(format!(
            "File type .{} is not allowed, select chapter PDFs",
            ext
        )));
    }
    if !data.starts_with(PDF_MAGIC) {
        return Err(Error::BadRequest(format!(
            "Invalid PDF file content: {}",
            filename
        )));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/generate-questions",
    request_body = GenerateQuestionsPayload,
    responses(
        (status = 200, description = "Exam content generated", body = GenerateQuestionsResponse),
        (status = 400, description = "Invalid request payload"),
        (status = 502, description = "Upstream generation service unavailable"),
    ),
)]
pub async fn generate_questions(
    State(state): State<AppState>,
    req: Request,
) -> Result<impl IntoResponse> {
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let form = if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(req, &())
            .await
            .map_err(|e| Error::BadRequest(e.to_string()))?;
        read_upload_form(multipart).await?
    } else {
        let Json(payload) = Json::<GenerateQuestionsPayload>::from_request(req, &())
            .await
            .map_err(|e| Error::BadRequest(e.to_string()))?;
        UploadForm {
            payload,
            files: Vec::new(),
        }
    };

    form.payload.validate()?;

    let mut sources = form.files;
    for url in &form.payload.source_urls {
        sources.push(state.assembler.fetch_source(url).await?);
    }

    let attachment = if sources.is_empty() {
        None
    } else {
        Some(state.assembler.merge(sources)?)
    };

    // Partial aggregates are surfaced as they land, ahead of the final body.
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<crate::models::batch::BatchProgress>();
    tokio::spawn(async move {
        while let Some(progress) = rx.recv().await {
            tracing::info!(
                batch = progress.batch_index + 1,
                of = progress.batch_count,
                chars = progress.partial_text.len(),
                "partial aggregate ready"
            );
        }
    });

    let template = form.payload.query.clone();
    let candidates = state.candidate_ladder();
    let result = state
        .generation
        .generate_batched(
            form.payload.count,
            form.payload.max_batch,
            |n| render_prompt(&template, n),
            attachment,
            &candidates,
            Some(tx),
        )
        .await?;

    let warning = (!result.count_matches_requested).then(|| {
        format!(
            "Requested {} items but detected {} in the generated paper",
            result.requested, result.detected
        )
    });

    Ok(Json(GenerateQuestionsResponse {
        questions: result.text,
        requested: result.requested,
        detected: result.detected,
        count_matches_requested: result.count_matches_requested,
        warning,
    }))
}
