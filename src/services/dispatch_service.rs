use crate::models::dispatch::{
    DispatchOutcome, EndpointCandidate, FailureReason, GenerationRequest,
};
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::Value as JsonValue;

/// Ordered extraction rules for JSON responses. The upstream does not keep
/// its field names stable, so every known shape is probed in priority order.
const RESPONSE_FIELDS: [&str; 3] = ["questions", "result", "message"];

#[derive(Clone)]
pub struct DispatchService {
    client: Client,
}

impl DispatchService {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Delivers one generation request: multipart form when an attachment is
    /// present, JSON otherwise, with the request id injected as a
    /// cache-buster either way.
    pub async fn dispatch(
        &self,
        request: &GenerationRequest,
        candidates: &[EndpointCandidate],
    ) -> DispatchOutcome {
        self.try_candidates(candidates, |candidate| {
            self.build_generation(request, candidate)
        })
        .await
    }

    /// Forwards an already-built request body unchanged. Used by the proxy
    /// hop, where the candidate list encodes bounded per-target retries as
    /// repeated entries.
    pub async fn forward_raw(
        &self,
        content_type: &str,
        body: Bytes,
        candidates: &[EndpointCandidate],
    ) -> DispatchOutcome {
        self.try_candidates(candidates, |candidate| {
            Ok(self
                .client
                .post(&candidate.url)
                .query(&[("requestId", crate::utils::token::generate_request_id())])
                .header(CONTENT_TYPE, content_type)
                .body(body.clone()))
        })
        .await
    }

    /// Tries each candidate once, in order, and returns the first successful
    /// normalized response. Retries happen across candidates, never against
    /// the same candidate within one call. Failures never escape as errors;
    /// the last observed reason is preserved for diagnostics.
    async fn try_candidates<F>(&self, candidates: &[EndpointCandidate], build: F) -> DispatchOutcome
    where
        F: Fn(&EndpointCandidate) -> std::result::Result<reqwest::RequestBuilder, FailureReason>,
    {
        let mut last_failure = FailureReason::Network("no candidates configured".to_string());

        for candidate in candidates {
            tracing::debug!(
                url = %candidate.url,
                kind = ?candidate.kind,
                timeout_ms = candidate.timeout.as_millis() as u64,
                "dispatching"
            );

            let builder = match build(candidate) {
                Ok(builder) => builder,
                Err(reason) => {
                    last_failure = reason;
                    continue;
                }
            };

            match tokio::time::timeout(candidate.timeout, attempt(builder)).await {
                // Timer expiry drops the in-flight future; we stop waiting.
                Err(_) => {
                    tracing::warn!(url = %candidate.url, "candidate timed out");
                    last_failure = FailureReason::Timeout;
                }
                Ok(Err(reason)) => {
                    tracing::warn!(url = %candidate.url, %reason, "candidate failed");
                    last_failure = reason;
                }
                Ok(Ok(outcome)) => return outcome,
            }
        }

        tracing::warn!(%last_failure, "all candidates failed");
        DispatchOutcome::Failure {
            reason: last_failure,
        }
    }

    fn build_generation(
        &self,
        request: &GenerationRequest,
        candidate: &EndpointCandidate,
    ) -> std::result::Result<reqwest::RequestBuilder, FailureReason> {
        let builder = self
            .client
            .post(&candidate.url)
            .query(&[("requestId", request.request_id.as_str())]);

        match &request.attachment {
            Some(attachment) => {
                let part = Part::bytes(attachment.bytes.clone())
                    .file_name(attachment.filename.clone())
                    .mime_str("application/pdf")
                    .map_err(|e| FailureReason::Network(e.to_string()))?;
                let form = Form::new()
                    .part("pdf", part)
                    .text("query", request.prompt.clone())
                    .text("requestId", request.request_id.clone());
                Ok(builder.multipart(form))
            }
            None => Ok(builder
                // `?query=` duplication kept for upstream compatibility.
                .query(&[("query", request.prompt.as_str())])
                .json(&serde_json::json!({
                    "query": request.prompt,
                    "requestId": request.request_id,
                }))),
        }
    }
}

async fn attempt(
    builder: reqwest::RequestBuilder,
) -> std::result::Result<DispatchOutcome, FailureReason> {
    let response = builder
        .send()
        .await
        .map_err(|e| FailureReason::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FailureReason::Http(status.as_u16()));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("text/plain")
        .to_string();
    let body = response
        .text()
        .await
        .map_err(|e| FailureReason::Network(e.to_string()))?;

    let text = normalize_body(&content_type, &body);
    if text.trim().is_empty() {
        return Err(FailureReason::UpstreamEmpty);
    }

    Ok(DispatchOutcome::Success { text, content_type })
}

/// Collapses JSON and plain-text transports into one text payload so callers
/// never branch on response format.
fn normalize_body(content_type: &str, body: &str) -> String {
    if !content_type.contains("application/json") {
        return body.to_string();
    }
    let Ok(value) = serde_json::from_str::<JsonValue>(body) else {
        return body.to_string();
    };
    if let Some(direct) = value.as_str() {
        return direct.to_string();
    }
    for field in RESPONSE_FIELDS {
        if let Some(text) = value.get(field).and_then(|v| v.as_str()) {
            return text.to_string();
        }
    }
    body.to_string()
}
