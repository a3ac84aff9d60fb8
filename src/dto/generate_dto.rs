use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// JSON body for attachment-less generation. The multipart form accepted by
/// the same route carries the identical fields plus `pdf`/`file` parts.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct GenerateQuestionsPayload {
    #[validate(length(min = 1, message = "Prompt must not be empty"))]
    pub query: String,

    #[validate(range(min = 1, max = 500, message = "Count must be between 1 and 500"))]
    pub count: usize,

    #[validate(range(min = 1, max = 100))]
    pub max_batch: Option<usize>,

    /// Catalog URLs of chapter PDFs to fetch and merge into the attachment.
    #[serde(default)]
    pub source_urls: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GenerateQuestionsResponse {
    pub questions: String,
    pub requested: usize,
    pub detected: usize,
    pub count_matches_requested: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}
