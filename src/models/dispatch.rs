use crate::models::document::MergedDocument;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One generation call as handed to the dispatcher. `request_id` is freshly
/// generated per attempt and doubles as an upstream cache-buster.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub attachment: Option<MergedDocument>,
    pub prompt: String,
    pub expected_item_count: usize,
    pub request_id: String,
}

impl GenerationRequest {
    pub fn new(
        attachment: Option<MergedDocument>,
        prompt: impl Into<String>,
        expected_item_count: usize,
    ) -> Self {
        Self {
            attachment,
            prompt: prompt.into(),
            expected_item_count,
            request_id: crate::utils::token::generate_request_id(),
        }
    }

    /// Same request under a new id, for a fresh attempt.
    pub fn rearmed(&self) -> Self {
        Self {
            request_id: crate::utils::token::generate_request_id(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKind {
    Direct,
    Proxy,
}

/// One entry in the ordered fallback ladder. Ordering is significant:
/// the direct endpoint is tried before any proxy fallback.
#[derive(Debug, Clone)]
pub struct EndpointCandidate {
    pub url: String,
    pub kind: EndpointKind,
    pub timeout: Duration,
}

impl EndpointCandidate {
    pub fn direct(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            kind: EndpointKind::Direct,
            timeout,
        }
    }

    pub fn proxy(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            kind: EndpointKind::Proxy,
            timeout,
        }
    }

    /// Expands a target list into `attempts` ordered candidates per target.
    /// The dispatcher never retries a single candidate, so bounded per-target
    /// retries are expressed as repeated candidates instead.
    pub fn expand(targets: &[String], attempts: u32, timeout: Duration) -> Vec<Self> {
        let mut candidates = Vec::with_capacity(targets.len() * attempts as usize);
        for url in targets {
            for _ in 0..attempts {
                candidates.push(Self::proxy(url.clone(), timeout));
            }
        }
        candidates
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    Timeout,
    Network(String),
    Http(u16),
    UpstreamEmpty,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Timeout => write!(f, "timed out"),
            FailureReason::Network(msg) => write!(f, "network error: {}", msg),
            FailureReason::Http(status) => write!(f, "upstream returned HTTP {}", status),
            FailureReason::UpstreamEmpty => write!(f, "upstream returned an empty body"),
        }
    }
}

/// Dispatch never throws; every outcome is one of these.
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    Success { text: String, content_type: String },
    Failure { reason: FailureReason },
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DispatchOutcome::Success { .. })
    }
}
