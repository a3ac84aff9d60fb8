use crate::error::{Error, Result};
use crate::models::batch::{AggregateResult, Batch, BatchPlan, BatchProgress};
use crate::models::dispatch::{DispatchOutcome, EndpointCandidate, GenerationRequest};
use crate::models::document::MergedDocument;
use crate::services::dispatch_service::DispatchService;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

/// Numbered-item heuristic: lines like `Q3.`, `12.` or `7)`. The upstream's
/// formatting drifts, so this can under- or over-count; it is advisory only.
fn item_pattern() -> &'static Regex {
    static ITEM_RE: OnceLock<Regex> = OnceLock::new();
    ITEM_RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*(?:Q\s*)?\d+\s*[.)]").expect("item pattern is valid")
    })
}

pub fn count_numbered_items(text: &str) -> usize {
    item_pattern().find_iter(text).count()
}

#[derive(Clone)]
pub struct GenerationService {
    dispatcher: DispatchService,
    max_batch_size: usize,
    batch_attempts: u32,
    backoff_base: Duration,
}

impl GenerationService {
    pub fn new(dispatcher: DispatchService, max_batch_size: usize, batch_attempts: u32) -> Self {
        Self {
            dispatcher,
            max_batch_size,
            batch_attempts: batch_attempts.max(1),
            backoff_base: Duration::from_millis(500),
        }
    }

    /// Splits `total` into batches of at most the configured size and runs
    /// them strictly one after another, so results arrive in request order
    /// and the upstream never sees parallel load from one generation.
    ///
    /// Each successful batch is appended to the aggregate and the partial
    /// aggregate is emitted on `progress` right away. A batch that exhausts
    /// its attempts fails the whole operation; partial item sets are worse
    /// than no result here, so nothing aggregated so far is returned.
    pub async fn generate_batched<F>(
        &self,
        total: usize,
        max_batch: Option<usize>,
        prompt_for: F,
        attachment: Option<MergedDocument>,
        candidates: &[EndpointCandidate],
        progress: Option<UnboundedSender<BatchProgress>>,
    ) -> Result<AggregateResult>
    where
        F: Fn(usize) -> String,
    {
        if total == 0 {
            return Err(Error::BadRequest(
                "Requested item count must be at least 1".to_string(),
            ));
        }

        let plan = BatchPlan::new(total, max_batch.unwrap_or(self.max_batch_size));
        let batch_count = plan.batches.len();
        tracing::info!(total, batches = batch_count, sizes = ?plan.sizes(), "starting batched generation");

        let mut aggregate = String::new();

        for batch in &plan.batches {
            let prompt = prompt_for(batch.size);
            let text = self
                .run_batch(*batch, &prompt, attachment.clone(), candidates)
                .await?;

            if !aggregate.is_empty() {
                aggregate.push_str("\n\n");
            }
            aggregate.push_str(text.trim());

            if let Some(tx) = &progress {
                // Receiver may be gone; progress is best effort.
                let _ = tx.send(BatchProgress {
                    batch_index: batch.index,
                    batch_count,
                    partial_text: aggregate.clone(),
                });
            }
        }

        let detected = count_numbered_items(&aggregate);
        let count_matches_requested = detected == total;
        if !count_matches_requested {
            tracing::warn!(requested = total, detected, "generated item count does not match request");
        }

        Ok(AggregateResult {
            text: aggregate,
            requested: total,
            detected,
            count_matches_requested,
        })
    }

    async fn run_batch(
        &self,
        batch: Batch,
        prompt: &str,
        attachment: Option<MergedDocument>,
        candidates: &[EndpointCandidate],
    ) -> Result<String> {
        let request = GenerationRequest::new(attachment, prompt, batch.size);

        let mut backoff = self.backoff_base;
        for attempt in 1..=self.batch_attempts {
            // Fresh request id per attempt defeats upstream caching.
            let request = if attempt == 1 {
                request.clone()
            } else {
                request.rearmed()
            };

            match self.dispatcher.dispatch(&request, candidates).await {
                DispatchOutcome::Success { text, .. } => return Ok(text),
                DispatchOutcome::Failure { reason } => {
                    tracing::warn!(
                        batch = batch.index,
                        attempt,
                        %reason,
                        "batch dispatch failed"
                    );
                    if attempt < self.batch_attempts {
                        tokio::time::sleep(backoff).await;
                        backoff *= 2;
                    }
                }
            }
        }

        Err(Error::BatchExhausted {
            batch: batch.index,
            attempts: self.batch_attempts,
        })
    }
}

/// Per-batch prompt rendering: substitute a `{count}` placeholder when the
/// caller provided one, otherwise append an explicit instruction. Numbering
/// restarts at 1 in every batch, which is why the advisory count check
/// matches bare numbered lines rather than one continuous sequence.
pub fn render_prompt(template: &str, count: usize) -> String {
    if template.contains("{count}") {
        template.replace("{count}", &count.to_string())
    } else {
        format!(
            "{}\n\nGenerate exactly {} questions, numbered Q1. onwards.",
            template.trim_end(),
            count
        )
    }
}
