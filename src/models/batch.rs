use serde::{Deserialize, Serialize};

/// A contiguous slice of the total requested item count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch {
    pub index: usize,
    pub size: usize,
}

/// Partition of a requested total into batches of at most `max_batch` items.
/// The final batch is the remainder, never padded; boundaries never split an
/// item.
#[derive(Debug, Clone)]
pub struct BatchPlan {
    pub total: usize,
    pub batches: Vec<Batch>,
}

impl BatchPlan {
    pub fn new(total: usize, max_batch: usize) -> Self {
        let max_batch = max_batch.max(1);
        let mut batches = Vec::new();
        let mut remaining = total;
        let mut index = 0;
        while remaining > 0 {
            let size = remaining.min(max_batch);
            batches.push(Batch { index, size });
            remaining -= size;
            index += 1;
        }
        Self { total, batches }
    }

    pub fn sizes(&self) -> Vec<usize> {
        self.batches.iter().map(|b| b.size).collect()
    }
}

/// Concatenation of all successful batch texts for one generation action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateResult {
    pub text: String,
    pub requested: usize,
    pub detected: usize,
    pub count_matches_requested: bool,
}

/// Emitted after each batch completes, carrying the running aggregate so the
/// caller can show progress before the whole generation finishes.
#[derive(Debug, Clone)]
pub struct BatchProgress {
    pub batch_index: usize,
    pub batch_count: usize,
    pub partial_text: String,
}
