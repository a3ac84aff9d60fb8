use chrono::{DateTime, Utc};

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Filename for a merged paper, e.g. `exam-paper-20260806-143055-3f1a9c2e.pdf`.
/// The uuid segment keeps concurrent merges from colliding on disk.
pub fn merged_filename(at: DateTime<Utc>) -> String {
    let tag = uuid::Uuid::new_v4().simple().to_string();
    format!("exam-paper-{}-{}.pdf", at.format("%Y%m%d-%H%M%S"), &tag[..8])
}
