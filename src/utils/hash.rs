use sha2::{Digest, Sha256};

/// Cache key for the proxy response cache: one digest over the request
/// content type and raw body.
pub fn response_cache_key(content_type: &str, body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content_type.as_bytes());
    hasher.update([0u8]);
    hasher.update(body);
    hex::encode(hasher.finalize())
}
