use rand::{distributions::Alphanumeric, thread_rng, Rng};

/// Fresh id per upstream attempt; injected into requests to defeat upstream
/// and intermediate caching.
pub fn generate_request_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}
