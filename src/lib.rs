pub mod config;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use crate::models::dispatch::EndpointCandidate;
use crate::services::{
    assembler_service::AssemblerService, cache_service::ResponseCache,
    dispatch_service::DispatchService, generation_service::GenerationService,
};
use reqwest::Client;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub assembler: AssemblerService,
    pub dispatcher: DispatchService,
    pub generation: GenerationService,
    pub proxy_cache: ResponseCache,
}

impl AppState {
    pub fn new() -> Self {
        let config = crate::config::get_config();
        // Safety net above every per-candidate timeout in use.
        let http_client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap();

        let assembler = AssemblerService::new(
            http_client.clone(),
            config.max_merged_bytes,
            config.source_cache_capacity,
        );
        let dispatcher = DispatchService::new(http_client);
        let generation = GenerationService::new(
            dispatcher.clone(),
            config.max_batch_size,
            config.batch_attempts,
        );
        let proxy_cache = ResponseCache::new(
            config.proxy_cache_capacity,
            Duration::from_secs(config.proxy_cache_ttl_secs),
        );

        Self {
            assembler,
            dispatcher,
            generation,
            proxy_cache,
        }
    }

    /// The ordered fallback ladder for generation calls: direct endpoint
    /// first, then the proxy fallbacks with the longer budget they need for
    /// their own internal retries.
    pub fn candidate_ladder(&self) -> Vec<EndpointCandidate> {
        let config = crate::config::get_config();
        let mut ladder = vec![EndpointCandidate::direct(
            config.upstream_url.clone(),
            config.direct_timeout(),
        )];
        for url in &config.fallback_urls {
            ladder.push(EndpointCandidate::proxy(url.clone(), config.fallback_timeout()));
        }
        ladder
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
