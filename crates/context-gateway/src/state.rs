//! Shared handler state for the gateway's axum router.

use std::sync::Arc;

use context_core::anchor::AnchorClient;
use context_core::config::AppConfig;
use context_core::cache::ContextCache;
use context_core::summary::{DebugEventRing, SummaryStore, TurnSink};

/// Everything an axum handler needs, threaded through as `State`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub cache: Arc<ContextCache>,
    pub anchor: Arc<AnchorClient>,
    pub summaries: Arc<dyn SummaryStore>,
    pub turns: Arc<dyn TurnSink>,
    pub debug_ring: Arc<DebugEventRing>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        summaries: Arc<dyn SummaryStore>,
        turns: Arc<dyn TurnSink>,
    ) -> Self {
        let anchor = AnchorClient::new(
            config.dify_base_url.clone(),
            config.dify_workflow_run_url.clone(),
            config.dify_api_key.clone(),
            config.dify_workflow_id_anchor.clone(),
            config.dify_timeout_secs,
        );
        let cache = ContextCache::new(config.gateway_ctx_cache_ttl_secs, config.gateway_ctx_cache_max);
        Self {
            cache: Arc::new(cache),
            anchor: Arc::new(anchor),
            debug_ring: Arc::new(DebugEventRing::new(200)),
            http: reqwest::Client::new(),
            config,
            summaries,
            turns,
        }
    }
}
