//! Prometheus metrics for the game host.
//!
//! Search throughput, provider fallbacks and session lifecycle counters.
//! `connect4 arena --metrics` prints the text exposition.

use lazy_static::lazy_static;
use prometheus::core::Collector;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Once;
use tracing::warn;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ========== Search Metrics ==========

    /// Total MCTS searches completed
    pub static ref SEARCHES_RUN: IntCounter = IntCounter::with_opts(
        Opts::new("connect4_searches_total", "Total MCTS searches completed")
    ).unwrap();

    /// Total simulations across all searches
    pub static ref SIMULATIONS_RUN: IntCounter = IntCounter::with_opts(
        Opts::new("connect4_simulations_total", "Total MCTS simulations run")
    ).unwrap();

    /// Wall-clock time of one search
    pub static ref SEARCH_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new("connect4_search_seconds", "Time for one MCTS search")
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0])
    ).unwrap();

    // ========== Provider Metrics ==========

    /// Random moves played because a provider failed or answered illegally
    pub static ref PROVIDER_FALLBACKS: IntCounterVec = IntCounterVec::new(
        Opts::new("connect4_provider_fallbacks_total", "Random fallback moves by reason"),
        &["reason"]
    ).unwrap();

    // ========== Session Metrics ==========

    /// Total game sessions created
    pub static ref SESSIONS_CREATED: IntCounter = IntCounter::with_opts(
        Opts::new("connect4_sessions_created_total", "Total game sessions created")
    ).unwrap();

    /// Sessions currently held by the repository
    pub static ref SESSIONS_ACTIVE: IntGauge = IntGauge::with_opts(
        Opts::new("connect4_sessions_active", "Game sessions currently held")
    ).unwrap();

    /// Sessions removed from the repository
    pub static ref SESSIONS_EVICTED: IntCounter = IntCounter::with_opts(
        Opts::new("connect4_sessions_evicted_total", "Game sessions evicted")
    ).unwrap();

    /// Games that reached a win or a draw
    pub static ref GAMES_COMPLETED: IntCounterVec = IntCounterVec::new(
        Opts::new("connect4_games_completed_total", "Games completed by result"),
        &["result"]
    ).unwrap();

    /// Moves applied to hosted games, human and bot
    pub static ref MOVES_PLAYED: IntCounter = IntCounter::with_opts(
        Opts::new("connect4_moves_played_total", "Total moves played across all games")
    ).unwrap();
}

static INIT: Once = Once::new();

/// Register every metric with [`REGISTRY`]. Idempotent.
pub fn init_metrics() {
    INIT.call_once(|| {
        let collectors: Vec<Box<dyn Collector>> = vec![
            Box::new(SEARCHES_RUN.clone()),
            Box::new(SIMULATIONS_RUN.clone()),
            Box::new(SEARCH_SECONDS.clone()),
            Box::new(PROVIDER_FALLBACKS.clone()),
            Box::new(SESSIONS_CREATED.clone()),
            Box::new(SESSIONS_ACTIVE.clone()),
            Box::new(SESSIONS_EVICTED.clone()),
            Box::new(GAMES_COMPLETED.clone()),
            Box::new(MOVES_PLAYED.clone()),
        ];
        for collector in collectors {
            if let Err(e) = REGISTRY.register(collector) {
                warn!("Failed to register metric: {}", e);
            }
        }
    });
}

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
