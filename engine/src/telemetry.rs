use axum::{routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Encoder, Opts, Registry, TextEncoder};
use std::net::SocketAddr;

use crate::enricher::EnrichStats;
use crate::normalizer::NormalizeStats;
use strategy::engine::SearchStats;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref POOLS_NORMALIZED_TOTAL: Counter = Counter::new(
        "pools_normalized_total",
        "Raw records normalized into canonical pools"
    ).unwrap();

    pub static ref NORMALIZE_ERRORS: CounterVec = CounterVec::new(
        Opts::new("normalize_errors_total", "Records rejected at normalization"),
        &["kind"]
    ).unwrap();

    pub static ref POOLS_ENRICHED: CounterVec = CounterVec::new(
        Opts::new("pools_enriched_total", "Pools enriched, labelled by reserve source"),
        &["source"]
    ).unwrap();

    pub static ref ENRICH_ERRORS: CounterVec = CounterVec::new(
        Opts::new("enrich_errors_total", "Enrichment degradations"),
        &["kind"]
    ).unwrap();

    pub static ref TRIPLES_EVALUATED_TOTAL: Counter = Counter::new(
        "triples_evaluated_total",
        "Pool triples simulated"
    ).unwrap();

    pub static ref TRIPLE_DISCARDS: CounterVec = CounterVec::new(
        Opts::new("triple_discards_total", "Triples discarded, by reason"),
        &["reason"]
    ).unwrap();

    pub static ref CYCLES_EMITTED_TOTAL: Counter = Counter::new(
        "cycles_emitted_total",
        "Cycle results emitted"
    ).unwrap();

    pub static ref CYCLES_PASSING_TOTAL: Counter = Counter::new(
        "cycles_passing_total",
        "Cycles whose net return met the threshold"
    ).unwrap();
}

pub fn init_metrics() {
    REGISTRY.register(Box::new(POOLS_NORMALIZED_TOTAL.clone())).unwrap();
    REGISTRY.register(Box::new(NORMALIZE_ERRORS.clone())).unwrap();
    REGISTRY.register(Box::new(POOLS_ENRICHED.clone())).unwrap();
    REGISTRY.register(Box::new(ENRICH_ERRORS.clone())).unwrap();
    REGISTRY.register(Box::new(TRIPLES_EVALUATED_TOTAL.clone())).unwrap();
    REGISTRY.register(Box::new(TRIPLE_DISCARDS.clone())).unwrap();
    REGISTRY.register(Box::new(CYCLES_EMITTED_TOTAL.clone())).unwrap();
    REGISTRY.register(Box::new(CYCLES_PASSING_TOTAL.clone())).unwrap();
}

pub fn record_normalize(stats: &NormalizeStats) {
    POOLS_NORMALIZED_TOTAL.inc_by(stats.pools_out as f64);
    for (kind, count) in &stats.errors {
        NORMALIZE_ERRORS.with_label_values(&[*kind]).inc_by(*count as f64);
    }
}

pub fn record_enrich(stats: &EnrichStats) {
    POOLS_ENRICHED.with_label_values(&["vault"]).inc_by(stats.from_vault as f64);
    POOLS_ENRICHED.with_label_values(&["cache"]).inc_by(stats.from_cache as f64);
    POOLS_ENRICHED.with_label_values(&["quoter"]).inc_by(stats.from_quoter as f64);
    for (kind, count) in &stats.errors {
        ENRICH_ERRORS.with_label_values(&[*kind]).inc_by(*count as f64);
    }
}

pub fn record_search(stats: &SearchStats) {
    TRIPLES_EVALUATED_TOTAL.inc_by(stats.triples_evaluated as f64);
    TRIPLE_DISCARDS
        .with_label_values(&["bounds"])
        .inc_by(stats.triples_discarded_bounds as f64);
    for (kind, count) in &stats.swap_errors {
        TRIPLE_DISCARDS.with_label_values(&[*kind]).inc_by(*count as f64);
    }
    CYCLES_EMITTED_TOTAL.inc_by(stats.cycles_emitted as f64);
    CYCLES_PASSING_TOTAL.inc_by(stats.cycles_passing as f64);
}

/// Start the metrics HTTP server.
pub async fn serve_metrics(port: u16) {
    tracing::info!("📊 Prometheus metrics server starting on 0.0.0.0:{}", port);

    let app = Router::new().route(
        "/metrics",
        get(move || async {
            let encoder = TextEncoder::new();
            let metric_families = REGISTRY.gather();
            let mut buffer = Vec::new();
            encoder.encode(&metric_families, &mut buffer).unwrap();
            String::from_utf8(buffer).unwrap()
        }),
    );

    tokio::spawn(async move {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => {
                if let Err(e) = axum::serve(listener, app).await {
                    tracing::error!("❌ Metrics server error: {}", e);
                }
            }
            Err(e) => {
                tracing::error!("❌ Failed to start metrics server on {}: {}", addr, e);
            }
        }
    });
}
