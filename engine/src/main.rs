use anyhow::Context;
use dotenvy::dotenv;
use engine::{config, enricher, normalizer, report, source, telemetry};
use strategy::engine::{CancelToken, CycleEngine};
use strategy::ports::PoolSource;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    info!("🚀 Triangular arbitrage simulator starting...");

    let bot_config = config::BotConfig::new().context("loading configuration")?;
    let search_config = bot_config.search_config()?;
    let normalizer_config = bot_config.normalizer_config()?;
    let enrich_config = bot_config.enrich_config();

    telemetry::init_metrics();
    if let Some(port) = bot_config.metrics_port {
        telemetry::serve_metrics(port).await;
    }

    // 1. Raw pool records from the cache.
    let pool_source = source::JsonFilePoolSource::new(&bot_config.pool_cache_path);
    let records = pool_source.load().await?;

    // 2. Normalize into canonical pools; bad records are counted, not fatal.
    let (pools, normalize_stats) = normalizer::normalize_all(&records, &normalizer_config);
    telemetry::record_normalize(&normalize_stats);
    info!(
        records = normalize_stats.records_in,
        pools = normalize_stats.pools_out,
        prefiltered = normalize_stats.prefiltered,
        rejected = normalize_stats.errors.values().sum::<u64>(),
        "normalization complete"
    );

    // 3. Enrich reserves. The offline runner has no live oracle or quoter;
    // cached amounts and concentrated state carry the run.
    let enricher = enricher::ReserveEnricher::new(None, None, enrich_config);
    let (pools, enrich_stats) = enricher.enrich(pools).await;
    telemetry::record_enrich(&enrich_stats);

    let ready = enricher::math_ready(pools, false);
    if ready.is_empty() {
        warn!("no math-ready pools after enrichment; nothing to do");
    }

    // 4. Search.
    let engine = CycleEngine::new(search_config, None)?;
    let outcome = engine.search(ready, &CancelToken::new()).await;
    telemetry::record_search(&outcome.stats);

    // 5. Report.
    println!("{}", report::render_table(&outcome, 20));
    println!("{}", report::render_stats(&outcome));
    if let Some(path) = &bot_config.report_json_path {
        let json = serde_json::to_string_pretty(&outcome)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("writing report to {path}"))?;
        info!(path = %path, "report written");
    }

    Ok(())
}
