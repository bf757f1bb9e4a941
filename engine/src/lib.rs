pub mod config;
pub mod enricher;
#[cfg(test)]
mod pipeline_tests;
pub mod normalizer;
pub mod oracle;
pub mod report;
pub mod source;
pub mod telemetry;
pub mod vault;

pub use config::BotConfig;
pub use enricher::{EnrichConfig, EnrichError, EnrichStats, ReserveEnricher};
pub use normalizer::{NormalizeError, NormalizeStats, NormalizerConfig};
