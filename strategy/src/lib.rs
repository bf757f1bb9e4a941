pub mod config;
pub mod engine;
pub mod pair_index;
pub mod ports;
pub mod swap;

pub use config::{ConfigError, SearchConfig};
pub use engine::{CycleEngine, CycleResult, SearchOutcome, SearchStats};
pub use pair_index::PairIndex;
pub use ports::{PoolSource, PoolStateDelta, QuoterQuote, RawPoolRecord, ReserveOracle, SwapQuoter};
pub use swap::{CostBreakdown, LegSource, SwapContext, SwapError, SwapLegResult};
