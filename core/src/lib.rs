pub mod clmm;
pub mod cpmm;
pub mod decimal;
pub mod dlmm;
pub mod pool;
pub mod units;

pub use decimal::{ArithmeticError, Decimal};
pub use pool::{CanonicalPool, PoolKind, ReserveSource};
pub use units::{atomic_to_human, human_to_atomic, Atomic, UnitError};

pub mod constants {
    use solana_sdk::pubkey;
    use solana_sdk::pubkey::Pubkey;

    /// Wrapped SOL mint (9 decimals).
    pub const WSOL_MINT: Pubkey = pubkey!("So11111111111111111111111111111111111111112");

    /// USDC mint (6 decimals).
    pub const USDC_MINT: Pubkey = pubkey!("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v");

    pub const WSOL_DECIMALS: u8 = 9;
    pub const USDC_DECIMALS: u8 = 6;

    /// Per-swap fee fraction assumed when a source reports nothing usable.
    pub const DEFAULT_FEE_FRACTION: &str = "0.003";
}
