//! Pool normalization: free-form cache records into canonical pools.
//!
//! Sources disagree about field names, mint ordering, whether a `reserve_x`
//! field holds a balance or a vault address, and what unit the fee is in.
//! This module is the single place all of that is resolved. The
//! one load-bearing rule: a base58-shaped string is never an amount. A
//! 32-byte address misread as an integer becomes a ~10^30 reserve and a
//! phantom 10^20× arbitrage on top of it.

use std::collections::BTreeMap;
use std::str::FromStr;

use arb_core::constants::{DEFAULT_FEE_FRACTION, USDC_MINT, WSOL_MINT};
use arb_core::pool::{CanonicalPool, PoolKind, ReserveSource};
use arb_core::{Atomic, Decimal};
use serde_json::Value;
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("no pool address field present")]
    MissingAddress,
    #[error("pool address is not base58-shaped: {0}")]
    InvalidAddress(String),
    #[error("mint pair missing or unparsable")]
    MissingMint,
    #[error("decimals out of range")]
    DecimalsOutOfRange,
    #[error("reserve field is neither an amount nor a vault address: {0}")]
    AmbiguousReserve(String),
    #[error("invariant violated: {0}")]
    InvariantViolated(String),
}

impl NormalizeError {
    pub fn kind(&self) -> &'static str {
        match self {
            NormalizeError::MissingAddress => "missing_address",
            NormalizeError::InvalidAddress(_) => "invalid_address",
            NormalizeError::MissingMint => "missing_mint",
            NormalizeError::DecimalsOutOfRange => "decimals_out_of_range",
            NormalizeError::AmbiguousReserve(_) => "ambiguous_reserve",
            NormalizeError::InvariantViolated(_) => "invariant_violated",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    pub min_tvl_usd: Decimal,
    pub min_volume_24h_usd: Decimal,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            min_tvl_usd: Decimal::zero(),
            min_volume_24h_usd: Decimal::zero(),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct NormalizeStats {
    pub records_in: u64,
    pub pools_out: u64,
    pub prefiltered: u64,
    pub errors: BTreeMap<&'static str, u64>,
}

/// Normalize a whole batch, skipping bad records instead of failing the run.
pub fn normalize_all(
    records: &[Value],
    cfg: &NormalizerConfig,
) -> (Vec<CanonicalPool>, NormalizeStats) {
    let mut stats = NormalizeStats {
        records_in: records.len() as u64,
        ..NormalizeStats::default()
    };
    let mut pools = Vec::new();
    for raw in records {
        match normalize_record(raw) {
            Ok(pool) => {
                if below_prefilter(&pool, cfg) {
                    stats.prefiltered += 1;
                    continue;
                }
                pools.push(pool);
            }
            Err(e) => {
                warn!("skipping pool record: {e}");
                *stats.errors.entry(e.kind()).or_insert(0) += 1;
            }
        }
    }
    stats.pools_out = pools.len() as u64;
    (pools, stats)
}

fn below_prefilter(pool: &CanonicalPool, cfg: &NormalizerConfig) -> bool {
    if cfg.min_tvl_usd.is_positive() {
        match &pool.tvl_usd {
            Some(tvl) if *tvl >= cfg.min_tvl_usd => {}
            _ => return true,
        }
    }
    if cfg.min_volume_24h_usd.is_positive() {
        match &pool.volume_24h_usd {
            Some(vol) if *vol >= cfg.min_volume_24h_usd => {}
            _ => return true,
        }
    }
    false
}

pub fn normalize_record(raw: &Value) -> Result<CanonicalPool, NormalizeError> {
    let pool_id = extract_pool_id(raw)?;
    let dex = extract_dex(raw);
    let kind = detect_kind(raw, &dex);

    let sides = extract_mints(raw)?;
    let (mint_x, mint_y) = (sides.mint_x, sides.mint_y);

    let x_side = extract_reserve_side(raw, &sides, Side::X)?;
    let y_side = extract_reserve_side(raw, &sides, Side::Y)?;

    let decimals_x = extract_decimals(raw, &sides, Side::X, &mint_x).unwrap_or(9);
    let decimals_y = extract_decimals(raw, &sides, Side::Y, &mint_y).unwrap_or(6);
    if decimals_x > 18 || decimals_y > 18 {
        return Err(NormalizeError::DecimalsOutOfRange);
    }

    let pool = CanonicalPool {
        pool_id,
        dex,
        kind,
        mint_x,
        mint_y,
        decimals_x,
        decimals_y,
        symbol_x: first_str(raw, &sides.keys(Side::X, SYMBOL_KEYS_XY, SYMBOL_KEYS_BQ))
            .map(str::to_string),
        symbol_y: first_str(raw, &sides.keys(Side::Y, SYMBOL_KEYS_XY, SYMBOL_KEYS_BQ))
            .map(str::to_string),
        fee_fraction: normalize_fee(raw),
        x_reserve: x_side.amount,
        y_reserve: y_side.amount,
        sqrt_price_x64: first_u128(raw, SQRT_PRICE_KEYS),
        liquidity: first_u128(raw, LIQUIDITY_KEYS),
        tick_current: first_i64(raw, TICK_KEYS).and_then(|t| i32::try_from(t).ok()),
        tick_spacing: first_u128(raw, TICK_SPACING_KEYS).and_then(|t| u16::try_from(t).ok()),
        active_bin_id: first_i64(raw, ACTIVE_BIN_KEYS).and_then(|t| i32::try_from(t).ok()),
        bin_step_bps: first_u128(raw, BIN_STEP_KEYS).and_then(|t| u16::try_from(t).ok()),
        vault_x_addr: x_side.vault,
        vault_y_addr: y_side.vault,
        reserve_source: ReserveSource::None,
        reserve_timestamp: None,
        tvl_usd: first_decimal(raw, TVL_KEYS),
        volume_24h_usd: first_decimal(raw, VOLUME_KEYS),
    };

    pool.validate()
        .map_err(|v| NormalizeError::InvariantViolated(v.to_string()))?;
    debug!(pool_id = %pool.pool_id, dex = %pool.dex, "normalized pool");
    Ok(pool)
}

/// Base58-shaped: 32–44 characters decoding to exactly 32 bytes.
pub fn is_base58_address(s: &str) -> bool {
    (32..=44).contains(&s.len()) && Pubkey::from_str(s).is_ok()
}

const POOL_ID_KEYS: &[&str] = &[
    "pool_id",
    "pool_address",
    "address",
    "amm_id",
    "lb_pair",
    "id",
    "pubkey",
];
const DEX_KEYS: &[&str] = &["dex", "source", "protocol", "venue"];
const KIND_KEYS: &[&str] = &["pool_type", "type", "kind", "amm_type", "name", "label"];

const MINT_X_KEYS: &[&str] = &["mint_x", "token_x_mint", "x_mint", "mintX"];
const MINT_Y_KEYS: &[&str] = &["mint_y", "token_y_mint", "y_mint", "mintY"];
const MINT_BASE_KEYS: &[&str] = &["base_mint", "mint_a", "token_a_mint", "baseMint"];
const MINT_QUOTE_KEYS: &[&str] = &["quote_mint", "mint_b", "token_b_mint", "quoteMint"];

const RESERVE_KEYS_XY: [&[&str]; 2] = [
    &["reserve_x", "x_reserve", "reserve_x_amount", "token_x_amount", "x_vault", "vault_x"],
    &["reserve_y", "y_reserve", "reserve_y_amount", "token_y_amount", "y_vault", "vault_y"],
];
const RESERVE_KEYS_BQ: [&[&str]; 2] = [
    &["base_reserve", "reserve_a", "base_amount", "base_vault", "pool_coin_token_account"],
    &["quote_reserve", "reserve_b", "quote_amount", "quote_vault", "pool_pc_token_account"],
];

const DECIMAL_KEYS_XY: [&[&str]; 2] = [
    &["decimals_x", "x_decimals", "token_x_decimals"],
    &["decimals_y", "y_decimals", "token_y_decimals"],
];
const DECIMAL_KEYS_BQ: [&[&str]; 2] = [
    &["base_decimals", "decimals_a"],
    &["quote_decimals", "decimals_b"],
];

const SYMBOL_KEYS_XY: [&[&str]; 2] = [&["symbol_x", "x_symbol"], &["symbol_y", "y_symbol"]];
const SYMBOL_KEYS_BQ: [&[&str]; 2] = [&["base_symbol"], &["quote_symbol"]];

const FEE_KEYS: &[&str] = &["fee_fraction", "fee_rate", "fee", "fee_pct", "fee_percent", "trade_fee"];
const METEORA_FEE_KEY: &str = "base_fee_percentage";

const SQRT_PRICE_KEYS: &[&str] = &["sqrt_price_x64", "sqrt_price", "sqrtPriceX64", "current_sqrt_price"];
const LIQUIDITY_KEYS: &[&str] = &["liquidity", "active_liquidity"];
const TICK_KEYS: &[&str] = &["tick_current", "current_tick", "tick_current_index"];
const TICK_SPACING_KEYS: &[&str] = &["tick_spacing", "tickSpacing"];
const ACTIVE_BIN_KEYS: &[&str] = &["active_bin_id", "active_id", "activeBin"];
const BIN_STEP_KEYS: &[&str] = &["bin_step", "bin_step_bps", "binStep"];
const TVL_KEYS: &[&str] = &["tvl", "tvl_usd", "liquidity_usd"];
const VOLUME_KEYS: &[&str] = &["volume_24h", "volume24h", "day_volume"];

fn extract_pool_id(raw: &Value) -> Result<String, NormalizeError> {
    let s = first_str(raw, POOL_ID_KEYS).ok_or(NormalizeError::MissingAddress)?;
    if !is_base58_address(s) {
        return Err(NormalizeError::InvalidAddress(s.to_string()));
    }
    Ok(s.to_string())
}

fn extract_dex(raw: &Value) -> String {
    first_str(raw, DEX_KEYS)
        .map(|s| s.to_lowercase())
        .unwrap_or_else(|| "unknown".to_string())
}

fn detect_kind(raw: &Value, dex: &str) -> PoolKind {
    let mut haystack = String::new();
    for key in KIND_KEYS {
        if let Some(s) = raw.get(*key).and_then(Value::as_str) {
            haystack.push_str(&s.to_lowercase());
            haystack.push(' ');
        }
    }
    if haystack.contains("whirlpool") {
        return PoolKind::Whirlpool;
    }
    if haystack.contains("dlmm") || haystack.contains("bin") {
        return PoolKind::Dlmm;
    }
    if haystack.contains("clmm") || haystack.contains("concentrated") {
        return PoolKind::Clmm;
    }
    if haystack.contains("cpmm") || haystack.contains("amm") || haystack.contains("constant") {
        return PoolKind::Cpmm;
    }
    match dex {
        "orca" => PoolKind::Whirlpool,
        "meteora" => PoolKind::Dlmm,
        _ => PoolKind::Cpmm,
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Side {
    X,
    Y,
}

struct MintSides {
    mint_x: Pubkey,
    mint_y: Pubkey,
    /// True when the base/quote-keyed fields are reversed relative to the
    /// x/y mint pair and must be read into the opposite slots.
    base_quote_swapped: bool,
}

impl MintSides {
    /// Key lists to probe for `side`, x/y-keyed first, base/quote-keyed
    /// remapped when the schemes disagree on order.
    fn keys(
        &self,
        side: Side,
        xy: [&'static [&'static str]; 2],
        bq: [&'static [&'static str]; 2],
    ) -> Vec<&'static str> {
        let idx = match side {
            Side::X => 0,
            Side::Y => 1,
        };
        let bq_idx = if self.base_quote_swapped { 1 - idx } else { idx };
        let mut keys: Vec<&'static str> = xy[idx].to_vec();
        keys.extend_from_slice(bq[bq_idx]);
        keys
    }
}

fn extract_mints(raw: &Value) -> Result<MintSides, NormalizeError> {
    let xy = (
        first_str(raw, MINT_X_KEYS).and_then(parse_pubkey),
        first_str(raw, MINT_Y_KEYS).and_then(parse_pubkey),
    );
    let bq = (
        first_str(raw, MINT_BASE_KEYS).and_then(parse_pubkey),
        first_str(raw, MINT_QUOTE_KEYS).and_then(parse_pubkey),
    );

    match (xy, bq) {
        ((Some(x), Some(y)), (Some(b), Some(q))) => Ok(MintSides {
            mint_x: x,
            mint_y: y,
            base_quote_swapped: b == y && q == x,
        }),
        ((Some(x), Some(y)), _) => Ok(MintSides {
            mint_x: x,
            mint_y: y,
            base_quote_swapped: false,
        }),
        (_, (Some(b), Some(q))) => Ok(MintSides {
            mint_x: b,
            mint_y: q,
            base_quote_swapped: false,
        }),
        _ => Err(NormalizeError::MissingMint),
    }
}

fn parse_pubkey(s: &str) -> Option<Pubkey> {
    Pubkey::from_str(s).ok()
}

struct ReserveField {
    amount: Option<Atomic>,
    vault: Option<Pubkey>,
}

/// Walk every reserve-ish field for one side and classify each value. The
/// first integer fills the amount slot, the first base58 string the vault
/// slot; a field that is neither is a hard per-pool error.
fn extract_reserve_side(
    raw: &Value,
    sides: &MintSides,
    side: Side,
) -> Result<ReserveField, NormalizeError> {
    let mut out = ReserveField {
        amount: None,
        vault: None,
    };
    for key in sides.keys(side, RESERVE_KEYS_XY, RESERVE_KEYS_BQ) {
        let Some(value) = raw.get(key) else { continue };
        match classify_reserve_value(value)? {
            Some(Classified::Amount(a)) => {
                if out.amount.is_none() {
                    out.amount = Some(a);
                }
            }
            Some(Classified::Vault(v)) => {
                if out.vault.is_none() {
                    out.vault = Some(v);
                }
            }
            None => {}
        }
    }
    Ok(out)
}

enum Classified {
    Amount(Atomic),
    Vault(Pubkey),
}

fn classify_reserve_value(value: &Value) -> Result<Option<Classified>, NormalizeError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => {
            // A base58-shaped string is always an address, whatever the
            // field was called.
            if (32..=44).contains(&s.len()) {
                if let Ok(vault) = Pubkey::from_str(s) {
                    return Ok(Some(Classified::Vault(vault)));
                }
            }
            match s.parse::<u128>() {
                Ok(a) => Ok(Some(Classified::Amount(a))),
                Err(_) => Err(NormalizeError::AmbiguousReserve(s.clone())),
            }
        }
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Ok(Some(Classified::Amount(u as u128)))
            } else {
                Err(NormalizeError::AmbiguousReserve(n.to_string()))
            }
        }
        other => Err(NormalizeError::AmbiguousReserve(other.to_string())),
    }
}

fn extract_decimals(raw: &Value, sides: &MintSides, side: Side, mint: &Pubkey) -> Option<u8> {
    // Well-known mints override whatever the record claims.
    if *mint == WSOL_MINT {
        return Some(arb_core::constants::WSOL_DECIMALS);
    }
    if *mint == USDC_MINT {
        return Some(arb_core::constants::USDC_DECIMALS);
    }
    for key in sides.keys(side, DECIMAL_KEYS_XY, DECIMAL_KEYS_BQ) {
        if let Some(d) = raw.get(key).and_then(Value::as_u64) {
            return u8::try_from(d).ok().or(Some(u8::MAX));
        }
    }
    None
}

/// Fee inputs arrive as fractions, percents or basis points. The value's
/// magnitude decides:
///   (0, 0.1)      already a fraction
///   [0.1, 100]    percent, divide by 100
/// Meteora's `base_fee_percentage`, when it is the only fee field, is in
/// basis points. Anything else falls back to the default.
fn normalize_fee(raw: &Value) -> Decimal {
    let default: Decimal = DEFAULT_FEE_FRACTION.parse().expect("literal");
    let tenth: Decimal = "0.1".parse().expect("literal");
    let hundred = Decimal::from_i64(100);

    if let Some(v) = FEE_KEYS.iter().find_map(|k| value_as_decimal(raw.get(*k)?)) {
        if v.is_zero() {
            return Decimal::zero();
        }
        if v.is_positive() && v < tenth {
            return v;
        }
        if v >= tenth && v <= hundred {
            return v.checked_div(&hundred).unwrap_or(default);
        }
        return default;
    }

    if let Some(bps) = raw.get(METEORA_FEE_KEY).and_then(value_as_decimal) {
        let scale = Decimal::from_i64(10_000);
        if let Ok(frac) = bps.checked_div(&scale) {
            if !frac.is_negative() && frac < Decimal::one() {
                return frac;
            }
        }
    }
    default
}

fn value_as_decimal(v: &Value) -> Option<Decimal> {
    match v {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.to_string().parse().ok(),
        _ => None,
    }
}

fn first_str<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| raw.get(*k).and_then(Value::as_str))
}

fn first_u128(raw: &Value, keys: &[&str]) -> Option<u128> {
    keys.iter().find_map(|k| match raw.get(*k)? {
        Value::String(s) => s.parse::<u128>().ok(),
        Value::Number(n) => n.as_u64().map(|u| u as u128),
        _ => None,
    })
}

fn first_i64(raw: &Value, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|k| match raw.get(*k)? {
        Value::String(s) => s.parse::<i64>().ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
    })
}

fn first_decimal(raw: &Value, keys: &[&str]) -> Option<Decimal> {
    keys.iter().find_map(|k| value_as_decimal(raw.get(*k)?))
}
