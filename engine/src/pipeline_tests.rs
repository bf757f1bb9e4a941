#[cfg(test)]
mod pipeline_tests {
    // Full offline pipeline: raw records → normalize → enrich → search.

    use std::collections::HashMap;
    use std::sync::Arc;

    use arb_core::constants::{USDC_MINT, WSOL_MINT};
    use serde_json::json;
    use solana_sdk::pubkey::Pubkey;
    use strategy::engine::{CancelToken, CycleEngine};
    use strategy::SearchConfig;

    use crate::enricher::{math_ready, EnrichConfig, ReserveEnricher};
    use crate::normalizer::{normalize_all, NormalizerConfig};
    use crate::oracle::StaticReserveOracle;

    fn eth_mint() -> Pubkey {
        Pubkey::new_from_array([7u8; 32])
    }

    #[tokio::test]
    async fn test_offline_run_finds_the_triangle() {
        let vault_x = Pubkey::new_unique();
        let vault_y = Pubkey::new_unique();

        let records = vec![
            // Anchor pool: reserves arrive only through the oracle; the
            // reserve fields hold vault addresses, not balances.
            json!({
                "pool_id": "58oQChGsNrtmhaJSRph38tB3BwpL66F42FMa86Fv3Gry",
                "dex": "raydium",
                "pool_type": "amm",
                "mint_x": WSOL_MINT.to_string(),
                "mint_y": USDC_MINT.to_string(),
                "reserve_x": vault_x.to_string(),
                "reserve_y": vault_y.to_string(),
                "fee": 0.25,
            }),
            // Cached amounts, base/quote vocabulary.
            json!({
                "pool_id": "7XawhbbxtsRcQA8KTkHT9f9nc6d69UeMvdxS1ioL69hY",
                "dex": "raydium",
                "pool_type": "amm",
                "base_mint": USDC_MINT.to_string(),
                "quote_mint": eth_mint().to_string(),
                "base_reserve": "1000000000000",
                "quote_reserve": "40000000000",
                "quote_decimals": 8,
                "fee": 0.25,
            }),
            json!({
                "pool_id": "AVs91fXYvQJdufSs6S6S8kSEbd67QpUtyUfV8vUjJsc",
                "dex": "raydium",
                "pool_type": "amm",
                "mint_x": eth_mint().to_string(),
                "mint_y": WSOL_MINT.to_string(),
                "decimals_x": 8,
                "reserve_x": "100000000000",
                "reserve_y": "51000000000000",
                "fee": 0.25,
            }),
            // A concentrated pool with no state: unusable without a quoter.
            json!({
                "pool_id": "DZ6ayPbaB9p8Kx7tH5rTMGidMjgjM8HhnRizAnV8hX5P",
                "dex": "orca",
                "pool_type": "whirlpool",
                "mint_x": WSOL_MINT.to_string(),
                "mint_y": USDC_MINT.to_string(),
            }),
            // Garbage record: must be counted, not fatal.
            json!({ "pool_id": "bogus" }),
        ];

        let (pools, nstats) = normalize_all(&records, &NormalizerConfig::default());
        assert_eq!(pools.len(), 4);
        assert_eq!(nstats.errors.get("invalid_address"), Some(&1));

        let mut balances = HashMap::new();
        balances.insert(vault_x, 10_000_000_000_000u128); // 10_000 SOL
        balances.insert(vault_y, 500_000_000_000u128); // 500_000 USDC
        let oracle = Arc::new(StaticReserveOracle::new(balances));
        let enricher = ReserveEnricher::new(Some(oracle), None, EnrichConfig::default());
        let (pools, estats) = enricher.enrich(pools).await;
        assert_eq!(estats.from_vault, 1);
        assert_eq!(estats.from_cache, 2);
        assert_eq!(estats.no_source, 1);

        let ready = math_ready(pools, false);
        assert_eq!(ready.len(), 3);

        let cfg = SearchConfig {
            pivot_token: eth_mint(),
            input_atomic: 10_000_000_000, // 10 SOL
            ..SearchConfig::default()
        };
        let engine = CycleEngine::new(cfg, None).unwrap();
        let outcome = engine.search(ready, &CancelToken::new()).await;

        assert_eq!(outcome.cycles.len(), 1);
        let cycle = &outcome.cycles[0];
        assert!(cycle.passes, "net {} should pass", cycle.net_after_costs_pct);
        assert!(cycle.raw_profit_pct > "1".parse().unwrap());
        assert_eq!(cycle.legs[0].source, strategy::swap::LegSource::Oracle);
        assert_eq!(cycle.legs[1].source, strategy::swap::LegSource::Math);
    }
}
