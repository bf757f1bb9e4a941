//! Ordered-pair pool index.
//!
//! Every pool contributes two entries, `(mint_x, mint_y)` and
//! `(mint_y, mint_x)`, so edge lookups never care about stored orientation.
//! Built once per search and read-only afterwards; all lists are sorted so
//! iteration order is reproducible.

use std::collections::HashMap;

use arb_core::pool::CanonicalPool;
use solana_sdk::pubkey::Pubkey;

pub struct PairIndex {
    pools: HashMap<String, CanonicalPool>,
    edges: HashMap<(Pubkey, Pubkey), Vec<String>>,
}

impl PairIndex {
    pub fn build(pools: Vec<CanonicalPool>) -> Self {
        let mut by_id: HashMap<String, CanonicalPool> = HashMap::new();
        let mut edges: HashMap<(Pubkey, Pubkey), Vec<String>> = HashMap::new();

        for pool in pools {
            let id = pool.pool_id.clone();
            edges
                .entry((pool.mint_x, pool.mint_y))
                .or_default()
                .push(id.clone());
            edges
                .entry((pool.mint_y, pool.mint_x))
                .or_default()
                .push(id.clone());
            by_id.insert(id, pool);
        }
        for list in edges.values_mut() {
            list.sort();
            list.dedup();
        }

        Self { pools: by_id, edges }
    }

    pub fn pool(&self, pool_id: &str) -> Option<&CanonicalPool> {
        self.pools.get(pool_id)
    }

    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    /// Pool ids tradeable on the ordered pair, sorted by id.
    pub fn pools_for(&self, from: &Pubkey, to: &Pubkey) -> &[String] {
        self.edges
            .get(&(*from, *to))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Counterparty mints reachable from `mint`, sorted by key bytes.
    pub fn neighbors_of(&self, mint: &Pubkey) -> Vec<Pubkey> {
        let mut out: Vec<Pubkey> = self
            .edges
            .keys()
            .filter(|(from, _)| from == mint)
            .map(|(_, to)| *to)
            .collect();
        out.sort();
        out.dedup();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swap::tests::cpmm_pool;
    use arb_core::constants::{USDC_MINT, WSOL_MINT};

    #[test]
    fn test_both_directions_indexed() {
        let pool = cpmm_pool(
            "PoolA111111111111111111111111111111111111111",
            WSOL_MINT,
            USDC_MINT,
            9,
            6,
            1_000,
            2_000,
            "0.0025",
        );
        let idx = PairIndex::build(vec![pool]);
        assert_eq!(idx.pools_for(&WSOL_MINT, &USDC_MINT).len(), 1);
        assert_eq!(idx.pools_for(&USDC_MINT, &WSOL_MINT).len(), 1);
        assert!(idx.pools_for(&USDC_MINT, &Pubkey::new_unique()).is_empty());
    }

    #[test]
    fn test_edge_lists_sorted() {
        let a = cpmm_pool(
            "Zz111111111111111111111111111111111111111111",
            WSOL_MINT,
            USDC_MINT,
            9,
            6,
            1_000,
            2_000,
            "0.0025",
        );
        let b = cpmm_pool(
            "Aa111111111111111111111111111111111111111111",
            WSOL_MINT,
            USDC_MINT,
            9,
            6,
            3_000,
            6_000,
            "0.0025",
        );
        let idx = PairIndex::build(vec![a, b]);
        let ids = idx.pools_for(&WSOL_MINT, &USDC_MINT);
        assert_eq!(ids.len(), 2);
        assert!(ids[0] < ids[1]);
    }

    #[test]
    fn test_neighbors_sorted_and_deduped() {
        let other = Pubkey::new_unique();
        let p1 = cpmm_pool(
            "P1111111111111111111111111111111111111111111",
            WSOL_MINT,
            USDC_MINT,
            9,
            6,
            1_000,
            2_000,
            "0.0025",
        );
        let mut p2 = cpmm_pool(
            "P2111111111111111111111111111111111111111111",
            WSOL_MINT,
            other,
            9,
            6,
            1_000,
            2_000,
            "0.0025",
        );
        p2.dex = "orca".to_string();
        let idx = PairIndex::build(vec![p1, p2]);
        let n = idx.neighbors_of(&WSOL_MINT);
        assert_eq!(n.len(), 2);
        assert!(n.windows(2).all(|w| w[0] < w[1]));
    }
}
