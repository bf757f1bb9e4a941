//! Reserve-oracle adapters.
//!
//! `AccountReserveOracle` reads balances out of raw account bytes via
//! [`crate::vault::decode_token_amount`]; anything it cannot decode maps to
//! `None`, never an error. `StaticReserveOracle` serves fixtures and tests.

use std::collections::HashMap;

use arb_core::Atomic;
use solana_sdk::pubkey::Pubkey;
use strategy::ports::ReserveOracle;
use tracing::debug;

/// Fixed address → balance map.
#[derive(Default)]
pub struct StaticReserveOracle {
    balances: HashMap<Pubkey, Atomic>,
}

impl StaticReserveOracle {
    pub fn new(balances: HashMap<Pubkey, Atomic>) -> Self {
        Self { balances }
    }
}

#[async_trait::async_trait]
impl ReserveOracle for StaticReserveOracle {
    async fn fetch_vault_balances(&self, addresses: &[Pubkey]) -> HashMap<Pubkey, Option<Atomic>> {
        addresses
            .iter()
            .map(|addr| (*addr, self.balances.get(addr).copied()))
            .collect()
    }
}

/// Decodes SPL token accounts from a provided account-data snapshot. The
/// snapshot shape (address → raw bytes) matches what a batched RPC
/// `getMultipleAccounts` hands back, without this crate doing the fetch.
pub struct AccountReserveOracle {
    accounts: HashMap<Pubkey, Vec<u8>>,
}

impl AccountReserveOracle {
    pub fn new(accounts: HashMap<Pubkey, Vec<u8>>) -> Self {
        Self { accounts }
    }
}

#[async_trait::async_trait]
impl ReserveOracle for AccountReserveOracle {
    async fn fetch_vault_balances(&self, addresses: &[Pubkey]) -> HashMap<Pubkey, Option<Atomic>> {
        addresses
            .iter()
            .map(|addr| {
                let balance = self
                    .accounts
                    .get(addr)
                    .and_then(|data| crate::vault::decode_token_amount(data))
                    .map(Atomic::from);
                if balance.is_none() {
                    debug!(%addr, "vault balance missing or undecodable");
                }
                (*addr, balance)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::pack_token_account;

    #[tokio::test]
    async fn test_account_oracle_decodes_and_misses() {
        let good = Pubkey::new_unique();
        let junk = Pubkey::new_unique();
        let absent = Pubkey::new_unique();

        let mut accounts = HashMap::new();
        accounts.insert(good, pack_token_account(42));
        accounts.insert(junk, vec![1u8; 8]);
        let oracle = AccountReserveOracle::new(accounts);

        let got = oracle.fetch_vault_balances(&[good, junk, absent]).await;
        assert_eq!(got.get(&good), Some(&Some(42)));
        assert_eq!(got.get(&junk), Some(&None));
        assert_eq!(got.get(&absent), Some(&None));
    }
}
