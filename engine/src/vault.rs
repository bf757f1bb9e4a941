//! SPL token-account decoding for reserve oracles.
//!
//! A pool vault is an ordinary SPL token account; the balance is the `amount`
//! field of its packed layout. Everything above this helper deals only in
//! `Option<u64>` and never sees the account encoding.

use solana_sdk::program_pack::Pack;
use spl_token::state::Account;

/// Balance of a packed SPL token account, `None` when the bytes are not a
/// valid initialized account.
pub fn decode_token_amount(data: &[u8]) -> Option<u64> {
    Account::unpack(data).ok().map(|account| account.amount)
}

#[cfg(test)]
pub(crate) fn pack_token_account(amount: u64) -> Vec<u8> {
    use solana_sdk::pubkey::Pubkey;
    use spl_token::state::AccountState;

    let account = Account {
        mint: Pubkey::new_unique(),
        owner: Pubkey::new_unique(),
        amount,
        state: AccountState::Initialized,
        ..Account::default()
    };
    let mut data = vec![0u8; Account::LEN];
    Account::pack(account, &mut data).expect("fixture account packs");
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_roundtrip() {
        let data = pack_token_account(123_456_789);
        assert_eq!(decode_token_amount(&data), Some(123_456_789));
    }

    #[test]
    fn test_garbage_is_none() {
        assert_eq!(decode_token_amount(&[0u8; 10]), None);
        assert_eq!(decode_token_amount(&vec![0u8; Account::LEN]), None);
    }
}
