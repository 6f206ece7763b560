//! Single-asset vaults: lending markets and plain underlying tracking.

use super::{want, BreakdownError, TokenBalance};
use crate::domain::Vault;

pub(super) fn breakdown(vault: &Vault) -> Result<Vec<TokenBalance>, BreakdownError> {
    Ok(vec![TokenBalance::new(want(vault)?, vault.raw_underlying_balance)])
}
