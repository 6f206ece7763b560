//! Share transfers of vaults, boosts and reward pools.

use super::{Engine, EngineError};
use crate::db::UnitOfWork;
use crate::domain::BlockRef;
use alloy_primitives::{Address, U256};
use tracing::debug;

impl Engine {
    /// `token` is the contract that emitted the transfer: a vault, or a
    /// boost or reward pool whose receipts represent staked vault shares.
    pub(super) async fn handle_transfer(
        &self,
        uow: &mut UnitOfWork,
        token: Address,
        from: Address,
        to: Address,
        value: U256,
        block: BlockRef,
    ) -> Result<(), EngineError> {
        let network = &self.settings.network;
        let Some(config) = self
            .registry
            .vault(network, token)
            .or_else(|| self.registry.vault_for_staking_address(network, token))
        else {
            debug!(token = %token, "transfer of untracked token ignored");
            return Ok(());
        };

        if from == to {
            debug!(token = %token, account = %from, "self transfer ignored");
            return Ok(());
        }
        if value.is_zero() {
            debug!(token = %token, "zero value transfer ignored");
            return Ok(());
        }
        // shares moving into or out of staking are accounted for by the
        // staking contract's own receipt transfer
        if self.is_staking_address(from) || self.is_staking_address(to) {
            debug!(token = %token, from = %from, to = %to, "staking transfer ignored");
            return Ok(());
        }
        let Some(mut vault) = self.running_vault(uow, config.address).await? else {
            return Ok(());
        };

        let investors: Vec<Address> = [from, to]
            .into_iter()
            .filter(|account| *account != self.settings.mint_address)
            .collect();

        let tokens = self.refresh_vault_state(uow, &mut vault, block).await?;
        if !investors.is_empty() {
            self.refresh_positions(uow, &vault, config, &investors, &tokens, block)
                .await?;
        }
        self.refresh_breakdown(uow, &vault, config, block).await
    }
}
