//! Token breakdown refresh: vault-level items, per-position time-weighted
//! balances and investor snapshots.

use super::tokens::token;
use super::{Engine, EngineError};
use crate::db::UnitOfWork;
use crate::domain::breakdown::round_to_period;
use crate::domain::{
    BlockRef, Decimal, InvestorPosition, InvestorPositionBalanceBreakdown,
    InvestorTokenBalanceSnapshot, SnapshotCursor, Token, Vault, VaultBalanceBreakdownItem,
};
use crate::platform::{self, proportional, TokenBalance};
use crate::registry::VaultConfig;
use alloy_primitives::{Address, U256};
use tracing::debug;

/// Tracking dimensions active for one vault at one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Tracking {
    vault: bool,
    investor: bool,
    snapshots: bool,
}

impl Tracking {
    fn any(&self) -> bool {
        self.vault || self.investor || self.snapshots
    }
}

impl Engine {
    pub(super) async fn refresh_breakdown(
        &self,
        uow: &mut UnitOfWork,
        vault: &Vault,
        config: &VaultConfig,
        block: BlockRef,
    ) -> Result<(), EngineError> {
        let tracking = Tracking {
            vault: config.track_vault_breakdown,
            investor: config.flags.investor_breakdown_active(block.number),
            snapshots: config.flags.snapshots_active(block.number)
                && !self.settings.snapshot_periods.is_empty(),
        };
        if !tracking.any() {
            return Ok(());
        }

        let mut balances = platform::breakdown(self.reader.as_ref(), vault, block.number).await?;
        for (address, raw) in [
            (vault.shares_token, vault.raw_shares_total_supply),
            (vault.underlying_token, vault.raw_underlying_balance),
        ] {
            if !balances.iter().any(|b| b.token == address) {
                balances.push(TokenBalance::new(address, raw));
            }
        }

        let addresses: Vec<Address> = balances.iter().map(|b| b.token).collect();
        let tokens = self.ensure_tokens(uow, &addresses, block).await?;

        if tracking.vault {
            for balance in &balances {
                let decimals = token(&tokens, balance.token)?.decimals;
                let id = VaultBalanceBreakdownItem::id_for(vault.address, balance.token);
                let mut item = uow
                    .load::<VaultBalanceBreakdownItem>(&id)
                    .await?
                    .unwrap_or_else(|| VaultBalanceBreakdownItem::new(vault.address, balance.token));
                item.raw_balance = balance.raw_balance;
                item.balance = Decimal::from_raw(balance.raw_balance, decimals)?;
                item.last_update_block = block.number;
                item.last_update_timestamp = block.timestamp;
                uow.save(&item)?;
            }
        }

        if tracking.investor || tracking.snapshots {
            let positions = uow
                .load_by_prefix::<InvestorPosition>(&InvestorPosition::vault_prefix(vault.address))
                .await?;
            for position in &positions {
                for balance in &balances {
                    let raw = proportional(
                        position.raw_shares_balance,
                        balance.raw_balance,
                        vault.raw_shares_total_supply,
                    )?;
                    let meta = token(&tokens, balance.token)?;
                    if tracking.investor {
                        self.update_position_breakdown(uow, position, meta, raw, block)
                            .await?;
                    }
                    if tracking.snapshots {
                        self.update_snapshots(uow, vault.address, position.investor, meta, raw, block)
                            .await?;
                    }
                }
            }
            debug!(vault = %vault.address, positions = positions.len(), tokens = balances.len(), "breakdown refreshed");
        }
        Ok(())
    }

    async fn update_position_breakdown(
        &self,
        uow: &mut UnitOfWork,
        position: &InvestorPosition,
        token: &Token,
        raw_balance: U256,
        block: BlockRef,
    ) -> Result<(), EngineError> {
        let id = InvestorPositionBalanceBreakdown::id_for(position.vault, position.investor, token.address);
        let mut breakdown = uow
            .load::<InvestorPositionBalanceBreakdown>(&id)
            .await?
            .unwrap_or_else(|| {
                InvestorPositionBalanceBreakdown::new(position.vault, position.investor, token.address)
            });
        if breakdown.update(raw_balance, token.decimals, block)? {
            uow.save(&breakdown)?;
        }
        Ok(())
    }

    async fn update_snapshots(
        &self,
        uow: &mut UnitOfWork,
        vault: Address,
        investor: Address,
        token: &Token,
        raw_balance: U256,
        block: BlockRef,
    ) -> Result<(), EngineError> {
        for period in &self.settings.snapshot_periods {
            let rounded = round_to_period(block.timestamp, *period);
            let id = InvestorTokenBalanceSnapshot::id_for(investor, token.address, *period, rounded);
            let mut snapshot = match uow.load::<InvestorTokenBalanceSnapshot>(&id).await? {
                Some(snapshot) => snapshot,
                None => {
                    let previous = self
                        .latest_snapshot(uow, investor, token.address, *period, rounded)
                        .await?;
                    let opened = InvestorTokenBalanceSnapshot::open(
                        investor,
                        token.address,
                        *period,
                        block,
                        previous.as_ref(),
                    );
                    uow.save(&SnapshotCursor::of(&opened))?;
                    opened
                }
            };
            snapshot.record(vault, raw_balance, token.decimals, block)?;
            uow.save(&snapshot)?;
        }
        Ok(())
    }

    /// Most recent bucket strictly before `rounded`, found through the
    /// series cursor.
    async fn latest_snapshot(
        &self,
        uow: &UnitOfWork,
        investor: Address,
        token: Address,
        period: u64,
        rounded: u64,
    ) -> Result<Option<InvestorTokenBalanceSnapshot>, EngineError> {
        let Some(cursor) = uow
            .load::<SnapshotCursor>(&SnapshotCursor::id_for(investor, token, period))
            .await?
        else {
            return Ok(None);
        };
        if cursor.rounded_timestamp >= rounded {
            return Ok(None);
        }
        Ok(uow
            .load::<InvestorTokenBalanceSnapshot>(&cursor.snapshot_id())
            .await?)
    }
}
