//! Token breakdown entities: vault-level items, per-position time-weighted
//! balances and period-bucketed investor snapshots.

use super::{BlockRef, Decimal, Entity, EntityId, MathError};
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// How much of `token` the vault's locked value is made of, right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultBalanceBreakdownItem {
    pub vault: Address,
    pub token: Address,
    pub raw_balance: U256,
    pub balance: Decimal,
    pub last_update_block: u64,
    pub last_update_timestamp: u64,
}

impl VaultBalanceBreakdownItem {
    pub fn new(vault: Address, token: Address) -> Self {
        VaultBalanceBreakdownItem {
            vault,
            token,
            raw_balance: U256::ZERO,
            balance: Decimal::zero(),
            last_update_block: 0,
            last_update_timestamp: 0,
        }
    }

    pub fn id_for(vault: Address, token: Address) -> EntityId {
        EntityId::address(vault).with_address(token)
    }
}

impl Entity for VaultBalanceBreakdownItem {
    const KIND: &'static str = "vault_breakdown_item";

    fn id(&self) -> EntityId {
        Self::id_for(self.vault, self.token)
    }
}

/// An investor position's share of one breakdown token, with the integral of
/// that balance over time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestorPositionBalanceBreakdown {
    pub vault: Address,
    pub investor: Address,
    pub token: Address,
    pub raw_balance: U256,
    pub balance: Decimal,
    pub raw_time_weighted_balance: U256,
    pub time_weighted_balance: Decimal,
    pub last_update_block: u64,
    pub last_update_timestamp: u64,
}

impl InvestorPositionBalanceBreakdown {
    pub fn new(vault: Address, investor: Address, token: Address) -> Self {
        InvestorPositionBalanceBreakdown {
            vault,
            investor,
            token,
            raw_balance: U256::ZERO,
            balance: Decimal::zero(),
            raw_time_weighted_balance: U256::ZERO,
            time_weighted_balance: Decimal::zero(),
            last_update_block: 0,
            last_update_timestamp: 0,
        }
    }

    pub fn id_for(vault: Address, investor: Address, token: Address) -> EntityId {
        EntityId::address(vault)
            .with_address(investor)
            .with_address(token)
    }

    /// Move to `raw_balance` at `block`.
    ///
    /// The balance held before this call is integrated over the seconds
    /// since the last update (left Riemann sum). Returns `false` and leaves
    /// the record untouched when neither the balance nor the accumulator
    /// changes.
    pub fn update(
        &mut self,
        raw_balance: U256,
        decimals: u8,
        block: BlockRef,
    ) -> Result<bool, MathError> {
        let elapsed = block.timestamp.saturating_sub(self.last_update_timestamp);
        let mut accumulated = self.raw_time_weighted_balance;
        if elapsed > 0 && !self.raw_balance.is_zero() {
            let contribution = self
                .raw_balance
                .checked_mul(U256::from(elapsed))
                .ok_or(MathError::IntegerOverflow("time-weighted contribution"))?;
            accumulated = accumulated
                .checked_add(contribution)
                .ok_or(MathError::IntegerOverflow("time-weighted accumulator"))?;
        }

        if raw_balance == self.raw_balance && accumulated == self.raw_time_weighted_balance {
            return Ok(false);
        }

        self.raw_time_weighted_balance = accumulated;
        self.time_weighted_balance = Decimal::from_raw(accumulated, decimals)?;
        self.raw_balance = raw_balance;
        self.balance = Decimal::from_raw(raw_balance, decimals)?;
        self.last_update_block = block.number;
        self.last_update_timestamp = block.timestamp;
        Ok(true)
    }
}

impl Entity for InvestorPositionBalanceBreakdown {
    const KIND: &'static str = "position_breakdown";

    fn id(&self) -> EntityId {
        Self::id_for(self.vault, self.investor, self.token)
    }
}

/// One vault's part of a snapshot value within the block last written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotContribution {
    pub vault: Address,
    pub raw_balance: U256,
}

/// Investor balance of a token, bucketed by `period` seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestorTokenBalanceSnapshot {
    pub investor: Address,
    pub token: Address,
    pub period: u64,
    pub rounded_timestamp: u64,
    pub timestamp: u64,
    pub raw_balance: U256,
    pub balance: Decimal,
    pub last_update_block: u64,
    pub block_contributions: Vec<SnapshotContribution>,
}

impl InvestorTokenBalanceSnapshot {
    /// Open the bucket containing `block`, carrying over the previous
    /// bucket's balance when there is one.
    pub fn open(
        investor: Address,
        token: Address,
        period: u64,
        block: BlockRef,
        previous: Option<&InvestorTokenBalanceSnapshot>,
    ) -> Self {
        let (raw_balance, balance, last_update_block) = previous
            .map(|p| (p.raw_balance, p.balance, p.last_update_block))
            .unwrap_or((U256::ZERO, Decimal::zero(), 0));
        InvestorTokenBalanceSnapshot {
            investor,
            token,
            period,
            rounded_timestamp: round_to_period(block.timestamp, period),
            timestamp: block.timestamp,
            raw_balance,
            balance,
            last_update_block,
            block_contributions: Vec::new(),
        }
    }

    pub fn id_for(investor: Address, token: Address, period: u64, rounded_timestamp: u64) -> EntityId {
        EntityId::address(investor)
            .with_address(token)
            .with_u64(period)
            .with_u64(rounded_timestamp)
    }

    /// Record `vault`'s contribution at `block`.
    ///
    /// Contributions from different vaults within one block add up; a vault
    /// seen again in the same block replaces its earlier contribution. The
    /// first write in a new block overwrites the carried value.
    pub fn record(
        &mut self,
        vault: Address,
        raw_balance: U256,
        decimals: u8,
        block: BlockRef,
    ) -> Result<(), MathError> {
        if self.last_update_block != block.number {
            self.block_contributions.clear();
        }
        match self.block_contributions.iter_mut().find(|c| c.vault == vault) {
            Some(existing) => existing.raw_balance = raw_balance,
            None => self.block_contributions.push(SnapshotContribution { vault, raw_balance }),
        }

        let total = self
            .block_contributions
            .iter()
            .try_fold(U256::ZERO, |acc, c| acc.checked_add(c.raw_balance))
            .ok_or(MathError::IntegerOverflow("snapshot balance"))?;

        self.raw_balance = total;
        self.balance = Decimal::from_raw(total, decimals)?;
        self.timestamp = block.timestamp;
        self.last_update_block = block.number;
        Ok(())
    }
}

impl Entity for InvestorTokenBalanceSnapshot {
    const KIND: &'static str = "token_snapshot";

    fn id(&self) -> EntityId {
        Self::id_for(self.investor, self.token, self.period, self.rounded_timestamp)
    }
}

/// Newest snapshot bucket of an (investor, token, period) series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotCursor {
    pub investor: Address,
    pub token: Address,
    pub period: u64,
    pub rounded_timestamp: u64,
}

impl SnapshotCursor {
    pub fn id_for(investor: Address, token: Address, period: u64) -> EntityId {
        EntityId::address(investor).with_address(token).with_u64(period)
    }

    pub fn of(snapshot: &InvestorTokenBalanceSnapshot) -> Self {
        SnapshotCursor {
            investor: snapshot.investor,
            token: snapshot.token,
            period: snapshot.period,
            rounded_timestamp: snapshot.rounded_timestamp,
        }
    }

    pub fn snapshot_id(&self) -> EntityId {
        InvestorTokenBalanceSnapshot::id_for(self.investor, self.token, self.period, self.rounded_timestamp)
    }
}

impl Entity for SnapshotCursor {
    const KIND: &'static str = "token_snapshot_cursor";

    fn id(&self) -> EntityId {
        Self::id_for(self.investor, self.token, self.period)
    }
}

/// Start of the `period`-second bucket containing `timestamp`.
pub fn round_to_period(timestamp: u64, period: u64) -> u64 {
    if period == 0 {
        return timestamp;
    }
    timestamp / period * period
}
