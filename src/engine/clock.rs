//! Periodic refresh of every running vault, at most once per clock period.

use super::{Engine, EngineError};
use crate::db::UnitOfWork;
use crate::domain::{BlockRef, ClockTick, Entity};
use tracing::{debug, info};

impl Engine {
    /// Record the tick for `block`'s bucket and refresh every running vault
    /// of the network. Returns `false` when the bucket was already ticked.
    pub async fn handle_clock_tick(
        &self,
        uow: &mut UnitOfWork,
        block: BlockRef,
    ) -> Result<bool, EngineError> {
        let tick = ClockTick::new(block, self.settings.clock_period);
        if uow.load::<ClockTick>(&tick.id()).await?.is_some() {
            debug!(block = block.number, bucket = tick.rounded_timestamp, "clock bucket already ticked");
            return Ok(false);
        }
        uow.save(&tick)?;

        let mut refreshed = 0;
        for config in self.registry.vaults_for_network(&self.settings.network) {
            let Some(mut vault) = self.running_vault(uow, config.address).await? else {
                continue;
            };
            self.harvest_refresh(uow, &mut vault, config, block).await?;
            refreshed += 1;
        }
        info!(block = block.number, bucket = tick.rounded_timestamp, vaults = refreshed, "clock tick");
        Ok(true)
    }
}
