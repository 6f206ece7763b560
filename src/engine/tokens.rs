use super::{Engine, EngineError};
use crate::chain::abi::IERC20;
use crate::chain::CallBatch;
use crate::db::UnitOfWork;
use crate::domain::{BlockRef, Token};
use alloy_primitives::Address;
use std::collections::HashMap;
use tracing::debug;

impl Engine {
    /// Metadata of every token in `addresses`, fetching the missing ones in
    /// a single batch. A reverted `decimals()` is fatal; a reverted `name()`
    /// or `symbol()` is stored as an empty string.
    pub(super) async fn ensure_tokens(
        &self,
        uow: &mut UnitOfWork,
        addresses: &[Address],
        block: BlockRef,
    ) -> Result<HashMap<Address, Token>, EngineError> {
        let mut known = HashMap::with_capacity(addresses.len());
        let mut missing = Vec::new();
        for address in addresses {
            if known.contains_key(address) || missing.contains(address) {
                continue;
            }
            match uow.load::<Token>(&Token::id_for(*address)).await? {
                Some(token) => {
                    known.insert(*address, token);
                }
                None => missing.push(*address),
            }
        }
        if missing.is_empty() {
            return Ok(known);
        }

        let mut batch = CallBatch::new();
        let handles: Vec<_> = missing
            .iter()
            .map(|address| {
                (
                    *address,
                    batch.add(*address, IERC20::decimalsCall {}),
                    batch.add(*address, IERC20::nameCall {}),
                    batch.add(*address, IERC20::symbolCall {}),
                )
            })
            .collect();
        let results = batch.execute(self.reader.as_ref(), block.number).await?;

        for (address, decimals, name, symbol) in handles {
            let token = Token {
                address,
                decimals: results.get(decimals)?,
                name: results.try_get(name)?.unwrap_or_default(),
                symbol: results.try_get(symbol)?.unwrap_or_default(),
            };
            debug!(token = %address, symbol = %token.symbol, decimals = token.decimals, "token discovered");
            uow.save(&token)?;
            known.insert(address, token);
        }
        Ok(known)
    }
}

/// Look up a token that [`Engine::ensure_tokens`] must have returned.
pub(super) fn token<'a>(
    tokens: &'a HashMap<Address, Token>,
    address: Address,
) -> Result<&'a Token, EngineError> {
    tokens.get(&address).ok_or(EngineError::MissingToken(address))
}
