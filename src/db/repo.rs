//! Typed access to the entity store.
//!
//! Event handling never writes to the store directly. It loads and saves
//! through a [`UnitOfWork`], which keeps every write in memory until
//! [`UnitOfWork::commit`] sends them to the store as one atomic batch.
//! Dropping a unit of work discards its writes.

use super::store::{EntityStore, StoreError, StoredRecord};
use crate::domain::{Entity, EntityId};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Entry point for typed reads and for opening units of work.
#[derive(Debug, Clone)]
pub struct Repository {
    store: Arc<dyn EntityStore>,
}

impl Repository {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Repository { store }
    }

    pub fn begin(&self) -> UnitOfWork {
        UnitOfWork {
            store: Arc::clone(&self.store),
            pending: BTreeMap::new(),
        }
    }

    /// Committed state of one entity.
    pub async fn load<E: Entity>(&self, id: &EntityId) -> Result<Option<E>, StoreError> {
        match self.store.get(E::KIND, id).await? {
            Some(data) => decode::<E>(id, &data).map(Some),
            None => Ok(None),
        }
    }

    pub async fn load_by_prefix<E: Entity>(&self, prefix: &EntityId) -> Result<Vec<E>, StoreError> {
        self.store
            .scan_prefix(E::KIND, prefix)
            .await?
            .iter()
            .map(|(id, data)| decode::<E>(id, data))
            .collect()
    }
}

/// Pending writes layered over the committed store.
#[derive(Debug)]
pub struct UnitOfWork {
    store: Arc<dyn EntityStore>,
    pending: BTreeMap<(&'static str, EntityId), String>,
}

impl UnitOfWork {
    /// Latest state of one entity, including writes made in this unit.
    pub async fn load<E: Entity>(&self, id: &EntityId) -> Result<Option<E>, StoreError> {
        if let Some(data) = self.pending.get(&(E::KIND, id.clone())) {
            return decode::<E>(id, data).map(Some);
        }
        match self.store.get(E::KIND, id).await? {
            Some(data) => decode::<E>(id, &data).map(Some),
            None => Ok(None),
        }
    }

    /// All entities of a kind under `prefix`, pending writes winning over
    /// committed ones. Ordered by id.
    pub async fn load_by_prefix<E: Entity>(&self, prefix: &EntityId) -> Result<Vec<E>, StoreError> {
        let mut merged: BTreeMap<EntityId, String> = self
            .store
            .scan_prefix(E::KIND, prefix)
            .await?
            .into_iter()
            .collect();
        for ((kind, id), data) in self.pending.range((E::KIND, prefix.clone())..) {
            if *kind != E::KIND || !id.starts_with(prefix) {
                break;
            }
            merged.insert(id.clone(), data.clone());
        }
        merged
            .iter()
            .map(|(id, data)| decode::<E>(id, data))
            .collect()
    }

    pub fn save<E: Entity>(&mut self, entity: &E) -> Result<(), StoreError> {
        let id = entity.id();
        let data = serde_json::to_string(entity).map_err(|source| StoreError::Encode {
            kind: E::KIND,
            id: id.clone(),
            source,
        })?;
        self.pending.insert((E::KIND, id), data);
        Ok(())
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Write everything saved in this unit atomically. Returns the number
    /// of records written.
    pub async fn commit(self) -> Result<usize, StoreError> {
        let records: Vec<StoredRecord> = self
            .pending
            .into_iter()
            .map(|((kind, id), data)| StoredRecord { kind, id, data })
            .collect();
        let written = records.len();
        self.store.put_batch(records).await?;
        Ok(written)
    }
}

fn decode<E: Entity>(id: &EntityId, data: &str) -> Result<E, StoreError> {
    serde_json::from_str(data).map_err(|source| StoreError::Decode {
        kind: E::KIND,
        id: id.clone(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::domain::{Investor, InvestorPosition};
    use alloy_primitives::{address, Address, U256};

    const VAULT: Address = address!("00000000000000000000000000000000000000a1");
    const OTHER_VAULT: Address = address!("00000000000000000000000000000000000000a2");
    const ALICE: Address = address!("00000000000000000000000000000000000000b1");
    const BOB: Address = address!("00000000000000000000000000000000000000b2");

    fn repository() -> (Arc<MemoryStore>, Repository) {
        let store = Arc::new(MemoryStore::new());
        let repo = Repository::new(store.clone());
        (store, repo)
    }

    #[tokio::test]
    async fn test_writes_are_invisible_until_commit() {
        let (store, repo) = repository();
        let mut uow = repo.begin();
        uow.save(&Investor { address: ALICE }).unwrap();

        let id = Investor::id_for(ALICE);
        assert!(uow.load::<Investor>(&id).await.unwrap().is_some());
        assert!(repo.load::<Investor>(&id).await.unwrap().is_none());

        assert_eq!(uow.commit().await.unwrap(), 1);
        assert_eq!(store.len(), 1);
        assert!(repo.load::<Investor>(&id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_dropped_unit_writes_nothing() {
        let (store, repo) = repository();
        {
            let mut uow = repo.begin();
            uow.save(&Investor { address: ALICE }).unwrap();
        }
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_prefix_load_merges_pending_over_committed() {
        let (_, repo) = repository();
        let mut uow = repo.begin();
        uow.save(&InvestorPosition::new(VAULT, ALICE)).unwrap();
        uow.save(&InvestorPosition::new(OTHER_VAULT, ALICE)).unwrap();
        uow.commit().await.unwrap();

        let mut uow = repo.begin();
        let mut updated = InvestorPosition::new(VAULT, ALICE);
        updated.raw_shares_balance = U256::from(5u64);
        uow.save(&updated).unwrap();
        uow.save(&InvestorPosition::new(VAULT, BOB)).unwrap();
        // same id bytes, different kind: must not leak into the scan
        uow.save(&Investor { address: VAULT }).unwrap();

        let positions = uow
            .load_by_prefix::<InvestorPosition>(&InvestorPosition::vault_prefix(VAULT))
            .await
            .unwrap();
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].investor, ALICE);
        assert_eq!(positions[0].raw_shares_balance, U256::from(5u64));
        assert_eq!(positions[1].investor, BOB);
    }
}
