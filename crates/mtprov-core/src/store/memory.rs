// # Memory Store
//
// In-memory implementation of ProvisioningStore.
//
// ## Purpose
//
// Keeps all records for the lifetime of the process. Useful for tests, demos
// and single-shot tooling where durability does not matter.
//
// ## Concurrency
//
// All state sits behind one `tokio::sync::Mutex`. Every operation, including
// the read-compute-write of an address patch, runs entirely under the lock,
// so this backend never interleaves two writers.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::model::{Address, AddressList, PatchAction, StaticDnsEntry};
use crate::store::{StoredRecord, verified};
use crate::traits::store::ProvisioningStore;
use crate::validate::validate_addresses;

/// In-memory provisioning store
///
/// Cloning yields another handle to the same data.
///
/// # Example
///
/// ```rust,no_run
/// use mtprov_core::{MemoryStore, ProvisioningStore, RequestContext, StaticDnsEntry};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryStore::new();
///     let ctx = RequestContext::background();
///
///     let entry = StaticDnsEntry::new("a.example.com", "1.2.3.4", "1h".parse()?);
///     store.create_static_dns_entry(&ctx, entry).await?;
///
///     let found = store.get_static_dns_entry_by_name(&ctx, "a.example.com").await?;
///     assert_eq!(found.map(|e| e.ttl.as_secs()), Some(3600));
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: u64,
    address_lists: Table<AddressList>,
    static_dns: Table<StaticDnsEntry>,
}

impl MemoryState {
    // Zero-padded so that id order is insertion order
    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        format!("{:024x}", self.next_id)
    }
}

/// Records keyed by id with a unique name index
#[derive(Debug)]
struct Table<T> {
    records: BTreeMap<String, T>,
    names: HashMap<String, String>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            records: BTreeMap::new(),
            names: HashMap::new(),
        }
    }
}

impl<T: StoredRecord + Clone> Table<T> {
    fn insert(&mut self, id: String, mut record: T) -> Result<T> {
        if self.names.contains_key(record.name()) {
            return Err(Error::conflict(format!(
                "{} '{}' already exists",
                T::KIND,
                record.name()
            )));
        }
        record.set_id(id.clone());
        self.names.insert(record.name().to_string(), id.clone());
        self.records.insert(id, record.clone());
        Ok(record)
    }

    fn replace(&mut self, id: &str, mut record: T) -> Result<T> {
        let Some(current) = self.records.get(id) else {
            return Err(Error::not_found(format!("{} with id {id}", T::KIND)));
        };
        if let Some(owner) = self.names.get(record.name())
            && owner != id
        {
            return Err(Error::conflict(format!(
                "{} '{}' already exists",
                T::KIND,
                record.name()
            )));
        }

        let old_name = current.name().to_string();
        self.names.remove(&old_name);
        record.set_id(id.to_string());
        self.names.insert(record.name().to_string(), id.to_string());
        self.records.insert(id.to_string(), record.clone());
        Ok(record)
    }

    fn get(&self, id: &str) -> Option<&T> {
        self.records.get(id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        self.records.get_mut(id)
    }

    fn get_by_name(&self, name: &str) -> Option<&T> {
        self.names.get(name).and_then(|id| self.records.get(id))
    }

    fn remove(&mut self, id: &str) -> Result<()> {
        let record = self
            .records
            .remove(id)
            .ok_or_else(|| Error::not_found(format!("{} with id {id}", T::KIND)))?;
        self.names.remove(record.name());
        Ok(())
    }

    fn all(&self) -> Vec<T> {
        self.records.values().cloned().collect()
    }
}

impl MemoryStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored records across both resources
    pub async fn len(&self) -> usize {
        let state = self.inner.lock().await;
        state.address_lists.records.len() + state.static_dns.records.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ProvisioningStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn create_address_list(&self, ctx: &RequestContext, list: AddressList) -> Result<AddressList> {
        ctx.run("create_address_list", async {
            let mut state = self.inner.lock().await;
            let id = state.allocate_id();
            let created = state.address_lists.insert(id, list)?;
            tracing::info!(name = %created.name, "address list created");
            Ok(created)
        })
        .await
    }

    async fn get_all_address_lists(&self, ctx: &RequestContext) -> Result<Vec<AddressList>> {
        ctx.run("get_all_address_lists", async {
            let state = self.inner.lock().await;
            state.address_lists.all().into_iter().map(verified).collect()
        })
        .await
    }

    async fn get_address_list_by_name(&self, ctx: &RequestContext, name: &str) -> Result<Option<AddressList>> {
        ctx.run("get_address_list_by_name", async {
            let state = self.inner.lock().await;
            state.address_lists.get_by_name(name).cloned().map(verified).transpose()
        })
        .await
    }

    async fn update_address_list_by_id(
        &self,
        ctx: &RequestContext,
        id: &str,
        list: AddressList,
    ) -> Result<AddressList> {
        ctx.run("update_address_list_by_id", async {
            let mut state = self.inner.lock().await;
            let updated = state.address_lists.replace(id, list)?;
            tracing::info!(id, name = %updated.name, "address list replaced");
            Ok(updated)
        })
        .await
    }

    async fn update_entries_in_address_list(
        &self,
        ctx: &RequestContext,
        action: PatchAction,
        id: &str,
        addresses: &[Address],
    ) -> Result<AddressList> {
        ctx.run("update_entries_in_address_list", async {
            validate_addresses(addresses)?;

            let mut state = self.inner.lock().await;
            let list = state
                .address_lists
                .get_mut(id)
                .ok_or_else(|| Error::not_found(format!("address list with id {id}")))?;

            // Patch a copy; the stored list only changes if the result is valid
            let mut patched = list.clone();
            let changed = patched.apply(action, addresses);
            let patched = verified(patched)?;
            *list = patched.clone();
            tracing::info!(id, %action, changed, "address list patched");
            Ok(patched)
        })
        .await
    }

    async fn delete_address_list_by_id(&self, ctx: &RequestContext, id: &str) -> Result<()> {
        ctx.run("delete_address_list_by_id", async {
            let mut state = self.inner.lock().await;
            state.address_lists.remove(id)?;
            tracing::info!(id, "address list deleted");
            Ok(())
        })
        .await
    }

    async fn create_static_dns_entry(&self, ctx: &RequestContext, entry: StaticDnsEntry) -> Result<StaticDnsEntry> {
        ctx.run("create_static_dns_entry", async {
            let mut state = self.inner.lock().await;
            let id = state.allocate_id();
            let created = state.static_dns.insert(id, entry)?;
            tracing::info!(name = %created.name, "static DNS entry created");
            Ok(created)
        })
        .await
    }

    async fn get_all_static_dns(&self, ctx: &RequestContext) -> Result<Vec<StaticDnsEntry>> {
        ctx.run("get_all_static_dns", async {
            let state = self.inner.lock().await;
            state.static_dns.all().into_iter().map(verified).collect()
        })
        .await
    }

    async fn get_static_dns_entry_by_name(
        &self,
        ctx: &RequestContext,
        name: &str,
    ) -> Result<Option<StaticDnsEntry>> {
        ctx.run("get_static_dns_entry_by_name", async {
            let state = self.inner.lock().await;
            state.static_dns.get_by_name(name).cloned().map(verified).transpose()
        })
        .await
    }

    async fn update_static_dns_entry_by_id(
        &self,
        ctx: &RequestContext,
        id: &str,
        entry: StaticDnsEntry,
    ) -> Result<StaticDnsEntry> {
        ctx.run("update_static_dns_entry_by_id", async {
            let mut state = self.inner.lock().await;
            let updated = state.static_dns.replace(id, entry)?;
            tracing::info!(id, name = %updated.name, "static DNS entry replaced");
            Ok(updated)
        })
        .await
    }

    async fn delete_static_dns_entry_by_id(&self, ctx: &RequestContext, id: &str) -> Result<()> {
        ctx.run("delete_static_dns_entry_by_id", async {
            let mut state = self.inner.lock().await;
            state.static_dns.remove(id)?;
            tracing::info!(id, "static DNS entry deleted");
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duration::RouterOsDuration;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryStore::new();
        let ctx = RequestContext::background();

        // Initially empty
        assert!(store.is_empty().await);

        let created = store
            .create_address_list(&ctx, AddressList::new("office", vec![Address::new("10.0.0.1")]))
            .await
            .unwrap();
        assert!(created.id.is_some());
        assert_eq!(store.len().await, 1);

        let found = store.get_address_list_by_name(&ctx, "office").await.unwrap();
        assert_eq!(found, Some(created.clone()));

        store
            .delete_address_list_by_id(&ctx, created.id.as_deref().unwrap())
            .await
            .unwrap();
        assert!(store.get_address_list_by_name(&ctx, "office").await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_memory_store_rename_frees_old_name() {
        let store = MemoryStore::new();
        let ctx = RequestContext::background();

        let created = store
            .create_address_list(&ctx, AddressList::new("old", vec![]))
            .await
            .unwrap();
        let id = created.id.unwrap();
        store
            .update_address_list_by_id(&ctx, &id, AddressList::new("new", vec![]))
            .await
            .unwrap();

        assert!(store.get_address_list_by_name(&ctx, "old").await.unwrap().is_none());
        let renamed = store.get_address_list_by_name(&ctx, "new").await.unwrap().unwrap();
        assert_eq!(renamed.id.as_deref(), Some(id.as_str()));

        // The old name can be taken again
        store
            .create_address_list(&ctx, AddressList::new("old", vec![]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_memory_store_rename_onto_existing_name_conflicts() {
        let store = MemoryStore::new();
        let ctx = RequestContext::background();

        store.create_address_list(&ctx, AddressList::new("a", vec![])).await.unwrap();
        let b = store.create_address_list(&ctx, AddressList::new("b", vec![])).await.unwrap();

        let err = store
            .update_address_list_by_id(&ctx, b.id.as_deref().unwrap(), AddressList::new("a", vec![]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_memory_store_concurrent_create_same_name() {
        let store = MemoryStore::new();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let ctx = RequestContext::background();
                let entry = StaticDnsEntry::new("a.example.com", "1.2.3.4", RouterOsDuration::from_secs(60));
                store.create_static_dns_entry(&ctx, entry).await
            }));
        }

        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(e) => assert_eq!(e.kind(), ErrorKind::Conflict),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_memory_store_insertion_order() {
        let store = MemoryStore::new();
        let ctx = RequestContext::background();

        for name in ["zeta", "alpha", "mid"] {
            store.create_address_list(&ctx, AddressList::new(name, vec![])).await.unwrap();
        }
        let names: Vec<String> = store
            .get_all_address_lists(&ctx)
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.name)
            .collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
    }
}
