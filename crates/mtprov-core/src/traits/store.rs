// # Provisioning Store Trait
//
// Defines the persistence contract for address lists and static DNS entries.
//
// ## Purpose
//
// The service layer depends only on this trait. Backends decide how records
// are kept but must agree on:
// - `name` uniqueness per resource, enforced atomically by the backend even
//   when the caller already checked
// - absence on lookup by name is `Ok(None)`, never an error
// - mutations by id fail with `NotFound` when the id is unknown
// - patch results are re-read after the write
//
// ## Implementations
//
// - `MemoryStore`: process-lifetime maps behind a single mutex
// - `DocumentStore`: durable JSON document collections with unique indexes
//
// ## Usage
//
// ```rust
// use mtprov_core::{AddressList, MemoryStore, ProvisioningStore, RequestContext};
//
// #[tokio::main]
// async fn main() -> mtprov_core::Result<()> {
//     let store = MemoryStore::new();
//     let ctx = RequestContext::background();
//
//     let created = store.create_address_list(&ctx, AddressList::new("office", vec![])).await?;
//     let found = store.get_address_list_by_name(&ctx, "office").await?;
//     assert_eq!(found, Some(created));
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::model::{Address, AddressList, PatchAction, StaticDnsEntry};
use crate::validate::Validate;

/// Trait for provisioning store implementations
///
/// Implementations must be safe to call concurrently from multiple tasks.
/// Every method takes the caller's [`RequestContext`] and must give up with
/// `Error::Timeout` once its deadline passes.
///
/// Records passed in are expected to be validated already. Records handed
/// back must pass validation too; a stored record that does not is reported
/// as a storage error.
///
/// The add/remove patch is read-compute-write and is not atomic against a
/// concurrent patch of the same list.
#[async_trait]
pub trait ProvisioningStore: Send + Sync {
    /// Human-readable backend name for logs
    fn backend_name(&self) -> &'static str;

    /// Insert a new address list and assign its id
    ///
    /// # Returns
    ///
    /// - `Ok(AddressList)`: The stored list, `id` set
    /// - `Err(Error::Conflict)`: A list with that name exists
    async fn create_address_list(&self, ctx: &RequestContext, list: AddressList) -> Result<AddressList>;

    /// All address lists in insertion order
    async fn get_all_address_lists(&self, ctx: &RequestContext) -> Result<Vec<AddressList>>;

    /// Look up an address list by name
    ///
    /// # Returns
    ///
    /// - `Ok(Some(AddressList))`: Found
    /// - `Ok(None)`: No list with that name
    async fn get_address_list_by_name(&self, ctx: &RequestContext, name: &str) -> Result<Option<AddressList>>;

    /// Replace a list wholesale, keeping its id
    ///
    /// # Returns
    ///
    /// - `Err(Error::NotFound)`: Unknown id
    /// - `Err(Error::Conflict)`: The new name belongs to another list
    async fn update_address_list_by_id(
        &self,
        ctx: &RequestContext,
        id: &str,
        list: AddressList,
    ) -> Result<AddressList>;

    /// Add or remove individual addresses
    ///
    /// `Add` skips addresses already present. `Remove` ignores addresses that
    /// are absent. The returned list is read back after the write.
    async fn update_entries_in_address_list(
        &self,
        ctx: &RequestContext,
        action: PatchAction,
        id: &str,
        addresses: &[Address],
    ) -> Result<AddressList>;

    /// Delete a list
    ///
    /// # Returns
    ///
    /// - `Err(Error::NotFound)`: Nothing was deleted
    async fn delete_address_list_by_id(&self, ctx: &RequestContext, id: &str) -> Result<()>;

    /// Insert a static DNS entry and assign its id
    async fn create_static_dns_entry(&self, ctx: &RequestContext, entry: StaticDnsEntry) -> Result<StaticDnsEntry>;

    /// All static DNS entries in insertion order
    async fn get_all_static_dns(&self, ctx: &RequestContext) -> Result<Vec<StaticDnsEntry>>;

    /// Look up a static DNS entry by name, `Ok(None)` when absent
    async fn get_static_dns_entry_by_name(&self, ctx: &RequestContext, name: &str)
    -> Result<Option<StaticDnsEntry>>;

    /// Replace an entry wholesale, keeping its id
    async fn update_static_dns_entry_by_id(
        &self,
        ctx: &RequestContext,
        id: &str,
        entry: StaticDnsEntry,
    ) -> Result<StaticDnsEntry>;

    /// Delete an entry, `NotFound` when nothing was deleted
    async fn delete_static_dns_entry_by_id(&self, ctx: &RequestContext, id: &str) -> Result<()>;

    /// Create several entries in order
    ///
    /// Not atomic. Stops at the first entry that fails validation or
    /// insertion and reports the entries already written in
    /// [`Error::Batch`].
    async fn create_static_dns_entries(
        &self,
        ctx: &RequestContext,
        entries: Vec<StaticDnsEntry>,
    ) -> Result<Vec<StaticDnsEntry>> {
        let mut applied = Vec::with_capacity(entries.len());
        for entry in entries {
            let name = entry.name.clone();
            let result = match entry.validate() {
                Ok(()) => self.create_static_dns_entry(ctx, entry).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(created) => applied.push(created),
                Err(e) => return Err(Error::batch(applied, name, e)),
            }
        }
        Ok(applied)
    }

    /// Replace several entries, each matched by name
    ///
    /// Not atomic. An unknown name stops the batch with `NotFound` wrapped
    /// in [`Error::Batch`].
    async fn update_static_dns_entries(
        &self,
        ctx: &RequestContext,
        entries: Vec<StaticDnsEntry>,
    ) -> Result<Vec<StaticDnsEntry>> {
        let mut applied = Vec::with_capacity(entries.len());
        for entry in entries {
            let name = entry.name.clone();
            let result = match entry.validate() {
                Ok(()) => match self.get_static_dns_entry_by_name(ctx, &name).await {
                    Ok(Some(existing)) => match existing.id {
                        Some(id) => self.update_static_dns_entry_by_id(ctx, &id, entry).await,
                        None => Err(Error::storage(format!("static DNS entry '{name}' has no id"))),
                    },
                    Ok(None) => Err(Error::not_found(format!("static DNS entry '{name}'"))),
                    Err(e) => Err(e),
                },
                Err(e) => Err(e),
            };
            match result {
                Ok(updated) => applied.push(updated),
                Err(e) => return Err(Error::batch(applied, name, e)),
            }
        }
        Ok(applied)
    }
}
