//! Provisioning service
//!
//! [`ProvisioningService`] is the single entry point a transport layer talks
//! to. It owns a handle to a [`ProvisioningStore`] and adds three things on
//! top of it:
//!
//! - input validation before any storage call, so rejected input never has
//!   side effects
//! - precondition checks (`ensure_*`) that hand back the typed record they
//!   looked up, for handlers that need it downstream
//! - name-addressed use cases composed from the two
//!
//! ## Request Flow
//!
//! ```text
//! validate ──► ensure exists / absent ──► mutate ──► re-read ──► respond
//! ```
//!
//! No retries happen here. Storage errors reach the caller unchanged.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;
use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::model::{Address, AddressList, AddressListPatch, PatchAction, StaticDnsBatch, StaticDnsEntry};
use crate::traits::store::ProvisioningStore;
use crate::validate::{Validate, validate_addresses};

/// Application service over a provisioning store
///
/// Cheap to clone; clones share the store.
#[derive(Clone)]
pub struct ProvisioningService {
    store: Arc<dyn ProvisioningStore>,
    timeout: Duration,
}

impl ProvisioningService {
    /// Create a service whose [`context`](Self::context) expires after `timeout`
    pub fn new(store: Arc<dyn ProvisioningStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Create a service using the configured storage deadline
    pub fn with_config(store: Arc<dyn ProvisioningStore>, config: &DatabaseConfig) -> Self {
        Self::new(store, config.timeout())
    }

    /// A fresh request context carrying the default storage deadline
    pub fn context(&self) -> RequestContext {
        RequestContext::with_timeout(self.timeout)
    }

    /// Name of the backend in use
    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    // Address lists

    /// Create a list after checking its name is free
    ///
    /// # Returns
    /// - `Ok(AddressList)` with its assigned id
    /// - `Err(Error::Validation)` for malformed input
    /// - `Err(Error::Conflict)` if the name is taken
    pub async fn create_address_list(&self, ctx: &RequestContext, list: AddressList) -> Result<AddressList> {
        list.validate()?;
        self.ensure_address_list_absent(ctx, &list.name).await?;
        self.store.create_address_list(ctx, list).await
    }

    pub async fn get_all_address_lists(&self, ctx: &RequestContext) -> Result<Vec<AddressList>> {
        let lists = self.store.get_all_address_lists(ctx).await?;
        debug!(count = lists.len(), "listed address lists");
        Ok(lists)
    }

    /// Look up a list; `Ok(None)` when absent
    pub async fn get_address_list_by_name(&self, ctx: &RequestContext, name: &str) -> Result<Option<AddressList>> {
        self.store.get_address_list_by_name(ctx, name).await
    }

    pub async fn update_address_list_by_id(
        &self,
        ctx: &RequestContext,
        id: &str,
        list: AddressList,
    ) -> Result<AddressList> {
        list.validate()?;
        self.store.update_address_list_by_id(ctx, id, list).await
    }

    /// Add or remove addresses, returning the list as stored afterwards
    ///
    /// Adding a present address or removing an absent one is not an error.
    pub async fn update_entries_in_address_list(
        &self,
        ctx: &RequestContext,
        action: PatchAction,
        id: &str,
        addresses: &[Address],
    ) -> Result<AddressList> {
        validate_addresses(addresses)?;
        self.store.update_entries_in_address_list(ctx, action, id, addresses).await
    }

    pub async fn delete_address_list_by_id(&self, ctx: &RequestContext, id: &str) -> Result<()> {
        self.store.delete_address_list_by_id(ctx, id).await
    }

    // Static DNS

    /// Create an entry after checking its name is free
    pub async fn create_static_dns_entry(&self, ctx: &RequestContext, entry: StaticDnsEntry) -> Result<StaticDnsEntry> {
        entry.validate()?;
        self.ensure_static_dns_entry_absent(ctx, &entry.name).await?;
        self.store.create_static_dns_entry(ctx, entry).await
    }

    pub async fn get_all_static_dns(&self, ctx: &RequestContext) -> Result<Vec<StaticDnsEntry>> {
        let entries = self.store.get_all_static_dns(ctx).await?;
        debug!(count = entries.len(), "listed static DNS entries");
        Ok(entries)
    }

    /// Look up an entry; `Ok(None)` when absent
    pub async fn get_static_dns_entry_by_name(
        &self,
        ctx: &RequestContext,
        name: &str,
    ) -> Result<Option<StaticDnsEntry>> {
        self.store.get_static_dns_entry_by_name(ctx, name).await
    }

    pub async fn update_static_dns_entry_by_id(
        &self,
        ctx: &RequestContext,
        id: &str,
        entry: StaticDnsEntry,
    ) -> Result<StaticDnsEntry> {
        entry.validate()?;
        self.store.update_static_dns_entry_by_id(ctx, id, entry).await
    }

    pub async fn delete_static_dns_entry_by_id(&self, ctx: &RequestContext, id: &str) -> Result<()> {
        self.store.delete_static_dns_entry_by_id(ctx, id).await
    }

    /// Create a batch of entries
    ///
    /// The whole batch is validated and every name checked for absence before
    /// the first write. Writes are not atomic: a failure after that point is
    /// reported as [`Error::Batch`] listing the entries already created.
    pub async fn create_static_dns_entries(
        &self,
        ctx: &RequestContext,
        batch: StaticDnsBatch,
    ) -> Result<Vec<StaticDnsEntry>> {
        batch.validate()?;
        self.ensure_static_dns_entries_absent(ctx, &batch.entries).await?;

        let created = self.store.create_static_dns_entries(ctx, batch.entries).await;
        if let Err(Error::Batch { applied, failed, .. }) = &created {
            warn!(applied = applied.len(), failed = %failed, "static DNS batch create stopped partway");
        }
        created
    }

    /// Replace a batch of entries matched by name
    ///
    /// Every name must exist before the first write.
    pub async fn update_static_dns_entries(
        &self,
        ctx: &RequestContext,
        batch: StaticDnsBatch,
    ) -> Result<Vec<StaticDnsEntry>> {
        batch.validate()?;
        self.ensure_static_dns_entries_exist(ctx, &batch.entries).await?;

        let updated = self.store.update_static_dns_entries(ctx, batch.entries).await;
        if let Err(Error::Batch { applied, failed, .. }) = &updated {
            warn!(applied = applied.len(), failed = %failed, "static DNS batch update stopped partway");
        }
        updated
    }

    // Preconditions

    /// The stored list named `name`, or `NotFound`
    pub async fn ensure_address_list_exists(&self, ctx: &RequestContext, name: &str) -> Result<AddressList> {
        self.store
            .get_address_list_by_name(ctx, name)
            .await?
            .ok_or_else(|| Error::not_found(format!("address list '{name}'")))
    }

    /// `Conflict` if a list named `name` exists
    pub async fn ensure_address_list_absent(&self, ctx: &RequestContext, name: &str) -> Result<()> {
        match self.store.get_address_list_by_name(ctx, name).await? {
            Some(_) => Err(Error::conflict(format!("address list '{name}' already exists"))),
            None => Ok(()),
        }
    }

    /// The stored entry named `name`, or `NotFound`
    pub async fn ensure_static_dns_entry_exists(&self, ctx: &RequestContext, name: &str) -> Result<StaticDnsEntry> {
        self.store
            .get_static_dns_entry_by_name(ctx, name)
            .await?
            .ok_or_else(|| Error::not_found(format!("static DNS entry '{name}'")))
    }

    /// `Conflict` if an entry named `name` exists
    pub async fn ensure_static_dns_entry_absent(&self, ctx: &RequestContext, name: &str) -> Result<()> {
        match self.store.get_static_dns_entry_by_name(ctx, name).await? {
            Some(_) => Err(Error::conflict(format!("static DNS entry '{name}' already exists"))),
            None => Ok(()),
        }
    }

    /// `Conflict` on the first batch entry whose name is taken
    ///
    /// The error is wrapped in [`Error::Batch`] with nothing applied.
    pub async fn ensure_static_dns_entries_absent(&self, ctx: &RequestContext, entries: &[StaticDnsEntry]) -> Result<()> {
        for entry in entries {
            self.ensure_static_dns_entry_absent(ctx, &entry.name)
                .await
                .map_err(|e| Error::batch(Vec::new(), entry.name.as_str(), e))?;
        }
        Ok(())
    }

    /// The stored counterpart of every batch entry, in batch order
    ///
    /// `NotFound` on the first unknown name, wrapped in [`Error::Batch`]
    /// with nothing applied.
    pub async fn ensure_static_dns_entries_exist(
        &self,
        ctx: &RequestContext,
        entries: &[StaticDnsEntry],
    ) -> Result<Vec<StaticDnsEntry>> {
        let mut existing = Vec::with_capacity(entries.len());
        for entry in entries {
            let found = self
                .ensure_static_dns_entry_exists(ctx, &entry.name)
                .await
                .map_err(|e| Error::batch(Vec::new(), entry.name.as_str(), e))?;
            existing.push(found);
        }
        Ok(existing)
    }

    // Name-addressed use cases

    /// Replace the list currently named `name`
    ///
    /// `list` may carry a new name; the old one is freed.
    pub async fn update_address_list(&self, ctx: &RequestContext, name: &str, list: AddressList) -> Result<AddressList> {
        list.validate()?;
        let current = self.ensure_address_list_exists(ctx, name).await?;
        let id = stored_id(current.id.as_deref(), "address list", name)?;
        let updated = self.store.update_address_list_by_id(ctx, id, list).await?;
        info!(from = name, to = %updated.name, "address list updated");
        Ok(updated)
    }

    /// Apply a patch to the list named `name`
    pub async fn patch_address_list(
        &self,
        ctx: &RequestContext,
        name: &str,
        patch: AddressListPatch,
    ) -> Result<AddressList> {
        patch.validate()?;
        let current = self.ensure_address_list_exists(ctx, name).await?;
        let id = stored_id(current.id.as_deref(), "address list", name)?;
        self.store
            .update_entries_in_address_list(ctx, patch.action, id, &patch.addresses)
            .await
    }

    pub async fn delete_address_list(&self, ctx: &RequestContext, name: &str) -> Result<()> {
        let current = self.ensure_address_list_exists(ctx, name).await?;
        let id = stored_id(current.id.as_deref(), "address list", name)?;
        self.store.delete_address_list_by_id(ctx, id).await
    }

    /// Replace the entry currently named `name`
    pub async fn update_static_dns_entry(
        &self,
        ctx: &RequestContext,
        name: &str,
        entry: StaticDnsEntry,
    ) -> Result<StaticDnsEntry> {
        entry.validate()?;
        let current = self.ensure_static_dns_entry_exists(ctx, name).await?;
        let id = stored_id(current.id.as_deref(), "static DNS entry", name)?;
        let updated = self.store.update_static_dns_entry_by_id(ctx, id, entry).await?;
        info!(from = name, to = %updated.name, "static DNS entry updated");
        Ok(updated)
    }

    pub async fn delete_static_dns_entry(&self, ctx: &RequestContext, name: &str) -> Result<()> {
        let current = self.ensure_static_dns_entry_exists(ctx, name).await?;
        let id = stored_id(current.id.as_deref(), "static DNS entry", name)?;
        self.store.delete_static_dns_entry_by_id(ctx, id).await
    }
}

impl std::fmt::Debug for ProvisioningService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisioningService")
            .field("backend", &self.store.backend_name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

// Records read back from a store always carry an id
fn stored_id<'a>(id: Option<&'a str>, kind: &str, name: &str) -> Result<&'a str> {
    id.ok_or_else(|| Error::storage(format!("stored {kind} '{name}' has no id")))
}
