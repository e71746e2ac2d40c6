//! Test doubles and common utilities for store and service contract tests
//!
//! Every contract runs against each backend returned by [`backends`], so the
//! memory and document stores are held to the same behavior.

#![allow(dead_code)]

use async_trait::async_trait;
use mtprov_core::config::DatabaseConfig;
use mtprov_core::error::Result;
use mtprov_core::{
    Address, AddressList, MemoryStore, PatchAction, ProvisioningStore, RequestContext, RouterOsDuration,
    StaticDnsEntry,
};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

/// A store under test plus whatever keeps it alive
pub struct TestBackend {
    pub store: Arc<dyn ProvisioningStore>,
    _dir: Option<TempDir>,
}

impl TestBackend {
    pub fn name(&self) -> &'static str {
        self.store.backend_name()
    }
}

/// In-memory backend
pub async fn memory_backend() -> TestBackend {
    TestBackend {
        store: Arc::new(MemoryStore::new()),
        _dir: None,
    }
}

/// Document backend in a fresh temp directory, opened through `connect`
pub async fn document_backend() -> TestBackend {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = mtprov_core::connect(&document_config(&dir))
        .await
        .expect("document store opens");
    TestBackend {
        store,
        _dir: Some(dir),
    }
}

/// Every backend, freshly created
pub async fn backends() -> Vec<TestBackend> {
    vec![memory_backend().await, document_backend().await]
}

/// Database config pointing at `dir`
pub fn document_config(dir: &TempDir) -> DatabaseConfig {
    DatabaseConfig {
        dsn: format!("file://{}", dir.path().display()),
        ..DatabaseConfig::default()
    }
}

pub fn dns_entry(name: &str, ttl_secs: i64) -> StaticDnsEntry {
    StaticDnsEntry::new(name, "1.2.3.4", RouterOsDuration::from_secs(ttl_secs))
}

/// A store that counts calls and can stall before delegating
///
/// Wraps a [`MemoryStore`]. The stall runs inside the caller's deadline, so
/// a delay longer than the context budget produces a timeout.
#[derive(Clone, Default)]
pub struct InstrumentedStore {
    inner: MemoryStore,
    calls: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl InstrumentedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stall every call by `delay`
    pub fn stalling(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Number of storage calls made so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn call<T, F>(&self, ctx: &RequestContext, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send,
        T: Send,
    {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay;
        ctx.run(operation, async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            fut.await
        })
        .await
    }
}

#[async_trait]
impl ProvisioningStore for InstrumentedStore {
    fn backend_name(&self) -> &'static str {
        "instrumented"
    }

    async fn create_address_list(&self, ctx: &RequestContext, list: AddressList) -> Result<AddressList> {
        self.call(ctx, "create_address_list", self.inner.create_address_list(ctx, list))
            .await
    }

    async fn get_all_address_lists(&self, ctx: &RequestContext) -> Result<Vec<AddressList>> {
        self.call(ctx, "get_all_address_lists", self.inner.get_all_address_lists(ctx))
            .await
    }

    async fn get_address_list_by_name(&self, ctx: &RequestContext, name: &str) -> Result<Option<AddressList>> {
        self.call(ctx, "get_address_list_by_name", self.inner.get_address_list_by_name(ctx, name))
            .await
    }

    async fn update_address_list_by_id(
        &self,
        ctx: &RequestContext,
        id: &str,
        list: AddressList,
    ) -> Result<AddressList> {
        self.call(ctx, "update_address_list_by_id", self.inner.update_address_list_by_id(ctx, id, list))
            .await
    }

    async fn update_entries_in_address_list(
        &self,
        ctx: &RequestContext,
        action: PatchAction,
        id: &str,
        addresses: &[Address],
    ) -> Result<AddressList> {
        self.call(
            ctx,
            "update_entries_in_address_list",
            self.inner.update_entries_in_address_list(ctx, action, id, addresses),
        )
        .await
    }

    async fn delete_address_list_by_id(&self, ctx: &RequestContext, id: &str) -> Result<()> {
        self.call(ctx, "delete_address_list_by_id", self.inner.delete_address_list_by_id(ctx, id))
            .await
    }

    async fn create_static_dns_entry(&self, ctx: &RequestContext, entry: StaticDnsEntry) -> Result<StaticDnsEntry> {
        self.call(ctx, "create_static_dns_entry", self.inner.create_static_dns_entry(ctx, entry))
            .await
    }

    async fn get_all_static_dns(&self, ctx: &RequestContext) -> Result<Vec<StaticDnsEntry>> {
        self.call(ctx, "get_all_static_dns", self.inner.get_all_static_dns(ctx))
            .await
    }

    async fn get_static_dns_entry_by_name(
        &self,
        ctx: &RequestContext,
        name: &str,
    ) -> Result<Option<StaticDnsEntry>> {
        self.call(ctx, "get_static_dns_entry_by_name", self.inner.get_static_dns_entry_by_name(ctx, name))
            .await
    }

    async fn update_static_dns_entry_by_id(
        &self,
        ctx: &RequestContext,
        id: &str,
        entry: StaticDnsEntry,
    ) -> Result<StaticDnsEntry> {
        self.call(
            ctx,
            "update_static_dns_entry_by_id",
            self.inner.update_static_dns_entry_by_id(ctx, id, entry),
        )
        .await
    }

    async fn delete_static_dns_entry_by_id(&self, ctx: &RequestContext, id: &str) -> Result<()> {
        self.call(ctx, "delete_static_dns_entry_by_id", self.inner.delete_static_dns_entry_by_id(ctx, id))
            .await
    }
}
