// # Document Store
//
// Durable implementation of ProvisioningStore backed by a JSON document
// database file.
//
// ## Model
//
// The database holds named collections. Each collection is a list of JSON
// documents identified by `_id` plus a set of single-field indexes. Unique
// indexes are checked under the write lock on every insert and replace, which
// makes them the authoritative guard against duplicate names.
//
// The typed layer maps records onto these primitives:
// - address list: `{_id, name, addresses: [{address, disabled, comment}]}`
// - static DNS entry: `{_id, name, regexp, address, ttl, disabled, comment}`
//   with `ttl` in seconds
//
// ## Crash Recovery
//
// - Atomic writes: every mutation is written to a temporary file, then renamed
// - Backup: the previous file is kept as `.backup`
// - Corruption detection: JSON validation on load
// - Recovery: falls back to the backup when the main file does not parse
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "updated_at": "2025-01-09T12:00:00Z",
//   "collections": {
//     "addressLists": {
//       "indexes": [{ "name": "nameUnique", "field": "name", "unique": true }],
//       "documents": [{ "_id": "5f0c...", "name": "office", "addresses": [] }]
//     }
//   }
// }
// ```

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::config::{ADDRESS_LIST_RESOURCE, DatabaseConfig, IndexConfig, STATIC_DNS_RESOURCE};
use crate::context::RequestContext;
use crate::duration::RouterOsDuration;
use crate::error::{Error, Result};
use crate::model::{Address, AddressList, PatchAction, StaticDnsEntry};
use crate::store::{StoredRecord, verified};
use crate::traits::store::ProvisioningStore;
use crate::validate::validate_addresses;

/// Database file format version
const DATABASE_FILE_VERSION: &str = "1.0";

const ID_FIELD: &str = "_id";
const ADDRESSES_FIELD: &str = "addresses";

type Document = Map<String, Value>;

/// Serializable database file
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DatabaseFile {
    version: String,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    collections: BTreeMap<String, CollectionData>,
}

impl DatabaseFile {
    fn empty() -> Self {
        Self {
            version: DATABASE_FILE_VERSION.to_string(),
            updated_at: Utc::now(),
            collections: BTreeMap::new(),
        }
    }

    fn collection(&self, name: &str) -> Option<&CollectionData> {
        self.collections.get(name)
    }

    fn collection_mut(&mut self, name: &str) -> &mut CollectionData {
        self.collections.entry(name.to_string()).or_default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CollectionData {
    #[serde(default)]
    indexes: Vec<IndexConfig>,
    #[serde(default)]
    documents: Vec<Document>,
}

impl CollectionData {
    fn position(&self, field: &str, value: &Value) -> Option<usize> {
        self.documents.iter().position(|d| d.get(field) == Some(value))
    }

    /// Reject `doc` if it repeats a value held under a unique index
    ///
    /// `skip` is the slot being replaced, if any.
    fn check_unique(&self, doc: &Document, skip: Option<usize>) -> Result<()> {
        for index in self.indexes.iter().filter(|i| i.unique) {
            let Some(value) = doc.get(&index.field) else {
                continue;
            };
            let clash = self
                .documents
                .iter()
                .enumerate()
                .any(|(i, other)| Some(i) != skip && other.get(&index.field) == Some(value));
            if clash {
                return Err(Error::conflict(format!(
                    "duplicate key for index '{}': {} = {value}",
                    index.name, index.field
                )));
            }
        }
        Ok(())
    }

    /// Whether existing documents already violate a prospective unique index
    fn has_duplicates(&self, field: &str) -> bool {
        let mut seen = HashSet::new();
        self.documents
            .iter()
            .filter_map(|d| d.get(field))
            .any(|v| !seen.insert(v.to_string()))
    }
}

/// Array update applied by `find_one_and_update`
#[derive(Debug, Clone)]
enum Update {
    /// Append every value
    Push { field: &'static str, values: Vec<Value> },
    /// Remove every element equal to one of the values
    Pull { field: &'static str, values: Vec<Value> },
}

impl Update {
    fn apply(self, doc: &mut Document) -> Result<()> {
        let (field, values, push) = match self {
            Update::Push { field, values } => (field, values, true),
            Update::Pull { field, values } => (field, values, false),
        };
        let slot = doc.entry(field).or_insert_with(|| Value::Array(Vec::new()));
        let Value::Array(items) = slot else {
            return Err(Error::storage(format!("field '{field}' is not an array")));
        };
        if push {
            items.extend(values);
        } else {
            items.retain(|item| !values.contains(item));
        }
        Ok(())
    }
}

/// Persisted address list layout
#[derive(Debug, Serialize, Deserialize)]
struct AddressListDocument {
    #[serde(rename = "_id", default, skip_serializing_if = "String::is_empty")]
    id: String,
    name: String,
    #[serde(default)]
    addresses: Vec<Address>,
}

impl From<AddressList> for AddressListDocument {
    fn from(list: AddressList) -> Self {
        Self {
            id: list.id.unwrap_or_default(),
            name: list.name,
            addresses: list.addresses,
        }
    }
}

impl From<AddressListDocument> for AddressList {
    fn from(doc: AddressListDocument) -> Self {
        Self {
            id: Some(doc.id),
            name: doc.name,
            addresses: doc.addresses,
        }
    }
}

/// Persisted static DNS layout, `ttl` in seconds
#[derive(Debug, Serialize, Deserialize)]
struct StaticDnsDocument {
    #[serde(rename = "_id", default, skip_serializing_if = "String::is_empty")]
    id: String,
    name: String,
    #[serde(default)]
    regexp: String,
    address: String,
    ttl: i64,
    #[serde(default)]
    disabled: bool,
    #[serde(default)]
    comment: String,
}

impl From<StaticDnsEntry> for StaticDnsDocument {
    fn from(entry: StaticDnsEntry) -> Self {
        Self {
            id: entry.id.unwrap_or_default(),
            name: entry.name,
            regexp: entry.regexp.unwrap_or_default(),
            address: entry.address,
            ttl: entry.ttl.as_secs(),
            disabled: entry.disabled,
            comment: entry.comment,
        }
    }
}

impl From<StaticDnsDocument> for StaticDnsEntry {
    fn from(doc: StaticDnsDocument) -> Self {
        Self {
            id: Some(doc.id),
            name: doc.name,
            regexp: Some(doc.regexp).filter(|r| !r.is_empty()),
            address: doc.address,
            ttl: RouterOsDuration::from_secs(doc.ttl),
            disabled: doc.disabled,
            comment: doc.comment,
        }
    }
}

fn to_document<T: Serialize>(value: T) -> Result<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::storage(format!("expected a JSON object, got {other}"))),
    }
}

fn from_document<D, T>(doc: Document) -> Result<T>
where
    D: DeserializeOwned + Into<T>,
    T: StoredRecord,
{
    let typed: D = serde_json::from_value(Value::Object(doc))
        .map_err(|e| Error::storage(format!("corrupt {} document: {e}", T::KIND)))?;
    verified(typed.into())
}

fn id_value(id: &str) -> Value {
    Value::String(id.to_string())
}

/// File-backed document store
///
/// # Example
///
/// ```rust,no_run
/// use mtprov_core::config::DatabaseConfig;
/// use mtprov_core::{AddressList, DocumentStore, ProvisioningStore, RequestContext};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = DocumentStore::open("/var/lib/mtprov/provisioning.json", &DatabaseConfig::default()).await?;
///     let ctx = RequestContext::background();
///
///     // Written to disk before returning
///     store.create_address_list(&ctx, AddressList::new("office", vec![])).await?;
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct DocumentStore {
    path: PathBuf,
    address_lists: String,
    static_dns: String,
    state: Arc<RwLock<DatabaseFile>>,
}

impl DocumentStore {
    /// Open or create the database file and bootstrap indexes
    ///
    /// This will:
    /// 1. Create parent directories if needed
    /// 2. Load the database, falling back to the backup if it is corrupt
    /// 3. Create configured indexes that do not exist yet
    pub async fn open<P: AsRef<Path>>(path: P, config: &DatabaseConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create database directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let collection_name = |resource: &str| {
            config
                .collection(resource)
                .map(|c| c.name.clone())
                .ok_or_else(|| Error::config(format!("no collection configured for '{resource}'")))
        };

        let store = Self {
            address_lists: collection_name(ADDRESS_LIST_RESOURCE)?,
            static_dns: collection_name(STATIC_DNS_RESOURCE)?,
            state: Arc::new(RwLock::new(Self::load_with_recovery(&path).await?)),
            path,
        };
        store.ensure_indexes(config).await?;
        Ok(store)
    }

    /// Load the database with automatic recovery
    ///
    /// Recovery strategy:
    /// 1. Try the main file
    /// 2. If it does not parse, try the backup and restore it
    /// 3. If the backup is missing or also corrupt, refuse to start
    async fn load_with_recovery(path: &Path) -> Result<DatabaseFile> {
        let parse_error = match Self::load(path).await {
            Ok(db) => {
                tracing::debug!(collections = db.collections.len(), "loaded document database");
                return Ok(db);
            }
            Err(Error::Json(e)) => e,
            Err(e) => return Err(e),
        };

        tracing::warn!(
            "Database file {} appears corrupted: {}. Attempting recovery from backup.",
            path.display(),
            parse_error
        );

        let backup_path = Self::backup_path(path);
        if !backup_path.exists() {
            return Err(Error::storage(format!(
                "database file {} is corrupt and no backup exists: {parse_error}",
                path.display()
            )));
        }

        match Self::load(&backup_path).await {
            Ok(db) => {
                tracing::info!("Recovered database from backup {}", backup_path.display());
                if let Err(e) = fs::copy(&backup_path, path).await {
                    tracing::error!("Failed to restore database file from backup: {}", e);
                }
                Ok(db)
            }
            Err(backup_err) => Err(Error::storage(format!(
                "database file {} and its backup are both unreadable: {parse_error}; {backup_err}",
                path.display()
            ))),
        }
    }

    async fn load(path: &Path) -> Result<DatabaseFile> {
        if !path.exists() {
            tracing::debug!("Database file does not exist: {}", path.display());
            return Ok(DatabaseFile::empty());
        }

        let content = fs::read_to_string(path).await?;
        let db: DatabaseFile = serde_json::from_str(&content)?;

        if db.version != DATABASE_FILE_VERSION {
            tracing::warn!(
                "Database file version mismatch: expected {}, got {}. Attempting to load anyway.",
                DATABASE_FILE_VERSION,
                db.version
            );
        }
        Ok(db)
    }

    /// Create configured indexes that are missing
    ///
    /// Existing indexes are matched by name and left alone, so this is safe on
    /// every start. A unique index on `name` is always present.
    async fn ensure_indexes(&self, config: &DatabaseConfig) -> Result<()> {
        let mut wanted: Vec<(String, Vec<IndexConfig>)> = Vec::new();
        for (resource, collection) in [
            (ADDRESS_LIST_RESOURCE, &self.address_lists),
            (STATIC_DNS_RESOURCE, &self.static_dns),
        ] {
            let mut indexes = config
                .collection(resource)
                .map(|c| c.indexes.clone())
                .unwrap_or_default();
            if !indexes.iter().any(|i| i.unique && i.field == "name") {
                tracing::warn!(collection = %collection, "no unique index on 'name' configured, adding one");
                indexes.push(IndexConfig::unique("nameUnique", "name"));
            }
            wanted.push((collection.clone(), indexes));
        }

        self.write(|db| {
            for (collection, indexes) in wanted {
                let data = db.collection_mut(&collection);
                for index in indexes {
                    if data.indexes.iter().any(|existing| existing.name == index.name) {
                        tracing::debug!(collection = %collection, index = %index.name, "index exists");
                        continue;
                    }
                    if index.unique && data.has_duplicates(&index.field) {
                        return Err(Error::storage(format!(
                            "cannot create unique index '{}' on {collection}.{}: duplicate values exist",
                            index.name, index.field
                        )));
                    }
                    tracing::info!(collection = %collection, index = %index.name, field = %index.field, "index created");
                    data.indexes.push(index);
                }
            }
            Ok(())
        })
        .await
    }

    /// Apply a mutation to a copy of the database, persist it, then publish it
    ///
    /// Writers are serialized by the lock; a failed write leaves the
    /// in-memory state untouched.
    async fn write<T, F>(&self, mutate: F) -> Result<T>
    where
        F: FnOnce(&mut DatabaseFile) -> Result<T> + Send,
        T: Send,
    {
        let mut guard = self.state.write().await;
        let mut next = guard.clone();
        let out = mutate(&mut next)?;
        next.updated_at = Utc::now();
        self.persist(&next).await?;
        *guard = next;
        Ok(out)
    }

    async fn read<T, F>(&self, query: F) -> T
    where
        F: FnOnce(&DatabaseFile) -> T + Send,
    {
        let guard = self.state.read().await;
        query(&*guard)
    }

    /// Write the database atomically
    async fn persist(&self, db: &DatabaseFile) -> Result<()> {
        let json = serde_json::to_string_pretty(db)?;

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::storage(format!(
                    "Failed to create temp file {}: {e}",
                    temp_path.display()
                ))
            })?;
            file.write_all(json.as_bytes()).await?;
            file.flush().await?;
            file.sync_all().await?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::storage(format!(
                "Failed to rename {} to {}: {e}",
                temp_path.display(),
                self.path.display()
            ))
        })?;

        tracing::trace!("Database written to {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Index names present on a collection
    pub async fn index_names(&self, collection: &str) -> Vec<String> {
        self.read(|db| {
            db.collection(collection)
                .map(|c| c.indexes.iter().map(|i| i.name.clone()).collect())
                .unwrap_or_default()
        })
        .await
    }

    // Document primitives

    async fn insert_one(&self, collection: &str, mut doc: Document) -> Result<Document> {
        doc.insert(ID_FIELD.to_string(), Value::String(uuid::Uuid::new_v4().simple().to_string()));
        self.write(|db| {
            let data = db.collection_mut(collection);
            data.check_unique(&doc, None)?;
            data.documents.push(doc.clone());
            Ok(doc)
        })
        .await
    }

    async fn find(&self, collection: &str) -> Vec<Document> {
        self.read(|db| db.collection(collection).map(|c| c.documents.clone()).unwrap_or_default())
            .await
    }

    async fn find_one(&self, collection: &str, field: &str, value: &Value) -> Option<Document> {
        self.read(|db| {
            let data = db.collection(collection)?;
            data.position(field, value).map(|i| data.documents[i].clone())
        })
        .await
    }

    /// Replace the first match, keeping its `_id`; returns the new document
    async fn find_one_and_replace(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
        mut replacement: Document,
    ) -> Result<Option<Document>> {
        self.write(|db| {
            let data = db.collection_mut(collection);
            let Some(i) = data.position(field, value) else {
                return Ok(None);
            };
            if let Some(id) = data.documents[i].get(ID_FIELD) {
                replacement.insert(ID_FIELD.to_string(), id.clone());
            }
            data.check_unique(&replacement, Some(i))?;
            data.documents[i] = replacement.clone();
            Ok(Some(replacement))
        })
        .await
    }

    /// Apply an array update to the first match; returns the new document
    async fn find_one_and_update(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
        update: Update,
    ) -> Result<Option<Document>> {
        self.write(|db| {
            let data = db.collection_mut(collection);
            let Some(i) = data.position(field, value) else {
                return Ok(None);
            };
            update.apply(&mut data.documents[i])?;
            Ok(Some(data.documents[i].clone()))
        })
        .await
    }

    /// Returns the number of deleted documents
    async fn delete_one(&self, collection: &str, field: &str, value: &Value) -> Result<u64> {
        self.write(|db| {
            let data = db.collection_mut(collection);
            match data.position(field, value) {
                Some(i) => {
                    data.documents.remove(i);
                    Ok(1)
                }
                None => Ok(0),
            }
        })
        .await
    }

    async fn address_list_by_id(&self, id: &str) -> Result<AddressList> {
        let doc = self
            .find_one(&self.address_lists, ID_FIELD, &id_value(id))
            .await
            .ok_or_else(|| Error::not_found(format!("address list with id {id}")))?;
        from_document::<AddressListDocument, AddressList>(doc)
    }
}

#[async_trait]
impl ProvisioningStore for DocumentStore {
    fn backend_name(&self) -> &'static str {
        "document"
    }

    async fn create_address_list(&self, ctx: &RequestContext, list: AddressList) -> Result<AddressList> {
        ctx.run("create_address_list", async {
            let doc = to_document(AddressListDocument::from(AddressList { id: None, ..list }))?;
            let created = self.insert_one(&self.address_lists, doc).await?;
            let created = from_document::<AddressListDocument, AddressList>(created)?;
            tracing::info!(name = %created.name, "address list created");
            Ok(created)
        })
        .await
    }

    async fn get_all_address_lists(&self, ctx: &RequestContext) -> Result<Vec<AddressList>> {
        ctx.run("get_all_address_lists", async {
            self.find(&self.address_lists)
                .await
                .into_iter()
                .map(from_document::<AddressListDocument, AddressList>)
                .collect()
        })
        .await
    }

    async fn get_address_list_by_name(&self, ctx: &RequestContext, name: &str) -> Result<Option<AddressList>> {
        ctx.run("get_address_list_by_name", async {
            let doc = self
                .find_one(&self.address_lists, "name", &Value::String(name.to_string()))
                .await;
            tracing::debug!(name, found = doc.is_some(), "address list lookup");
            doc.map(from_document::<AddressListDocument, AddressList>).transpose()
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
            let doc = to_document(AddressListDocument::from(AddressList { id: None, ..list }))?;
            let updated = self
                .find_one_and_replace(&self.address_lists, ID_FIELD, &id_value(id), doc)
                .await?
                .ok_or_else(|| Error::not_found(format!("address list with id {id}")))?;
            let updated = from_document::<AddressListDocument, AddressList>(updated)?;
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
            let current = self.address_list_by_id(id).await?;

            // Compute the delta against the current state
            let mut delta: Vec<&Address> = Vec::new();
            for address in addresses {
                let present = current.contains(address);
                let wanted = match action {
                    PatchAction::Add => !present,
                    PatchAction::Remove => present,
                };
                if wanted && !delta.contains(&address) {
                    delta.push(address);
                }
            }

            if !delta.is_empty() {
                let values = delta
                    .iter()
                    .map(|a| serde_json::to_value(a).map_err(Error::from))
                    .collect::<Result<Vec<_>>>()?;
                let update = match action {
                    PatchAction::Add => Update::Push { field: ADDRESSES_FIELD, values },
                    PatchAction::Remove => Update::Pull { field: ADDRESSES_FIELD, values },
                };
                self.find_one_and_update(&self.address_lists, ID_FIELD, &id_value(id), update)
                    .await?
                    .ok_or_else(|| Error::not_found(format!("address list with id {id}")))?;
            }
            tracing::info!(id, %action, changed = delta.len(), "address list patched");

            self.address_list_by_id(id).await
        })
        .await
    }

    async fn delete_address_list_by_id(&self, ctx: &RequestContext, id: &str) -> Result<()> {
        ctx.run("delete_address_list_by_id", async {
            let deleted = self.delete_one(&self.address_lists, ID_FIELD, &id_value(id)).await?;
            if deleted == 0 {
                return Err(Error::not_found(format!("address list with id {id}")));
            }
            tracing::info!(id, "address list deleted");
            Ok(())
        })
        .await
    }

    async fn create_static_dns_entry(&self, ctx: &RequestContext, entry: StaticDnsEntry) -> Result<StaticDnsEntry> {
        ctx.run("create_static_dns_entry", async {
            let doc = to_document(StaticDnsDocument::from(StaticDnsEntry { id: None, ..entry }))?;
            let created = self.insert_one(&self.static_dns, doc).await?;
            let created = from_document::<StaticDnsDocument, StaticDnsEntry>(created)?;
            tracing::info!(name = %created.name, "static DNS entry created");
            Ok(created)
        })
        .await
    }

    async fn get_all_static_dns(&self, ctx: &RequestContext) -> Result<Vec<StaticDnsEntry>> {
        ctx.run("get_all_static_dns", async {
            self.find(&self.static_dns)
                .await
                .into_iter()
                .map(from_document::<StaticDnsDocument, StaticDnsEntry>)
                .collect()
        })
        .await
    }

    async fn get_static_dns_entry_by_name(
        &self,
        ctx: &RequestContext,
        name: &str,
    ) -> Result<Option<StaticDnsEntry>> {
        ctx.run("get_static_dns_entry_by_name", async {
            let doc = self
                .find_one(&self.static_dns, "name", &Value::String(name.to_string()))
                .await;
            tracing::debug!(name, found = doc.is_some(), "static DNS lookup");
            doc.map(from_document::<StaticDnsDocument, StaticDnsEntry>).transpose()
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
            let doc = to_document(StaticDnsDocument::from(StaticDnsEntry { id: None, ..entry }))?;
            let updated = self
                .find_one_and_replace(&self.static_dns, ID_FIELD, &id_value(id), doc)
                .await?
                .ok_or_else(|| Error::not_found(format!("static DNS entry with id {id}")))?;
            let updated = from_document::<StaticDnsDocument, StaticDnsEntry>(updated)?;
            tracing::info!(id, name = %updated.name, "static DNS entry replaced");
            Ok(updated)
        })
        .await
    }

    async fn delete_static_dns_entry_by_id(&self, ctx: &RequestContext, id: &str) -> Result<()> {
        ctx.run("delete_static_dns_entry_by_id", async {
            let deleted = self.delete_one(&self.static_dns, ID_FIELD, &id_value(id)).await?;
            if deleted == 0 {
                return Err(Error::not_found(format!("static DNS entry with id {id}")));
            }
            tracing::info!(id, "static DNS entry deleted");
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::tempdir;

    async fn open_in(dir: &Path) -> DocumentStore {
        DocumentStore::open(dir.join("provisioning.json"), &DatabaseConfig::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_document_store_persists() {
        let dir = tempdir().unwrap();
        let ctx = RequestContext::background();

        let store = open_in(dir.path()).await;
        let created = store
            .create_address_list(&ctx, AddressList::new("office", vec![Address::new("10.0.0.1")]))
            .await
            .unwrap();
        let entry = StaticDnsEntry::new("a.example.com", "1.2.3.4", RouterOsDuration::from_secs(3600))
            .with_regexp(".*\\.example\\.com");
        store.create_static_dns_entry(&ctx, entry).await.unwrap();
        drop(store);

        // Load new instance and verify persistence
        let store = open_in(dir.path()).await;
        let found = store.get_address_list_by_name(&ctx, "office").await.unwrap();
        assert_eq!(found, Some(created));
        let entry = store
            .get_static_dns_entry_by_name(&ctx, "a.example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.ttl.as_secs(), 3600);
        assert_eq!(entry.regexp.as_deref(), Some(".*\\.example\\.com"));
    }

    #[tokio::test]
    async fn test_document_layout_stores_ttl_seconds() {
        let dir = tempdir().unwrap();
        let ctx = RequestContext::background();
        let store = open_in(dir.path()).await;

        let entry = StaticDnsEntry::new("a.example.com", "1.2.3.4", RouterOsDuration::from_secs(90));
        store.create_static_dns_entry(&ctx, entry).await.unwrap();

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        let doc = &raw["collections"]["staticDns"]["documents"][0];
        assert_eq!(doc["ttl"], Value::from(90));
        assert_eq!(doc["name"], Value::from("a.example.com"));
        assert!(doc["_id"].is_string());
    }

    #[tokio::test]
    async fn test_index_bootstrap_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = open_in(dir.path()).await;
        assert_eq!(store.index_names("addressLists").await, ["nameUnique"]);
        drop(store);

        let store = open_in(dir.path()).await;
        assert_eq!(store.index_names("addressLists").await, ["nameUnique"]);
        assert_eq!(store.index_names("staticDns").await, ["nameUnique"]);
    }

    #[tokio::test]
    async fn test_unique_index_enforced() {
        let dir = tempdir().unwrap();
        let ctx = RequestContext::background();
        let store = open_in(dir.path()).await;

        store.create_address_list(&ctx, AddressList::new("a", vec![])).await.unwrap();
        let err = store
            .create_address_list(&ctx, AddressList::new("a", vec![]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let b = store.create_address_list(&ctx, AddressList::new("b", vec![])).await.unwrap();
        let err = store
            .update_address_list_by_id(&ctx, b.id.as_deref().unwrap(), AddressList::new("a", vec![]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        // Replacing a document with its own name is fine
        store
            .update_address_list_by_id(&ctx, b.id.as_deref().unwrap(), AddressList::new("b", vec![Address::new("10.0.0.9")]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_document_store_corruption_recovery() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("provisioning.json");
        let ctx = RequestContext::background();

        let store = open_in(dir.path()).await;
        store.create_address_list(&ctx, AddressList::new("first", vec![])).await.unwrap();
        store.create_address_list(&ctx, AddressList::new("second", vec![])).await.unwrap();
        drop(store);

        let backup_path = DocumentStore::backup_path(&path);
        assert!(backup_path.exists(), "Backup file should exist after write");

        fs::write(&path, b"corrupted json data").await.unwrap();

        // Backup holds the state before the last write
        let store = open_in(dir.path()).await;
        assert!(store.get_address_list_by_name(&ctx, "first").await.unwrap().is_some());
        assert!(store.get_address_list_by_name(&ctx, "second").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corruption_without_backup_refuses_to_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("provisioning.json");
        fs::write(&path, b"{ not json").await.unwrap();

        let err = DocumentStore::open(&path, &DatabaseConfig::default()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[tokio::test]
    async fn test_corrupt_document_is_storage_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("provisioning.json");
        let ctx = RequestContext::background();

        let store = open_in(dir.path()).await;
        store.create_address_list(&ctx, AddressList::new("office", vec![])).await.unwrap();
        drop(store);

        // Hand-edit a name that breaks the field rules
        let content = std::fs::read_to_string(&path).unwrap().replace("\"office\"", "\"off ice\"");
        std::fs::write(&path, content).unwrap();

        let store = open_in(dir.path()).await;
        let err = store.get_all_address_lists(&ctx).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[tokio::test]
    async fn test_patch_push_and_pull() {
        let dir = tempdir().unwrap();
        let ctx = RequestContext::background();
        let store = open_in(dir.path()).await;

        let list = store
            .create_address_list(&ctx, AddressList::new("office", vec![Address::new("10.0.0.1")]))
            .await
            .unwrap();
        let id = list.id.unwrap();

        let added = store
            .update_entries_in_address_list(
                &ctx,
                PatchAction::Add,
                &id,
                &[Address::new("10.0.0.1"), Address::new("10.0.0.2"), Address::new("10.0.0.2")],
            )
            .await
            .unwrap();
        assert_eq!(added.addresses, vec![Address::new("10.0.0.1"), Address::new("10.0.0.2")]);

        let removed = store
            .update_entries_in_address_list(
                &ctx,
                PatchAction::Remove,
                &id,
                &[Address::new("10.0.0.1"), Address::new("10.9.9.9")],
            )
            .await
            .unwrap();
        assert_eq!(removed.addresses, vec![Address::new("10.0.0.2")]);

        let err = store
            .update_entries_in_address_list(&ctx, PatchAction::Add, "missing", &[Address::new("10.0.0.3")])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
