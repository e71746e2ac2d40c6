// # Store Implementations
//
// This module provides implementations of the ProvisioningStore trait for
// different persistence strategies, and `connect` to open the one named by
// the configured DSN.

pub mod document;
pub mod memory;

use std::sync::Arc;

pub use document::DocumentStore;
pub use memory::MemoryStore;

use crate::config::{Backend, DatabaseConfig};
use crate::error::{Error, Result};
use crate::model::{AddressList, StaticDnsEntry};
use crate::traits::store::ProvisioningStore;
use crate::validate::Validate;

/// Open the backend selected by `config.dsn`
///
/// `file://<dir>` keeps the database in `<dir>/<name>.json` and creates the
/// configured indexes that are missing.
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn ProvisioningStore>> {
    config.validate()?;

    match config.backend()? {
        Backend::Memory => {
            tracing::info!("using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
        Backend::Document { dir } => {
            let path = dir.join(format!("{}.json", config.name));
            tracing::info!(path = %path.display(), "using document store");
            Ok(Arc::new(DocumentStore::open(path, config).await?))
        }
    }
}

/// A record kept in a collection with a unique name
pub(crate) trait StoredRecord: Validate {
    /// Resource label for messages
    const KIND: &'static str;

    fn name(&self) -> &str;

    fn set_id(&mut self, id: String);
}

impl StoredRecord for AddressList {
    const KIND: &'static str = "address list";

    fn name(&self) -> &str {
        &self.name
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}

impl StoredRecord for StaticDnsEntry {
    const KIND: &'static str = "static DNS entry";

    fn name(&self) -> &str {
        &self.name
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}

/// Re-check a record read back from storage
///
/// A stored record that breaks a field rule means the store is corrupt, which
/// is a backend failure rather than bad client input.
pub(crate) fn verified<T: StoredRecord>(record: T) -> Result<T> {
    match record.validate() {
        Ok(()) => Ok(record),
        Err(e) => {
            tracing::warn!(kind = T::KIND, name = record.name(), error = %e, "stored record failed validation");
            Err(Error::storage(format!(
                "stored {} '{}' is invalid: {e}",
                T::KIND,
                record.name()
            )))
        }
    }
}
