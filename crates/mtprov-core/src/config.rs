//! Configuration types for the provisioning system
//!
//! Configuration is read once at startup and never reloaded. It can be built
//! in code, taken from [`ProvisioningConfig::default`], or loaded from JSON:
//!
//! ```json
//! {
//!   "access": { "users": [{ "access_key": "...", "secret_key": "..." }] },
//!   "database": {
//!     "dsn": "file:///var/lib/mtprov",
//!     "name": "provisioning",
//!     "timeout_secs": 5,
//!     "collections": [
//!       { "resource": "address-list", "name": "addressLists",
//!         "indexes": [{ "name": "nameUnique", "field": "name", "unique": true }] },
//!       { "resource": "static-dns", "name": "staticDns",
//!         "indexes": [{ "name": "nameUnique", "field": "name", "unique": true }] }
//!     ]
//!   }
//! }
//! ```

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Resource key for address lists
pub const ADDRESS_LIST_RESOURCE: &str = "address-list";

/// Resource key for static DNS entries
pub const STATIC_DNS_RESOURCE: &str = "static-dns";

const MEMORY_SCHEME: &str = "memory://";
const FILE_SCHEME: &str = "file://";

static ACCESS_KEY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z0-9]{24}$").expect("static pattern"));
static SECRET_KEY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-f0-9]{64}$").expect("static pattern"));

/// Main provisioning configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    /// API credentials
    #[serde(default)]
    pub access: AccessConfig,

    /// Storage settings
    #[serde(default)]
    pub database: DatabaseConfig,
}

impl ProvisioningConfig {
    /// Parse a JSON document
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| Error::config(format!("invalid configuration: {e}")))
    }

    /// Read and parse a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_json_str(&content)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.access.validate()?;
        self.database.validate()
    }
}

/// Access credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessConfig {
    #[serde(default)]
    pub users: Vec<AccessUser>,
}

impl AccessConfig {
    pub fn validate(&self) -> Result<()> {
        self.users.iter().try_for_each(AccessUser::validate)
    }

    /// Whether the pair matches a configured user
    pub fn is_authorized(&self, access_key: &str, secret_key: &str) -> bool {
        self.users
            .iter()
            .any(|u| u.access_key == access_key && u.secret_key == secret_key)
    }
}

/// One access key / secret key pair
#[derive(Clone, Serialize, Deserialize)]
pub struct AccessUser {
    /// 24 upper-case alphanumerics
    pub access_key: String,
    /// 64 lower-case hex digits
    pub secret_key: String,
}

impl AccessUser {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !ACCESS_KEY.is_match(&self.access_key) {
            return Err(Error::config(format!(
                "access key '{}' must be 24 upper-case letters or digits",
                self.access_key
            )));
        }
        if !SECRET_KEY.is_match(&self.secret_key) {
            return Err(Error::config(format!(
                "secret key for '{}' must be 64 lower-case hex digits",
                self.access_key
            )));
        }
        Ok(())
    }
}

// Secret keys never reach logs
impl fmt::Debug for AccessUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessUser")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Storage backend selected by the DSN
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// `memory://`
    Memory,
    /// `file://<dir>`
    Document { dir: PathBuf },
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `memory://` or `file://<dir>`
    #[serde(default = "default_dsn")]
    pub dsn: String,

    /// Database name, also the document file stem
    #[serde(default = "default_database_name")]
    pub name: String,

    /// Collection per resource
    #[serde(default = "default_collections")]
    pub collections: Vec<CollectionConfig>,

    /// Per-operation storage deadline in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl DatabaseConfig {
    /// Resolve the DSN into a backend
    pub fn backend(&self) -> Result<Backend> {
        if self.dsn == MEMORY_SCHEME {
            return Ok(Backend::Memory);
        }
        if let Some(dir) = self.dsn.strip_prefix(FILE_SCHEME) {
            if dir.is_empty() {
                return Err(Error::config("file:// DSN needs a directory path"));
            }
            return Ok(Backend::Document { dir: PathBuf::from(dir) });
        }
        Err(Error::config(format!(
            "unsupported DSN '{}'. Supported: memory://, file://<dir>",
            self.dsn
        )))
    }

    /// Storage deadline as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Collection settings for a resource
    pub fn collection(&self, resource: &str) -> Option<&CollectionConfig> {
        self.collections.iter().find(|c| c.resource == resource)
    }

    pub fn validate(&self) -> Result<()> {
        self.backend()?;

        if !is_alphanumeric(&self.name) {
            return Err(Error::config(format!(
                "database name '{}' must be non-empty and alphanumeric",
                self.name
            )));
        }
        if self.timeout_secs == 0 {
            return Err(Error::config("database timeout must be at least 1 second"));
        }

        let mut seen = HashSet::new();
        for collection in &self.collections {
            collection.validate()?;
            if !seen.insert(collection.resource.as_str()) {
                return Err(Error::config(format!(
                    "resource '{}' is mapped more than once",
                    collection.resource
                )));
            }
        }
        for resource in [ADDRESS_LIST_RESOURCE, STATIC_DNS_RESOURCE] {
            if !seen.contains(resource) {
                return Err(Error::config(format!("no collection configured for '{resource}'")));
            }
        }
        Ok(())
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dsn: default_dsn(),
            name: default_database_name(),
            collections: default_collections(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Maps a resource to a collection and its indexes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// `address-list` or `static-dns`
    pub resource: String,

    /// Collection name
    pub name: String,

    #[serde(default)]
    pub indexes: Vec<IndexConfig>,
}

impl CollectionConfig {
    pub fn new(resource: impl Into<String>, name: impl Into<String>, indexes: Vec<IndexConfig>) -> Self {
        Self {
            resource: resource.into(),
            name: name.into(),
            indexes,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.resource != ADDRESS_LIST_RESOURCE && self.resource != STATIC_DNS_RESOURCE {
            return Err(Error::config(format!(
                "unknown resource '{}'. Known: {ADDRESS_LIST_RESOURCE}, {STATIC_DNS_RESOURCE}",
                self.resource
            )));
        }
        if !is_alphanumeric(&self.name) {
            return Err(Error::config(format!(
                "collection name '{}' must be non-empty and alphanumeric",
                self.name
            )));
        }
        self.indexes.iter().try_for_each(IndexConfig::validate)
    }
}

/// A single-field index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub name: String,
    pub field: String,
    #[serde(default)]
    pub unique: bool,
}

impl IndexConfig {
    /// Unique index on one field
    pub fn unique(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field: field.into(),
            unique: true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !is_alphanumeric(&self.name) || !is_alphanumeric(&self.field) {
            return Err(Error::config(format!(
                "index '{}' on '{}': name and field must be non-empty and alphanumeric",
                self.name, self.field
            )));
        }
        Ok(())
    }
}

fn is_alphanumeric(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric())
}

fn default_dsn() -> String {
    MEMORY_SCHEME.to_string()
}

fn default_database_name() -> String {
    "provisioning".to_string()
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_collections() -> Vec<CollectionConfig> {
    vec![
        CollectionConfig::new(
            ADDRESS_LIST_RESOURCE,
            "addressLists",
            vec![IndexConfig::unique("nameUnique", "name")],
        ),
        CollectionConfig::new(
            STATIC_DNS_RESOURCE,
            "staticDns",
            vec![IndexConfig::unique("nameUnique", "name")],
        ),
    ]
}
