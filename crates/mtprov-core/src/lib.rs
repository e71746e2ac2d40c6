// # mtprov-core
//
// Core library for provisioning MikroTik routers with address lists and
// static DNS entries.
//
// ## Architecture Overview
//
// - **Model**: `AddressList`, `StaticDnsEntry` and the patch/batch request bodies
// - **Validate**: field rules checked before every write and after every read
// - **ProvisioningStore**: trait for persistence, with memory and document backends
// - **ProvisioningService**: orchestration layer a transport talks to
// - **rsc**: RouterOS script rendering of stored records
//
// ## Design Principles
//
// 1. **Separation of Concerns**: the service depends on the store trait, never a backend
// 2. **Explicit Deadlines**: every storage call takes a `RequestContext`
// 3. **Typed Errors**: callers branch on `Error::kind`, not on message text
// 4. **Library-First**: the binary is a thin shell over this crate

pub mod config;
pub mod context;
pub mod duration;
pub mod error;
pub mod model;
pub mod rsc;
pub mod service;
pub mod store;
pub mod traits;
pub mod validate;

// Re-export core types for convenience
pub use config::{AccessConfig, AccessUser, CollectionConfig, DatabaseConfig, IndexConfig, ProvisioningConfig};
pub use context::RequestContext;
pub use duration::{ParseError, RouterOsDuration};
pub use error::{Error, ErrorKind, Result};
pub use model::{Address, AddressList, AddressListPatch, PatchAction, StaticDnsBatch, StaticDnsEntry};
pub use service::ProvisioningService;
pub use store::{DocumentStore, MemoryStore, connect};
pub use traits::ProvisioningStore;
pub use validate::{Validate, decode};
