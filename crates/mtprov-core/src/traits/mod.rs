//! Core traits for the provisioning system
//!
//! - [`ProvisioningStore`]: Persistence of address lists and static DNS entries

pub mod store;

pub use store::ProvisioningStore;
