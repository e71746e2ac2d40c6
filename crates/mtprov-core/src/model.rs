//! Domain model
//!
//! These types are both the domain entities and their JSON representation.
//! Storage backends keep their own persisted layout and convert at the
//! boundary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::duration::RouterOsDuration;
use crate::error::Error;

fn is_false(b: &bool) -> bool {
    !*b
}

/// One entry of an address list
///
/// Equality is structural over all three fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    /// IPv4 address or fully-qualified domain name
    pub address: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub disabled: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

impl Address {
    /// Create an enabled address without comment
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            disabled: false,
            comment: String::new(),
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }
}

/// A named set of addresses, rendered as a firewall address-list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressList {
    /// Identifier assigned by storage on creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Unique list name, `[A-Za-z0-9-]+`
    pub name: String,

    pub addresses: Vec<Address>,
}

impl AddressList {
    /// Create an unsaved list
    pub fn new(name: impl Into<String>, addresses: Vec<Address>) -> Self {
        Self {
            id: None,
            name: name.into(),
            addresses,
        }
    }

    /// Whether a structurally equal address is already in the list
    pub fn contains(&self, address: &Address) -> bool {
        self.addresses.contains(address)
    }

    /// Append every address not yet present
    ///
    /// Returns how many were added.
    pub fn add_addresses(&mut self, addresses: &[Address]) -> usize {
        let before = self.addresses.len();
        for address in addresses {
            if !self.contains(address) {
                self.addresses.push(address.clone());
            }
        }
        self.addresses.len() - before
    }

    /// Drop every address structurally equal to one of `addresses`
    ///
    /// Returns how many were removed.
    pub fn remove_addresses(&mut self, addresses: &[Address]) -> usize {
        let before = self.addresses.len();
        self.addresses.retain(|a| !addresses.contains(a));
        before - self.addresses.len()
    }

    /// Apply an incremental patch in place
    pub fn apply(&mut self, action: PatchAction, addresses: &[Address]) -> usize {
        match action {
            PatchAction::Add => self.add_addresses(addresses),
            PatchAction::Remove => self.remove_addresses(addresses),
        }
    }
}

/// A static DNS name-to-address mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticDnsEntry {
    /// Identifier assigned by storage on creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Unique fully-qualified name
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regexp: Option<String>,

    /// IPv4 address the name resolves to
    pub address: String,

    pub ttl: RouterOsDuration,

    #[serde(default, skip_serializing_if = "is_false")]
    pub disabled: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

impl StaticDnsEntry {
    /// Create an unsaved, enabled entry
    pub fn new(name: impl Into<String>, address: impl Into<String>, ttl: RouterOsDuration) -> Self {
        Self {
            id: None,
            name: name.into(),
            regexp: None,
            address: address.into(),
            ttl,
            disabled: false,
            comment: String::new(),
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn with_regexp(mut self, regexp: impl Into<String>) -> Self {
        self.regexp = Some(regexp.into());
        self
    }
}

/// Incremental mutation of an address list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchAction {
    Add,
    Remove,
}

impl PatchAction {
    pub fn as_str(self) -> &'static str {
        match self {
            PatchAction::Add => "add",
            PatchAction::Remove => "remove",
        }
    }
}

impl fmt::Display for PatchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatchAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(PatchAction::Add),
            "remove" => Ok(PatchAction::Remove),
            other => Err(Error::validation("action", "oneof=add remove", other)),
        }
    }
}

/// Body of an address list patch request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressListPatch {
    pub action: PatchAction,
    pub addresses: Vec<Address>,
}

impl AddressListPatch {
    pub fn add(addresses: Vec<Address>) -> Self {
        Self {
            action: PatchAction::Add,
            addresses,
        }
    }

    pub fn remove(addresses: Vec<Address>) -> Self {
        Self {
            action: PatchAction::Remove,
            addresses,
        }
    }
}

/// Body of a batch static DNS request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticDnsBatch {
    pub entries: Vec<StaticDnsEntry>,
}
