//! Field validation
//!
//! Every mutating storage call is preceded by [`Validate::validate`], and
//! backends run it again on records read back from storage. Failures are
//! reported as [`Error::Validation`] naming the field path and the rule.

use std::net::Ipv4Addr;
use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::duration::RouterOsDuration;
use crate::error::{Error, Result};
use crate::model::{Address, AddressList, AddressListPatch, PatchAction, StaticDnsBatch, StaticDnsEntry};

static ADDRESS_LIST_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9-]+$").expect("static pattern"));

// Latin and Cyrillic letters, digits, the plain space and `,.:-`. Keeps
// comments on one line inside a quoted RouterOS script argument.
static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-zА-Яа-яЁё0-9 ,.:-]+$").expect("static pattern"));

/// Types that can check their own field rules
pub trait Validate {
    /// Check every field, stopping at the first violation
    fn validate(&self) -> Result<()>;
}

/// Strict dotted-quad IPv4
pub fn is_ipv4(s: &str) -> bool {
    s.parse::<Ipv4Addr>().is_ok()
}

/// Fully-qualified domain name
///
/// At least two labels, each 1-63 characters of ASCII alphanumerics and
/// hyphens, not starting or ending with a hyphen. The top-level label must
/// start with a letter. A single trailing dot is allowed.
pub fn is_fqdn(s: &str) -> bool {
    let name = s.strip_suffix('.').unwrap_or(s);
    if name.is_empty() || name.len() > 253 {
        return false;
    }

    let labels: Vec<&str> = name.split('.').collect();
    if labels.len() < 2 {
        return false;
    }

    let labels_ok = labels.iter().all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            && !label.starts_with('-')
            && !label.ends_with('-')
    });

    labels_ok
        && labels
            .last()
            .and_then(|tld| tld.chars().next())
            .is_some_and(|c| c.is_ascii_alphabetic())
}

/// Address list names: `[A-Za-z0-9-]+`
pub fn is_address_list_name(s: &str) -> bool {
    ADDRESS_LIST_NAME.is_match(s)
}

/// Restricted free text for comments
pub fn is_comment(s: &str) -> bool {
    COMMENT.is_match(s)
}

/// Parse a TTL taken from request input
///
/// Parse failures surface as a validation error on `ttl`.
pub fn parse_ttl(value: &str) -> Result<RouterOsDuration> {
    RouterOsDuration::parse(value).map_err(|e| {
        tracing::debug!(value, error = %e, "rejected ttl");
        Error::validation("ttl", "duration", value)
    })
}

/// Decode and validate a JSON request body
///
/// Every failure is a validation error naming the offending field:
/// - malformed JSON is reported on `body`
/// - `ttl` strings go through [`parse_ttl`], `action` through [`PatchAction`]
/// - shape errors name the missing or mistyped field when serde reports one
/// - the decoded value must then pass [`Validate::validate`]
///
/// ```rust
/// use mtprov_core::{ErrorKind, StaticDnsEntry, validate::decode};
///
/// let err = decode::<StaticDnsEntry>(br#"{"name":"a.example.com","address":"1.2.3.4","ttl":"5x"}"#)
///     .unwrap_err();
/// assert_eq!(err.kind(), ErrorKind::Validation);
/// ```
pub fn decode<T>(body: &[u8]) -> Result<T>
where
    T: DeserializeOwned + Validate,
{
    let value: Value =
        serde_json::from_slice(body).map_err(|e| Error::validation("body", "json", e.to_string()))?;
    check_request_fields("", &value)?;

    let decoded: T = serde_json::from_value(value).map_err(|e| {
        let message = e.to_string();
        let field = missing_field(&message).unwrap_or("body").to_string();
        Error::validation(field, "decode", message)
    })?;
    decoded.validate()?;
    Ok(decoded)
}

// Walks the body so that `ttl` and `action` errors carry their JSON path
fn check_request_fields(prefix: &str, value: &Value) -> Result<()> {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                match (key.as_str(), child) {
                    ("ttl", Value::String(s)) => {
                        parse_ttl(s).map_err(|e| at_path(prefix, e))?;
                    }
                    ("ttl", Value::Number(n)) if n.as_i64().is_none() => {
                        return Err(Error::validation(format!("{prefix}ttl"), "duration", n.to_string()));
                    }
                    ("action", Value::String(s)) => {
                        s.parse::<PatchAction>().map_err(|e| at_path(prefix, e))?;
                    }
                    _ => check_request_fields(&format!("{prefix}{key}."), child)?,
                }
            }
            Ok(())
        }
        Value::Array(items) => {
            let base = prefix.strip_suffix('.').unwrap_or(prefix);
            for (i, item) in items.iter().enumerate() {
                check_request_fields(&format!("{base}[{i}]."), item)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

// serde_json reports "missing field `name`"
fn missing_field(message: &str) -> Option<&str> {
    let rest = message.strip_prefix("missing field `")?;
    rest.split('`').next()
}

/// Prefix the field of a validation error with a path such as `entries[1].`
fn at_path(prefix: &str, err: Error) -> Error {
    match err {
        Error::Validation { field, rule, value } => Error::Validation {
            field: format!("{prefix}{field}"),
            rule,
            value,
        },
        other => other,
    }
}

fn check_comment(field: &str, comment: &str) -> Result<()> {
    if !comment.is_empty() && !is_comment(comment) {
        return Err(Error::validation(field, "comment", comment));
    }
    Ok(())
}

fn validate_address_at(prefix: &str, address: &Address) -> Result<()> {
    let field = format!("{prefix}address");
    if address.address.is_empty() {
        return Err(Error::validation(field, "required", ""));
    }
    if !is_ipv4(&address.address) && !is_fqdn(&address.address) {
        return Err(Error::validation(field, "ipv4|fqdn", address.address.as_str()));
    }
    check_comment(&format!("{prefix}comment"), &address.comment)
}

pub(crate) fn validate_addresses(addresses: &[Address]) -> Result<()> {
    for (i, address) in addresses.iter().enumerate() {
        validate_address_at(&format!("addresses[{i}]."), address)?;
    }
    Ok(())
}

impl Validate for Address {
    fn validate(&self) -> Result<()> {
        validate_address_at("", self)
    }
}

impl Validate for AddressList {
    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::validation("name", "required", ""));
        }
        if !is_address_list_name(&self.name) {
            return Err(Error::validation("name", "addresslistname", self.name.as_str()));
        }
        validate_addresses(&self.addresses)?;

        for (i, address) in self.addresses.iter().enumerate() {
            if self.addresses[..i].contains(address) {
                return Err(Error::validation(
                    format!("addresses[{i}]"),
                    "unique",
                    address.address.as_str(),
                ));
            }
        }
        Ok(())
    }
}

impl Validate for AddressListPatch {
    fn validate(&self) -> Result<()> {
        validate_addresses(&self.addresses)
    }
}

impl Validate for StaticDnsEntry {
    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::validation("name", "required", ""));
        }
        if !is_fqdn(&self.name) {
            return Err(Error::validation("name", "fqdn", self.name.as_str()));
        }
        if self.address.is_empty() {
            return Err(Error::validation("address", "required", ""));
        }
        if !is_ipv4(&self.address) {
            return Err(Error::validation("address", "ipv4", self.address.as_str()));
        }
        match self.ttl.as_secs() {
            0 => return Err(Error::validation("ttl", "required", "0")),
            secs if secs < 0 => return Err(Error::validation("ttl", "min=0", secs.to_string())),
            _ => {}
        }
        if let Some(regexp) = &self.regexp
            && regexp.chars().any(char::is_control)
        {
            return Err(Error::validation("regexp", "printable", regexp.as_str()));
        }
        check_comment("comment", &self.comment)
    }
}

impl Validate for StaticDnsBatch {
    fn validate(&self) -> Result<()> {
        for (i, entry) in self.entries.iter().enumerate() {
            entry.validate().map_err(|e| at_path(&format!("entries[{i}]."), e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule_of(err: Error) -> (String, &'static str) {
        match err {
            Error::Validation { field, rule, .. } => (field, rule),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_fqdn() {
        assert!(is_fqdn("a.example.com"));
        assert!(is_fqdn("example.com."));
        assert!(is_fqdn("x-1.example.org"));
        assert!(!is_fqdn("localhost"));
        assert!(!is_fqdn("-bad.example.com"));
        assert!(!is_fqdn("a..example.com"));
        assert!(!is_fqdn("1.2.3.4"));
        assert!(!is_fqdn("under_score.example.com"));
    }

    #[test]
    fn test_ipv4() {
        assert!(is_ipv4("10.0.0.1"));
        assert!(!is_ipv4("10.0.0"));
        assert!(!is_ipv4("256.0.0.1"));
        assert!(!is_ipv4("::1"));
    }

    #[test]
    fn test_comment_rejects_markup() {
        assert!(is_comment("office gateway, floor 2: main-link."));
        assert!(is_comment("Шлюз офиса"));
        assert!(!is_comment("<script>"));
        assert!(!is_comment("say \"hi\""));

        let address = Address::new("10.0.0.1").with_comment("<script>");
        assert_eq!(rule_of(address.validate().unwrap_err()), ("comment".to_string(), "comment"));
    }

    #[test]
    fn test_address_list_rules() {
        let list = AddressList::new("office", vec![Address::new("10.0.0.1"), Address::new("vpn.example.com")]);
        assert!(list.validate().is_ok());

        let list = AddressList::new("office list", vec![]);
        assert_eq!(rule_of(list.validate().unwrap_err()).1, "addresslistname");

        let list = AddressList::new("", vec![]);
        assert_eq!(rule_of(list.validate().unwrap_err()).1, "required");

        let list = AddressList::new("office", vec![Address::new("10.0.0.1"), Address::new("nonsense")]);
        assert_eq!(
            rule_of(list.validate().unwrap_err()),
            ("addresses[1].address".to_string(), "ipv4|fqdn")
        );

        let list = AddressList::new("office", vec![Address::new("10.0.0.1"), Address::new("10.0.0.1")]);
        assert_eq!(rule_of(list.validate().unwrap_err()).1, "unique");
    }

    #[test]
    fn test_static_dns_rules() {
        let entry = StaticDnsEntry::new("a.example.com", "1.2.3.4", RouterOsDuration::from_secs(3600));
        assert!(entry.validate().is_ok());

        let bad_name = StaticDnsEntry { name: "a".into(), ..entry.clone() };
        assert_eq!(rule_of(bad_name.validate().unwrap_err()).1, "fqdn");

        let bad_address = StaticDnsEntry { address: "a.example.com".into(), ..entry.clone() };
        assert_eq!(rule_of(bad_address.validate().unwrap_err()).1, "ipv4");

        let no_ttl = StaticDnsEntry { ttl: RouterOsDuration::from_secs(0), ..entry.clone() };
        assert_eq!(rule_of(no_ttl.validate().unwrap_err()), ("ttl".to_string(), "required"));

        let batch = StaticDnsBatch { entries: vec![entry, bad_address] };
        assert_eq!(rule_of(batch.validate().unwrap_err()).0, "entries[1].address");
    }

    #[test]
    fn test_parse_ttl() {
        assert_eq!(parse_ttl("1h").unwrap().as_secs(), 3600);
        assert_eq!(rule_of(parse_ttl("5x").unwrap_err()), ("ttl".to_string(), "duration"));
        assert_eq!(rule_of(parse_ttl("").unwrap_err()), ("ttl".to_string(), "duration"));
    }

    #[test]
    fn test_comment_stays_on_one_line() {
        let address = Address::new("10.0.0.1").with_comment("gw\nsystem reboot");
        assert_eq!(rule_of(address.validate().unwrap_err()), ("comment".to_string(), "comment"));
        assert!(!is_comment("tab\tseparated"));
        assert!(!is_comment("carriage\rreturn"));
    }

    #[test]
    fn test_regexp_rejects_control_characters() {
        let entry = StaticDnsEntry::new("a.example.com", "1.2.3.4", RouterOsDuration::from_secs(60))
            .with_regexp(".*\n/system reboot");
        assert_eq!(rule_of(entry.validate().unwrap_err()), ("regexp".to_string(), "printable"));

        let entry = entry.with_regexp(r".*\.example\.com");
        assert!(entry.validate().is_ok());
    }

    #[test]
    fn test_decode_reports_bad_ttl_as_client_error() {
        let err = decode::<StaticDnsEntry>(br#"{"name":"a.example.com","address":"1.2.3.4","ttl":"5x"}"#)
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(rule_of(err), ("ttl".to_string(), "duration"));

        let err = decode::<StaticDnsBatch>(
            br#"{"entries":[{"name":"a.example.com","address":"1.2.3.4","ttl":"1h"},
                            {"name":"b.example.com","address":"1.2.3.4","ttl":"h1"}]}"#,
        )
        .unwrap_err();
        assert_eq!(rule_of(err).0, "entries[1].ttl");
    }

    #[test]
    fn test_decode_reports_bad_action_as_client_error() {
        let err = decode::<AddressListPatch>(br#"{"action":"drop","addresses":[]}"#).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(rule_of(err).0, "action");
    }

    #[test]
    fn test_decode_shape_and_rule_failures() {
        let err = decode::<AddressList>(b"{not json").unwrap_err();
        assert_eq!(rule_of(err), ("body".to_string(), "json"));

        let err = decode::<AddressList>(br#"{"addresses":[]}"#).unwrap_err();
        assert_eq!(rule_of(err), ("name".to_string(), "decode"));

        let err = decode::<AddressList>(br#"{"name":"office","addresses":[{"address":"10.0.0.1","comment":"<b>"}]}"#)
            .unwrap_err();
        assert_eq!(rule_of(err), ("addresses[0].comment".to_string(), "comment"));

        let list = decode::<AddressList>(br#"{"name":"office","addresses":[{"address":"10.0.0.1"}]}"#).unwrap();
        assert_eq!(list.addresses, vec![Address::new("10.0.0.1")]);

        let entry = decode::<StaticDnsEntry>(br#"{"name":"a.example.com","address":"1.2.3.4","ttl":3600}"#).unwrap();
        assert_eq!(entry.ttl.as_secs(), 3600);
    }
}
