//! RouterOS script rendering
//!
//! Renders stored records as `.rsc` command lines that a router can import:
//!
//! ```text
//! /ip firewall address-list add list=office address=10.0.0.1 disabled=no comment="gateway"
//! /ip dns static add name=a.example.com address=1.2.3.4 ttl=1h disabled=no
//! ```
//!
//! Free-text values are double-quoted with `\`, `"` and `$` escaped. Control
//! characters become `\n`, `\r`, `\t` or a `\HH` byte escape, so a value
//! never spans more than one line.

use std::fmt::Write;

use crate::model::{AddressList, StaticDnsEntry};

/// One line per address of every list, in order
pub fn render_address_lists(lists: &[AddressList]) -> String {
    let mut out = String::new();
    for list in lists {
        write_address_list(&mut out, list);
    }
    out
}

/// One line per address of `list`
pub fn render_address_list(list: &AddressList) -> String {
    let mut out = String::new();
    write_address_list(&mut out, list);
    out
}

/// One line per entry, in order
pub fn render_static_dns_entries(entries: &[StaticDnsEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        write_static_dns_entry(&mut out, entry);
    }
    out
}

/// A single `/ip dns static add` line
pub fn render_static_dns_entry(entry: &StaticDnsEntry) -> String {
    let mut out = String::new();
    write_static_dns_entry(&mut out, entry);
    out
}

// Writing into a String cannot fail, so the fmt::Result is dropped.
fn write_address_list(out: &mut String, list: &AddressList) {
    for address in &list.addresses {
        let _ = write!(
            out,
            "/ip firewall address-list add list={} address={} disabled={}",
            list.name,
            address.address,
            yes_no(address.disabled)
        );
        if !address.comment.is_empty() {
            let _ = write!(out, " comment={}", quoted(&address.comment));
        }
        out.push('\n');
    }
}

fn write_static_dns_entry(out: &mut String, entry: &StaticDnsEntry) {
    let _ = write!(
        out,
        "/ip dns static add name={} address={} ttl={} disabled={}",
        entry.name,
        entry.address,
        entry.ttl,
        yes_no(entry.disabled)
    );
    if let Some(regexp) = entry.regexp.as_deref().filter(|r| !r.is_empty()) {
        let _ = write!(out, " regexp={}", quoted(regexp));
    }
    if !entry.comment.is_empty() {
        let _ = write!(out, " comment={}", quoted(&entry.comment));
    }
    out.push('\n');
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

fn quoted(value: &str) -> String {
    let mut s = String::with_capacity(value.len() + 2);
    s.push('"');
    for c in value.chars() {
        match c {
            '\\' | '"' | '$' => {
                s.push('\\');
                s.push(c);
            }
            '\n' => s.push_str("\\n"),
            '\r' => s.push_str("\\r"),
            '\t' => s.push_str("\\t"),
            c if c.is_control() => {
                let mut buf = [0u8; 4];
                for byte in c.encode_utf8(&mut buf).bytes() {
                    let _ = write!(s, "\\{byte:02X}");
                }
            }
            c => s.push(c),
        }
    }
    s.push('"');
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duration::RouterOsDuration;
    use crate::model::Address;

    #[test]
    fn test_render_address_list() {
        let list = AddressList::new(
            "office",
            vec![
                Address::new("10.0.0.1"),
                Address::new("vpn.example.com").with_disabled(true).with_comment("remote staff"),
            ],
        );
        assert_eq!(
            render_address_list(&list),
            "/ip firewall address-list add list=office address=10.0.0.1 disabled=no\n\
             /ip firewall address-list add list=office address=vpn.example.com disabled=yes comment=\"remote staff\"\n"
        );
    }

    #[test]
    fn test_empty_list_renders_nothing() {
        assert_eq!(render_address_list(&AddressList::new("empty", vec![])), "");
        assert_eq!(render_address_lists(&[]), "");
    }

    #[test]
    fn test_render_static_dns() {
        let plain = StaticDnsEntry::new("a.example.com", "1.2.3.4", RouterOsDuration::from_secs(90061));
        assert_eq!(
            render_static_dns_entry(&plain),
            "/ip dns static add name=a.example.com address=1.2.3.4 ttl=1d1h1s disabled=no\n"
        );

        let full = StaticDnsEntry::new("b.example.com", "5.6.7.8", RouterOsDuration::from_secs(3600))
            .with_regexp(r".*\.example\.com")
            .with_comment("lab");
        assert_eq!(
            render_static_dns_entries(&[full]),
            "/ip dns static add name=b.example.com address=5.6.7.8 ttl=1h disabled=no \
             regexp=\".*\\\\.example\\\\.com\" comment=\"lab\"\n"
        );
    }

    #[test]
    fn test_quoting_escapes_specials() {
        assert_eq!(quoted(r#"a"b\c$d"#), r#""a\"b\\c\$d""#);
    }

    #[test]
    fn test_control_characters_never_split_lines() {
        assert_eq!(quoted("a\nb\rc\td"), r#""a\nb\rc\td""#);
        assert_eq!(quoted("bell\u{7}"), r#""bell\07""#);

        // Rendering does not trust that validation ran
        let list = AddressList::new(
            "office",
            vec![Address::new("10.0.0.1").with_comment("gw\nsystem reboot")],
        );
        let script = render_address_list(&list);
        assert_eq!(script.lines().count(), 1);
        assert!(script.contains(r#"comment="gw\nsystem reboot""#));

        let entry = StaticDnsEntry::new("a.example.com", "1.2.3.4", RouterOsDuration::from_secs(60))
            .with_regexp(".*\n/system reboot");
        let script = render_static_dns_entry(&entry);
        assert_eq!(script.lines().count(), 1);
        assert!(script.contains(r#"regexp=".*\n/system reboot""#));
    }
}
