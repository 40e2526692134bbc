// SPDX-FileCopyrightText: 2025-2026 TII (SSRC) and the Ghaf contributors
// SPDX-License-Identifier: Apache-2.0

//! Lookup of attributes in textual distinguished names such as
//! `CN=Alice,OU=Sales,O=Acme`.
//!
//! Values may be quoted (`O="Acme, Inc."`), may use backslash escapes
//! (`O=Acme\, Inc.` or `O=Acme\2C Inc.`), and RDNs may be separated by `,` or
//! `;`. Multi-valued RDNs (`CN=a+UID=b`) are flattened into separate
//! attributes.

use std::iter::Peekable;
use std::str::Chars;

/// Split a DN into `(key, value)` pairs in order of appearance.
///
/// Returns `None` if the string is not a well-formed DN.
#[must_use]
pub fn parse_dn(dn: &str) -> Option<Vec<(String, String)>> {
    let mut attrs = Vec::new();
    if dn.trim().is_empty() {
        return Some(attrs);
    }
    let mut chars = dn.chars().peekable();
    loop {
        let key = read_key(&mut chars)?;
        let value = read_value(&mut chars)?;
        attrs.push((key, value));
        match chars.next() {
            None => return Some(attrs),
            Some(',' | ';' | '+') => {}
            Some(_) => return None,
        }
    }
}

/// Value of the first attribute named exactly `key`.
///
/// Key matching is case-sensitive. Returns `None` when the attribute is
/// missing or the DN is malformed.
#[must_use]
pub fn attribute(dn: &str, key: &str) -> Option<String> {
    parse_dn(dn)?
        .into_iter()
        .find_map(|(k, v)| (k == key).then_some(v))
}

#[must_use]
pub fn common_name(dn: &str) -> Option<String> {
    attribute(dn, "CN")
}

fn read_key(chars: &mut Peekable<Chars<'_>>) -> Option<String> {
    let mut key = String::new();
    loop {
        match chars.next()? {
            '=' => break,
            c if c.is_ascii_alphanumeric() || c == '-' || c == '.' => key.push(c),
            c if c.is_whitespace() => {
                if !key.is_empty() && chars.peek().is_some_and(|n| *n != '=' && !n.is_whitespace()) {
                    return None;
                }
            }
            _ => return None,
        }
    }
    (!key.is_empty()).then_some(key)
}

fn read_value(chars: &mut Peekable<Chars<'_>>) -> Option<String> {
    while chars.peek().is_some_and(|c| *c == ' ') {
        chars.next();
    }
    if chars.peek() == Some(&'"') {
        chars.next();
        return read_quoted(chars);
    }

    let mut value = String::new();
    // Length of `value` up to the last escaped character, so that escaped
    // trailing spaces survive trimming.
    let mut keep = 0;
    while let Some(&c) = chars.peek() {
        match c {
            ',' | ';' | '+' => break,
            '\\' => {
                chars.next();
                value.push(read_escape(chars)?);
                keep = value.len();
            }
            '"' => return None,
            _ => {
                chars.next();
                value.push(c);
            }
        }
    }
    let trimmed_len = value.trim_end().len().max(keep);
    value.truncate(trimmed_len);
    Some(value)
}

fn read_quoted(chars: &mut Peekable<Chars<'_>>) -> Option<String> {
    let mut value = String::new();
    loop {
        match chars.next()? {
            '"' => break,
            '\\' => value.push(read_escape(chars)?),
            c => value.push(c),
        }
    }
    while chars.peek().is_some_and(|c| c.is_whitespace()) {
        chars.next();
    }
    match chars.peek() {
        None | Some(',' | ';' | '+') => Some(value),
        Some(_) => None,
    }
}

fn read_escape(chars: &mut Peekable<Chars<'_>>) -> Option<char> {
    let first = chars.next()?;
    if first.is_ascii_hexdigit() && chars.peek().is_some_and(char::is_ascii_hexdigit) {
        let second = chars.next()?;
        let byte = u8::from_str_radix(&format!("{first}{second}"), 16).ok()?;
        return Some(char::from(byte));
    }
    Some(first)
}
