// SPDX-FileCopyrightText: 2025-2026 TII (SSRC) and the Ghaf contributors
// SPDX-License-Identifier: Apache-2.0

use std::convert::TryFrom;

use certid_common::extension::SUBJECT_ALT_NAME_OID;
use chrono::{DateTime, Utc};
use x509_parser::num_bigint::BigUint;
use x509_parser::prelude::*;

/// Fields of an X.509 certificate needed to build a descriptor
#[derive(Clone, Debug)]
pub struct CertificateInfo {
    not_after: Option<DateTime<Utc>>,
    serial: BigUint,
    issuer: String,
    subject: String,
    alt_name_extension: Option<Vec<u8>>,
}

impl CertificateInfo {
    /// `None` if the expiry can't be represented
    #[must_use]
    pub fn not_after(&self) -> Option<DateTime<Utc>> {
        self.not_after
    }

    #[must_use]
    pub fn serial(&self) -> &BigUint {
        &self.serial
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Raw value of the subject alternative name extension
    #[must_use]
    pub fn alt_name_extension(&self) -> Option<&[u8]> {
        self.alt_name_extension.as_deref()
    }
}

impl TryFrom<&[u8]> for CertificateInfo {
    type Error = X509Error;
    fn try_from(cert: &[u8]) -> Result<Self, Self::Error> {
        let (_, x509) = parse_x509_certificate(cert)?;
        let not_after = DateTime::from_timestamp(x509.validity().not_after.timestamp(), 0);
        let alt_name_extension = x509
            .extensions()
            .iter()
            .find(|ext| ext.oid.to_id_string() == SUBJECT_ALT_NAME_OID)
            .map(|ext| ext.value.to_vec());
        Ok(Self {
            not_after,
            serial: x509.tbs_certificate.serial.clone(),
            issuer: rfc4514(x509.issuer()),
            subject: rfc4514(x509.subject()),
            alt_name_extension,
        })
    }
}

/// Render `name` most specific RDN first, escaping values as in RFC 4514
fn rfc4514(name: &X509Name) -> String {
    let mut rdns: Vec<String> = name
        .iter()
        .map(|rdn| {
            rdn.iter()
                .map(|attr| {
                    let key = oid2abbrev(attr.attr_type(), oid_registry())
                        .map_or_else(|_| attr.attr_type().to_id_string(), str::to_owned);
                    let value = attr.as_str().map_or_else(
                        |_| String::from_utf8_lossy(attr.as_slice()).into_owned(),
                        str::to_owned,
                    );
                    format!("{key}={}", escape_value(&value))
                })
                .collect::<Vec<_>>()
                .join("+")
        })
        .collect();
    rdns.reverse();
    rdns.join(",")
}

fn escape_value(value: &str) -> String {
    let last = value.chars().count().saturating_sub(1);
    let mut escaped = String::with_capacity(value.len());
    for (i, c) in value.chars().enumerate() {
        match c {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '#' if i == 0 => escaped.push_str("\\#"),
            ' ' if i == 0 || i == last => escaped.push_str("\\ "),
            '\0' => escaped.push_str("\\00"),
            _ => escaped.push(c),
        }
    }
    escaped
}
