// SPDX-FileCopyrightText: 2025-2026 TII (SSRC) and the Ghaf contributors
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate};
use rustls::pki_types::CertificateDer;
use serde::{Serialize, Serializer};
use x509_parser::num_bigint::BigUint;
use zeroize::Zeroizing;

use crate::error::ResolveError;
use crate::keystore::{KeystoreSource, TokenProvider};
use crate::types::{SourceType, TlsProtocol};

/// A certificate identity, from the request to resolve it up to its decoded fields.
///
/// Built empty by one of the constructors, populated once by
/// [`crate::resolver::CertificateResolver`] and read-only afterwards.
#[derive(Clone, Debug, Serialize)]
pub struct CertificateDescriptor {
    pub(crate) alias: Option<String>,
    pub(crate) source_type: SourceType,
    #[serde(skip)]
    pub(crate) source: KeystoreSource,
    pub(crate) not_after: Option<DateTime<Local>>,
    pub(crate) expiry_date: Option<NaiveDate>,
    pub(crate) days_remaining: i64,
    pub(crate) is_valid: bool,
    #[serde(serialize_with = "serialize_serial")]
    pub(crate) serial_number: Option<BigUint>,
    pub(crate) issuer_cn: Option<String>,
    pub(crate) subject_cn: Option<String>,
    pub(crate) tax_id: Option<String>,
    pub(crate) individual_tax_id: Option<String>,
    pub(crate) individual_name: Option<String>,
    pub(crate) tls_protocol: TlsProtocol,
    pub(crate) concurrency_mode: bool,
    #[serde(skip)]
    pub(crate) certificate: Option<CertificateDer<'static>>,
}

#[allow(clippy::ref_option)]
fn serialize_serial<S: Serializer>(serial: &Option<BigUint>, s: S) -> Result<S::Ok, S::Error> {
    match serial {
        Some(serial) => s.serialize_some(&serial.to_string()),
        None => s.serialize_none(),
    }
}

impl CertificateDescriptor {
    fn new(source: KeystoreSource) -> Self {
        Self {
            alias: None,
            source_type: source.source_type(),
            source,
            not_after: None,
            expiry_date: None,
            days_remaining: 0,
            is_valid: false,
            serial_number: None,
            issuer_cn: None,
            subject_cn: None,
            tax_id: None,
            individual_tax_id: None,
            individual_name: None,
            tls_protocol: TlsProtocol::default(),
            concurrency_mode: false,
            certificate: None,
        }
    }

    /// PKCS#12 container on disk
    #[must_use]
    pub fn from_pfx_file(path: impl Into<PathBuf>, password: &str) -> Self {
        Self::new(KeystoreSource::File {
            path: path.into(),
            password: Zeroizing::new(password.to_owned()),
        })
    }

    /// PKCS#12 container already in memory
    #[must_use]
    pub fn from_pfx_bytes(data: impl Into<Arc<[u8]>>, password: &str) -> Self {
        Self::new(KeystoreSource::Bytes {
            data: data.into(),
            password: Zeroizing::new(password.to_owned()),
        })
    }

    #[must_use]
    pub fn windows_store() -> Self {
        Self::new(KeystoreSource::WindowsStore)
    }

    #[must_use]
    pub fn mac_store() -> Self {
        Self::new(KeystoreSource::MacStore)
    }

    /// Hardware token reached through `provider`, unlocked with `pin`
    #[must_use]
    pub fn hardware_token(pin: &str, provider: Arc<dyn TokenProvider>) -> Self {
        Self::new(KeystoreSource::HardwareToken {
            pin: Zeroizing::new(pin.to_owned()),
            provider,
        })
    }

    /// Select an entry instead of the first one the store enumerates
    #[must_use]
    pub fn with_alias(self, alias: impl Into<String>) -> Self {
        Self {
            alias: Some(alias.into()),
            ..self
        }
    }

    #[must_use]
    pub fn with_tls_protocol(self, tls_protocol: TlsProtocol) -> Self {
        Self {
            tls_protocol,
            ..self
        }
    }

    /// Keep mutual TLS contexts built from this descriptor out of the
    /// process-wide default slot
    #[must_use]
    pub fn with_concurrency_mode(self, concurrency_mode: bool) -> Self {
        Self {
            concurrency_mode,
            ..self
        }
    }

    /// Reject requests no backend could satisfy
    pub(crate) fn check(&self) -> Result<(), ResolveError> {
        if self.alias.as_deref().is_some_and(str::is_empty) {
            return Err(ResolveError::InvalidArgument("alias is empty".into()));
        }
        match &self.source {
            KeystoreSource::File { path, .. } if path.as_os_str().is_empty() => Err(
                ResolveError::InvalidArgument("PKCS#12 file path is empty".into()),
            ),
            KeystoreSource::Bytes { data, .. } if data.is_empty() => Err(
                ResolveError::InvalidArgument("PKCS#12 content is empty".into()),
            ),
            _ => Ok(()),
        }
    }

    #[must_use]
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    #[must_use]
    pub fn source_type(&self) -> SourceType {
        self.source_type
    }

    #[must_use]
    pub fn source(&self) -> &KeystoreSource {
        &self.source
    }

    /// Whether a resolver has populated this descriptor
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.certificate.is_some()
    }

    #[must_use]
    pub fn not_after(&self) -> Option<DateTime<Local>> {
        self.not_after
    }

    /// Local calendar date of [`Self::not_after`]
    #[must_use]
    pub fn expiry_date(&self) -> Option<NaiveDate> {
        self.expiry_date
    }

    /// Whole days until expiry, negative once expired
    #[must_use]
    pub fn days_remaining(&self) -> i64 {
        self.days_remaining
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    #[must_use]
    pub fn serial_number(&self) -> Option<&BigUint> {
        self.serial_number.as_ref()
    }

    #[must_use]
    pub fn issuer_cn(&self) -> Option<&str> {
        self.issuer_cn.as_deref()
    }

    #[must_use]
    pub fn subject_cn(&self) -> Option<&str> {
        self.subject_cn.as_deref()
    }

    /// CNPJ of the holding company, or CPF of an individual holder
    #[must_use]
    pub fn tax_id(&self) -> Option<&str> {
        self.tax_id.as_deref()
    }

    #[must_use]
    pub fn individual_tax_id(&self) -> Option<&str> {
        self.individual_tax_id.as_deref()
    }

    #[must_use]
    pub fn individual_name(&self) -> Option<&str> {
        self.individual_name.as_deref()
    }

    #[must_use]
    pub fn tls_protocol(&self) -> TlsProtocol {
        self.tls_protocol
    }

    #[must_use]
    pub fn concurrency_mode(&self) -> bool {
        self.concurrency_mode
    }

    /// DER of the resolved certificate
    #[must_use]
    pub fn certificate(&self) -> Option<&CertificateDer<'static>> {
        self.certificate.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{Fixture, MemoryToken, store};

    #[test]
    fn test_constructors_fix_source_type() {
        let token = Arc::new(MemoryToken::new("1234", store(&[("a", Fixture::Valid)])));
        let cases = [
            (
                CertificateDescriptor::from_pfx_file("/tmp/cert.pfx", "pw"),
                SourceType::FileP12,
            ),
            (
                CertificateDescriptor::from_pfx_bytes(vec![1u8], "pw"),
                SourceType::BytesP12,
            ),
            (
                CertificateDescriptor::windows_store(),
                SourceType::OsStoreWindows,
            ),
            (CertificateDescriptor::mac_store(), SourceType::OsStoreMac),
            (
                CertificateDescriptor::hardware_token("1234", token),
                SourceType::HardwareToken,
            ),
        ];
        for (descriptor, expected) in cases {
            assert_eq!(descriptor.source_type(), expected);
            assert_eq!(descriptor.source().source_type(), expected);
            assert!(!descriptor.is_resolved());
            assert_eq!(descriptor.tls_protocol(), TlsProtocol::Tls12);
            assert!(!descriptor.concurrency_mode());
        }
    }

    #[test]
    fn test_builders() {
        let descriptor = CertificateDescriptor::windows_store()
            .with_alias("acme")
            .with_tls_protocol(TlsProtocol::Tls13)
            .with_concurrency_mode(true);
        assert_eq!(descriptor.alias(), Some("acme"));
        assert_eq!(descriptor.tls_protocol(), TlsProtocol::Tls13);
        assert!(descriptor.concurrency_mode());
    }

    #[test]
    fn test_check_rejects_empty_inputs() {
        for descriptor in [
            CertificateDescriptor::from_pfx_file("", "pw"),
            CertificateDescriptor::from_pfx_bytes(Vec::new(), "pw"),
            CertificateDescriptor::mac_store().with_alias(""),
        ] {
            assert!(matches!(
                descriptor.check(),
                Err(ResolveError::InvalidArgument(_))
            ));
        }
        assert!(CertificateDescriptor::windows_store().check().is_ok());
    }

    #[test]
    fn test_serialization_hides_secrets() -> anyhow::Result<()> {
        let mut descriptor = CertificateDescriptor::from_pfx_file("/tmp/cert.pfx", "hunter2");
        descriptor.serial_number = Some(BigUint::from(4242u32));
        let json = serde_json::to_value(&descriptor)?;
        assert_eq!(json["source_type"], "FileP12");
        assert_eq!(json["serial_number"], "4242");
        assert_eq!(json["tls_protocol"], "TLSv1.2");
        assert!(json.get("source").is_none());
        assert!(!json.to_string().contains("hunter2"));
        Ok(())
    }
}
