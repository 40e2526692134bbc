// SPDX-FileCopyrightText: 2025-2026 TII (SSRC) and the Ghaf contributors
// SPDX-License-Identifier: Apache-2.0

use std::sync::{Arc, LazyLock};

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use tracing::{debug, info, warn};

use crate::descriptor::CertificateDescriptor;
use crate::dn::common_name;
use crate::error::ResolveError;
use crate::extension::{self, TaxpayerIdentity};
use crate::keystore::{KeyStoreHandle, KeystoreBackend, PlatformStore};
use crate::x509::CertificateInfo;

/// Expiry assumed for certificates whose validity can't be read
static SENTINEL_EXPIRY: LazyLock<NaiveDateTime> = LazyLock::new(|| {
    NaiveDate::from_ymd_opt(2020, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .expect("Invalid sentinel date")
});

fn sentinel_expiry() -> DateTime<Local> {
    Local
        .from_local_datetime(&SENTINEL_EXPIRY)
        .earliest()
        .unwrap_or_else(|| Local.from_utc_datetime(&SENTINEL_EXPIRY))
}

/// Turns descriptor requests into populated descriptors
#[derive(Clone, Debug, Default)]
pub struct CertificateResolver {
    backend: KeystoreBackend,
}

impl CertificateResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_backend(backend: KeystoreBackend) -> Self {
        Self { backend }
    }

    /// Register the integration serving [`crate::types::SourceType::OsStoreWindows`]
    #[must_use]
    pub fn with_windows_store(self, store: Arc<dyn PlatformStore>) -> Self {
        Self {
            backend: self.backend.with_windows_store(store),
        }
    }

    /// Register the integration serving [`crate::types::SourceType::OsStoreMac`]
    #[must_use]
    pub fn with_mac_store(self, store: Arc<dyn PlatformStore>) -> Self {
        Self {
            backend: self.backend.with_mac_store(store),
        }
    }

    #[must_use]
    pub fn backend(&self) -> &KeystoreBackend {
        &self.backend
    }

    /// Open the keystore `descriptor` points at
    /// # Errors
    /// Return `Err(ResolveError)` if the request is malformed or the store
    /// can't be opened
    pub fn open(
        &self,
        descriptor: &CertificateDescriptor,
    ) -> Result<Box<dyn KeyStoreHandle>, ResolveError> {
        descriptor.check()?;
        Ok(self.backend.open(descriptor.source())?)
    }

    /// Resolve `descriptor` with validity computed against the local date.
    ///
    /// `handle`, when given, is used instead of opening the descriptor's
    /// source, so a caller walking a whole store opens it only once.
    /// # Errors
    /// See [`Self::resolve_on`]
    pub fn resolve(
        &self,
        descriptor: CertificateDescriptor,
        handle: Option<&dyn KeyStoreHandle>,
    ) -> Result<CertificateDescriptor, ResolveError> {
        self.resolve_on(descriptor, handle, Local::now().date_naive())
    }

    /// Resolve `descriptor` as of `today`
    /// # Errors
    /// Return `Err(ResolveError::InvalidCredential)` on a wrong password or PIN,
    /// `Err(ResolveError::CertificateNotFound)` if the store has no certificate
    /// under the alias, `Err(ResolveError::BackendUnavailable)` if the store
    /// can't be reached
    pub fn resolve_on(
        &self,
        mut descriptor: CertificateDescriptor,
        handle: Option<&dyn KeyStoreHandle>,
        today: NaiveDate,
    ) -> Result<CertificateDescriptor, ResolveError> {
        descriptor.check()?;
        let opened;
        let handle = match handle {
            Some(handle) => handle,
            None => {
                opened = self.backend.open(descriptor.source())?;
                opened.as_ref()
            }
        };

        let alias = match descriptor.alias.take() {
            Some(alias) => alias,
            None => handle.aliases()?.into_iter().next().ok_or_else(|| {
                ResolveError::CertificateNotFound(format!(
                    "entry of {} keystore",
                    descriptor.source_type()
                ))
            })?,
        };
        let der = handle
            .certificate(&alias)?
            .ok_or_else(|| ResolveError::CertificateNotFound(alias.clone()))?;
        let info = CertificateInfo::try_from(&der[..]).map_err(|err| {
            ResolveError::MalformedCertificate {
                alias: alias.clone(),
                reason: err.to_string(),
            }
        })?;

        let not_after = info.not_after().map_or_else(
            || {
                warn!("Certificate {alias} has no usable expiry, assuming {}", *SENTINEL_EXPIRY);
                sentinel_expiry()
            },
            |not_after| not_after.with_timezone(&Local),
        );
        let expiry_date = not_after.date_naive();
        let identity = info
            .alt_name_extension()
            .map(extension::decode)
            .unwrap_or_default();
        if identity.is_corporate() {
            debug!("{alias} belongs to a legal entity");
        }
        let TaxpayerIdentity {
            tax_id,
            individual_tax_id,
            individual_name,
        } = identity;

        descriptor.days_remaining = (expiry_date - today).num_days();
        descriptor.is_valid = today < expiry_date;
        descriptor.not_after = Some(not_after);
        descriptor.expiry_date = Some(expiry_date);
        descriptor.serial_number = Some(info.serial().clone());
        descriptor.issuer_cn = common_name(info.issuer());
        descriptor.subject_cn = common_name(info.subject());
        descriptor.tax_id = tax_id;
        descriptor.individual_tax_id = individual_tax_id;
        descriptor.individual_name = individual_name;
        descriptor.certificate = Some(der);

        if descriptor.is_valid {
            debug!(
                "Resolved {alias} from {}: {} days left",
                descriptor.source_type, descriptor.days_remaining
            );
        } else {
            info!("Certificate {alias} expired on {expiry_date}");
        }
        descriptor.alias = Some(alias);
        Ok(descriptor)
    }
}
