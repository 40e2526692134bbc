// SPDX-FileCopyrightText: 2025-2026 TII (SSRC) and the Ghaf contributors
// SPDX-License-Identifier: Apache-2.0

use chrono::{Local, NaiveDate};
use tracing::info;

use crate::descriptor::CertificateDescriptor;
use crate::error::ResolveError;
use crate::resolver::CertificateResolver;
use crate::types::SourceType;

/// Store searched by [`RepositoryScanner::find_by_tax_id`]
pub const DEFAULT_STORE: SourceType = SourceType::OsStoreWindows;

/// Walks every entry of an OS certificate store
#[derive(Clone, Debug, Default)]
pub struct RepositoryScanner {
    resolver: CertificateResolver,
}

impl RepositoryScanner {
    #[must_use]
    pub fn new(resolver: CertificateResolver) -> Self {
        Self { resolver }
    }

    #[must_use]
    pub fn resolver(&self) -> &CertificateResolver {
        &self.resolver
    }

    /// Resolve every certificate of `source_type`, skipping expired ones
    /// unless `include_expired`
    /// # Errors
    /// Return `Err(ResolveError::UnsupportedSourceType)` unless `source_type`
    /// is an OS store; any resolution failure is propagated
    pub fn scan_store(
        &self,
        source_type: SourceType,
        include_expired: bool,
    ) -> Result<Vec<CertificateDescriptor>, ResolveError> {
        self.scan_store_on(source_type, include_expired, Local::now().date_naive())
    }

    /// [`Self::scan_store`] as of `today`
    /// # Errors
    /// See [`Self::scan_store`]
    pub fn scan_store_on(
        &self,
        source_type: SourceType,
        include_expired: bool,
        today: NaiveDate,
    ) -> Result<Vec<CertificateDescriptor>, ResolveError> {
        let template = match source_type {
            SourceType::OsStoreWindows => CertificateDescriptor::windows_store(),
            SourceType::OsStoreMac => CertificateDescriptor::mac_store(),
            other => return Err(ResolveError::UnsupportedSourceType(other.to_string())),
        };
        let handle = self.resolver.open(&template)?;
        let aliases = handle.aliases()?;
        info!("Scanning {} entries of {source_type}", aliases.len());

        let mut found = Vec::with_capacity(aliases.len());
        for alias in aliases {
            let descriptor = self.resolver.resolve_on(
                template.clone().with_alias(alias),
                Some(handle.as_ref()),
                today,
            )?;
            if include_expired || descriptor.is_valid() {
                found.push(descriptor);
            }
        }
        Ok(found)
    }

    /// First certificate of the default store whose tax ID starts with `tax_id`,
    /// expired ones included
    /// # Errors
    /// Return `Err(ResolveError::CertificateNotFound)` if nothing matches
    pub fn find_by_tax_id(&self, tax_id: &str) -> Result<CertificateDescriptor, ResolveError> {
        self.find_by_tax_id_in(DEFAULT_STORE, tax_id)
    }

    /// # Errors
    /// See [`Self::find_by_tax_id`]
    pub fn find_by_tax_id_in(
        &self,
        source_type: SourceType,
        tax_id: &str,
    ) -> Result<CertificateDescriptor, ResolveError> {
        if tax_id.is_empty() {
            return Err(ResolveError::InvalidArgument("tax ID is empty".into()));
        }
        self.scan_store(source_type, true)?
            .into_iter()
            .find(|descriptor| descriptor.tax_id().is_some_and(|id| id.starts_with(tax_id)))
            .ok_or_else(|| ResolveError::CertificateNotFound(format!("with tax ID {tax_id}")))
    }
}
