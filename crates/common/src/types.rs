// SPDX-FileCopyrightText: 2025-2026 TII (SSRC) and the Ghaf contributors
// SPDX-License-Identifier: Apache-2.0

use serde::Serialize;
use strum::{Display, EnumString};

/// Where a certificate and its private key come from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, EnumString, Display)]
pub enum SourceType {
    /// PKCS#12 container on disk
    FileP12,
    /// PKCS#12 container already loaded in memory
    BytesP12,
    /// Windows "MY" certificate store
    OsStoreWindows,
    /// macOS keychain
    OsStoreMac,
    /// PKCS#11 token or smart card
    HardwareToken,
}

impl SourceType {
    /// OS stores need no credential and can be enumerated as a whole
    #[must_use]
    pub fn is_os_store(self) -> bool {
        matches!(self, Self::OsStoreWindows | Self::OsStoreMac)
    }
}

/// Lowest protocol version a mutual TLS channel may negotiate.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, EnumString, Display)]
pub enum TlsProtocol {
    #[default]
    #[strum(serialize = "TLSv1.2")]
    #[serde(rename = "TLSv1.2")]
    Tls12,
    #[strum(serialize = "TLSv1.3")]
    #[serde(rename = "TLSv1.3")]
    Tls13,
}
