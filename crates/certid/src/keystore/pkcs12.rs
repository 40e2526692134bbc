// SPDX-FileCopyrightText: 2025-2026 TII (SSRC) and the Ghaf contributors
// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use p12_keystore::{KeyStore, KeyStoreEntry};
use rustls::pki_types::CertificateDer;
use tracing::debug;
use zeroize::Zeroizing;

use super::{KeyHandle, KeyStoreHandle, is_credential_failure};
use crate::error::BackendError;

/// PKCS#12 container decrypted into memory
pub struct Pkcs12Store {
    keystore: KeyStore,
}

impl Pkcs12Store {
    /// # Errors
    /// Return `Err(BackendError::FileNotFound)` if `path` doesn't exist,
    /// `Err(BackendError::InvalidCredential)` on a wrong password
    pub fn open_file(path: &Path, password: &str) -> Result<Self, BackendError> {
        if !path.exists() {
            return Err(BackendError::FileNotFound(path.to_path_buf()));
        }
        let data = Zeroizing::new(std::fs::read(path).map_err(|source| BackendError::Io {
            path: path.to_path_buf(),
            source,
        })?);
        debug!("Read {} bytes from {}", data.len(), path.display());
        Self::from_bytes(&data, password)
    }

    /// # Errors
    /// Return `Err(BackendError::InvalidCredential)` on a wrong password,
    /// `Err(BackendError::Malformed)` if `data` isn't a PKCS#12 container
    pub fn from_bytes(data: &[u8], password: &str) -> Result<Self, BackendError> {
        let keystore = KeyStore::from_pkcs12(data, password).map_err(|e| {
            let message = format!("{e} ({e:?})");
            if is_credential_failure(&message) {
                BackendError::InvalidCredential
            } else {
                BackendError::Malformed(e.to_string())
            }
        })?;
        Ok(Self { keystore })
    }

    fn entry(&self, alias: &str) -> Result<&KeyStoreEntry, BackendError> {
        self.keystore
            .entry(alias)
            .ok_or_else(|| BackendError::AliasNotFound(alias.to_owned()))
    }
}

fn der(cert: &p12_keystore::Certificate) -> CertificateDer<'static> {
    CertificateDer::from(cert.as_der().to_vec())
}

impl KeyStoreHandle for Pkcs12Store {
    fn aliases(&self) -> Result<Vec<String>, BackendError> {
        Ok(self
            .keystore
            .entries()
            .map(|(alias, _)| alias.to_string())
            .collect())
    }

    fn certificate(&self, alias: &str) -> Result<Option<CertificateDer<'static>>, BackendError> {
        Ok(match self.keystore.entry(alias) {
            Some(KeyStoreEntry::PrivateKeyChain(chain)) => chain.chain().first().map(der),
            Some(KeyStoreEntry::Certificate(cert)) => Some(der(cert)),
            None => None,
        })
    }

    fn chain(&self, alias: &str) -> Result<Vec<CertificateDer<'static>>, BackendError> {
        Ok(match self.entry(alias)? {
            KeyStoreEntry::PrivateKeyChain(chain) => chain.chain().iter().map(der).collect(),
            KeyStoreEntry::Certificate(cert) => vec![der(cert)],
        })
    }

    fn private_key(&self, alias: &str) -> Result<KeyHandle, BackendError> {
        match self.entry(alias)? {
            KeyStoreEntry::PrivateKeyChain(chain) => {
                Ok(KeyHandle::Pkcs8(Zeroizing::new(chain.key().to_vec())))
            }
            KeyStoreEntry::Certificate(_) => Err(BackendError::KeyUnavailable(alias.to_owned())),
        }
    }
}
