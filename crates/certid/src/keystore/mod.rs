// SPDX-FileCopyrightText: 2025-2026 TII (SSRC) and the Ghaf contributors
// SPDX-License-Identifier: Apache-2.0

//! Certificate sources and the capability interface they are consumed through.
//!
//! Every source ends up as a [`KeyStoreHandle`]. PKCS#12 containers are
//! parsed here; OS stores and hardware tokens are supplied by platform
//! integrations implementing [`PlatformStore`] and [`TokenProvider`].

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::sign::SigningKey;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::error::BackendError;
use crate::types::SourceType;

pub mod memory;
pub mod pkcs12;

pub use memory::MemoryStore;
pub use pkcs12::Pkcs12Store;

pub type Password = Zeroizing<String>;

/// Private key of one keystore entry
#[derive(Clone)]
pub enum KeyHandle {
    /// Exportable key material, PKCS#8 DER
    Pkcs8(Zeroizing<Vec<u8>>),
    /// Key that never leaves its provider; rustls asks it to sign
    Signer(Arc<dyn SigningKey>),
}

impl fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pkcs8(_) => f.write_str("KeyHandle::Pkcs8(<redacted>)"),
            Self::Signer(key) => write!(f, "KeyHandle::Signer({:?})", key.algorithm()),
        }
    }
}

impl KeyHandle {
    /// # Errors
    /// Return `Err(rustls::Error)` if the key algorithm isn't supported
    pub fn signing_key(&self) -> Result<Arc<dyn SigningKey>, rustls::Error> {
        match self {
            Self::Pkcs8(der) => {
                let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(der.to_vec()));
                rustls::crypto::ring::sign::any_supported_type(&key)
            }
            Self::Signer(key) => Ok(Arc::clone(key)),
        }
    }
}

/// An opened keystore. Not meant to be shared between threads.
pub trait KeyStoreHandle: Send {
    /// # Errors
    /// Return `Err(BackendError)` if the store can't be enumerated
    fn aliases(&self) -> Result<Vec<String>, BackendError>;

    /// Entity certificate stored under `alias`, `None` if there is no such entry
    /// # Errors
    /// Return `Err(BackendError)` if the store can't be read
    fn certificate(&self, alias: &str) -> Result<Option<CertificateDer<'static>>, BackendError>;

    /// Certificate chain, entity certificate first
    /// # Errors
    /// Return `Err(BackendError)` if `alias` is unknown or the store can't be read
    fn chain(&self, alias: &str) -> Result<Vec<CertificateDer<'static>>, BackendError> {
        self.certificate(alias)?
            .map(|cert| vec![cert])
            .ok_or_else(|| BackendError::AliasNotFound(alias.to_owned()))
    }

    /// # Errors
    /// Return `Err(BackendError)` if `alias` has no usable private key
    fn private_key(&self, alias: &str) -> Result<KeyHandle, BackendError>;
}

/// Platform certificate store (Windows "MY" store, macOS keychain)
pub trait PlatformStore: Send + Sync {
    /// # Errors
    /// Return `Err(BackendError)` if the store is unreachable
    fn open(&self) -> Result<Box<dyn KeyStoreHandle>, BackendError>;
}

/// Cryptographic provider of a hardware token
pub trait TokenProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Open a session on the token
    /// # Errors
    /// Return `Err(BackendError::InvalidCredential)` on a wrong PIN,
    /// `Err(BackendError::ProviderUnavailable)` if the token can't be reached
    fn login(&self, pin: &str) -> Result<Box<dyn KeyStoreHandle>, BackendError>;
}

/// Tell whether a store error message means a wrong password or PIN.
///
/// Platform integrations only get text (or a code rendered as text) back
/// from their libraries, so detection works on the message words.
#[must_use]
pub fn is_credential_failure(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    if lower.contains("unsupported") {
        return false;
    }
    lower.contains("password")
        || lower.contains("passphrase")
        || lower
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|word| {
                matches!(
                    word,
                    "mac" | "macerror" | "pin" | "decrypt" | "decryption" | "integrity"
                )
            })
}

/// Map a provider failure message to [`BackendError`]
#[must_use]
pub fn provider_error(provider: &str, message: &str) -> BackendError {
    if is_credential_failure(message) {
        BackendError::InvalidCredential
    } else {
        BackendError::ProviderUnavailable {
            provider: provider.to_owned(),
            reason: message.to_owned(),
        }
    }
}

/// Source payload of a certificate; the variant fixes the [`SourceType`]
#[derive(Clone)]
pub enum KeystoreSource {
    File { path: PathBuf, password: Password },
    Bytes { data: Arc<[u8]>, password: Password },
    WindowsStore,
    MacStore,
    HardwareToken {
        pin: Password,
        provider: Arc<dyn TokenProvider>,
    },
}

impl fmt::Debug for KeystoreSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File { path, .. } => f.debug_struct("File").field("path", path).finish(),
            Self::Bytes { data, .. } => f.debug_struct("Bytes").field("len", &data.len()).finish(),
            Self::WindowsStore => f.write_str("WindowsStore"),
            Self::MacStore => f.write_str("MacStore"),
            Self::HardwareToken { provider, .. } => f
                .debug_struct("HardwareToken")
                .field("provider", &provider.name())
                .finish(),
        }
    }
}

impl KeystoreSource {
    #[must_use]
    pub fn source_type(&self) -> SourceType {
        match self {
            Self::File { .. } => SourceType::FileP12,
            Self::Bytes { .. } => SourceType::BytesP12,
            Self::WindowsStore => SourceType::OsStoreWindows,
            Self::MacStore => SourceType::OsStoreMac,
            Self::HardwareToken { .. } => SourceType::HardwareToken,
        }
    }
}

/// Opens keystore handles for every [`KeystoreSource`].
///
/// OS stores are only reachable once a platform integration is registered.
#[derive(Clone, Default)]
pub struct KeystoreBackend {
    windows: Option<Arc<dyn PlatformStore>>,
    mac: Option<Arc<dyn PlatformStore>>,
}

impl fmt::Debug for KeystoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeystoreBackend")
            .field("windows", &self.windows.is_some())
            .field("mac", &self.mac.is_some())
            .finish()
    }
}

impl KeystoreBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_windows_store(self, store: Arc<dyn PlatformStore>) -> Self {
        Self {
            windows: Some(store),
            ..self
        }
    }

    #[must_use]
    pub fn with_mac_store(self, store: Arc<dyn PlatformStore>) -> Self {
        Self {
            mac: Some(store),
            ..self
        }
    }

    /// # Errors
    /// Return `Err(BackendError)` if the source can't be opened
    pub fn open(&self, source: &KeystoreSource) -> Result<Box<dyn KeyStoreHandle>, BackendError> {
        debug!("Opening keystore {source:?}");
        match source {
            KeystoreSource::File { path, password } => {
                Ok(Box::new(Pkcs12Store::open_file(path, password)?))
            }
            KeystoreSource::Bytes { data, password } => {
                Ok(Box::new(Pkcs12Store::from_bytes(data, password)?))
            }
            KeystoreSource::WindowsStore => Self::open_platform(self.windows.as_deref(), "Windows"),
            KeystoreSource::MacStore => Self::open_platform(self.mac.as_deref(), "macOS"),
            KeystoreSource::HardwareToken { pin, provider } => {
                info!("Opening session on token provider {}", provider.name());
                provider.login(pin)
            }
        }
    }

    fn open_platform(
        store: Option<&dyn PlatformStore>,
        name: &str,
    ) -> Result<Box<dyn KeyStoreHandle>, BackendError> {
        let store = store.ok_or_else(|| BackendError::StoreUnavailable(name.to_owned()))?;
        store.open()
    }
}

/// Enumerate the aliases present on a hardware token
/// # Errors
/// Return `Err(BackendError)` if the session can't be opened or enumerated
pub fn list_token_aliases(
    pin: &str,
    provider: &dyn TokenProvider,
) -> Result<Vec<String>, BackendError> {
    provider.login(pin)?.aliases()
}
