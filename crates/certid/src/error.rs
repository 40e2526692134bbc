// SPDX-FileCopyrightText: 2025-2026 TII (SSRC) and the Ghaf contributors
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use thiserror::Error;

/// Failures of a keystore backend
#[derive(Error, Debug)]
pub enum BackendError {
    /// Wrong password or PIN; the caller may retry with a corrected one
    #[error("keystore password incorrect")]
    InvalidCredential,

    #[error("keystore file {} does not exist", .0.display())]
    FileNotFound(PathBuf),

    #[error("can't read keystore {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed PKCS#12 keystore: {0}")]
    Malformed(String),

    #[error("alias {0} not found in keystore")]
    AliasNotFound(String),

    #[error("private key for alias {0} is not available")]
    KeyUnavailable(String),

    #[error("{0} certificate store is not available")]
    StoreUnavailable(String),

    #[error("cryptographic provider {provider} is not available: {reason}")]
    ProviderUnavailable { provider: String, reason: String },
}

/// Failures of certificate resolution
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("certificate password or PIN is incorrect")]
    InvalidCredential,

    #[error("certificate {0} not found")]
    CertificateNotFound(String),

    #[error("certificate backend unavailable: {0}")]
    BackendUnavailable(#[source] BackendError),

    #[error("unsupported certificate source: {0}")]
    UnsupportedSourceType(String),

    #[error("certificate {alias} can't be parsed: {reason}")]
    MalformedCertificate { alias: String, reason: String },
}

impl From<BackendError> for ResolveError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::InvalidCredential => Self::InvalidCredential,
            BackendError::AliasNotFound(alias) => Self::CertificateNotFound(alias),
            other => Self::BackendUnavailable(other),
        }
    }
}

impl ResolveError {
    /// Only a bad credential is worth retrying with different input
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::InvalidCredential)
    }
}

/// Any failure while building a mutual TLS context
#[derive(Error, Debug)]
pub enum TlsSetupError {
    #[error("mutual TLS setup failed: {0}")]
    Backend(#[from] BackendError),

    #[error("mutual TLS setup failed: {0}")]
    Resolve(#[from] ResolveError),

    #[error("mutual TLS setup failed: trust store: {0}")]
    TrustStore(String),

    #[error("mutual TLS setup failed: private key: {0}")]
    PrivateKey(String),

    #[error("mutual TLS setup failed: {0}")]
    Rustls(#[from] rustls::Error),

    #[error("mutual TLS setup failed: HTTPS client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("mutual TLS setup failed: no default TLS context installed")]
    NoDefaultContext,

    #[error("mutual TLS setup failed: connecting {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },
}
