// SPDX-FileCopyrightText: 2025-2026 TII (SSRC) and the Ghaf contributors
// SPDX-License-Identifier: Apache-2.0

//! Mutual TLS contexts bound to a resolved certificate.
//!
//! A context built for a descriptor whose `concurrency_mode` is off is also
//! installed as the process-wide default, replacing whatever was there
//! (last writer wins). Contexts built in concurrency mode are only handed
//! back to the caller.

use std::net::TcpStream;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use rustls::client::ResolvesClientCert;
use rustls::pki_types::{CertificateDer, ServerName};
use rustls::sign::CertifiedKey;
use rustls::{
    ClientConfig, ClientConnection, RootCertStore, SignatureScheme, StreamOwned,
    SupportedProtocolVersion,
};
use tracing::{debug, info, warn};

use crate::descriptor::CertificateDescriptor;
use crate::error::{ResolveError, TlsSetupError};
use crate::keystore::{KeyStoreHandle, KeystoreBackend};
use crate::resolver::CertificateResolver;
use crate::types::TlsProtocol;

pub const HTTPS_PORT: u16 = 443;

static DEFAULT_CONTEXT: RwLock<Option<Arc<MutualTlsContext>>> = RwLock::new(None);

/// Trust anchors used to authenticate servers
#[derive(Clone, Debug, Default)]
pub enum CaBundle {
    /// Mozilla root program, as shipped by `webpki-roots`.
    ///
    /// ICP-Brasil roots are not part of it: hosts whose chains end in an
    /// ICP-Brasil root need [`CaBundle::Pem`] or [`CaBundle::File`] carrying
    /// that chain.
    #[default]
    Default,
    Pem(Vec<u8>),
    File(PathBuf),
}

impl CaBundle {
    fn root_store(&self) -> Result<RootCertStore, TlsSetupError> {
        match self {
            Self::Default => Ok(RootCertStore::from_iter(
                webpki_roots::TLS_SERVER_ROOTS.iter().cloned(),
            )),
            Self::Pem(pem) => pem_root_store(pem),
            Self::File(path) => {
                let pem = std::fs::read(path).map_err(|e| {
                    TlsSetupError::TrustStore(format!("can't read {}: {e}", path.display()))
                })?;
                pem_root_store(&pem)
            }
        }
    }
}

fn pem_root_store(mut pem: &[u8]) -> Result<RootCertStore, TlsSetupError> {
    let certs = rustls_pemfile::certs(&mut pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TlsSetupError::TrustStore(e.to_string()))?;
    if certs.is_empty() {
        return Err(TlsSetupError::TrustStore(
            "no certificates in CA bundle".into(),
        ));
    }
    let mut roots = RootCertStore::empty();
    for cert in certs {
        roots
            .add(cert)
            .map_err(|e| TlsSetupError::TrustStore(e.to_string()))?;
    }
    Ok(roots)
}

static TLS12_FLOOR: &[&SupportedProtocolVersion] =
    &[&rustls::version::TLS13, &rustls::version::TLS12];
static TLS13_FLOOR: &[&SupportedProtocolVersion] = &[&rustls::version::TLS13];

fn protocol_versions(protocol: TlsProtocol) -> &'static [&'static SupportedProtocolVersion] {
    match protocol {
        TlsProtocol::Tls12 => TLS12_FLOOR,
        TlsProtocol::Tls13 => TLS13_FLOOR,
    }
}

/// Presents the same identity whatever the server asks for
#[derive(Debug)]
struct SingleIdentity(Arc<CertifiedKey>);

impl ResolvesClientCert for SingleIdentity {
    fn resolve(
        &self,
        _root_hint_subjects: &[&[u8]],
        _sigschemes: &[SignatureScheme],
    ) -> Option<Arc<CertifiedKey>> {
        Some(Arc::clone(&self.0))
    }

    fn has_certs(&self) -> bool {
        true
    }
}

/// Client TLS configuration presenting one keystore entry
#[derive(Debug)]
pub struct MutualTlsContext {
    alias: String,
    tls_protocol: TlsProtocol,
    config: Arc<ClientConfig>,
}

impl MutualTlsContext {
    #[must_use]
    pub fn alias(&self) -> &str {
        &self.alias
    }

    #[must_use]
    pub fn tls_protocol(&self) -> TlsProtocol {
        self.tls_protocol
    }

    #[must_use]
    pub fn config(&self) -> Arc<ClientConfig> {
        Arc::clone(&self.config)
    }

    /// Open a TCP connection to `host:port` and complete the handshake
    /// # Errors
    /// Return `Err(TlsSetupError)` if `host` isn't a valid server name,
    /// the connection fails or the handshake is rejected
    pub fn connect(
        &self,
        host: &str,
        port: u16,
    ) -> Result<StreamOwned<ClientConnection, TcpStream>, TlsSetupError> {
        let connect_error = |source| TlsSetupError::Connect {
            host: host.to_owned(),
            port,
            source,
        };
        let server_name = ServerName::try_from(host.to_owned()).map_err(|e| {
            connect_error(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
        })?;
        let mut conn = ClientConnection::new(self.config(), server_name)?;
        let mut sock = TcpStream::connect((host, port)).map_err(connect_error)?;
        while conn.is_handshaking() {
            conn.complete_io(&mut sock).map_err(connect_error)?;
        }
        info!("Connected to {host}:{port} as {}", self.alias);
        Ok(StreamOwned::new(conn, sock))
    }
}

/// Blocking HTTPS client presenting a client certificate to one host
#[derive(Clone, Debug)]
pub struct HttpsClient {
    base_url: String,
    client: reqwest::blocking::Client,
    context: Arc<MutualTlsContext>,
}

impl HttpsClient {
    /// Client for `https://{target_host}:443` using `context`
    /// # Errors
    /// Return `Err(TlsSetupError::Client)` if the client can't be built
    pub fn new(context: Arc<MutualTlsContext>, target_host: &str) -> Result<Self, TlsSetupError> {
        let client = reqwest::blocking::Client::builder()
            .use_preconfigured_tls((*context.config).clone())
            .build()?;
        Ok(Self {
            base_url: format!("https://{target_host}:{HTTPS_PORT}"),
            client,
            context,
        })
    }

    /// Client bound to the process-wide default context
    /// # Errors
    /// Return `Err(TlsSetupError::NoDefaultContext)` if no context is installed
    pub fn from_default(target_host: &str) -> Result<Self, TlsSetupError> {
        let context = default_context().ok_or(TlsSetupError::NoDefaultContext)?;
        Self::new(context, target_host)
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn context(&self) -> &MutualTlsContext {
        &self.context
    }

    #[must_use]
    pub fn client(&self) -> &reqwest::blocking::Client {
        &self.client
    }

    #[must_use]
    pub fn url(&self, path: &[&str]) -> String {
        format!("{}/{}", self.base_url, path.join("/"))
    }

    #[must_use]
    pub fn get(&self, path: &[&str]) -> reqwest::blocking::RequestBuilder {
        self.client.get(self.url(path))
    }

    #[must_use]
    pub fn post(&self, path: &[&str]) -> reqwest::blocking::RequestBuilder {
        self.client.post(self.url(path))
    }
}

/// Builds mutual TLS contexts for descriptors
#[derive(Clone, Debug, Default)]
pub struct MutualTlsChannelFactory {
    backend: KeystoreBackend,
}

impl From<&CertificateResolver> for MutualTlsChannelFactory {
    fn from(resolver: &CertificateResolver) -> Self {
        Self {
            backend: resolver.backend().clone(),
        }
    }
}

impl MutualTlsChannelFactory {
    #[must_use]
    pub fn new(backend: KeystoreBackend) -> Self {
        Self { backend }
    }

    /// Build a context for `descriptor`, opening its keystore
    /// # Errors
    /// Return `Err(TlsSetupError)` if the keystore, the key or the CA bundle
    /// can't be loaded
    pub fn build_channel(
        &self,
        descriptor: &CertificateDescriptor,
        ca_bundle: &CaBundle,
    ) -> Result<Arc<MutualTlsContext>, TlsSetupError> {
        descriptor.check()?;
        let handle = self.backend.open(descriptor.source())?;
        self.build_channel_with(handle.as_ref(), descriptor, ca_bundle)
    }

    /// Build a context for `descriptor` from an already opened keystore
    /// # Errors
    /// See [`Self::build_channel`]
    pub fn build_channel_with(
        &self,
        handle: &dyn KeyStoreHandle,
        descriptor: &CertificateDescriptor,
        ca_bundle: &CaBundle,
    ) -> Result<Arc<MutualTlsContext>, TlsSetupError> {
        let alias = match descriptor.alias() {
            Some(alias) => alias.to_owned(),
            None => handle.aliases()?.into_iter().next().ok_or_else(|| {
                ResolveError::CertificateNotFound(format!(
                    "entry of {} keystore",
                    descriptor.source_type()
                ))
            })?,
        };
        let chain: Vec<CertificateDer<'static>> = handle.chain(&alias)?;
        let key = handle
            .private_key(&alias)?
            .signing_key()
            .map_err(|e| TlsSetupError::PrivateKey(e.to_string()))?;
        let certified = CertifiedKey::new(chain, key);

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ClientConfig::builder_with_provider(provider)
            .with_protocol_versions(protocol_versions(descriptor.tls_protocol()))?
            .with_root_certificates(ca_bundle.root_store()?)
            .with_client_cert_resolver(Arc::new(SingleIdentity(Arc::new(certified))));

        debug!(
            "Built {} client context for {alias}",
            descriptor.tls_protocol()
        );
        let context = Arc::new(MutualTlsContext {
            alias,
            tls_protocol: descriptor.tls_protocol(),
            config: Arc::new(config),
        });
        if !descriptor.concurrency_mode() {
            install(Arc::clone(&context));
        }
        Ok(context)
    }

    /// Install the default context for `descriptor`; a no-op in concurrency mode
    /// # Errors
    /// See [`Self::build_channel`]
    pub fn initialize(
        &self,
        descriptor: &CertificateDescriptor,
        ca_bundle: &CaBundle,
    ) -> Result<Option<Arc<MutualTlsContext>>, TlsSetupError> {
        if descriptor.concurrency_mode() {
            debug!("Concurrency mode, leaving the default TLS context alone");
            return Ok(None);
        }
        self.build_channel(descriptor, ca_bundle).map(Some)
    }

    /// HTTPS client bound to `https://{target_host}:443`
    /// # Errors
    /// See [`Self::build_channel`]; also fails if the client can't be built
    pub fn build_https_client(
        &self,
        descriptor: &CertificateDescriptor,
        target_host: &str,
        ca_bundle: &CaBundle,
    ) -> Result<HttpsClient, TlsSetupError> {
        HttpsClient::new(self.build_channel(descriptor, ca_bundle)?, target_host)
    }
}

fn install(context: Arc<MutualTlsContext>) {
    let mut slot = DEFAULT_CONTEXT
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    match slot.as_deref() {
        Some(previous) if previous.alias != context.alias => warn!(
            "Replacing default TLS identity {} with {}",
            previous.alias, context.alias
        ),
        _ => info!("Default TLS identity set to {}", context.alias),
    }
    *slot = Some(context);
}

/// Context installed by the last non-concurrent build
#[must_use]
pub fn default_context() -> Option<Arc<MutualTlsContext>> {
    DEFAULT_CONTEXT
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

pub fn clear_default() {
    DEFAULT_CONTEXT
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
}
