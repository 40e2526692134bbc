
use rustls::pki_types::CertificateDer;
use zeroize::Zeroizing;

use crate::error::BackendError;
use crate::keystore::{KeyHandle, KeyStoreHandle, MemoryStore, TokenProvider, provider_error};

pub(crate) use data::*;

#[derive(Clone, Copy, Debug)]
pub(crate) enum Fixture {
    Corporate,
    Valid,
    Expired,
    Plain,
    Punctuated,
}

impl Fixture {
    fn bytes(self) -> (&'static [u8], &'static [u8]) {
        match self {
            Self::Corporate => (CORPORATE_DER, CORPORATE_KEY),
            Self::Valid => (VALID_DER, VALID_KEY),
            Self::Expired => (EXPIRED_DER, EXPIRED_KEY),
            Self::Plain => (PLAIN_DER, PLAIN_KEY),
            Self::Punctuated => (PUNCTUATED_DER, PUNCTUATED_KEY),
        }
    }

    pub(crate) fn der(self) -> CertificateDer<'static> {
        CertificateDer::from(self.bytes().0.to_vec())
    }

    pub(crate) fn chain(self) -> Vec<CertificateDer<'static>> {
        vec![self.der()]
    }

    pub(crate) fn key(self) -> KeyHandle {
        KeyHandle::Pkcs8(Zeroizing::new(self.bytes().1.to_vec()))
    }
}

pub(crate) fn store(entries: &[(&str, Fixture)]) -> MemoryStore {
    entries.iter().fold(MemoryStore::new(), |store, (alias, fixture)| {
        store.with_entry(*alias, fixture.chain(), Some(fixture.key()))
    })
}

/// Token emulation guarded by a PIN
pub(crate) struct MemoryToken {
    pin: String,
    store: MemoryStore,
}

impl MemoryToken {
    pub(crate) fn new(pin: &str, store: MemoryStore) -> Self {
        Self {
            pin: pin.to_owned(),
            store,
        }
    }
}

impl TokenProvider for MemoryToken {
    fn name(&self) -> &str {
        "memory-token"
    }

    fn login(&self, pin: &str) -> Result<Box<dyn KeyStoreHandle>, BackendError> {
        if pin == self.pin {
            Ok(Box::new(self.store.clone()))
        } else {
            Err(provider_error(self.name(), "CKR_PIN_INCORRECT"))
        }
    }
}
