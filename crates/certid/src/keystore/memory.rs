// SPDX-FileCopyrightText: 2025-2026 TII (SSRC) and the Ghaf contributors
// SPDX-License-Identifier: Apache-2.0

use rustls::pki_types::CertificateDer;

use super::{KeyHandle, KeyStoreHandle, PlatformStore};
use crate::error::BackendError;

#[derive(Clone, Debug)]
struct MemoryEntry {
    alias: String,
    chain: Vec<CertificateDer<'static>>,
    key: Option<KeyHandle>,
}

/// Keystore held in process memory, enumerated in insertion order.
///
/// Serves as a [`PlatformStore`] too: every `open()` hands out a snapshot.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: Vec<MemoryEntry>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_entry(
        mut self,
        alias: impl Into<String>,
        chain: Vec<CertificateDer<'static>>,
        key: Option<KeyHandle>,
    ) -> Self {
        self.insert(alias, chain, key);
        self
    }

    /// Add an entry, replacing any entry with the same alias in place
    pub fn insert(
        &mut self,
        alias: impl Into<String>,
        chain: Vec<CertificateDer<'static>>,
        key: Option<KeyHandle>,
    ) {
        let entry = MemoryEntry {
            alias: alias.into(),
            chain,
            key,
        };
        match self.entries.iter_mut().find(|e| e.alias == entry.alias) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, alias: &str) -> Option<&MemoryEntry> {
        self.entries.iter().find(|e| e.alias == alias)
    }
}

impl KeyStoreHandle for MemoryStore {
    fn aliases(&self) -> Result<Vec<String>, BackendError> {
        Ok(self.entries.iter().map(|e| e.alias.clone()).collect())
    }

    fn certificate(&self, alias: &str) -> Result<Option<CertificateDer<'static>>, BackendError> {
        Ok(self.entry(alias).and_then(|e| e.chain.first().cloned()))
    }

    fn chain(&self, alias: &str) -> Result<Vec<CertificateDer<'static>>, BackendError> {
        self.entry(alias)
            .map(|e| e.chain.clone())
            .ok_or_else(|| BackendError::AliasNotFound(alias.to_owned()))
    }

    fn private_key(&self, alias: &str) -> Result<KeyHandle, BackendError> {
        let entry = self
            .entry(alias)
            .ok_or_else(|| BackendError::AliasNotFound(alias.to_owned()))?;
        entry
            .key
            .clone()
            .ok_or_else(|| BackendError::KeyUnavailable(alias.to_owned()))
    }
}

impl PlatformStore for MemoryStore {
    fn open(&self) -> Result<Box<dyn KeyStoreHandle>, BackendError> {
        Ok(Box::new(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::Fixture;

    #[test]
    fn test_insertion_order_and_replace() -> anyhow::Result<()> {
        let a = Fixture::Valid;
        let b = Fixture::Expired;
        let mut store = MemoryStore::new()
            .with_entry("b", b.chain(), None)
            .with_entry("a", a.chain(), Some(a.key()));
        assert_eq!(store.aliases()?, vec!["b".to_string(), "a".to_string()]);

        store.insert("b", a.chain(), Some(a.key()));
        assert_eq!(store.len(), 2);
        assert_eq!(store.certificate("b")?, Some(a.der()));
        Ok(())
    }

    #[test]
    fn test_missing_key() -> anyhow::Result<()> {
        let a = Fixture::Plain;
        let store = MemoryStore::new().with_entry("trusted", a.chain(), None);
        assert!(matches!(
            store.private_key("trusted"),
            Err(BackendError::KeyUnavailable(_))
        ));
        assert!(matches!(
            store.private_key("other"),
            Err(BackendError::AliasNotFound(_))
        ));
        assert!(store.chain("other").is_err());
        assert_eq!(store.certificate("other")?, None);
        Ok(())
    }
}
