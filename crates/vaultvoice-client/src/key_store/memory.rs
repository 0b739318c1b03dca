#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use vaultvoice_core::{PassphraseEnvelope, SessionId};

use super::{KeyStoreError, LocalKeyStore, decode_record, encode_record};

/// In-memory key store for tests.
///
/// Holds the same JSON records the durable store writes, so tests can inspect
/// exactly what would land on disk. Uses `lock().expect()`, which panics if
/// the mutex is poisoned; acceptable for test code.
#[derive(Clone, Default)]
pub struct MemoryKeyStore {
    records: Arc<Mutex<HashMap<SessionId, Vec<u8>>>>,
}

impl MemoryKeyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored envelopes.
    #[allow(clippy::expect_used)]
    pub fn len(&self) -> usize {
        self.records.lock().expect("Mutex poisoned").len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw JSON record for a session, as it would be persisted.
    #[allow(clippy::expect_used)]
    pub fn raw_record(&self, session_id: &SessionId) -> Option<Vec<u8>> {
        self.records.lock().expect("Mutex poisoned").get(session_id).cloned()
    }

    /// Overwrite the raw record for a session, bypassing encoding.
    #[allow(clippy::expect_used)]
    pub fn put_raw_record(&self, session_id: &SessionId, record: Vec<u8>) {
        self.records.lock().expect("Mutex poisoned").insert(*session_id, record);
    }
}

impl LocalKeyStore for MemoryKeyStore {
    #[allow(clippy::expect_used)]
    fn put(
        &self,
        session_id: &SessionId,
        envelope: &PassphraseEnvelope,
    ) -> Result<(), KeyStoreError> {
        let record = encode_record(envelope)?;
        self.records.lock().expect("Mutex poisoned").insert(*session_id, record);
        Ok(())
    }

    #[allow(clippy::expect_used)]
    fn get(&self, session_id: &SessionId) -> Result<PassphraseEnvelope, KeyStoreError> {
        let records = self.records.lock().expect("Mutex poisoned");
        let record = records.get(session_id).ok_or(KeyStoreError::NotFound)?;
        decode_record(record)
    }

    #[allow(clippy::expect_used)]
    fn remove(&self, session_id: &SessionId) -> Result<bool, KeyStoreError> {
        Ok(self.records.lock().expect("Mutex poisoned").remove(session_id).is_some())
    }
}
