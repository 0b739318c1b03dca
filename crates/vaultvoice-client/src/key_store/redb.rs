//! Redb-backed durable key store.
//!
//! Uses Redb's ACID transactions with Copy-on-Write for crash safety. Each
//! `put` is one write transaction holding one record.

use std::{path::Path, sync::Arc};

use redb::{Database, TableDefinition};
use vaultvoice_core::{PassphraseEnvelope, SessionId};

use super::{KeyStoreError, LocalKeyStore, decode_record, encode_record};

/// Table: passphrase_envelopes
/// Key: session id bytes [16 bytes]
/// Value: JSON `StoredEnvelope`
const ENVELOPES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("passphrase_envelopes");

/// Durable device-local key store backed by Redb.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RedbKeyStore {
    db: Arc<Database>,
}

impl RedbKeyStore {
    /// Open or create a key store at the given path.
    ///
    /// # Errors
    ///
    /// Returns `KeyStoreError::Io` if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, KeyStoreError> {
        let db = Database::create(path.as_ref()).map_err(|e| KeyStoreError::Io(e.to_string()))?;

        let txn = db.begin_write().map_err(|e| KeyStoreError::Io(e.to_string()))?;
        {
            let _ = txn.open_table(ENVELOPES).map_err(|e| KeyStoreError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| KeyStoreError::Io(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl LocalKeyStore for RedbKeyStore {
    fn put(
        &self,
        session_id: &SessionId,
        envelope: &PassphraseEnvelope,
    ) -> Result<(), KeyStoreError> {
        let record = encode_record(envelope)?;

        let txn = self.db.begin_write().map_err(|e| KeyStoreError::Io(e.to_string()))?;
        {
            let mut table =
                txn.open_table(ENVELOPES).map_err(|e| KeyStoreError::Io(e.to_string()))?;
            table
                .insert(session_id.as_bytes().as_slice(), record.as_slice())
                .map_err(|e| KeyStoreError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| KeyStoreError::Io(e.to_string()))?;

        Ok(())
    }

    fn get(&self, session_id: &SessionId) -> Result<PassphraseEnvelope, KeyStoreError> {
        let txn = self.db.begin_read().map_err(|e| KeyStoreError::Io(e.to_string()))?;
        let table = txn.open_table(ENVELOPES).map_err(|e| KeyStoreError::Io(e.to_string()))?;

        let value = table
            .get(session_id.as_bytes().as_slice())
            .map_err(|e| KeyStoreError::Io(e.to_string()))?
            .ok_or(KeyStoreError::NotFound)?;

        decode_record(value.value())
    }

    fn remove(&self, session_id: &SessionId) -> Result<bool, KeyStoreError> {
        let txn = self.db.begin_write().map_err(|e| KeyStoreError::Io(e.to_string()))?;
        let existed = {
            let mut table =
                txn.open_table(ENVELOPES).map_err(|e| KeyStoreError::Io(e.to_string()))?;
            let removed = table
                .remove(session_id.as_bytes().as_slice())
                .map_err(|e| KeyStoreError::Io(e.to_string()))?
                .is_some();
            removed
        };
        txn.commit().map_err(|e| KeyStoreError::Io(e.to_string()))?;

        Ok(existed)
    }
}
