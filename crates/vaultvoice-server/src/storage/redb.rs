//! Redb-backed durable storage implementation.
//!
//! Uses Redb's ACID transactions with Copy-on-Write for crash safety. Every
//! mutation is one write transaction, so a failed or rejected change commits
//! nothing and a restart sees either the whole change or none of it.

use std::{path::Path, sync::Arc};

use redb::{Database, ReadableTable, TableDefinition, WriteTransaction};
use vaultvoice_core::{
    CaseId, CaseRecord, CaseStatus, InvestigatorEnvelope, MlAssessment, SessionId, ThreadItem,
};

use super::{CaseStorage, StorageError, apply};

/// Table: cases
/// Key: case id [16 bytes]
/// Value: CBOR-encoded CaseRecord
const CASES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("cases");

/// Table: sessions
/// Key: session id [16 bytes]
/// Value: case id [16 bytes]
const SESSIONS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("sessions");

/// Durable storage backed by Redb.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RedbStorage {
    db: Arc<Database>,
}

impl RedbStorage {
    /// Open or create a Redb database at the given path.
    ///
    /// Creates tables if they don't exist (CASES, SESSIONS).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(|e| StorageError::Io(e.to_string()))?;

        let txn = db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        {
            let _ = txn.open_table(CASES).map_err(|e| StorageError::Io(e.to_string()))?;
            let _ = txn.open_table(SESSIONS).map_err(|e| StorageError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Load, mutate and rewrite one record inside a single write transaction.
    ///
    /// The transaction is dropped uncommitted if `mutate` fails.
    fn modify(
        &self,
        case_id: &CaseId,
        mutate: impl FnOnce(&mut CaseRecord) -> Result<(), StorageError>,
    ) -> Result<CaseRecord, StorageError> {
        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;

        let record = {
            let mut table = txn.open_table(CASES).map_err(|e| StorageError::Io(e.to_string()))?;

            let key = case_id.as_bytes().as_slice();
            let mut record = match table.get(key).map_err(|e| StorageError::Io(e.to_string()))? {
                Some(value) => decode_record(value.value())?,
                None => return Err(StorageError::NotFound),
            };

            mutate(&mut record)?;

            let bytes = encode_record(&record)?;
            table.insert(key, bytes.as_slice()).map_err(|e| StorageError::Io(e.to_string()))?;
            record
        };

        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(record)
    }
}

fn encode_record(record: &CaseRecord) -> Result<Vec<u8>, StorageError> {
    let mut bytes = Vec::new();
    ciborium::into_writer(record, &mut bytes)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(bytes)
}

fn decode_record(bytes: &[u8]) -> Result<CaseRecord, StorageError> {
    ciborium::from_reader(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn key_taken(txn: &WriteTransaction, record: &CaseRecord) -> Result<bool, StorageError> {
    let cases = txn.open_table(CASES).map_err(|e| StorageError::Io(e.to_string()))?;
    let sessions = txn.open_table(SESSIONS).map_err(|e| StorageError::Io(e.to_string()))?;

    let case_taken = cases
        .get(record.case_id.as_bytes().as_slice())
        .map_err(|e| StorageError::Io(e.to_string()))?
        .is_some();
    let session_taken = sessions
        .get(record.session_id.as_bytes().as_slice())
        .map_err(|e| StorageError::Io(e.to_string()))?
        .is_some();

    Ok(case_taken || session_taken)
}

impl CaseStorage for RedbStorage {
    fn insert_case(&self, record: &CaseRecord) -> Result<(), StorageError> {
        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;

        if key_taken(&txn, record)? {
            return Err(StorageError::Conflict(format!("case {} already exists", record.case_id)));
        }

        {
            let bytes = encode_record(record)?;
            let mut cases = txn.open_table(CASES).map_err(|e| StorageError::Io(e.to_string()))?;
            cases
                .insert(record.case_id.as_bytes().as_slice(), bytes.as_slice())
                .map_err(|e| StorageError::Io(e.to_string()))?;
        }
        {
            let mut sessions =
                txn.open_table(SESSIONS).map_err(|e| StorageError::Io(e.to_string()))?;
            sessions
                .insert(
                    record.session_id.as_bytes().as_slice(),
                    record.case_id.as_bytes().as_slice(),
                )
                .map_err(|e| StorageError::Io(e.to_string()))?;
        }

        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(())
    }

    fn case_id_for_session(&self, session_id: &SessionId) -> Result<Option<CaseId>, StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;

        let table = txn.open_table(SESSIONS).map_err(|e| StorageError::Io(e.to_string()))?;

        match table
            .get(session_id.as_bytes().as_slice())
            .map_err(|e| StorageError::Io(e.to_string()))?
        {
            Some(value) => {
                let bytes: [u8; 16] = value.value().try_into().map_err(|_| {
                    StorageError::Serialization("session index value is not 16 bytes".to_string())
                })?;
                Ok(Some(CaseId::from_bytes(bytes)))
            },
            None => Ok(None),
        }
    }

    fn load_case(&self, case_id: &CaseId) -> Result<Option<CaseRecord>, StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;

        let table = txn.open_table(CASES).map_err(|e| StorageError::Io(e.to_string()))?;

        match table.get(case_id.as_bytes().as_slice()).map_err(|e| StorageError::Io(e.to_string()))? {
            Some(value) => Ok(Some(decode_record(value.value())?)),
            None => Ok(None),
        }
    }

    fn list_cases(&self) -> Result<Vec<CaseRecord>, StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;

        let table = txn.open_table(CASES).map_err(|e| StorageError::Io(e.to_string()))?;

        let mut cases = Vec::new();

        for result in table.iter().map_err(|e| StorageError::Io(e.to_string()))? {
            let (_, value) = result.map_err(|e| StorageError::Io(e.to_string()))?;
            cases.push(decode_record(value.value())?);
        }

        Ok(cases)
    }

    fn attach_report(
        &self,
        case_id: &CaseId,
        report: &ThreadItem,
        envelope: &InvestigatorEnvelope,
    ) -> Result<CaseRecord, StorageError> {
        self.modify(case_id, |record| apply::report(record, report, envelope))
    }

    fn append_item(&self, case_id: &CaseId, item: &ThreadItem) -> Result<CaseRecord, StorageError> {
        self.modify(case_id, |record| apply::item(record, item))
    }

    fn update_status(
        &self,
        case_id: &CaseId,
        next: CaseStatus,
    ) -> Result<CaseRecord, StorageError> {
        self.modify(case_id, |record| apply::status(record, next))
    }

    fn update_assessment(
        &self,
        case_id: &CaseId,
        assessment: MlAssessment,
    ) -> Result<CaseRecord, StorageError> {
        self.modify(case_id, |record| {
            record.assessment = assessment;
            Ok(())
        })
    }
}
