#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use vaultvoice_core::{
    CaseId, CaseRecord, CaseStatus, InvestigatorEnvelope, MlAssessment, SessionId, ThreadItem,
};

use super::{CaseStorage, StorageError, apply};

/// Case store held entirely in memory.
///
/// Clones share one map, so a test can keep a handle on the store it hands
/// to `CaseService` or wraps in `ChaoticStorage`. Each mutation runs against
/// a copy of the record and commits only on success. A poisoned mutex panics.
#[derive(Clone)]
pub struct MemoryStorage {
    inner: Arc<Mutex<MemoryStorageInner>>,
}

struct MemoryStorageInner {
    cases: HashMap<CaseId, CaseRecord>,

    /// Session handle -> case handle
    sessions: HashMap<SessionId, CaseId>,
}

impl MemoryStorage {
    /// Create a new empty `MemoryStorage`
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryStorageInner {
                cases: HashMap::new(),
                sessions: HashMap::new(),
            })),
        }
    }

    /// Number of stored cases, with or without a report.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn case_count(&self) -> usize {
        self.inner.lock().expect("Mutex poisoned").cases.len()
    }

    #[allow(clippy::expect_used)]
    fn modify(
        &self,
        case_id: &CaseId,
        mutate: impl FnOnce(&mut CaseRecord) -> Result<(), StorageError>,
    ) -> Result<CaseRecord, StorageError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        let stored = inner.cases.get_mut(case_id).ok_or(StorageError::NotFound)?;

        // Mutate a copy so a rejected change leaves the stored record intact.
        let mut record = stored.clone();
        mutate(&mut record)?;
        *stored = record.clone();

        Ok(record)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl CaseStorage for MemoryStorage {
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn insert_case(&self, record: &CaseRecord) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");

        if inner.cases.contains_key(&record.case_id)
            || inner.sessions.contains_key(&record.session_id)
        {
            return Err(StorageError::Conflict(format!("case {} already exists", record.case_id)));
        }

        inner.sessions.insert(record.session_id, record.case_id);
        inner.cases.insert(record.case_id, record.clone());

        Ok(())
    }

    #[allow(clippy::expect_used)]
    fn case_id_for_session(&self, session_id: &SessionId) -> Result<Option<CaseId>, StorageError> {
        Ok(self.inner.lock().expect("Mutex poisoned").sessions.get(session_id).copied())
    }

    #[allow(clippy::expect_used)]
    fn load_case(&self, case_id: &CaseId) -> Result<Option<CaseRecord>, StorageError> {
        Ok(self.inner.lock().expect("Mutex poisoned").cases.get(case_id).cloned())
    }

    #[allow(clippy::expect_used)]
    fn list_cases(&self) -> Result<Vec<CaseRecord>, StorageError> {
        Ok(self.inner.lock().expect("Mutex poisoned").cases.values().cloned().collect())
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
