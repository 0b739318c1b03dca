//! Storage abstraction for case records
//!
//! Trait-based abstraction for persisting cases. The trait is synchronous (no
//! async); the service calls it directly from its request handlers.
//!
//! Every mutation is a single read-modify-write under the backend's own
//! exclusion (a mutex or a redb write transaction), so concurrent appends from
//! the submitter and the investigator never lose each other.

mod chaotic;
mod error;
mod memory;
mod redb;

pub use chaotic::{ChaoticStorage, FaultScope};
pub use error::StorageError;
pub use memory::MemoryStorage;
use vaultvoice_core::{
    CaseId, CaseRecord, CaseStatus, InvestigatorEnvelope, MlAssessment, SessionId, ThreadItem,
};

pub use self::redb::RedbStorage;

/// Storage abstraction for case records
///
/// Must be Clone (shared between request handlers), Send + Sync (thread-safe),
/// and synchronous. Implementations share internal state via Arc, so clones
/// access the same underlying storage.
///
/// # Panics
///
/// Implementations may panic if internal synchronization primitives are
/// poisoned (a thread panicked while holding a lock).
pub trait CaseStorage: Clone + Send + Sync + 'static {
    /// Persist a freshly opened case.
    ///
    /// # Errors
    ///
    /// - `Conflict` if the case id or session id is already taken
    fn insert_case(&self, record: &CaseRecord) -> Result<(), StorageError>;

    /// Resolve a session id to its case id. `None` if unknown.
    fn case_id_for_session(&self, session_id: &SessionId) -> Result<Option<CaseId>, StorageError>;

    /// Load a case record. `None` if unknown.
    fn load_case(&self, case_id: &CaseId) -> Result<Option<CaseRecord>, StorageError>;

    /// Every stored case, in no particular order.
    fn list_cases(&self) -> Result<Vec<CaseRecord>, StorageError>;

    /// Attach the initial report and investigator envelope.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown case
    /// - `Conflict` if a report is already attached
    fn attach_report(
        &self,
        case_id: &CaseId,
        report: &ThreadItem,
        envelope: &InvestigatorEnvelope,
    ) -> Result<CaseRecord, StorageError>;

    /// Append one item to the case thread, keeping `createdAt` order.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown case
    /// - `Conflict` for a duplicate item id or a case without a report
    fn append_item(&self, case_id: &CaseId, item: &ThreadItem) -> Result<CaseRecord, StorageError>;

    /// Move the case status forward.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown case
    /// - `Transition` for same-state or backward changes; nothing is written
    fn update_status(&self, case_id: &CaseId, next: CaseStatus)
    -> Result<CaseRecord, StorageError>;

    /// Replace the abuse classification of a case.
    fn update_assessment(
        &self,
        case_id: &CaseId,
        assessment: MlAssessment,
    ) -> Result<CaseRecord, StorageError>;
}

/// Mutations shared by every backend. Each runs against a record the backend
/// holds exclusively, and leaves it untouched on error.
pub(crate) mod apply {
    use super::{CaseRecord, CaseStatus, InvestigatorEnvelope, StorageError, ThreadItem};

    pub(crate) fn report(
        record: &mut CaseRecord,
        report: &ThreadItem,
        envelope: &InvestigatorEnvelope,
    ) -> Result<(), StorageError> {
        if record.has_report() {
            return Err(StorageError::Conflict(format!(
                "case {} already has a report",
                record.case_id
            )));
        }
        if record.thread.contains(&report.id) {
            return Err(duplicate_item(report));
        }

        record.thread.insert(report.clone());
        record.investigator_envelope = Some(envelope.clone());
        Ok(())
    }

    pub(crate) fn item(record: &mut CaseRecord, item: &ThreadItem) -> Result<(), StorageError> {
        if !record.has_report() {
            return Err(StorageError::Conflict(format!(
                "case {} has no report yet",
                record.case_id
            )));
        }
        if record.thread.contains(&item.id) {
            return Err(duplicate_item(item));
        }

        record.thread.insert(item.clone());
        Ok(())
    }

    pub(crate) fn status(record: &mut CaseRecord, next: CaseStatus) -> Result<(), StorageError> {
        record.advance_status(next)?;
        Ok(())
    }

    fn duplicate_item(item: &ThreadItem) -> StorageError {
        StorageError::Conflict(format!("item {} already exists", item.id))
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use vaultvoice_core::{InvestigatorEnvelope, ItemId, ItemType, Sender, ThreadItem};
    use vaultvoice_crypto::{Algorithm, EncryptedBlob};

    /// Opaque item; id `0` is the report.
    pub(crate) fn item(id: u8, created_at: u64) -> ThreadItem {
        ThreadItem {
            id: ItemId::from_bytes([id; 16]),
            item_type: if id == 0 { ItemType::Report } else { ItemType::Message },
            sender: Sender::Submitter,
            created_at,
            blob: EncryptedBlob {
                ciphertext: vec![id; 24],
                nonce: [id; 12],
                algorithm: Algorithm::default(),
            },
            filename: None,
        }
    }

    pub(crate) fn envelope() -> InvestigatorEnvelope {
        InvestigatorEnvelope { wrapped_key: vec![7; 256] }
    }
}
