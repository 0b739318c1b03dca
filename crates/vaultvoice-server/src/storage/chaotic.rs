//! Fault-injecting storage wrapper
//!
//! Delegates to an inner [`CaseStorage`] but fails a configurable share of
//! operations with `StorageError::Io`. Failures are injected before the inner
//! call, so a failed operation never reaches the backend.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::sync::{Arc, Mutex};

use vaultvoice_core::{
    CaseId, CaseRecord, CaseStatus, InvestigatorEnvelope, MlAssessment, SessionId, ThreadItem,
};

use super::{CaseStorage, StorageError};

/// Which operations are eligible for injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultScope {
    /// Reads and writes
    All,
    /// Only mutations; reads always reach the backend
    WritesOnly,
}

/// Storage wrapper that randomly injects failures
///
/// Clones share the RNG and the operation counter.
#[derive(Clone)]
pub struct ChaoticStorage<S: CaseStorage> {
    inner: S,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    scope: FaultScope,
    rng: Arc<Mutex<FaultRng>>,
    operation_count: Arc<Mutex<usize>>,
}

/// xorshift64* stream; reproducible for a given seed.
struct FaultRng {
    state: u64,
}

impl FaultRng {
    fn new(seed: u64) -> Self {
        // xorshift has a fixed point at zero
        Self { state: seed | 1 }
    }

    /// Next value in [0.0, 1.0)
    #[allow(clippy::cast_precision_loss)]
    fn next_unit(&mut self) -> f64 {
        self.state ^= self.state >> 12;
        self.state ^= self.state << 25;
        self.state ^= self.state >> 27;
        let bits = self.state.wrapping_mul(0x2545_F491_4F6C_DD1D) >> 11;
        bits as f64 / (1u64 << 53) as f64
    }
}

impl<S: CaseStorage> ChaoticStorage<S> {
    /// Wrap `inner`, failing every operation with probability `failure_rate`.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x5EED_CA5E_0000_0001)
    }

    /// Create with explicit seed for reproducible chaos
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self {
            inner,
            failure_rate,
            scope: FaultScope::All,
            rng: Arc::new(Mutex::new(FaultRng::new(seed))),
            operation_count: Arc::new(Mutex::new(0)),
        }
    }

    /// Restrict injected failures to `scope`.
    #[must_use]
    pub fn with_scope(mut self, scope: FaultScope) -> Self {
        self.scope = scope;
        self
    }

    /// Underlying storage (for checking invariants after chaos).
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Total number of storage operations attempted.
    pub fn operation_count(&self) -> usize {
        #[allow(clippy::expect_used)]
        *self.operation_count.lock().expect("operation_count mutex poisoned")
    }

    /// Count the operation, then decide whether it fails.
    fn inject(&self, is_write: bool) -> Result<(), StorageError> {
        #[allow(clippy::expect_used)]
        {
            *self.operation_count.lock().expect("operation_count mutex poisoned") += 1;
        }

        if !is_write && self.scope == FaultScope::WritesOnly {
            return Ok(());
        }

        #[allow(clippy::expect_used)]
        let roll = self.rng.lock().expect("FaultRng mutex poisoned").next_unit();
        if roll < self.failure_rate {
            return Err(StorageError::Io("chaotic failure injection".to_string()));
        }

        Ok(())
    }
}

impl<S: CaseStorage> CaseStorage for ChaoticStorage<S> {
    fn insert_case(&self, record: &CaseRecord) -> Result<(), StorageError> {
        self.inject(true)?;
        self.inner.insert_case(record)
    }

    fn case_id_for_session(&self, session_id: &SessionId) -> Result<Option<CaseId>, StorageError> {
        self.inject(false)?;
        self.inner.case_id_for_session(session_id)
    }

    fn load_case(&self, case_id: &CaseId) -> Result<Option<CaseRecord>, StorageError> {
        self.inject(false)?;
        self.inner.load_case(case_id)
    }

    fn list_cases(&self) -> Result<Vec<CaseRecord>, StorageError> {
        self.inject(false)?;
        self.inner.list_cases()
    }

    fn attach_report(
        &self,
        case_id: &CaseId,
        report: &ThreadItem,
        envelope: &InvestigatorEnvelope,
    ) -> Result<CaseRecord, StorageError> {
        self.inject(true)?;
        self.inner.attach_report(case_id, report, envelope)
    }

    fn append_item(&self, case_id: &CaseId, item: &ThreadItem) -> Result<CaseRecord, StorageError> {
        self.inject(true)?;
        self.inner.append_item(case_id, item)
    }

    fn update_status(
        &self,
        case_id: &CaseId,
        next: CaseStatus,
    ) -> Result<CaseRecord, StorageError> {
        self.inject(true)?;
        self.inner.update_status(case_id, next)
    }

    fn update_assessment(
        &self,
        case_id: &CaseId,
        assessment: MlAssessment,
    ) -> Result<CaseRecord, StorageError> {
        self.inject(true)?;
        self.inner.update_assessment(case_id, assessment)
    }
}

#[cfg(test)]
mod tests {
    use vaultvoice_core::env::test_utils::MockEnv;

    use super::*;
    use crate::storage::{
        MemoryStorage,
        fixtures::{envelope, item},
    };

    #[test]
    fn test_zero_rate_never_fails() {
        let env = MockEnv::seeded(1);
        let chaotic = ChaoticStorage::new(MemoryStorage::new(), 0.0);

        for _ in 0..50 {
            chaotic.insert_case(&CaseRecord::open(&env)).unwrap();
        }

        assert_eq!(chaotic.list_cases().unwrap().len(), 50);
        assert_eq!(chaotic.operation_count(), 51);
    }

    #[test]
    fn test_full_rate_always_fails() {
        let env = MockEnv::seeded(2);
        let chaotic = ChaoticStorage::new(MemoryStorage::new(), 1.0);
        let record = CaseRecord::open(&env);

        assert!(chaotic.insert_case(&record).is_err());
        assert!(chaotic.load_case(&record.case_id).is_err());
        assert_eq!(chaotic.inner().case_count(), 0);
    }

    #[test]
    fn test_writes_only_scope_keeps_reads() {
        let env = MockEnv::seeded(3);
        let memory = MemoryStorage::new();
        let record = CaseRecord::open(&env);
        memory.insert_case(&record).unwrap();
        memory.attach_report(&record.case_id, &item(0, 1), &envelope()).unwrap();

        let chaotic = ChaoticStorage::new(memory, 1.0).with_scope(FaultScope::WritesOnly);

        assert!(chaotic.load_case(&record.case_id).unwrap().is_some());
        assert!(chaotic.append_item(&record.case_id, &item(1, 2)).is_err());
        assert_eq!(chaotic.inner().load_case(&record.case_id).unwrap().unwrap().thread.len(), 1);
    }

    #[test]
    fn test_same_seed_same_failures() {
        let env = MockEnv::seeded(4);
        let first = ChaoticStorage::with_seed(MemoryStorage::new(), 0.5, 42);
        let second = ChaoticStorage::with_seed(MemoryStorage::new(), 0.5, 42);

        for i in 0..100 {
            let record = CaseRecord::open(&env);
            assert_eq!(
                first.insert_case(&record).is_ok(),
                second.insert_case(&record).is_ok(),
                "determinism violated at iteration {i}"
            );
        }
    }

    #[test]
    #[should_panic(expected = "failure_rate must be between 0.0 and 1.0")]
    fn test_rejects_invalid_failure_rate() {
        let _chaotic = ChaoticStorage::new(MemoryStorage::new(), 1.5);
    }
}
