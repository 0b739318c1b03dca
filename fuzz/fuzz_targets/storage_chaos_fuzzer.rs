//! Fuzz target for case storage under injected failures
//!
//! Drives `CaseStorage` through `ChaoticStorage` with random operation
//! sequences and checks the wrapped store after every step.
//!
//! # Strategy
//!
//! - Variable failure rates (0% to 90%)
//! - Valid and invalid mutations: duplicate ids, appends before the report,
//!   backward status changes
//! - Reads interleaved with writes
//!
//! # Invariants
//!
//! - Storage errors propagate as `Err`, never panics
//! - A failed mutation leaves the store exactly as it was
//! - Threads stay ordered by `createdAt` with unique item ids
//! - A thread is non-empty only once the report is attached, and the report
//!   is the only `Report` item
//! - Status never moves backward

#![no_main]

use std::collections::HashSet;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use vaultvoice_core::{
    CaseId, CaseRecord, CaseStatus, InvestigatorEnvelope, ItemId, ItemType, MlAssessment, MlLabel,
    Sender, ThreadItem, env::test_utils::MockEnv,
};
use vaultvoice_crypto::{Algorithm, EncryptedBlob, TAG_SIZE};
use vaultvoice_server::{CaseStorage, ChaoticStorage, MemoryStorage};

#[derive(Debug, Clone, Arbitrary)]
struct ChaosScenario {
    /// Seed for ids and the mock clock
    seed: u64,
    /// Seed for ChaoticStorage RNG (deterministic failures)
    chaos_seed: u64,
    /// Failure rate 0-9 maps to 0%-90%
    failure_rate_tenth: u8,
    operations: Vec<ChaosOperation>,
}

#[derive(Debug, Clone, Arbitrary)]
enum ChaosOperation {
    CreateCase,
    AttachReport { case: u8, at: u16 },
    Append { case: u8, at: u16, reuse_id: bool },
    SetStatus { case: u8, status: u8 },
    Assess { case: u8, score: u8 },
    Load { case: u8 },
    List,
}

fuzz_target!(|scenario: ChaosScenario| {
    let failure_rate = f64::from(scenario.failure_rate_tenth % 10) / 10.0;
    let env = MockEnv::seeded(scenario.seed);
    let inner = MemoryStorage::new();
    let storage = ChaoticStorage::with_seed(inner.clone(), failure_rate, scenario.chaos_seed);

    let mut case_ids: Vec<CaseId> = Vec::new();
    let mut item_ids: Vec<ItemId> = Vec::new();

    for op in scenario.operations.into_iter().take(128) {
        env.advance(1);
        let before = snapshot(&inner);

        let result = match op {
            ChaosOperation::CreateCase => {
                let record = CaseRecord::open(&env);
                let result = storage.insert_case(&record);
                if result.is_ok() {
                    case_ids.push(record.case_id);
                }
                result.map(drop)
            },

            ChaosOperation::AttachReport { case, at } => {
                let Some(case_id) = pick(&case_ids, case) else { continue };
                let report = item(&env, u64::from(at), ItemType::Report, Sender::Submitter);
                item_ids.push(report.id);
                let envelope = InvestigatorEnvelope { wrapped_key: vec![7; 256] };
                storage.attach_report(&case_id, &report, &envelope).map(drop)
            },

            ChaosOperation::Append { case, at, reuse_id } => {
                let Some(case_id) = pick(&case_ids, case) else { continue };
                let mut message = item(&env, u64::from(at), ItemType::Message, Sender::Investigator);
                if reuse_id {
                    if let Some(id) = item_ids.last() {
                        message.id = *id;
                    }
                }
                item_ids.push(message.id);
                storage.append_item(&case_id, &message).map(drop)
            },

            ChaosOperation::SetStatus { case, status } => {
                let Some(case_id) = pick(&case_ids, case) else { continue };
                let next = match status % 3 {
                    0 => CaseStatus::New,
                    1 => CaseStatus::InReview,
                    _ => CaseStatus::Closed,
                };
                storage.update_status(&case_id, next).map(drop)
            },

            ChaosOperation::Assess { case, score } => {
                let Some(case_id) = pick(&case_ids, case) else { continue };
                let assessment =
                    MlAssessment { label: MlLabel::Abusive, score: f64::from(score) / 255.0 };
                storage.update_assessment(&case_id, assessment).map(drop)
            },

            ChaosOperation::Load { case } => {
                let Some(case_id) = pick(&case_ids, case) else { continue };
                storage.load_case(&case_id).map(drop)
            },

            ChaosOperation::List => storage.list_cases().map(drop),
        };

        let after = snapshot(&inner);
        if result.is_err() {
            assert_eq!(before, after, "failed operation changed the store");
        }

        for (old, new) in before.iter().zip(&after) {
            assert_eq!(old.case_id, new.case_id);
            assert!(old.status.can_transition_to(new.status) || old.status == new.status);
        }
        for record in &after {
            check_record(record);
        }
    }
});

/// All records, sorted by case id for stable comparison.
fn snapshot(storage: &MemoryStorage) -> Vec<CaseRecord> {
    let mut records = storage.list_cases().expect("memory storage reads never fail");
    records.sort_by_key(|record| *record.case_id.as_bytes());
    records
}

fn check_record(record: &CaseRecord) {
    let items = record.thread.items();

    if !record.has_report() {
        assert!(items.is_empty(), "thread items before the report");
        return;
    }

    assert!(items.windows(2).all(|w| w[0].created_at <= w[1].created_at));
    assert_eq!(items.iter().filter(|item| item.item_type == ItemType::Report).count(), 1);

    let ids: HashSet<ItemId> = items.iter().map(|item| item.id).collect();
    assert_eq!(ids.len(), items.len(), "duplicate item id stored");
}

fn pick(ids: &[CaseId], index: u8) -> Option<CaseId> {
    if ids.is_empty() {
        return None;
    }
    ids.get(index as usize % ids.len()).copied()
}

fn item(env: &MockEnv, created_at: u64, item_type: ItemType, sender: Sender) -> ThreadItem {
    ThreadItem {
        id: ItemId::generate(env),
        item_type,
        sender,
        created_at,
        blob: EncryptedBlob {
            ciphertext: vec![0xA5; TAG_SIZE + 8],
            nonce: [0; 12],
            algorithm: Algorithm::default(),
        },
        filename: None,
    }
}
