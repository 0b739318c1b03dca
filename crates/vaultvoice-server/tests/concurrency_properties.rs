//! Concurrency properties of case threads.
//!
//! Appends from the submitter and the investigator may arrive in any order.
//! The stored thread must depend only on item timestamps, and concurrent
//! appends must never lose an item.

use std::sync::Arc;

use proptest::prelude::*;
use vaultvoice_client::{InvestigatorSession, MemoryKeyStore, SubmitterSession};
use vaultvoice_core::{
    CaseRecord, InvestigatorEnvelope, ItemId, ItemType, Sender, ThreadItem,
    env::test_utils::MockEnv, seal_private_key,
};
use vaultvoice_crypto::{Algorithm, EncryptedBlob, InvestigatorPrivateKey, TAG_SIZE};
use vaultvoice_server::{
    CaseService, CaseStorage, InvestigatorCredentials, MemoryStorage, ServiceConfig,
};

const PRIVATE_PEM: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../testdata/investigator_private.pem"));
const PUBLIC_PEM: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../testdata/investigator_public.pem"));

fn opaque_item(index: usize, created_at: u64, sender: Sender, item_type: ItemType) -> ThreadItem {
    let mut id = [0u8; 16];
    id[..8].copy_from_slice(&(index as u64).to_be_bytes());

    ThreadItem {
        id: ItemId::from_bytes(id),
        item_type,
        sender,
        created_at,
        blob: EncryptedBlob {
            ciphertext: vec![index as u8; TAG_SIZE + 4],
            nonce: [index as u8; 12],
            algorithm: Algorithm::default(),
        },
        filename: None,
    }
}

/// Fresh store holding one reported case; returns the store and the case.
fn reported_case() -> (MemoryStorage, CaseRecord) {
    let env = MockEnv::seeded(99);
    let storage = MemoryStorage::new();
    let record = CaseRecord::open(&env);
    storage.insert_case(&record).unwrap();

    let report = opaque_item(usize::MAX, 0, Sender::Submitter, ItemType::Report);
    let envelope = InvestigatorEnvelope { wrapped_key: vec![1; 256] };
    storage.attach_report(&record.case_id, &report, &envelope).unwrap();

    (storage, record)
}

/// Distinct timestamps, each tagged with the party that wrote it.
fn timeline() -> impl Strategy<Value = Vec<(u64, Sender)>> {
    prop::collection::btree_set(1u64..10_000, 0..30).prop_flat_map(|stamps| {
        let len = stamps.len();
        (Just(stamps), prop::collection::vec(any::<bool>(), len)).prop_map(|(stamps, who)| {
            stamps
                .into_iter()
                .zip(who)
                .map(|(at, submitter)| {
                    (at, if submitter { Sender::Submitter } else { Sender::Investigator })
                })
                .collect()
        })
    })
}

proptest! {
    /// Arrival order does not change the stored thread.
    #[test]
    fn prop_appends_commute(
        (timeline, shuffled) in timeline().prop_flat_map(|timeline| {
            let order: Vec<usize> = (0..timeline.len()).collect();
            (Just(timeline), Just(order).prop_shuffle())
        })
    ) {
        let items: Vec<ThreadItem> = timeline
            .iter()
            .enumerate()
            .map(|(i, (at, sender))| opaque_item(i, *at, *sender, ItemType::Message))
            .collect();

        let (in_order, record) = reported_case();
        for item in &items {
            in_order.append_item(&record.case_id, item).unwrap();
        }

        let (out_of_order, other) = reported_case();
        for &i in &shuffled {
            out_of_order.append_item(&other.case_id, &items[i]).unwrap();
        }

        let a = in_order.load_case(&record.case_id).unwrap().unwrap().thread;
        let b = out_of_order.load_case(&other.case_id).unwrap().unwrap().thread;

        prop_assert_eq!(a.items(), b.items());
        prop_assert_eq!(a.len(), items.len() + 1);
    }

    /// Equal timestamps keep arrival order and never reorder earlier items.
    #[test]
    fn prop_ties_keep_arrival_order(stamps in prop::collection::vec(1u64..5, 1..20)) {
        let (storage, record) = reported_case();
        for (i, at) in stamps.iter().enumerate() {
            let item = opaque_item(i, *at, Sender::Submitter, ItemType::Message);
            storage.append_item(&record.case_id, &item).unwrap();
        }

        let thread = storage.load_case(&record.case_id).unwrap().unwrap().thread;
        let items = &thread.items()[1..];

        prop_assert!(items.windows(2).all(|w| w[0].created_at <= w[1].created_at));
        for w in items.windows(2) {
            if w[0].created_at == w[1].created_at {
                prop_assert!(w[0].id < w[1].id, "tie reordered against arrival");
            }
        }
    }
}

#[tokio::test]
async fn concurrent_appends_from_both_parties_all_land() {
    let env = MockEnv::seeded(41);
    let credentials = InvestigatorCredentials::new("inv", "s3cret").unwrap();
    let config = ServiceConfig::new(PUBLIC_PEM.to_string(), credentials);
    let service = Arc::new(CaseService::new(config, MemoryStorage::new(), env.clone()).unwrap());

    let mut submitter = SubmitterSession::new(Arc::clone(&service), MemoryKeyStore::new(), env.clone());
    let session_id = submitter.submit("Fraud in dept X", "correct-horse").await.unwrap();
    submitter.authenticate(&session_id.to_string(), "correct-horse").await.unwrap();

    let private_key = InvestigatorPrivateKey::from_pkcs8_pem(PRIVATE_PEM).unwrap();
    let sealed = seal_private_key(&private_key, "k3y").unwrap();
    let mut investigator = InvestigatorSession::new(Arc::clone(&service), env.clone());
    investigator.login("inv", "s3cret").await.unwrap();
    let case_id = investigator.list_cases().await.unwrap()[0].case_id;
    investigator.open_case(&case_id, &sealed, "k3y").await.unwrap();

    // Interleave the two parties on one runtime; each yields between appends
    let submitter_posts = async {
        for i in 0..10 {
            submitter.post(&format!("submitter {i}")).await.unwrap();
            tokio::task::yield_now().await;
        }
    };
    let investigator_replies = async {
        for i in 0..10 {
            investigator.reply(&format!("investigator {i}")).await.unwrap();
            tokio::task::yield_now().await;
        }
    };
    tokio::join!(submitter_posts, investigator_replies);

    let seen_by_submitter = submitter.refresh().await.unwrap();
    let seen_by_investigator = investigator.refresh().await.unwrap();

    assert_eq!(seen_by_submitter.len(), 21);
    assert_eq!(seen_by_submitter, seen_by_investigator);
    assert!(seen_by_submitter.iter().all(|item| !item.is_undecryptable()));

    // Each party's own messages keep their relative order
    for sender in [Sender::Submitter, Sender::Investigator] {
        let own: Vec<&str> = seen_by_submitter
            .iter()
            .skip(1)
            .filter(|item| item.sender == sender)
            .filter_map(|item| item.text())
            .collect();
        assert_eq!(own.len(), 10);
        for (i, text) in own.iter().enumerate() {
            assert!(text.ends_with(&format!(" {i}")), "{text} out of order");
        }
    }
}
