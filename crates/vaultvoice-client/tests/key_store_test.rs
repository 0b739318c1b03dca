//! Tests for the device-local key stores.
//!
//! Both implementations must behave identically:
//! - `get` on an unknown session is `NotFound`
//! - `put` twice for one session is last-write-wins
//! - records never contain the raw case key
//!
//! The redb store must additionally survive a close and reopen.

use std::collections::HashMap;

use proptest::prelude::*;
use tempfile::TempDir;
use vaultvoice_client::{KeyStoreError, LocalKeyStore, MemoryKeyStore, RedbKeyStore};
use vaultvoice_core::{
    CaseKey, PassphraseEnvelope, SessionId, create_envelopes, open_passphrase_envelope,
};
use vaultvoice_crypto::{Algorithm, EncryptedBlob, NONCE_SIZE, SALT_SIZE, encode_base64};

fn session(n: u8) -> SessionId {
    SessionId::from_bytes([n; 16])
}

fn envelope(key: &CaseKey, password: &str) -> PassphraseEnvelope {
    create_envelopes(key, password).unwrap().0
}

fn check_store_contract<S: LocalKeyStore>(store: &S) {
    let key = CaseKey::generate().unwrap();
    let first = envelope(&key, "first");
    let second = envelope(&key, "second");

    assert_eq!(store.get(&session(1)), Err(KeyStoreError::NotFound));

    store.put(&session(1), &first).unwrap();
    assert_eq!(store.get(&session(1)).unwrap(), first);

    store.put(&session(1), &second).unwrap();
    let loaded = store.get(&session(1)).unwrap();
    assert_eq!(loaded, second);
    assert!(open_passphrase_envelope(&loaded, "second").unwrap().ct_eq(&key));

    assert_eq!(store.get(&session(2)), Err(KeyStoreError::NotFound));

    assert!(store.remove(&session(1)).unwrap());
    assert!(!store.remove(&session(1)).unwrap());
    assert_eq!(store.get(&session(1)), Err(KeyStoreError::NotFound));
}

#[test]
fn memory_store_contract() {
    check_store_contract(&MemoryKeyStore::new());
}

#[test]
fn redb_store_contract() {
    let dir = TempDir::new().unwrap();
    let store = RedbKeyStore::open(dir.path().join("keys.redb")).unwrap();
    check_store_contract(&store);
}

#[test]
fn redb_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("keys.redb");
    let key = CaseKey::generate().unwrap();
    let stored = envelope(&key, "correct-horse");

    {
        let store = RedbKeyStore::open(&path).unwrap();
        store.put(&session(7), &stored).unwrap();
    }

    let reopened = RedbKeyStore::open(&path).unwrap();
    let loaded = reopened.get(&session(7)).unwrap();
    assert!(open_passphrase_envelope(&loaded, "correct-horse").unwrap().ct_eq(&key));
}

#[test]
fn record_never_holds_raw_key() {
    let store = MemoryKeyStore::new();
    let key = CaseKey::generate().unwrap();
    store.put(&session(3), &envelope(&key, "pw")).unwrap();

    let raw = store.raw_record(&session(3)).unwrap();
    let text = String::from_utf8(raw.clone()).unwrap();

    assert!(!text.contains(&encode_base64(key.symmetric().as_bytes())));
    assert!(!raw.windows(key.symmetric().as_bytes().len()).any(|w| w == key.symmetric().as_bytes()));
}

#[test]
fn clones_share_records() {
    let store = MemoryKeyStore::new();
    let handle = store.clone();
    let key = CaseKey::generate().unwrap();

    handle.put(&session(4), &envelope(&key, "pw")).unwrap();
    assert_eq!(store.len(), 1);
}

#[derive(Debug, Clone)]
enum StoreOp {
    Put { session: u8, fill: u8 },
    Remove { session: u8 },
}

fn store_op() -> impl Strategy<Value = StoreOp> {
    prop_oneof![
        3 => (0u8..4, any::<u8>()).prop_map(|(session, fill)| StoreOp::Put { session, fill }),
        1 => (0u8..4).prop_map(|session| StoreOp::Remove { session }),
    ]
}

/// Envelope with recognisable contents; never opened, so no PBKDF2 cost.
fn opaque_envelope(fill: u8) -> PassphraseEnvelope {
    PassphraseEnvelope {
        wrapped_key: EncryptedBlob {
            ciphertext: vec![fill; 48],
            nonce: [fill; NONCE_SIZE],
            algorithm: Algorithm::Aes256Gcm,
        },
        salt: [fill.wrapping_add(1); SALT_SIZE],
    }
}

proptest! {
    /// The memory store behaves like a last-write-wins map under any sequence
    /// of puts and removes.
    #[test]
    fn prop_store_matches_map_model(ops in prop::collection::vec(store_op(), 0..40)) {
        let store = MemoryKeyStore::new();
        let mut model: HashMap<u8, PassphraseEnvelope> = HashMap::new();

        for op in ops {
            match op {
                StoreOp::Put { session: n, fill } => {
                    let envelope = opaque_envelope(fill);
                    store.put(&session(n), &envelope).unwrap();
                    model.insert(n, envelope);
                },
                StoreOp::Remove { session: n } => {
                    prop_assert_eq!(store.remove(&session(n)).unwrap(), model.remove(&n).is_some());
                },
            }

            prop_assert_eq!(store.len(), model.len());
            for n in 0u8..4 {
                match model.get(&n) {
                    Some(expected) => prop_assert_eq!(&store.get(&session(n)).unwrap(), expected),
                    None => prop_assert_eq!(store.get(&session(n)), Err(KeyStoreError::NotFound)),
                }
            }
        }
    }
}
