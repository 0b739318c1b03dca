//! Fuzz target for thread decryption
//!
//! A case thread mixes genuine items with whatever a compromised or buggy
//! server chooses to return.
//!
//! # Strategy
//!
//! - Genuine items encrypted under the case key
//! - Forged items: random ciphertext and nonce
//! - Replayed items: a genuine blob resent under a new id
//! - Truncated and bit-flipped copies of genuine blobs
//!
//! # Invariants
//!
//! - Output length and order equal input length and order
//! - Every untouched genuine item decrypts to its plaintext
//! - Forged, truncated or flipped blobs never decrypt
//! - A nonce is decrypted at most once; items that fail authentication do
//!   not block a later genuine item with the same nonce
//! - Decryption NEVER panics

#![no_main]

use std::collections::HashSet;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use vaultvoice_core::{
    CaseKey, DecryptedContent, Environment, ItemId, ItemType, Sender, ThreadItem, decrypt_thread,
    encrypt_item, env::test_utils::MockEnv,
};
use vaultvoice_crypto::{Algorithm, EncryptedBlob, NONCE_SIZE};

#[derive(Debug, Clone, Arbitrary)]
struct ThreadScenario {
    seed: u64,
    items: Vec<ItemInput>,
}

#[derive(Debug, Clone, Arbitrary)]
enum ItemInput {
    Genuine(Vec<u8>),
    Forged { ciphertext: Vec<u8>, nonce: [u8; NONCE_SIZE] },
    Replay { index: u8 },
    Truncated { index: u8, keep: u8 },
    BitFlip { index: u8, position: u16 },
}

#[derive(Debug, PartialEq)]
enum Expect {
    Plaintext(Vec<u8>),
    Undecryptable,
}

fuzz_target!(|scenario: ThreadScenario| {
    let env = MockEnv::seeded(scenario.seed);
    let key = CaseKey::generate().expect("OS RNG available");

    let mut items: Vec<ThreadItem> = Vec::new();
    let mut expected: Vec<Expect> = Vec::new();
    let mut genuine: Vec<(ThreadItem, Vec<u8>)> = Vec::new();

    for input in scenario.items.into_iter().take(64) {
        env.advance(1);
        let (item, expect) = match input {
            ItemInput::Genuine(plaintext) => {
                let item =
                    encrypt_item(&env, &plaintext, &key, Sender::Submitter, ItemType::Message)
                        .expect("encryption succeeds");
                genuine.push((item.clone(), plaintext.clone()));
                (item, Expect::Plaintext(plaintext))
            },

            ItemInput::Forged { ciphertext, nonce } => {
                let blob = EncryptedBlob { ciphertext, nonce, algorithm: Algorithm::default() };
                (item_with(&env, blob), Expect::Undecryptable)
            },

            ItemInput::Replay { index } => {
                let Some((source, plaintext)) = pick(&genuine, index) else { continue };
                // Same nonce as an earlier item: only the first one counts
                (item_with(&env, source.blob.clone()), Expect::Plaintext(plaintext.clone()))
            },

            ItemInput::Truncated { index, keep } => {
                let Some((source, _)) = pick(&genuine, index) else { continue };
                let mut blob = source.blob.clone();
                let keep = (keep as usize) % blob.ciphertext.len().max(1);
                blob.ciphertext.truncate(keep);
                (item_with(&env, blob), Expect::Undecryptable)
            },

            ItemInput::BitFlip { index, position } => {
                let Some((source, _)) = pick(&genuine, index) else { continue };
                let mut blob = source.blob.clone();
                let bit = position as usize % (blob.ciphertext.len() * 8);
                blob.ciphertext[bit / 8] ^= 1 << (bit % 8);
                (item_with(&env, blob), Expect::Undecryptable)
            },
        };

        items.push(item);
        expected.push(expect);
    }

    let decrypted = decrypt_thread(&items, &key);

    assert_eq!(decrypted.len(), items.len());
    for (item, out) in items.iter().zip(&decrypted) {
        assert_eq!(item.id, out.id);
        assert_eq!(item.created_at, out.created_at);
    }

    // Nonces of items that authenticated; failed items claim nothing
    let mut decrypted_nonces = HashSet::new();
    for ((item, out), expect) in items.iter().zip(&decrypted).zip(&expected) {
        let already_decrypted = decrypted_nonces.contains(&item.blob.nonce);
        match (&out.content, expect) {
            (DecryptedContent::Plaintext(got), Expect::Plaintext(want)) => {
                assert!(!already_decrypted, "repeated nonce must not decrypt");
                assert_eq!(got, want);
                decrypted_nonces.insert(item.blob.nonce);
            },
            (DecryptedContent::Plaintext(_), Expect::Undecryptable) => {
                panic!("tampered or forged item decrypted");
            },
            (DecryptedContent::Undecryptable(_), Expect::Plaintext(_)) => {
                // A genuine blob loses only to an earlier decrypted item with its nonce
                assert!(already_decrypted, "genuine item failed to decrypt");
            },
            (DecryptedContent::Undecryptable(_), Expect::Undecryptable) => {},
        }
    }
});

fn pick(genuine: &[(ThreadItem, Vec<u8>)], index: u8) -> Option<&(ThreadItem, Vec<u8>)> {
    if genuine.is_empty() {
        return None;
    }
    genuine.get(index as usize % genuine.len())
}

fn item_with(env: &MockEnv, blob: EncryptedBlob) -> ThreadItem {
    ThreadItem {
        id: ItemId::generate(env),
        item_type: ItemType::Message,
        sender: Sender::Investigator,
        created_at: env.wall_clock_millis(),
        blob,
        filename: None,
    }
}
