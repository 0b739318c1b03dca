//! Thread Codec.
//!
//! Encrypts outbound thread items under the case key and decrypts a whole
//! thread item by item. Decryption is an ordered per-item map: output order
//! equals input order, and one bad item becomes an
//! [`DecryptedContent::Undecryptable`] marker without hiding the rest.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use vaultvoice_crypto::{CryptoError, NONCE_SIZE, aead_decrypt, aead_encrypt};

use crate::{
    env::Environment,
    envelope::CaseKey,
    model::{ItemId, ItemType, Sender, ThreadItem},
};

/// Encrypt `plaintext` into a new thread item.
///
/// Stamps `createdAt` from the environment clock, assigns a fresh random id
/// and uses a fresh nonce.
pub fn encrypt_item<E: Environment>(
    env: &E,
    plaintext: &[u8],
    case_key: &CaseKey,
    sender: Sender,
    item_type: ItemType,
) -> Result<ThreadItem, CryptoError> {
    let blob = aead_encrypt(plaintext, case_key.symmetric())?;

    Ok(ThreadItem {
        id: ItemId::generate(env),
        item_type,
        sender,
        created_at: env.wall_clock_millis(),
        blob,
        filename: None,
    })
}

/// Why an item could not be decrypted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndecryptableReason {
    /// Tag mismatch: corrupted blob or a different key
    Authentication,
    /// Nonce already used by an earlier item in this thread
    DuplicateNonce,
}

/// Result of decrypting one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecryptedContent {
    /// Authenticated plaintext
    Plaintext(Vec<u8>),
    /// Item failed; the rest of the thread is unaffected
    Undecryptable(UndecryptableReason),
}

/// A thread item with its decryption result attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedItem {
    /// Item id
    pub id: ItemId,
    /// Item kind
    pub item_type: ItemType,
    /// Author
    pub sender: Sender,
    /// Creation time, milliseconds since the Unix epoch
    pub created_at: u64,
    /// Attachment file name, if any
    pub filename: Option<String>,
    /// Plaintext or failure marker
    pub content: DecryptedContent,
}

impl DecryptedItem {
    /// Plaintext bytes, if decryption succeeded.
    pub fn plaintext(&self) -> Option<&[u8]> {
        match &self.content {
            DecryptedContent::Plaintext(bytes) => Some(bytes),
            DecryptedContent::Undecryptable(_) => None,
        }
    }

    /// Plaintext as UTF-8 text, if decryption succeeded and it is valid text.
    pub fn text(&self) -> Option<&str> {
        self.plaintext().and_then(|bytes| std::str::from_utf8(bytes).ok())
    }

    /// Whether this item failed to decrypt.
    pub fn is_undecryptable(&self) -> bool {
        matches!(self.content, DecryptedContent::Undecryptable(_))
    }
}

/// Decrypt every item of a thread independently.
///
/// Output order equals input order. An item whose nonce repeats the nonce of
/// an earlier authenticated item is marked
/// [`UndecryptableReason::DuplicateNonce`] even if it would authenticate.
/// Items that fail authentication do not claim their nonce.
pub fn decrypt_thread(items: &[ThreadItem], case_key: &CaseKey) -> Vec<DecryptedItem> {
    let mut seen_nonces: HashSet<[u8; NONCE_SIZE]> = HashSet::with_capacity(items.len());

    items
        .iter()
        .map(|item| {
            let content = if seen_nonces.contains(&item.blob.nonce) {
                DecryptedContent::Undecryptable(UndecryptableReason::DuplicateNonce)
            } else {
                match aead_decrypt(&item.blob, case_key.symmetric()) {
                    Ok(plaintext) => {
                        seen_nonces.insert(item.blob.nonce);
                        DecryptedContent::Plaintext(plaintext)
                    },
                    Err(_) => DecryptedContent::Undecryptable(UndecryptableReason::Authentication),
                }
            };

            DecryptedItem {
                id: item.id,
                item_type: item.item_type,
                sender: item.sender,
                created_at: item.created_at,
                filename: item.filename.clone(),
                content,
            }
        })
        .collect()
}

/// Append-only thread ordered by `createdAt`, ties in insertion order.
///
/// Appends from two actors commute: the resulting order depends only on
/// timestamps, not on which append arrived first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Thread {
    items: Vec<ThreadItem>,
}

impl Thread {
    /// Empty thread.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a thread from items in arbitrary order.
    ///
    /// Sorting is stable, so items with equal `createdAt` keep their relative
    /// order from `items`.
    pub fn from_items(mut items: Vec<ThreadItem>) -> Self {
        items.sort_by_key(|item| item.created_at);
        Self { items }
    }

    /// Insert an item at its `createdAt` position, after any item with an
    /// equal timestamp. Returns the index it landed at.
    pub fn insert(&mut self, item: ThreadItem) -> usize {
        let index = self.items.partition_point(|existing| existing.created_at <= item.created_at);
        self.items.insert(index, item);
        index
    }

    /// Whether an item with this id is present.
    pub fn contains(&self, id: &ItemId) -> bool {
        self.items.iter().any(|item| &item.id == id)
    }

    /// Items in thread order.
    pub fn items(&self) -> &[ThreadItem] {
        &self.items
    }

    /// Consume into items in thread order.
    pub fn into_items(self) -> Vec<ThreadItem> {
        self.items
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the thread has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
