//! VaultVoice Core
//!
//! Case-key envelope protocol, thread codec and the collaborator contract.
//! Pure logic over `vaultvoice-crypto`: no I/O, no logging, no runtime.
//!
//! # Components
//!
//! - [`envelope`]: one case key, two independent recovery paths (passphrase
//!   and investigator RSA key), plus the password-sealed investigator key
//! - [`thread`]: per-item encryption and order-preserving, failure-isolating
//!   thread decryption
//! - [`api`]: [`CaseApi`], the HTTP-shaped async contract with the server
//! - [`model`]: identifiers, case status lifecycle, thread items, case records
//! - [`env`]: injected time and randomness

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod api;
pub mod env;
pub mod envelope;
pub mod error;
pub mod model;
pub mod thread;

pub use api::CaseApi;
pub use env::Environment;
pub use envelope::{
    CaseKey, InvestigatorEnvelope, PassphraseEnvelope, SealedPrivateKey, create_envelopes,
    open_investigator_envelope, open_passphrase_envelope, seal_private_key, unwrap_private_key,
    wrap_for_investigator,
};
pub use error::{ApiError, EnvelopeError, ParseError, TransitionError, UNLOCK_FAILURE_MESSAGE};
pub use model::{
    CaseId, CaseRecord, CaseStatus, CaseSummary, ItemId, ItemType, MlAssessment, MlLabel, Sender,
    SessionId, ThreadItem,
};
pub use thread::{
    DecryptedContent, DecryptedItem, Thread, UndecryptableReason, decrypt_thread, encrypt_item,
};
