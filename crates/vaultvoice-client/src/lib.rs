//! VaultVoice Client
//!
//! Session coordinators for both parties of a case, plus the submitter's
//! device-local key store.
//!
//! # Architecture
//!
//! Coordinators own no I/O of their own. They orchestrate three injected
//! capabilities:
//!
//! - a [`CaseApi`] collaborator (the server)
//! - a [`LocalKeyStore`] (submitter only; never leaves the device)
//! - an [`Environment`] for timestamps and identifiers
//!
//! Password-based key derivation runs on tokio's blocking pool, so a tokio
//! runtime must be driving the coordinator futures.
//!
//! # Components
//!
//! - [`SubmitterSession`]: `Anonymous -> Submitted -> Authenticated`
//! - [`InvestigatorSession`]: `LoggedOut -> LoggedIn -> CaseOpen`
//! - [`MemoryKeyStore`], [`RedbKeyStore`]: passphrase envelope persistence
//! - [`SessionError`]: what callers see; unlock and not-found failures stay
//!   distinguishable

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod investigator;
pub mod key_store;
mod submitter;

pub use error::SessionError;
pub use investigator::{InvestigatorSession, InvestigatorState};
pub use key_store::{KeyStoreError, LocalKeyStore, MemoryKeyStore, RedbKeyStore, StoredEnvelope};
pub use submitter::{SubmitterSession, SubmitterState};
pub use vaultvoice_core::{CaseApi, Environment};
