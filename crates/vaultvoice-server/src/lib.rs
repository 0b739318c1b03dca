//! VaultVoice case service.
//!
//! Reference implementation of the [`CaseApi`](vaultvoice_core::CaseApi)
//! collaborator, plus the production environment and durable storage.
//!
//! # Architecture
//!
//! [`CaseService`] is transport-agnostic: it answers `CaseApi` calls directly.
//! The `vaultvoice` binary drives it in-process together with the client
//! coordinators; an HTTP front end would map routes onto the same trait.
//!
//! # Components
//!
//! - [`CaseService`]: request validation and case bookkeeping
//! - [`CaseStorage`]: swappable persistence ([`MemoryStorage`], [`RedbStorage`],
//!   and [`ChaoticStorage`] for fault injection)
//! - [`InvestigatorAuthenticator`]: token issuance; [`CredentialAuthenticator`]
//!   is the single-account reference
//! - [`ServiceConfig`]: investigator public key and credentials
//! - [`SystemEnv`]: Production environment (wall clock, crypto RNG)

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod auth;
mod config;
mod error;
mod service;
pub mod storage;
mod system_env;

pub use auth::{CredentialAuthenticator, InvestigatorAuthenticator};
pub use config::{DEFAULT_TOKEN_TTL_MILLIS, InvestigatorCredentials, ServiceConfig};
pub use error::ServiceError;
pub use service::CaseService;
pub use storage::{
    CaseStorage, ChaoticStorage, FaultScope, MemoryStorage, RedbStorage, StorageError,
};
pub use system_env::SystemEnv;
