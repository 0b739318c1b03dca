//! Submitter session coordinator.
//!
//! ```text
//!   Anonymous ──submit──► Submitted
//!       │                     │
//!       └──authenticate──►  Authenticated(case key in memory) ──post/refresh──┐
//!              ▲                  │                          ▲                │
//!              └──────lock────────┘                          └────────────────┘
//! ```
//!
//! The session id is handed out exactly once, as the return value of
//! [`SubmitterSession::submit`]. The coordinator keeps no copy of it; the
//! submitter must bring it back to [`SubmitterSession::authenticate`].

use vaultvoice_core::{
    CaseApi, CaseKey, CaseStatus, DecryptedItem, Environment, ItemType, PassphraseEnvelope, Sender,
    SessionId, Thread, ThreadItem,
    api::{PostMessageRequest, SubmitReportRequest},
    create_envelopes, decrypt_thread, encrypt_item, open_passphrase_envelope,
    wrap_for_investigator,
};
use vaultvoice_crypto::Zeroizing;

use crate::{error::SessionError, key_store::LocalKeyStore};

/// Observable submitter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitterState {
    /// No case key in memory
    Anonymous,
    /// A report was just submitted; nothing is retained
    Submitted,
    /// Case key in memory; thread readable and writable
    Authenticated,
}

impl SubmitterState {
    fn name(self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Submitted => "submitted",
            Self::Authenticated => "authenticated",
        }
    }
}

struct UnlockedCase {
    session_id: SessionId,
    case_key: CaseKey,
    thread: Thread,
    status: CaseStatus,
}

enum State {
    Anonymous,
    Submitted,
    Authenticated(Box<UnlockedCase>),
}

/// Drives the submitter's two flows: submitting a report and following up.
///
/// Holds at most one case key, only while authenticated. The key store and
/// API are injected capabilities.
pub struct SubmitterSession<A: CaseApi, S: LocalKeyStore, E: Environment> {
    api: A,
    key_store: S,
    env: E,
    state: State,
}

impl<A: CaseApi, S: LocalKeyStore, E: Environment> SubmitterSession<A, S, E> {
    /// Create an anonymous session.
    pub fn new(api: A, key_store: S, env: E) -> Self {
        Self { api, key_store, env, state: State::Anonymous }
    }

    /// Current state.
    pub fn state(&self) -> SubmitterState {
        match self.state {
            State::Anonymous => SubmitterState::Anonymous,
            State::Submitted => SubmitterState::Submitted,
            State::Authenticated(_) => SubmitterState::Authenticated,
        }
    }

    /// Case status as of the last fetch. `None` unless authenticated.
    pub fn status(&self) -> Option<CaseStatus> {
        match &self.state {
            State::Authenticated(case) => Some(case.status),
            _ => None,
        }
    }

    /// Decrypted thread as currently held. `None` unless authenticated.
    pub fn thread(&self) -> Option<Vec<DecryptedItem>> {
        match &self.state {
            State::Authenticated(case) => Some(decrypt_thread(case.thread.items(), &case.case_key)),
            _ => None,
        }
    }

    /// File a new report.
    ///
    /// Creates the case, encrypts the report under a fresh case key, sends the
    /// report and investigator envelope to the server, then stores the
    /// passphrase envelope on this device. Returns the session id, which is
    /// not retained anywhere in the coordinator.
    ///
    /// # Errors
    ///
    /// - `InvalidState` while authenticated (call [`Self::lock`] first)
    /// - `MalformedKeyEncoding` if the server hands out a bad public key
    pub async fn submit(&mut self, report: &str, password: &str) -> Result<SessionId, SessionError> {
        let state = self.state();
        if state == SubmitterState::Authenticated {
            return Err(SessionError::InvalidState { state: state.name(), operation: "submit" });
        }

        let created = self.api.create_case().await?;
        let session_id = created.session_id;

        let case_key = CaseKey::generate()?;
        let report_item = encrypt_item(
            &self.env,
            report.as_bytes(),
            &case_key,
            Sender::Submitter,
            ItemType::Report,
        )?;
        let (case_key, passphrase_envelope) = seal_case_key(case_key, password).await?;
        let investigator_envelope =
            wrap_for_investigator(&case_key, &created.investigator_public_key)?;
        drop(case_key);

        self.api
            .submit_report(&session_id, SubmitReportRequest::new(report_item, investigator_envelope))
            .await?;
        self.key_store.put(&session_id, &passphrase_envelope)?;

        self.state = State::Submitted;
        tracing::info!("report submitted");

        Ok(session_id)
    }

    /// Unlock a case with its session id and passphrase, then fetch and
    /// decrypt the thread.
    ///
    /// Any previously unlocked case is dropped first. On failure the session
    /// is left anonymous.
    ///
    /// # Errors
    ///
    /// - `SessionNotFound` if the id is malformed, has no envelope on this
    ///   device, or is unknown to the server
    /// - `CouldNotUnlock` for a wrong passphrase or corrupted envelope
    pub async fn authenticate(
        &mut self,
        session_id: &str,
        password: &str,
    ) -> Result<Vec<DecryptedItem>, SessionError> {
        self.state = State::Anonymous;

        let session_id: SessionId =
            session_id.parse().map_err(|_| SessionError::SessionNotFound)?;
        let envelope = self.key_store.get(&session_id)?;
        let case_key = open_case_key(envelope, password).await?;

        let response = self.api.get_thread(&session_id).await?;
        let thread = Thread::from_items(response.thread);
        let decrypted = decrypt_thread(thread.items(), &case_key);

        tracing::info!(
            item_count = decrypted.len(),
            undecryptable = decrypted.iter().filter(|item| item.is_undecryptable()).count(),
            status = %response.status,
            "case unlocked"
        );

        self.state = State::Authenticated(Box::new(UnlockedCase {
            session_id,
            case_key,
            thread,
            status: response.status,
        }));

        Ok(decrypted)
    }

    /// Encrypt and append a follow-up message.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless authenticated
    pub async fn post(&mut self, plaintext: &str) -> Result<ThreadItem, SessionError> {
        let state = self.state();
        let State::Authenticated(case) = &mut self.state else {
            return Err(SessionError::InvalidState { state: state.name(), operation: "post" });
        };

        let item = encrypt_item(
            &self.env,
            plaintext.as_bytes(),
            &case.case_key,
            Sender::Submitter,
            ItemType::Message,
        )?;
        let stored = self.api.post_message(&case.session_id, PostMessageRequest(item)).await?;
        case.thread.insert(stored.clone());

        tracing::debug!(item_count = case.thread.len(), "message posted");

        Ok(stored)
    }

    /// Re-fetch and decrypt the thread, picking up investigator replies and
    /// status changes.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless authenticated
    pub async fn refresh(&mut self) -> Result<Vec<DecryptedItem>, SessionError> {
        let state = self.state();
        let State::Authenticated(case) = &mut self.state else {
            return Err(SessionError::InvalidState { state: state.name(), operation: "refresh" });
        };

        let response = self.api.get_thread(&case.session_id).await?;
        case.thread = Thread::from_items(response.thread);
        case.status = response.status;

        Ok(decrypt_thread(case.thread.items(), &case.case_key))
    }

    /// Drop the case key and return to anonymous.
    pub fn lock(&mut self) {
        self.state = State::Anonymous;
    }
}

/// Seal the case key under the passphrase on the blocking pool.
///
/// The key moves into the task and back out, so it is never copied.
async fn seal_case_key(
    case_key: CaseKey,
    password: &str,
) -> Result<(CaseKey, PassphraseEnvelope), SessionError> {
    let password = Zeroizing::new(password.to_owned());
    let (case_key, sealed) = tokio::task::spawn_blocking(move || {
        let sealed = create_envelopes(&case_key, &password).map(|(envelope, _derived)| envelope);
        (case_key, sealed)
    })
    .await?;

    Ok((case_key, sealed?))
}

/// Open a passphrase envelope on the blocking pool.
async fn open_case_key(
    envelope: PassphraseEnvelope,
    password: &str,
) -> Result<CaseKey, SessionError> {
    let password = Zeroizing::new(password.to_owned());
    let opened =
        tokio::task::spawn_blocking(move || open_passphrase_envelope(&envelope, &password))
            .await?;
    opened.map_err(SessionError::from)
}
