//! Investigator session coordinator.
//!
//! ```text
//!   LoggedOut ──login──► LoggedIn(token) ──open_case──► CaseOpen(case key)
//!                           ▲                               │
//!                           └──── leave_case / close_case ──┘
//! ```
//!
//! Opening a case needs two secrets: the key password that unseals the
//! investigator's private key, and that private key to open the case's
//! investigator envelope. Status changes need only the token and are forward
//! only.

use vaultvoice_core::{
    CaseApi, CaseId, CaseKey, CaseStatus, CaseSummary, DecryptedItem, Environment, ItemType,
    SealedPrivateKey, Sender, Thread, ThreadItem,
    api::{AuthToken, LoginRequest, PostMessageRequest, StatusUpdate},
    decrypt_thread, encrypt_item, open_investigator_envelope, unwrap_private_key,
};
use vaultvoice_crypto::{InvestigatorPrivateKey, Zeroizing};

use crate::error::SessionError;

/// Observable investigator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvestigatorState {
    /// No token
    LoggedOut,
    /// Token held, no case open
    LoggedIn,
    /// Token held and one case key in memory
    CaseOpen,
}

impl InvestigatorState {
    fn name(self) -> &'static str {
        match self {
            Self::LoggedOut => "logged out",
            Self::LoggedIn => "logged in",
            Self::CaseOpen => "a case is open",
        }
    }
}

struct OpenCase {
    summary: CaseSummary,
    case_key: CaseKey,
    thread: Thread,
}

enum State {
    LoggedOut,
    LoggedIn(AuthToken),
    CaseOpen(AuthToken, Box<OpenCase>),
}

/// Drives the investigator flow: log in, triage, open a case, reply, move
/// its status forward.
pub struct InvestigatorSession<A: CaseApi, E: Environment> {
    api: A,
    env: E,
    state: State,
}

impl<A: CaseApi, E: Environment> InvestigatorSession<A, E> {
    /// Create a logged-out session.
    pub fn new(api: A, env: E) -> Self {
        Self { api, env, state: State::LoggedOut }
    }

    /// Current state.
    pub fn state(&self) -> InvestigatorState {
        match self.state {
            State::LoggedOut => InvestigatorState::LoggedOut,
            State::LoggedIn(_) => InvestigatorState::LoggedIn,
            State::CaseOpen(..) => InvestigatorState::CaseOpen,
        }
    }

    /// Summary of the open case, if any.
    pub fn open_case_summary(&self) -> Option<&CaseSummary> {
        match &self.state {
            State::CaseOpen(_, case) => Some(&case.summary),
            _ => None,
        }
    }

    /// Decrypted thread of the open case, if any.
    pub fn thread(&self) -> Option<Vec<DecryptedItem>> {
        match &self.state {
            State::CaseOpen(_, case) => Some(decrypt_thread(case.thread.items(), &case.case_key)),
            _ => None,
        }
    }

    /// Log in through the collaborator's token issuance.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` for rejected credentials; the session stays logged out
    pub async fn login(&mut self, username: &str, password: &str) -> Result<(), SessionError> {
        self.state = State::LoggedOut;

        let request = LoginRequest { username: username.to_owned(), password: password.to_owned() };
        let response = self.api.login(request).await?;

        self.state = State::LoggedIn(response.token);
        tracing::info!("investigator logged in");
        Ok(())
    }

    /// Drop the token and any open case.
    pub fn logout(&mut self) {
        self.state = State::LoggedOut;
    }

    /// Dashboard rows for every submitted case.
    pub async fn list_cases(&self) -> Result<Vec<CaseSummary>, SessionError> {
        let token = self.token("list cases")?;
        let cases = self.api.list_cases(token).await?;
        tracing::debug!(case_count = cases.len(), "listed cases");
        Ok(cases)
    }

    /// Unseal the private key, fetch the case, open its investigator envelope
    /// and decrypt the thread.
    ///
    /// Any previously open case is dropped first.
    ///
    /// # Errors
    ///
    /// - `CouldNotUnlock` for a wrong key password, a mismatched private key or
    ///   a corrupted envelope
    /// - `CaseNotFound` for an unknown case id
    pub async fn open_case(
        &mut self,
        case_id: &CaseId,
        sealed_private_key: &SealedPrivateKey,
        key_password: &str,
    ) -> Result<Vec<DecryptedItem>, SessionError> {
        let token = self.token("open a case")?.clone();
        self.state = State::LoggedIn(token.clone());

        let private_key = unseal_private_key(sealed_private_key.clone(), key_password).await?;
        let details = self.api.get_case(&token, case_id).await?;
        let case_key = open_investigator_envelope(&details.investigator_envelope(), &private_key)?;
        drop(private_key);

        let thread = Thread::from_items(details.thread);
        let decrypted = decrypt_thread(thread.items(), &case_key);

        tracing::info!(
            case_id = %case_id,
            item_count = decrypted.len(),
            status = %details.summary.status,
            "case opened"
        );

        self.state = State::CaseOpen(
            token,
            Box::new(OpenCase { summary: details.summary, case_key, thread }),
        );

        Ok(decrypted)
    }

    /// Encrypt and append a reply to the open case.
    pub async fn reply(&mut self, plaintext: &str) -> Result<ThreadItem, SessionError> {
        let state = self.state();
        let State::CaseOpen(token, case) = &mut self.state else {
            return Err(SessionError::InvalidState { state: state.name(), operation: "reply" });
        };

        let item = encrypt_item(
            &self.env,
            plaintext.as_bytes(),
            &case.case_key,
            Sender::Investigator,
            ItemType::Message,
        )?;
        let stored = self.api.reply(token, &case.summary.case_id, PostMessageRequest(item)).await?;
        case.thread.insert(stored.clone());

        tracing::debug!(case_id = %case.summary.case_id, "reply posted");
        Ok(stored)
    }

    /// Re-fetch and decrypt the open case's thread.
    pub async fn refresh(&mut self) -> Result<Vec<DecryptedItem>, SessionError> {
        let state = self.state();
        let State::CaseOpen(token, case) = &mut self.state else {
            return Err(SessionError::InvalidState { state: state.name(), operation: "refresh" });
        };

        let details = self.api.get_case(token, &case.summary.case_id).await?;
        case.summary = details.summary;
        case.thread = Thread::from_items(details.thread);

        Ok(decrypt_thread(case.thread.items(), &case.case_key))
    }

    /// Move a case forward to `next`.
    ///
    /// Needs only the token: the case does not have to be open. When `case_id`
    /// is the open case, a transition its last known status already rules out
    /// is rejected without a round trip, and the open summary is updated.
    ///
    /// # Errors
    ///
    /// - `InvalidStatusTransition` for same-state or backward changes
    /// - `CaseNotFound` for an unknown case id
    pub async fn set_status(
        &mut self,
        case_id: &CaseId,
        next: CaseStatus,
    ) -> Result<CaseSummary, SessionError> {
        let token = self.token("set status")?.clone();

        if let State::CaseOpen(_, case) = &self.state {
            let current = case.summary.status;
            if case.summary.case_id == *case_id && !current.can_transition_to(next) {
                return Err(SessionError::InvalidStatusTransition { from: current, to: next });
            }
        }

        let summary = self.api.set_status(&token, case_id, StatusUpdate { status: next }).await?;
        tracing::info!(case_id = %summary.case_id, status = %summary.status, "status changed");

        if let State::CaseOpen(_, case) = &mut self.state {
            if case.summary.case_id == summary.case_id {
                case.summary = summary.clone();
            }
        }
        Ok(summary)
    }

    /// Close the open case and drop its key.
    pub async fn close_case(&mut self) -> Result<CaseSummary, SessionError> {
        let case_id = match &self.state {
            State::CaseOpen(_, case) => case.summary.case_id,
            _ => {
                return Err(SessionError::InvalidState {
                    state: self.state().name(),
                    operation: "close a case",
                });
            },
        };

        let summary = self.set_status(&case_id, CaseStatus::Closed).await?;
        self.leave_case();
        Ok(summary)
    }

    /// Drop the open case's key without changing its status.
    pub fn leave_case(&mut self) {
        self.state = match std::mem::replace(&mut self.state, State::LoggedOut) {
            State::CaseOpen(token, _) => State::LoggedIn(token),
            other => other,
        };
    }

    fn token(&self, operation: &'static str) -> Result<&AuthToken, SessionError> {
        match &self.state {
            State::LoggedIn(token) | State::CaseOpen(token, _) => Ok(token),
            State::LoggedOut => Err(SessionError::InvalidState {
                state: InvestigatorState::LoggedOut.name(),
                operation,
            }),
        }
    }
}

/// Unseal the investigator private key on the blocking pool.
async fn unseal_private_key(
    sealed: SealedPrivateKey,
    key_password: &str,
) -> Result<InvestigatorPrivateKey, SessionError> {
    let key_password = Zeroizing::new(key_password.to_owned());
    let unsealed =
        tokio::task::spawn_blocking(move || unwrap_private_key(&sealed, &key_password)).await?;
    unsealed.map_err(SessionError::from)
}
