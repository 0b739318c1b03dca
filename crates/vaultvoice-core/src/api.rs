//! Collaborator contract.
//!
//! [`CaseApi`] mirrors the HTTP surface one method per route. Request and
//! response types serialize to the JSON bodies the browser client exchanges:
//!
//! | Route                               | Method                      |
//! |-------------------------------------|-----------------------------|
//! | `POST /case`                        | [`CaseApi::create_case`]    |
//! | `POST /case/{sessionId}/report`     | [`CaseApi::submit_report`]  |
//! | `GET /case/{sessionId}/thread`      | [`CaseApi::get_thread`]     |
//! | `POST /case/{sessionId}/message`    | [`CaseApi::post_message`]   |
//! | `POST /auth/login`                  | [`CaseApi::login`]          |
//! | `GET /cases`                        | [`CaseApi::list_cases`]     |
//! | `GET /cases/{caseId}`               | [`CaseApi::get_case`]       |
//! | `PATCH /cases/{caseId}/status`      | [`CaseApi::set_status`]     |
//! | `POST /cases/{caseId}/reply`        | [`CaseApi::reply`]          |
//!
//! Nothing crossing this boundary is plaintext or a raw key.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use vaultvoice_crypto::{EncryptedBlob, encoding::base64_bytes};

use crate::{
    envelope::InvestigatorEnvelope,
    error::ApiError,
    model::{CaseId, CaseStatus, CaseSummary, ItemId, ItemType, Sender, SessionId, ThreadItem},
};

/// `POST /case` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCaseResponse {
    /// New submitter handle
    pub session_id: SessionId,
    /// SPKI PEM of the investigator key to wrap the case key for
    pub investigator_public_key: String,
}

/// `POST /case/{sessionId}/report` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReportRequest {
    /// Encrypted report
    pub report_blob: EncryptedBlob,
    /// Case key wrapped for the investigator, base64
    #[serde(with = "base64_bytes")]
    pub wrapped_case_key: Vec<u8>,
    /// Report item id chosen by the submitter
    pub report_id: ItemId,
    /// Report creation time, milliseconds since the Unix epoch
    pub created_at: u64,
}

impl SubmitReportRequest {
    /// Build the request from an encrypted report item and its envelope.
    pub fn new(report: ThreadItem, envelope: InvestigatorEnvelope) -> Self {
        Self {
            report_blob: report.blob,
            wrapped_case_key: envelope.wrapped_key,
            report_id: report.id,
            created_at: report.created_at,
        }
    }

    /// Split into the report thread item and the investigator envelope.
    pub fn into_parts(self) -> (ThreadItem, InvestigatorEnvelope) {
        let report = ThreadItem {
            id: self.report_id,
            item_type: ItemType::Report,
            sender: Sender::Submitter,
            created_at: self.created_at,
            blob: self.report_blob,
            filename: None,
        };
        (report, InvestigatorEnvelope { wrapped_key: self.wrapped_case_key })
    }
}

/// `GET /case/{sessionId}/thread` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadResponse {
    /// Encrypted thread in `createdAt` order
    pub thread: Vec<ThreadItem>,
    /// Current case status
    pub status: CaseStatus,
}

/// `POST /case/{sessionId}/message` and `POST /cases/{caseId}/reply` body.
///
/// The full encrypted item as produced by
/// [`encrypt_item`](crate::thread::encrypt_item).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostMessageRequest(pub ThreadItem);

/// `POST /auth/login` body.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Investigator user name
    pub username: String,
    /// Investigator password
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest").field("username", &self.username).finish_non_exhaustive()
    }
}

/// Bearer token for investigator routes. `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthToken(pub String);

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(..)")
    }
}

/// `POST /auth/login` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Token for subsequent investigator calls
    pub token: AuthToken,
}

/// `GET /cases/{caseId}` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseDetails {
    /// Dashboard fields
    #[serde(flatten)]
    pub summary: CaseSummary,
    /// Case key wrapped for the investigator, base64
    #[serde(rename = "caseKeyForInvestigator", with = "base64_bytes")]
    pub wrapped_case_key: Vec<u8>,
    /// Encrypted thread in `createdAt` order
    pub thread: Vec<ThreadItem>,
}

impl CaseDetails {
    /// The investigator envelope carried in this response.
    pub fn investigator_envelope(&self) -> InvestigatorEnvelope {
        InvestigatorEnvelope { wrapped_key: self.wrapped_case_key.clone() }
    }
}

/// `PATCH /cases/{caseId}/status` body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// Requested status
    pub status: CaseStatus,
}

/// The server-side collaborator, one method per HTTP route.
///
/// Every call is a suspension point. Implementations persist each mutation
/// as a single atomic record write.
#[async_trait]
pub trait CaseApi: Send + Sync {
    /// Open a new case and hand out its session id and the investigator key.
    async fn create_case(&self) -> Result<CreateCaseResponse, ApiError>;

    /// Attach the encrypted report and investigator envelope to a new case.
    ///
    /// # Errors
    ///
    /// - `SessionNotFound` for an unknown session
    /// - `Conflict` if the case already has a report
    async fn submit_report(
        &self,
        session_id: &SessionId,
        request: SubmitReportRequest,
    ) -> Result<(), ApiError>;

    /// Fetch the encrypted thread and status for a session.
    async fn get_thread(&self, session_id: &SessionId) -> Result<ThreadResponse, ApiError>;

    /// Append a submitter message.
    async fn post_message(
        &self,
        session_id: &SessionId,
        request: PostMessageRequest,
    ) -> Result<ThreadItem, ApiError>;

    /// Exchange investigator credentials for a token.
    async fn login(&self, request: LoginRequest) -> Result<LoginResponse, ApiError>;

    /// Dashboard rows for every case with a submitted report.
    async fn list_cases(&self, token: &AuthToken) -> Result<Vec<CaseSummary>, ApiError>;

    /// Full encrypted case for the investigator.
    async fn get_case(&self, token: &AuthToken, case_id: &CaseId)
    -> Result<CaseDetails, ApiError>;

    /// Move a case forward in its status lifecycle.
    ///
    /// # Errors
    ///
    /// - `InvalidStatusTransition` for same-state or backward changes
    async fn set_status(
        &self,
        token: &AuthToken,
        case_id: &CaseId,
        update: StatusUpdate,
    ) -> Result<CaseSummary, ApiError>;

    /// Append an investigator reply.
    async fn reply(
        &self,
        token: &AuthToken,
        case_id: &CaseId,
        request: PostMessageRequest,
    ) -> Result<ThreadItem, ApiError>;
}

#[async_trait]
impl<T: CaseApi + ?Sized> CaseApi for Arc<T> {
    async fn create_case(&self) -> Result<CreateCaseResponse, ApiError> {
        (**self).create_case().await
    }

    async fn submit_report(
        &self,
        session_id: &SessionId,
        request: SubmitReportRequest,
    ) -> Result<(), ApiError> {
        (**self).submit_report(session_id, request).await
    }

    async fn get_thread(&self, session_id: &SessionId) -> Result<ThreadResponse, ApiError> {
        (**self).get_thread(session_id).await
    }

    async fn post_message(
        &self,
        session_id: &SessionId,
        request: PostMessageRequest,
    ) -> Result<ThreadItem, ApiError> {
        (**self).post_message(session_id, request).await
    }

    async fn login(&self, request: LoginRequest) -> Result<LoginResponse, ApiError> {
        (**self).login(request).await
    }

    async fn list_cases(&self, token: &AuthToken) -> Result<Vec<CaseSummary>, ApiError> {
        (**self).list_cases(token).await
    }

    async fn get_case(
        &self,
        token: &AuthToken,
        case_id: &CaseId,
    ) -> Result<CaseDetails, ApiError> {
        (**self).get_case(token, case_id).await
    }

    async fn set_status(
        &self,
        token: &AuthToken,
        case_id: &CaseId,
        update: StatusUpdate,
    ) -> Result<CaseSummary, ApiError> {
        (**self).set_status(token, case_id, update).await
    }

    async fn reply(
        &self,
        token: &AuthToken,
        case_id: &CaseId,
        request: PostMessageRequest,
    ) -> Result<ThreadItem, ApiError> {
        (**self).reply(token, case_id, request).await
    }
}
