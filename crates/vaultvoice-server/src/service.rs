//! Reference case service.
//!
//! [`CaseService`] implements the [`CaseApi`] contract over an injected
//! [`CaseStorage`]. It stores only what clients send: encrypted blobs, the
//! investigator envelope and metadata. It never sees a case key, a
//! passphrase or plaintext.
//!
//! # Request validation
//!
//! - reports must be `report` items authored by the submitter
//! - follow-ups must be non-report items authored by the caller's side
//! - ciphertexts shorter than an authentication tag are rejected
//! - item ids are unique per case (`Conflict` otherwise)
//! - status changes only move forward (`InvalidStatusTransition`)

use std::sync::Arc;

use async_trait::async_trait;
use vaultvoice_core::{
    ApiError, CaseApi, CaseId, CaseRecord, CaseSummary, Environment, ItemType, MlAssessment,
    Sender, SessionId, ThreadItem,
    api::{
        AuthToken, CaseDetails, CreateCaseResponse, LoginRequest, LoginResponse,
        PostMessageRequest, StatusUpdate, SubmitReportRequest, ThreadResponse,
    },
};
use vaultvoice_crypto::TAG_SIZE;

use crate::{
    auth::{CredentialAuthenticator, InvestigatorAuthenticator},
    config::ServiceConfig,
    error::ServiceError,
    storage::CaseStorage,
};

/// Case service over a storage backend.
///
/// Cheap to clone; clones share storage and the authenticator.
#[derive(Clone)]
pub struct CaseService<S: CaseStorage, E: Environment> {
    storage: S,
    env: E,
    auth: Arc<dyn InvestigatorAuthenticator>,
    investigator_public_key: String,
}

impl<S: CaseStorage, E: Environment> CaseService<S, E> {
    /// Build a service using the reference [`CredentialAuthenticator`].
    ///
    /// # Errors
    ///
    /// - `Config` if the config fails validation
    pub fn new(config: ServiceConfig, storage: S, env: E) -> Result<Self, ServiceError> {
        config.validate()?;

        let auth =
            CredentialAuthenticator::new(config.credentials, config.token_ttl_millis, env.clone());

        Ok(Self::with_authenticator(config.investigator_public_key, storage, env, Arc::new(auth)))
    }

    /// Build a service with a custom authenticator. The public key is not
    /// validated here.
    pub fn with_authenticator(
        investigator_public_key: String,
        storage: S,
        env: E,
        auth: Arc<dyn InvestigatorAuthenticator>,
    ) -> Self {
        Self { storage, env, auth, investigator_public_key }
    }

    /// Underlying storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Attach classifier output to a case.
    ///
    /// The classifier itself lives outside this service; it only ever sees
    /// what the investigator chooses to send it.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` for a score outside `[0, 1]`
    /// - `CaseNotFound` for an unknown case
    pub fn record_assessment(
        &self,
        case_id: &CaseId,
        assessment: MlAssessment,
    ) -> Result<CaseSummary, ApiError> {
        if !(0.0..=1.0).contains(&assessment.score) {
            return Err(ApiError::InvalidRequest(format!(
                "assessment score {} is outside [0, 1]",
                assessment.score
            )));
        }

        let record =
            self.storage.update_assessment(case_id, assessment).map_err(|e| e.for_case())?;

        tracing::info!(case_id = %case_id, label = ?record.assessment.label, "assessment recorded");
        Ok(record.summary())
    }

    fn case_id_for_session(&self, session_id: &SessionId) -> Result<CaseId, ApiError> {
        self.storage
            .case_id_for_session(session_id)
            .map_err(|e| e.for_session())?
            .ok_or(ApiError::SessionNotFound)
    }

    fn case_for_session(&self, session_id: &SessionId) -> Result<CaseRecord, ApiError> {
        let case_id = self.case_id_for_session(session_id)?;

        self.storage
            .load_case(&case_id)
            .map_err(|e| e.for_session())?
            .ok_or(ApiError::SessionNotFound)
    }

    /// A case the investigator may see: it exists and has its report.
    fn reported_case(&self, case_id: &CaseId) -> Result<CaseRecord, ApiError> {
        self.storage
            .load_case(case_id)
            .map_err(|e| e.for_case())?
            .filter(CaseRecord::has_report)
            .ok_or(ApiError::CaseNotFound)
    }
}

fn check_item(item: &ThreadItem, sender: Sender, allowed: &[ItemType]) -> Result<(), ApiError> {
    if item.sender != sender {
        return Err(ApiError::InvalidRequest(format!("item sender must be {sender:?}")));
    }
    if !allowed.contains(&item.item_type) {
        return Err(ApiError::InvalidRequest(format!(
            "item type {:?} not accepted here",
            item.item_type
        )));
    }
    if item.blob.ciphertext.len() < TAG_SIZE {
        return Err(ApiError::InvalidRequest("ciphertext shorter than its tag".to_string()));
    }

    Ok(())
}

#[async_trait]
impl<S: CaseStorage, E: Environment> CaseApi for CaseService<S, E> {
    async fn create_case(&self) -> Result<CreateCaseResponse, ApiError> {
        let record = CaseRecord::open(&self.env);
        self.storage.insert_case(&record).map_err(|e| e.for_case())?;

        tracing::info!(case_id = %record.case_id, "case created");

        Ok(CreateCaseResponse {
            session_id: record.session_id,
            investigator_public_key: self.investigator_public_key.clone(),
        })
    }

    async fn submit_report(
        &self,
        session_id: &SessionId,
        request: SubmitReportRequest,
    ) -> Result<(), ApiError> {
        let (report, envelope) = request.into_parts();
        check_item(&report, Sender::Submitter, &[ItemType::Report])?;
        if envelope.wrapped_key.is_empty() {
            return Err(ApiError::InvalidRequest("wrapped case key is empty".to_string()));
        }

        let case_id = self.case_id_for_session(session_id)?;
        let record = self
            .storage
            .attach_report(&case_id, &report, &envelope)
            .map_err(|e| e.for_session())?;

        tracing::info!(case_id = %record.case_id, item_count = record.thread.len(), "report stored");
        Ok(())
    }

    async fn get_thread(&self, session_id: &SessionId) -> Result<ThreadResponse, ApiError> {
        let record = self.case_for_session(session_id)?;

        Ok(ThreadResponse { status: record.status, thread: record.thread.into_items() })
    }

    async fn post_message(
        &self,
        session_id: &SessionId,
        request: PostMessageRequest,
    ) -> Result<ThreadItem, ApiError> {
        let PostMessageRequest(item) = request;
        check_item(&item, Sender::Submitter, &[ItemType::Message, ItemType::Attachment])?;

        let case_id = self.case_id_for_session(session_id)?;
        let record = self.storage.append_item(&case_id, &item).map_err(|e| e.for_session())?;

        tracing::debug!(
            case_id = %record.case_id,
            item_count = record.thread.len(),
            "submitter message stored"
        );
        Ok(item)
    }

    async fn login(&self, request: LoginRequest) -> Result<LoginResponse, ApiError> {
        // PBKDF2 verification runs on the blocking pool
        let auth = Arc::clone(&self.auth);
        let token = tokio::task::spawn_blocking(move || auth.login(&request))
            .await
            .map_err(|e| ApiError::Storage(e.to_string()))??;

        tracing::info!("investigator token issued");
        Ok(LoginResponse { token })
    }

    async fn list_cases(&self, token: &AuthToken) -> Result<Vec<CaseSummary>, ApiError> {
        self.auth.verify(token)?;

        let mut cases: Vec<CaseSummary> = self
            .storage
            .list_cases()
            .map_err(|e| e.for_case())?
            .iter()
            .filter(|record| record.has_report())
            .map(CaseRecord::summary)
            .collect();
        cases.sort_by_key(|summary| (summary.created_at, *summary.case_id.as_bytes()));

        Ok(cases)
    }

    async fn get_case(&self, token: &AuthToken, case_id: &CaseId) -> Result<CaseDetails, ApiError> {
        self.auth.verify(token)?;

        let record = self.reported_case(case_id)?;
        let summary = record.summary();
        let wrapped_case_key =
            record.investigator_envelope.map(|envelope| envelope.wrapped_key).unwrap_or_default();

        Ok(CaseDetails { summary, wrapped_case_key, thread: record.thread.into_items() })
    }

    async fn set_status(
        &self,
        token: &AuthToken,
        case_id: &CaseId,
        update: StatusUpdate,
    ) -> Result<CaseSummary, ApiError> {
        self.auth.verify(token)?;
        self.reported_case(case_id)?;

        let record =
            self.storage.update_status(case_id, update.status).map_err(|e| e.for_case())?;

        tracing::info!(case_id = %case_id, status = %record.status, "status changed");
        Ok(record.summary())
    }

    async fn reply(
        &self,
        token: &AuthToken,
        case_id: &CaseId,
        request: PostMessageRequest,
    ) -> Result<ThreadItem, ApiError> {
        self.auth.verify(token)?;

        let PostMessageRequest(item) = request;
        check_item(&item, Sender::Investigator, &[ItemType::Message, ItemType::Attachment])?;
        self.reported_case(case_id)?;

        let record = self.storage.append_item(case_id, &item).map_err(|e| e.for_case())?;

        tracing::debug!(
            case_id = %case_id,
            item_count = record.thread.len(),
            "investigator reply stored"
        );
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use vaultvoice_core::{CaseStatus, InvestigatorEnvelope, MlLabel, env::test_utils::MockEnv};

    use super::*;
    use crate::{
        config::InvestigatorCredentials,
        storage::{
            MemoryStorage, StorageError,
            fixtures::{envelope, item},
        },
    };

    const PUBLIC_PEM: &str =
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../testdata/investigator_public.pem"));

    /// Accepts any login; tokens are always valid.
    struct OpenDoor;

    impl InvestigatorAuthenticator for OpenDoor {
        fn login(&self, _: &LoginRequest) -> Result<AuthToken, ApiError> {
            Ok(AuthToken("open".to_string()))
        }

        fn verify(&self, _: &AuthToken) -> Result<(), ApiError> {
            Ok(())
        }
    }

    fn service(seed: u64) -> CaseService<MemoryStorage, MockEnv> {
        CaseService::with_authenticator(
            PUBLIC_PEM.to_string(),
            MemoryStorage::new(),
            MockEnv::seeded(seed),
            Arc::new(OpenDoor),
        )
    }

    fn token() -> AuthToken {
        AuthToken("open".to_string())
    }

    fn reply_item(id: u8, created_at: u64) -> ThreadItem {
        ThreadItem { sender: Sender::Investigator, ..item(id, created_at) }
    }

    async fn reported(service: &CaseService<MemoryStorage, MockEnv>) -> (SessionId, CaseId) {
        let created = service.create_case().await.unwrap();
        service
            .submit_report(&created.session_id, SubmitReportRequest::new(item(0, 10), envelope()))
            .await
            .unwrap();
        let case_id =
            service.storage().case_id_for_session(&created.session_id).unwrap().unwrap();
        (created.session_id, case_id)
    }

    #[tokio::test]
    async fn create_case_hands_out_public_key() {
        let service = service(1);
        let created = service.create_case().await.unwrap();

        assert_eq!(created.investigator_public_key, PUBLIC_PEM);
        assert_eq!(service.storage().case_count(), 1);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let service = service(2);
        let missing = SessionId::from_bytes([3; 16]);

        assert_eq!(service.get_thread(&missing).await.unwrap_err(), ApiError::SessionNotFound);
        assert_eq!(
            service
                .submit_report(&missing, SubmitReportRequest::new(item(0, 1), envelope()))
                .await
                .unwrap_err(),
            ApiError::SessionNotFound
        );
    }

    #[tokio::test]
    async fn report_must_be_a_submitter_report() {
        let service = service(3);
        let created = service.create_case().await.unwrap();

        let message_as_report = SubmitReportRequest::new(item(1, 1), envelope());
        let err = service.submit_report(&created.session_id, message_as_report).await.unwrap_err();

        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn second_report_conflicts() {
        let service = service(4);
        let (session_id, _) = reported(&service).await;

        let again = SubmitReportRequest::new(item(0, 20), envelope());
        assert!(matches!(
            service.submit_report(&session_id, again).await.unwrap_err(),
            ApiError::Conflict(_)
        ));
    }

    #[tokio::test]
    async fn submitter_cannot_post_as_investigator() {
        let service = service(5);
        let (session_id, _) = reported(&service).await;

        let err = service
            .post_message(&session_id, PostMessageRequest(reply_item(1, 20)))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn duplicate_item_id_conflicts() {
        let service = service(6);
        let (session_id, _) = reported(&service).await;

        service.post_message(&session_id, PostMessageRequest(item(1, 20))).await.unwrap();
        let err =
            service.post_message(&session_id, PostMessageRequest(item(1, 30))).await.unwrap_err();

        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn truncated_ciphertext_is_rejected() {
        let service = service(7);
        let (session_id, _) = reported(&service).await;

        let mut short = item(1, 20);
        short.blob.ciphertext.truncate(TAG_SIZE - 1);

        assert!(matches!(
            service.post_message(&session_id, PostMessageRequest(short)).await.unwrap_err(),
            ApiError::InvalidRequest(_)
        ));
    }

    #[tokio::test]
    async fn unreported_cases_stay_off_the_dashboard() {
        let service = service(8);
        let unreported = service.create_case().await.unwrap();
        let (_, case_id) = reported(&service).await;

        let cases = service.list_cases(&token()).await.unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].case_id, case_id);

        let hidden =
            service.storage().case_id_for_session(&unreported.session_id).unwrap().unwrap();
        assert_eq!(service.get_case(&token(), &hidden).await.unwrap_err(), ApiError::CaseNotFound);
        assert_eq!(
            service
                .reply(&token(), &hidden, PostMessageRequest(reply_item(1, 20)))
                .await
                .unwrap_err(),
            ApiError::CaseNotFound
        );
    }

    #[tokio::test]
    async fn status_only_moves_forward() {
        let service = service(9);
        let (session_id, case_id) = reported(&service).await;

        let closed = service
            .set_status(&token(), &case_id, StatusUpdate { status: CaseStatus::Closed })
            .await
            .unwrap();
        assert_eq!(closed.status, CaseStatus::Closed);

        let err = service
            .set_status(&token(), &case_id, StatusUpdate { status: CaseStatus::New })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::InvalidStatusTransition { from: CaseStatus::Closed, to: CaseStatus::New }
        );
        assert_eq!(service.get_thread(&session_id).await.unwrap().status, CaseStatus::Closed);
    }

    #[tokio::test]
    async fn replies_and_messages_interleave_by_created_at() {
        let service = service(10);
        let (session_id, case_id) = reported(&service).await;

        service.reply(&token(), &case_id, PostMessageRequest(reply_item(2, 30))).await.unwrap();
        service.post_message(&session_id, PostMessageRequest(item(1, 20))).await.unwrap();

        let details = service.get_case(&token(), &case_id).await.unwrap();
        let order: Vec<(u64, Sender)> =
            details.thread.iter().map(|item| (item.created_at, item.sender)).collect();

        assert_eq!(
            order,
            vec![(10, Sender::Submitter), (20, Sender::Submitter), (30, Sender::Investigator)]
        );
        assert_eq!(details.wrapped_case_key, envelope().wrapped_key);
    }

    #[tokio::test]
    async fn assessment_shows_on_dashboard() {
        let service = service(11);
        let (_, case_id) = reported(&service).await;

        service
            .record_assessment(&case_id, MlAssessment { label: MlLabel::NonAbusive, score: 0.1 })
            .unwrap();
        let err = service
            .record_assessment(&case_id, MlAssessment { label: MlLabel::Abusive, score: 1.5 })
            .unwrap_err();

        assert!(matches!(err, ApiError::InvalidRequest(_)));
        let cases = service.list_cases(&token()).await.unwrap();
        assert_eq!(cases[0].ml_label, MlLabel::NonAbusive);
    }

    /// Counts full record loads made through it.
    #[derive(Clone, Default)]
    struct CountingStorage {
        inner: MemoryStorage,
        loads: Arc<AtomicUsize>,
    }

    impl CountingStorage {
        fn loads(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
        }
    }

    impl CaseStorage for CountingStorage {
        fn insert_case(&self, record: &CaseRecord) -> Result<(), StorageError> {
            self.inner.insert_case(record)
        }

        fn case_id_for_session(
            &self,
            session_id: &SessionId,
        ) -> Result<Option<CaseId>, StorageError> {
            self.inner.case_id_for_session(session_id)
        }

        fn load_case(&self, case_id: &CaseId) -> Result<Option<CaseRecord>, StorageError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.inner.load_case(case_id)
        }

        fn list_cases(&self) -> Result<Vec<CaseRecord>, StorageError> {
            self.inner.list_cases()
        }

        fn attach_report(
            &self,
            case_id: &CaseId,
            report: &ThreadItem,
            envelope: &InvestigatorEnvelope,
        ) -> Result<CaseRecord, StorageError> {
            self.inner.attach_report(case_id, report, envelope)
        }

        fn append_item(
            &self,
            case_id: &CaseId,
            item: &ThreadItem,
        ) -> Result<CaseRecord, StorageError> {
            self.inner.append_item(case_id, item)
        }

        fn update_status(
            &self,
            case_id: &CaseId,
            next: CaseStatus,
        ) -> Result<CaseRecord, StorageError> {
            self.inner.update_status(case_id, next)
        }

        fn update_assessment(
            &self,
            case_id: &CaseId,
            assessment: MlAssessment,
        ) -> Result<CaseRecord, StorageError> {
            self.inner.update_assessment(case_id, assessment)
        }
    }

    #[tokio::test]
    async fn submitter_writes_resolve_the_session_without_loading() {
        let storage = CountingStorage::default();
        let service = CaseService::with_authenticator(
            PUBLIC_PEM.to_string(),
            storage.clone(),
            MockEnv::seeded(13),
            Arc::new(OpenDoor),
        );

        let created = service.create_case().await.unwrap();
        service
            .submit_report(&created.session_id, SubmitReportRequest::new(item(0, 10), envelope()))
            .await
            .unwrap();
        service
            .post_message(&created.session_id, PostMessageRequest(item(1, 20)))
            .await
            .unwrap();
        assert_eq!(storage.loads(), 0);

        assert_eq!(
            service
                .post_message(&SessionId::from_bytes([9; 16]), PostMessageRequest(item(2, 30)))
                .await
                .unwrap_err(),
            ApiError::SessionNotFound
        );

        let thread = service.get_thread(&created.session_id).await.unwrap().thread;
        assert_eq!(thread.len(), 2);
        assert_eq!(storage.loads(), 1);
    }

    #[tokio::test]
    async fn credential_service_rejects_bad_tokens() {
        let credentials = InvestigatorCredentials::new("inv", "pw").unwrap();
        let config = ServiceConfig::new(PUBLIC_PEM.to_string(), credentials);
        let service = CaseService::new(config, MemoryStorage::new(), MockEnv::seeded(12)).unwrap();

        assert_eq!(
            service.list_cases(&AuthToken("guess".into())).await.unwrap_err(),
            ApiError::Unauthorized
        );

        let response = service
            .login(LoginRequest { username: "inv".into(), password: "pw".into() })
            .await
            .unwrap();
        assert!(service.list_cases(&response.token).await.unwrap().is_empty());
    }
}
