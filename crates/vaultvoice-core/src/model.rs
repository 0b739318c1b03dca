//! Case data model.
//!
//! Identifiers, case status, thread items and the server-side case record.
//! Every type here carries only ciphertext; plaintext exists solely in
//! [`DecryptedItem`](crate::thread::DecryptedItem).

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};
use vaultvoice_crypto::EncryptedBlob;

use crate::{
    env::Environment,
    envelope::InvestigatorEnvelope,
    error::{ParseError, TransitionError},
    thread::Thread,
};

/// Identifier size in bytes (128 bits).
pub const ID_SIZE: usize = 16;

macro_rules! random_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; ID_SIZE]);

        impl $name {
            /// Draw a fresh random identifier.
            pub fn generate<E: Environment>(env: &E) -> Self {
                let mut bytes = [0u8; ID_SIZE];
                env.random_bytes(&mut bytes);
                Self(bytes)
            }

            /// Wrap raw identifier bytes.
            pub fn from_bytes(bytes: [u8; ID_SIZE]) -> Self {
                Self(bytes)
            }

            /// Raw identifier bytes.
            pub fn as_bytes(&self) -> &[u8; ID_SIZE] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }

        impl FromStr for $name {
            type Err = ParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let mut bytes = [0u8; ID_SIZE];
                hex::decode_to_slice(s.trim(), &mut bytes).map_err(|_| ParseError::InvalidId)?;
                Ok(Self(bytes))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&hex::encode(self.0))
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let text = String::deserialize(deserializer)?;
                text.parse().map_err(D::Error::custom)
            }
        }
    };
}

random_id! {
    /// Submitter-facing case handle.
    ///
    /// A bearer secret: whoever holds it (and the device-local passphrase
    /// envelope) can follow up on the case. `Debug` output is redacted so it
    /// never reaches logs.
    SessionId
}

random_id! {
    /// Investigator-facing case handle. Independent of [`SessionId`].
    CaseId
}

random_id! {
    /// Thread item identifier.
    ItemId
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionId(..)")
    }
}

impl fmt::Debug for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CaseId({self})")
    }
}

impl fmt::Debug for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ItemId({self})")
    }
}

/// Case status. Moves forward only: `NEW -> IN_REVIEW -> CLOSED`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseStatus {
    /// Submitted, not yet looked at
    #[default]
    New,
    /// An investigator is working the case
    InReview,
    /// Terminal
    Closed,
}

impl CaseStatus {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::InReview => "IN_REVIEW",
            Self::Closed => "CLOSED",
        }
    }

    /// Whether moving to `next` is a forward transition.
    ///
    /// Skipping `IN_REVIEW` is allowed. Staying put is not a transition.
    pub fn can_transition_to(self, next: Self) -> bool {
        next > self
    }

    /// Validate a transition, returning the new status.
    pub fn transition_to(self, next: Self) -> Result<Self, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError { from: self, to: next })
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaseStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "NEW" => Ok(Self::New),
            "IN_REVIEW" => Ok(Self::InReview),
            "CLOSED" => Ok(Self::Closed),
            _ => Err(ParseError::UnknownStatus(s.to_owned())),
        }
    }
}

/// Author of a thread item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sender {
    /// The anonymous submitter
    #[serde(rename = "WB", alias = "submitter")]
    Submitter,
    /// The investigator
    #[serde(rename = "INV", alias = "investigator")]
    Investigator,
}

/// Kind of thread item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    /// The initial report; exactly one per case, always first
    Report,
    /// A follow-up message from either side
    #[default]
    Message,
    /// An encrypted attachment
    Attachment,
}

/// One encrypted entry in a case thread. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadItem {
    /// Random item id
    pub id: ItemId,
    /// Item kind
    #[serde(rename = "type")]
    pub item_type: ItemType,
    /// Author
    pub sender: Sender,
    /// Creation time, milliseconds since the Unix epoch
    pub created_at: u64,
    /// Ciphertext under the case key
    pub blob: EncryptedBlob,
    /// Original file name for attachments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// Abuse classification label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MlLabel {
    /// Classified as abusive
    Abusive,
    /// Classified as not abusive
    NonAbusive,
    /// Not classified
    #[default]
    Unknown,
}

/// Opaque abuse-classification result attached to a case.
///
/// Produced by an external classifier; VaultVoice only stores and displays it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MlAssessment {
    /// Label
    pub label: MlLabel,
    /// Classifier confidence
    pub score: f64,
}

/// Dashboard row for the investigator case list.
///
/// Carries the case id only; the session id never leaves the case record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseSummary {
    /// Investigator-facing handle
    pub case_id: CaseId,
    /// Case creation time, milliseconds since the Unix epoch
    pub created_at: u64,
    /// Current status
    pub status: CaseStatus,
    /// Classifier label
    pub ml_label: MlLabel,
    /// Classifier score
    pub ml_score: f64,
}

/// Server-side case record. Holds no plaintext and no raw key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseRecord {
    /// Investigator-facing handle
    pub case_id: CaseId,
    /// Submitter-facing handle
    pub session_id: SessionId,
    /// Current status
    pub status: CaseStatus,
    /// Case key wrapped for the investigator; `None` until the report arrives
    #[serde(default)]
    pub investigator_envelope: Option<InvestigatorEnvelope>,
    /// Encrypted conversation
    pub thread: Thread,
    /// Creation time, milliseconds since the Unix epoch
    pub created_at: u64,
    /// Abuse classification
    #[serde(default)]
    pub assessment: MlAssessment,
}

impl CaseRecord {
    /// A fresh case with random, independent handles and no report yet.
    pub fn open<E: Environment>(env: &E) -> Self {
        Self {
            case_id: CaseId::generate(env),
            session_id: SessionId::generate(env),
            status: CaseStatus::New,
            investigator_envelope: None,
            thread: Thread::new(),
            created_at: env.wall_clock_millis(),
            assessment: MlAssessment::default(),
        }
    }

    /// Whether the initial report has been submitted.
    pub fn has_report(&self) -> bool {
        self.investigator_envelope.is_some()
    }

    /// Advance the status, rejecting anything that is not forward.
    pub fn advance_status(&mut self, next: CaseStatus) -> Result<(), TransitionError> {
        self.status = self.status.transition_to(next)?;
        Ok(())
    }

    /// Dashboard view of this case.
    pub fn summary(&self) -> CaseSummary {
        CaseSummary {
            case_id: self.case_id,
            created_at: self.created_at,
            status: self.status,
            ml_label: self.assessment.label,
            ml_score: self.assessment.score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::test_utils::MockEnv;

    #[test]
    fn ids_render_as_lowercase_hex() {
        let id = CaseId::from_bytes([0xAB; ID_SIZE]);
        assert_eq!(id.to_string(), "ab".repeat(ID_SIZE));
        assert_eq!(id.to_string().parse::<CaseId>().unwrap(), id);
    }

    #[test]
    fn id_parse_rejects_garbage() {
        assert_eq!("nonexistent".parse::<SessionId>(), Err(ParseError::InvalidId));
        assert_eq!("abcd".parse::<SessionId>(), Err(ParseError::InvalidId));
        assert_eq!("".parse::<ItemId>(), Err(ParseError::InvalidId));
    }

    #[test]
    fn session_id_debug_is_redacted() {
        let id = SessionId::from_bytes([1; ID_SIZE]);
        assert_eq!(format!("{id:?}"), "SessionId(..)");
    }

    #[test]
    fn case_handles_are_independent() {
        let env = MockEnv::seeded(3);
        let record = CaseRecord::open(&env);
        assert_ne!(record.case_id.as_bytes(), record.session_id.as_bytes());
    }

    #[test]
    fn status_moves_forward_only() {
        use CaseStatus::{Closed, InReview, New};

        assert!(New.can_transition_to(InReview));
        assert!(InReview.can_transition_to(Closed));
        assert!(New.can_transition_to(Closed));

        assert!(!Closed.can_transition_to(New));
        assert!(!Closed.can_transition_to(InReview));
        assert!(!InReview.can_transition_to(New));
        assert!(!New.can_transition_to(New));
    }

    #[test]
    fn status_parse_accepts_common_spellings() {
        assert_eq!("IN_REVIEW".parse::<CaseStatus>().unwrap(), CaseStatus::InReview);
        assert_eq!("in-review".parse::<CaseStatus>().unwrap(), CaseStatus::InReview);
        assert_eq!("closed".parse::<CaseStatus>().unwrap(), CaseStatus::Closed);
        assert!("archived".parse::<CaseStatus>().is_err());
    }

    #[test]
    fn wire_names_match_browser_client() {
        assert_eq!(serde_json::to_value(CaseStatus::InReview).unwrap(), "IN_REVIEW");
        assert_eq!(serde_json::to_value(Sender::Submitter).unwrap(), "WB");
        assert_eq!(serde_json::to_value(Sender::Investigator).unwrap(), "INV");
        assert_eq!(serde_json::to_value(ItemType::Report).unwrap(), "report");
        assert_eq!(serde_json::to_value(MlLabel::NonAbusive).unwrap(), "non_abusive");

        let sender: Sender = serde_json::from_str("\"investigator\"").unwrap();
        assert_eq!(sender, Sender::Investigator);
    }

    #[test]
    fn summary_omits_session_id() {
        let env = MockEnv::seeded(4);
        let record = CaseRecord::open(&env);
        let json = serde_json::to_value(record.summary()).unwrap();

        assert_eq!(json["caseId"], record.case_id.to_string());
        assert_eq!(json["mlLabel"], "unknown");
        assert!(json.get("sessionId").is_none());
    }

    #[test]
    fn advance_status_keeps_state_on_rejection() {
        let env = MockEnv::seeded(5);
        let mut record = CaseRecord::open(&env);

        record.advance_status(CaseStatus::Closed).unwrap();
        let err = record.advance_status(CaseStatus::New).unwrap_err();

        assert_eq!(err, TransitionError { from: CaseStatus::Closed, to: CaseStatus::New });
        assert_eq!(record.status, CaseStatus::Closed);
    }
}
