//! Fuzz target for wire and storage decoding
//!
//! Every byte string a client, server or disk can hand us goes through one of
//! these decoders.
//!
//! # Strategy
//!
//! - JSON bodies: thread items, report submissions, envelopes, case details
//! - CBOR records: the on-disk `CaseRecord` encoding
//! - Text handles: session and case ids parsed from user input
//!
//! # Invariants
//!
//! - Decoding NEVER panics on malformed input
//! - Anything that decodes re-encodes and decodes to the same value
//! - Ids that parse render back to the same lowercase hex

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use vaultvoice_core::{
    CaseId, CaseRecord, PassphraseEnvelope, SealedPrivateKey, SessionId, ThreadItem,
    api::{CaseDetails, SubmitReportRequest, ThreadResponse},
};

#[derive(Debug, Clone, Arbitrary)]
enum WireInput {
    Json { target: JsonTarget, bytes: Vec<u8> },
    Cbor(Vec<u8>),
    Handle(String),
}

#[derive(Debug, Clone, Copy, Arbitrary)]
enum JsonTarget {
    ThreadItem,
    SubmitReport,
    PassphraseEnvelope,
    SealedPrivateKey,
    ThreadResponse,
    CaseDetails,
}

fuzz_target!(|input: WireInput| {
    match input {
        WireInput::Json { target, bytes } => match target {
            JsonTarget::ThreadItem => json_round_trip::<ThreadItem>(&bytes),
            JsonTarget::SubmitReport => json_round_trip::<SubmitReportRequest>(&bytes),
            JsonTarget::PassphraseEnvelope => json_round_trip::<PassphraseEnvelope>(&bytes),
            JsonTarget::SealedPrivateKey => json_round_trip::<SealedPrivateKey>(&bytes),
            JsonTarget::ThreadResponse => json_round_trip::<ThreadResponse>(&bytes),
            JsonTarget::CaseDetails => json_round_trip::<CaseDetails>(&bytes),
        },

        WireInput::Cbor(bytes) => {
            let Ok(record) = ciborium::from_reader::<CaseRecord, _>(bytes.as_slice()) else {
                return;
            };

            let mut encoded = Vec::new();
            ciborium::into_writer(&record, &mut encoded).expect("decoded record must re-encode");
            let decoded: CaseRecord =
                ciborium::from_reader(encoded.as_slice()).expect("re-encoded record must decode");

            // NaN scores never compare equal
            if !record.assessment.score.is_nan() {
                assert_eq!(record, decoded);
            }
        },

        WireInput::Handle(text) => {
            if let Ok(id) = text.parse::<SessionId>() {
                assert_eq!(id.to_string(), text.trim().to_ascii_lowercase());
            }
            if let Ok(id) = text.parse::<CaseId>() {
                assert_eq!(id.to_string(), text.trim().to_ascii_lowercase());
            }
        },
    }
});

fn json_round_trip<T>(bytes: &[u8])
where
    T: serde::Serialize + serde::de::DeserializeOwned + PartialEq + std::fmt::Debug,
{
    let Ok(value) = serde_json::from_slice::<T>(bytes) else {
        return;
    };

    let encoded = serde_json::to_vec(&value).expect("decoded value must re-encode");
    let decoded: T = serde_json::from_slice(&encoded).expect("re-encoded value must decode");
    assert_eq!(value, decoded);
}
