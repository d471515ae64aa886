use std::{
    array::TryFromSliceError,
    cmp,
    fmt::{Display, Formatter, Result},
};
use pest::error::{Error as PestError, LineColLocation};
use rabe_bn::FieldError;
use serde::{Deserialize, Serialize};
use crate::utils::policy::pest::human::Rule as humanRule;
use crate::utils::policy::pest::json::Rule as jsonRule;

/// The failure classes a caller can tell apart.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum ErrorKind {
    /// A request went out and nothing usable came back before its deadline.
    Timeout,
    /// A signature, certificate or integrity check failed. Never retried.
    TrustFailure,
    /// The authority holds no (or an empty) grant for the requester.
    UnknownIdentity,
    /// The token issuer approved none of the requested attributes.
    Denied,
    /// A policy expression does not parse or cannot be encrypted under.
    MalformedPolicy,
    /// A local cache (public parameters, attribute key, policy) is empty.
    NotReady,
    /// The held attribute set does not satisfy the policy of a wrapped key.
    InsufficientAttributes,
    /// The caller cancelled the operation.
    Cancelled,
    /// Local encoding, decoding or configuration failure.
    Encoding,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter) -> Result {
        let name = match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::TrustFailure => "trust failure",
            ErrorKind::UnknownIdentity => "unknown identity",
            ErrorKind::Denied => "denied",
            ErrorKind::MalformedPolicy => "malformed policy",
            ErrorKind::NotReady => "not ready",
            ErrorKind::InsufficientAttributes => "insufficient attributes",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Encoding => "encoding",
        };
        f.write_str(name)
    }
}

/// Error type of the whole crate: a kind plus a human readable detail
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct NacAbeError {
    kind: ErrorKind,
    details: String,
}

impl NacAbeError {
    /// Creates a new Error
    pub fn new(kind: ErrorKind, msg: &str) -> NacAbeError {
        NacAbeError { kind, details: msg.to_string() }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn details(&self) -> &str {
        &self.details
    }

    pub fn timeout(msg: &str) -> NacAbeError {
        NacAbeError::new(ErrorKind::Timeout, msg)
    }

    pub fn trust(msg: &str) -> NacAbeError {
        NacAbeError::new(ErrorKind::TrustFailure, msg)
    }

    pub fn not_ready(msg: &str) -> NacAbeError {
        NacAbeError::new(ErrorKind::NotReady, msg)
    }

    pub fn malformed_policy(msg: &str) -> NacAbeError {
        NacAbeError::new(ErrorKind::MalformedPolicy, msg)
    }

    pub fn insufficient_attributes(msg: &str) -> NacAbeError {
        NacAbeError::new(ErrorKind::InsufficientAttributes, msg)
    }

    pub fn encoding(msg: &str) -> NacAbeError {
        NacAbeError::new(ErrorKind::Encoding, msg)
    }

    /// Only timeouts are worth sending the same request again.
    pub fn is_retryable(&self) -> bool {
        self.kind == ErrorKind::Timeout
    }
}

impl Display for NacAbeError {
    fn fmt(&self, f: &mut Formatter) -> Result {
        write!(f, "Error ({}): {}", self.kind, self.details)
    }
}

impl std::error::Error for NacAbeError {}

fn pest_line<R>(error: &PestError<R>) -> usize {
    match error.line_col.to_owned() {
        LineColLocation::Pos((line, _)) => line,
        LineColLocation::Span((start_line, _), (end_line, _)) => cmp::max(start_line, end_line),
    }
}

impl From<PestError<jsonRule>> for NacAbeError {
    fn from(error: PestError<jsonRule>) -> Self {
        NacAbeError::malformed_policy(
            format!("Json Policy Error in line {}", pest_line(&error)).as_ref()
        )
    }
}

impl From<PestError<humanRule>> for NacAbeError {
    fn from(error: PestError<humanRule>) -> Self {
        NacAbeError::malformed_policy(
            format!("Human Policy Error in line {}", pest_line(&error)).as_ref()
        )
    }
}

impl From<FieldError> for NacAbeError {
    fn from(error: FieldError) -> Self {
        match error {
            FieldError::InvalidSliceLength => NacAbeError::encoding("FieldError::InvalidSliceLength"),
            FieldError::InvalidU512Encoding => NacAbeError::encoding("FieldError::InvalidU512Encoding"),
            FieldError::NotMember => NacAbeError::encoding("FieldError::NotMember"),
        }
    }
}

impl From<aes_gcm::Error> for NacAbeError {
    fn from(_error: aes_gcm::Error) -> Self {
        // Aead's error is intentionally opaque, there is no more information in here
        NacAbeError::trust("AEAD authentication failed")
    }
}

impl From<serde_cbor::Error> for NacAbeError {
    fn from(error: serde_cbor::Error) -> Self {
        NacAbeError::encoding(&format!("cbor: {}", error))
    }
}

impl From<ed25519_dalek::SignatureError> for NacAbeError {
    fn from(error: ed25519_dalek::SignatureError) -> Self {
        NacAbeError::trust(&format!("signature: {}", error))
    }
}

impl From<toml::de::Error> for NacAbeError {
    fn from(error: toml::de::Error) -> Self {
        NacAbeError::encoding(&format!("config: {}", error))
    }
}

impl From<std::io::Error> for NacAbeError {
    fn from(error: std::io::Error) -> Self {
        NacAbeError::encoding(&error.to_string())
    }
}

impl From<TryFromSliceError> for NacAbeError {
    fn from(error: TryFromSliceError) -> Self {
        NacAbeError::encoding(&error.to_string())
    }
}
