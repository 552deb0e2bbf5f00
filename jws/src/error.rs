//! Error types for JWS decoding, validation, encoding and building

use std::time::Duration;

use thiserror::Error;

pub use crate::header::HeaderTypeError;

/// Failures while decoding an untrusted JWS. Decoding never returns a
/// partially decoded object alongside one of these.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The input was empty or contained nothing but whitespace
    #[error("invalid jws: zero-length input")]
    EmptyInput,
    /// Whitespace preceded something other than a JSON object
    #[error("invalid jws: leading whitespace before a compact encoded jws")]
    LeadingWhitespace,
    /// The compact form did not have exactly three segments
    #[error("unable to parse input as JWS compact encoding")]
    InvalidCompactEncoding,
    /// The JSON form could not be parsed, had unknown or repeated members, or
    /// lacked a payload or signature
    #[error("bad jws json encoding: {0}")]
    Json(#[source] serde_json::Error),
    /// Both a `signatures` array and flattened signature members were present
    #[error("bad general encoding: has flattened and general members")]
    MixedSerialization,
    /// The payload was not valid base64url
    #[error("bad payload encoding: {0}")]
    PayloadEncoding(#[source] base64::DecodeError),
    /// A protected header segment was not valid base64url
    #[error("bad protected header encoding in signature {index}: {source}")]
    ProtectedHeaderEncoding {
        /// Wire index of the signature entry
        index: usize,
        /// Underlying base64 error
        source: base64::DecodeError,
    },
    /// A protected header did not decode to a JSON object with unique members
    #[error("bad JSON encoding for protected header in signature {index}: {source}")]
    ProtectedHeaderJson {
        /// Wire index of the signature entry
        index: usize,
        /// Underlying JSON error
        source: serde_json::Error,
    },
    /// The same member name appeared in both the protected and unprotected
    /// header of one signature entry
    #[error("JOSE header for signature {index} contains duplicate member: {name}")]
    DuplicateHeader {
        /// Wire index of the signature entry
        index: usize,
        /// The repeated member name
        name: String,
    },
    /// Neither the protected nor the unprotected header of a signature entry
    /// had any members
    #[error("JOSE header for signature {index} is empty")]
    EmptyHeader {
        /// Wire index of the signature entry
        index: usize,
    },
    /// A signature segment was not valid base64url
    #[error("bad signature encoding in signature {index}: {source}")]
    SignatureEncoding {
        /// Wire index of the signature entry
        index: usize,
        /// Underlying base64 error
        source: base64::DecodeError,
    },
    /// A registered header member had the wrong JSON type
    #[error("invalid registered header in signature {index}: {source}")]
    RegisteredHeaderType {
        /// Wire index of the signature entry
        index: usize,
        /// The mismatch
        source: HeaderTypeError,
    },
}

/// Failures while serializing a signed JWS
#[derive(Error, Debug)]
pub enum EncodeError {
    /// Compact encoding only carries a single signature
    #[error("cannot have more than 1 signature for compact encoding")]
    TooManySignatures,
    /// Compact encoding has no room for an unprotected header
    #[error("must have protected header values and no unprotected header for compact encoding")]
    BadHeader,
    /// JSON serialization failed
    #[error("unable to serialize jws as JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures reported by, or while waiting on, a signing, verification or
/// key resolution capability
#[derive(Error, Debug)]
pub enum CapabilityError {
    /// The operation's context was cancelled before it completed
    #[error("operation cancelled")]
    Cancelled,
    /// The operation did not complete within the context's timeout
    #[error("operation timed out after {0:?}")]
    TimedOut(Duration),
    /// The capability itself failed
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Why a policy refused to authenticate a single signature entry
#[derive(Error, Debug)]
pub enum PolicyError {
    /// `crit` listed extensions this policy does not understand
    #[error("cannot continue with unknown critical extension: {0:?}")]
    UnknownCriticalExtension(Vec<String>),
    /// No `alg` header was present
    #[error("no alg header present in JWS")]
    NoAlgorithm,
    /// The none policy was asked to accept an entry with a real algorithm
    #[error("attempt to none authenticate JWS with signing header")]
    NotNone,
    /// The none policy was asked to accept an entry with signature bytes
    #[error("attempt to none authenticate JWS where signature was not empty bytes")]
    SignaturePresent,
    /// No `jku` header was present to locate a key
    #[error("unable to locate appropriate JWK for authentication")]
    NoKeyLocator,
    /// The `jku` header did not parse as a URL
    #[error("unable to parse jku url: {0}")]
    InvalidKeyLocator(#[source] url::ParseError),
    /// The `jku` header did not use https
    #[error("jku URL does not use https")]
    InsecureKeyLocator,
    /// The key subsystem could not produce a verifier
    #[error("unable to resolve verification key: {0}")]
    KeyResolution(#[source] CapabilityError),
    /// The resolved verifier rejected the signature
    #[error("signature verification failed: {0}")]
    Verification(#[source] CapabilityError),
}

/// Failure of a whole validation run
#[derive(Error, Debug)]
pub enum ValidationError {
    /// The only signature entry was rejected
    #[error("validation failure: error in signature: {source}")]
    Signature {
        /// Why the entry was rejected
        source: PolicyError,
    },
    /// Every one of several signature entries was rejected
    #[error("validation failure: no signature found to be acceptable")]
    NoAcceptableSignature,
}

/// Misuse of a [`crate::builder::JwsBuilder`], or a failure while signing
#[derive(Error, Debug)]
pub enum BuilderError {
    /// The payload or protected header was modified after signing
    #[error("builder already signed, modifying payload or header has no effect")]
    AlreadySigned,
    /// A header name would have been defined twice in one JOSE header
    #[error("duplicate header present in computed JOSE header: {0}")]
    DuplicateHeader(String),
    /// The signer declared a different algorithm than the `alg` header
    #[error("alg header {header:?} does not match the signer's algorithm {signer:?}")]
    AlgorithmMismatch {
        /// The `alg` value in the header
        header: String,
        /// The algorithm declared by the signer
        signer: String,
    },
    /// A payload object or header value could not be serialized
    #[error("unable to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The signing capability failed, was cancelled or timed out
    #[error("unable to sign jws: {0}")]
    Signing(#[source] CapabilityError),
}

/// Any error produced by this crate
#[derive(Error, Debug)]
pub enum Error {
    /// Decoding errors
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// Encoding errors
    #[error(transparent)]
    Encode(#[from] EncodeError),
    /// Validation errors
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Builder errors
    #[error(transparent)]
    Builder(#[from] BuilderError),
}
