//! Authentication of decoded JWS objects.
//!
//! A [`Policy`] judges one signature entry at a time. The engine in
//! [`validate_each_signature`] walks entries in wire order and the first one
//! a policy accepts produces a [`ValidatedJws`]. Rejections of individual
//! entries are never fatal on their own.

use async_trait::async_trait;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use url::Url;

use crate::{
    crypto::Context,
    error::{PolicyError, ValidationError},
    header::JoseHeader,
    jwk::{KeyLocator, KeyResolver},
    unverified::UnverifiedJws,
};

/// One signature entry as presented to a [`Policy`]
#[derive(Clone, Debug)]
pub struct Candidate<'a> {
    /// Wire index of the entry
    pub index: usize,
    /// Protected and unprotected headers of the entry
    pub header: JoseHeader,
    /// Decoded signature bytes
    pub signature: &'a [u8],
    /// The bytes the signature was computed over, rebuilt from the encoded
    /// segments exactly as received
    pub signing_input: Vec<u8>,
    /// Decoded payload
    pub payload: &'a [u8],
}

/// A strategy for authenticating a single signature entry
#[async_trait]
pub trait Policy: Send + Sync {
    async fn authenticate(&self, candidate: &Candidate<'_>) -> Result<(), PolicyError>;
}

/// Anything that turns an [`UnverifiedJws`] into a [`ValidatedJws`].
///
/// Every [`Policy`] is a validator that accepts the first entry it can
/// authenticate.
#[async_trait]
pub trait Validator {
    async fn validate(&self, jws: UnverifiedJws) -> Result<ValidatedJws, ValidationError>;
}

#[async_trait]
impl<P> Validator for P
where
    P: Policy,
{
    async fn validate(&self, jws: UnverifiedJws) -> Result<ValidatedJws, ValidationError> {
        validate_each_signature(jws, self).await
    }
}

/// Try `policy` against each signature entry in wire order and return the
/// first one it accepts.
///
/// With a single entry its rejection is reported as
/// [`ValidationError::Signature`]. With several, only the fact that none was
/// acceptable is reported.
pub async fn validate_each_signature<P>(
    jws: UnverifiedJws,
    policy: &P,
) -> Result<ValidatedJws, ValidationError>
where
    P: Policy + ?Sized,
{
    let entries = jws.signatures();
    let mut last_error = None;

    for (index, entry) in entries.iter().enumerate() {
        let candidate = Candidate {
            index,
            header: entry.jose_header(),
            signature: entry.signature(),
            signing_input: entry.signing_input(jws.payload_encoded()),
            payload: jws.payload(),
        };

        match policy.authenticate(&candidate).await {
            Ok(()) => {
                debug!("Accepted signature {} of {}", index, entries.len());
                return Ok(ValidatedJws {
                    payload: jws.payload().to_vec(),
                    header: candidate.header,
                    signature: entry.signature().to_vec(),
                    index,
                });
            }
            Err(error) => {
                debug!("Rejected signature {}: {}", index, error);
                last_error = Some(error);
            }
        }
    }

    match (entries.len(), last_error) {
        (1, Some(source)) => Err(ValidationError::Signature { source }),
        _ => Err(ValidationError::NoAcceptableSignature),
    }
}

/// A JWS that passed validation, holding only the entry that was accepted
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedJws {
    payload: Vec<u8>,
    header: JoseHeader,
    signature: Vec<u8>,
    index: usize,
}

impl ValidatedJws {
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Deserialize the payload as JSON
    pub fn payload_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }

    /// Headers of the accepted signature entry
    pub fn header(&self) -> &JoseHeader {
        &self.header
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Wire index of the accepted signature entry
    pub fn index(&self) -> usize {
        self.index
    }
}

/// This policy supports no extensions, so any listed in `crit` are fatal for
/// the entry (RFC 7515 § 4.1.11)
fn reject_critical_extensions(header: &JoseHeader) -> Result<(), PolicyError> {
    match header.critical() {
        Some(critical) if !critical.is_empty() => {
            Err(PolicyError::UnknownCriticalExtension(critical.to_vec()))
        }
        _ => Ok(()),
    }
}

/// Accepts unsecured JWS objects: `alg` of "none" and an empty signature
/// (RFC 7518 § 3.6).
///
/// This authenticates nothing. It exists for tests and diagnostics, and it
/// refuses any entry that carries a real algorithm or signature bytes so that
/// it can never pass a signed JWS off as verified.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoneValidator;

#[async_trait]
impl Policy for NoneValidator {
    async fn authenticate(&self, candidate: &Candidate<'_>) -> Result<(), PolicyError> {
        reject_critical_extensions(&candidate.header)?;

        if candidate.header.algorithm() != Some("none") {
            return Err(PolicyError::NotNone);
        }

        if !candidate.signature.is_empty() {
            return Err(PolicyError::SignaturePresent);
        }

        Ok(())
    }
}

/// Authenticates entries with a key published at the `jku` header's URL.
///
/// Locating and verifying the key is delegated to a [`KeyResolver`]; both run
/// under this validator's [`Context`].
#[derive(Clone, Debug)]
pub struct JwkValidator<R> {
    resolver: R,
    context: Context,
}

impl<R> JwkValidator<R>
where
    R: KeyResolver,
{
    pub fn new(resolver: R) -> Self {
        JwkValidator {
            resolver,
            context: Context::background(),
        }
    }

    /// Bound key resolution and verification by `context`
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    fn locate(header: &JoseHeader) -> Result<KeyLocator, PolicyError> {
        // RFC 7515 § 4.1.1
        let algorithm = header.algorithm().ok_or(PolicyError::NoAlgorithm)?;

        let jku = header.jwk_set_url().ok_or(PolicyError::NoKeyLocator)?;
        let jku = Url::parse(jku).map_err(PolicyError::InvalidKeyLocator)?;

        // RFC 7515 § 4.1.2: the key must be retrieved with integrity protection
        if jku.scheme() != "https" {
            warn!("Refusing jku with scheme {:?}: {}", jku.scheme(), jku);
            return Err(PolicyError::InsecureKeyLocator);
        }

        Ok(KeyLocator {
            jku: Some(jku),
            kid: header.key_id().map(String::from),
            alg: Some(algorithm.to_string()),
        })
    }
}

#[async_trait]
impl<R> Policy for JwkValidator<R>
where
    R: KeyResolver,
{
    async fn authenticate(&self, candidate: &Candidate<'_>) -> Result<(), PolicyError> {
        reject_critical_extensions(&candidate.header)?;

        let locator = Self::locate(&candidate.header)?;

        let verifier = self
            .context
            .run(self.resolver.resolve(&locator))
            .await
            .map_err(PolicyError::KeyResolution)?;

        self.context
            .run(verifier.verify(&candidate.signing_input, candidate.signature))
            .await
            .map_err(PolicyError::Verification)
    }
}
