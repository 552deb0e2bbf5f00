//! Signed JWS objects ready to be sent, and their compact and JSON
//! serializations (RFC 7515 § 7)

use std::fmt;

use log::debug;
use nonempty::NonEmpty;
use serde::Serialize;
use serde_json::Value;

use crate::{
    crypto::{Context, Signer},
    error::{BuilderError, EncodeError},
    header::HeaderMap,
    serde::{base64url_encode, Base64Encode},
};

/// One completed signature. Every field is already in its wire form.
///
/// RFC 7515 § 7.2.1: `protected` and `header` are omitted when empty,
/// `signature` is always present.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SignedSignature {
    #[serde(skip_serializing_if = "String::is_empty")]
    protected: String,
    #[serde(skip_serializing_if = "is_absent")]
    header: Option<HeaderMap>,
    signature: String,
}

fn is_absent(header: &Option<HeaderMap>) -> bool {
    header.as_ref().map_or(true, HeaderMap::is_empty)
}

impl SignedSignature {
    /// The base64url encoded protected header
    pub fn protected_encoded(&self) -> &str {
        &self.protected
    }

    pub fn unprotected(&self) -> Option<&HeaderMap> {
        self.header.as_ref().filter(|header| !header.is_empty())
    }

    /// The base64url encoded signature
    pub fn signature_encoded(&self) -> &str {
        &self.signature
    }
}

/// RFC 7515 § 7.2.2: Flattened JWS JSON Serialization
#[derive(Serialize)]
struct FlattenedJws<'a> {
    payload: &'a str,
    #[serde(flatten)]
    signature: &'a SignedSignature,
}

/// RFC 7515 § 7.2.1: General JWS JSON Serialization
#[derive(Serialize)]
struct GeneralJws<'a> {
    payload: &'a str,
    signatures: Vec<&'a SignedSignature>,
}

/// A JWS with at least one signature, ready to be encoded.
///
/// There is deliberately no way to read headers back out of a `SignedJws`; to
/// inspect a JWS, decode it and run it through a
/// [`crate::validator::Validator`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedJws {
    payload: String,
    signatures: NonEmpty<SignedSignature>,
}

impl SignedJws {
    pub(crate) fn new(payload: String, signature: SignedSignature) -> Self {
        SignedJws {
            payload,
            signatures: NonEmpty::new(signature),
        }
    }

    /// The base64url encoded payload
    pub fn payload_encoded(&self) -> &str {
        &self.payload
    }

    /// Signatures in the order they were added
    pub fn signatures(&self) -> impl Iterator<Item = &SignedSignature> {
        self.signatures.iter()
    }

    pub fn signature_count(&self) -> usize {
        self.signatures.len()
    }

    /// Encodes into the compact string form designed for URL query components
    /// and HTTP headers.
    ///
    /// Compact encoding supports neither more than one signature nor
    /// unprotected headers, and needs a non-empty protected header.
    ///
    /// Implements RFC 7515 § 7.1 Compact Serialization
    pub fn compact_encode(&self) -> Result<String, EncodeError> {
        if self.signatures.len() > 1 {
            return Err(EncodeError::TooManySignatures);
        }

        let signature = self.signatures.first();

        if signature.protected.is_empty() || signature.unprotected().is_some() {
            return Err(EncodeError::BadHeader);
        }

        Ok(format!(
            "{}.{}.{}",
            signature.protected, self.payload, signature.signature
        ))
    }

    /// Encodes into JSON. A single signature uses the flattened
    /// serialization, more than one the general serialization.
    ///
    /// Implements RFC 7515 § 7.2.1 and § 7.2.2 JSON Serializations
    pub fn json_encode(&self) -> Result<Vec<u8>, EncodeError> {
        let encoded = match self.signatures.len() {
            1 => serde_json::to_vec(&FlattenedJws {
                payload: &self.payload,
                signature: self.signatures.first(),
            })?,
            _ => serde_json::to_vec(&GeneralJws {
                payload: &self.payload,
                signatures: self.signatures.iter().collect(),
            })?,
        };

        Ok(encoded)
    }

    /// Sign the payload of this JWS again with another key, appending the new
    /// signature. `headers` become the new signature's protected header.
    pub async fn add_signature<S>(
        &mut self,
        ctx: &Context,
        signer: &S,
        headers: HeaderMap,
    ) -> Result<(), BuilderError>
    where
        S: Signer + ?Sized,
    {
        let signature = sign_entry(ctx, signer, &self.payload, headers, None).await?;
        self.signatures.push(signature);
        Ok(())
    }
}

impl fmt::Display for SignedJws {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Ok(compact) = self.compact_encode() {
            return f.write_str(&compact);
        }

        match self.json_encode() {
            Ok(json) => f.write_str(&String::from_utf8_lossy(&json)),
            Err(_) => Err(fmt::Error),
        }
    }
}

/// Merge `extra` into `protected`, refusing any name that is already present
pub(crate) fn merge_headers(
    mut protected: HeaderMap,
    extra: HeaderMap,
) -> Result<HeaderMap, BuilderError> {
    for (name, value) in extra {
        if protected.contains_key(&name) {
            return Err(BuilderError::DuplicateHeader(name));
        }
        protected.insert(name, value);
    }
    Ok(protected)
}

/// Compute one signature over an already encoded payload, following
/// RFC 7515 § 5.1 steps 3 to 6
pub(crate) async fn sign_entry<S>(
    ctx: &Context,
    signer: &S,
    payload_encoded: &str,
    mut protected: HeaderMap,
    unprotected: Option<HeaderMap>,
) -> Result<SignedSignature, BuilderError>
where
    S: Signer + ?Sized,
{
    if let Some(algorithm) = signer.algorithm() {
        match protected.get("alg") {
            None => {
                protected.insert("alg".into(), Value::from(algorithm));
            }
            Some(Value::String(declared)) if *declared == algorithm => (),
            Some(declared) => {
                return Err(BuilderError::AlgorithmMismatch {
                    header: declared
                        .as_str()
                        .map(String::from)
                        .unwrap_or_else(|| declared.to_string()),
                    signer: algorithm,
                })
            }
        }
    }

    let unprotected = unprotected.filter(|header| !header.is_empty());

    if let Some(header) = &unprotected {
        if let Some(name) = header.keys().find(|name| protected.contains_key(*name)) {
            return Err(BuilderError::DuplicateHeader(name.clone()));
        }
    }

    // An empty protected header is an empty octet sequence, not `{}`
    let protected_encoded = match protected.is_empty() {
        true => String::new(),
        false => protected.jws_base64_encode()?,
    };
    let signing_input = format!("{protected_encoded}.{payload_encoded}");

    let signature = ctx
        .run(signer.sign(ctx, signing_input.as_bytes()))
        .await
        .map_err(BuilderError::Signing)?;

    debug!(
        "Signed JWS entry with {} byte signature over {} byte signing input",
        signature.len(),
        signing_input.len()
    );

    Ok(SignedSignature {
        protected: protected_encoded,
        header: unprotected,
        signature: base64url_encode(signature),
    })
}
