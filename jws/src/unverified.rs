//! Decoding of compact, flattened JSON and general JSON encoded JWS objects
//! into an [`UnverifiedJws`], following the structural steps of
//! RFC 7515 § 5.2: Message Signature or MAC Validation.

use std::{convert::TryFrom, str::FromStr};

use log::trace;
use serde::{de::Error as _, Deserialize};

use crate::{
    error::DecodeError,
    header::{Header, JoseHeader},
    serde::{base64url_decode, StrictObject},
};

/// Every JSON member either serialization may carry. Flattened and general
/// members are both accepted here so that mixing them can be detected.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawJws {
    payload: String,
    #[serde(default)]
    protected: Option<String>,
    #[serde(default)]
    header: Option<StrictObject>,
    #[serde(default)]
    signature: Option<String>,
    #[serde(default)]
    signatures: Option<Vec<RawSignature>>,
}

impl RawJws {
    fn has_flattened_members(&self) -> bool {
        self.protected.is_some() || self.header.is_some() || self.signature.is_some()
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSignature {
    #[serde(default)]
    protected: Option<String>,
    #[serde(default)]
    header: Option<StrictObject>,
    signature: String,
}

/// One decoded, not yet authenticated, signature entry
#[derive(Clone, Debug, PartialEq)]
pub struct SignatureEntry {
    protected_encoded: String,
    protected: Header,
    unprotected: Header,
    signature: Vec<u8>,
}

impl SignatureEntry {
    /// The protected header segment exactly as it appeared on the wire
    pub fn protected_encoded(&self) -> &str {
        &self.protected_encoded
    }

    pub fn protected(&self) -> &Header {
        &self.protected
    }

    pub fn unprotected(&self) -> &Header {
        &self.unprotected
    }

    /// Both headers, for reading registered members regardless of where they
    /// were placed
    pub fn jose_header(&self) -> JoseHeader {
        JoseHeader::new(self.protected.clone(), self.unprotected.clone())
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// `ASCII(BASE64URL(protected) || '.' || BASE64URL(payload))`, using the
    /// segments as received
    pub fn signing_input(&self, payload_encoded: &str) -> Vec<u8> {
        let mut input =
            Vec::with_capacity(self.protected_encoded.len() + 1 + payload_encoded.len());
        input.extend_from_slice(self.protected_encoded.as_bytes());
        input.push(b'.');
        input.extend_from_slice(payload_encoded.as_bytes());
        input
    }
}

/// A structurally valid JWS whose signatures have not been checked.
///
/// Nothing here is authenticated. Hand it to a
/// [`crate::validator::Validator`] to obtain a
/// [`crate::validator::ValidatedJws`].
#[derive(Clone, Debug, PartialEq)]
pub struct UnverifiedJws {
    payload_encoded: String,
    payload: Vec<u8>,
    signatures: Vec<SignatureEntry>,
}

impl UnverifiedJws {
    /// Decode a JWS in any serialization. Input starting with `{` (after
    /// optional whitespace) is JSON; anything else must be a compact token
    /// with no surrounding whitespace.
    pub fn parse(encoded: &[u8]) -> Result<Self, DecodeError> {
        if encoded.is_empty() {
            return Err(DecodeError::EmptyInput);
        }

        let first = encoded
            .iter()
            .position(|byte| !byte.is_ascii_whitespace())
            .ok_or(DecodeError::EmptyInput)?;

        if encoded[first] == b'{' {
            trace!("Decoding JWS as JSON serialization");
            return Self::decode_json(encoded);
        }

        if first > 0 {
            return Err(DecodeError::LeadingWhitespace);
        }

        trace!("Decoding JWS as compact serialization");
        Self::decode_compact(encoded)
    }

    fn decode_compact(encoded: &[u8]) -> Result<Self, DecodeError> {
        let parts: Vec<&[u8]> = encoded.split(|byte| *byte == b'.').collect();

        let [protected, payload, signature] = parts.as_slice() else {
            return Err(DecodeError::InvalidCompactEncoding);
        };

        // Segments that are not ASCII cannot be base64url either; the lossy
        // conversion only ever feeds the base64 decoder an invalid string
        let segment = |bytes: &[u8]| String::from_utf8_lossy(bytes).into_owned();

        Self::from_raw_entries(
            segment(*payload),
            vec![RawSignature {
                protected: Some(segment(*protected)),
                header: None,
                signature: segment(*signature),
            }],
        )
    }

    fn decode_json(encoded: &[u8]) -> Result<Self, DecodeError> {
        // while not required by the standard, objects carrying members
        // outside the two serializations are refused
        let mut raw: RawJws = serde_json::from_slice(encoded).map_err(DecodeError::Json)?;

        let entries = match raw.signatures.take() {
            Some(signatures) if !signatures.is_empty() => {
                if raw.has_flattened_members() {
                    return Err(DecodeError::MixedSerialization);
                }
                signatures
            }
            _ => {
                let signature = raw.signature.ok_or_else(|| {
                    DecodeError::Json(serde_json::Error::missing_field("signature"))
                })?;

                vec![RawSignature {
                    protected: raw.protected,
                    header: raw.header,
                    signature,
                }]
            }
        };

        Self::from_raw_entries(raw.payload, entries)
    }

    /// The checks shared by every serialization: RFC 7515 § 5.2 steps 2 to 7,
    /// applied to each signature entry in order
    fn from_raw_entries(
        payload_encoded: String,
        entries: Vec<RawSignature>,
    ) -> Result<Self, DecodeError> {
        let payload = base64url_decode(&payload_encoded).map_err(DecodeError::PayloadEncoding)?;

        let signatures = entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| decode_entry(index, entry))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(UnverifiedJws {
            payload_encoded,
            payload,
            signatures,
        })
    }

    /// The decoded payload bytes
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The payload segment exactly as it appeared on the wire
    pub fn payload_encoded(&self) -> &str {
        &self.payload_encoded
    }

    /// Signature entries in wire order
    pub fn signatures(&self) -> &[SignatureEntry] {
        &self.signatures
    }
}

fn decode_entry(index: usize, entry: RawSignature) -> Result<SignatureEntry, DecodeError> {
    let protected_encoded = entry.protected.unwrap_or_default();

    let protected_bytes = base64url_decode(&protected_encoded)
        .map_err(|source| DecodeError::ProtectedHeaderEncoding { index, source })?;

    // An absent protected header is an empty one
    let protected_raw = match protected_bytes.is_empty() {
        true => Default::default(),
        false => serde_json::from_slice::<StrictObject>(&protected_bytes)
            .map_err(|source| DecodeError::ProtectedHeaderJson { index, source })?
            .0,
    };

    let unprotected_raw = entry.header.unwrap_or_default().0;

    if let Some(name) = unprotected_raw
        .keys()
        .find(|name| protected_raw.contains_key(*name))
    {
        return Err(DecodeError::DuplicateHeader {
            index,
            name: name.clone(),
        });
    }

    if protected_raw.is_empty() && unprotected_raw.is_empty() {
        return Err(DecodeError::EmptyHeader { index });
    }

    let signature = base64url_decode(&entry.signature)
        .map_err(|source| DecodeError::SignatureEncoding { index, source })?;

    let protected = Header::decode(protected_raw)
        .map_err(|source| DecodeError::RegisteredHeaderType { index, source })?;
    let unprotected = Header::decode(unprotected_raw)
        .map_err(|source| DecodeError::RegisteredHeaderType { index, source })?;

    Ok(SignatureEntry {
        protected_encoded,
        protected,
        unprotected,
        signature,
    })
}

impl FromStr for UnverifiedJws {
    type Err = DecodeError;

    fn from_str(encoded: &str) -> Result<Self, Self::Err> {
        UnverifiedJws::parse(encoded.as_bytes())
    }
}

impl<'a> TryFrom<&'a str> for UnverifiedJws {
    type Error = DecodeError;

    fn try_from(encoded: &'a str) -> Result<Self, Self::Error> {
        UnverifiedJws::parse(encoded.as_bytes())
    }
}

impl<'a> TryFrom<&'a [u8]> for UnverifiedJws {
    type Error = DecodeError;

    fn try_from(encoded: &'a [u8]) -> Result<Self, Self::Error> {
        UnverifiedJws::parse(encoded)
    }
}
