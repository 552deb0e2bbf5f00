use std::io;

use log::warn;
use serde::Serialize;
use serde_json::Value;

use crate::{
    crypto::{Context, Signer},
    error::BuilderError,
    header::HeaderMap,
    serde::base64url_encode,
    signed::{merge_headers, sign_entry, SignedJws},
};

/// Where a [`JwsBuilder`] is in its lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BuilderState {
    /// Payload and headers may still change
    #[default]
    Open,
    /// At least one signature has been produced. Payload and headers are
    /// frozen; only signing and adding signatures remain possible.
    Signed,
}

impl BuilderState {
    /// Whether payload and header mutators are accepted in this state
    pub fn accepts_mutation(&self) -> bool {
        matches!(self, BuilderState::Open)
    }
}

/// A builder API for JWS objects signed by your application.
///
/// Attempting to modify headers or payload after the first call to
/// [`JwsBuilder::sign`] produces [`BuilderError::AlreadySigned`]. Use separate
/// builders for different payloads.
///
/// Calling `sign` repeatedly with different signers creates independent JWS
/// objects over the same payload, each signed with one key. To create a
/// single JWS signed with multiple keys, use [`JwsBuilder::add_signature`] or
/// [`SignedJws::add_signature`] on the JWS created by `sign`.
///
/// The default value is a builder ready for use.
///
/// Implements RFC 7515 § 5.1 Message Signature or MAC Computation.
#[derive(Clone, Debug, Default)]
pub struct JwsBuilder {
    payload: Vec<u8>,
    protected: HeaderMap,
    unprotected: HeaderMap,
    state: BuilderState,
}

impl JwsBuilder {
    pub fn new() -> Self {
        JwsBuilder::default()
    }

    pub fn state(&self) -> BuilderState {
        self.state
    }

    fn ensure_open(&self) -> Result<(), BuilderError> {
        match self.state.accepts_mutation() {
            true => Ok(()),
            false => Err(BuilderError::AlreadySigned),
        }
    }

    /// Append the given data to the payload.
    pub fn write(&mut self, data: &[u8]) -> Result<usize, BuilderError> {
        self.ensure_open()?;
        self.payload.extend_from_slice(data);
        Ok(data.len())
    }

    /// Append the given string to the payload.
    pub fn write_str(&mut self, data: &str) -> Result<usize, BuilderError> {
        self.write(data.as_bytes())
    }

    /// Set the payload, discarding anything previously written. An empty
    /// payload is valid.
    pub fn set_payload(&mut self, payload: impl Into<Vec<u8>>) -> Result<(), BuilderError> {
        self.ensure_open()?;
        self.payload = payload.into();
        Ok(())
    }

    /// Set the payload to the JSON serialization of `payload`, discarding
    /// anything previously written.
    pub fn set_payload_object<T>(&mut self, payload: &T) -> Result<(), BuilderError>
    where
        T: Serialize + ?Sized,
    {
        self.ensure_open()?;
        let payload = serde_json::to_vec(payload)?;
        self.set_payload(payload)
    }

    /// Set a protected header. Setting a name again replaces its value.
    pub fn set_header<T>(&mut self, name: impl Into<String>, value: T) -> Result<(), BuilderError>
    where
        T: Serialize,
    {
        self.ensure_open()?;
        let value = serde_json::to_value(value)?;
        self.protected.insert(name.into(), value);
        Ok(())
    }

    /// Set an unprotected header on the signature produced by
    /// [`JwsBuilder::sign`]. Unprotected headers are not covered by the
    /// signature, and a JWS carrying any cannot use compact encoding.
    pub fn set_unprotected_header<T>(
        &mut self,
        name: impl Into<String>,
        value: T,
    ) -> Result<(), BuilderError>
    where
        T: Serialize,
    {
        self.ensure_open()?;
        let value = serde_json::to_value(value)?;
        self.unprotected.insert(name.into(), value);
        Ok(())
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.protected.contains_key(name)
    }

    pub fn header(&self, name: &str) -> Option<&Value> {
        self.protected.get(name)
    }

    /// Sign the payload and protected headers, producing a new [`SignedJws`].
    ///
    /// `extra` headers are added to the protected header of this signature
    /// only; naming a header that was already set is an error rather than an
    /// override. After the first successful call the builder is
    /// [`BuilderState::Signed`].
    pub async fn sign<S>(
        &mut self,
        ctx: &Context,
        signer: &S,
        extra: HeaderMap,
    ) -> Result<SignedJws, BuilderError>
    where
        S: Signer + ?Sized,
    {
        // 5.1.1 and 5.1.2: the payload and its encoded form
        let payload = base64url_encode(&self.payload);

        // 5.1.3 and 5.1.4: the JOSE header, no name defined twice
        let protected = merge_headers(self.protected.clone(), extra)?;
        let unprotected = Some(self.unprotected.clone());

        let signature = sign_entry(ctx, signer, &payload, protected, unprotected).await?;

        if self.state == BuilderState::Open {
            self.state = BuilderState::Signed;
        }

        Ok(SignedJws::new(payload, signature))
    }

    /// Add another signature over the same payload to a [`SignedJws`], using
    /// this builder's protected headers merged with `extra`. Accepted in
    /// either state.
    pub async fn add_signature<S>(
        &self,
        ctx: &Context,
        jws: &mut SignedJws,
        signer: &S,
        extra: HeaderMap,
    ) -> Result<(), BuilderError>
    where
        S: Signer + ?Sized,
    {
        let headers = merge_headers(self.protected.clone(), extra)?;
        jws.add_signature(ctx, signer, headers).await
    }
}

impl io::Write for JwsBuilder {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        JwsBuilder::write(self, buf).map_err(|error| {
            warn!("Rejected payload write: {}", error);
            io::Error::new(io::ErrorKind::Other, error)
        })
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
