#![warn(missing_debug_implementations, rust_2018_idioms)]

//! JSON Web Signature (RFC 7515) objects.
//!
//! Untrusted input is decoded into an [`unverified::UnverifiedJws`], which
//! exposes nothing as authenticated until a [`validator::Validator`] accepts
//! one of its signatures and produces a [`validator::ValidatedJws`]. Signed
//! objects are assembled with a [`builder::JwsBuilder`] and encoded from the
//! resulting [`signed::SignedJws`] in compact or JSON form.
//!
//! Signing, verification and key lookup are capabilities supplied by the
//! caller through [`crypto::Signer`], [`crypto::Verifier`] and
//! [`jwk::KeyResolver`].

pub mod builder;
pub mod crypto;
pub mod error;
pub mod header;
pub mod jwk;
pub mod serde;
pub mod signed;
pub mod unverified;
pub mod validator;

pub use builder::{BuilderState, JwsBuilder};
pub use error::Error;
pub use header::{Header, HeaderMap, JoseHeader};
pub use signed::SignedJws;
pub use unverified::UnverifiedJws;
pub use validator::{JwkValidator, NoneValidator, ValidatedJws, Validator};

#[cfg(test)]
mod tests;
