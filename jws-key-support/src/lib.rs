#[macro_use]
extern crate log;

use jws::jwk::KeyConstructorSlice;

pub mod ed25519;
pub mod symmetric;

#[cfg(feature = "http")]
pub mod fetch;

/// Every JWS algorithm this crate can verify, ready for
/// [`jws::jwk::JwkParser::new`]
pub const SUPPORTED_KEYS: &KeyConstructorSlice = &[
    (ed25519::EDDSA_ALGORITHM, ed25519::ed25519_from_jwk),
    ("HS256", symmetric::hs256_from_jwk),
    ("HS384", symmetric::hs384_from_jwk),
    ("HS512", symmetric::hs512_from_jwk),
];
