use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{
    crypto::{Context, Signer, Verifier},
    jwk::{Jwk, JwkSet, KeyConstructorSlice},
    serde::{base64url_decode, base64url_encode},
};

type HmacSha256 = Hmac<Sha256>;

/// The symmetric key of RFC 7515 appendix A.1
pub const RFC_HS256_KEY: &str =
    "AyM1SysPpbyDfgZld3umj1qzKObwVMkoqQ-EstJQLr_T-1qS0gZH75aKtMN3Yj0iPS4hcgUuTwjAzZr1Z9CAow";

pub const TEST_KEYS: &KeyConstructorSlice = &[("HS256", hs256_from_jwk)];

/// HMAC SHA-256, signing and verifying with the same key
#[derive(Clone)]
pub struct Hs256Key(pub Vec<u8>);

impl Hs256Key {
    pub fn rfc() -> Self {
        Hs256Key(base64url_decode(RFC_HS256_KEY).unwrap())
    }

    pub fn to_jwk(&self) -> Jwk {
        Jwk::new("oct").with_param("k", base64url_encode(&self.0))
    }

    fn mac(&self, message: &[u8]) -> Result<HmacSha256> {
        let mut mac =
            HmacSha256::new_from_slice(&self.0).map_err(|_| anyhow!("Invalid HMAC key"))?;
        mac.update(message);
        Ok(mac)
    }
}

#[async_trait]
impl Signer for Hs256Key {
    fn algorithm(&self) -> Option<String> {
        Some("HS256".into())
    }

    async fn sign(&self, _ctx: &Context, message: &[u8]) -> Result<Vec<u8>> {
        Ok(self.mac(message)?.finalize().into_bytes().to_vec())
    }
}

#[async_trait]
impl Verifier for Hs256Key {
    async fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        self.mac(message)?
            .verify_slice(signature)
            .map_err(|_| anyhow!("HMAC mismatch"))
    }
}

pub fn hs256_from_jwk(jwk: &Jwk) -> Result<Arc<dyn Verifier>> {
    if jwk.kty != "oct" {
        return Err(anyhow!("Expected an oct key, got {:?}", jwk.kty));
    }
    Ok(Arc::new(Hs256Key(jwk.param_bytes("k")?)))
}

pub fn rfc_key_set(kid: Option<&str>) -> JwkSet {
    let mut jwk = Hs256Key::rfc().to_jwk();
    jwk.kid = kid.map(String::from);
    JwkSet { keys: vec![jwk] }
}

/// Produces the empty signature of an unsecured JWS
pub struct NoneSigner;

#[async_trait]
impl Signer for NoneSigner {
    fn algorithm(&self) -> Option<String> {
        Some("none".into())
    }

    async fn sign(&self, _ctx: &Context, _message: &[u8]) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }
}

/// Declares no algorithm and signs with nothing
pub struct BlankSigner;

#[async_trait]
impl Signer for BlankSigner {
    async fn sign(&self, _ctx: &Context, _message: &[u8]) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }
}

/// A signer that never finishes
pub struct StalledSigner;

#[async_trait]
impl Signer for StalledSigner {
    async fn sign(&self, _ctx: &Context, _message: &[u8]) -> Result<Vec<u8>> {
        futures::future::pending::<()>().await;
        Ok(Vec::new())
    }
}

pub struct FailingSigner;

#[async_trait]
impl Signer for FailingSigner {
    async fn sign(&self, _ctx: &Context, _message: &[u8]) -> Result<Vec<u8>> {
        Err(anyhow!("HSM unavailable"))
    }
}
