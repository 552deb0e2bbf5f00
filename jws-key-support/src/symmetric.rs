use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use hmac::{digest::KeyInit, Hmac, Mac};
use sha2::{Sha256, Sha384, Sha512};

use jws::{
    crypto::{Context, Signer, Verifier},
    jwk::Jwk,
    serde::base64url_encode,
};

/// The HMAC algorithms of RFC 7518 § 3.2
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HmacAlgorithm {
    Hs256,
    Hs384,
    Hs512,
}

impl HmacAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            HmacAlgorithm::Hs256 => "HS256",
            HmacAlgorithm::Hs384 => "HS384",
            HmacAlgorithm::Hs512 => "HS512",
        }
    }

    /// A key must be at least as long as the hash output
    pub fn minimum_key_length(&self) -> usize {
        match self {
            HmacAlgorithm::Hs256 => 32,
            HmacAlgorithm::Hs384 => 48,
            HmacAlgorithm::Hs512 => 64,
        }
    }
}

/// A shared secret used to both produce and check HMAC signatures
#[derive(Clone)]
pub struct HmacKeyMaterial {
    algorithm: HmacAlgorithm,
    secret: Vec<u8>,
}

impl HmacKeyMaterial {
    pub fn new(algorithm: HmacAlgorithm, secret: impl Into<Vec<u8>>) -> Result<Self> {
        let secret = secret.into();

        if secret.len() < algorithm.minimum_key_length() {
            return Err(anyhow!(
                "{} needs a key of at least {} bytes, got {}",
                algorithm.name(),
                algorithm.minimum_key_length(),
                secret.len()
            ));
        }

        Ok(HmacKeyMaterial { algorithm, secret })
    }

    pub fn algorithm(&self) -> HmacAlgorithm {
        self.algorithm
    }

    /// The secret as an `oct` JSON Web Key (RFC 7518 § 6.4)
    pub fn to_jwk(&self) -> Jwk {
        Jwk::new("oct")
            .with_alg(self.algorithm.name())
            .with_param("k", base64url_encode(&self.secret))
    }
}

impl std::fmt::Debug for HmacKeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacKeyMaterial")
            .field("algorithm", &self.algorithm)
            .field("secret", &"<redacted>")
            .finish()
    }
}

fn mac<M: Mac + KeyInit>(secret: &[u8], message: &[u8]) -> Result<M> {
    let mut mac =
        <M as KeyInit>::new_from_slice(secret).map_err(|_| anyhow!("Invalid HMAC key"))?;
    mac.update(message);
    Ok(mac)
}

fn sign_with<M: Mac + KeyInit>(secret: &[u8], message: &[u8]) -> Result<Vec<u8>> {
    Ok(mac::<M>(secret, message)?.finalize().into_bytes().to_vec())
}

fn verify_with<M: Mac + KeyInit>(secret: &[u8], message: &[u8], signature: &[u8]) -> Result<()> {
    mac::<M>(secret, message)?
        .verify_slice(signature)
        .map_err(|_| anyhow!("HMAC does not match"))
}

#[async_trait]
impl Signer for HmacKeyMaterial {
    fn algorithm(&self) -> Option<String> {
        Some(self.algorithm.name().into())
    }

    async fn sign(&self, _ctx: &Context, message: &[u8]) -> Result<Vec<u8>> {
        match self.algorithm {
            HmacAlgorithm::Hs256 => sign_with::<Hmac<Sha256>>(&self.secret, message),
            HmacAlgorithm::Hs384 => sign_with::<Hmac<Sha384>>(&self.secret, message),
            HmacAlgorithm::Hs512 => sign_with::<Hmac<Sha512>>(&self.secret, message),
        }
    }
}

#[async_trait]
impl Verifier for HmacKeyMaterial {
    async fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        match self.algorithm {
            HmacAlgorithm::Hs256 => verify_with::<Hmac<Sha256>>(&self.secret, message, signature),
            HmacAlgorithm::Hs384 => verify_with::<Hmac<Sha384>>(&self.secret, message, signature),
            HmacAlgorithm::Hs512 => verify_with::<Hmac<Sha512>>(&self.secret, message, signature),
        }
    }
}

fn hmac_from_jwk(algorithm: HmacAlgorithm, jwk: &Jwk) -> Result<Arc<dyn Verifier>> {
    if jwk.kty != "oct" {
        return Err(anyhow!("Expected an oct key, got {:?}", jwk.kty));
    }

    let key = HmacKeyMaterial::new(algorithm, jwk.param_bytes("k")?)?;

    debug!("Parsed {} key from JWK {:?}", algorithm.name(), jwk.kid);

    Ok(Arc::new(key))
}

pub fn hs256_from_jwk(jwk: &Jwk) -> Result<Arc<dyn Verifier>> {
    hmac_from_jwk(HmacAlgorithm::Hs256, jwk)
}

pub fn hs384_from_jwk(jwk: &Jwk) -> Result<Arc<dyn Verifier>> {
    hmac_from_jwk(HmacAlgorithm::Hs384, jwk)
}

pub fn hs512_from_jwk(jwk: &Jwk) -> Result<Arc<dyn Verifier>> {
    hmac_from_jwk(HmacAlgorithm::Hs512, jwk)
}

#[cfg(test)]
mod tests {
    use super::{hs256_from_jwk, hs512_from_jwk, HmacAlgorithm, HmacKeyMaterial};
    use jws::{
        crypto::{Context, Signer, Verifier},
        jwk::Jwk,
        serde::base64url_decode,
    };

    // RFC 7515 appendix A.1
    const RFC_KEY: &str =
        "AyM1SysPpbyDfgZld3umj1qzKObwVMkoqQ-EstJQLr_T-1qS0gZH75aKtMN3Yj0iPS4hcgUuTwjAzZr1Z9CAow";
    const RFC_SIGNING_INPUT: &str = concat!(
        "eyJ0eXAiOiJKV1QiLA0KICJhbGciOiJIUzI1NiJ9",
        ".",
        "eyJpc3MiOiJqb2UiLA0KICJleHAiOjEzMDA4MTkzODAsDQogImh0dHA6Ly9leGFtcGxlLmNvbS9pc19yb290Ijp0cnVlfQ"
    );
    const RFC_SIGNATURE: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";

    fn rfc_key() -> HmacKeyMaterial {
        HmacKeyMaterial::new(HmacAlgorithm::Hs256, base64url_decode(RFC_KEY).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn it_reproduces_the_rfc_signature() {
        let signature = rfc_key()
            .sign(&Context::background(), RFC_SIGNING_INPUT.as_bytes())
            .await
            .unwrap();

        assert_eq!(signature, base64url_decode(RFC_SIGNATURE).unwrap());
    }

    #[tokio::test]
    async fn it_can_sign_and_verify_with_every_algorithm() {
        for algorithm in [
            HmacAlgorithm::Hs256,
            HmacAlgorithm::Hs384,
            HmacAlgorithm::Hs512,
        ] {
            let key = HmacKeyMaterial::new(algorithm, vec![7u8; 64]).unwrap();
            let signature = key.sign(&Context::background(), b"data").await.unwrap();

            assert_eq!(signature.len(), algorithm.minimum_key_length());
            key.verify(b"data", &signature).await.unwrap();
            assert!(key.verify(b"other", &signature).await.is_err());
        }
    }

    #[test]
    fn it_refuses_short_secrets() {
        assert!(HmacKeyMaterial::new(HmacAlgorithm::Hs256, vec![1u8; 31]).is_err());
        assert!(HmacKeyMaterial::new(HmacAlgorithm::Hs512, vec![1u8; 63]).is_err());
    }

    #[tokio::test]
    async fn it_round_trips_through_a_jwk() {
        let key = rfc_key();
        let jwk = key.to_jwk();

        assert_eq!(jwk.kty, "oct");
        assert_eq!(jwk.alg.as_deref(), Some("HS256"));

        let verifier = hs256_from_jwk(&jwk).unwrap();
        verifier
            .verify(
                RFC_SIGNING_INPUT.as_bytes(),
                &base64url_decode(RFC_SIGNATURE).unwrap(),
            )
            .await
            .unwrap();
    }

    #[test]
    fn it_rejects_unsuitable_jwks() {
        let k = rfc_key().to_jwk().params["k"].clone();

        let wrong_type = Jwk::new("OKP").with_param("k", k.clone());
        assert!(hs256_from_jwk(&wrong_type).is_err());

        let short = Jwk::new("oct").with_param("k", "AAAA");
        assert!(hs256_from_jwk(&short).is_err());
        assert!(hs512_from_jwk(&Jwk::new("oct").with_param("k", k)).is_ok());
    }
}
