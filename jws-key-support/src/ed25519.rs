use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use ed25519_zebra::{
    Signature, SigningKey as Ed25519PrivateKey, VerificationKey as Ed25519PublicKey,
};

use jws::{
    crypto::{Context, Signer, Verifier},
    jwk::Jwk,
    serde::base64url_encode,
};

/// JWA name of the Edwards-curve signature algorithm (RFC 8037)
pub const EDDSA_ALGORITHM: &str = "EdDSA";

#[derive(Clone)]
pub struct Ed25519KeyMaterial(pub Ed25519PublicKey, Option<Ed25519PrivateKey>);

impl Ed25519KeyMaterial {
    /// Generate a fresh key pair
    pub fn generate() -> Self {
        let private_key = Ed25519PrivateKey::new(rand::thread_rng());
        Ed25519KeyMaterial::from_private_key(private_key)
    }

    pub fn from_private_key(private_key: Ed25519PrivateKey) -> Self {
        let public_key = Ed25519PublicKey::from(&private_key);
        Ed25519KeyMaterial(public_key, Some(private_key))
    }

    /// Key material that can verify but not sign
    pub fn from_public_key(public_key: Ed25519PublicKey) -> Self {
        Ed25519KeyMaterial(public_key, None)
    }

    pub fn public_key_bytes(&self) -> &[u8] {
        self.0.as_ref()
    }

    /// The public half as an OKP JSON Web Key (RFC 8037 § 2)
    pub fn to_jwk(&self) -> Jwk {
        Jwk::new("OKP")
            .with_alg(EDDSA_ALGORITHM)
            .with_param("crv", "Ed25519")
            .with_param("x", base64url_encode(self.public_key_bytes()))
    }
}

impl std::fmt::Debug for Ed25519KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519KeyMaterial")
            .field("public_key", &base64url_encode(self.public_key_bytes()))
            .field("can_sign", &self.1.is_some())
            .finish()
    }
}

#[async_trait]
impl Signer for Ed25519KeyMaterial {
    fn algorithm(&self) -> Option<String> {
        Some(EDDSA_ALGORITHM.into())
    }

    async fn sign(&self, _ctx: &Context, payload: &[u8]) -> Result<Vec<u8>> {
        match &self.1 {
            Some(private_key) => {
                let signature = private_key.sign(payload);
                let bytes: [u8; 64] = signature.into();
                Ok(bytes.to_vec())
            }
            None => Err(anyhow!("No private key; cannot sign data")),
        }
    }
}

#[async_trait]
impl Verifier for Ed25519KeyMaterial {
    async fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<()> {
        let signature = Signature::try_from(signature)?;
        self.0
            .verify(&signature, payload)
            .map_err(|error| anyhow!(error))
    }
}

/// Build a verifier from an OKP JWK on the Ed25519 curve
pub fn ed25519_from_jwk(jwk: &Jwk) -> Result<Arc<dyn Verifier>> {
    if jwk.kty != "OKP" {
        return Err(anyhow!("Expected an OKP key, got {:?}", jwk.kty));
    }

    match jwk.param("crv") {
        Some("Ed25519") => (),
        other => return Err(anyhow!("Unsupported OKP curve: {:?}", other)),
    }

    let bytes = jwk.param_bytes("x")?;
    let public_key = Ed25519PublicKey::try_from(bytes.as_slice())?;

    debug!("Parsed Ed25519 verification key from JWK {:?}", jwk.kid);

    Ok(Arc::new(Ed25519KeyMaterial::from_public_key(public_key)))
}
