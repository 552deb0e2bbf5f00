//! JSON Web Keys (RFC 7517) and the contract for turning a JWS key locator
//! into a [`Verifier`].

pub mod cache;

pub use cache::{CachingKeyResolver, JwkSetFetcher, DEFAULT_CACHE_TTL};

use std::{collections::BTreeMap, sync::Arc};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::{crypto::Verifier, serde::base64url_decode};

/// A JSON Web Key. Parameters specific to a key type (`crv`, `x`, `n`, `k`
/// and so on) are kept in `params`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_ops: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl Jwk {
    pub fn new(kty: impl Into<String>) -> Self {
        Jwk {
            kty: kty.into(),
            key_use: None,
            key_ops: None,
            alg: None,
            kid: None,
            params: Map::new(),
        }
    }

    pub fn with_alg(mut self, alg: impl Into<String>) -> Self {
        self.alg = Some(alg.into());
        self
    }

    pub fn with_kid(mut self, kid: impl Into<String>) -> Self {
        self.kid = Some(kid.into());
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// A string valued key parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(Value::as_str)
    }

    /// A base64url encoded key parameter, decoded
    pub fn param_bytes(&self, name: &str) -> Result<Vec<u8>> {
        let encoded = self
            .param(name)
            .ok_or_else(|| anyhow!("JWK is missing the {:?} parameter", name))?;
        Ok(base64url_decode(encoded)?)
    }
}

/// A JSON Web Key Set
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    pub fn find_key(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|key| key.kid.as_deref() == Some(kid))
    }

    /// The key a locator refers to: the one with its `kid` when it names one,
    /// otherwise the first key usable with its `alg`
    pub fn select(&self, locator: &KeyLocator) -> Option<&Jwk> {
        match &locator.kid {
            Some(kid) => self.find_key(kid),
            None => self.keys.iter().find(|key| match (&key.alg, &locator.alg) {
                (Some(key_alg), Some(alg)) => key_alg == alg,
                _ => true,
            }),
        }
    }
}

/// Everything a JWS header says about where its verification key lives
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct KeyLocator {
    /// The "jku" header, already parsed
    pub jku: Option<Url>,
    /// The "kid" header
    pub kid: Option<String>,
    /// The "alg" header
    pub alg: Option<String>,
}

/// The key subsystem: finds the key a locator points to and produces a
/// verifier for it
#[async_trait]
pub trait KeyResolver: Send + Sync {
    async fn resolve(&self, locator: &KeyLocator) -> Result<Arc<dyn Verifier>>;
}

#[async_trait]
impl<T> KeyResolver for Arc<T>
where
    T: KeyResolver + ?Sized,
{
    async fn resolve(&self, locator: &KeyLocator) -> Result<Arc<dyn Verifier>> {
        self.as_ref().resolve(locator).await
    }
}

pub type JwkToVerifier = fn(&Jwk) -> Result<Arc<dyn Verifier>>;
pub type KeyConstructors = BTreeMap<&'static str, JwkToVerifier>;
pub type KeyConstructorSlice = [(&'static str, JwkToVerifier)];

/// A parser that is able to convert a [`Jwk`] into a [`Verifier`]. The parser
/// matches the JWS algorithm to a constructor function registered for it.
#[derive(Clone)]
pub struct JwkParser {
    key_constructors: KeyConstructors,
}

impl JwkParser {
    pub fn new(key_constructor_slice: &KeyConstructorSlice) -> Self {
        let mut key_constructors = BTreeMap::new();
        for pair in key_constructor_slice {
            key_constructors.insert(pair.0, pair.1);
        }
        JwkParser { key_constructors }
    }

    pub fn supports(&self, alg: &str) -> bool {
        self.key_constructors.contains_key(alg)
    }

    /// Build a verifier for `jwk` to be used with algorithm `alg`. A key that
    /// declares its own algorithm must declare this one.
    pub fn parse(&self, jwk: &Jwk, alg: &str) -> Result<Arc<dyn Verifier>> {
        if let Some(key_alg) = &jwk.alg {
            if key_alg != alg {
                return Err(anyhow!(
                    "JWK is for algorithm {:?}, not {:?}",
                    key_alg,
                    alg
                ));
            }
        }

        match self.key_constructors.get(alg) {
            Some(ctor) => ctor(jwk),
            None => Err(anyhow!("Unsupported algorithm: {:?}", alg)),
        }
    }
}

impl std::fmt::Debug for JwkParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwkParser")
            .field("algorithms", &self.key_constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}
