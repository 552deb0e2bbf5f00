pub mod context;

pub use context::Context;

use anyhow::Result;
use async_trait::async_trait;

/// This trait must be implemented by anything that can produce a raw
/// signature for a JWS: a key held in memory, an HSM, a remote signing
/// service. It is the minimum required API capability for building a signed
/// JWS and says nothing about where the key lives.
#[async_trait]
pub trait Signer: Send + Sync {
    /// The JWA name of the algorithm this signer produces, e.g. "EdDSA".
    /// When provided, the builder declares it as the `alg` header unless one
    /// is already set.
    fn algorithm(&self) -> Option<String> {
        None
    }

    /// Sign some data. Implementations that suspend should observe `ctx` and
    /// give up promptly once it is cancelled.
    async fn sign(&self, ctx: &Context, message: &[u8]) -> Result<Vec<u8>>;
}

/// Verify the alleged signature of some data against a single, already
/// resolved key
#[async_trait]
pub trait Verifier: Send + Sync {
    /// Succeeds only if `signature` is valid over `message`
    async fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()>;
}
