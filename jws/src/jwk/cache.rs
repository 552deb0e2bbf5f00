use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{debug, warn};
use tokio::{sync::Mutex, time::Instant};
use url::Url;

use super::{JwkParser, JwkSet, KeyLocator, KeyResolver};
use crate::crypto::Verifier;

/// How long a fetched JWK Set is trusted before it is fetched again
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Retrieves the JWK Set published at a URL
#[async_trait]
pub trait JwkSetFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<JwkSet>;
}

struct CachedSet {
    keys: Arc<JwkSet>,
    fetched_at: Instant,
}

impl CachedSet {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

type Slot = Arc<Mutex<Option<CachedSet>>>;

/// A [`KeyResolver`] for keys published at the `jku` URL of a JWS.
///
/// Each JWK Set is cached per URL for a fixed time to live. Resolutions of a
/// URL that is not cached, or whose entry expired, wait on a single fetch.
/// Failed fetches are not cached, and expired sets are swept whenever a new
/// URL is seen, so URLs taken from untrusted tokens cannot grow the cache
/// beyond the sets that are actually fresh.
pub struct CachingKeyResolver<F> {
    fetcher: F,
    parser: JwkParser,
    ttl: Duration,
    slots: Mutex<HashMap<Url, Slot>>,
}

impl<F> std::fmt::Debug for CachingKeyResolver<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingKeyResolver")
            .field("parser", &self.parser)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl<F> CachingKeyResolver<F>
where
    F: JwkSetFetcher,
{
    pub fn new(fetcher: F, parser: JwkParser) -> Self {
        CachingKeyResolver {
            fetcher,
            parser,
            ttl: DEFAULT_CACHE_TTL,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Forget the cached set for `url`, if any
    pub async fn invalidate(&self, url: &Url) {
        self.slots.lock().await.remove(url);
    }

    /// Forget every cached set
    pub async fn clear(&self) {
        self.slots.lock().await.clear();
    }

    /// Number of URLs with a cached or in-flight JWK Set
    pub async fn cached_urls(&self) -> usize {
        self.slots.lock().await.len()
    }

    async fn slot(&self, url: &Url) -> Slot {
        let mut slots = self.slots.lock().await;

        if let Some(slot) = slots.get(url) {
            return slot.clone();
        }

        // Slots locked by someone are in flight and stay
        let ttl = self.ttl;
        slots.retain(|_, slot| match slot.try_lock() {
            Ok(cached) => cached.as_ref().map_or(false, |entry| entry.is_fresh(ttl)),
            Err(_) => true,
        });

        let slot = Slot::default();
        slots.insert(url.clone(), slot.clone());
        slot
    }

    async fn evict(&self, url: &Url, slot: &Slot) {
        let mut slots = self.slots.lock().await;
        if slots.get(url).map_or(false, |current| Arc::ptr_eq(current, slot)) {
            slots.remove(url);
        }
    }

    /// The JWK Set published at `url`, from the cache while it is fresh
    pub async fn key_set(&self, url: &Url) -> Result<Arc<JwkSet>> {
        if url.scheme() != "https" {
            warn!("Refusing to fetch JWK Set over {}: {}", url.scheme(), url);
            return Err(anyhow!("JWK Set URL does not use https: {}", url));
        }

        let slot = self.slot(url).await;

        // Holding the slot across the fetch makes concurrent callers wait for
        // its result instead of fetching again
        let mut cached = slot.lock().await;

        if let Some(entry) = cached.as_ref() {
            if entry.is_fresh(self.ttl) {
                debug!("JWK Set cache hit for {}", url);
                return Ok(entry.keys.clone());
            }
            debug!("JWK Set cache entry expired for {}", url);
        } else {
            debug!("JWK Set cache miss for {}", url);
        }

        let keys = match self.fetcher.fetch(url).await {
            Ok(keys) => Arc::new(keys),
            Err(error) => {
                warn!("Failed to fetch JWK Set from {}: {}", url, error);
                *cached = None;
                self.evict(url, &slot).await;
                return Err(error);
            }
        };

        *cached = Some(CachedSet {
            keys: keys.clone(),
            fetched_at: Instant::now(),
        });

        Ok(keys)
    }
}

#[async_trait]
impl<F> KeyResolver for CachingKeyResolver<F>
where
    F: JwkSetFetcher,
{
    async fn resolve(&self, locator: &KeyLocator) -> Result<Arc<dyn Verifier>> {
        let url = locator
            .jku
            .as_ref()
            .ok_or_else(|| anyhow!("No JWK Set URL to resolve a key from"))?;

        let keys = self.key_set(url).await?;

        let jwk = keys.select(locator).ok_or_else(|| match &locator.kid {
            Some(kid) => anyhow!("No key with kid {:?} in JWK Set at {}", kid, url),
            None => anyhow!("No suitable key in JWK Set at {}", url),
        })?;

        let alg = locator
            .alg
            .as_deref()
            .or(jwk.alg.as_deref())
            .ok_or_else(|| anyhow!("Neither the JWS nor the JWK names an algorithm"))?;

        self.parser.parse(jwk, alg)
    }
}
