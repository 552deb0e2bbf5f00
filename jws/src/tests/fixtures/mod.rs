mod keys;
mod vectors;

pub use keys::*;
pub use vectors::*;

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::{
    header::HeaderMap,
    jwk::{JwkSet, JwkSetFetcher},
};

/// Serves JWK Sets from memory and counts how often it was asked
#[derive(Clone, Default)]
pub struct InMemoryFetcher {
    sets: HashMap<Url, JwkSet>,
    fetches: Arc<AtomicUsize>,
    latency: Option<Duration>,
}

impl InMemoryFetcher {
    pub fn new() -> Self {
        InMemoryFetcher::default()
    }

    pub fn publish(mut self, url: &str, keys: JwkSet) -> Self {
        self.sets.insert(Url::parse(url).unwrap(), keys);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// A handle on the fetch counter that outlives the fetcher
    pub fn counter(&self) -> Arc<AtomicUsize> {
        self.fetches.clone()
    }
}

#[async_trait]
impl JwkSetFetcher for InMemoryFetcher {
    async fn fetch(&self, url: &Url) -> Result<JwkSet> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        self.sets
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("404 Not Found: {}", url))
    }
}

pub fn fetch_count(counter: &Arc<AtomicUsize>) -> usize {
    counter.load(Ordering::SeqCst)
}

pub fn headers(value: Value) -> HeaderMap {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}
