use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use url::Url;

use jws::jwk::{JwkSet, JwkSetFetcher};

/// Bound on a single JWK Set request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches JWK Sets over HTTPS. Other schemes are refused before any request
/// is made, and any non-success status is an error.
#[derive(Clone, Debug)]
pub struct HttpJwkSetFetcher {
    client: reqwest::Client,
}

impl HttpJwkSetFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .https_only(true)
            .build()
            .map_err(|error| anyhow!("Failed to create HTTP client: {}", error))?;

        Ok(HttpJwkSetFetcher { client })
    }

    /// Use a preconfigured client, e.g. one with custom roots or proxies
    pub fn with_client(client: reqwest::Client) -> Self {
        HttpJwkSetFetcher { client }
    }
}

#[async_trait]
impl JwkSetFetcher for HttpJwkSetFetcher {
    async fn fetch(&self, url: &Url) -> Result<JwkSet> {
        if url.scheme() != "https" {
            return Err(anyhow!("Refusing to fetch JWK Set over {}", url.scheme()));
        }

        debug!("Fetching JWK Set from {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|error| anyhow!("JWK Set request failed: {}", error))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("JWK Set request to {} returned {}", url, status));
        }

        response
            .json::<JwkSet>()
            .await
            .map_err(|error| anyhow!("Invalid JWK Set from {}: {}", url, error))
    }
}

#[cfg(test)]
mod tests {
    use jws::jwk::JwkSetFetcher;
    use url::Url;

    use super::HttpJwkSetFetcher;

    #[tokio::test]
    async fn it_refuses_plain_http() {
        let fetcher = HttpJwkSetFetcher::new().unwrap();
        let url = Url::parse("http://127.0.0.1:9/jwks.json").unwrap();

        let error = fetcher.fetch(&url).await.unwrap_err();
        assert!(error.to_string().contains("Refusing"));
    }
}
