//! `reqwest`-backed fetcher with a shared concurrency gate.

use std::sync::Arc;

use async_trait::async_trait;
use http::header::CONTENT_TYPE;
use reqwest::{Certificate, Client, Proxy};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::error::{FetcherBuildError, ProxyError};
use crate::settings::Settings;

use super::{resolve_url, FetchResult, SourceFetcher};

const FETCH_FAILED: &str = "Failed to fetch image";

/// Outbound HTTP fetcher.
///
/// At most `max_requests` fetches are in flight at once; further callers
/// wait for a permit in arrival order instead of failing.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    permits: Arc<Semaphore>,
    base_url: Option<String>,
}

impl std::fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("available_permits", &self.permits.available_permits())
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl HttpFetcher {
    /// Build a fetcher from the network settings.
    pub fn new(settings: &Settings) -> Result<Self, FetcherBuildError> {
        let mut builder = Client::builder()
            .timeout(settings.timeout)
            .danger_accept_invalid_certs(!settings.validate_cert);

        if let Some(agent) = &settings.user_agent {
            builder = builder.user_agent(agent.clone());
        }

        if let Some(path) = &settings.ca_certs {
            let pem = std::fs::read(path).map_err(|e| FetcherBuildError::CaBundle {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            let certs =
                Certificate::from_pem_bundle(&pem).map_err(|e| FetcherBuildError::CaBundle {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
            for cert in certs {
                builder = builder.add_root_certificate(cert);
            }
        }

        if let Some(host) = &settings.proxy_host {
            let proxy_url = match settings.proxy_port {
                Some(port) => format!("http://{}:{}", host, port),
                None => format!("http://{}", host),
            };
            let proxy =
                Proxy::all(&proxy_url).map_err(|e| FetcherBuildError::Proxy(e.to_string()))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| FetcherBuildError::Client(e.to_string()))?;

        Ok(Self {
            client,
            permits: Arc::new(Semaphore::new(settings.max_requests.max(1))),
            base_url: settings.implicit_base_url.clone(),
        })
    }

    /// Permits currently free (fetch slots not in use).
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResult, ProxyError> {
        let Some(target) = resolve_url(url, self.base_url.as_deref()) else {
            warn!(url = %url, "Fetch error: cannot resolve url");
            return Err(ProxyError::Fetch(FETCH_FAILED.to_string()));
        };

        let _permit = self.permits.acquire().await.map_err(|e| {
            warn!(url = %url, error = %e, "Fetch error: concurrency gate closed");
            ProxyError::Fetch(FETCH_FAILED.to_string())
        })?;

        debug!(url = %target, "Fetching source image");

        let response = self.client.get(target.clone()).send().await.map_err(|e| {
            warn!(url = %url, error = %e, "Fetch error");
            ProxyError::Fetch(FETCH_FAILED.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "Fetch error: upstream status");
            return Err(ProxyError::Fetch(FETCH_FAILED.to_string()));
        }

        let headers = response.headers().clone();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let body = response.bytes().await.map_err(|e| {
            warn!(url = %url, error = %e, "Fetch error: reading body");
            ProxyError::Fetch(FETCH_FAILED.to_string())
        })?;

        debug!(url = %target, bytes = body.len(), "Fetched source image");

        Ok(FetchResult {
            body,
            headers,
            content_type,
        })
    }
}
