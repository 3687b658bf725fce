//! Freshness-aware fetch seam and the bundled HTTP transport.
//!
//! [`Transport::request_newer`] models one fetch against a possibly
//! unchanged resource: `Ok(None)` means the server confirmed the cached
//! copy is still current. [`HttpTransport`] implements the seam with
//! reqwest, remembering `ETag`/`Last-Modified` validators per URL and
//! replaying them as conditional request headers.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{
    ACCEPT, CACHE_CONTROL, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED,
};
use tokio::sync::Mutex;
use tracing::debug;

/// Cache behavior for one fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Allow a conditional request; an unchanged resource yields no body.
    Revalidate,
    /// Skip validators and ask intermediaries for a fresh copy.
    Bypass,
}

/// Per-request options, merged caller-over-callee.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Cache behavior; callee defaults apply when unset.
    pub mode: Option<FetchMode>,
    /// `Accept` header value.
    pub accept: Option<String>,
}

impl FetchOptions {
    /// Options forcing a cache-bypassing fetch.
    pub fn bypass() -> Self {
        Self {
            mode: Some(FetchMode::Bypass),
            accept: None,
        }
    }

    /// Layer `self` over `base`; fields set here win.
    pub fn merged_over(&self, base: &FetchOptions) -> FetchOptions {
        FetchOptions {
            mode: self.mode.or(base.mode),
            accept: self.accept.clone().or_else(|| base.accept.clone()),
        }
    }
}

/// A fetched response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// Body text.
    pub data: String,
}

/// A failed fetch, with enough structure for status formatting.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    /// The URL that failed.
    pub url: String,
    /// HTTP status, when the server answered at all.
    pub status: Option<u16>,
    /// Failure description.
    pub message: String,
}

impl TransportError {
    pub(crate) fn http(url: &str, status: u16) -> Self {
        Self {
            url: url.to_owned(),
            status: Some(status),
            message: format!("HTTP {status} from {url}"),
        }
    }

    pub(crate) fn network(url: &str, detail: impl fmt::Display) -> Self {
        Self {
            url: url.to_owned(),
            status: None,
            message: detail.to_string(),
        }
    }
}

/// Fetch seam between the update pipeline and the network.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch `url`, returning `Ok(None)` when the resource is unchanged
    /// since the last successful fetch.
    async fn request_newer(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<Option<FetchResponse>, TransportError>;
}

/// Upper bound on remembered per-URL validators; the cache resets when
/// a new URL would grow it past this.
const MAX_VALIDATOR_ENTRIES: usize = 64;

/// Validators remembered from a previous 200 response.
#[derive(Debug, Clone, Default)]
struct CachedValidators {
    etag: Option<String>,
    last_modified: Option<String>,
}

/// reqwest-backed [`Transport`] with conditional-request support.
pub struct HttpTransport {
    client: reqwest::Client,
    validators: Mutex<HashMap<String, CachedValidators>>,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    /// Use a preconfigured client (timeouts, proxies).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            validators: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request_newer(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<Option<FetchResponse>, TransportError> {
        let mode = options.mode.unwrap_or(FetchMode::Revalidate);
        let mut request = self.client.get(url);
        if let Some(accept) = &options.accept {
            request = request.header(ACCEPT, accept);
        }
        match mode {
            FetchMode::Revalidate => {
                let cached = self.validators.lock().await.get(url).cloned();
                if let Some(cached) = cached {
                    if let Some(etag) = &cached.etag {
                        request = request.header(IF_NONE_MATCH, etag);
                    }
                    if let Some(last_modified) = &cached.last_modified {
                        request = request.header(IF_MODIFIED_SINCE, last_modified);
                    }
                }
            }
            FetchMode::Bypass => {
                request = request.header(CACHE_CONTROL, "no-cache");
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::network(url, e))?;
        let status = response.status();

        if status == StatusCode::NOT_MODIFIED {
            debug!("unchanged since last fetch: {url}");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(TransportError::http(url, status.as_u16()));
        }

        let validators = CachedValidators {
            etag: header_string(&response, ETAG),
            last_modified: header_string(&response, LAST_MODIFIED),
        };
        if validators.etag.is_some() || validators.last_modified.is_some() {
            let mut cache = self.validators.lock().await;
            if !cache.contains_key(url) && cache.len() >= MAX_VALIDATOR_ENTRIES {
                debug!("validator cache full, resetting");
                cache.clear();
            }
            cache.insert(url.to_owned(), validators);
        }

        let data = response
            .text()
            .await
            .map_err(|e| TransportError::network(url, e))?;
        Ok(Some(FetchResponse { data }))
    }
}

fn header_string(
    response: &reqwest::Response,
    name: reqwest::header::HeaderName,
) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}
