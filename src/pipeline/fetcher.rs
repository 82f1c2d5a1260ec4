//! Resource fetching seam and its reqwest-backed implementation.

use crate::config::FetchConfig;
use crate::error::{Error, Result};
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, REFERER};
use url::Url;

/// Abstraction over opening a remote resource, enabling testability.
///
/// `open` resolves once response headers are in and the status was accepted;
/// the body is then pulled chunk by chunk through [`BodyStream`].
#[async_trait::async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Start a GET for `url`, sending `referer` when given
    async fn open(&self, url: &Url, referer: Option<&Url>) -> Result<Box<dyn BodyStream>>;
}

/// Incrementally readable response body
#[async_trait::async_trait]
pub trait BodyStream: Send {
    /// Next chunk of the body, `None` once it is complete
    async fn next_chunk(&mut self) -> Result<Option<Bytes>>;
}

/// Production [`ResourceFetcher`] sharing one `reqwest` connection pool.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build the shared client from fetch settings
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                Error::config("headers", format!("invalid header name '{name}': {e}"))
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|e| {
                Error::config("headers", format!("invalid value for header '{name}': {e}"))
            })?;
            headers.insert(header_name, header_value);
        }

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self { client })
    }

    /// Wrap an already configured client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn open(&self, url: &Url, referer: Option<&Url>) -> Result<Box<dyn BodyStream>> {
        let mut request = self.client.get(url.clone());
        if let Some(referer) = referer {
            request = request.header(REFERER, referer.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(Box::new(HttpBody { response }))
    }
}

struct HttpBody {
    response: reqwest::Response,
}

#[async_trait::async_trait]
impl BodyStream for HttpBody {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        Ok(self.response.chunk().await?)
    }
}
