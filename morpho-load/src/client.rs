//! HTTP client handed to each simulated user
use crate::error::{SwarmError, TaskError};
use crate::task::TASK_HOOK;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tracing::{trace, warn};
use url::Url;

/// Client bound to the target host. Every request is counted and timed under its name.
#[derive(Clone, Debug)]
pub struct HttpClient {
    inner: Client,
    base: Url,
}

impl HttpClient {
    pub fn new(host: &str, timeout: Duration) -> Result<Self, SwarmError> {
        let inner = Client::builder().timeout(timeout).build()?;
        Self::with_client(inner, host)
    }

    pub fn with_client(inner: Client, host: &str) -> Result<Self, SwarmError> {
        let base = Url::parse(host).map_err(|source| SwarmError::InvalidHost {
            host: host.to_string(),
            source,
        })?;
        if base.cannot_be_a_base() {
            return Err(SwarmError::CannotBeABase(host.to_string()));
        }
        Ok(Self { inner, base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// GET `path` appended to the host, recorded under `path`.
    pub async fn get(&self, path: &str) -> Result<Response, TaskError> {
        self.get_named(path, path).await
    }

    /// GET `path` appended to the host, recorded under `name`.
    pub async fn get_named(&self, path: &str, name: &str) -> Result<Response, TaskError> {
        let url = self.url(path)?;
        self.send(url, path, name).await
    }

    /// GET the URL made of the host followed by `segments`, each percent-encoded.
    pub async fn get_segments(&self, segments: &[&str], name: &str) -> Result<Response, TaskError> {
        let url = self.segments_url(segments)?;
        let path = url.path().to_string();
        self.send(url, &path, name).await
    }

    pub(crate) fn url(&self, path: &str) -> Result<Url, TaskError> {
        let joined = format!("{}{}", self.base.as_str().trim_end_matches('/'), path);
        Url::parse(&joined).map_err(|_| TaskError::InvalidPath(path.to_string()))
    }

    pub(crate) fn segments_url(&self, segments: &[&str]) -> Result<Url, TaskError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| TaskError::InvalidPath(segments.join("/")))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, url: Url, path: &str, name: &str) -> Result<Response, TaskError> {
        let hook = TASK_HOOK.try_with(|v| v.clone()).ok();
        if let Some(limiter) = hook.as_ref().and_then(|hook| hook.limiter.as_ref()) {
            limiter.until_ready().await;
        }

        trace!("GET {url}");
        let start = Instant::now();
        let res = self.fetch(url, path).await;
        let elapsed = start.elapsed();

        let res = match res {
            Ok(response) if response.status.is_client_error() || response.status.is_server_error() => {
                Err(TaskError::Status {
                    path: path.to_string(),
                    status: response.status,
                })
            }
            other => other,
        };

        match &hook {
            Some(hook) => hook.stats.record_request(name, elapsed, res.is_ok()),
            None => warn!("No hook available, request {name} is not recorded."),
        }

        res
    }

    async fn fetch(&self, url: Url, path: &str) -> Result<Response, TaskError> {
        let response = self.inner.get(url).send().await?;
        let status = response.status();
        let body = response.bytes().await?.to_vec();
        Ok(Response {
            path: path.to_string(),
            status,
            body,
        })
    }
}

/// Fully read response to a successful request
#[derive(Debug, Clone)]
pub struct Response {
    pub path: String,
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl Response {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TaskError> {
        serde_json::from_slice(&self.body).map_err(|source| TaskError::Parse {
            path: self.path.clone(),
            source,
        })
    }
}
