//! HTTP fetcher
//!
//! Retrieves module paths with a blocking reqwest client. Each request runs
//! on its own worker thread, so the calling thread only ever waits on the
//! completion channel.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use reqwest::blocking::Client;
use tracing::debug;
use url::Url;

use super::{FetchCompletion, Fetcher, Transfer};
use crate::config::FetchConfig;
use crate::defaults::USER_AGENT;
use crate::error::{ConfigError, FetchFailure};

/// Fetcher that issues HTTP GET requests
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    base: Option<Url>,
    max_size: u64,
}

impl HttpFetcher {
    /// Build a fetcher from fetch settings
    pub fn from_config(config: &FetchConfig) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("HTTP client: {}", e)))?;

        let base = match &config.base_url {
            Some(base) => Some(
                Url::parse(base)
                    .map_err(|e| ConfigError::Invalid(format!("fetch.base_url '{}': {}", base, e)))?,
            ),
            None => None,
        };

        Ok(HttpFetcher {
            client,
            base,
            max_size: config.max_size,
        })
    }

    /// Turn a module path into the URL to request.
    ///
    /// Absolute http(s) URLs are used as is; anything else is joined against
    /// the base URL.
    pub fn resolve_url(&self, path: &str) -> Result<Url, FetchFailure> {
        if let Ok(url) = Url::parse(path) {
            return match url.scheme() {
                "http" | "https" => Ok(url),
                _ => Err(FetchFailure::InvalidUrl(path.to_string())),
            };
        }
        match &self.base {
            Some(base) => base
                .join(path)
                .map_err(|_| FetchFailure::InvalidUrl(path.to_string())),
            None => Err(FetchFailure::InvalidUrl(path.to_string())),
        }
    }

    fn get(client: &Client, url: Url, max_size: u64) -> Result<Vec<u8>, FetchFailure> {
        let response = client
            .get(url.clone())
            .send()
            .map_err(|e| FetchFailure::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        if let Some(len) = response.content_length() {
            if len > max_size {
                return Err(FetchFailure::TooLarge {
                    size: len,
                    max: max_size,
                });
            }
        }

        let mut content = Vec::new();
        response
            .take(max_size + 1)
            .read_to_end(&mut content)
            .map_err(|e| FetchFailure::Network(e.to_string()))?;

        if content.len() as u64 > max_size {
            return Err(FetchFailure::TooLarge {
                size: content.len() as u64,
                max: max_size,
            });
        }
        Ok(content)
    }
}

struct HttpTransfer {
    cancelled: Arc<AtomicBool>,
}

impl Transfer for HttpTransfer {
    fn close(self: Box<Self>) {
        self.cancelled.store(true, Ordering::Release);
    }
}

impl Fetcher for HttpFetcher {
    fn start(&self, path: &str, completion: FetchCompletion) -> Box<dyn Transfer> {
        let cancelled = Arc::new(AtomicBool::new(false));
        let url = match self.resolve_url(path) {
            Ok(url) => url,
            Err(failure) => {
                completion.fail(failure);
                return Box::new(HttpTransfer { cancelled });
            }
        };

        let client = self.client.clone();
        let max_size = self.max_size;
        let flag = cancelled.clone();
        thread::spawn(move || {
            debug!(%url, "GET");
            let outcome = Self::get(&client, url, max_size);
            if !flag.load(Ordering::Acquire) {
                completion.complete(outcome);
            }
        });

        Box::new(HttpTransfer { cancelled })
    }
}
