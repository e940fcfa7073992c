use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Error, Result};

/// Source of raw response bodies. One call, one request, no retries.
pub trait Fetch {
    /// `timeout` bounds the whole request, body included; `None` waits indefinitely.
    fn fetch(&self, url: &str, timeout: Option<Duration>) -> Result<Vec<u8>>;
}

pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        // reqwest's blocking client defaults to 30s; timeouts are per request here
        let client = reqwest::blocking::Client::builder()
            .timeout(None)
            .build()
            .map_err(Error::Client)?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str, timeout: Option<Duration>) -> Result<Vec<u8>> {
        let http_err = |source| Error::Http {
            url: url.to_string(),
            source,
        };

        info!("Requesting {}", url);
        let mut request = self.client.get(url);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let body = request
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.bytes())
            .map_err(http_err)?;
        debug!(bytes = body.len(), "Response received");
        Ok(body.to_vec())
    }
}
