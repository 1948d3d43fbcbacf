use async_trait::async_trait;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, HeaderMap, RANGE};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

use super::ReadAt;
use anyhow::{Context, Result, anyhow, bail};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ATTEMPTS: u32 = 5;
/// Multiplied by the attempt number before each retry
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Archive published by an HTTP server that honours `Range` requests.
///
/// Each `read_at` is an independent request for exactly the bytes asked
/// for, so the reader keeps no cursor and one instance may back many
/// entry streams at once.
pub struct HttpRangeReader {
    client: Client,
    url: String,
    size: u64,
}

fn header<'a>(headers: &'a HeaderMap, name: impl reqwest::header::AsHeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

impl HttpRangeReader {
    /// Probe `url` with a HEAD request for its length and range support.
    pub async fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        let resp = client
            .head(&url)
            .send()
            .await
            .with_context(|| format!("HEAD {url}"))?;
        if !resp.status().is_success() {
            bail!("HEAD {} returned {}", url, resp.status());
        }

        let headers = resp.headers();
        let byte_ranges = header(headers, ACCEPT_RANGES)
            .is_some_and(|units| units.split(',').any(|unit| unit.trim() == "bytes"));
        if !byte_ranges {
            bail!("{url} does not accept byte ranges");
        }
        let size = header(headers, CONTENT_LENGTH)
            .and_then(|len| len.parse().ok())
            .ok_or_else(|| anyhow!("{url} sent no usable Content-Length"))?;

        debug!(url = %url, size, "remote archive");
        Ok(Self { client, url, size })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// One `Range` request, retried on timeouts and refused connections.
    async fn fetch(&self, first: u64, last: u64) -> Result<Vec<u8>> {
        let range = format!("bytes={first}-{last}");
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match self.client.get(&self.url).header(RANGE, &range).send().await {
                Ok(resp) if resp.status() == StatusCode::PARTIAL_CONTENT => {
                    return Ok(resp.bytes().await?.to_vec());
                }
                // A 200 would be the whole archive
                Ok(resp) => bail!("{} for {} returned {}", range, self.url, resp.status()),
                Err(err) => err,
            };

            if !(err.is_timeout() || err.is_connect()) || attempt >= MAX_ATTEMPTS {
                return Err(anyhow::Error::new(err).context(format!("{} for {}", range, self.url)));
            }
            warn!(url = %self.url, %range, attempt, error = %err, "range request failed, retrying");
            tokio::time::sleep(RETRY_BACKOFF * attempt).await;
        }
    }
}

#[async_trait]
impl ReadAt for HttpRangeReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() || offset >= self.size {
            return Ok(0);
        }

        let last = (offset + buf.len() as u64 - 1).min(self.size - 1);
        let body = self.fetch(offset, last).await?;
        let n = body.len().min(buf.len());
        buf[..n].copy_from_slice(&body[..n]);
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.size
    }
}
