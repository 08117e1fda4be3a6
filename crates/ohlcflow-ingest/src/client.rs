//! HTTP client for the exchange trade history endpoint.

use std::time::Duration;

use ohlcflow_types::Backoff;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::{IngestError, TradePage, parse_trades_page};

/// Default REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.kraken.com";

/// Configuration for the exchange client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL without trailing slash.
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Retry policy for transient failures.
    pub backoff: Backoff,
    /// User agent string.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            backoff: Backoff::new(8, 500, 30_000),
            user_agent: format!("ohlcflow/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub const fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }
}

/// HTTP client with connection pooling and retry logic.
#[derive(Debug, Clone)]
pub struct KrakenClient {
    client: Client,
    config: ClientConfig,
}

impl KrakenClient {
    /// Creates a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: ClientConfig) -> Result<Self, IngestError> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .tcp_keepalive(Duration::from_secs(60))
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(&config.user_agent)
            .gzip(true)
            .build()?;
        Ok(Self { client, config })
    }

    /// Creates a client with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_defaults() -> Result<Self, IngestError> {
        Self::new(ClientConfig::default())
    }

    /// Returns the client configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetches one page of trades for `pair` starting at `since_ns`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails after all retries or the
    /// response cannot be parsed.
    pub async fn fetch_trades_page(&self, pair: &str, since_ns: i64) -> Result<TradePage, IngestError> {
        let url = format!("{}/0/public/Trades", self.config.base_url);
        let since = since_ns.to_string();
        let body = self
            .get_text(&url, &[("pair", pair), ("since", since.as_str())])
            .await?;
        let page = parse_trades_page(&body, pair)?;
        debug!(pair, since_ns, trades = page.trades.len(), last_ns = ?page.last_ns, "fetched trade page");
        Ok(page)
    }

    async fn get_text(&self, url: &str, query: &[(&str, &str)]) -> Result<String, IngestError> {
        let backoff = self.config.backoff;
        let mut attempts = 0;

        loop {
            match self.client.get(url).query(query).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                        if backoff.should_retry(attempts) {
                            attempts += 1;
                            let delay = backoff.delay(attempts);
                            warn!(%status, attempt = attempts, ?delay, "retrying trade request");
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                        return Err(IngestError::ServerError {
                            status: status.as_u16(),
                        });
                    }

                    response.error_for_status_ref()?;
                    return Ok(response.text().await?);
                }
                Err(e) if is_retryable_error(&e) && backoff.should_retry(attempts) => {
                    attempts += 1;
                    let delay = backoff.delay(attempts);
                    warn!(error = %e, attempt = attempts, ?delay, "retrying trade request");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn is_retryable_error(error: &reqwest::Error) -> bool {
    if error.is_builder() {
        return false;
    }
    error.is_timeout() || error.is_connect() || error.is_request()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.backoff.max_retries, 8);
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let config = ClientConfig::default().with_base_url("http://localhost:8080/");
        assert_eq!(config.base_url, "http://localhost:8080");
    }

    #[tokio::test]
    async fn test_client_creation() {
        assert!(KrakenClient::with_defaults().is_ok());
    }
}
