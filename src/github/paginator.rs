use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio::time::{sleep, Duration};

use crate::error::{Error, Result};
use crate::github::rate_limiter::RateLimiter;

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_millis(500);

pub struct Paginator<'a> {
    client: &'a Client,
    rate_limiter: &'a RateLimiter,
}

impl<'a> Paginator<'a> {
    pub fn new(client: &'a Client, rate_limiter: &'a RateLimiter) -> Self {
        Self {
            client,
            rate_limiter,
        }
    }

    /// Fetch every page in server order, one request at a time. The
    /// server is authoritative: the loop ends when a page comes back
    /// shorter than `per_page` (or empty), never from a precomputed
    /// total.
    pub async fn fetch_all<T: DeserializeOwned>(
        &self,
        base_url: &str,
        per_page: u32,
        token: Option<&str>,
    ) -> Result<Vec<T>> {
        let mut all_items = Vec::new();
        let mut page = 1;

        loop {
            let separator = if base_url.contains('?') { "&" } else { "?" };
            let url = format!("{}{}per_page={}&page={}", base_url, separator, per_page, page);

            let items: Vec<T> = self.fetch_page(&url, token).await?;
            let items_count = items.len();
            all_items.extend(items);

            if items_count < per_page as usize {
                break;
            }

            page += 1;
        }

        Ok(all_items)
    }

    /// One page with bounded retry. Only transport errors and 5xx are
    /// retried; auth and not-found failures surface immediately.
    async fn fetch_page<T: DeserializeOwned>(
        &self,
        url: &str,
        token: Option<&str>,
    ) -> Result<Vec<T>> {
        let mut attempt = 1;
        loop {
            self.rate_limiter.wait().await;
            tracing::debug!("Fetching: {}", url);

            match self.request_page(url, token).await {
                Ok(items) => return Ok(items),
                Err(e) if attempt < MAX_ATTEMPTS && is_transient(&e) => {
                    let backoff = BACKOFF_BASE * 2u32.pow(attempt - 1);
                    tracing::warn!(
                        "Transient failure on [{}] (attempt {}/{}): {}; retrying in {:?}",
                        url,
                        attempt,
                        MAX_ATTEMPTS,
                        e,
                        backoff
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn request_page<T: DeserializeOwned>(
        &self,
        url: &str,
        token: Option<&str>,
    ) -> Result<Vec<T>> {
        let mut request = self.client.get(url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        self.rate_limiter.update(&response).await;
        let response = response.error_for_status()?;
        Ok(response.json().await?)
    }
}

fn is_transient(error: &Error) -> bool {
    match error {
        // 5xx means the server may recover; timeouts and connection
        // failures likewise. A 4xx or a decode failure will not improve
        // on retry.
        Error::Network(e) => match e.status() {
            Some(status) => status.is_server_error(),
            None => e.is_timeout() || e.is_connect(),
        },
        _ => false,
    }
}
