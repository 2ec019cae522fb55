use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use reqwest::header::LAST_MODIFIED;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, error, warn};

use crate::auth::TokenManager;
use crate::config::{
    RetryPolicy, Settings, FETCH_MAX_ATTEMPTS, FETCH_TIMEOUT_SECS, RATE_LIMIT_SLEEP_MS,
};
use crate::error::{AppError, Result};
use crate::types::{AuctionsResponse, Faction, Listing, Market, Region};

/// Listings pulled for one market plus the feed's data timestamp.
#[derive(Debug, Default)]
pub struct MarketPull {
    pub listings: Vec<Listing>,
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct TokenIndex {
    price: u64,
}

pub struct AuctionFetcher {
    client: reqwest::Client,
    api_base: String,
    region: Region,
    faction: Faction,
    auth: Arc<TokenManager>,
    retry: RetryPolicy,
    rate_limit_sleep: Duration,
}

impl AuctionFetcher {
    pub fn new(settings: &Settings, auth: Arc<TokenManager>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()?;
        Ok(Self::with_client(
            client,
            settings.api_base(),
            settings.region,
            settings.faction,
            auth,
            RetryPolicy::standard(FETCH_MAX_ATTEMPTS),
            Duration::from_millis(RATE_LIMIT_SLEEP_MS),
        ))
    }

    pub fn with_client(
        client: reqwest::Client,
        api_base: String,
        region: Region,
        faction: Faction,
        auth: Arc<TokenManager>,
        retry: RetryPolicy,
        rate_limit_sleep: Duration,
    ) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            region,
            faction,
            auth,
            retry,
            rate_limit_sleep,
        }
    }

    /// Endpoints that together hold a market's listings.
    /// Commodity pools have their own endpoint; classic realms split by faction house.
    pub fn market_urls(&self, market: &Market) -> Vec<String> {
        let query = format!("namespace={}&locale=en_US", self.region.namespace());
        if market.is_commodities() {
            return vec![format!("{}/data/wow/auctions/commodities?{query}", self.api_base)];
        }
        let realm = format!("{}/data/wow/connected-realm/{}/auctions", self.api_base, market.id);
        if self.region.is_classic() {
            self.faction
                .auction_house_ids()
                .iter()
                .map(|ah| format!("{realm}/{ah}?{query}"))
                .collect()
        } else {
            vec![format!("{realm}?{query}")]
        }
    }

    /// Never fails: a market whose endpoints all fail yields no listings.
    pub async fn fetch_market(&self, market: &Market) -> MarketPull {
        let urls = self.market_urls(market);
        let results = join_all(urls.iter().map(|url| self.fetch_endpoint(url))).await;

        let mut pull = MarketPull::default();
        for (url, result) in urls.iter().zip(results) {
            match result {
                Ok((listings, last_modified)) => {
                    pull.listings.extend(listings);
                    pull.last_modified = pull.last_modified.max(last_modified);
                }
                Err(e) => {
                    if e.is_fatal() {
                        error!(market_id = market.id, "[FETCH] {url}: {e}");
                    } else {
                        warn!(market_id = market.id, "[FETCH] {url}: {e}");
                    }
                }
            }
        }
        debug!(
            market_id = market.id,
            listings = pull.listings.len(),
            "[FETCH] market {} returned {} listings",
            market.id,
            pull.listings.len()
        );
        pull
    }

    async fn fetch_endpoint(&self, url: &str) -> Result<(Vec<Listing>, Option<DateTime<Utc>>)> {
        let mut last_err = AppError::Fetch(format!("{url}: no attempts made"));

        for attempt in 0..self.retry.max_attempts {
            let token = self.auth.get_token().await?;
            let resp = match self.client.get(url).bearer_auth(&token).send().await {
                Ok(r) => r,
                Err(e) => {
                    debug!("[FETCH] {url} attempt {}: {e}", attempt + 1);
                    last_err = e.into();
                    tokio::time::sleep(self.retry.delay(attempt)).await;
                    continue;
                }
            };

            let status = resp.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                debug!("[FETCH] rate limited on {url} (attempt {}/{})", attempt + 1, self.retry.max_attempts);
                last_err = AppError::RateLimited(url.to_string());
                tokio::time::sleep(self.rate_limit_sleep).await;
                continue;
            }
            if !status.is_success() {
                debug!("[FETCH] {url} returned {status} (attempt {})", attempt + 1);
                last_err = AppError::Fetch(format!("{url} returned {status}"));
                tokio::time::sleep(self.retry.delay(attempt)).await;
                continue;
            }

            let last_modified = resp
                .headers()
                .get(LAST_MODIFIED)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_last_modified);

            match resp.json::<AuctionsResponse>().await {
                Ok(body) => {
                    let listings = body.auctions.into_iter().map(Listing::from).collect();
                    return Ok((listings, last_modified));
                }
                Err(e) => {
                    debug!("[FETCH] {url} body decode failed: {e}");
                    last_err = e.into();
                    tokio::time::sleep(self.retry.delay(attempt)).await;
                }
            }
        }

        Err(last_err)
    }

    /// Current regional token price in copper.
    pub async fn fetch_token_price(&self) -> Result<u64> {
        let url = format!(
            "{}/data/wow/token/index?namespace={}&locale=en_US",
            self.api_base,
            self.region.namespace()
        );
        let token = self.auth.get_token().await?;
        let resp = self.client.get(&url).bearer_auth(&token).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::Fetch(format!("{url} returned {status}")));
        }
        Ok(resp.json::<TokenIndex>().await?.price)
    }
}

/// Parses an HTTP date (`Sun, 18 Oct 2026 12:05:07 GMT`).
pub fn parse_last_modified(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(s.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
