//! Dedup gate and webhook delivery.

pub mod format;
pub mod payload;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::api::health::HealthState;
use crate::catalog::NameBook;
use crate::config::{RetryPolicy, Settings, NOTIFY_MAX_ATTEMPTS};
use crate::error::{AppError, Result};
use crate::state::AlertLog;
use crate::types::{to_gold, Market, MatchResult, Region};

use format::{build_embeds, LinkStyle};
use payload::WebhookMessage;

/// Fires once when the price drops below the threshold, re-arms once it is back at or above.
#[derive(Debug)]
pub struct TokenWatch {
    armed: AtomicBool,
}

impl Default for TokenWatch {
    fn default() -> Self {
        Self { armed: AtomicBool::new(true) }
    }
}

impl TokenWatch {
    /// True on the transition into "below threshold".
    pub fn observe(&self, price_gold: f64, threshold_gold: u64) -> bool {
        if price_gold < threshold_gold as f64 {
            self.armed.swap(false, Ordering::AcqRel)
        } else {
            self.armed.store(true, Ordering::Release);
            false
        }
    }
}

pub struct Notifier {
    client: reqwest::Client,
    webhook_url: String,
    region: Region,
    style: LinkStyle,
    token_threshold: u64,
    alert_log: Arc<AlertLog>,
    health: Arc<HealthState>,
    retry: RetryPolicy,
    token_watch: TokenWatch,
}

impl Notifier {
    pub fn new(settings: &Settings, alert_log: Arc<AlertLog>, health: Arc<HealthState>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self::with_client(
            client,
            settings,
            alert_log,
            health,
            RetryPolicy::standard(NOTIFY_MAX_ATTEMPTS),
        ))
    }

    pub fn with_client(
        client: reqwest::Client,
        settings: &Settings,
        alert_log: Arc<AlertLog>,
        health: Arc<HealthState>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            webhook_url: settings.webhook_url.clone(),
            region: settings.region,
            style: LinkStyle { no_links: settings.no_links, wowhead: settings.wowhead_link },
            token_threshold: settings.token_price_threshold,
            alert_log,
            health,
            retry,
            token_watch: TokenWatch::default(),
        }
    }

    /// Posts the matches not yet alerted for this market. Returns how many
    /// matches went out in successfully delivered messages.
    pub async fn notify(&self, market: &Market, results: &[MatchResult], names: &NameBook) -> usize {
        let fresh: Vec<MatchResult> = results
            .iter()
            .filter(|r| self.alert_log.try_record(market.id, r))
            .cloned()
            .collect();
        if fresh.is_empty() {
            if !results.is_empty() {
                debug!(market_id = market.id, "[NOTIFY] {} matches already alerted", results.len());
            }
            return 0;
        }

        let mut sent = 0;
        for embed in build_embeds(market, &fresh, names, self.style) {
            let count = embed.fields.len();
            match self.post(&WebhookMessage::embed(embed)).await {
                Ok(()) => sent += count,
                Err(e) => {
                    self.health.inc_notify_failures();
                    error!(market_id = market.id, "[NOTIFY] dropped {count} alerts: {e}");
                }
            }
        }
        self.health.add_alerts_sent(sent);
        info!(
            market_id = market.id,
            sent,
            "[NOTIFY] {} | {} new matches, {sent} sent",
            market.display_name(),
            fresh.len()
        );
        sent
    }

    /// Edge-triggered token price alert. No-op when the threshold is 0.
    pub async fn check_token_price(&self, price_copper: u64) -> bool {
        if self.token_threshold == 0 {
            return false;
        }
        let price = to_gold(price_copper);
        if !self.token_watch.observe(price, self.token_threshold) {
            return false;
        }
        let text = format!(
            "{} token price is {price:.0}g, below your {}g threshold",
            self.region, self.token_threshold
        );
        match self.send_text(&text).await {
            Ok(()) => true,
            Err(e) => {
                self.health.inc_notify_failures();
                warn!("[NOTIFY] token alert dropped: {e}");
                false
            }
        }
    }

    pub async fn send_text(&self, content: &str) -> Result<()> {
        self.post(&WebhookMessage::text(content)).await
    }

    async fn post(&self, message: &WebhookMessage) -> Result<()> {
        let mut last_err = String::from("no attempts made");
        for attempt in 0..self.retry.max_attempts {
            match self.client.post(&self.webhook_url).json(message).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => {
                    last_err = format!("webhook returned {}", resp.status());
                }
                Err(e) => {
                    last_err = e.to_string();
                }
            }
            debug!("[NOTIFY] attempt {}/{} failed: {last_err}", attempt + 1, self.retry.max_attempts);
            if attempt + 1 < self.retry.max_attempts {
                tokio::time::sleep(self.retry.delay(attempt)).await;
            }
        }
        Err(AppError::Notification(last_err))
    }
}
