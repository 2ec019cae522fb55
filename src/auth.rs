//! OAuth client-credentials token cache shared by every fetch worker.

use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::{RetryPolicy, Settings, AUTH_MAX_ATTEMPTS, TOKEN_REFRESH_AFTER_SECS};
use crate::error::{AppError, Result};

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub value: String,
    pub issued_at: DateTime<Utc>,
}

impl AccessToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        (now - self.issued_at).num_seconds() < TOKEN_REFRESH_AFTER_SECS
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub struct TokenManager {
    client: reqwest::Client,
    oauth_url: String,
    client_id: String,
    client_secret: String,
    retry: RetryPolicy,
    cached: RwLock<Option<AccessToken>>,
    /// Serializes refreshes; readers never take it while the cached token is fresh.
    refresh_lock: Mutex<()>,
}

impl TokenManager {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()?;
        Ok(Self::with_client(
            client,
            settings.oauth_url.clone(),
            settings.client_id.clone(),
            settings.client_secret.clone(),
            RetryPolicy::standard(AUTH_MAX_ATTEMPTS),
        ))
    }

    pub fn with_client(
        client: reqwest::Client,
        oauth_url: String,
        client_id: String,
        client_secret: String,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            oauth_url,
            client_id,
            client_secret,
            retry,
            cached: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Returns a bearer token, refreshing it when older than 20 hours.
    pub async fn get_token(&self) -> Result<String> {
        if let Some(token) = self.fresh_cached(Utc::now()) {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;
        // Another worker may have refreshed while we waited for the lock.
        if let Some(token) = self.fresh_cached(Utc::now()) {
            return Ok(token);
        }

        let token = self.refresh().await?;
        let value = token.value.clone();
        if let Ok(mut slot) = self.cached.write() {
            *slot = Some(token);
        }
        Ok(value)
    }

    fn fresh_cached(&self, now: DateTime<Utc>) -> Option<String> {
        let slot = self.cached.read().ok()?;
        slot.as_ref()
            .filter(|t| t.is_fresh(now))
            .map(|t| t.value.clone())
    }

    async fn refresh(&self) -> Result<AccessToken> {
        let mut last_err = None;
        for attempt in 0..self.retry.max_attempts {
            match self.request_token().await {
                Ok(value) => {
                    info!("[AUTH] access token refreshed (attempt {})", attempt + 1);
                    return Ok(AccessToken { value, issued_at: Utc::now() });
                }
                Err(e) => {
                    warn!(
                        "[AUTH] token request failed (attempt {}/{}): {e}",
                        attempt + 1,
                        self.retry.max_attempts
                    );
                    last_err = Some(e);
                    tokio::time::sleep(self.retry.delay(attempt)).await;
                }
            }
        }
        Err(AppError::Auth(format!(
            "could not obtain access token after {} attempts: {}",
            self.retry.max_attempts,
            last_err.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    async fn request_token(&self) -> Result<String> {
        let resp = self
            .client
            .post(&self.oauth_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::Auth(format!("token endpoint returned {status}: {body}")));
        }

        let body: TokenResponse = resp.json().await?;
        if body.access_token.is_empty() {
            return Err(AppError::Auth("token endpoint returned an empty token".to_string()));
        }
        Ok(body.access_token)
    }

    #[cfg(test)]
    fn set_cached(&self, token: AccessToken) {
        *self.cached.write().unwrap() = Some(token);
    }
}
