use std::collections::HashMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::error::{AppError, Result};
use crate::types::Region;

pub const ITEM_NAMES_FILE: &str = "item_names.json";
pub const PET_NAMES_FILE: &str = "pet_names.json";
pub const BONUSES_FILE: &str = "bonuses.json";
pub const ITEM_DATA_FILE: &str = "item_data.json";

pub fn realm_ids_file(region: Region) -> String {
    format!("{}-wow-connected-realm-ids.json", region.code().to_lowercase())
}

/// Base item level and requirement for one item id.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemReference {
    #[serde(default, alias = "itemName")]
    pub name: String,
    pub ilvl: i64,
    #[serde(default = "default_required_level")]
    pub required_level: i64,
    #[serde(default)]
    pub item_class: u32,
}

fn default_required_level() -> i64 {
    1
}

/// Read-only static data: the REST API first, the public static mirror on any failure.
pub struct ReferenceClient {
    client: reqwest::Client,
    primary: String,
    mirror: String,
}

impl ReferenceClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self::with_client(
            client,
            settings.reference_api_url.clone(),
            settings.reference_mirror_url.clone(),
        ))
    }

    pub fn with_client(client: reqwest::Client, primary: String, mirror: String) -> Self {
        Self {
            client,
            primary: primary.trim_end_matches('/').to_string(),
            mirror: mirror.trim_end_matches('/').to_string(),
        }
    }

    pub async fn fetch_json<T: DeserializeOwned>(&self, file: &str) -> Result<T> {
        match self.get_from(&self.primary, file).await {
            Ok(v) => Ok(v),
            Err(primary_err) => {
                warn!("[CATALOG] {file} unavailable from API ({primary_err}), trying static mirror");
                self.get_from(&self.mirror, file).await.map_err(|mirror_err| {
                    AppError::Config(format!(
                        "reference data {file} unavailable: api: {primary_err}; mirror: {mirror_err}"
                    ))
                })
            }
        }
    }

    async fn get_from<T: DeserializeOwned>(&self, base: &str, file: &str) -> Result<T> {
        let url = format!("{base}/{file}");
        debug!("[CATALOG] GET {url}");
        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::Fetch(format!("{url} returned {status}")));
        }
        Ok(resp.json::<T>().await?)
    }

    /// id → name maps keyed by numeric strings; unparsable keys are skipped.
    pub async fn fetch_names(&self, file: &str) -> Result<HashMap<u64, String>> {
        let raw: HashMap<String, String> = self.fetch_json(file).await?;
        Ok(parse_numeric_keys(raw))
    }

    pub async fn fetch_item_data(&self) -> Result<HashMap<u64, ItemReference>> {
        let raw: HashMap<String, ItemReference> = self.fetch_json(ITEM_DATA_FILE).await?;
        Ok(parse_numeric_keys(raw))
    }
}

fn parse_numeric_keys<V>(raw: HashMap<String, V>) -> HashMap<u64, V> {
    raw.into_iter()
        .filter_map(|(k, v)| k.trim().parse::<u64>().ok().map(|id| (id, v)))
        .collect()
}
