//! Boot-time loading of targets and static reference data into one
//! immutable run snapshot.

pub mod bonus;
pub mod realms;
pub mod reference;
pub mod targets;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::auth::TokenManager;
use crate::config::Settings;
use crate::error::{AppError, Result};
use crate::types::{Market, MatchResult};

pub use bonus::BonusCatalog;
pub use reference::ReferenceClient;
pub use targets::{TargetCatalog, TargetFiles};

/// Display names for item ids and pet species.
#[derive(Debug, Clone, Default)]
pub struct NameBook {
    pub items: HashMap<u64, String>,
    pub pets: HashMap<u64, String>,
}

impl NameBook {
    pub fn item(&self, id: u64) -> String {
        self.items
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("Item {id}"))
    }

    pub fn pet(&self, species_id: u64) -> String {
        self.pets
            .get(&species_id)
            .cloned()
            .unwrap_or_else(|| format!("Pet {species_id}"))
    }

    pub fn for_match(&self, result: &MatchResult) -> String {
        if result.is_pet() {
            self.pet(result.subject_id())
        } else {
            self.item(result.subject_id())
        }
    }
}

/// Resolved configuration for one run. Built once at boot, shared read-only.
pub struct MarketData {
    pub settings: Settings,
    pub targets: TargetCatalog,
    pub bonuses: BonusCatalog,
    pub markets: Vec<Market>,
    pub names: NameBook,
    pub auth: Arc<TokenManager>,
}

/// Loads targets from `settings.data_dir` and reference data through `reference`.
pub async fn load(
    settings: Settings,
    reference: &ReferenceClient,
    auth: Arc<TokenManager>,
) -> Result<MarketData> {
    let files = TargetFiles::load(&settings.data_dir)?;
    if files.is_empty() {
        return Err(AppError::Config("no snipe data".to_string()));
    }

    let needs_item_levels = !files.item_level_rules.is_empty();
    let item_data = if needs_item_levels {
        reference.fetch_item_data().await?
    } else {
        HashMap::new()
    };
    let targets = files.into_catalog(&item_data)?;
    for rule in &targets.item_levels {
        info!(
            "[CATALOG] item level rule {}-{}: {}, {} resolved",
            rule.min_ilvl,
            rule.max_ilvl,
            rule.scope,
            rule.bases.len()
        );
    }

    let bonuses = if needs_item_levels {
        let raw: HashMap<String, Value> = reference.fetch_json(reference::BONUSES_FILE).await?;
        let catalog = BonusCatalog::from_reference(&raw);
        info!(
            "[CATALOG] bonus ids: {} sockets, {} leech, {} avoidance, {} speed, {} level deltas",
            catalog.sockets.len(),
            catalog.leech.len(),
            catalog.avoidance.len(),
            catalog.speed.len(),
            catalog.ilvl_deltas.len()
        );
        catalog
    } else {
        BonusCatalog::default()
    };

    let realm_ids: HashMap<String, i64> = reference
        .fetch_json(&reference::realm_ids_file(settings.region))
        .await?;
    let markets = realms::build_markets(settings.region, &realm_ids, settings.no_russian_realms);
    if markets.is_empty() {
        return Err(AppError::Config(format!("no markets found for region {}", settings.region)));
    }

    let names = NameBook {
        items: reference
            .fetch_names(reference::ITEM_NAMES_FILE)
            .await
            .unwrap_or_else(|e| {
                warn!("[CATALOG] item names unavailable, alerts will show ids: {e}");
                HashMap::new()
            }),
        pets: reference
            .fetch_names(reference::PET_NAMES_FILE)
            .await
            .unwrap_or_else(|e| {
                warn!("[CATALOG] pet names unavailable, alerts will show ids: {e}");
                HashMap::new()
            }),
    };

    info!(
        "[CATALOG] loaded {} markets for {} | targets: {}",
        markets.len(),
        settings.region,
        targets.summary()
    );

    Ok(MarketData { settings, targets, bonuses, markets, names, auth })
}
