use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::catalog::reference::ItemReference;
use crate::config::{EQUIPMENT_ITEM_CLASSES, MIN_CATALOG_ILVL};
use crate::error::{AppError, Result};
use crate::types::{
    BonusMode, ItemBase, ItemLevelTarget, ItemScope, ItemTarget, PetTarget, TertiaryStats,
};

pub const ITEMS_FILE: &str = "desired_items.json";
pub const PETS_FILE: &str = "desired_pets.json";
pub const ILVL_FILE: &str = "desired_ilvl.json";
pub const ILVL_LIST_FILE: &str = "desired_ilvl_list.json";
pub const PET_ILVL_LIST_FILE: &str = "desired_pet_ilvl_list.json";

/// Bonus list marker meaning "base item, no level modifiers".
pub const BASE_ITEM_MARKER: i64 = -1;

/// Validated buy targets for the run.
#[derive(Debug, Clone, Default)]
pub struct TargetCatalog {
    pub items: HashMap<u64, ItemTarget>,
    pub pets: HashMap<u64, PetTarget>,
    pub pet_levels: Vec<PetTarget>,
    pub item_levels: Vec<ItemLevelTarget>,
}

impl TargetCatalog {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
            && self.pets.is_empty()
            && self.pet_levels.is_empty()
            && self.item_levels.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} items, {} pets, {} pet level rules, {} item level rules",
            self.items.len(),
            self.pets.len(),
            self.pet_levels.len(),
            self.item_levels.len()
        )
    }
}

/// Item-level rule exactly as declared on disk. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ItemLevelRule {
    pub ilvl: i64,
    #[serde(default = "default_max_ilvl")]
    pub max_ilvl: i64,
    pub buyout: f64,
    pub sockets: bool,
    pub speed: bool,
    pub leech: bool,
    pub avoidance: bool,
    pub item_ids: Vec<u64>,
    #[serde(default = "default_required_min_lvl")]
    pub required_min_lvl: i64,
    #[serde(default = "default_required_max_lvl")]
    pub required_max_lvl: i64,
    #[serde(default)]
    pub bonus_lists: Vec<i64>,
}

fn default_max_ilvl() -> i64 {
    10_000
}
fn default_required_min_lvl() -> i64 {
    1
}
fn default_required_max_lvl() -> i64 {
    1_000
}

impl ItemLevelRule {
    fn validate(&self) -> Result<()> {
        if self.ilvl > self.max_ilvl {
            return Err(AppError::Config(format!(
                "item level rule has ilvl {} above max_ilvl {}",
                self.ilvl, self.max_ilvl
            )));
        }
        if self.required_min_lvl > self.required_max_lvl {
            return Err(AppError::Config(format!(
                "item level rule has required_min_lvl {} above required_max_lvl {}",
                self.required_min_lvl, self.required_max_lvl
            )));
        }
        if self.bonus_lists.contains(&BASE_ITEM_MARKER) && self.bonus_lists.len() != 1 {
            return Err(AppError::Config(format!(
                "bonus_lists may contain {BASE_ITEM_MARKER} only on its own, got {:?}",
                self.bonus_lists
            )));
        }
        if self.buyout <= 0.0 {
            return Err(AppError::Config("item level rule buyout must be positive".to_string()));
        }
        Ok(())
    }

    fn bonus_mode(&self) -> BonusMode {
        match self.bonus_lists.as_slice() {
            [] => BonusMode::Any,
            [BASE_ITEM_MARKER] => BonusMode::BaseItem,
            ids => BonusMode::Exact(ids.iter().copied().collect()),
        }
    }

    fn scope(&self) -> ItemScope {
        if self.item_ids.is_empty() {
            ItemScope::AllEquipment
        } else {
            ItemScope::Explicit(self.item_ids.iter().copied().collect())
        }
    }

    /// Resolves the rule's subjects to their base item level and requirement.
    pub fn resolve(&self, item_data: &HashMap<u64, ItemReference>) -> Result<ItemLevelTarget> {
        let scope = self.scope();
        let bases: HashMap<u64, ItemBase> = match &scope {
            ItemScope::AllEquipment => item_data
                .iter()
                .filter(|(_, r)| {
                    r.ilvl >= MIN_CATALOG_ILVL && EQUIPMENT_ITEM_CLASSES.contains(&r.item_class)
                })
                .map(|(id, r)| (*id, base_of(r)))
                .collect(),
            ItemScope::Explicit(ids) => {
                let mut bases = HashMap::with_capacity(ids.len());
                for id in ids {
                    match item_data.get(id) {
                        Some(r) => {
                            bases.insert(*id, base_of(r));
                        }
                        None => warn!("[CATALOG] item {id} has no reference data, dropped from item level rule"),
                    }
                }
                bases
            }
        };
        if bases.is_empty() {
            return Err(AppError::Config(format!(
                "item level rule (ilvl {}) resolved to no items",
                self.ilvl
            )));
        }

        Ok(ItemLevelTarget {
            scope,
            bases,
            min_ilvl: self.ilvl,
            max_ilvl: self.max_ilvl,
            required_min_lvl: self.required_min_lvl,
            required_max_lvl: self.required_max_lvl,
            require: TertiaryStats {
                sockets: self.sockets,
                leech: self.leech,
                avoidance: self.avoidance,
                speed: self.speed,
            },
            bonus_mode: self.bonus_mode(),
            max_buyout: self.buyout,
        })
    }
}

fn base_of(r: &ItemReference) -> ItemBase {
    ItemBase { ilvl: r.ilvl, required_level: r.required_level }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct PetRuleRaw {
    #[serde(rename = "petID")]
    pet_id: Option<u64>,
    price: f64,
    #[serde(default = "default_min_level")]
    min_level: u32,
    #[serde(default = "default_min_quality")]
    min_quality: i32,
    #[serde(default)]
    exclude_breeds: Vec<u32>,
}

fn default_min_level() -> u32 {
    1
}
fn default_min_quality() -> i32 {
    -1
}

impl PetRuleRaw {
    fn into_target(self, species_id: u64) -> PetTarget {
        PetTarget {
            species_id,
            max_price: self.price,
            min_level: self.min_level,
            min_quality: self.min_quality,
            exclude_breeds: self.exclude_breeds.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum PetEntry {
    Price(f64),
    Rule(PetRuleRaw),
}

/// Target documents as read from the data directory, before reference resolution.
#[derive(Debug, Clone, Default)]
pub struct TargetFiles {
    pub items: Vec<ItemTarget>,
    pub pets: Vec<PetTarget>,
    pub pet_levels: Vec<PetTarget>,
    pub item_level_rules: Vec<ItemLevelRule>,
}

impl TargetFiles {
    pub fn load(data_dir: &Path) -> Result<Self> {
        let mut files = Self::default();
        if let Some(v) = read_optional_json(&data_dir.join(ITEMS_FILE))? {
            files.items = parse_items(&v)?;
        }
        if let Some(v) = read_optional_json(&data_dir.join(PETS_FILE))? {
            files.pets = parse_pets(&v)?;
        }
        if let Some(v) = read_optional_json(&data_dir.join(PET_ILVL_LIST_FILE))? {
            files.pet_levels = parse_pet_levels(&v)?;
        }
        if let Some(v) = read_optional_json(&data_dir.join(ILVL_FILE))? {
            if let Some(rule) = parse_item_level_rule(&v)? {
                files.item_level_rules.push(rule);
            }
        }
        if let Some(v) = read_optional_json(&data_dir.join(ILVL_LIST_FILE))? {
            files.item_level_rules.extend(parse_item_level_list(&v)?);
        }
        info!(
            "[CATALOG] targets on disk: {} items, {} pets, {} pet level rules, {} item level rules",
            files.items.len(),
            files.pets.len(),
            files.pet_levels.len(),
            files.item_level_rules.len()
        );
        Ok(files)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
            && self.pets.is_empty()
            && self.pet_levels.is_empty()
            && self.item_level_rules.is_empty()
    }

    /// Resolves item-level rules against `item_data` and indexes everything.
    pub fn into_catalog(self, item_data: &HashMap<u64, ItemReference>) -> Result<TargetCatalog> {
        let item_levels = self
            .item_level_rules
            .iter()
            .map(|r| r.resolve(item_data))
            .collect::<Result<Vec<_>>>()?;
        Ok(TargetCatalog {
            items: self.items.into_iter().map(|t| (t.item_id, t)).collect(),
            pets: self.pets.into_iter().map(|t| (t.species_id, t)).collect(),
            pet_levels: self.pet_levels,
            item_levels,
        })
    }
}

/// Missing or blank file ⇒ `None`; malformed JSON is fatal.
fn read_optional_json(path: &Path) -> Result<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path)?;
    if text.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| AppError::Config(format!("{}: {e}", path.display())))
}

fn parse_id(key: &str, what: &str) -> Result<u64> {
    key.trim()
        .parse::<u64>()
        .map_err(|_| AppError::Config(format!("{what} id {key:?} is not a number")))
}

/// `{"1234": 100.0}`: item id → max price in gold.
pub fn parse_items(v: &Value) -> Result<Vec<ItemTarget>> {
    let map: HashMap<String, f64> = serde_json::from_value(v.clone())
        .map_err(|e| AppError::Config(format!("{ITEMS_FILE}: {e}")))?;
    map.into_iter()
        .map(|(k, max_price)| {
            Ok(ItemTarget { item_id: parse_id(&k, "item")?, max_price })
        })
        .collect()
}

/// `{"50": 200.0}` or `{"50": {"price": 200.0, "minLevel": 25, ...}}`: species → rule.
pub fn parse_pets(v: &Value) -> Result<Vec<PetTarget>> {
    let map: HashMap<String, PetEntry> = serde_json::from_value(v.clone())
        .map_err(|e| AppError::Config(format!("{PETS_FILE}: {e}")))?;
    map.into_iter()
        .map(|(k, entry)| {
            let species_id = parse_id(&k, "pet")?;
            Ok(match entry {
                PetEntry::Price(max_price) => PetTarget {
                    species_id,
                    max_price,
                    min_level: default_min_level(),
                    min_quality: default_min_quality(),
                    exclude_breeds: BTreeSet::new(),
                },
                PetEntry::Rule(raw) => raw.into_target(species_id),
            })
        })
        .collect()
}

/// `[{"petID": 50, "price": 200, "minLevel": 25, "minQuality": 3, "excludeBreeds": [4]}]`
pub fn parse_pet_levels(v: &Value) -> Result<Vec<PetTarget>> {
    let raws: Vec<PetRuleRaw> = serde_json::from_value(v.clone())
        .map_err(|e| AppError::Config(format!("{PET_ILVL_LIST_FILE}: {e}")))?;
    raws.into_iter()
        .map(|raw| {
            let species_id = raw.pet_id.ok_or_else(|| {
                AppError::Config(format!("{PET_ILVL_LIST_FILE}: rule without petID"))
            })?;
            Ok(raw.into_target(species_id))
        })
        .collect()
}

/// Single rule object; `{}` means "no rule".
pub fn parse_item_level_rule(v: &Value) -> Result<Option<ItemLevelRule>> {
    if v.as_object().is_some_and(|o| o.is_empty()) {
        return Ok(None);
    }
    let rule: ItemLevelRule = serde_json::from_value(v.clone())
        .map_err(|e| AppError::Config(format!("{ILVL_FILE}: invalid item level rule: {e}")))?;
    rule.validate()?;
    Ok(Some(rule))
}

pub fn parse_item_level_list(v: &Value) -> Result<Vec<ItemLevelRule>> {
    let rules: Vec<ItemLevelRule> = serde_json::from_value(v.clone())
        .map_err(|e| AppError::Config(format!("{ILVL_LIST_FILE}: invalid item level rule: {e}")))?;
    for rule in &rules {
        rule.validate()?;
    }
    Ok(rules)
}
