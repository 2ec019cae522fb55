use std::collections::{BTreeSet, HashMap};

use serde::Deserialize;

/// Minor currency units (copper) per displayed unit (gold).
pub const COPPER_PER_GOLD: f64 = 10_000.0;

/// Item id of a caged battle pet; the species travels in the listing's pet fields.
pub const CAGED_PET_ITEM_ID: u64 = 82800;

/// Modifier type carrying the player-level requirement of a scaled item.
pub const PLAYER_LEVEL_MODIFIER: u32 = 9;

#[inline]
pub fn to_gold(copper: u64) -> f64 {
    copper as f64 / COPPER_PER_GOLD
}

// ---------------------------------------------------------------------------
// Region / Faction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Na,
    Eu,
    NaClassic,
    EuClassic,
    NaSodClassic,
    EuSodClassic,
}

impl Region {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "NA" | "US" => Some(Region::Na),
            "EU" => Some(Region::Eu),
            "NACLASSIC" => Some(Region::NaClassic),
            "EUCLASSIC" => Some(Region::EuClassic),
            "NASODCLASSIC" => Some(Region::NaSodClassic),
            "EUSODCLASSIC" => Some(Region::EuSodClassic),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Region::Na => "NA",
            Region::Eu => "EU",
            Region::NaClassic => "NACLASSIC",
            Region::EuClassic => "EUCLASSIC",
            Region::NaSodClassic => "NASODCLASSIC",
            Region::EuSodClassic => "EUSODCLASSIC",
        }
    }

    /// API host / locale prefix: `us` or `eu`.
    pub fn host(&self) -> &'static str {
        match self {
            Region::Na | Region::NaClassic | Region::NaSodClassic => "us",
            Region::Eu | Region::EuClassic | Region::EuSodClassic => "eu",
        }
    }

    pub fn namespace(&self) -> String {
        match self {
            Region::Na | Region::Eu => format!("dynamic-{}", self.host()),
            Region::NaClassic | Region::EuClassic => format!("dynamic-classic-{}", self.host()),
            Region::NaSodClassic | Region::EuSodClassic => {
                format!("dynamic-classic1x-{}", self.host())
            }
        }
    }

    pub fn is_classic(&self) -> bool {
        !matches!(self, Region::Na | Region::Eu)
    }

    /// Sentinel market id of the region-wide commodity pool (retail only).
    pub fn commodity_market_id(&self) -> Option<i64> {
        match self {
            Region::Na => Some(-1),
            Region::Eu => Some(-2),
            _ => None,
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Faction {
    All,
    Alliance,
    Horde,
    BootyBay,
}

impl Faction {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "all" => Some(Faction::All),
            "alliance" => Some(Faction::Alliance),
            "horde" => Some(Faction::Horde),
            "booty bay" | "neutral" => Some(Faction::BootyBay),
            _ => None,
        }
    }

    /// Classic auction-house ids: alliance=2, horde=6, neutral=7.
    pub fn auction_house_ids(&self) -> &'static [u32] {
        match self {
            Faction::All => &[2, 6, 7],
            Faction::Alliance => &[2],
            Faction::Horde => &[6],
            Faction::BootyBay => &[7],
        }
    }
}

// ---------------------------------------------------------------------------
// Market
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Market {
    pub id: i64,
    /// Names of every realm sharing this connected id, sorted.
    pub names: Vec<String>,
    pub region: Region,
}

impl Market {
    pub fn is_commodities(&self) -> bool {
        self.id < 0
    }

    pub fn display_name(&self) -> String {
        if self.names.is_empty() {
            format!("market {}", self.id)
        } else {
            self.names.join(", ")
        }
    }
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

/// Wire shape of one entry in an auctions response.
#[derive(Debug, Clone, Deserialize)]
pub struct AuctionEntry {
    pub item: AuctionItem,
    #[serde(default)]
    pub buyout: Option<u64>,
    #[serde(default)]
    pub bid: Option<u64>,
    /// Commodity listings price per unit instead of a buyout.
    #[serde(default)]
    pub unit_price: Option<u64>,
    #[serde(default)]
    pub quantity: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuctionItem {
    pub id: u64,
    #[serde(default)]
    pub bonus_lists: Option<Vec<i64>>,
    #[serde(default)]
    pub modifiers: Option<Vec<Modifier>>,
    #[serde(default)]
    pub pet_species_id: Option<u64>,
    #[serde(default)]
    pub pet_level: Option<u32>,
    #[serde(default)]
    pub pet_quality_id: Option<i32>,
    #[serde(default)]
    pub pet_breed_id: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Modifier {
    #[serde(rename = "type")]
    pub kind: u32,
    pub value: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuctionsResponse {
    #[serde(default)]
    pub auctions: Vec<AuctionEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PetInfo {
    pub species_id: u64,
    pub level: u32,
    pub quality: i32,
    pub breed: u32,
}

/// One auction as the matcher sees it. Prices are in copper.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Listing {
    pub item_id: u64,
    pub buyout: Option<u64>,
    pub bid: Option<u64>,
    pub quantity: u64,
    /// `None` when the feed carried no bonus list at all.
    pub bonus_ids: Option<Vec<i64>>,
    pub modifiers: Vec<Modifier>,
    pub pet: Option<PetInfo>,
}

impl Listing {
    /// Value of the player-level requirement modifier, if present.
    pub fn required_level_modifier(&self) -> Option<i64> {
        self.modifiers
            .iter()
            .find(|m| m.kind == PLAYER_LEVEL_MODIFIER)
            .map(|m| m.value)
    }
}

impl From<AuctionEntry> for Listing {
    fn from(e: AuctionEntry) -> Self {
        let pet = e.item.pet_species_id.map(|species_id| PetInfo {
            species_id,
            level: e.item.pet_level.unwrap_or(1),
            quality: e.item.pet_quality_id.unwrap_or(0),
            breed: e.item.pet_breed_id.unwrap_or(0),
        });
        Listing {
            item_id: e.item.id,
            buyout: e.buyout.or(e.unit_price),
            bid: e.bid,
            quantity: e.quantity.unwrap_or(1),
            bonus_ids: e.item.bonus_lists,
            modifiers: e.item.modifiers.unwrap_or_default(),
            pet,
        }
    }
}

// ---------------------------------------------------------------------------
// Targets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ItemTarget {
    pub item_id: u64,
    /// Gold.
    pub max_price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PetTarget {
    pub species_id: u64,
    /// Gold.
    pub max_price: f64,
    pub min_level: u32,
    pub min_quality: i32,
    pub exclude_breeds: BTreeSet<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemScope {
    Explicit(BTreeSet<u64>),
    /// Every weapon/armor id at or above the minimum catalog item level.
    AllEquipment,
}

impl std::fmt::Display for ItemScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemScope::Explicit(ids) => write!(f, "{} listed items", ids.len()),
            ItemScope::AllEquipment => write!(f, "all equipment"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BonusMode {
    Any,
    /// Listing bonus set must equal this set.
    Exact(BTreeSet<i64>),
    /// Base item only: few non-tertiary bonus ids tolerated.
    BaseItem,
}

/// Per-subject reference values resolved at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemBase {
    pub ilvl: i64,
    pub required_level: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemLevelTarget {
    pub scope: ItemScope,
    pub bases: HashMap<u64, ItemBase>,
    pub min_ilvl: i64,
    pub max_ilvl: i64,
    pub required_min_lvl: i64,
    pub required_max_lvl: i64,
    pub require: TertiaryStats,
    pub bonus_mode: BonusMode,
    /// Gold.
    pub max_buyout: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TertiaryStats {
    pub sockets: bool,
    pub leech: bool,
    pub avoidance: bool,
    pub speed: bool,
}

impl TertiaryStats {
    pub fn any(&self) -> bool {
        self.sockets || self.leech || self.avoidance || self.speed
    }

    /// True when every stat demanded by `required` is present in `self`.
    pub fn satisfies(&self, required: &TertiaryStats) -> bool {
        (!required.sockets || self.sockets)
            && (!required.leech || self.leech)
            && (!required.avoidance || self.avoidance)
            && (!required.speed || self.speed)
    }

    pub fn labels(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.sockets {
            out.push("sockets");
        }
        if self.leech {
            out.push("leech");
        }
        if self.avoidance {
            out.push("avoidance");
        }
        if self.speed {
            out.push("speed");
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Match results
// ---------------------------------------------------------------------------

/// A listing (or merged group of listings) that satisfied a target.
/// Prices are copper; price lists are ascending and distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MatchResult {
    Item {
        item_id: u64,
        buyout_prices: Vec<u64>,
        bid_prices: Vec<u64>,
    },
    Pet {
        species_id: u64,
        buyout_prices: Vec<u64>,
        bid_prices: Vec<u64>,
    },
    PetLevel {
        species_id: u64,
        level: u32,
        quality: i32,
        breed: u32,
        buyout: u64,
    },
    ItemLevel {
        item_id: u64,
        buyout: u64,
        tertiary: TertiaryStats,
        bonus_ids: Vec<i64>,
        ilvl: i64,
        required_level: i64,
    },
}

impl MatchResult {
    pub fn subject_id(&self) -> u64 {
        match self {
            MatchResult::Item { item_id, .. } | MatchResult::ItemLevel { item_id, .. } => *item_id,
            MatchResult::Pet { species_id, .. } | MatchResult::PetLevel { species_id, .. } => {
                *species_id
            }
        }
    }

    pub fn is_pet(&self) -> bool {
        matches!(self, MatchResult::Pet { .. } | MatchResult::PetLevel { .. })
    }

    /// Lowest price carried by the record, in copper.
    pub fn min_price(&self) -> Option<u64> {
        match self {
            MatchResult::Item { buyout_prices, bid_prices, .. }
            | MatchResult::Pet { buyout_prices, bid_prices, .. } => buyout_prices
                .first()
                .copied()
                .or_else(|| bid_prices.first().copied()),
            MatchResult::PetLevel { buyout, .. } | MatchResult::ItemLevel { buyout, .. } => {
                Some(*buyout)
            }
        }
    }
}
