//! Pure listing → match logic. No I/O; every input is a read-only reference
//! into the run snapshot.

pub mod ilvl;
pub mod item;
pub mod pet;

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::catalog::{BonusCatalog, TargetCatalog};
use crate::types::{Listing, MatchResult};

pub struct MatchContext<'a> {
    pub targets: &'a TargetCatalog,
    pub bonuses: &'a BonusCatalog,
    pub show_bid_prices: bool,
}

/// Every match kind is evaluated independently; a listing may produce several.
pub fn match_listing(listing: &Listing, ctx: &MatchContext<'_>) -> Vec<MatchResult> {
    let mut out = Vec::new();
    if let Some(r) = item::match_item(listing, &ctx.targets.items, ctx.show_bid_prices) {
        out.push(r);
    }
    if let Some(r) = item::match_pet(listing, &ctx.targets.pets, ctx.show_bid_prices) {
        out.push(r);
    }
    if let Some(r) = pet::match_pet_level(listing, &ctx.targets.pet_levels) {
        out.push(r);
    }
    if let Some(r) = ilvl::match_item_level(listing, &ctx.targets.item_levels, ctx.bonuses) {
        out.push(r);
    }
    out
}

/// Matches a whole market's listings. `should_stop` is polled between listings;
/// when it returns true the matches gathered so far are returned.
pub fn match_listings(
    listings: &[Listing],
    ctx: &MatchContext<'_>,
    should_stop: impl Fn() -> bool,
) -> Vec<MatchResult> {
    let mut raw = Vec::new();
    for listing in listings {
        if should_stop() {
            break;
        }
        raw.extend(match_listing(listing, ctx));
    }
    merge_results(raw)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum PricedKind {
    Item,
    Pet,
}

/// Folds per-listing item/pet matches into one record per subject carrying
/// ascending distinct prices. Structured matches are deduplicated in order.
pub fn merge_results(results: Vec<MatchResult>) -> Vec<MatchResult> {
    let mut priced: BTreeMap<(PricedKind, u64), (BTreeSet<u64>, BTreeSet<u64>)> = BTreeMap::new();
    let mut structured = Vec::new();
    let mut seen = HashSet::new();

    for r in results {
        match r {
            MatchResult::Item { item_id, buyout_prices, bid_prices } => {
                let entry = priced.entry((PricedKind::Item, item_id)).or_default();
                entry.0.extend(buyout_prices);
                entry.1.extend(bid_prices);
            }
            MatchResult::Pet { species_id, buyout_prices, bid_prices } => {
                let entry = priced.entry((PricedKind::Pet, species_id)).or_default();
                entry.0.extend(buyout_prices);
                entry.1.extend(bid_prices);
            }
            other => {
                if seen.insert(other.clone()) {
                    structured.push(other);
                }
            }
        }
    }

    let mut merged: Vec<MatchResult> = priced
        .into_iter()
        .map(|((kind, id), (buyouts, bids))| {
            let buyout_prices = buyouts.into_iter().collect();
            let bid_prices = bids.into_iter().collect();
            match kind {
                PricedKind::Item => MatchResult::Item { item_id: id, buyout_prices, bid_prices },
                PricedKind::Pet => MatchResult::Pet { species_id: id, buyout_prices, bid_prices },
            }
        })
        .collect();
    merged.extend(structured);
    merged
}
