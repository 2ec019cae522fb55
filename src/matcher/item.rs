use std::collections::HashMap;

use crate::types::{to_gold, Listing, MatchResult, PetTarget, ItemTarget, CAGED_PET_ITEM_ID};

/// Prices (buyout, bid) strictly below `max_price` gold. Bids only count when shown.
fn prices_under(listing: &Listing, max_price: f64, show_bids: bool) -> Option<(Vec<u64>, Vec<u64>)> {
    let buyout: Vec<u64> = listing
        .buyout
        .filter(|&p| to_gold(p) < max_price)
        .into_iter()
        .collect();
    let bid: Vec<u64> = if show_bids {
        listing.bid.filter(|&p| to_gold(p) < max_price).into_iter().collect()
    } else {
        Vec::new()
    };
    if buyout.is_empty() && bid.is_empty() {
        None
    } else {
        Some((buyout, bid))
    }
}

pub fn match_item(
    listing: &Listing,
    items: &HashMap<u64, ItemTarget>,
    show_bids: bool,
) -> Option<MatchResult> {
    let target = items.get(&listing.item_id)?;
    let (buyout_prices, bid_prices) = prices_under(listing, target.max_price, show_bids)?;
    Some(MatchResult::Item { item_id: listing.item_id, buyout_prices, bid_prices })
}

/// Caged pets are matched on species; level, quality and breed are not screened here.
pub fn match_pet(
    listing: &Listing,
    pets: &HashMap<u64, PetTarget>,
    show_bids: bool,
) -> Option<MatchResult> {
    if listing.item_id != CAGED_PET_ITEM_ID {
        return None;
    }
    let pet = listing.pet?;
    let target = pets.get(&pet.species_id)?;
    let (buyout_prices, bid_prices) = prices_under(listing, target.max_price, show_bids)?;
    Some(MatchResult::Pet { species_id: pet.species_id, buyout_prices, bid_prices })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PetInfo;
    use std::collections::BTreeSet;

    fn items() -> HashMap<u64, ItemTarget> {
        HashMap::from([(1234, ItemTarget { item_id: 1234, max_price: 100.0 })])
    }

    fn listing(item_id: u64, buyout: Option<u64>, bid: Option<u64>) -> Listing {
        Listing { item_id, buyout, bid, quantity: 1, ..Default::default() }
    }

    #[test]
    fn buyout_below_ceiling_matches() {
        let r = match_item(&listing(1234, Some(950_000), None), &items(), false).unwrap();
        assert_eq!(r.min_price().map(to_gold), Some(95.0));
    }

    #[test]
    fn price_comparison_is_strict() {
        assert!(match_item(&listing(1234, Some(1_000_001), None), &items(), false).is_none());
        assert!(match_item(&listing(1234, Some(1_000_000), None), &items(), false).is_none());
        assert!(match_item(&listing(1234, Some(999_999), None), &items(), false).is_some());
    }

    #[test]
    fn unknown_item_is_ignored() {
        assert!(match_item(&listing(1, Some(1), None), &items(), false).is_none());
    }

    #[test]
    fn bids_only_count_when_shown() {
        let l = listing(1234, None, Some(500_000));
        assert!(match_item(&l, &items(), false).is_none());
        match match_item(&l, &items(), true) {
            Some(MatchResult::Item { buyout_prices, bid_prices, .. }) => {
                assert!(buyout_prices.is_empty());
                assert_eq!(bid_prices, vec![500_000]);
            }
            other => panic!("expected item match, got {other:?}"),
        }
    }

    #[test]
    fn pet_matches_on_species_regardless_of_breed() {
        let pets = HashMap::from([(
            50,
            PetTarget {
                species_id: 50,
                max_price: 200.0,
                min_level: 25,
                min_quality: 3,
                exclude_breeds: BTreeSet::from([4]),
            },
        )]);
        let l = Listing {
            item_id: CAGED_PET_ITEM_ID,
            buyout: Some(1_500_000),
            pet: Some(PetInfo { species_id: 50, level: 1, quality: 0, breed: 4 }),
            ..Default::default()
        };
        let r = match_pet(&l, &pets, false).unwrap();
        assert_eq!(r.subject_id(), 50);

        let not_caged = Listing { item_id: 999, ..l.clone() };
        assert!(match_pet(&not_caged, &pets, false).is_none());
    }
}
