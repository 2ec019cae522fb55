use crate::types::{to_gold, Listing, MatchResult, PetTarget, CAGED_PET_ITEM_ID};

/// Screens a caged pet against the level/quality/breed rules for its species.
/// Emits one result when any rule for the species accepts it.
pub fn match_pet_level(listing: &Listing, rules: &[PetTarget]) -> Option<MatchResult> {
    if listing.item_id != CAGED_PET_ITEM_ID {
        return None;
    }
    let pet = listing.pet?;
    let buyout = listing.buyout?;

    rules
        .iter()
        .filter(|r| r.species_id == pet.species_id)
        .find(|r| {
            pet.level >= r.min_level
                && pet.quality >= r.min_quality
                && !r.exclude_breeds.contains(&pet.breed)
                && to_gold(buyout) <= r.max_price
        })
        .map(|_| MatchResult::PetLevel {
            species_id: pet.species_id,
            level: pet.level,
            quality: pet.quality,
            breed: pet.breed,
            buyout,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PetInfo;
    use std::collections::BTreeSet;

    fn rule() -> PetTarget {
        PetTarget {
            species_id: 50,
            max_price: 200.0,
            min_level: 25,
            min_quality: 3,
            exclude_breeds: BTreeSet::from([4]),
        }
    }

    fn pet_listing(level: u32, quality: i32, breed: u32, buyout: u64) -> Listing {
        Listing {
            item_id: CAGED_PET_ITEM_ID,
            buyout: Some(buyout),
            pet: Some(PetInfo { species_id: 50, level, quality, breed }),
            ..Default::default()
        }
    }

    #[test]
    fn qualifying_pet_matches_with_price() {
        let r = match_pet_level(&pet_listing(25, 3, 5, 1_500_000), &[rule()]).unwrap();
        match r {
            MatchResult::PetLevel { species_id, level, quality, breed, buyout } => {
                assert_eq!((species_id, level, quality, breed), (50, 25, 3, 5));
                assert_eq!(to_gold(buyout), 150.0);
            }
            other => panic!("expected pet level match, got {other:?}"),
        }
    }

    #[test]
    fn excluded_breed_is_rejected() {
        assert!(match_pet_level(&pet_listing(25, 3, 4, 1_500_000), &[rule()]).is_none());
    }

    #[test]
    fn low_level_or_quality_is_rejected() {
        assert!(match_pet_level(&pet_listing(24, 3, 5, 1_500_000), &[rule()]).is_none());
        assert!(match_pet_level(&pet_listing(25, 2, 5, 1_500_000), &[rule()]).is_none());
    }

    #[test]
    fn price_above_ceiling_is_rejected() {
        assert!(match_pet_level(&pet_listing(25, 3, 5, 2_000_001), &[rule()]).is_none());
        assert!(match_pet_level(&pet_listing(25, 3, 5, 2_000_000), &[rule()]).is_some());
    }

    #[test]
    fn bid_only_pet_is_ignored() {
        let mut listing = pet_listing(25, 3, 5, 1_500_000);
        listing.buyout = None;
        listing.bid = Some(1_000_000);
        assert!(match_pet_level(&listing, &[rule()]).is_none());
    }

    #[test]
    fn other_species_is_ignored() {
        let mut other = rule();
        other.species_id = 51;
        assert!(match_pet_level(&pet_listing(25, 3, 5, 1), &[other]).is_none());
    }
}
