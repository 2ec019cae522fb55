//! Item-level rules: effective item level from bonus deltas, required level
//! from the player-level modifier, tertiary stats from bonus membership.

use std::collections::BTreeSet;

use crate::catalog::BonusCatalog;
use crate::config::{BASE_ITEM_BONUS_TOLERANCE, BASE_ITEM_DENY_LIST};
use crate::types::{to_gold, BonusMode, ItemLevelTarget, Listing, MatchResult};

/// Why a listing failed an item-level rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    NotGoverned,
    NoBonusList,
    MissingTertiary,
    IlvlOutOfRange(i64),
    RequiredLevelOutOfRange(i64),
    BonusMismatch,
    TooManyBonuses(usize),
    DenyListed,
    NoPrice,
    OverBudget,
}

pub fn evaluate(
    listing: &Listing,
    rule: &ItemLevelTarget,
    bonuses: &BonusCatalog,
) -> Result<MatchResult, Rejection> {
    let base = rule.bases.get(&listing.item_id).ok_or(Rejection::NotGoverned)?;
    let bonus_ids = listing.bonus_ids.as_deref().ok_or(Rejection::NoBonusList)?;

    let required_level = listing
        .required_level_modifier()
        .unwrap_or(base.required_level);

    let tertiary = bonuses.tertiary_stats(bonus_ids);
    if rule.require.any() && !tertiary.satisfies(&rule.require) {
        return Err(Rejection::MissingTertiary);
    }

    let listed: BTreeSet<i64> = bonus_ids.iter().copied().collect();
    let ilvl = base.ilvl + bonuses.ilvl_delta(&listed);
    if ilvl < rule.min_ilvl || ilvl > rule.max_ilvl {
        return Err(Rejection::IlvlOutOfRange(ilvl));
    }

    if required_level < rule.required_min_lvl || required_level > rule.required_max_lvl {
        return Err(Rejection::RequiredLevelOutOfRange(required_level));
    }

    match &rule.bonus_mode {
        BonusMode::Any => {}
        BonusMode::Exact(wanted) => {
            if &listed != wanted {
                return Err(Rejection::BonusMismatch);
            }
        }
        BonusMode::BaseItem => {
            if BASE_ITEM_DENY_LIST.contains(&listing.item_id) {
                return Err(Rejection::DenyListed);
            }
            let leftover = listed.iter().filter(|id| !bonuses.is_tertiary(**id)).count();
            if leftover > BASE_ITEM_BONUS_TOLERANCE {
                return Err(Rejection::TooManyBonuses(leftover));
            }
        }
    }

    let buyout = listing.buyout.or(listing.bid).ok_or(Rejection::NoPrice)?;
    if to_gold(buyout) > rule.max_buyout {
        return Err(Rejection::OverBudget);
    }

    Ok(MatchResult::ItemLevel {
        item_id: listing.item_id,
        buyout,
        tertiary,
        bonus_ids: listed.into_iter().collect(),
        ilvl,
        required_level,
    })
}

/// First rule governing the listing's item that accepts it.
pub fn match_item_level(
    listing: &Listing,
    rules: &[ItemLevelTarget],
    bonuses: &BonusCatalog,
) -> Option<MatchResult> {
    rules.iter().find_map(|rule| evaluate(listing, rule, bonuses).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ItemBase, ItemScope, Modifier, TertiaryStats, PLAYER_LEVEL_MODIFIER};
    use std::collections::HashMap;

    const SOCKET: i64 = 523;
    const PLUS_TEN: i64 = 6652;
    const SPEED: i64 = 42;

    fn bonuses() -> BonusCatalog {
        BonusCatalog {
            sockets: [SOCKET].into(),
            speed: [SPEED].into(),
            ilvl_deltas: HashMap::from([(PLUS_TEN, 10), (7000, 5)]),
            ..Default::default()
        }
    }

    fn socket_rule() -> ItemLevelTarget {
        ItemLevelTarget {
            scope: ItemScope::AllEquipment,
            bases: HashMap::from([(200, ItemBase { ilvl: 350, required_level: 70 })]),
            min_ilvl: 360,
            max_ilvl: 10_000,
            required_min_lvl: 1,
            required_max_lvl: 1_000,
            require: TertiaryStats { sockets: true, ..Default::default() },
            bonus_mode: BonusMode::Any,
            max_buyout: 50_000.0,
        }
    }

    fn listing(bonus_ids: Option<Vec<i64>>) -> Listing {
        Listing {
            item_id: 200,
            buyout: Some(1_000_000),
            quantity: 1,
            bonus_ids,
            ..Default::default()
        }
    }

    #[test]
    fn socketed_upgrade_matches_at_resolved_ilvl() {
        let r = evaluate(&listing(Some(vec![PLUS_TEN, SOCKET])), &socket_rule(), &bonuses()).unwrap();
        match r {
            MatchResult::ItemLevel { ilvl, required_level, tertiary, bonus_ids, buyout, .. } => {
                assert_eq!(ilvl, 360);
                assert_eq!(required_level, 70);
                assert!(tertiary.sockets);
                assert_eq!(bonus_ids, vec![SOCKET, PLUS_TEN]);
                assert_eq!(buyout, 1_000_000);
            }
            other => panic!("expected item level match, got {other:?}"),
        }
    }

    #[test]
    fn missing_socket_is_rejected() {
        let err = evaluate(&listing(Some(vec![PLUS_TEN])), &socket_rule(), &bonuses()).unwrap_err();
        assert_eq!(err, Rejection::MissingTertiary);
    }

    #[test]
    fn listing_without_bonus_list_is_skipped() {
        assert_eq!(
            evaluate(&listing(None), &socket_rule(), &bonuses()).unwrap_err(),
            Rejection::NoBonusList
        );
    }

    #[test]
    fn ungoverned_item_is_skipped() {
        let mut l = listing(Some(vec![SOCKET, PLUS_TEN]));
        l.item_id = 201;
        assert_eq!(evaluate(&l, &socket_rule(), &bonuses()).unwrap_err(), Rejection::NotGoverned);
    }

    #[test]
    fn ilvl_outside_range_is_rejected() {
        let err = evaluate(&listing(Some(vec![SOCKET])), &socket_rule(), &bonuses()).unwrap_err();
        assert_eq!(err, Rejection::IlvlOutOfRange(350));

        let mut capped = socket_rule();
        capped.max_ilvl = 364;
        let err = evaluate(&listing(Some(vec![SOCKET, PLUS_TEN, 7000])), &capped, &bonuses()).unwrap_err();
        assert_eq!(err, Rejection::IlvlOutOfRange(365));
    }

    #[test]
    fn repeated_bonus_id_applies_its_delta_once() {
        let r = evaluate(&listing(Some(vec![PLUS_TEN, SOCKET, PLUS_TEN])), &socket_rule(), &bonuses()).unwrap();
        match r {
            MatchResult::ItemLevel { ilvl, bonus_ids, .. } => {
                assert_eq!(ilvl, 360);
                assert_eq!(bonus_ids, vec![SOCKET, PLUS_TEN]);
            }
            other => panic!("expected item level match, got {other:?}"),
        }
    }

    #[test]
    fn adding_a_delta_never_lowers_ilvl() {
        let mut rule = socket_rule();
        rule.min_ilvl = 0;
        rule.require = TertiaryStats::default();
        let ilvl_of = |ids: Vec<i64>| match evaluate(&listing(Some(ids)), &rule, &bonuses()) {
            Ok(MatchResult::ItemLevel { ilvl, .. }) => ilvl,
            other => panic!("expected match, got {other:?}"),
        };
        let mut ids = vec![SOCKET];
        let mut last = ilvl_of(ids.clone());
        for extra in [PLUS_TEN, 7000, 9999] {
            ids.push(extra);
            let next = ilvl_of(ids.clone());
            assert!(next >= last);
            last = next;
        }
    }

    #[test]
    fn required_level_prefers_modifier() {
        let mut rule = socket_rule();
        rule.required_max_lvl = 60;
        let mut l = listing(Some(vec![SOCKET, PLUS_TEN]));
        assert_eq!(
            evaluate(&l, &rule, &bonuses()).unwrap_err(),
            Rejection::RequiredLevelOutOfRange(70)
        );

        l.modifiers = vec![Modifier { kind: PLAYER_LEVEL_MODIFIER, value: 58 }];
        match evaluate(&l, &rule, &bonuses()).unwrap() {
            MatchResult::ItemLevel { required_level, .. } => assert_eq!(required_level, 58),
            other => panic!("expected match, got {other:?}"),
        }
    }

    #[test]
    fn exact_bonus_set_requires_equality() {
        let mut rule = socket_rule();
        rule.bonus_mode = BonusMode::Exact([SOCKET, PLUS_TEN].into());

        assert!(evaluate(&listing(Some(vec![PLUS_TEN, SOCKET])), &rule, &bonuses()).is_ok());
        // superset
        assert_eq!(
            evaluate(&listing(Some(vec![PLUS_TEN, SOCKET, 1])), &rule, &bonuses()).unwrap_err(),
            Rejection::BonusMismatch
        );
        // subset with the same resolved level
        rule.bonus_mode = BonusMode::Exact([SOCKET, PLUS_TEN, SPEED].into());
        assert_eq!(
            evaluate(&listing(Some(vec![PLUS_TEN, SOCKET])), &rule, &bonuses()).unwrap_err(),
            Rejection::BonusMismatch
        );
    }

    #[test]
    fn base_item_mode_tolerates_few_extra_ids() {
        let mut rule = socket_rule();
        rule.bonus_mode = BonusMode::BaseItem;
        rule.require = TertiaryStats::default();
        rule.min_ilvl = 350;

        // tertiary ids are stripped before counting
        assert!(evaluate(&listing(Some(vec![SOCKET, SPEED, 1, 2, 3])), &rule, &bonuses()).is_ok());
        assert_eq!(
            evaluate(&listing(Some(vec![1, 2, 3, 4])), &rule, &bonuses()).unwrap_err(),
            Rejection::TooManyBonuses(4)
        );
    }

    #[test]
    fn base_item_mode_rejects_deny_listed_items() {
        let denied = BASE_ITEM_DENY_LIST[0];
        let mut rule = socket_rule();
        rule.bonus_mode = BonusMode::BaseItem;
        rule.require = TertiaryStats::default();
        rule.min_ilvl = 0;
        rule.bases = HashMap::from([(denied, ItemBase { ilvl: 350, required_level: 70 })]);
        let mut l = listing(Some(vec![]));
        l.item_id = denied;
        assert_eq!(evaluate(&l, &rule, &bonuses()).unwrap_err(), Rejection::DenyListed);
    }

    #[test]
    fn bid_stands_in_for_missing_buyout() {
        let mut l = listing(Some(vec![SOCKET, PLUS_TEN]));
        l.buyout = None;
        l.bid = Some(400_000_000);
        match evaluate(&l, &socket_rule(), &bonuses()).unwrap() {
            MatchResult::ItemLevel { buyout, .. } => assert_eq!(buyout, 400_000_000),
            other => panic!("expected match, got {other:?}"),
        }

        l.bid = None;
        assert_eq!(evaluate(&l, &socket_rule(), &bonuses()).unwrap_err(), Rejection::NoPrice);
    }

    #[test]
    fn over_budget_is_rejected() {
        let mut l = listing(Some(vec![SOCKET, PLUS_TEN]));
        l.buyout = Some(500_000_001);
        assert_eq!(evaluate(&l, &socket_rule(), &bonuses()).unwrap_err(), Rejection::OverBudget);
    }

    #[test]
    fn first_accepting_rule_wins() {
        let mut strict = socket_rule();
        strict.min_ilvl = 400;
        let loose = socket_rule();
        let r = match_item_level(&listing(Some(vec![SOCKET, PLUS_TEN])), &[strict, loose], &bonuses());
        assert!(r.is_some());
    }
}
