use std::collections::{BTreeMap, HashMap};

use crate::config::RUSSIAN_REALM_IDS;
use crate::types::{Market, Region};

/// Groups `realm name → connected realm id` into markets, one per connected id.
/// Retail regions also get their region-wide commodity pool.
pub fn build_markets(
    region: Region,
    realm_ids: &HashMap<String, i64>,
    no_russian_realms: bool,
) -> Vec<Market> {
    let mut grouped: BTreeMap<i64, Vec<String>> = BTreeMap::new();
    for (name, id) in realm_ids {
        if no_russian_realms && RUSSIAN_REALM_IDS.contains(id) {
            continue;
        }
        grouped.entry(*id).or_default().push(name.clone());
    }

    let mut markets: Vec<Market> = Vec::with_capacity(grouped.len() + 1);
    if let Some(id) = region.commodity_market_id() {
        markets.push(Market { id, names: vec!["Commodities".to_string()], region });
    }
    for (id, mut names) in grouped {
        names.sort();
        markets.push(Market { id, names, region });
    }
    markets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn realms() -> HashMap<String, i64> {
        HashMap::from([
            ("Stormrage".to_string(), 3676),
            ("Area 52".to_string(), 3676),
            ("Gordunni".to_string(), 1602),
            ("Draenor".to_string(), 1403),
        ])
    }

    #[test]
    fn groups_realms_by_connected_id() {
        let markets = build_markets(Region::Eu, &realms(), false);
        let ids: Vec<i64> = markets.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![-2, 1403, 1602, 3676]);
        assert_eq!(markets[3].names, vec!["Area 52", "Stormrage"]);
        assert!(markets[0].is_commodities());
    }

    #[test]
    fn russian_realms_can_be_excluded() {
        let markets = build_markets(Region::Eu, &realms(), true);
        assert!(markets.iter().all(|m| m.id != 1602));
    }

    #[test]
    fn classic_has_no_commodity_pool() {
        let markets = build_markets(Region::NaClassic, &realms(), false);
        assert!(markets.iter().all(|m| !m.is_commodities()));
    }
}
