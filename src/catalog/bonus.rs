use std::collections::{BTreeSet, HashMap, HashSet};

use serde_json::Value;

use crate::types::TertiaryStats;

/// Bonus-id effects: socket/tertiary membership and item-level deltas.
#[derive(Debug, Clone, Default)]
pub struct BonusCatalog {
    pub sockets: HashSet<i64>,
    pub leech: HashSet<i64>,
    pub avoidance: HashSet<i64>,
    pub speed: HashSet<i64>,
    /// bonus id → item level delta
    pub ilvl_deltas: HashMap<i64, i64>,
}

impl BonusCatalog {
    /// Builds the catalog from the static bonus reference (`id → definition`).
    ///
    /// - a definition carrying a `socket` field marks a socket bonus
    /// - a `rawStats` entry naming Leech/Avoidance/Speed marks that tertiary
    /// - a definition whose only fields are `id` and `level` is a level delta
    pub fn from_reference(raw: &HashMap<String, Value>) -> Self {
        let mut catalog = Self::default();
        for (key, def) in raw {
            let Some(obj) = def.as_object() else { continue };
            let id = obj
                .get("id")
                .and_then(Value::as_i64)
                .or_else(|| key.trim().parse::<i64>().ok());
            let Some(id) = id else { continue };

            if obj.get("socket").is_some_and(|v| !v.is_null()) {
                catalog.sockets.insert(id);
            }

            if let Some(stats) = obj.get("rawStats").and_then(Value::as_array) {
                for stat in stats {
                    let name = stat
                        .get("name")
                        .and_then(Value::as_str)
                        .or_else(|| stat.as_str())
                        .unwrap_or("")
                        .to_lowercase();
                    if name.contains("leech") {
                        catalog.leech.insert(id);
                    } else if name.contains("avoidance") {
                        catalog.avoidance.insert(id);
                    } else if name.contains("speed") {
                        catalog.speed.insert(id);
                    }
                }
            }

            if obj.len() == 2 && obj.contains_key("id") {
                if let Some(level) = obj.get("level").and_then(Value::as_i64) {
                    catalog.ilvl_deltas.insert(id, level);
                }
            }
        }
        catalog
    }

    pub fn tertiary_stats(&self, bonus_ids: &[i64]) -> TertiaryStats {
        TertiaryStats {
            sockets: bonus_ids.iter().any(|id| self.sockets.contains(id)),
            leech: bonus_ids.iter().any(|id| self.leech.contains(id)),
            avoidance: bonus_ids.iter().any(|id| self.avoidance.contains(id)),
            speed: bonus_ids.iter().any(|id| self.speed.contains(id)),
        }
    }

    pub fn is_tertiary(&self, id: i64) -> bool {
        self.sockets.contains(&id)
            || self.leech.contains(&id)
            || self.avoidance.contains(&id)
            || self.speed.contains(&id)
    }

    /// Sum of level deltas for every distinct id that carries one.
    pub fn ilvl_delta(&self, bonus_ids: &BTreeSet<i64>) -> i64 {
        bonus_ids
            .iter()
            .filter_map(|id| self.ilvl_deltas.get(id))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> HashMap<String, Value> {
        serde_json::from_value(serde_json::json!({
            "523": { "id": 523, "socket": 1 },
            "40":  { "id": 40, "rawStats": [{ "name": "Avoidance", "amount": 10 }] },
            "41":  { "id": 41, "rawStats": [{ "name": "Leech" }] },
            "42":  { "id": 42, "rawStats": [{ "name": "Speed" }] },
            "6652": { "id": 6652, "level": 10 },
            "7000": { "id": 7000, "level": 5, "quality": 4 },
            "junk": "not an object"
        }))
        .unwrap()
    }

    #[test]
    fn classifies_reference_entries() {
        let c = BonusCatalog::from_reference(&reference());
        assert!(c.sockets.contains(&523));
        assert!(c.avoidance.contains(&40));
        assert!(c.leech.contains(&41));
        assert!(c.speed.contains(&42));
        assert_eq!(c.ilvl_deltas.get(&6652), Some(&10));
        // extra fields disqualify a level delta
        assert!(!c.ilvl_deltas.contains_key(&7000));
    }

    #[test]
    fn tertiary_vector_from_bonus_ids() {
        let c = BonusCatalog::from_reference(&reference());
        let stats = c.tertiary_stats(&[523, 42, 9999]);
        assert!(stats.sockets && stats.speed);
        assert!(!stats.leech && !stats.avoidance);
        assert!(c.is_tertiary(41));
        assert!(!c.is_tertiary(6652));
    }

    #[test]
    fn deltas_sum_and_are_monotonic() {
        let c = BonusCatalog::from_reference(&reference());
        let set = |ids: &[i64]| ids.iter().copied().collect::<BTreeSet<i64>>();
        assert_eq!(c.ilvl_delta(&set(&[])), 0);
        assert_eq!(c.ilvl_delta(&set(&[6652, 523])), 10);
        let before = c.ilvl_delta(&set(&[523]));
        let after = c.ilvl_delta(&set(&[523, 6652]));
        assert!(after >= before);
    }

    #[test]
    fn repeated_delta_id_counts_once() {
        let c = BonusCatalog::from_reference(&reference());
        let ids: BTreeSet<i64> = [6652, 6652, 523].into_iter().collect();
        assert_eq!(c.ilvl_delta(&ids), 10);
    }
}
