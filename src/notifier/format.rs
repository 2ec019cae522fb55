//! Turns match records into embed fields.

use crate::catalog::NameBook;
use crate::config::EMBED_CHUNK_SIZE;
use crate::types::{to_gold, Market, MatchResult, CAGED_PET_ITEM_ID};

use super::payload::{WebhookEmbed, WebhookField, EMBED_COLOR};

/// Price lists longer than this are cut with a "+N more" suffix.
const MAX_PRICES_SHOWN: usize = 8;

const UNDERMINE_URL: &str = "https://undermine.exchange";
const SADDLEBAG_ITEM_URL: &str = "https://saddlebagexchange.com/wow/item-data";
const WOWHEAD_URL: &str = "https://www.wowhead.com";

#[derive(Debug, Clone, Copy, Default)]
pub struct LinkStyle {
    pub no_links: bool,
    pub wowhead: bool,
}

/// `Area 52` → `area-52`, `Kel'Thuzad` → `kelthuzad`.
pub fn realm_slug(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-')
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
}

fn gold(copper: u64) -> String {
    format!("{:.2}g", to_gold(copper))
}

fn price_list(prices: &[u64]) -> String {
    let mut shown: Vec<String> = prices.iter().take(MAX_PRICES_SHOWN).map(|p| gold(*p)).collect();
    if prices.len() > MAX_PRICES_SHOWN {
        shown.push(format!("+{} more", prices.len() - MAX_PRICES_SHOWN));
    }
    shown.join(", ")
}

pub fn price_summary(result: &MatchResult) -> String {
    match result {
        MatchResult::Item { buyout_prices, bid_prices, .. }
        | MatchResult::Pet { buyout_prices, bid_prices, .. } => {
            let mut lines = Vec::new();
            if !buyout_prices.is_empty() {
                lines.push(format!("buyout: {}", price_list(buyout_prices)));
            }
            if !bid_prices.is_empty() {
                lines.push(format!("bid: {}", price_list(bid_prices)));
            }
            lines.join("\n")
        }
        MatchResult::PetLevel { level, quality, breed, buyout, .. } => format!(
            "buyout: {}\nlevel {level} | quality {quality} | breed {breed}",
            gold(*buyout)
        ),
        MatchResult::ItemLevel { buyout, tertiary, bonus_ids, ilvl, required_level, .. } => {
            let mut lines = vec![
                format!("buyout: {}", gold(*buyout)),
                format!("ilvl {ilvl} | required level {required_level}"),
            ];
            let stats = tertiary.labels();
            if !stats.is_empty() {
                lines.push(format!("stats: {}", stats.join(", ")));
            }
            let ids: Vec<String> = bonus_ids.iter().map(|id| id.to_string()).collect();
            lines.push(format!("bonus ids: {}", ids.join(":")));
            lines.join("\n")
        }
    }
}

/// Markdown links for one match. Empty when links are turned off.
pub fn links(result: &MatchResult, market: &Market, style: LinkStyle) -> Vec<String> {
    if style.no_links {
        return Vec::new();
    }
    let region = market.region;
    let mut out = Vec::new();

    let undermine_key = if result.is_pet() {
        format!("{CAGED_PET_ITEM_ID}-{}", result.subject_id())
    } else {
        result.subject_id().to_string()
    };
    if !region.is_classic() && !market.is_commodities() {
        if let Some(realm) = market.names.first() {
            out.push(format!(
                "[Undermine]({UNDERMINE_URL}/#{}-{}/{undermine_key})",
                region.host(),
                realm_slug(realm)
            ));
        }
    }

    if style.wowhead {
        let section = if region.is_classic() { "classic/" } else { "" };
        let path = if result.is_pet() {
            format!("battle-pet/{}", result.subject_id())
        } else {
            format!("item={}", result.subject_id())
        };
        out.push(format!("[Wowhead]({WOWHEAD_URL}/{section}{path})"));
    } else if !result.is_pet() {
        out.push(format!("[Saddlebag]({SADDLEBAG_ITEM_URL}/{})", result.subject_id()));
    }
    out
}

pub fn field_for(result: &MatchResult, market: &Market, names: &NameBook, style: LinkStyle) -> WebhookField {
    let mut value = price_summary(result);
    let links = links(result, market, style);
    if !links.is_empty() {
        value.push('\n');
        value.push_str(&links.join(" | "));
    }
    WebhookField {
        name: format!("{} ({})", names.for_match(result), result.subject_id()),
        value,
        inline: false,
    }
}

/// One embed per chunk of at most `EMBED_CHUNK_SIZE` matches, sharing a header.
pub fn build_embeds(
    market: &Market,
    results: &[MatchResult],
    names: &NameBook,
    style: LinkStyle,
) -> Vec<WebhookEmbed> {
    let description = format!("**market id:** {}\n**realms:** {}", market.id, market.display_name());
    results
        .chunks(EMBED_CHUNK_SIZE)
        .map(|chunk| WebhookEmbed {
            title: format!("{} snipe", market.region),
            description: description.clone(),
            color: EMBED_COLOR,
            fields: chunk.iter().map(|r| field_for(r, market, names, style)).collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Region, TertiaryStats};
    use std::collections::HashMap;

    fn area52() -> Market {
        Market { id: 3676, names: vec!["Area 52".into(), "Blackrock".into()], region: Region::Na }
    }

    fn item(id: u64, prices: Vec<u64>) -> MatchResult {
        MatchResult::Item { item_id: id, buyout_prices: prices, bid_prices: vec![] }
    }

    #[test]
    fn slugs_strip_punctuation() {
        assert_eq!(realm_slug("Area 52"), "area-52");
        assert_eq!(realm_slug("Kel'Thuzad"), "kelthuzad");
        assert_eq!(realm_slug("Azjol-Nerub"), "azjol-nerub");
    }

    #[test]
    fn retail_realm_gets_undermine_and_saddlebag() {
        let l = links(&item(1234, vec![1]), &area52(), LinkStyle::default());
        assert_eq!(
            l,
            vec![
                "[Undermine](https://undermine.exchange/#us-area-52/1234)".to_string(),
                "[Saddlebag](https://saddlebagexchange.com/wow/item-data/1234)".to_string(),
            ]
        );
    }

    #[test]
    fn wowhead_replaces_saddlebag_and_no_links_wins() {
        let style = LinkStyle { wowhead: true, no_links: false };
        let l = links(&item(1234, vec![1]), &area52(), style);
        assert_eq!(l[1], "[Wowhead](https://www.wowhead.com/item=1234)");

        let none = LinkStyle { wowhead: true, no_links: true };
        assert!(links(&item(1234, vec![1]), &area52(), none).is_empty());
    }

    #[test]
    fn commodities_skip_realm_link() {
        let market = Market { id: -1, names: vec!["Commodities".into()], region: Region::Na };
        let l = links(&item(5, vec![1]), &market, LinkStyle::default());
        assert_eq!(l.len(), 1);
        assert!(l[0].starts_with("[Saddlebag]"));
    }

    #[test]
    fn item_level_summary_lists_details() {
        let r = MatchResult::ItemLevel {
            item_id: 200,
            buyout: 1_000_000,
            tertiary: TertiaryStats { sockets: true, ..Default::default() },
            bonus_ids: vec![523, 6652],
            ilvl: 360,
            required_level: 70,
        };
        let s = price_summary(&r);
        assert!(s.contains("buyout: 100.00g"));
        assert!(s.contains("ilvl 360 | required level 70"));
        assert!(s.contains("stats: sockets"));
        assert!(s.contains("bonus ids: 523:6652"));
    }

    #[test]
    fn long_price_lists_are_cut() {
        let prices: Vec<u64> = (1..=10).map(|g| g * 10_000).collect();
        let s = price_summary(&item(1, prices));
        assert!(s.ends_with("+2 more"));
    }

    #[test]
    fn embeds_chunk_at_ten_fields() {
        let results: Vec<MatchResult> = (0..23).map(|i| item(i, vec![100])).collect();
        let names = NameBook {
            items: HashMap::from([(0, "Copper Ore".to_string())]),
            pets: HashMap::new(),
        };
        let embeds = build_embeds(&area52(), &results, &names, LinkStyle::default());
        assert_eq!(embeds.iter().map(|e| e.fields.len()).collect::<Vec<_>>(), vec![10, 10, 3]);
        assert_eq!(embeds[0].title, "NA snipe");
        assert!(embeds[2].description.contains("3676"));
        assert!(embeds[2].description.contains("Area 52, Blackrock"));
        assert_eq!(embeds[0].fields[0].name, "Copper Ore (0)");
        assert_eq!(embeds[0].fields[1].name, "Item 1 (1)");
    }
}
