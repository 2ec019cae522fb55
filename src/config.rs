use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{AppError, Result};
use crate::types::{Faction, Region};

pub const OAUTH_URL: &str = "https://oauth.battle.net/token";
pub const REFERENCE_API_URL: &str = "https://api.saddlebagexchange.com/api/wow/reference";
pub const REFERENCE_MIRROR_URL: &str =
    "https://raw.githubusercontent.com/ff14-advanced-market-search/AzerothAuctionAssassin/main/AzerothAuctionAssassinData/reference";

pub const DEFAULT_DATA_DIR: &str = "AzerothAuctionAssassinData";
pub const SETTINGS_FILE: &str = "mega_data.json";

/// Worker pool size when MEGA_THREADS is missing, non-numeric or <= 1.
pub const DEFAULT_THREADS: usize = 48;

/// Scan window around each market's publish minute (minutes).
pub const DEFAULT_SCAN_TIME_MIN: i64 = 1;
pub const DEFAULT_SCAN_TIME_MAX: i64 = 3;

pub const DEFAULT_API_PORT: u16 = 3000;

/// Tokens live ~24h; refresh after 20h.
pub const TOKEN_REFRESH_AFTER_SECS: i64 = 20 * 3600;
pub const AUTH_MAX_ATTEMPTS: u32 = 10;

pub const FETCH_TIMEOUT_SECS: u64 = 20;
pub const FETCH_MAX_ATTEMPTS: u32 = 10;
/// Sleep after an HTTP 429 before retrying (milliseconds).
pub const RATE_LIMIT_SLEEP_MS: u64 = 1_000;

/// Standard retry backoff in milliseconds; the last value repeats.
pub const RETRY_BACKOFF_MS: &[u64] = &[250, 500, 1_000, 2_000];

pub const NOTIFY_MAX_ATTEMPTS: u32 = 3;
/// Webhook embeds accept at most this many fields per message.
pub const EMBED_CHUNK_SIZE: usize = 10;

/// Control loop sleep when no market is due (milliseconds).
pub const TICK_INTERVAL_MS: u64 = 1_000;

/// Minute of the hour at which the alert log is cleared when REFRESH_ALERTS is on.
pub const REFRESH_CLEAR_MINUTE: u32 = 1;

pub const PROGRESS_CHANNEL_CAPACITY: usize = 256;

/// "All equipment" item-level rules cover weapon (2) and armor (4) at or above this level.
pub const MIN_CATALOG_ILVL: i64 = 201;
pub const EQUIPMENT_ITEM_CLASSES: &[u32] = &[2, 4];

/// Base-item rules tolerate this many leftover (cosmetic/enchant) bonus ids.
pub const BASE_ITEM_BONUS_TOLERANCE: usize = 3;

/// Subjects never matched by base-item rules: their unmodified listings carry
/// level bonuses that the tolerance check cannot tell apart from upgrades.
pub const BASE_ITEM_DENY_LIST: &[u64] = &[204790, 204791, 204792, 204793];

/// Connected realms hosted in Russia (EU), skipped when NO_RUSSIAN_REALMS is set.
pub const RUSSIAN_REALM_IDS: &[i64] = &[
    1602, 1604, 1605, 1614, 1615, 1623, 1922, 1923, 1924, 1925, 1926, 1927, 1928, 1929,
];

#[derive(Debug, Clone)]
pub struct Settings {
    pub webhook_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub region: Region,
    pub faction: Faction,
    /// Worker pool size (MEGA_THREADS)
    pub threads: usize,
    pub scan_time_min: i64,
    pub scan_time_max: i64,
    /// Minutes of the hour at which every market is scanned (EXTRA_ALERTS)
    pub extra_alert_minutes: Vec<u32>,
    pub show_bid_prices: bool,
    pub wowhead_link: bool,
    pub no_links: bool,
    pub no_russian_realms: bool,
    pub refresh_alerts: bool,
    /// Token price alert threshold in gold; 0 disables (TOKEN_PRICE)
    pub token_price_threshold: u64,
    /// 0 disables the status API
    pub api_port: u16,
    pub log_level: String,
    /// Overrides `https://{host}.api.blizzard.com` (WOW_API_BASE)
    pub wow_api_base: Option<String>,
    pub oauth_url: String,
    pub reference_api_url: String,
    pub reference_mirror_url: String,
    pub data_dir: PathBuf,
}

impl Settings {
    /// Reads `mega_data.json` from `data_dir` (if present) and the process environment.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(SETTINGS_FILE);
        let file = if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            match serde_json::from_str::<Value>(&text)? {
                Value::Object(map) => map,
                _ => {
                    return Err(AppError::Config(format!(
                        "{} must contain a JSON object",
                        path.display()
                    )))
                }
            }
        } else {
            Map::new()
        };
        Self::resolve(&file, &|key| std::env::var(key).ok(), data_dir)
    }

    /// Per-field precedence: file value, then environment, then default.
    pub fn resolve(
        file: &Map<String, Value>,
        env: &dyn Fn(&str) -> Option<String>,
        data_dir: &Path,
    ) -> Result<Self> {
        let lookup = |key: &str| -> Option<String> {
            file.get(key)
                .and_then(value_to_string)
                .or_else(|| env(key))
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        let flag = |key: &str| lookup(key).map(|v| parse_bool(&v)).unwrap_or(false);

        let webhook_url = lookup("MEGA_WEBHOOK_URL")
            .ok_or_else(|| AppError::Config("MEGA_WEBHOOK_URL is required".to_string()))?;
        if !(webhook_url.starts_with("https://") || webhook_url.starts_with("http://")) {
            return Err(AppError::Config(format!(
                "MEGA_WEBHOOK_URL must be an http(s) URL, got {webhook_url}"
            )));
        }
        let client_id = lookup("WOW_CLIENT_ID")
            .ok_or_else(|| AppError::Config("WOW_CLIENT_ID is required".to_string()))?;
        let client_secret = lookup("WOW_CLIENT_SECRET")
            .ok_or_else(|| AppError::Config("WOW_CLIENT_SECRET is required".to_string()))?;

        let region_raw = lookup("WOW_REGION")
            .ok_or_else(|| AppError::Config("WOW_REGION is required".to_string()))?;
        let region = Region::parse(&region_raw).ok_or_else(|| {
            AppError::Config(format!(
                "WOW_REGION must be one of NA, EU, NACLASSIC, EUCLASSIC, NASODCLASSIC, EUSODCLASSIC, got {region_raw}"
            ))
        })?;

        let faction = match lookup("FACTION") {
            None => Faction::All,
            Some(raw) => Faction::parse(&raw).unwrap_or_else(|| {
                warn!("[CONFIG] unknown FACTION {raw:?}, using all");
                Faction::All
            }),
        };

        let threads = lookup("MEGA_THREADS")
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&n| n > 1)
            .unwrap_or(DEFAULT_THREADS);

        let mut scan_time_min = lookup("SCAN_TIME_MIN")
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(DEFAULT_SCAN_TIME_MIN);
        let mut scan_time_max = lookup("SCAN_TIME_MAX")
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(DEFAULT_SCAN_TIME_MAX);
        if scan_time_min > scan_time_max || scan_time_min.abs() > 59 || scan_time_max.abs() > 59 {
            warn!(
                "[CONFIG] invalid scan window [{scan_time_min}, {scan_time_max}], using [{DEFAULT_SCAN_TIME_MIN}, {DEFAULT_SCAN_TIME_MAX}]"
            );
            scan_time_min = DEFAULT_SCAN_TIME_MIN;
            scan_time_max = DEFAULT_SCAN_TIME_MAX;
        }

        let extra_alert_minutes = lookup("EXTRA_ALERTS")
            .map(|v| parse_minutes(&v))
            .unwrap_or_default();

        let token_price_threshold = lookup("TOKEN_PRICE")
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|p| *p > 0.0)
            .map(|p| p as u64)
            .unwrap_or(0);

        let default_level = if flag("DEBUG") { "debug" } else { "info" };
        let log_level = lookup("LOG_LEVEL").unwrap_or_else(|| default_level.to_string());

        let api_port = lookup("API_PORT")
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(DEFAULT_API_PORT);

        Ok(Self {
            webhook_url,
            client_id,
            client_secret,
            region,
            faction,
            threads,
            scan_time_min,
            scan_time_max,
            extra_alert_minutes,
            show_bid_prices: flag("SHOW_BID_PRICES"),
            wowhead_link: flag("WOWHEAD_LINK"),
            no_links: flag("NO_LINKS"),
            no_russian_realms: flag("NO_RUSSIAN_REALMS"),
            refresh_alerts: flag("REFRESH_ALERTS"),
            token_price_threshold,
            api_port,
            log_level,
            wow_api_base: env("WOW_API_BASE").filter(|s| !s.is_empty()),
            oauth_url: env("WOW_OAUTH_URL").unwrap_or_else(|| OAUTH_URL.to_string()),
            reference_api_url: env("REFERENCE_API_URL")
                .unwrap_or_else(|| REFERENCE_API_URL.to_string()),
            reference_mirror_url: env("REFERENCE_MIRROR_URL")
                .unwrap_or_else(|| REFERENCE_MIRROR_URL.to_string()),
            data_dir: data_dir.to_path_buf(),
        })
    }

    /// Base URL of the game-data API for this run's region.
    pub fn api_base(&self) -> String {
        self.wow_api_base
            .clone()
            .unwrap_or_else(|| format!("https://{}.api.blizzard.com", self.region.host()))
    }
}

/// Bounded retry with a stepped backoff; the last step repeats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_ms: Vec<u64>,
}

impl RetryPolicy {
    pub fn standard(max_attempts: u32) -> Self {
        Self { max_attempts, backoff_ms: RETRY_BACKOFF_MS.to_vec() }
    }

    /// No sleeping between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self { max_attempts, backoff_ms: vec![0] }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let ms = self
            .backoff_ms
            .get(attempt as usize)
            .or(self.backoff_ms.last())
            .copied()
            .unwrap_or(0);
        Duration::from_millis(ms)
    }
}

fn value_to_string(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

fn parse_bool(s: &str) -> bool {
    matches!(s.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

/// Accepts a JSON list (`[10, 20]`) or a comma-separated string (`10,20`).
/// Values outside 0..=59 are dropped.
fn parse_minutes(s: &str) -> Vec<u32> {
    let parsed: Vec<i64> = match serde_json::from_str::<Vec<i64>>(s) {
        Ok(v) => v,
        Err(_) => s
            .trim_matches(|c| c == '[' || c == ']')
            .split(',')
            .filter_map(|p| p.trim().parse::<i64>().ok())
            .collect(),
    };
    let mut minutes: Vec<u32> = parsed
        .into_iter()
        .filter(|m| (0..60).contains(m))
        .map(|m| m as u32)
        .collect();
    minutes.sort_unstable();
    minutes.dedup();
    minutes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("MEGA_WEBHOOK_URL", "https://discord.com/api/webhooks/1/abc"),
            ("WOW_CLIENT_ID", "id"),
            ("WOW_CLIENT_SECRET", "secret"),
            ("WOW_REGION", "EU"),
        ])
    }

    fn resolve_with(file: Value, env: HashMap<&'static str, &'static str>) -> Result<Settings> {
        let map = match file {
            Value::Object(m) => m,
            _ => Map::new(),
        };
        Settings::resolve(&map, &|k| env.get(k).map(|v| v.to_string()), Path::new("data"))
    }

    #[test]
    fn defaults_apply_when_unset() {
        let s = resolve_with(Value::Null, base_env()).unwrap();
        assert_eq!(s.region, Region::Eu);
        assert_eq!(s.faction, Faction::All);
        assert_eq!(s.threads, DEFAULT_THREADS);
        assert_eq!((s.scan_time_min, s.scan_time_max), (1, 3));
        assert!(s.extra_alert_minutes.is_empty());
        assert!(!s.refresh_alerts);
        assert_eq!(s.token_price_threshold, 0);
        assert_eq!(s.api_base(), "https://eu.api.blizzard.com");
    }

    #[test]
    fn file_value_beats_environment() {
        let mut env = base_env();
        env.insert("MEGA_THREADS", "8");
        let file = serde_json::json!({ "MEGA_THREADS": 16, "WOW_REGION": "NA" });
        let s = resolve_with(file, env).unwrap();
        assert_eq!(s.threads, 16);
        assert_eq!(s.region, Region::Na);
    }

    #[test]
    fn bad_thread_count_falls_back_to_default() {
        for raw in ["abc", "1", "0", "-4"] {
            let mut env = base_env();
            env.insert("MEGA_THREADS", raw);
            let s = resolve_with(Value::Null, env).unwrap();
            assert_eq!(s.threads, DEFAULT_THREADS, "MEGA_THREADS={raw}");
        }
    }

    #[test]
    fn inverted_scan_window_resets_to_defaults() {
        let mut env = base_env();
        env.insert("SCAN_TIME_MIN", "5");
        env.insert("SCAN_TIME_MAX", "2");
        let s = resolve_with(Value::Null, env).unwrap();
        assert_eq!((s.scan_time_min, s.scan_time_max), (1, 3));
    }

    #[test]
    fn extra_alerts_accepts_list_or_csv() {
        let mut env = base_env();
        env.insert("EXTRA_ALERTS", "[30, 10, 75, 10]");
        let s = resolve_with(Value::Null, env).unwrap();
        assert_eq!(s.extra_alert_minutes, vec![10, 30]);

        let file = serde_json::json!({ "EXTRA_ALERTS": "5, 45" });
        let s = resolve_with(file, base_env()).unwrap();
        assert_eq!(s.extra_alert_minutes, vec![5, 45]);
    }

    #[test]
    fn missing_or_invalid_region_is_fatal() {
        let mut env = base_env();
        env.remove("WOW_REGION");
        assert!(matches!(resolve_with(Value::Null, env), Err(AppError::Config(_))));

        let mut env = base_env();
        env.insert("WOW_REGION", "KR");
        assert!(matches!(resolve_with(Value::Null, env), Err(AppError::Config(_))));
    }

    #[test]
    fn webhook_must_be_a_url() {
        let mut env = base_env();
        env.insert("MEGA_WEBHOOK_URL", "not a url");
        assert!(matches!(resolve_with(Value::Null, env), Err(AppError::Config(_))));
    }

    #[test]
    fn load_reads_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{"MEGA_WEBHOOK_URL":"https://hook","WOW_CLIENT_ID":"a","WOW_CLIENT_SECRET":"b","WOW_REGION":"NACLASSIC","FACTION":"horde","REFRESH_ALERTS":true}"#,
        )
        .unwrap();
        let s = Settings::load(dir.path()).unwrap();
        assert_eq!(s.region, Region::NaClassic);
        assert_eq!(s.faction, Faction::Horde);
        assert!(s.refresh_alerts);
    }

    #[test]
    fn backoff_saturates_at_last_step() {
        let policy = RetryPolicy::standard(10);
        assert_eq!(policy.delay(0), Duration::from_millis(RETRY_BACKOFF_MS[0]));
        assert_eq!(policy.delay(99), Duration::from_millis(*RETRY_BACKOFF_MS.last().unwrap()));
        assert_eq!(RetryPolicy::immediate(3).delay(2), Duration::ZERO);
    }
}
