//! Top-level scan loop: boot, one full pass, then freshness-driven rescans
//! until cancelled.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Timelike, Utc};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::auth::TokenManager;
use crate::catalog::{self, MarketData, ReferenceClient};
use crate::config::{Settings, REFRESH_CLEAR_MINUTE, TICK_INTERVAL_MS};
use crate::error::Result;
use crate::fetcher::AuctionFetcher;
use crate::matcher::{match_listings, MatchContext};
use crate::notifier::Notifier;
use crate::state::{AlertLog, MarketStore};
use crate::types::{Listing, Market, MatchResult};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    #[default]
    Idle = 0,
    Booting = 1,
    ScanningOnce = 2,
    Waiting = 3,
    Scanning = 4,
    Stopping = 5,
    Stopped = 6,
}

impl SchedulerState {
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => SchedulerState::Booting,
            2 => SchedulerState::ScanningOnce,
            3 => SchedulerState::Waiting,
            4 => SchedulerState::Scanning,
            5 => SchedulerState::Stopping,
            6 => SchedulerState::Stopped,
            _ => SchedulerState::Idle,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SchedulerState::Stopped)
    }
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Booting => "booting",
            SchedulerState::ScanningOnce => "scanning_once",
            SchedulerState::Waiting => "waiting",
            SchedulerState::Scanning => "scanning",
            SchedulerState::Stopping => "stopping",
            SchedulerState::Stopped => "stopped",
        };
        write!(f, "{s}")
    }
}

/// Run-scoped state shared between the scheduler and the status API.
#[derive(Clone)]
pub struct RunHandles {
    pub health: Arc<HealthState>,
    pub latency: Arc<LatencyStats>,
    pub alert_log: Arc<AlertLog>,
    pub store: Arc<MarketStore>,
}

impl RunHandles {
    pub fn new() -> Result<Self> {
        Ok(Self {
            health: Arc::new(HealthState::new()),
            latency: Arc::new(LatencyStats::new()?),
            alert_log: AlertLog::new(),
            store: MarketStore::new(),
        })
    }
}

/// What the control loop remembers between ticks.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoopMemory {
    /// Hour (unix hours) in which the alert log was last cleared.
    last_clear_hour: Option<i64>,
    /// (unix hour, minute) of the last extra-alert pass.
    last_extra: Option<(i64, u32)>,
}

/// Decisions for one tick of the control loop.
#[derive(Debug, PartialEq, Eq)]
pub struct TickPlan<'a> {
    pub clear_alerts: bool,
    pub due: Vec<&'a Market>,
}

/// Plans one tick at `now`. Extra-alert minutes make every market due once
/// per minute; otherwise a market is due inside its scan window.
pub fn plan_tick<'a>(
    memory: &mut LoopMemory,
    now: DateTime<Utc>,
    settings: &Settings,
    markets: &'a [Market],
    store: &MarketStore,
) -> TickPlan<'a> {
    let hour = now.timestamp().div_euclid(3600);
    let minute = now.minute();

    let clear_alerts = settings.refresh_alerts
        && minute == REFRESH_CLEAR_MINUTE
        && memory.last_clear_hour != Some(hour);
    if clear_alerts {
        memory.last_clear_hour = Some(hour);
    }

    let due = if settings.extra_alert_minutes.contains(&minute)
        && memory.last_extra != Some((hour, minute))
    {
        memory.last_extra = Some((hour, minute));
        markets.iter().collect()
    } else {
        store.due_markets(markets, minute, settings.scan_time_min, settings.scan_time_max)
    };

    TickPlan { clear_alerts, due }
}

/// Parts every market task reads. Shared across spawned workers.
struct ScanContext {
    data: Arc<MarketData>,
    fetcher: AuctionFetcher,
    notifier: Notifier,
    handles: RunHandles,
    progress: mpsc::Sender<String>,
    cancel: CancellationToken,
}

pub struct Scheduler {
    ctx: Arc<ScanContext>,
    /// Caps in-flight market tasks at `settings.threads`.
    workers: Arc<Semaphore>,
}

impl Scheduler {
    /// Loads catalogs and reference data and validates credentials.
    pub async fn boot(
        settings: Settings,
        handles: RunHandles,
        progress: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        handles.health.set_state(SchedulerState::Booting);
        let _ = progress.try_send(format!("booting {} scanner", settings.region));

        let auth = Arc::new(TokenManager::new(&settings)?);
        let reference = ReferenceClient::new(&settings)?;
        let data = catalog::load(settings, &reference, Arc::clone(&auth)).await?;
        auth.get_token().await?;
        info!("[AUTH] credentials accepted");

        Self::from_parts(Arc::new(data), handles, progress, cancel)
    }

    pub fn from_parts(
        data: Arc<MarketData>,
        handles: RunHandles,
        progress: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let fetcher = AuctionFetcher::new(&data.settings, Arc::clone(&data.auth))?;
        let notifier = Notifier::new(
            &data.settings,
            Arc::clone(&handles.alert_log),
            Arc::clone(&handles.health),
        )?;
        handles.health.set_markets(data.markets.len());
        let workers = Arc::new(Semaphore::new(data.settings.threads.max(1)));
        let ctx = ScanContext { data, fetcher, notifier, handles, progress, cancel };
        Ok(Self { ctx: Arc::new(ctx), workers })
    }

    pub async fn run(self) -> Result<()> {
        let ctx = Arc::clone(&self.ctx);
        let settings = &ctx.data.settings;
        let startup = format!(
            "Scanner started for {} | {} markets | targets: {}",
            settings.region,
            ctx.data.markets.len(),
            ctx.data.targets.summary()
        );
        if let Err(e) = ctx.notifier.send_text(&startup).await {
            warn!("[NOTIFY] startup ping failed: {e}");
        }

        ctx.set_state(SchedulerState::ScanningOnce);
        let sent = self.scan_batch(ctx.data.markets.clone()).await;
        ctx.emit(format!("initial scan done: {} markets, {sent} alerts", ctx.data.markets.len()));

        let mut memory = LoopMemory::default();
        while !ctx.cancel.is_cancelled() {
            let plan = plan_tick(&mut memory, Utc::now(), settings, &ctx.data.markets, &ctx.handles.store);
            if plan.clear_alerts {
                let cleared = ctx.handles.alert_log.len();
                ctx.handles.alert_log.clear();
                info!("[SCHED] cleared {cleared} remembered alerts");
            }

            let due: Vec<Market> = plan.due.into_iter().cloned().collect();
            if due.is_empty() {
                ctx.set_state(SchedulerState::Waiting);
            } else {
                ctx.set_state(SchedulerState::Scanning);
                debug!("[SCHED] {} markets due", due.len());
                let count = due.len();
                let sent = self.scan_batch(due).await;
                ctx.emit(format!("scanned {count} markets, {sent} alerts"));
            }

            tokio::select! {
                _ = ctx.cancel.cancelled() => {}
                _ = tokio::time::sleep(Duration::from_millis(TICK_INTERVAL_MS)) => {}
            }
        }

        ctx.set_state(SchedulerState::Stopping);
        if let Err(e) = ctx.notifier.send_text("Scanner stopped").await {
            warn!("[NOTIFY] stop ping failed: {e}");
        }
        ctx.set_state(SchedulerState::Stopped);
        ctx.emit(ctx.final_status());
        Ok(())
    }

    /// Spawns one task per market, at most `threads` running at once, and
    /// waits for all of them. Returns alerts sent.
    async fn scan_batch(&self, markets: Vec<Market>) -> usize {
        if self.ctx.cancel.is_cancelled() {
            return 0;
        }
        let mut tasks = JoinSet::new();
        for market in markets {
            let ctx = Arc::clone(&self.ctx);
            let workers = Arc::clone(&self.workers);
            tasks.spawn(async move {
                let Ok(_permit) = workers.acquire_owned().await else {
                    return 0;
                };
                ctx.scan_market(&market).await
            });
        }

        let mut sent = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(n) => sent += n,
                Err(e) => warn!("[SCHED] market task failed: {e}"),
            }
        }
        sent
    }
}

impl ScanContext {
    /// Fetch, match and notify for one market. Returns alerts sent.
    async fn scan_market(&self, market: &Market) -> usize {
        if self.cancel.is_cancelled() {
            return 0;
        }

        let started = Instant::now();
        let pull = self.fetcher.fetch_market(market).await;
        self.handles.latency.record(started.elapsed());

        if let Some(ts) = pull.last_modified {
            if self.handles.store.record(market.id, ts) {
                debug!(market_id = market.id, "[SCHED] {} published at minute {}", market.display_name(), ts.minute());
            }
        }

        let listing_count = pull.listings.len();
        let matches = self.match_pull(pull.listings).await;

        let sent = if matches.is_empty() {
            0
        } else {
            self.notifier.notify(market, &matches, &self.data.names).await
        };

        if self.data.settings.token_price_threshold > 0 {
            match self.fetcher.fetch_token_price().await {
                Ok(price) => {
                    self.notifier.check_token_price(price).await;
                }
                Err(e) => debug!("[FETCH] token price unavailable: {e}"),
            }
        }

        self.handles.health.record_scan(Utc::now().timestamp_millis(), matches.len());
        self.emit(format!(
            "{} | {} listings | {} matches | {} alerts",
            market.display_name(),
            listing_count,
            matches.len(),
            sent
        ));
        sent
    }

    /// Matching is CPU-bound, so it runs on the blocking pool.
    async fn match_pull(&self, listings: Vec<Listing>) -> Vec<MatchResult> {
        let data = Arc::clone(&self.data);
        let cancel = self.cancel.clone();
        let matched = tokio::task::spawn_blocking(move || {
            let ctx = MatchContext {
                targets: &data.targets,
                bonuses: &data.bonuses,
                show_bid_prices: data.settings.show_bid_prices,
            };
            match_listings(&listings, &ctx, || cancel.is_cancelled())
        })
        .await;
        matched.unwrap_or_else(|e| {
            warn!("[SCHED] matcher task failed: {e}");
            Vec::new()
        })
    }

    fn set_state(&self, state: SchedulerState) {
        if self.handles.health.state() != state {
            debug!("[SCHED] state -> {state}");
            self.handles.health.set_state(state);
        }
    }

    /// Progress lines are best-effort; a full channel drops the line.
    fn emit(&self, line: String) {
        let _ = self.progress.try_send(line);
    }

    fn final_status(&self) -> String {
        let h = &self.handles.health;
        format!(
            "stopped after {} market scans | {} matches | {} alerts sent | {} failed deliveries",
            HealthState::load(&h.scans_completed),
            HealthState::load(&h.matches_found),
            HealthState::load(&h.alerts_sent),
            HealthState::load(&h.notify_failures),
        )
    }
}
