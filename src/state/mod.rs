pub mod alert_log;
pub mod market_store;

pub use alert_log::AlertLog;
pub use market_store::MarketStore;
