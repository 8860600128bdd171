pub mod bootstrap;
pub mod live;

pub use bootstrap::{build_ledger, build_replica, build_sources, build_trader};
pub use live::{
    LiveTrader, TickDefaults, TickRequest, TickResponse, TraderStatus, HISTORY_MARGIN,
    MAX_LIVE_LOOKBACK,
};
