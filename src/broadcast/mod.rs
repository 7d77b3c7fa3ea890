pub mod server;
pub mod types;

pub use server::StatusBroadcaster;
pub use types::{MarketEvent, PositionEvent, RangeInfo, StatusSummary, WSEvent};
