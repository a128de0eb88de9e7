//! Season controller
//!
//! [`SeasonLedger`] is the pure fold and its projections; [`SeasonRuntime`]
//! owns the ledger, the timers and the tick guard; [`SeasonEvent`] is what
//! the runtime pushes to subscribers.

pub mod events;
pub mod ledger;
pub mod runtime;

pub use events::{Notice, NoticeLevel, SeasonEvent};
pub use ledger::{
    ActivityItem, AgentStats, ChartPoint, HistoryEntry, LeaderChange, LeaderboardEntry,
    SeasonLedger, SeasonSummary, SummaryEntry, TickOutcome, HISTORY_CSV_HEADER,
};
pub use runtime::{SeasonRuntime, SeasonSnapshot, StartOutcome, TickDisposition};
