//! Cooldown module
//!
//! Rate limits how often a confirmed phase may trigger a downstream action

mod cache;
mod clock;
mod types;

pub use cache::CooldownCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use types::{
    ActionHistory, CooldownEntry, CooldownKey, CooldownStats, EntryDecision, EntryReason,
    RecordedAction,
};
