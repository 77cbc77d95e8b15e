//! Pure domain rules for the turn engine: the turn state machine, deadline
//! plans, offering policy, and completion predicates.
//!
//! Nothing in this crate performs I/O. Each module takes loaded aggregates
//! and produces either an updated row for the caller to persist with a
//! conditional update, or a decision for the caller to act on.

pub mod completion;
pub mod deadlines;
pub mod machine;
pub mod offering;

pub use completion::{
    CompletionReason, on_demand_game_complete, season_complete, season_game_complete,
};
pub use deadlines::{
    TimerSpec, claim_deadline, offer_timers, pending_timers, submission_deadline, turn_job_ids,
};
pub use offering::{ReturnPolicy, SeasonCandidate, return_allows, select_candidate};
