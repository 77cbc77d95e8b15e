//! Runtime for the drawing-telephone turn engine: durable scheduler, game
//! coordinator, and the ports that connect them to a host.
//!
//! Startup wiring, in order:
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use scrawl_engine::{
//! #     CoordinatorOptions, GameCoordinator, MemoryRepository, Scheduler, RecordingNotifier,
//! #     StaticChannelConfig, SystemClock, UuidGen, StaleCleanupJob, SWEEP_INTERVAL,
//! # };
//! # use scrawl_types::GameConfig;
//! # async fn wire(config: GameConfig) -> Result<(), scrawl_types::DomainError> {
//! let repo = Arc::new(MemoryRepository::new());
//! let clock = Arc::new(SystemClock);
//! let scheduler = Scheduler::new(repo.clone(), clock.clone());
//! let coordinator = GameCoordinator::new(
//!     repo,
//!     scheduler.clone(),
//!     Arc::new(RecordingNotifier::new()),
//!     Arc::new(StaticChannelConfig::new(config)),
//!     clock,
//!     Arc::new(UuidGen),
//!     CoordinatorOptions::default(),
//! );
//! coordinator.register_handlers();
//! scheduler.load_persisted().await?;
//! let sweeper = StaleCleanupJob::new(coordinator.clone()).spawn(SWEEP_INTERVAL);
//! # drop(sweeper);
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod cleanup;
pub mod clock;
pub mod coordinator;
mod handlers;
pub mod idgen;
pub mod memory;
pub mod notify;
mod offering;
pub mod repo;
pub mod scheduler;
pub mod timeout;

pub use channel::{ChannelConfigPort, StaticChannelConfig};
pub use cleanup::{SWEEP_INTERVAL, StaleCleanupJob};
pub use clock::{Clock, ManualClock, SystemClock};
pub use coordinator::{CoordinatorOptions, GameCoordinator};
pub use idgen::{IdGen, SequentialIdGen, UuidGen};
pub use memory::MemoryRepository;
pub use notify::{
    ErrorBus, NotificationFailure, NotificationPort, OfferAction, RecordingNotifier,
};
pub use repo::{JobOutcome, Repository};
pub use scheduler::{
    JobHandler, LoadReport, MISSED_DOWNTIME_REASON, MissedJobPolicy, Scheduler, TurnJobPayload,
};
pub use timeout::TurnTimeoutService;
