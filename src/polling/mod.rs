//! Polling module - periodic sensor reads, reporting and alerting

mod latch;
mod schedule;
mod poller;

pub use latch::AlertLatch;
pub use schedule::TickSchedule;
pub use poller::{run_session, Iteration, PollingLoop, RunOutcome};
