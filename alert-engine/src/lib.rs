//! Orchestration for the price alert service: the boundary operations, the
//! match cycle and the periodic jobs that drive them.

pub mod cycle;
pub mod scheduler;
pub mod service;

pub use cycle::{CycleReport, CycleSettings, MatchCycle};
pub use service::{AlertService, CleanupReport};

#[cfg(test)]
pub(crate) mod testing;
