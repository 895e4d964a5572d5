//! In-process adapters for every repository seam and the sorted table.
//!
//! Used by tests and by `feedline serve` when no database URL is configured.

mod repositories;
mod runner;
mod table;

pub use repositories::{MemoryRepositories, QueuedJob};
pub use runner::{DrainReport, drain_jobs};
pub use table::MemoryTable;
