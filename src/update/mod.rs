//! The update pipeline.
//!
//! Decides which installed scripts have newer upstream versions, runs
//! the metadata-first download protocol against smart and dumb update
//! servers, deduplicates concurrent checks per script, aggregates
//! outcomes into one notification per batch, and schedules periodic
//! sweeps with drift-correcting timers.

pub mod batch;
pub mod download;
pub mod job;
pub mod schedule;
pub mod status;
pub mod version;

pub use batch::{CheckTarget, Updater};
pub use download::{ACCEPT_META, DownloadFailure};
pub use job::{CheckOutcome, UpdateNote};
pub use schedule::{AutoUpdateScheduler, SchedulerHandle};
pub use status::{StatusAnnouncer, StatusEvent, UpdateStatus};
pub use version::{compare_versions, needs_update};
