//! Tamarin: update checking and scheduling engine for userscript
//! managers.
//!
//! Given a store of installed scripts, tamarin decides which ones have
//! newer upstream versions, downloads and reparses updated source, and
//! reports outcomes to the user.
//!
//! # Architecture
//!
//! The pipeline is built from pluggable seams wired into one [`Updater`]:
//! - **Script store**: Installed scripts and reparse/persist, via
//!   [`ScriptStore`]
//! - **Transport**: Freshness-aware fetches, via [`Transport`] (the
//!   bundled [`HttpTransport`] speaks conditional requests)
//! - **Options**: Shared settings with change subscriptions, via
//!   [`OptionsStore`]
//! - **Status**: Per-script progress broadcast over an event channel
//! - **Scheduler**: Periodic sweeps with drift-correcting timers, via
//!   [`AutoUpdateScheduler`]

pub mod error;
pub mod meta;
pub mod options;
pub mod script;
pub mod store;
pub mod transport;
pub mod update;

pub use error::{Result, UpdateError};
pub use meta::{ParsedMeta, parse_meta, strip_metablock};
pub use options::{Options, OptionsStore};
pub use script::{
    Script, ScriptConfig, ScriptCustom, ScriptMeta, ScriptProps, UpdatePolicy, UpdateUrls,
};
pub use store::{NotificationSink, ParseRequest, ScriptStore};
pub use transport::{
    FetchMode, FetchOptions, FetchResponse, HttpTransport, Transport, TransportError,
};
pub use update::{
    AutoUpdateScheduler, CheckOutcome, CheckTarget, SchedulerHandle, StatusEvent, UpdateNote,
    UpdateStatus, Updater,
};
