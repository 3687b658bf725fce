//! Per-script update status and its broadcast.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::transport::TransportError;

/// Progress message while the metadata check runs.
pub const MSG_CHECKING: &str = "checking for update";
/// Terminal message when the installed version is current.
pub const MSG_NO_UPDATE: &str = "no update available";
/// Terminal message when a newer version has nowhere to download from.
pub const MSG_NO_DOWNLOAD_URL: &str = "new version detected but no download URL";
/// Progress message while the code fetch runs.
pub const MSG_UPDATING: &str = "updating";
/// Progress message when the metadata response already carried the code.
pub const MSG_UPDATED: &str = "updated";
/// Failure message for the code fetch.
pub const MSG_ERROR_FETCHING_SCRIPT: &str = "error fetching script";
/// Failure message for the metadata fetch.
pub const MSG_ERROR_FETCHING_INFO: &str = "error fetching update info";

/// Notification title when every note reports a success.
pub const TITLE_UPDATED: &str = "Scripts updated";
/// Notification title when any note reports an error.
pub const TITLE_UPDATE_ERRORS: &str = "Script update errors";

/// Transient status of one script's update attempt.
///
/// `checking` true means the check is mid-flight; a present `error`
/// means it failed; neither means it concluded. `error` always
/// serializes, as an explicit `null` when absent, so relay transports
/// see the field on every record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateStatus {
    /// Latest user-facing progress message.
    pub message: String,
    /// Still in the middle of a multi-step check.
    pub checking: bool,
    /// Terminal failure description.
    pub error: Option<String>,
}

/// One broadcast status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    /// Script the status belongs to.
    pub script_id: i64,
    /// Status after the change.
    pub status: UpdateStatus,
}

/// Holds one script's status record and broadcasts every change.
///
/// A message without an error means the check is still progressing:
/// [`announce`](Self::announce) keeps `checking` true,
/// [`conclude`](Self::conclude) ends the check cleanly, and
/// [`fail`](Self::fail) ends it with a formatted error.
pub struct StatusAnnouncer {
    script_id: i64,
    status: UpdateStatus,
    events: mpsc::UnboundedSender<StatusEvent>,
}

impl StatusAnnouncer {
    pub fn new(script_id: i64, events: mpsc::UnboundedSender<StatusEvent>) -> Self {
        Self {
            script_id,
            status: UpdateStatus::default(),
            events,
        }
    }

    /// Progress update; the check continues.
    pub fn announce(&mut self, message: impl Into<String>) {
        self.status.message = message.into();
        self.status.checking = true;
        self.status.error = None;
        self.broadcast();
    }

    /// Terminal conclusion without an error.
    pub fn conclude(&mut self, message: impl Into<String>) {
        self.status.message = message.into();
        self.status.checking = false;
        self.status.error = None;
        self.broadcast();
    }

    /// Terminal failure; the error is formatted with status and URL.
    pub fn fail(&mut self, message: impl Into<String>, error: &TransportError) {
        self.status.message = message.into();
        self.status.checking = false;
        self.status.error = Some(format_error(error));
        self.broadcast();
    }

    /// The record as of the last change.
    pub fn status(&self) -> &UpdateStatus {
        &self.status
    }

    fn broadcast(&self) {
        let event = StatusEvent {
            script_id: self.script_id,
            status: self.status.clone(),
        };
        if self.events.send(event).is_err() {
            debug!("status channel closed, dropping event for script {}", self.script_id);
        }
    }
}

/// Single-string form of a fetch failure: generic label, status, URL.
fn format_error(error: &TransportError) -> String {
    match error.status {
        Some(status) => format!("request error {status}, {}", error.url),
        None => format!("request error, {}", error.url),
    }
}
