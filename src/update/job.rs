//! Orchestration of one script's update attempt.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::options::Options;
use crate::script::{Script, UpdateUrls};
use crate::store::{ParseRequest, ScriptStore};
use crate::transport::{FetchOptions, Transport};
use crate::update::download::{DownloadFailure, download_update};
use crate::update::status::{MSG_UPDATED, StatusAnnouncer, StatusEvent, UpdateStatus};

/// Result of one script's update attempt.
#[derive(Debug, Clone, Default)]
pub struct CheckOutcome {
    /// The script was updated and reparsed successfully.
    pub updated: bool,
    /// User-facing note, present when notifications apply to the script.
    pub note: Option<UpdateNote>,
}

/// User-facing summary of one update attempt.
#[derive(Debug, Clone)]
pub struct UpdateNote {
    /// The script the note refers to (the stored record after a
    /// successful update).
    pub script: Script,
    /// Display text, one line per message.
    pub text: String,
    /// Whether the note reports an error.
    pub err: bool,
}

/// Whether outcome notes apply to `script`.
///
/// The general option off disables all notes; the global force enables
/// them for every script; otherwise the script's own override decides,
/// falling back to the general option when unset.
pub(crate) fn can_notify(script: &Script, options: &Options) -> bool {
    options.notify_updates
        && (options.notify_updates_global
            || script
                .config
                .notify_updates
                .unwrap_or(options.notify_updates))
}

/// Run the full update attempt for one script.
///
/// Never fails; download, reparse, and refresh failures are absorbed
/// into the outcome so a batch always completes.
pub(crate) async fn run_job(
    script: Script,
    urls: UpdateUrls,
    fetch_options: FetchOptions,
    options: Options,
    store: Arc<dyn ScriptStore>,
    transport: Arc<dyn Transport>,
    events: mpsc::UnboundedSender<StatusEvent>,
) -> CheckOutcome {
    let mut announcer = StatusAnnouncer::new(script.id(), events);

    let mut updated = false;
    let mut ok_message = None;
    let mut err_message = None;
    let mut noted_script = script.clone();

    match download_update(&script, &urls, &fetch_options, transport.as_ref(), &mut announcer).await
    {
        Ok(Some(code)) => {
            let request = ParseRequest {
                id: script.id(),
                code,
                bump_date: true,
                status: UpdateStatus {
                    message: MSG_UPDATED.to_owned(),
                    checking: false,
                    error: None,
                },
            };
            match store.parse_script(request).await {
                Ok(stored) => {
                    ok_message = Some(format!("{} updated", stored.display_name()));
                    noted_script = stored;
                    updated = true;
                }
                Err(error) => {
                    debug!("script {} reparse failed: {error}", script.id());
                    err_message = Some(error.to_string());
                }
            }
        }
        Ok(None) => {}
        Err(failure) => {
            debug!("script {} update failed: {}", script.id(), failure.message);
            err_message = Some(failure_text(&script, &failure, store.as_ref()).await);
        }
    }

    let note = if (ok_message.is_some() || err_message.is_some()) && can_notify(&script, &options)
    {
        let err = err_message.is_some();
        let lines: Vec<String> = [ok_message, err_message].into_iter().flatten().collect();
        Some(UpdateNote {
            script: noted_script,
            text: lines.join("\n"),
            err,
        })
    } else {
        None
    };

    CheckOutcome { updated, note }
}

/// Surfaced text for a download failure, after the resource-refresh
/// fallback. A terminal failure (not mid-check) may stem from stale
/// auxiliary assets, so those are refetched; a refresh error replaces
/// the fetch detail.
async fn failure_text(
    script: &Script,
    failure: &DownloadFailure,
    store: &dyn ScriptStore,
) -> String {
    let mut detail = failure.error.clone();
    if !failure.checking
        && let Err(error) = store.fetch_resources(script).await
    {
        detail = Some(error.to_string());
    }
    match detail {
        Some(detail) => format!("{}: {detail}", failure.message),
        None => failure.message.clone(),
    }
}
