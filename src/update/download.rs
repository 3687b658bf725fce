//! The metadata-first, code-second download protocol.

use tracing::debug;

use crate::meta::{parse_meta, strip_metablock};
use crate::script::{Script, UpdateUrls};
use crate::transport::{FetchMode, FetchOptions, Transport, TransportError};
use crate::update::status::{
    MSG_CHECKING, MSG_ERROR_FETCHING_INFO, MSG_ERROR_FETCHING_SCRIPT, MSG_NO_DOWNLOAD_URL,
    MSG_NO_UPDATE, MSG_UPDATED, MSG_UPDATING, StatusAnnouncer, UpdateStatus,
};
use crate::update::version::needs_update;

/// `Accept` value hinting that a metadata-only response is preferred.
pub const ACCEPT_META: &str = "text/x-userscript-meta,*/*";

/// Terminal download failure, carrying the final status fields.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct DownloadFailure {
    /// Final status message.
    pub message: String,
    /// Whether the failure struck mid-check (before the version decision).
    pub checking: bool,
    /// Formatted fetch error, when one occurred.
    pub error: Option<String>,
}

impl DownloadFailure {
    fn from_status(status: &UpdateStatus) -> Self {
        Self {
            message: status.message.clone(),
            checking: status.checking,
            error: status.error.clone(),
        }
    }
}

/// Run the two-phase update fetch for one script.
///
/// Returns `Ok(Some(code))` when newer source was downloaded and
/// `Ok(None)` when the check concluded without one (version current, or
/// nowhere to download from). Every step is announced through
/// `announcer` before returning, so the final status record always
/// matches the return value.
///
/// # Errors
///
/// Returns the final status record as a [`DownloadFailure`] when either
/// fetch fails.
pub(crate) async fn download_update(
    script: &Script,
    urls: &UpdateUrls,
    options: &FetchOptions,
    transport: &dyn Transport,
    announcer: &mut StatusAnnouncer,
) -> Result<Option<String>, DownloadFailure> {
    announcer.announce(MSG_CHECKING);

    let meta_options = options.merged_over(&FetchOptions {
        mode: Some(FetchMode::Revalidate),
        accept: Some(ACCEPT_META.to_owned()),
    });
    let body = match transport.request_newer(&urls.update, &meta_options).await {
        Ok(response) => response.map(|r| r.data),
        Err(error) => {
            announcer.fail(MSG_ERROR_FETCHING_INFO, &error);
            return Err(DownloadFailure::from_status(announcer.status()));
        }
    };

    let meta = body.as_deref().map(parse_meta).unwrap_or_default();
    if !needs_update(script.meta.version.as_deref(), meta.version.as_deref()) {
        announcer.conclude(MSG_NO_UPDATE);
        return Ok(None);
    }
    let Some(download_url) = urls.download.as_deref() else {
        announcer.conclude(MSG_NO_DOWNLOAD_URL);
        return Ok(None);
    };

    // A newer candidate version implies the metadata fetch had a body.
    let body = body.unwrap_or_default();
    if download_url == urls.update && !strip_metablock(&body, &meta.meta_text).trim().is_empty() {
        // The update endpoint served the full script in one response.
        announcer.announce(MSG_UPDATED);
        return Ok(Some(body));
    }

    announcer.announce(MSG_UPDATING);
    debug!("fetching update for script {} from {download_url}", script.id());
    match transport
        .request_newer(download_url, &FetchOptions::bypass())
        .await
    {
        Ok(Some(response)) => Ok(Some(response.data)),
        Ok(None) => {
            let error = TransportError {
                url: download_url.to_owned(),
                status: None,
                message: "empty response".to_owned(),
            };
            announcer.fail(MSG_ERROR_FETCHING_SCRIPT, &error);
            Err(DownloadFailure::from_status(announcer.status()))
        }
        Err(error) => {
            announcer.fail(MSG_ERROR_FETCHING_SCRIPT, &error);
            Err(DownloadFailure::from_status(announcer.status()))
        }
    }
}
