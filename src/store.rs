//! Collaborator seams: script storage and user notification.

use async_trait::async_trait;

use crate::error::Result;
use crate::script::Script;
use crate::update::status::UpdateStatus;

/// Reparse request produced after a successful download.
#[derive(Debug, Clone)]
pub struct ParseRequest {
    /// Storage id of the script being replaced.
    pub id: i64,
    /// Newly downloaded source text.
    pub code: String,
    /// Bump the stored modification date.
    pub bump_date: bool,
    /// Final status written alongside the script.
    pub status: UpdateStatus,
}

/// Persistent script storage as consumed by the update engine.
#[async_trait]
pub trait ScriptStore: Send + Sync {
    /// All installed scripts.
    async fn scripts(&self) -> Vec<Script>;

    /// Look up one script by id.
    async fn script_by_id(&self, id: i64) -> Option<Script>;

    /// Reparse downloaded source and persist the updated script,
    /// returning the stored record.
    async fn parse_script(&self, request: ParseRequest) -> Result<Script>;

    /// Refresh auxiliary assets (icons, requires) for a script.
    async fn fetch_resources(&self, script: &Script) -> Result<()>;
}

/// Receives the aggregated notification of a batch run.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Show `body` under `title`, attributed to the given script ids.
    async fn notify(&self, title: &str, body: &str, script_ids: &[i64]);
}
