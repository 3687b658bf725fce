//! Installed-script model and update-URL resolution.

use serde::{Deserialize, Serialize};

/// Identity fields of an installed script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptProps {
    /// Storage identifier, unique per install.
    pub id: i64,
}

/// Metablock fields the update engine reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptMeta {
    /// Display name declared in the metablock.
    pub name: String,
    /// Installed version; absent when the metablock declared none.
    pub version: Option<String>,
    /// Where the full code is published.
    pub download_url: Option<String>,
    /// Where version metadata is published.
    pub update_url: Option<String>,
}

/// User overrides layered on top of metablock values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptCustom {
    pub download_url: Option<String>,
    pub update_url: Option<String>,
}

/// Per-install configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Whether the script runs on pages.
    pub enabled: bool,
    /// Whether update checks are allowed for this install.
    pub should_update: bool,
    /// Per-script notification override; unset falls back to the general
    /// option.
    pub notify_updates: Option<bool>,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            should_update: true,
            notify_updates: None,
        }
    }
}

/// An installed userscript as seen by the update engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Script {
    pub props: ScriptProps,
    pub meta: ScriptMeta,
    pub custom: ScriptCustom,
    pub config: ScriptConfig,
}

/// Eligibility gates applied while resolving update URLs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdatePolicy {
    /// Skip installs that have update checks turned off.
    pub allowed_only: bool,
    /// Skip disabled installs.
    pub enabled_only: bool,
}

/// Resolved endpoints for one script's update check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateUrls {
    /// Where the full code is fetched; absent means the check is
    /// metadata-only.
    pub download: Option<String>,
    /// Where version metadata is fetched.
    pub update: String,
}

impl Script {
    /// Storage identifier of this install.
    pub fn id(&self) -> i64 {
        self.props.id
    }

    /// Name used in user-facing messages, falling back to the id.
    pub fn display_name(&self) -> String {
        if self.meta.name.is_empty() {
            format!("#{}", self.props.id)
        } else {
            self.meta.name.clone()
        }
    }

    /// Resolve this script's download/update URL pair under `policy`.
    ///
    /// Custom URLs take precedence over metablock URLs, and a missing
    /// update URL falls back to the download URL. Returns `None` when the
    /// policy excludes this install or no update URL can be resolved.
    pub fn update_urls(&self, policy: &UpdatePolicy) -> Option<UpdateUrls> {
        if policy.allowed_only && !self.config.should_update {
            return None;
        }
        if policy.enabled_only && !self.config.enabled {
            return None;
        }
        let download = self
            .custom
            .download_url
            .clone()
            .or_else(|| self.meta.download_url.clone());
        let update = self
            .custom
            .update_url
            .clone()
            .or_else(|| self.meta.update_url.clone())
            .or_else(|| download.clone())?;
        Some(UpdateUrls { download, update })
    }
}
