//! Batch fan-out, in-flight deduplication, and notification
//! aggregation.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared, join_all};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use crate::options::{Options, OptionsStore};
use crate::script::{Script, UpdatePolicy, UpdateUrls};
use crate::store::{NotificationSink, ScriptStore};
use crate::transport::{FetchOptions, Transport};
use crate::update::job::{CheckOutcome, run_job};
use crate::update::schedule::now_epoch_millis;
use crate::update::status::{StatusEvent, TITLE_UPDATE_ERRORS, TITLE_UPDATED};

/// Which scripts one check covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckTarget {
    /// Scheduler-driven sweep over eligible scripts.
    Auto,
    /// Every installed script.
    All,
    /// Explicit script ids; unknown ids are dropped.
    Ids(Vec<i64>),
}

impl From<i64> for CheckTarget {
    fn from(id: i64) -> Self {
        Self::Ids(vec![id])
    }
}

impl From<Vec<i64>> for CheckTarget {
    fn from(ids: Vec<i64>) -> Self {
        Self::Ids(ids)
    }
}

/// A job future shared by every caller waiting on the same script id.
type SharedJob = Shared<BoxFuture<'static, CheckOutcome>>;

/// The update pipeline: collaborators, options, and the in-flight job
/// registry.
pub struct Updater {
    store: Arc<dyn ScriptStore>,
    transport: Arc<dyn Transport>,
    options: Arc<OptionsStore>,
    notifier: Arc<dyn NotificationSink>,
    events: mpsc::UnboundedSender<StatusEvent>,
    in_flight: Arc<Mutex<HashMap<i64, SharedJob>>>,
}

impl Updater {
    pub fn new(
        store: Arc<dyn ScriptStore>,
        transport: Arc<dyn Transport>,
        options: Arc<OptionsStore>,
        notifier: Arc<dyn NotificationSink>,
        events: mpsc::UnboundedSender<StatusEvent>,
    ) -> Self {
        Self {
            store,
            transport,
            options,
            notifier,
            events,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Check the targeted scripts for updates, returning how many were
    /// updated.
    ///
    /// Concurrent checks of the same script id share a single in-flight
    /// job. `Auto` and `All` sweeps record their completion time in the
    /// options; `Auto` respects the per-script eligibility gates and is
    /// a no-op while auto-update is disabled.
    pub async fn check_update(&self, target: CheckTarget) -> usize {
        let options = self.options.snapshot().await;
        if target == CheckTarget::Auto && options.auto_update == 0 {
            debug!("automatic sweep skipped, auto-update disabled");
            return 0;
        }

        let policy = if target == CheckTarget::Auto {
            UpdatePolicy {
                allowed_only: true,
                enabled_only: options.update_enabled_scripts_only,
            }
        } else {
            UpdatePolicy::default()
        };
        let fetch_options = if matches!(target, CheckTarget::Ids(_)) {
            FetchOptions::bypass()
        } else {
            FetchOptions::default()
        };

        let scripts = match &target {
            CheckTarget::Auto | CheckTarget::All => self.store.scripts().await,
            CheckTarget::Ids(ids) => {
                let mut scripts = Vec::with_capacity(ids.len());
                for id in ids {
                    match self.store.script_by_id(*id).await {
                        Some(script) => scripts.push(script),
                        None => debug!("dropping unknown script id {id}"),
                    }
                }
                scripts
            }
        };

        let mut jobs = Vec::new();
        for script in scripts {
            if let Some(urls) = script.update_urls(&policy) {
                jobs.push(
                    self.start_or_join(script, urls, fetch_options.clone(), options.clone())
                        .await,
                );
            }
        }

        debug!("checking {} script(s) for updates", jobs.len());
        let outcomes = join_all(jobs).await;

        let notes: Vec<_> = outcomes.iter().filter_map(|o| o.note.as_ref()).collect();
        if !notes.is_empty() {
            let title = if notes.iter().any(|note| note.err) {
                TITLE_UPDATE_ERRORS
            } else {
                TITLE_UPDATED
            };
            let body = notes
                .iter()
                .map(|note| note.text.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            let ids: Vec<i64> = notes.iter().map(|note| note.script.id()).collect();
            self.notifier.notify(title, &body, &ids).await;
        }

        if matches!(target, CheckTarget::Auto | CheckTarget::All) {
            self.options.set_last_update(now_epoch_millis()).await;
        }

        let updated = outcomes.iter().filter(|outcome| outcome.updated).count();
        info!(
            "update check finished, {updated} of {} script(s) updated",
            outcomes.len()
        );
        updated
    }

    /// Register a job for `script`, or join the one already in flight.
    ///
    /// The registry entry is created while the job starts and removed
    /// when the job settles, so a script id never has two live jobs.
    async fn start_or_join(
        &self,
        script: Script,
        urls: UpdateUrls,
        fetch_options: FetchOptions,
        options: Options,
    ) -> SharedJob {
        let id = script.id();
        let mut in_flight = self.in_flight.lock().await;
        if let Some(existing) = in_flight.get(&id) {
            debug!("joining in-flight update check for script {id}");
            return existing.clone();
        }

        let registry = Arc::clone(&self.in_flight);
        let store = Arc::clone(&self.store);
        let transport = Arc::clone(&self.transport);
        let events = self.events.clone();
        // The job runs in its own task so a panic inside it cannot skip
        // the registry removal below.
        let job_handle = tokio::spawn(run_job(
            script, urls, fetch_options, options, store, transport, events,
        ));
        let handle = tokio::spawn(async move {
            let joined = job_handle.await;
            // Unregister before the shared future resolves so later
            // checks start fresh jobs.
            registry.lock().await.remove(&id);
            joined.unwrap_or_else(|error| {
                warn!("update job for script {id} failed: {error}");
                CheckOutcome::default()
            })
        });
        let job: SharedJob = handle
            .map(|joined| {
                joined.unwrap_or_else(|error| {
                    warn!("update job aborted: {error}");
                    CheckOutcome::default()
                })
            })
            .boxed()
            .shared();
        in_flight.insert(id, job.clone());
        job
    }
}
