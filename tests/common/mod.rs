//! Shared test fixtures: an in-memory script store, a collecting
//! notifier, and a fully wired pipeline.

#![allow(dead_code)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use tamarin::update::StatusEvent;
use tamarin::{
    HttpTransport, NotificationSink, Options, OptionsStore, ParseRequest, Result, Script,
    ScriptConfig, ScriptCustom, ScriptMeta, ScriptProps, ScriptStore, UpdateError, Updater,
    parse_meta,
};

/// Script store over a plain map, with call counters and failure
/// switches.
pub struct MemoryStore {
    scripts: Mutex<HashMap<i64, Script>>,
    pub scripts_calls: AtomicUsize,
    pub resource_calls: AtomicUsize,
    pub fail_parse: AtomicBool,
    pub fail_resources: AtomicBool,
    pub parsed: Mutex<Vec<ParseRequest>>,
}

impl MemoryStore {
    pub fn new(scripts: Vec<Script>) -> Self {
        let scripts = scripts.into_iter().map(|s| (s.id(), s)).collect();
        Self {
            scripts: Mutex::new(scripts),
            scripts_calls: AtomicUsize::new(0),
            resource_calls: AtomicUsize::new(0),
            fail_parse: AtomicBool::new(false),
            fail_resources: AtomicBool::new(false),
            parsed: Mutex::new(Vec::new()),
        }
    }

    pub fn parsed_requests(&self) -> Vec<ParseRequest> {
        self.parsed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScriptStore for MemoryStore {
    async fn scripts(&self) -> Vec<Script> {
        self.scripts_calls.fetch_add(1, Ordering::SeqCst);
        let mut all: Vec<Script> = self.scripts.lock().unwrap().values().cloned().collect();
        all.sort_by_key(Script::id);
        all
    }

    async fn script_by_id(&self, id: i64) -> Option<Script> {
        self.scripts.lock().unwrap().get(&id).cloned()
    }

    async fn parse_script(&self, request: ParseRequest) -> Result<Script> {
        if self.fail_parse.load(Ordering::SeqCst) {
            return Err(UpdateError::Parse("broken source".to_owned()));
        }
        self.parsed.lock().unwrap().push(request.clone());
        let mut scripts = self.scripts.lock().unwrap();
        let script = scripts
            .get_mut(&request.id)
            .ok_or_else(|| UpdateError::Store(format!("no script with id {}", request.id)))?;
        if let Some(version) = parse_meta(&request.code).version {
            script.meta.version = Some(version);
        }
        Ok(script.clone())
    }

    async fn fetch_resources(&self, _script: &Script) -> Result<()> {
        self.resource_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_resources.load(Ordering::SeqCst) {
            Err(UpdateError::Resource("icon fetch failed".to_owned()))
        } else {
            Ok(())
        }
    }
}

/// Notifier capturing every call as `(title, body, ids)`.
#[derive(Default)]
pub struct CollectingNotifier {
    calls: Mutex<Vec<(String, String, Vec<i64>)>>,
}

impl CollectingNotifier {
    pub fn calls(&self) -> Vec<(String, String, Vec<i64>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for CollectingNotifier {
    async fn notify(&self, title: &str, body: &str, script_ids: &[i64]) {
        self.calls
            .lock()
            .unwrap()
            .push((title.to_owned(), body.to_owned(), script_ids.to_vec()));
    }
}

/// A fully wired pipeline over [`MemoryStore`] and [`HttpTransport`].
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<CollectingNotifier>,
    pub options: Arc<OptionsStore>,
    pub updater: Arc<Updater>,
    pub events: mpsc::UnboundedReceiver<StatusEvent>,
}

pub fn harness(scripts: Vec<Script>) -> Harness {
    harness_with_options(scripts, Options::default())
}

pub fn harness_with_options(scripts: Vec<Script>, options: Options) -> Harness {
    let store = Arc::new(MemoryStore::new(scripts));
    let notifier = Arc::new(CollectingNotifier::default());
    let options = Arc::new(OptionsStore::new(options));
    let (tx, events) = mpsc::unbounded_channel();
    let updater = Arc::new(Updater::new(
        Arc::clone(&store) as Arc<dyn ScriptStore>,
        Arc::new(HttpTransport::new()),
        Arc::clone(&options),
        Arc::clone(&notifier) as Arc<dyn NotificationSink>,
        tx,
    ));
    Harness {
        store,
        notifier,
        options,
        updater,
        events,
    }
}

/// An installed script pointing at the given endpoints.
pub fn script(
    id: i64,
    name: &str,
    version: &str,
    update_url: Option<&str>,
    download_url: Option<&str>,
) -> Script {
    Script {
        props: ScriptProps { id },
        meta: ScriptMeta {
            name: name.to_owned(),
            version: Some(version.to_owned()),
            update_url: update_url.map(str::to_owned),
            download_url: download_url.map(str::to_owned),
        },
        custom: ScriptCustom::default(),
        config: ScriptConfig::default(),
    }
}

pub fn metablock(name: &str, version: &str) -> String {
    format!(
        "// ==UserScript==\n// @name {name}\n// @version {version}\n// ==/UserScript==\n"
    )
}

pub fn full_source(name: &str, version: &str) -> String {
    format!("{}console.log('{name}');\n", metablock(name, version))
}

/// Drain everything currently buffered on the status channel.
pub fn drain_events(rx: &mut mpsc::UnboundedReceiver<StatusEvent>) -> Vec<StatusEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Poll `condition` every 10 ms until it holds or `timeout` elapses.
pub async fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
