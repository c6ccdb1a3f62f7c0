//! Breakpoint store.
//!
//! The store owns the published [`BreakpointSet`] generation and the
//! write-back path to storage. Refresh pulls specs, compiles them
//! through the resolver, and swaps in a new immutable set; statement
//! hooks anywhere in the process observe either the old set or the
//! new one, never a mix.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use crate::breakpoint::{Breakpoint, BreakpointId, BreakpointSet, BreakpointSpec, HitOutcome};
use crate::config::AgentConfig;
use crate::error::StorageError;
use crate::resolve::LocationResolver;
use crate::storage::BreakpointStorage;

const WRITE_BACK_ATTEMPTS: u32 = 3;
const WRITE_BACK_BACKOFF: Duration = Duration::from_millis(50);

/// Cloneable handle to the shared breakpoint state.
///
/// All clones observe the same published set; the last clone to drop
/// shuts down the write-back worker.
#[derive(Clone)]
pub struct BreakpointStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    debuggee_id: String,
    storage: Arc<dyn BreakpointStorage>,
    resolver: Arc<LocationResolver>,
    refresh_interval: Duration,
    current: RwLock<Arc<BreakpointSet>>,
    generation: AtomicU64,
    // Serializes refresh; a losing thread skips instead of waiting.
    refresh_gate: Mutex<()>,
    last_refresh: Mutex<Option<Instant>>,
    // Terminal breakpoints known locally but possibly not yet visible
    // in storage, so a refresh cannot resurrect a fulfilled capture.
    suppressed: Mutex<FxHashSet<BreakpointId>>,
    write_back: Mutex<Option<Sender<HitOutcome>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl BreakpointStore {
    /// Create a store for one debuggee and start its write-back
    /// worker. No breakpoints are active until the first refresh.
    #[must_use]
    pub fn new(
        debuggee_id: &str,
        storage: Arc<dyn BreakpointStorage>,
        resolver: Arc<LocationResolver>,
        config: &AgentConfig,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<HitOutcome>();
        let worker_storage = Arc::clone(&storage);
        let worker_debuggee = debuggee_id.to_string();
        let worker = thread::Builder::new()
            .name("glimpse-writeback".to_string())
            .spawn(move || {
                while let Ok(outcome) = rx.recv() {
                    write_back(worker_storage.as_ref(), &worker_debuggee, &outcome);
                }
            })
            .expect("failed to spawn write-back worker");
        Self {
            inner: Arc::new(StoreInner {
                debuggee_id: debuggee_id.to_string(),
                storage,
                resolver,
                refresh_interval: config.refresh_interval,
                current: RwLock::new(Arc::new(BreakpointSet::default())),
                generation: AtomicU64::new(0),
                refresh_gate: Mutex::new(()),
                last_refresh: Mutex::new(None),
                suppressed: Mutex::new(FxHashSet::default()),
                write_back: Mutex::new(Some(tx)),
                worker: Mutex::new(Some(worker)),
            }),
        }
    }

    /// The currently published breakpoint set.
    #[must_use]
    pub fn current(&self) -> Arc<BreakpointSet> {
        Arc::clone(&self.inner.current.read().expect("breakpoint set poisoned"))
    }

    /// The resolver this store compiles specs against.
    #[must_use]
    pub fn resolver(&self) -> &Arc<LocationResolver> {
        &self.inner.resolver
    }

    /// Refresh from storage if the configured interval has elapsed.
    ///
    /// Cheap to call from request boundaries; most calls return
    /// without touching storage.
    pub fn maybe_refresh(&self) -> Result<bool, StorageError> {
        {
            let last = self
                .inner
                .last_refresh
                .lock()
                .expect("refresh timestamp poisoned");
            if let Some(at) = *last {
                if at.elapsed() < self.inner.refresh_interval {
                    return Ok(false);
                }
            }
        }
        self.refresh()
    }

    /// Pull specs from storage and publish a new set.
    ///
    /// Returns `Ok(false)` when another thread holds the refresh gate.
    /// On storage failure the previously published set stays in
    /// effect.
    pub fn refresh(&self) -> Result<bool, StorageError> {
        let Ok(_gate) = self.inner.refresh_gate.try_lock() else {
            return Ok(false);
        };
        let specs = match self.inner.storage.load(&self.inner.debuggee_id) {
            Ok(specs) => specs,
            Err(err) => {
                warn!(error = %err, "breakpoint refresh failed, keeping previous set");
                // A failed attempt still consumes the interval, so a
                // flaky backend is retried at the refresh cadence and
                // not on every statement boundary.
                *self
                    .inner
                    .last_refresh
                    .lock()
                    .expect("refresh timestamp poisoned") = Some(Instant::now());
                return Err(err);
            }
        };
        let now = unix_now();
        let suppressed = {
            let mut suppressed = self
                .inner
                .suppressed
                .lock()
                .expect("suppression set poisoned");
            // Once storage stops returning a spec its outcome has been
            // recorded there; dropping the local entry keeps the set
            // bounded and lets the same id be created anew later.
            suppressed.retain(|id| specs.iter().any(|spec| &spec.id == id));
            suppressed.clone()
        };
        let mut installed = Vec::with_capacity(specs.len());
        for spec in specs {
            if suppressed.contains(&spec.id) {
                continue;
            }
            installed.push(Arc::new(self.install(spec, now)));
        }
        let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let set = Arc::new(BreakpointSet::new(generation, installed));
        debug!(
            generation,
            breakpoints = set.len(),
            "published breakpoint set"
        );
        *self.inner.current.write().expect("breakpoint set poisoned") = set;
        *self
            .inner
            .last_refresh
            .lock()
            .expect("refresh timestamp poisoned") = Some(Instant::now());
        Ok(true)
    }

    fn install(&self, spec: BreakpointSpec, now: u64) -> Breakpoint {
        if spec.expires_at.is_some_and(|deadline| deadline <= now) {
            let bp = Breakpoint::expired(spec);
            self.record_hit(&bp);
            return bp;
        }
        let resolved = match self.inner.resolver.resolve(&spec.file, spec.line) {
            Ok(resolved) => resolved,
            Err(err) => {
                let bp = Breakpoint::failed(spec, err.to_string());
                self.record_hit(&bp);
                return bp;
            }
        };
        match Breakpoint::compile(spec.clone(), resolved) {
            Ok(bp) => bp,
            Err(err) => {
                let bp = Breakpoint::failed(spec, err.to_string());
                self.record_hit(&bp);
                bp
            }
        }
    }

    /// Record a breakpoint's terminal outcome: suppress it from
    /// future refreshes and queue the write-back.
    pub fn record_hit(&self, bp: &Breakpoint) {
        let Some(outcome) = HitOutcome::of(bp) else {
            return;
        };
        self.inner
            .suppressed
            .lock()
            .expect("suppression set poisoned")
            .insert(outcome.id.clone());
        let sender = self
            .inner
            .write_back
            .lock()
            .expect("write-back channel poisoned");
        if let Some(tx) = sender.as_ref() {
            if tx.send(outcome).is_err() {
                warn!("write-back worker gone, dropping outcome");
            }
        }
    }
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        // Close the channel first so the worker drains and exits.
        self.write_back
            .lock()
            .expect("write-back channel poisoned")
            .take();
        if let Some(worker) = self.worker.lock().expect("worker handle poisoned").take() {
            let _ = worker.join();
        }
    }
}

fn write_back(storage: &dyn BreakpointStorage, debuggee_id: &str, outcome: &HitOutcome) {
    let mut attempt = 0;
    loop {
        match storage.save(debuggee_id, outcome) {
            Ok(()) => return,
            Err(err) => {
                attempt += 1;
                if attempt >= WRITE_BACK_ATTEMPTS {
                    warn!(
                        breakpoint = %outcome.id,
                        error = %err,
                        "giving up on outcome write-back"
                    );
                    return;
                }
                thread::sleep(WRITE_BACK_BACKOFF * attempt);
            }
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
