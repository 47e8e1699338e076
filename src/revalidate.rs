//! Stale-while-revalidate for generated routes.
//!
//! The generator records when each route was produced and for how long it
//! stays fresh. The serving layer asks [`Revalidator::freshness`] on every
//! hit:
//!
//! | Age vs. `revalidate = N` | Result |
//! |--------------------------|--------|
//! | age < N | serve the artifact as is |
//! | age ≥ N | serve the stale artifact, start one regeneration |
//! | `false` or no value | permanent until the next full generation |
//!
//! At most one regeneration per route runs at a time. Further stale hits
//! while it is in flight serve the old artifact and schedule nothing.
//!
//! ## Storage
//!
//! The metadata lives at `<out_dir>/.revalidation.json`, written with an
//! atomic replace. A missing, corrupt, or older-version file loads as empty,
//! which makes every route permanent until the next generation.

use crate::generate::write_atomic;
use crate::types::Revalidate;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::task::JoinHandle;

/// Name of the metadata file within the output directory.
pub const STORE_FILENAME: &str = ".revalidation.json";

/// Bump to discard stores written by older versions.
const STORE_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Seconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub fn new(now: u64) -> Self {
        Self(AtomicU64::new(now))
    }

    pub fn advance(&self, secs: u64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }

    pub fn set(&self, now: u64) {
        self.0.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevalidationEntry {
    pub generated_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revalidate: Option<Revalidate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh { age: u64 },
    Stale { age: u64 },
    Permanent,
    /// No metadata for the route.
    Untracked,
}

impl Freshness {
    pub fn is_stale(&self) -> bool {
        matches!(self, Freshness::Stale { .. })
    }
}

impl fmt::Display for Freshness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Freshness::Fresh { age } => write!(f, "fresh ({age}s old)"),
            Freshness::Stale { age } => write!(f, "stale ({age}s old)"),
            Freshness::Permanent => f.write_str("permanent"),
            Freshness::Untracked => f.write_str("untracked"),
        }
    }
}

/// Per-route generation metadata, keyed by concrete route path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevalidationStore {
    pub version: u32,
    pub routes: BTreeMap<String, RevalidationEntry>,
}

impl Default for RevalidationStore {
    fn default() -> Self {
        Self::empty()
    }
}

impl RevalidationStore {
    pub fn empty() -> Self {
        Self {
            version: STORE_VERSION,
            routes: BTreeMap::new(),
        }
    }

    /// Load from the output directory, or an empty store.
    pub fn load(out_dir: &Path) -> Self {
        let path = out_dir.join(STORE_FILENAME);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        let store: Self = match serde_json::from_str(&content) {
            Ok(s) => s,
            Err(e) => {
                warn!("ignoring unreadable {}: {e}", path.display());
                return Self::empty();
            }
        };
        if store.version != STORE_VERSION {
            return Self::empty();
        }
        store
    }

    pub fn save(&self, out_dir: &Path) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(&out_dir.join(STORE_FILENAME), json.as_bytes())?;
        Ok(())
    }

    pub fn record(&mut self, route_path: &str, generated_at: u64, revalidate: Option<Revalidate>) {
        self.routes.insert(
            route_path.to_string(),
            RevalidationEntry {
                generated_at,
                revalidate,
            },
        );
    }

    pub fn get(&self, route_path: &str) -> Option<&RevalidationEntry> {
        self.routes.get(route_path)
    }

    pub fn freshness(&self, route_path: &str, now: u64) -> Freshness {
        let Some(entry) = self.routes.get(route_path) else {
            return Freshness::Untracked;
        };
        let age = now.saturating_sub(entry.generated_at);
        match entry.revalidate {
            Some(Revalidate::Seconds(ttl)) if age < ttl => Freshness::Fresh { age },
            Some(Revalidate::Seconds(_)) => Freshness::Stale { age },
            Some(Revalidate::Never) | None => Freshness::Permanent,
        }
    }
}

/// Shared freshness state plus the single-flight regeneration scheduler.
pub struct Revalidator {
    out_dir: Option<PathBuf>,
    store: Mutex<RevalidationStore>,
    in_flight: Mutex<HashSet<String>>,
    clock: Arc<dyn Clock>,
}

impl Revalidator {
    /// In-memory only; nothing is written back.
    pub fn new(store: RevalidationStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            out_dir: None,
            store: Mutex::new(store),
            in_flight: Mutex::new(HashSet::new()),
            clock,
        }
    }

    /// Backed by `<out_dir>/.revalidation.json`, saved after each regeneration.
    pub fn persistent(out_dir: &Path, clock: Arc<dyn Clock>) -> Self {
        Self {
            out_dir: Some(out_dir.to_path_buf()),
            ..Self::new(RevalidationStore::load(out_dir), clock)
        }
    }

    pub fn freshness(&self, route_path: &str) -> Freshness {
        self.store().freshness(route_path, self.clock.now())
    }

    pub fn entry(&self, route_path: &str) -> Option<RevalidationEntry> {
        self.store().get(route_path).copied()
    }

    pub fn is_regenerating(&self, route_path: &str) -> bool {
        self.in_flight().contains(route_path)
    }

    /// Run `regenerate` in the background unless the route is already being
    /// regenerated. On success the route's metadata is replaced; on failure
    /// the old metadata stays, so the next stale hit tries again.
    pub fn schedule<F, E>(self: &Arc<Self>, route_path: &str, regenerate: F) -> Option<JoinHandle<()>>
    where
        F: Future<Output = Result<Option<Revalidate>, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        if !self.in_flight().insert(route_path.to_string()) {
            debug!("{route_path} is already regenerating");
            return None;
        }
        let this = Arc::clone(self);
        let route_path = route_path.to_string();
        Some(tokio::spawn(async move {
            match regenerate.await {
                Ok(revalidate) => {
                    this.record(&route_path, revalidate);
                    info!("regenerated {route_path}");
                }
                Err(e) => warn!("regenerating {route_path} failed, keeping stale artifact: {e}"),
            }
            this.in_flight().remove(&route_path);
        }))
    }

    fn record(&self, route_path: &str, revalidate: Option<Revalidate>) {
        let mut store = self.store();
        store.record(route_path, self.clock.now(), revalidate);
        if let Some(out_dir) = &self.out_dir
            && let Err(e) = store.save(out_dir)
        {
            warn!("could not save revalidation metadata: {e}");
        }
    }

    fn store(&self) -> MutexGuard<'_, RevalidationStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn in_flight(&self) -> MutexGuard<'_, HashSet<String>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
