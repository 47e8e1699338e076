//! Client-side navigation.
//!
//! The [`Navigator`] owns a location → decoded tree cache for its whole
//! lifetime. Locations are keyed by path and query; fragments are ignored.
//! Navigating to a cached location swaps the active tree immediately; otherwise
//! the chunk stream is fetched with the flight query marker, decoded, cached,
//! and then swapped in.
//!
//! Navigations are numbered. When a newer one has started by the time a
//! fetch completes, the older result is cached but not applied. A failed
//! fetch or decode falls back to a full page load through [`History::reload`].

use crate::flight::{DecodeError, Decoded, ModuleLoader, decode};
use crate::serve::FLIGHT_CONTENT_TYPE;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NavigationError {
    #[error("request for {url} failed: {reason}")]
    Fetch { url: String, reason: String },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("could not decode chunk stream: {0}")]
    Decode(#[from] DecodeError),
}

/// Fetches the chunk stream for a route path.
pub trait ChunkFetcher: Send + Sync {
    fn fetch<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<String, NavigationError>>;
}

/// [`ChunkFetcher`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: String,
    flight_query: String,
}

impl HttpFetcher {
    pub fn new(base_url: &str, flight_query: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            flight_query: flight_query.to_string(),
        }
    }

    /// `/blog?page=2` → `http://host/blog?page=2&_rsc`.
    pub fn url(&self, path: &str) -> String {
        let separator = if path.contains('?') { '&' } else { '?' };
        format!("{}{path}{separator}{}", self.base_url, self.flight_query)
    }
}

impl ChunkFetcher for HttpFetcher {
    fn fetch<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<String, NavigationError>> {
        async move {
            let url = self.url(path);
            let response = self
                .client
                .get(&url)
                .header(reqwest::header::ACCEPT, FLIGHT_CONTENT_TYPE)
                .send()
                .await
                .map_err(|e| fetch_error(&url, e))?;
            let status = response.status();
            if !status.is_success() {
                return Err(NavigationError::Status {
                    url,
                    status: status.as_u16(),
                });
            }
            response.text().await.map_err(|e| fetch_error(&url, e))
        }
        .boxed()
    }
}

fn fetch_error(url: &str, e: reqwest::Error) -> NavigationError {
    NavigationError::Fetch {
        url: url.to_string(),
        reason: e.to_string(),
    }
}

/// Browser history side effects.
pub trait History: Send + Sync {
    /// Record a completed in-page navigation.
    fn push(&self, path: &str);
    /// Full document load of `path`, bypassing the navigator.
    fn reload(&self, path: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// Already at the target.
    Unchanged,
    /// Swapped in a cached tree.
    Cached,
    /// Fetched, decoded, and swapped in.
    Fetched,
    /// Fell back to a full page load.
    Reloaded { reason: String },
    /// A newer navigation started before this one finished.
    Superseded,
}

struct State<M> {
    current: String,
    active: Option<Arc<Decoded<M>>>,
    cache: HashMap<String, Arc<Decoded<M>>>,
    latest: u64,
}

pub struct Navigator<F, H, L: ModuleLoader> {
    fetcher: F,
    history: H,
    loader: L,
    state: Mutex<State<L::Module>>,
}

impl<F: ChunkFetcher, H: History, L: ModuleLoader> Navigator<F, H, L> {
    /// Start at `path` with nothing decoded yet.
    pub fn new(path: &str, fetcher: F, history: H, loader: L) -> Self {
        Self {
            fetcher,
            history,
            loader,
            state: Mutex::new(State {
                current: route_key(path),
                active: None,
                cache: HashMap::new(),
                latest: 0,
            }),
        }
    }

    /// Take over the current document from its embedded chunk stream.
    pub fn hydrate(&self, stream: &str) -> Result<Arc<Decoded<L::Module>>, DecodeError> {
        let decoded = Arc::new(decode(stream, &self.loader)?);
        let mut state = self.state();
        let key = state.current.clone();
        state.cache.insert(key, Arc::clone(&decoded));
        state.active = Some(Arc::clone(&decoded));
        Ok(decoded)
    }

    pub fn current_path(&self) -> String {
        self.state().current.clone()
    }

    pub fn active(&self) -> Option<Arc<Decoded<L::Module>>> {
        self.state().active.clone()
    }

    pub fn is_cached(&self, path: &str) -> bool {
        self.state().cache.contains_key(&route_key(path))
    }

    /// In-page navigation to `target`; pushes a history entry on success.
    pub async fn navigate(&self, target: &str) -> NavigationOutcome {
        self.go(target, true).await
    }

    /// Back/forward to `target`. The browser already moved, so nothing is pushed.
    pub async fn pop_state(&self, target: &str) -> NavigationOutcome {
        self.go(target, false).await
    }

    /// Fetch and cache `target` without swapping it in.
    pub async fn prefetch(&self, target: &str) -> Result<(), NavigationError> {
        let key = route_key(target);
        if self.state().cache.contains_key(&key) {
            return Ok(());
        }
        let decoded = self.load(&key).await?;
        self.state().cache.insert(key, decoded);
        Ok(())
    }

    async fn go(&self, target: &str, push: bool) -> NavigationOutcome {
        let key = route_key(target);
        let ticket = {
            let mut state = self.state();
            if state.current == key {
                return NavigationOutcome::Unchanged;
            }
            state.latest += 1;
            if let Some(tree) = state.cache.get(&key).cloned() {
                state.current = key.clone();
                state.active = Some(tree);
                drop(state);
                if push {
                    self.history.push(&key);
                }
                return NavigationOutcome::Cached;
            }
            state.latest
        };

        let result = self.load(&key).await;
        let mut state = self.state();
        let superseded = state.latest != ticket;
        match result {
            Ok(decoded) => {
                state.cache.insert(key.clone(), Arc::clone(&decoded));
                if superseded {
                    debug!("discarding navigation to {key}, a newer one started");
                    return NavigationOutcome::Superseded;
                }
                state.current = key.clone();
                state.active = Some(decoded);
                drop(state);
                if push {
                    self.history.push(&key);
                }
                NavigationOutcome::Fetched
            }
            Err(_) if superseded => NavigationOutcome::Superseded,
            Err(e) => {
                drop(state);
                warn!("navigation to {key} failed, reloading: {e}");
                self.history.reload(target);
                NavigationOutcome::Reloaded {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn load(&self, target: &str) -> Result<Arc<Decoded<L::Module>>, NavigationError> {
        let stream = self.fetcher.fetch(target).await?;
        Ok(Arc::new(decode(&stream, &self.loader)?))
    }

    fn state(&self) -> MutexGuard<'_, State<L::Module>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cache key for a location: path and query, no fragment, no trailing slash.
///
/// The query is part of the key since pages render differently per query.
fn route_key(location: &str) -> String {
    let location = location.split('#').next().unwrap_or_default();
    let (path, query) = location.split_once('?').unwrap_or((location, ""));
    let trimmed = path.trim_end_matches('/');
    let mut key = if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    };
    if !query.is_empty() {
        key.push('?');
        key.push_str(query);
    }
    key
}
