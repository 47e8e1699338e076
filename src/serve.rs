//! Request handling on top of generated artifacts.
//!
//! [`Server::handle`] takes a request path with its query string and answers
//! with either the full HTML document or, when the query carries the flight
//! marker (`?_rsc` by default), the raw chunk stream for the navigator. It is
//! independent of any HTTP stack; wiring it to one is a matter of mapping
//! [`Response`] onto that stack's response type.
//!
//! | Route | Served from |
//! |-------|-------------|
//! | in the prerender manifest, fresh or permanent | stored artifact |
//! | in the manifest, stale | stored artifact, one background regeneration |
//! | `dynamic = 'force-dynamic'` or `revalidate = 0` | rendered for this request |
//! | matched but never generated | rendered for this request |
//! | no match | the generated not-found page, status 404 |
//!
//! Render failures during request-time rendering are returned to the caller.

use crate::generate::{GenerateError, Generator, read_manifest};
use crate::matcher::match_path;
use crate::naming::{RouteError, build_path_with_params};
use crate::render::RenderError;
use crate::revalidate::Revalidator;
use crate::scan::RouteNode;
use crate::types::{ManifestEntry, PrerenderManifest};
use log::debug;
use std::fs;
use std::io;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tokio::task::JoinHandle;

pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";
pub const FLIGHT_CONTENT_TYPE: &str = "text/x-component";

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("render failed: {0}")]
    Render(#[from] RenderError),
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error(transparent)]
    Generate(#[from] GenerateError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Html,
    Flight,
}

/// How a response was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Stale,
    /// Rendered for this request.
    Dynamic,
}

#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub kind: BodyKind,
    pub body: String,
    pub etag: Option<String>,
    pub cache: CacheStatus,
    /// Background regeneration started by this request.
    pub regeneration: Option<JoinHandle<()>>,
}

impl Response {
    pub fn content_type(&self) -> &'static str {
        match self.kind {
            BodyKind::Html => HTML_CONTENT_TYPE,
            BodyKind::Flight => FLIGHT_CONTENT_TYPE,
        }
    }
}

pub struct Server {
    tree: Arc<RouteNode>,
    generator: Arc<Generator>,
    revalidator: Arc<Revalidator>,
    manifest: Arc<RwLock<PrerenderManifest>>,
}

impl Server {
    pub fn new(
        tree: RouteNode,
        generator: Generator,
        manifest: PrerenderManifest,
        revalidator: Revalidator,
    ) -> Self {
        Self {
            tree: Arc::new(tree),
            generator: Arc::new(generator),
            revalidator: Arc::new(revalidator),
            manifest: Arc::new(RwLock::new(manifest)),
        }
    }

    /// Serve the output of a previous generation pass.
    pub fn load(tree: RouteNode, generator: Generator, revalidator: Revalidator) -> Result<Self, ServeError> {
        let manifest = read_manifest(&generator.out_root())?;
        Ok(Self::new(tree, generator, manifest, revalidator))
    }

    pub fn revalidator(&self) -> &Revalidator {
        &self.revalidator
    }

    /// Current manifest entry for a concrete route path.
    pub fn entry(&self, route_path: &str) -> Option<ManifestEntry> {
        self.manifest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .routes
            .get(route_path)
            .cloned()
    }

    pub async fn handle(&self, path_and_query: &str) -> Result<Response, ServeError> {
        let (path, query) = path_and_query
            .split_once('?')
            .unwrap_or((path_and_query, ""));
        let kind = if self.wants_flight(query) {
            BodyKind::Flight
        } else {
            BodyKind::Html
        };

        let Some(matched) = match_path(&self.tree, path) else {
            return self.not_found(kind);
        };
        let node = matched.node();
        let route_path = build_path_with_params(&node.path, &matched.params)?;

        let entry = if node.page_config().renders_per_request() {
            None
        } else {
            self.entry(&route_path)
        };
        let Some(entry) = entry else {
            debug!("rendering {route_path} for this request");
            let rendered = self
                .generator
                .render_route(&route_path, &matched.chain, &matched.params)
                .await?;
            let body = match kind {
                BodyKind::Html => rendered.html,
                BodyKind::Flight => rendered.flight,
            };
            return Ok(Response {
                status: 200,
                kind,
                body,
                etag: None,
                cache: CacheStatus::Dynamic,
                regeneration: None,
            });
        };

        let stale = self.revalidator.freshness(&route_path).is_stale();
        let regeneration = if stale {
            self.schedule_regeneration(&route_path)
        } else {
            None
        };
        Ok(Response {
            status: 200,
            kind,
            body: self.read_artifact(&entry, kind)?,
            etag: Some(entry.etag),
            cache: if stale { CacheStatus::Stale } else { CacheStatus::Hit },
            regeneration,
        })
    }

    fn wants_flight(&self, query: &str) -> bool {
        let marker = &self.generator.config().serve.flight_query;
        query
            .split('&')
            .any(|pair| pair.split('=').next() == Some(marker.as_str()))
    }

    fn not_found(&self, kind: BodyKind) -> Result<Response, ServeError> {
        let entry = self
            .manifest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .not_found
            .clone();
        let (body, etag) = match entry {
            Some(entry) => (self.read_artifact(&entry, kind)?, Some(entry.etag)),
            None => ("Not Found".to_string(), None),
        };
        Ok(Response {
            status: 404,
            kind,
            body,
            etag,
            cache: CacheStatus::Hit,
            regeneration: None,
        })
    }

    fn read_artifact(&self, entry: &ManifestEntry, kind: BodyKind) -> io::Result<String> {
        let rel = match kind {
            BodyKind::Html => &entry.html,
            BodyKind::Flight => &entry.flight,
        };
        fs::read_to_string(self.generator.out_root().join(rel))
    }

    fn schedule_regeneration(&self, route_path: &str) -> Option<JoinHandle<()>> {
        let generator = Arc::clone(&self.generator);
        let tree = Arc::clone(&self.tree);
        let manifest = Arc::clone(&self.manifest);
        let path = route_path.to_string();
        self.revalidator.schedule(route_path, async move {
            let entry = generator.regenerate(&tree, &path).await?;
            let revalidate = entry.revalidate;
            manifest
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .routes
                .insert(path, entry);
            Ok::<_, GenerateError>(revalidate)
        })
    }
}
