//! Static generation.
//!
//! Renders every eligible route ahead of time and writes its artifacts:
//!
//! ```text
//! out/
//! ├── html/
//! │   ├── index.html              # "/"
//! │   ├── blog/index.html         # "/blog"
//! │   ├── blog/hello/index.html   # "/blog/hello" from /blog/[slug]
//! │   └── _not-found.html         # root not-found page
//! ├── flight/
//! │   ├── index.txt
//! │   ├── blog/index.txt
//! │   ├── blog/hello/index.txt
//! │   └── _not-found.txt
//! ├── prerender-manifest.json
//! └── .revalidation.json
//! ```
//!
//! Only `/` writes a file directly under `html/` and `flight/`, so a route
//! named `/index` or `/404` cannot overwrite the home or not-found artifacts.
//!
//! ## Eligibility
//!
//! - Pages without dynamic segments are generated once, unless their page
//!   exports `dynamic = 'force-dynamic'` or `revalidate = 0`.
//! - Pages with dynamic segments are generated once per parameter set
//!   returned by the page module's static-params function. Without one they
//!   are skipped, or fail if the page exports `dynamic = 'error'`.
//!
//! ## Failures
//!
//! A route that fails to expand, render, or write is logged and left out of
//! the manifest; the remaining routes are still generated. When two patterns
//! produce the same concrete path, the one generated later fails. Only failures to
//! write the manifest or the revalidation metadata abort the pass.
//!
//! Files under the public directory are copied verbatim into `html/`.

use crate::config::FlightConfig;
use crate::document::{DefaultDocument, DocumentInput, DocumentTemplate};
use crate::flight::encode;
use crate::matcher::match_path;
use crate::naming::{Params, RouteError, build_path_with_params, has_dynamic_segments};
use crate::render::{
    ClientModuleEntry, ClientRegistry, ModuleRegistry, RenderError, RenderOutput, render,
    render_file,
};
use crate::revalidate::{Clock, RevalidationStore, StoreError, SystemClock};
use crate::scan::RouteNode;
use crate::tree::Node;
use crate::types::{DynamicMode, ManifestEntry, PrerenderManifest};
use log::{debug, error, info, warn};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use walkdir::WalkDir;

/// Name of the manifest file within the output directory.
pub const MANIFEST_FILENAME: &str = "prerender-manifest.json";

/// Version of the manifest format.
pub const MANIFEST_VERSION: u32 = 1;

/// Route path recorded for the root not-found page.
pub const NOT_FOUND_ROUTE: &str = "/_not-found";

/// Not-found document, relative to the output root.
pub const NOT_FOUND_HTML: &str = "html/_not-found.html";

/// Not-found chunk stream, relative to the output root.
pub const NOT_FOUND_FLIGHT: &str = "flight/_not-found.txt";

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("render failed: {0}")]
    Render(#[from] RenderError),
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error("{0} sets dynamic = 'error' but has no static params")]
    MissingStaticParams(String),
    #[error("no route matches {0}")]
    NoRoute(String),
    #[error("{0} is rendered per request")]
    NotStatic(String),
    #[error("{route} is already generated from {owner}")]
    DuplicateRoute { route: String, owner: String },
}

/// Progress reported while generating.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerateEvent {
    Started { pages: usize },
    Generated(ManifestEntry),
    Skipped { route: String, reason: String },
    Failed { route: String, error: String },
    PublicCopied { files: usize },
    Finished { generated: usize, skipped: usize, failed: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationResult {
    Generated(ManifestEntry),
    Skipped { route: String, reason: String },
    Failed { route: String, error: String },
}

impl GenerationResult {
    /// Concrete path for generated routes, the pattern otherwise.
    pub fn route(&self) -> &str {
        match self {
            GenerationResult::Generated(entry) => &entry.route_path,
            GenerationResult::Skipped { route, .. } | GenerationResult::Failed { route, .. } => {
                route
            }
        }
    }

    pub fn is_generated(&self) -> bool {
        matches!(self, GenerationResult::Generated(_))
    }
}

/// One route rendered into its wire and document forms.
#[derive(Debug, Clone)]
pub struct RenderedRoute {
    pub route_path: String,
    pub tree: Node,
    pub flight: String,
    pub html: String,
    pub client_modules: Vec<String>,
}

enum Expansion {
    Params(Vec<Params>),
    Skip(String),
}

pub struct Generator {
    project_root: PathBuf,
    config: FlightConfig,
    modules: ModuleRegistry,
    clients: ClientRegistry,
    template: Arc<dyn DocumentTemplate>,
    clock: Arc<dyn Clock>,
    events: Option<Sender<GenerateEvent>>,
    manifest_lock: Mutex<()>,
}

impl Generator {
    pub fn new(
        project_root: &Path,
        config: FlightConfig,
        modules: ModuleRegistry,
        clients: ClientRegistry,
    ) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            config,
            modules,
            clients,
            template: Arc::new(DefaultDocument::default()),
            clock: Arc::new(SystemClock),
            events: None,
            manifest_lock: Mutex::new(()),
        }
    }

    pub fn with_template(mut self, template: impl DocumentTemplate + 'static) -> Self {
        self.template = Arc::new(template);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_events(mut self, events: Sender<GenerateEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &FlightConfig {
        &self.config
    }

    pub fn modules(&self) -> &ModuleRegistry {
        &self.modules
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    pub fn out_root(&self) -> PathBuf {
        self.config.out_root(&self.project_root)
    }

    /// Generate every eligible route, then write the manifest and the
    /// revalidation metadata as one batch.
    pub async fn generate(&self, tree: &RouteNode) -> Result<Vec<GenerationResult>, GenerateError> {
        let out = self.out_root();
        fs::create_dir_all(&out)?;

        let chains = tree.page_chains();
        self.emit(GenerateEvent::Started {
            pages: chains.len(),
        });

        let mut results = Vec::new();
        let mut manifest = PrerenderManifest {
            version: MANIFEST_VERSION,
            ..PrerenderManifest::default()
        };
        let mut store = RevalidationStore::empty();
        let generated_at = self.clock.now();
        // html artifact → pattern that claimed it
        let mut claimed: HashMap<String, String> = HashMap::new();

        for chain in &chains {
            let node = chain[chain.len() - 1];
            let expansion = match self.expand(node).await {
                Ok(expansion) => expansion,
                Err(e) => {
                    results.push(self.failed(&node.path, &e));
                    continue;
                }
            };
            let params_list = match expansion {
                Expansion::Params(list) => list,
                Expansion::Skip(reason) => {
                    results.push(self.skipped(&node.path, reason));
                    continue;
                }
            };
            for params in params_list {
                let route = match build_path_with_params(&node.path, &params) {
                    Ok(route) => route,
                    Err(e) => {
                        results.push(self.failed(&node.path, &e.into()));
                        continue;
                    }
                };
                let (html, _) = artifact_paths(&route);
                if let Some(owner) = claimed.get(&html) {
                    let e = GenerateError::DuplicateRoute {
                        route: route.clone(),
                        owner: owner.clone(),
                    };
                    results.push(self.failed(&route, &e));
                    continue;
                }
                claimed.insert(html, node.path.clone());

                match self.generate_route(chain, &params).await {
                    Ok(entry) => {
                        store.record(&entry.route_path, generated_at, entry.revalidate);
                        manifest.routes.insert(entry.route_path.clone(), entry.clone());
                        self.emit(GenerateEvent::Generated(entry.clone()));
                        results.push(GenerationResult::Generated(entry));
                    }
                    Err(e) => results.push(self.failed(&route, &e)),
                }
            }
        }

        if tree.not_found.is_some() {
            match self.generate_not_found(tree).await {
                Ok(entry) => {
                    self.emit(GenerateEvent::Generated(entry.clone()));
                    manifest.not_found = Some(entry.clone());
                    results.push(GenerationResult::Generated(entry));
                }
                Err(e) => results.push(self.failed(NOT_FOUND_ROUTE, &e)),
            }
        }

        match self.copy_public() {
            Ok(files) => self.emit(GenerateEvent::PublicCopied { files }),
            Err(e) => warn!("could not copy public files: {e}"),
        }

        write_manifest(&out, &manifest)?;
        store.save(&out)?;

        let generated = results.iter().filter(|r| r.is_generated()).count();
        let failed = results
            .iter()
            .filter(|r| matches!(r, GenerationResult::Failed { .. }))
            .count();
        let skipped = results.len() - generated - failed;
        info!("generated {generated} routes ({skipped} skipped, {failed} failed)");
        self.emit(GenerateEvent::Finished {
            generated,
            skipped,
            failed,
        });
        Ok(results)
    }

    /// Regenerate one concrete route and replace its manifest entry.
    pub async fn regenerate(
        &self,
        tree: &RouteNode,
        route_path: &str,
    ) -> Result<ManifestEntry, GenerateError> {
        let matched =
            match_path(tree, route_path).ok_or_else(|| GenerateError::NoRoute(route_path.into()))?;
        if matched.node().page_config().renders_per_request() {
            return Err(GenerateError::NotStatic(route_path.to_string()));
        }
        let entry = self.generate_route(&matched.chain, &matched.params).await?;

        let out = self.out_root();
        let _guard = self.manifest_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut manifest = read_manifest(&out).unwrap_or_else(|e| {
            warn!("starting a new manifest: {e}");
            PrerenderManifest {
                version: MANIFEST_VERSION,
                ..PrerenderManifest::default()
            }
        });
        manifest.routes.insert(entry.route_path.clone(), entry.clone());
        write_manifest(&out, &manifest)?;
        Ok(entry)
    }

    /// Render a route chain without writing anything.
    pub async fn render_route(
        &self,
        route_path: &str,
        chain: &[&RouteNode],
        params: &Params,
    ) -> Result<RenderedRoute, RenderError> {
        let output = render(chain, params, &self.modules, &self.clients).await?;
        Ok(self.finish(route_path, output))
    }

    fn finish(&self, route_path: &str, output: RenderOutput) -> RenderedRoute {
        let flight = encode(&output.tree);
        let eager: Vec<ClientModuleEntry> = output
            .client_modules
            .iter()
            .filter_map(|id| self.clients.get(id).cloned())
            .collect();
        let html = self.template.render(&DocumentInput {
            route_path,
            tree: &output.tree,
            flight: &flight,
            eager_modules: &eager,
        });
        RenderedRoute {
            route_path: route_path.to_string(),
            tree: output.tree,
            flight,
            html,
            client_modules: output.client_modules,
        }
    }

    async fn expand(&self, node: &RouteNode) -> Result<Expansion, GenerateError> {
        let config = node.page_config();
        let mode = config.dynamic_mode();
        if mode == DynamicMode::ForceDynamic {
            return Ok(Expansion::Skip("force-dynamic, rendered per request".into()));
        }
        if config.renders_per_request() {
            return Ok(Expansion::Skip("revalidate = 0, rendered per request".into()));
        }
        if !has_dynamic_segments(&node.path) {
            return Ok(Expansion::Params(vec![Params::new()]));
        }

        let generator = node
            .page
            .as_ref()
            .filter(|page| !page.is_client())
            .and_then(|page| self.modules.get(&page.relative_path))
            .and_then(|module| module.static_params());
        match (generator, mode) {
            (Some(generator), _) => {
                let params = generator.resolve().await?;
                debug!("{} expands to {} routes", node.path, params.len());
                Ok(Expansion::Params(params))
            }
            (None, DynamicMode::Error) => Err(GenerateError::MissingStaticParams(node.path.clone())),
            (None, DynamicMode::ForceStatic) => {
                warn!("{} is force-static but has no static params", node.path);
                Ok(Expansion::Skip("force-static without static params".into()))
            }
            (None, _) => Ok(Expansion::Skip("dynamic route without static params".into())),
        }
    }

    async fn generate_route(
        &self,
        chain: &[&RouteNode],
        params: &Params,
    ) -> Result<ManifestEntry, GenerateError> {
        let node = chain[chain.len() - 1];
        let route_path = build_path_with_params(&node.path, params)?;
        let rendered = self.render_route(&route_path, chain, params).await?;
        let (html, flight) = artifact_paths(&route_path);
        self.write_artifacts(&html, &flight, &rendered)?;

        let config = node.page_config();
        Ok(ManifestEntry {
            route_path,
            pattern: node.path.clone(),
            params: params.clone(),
            html,
            flight,
            revalidate: config.revalidate.or(self.config.serve.default_revalidate),
            dynamic: config.dynamic_mode(),
            etag: etag(&rendered.flight),
        })
    }

    async fn generate_not_found(&self, tree: &RouteNode) -> Result<ManifestEntry, GenerateError> {
        let Some(file) = &tree.not_found else {
            return Err(GenerateError::NoRoute(NOT_FOUND_ROUTE.into()));
        };
        let output = render_file(&[tree], file, &Params::new(), &self.modules, &self.clients).await?;
        let rendered = self.finish(NOT_FOUND_ROUTE, output);
        let html = NOT_FOUND_HTML.to_string();
        let flight = NOT_FOUND_FLIGHT.to_string();
        self.write_artifacts(&html, &flight, &rendered)?;
        Ok(ManifestEntry {
            route_path: NOT_FOUND_ROUTE.to_string(),
            pattern: NOT_FOUND_ROUTE.to_string(),
            params: Params::new(),
            html,
            flight,
            revalidate: None,
            dynamic: DynamicMode::Auto,
            etag: etag(&rendered.flight),
        })
    }

    fn write_artifacts(&self, html: &str, flight: &str, rendered: &RenderedRoute) -> io::Result<()> {
        let out = self.out_root();
        write_atomic(&out.join(html), rendered.html.as_bytes())?;
        write_atomic(&out.join(flight), rendered.flight.as_bytes())
    }

    /// Copy the public directory into `html/`. Returns the number of files.
    fn copy_public(&self) -> io::Result<usize> {
        let public = self.config.public_root(&self.project_root);
        if !public.is_dir() {
            return Ok(0);
        }
        let dest_root = self.out_root().join("html");
        let mut copied = 0;
        for entry in WalkDir::new(&public).sort_by_file_name() {
            let entry = entry?;
            let rel = entry.path().strip_prefix(&public).unwrap_or(entry.path());
            let dest = dest_root.join(rel);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&dest)?;
            } else if entry.file_type().is_file() {
                fs::copy(entry.path(), &dest)?;
                copied += 1;
            }
        }
        Ok(copied)
    }

    fn skipped(&self, route: &str, reason: String) -> GenerationResult {
        debug!("skipping {route}: {reason}");
        self.emit(GenerateEvent::Skipped {
            route: route.to_string(),
            reason: reason.clone(),
        });
        GenerationResult::Skipped {
            route: route.to_string(),
            reason,
        }
    }

    fn failed(&self, route: &str, e: &GenerateError) -> GenerationResult {
        error!("failed to generate {route}: {e}");
        self.emit(GenerateEvent::Failed {
            route: route.to_string(),
            error: e.to_string(),
        });
        GenerationResult::Failed {
            route: route.to_string(),
            error: e.to_string(),
        }
    }

    fn emit(&self, event: GenerateEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

/// Output-relative HTML and chunk-stream paths for a concrete route.
///
/// `/` → `html/index.html`, `/blog/hello` → `html/blog/hello/index.html`.
pub fn artifact_paths(route_path: &str) -> (String, String) {
    let trimmed = route_path.trim_matches('/');
    if trimmed.is_empty() {
        return ("html/index.html".to_string(), "flight/index.txt".to_string());
    }
    (
        format!("html/{trimmed}/index.html"),
        format!("flight/{trimmed}/index.txt"),
    )
}

/// SHA-256 of a chunk stream, hex encoded.
pub fn etag(flight: &str) -> String {
    format!("{:x}", Sha256::digest(flight.as_bytes()))
}

pub fn read_manifest(out_dir: &Path) -> Result<PrerenderManifest, GenerateError> {
    let content = fs::read_to_string(out_dir.join(MANIFEST_FILENAME))?;
    Ok(serde_json::from_str(&content)?)
}

pub fn write_manifest(out_dir: &Path, manifest: &PrerenderManifest) -> Result<(), GenerateError> {
    let json = serde_json::to_string_pretty(manifest)?;
    write_atomic(&out_dir.join(MANIFEST_FILENAME), json.as_bytes())?;
    Ok(())
}

/// Write to a sibling temp file, then rename over `path`.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlightConfig;
    use crate::naming::ParamValue;
    use crate::render::ServerModule;
    use crate::revalidate::{ManualClock, STORE_FILENAME};
    use crate::test_helpers::*;
    use crate::types::Revalidate;
    use crate::view::{Deferred, View};

    fn slug_page() -> ServerModule {
        ServerModule::new(|props| {
            let slug = match props.params.get("slug") {
                Some(value) => value.as_segments().join("/"),
                None => String::new(),
            };
            Deferred::ready(Ok(View::element("h1").child(slug).into()))
        })
    }

    fn posts(slugs: &'static [&'static str]) -> ServerModule {
        slug_page().with_static_params(move || {
            Deferred::pending(async move {
                Ok(slugs.iter().map(|s| params(&[("slug", (*s).into())])).collect())
            })
        })
    }

    fn generator(fixture: &AppFixture, modules: ModuleRegistry, tree: &RouteNode) -> Generator {
        let mut clients = ClientRegistry::from_tree(tree, "/static");
        clients.register("components/counter.tsx");
        Generator::new(fixture.root(), FlightConfig::default(), modules, clients)
            .with_clock(Arc::new(ManualClock::new(1_000)))
    }

    fn read(fixture: &AppFixture, rel: &str) -> String {
        fs::read_to_string(fixture.root().join("out").join(rel)).unwrap()
    }

    fn generated(results: &[GenerationResult]) -> Vec<&str> {
        results
            .iter()
            .filter(|r| r.is_generated())
            .map(|r| r.route())
            .collect()
    }

    // =========================================================================
    // Artifacts
    // =========================================================================

    #[test]
    fn artifact_paths_mirror_urls() {
        assert_eq!(
            artifact_paths("/"),
            ("html/index.html".to_string(), "flight/index.txt".to_string())
        );
        assert_eq!(
            artifact_paths("/blog/hello"),
            (
                "html/blog/hello/index.html".to_string(),
                "flight/blog/hello/index.txt".to_string()
            )
        );
        assert_eq!(artifact_paths("/docs/a/b").1, "flight/docs/a/b/index.txt");
        assert_eq!(artifact_paths("/index").0, "html/index/index.html");
        assert_ne!(artifact_paths("/_not-found").0, NOT_FOUND_HTML);
    }

    #[tokio::test]
    async fn index_and_404_routes_keep_their_own_artifacts() {
        let fixture = AppFixture::new();
        fixture.file("page.tsx", "export default function Home() {}");
        fixture.file("index/page.tsx", "export default function Index() {}");
        fixture.file("404/page.tsx", "export default function FourOhFour() {}");
        fixture.file("not-found.tsx", "export default function Missing() {}");
        let tree = fixture.scan();

        let modules = registry_with(vec![
            ("app/page.tsx", text_page("home")),
            ("app/index/page.tsx", text_page("index page")),
            ("app/404/page.tsx", text_page("a page named 404")),
            ("app/not-found.tsx", text_page("nothing here")),
        ]);
        let results = generator(&fixture, modules, &tree).generate(&tree).await.unwrap();
        assert_eq!(generated(&results).len(), 4);

        let manifest = read_manifest(&fixture.root().join("out")).unwrap();
        let not_found = manifest.not_found.clone().unwrap();
        let mut html: Vec<&str> = manifest.routes.values().map(|e| e.html.as_str()).collect();
        html.push(&not_found.html);
        let mut unique = html.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), html.len());

        assert!(read(&fixture, &manifest.routes["/"].flight).contains("home"));
        assert!(read(&fixture, &manifest.routes["/index"].flight).contains("index page"));
        assert!(read(&fixture, &manifest.routes["/404"].html).contains("a page named 404"));
        assert!(read(&fixture, &not_found.html).contains("nothing here"));
    }

    #[tokio::test]
    async fn later_route_with_same_path_fails() {
        let fixture = AppFixture::new();
        fixture.file("blog/about/page.tsx", "export default function About() {}");
        fixture.file("blog/[slug]/page.tsx", "export default function Post() {}");
        let tree = fixture.scan();

        let modules = registry_with(vec![
            ("app/blog/about/page.tsx", text_page("the real about")),
            ("app/blog/[slug]/page.tsx", posts(&["about", "first"])),
        ]);
        let results = generator(&fixture, modules, &tree).generate(&tree).await.unwrap();

        let about: Vec<&GenerationResult> =
            results.iter().filter(|r| r.route() == "/blog/about").collect();
        assert_eq!(about.len(), 2);
        assert!(about[0].is_generated());
        assert!(matches!(
            about[1],
            GenerationResult::Failed { error, .. } if error.contains("already generated")
        ));

        // directories enumerate in either order; the first one wins
        let GenerationResult::Generated(first) = about[0] else {
            unreachable!()
        };
        let manifest = read_manifest(&fixture.root().join("out")).unwrap();
        assert!(manifest.routes.contains_key("/blog/first"));
        let entry = &manifest.routes["/blog/about"];
        assert_eq!(entry.pattern, first.pattern);
        let text = if first.pattern == "/blog/about" {
            "the real about"
        } else {
            "<h1>about</h1>"
        };
        assert!(read(&fixture, &entry.html).contains(text));
    }

    #[tokio::test]
    async fn static_pages_write_html_flight_and_manifest() {
        let fixture = AppFixture::new();
        fixture.file("layout.tsx", "export default function Root() {}");
        fixture.file("page.tsx", "export const revalidate = 60\nexport default function Home() {}");
        fixture.file("about/page.tsx", "export default function About() {}");
        let tree = fixture.scan();

        let modules = registry_with(vec![
            ("app/page.tsx", text_page("home")),
            ("app/about/page.tsx", text_page("about")),
        ]);
        let results = generator(&fixture, modules, &tree).generate(&tree).await.unwrap();
        assert_eq!(generated(&results).len(), 2);

        let flight = read(&fixture, "flight/index.txt");
        assert_eq!(flight, "0J[\"$\",\"main\",null,{},[[\"$\",\"p\",null,{},[\"home\"]]]]\n");
        let html = read(&fixture, "html/about/index.html");
        assert!(html.contains("<main><p>about</p></main>"));

        let manifest = read_manifest(&fixture.root().join("out")).unwrap();
        let home = &manifest.routes["/"];
        assert_eq!(home.html, "html/index.html");
        assert_eq!(home.revalidate, Some(Revalidate::Seconds(60)));
        assert_eq!(home.etag, etag(&flight));
        assert_eq!(manifest.routes["/about"].revalidate, None);

        let store = RevalidationStore::load(&fixture.root().join("out"));
        assert_eq!(store.get("/").unwrap().generated_at, 1_000);
        assert!(fixture.root().join("out").join(STORE_FILENAME).exists());
    }

    #[tokio::test]
    async fn generation_is_reproducible() {
        let fixture = AppFixture::new();
        fixture.file("page.tsx", "export default function Home() {}");
        let tree = fixture.scan();
        let generator = generator(&fixture, registry_with(vec![("app/page.tsx", text_page("x"))]), &tree);

        generator.generate(&tree).await.unwrap();
        let first = read(&fixture, "flight/index.txt");
        generator.generate(&tree).await.unwrap();
        assert_eq!(read(&fixture, "flight/index.txt"), first);
    }

    // =========================================================================
    // Eligibility
    // =========================================================================

    #[tokio::test]
    async fn static_params_expand_to_one_entry_each() {
        let fixture = AppFixture::new();
        fixture.file("blog/[slug]/page.tsx", "export default function Post() {}");
        let tree = fixture.scan();

        let modules = registry_with(vec![("app/blog/[slug]/page.tsx", posts(&["a", "b", "c"]))]);
        let results = generator(&fixture, modules, &tree).generate(&tree).await.unwrap();

        assert_eq!(generated(&results), vec!["/blog/a", "/blog/b", "/blog/c"]);
        let manifest = read_manifest(&fixture.root().join("out")).unwrap();
        assert_eq!(manifest.routes.len(), 3);
        assert_eq!(manifest.routes["/blog/b"].pattern, "/blog/[slug]");
        assert!(read(&fixture, "html/blog/c/index.html").contains("<h1>c</h1>"));
    }

    #[tokio::test]
    async fn catch_all_params_join_with_slash() {
        let fixture = AppFixture::new();
        fixture.file("docs/[...slug]/page.tsx", "export default function Doc() {}");
        let tree = fixture.scan();

        let page = slug_page().with_static_params(|| {
            Deferred::ready(Ok(vec![params(&[(
                "slug",
                ParamValue::Many(vec!["guide".into(), "intro".into()]),
            )])]))
        });
        let modules = registry_with(vec![("app/docs/[...slug]/page.tsx", page)]);
        let results = generator(&fixture, modules, &tree).generate(&tree).await.unwrap();
        assert_eq!(generated(&results), vec!["/docs/guide/intro"]);
        assert!(read(&fixture, "html/docs/guide/intro/index.html").contains("guide/intro"));
    }

    #[tokio::test]
    async fn force_dynamic_pages_never_reach_the_manifest() {
        let fixture = AppFixture::new();
        fixture.file("page.tsx", "export default function Home() {}");
        fixture.file(
            "live/page.tsx",
            "export const dynamic = 'force-dynamic'\nexport default function Live() {}",
        );
        let tree = fixture.scan();

        let modules = registry_with(vec![
            ("app/page.tsx", text_page("home")),
            ("app/live/page.tsx", text_page("live")),
        ]);
        let results = generator(&fixture, modules, &tree).generate(&tree).await.unwrap();

        let manifest = read_manifest(&fixture.root().join("out")).unwrap();
        assert!(!manifest.routes.contains_key("/live"));
        assert!(matches!(
            results.iter().find(|r| r.route() == "/live"),
            Some(GenerationResult::Skipped { .. })
        ));
        assert!(!fixture.root().join("out/html/live/index.html").exists());
    }

    #[tokio::test]
    async fn zero_revalidate_is_skipped_and_never_regenerated() {
        let fixture = AppFixture::new();
        fixture.file("page.tsx", "export default function Home() {}");
        fixture.file("feed/page.tsx", "export const revalidate = 0;\nexport default function Feed() {}");
        let tree = fixture.scan();

        let modules = registry_with(vec![
            ("app/page.tsx", text_page("home")),
            ("app/feed/page.tsx", text_page("feed")),
        ]);
        let generator = generator(&fixture, modules, &tree);
        let results = generator.generate(&tree).await.unwrap();

        assert_eq!(generated(&results), vec!["/"]);
        assert!(matches!(
            results.iter().find(|r| r.route() == "/feed"),
            Some(GenerationResult::Skipped { reason, .. }) if reason.contains("revalidate = 0")
        ));
        assert!(RevalidationStore::load(&fixture.root().join("out")).get("/feed").is_none());
        assert!(matches!(
            generator.regenerate(&tree, "/feed").await,
            Err(GenerateError::NotStatic(_))
        ));
    }

    #[tokio::test]
    async fn dynamic_route_without_params() {
        let fixture = AppFixture::new();
        fixture.file("a/[id]/page.tsx", "export default function A() {}");
        fixture.file("b/[id]/page.tsx", "export const dynamic = 'error'\nexport default function B() {}");
        fixture.file("c/[id]/page.tsx", "export const dynamic = 'force-static'\nexport default function C() {}");
        let tree = fixture.scan();

        let modules = registry_with(vec![
            ("app/a/[id]/page.tsx", slug_page()),
            ("app/b/[id]/page.tsx", slug_page()),
            ("app/c/[id]/page.tsx", slug_page()),
        ]);
        let results = generator(&fixture, modules, &tree).generate(&tree).await.unwrap();

        let outcome = |route: &str| results.iter().find(|r| r.route() == route).unwrap().clone();
        assert!(matches!(outcome("/a/[id]"), GenerationResult::Skipped { .. }));
        assert!(matches!(outcome("/b/[id]"), GenerationResult::Failed { .. }));
        assert!(matches!(outcome("/c/[id]"), GenerationResult::Skipped { .. }));
    }

    #[tokio::test]
    async fn default_revalidate_applies_when_page_has_none() {
        let fixture = AppFixture::new();
        fixture.file("page.tsx", "export default function Home() {}");
        fixture.file("news/page.tsx", "export const revalidate = false\nexport default function N() {}");
        let tree = fixture.scan();

        let mut config = FlightConfig::default();
        config.serve.default_revalidate = Some(Revalidate::Seconds(300));
        let modules = registry_with(vec![
            ("app/page.tsx", text_page("home")),
            ("app/news/page.tsx", text_page("news")),
        ]);
        let generator = Generator::new(fixture.root(), config, modules, ClientRegistry::new("/s"));
        generator.generate(&tree).await.unwrap();

        let manifest = read_manifest(&fixture.root().join("out")).unwrap();
        assert_eq!(manifest.routes["/"].revalidate, Some(Revalidate::Seconds(300)));
        assert_eq!(manifest.routes["/news"].revalidate, Some(Revalidate::Never));
    }

    // =========================================================================
    // Failures
    // =========================================================================

    #[tokio::test]
    async fn failing_route_does_not_stop_siblings() {
        let fixture = AppFixture::new();
        fixture.file("page.tsx", "export default function Home() {}");
        fixture.file("broken/page.tsx", "export default function Broken() {}");
        fixture.file("blog/[slug]/page.tsx", "export default function Post() {}");
        let tree = fixture.scan();

        let broken = ServerModule::new(|_| Deferred::ready(Err(RenderError::failed("db down"))));
        let modules = registry_with(vec![
            ("app/page.tsx", text_page("home")),
            ("app/broken/page.tsx", broken),
            ("app/blog/[slug]/page.tsx", posts(&["ok", "bad/slug"])),
        ]);
        let results = generator(&fixture, modules, &tree).generate(&tree).await.unwrap();

        let mut routes = generated(&results);
        routes.sort();
        assert_eq!(routes, vec!["/", "/blog/ok"]);
        let failed: Vec<_> = results
            .iter()
            .filter(|r| matches!(r, GenerationResult::Failed { .. }))
            .map(|r| r.route())
            .collect();
        assert_eq!(failed.len(), 2);
        assert!(failed.contains(&"/broken"));

        let manifest = read_manifest(&fixture.root().join("out")).unwrap();
        assert_eq!(manifest.routes.len(), 2);
        assert!(!fixture.root().join("out/html/broken/index.html").exists());
    }

    #[tokio::test]
    async fn failing_static_params_fail_only_that_route() {
        let fixture = AppFixture::new();
        fixture.file("page.tsx", "export default function Home() {}");
        fixture.file("blog/[slug]/page.tsx", "export default function Post() {}");
        let tree = fixture.scan();

        let page = slug_page().with_static_params(|| Deferred::ready(Err(RenderError::failed("cms down"))));
        let modules = registry_with(vec![
            ("app/page.tsx", text_page("home")),
            ("app/blog/[slug]/page.tsx", page),
        ]);
        let results = generator(&fixture, modules, &tree).generate(&tree).await.unwrap();
        assert_eq!(generated(&results), vec!["/"]);
    }

    #[tokio::test]
    async fn nested_failures_still_generate_with_error_chunks() {
        let fixture = AppFixture::new();
        fixture.file("page.tsx", "export default function Home() {}");
        let tree = fixture.scan();

        let page = ServerModule::new(|_| {
            Deferred::ready(Ok(View::element("div")
                .child(View::pending(async { Err(RenderError::failed("widget")) }))
                .into()))
        });
        let results = generator(&fixture, registry_with(vec![("app/page.tsx", page)]), &tree)
            .generate(&tree)
            .await
            .unwrap();
        assert_eq!(generated(&results), vec!["/"]);
        assert!(read(&fixture, "flight/index.txt").starts_with("1E{"));
    }

    // =========================================================================
    // Extras
    // =========================================================================

    #[tokio::test]
    async fn not_found_and_public_files() {
        let fixture = AppFixture::new();
        fixture.file("layout.tsx", "export default function Root() {}");
        fixture.file("page.tsx", "export default function Home() {}");
        fixture.file("not-found.tsx", "export default function Missing() {}");
        fixture.project_file("public/robots.txt", "User-agent: *");
        fixture.project_file("public/img/logo.svg", "<svg/>");
        let tree = fixture.scan();

        let modules = registry_with(vec![
            ("app/page.tsx", text_page("home")),
            ("app/not-found.tsx", text_page("nothing here")),
        ]);
        let (tx, rx) = std::sync::mpsc::channel();
        let generator = generator(&fixture, modules, &tree).with_events(tx);
        generator.generate(&tree).await.unwrap();
        drop(generator);

        assert!(read(&fixture, NOT_FOUND_HTML).contains("<main><p>nothing here</p></main>"));
        assert!(read(&fixture, NOT_FOUND_FLIGHT).contains("nothing here"));
        assert_eq!(read(&fixture, "html/robots.txt"), "User-agent: *");
        assert_eq!(read(&fixture, "html/img/logo.svg"), "<svg/>");

        let manifest = read_manifest(&fixture.root().join("out")).unwrap();
        assert_eq!(manifest.not_found.unwrap().html, NOT_FOUND_HTML);
        assert!(!manifest.routes.contains_key(NOT_FOUND_ROUTE));

        let events: Vec<GenerateEvent> = rx.iter().collect();
        assert_eq!(events.first(), Some(&GenerateEvent::Started { pages: 1 }));
        assert!(events.contains(&GenerateEvent::PublicCopied { files: 2 }));
        assert!(matches!(
            events.last(),
            Some(GenerateEvent::Finished {
                generated: 2,
                skipped: 0,
                failed: 0
            })
        ));
    }

    #[tokio::test]
    async fn document_preloads_used_client_modules() {
        let fixture = AppFixture::new();
        fixture.file("page.tsx", "export default function Home() {}");
        let tree = fixture.scan();

        let page = ServerModule::new(|_| Deferred::ready(Ok(View::client("components/counter.tsx").into())));
        generator(&fixture, registry_with(vec![("app/page.tsx", page)]), &tree)
            .generate(&tree)
            .await
            .unwrap();
        let html = read(&fixture, "html/index.html");
        assert!(html.contains(r#"rel="modulepreload" href="/static/components/counter.js""#));
    }

    #[tokio::test]
    async fn regenerate_replaces_one_entry() {
        let fixture = AppFixture::new();
        fixture.file("page.tsx", "export default function Home() {}");
        fixture.file("blog/[slug]/page.tsx", "export default function Post() {}");
        let tree = fixture.scan();

        let modules = registry_with(vec![
            ("app/page.tsx", text_page("home")),
            ("app/blog/[slug]/page.tsx", posts(&["a"])),
        ]);
        let generator = generator(&fixture, modules, &tree);
        generator.generate(&tree).await.unwrap();

        // a path the static params never produced
        let entry = generator.regenerate(&tree, "/blog/fresh").await.unwrap();
        assert_eq!(entry.html, "html/blog/fresh/index.html");
        let manifest = read_manifest(&fixture.root().join("out")).unwrap();
        assert_eq!(manifest.routes.len(), 3);

        assert!(matches!(
            generator.regenerate(&tree, "/nope/nope").await,
            Err(GenerateError::NoRoute(_))
        ));
    }
}
