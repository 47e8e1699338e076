//! Tree rendering.
//!
//! Evaluates a route chain (root layout, nested layouts, page) into a
//! [`Node`] tree. Each layout receives the rest of the chain as its
//! `children`; each module receives the route `params`.
//!
//! ## Module Contract
//!
//! Server-evaluated route files are implemented in Rust and registered in a
//! [`ModuleRegistry`] under their project-relative path (`app/blog/page.tsx`).
//! A module renders a [`View`], optionally asynchronously, and may provide a
//! static-parameter generator for dynamic routes. Client-deferred files are
//! never executed: they become [`ClientReference`]s.
//!
//! ## Materialization
//!
//! Every pending computation is awaited before the tree is returned. The wire
//! format cannot express a node whose value is still unknown, so there is no
//! partial output.
//!
//! ## Failures
//!
//! A failing layout or page aborts the render and the error is returned to the
//! caller. A failing nested component or pending subtree becomes a
//! [`Node::Error`] in place, which the encoder emits as an `E` chunk.

use crate::naming::Params;
use crate::scan::{FileRef, ModuleClassifier, RouteNode};
use crate::tree::{ClientElement, ClientReference, Element, Node, Props, RenderFailure, Tag};
use crate::view::{Deferred, Outlet, OutletTarget, RenderResult, View};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use log::{debug, warn};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("no server module registered for {0}")]
    ModuleNotFound(String),
    #[error("client module {0} is not registered")]
    UnknownClientModule(String),
    #[error("route has no page")]
    NoPage,
    #[error("{0}")]
    Failed(String),
}

impl RenderError {
    /// A failure raised by module code.
    pub fn failed(message: impl fmt::Display) -> Self {
        RenderError::Failed(message.to_string())
    }
}

/// Input to a layout or page.
#[derive(Debug, Default)]
pub struct RouteProps {
    pub params: Params,
    /// Inner layouts and the page. `None` for pages.
    pub children: Option<View>,
}

pub type StaticParamsResult = Result<Vec<Params>, RenderError>;

/// A server-evaluated route file.
pub trait RouteModule: Send + Sync {
    fn render(&self, props: RouteProps) -> Deferred<RenderResult>;

    /// Parameter combinations to pre-render, for dynamic routes.
    fn static_params(&self) -> Option<Deferred<StaticParamsResult>> {
        None
    }
}

type RenderFn = Arc<dyn Fn(RouteProps) -> Deferred<RenderResult> + Send + Sync>;
type StaticParamsFn = Arc<dyn Fn() -> Deferred<StaticParamsResult> + Send + Sync>;

/// A [`RouteModule`] built from closures.
#[derive(Clone)]
pub struct ServerModule {
    render: RenderFn,
    static_params: Option<StaticParamsFn>,
}

impl ServerModule {
    pub fn new(render: impl Fn(RouteProps) -> Deferred<RenderResult> + Send + Sync + 'static) -> Self {
        Self {
            render: Arc::new(render),
            static_params: None,
        }
    }

    pub fn with_static_params(
        mut self,
        generate: impl Fn() -> Deferred<StaticParamsResult> + Send + Sync + 'static,
    ) -> Self {
        self.static_params = Some(Arc::new(generate));
        self
    }
}

impl RouteModule for ServerModule {
    fn render(&self, props: RouteProps) -> Deferred<RenderResult> {
        (self.render)(props)
    }

    fn static_params(&self) -> Option<Deferred<StaticParamsResult>> {
        self.static_params.as_ref().map(|generate| generate())
    }
}

/// Server modules keyed by project-relative path.
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, Arc<dyn RouteModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, path: &str, module: impl RouteModule + 'static) -> &mut Self {
        self.modules.insert(module_id(path), Arc::new(module));
        self
    }

    pub fn get(&self, path: &str) -> Option<Arc<dyn RouteModule>> {
        self.modules.get(&module_id(path)).cloned()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// Deterministic module id for a project-relative path.
///
/// `./components\\counter.tsx` → `components/counter.tsx`.
pub fn module_id(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    let trimmed = normalized.trim_start_matches("./").trim_start_matches('/');
    trimmed.to_string()
}

/// A client module known to the build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientModuleEntry {
    pub id: String,
    /// URL of the module's script, preloaded by documents that use it.
    pub asset: String,
}

/// Client modules available to the renderer, keyed by module id.
#[derive(Debug, Clone, Default)]
pub struct ClientRegistry {
    asset_prefix: String,
    modules: BTreeMap<String, ClientModuleEntry>,
}

impl ClientRegistry {
    pub fn new(asset_prefix: &str) -> Self {
        Self {
            asset_prefix: asset_prefix.trim_end_matches('/').to_string(),
            modules: BTreeMap::new(),
        }
    }

    /// Every client-classified file in the route tree.
    pub fn from_tree(tree: &RouteNode, asset_prefix: &str) -> Self {
        let mut registry = Self::new(asset_prefix);
        for file in tree.files().into_iter().filter(|f| f.is_client()) {
            registry.register(&file.relative_path);
        }
        registry
    }

    /// Register a module by project-relative path and return its id.
    pub fn register(&mut self, path: &str) -> String {
        let id = module_id(path);
        let stem = id.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(&id);
        let asset = format!("{}/{stem}.js", self.asset_prefix);
        self.modules
            .entry(id.clone())
            .or_insert_with(|| ClientModuleEntry {
                id: id.clone(),
                asset,
            });
        id
    }

    /// Walk `dirs` under the project root and register every module the
    /// classifier marks as client. Missing directories are skipped.
    pub fn discover(
        &mut self,
        project_root: &Path,
        dirs: &[String],
        extensions: &[String],
        classifier: &dyn ModuleClassifier,
    ) -> std::io::Result<usize> {
        let before = self.modules.len();
        for dir in dirs {
            let root = project_root.join(dir);
            if !root.is_dir() {
                debug!("client dir {} does not exist, skipping", root.display());
                continue;
            }
            for entry in WalkDir::new(&root).sort_by_file_name() {
                let entry = entry?;
                let path = entry.path();
                let has_extension = path
                    .extension()
                    .is_some_and(|e| extensions.iter().any(|x| e.to_string_lossy() == x.as_str()));
                if !entry.file_type().is_file() || !has_extension {
                    continue;
                }
                let source = std::fs::read_to_string(path)?;
                if classifier.classify(&source) == crate::scan::ModuleKind::Client {
                    self.register(&crate::scan::relative_module_path(path, project_root));
                }
            }
        }
        Ok(self.modules.len() - before)
    }

    pub fn get(&self, id: &str) -> Option<&ClientModuleEntry> {
        self.modules.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.modules.contains_key(id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &ClientModuleEntry> {
        self.modules.values()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// A rendered route.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutput {
    pub tree: Node,
    /// Client module ids referenced by the tree, first-use order, no repeats.
    pub client_modules: Vec<String>,
}

/// Render the page at the end of `chain`, wrapped in every layout on the way.
pub async fn render(
    chain: &[&RouteNode],
    params: &Params,
    modules: &ModuleRegistry,
    clients: &ClientRegistry,
) -> Result<RenderOutput, RenderError> {
    let page = chain
        .last()
        .and_then(|node| node.page.as_ref())
        .ok_or(RenderError::NoPage)?;
    render_file(chain, page, params, modules, clients).await
}

/// Render an arbitrary leaf file (a page, or a `not-found` file) inside the
/// layouts of `chain`.
pub async fn render_file(
    chain: &[&RouteNode],
    leaf: &FileRef,
    params: &Params,
    modules: &ModuleRegistry,
    clients: &ClientRegistry,
) -> Result<RenderOutput, RenderError> {
    let mut view = outlet(leaf, params, None, modules)?;
    for node in chain.iter().rev() {
        if let Some(layout) = &node.layout {
            view = outlet(layout, params, Some(view), modules)?;
        }
    }

    let mut renderer = Renderer {
        clients,
        used: Vec::new(),
        seen: HashSet::new(),
    };
    let mut nodes = Vec::new();
    renderer.resolve(view, &mut nodes).await?;

    let tree = match <[Node; 1]>::try_from(nodes) {
        Ok([single]) => single,
        Err(nodes) => Node::Element(Element {
            tag: Tag::Symbol("fragment".to_string()),
            key: None,
            props: Props::new(),
            children: nodes,
        }),
    };
    Ok(RenderOutput {
        tree,
        client_modules: renderer.used,
    })
}

fn outlet(
    file: &FileRef,
    params: &Params,
    children: Option<View>,
    modules: &ModuleRegistry,
) -> Result<View, RenderError> {
    let target = if file.is_client() {
        OutletTarget::Client
    } else {
        let module = modules
            .get(&file.relative_path)
            .ok_or_else(|| RenderError::ModuleNotFound(file.relative_path.clone()))?;
        OutletTarget::Server(module)
    };
    Ok(View::Outlet(Outlet {
        file: file.relative_path.clone(),
        target,
        params: params.clone(),
        children: children.map(Box::new),
    }))
}

struct Renderer<'r> {
    clients: &'r ClientRegistry,
    used: Vec<String>,
    seen: HashSet<String>,
}

impl Renderer<'_> {
    fn resolve<'a>(
        &'a mut self,
        view: View,
        out: &'a mut Vec<Node>,
    ) -> BoxFuture<'a, Result<(), RenderError>> {
        async move {
            match view {
                View::Empty => {}
                View::Text(text) => out.push(Node::Text(text)),
                View::Number(n) => out.push(Node::Number(n)),
                View::Fragment(children) => {
                    for child in children {
                        self.resolve(child, out).await?;
                    }
                }
                View::Element(e) => {
                    let children = self.resolve_all(e.children).await?;
                    out.push(Node::Element(Element {
                        tag: e.tag,
                        key: e.key,
                        props: e.props,
                        children,
                    }));
                }
                View::Client(c) => {
                    let reference = self.client_reference(&c.module_path, &c.export)?;
                    let children = self.resolve_all(c.children).await?;
                    out.push(Node::Client(ClientElement {
                        reference,
                        key: c.key,
                        props: c.props,
                        children,
                    }));
                }
                View::Component(c) => {
                    let result = (c.render)(c.props, c.children).resolve().await;
                    self.capture(&c.name, result, out).await?;
                }
                View::Pending(future) => {
                    let result = future.await;
                    self.capture("async subtree", result, out).await?;
                }
                View::Outlet(o) => self.outlet(o, out).await?,
            }
            Ok(())
        }
        .boxed()
    }

    async fn resolve_all(&mut self, views: Vec<View>) -> Result<Vec<Node>, RenderError> {
        let mut nodes = Vec::new();
        for view in views {
            self.resolve(view, &mut nodes).await?;
        }
        Ok(nodes)
    }

    /// Nested failures become error nodes; failures from route outlets
    /// further down still propagate.
    async fn capture(
        &mut self,
        label: &str,
        result: RenderResult,
        out: &mut Vec<Node>,
    ) -> Result<(), RenderError> {
        match result {
            Ok(view) => self.resolve(view, out).await,
            Err(e) => {
                warn!("{label} failed to render: {e}");
                out.push(Node::Error(RenderFailure::new(e.to_string())));
                Ok(())
            }
        }
    }

    async fn outlet(&mut self, outlet: Outlet, out: &mut Vec<Node>) -> Result<(), RenderError> {
        let Outlet {
            file,
            target,
            params,
            children,
        } = outlet;
        match target {
            OutletTarget::Server(module) => {
                debug!("rendering {file}");
                let props = RouteProps {
                    params,
                    children: children.map(|c| *c),
                };
                let view = module.render(props).resolve().await?;
                self.resolve(view, out).await
            }
            OutletTarget::Client => {
                let reference = self.client_reference(&file, "default")?;
                let children = match children {
                    Some(inner) => self.resolve_all(vec![*inner]).await?,
                    None => Vec::new(),
                };
                let mut props = Props::new();
                props.insert(
                    "params".to_string(),
                    serde_json::to_value(&params).map_err(RenderError::failed)?,
                );
                out.push(Node::Client(ClientElement {
                    reference,
                    key: None,
                    props,
                    children,
                }));
                Ok(())
            }
        }
    }

    fn client_reference(&mut self, path: &str, export: &str) -> Result<ClientReference, RenderError> {
        let id = module_id(path);
        if !self.clients.contains(&id) {
            return Err(RenderError::UnknownClientModule(id));
        }
        if self.seen.insert(id.clone()) {
            self.used.push(id.clone());
        }
        Ok(ClientReference {
            id,
            name: export.to_string(),
        })
    }
}
