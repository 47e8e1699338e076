//! Authoring-side tree handed to the renderer.
//!
//! Route modules return a [`View`]: host elements, text, client components
//! (referenced by module path, never executed), nested server components, and
//! pending subtrees that the renderer awaits before anything is encoded.
//!
//! ```ignore
//! View::element("article")
//!     .prop("className", "post")
//!     .child(View::text("Hello"))
//!     .child(View::client("components/like-button.tsx").prop("postId", 7))
//! ```

use crate::render::{RenderError, RouteModule};
use crate::naming::Params;
use crate::tree::{Props, Tag};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// A value that is either available now or pending on a future.
///
/// Render functions and static-param generators return this, so synchronous
/// modules never allocate a future.
pub enum Deferred<T> {
    Ready(T),
    Pending(BoxFuture<'static, T>),
}

impl<T: Send + 'static> Deferred<T> {
    pub fn ready(value: T) -> Self {
        Deferred::Ready(value)
    }

    pub fn pending(future: impl Future<Output = T> + Send + 'static) -> Self {
        Deferred::Pending(future.boxed())
    }

    /// Await to completion.
    pub async fn resolve(self) -> T {
        match self {
            Deferred::Ready(value) => value,
            Deferred::Pending(future) => future.await,
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deferred::Ready(_) => f.write_str("Deferred::Ready"),
            Deferred::Pending(_) => f.write_str("Deferred::Pending"),
        }
    }
}

pub type RenderResult = Result<View, RenderError>;

/// Nested server component: props and children in, view out.
pub type ComponentFn = Arc<dyn Fn(Props, Vec<View>) -> Deferred<RenderResult> + Send + Sync>;

#[derive(Default)]
pub enum View {
    #[default]
    Empty,
    Text(String),
    Number(serde_json::Number),
    Element(ElementView),
    Client(ClientView),
    Component(ComponentView),
    /// A subtree that is not known yet. A failure becomes an error node.
    Pending(BoxFuture<'static, RenderResult>),
    Fragment(Vec<View>),
    /// The next layout or page in the route chain. Only the renderer creates these.
    Outlet(Outlet),
}

impl View {
    pub fn text(value: impl Into<String>) -> Self {
        View::Text(value.into())
    }

    pub fn number(value: impl Into<serde_json::Number>) -> Self {
        View::Number(value.into())
    }

    pub fn element(tag: &str) -> ElementView {
        ElementView::new(Tag::Html(tag.to_string()))
    }

    /// A built-in element kind, e.g. `fragment` or `suspense`.
    pub fn symbol(name: &str) -> ElementView {
        ElementView::new(Tag::Symbol(name.to_string()))
    }

    /// The default export of a client module, by project-relative path.
    pub fn client(module_path: &str) -> ClientView {
        ClientView {
            module_path: module_path.to_string(),
            export: "default".to_string(),
            key: None,
            props: Props::new(),
            children: Vec::new(),
        }
    }

    pub fn component(
        name: &str,
        render: impl Fn(Props, Vec<View>) -> Deferred<RenderResult> + Send + Sync + 'static,
    ) -> ComponentView {
        ComponentView {
            name: name.to_string(),
            render: Arc::new(render),
            props: Props::new(),
            children: Vec::new(),
        }
    }

    /// An async subtree.
    pub fn pending(future: impl Future<Output = RenderResult> + Send + 'static) -> Self {
        View::Pending(future.boxed())
    }

    pub fn fragment(children: impl IntoIterator<Item = View>) -> Self {
        View::Fragment(children.into_iter().collect())
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            View::Empty => f.write_str("Empty"),
            View::Text(t) => write!(f, "Text({t:?})"),
            View::Number(n) => write!(f, "Number({n})"),
            View::Element(e) => write!(f, "Element({:?}, {} children)", e.tag, e.children.len()),
            View::Client(c) => write!(f, "Client({}#{})", c.module_path, c.export),
            View::Component(c) => write!(f, "Component({})", c.name),
            View::Pending(_) => f.write_str("Pending"),
            View::Fragment(children) => write!(f, "Fragment({} children)", children.len()),
            View::Outlet(o) => write!(f, "Outlet({})", o.file),
        }
    }
}

impl From<&str> for View {
    fn from(value: &str) -> Self {
        View::text(value)
    }
}

impl From<String> for View {
    fn from(value: String) -> Self {
        View::Text(value)
    }
}

impl From<i64> for View {
    fn from(value: i64) -> Self {
        View::Number(value.into())
    }
}

impl From<Vec<View>> for View {
    fn from(children: Vec<View>) -> Self {
        View::Fragment(children)
    }
}

impl From<Option<View>> for View {
    fn from(value: Option<View>) -> Self {
        value.unwrap_or_default()
    }
}

pub struct ElementView {
    pub tag: Tag,
    pub key: Option<String>,
    pub props: Props,
    pub children: Vec<View>,
}

impl ElementView {
    fn new(tag: Tag) -> Self {
        Self {
            tag,
            key: None,
            props: Props::new(),
            children: Vec::new(),
        }
    }

    pub fn prop(mut self, name: &str, value: impl Into<serde_json::Value>) -> Self {
        self.props.insert(name.to_string(), value.into());
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn child(mut self, child: impl Into<View>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = View>) -> Self {
        self.children.extend(children);
        self
    }
}

impl From<ElementView> for View {
    fn from(value: ElementView) -> Self {
        View::Element(value)
    }
}

pub struct ClientView {
    pub module_path: String,
    pub export: String,
    pub key: Option<String>,
    pub props: Props,
    pub children: Vec<View>,
}

impl ClientView {
    /// Use a named export instead of `default`.
    pub fn export(mut self, name: &str) -> Self {
        self.export = name.to_string();
        self
    }

    pub fn prop(mut self, name: &str, value: impl Into<serde_json::Value>) -> Self {
        self.props.insert(name.to_string(), value.into());
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn child(mut self, child: impl Into<View>) -> Self {
        self.children.push(child.into());
        self
    }
}

impl From<ClientView> for View {
    fn from(value: ClientView) -> Self {
        View::Client(value)
    }
}

pub struct ComponentView {
    pub name: String,
    pub render: ComponentFn,
    pub props: Props,
    pub children: Vec<View>,
}

impl ComponentView {
    pub fn prop(mut self, name: &str, value: impl Into<serde_json::Value>) -> Self {
        self.props.insert(name.to_string(), value.into());
        self
    }

    pub fn child(mut self, child: impl Into<View>) -> Self {
        self.children.push(child.into());
        self
    }
}

impl From<ComponentView> for View {
    fn from(value: ComponentView) -> Self {
        View::Component(value)
    }
}

/// One layout or page invocation in a route chain.
pub struct Outlet {
    pub(crate) file: String,
    pub(crate) target: OutletTarget,
    pub(crate) params: Params,
    pub(crate) children: Option<Box<View>>,
}

pub(crate) enum OutletTarget {
    Server(Arc<dyn RouteModule>),
    Client,
}

impl From<Outlet> for View {
    fn from(value: Outlet) -> Self {
        View::Outlet(value)
    }
}
