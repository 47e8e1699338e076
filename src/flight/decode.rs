//! Chunk stream → tree.
//!
//! Client modules are resolved through a [`ModuleLoader`]. At build time the
//! [`ClientRegistry`] resolves them directly; at runtime a [`LazyLoader`]
//! hands out handles whose script is fetched on first use. Either way a
//! module id that cannot be resolved decodes to [`Node::Missing`] instead of
//! failing the whole stream.

use super::chunk::{Chunk, ChunkKind, DecodeError, parse_stream, reference_id};
use crate::render::{ClientModuleEntry, ClientRegistry};
use crate::tree::{ClientElement, ClientReference, Element, Node, Props, RenderFailure, Tag};
use futures_util::future::BoxFuture;
use log::warn;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;

/// Resolves client references to something the consumer can mount.
pub trait ModuleLoader {
    type Module: Clone;

    fn load(&self, reference: &ClientReference) -> Option<Self::Module>;
}

impl ModuleLoader for ClientRegistry {
    type Module = ClientModuleEntry;

    fn load(&self, reference: &ClientReference) -> Option<ClientModuleEntry> {
        self.get(&reference.id).cloned()
    }
}

/// A decoded tree plus every module it resolved.
#[derive(Debug, Clone)]
pub struct Decoded<M> {
    pub root: Node,
    pub modules: BTreeMap<ClientReference, M>,
}

pub fn decode<L: ModuleLoader>(stream: &str, loader: &L) -> Result<Decoded<L::Module>, DecodeError> {
    let chunks = parse_stream(stream)?;
    let mut table = HashMap::with_capacity(chunks.len());
    for (position, chunk) in chunks.iter().enumerate() {
        if table.insert(chunk.id, (position, chunk)).is_some() {
            return Err(DecodeError::DuplicateChunk(chunk.id));
        }
    }
    let (_, root) = table.get(&0).copied().ok_or(DecodeError::MissingRoot)?;

    let mut session = Session {
        table,
        loader,
        loaded: HashMap::new(),
        modules: BTreeMap::new(),
        expanded: HashSet::new(),
    };
    let root = match root.kind {
        ChunkKind::Error => Node::Error(failure(root)?),
        ChunkKind::Json => session.node(&root.payload, root)?,
        _ => {
            return Err(DecodeError::UnexpectedKind {
                id: 0,
                expected: ChunkKind::Json,
            });
        }
    };
    Ok(Decoded {
        root,
        modules: session.modules,
    })
}

struct Session<'a, L: ModuleLoader> {
    table: HashMap<usize, (usize, &'a Chunk)>,
    loader: &'a L,
    /// Loader results per `M` chunk id for this decode.
    loaded: HashMap<usize, Option<L::Module>>,
    modules: BTreeMap<ClientReference, L::Module>,
    /// `J` and `E` chunks already spliced into the tree.
    expanded: HashSet<usize>,
}

impl<'a, L: ModuleLoader> Session<'a, L> {
    /// Look up `id` as referenced from `from`, which must come after it.
    fn chunk(&self, id: usize, from: &Chunk) -> Result<&'a Chunk, DecodeError> {
        let (position, chunk) = *self.table.get(&id).ok_or(DecodeError::UnknownChunk(id))?;
        let (from_position, _) = self.table[&from.id];
        if position >= from_position {
            return Err(DecodeError::ForwardReference {
                from: from.id,
                to: id,
            });
        }
        Ok(chunk)
    }

    /// The encoder writes every `J` and `E` chunk for exactly one parent, so
    /// a second reference is malformed and would multiply the tree.
    fn claim(&mut self, target: &Chunk) -> Result<(), DecodeError> {
        let shared = matches!(target.kind, ChunkKind::Module | ChunkKind::Symbol);
        if !shared && !self.expanded.insert(target.id) {
            return Err(invalid(target, "chunk referenced more than once"));
        }
        Ok(())
    }

    fn node(&mut self, value: &Value, within: &'a Chunk) -> Result<Node, DecodeError> {
        match value {
            Value::String(s) => {
                if let Some(id) = reference_id(s, "") {
                    let target = self.chunk(id, within)?;
                    self.claim(target)?;
                    return match target.kind {
                        ChunkKind::Error => Ok(Node::Error(failure(target)?)),
                        ChunkKind::Json => self.node(&target.payload, target),
                        _ => Err(DecodeError::UnexpectedKind {
                            id,
                            expected: ChunkKind::Json,
                        }),
                    };
                }
                Ok(Node::Text(unescape(s, within)?))
            }
            Value::Number(n) => Ok(Node::Number(n.clone())),
            Value::Array(items) if items.first().and_then(Value::as_str) == Some("$") => {
                self.element(items, within)
            }
            other => Err(invalid(within, format!("unexpected node {other}"))),
        }
    }

    fn element(&mut self, items: &[Value], within: &'a Chunk) -> Result<Node, DecodeError> {
        let [_, tag, key, props, children] = items else {
            return Err(invalid(within, "element must have five fields"));
        };
        let tag = tag
            .as_str()
            .ok_or_else(|| invalid(within, "element tag must be a string"))?;
        let key = match key {
            Value::Null => None,
            Value::String(k) => Some(k.clone()),
            _ => return Err(invalid(within, "element key must be a string or null")),
        };
        let props = match props {
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| Ok((k.clone(), unescape_value(v, within)?)))
                .collect::<Result<Props, DecodeError>>()?,
            _ => return Err(invalid(within, "element props must be an object")),
        };
        let children = self.children(children, within)?;

        if let Some(id) = reference_id(tag, "L") {
            let reference = self.module(id, within)?;
            let element = ClientElement {
                reference: reference.clone(),
                key,
                props,
                children,
            };
            return Ok(if self.resolve_module(id, &reference) {
                Node::Client(element)
            } else {
                Node::Missing(element)
            });
        }
        let tag = match reference_id(tag, "S") {
            Some(id) => Tag::Symbol(self.symbol(id, within)?),
            None => Tag::Html(unescape(tag, within)?),
        };
        Ok(Node::Element(Element {
            tag,
            key,
            props,
            children,
        }))
    }

    fn children(&mut self, value: &Value, within: &'a Chunk) -> Result<Vec<Node>, DecodeError> {
        let (items, owner) = match value {
            Value::Array(items) => (items, within),
            Value::String(s) => {
                let id = reference_id(s, "")
                    .ok_or_else(|| invalid(within, format!("bad children reference {s}")))?;
                let target = self.chunk(id, within)?;
                self.claim(target)?;
                match (&target.kind, &target.payload) {
                    (ChunkKind::Json, Value::Array(items)) => (items, target),
                    _ => {
                        return Err(DecodeError::UnexpectedKind {
                            id,
                            expected: ChunkKind::Json,
                        });
                    }
                }
            }
            _ => return Err(invalid(within, "children must be an array or a reference")),
        };
        items.iter().map(|item| self.node(item, owner)).collect()
    }

    fn module(&self, id: usize, within: &'a Chunk) -> Result<ClientReference, DecodeError> {
        let target = self.chunk(id, within)?;
        if target.kind != ChunkKind::Module {
            return Err(DecodeError::UnexpectedKind {
                id,
                expected: ChunkKind::Module,
            });
        }
        serde_json::from_value(target.payload.clone())
            .map_err(|e| invalid(target, e.to_string()))
    }

    /// Load once per chunk id; `false` if the loader does not know the module.
    fn resolve_module(&mut self, id: usize, reference: &ClientReference) -> bool {
        let loader = self.loader;
        let module = self
            .loaded
            .entry(id)
            .or_insert_with(|| loader.load(reference))
            .clone();
        match module {
            Some(module) => {
                self.modules.entry(reference.clone()).or_insert(module);
                true
            }
            None => {
                warn!("client module {} is not available", reference.id);
                false
            }
        }
    }

    fn symbol(&self, id: usize, within: &'a Chunk) -> Result<String, DecodeError> {
        let target = self.chunk(id, within)?;
        match (&target.kind, &target.payload) {
            (ChunkKind::Symbol, Value::String(name)) => Ok(name.clone()),
            (ChunkKind::Symbol, _) => Err(invalid(target, "symbol must be a string")),
            _ => Err(DecodeError::UnexpectedKind {
                id,
                expected: ChunkKind::Symbol,
            }),
        }
    }
}

fn failure(chunk: &Chunk) -> Result<RenderFailure, DecodeError> {
    serde_json::from_value(chunk.payload.clone()).map_err(|e| invalid(chunk, e.to_string()))
}

fn invalid(chunk: &Chunk, reason: impl Into<String>) -> DecodeError {
    DecodeError::InvalidPayload {
        id: chunk.id,
        reason: reason.into(),
    }
}

fn unescape(s: &str, within: &Chunk) -> Result<String, DecodeError> {
    match s.strip_prefix('$') {
        None => Ok(s.to_string()),
        Some(rest) if rest.starts_with('$') => Ok(rest.to_string()),
        Some(_) => Err(invalid(within, format!("unexpected token {s}"))),
    }
}

fn unescape_value(value: &Value, within: &Chunk) -> Result<Value, DecodeError> {
    Ok(match value {
        Value::String(s) => Value::String(unescape(s, within)?),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| unescape_value(v, within))
                .collect::<Result<_, _>>()?,
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| Ok((k.clone(), unescape_value(v, within)?)))
                .collect::<Result<_, DecodeError>>()?,
        ),
        other => other.clone(),
    })
}

type ModuleResult = Result<String, String>;
type FetchModule = Arc<dyn Fn(&str) -> BoxFuture<'static, ModuleResult> + Send + Sync>;

/// Runtime loader: every known module resolves to a [`LazyModule`] whose
/// script is fetched the first time anything asks for it, and only once per
/// module id for the lifetime of the loader.
pub struct LazyLoader {
    assets: BTreeMap<String, String>,
    fetch: FetchModule,
    cells: Mutex<HashMap<String, Arc<OnceCell<ModuleResult>>>>,
}

impl LazyLoader {
    /// `fetch` receives the module's asset URL.
    pub fn new(
        assets: impl IntoIterator<Item = (String, String)>,
        fetch: impl Fn(&str) -> BoxFuture<'static, ModuleResult> + Send + Sync + 'static,
    ) -> Self {
        Self {
            assets: assets.into_iter().collect(),
            fetch: Arc::new(fetch),
            cells: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_registry(
        registry: &ClientRegistry,
        fetch: impl Fn(&str) -> BoxFuture<'static, ModuleResult> + Send + Sync + 'static,
    ) -> Self {
        Self::new(
            registry.entries().map(|e| (e.id.clone(), e.asset.clone())),
            fetch,
        )
    }
}

impl ModuleLoader for LazyLoader {
    type Module = LazyModule;

    fn load(&self, reference: &ClientReference) -> Option<LazyModule> {
        let asset = self.assets.get(&reference.id)?;
        let cell = self
            .cells
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(reference.id.clone())
            .or_default()
            .clone();
        Some(LazyModule {
            reference: reference.clone(),
            asset: asset.clone(),
            cell,
            fetch: self.fetch.clone(),
        })
    }
}

#[derive(Clone)]
pub struct LazyModule {
    pub reference: ClientReference,
    pub asset: String,
    cell: Arc<OnceCell<ModuleResult>>,
    fetch: FetchModule,
}

impl LazyModule {
    /// The module's script, fetching it on first call.
    pub async fn source(&self) -> Result<&str, String> {
        let result = self.cell.get_or_init(|| (self.fetch)(&self.asset)).await;
        result.as_deref().map_err(Clone::clone)
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }
}

impl fmt::Debug for LazyModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyModule")
            .field("reference", &self.reference)
            .field("asset", &self.asset)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
