//! The rendered UI tree.
//!
//! This is what the renderer produces, what the wire encoder serializes, and
//! what the decoder reconstructs. The variant set is closed: it mirrors the
//! chunk grammar one-to-one, so every consumer matches exhaustively.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Element properties. Ordered so encoding is byte-for-byte reproducible.
pub type Props = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    /// A component whose code runs on the receiving client.
    Client(ClientElement),
    Text(String),
    Number(serde_json::Number),
    /// A subtree whose rendering failed.
    Error(RenderFailure),
    /// A client element whose module was not available when decoding.
    Missing(ClientElement),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    /// A host element such as `div`.
    Html(String),
    /// A built-in element kind such as `fragment` or `suspense`.
    Symbol(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: Tag,
    pub key: Option<String>,
    pub props: Props,
    pub children: Vec<Node>,
}

/// Stable pointer to one export of a client module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientReference {
    /// Module id, derived from the project-relative path.
    pub id: String,
    /// Exported name, `default` for default exports.
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientElement {
    pub reference: ClientReference,
    pub key: Option<String>,
    pub props: Props,
    /// Server-rendered children, shipped as their own chunk.
    pub children: Vec<Node>,
}

/// Terminal marker for a subtree whose rendering failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderFailure {
    pub message: String,
    /// Short hash of the message so logs and clients can be correlated.
    pub digest: String,
}

impl RenderFailure {
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        let hash = Sha256::digest(message.as_bytes());
        let digest = format!("{hash:x}")[..10].to_string();
        Self { message, digest }
    }
}

impl Node {
    pub fn text(value: impl Into<String>) -> Self {
        Node::Text(value.into())
    }

    pub fn element(tag: &str, children: Vec<Node>) -> Self {
        Node::Element(Element {
            tag: Tag::Html(tag.to_string()),
            key: None,
            props: Props::new(),
            children,
        })
    }

    /// Children of container nodes; empty for leaves.
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Element(e) => &e.children,
            Node::Client(c) | Node::Missing(c) => &c.children,
            _ => &[],
        }
    }

    /// Concatenated text of the whole subtree.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.push_text(&mut out);
        out
    }

    fn push_text(&self, out: &mut String) {
        match self {
            Node::Text(t) => out.push_str(t),
            Node::Number(n) => out.push_str(&n.to_string()),
            _ => self.children().iter().for_each(|c| c.push_text(out)),
        }
    }

    /// First render failure in document order, for consumers that re-throw.
    pub fn first_error(&self) -> Option<&RenderFailure> {
        match self {
            Node::Error(f) => Some(f),
            _ => self.children().iter().find_map(Node::first_error),
        }
    }

    /// Ids of modules that could not be loaded, in document order.
    pub fn missing_modules(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_missing(&mut out);
        out
    }

    fn collect_missing<'a>(&'a self, out: &mut Vec<&'a str>) {
        if let Node::Missing(c) = self {
            out.push(&c.reference.id);
        }
        self.children().iter().for_each(|c| c.collect_missing(out));
    }
}
