//! Tree → chunk stream.
//!
//! Plain element and text subtrees collapse into the `J` fragment that
//! contains them. Only client boundaries, symbols and failures get chunks of
//! their own:
//!
//! - a client element's module becomes one `M` chunk per distinct reference,
//!   and its children go into a separate `J` chunk
//! - each distinct symbol becomes one `S` chunk
//! - each failure becomes an `E` chunk, referenced from where the subtree was
//!
//! Ids are assigned in the order lines are written, starting at 1; the root
//! takes id 0 and comes last. Props are ordered maps and traversal is
//! depth-first, so the same tree always produces the same bytes.

use super::chunk::{Chunk, ChunkKind};
use crate::tree::{ClientElement, ClientReference, Element, Node, Props, RenderFailure, Tag};
use serde_json::{Map, Value, json};
use std::collections::HashMap;

pub fn encode(tree: &Node) -> String {
    let mut encoder = Encoder::default();
    let root = match tree {
        Node::Error(failure) => Chunk {
            id: 0,
            kind: ChunkKind::Error,
            payload: failure_payload(failure),
        },
        node => Chunk {
            id: 0,
            kind: ChunkKind::Json,
            payload: encoder.node(node),
        },
    };
    encoder.write(root);
    encoder.out
}

#[derive(Default)]
struct Encoder {
    out: String,
    last_id: usize,
    symbols: HashMap<String, usize>,
    modules: HashMap<ClientReference, usize>,
}

impl Encoder {
    fn write(&mut self, chunk: Chunk) {
        self.out.push_str(&chunk.to_string());
        self.out.push('\n');
    }

    fn push(&mut self, kind: ChunkKind, payload: Value) -> usize {
        self.last_id += 1;
        let id = self.last_id;
        self.write(Chunk { id, kind, payload });
        id
    }

    fn node(&mut self, node: &Node) -> Value {
        match node {
            Node::Text(text) => Value::String(escape(text)),
            Node::Number(n) => Value::Number(n.clone()),
            Node::Element(element) => self.element(element),
            Node::Client(client) | Node::Missing(client) => self.client(client),
            Node::Error(failure) => {
                let id = self.push(ChunkKind::Error, failure_payload(failure));
                Value::String(format!("${id}"))
            }
        }
    }

    fn element(&mut self, element: &Element) -> Value {
        let tag = match &element.tag {
            Tag::Html(name) => Value::String(escape(name)),
            Tag::Symbol(name) => {
                let id = match self.symbols.get(name) {
                    Some(id) => *id,
                    None => {
                        let id = self.push(ChunkKind::Symbol, Value::String(name.clone()));
                        self.symbols.insert(name.clone(), id);
                        id
                    }
                };
                Value::String(format!("$S{id}"))
            }
        };
        let children: Vec<Value> = element.children.iter().map(|c| self.node(c)).collect();
        json!(["$", tag, element.key, escape_props(&element.props), children])
    }

    fn client(&mut self, client: &ClientElement) -> Value {
        let module = match self.modules.get(&client.reference) {
            Some(id) => *id,
            None => {
                let payload = json!({"id": client.reference.id, "name": client.reference.name});
                let id = self.push(ChunkKind::Module, payload);
                self.modules.insert(client.reference.clone(), id);
                id
            }
        };
        let children = if client.children.is_empty() {
            Value::Array(Vec::new())
        } else {
            let nodes = client.children.iter().map(|c| self.node(c)).collect();
            let id = self.push(ChunkKind::Json, Value::Array(nodes));
            Value::String(format!("${id}"))
        };
        json!([
            "$",
            format!("$L{module}"),
            client.key,
            escape_props(&client.props),
            children
        ])
    }
}

fn failure_payload(failure: &RenderFailure) -> Value {
    json!({"message": failure.message, "digest": failure.digest})
}

fn escape(text: &str) -> String {
    if text.starts_with('$') {
        format!("${text}")
    } else {
        text.to_string()
    }
}

fn escape_props(props: &Props) -> Value {
    Value::Object(
        props
            .iter()
            .map(|(k, v)| (k.clone(), escape_value(v)))
            .collect::<Map<String, Value>>(),
    )
}

fn escape_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(escape(s)),
        Value::Array(items) => Value::Array(items.iter().map(escape_value).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), escape_value(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}
