//! Full HTML documents for generated routes.
//!
//! A document carries three things: server markup for first paint, the Flight
//! payload the client decodes to take over, and preloads for every client
//! module the page needs eagerly. Templates are pluggable through
//! [`DocumentTemplate`]; [`DefaultDocument`] uses maud like the rest of the
//! crate's HTML.

use crate::render::ClientModuleEntry;
use crate::tree::{Node, Tag};
use maud::{DOCTYPE, Escaper, Markup, PreEscaped, html};
use serde_json::Value;
use std::fmt::Write;

pub const FLIGHT_SCRIPT_ID: &str = "__flight";

/// Everything a template gets for one route.
#[derive(Debug, Clone, Copy)]
pub struct DocumentInput<'a> {
    pub route_path: &'a str,
    pub tree: &'a Node,
    pub flight: &'a str,
    /// Modules that must be available at first paint.
    pub eager_modules: &'a [ClientModuleEntry],
}

pub trait DocumentTemplate: Send + Sync {
    fn render(&self, input: &DocumentInput<'_>) -> String;
}

#[derive(Debug, Clone)]
pub struct DefaultDocument {
    pub lang: String,
    pub title: Option<String>,
}

impl Default for DefaultDocument {
    fn default() -> Self {
        Self {
            lang: "en".to_string(),
            title: None,
        }
    }
}

impl DocumentTemplate for DefaultDocument {
    fn render(&self, input: &DocumentInput<'_>) -> String {
        let markup: Markup = html! {
            (DOCTYPE)
            html lang=(self.lang) {
                head {
                    meta charset="UTF-8";
                    meta name="viewport" content="width=device-width, initial-scale=1.0";
                    @if let Some(title) = &self.title {
                        title { (title) }
                    }
                    @for module in input.eager_modules {
                        link rel="modulepreload" href=(module.asset);
                    }
                }
                body data-route=(input.route_path) {
                    div id="root" { (server_markup(input.tree)) }
                    script type="text/x-flight" id=(FLIGHT_SCRIPT_ID) {
                        (PreEscaped(script_safe(input.flight)))
                    }
                    @for module in input.eager_modules {
                        script type="module" src=(module.asset) {}
                    }
                }
            }
        };
        markup.into_string()
    }
}

/// The Flight payload embedded in a document by [`DefaultDocument`].
pub fn embedded_flight(document: &str) -> Option<&str> {
    let open = format!("<script type=\"text/x-flight\" id=\"{FLIGHT_SCRIPT_ID}\">");
    let start = document.find(&open)? + open.len();
    let len = document[start..].find("</script>")?;
    Some(&document[start..start + len])
}

/// `<` only occurs inside JSON strings, where `<` decodes to the same
/// text, so the payload cannot close its script element.
fn script_safe(flight: &str) -> String {
    flight.replace('<', "\\u003c")
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Static HTML for a rendered tree.
pub fn server_markup(tree: &Node) -> Markup {
    let mut out = String::new();
    write_node(tree, &mut out);
    PreEscaped(out)
}

fn write_node(node: &Node, out: &mut String) {
    match node {
        Node::Text(text) => escape_into(text, out),
        Node::Number(n) => out.push_str(&n.to_string()),
        Node::Element(element) => match &element.tag {
            Tag::Html(name) if is_tag_name(name) => {
                out.push('<');
                out.push_str(name);
                for (key, value) in &element.props {
                    write_attribute(key, value, out);
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&name.as_str()) {
                    return;
                }
                element.children.iter().for_each(|c| write_node(c, out));
                let _ = write!(out, "</{name}>");
            }
            _ => element.children.iter().for_each(|c| write_node(c, out)),
        },
        // client components mount over their server-rendered children
        Node::Client(client) | Node::Missing(client) => {
            out.push_str("<!--$L ");
            escape_into(&client.reference.id, out);
            out.push_str("-->");
            client.children.iter().for_each(|c| write_node(c, out));
            out.push_str("<!--/$L-->");
        }
        Node::Error(failure) => {
            out.push_str("<template data-flight-error=\"");
            escape_into(&failure.digest, out);
            out.push_str("\"></template>");
        }
    }
}

fn write_attribute(key: &str, value: &Value, out: &mut String) {
    let name = match key {
        "className" => "class",
        "htmlFor" => "for",
        "children" | "key" | "ref" => return,
        other if is_attribute_name(other) => other,
        _ => return,
    };
    match value {
        Value::Bool(true) => {
            out.push(' ');
            out.push_str(name);
        }
        Value::String(s) => {
            let _ = write!(out, " {name}=\"");
            escape_into(s, out);
            out.push('"');
        }
        Value::Number(n) => {
            let _ = write!(out, " {name}=\"{n}\"");
        }
        // false, null, and structured values have no attribute form
        _ => {}
    }
}

fn escape_into(text: &str, out: &mut String) {
    let _ = Escaper::new(out).write_str(text);
}

fn is_tag_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn is_attribute_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with("on")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flight::{decode, encode};
    use crate::render::ClientRegistry;
    use crate::tree::{ClientElement, ClientReference, Element, Props, RenderFailure};
    use serde_json::json;

    fn element(tag: &str, props: Props, children: Vec<Node>) -> Node {
        Node::Element(Element {
            tag: Tag::Html(tag.into()),
            key: None,
            props,
            children,
        })
    }

    #[test]
    fn markup_escapes_text_and_attributes() {
        let tree = element(
            "a",
            Props::from([
                ("className".to_string(), json!("x\"y")),
                ("href".to_string(), json!("/a?b=1&c=2")),
                ("hidden".to_string(), json!(false)),
                ("onClick".to_string(), json!("alert(1)")),
            ]),
            vec![Node::text("<b>")],
        );
        assert_eq!(
            server_markup(&tree).into_string(),
            "<a class=\"x&quot;y\" href=\"/a?b=1&amp;c=2\">&lt;b&gt;</a>"
        );
    }

    #[test]
    fn void_elements_and_symbols() {
        let tree = Node::Element(Element {
            tag: Tag::Symbol("fragment".into()),
            key: None,
            props: Props::new(),
            children: vec![
                element("br", Props::new(), vec![]),
                element("input", Props::from([("disabled".to_string(), json!(true))]), vec![]),
            ],
        });
        assert_eq!(server_markup(&tree).into_string(), "<br><input disabled>");
    }

    #[test]
    fn client_and_error_markers() {
        let tree = element(
            "main",
            Props::new(),
            vec![
                Node::Client(ClientElement {
                    reference: ClientReference {
                        id: "components/counter.tsx".into(),
                        name: "default".into(),
                    },
                    key: None,
                    props: Props::new(),
                    children: vec![Node::text("0")],
                }),
                Node::Error(RenderFailure::new("boom")),
            ],
        );
        let html = server_markup(&tree).into_string();
        assert!(html.contains("<!--$L components/counter.tsx-->0<!--/$L-->"));
        assert!(html.contains("data-flight-error"));
        assert!(!html.contains("boom"));
    }

    #[test]
    fn document_embeds_decodable_payload_and_preloads() {
        let tree = element("p", Props::new(), vec![Node::text("</script><script>alert(1)")]);
        let flight = encode(&tree);
        let mut clients = ClientRegistry::new("/static");
        clients.register("components/counter.tsx");
        let eager: Vec<_> = clients.entries().cloned().collect();

        let html = DefaultDocument::default().render(&DocumentInput {
            route_path: "/",
            tree: &tree,
            flight: &flight,
            eager_modules: &eager,
        });

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains(r#"<link rel="modulepreload" href="/static/components/counter.js">"#));
        assert_eq!(html.matches("</script>").count(), 2);

        let payload = embedded_flight(&html).unwrap();
        let decoded = decode(payload, &clients).unwrap();
        assert_eq!(decoded.root, tree);
    }
}
