//! CLI output formatting.
//!
//! Every command has a `format_*` function returning display lines and, where
//! the binary needs one, a `print_*` wrapper that writes them to stdout.
//! Format functions are pure so the layout can be tested without capturing
//! stdout.
//!
//! # Scan
//!
//! ```text
//! /
//!     layout: app/layout.tsx
//!     page: app/page.tsx (revalidate 60s)
//!     (shop) group
//!         /cart
//!             page: app/(shop)/cart/page.tsx
//!     /blog/[slug] param slug
//!         page: app/blog/[slug]/page.tsx (client)
//! ```
//!
//! # Status
//!
//! ```text
//! /            html/index.html  fresh (12s old)
//! /blog/hello  html/blog/hello/index.html  stale (90s old), revalidate 60s
//! ```

use crate::generate::GenerateEvent;
use crate::revalidate::RevalidationStore;
use crate::scan::{FileRef, RouteConflict, RouteNode};
use crate::tree::{ClientElement, Element, Node, Tag};
use crate::types::{ManifestEntry, PrerenderManifest};

// ============================================================================
// Shared helpers
// ============================================================================

/// 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn node_header(node: &RouteNode) -> String {
    if node.segment.is_empty() {
        return "/".to_string();
    }
    if node.is_group() {
        return format!("{} group", node.segment);
    }
    match (&node.param, node.catch_all) {
        (Some(param), true) => format!("{} catch-all {param}", node.path),
        (Some(param), false) => format!("{} param {param}", node.path),
        (None, _) => node.path.clone(),
    }
}

fn file_line(label: &str, file: &FileRef) -> String {
    let mut details = Vec::new();
    if file.is_client() {
        details.push("client".to_string());
    }
    if let Some(config) = &file.config {
        if let Some(revalidate) = config.revalidate {
            details.push(format!("revalidate {revalidate}"));
        }
        if let Some(dynamic) = config.dynamic {
            details.push(dynamic.to_string());
        }
    }
    if details.is_empty() {
        format!("{label}: {}", file.relative_path)
    } else {
        format!("{label}: {} ({})", file.relative_path, details.join(", "))
    }
}

// ============================================================================
// scan / check
// ============================================================================

/// The route tree, one node per header line with its files indented below.
pub fn format_scan_output(tree: &RouteNode) -> Vec<String> {
    let mut lines = Vec::new();
    walk_route_tree(tree, 0, &mut lines);
    lines
}

fn walk_route_tree(node: &RouteNode, depth: usize, lines: &mut Vec<String>) {
    lines.push(format!("{}{}", indent(depth), node_header(node)));
    let files = [
        ("layout", &node.layout),
        ("page", &node.page),
        ("loading", &node.loading),
        ("error", &node.error),
        ("not-found", &node.not_found),
        ("global-error", &node.global_error),
    ];
    for (label, file) in files {
        if let Some(file) = file {
            lines.push(format!("{}{}", indent(depth + 1), file_line(label, file)));
        }
    }
    for child in &node.children {
        walk_route_tree(child, depth + 1, lines);
    }
}

pub fn print_scan_output(tree: &RouteNode) {
    for line in format_scan_output(tree) {
        println!("{}", line);
    }
}

pub fn format_conflicts(conflicts: &[RouteConflict]) -> Vec<String> {
    let mut lines = Vec::new();
    for conflict in conflicts {
        lines.push(format!("Conflict at {}", conflict.pattern));
        for file in &conflict.files {
            lines.push(format!("    {file}"));
        }
    }
    lines
}

pub fn print_conflicts(conflicts: &[RouteConflict]) {
    for line in format_conflicts(conflicts) {
        println!("{}", line);
    }
}

// ============================================================================
// decode
// ============================================================================

/// Outline of a decoded tree.
///
/// ```text
/// <main>
///     <p>
///         "hello"
///     <$L components/counter.tsx#default> {"start":1}
///     ! render error 1a2b3c4d: boom
///     ? missing components/gone.tsx#default
/// ```
pub fn format_tree(tree: &Node) -> Vec<String> {
    let mut lines = Vec::new();
    walk_tree(tree, 0, &mut lines);
    lines
}

fn walk_tree(node: &Node, depth: usize, lines: &mut Vec<String>) {
    let pad = indent(depth);
    match node {
        Node::Element(Element {
            tag, key, props, ..
        }) => {
            let name = match tag {
                Tag::Html(name) => name.clone(),
                Tag::Symbol(name) => format!("${name}"),
            };
            lines.push(format!("{pad}<{name}{}>{}", key_suffix(key), props_suffix(props)));
        }
        Node::Client(ClientElement {
            reference,
            key,
            props,
            ..
        }) => lines.push(format!(
            "{pad}<$L {}#{}{}>{}",
            reference.id,
            reference.name,
            key_suffix(key),
            props_suffix(props)
        )),
        Node::Text(text) => lines.push(format!("{pad}{text:?}")),
        Node::Number(n) => lines.push(format!("{pad}{n}")),
        Node::Error(failure) => lines.push(format!(
            "{pad}! render error {}: {}",
            failure.digest, failure.message
        )),
        Node::Missing(element) => lines.push(format!(
            "{pad}? missing {}#{}",
            element.reference.id, element.reference.name
        )),
    }
    for child in node.children() {
        walk_tree(child, depth + 1, lines);
    }
}

fn key_suffix(key: &Option<String>) -> String {
    key.as_ref().map(|k| format!(" key={k:?}")).unwrap_or_default()
}

fn props_suffix(props: &crate::tree::Props) -> String {
    if props.is_empty() {
        String::new()
    } else {
        serde_json::to_string(props)
            .map(|json| format!(" {json}"))
            .unwrap_or_default()
    }
}

pub fn print_tree(tree: &Node) {
    for line in format_tree(tree) {
        println!("{}", line);
    }
}

// ============================================================================
// generate
// ============================================================================

pub fn format_generate_event(event: &GenerateEvent) -> Vec<String> {
    match event {
        GenerateEvent::Started { pages } => vec![format!("Generating {pages} pages")],
        GenerateEvent::Generated(entry) => {
            let mut lines = vec![format!("{} → {}", entry.route_path, entry.html)];
            if entry.route_path != entry.pattern {
                lines.push(format!("    Pattern: {}", entry.pattern));
            }
            if let Some(revalidate) = entry.revalidate {
                lines.push(format!("    Revalidate: {revalidate}"));
            }
            lines
        }
        GenerateEvent::Skipped { route, reason } => vec![format!("{route} skipped: {reason}")],
        GenerateEvent::Failed { route, error } => vec![format!("{route} FAILED: {error}")],
        GenerateEvent::PublicCopied { files } => vec![format!("Copied {files} public files")],
        GenerateEvent::Finished {
            generated,
            skipped,
            failed,
        } => vec![format!(
            "Generated {generated}, skipped {skipped}, failed {failed}"
        )],
    }
}

// ============================================================================
// status
// ============================================================================

fn status_line(entry: &ManifestEntry, store: &RevalidationStore, now: u64, width: usize) -> String {
    let freshness = store.freshness(&entry.route_path, now);
    let mut line = format!("{:<width$}  {}  {freshness}", entry.route_path, entry.html);
    if let Some(revalidate) = entry.revalidate {
        line.push_str(&format!(", revalidate {revalidate}"));
    }
    line
}

/// Every generated route with its artifact and freshness at `now`.
pub fn format_status(manifest: &PrerenderManifest, store: &RevalidationStore, now: u64) -> Vec<String> {
    if manifest.routes.is_empty() {
        return vec!["No generated routes".to_string()];
    }
    let width = manifest
        .routes
        .keys()
        .map(|path| path.chars().count())
        .max()
        .unwrap_or(0);
    let mut lines: Vec<String> = manifest
        .routes
        .values()
        .map(|entry| status_line(entry, store, now, width))
        .collect();
    let stale = manifest
        .routes
        .keys()
        .filter(|path| store.freshness(path, now).is_stale())
        .count();
    if let Some(not_found) = &manifest.not_found {
        lines.push(format!("Not found page: {}", not_found.html));
    }
    lines.push(format!("{} routes, {stale} stale", manifest.routes.len()));
    lines
}

pub fn print_status(manifest: &PrerenderManifest, store: &RevalidationStore, now: u64) {
    for line in format_status(manifest, store, now) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
