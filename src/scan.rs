//! Route tree scanning.
//!
//! Stage 1 of the build pipeline. Walks the app directory and turns the
//! nested directory convention into a [`RouteNode`] tree.
//!
//! ## Directory Structure
//!
//! ```text
//! app/
//! ├── layout.tsx                  # Root layout (wraps everything)
//! ├── page.tsx                    # /
//! ├── not-found.tsx               # 404 document
//! ├── (marketing)/                # Route group: nests layouts, elided from URLs
//! │   ├── layout.tsx
//! │   └── pricing/
//! │       └── page.tsx            # /pricing
//! ├── blog/
//! │   ├── page.tsx                # /blog
//! │   └── [slug]/
//! │       ├── loading.tsx
//! │       └── page.tsx            # /blog/[slug]
//! └── docs/
//!     └── [...parts]/
//!         └── page.tsx            # /docs/[...parts]
//! ```
//!
//! ## Route Files
//!
//! `page`, `layout`, `loading`, `error`, `not-found`, and `global-error` with
//! any configured extension are attached to their directory's node as
//! [`FileRef`]s. Each file is classified as server-evaluated or
//! client-deferred from its leading directive.
//!
//! ## Page Config
//!
//! For `page` files, `export const revalidate = ...` and
//! `export const dynamic = '...'` are read with a textual match over the raw
//! source. The module is never executed. A value that does not parse leaves
//! the field unset and logs a warning.
//!
//! ## Ordering
//!
//! Children keep directory enumeration order. Nothing is sorted.

use crate::naming::{Segment, join_path, parse_segment};
use crate::types::{DynamicMode, PageConfig, Revalidate};
use log::warn;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Route root does not exist: {0}")]
    MissingRoot(PathBuf),
    #[error("Route root is not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Whether a module runs during rendering or is shipped to the receiving client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    Server,
    Client,
}

/// Decides a module's [`ModuleKind`] from its source text.
pub trait ModuleClassifier {
    fn classify(&self, source: &str) -> ModuleKind;
}

/// Classifies by the leading `"use client"` directive.
///
/// Leading whitespace, a byte-order mark, and comments may precede the
/// directive; any other statement first means the module is a server module.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectiveClassifier;

impl ModuleClassifier for DirectiveClassifier {
    fn classify(&self, source: &str) -> ModuleKind {
        match leading_directive(source) {
            Some("use client") => ModuleKind::Client,
            _ => ModuleKind::Server,
        }
    }
}

/// First string-literal statement of a module, if it has one.
fn leading_directive(source: &str) -> Option<&str> {
    let mut rest = source.trim_start_matches('\u{feff}');
    loop {
        rest = rest.trim_start();
        if let Some(after) = rest.strip_prefix("//") {
            rest = after.split_once('\n').map(|(_, r)| r).unwrap_or("");
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.split_once("*/").map(|(_, r)| r)?;
        } else {
            break;
        }
    }
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let body = &rest[1..];
    let end = body.find(quote)?;
    // `"use client".length` and friends are expressions, not directives
    let tail = body[end + 1..].trim_start();
    let terminated = tail.is_empty()
        || tail.starts_with(|c: char| c == ';' || c == '"' || c == '\'' || c == '/')
        || tail.starts_with(char::is_alphabetic);
    terminated.then_some(&body[..end])
}

/// A route file attached to a [`RouteNode`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileRef {
    /// Project-relative path with `/` separators, e.g. `app/blog/page.tsx`.
    pub relative_path: String,
    #[serde(skip)]
    pub absolute_path: PathBuf,
    pub kind: ModuleKind,
    /// Only read for `page` files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<PageConfig>,
}

impl FileRef {
    pub fn is_client(&self) -> bool {
        self.kind == ModuleKind::Client
    }
}

/// One directory of the route tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteNode {
    /// Raw directory name; empty for the root.
    pub segment: String,
    /// Canonical URL pattern with route groups elided, e.g. `/blog/[slug]`.
    pub path: String,
    pub dynamic: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    pub catch_all: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<FileRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<FileRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loading: Option<FileRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FileRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_found: Option<FileRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_error: Option<FileRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RouteNode>,
}

impl RouteNode {
    fn new(segment: &str, parent_path: Option<&str>) -> Self {
        let parsed = parse_segment(segment);
        let path = match (parent_path, &parsed) {
            (None, _) => "/".to_string(),
            (Some(parent), Segment::Group(_)) => parent.to_string(),
            (Some(parent), _) => join_path(parent, segment),
        };
        Self {
            segment: segment.to_string(),
            path,
            dynamic: parsed.is_dynamic(),
            param: parsed.param().map(str::to_string),
            catch_all: parsed.is_catch_all(),
            page: None,
            layout: None,
            loading: None,
            error: None,
            not_found: None,
            global_error: None,
            children: Vec::new(),
        }
    }

    /// True for `(group)` directories.
    pub fn is_group(&self) -> bool {
        parse_segment(&self.segment).is_group()
    }

    /// Page config of this node's page, or the empty config.
    pub fn page_config(&self) -> PageConfig {
        self.page
            .as_ref()
            .and_then(|p| p.config)
            .unwrap_or_default()
    }

    /// Every root-to-node chain that ends at a node with a page, in tree order.
    pub fn page_chains(&self) -> Vec<Vec<&RouteNode>> {
        let mut chains = Vec::new();
        let mut stack = Vec::new();
        collect_chains(self, &mut stack, &mut chains);
        chains
    }

    /// Every file attached anywhere in the tree, in tree order.
    pub fn files(&self) -> Vec<&FileRef> {
        let mut out: Vec<&FileRef> = [
            &self.layout,
            &self.page,
            &self.loading,
            &self.error,
            &self.not_found,
            &self.global_error,
        ]
        .into_iter()
        .flatten()
        .collect();
        for child in &self.children {
            out.extend(child.files());
        }
        out
    }

    fn slot_mut(&mut self, kind: RouteFileKind) -> &mut Option<FileRef> {
        match kind {
            RouteFileKind::Page => &mut self.page,
            RouteFileKind::Layout => &mut self.layout,
            RouteFileKind::Loading => &mut self.loading,
            RouteFileKind::Error => &mut self.error,
            RouteFileKind::NotFound => &mut self.not_found,
            RouteFileKind::GlobalError => &mut self.global_error,
        }
    }
}

fn collect_chains<'a>(
    node: &'a RouteNode,
    stack: &mut Vec<&'a RouteNode>,
    chains: &mut Vec<Vec<&'a RouteNode>>,
) {
    stack.push(node);
    if node.page.is_some() {
        chains.push(stack.clone());
    }
    for child in &node.children {
        collect_chains(child, stack, chains);
    }
    stack.pop();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RouteFileKind {
    Page,
    Layout,
    Loading,
    Error,
    NotFound,
    GlobalError,
}

impl RouteFileKind {
    fn from_stem(stem: &str) -> Option<Self> {
        Some(match stem {
            "page" => Self::Page,
            "layout" => Self::Layout,
            "loading" => Self::Loading,
            "error" => Self::Error,
            "not-found" => Self::NotFound,
            "global-error" => Self::GlobalError,
            _ => return None,
        })
    }
}

/// Scanner settings: recognized extensions, classifier, and the directory
/// that relative paths (and therefore module ids) are computed against.
pub struct Scanner<'a> {
    extensions: Vec<String>,
    classifier: &'a dyn ModuleClassifier,
    project_root: Option<PathBuf>,
}

impl Default for Scanner<'_> {
    fn default() -> Self {
        Self {
            extensions: crate::config::BuildConfig::default().page_extensions,
            classifier: &DirectiveClassifier,
            project_root: None,
        }
    }
}

impl<'a> Scanner<'a> {
    pub fn new(extensions: Vec<String>) -> Self {
        Self {
            extensions,
            ..Self::default()
        }
    }

    pub fn with_classifier(mut self, classifier: &'a dyn ModuleClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Relative paths are computed against this directory. Defaults to the
    /// parent of the scanned root.
    pub fn with_project_root(mut self, project_root: &Path) -> Self {
        self.project_root = Some(project_root.to_path_buf());
        self
    }

    pub fn scan(&self, root: &Path) -> Result<RouteNode, ScanError> {
        if !root.exists() {
            return Err(ScanError::MissingRoot(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(ScanError::NotADirectory(root.to_path_buf()));
        }
        let project_root = self
            .project_root
            .clone()
            .or_else(|| root.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| root.to_path_buf());

        let mut node = RouteNode::new("", None);
        self.scan_directory(root, &project_root, &mut node)?;
        Ok(node)
    }

    fn scan_directory(
        &self,
        dir: &Path,
        project_root: &Path,
        node: &mut RouteNode,
    ) -> Result<(), ScanError> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            if name.starts_with('.') || name == "node_modules" {
                continue;
            }

            if path.is_dir() {
                let mut child = RouteNode::new(&name, Some(&node.path));
                self.scan_directory(&path, project_root, &mut child)?;
                node.children.push(child);
                continue;
            }

            let Some(kind) = self.route_file_kind(&path) else {
                continue;
            };
            let slot = node.slot_mut(kind);
            if let Some(existing) = slot {
                warn!(
                    "ignoring {}: {} already defines this route file",
                    path.display(),
                    existing.relative_path
                );
                continue;
            }
            *slot = Some(self.file_ref(&path, project_root, kind)?);
        }
        Ok(())
    }

    fn route_file_kind(&self, path: &Path) -> Option<RouteFileKind> {
        let ext = path.extension()?.to_string_lossy();
        if !self.extensions.iter().any(|e| e.as_str() == ext) {
            return None;
        }
        RouteFileKind::from_stem(&path.file_stem()?.to_string_lossy())
    }

    fn file_ref(
        &self,
        path: &Path,
        project_root: &Path,
        kind: RouteFileKind,
    ) -> Result<FileRef, ScanError> {
        let source = fs::read_to_string(path)?;
        let relative_path = relative_module_path(path, project_root);
        let config = (kind == RouteFileKind::Page)
            .then(|| extract_page_config(&source, &relative_path));
        Ok(FileRef {
            kind: self.classifier.classify(&source),
            relative_path,
            absolute_path: path.to_path_buf(),
            config,
        })
    }
}

/// Scan with default extensions and the directive classifier.
pub fn scan(root: &Path) -> Result<RouteNode, ScanError> {
    Scanner::default().scan(root)
}

/// Project-relative path with `/` separators.
pub fn relative_module_path(path: &Path, project_root: &Path) -> String {
    let rel = path.strip_prefix(project_root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// The value runs up to an optional `;` and an optional trailing comment.
fn revalidate_export() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*export\s+const\s+revalidate\s*(?::[^=\n]*)?=\s*([^;\n]*?)\s*;?\s*(?://.*|/\*.*)?$")
            .expect("static regex")
    })
}

fn dynamic_export() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*export\s+const\s+dynamic\s*(?::[^=\n]*)?=\s*([^;\n]*?)\s*;?\s*(?://.*|/\*.*)?$")
            .expect("static regex")
    })
}

/// Read `revalidate` and `dynamic` exports from raw page source.
///
/// `source_name` only labels warnings.
pub fn extract_page_config(source: &str, source_name: &str) -> PageConfig {
    let revalidate = revalidate_export()
        .captures(source)
        .and_then(|caps| match caps[1].trim().parse::<Revalidate>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("{source_name}: unreadable revalidate export ({e}), leaving unset");
                None
            }
        });

    let dynamic = dynamic_export().captures(source).and_then(|caps| {
        let raw = caps[1].trim();
        let unquoted = raw
            .strip_prefix('\'')
            .and_then(|s| s.strip_suffix('\''))
            .or_else(|| raw.strip_prefix('"').and_then(|s| s.strip_suffix('"')));
        match unquoted.map(str::parse::<DynamicMode>) {
            Some(Ok(mode)) => Some(mode),
            Some(Err(e)) => {
                warn!("{source_name}: {e} in dynamic export, leaving unset");
                None
            }
            None => {
                warn!("{source_name}: dynamic export is not a string literal, leaving unset");
                None
            }
        }
    });

    PageConfig {
        revalidate,
        dynamic,
    }
}

/// Two pages that resolve to the same URL pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteConflict {
    pub pattern: String,
    pub files: Vec<String>,
}

/// Find pages that resolve to the same URL, e.g. through different route
/// groups, or through dynamic segments that only differ in parameter name.
pub fn check_conflicts(root: &RouteNode) -> Vec<RouteConflict> {
    let mut by_shape: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
    for chain in root.page_chains() {
        let Some(node) = chain.last() else { continue };
        let Some(page) = &node.page else { continue };
        by_shape
            .entry(route_shape(&node.path))
            .or_default()
            .push((node.path.clone(), page.relative_path.clone()));
    }
    by_shape
        .into_values()
        .filter(|pages| pages.len() > 1)
        .map(|pages| RouteConflict {
            pattern: pages[0].0.clone(),
            files: pages.into_iter().map(|(_, file)| file).collect(),
        })
        .collect()
}

/// Pattern with parameter names erased: `/blog/[slug]` → `/blog/[]`.
fn route_shape(pattern: &str) -> String {
    let parts: Vec<String> = crate::naming::split_path(pattern)
        .map(|s| match parse_segment(s) {
            Segment::Dynamic(_) => "[]".to_string(),
            Segment::CatchAll(_) => "[...]".to_string(),
            _ => s.to_string(),
        })
        .collect();
    format!("/{}", parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;

    #[test]
    fn missing_root_is_fatal() {
        let fixture = AppFixture::new();
        let result = scan(&fixture.root().join("nope"));
        assert!(matches!(result, Err(ScanError::MissingRoot(_))));
    }

    #[test]
    fn file_root_is_rejected() {
        let fixture = AppFixture::new();
        fixture.file("page.tsx", "export default function Page() {}");
        let result = scan(&fixture.app().join("page.tsx"));
        assert!(matches!(result, Err(ScanError::NotADirectory(_))));
    }

    #[test]
    fn root_node_is_slash() {
        let fixture = AppFixture::new();
        fixture.file("page.tsx", "export default function Home() {}");
        fixture.file("layout.tsx", "export default function Root() {}");
        let tree = fixture.scan();

        assert_eq!(tree.path, "/");
        assert_eq!(tree.segment, "");
        assert_eq!(tree.page.as_ref().unwrap().relative_path, "app/page.tsx");
        assert!(tree.layout.is_some());
    }

    #[test]
    fn route_group_is_elided_from_path() {
        let fixture = AppFixture::new();
        fixture.file("(marketing)/pricing/page.tsx", "export default function P() {}");
        let tree = fixture.scan();

        let group = &tree.children[0];
        assert!(group.is_group());
        assert_eq!(group.path, "/");
        let pricing = find_page(&tree, "/pricing");
        assert_eq!(pricing.segment, "pricing");
        assert!(!pricing.path.contains('('));
    }

    #[test]
    fn dynamic_segment_records_param() {
        let fixture = AppFixture::new();
        fixture.file("blog/[slug]/page.tsx", "export default function Post() {}");
        let tree = fixture.scan();

        let post = find_page(&tree, "/blog/[slug]");
        assert!(post.dynamic);
        assert!(!post.catch_all);
        assert_eq!(post.param.as_deref(), Some("slug"));
    }

    #[test]
    fn catch_all_segment() {
        let fixture = AppFixture::new();
        fixture.file("blog/[...slug]/page.tsx", "export default function Post() {}");
        let tree = fixture.scan();

        let node = find_page(&tree, "/blog/[...slug]");
        assert!(node.dynamic);
        assert!(node.catch_all);
        assert_eq!(node.param.as_deref(), Some("slug"));
    }

    #[test]
    fn all_route_file_kinds_attached() {
        let fixture = AppFixture::new();
        for name in [
            "page.tsx",
            "layout.tsx",
            "loading.tsx",
            "error.tsx",
            "not-found.tsx",
            "global-error.tsx",
        ] {
            fixture.file(name, "export default function X() {}");
        }
        fixture.file("utils.ts", "export const x = 1;");
        let tree = fixture.scan();

        assert!(tree.page.is_some());
        assert!(tree.layout.is_some());
        assert!(tree.loading.is_some());
        assert!(tree.error.is_some());
        assert!(tree.not_found.is_some());
        assert!(tree.global_error.is_some());
        assert_eq!(tree.files().len(), 6);
    }

    #[test]
    fn unknown_extension_ignored() {
        let fixture = AppFixture::new();
        fixture.file("page.py", "print('no')");
        let tree = fixture.scan();
        assert!(tree.page.is_none());
    }

    #[test]
    fn custom_extensions() {
        let fixture = AppFixture::new();
        fixture.file("page.vue", "<template></template>");
        let tree = Scanner::new(vec!["vue".into()]).scan(&fixture.app()).unwrap();
        assert!(tree.page.is_some());
    }

    #[test]
    fn hidden_directories_skipped() {
        let fixture = AppFixture::new();
        fixture.file(".cache/page.tsx", "export default function X() {}");
        let tree = fixture.scan();
        assert!(tree.children.is_empty());
    }

    #[test]
    fn client_directive_classifies_file() {
        let fixture = AppFixture::new();
        fixture.file("page.tsx", "'use client';\nexport default function Home() {}");
        fixture.file("layout.tsx", "export default function Root() {}");
        let tree = fixture.scan();

        assert_eq!(tree.page.as_ref().unwrap().kind, ModuleKind::Client);
        assert_eq!(tree.layout.as_ref().unwrap().kind, ModuleKind::Server);
    }

    #[test]
    fn directive_after_comments() {
        let src = "// header\n/* license\n block */\n\"use client\"\nimport x from 'y'";
        assert_eq!(DirectiveClassifier.classify(src), ModuleKind::Client);
    }

    #[test]
    fn directive_must_lead() {
        let src = "import x from 'y';\n'use client';";
        assert_eq!(DirectiveClassifier.classify(src), ModuleKind::Server);
        assert_eq!(DirectiveClassifier.classify(""), ModuleKind::Server);
        assert_eq!(
            DirectiveClassifier.classify("'use server';"),
            ModuleKind::Server
        );
    }

    #[test]
    fn custom_classifier() {
        struct AllClient;
        impl ModuleClassifier for AllClient {
            fn classify(&self, _: &str) -> ModuleKind {
                ModuleKind::Client
            }
        }
        let fixture = AppFixture::new();
        fixture.file("page.tsx", "export default function Home() {}");
        let tree = Scanner::default()
            .with_classifier(&AllClient)
            .scan(&fixture.app())
            .unwrap();
        assert!(tree.page.as_ref().unwrap().is_client());
    }

    #[test]
    fn page_config_extracted() {
        let config = extract_page_config(
            "export const revalidate = 60;\nexport const dynamic = 'force-static';\n",
            "page.tsx",
        );
        assert_eq!(config.revalidate, Some(Revalidate::Seconds(60)));
        assert_eq!(config.dynamic, Some(DynamicMode::ForceStatic));
    }

    #[test]
    fn page_config_revalidate_false_and_double_quotes() {
        let config = extract_page_config(
            "export const revalidate = false\nexport const dynamic = \"force-dynamic\"",
            "page.tsx",
        );
        assert_eq!(config.revalidate, Some(Revalidate::Never));
        assert_eq!(config.dynamic, Some(DynamicMode::ForceDynamic));
    }

    #[test]
    fn page_config_with_trailing_comments() {
        let config = extract_page_config(
            "export const dynamic = 'force-dynamic' // always fresh\nexport const revalidate = 60 // one minute\n",
            "page.tsx",
        );
        assert_eq!(config.dynamic, Some(DynamicMode::ForceDynamic));
        assert_eq!(config.revalidate, Some(Revalidate::Seconds(60)));

        let config = extract_page_config(
            "export const revalidate = false; /* never */\r\nexport const dynamic = \"error\";  // strict\r\n",
            "page.tsx",
        );
        assert_eq!(config.revalidate, Some(Revalidate::Never));
        assert_eq!(config.dynamic, Some(DynamicMode::Error));
    }

    #[test]
    fn page_config_with_type_annotation() {
        let config = extract_page_config("export const revalidate: number = 5;", "page.tsx");
        assert_eq!(config.revalidate, Some(Revalidate::Seconds(5)));
    }

    #[test]
    fn malformed_page_config_left_unset() {
        let config = extract_page_config(
            "export const revalidate = 60 * 60;\nexport const dynamic = mode;\n",
            "page.tsx",
        );
        assert_eq!(config, PageConfig::default());

        let config = extract_page_config("export const dynamic = 'sometimes';", "page.tsx");
        assert_eq!(config.dynamic, None);
    }

    #[test]
    fn absent_page_config() {
        let config = extract_page_config("export default function Page() {}", "page.tsx");
        assert_eq!(config, PageConfig::default());
    }

    #[test]
    fn config_only_read_for_pages() {
        let fixture = AppFixture::new();
        fixture.file("layout.tsx", "export const revalidate = 10;");
        fixture.file("page.tsx", "export const revalidate = 20;");
        let tree = fixture.scan();

        assert!(tree.layout.as_ref().unwrap().config.is_none());
        assert_eq!(
            tree.page_config().revalidate,
            Some(Revalidate::Seconds(20))
        );
    }

    #[test]
    fn page_chains_include_groups_and_layouts() {
        let fixture = AppFixture::new();
        fixture.file("layout.tsx", "export default function Root() {}");
        fixture.file("(shop)/layout.tsx", "export default function Shop() {}");
        fixture.file("(shop)/cart/page.tsx", "export default function Cart() {}");
        let tree = fixture.scan();

        let chains = tree.page_chains();
        assert_eq!(chains.len(), 1);
        let segments: Vec<&str> = chains[0].iter().map(|n| n.segment.as_str()).collect();
        assert_eq!(segments, vec!["", "(shop)", "cart"]);
    }

    #[test]
    fn conflicting_groups_detected() {
        let fixture = AppFixture::new();
        fixture.file("(a)/about/page.tsx", "export default function A() {}");
        fixture.file("(b)/about/page.tsx", "export default function B() {}");
        fixture.file("blog/[id]/page.tsx", "export default function X() {}");
        let tree = fixture.scan();

        let conflicts = check_conflicts(&tree);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].pattern, "/about");
        assert_eq!(conflicts[0].files.len(), 2);
    }

    #[test]
    fn differently_named_params_conflict() {
        let fixture = AppFixture::new();
        fixture.file("(a)/blog/[id]/page.tsx", "export default function A() {}");
        fixture.file("(b)/blog/[slug]/page.tsx", "export default function B() {}");
        let tree = fixture.scan();
        assert_eq!(check_conflicts(&tree).len(), 1);
    }

    #[test]
    fn relative_paths_use_forward_slashes() {
        let rel = relative_module_path(Path::new("/p/app/blog/page.tsx"), Path::new("/p"));
        assert_eq!(rel, "app/blog/page.tsx");
    }
}
