//! Shared test utilities for the flightdeck test suite.
//!
//! Provides an on-disk app fixture builder, route tree lookups, and small
//! constructors for server modules and views.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let fixture = AppFixture::new();
//! fixture.file("blog/[slug]/page.tsx", "export default function Post() {}");
//! let tree = fixture.scan();
//!
//! let post = find_page(&tree, "/blog/[slug]");
//! assert_eq!(post.param.as_deref(), Some("slug"));
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::naming::{ParamValue, Params};
use crate::render::{ModuleRegistry, ServerModule};
use crate::scan::{RouteNode, scan};
use crate::view::{Deferred, View};

// =========================================================================
// Fixture setup
// =========================================================================

/// A temporary project directory with an `app/` route root.
pub struct AppFixture {
    dir: TempDir,
}

impl AppFixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("app")).unwrap();
        Self { dir }
    }

    /// Project root (parent of `app/`).
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn app(&self) -> PathBuf {
        self.dir.path().join("app")
    }

    /// Write a file relative to `app/`, creating parent directories.
    pub fn file(&self, rel: &str, contents: &str) -> &Self {
        self.project_file(&format!("app/{rel}"), contents)
    }

    /// Write a file relative to the project root.
    pub fn project_file(&self, rel: &str, contents: &str) -> &Self {
        let path = self.dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
        self
    }

    pub fn scan(&self) -> RouteNode {
        scan(&self.app()).unwrap()
    }
}

// =========================================================================
// Route tree lookups
// =========================================================================

/// The node with a page at the given URL pattern. Panics if absent.
pub fn find_page<'a>(tree: &'a RouteNode, pattern: &str) -> &'a RouteNode {
    tree.page_chains()
        .into_iter()
        .filter_map(|chain| chain.last().copied())
        .find(|node| node.path == pattern)
        .unwrap_or_else(|| panic!("no page at {pattern}"))
}

/// Root-to-page chain for the page at the given URL pattern.
pub fn chain_for<'a>(tree: &'a RouteNode, pattern: &str) -> Vec<&'a RouteNode> {
    tree.page_chains()
        .into_iter()
        .find(|chain| chain.last().is_some_and(|n| n.path == pattern))
        .unwrap_or_else(|| panic!("no page at {pattern}"))
}

// =========================================================================
// Modules and params
// =========================================================================

pub fn params(pairs: &[(&str, ParamValue)]) -> Params {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// A page that renders `<p>{text}</p>`.
pub fn text_page(text: &'static str) -> ServerModule {
    ServerModule::new(move |_| Deferred::ready(Ok(View::element("p").child(View::text(text)).into())))
}

/// A layout that wraps its children in `<tag>`.
pub fn wrapping_layout(tag: &'static str) -> ServerModule {
    ServerModule::new(move |props| {
        Deferred::ready(Ok(View::element(tag).child(props.children).into()))
    })
}

/// Registry with a root layout and the given pages keyed by relative path.
pub fn registry_with(pages: Vec<(&str, ServerModule)>) -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    registry.register("app/layout.tsx", wrapping_layout("main"));
    for (path, module) in pages {
        registry.register(path, module);
    }
    registry
}
