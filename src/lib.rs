//! # flightdeck
//!
//! A small file-routed component framework. The `app/` directory is the data
//! source: directories become URL segments, special files (`page`, `layout`,
//! `loading`, `error`, `not-found`, `global-error`) attach behavior to them,
//! and pages render into a line-oriented chunk stream that a client can turn
//! back into the same tree.
//!
//! # Architecture
//!
//! ```text
//! scan       app/            →  RouteNode tree         (filesystem → routes)
//! render     route chain     →  Node + client modules  (await every subtree)
//! encode     Node            →  chunk stream           (single forward pass)
//! generate   RouteNode       →  out/                   (html + flight + manifest)
//! serve      path?_rsc       →  Response               (stale-while-revalidate)
//! decode     chunk stream    →  Node                   (client takeover)
//! navigate   path            →  swap decoded tree      (cache, supersession)
//! ```
//!
//! Static generation and request serving share one render path
//! ([`generate::Generator::render_route`]). They differ in failure policy:
//! generation logs a failing route and continues, serving propagates.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`naming`] | Segment grammar (`[id]`, `[...path]`, `(group)`) and concrete path building |
//! | [`scan`] | Walks `app/` into a [`scan::RouteNode`] tree, classifies modules, extracts page config |
//! | [`matcher`] | Concrete URL → route chain and params |
//! | [`types`] | Page config and the prerender manifest, shared between stages |
//! | [`tree`] | The rendered tree: a closed set of node variants |
//! | [`view`] | What route modules return before rendering: components, client components, pending subtrees |
//! | [`render`] | Turns a route chain into a [`tree::Node`], collecting client modules |
//! | [`flight`] | The wire format: chunk grammar, encoder, decoder and module loaders |
//! | [`document`] | Full HTML document around a rendered tree and its chunk stream, using Maud |
//! | [`generate`] | Pre-renders static and parameterized routes to `out/` |
//! | [`revalidate`] | Per-route generation metadata and single-flight regeneration |
//! | [`serve`] | Framework-agnostic request handler over the generated output |
//! | [`navigate`] | Client-side navigation over fetched chunk streams |
//! | [`config`] | `flightdeck.toml` loading, merging and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## No Streaming
//!
//! The renderer awaits every pending subtree before anything is encoded. A
//! chunk never points at a later chunk, so the decoder can resolve the whole
//! stream in one pass once the root (chunk 0, written last) arrives.
//!
//! ## Errors Are Data Below the Page
//!
//! A failing nested component becomes an `E` chunk and renders as an error
//! marker on the client. A failing layout or page has no subtree to stand in
//! for, so it fails the whole route.
//!
//! ## Static Analysis for Page Config
//!
//! `revalidate` and `dynamic` are read from the page source with two regular
//! expressions, never by executing it. Anything the patterns do not recognize
//! leaves the field unset.

pub mod config;
pub mod document;
pub mod flight;
pub mod generate;
pub mod matcher;
pub mod naming;
pub mod navigate;
pub mod output;
pub mod render;
pub mod revalidate;
pub mod scan;
pub mod serve;
pub mod tree;
pub mod types;
pub mod view;

#[cfg(test)]
pub(crate) mod test_helpers;
