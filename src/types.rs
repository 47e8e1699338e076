//! Shared types serialized between the scanner, the generator, and the
//! serving layer.
//!
//! The prerender manifest written by [`crate::generate`] is read back by
//! [`crate::revalidate`] and [`crate::serve`], so these shapes are the on-disk
//! contract between build time and request time.

use crate::naming::Params;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// `export const revalidate = ...` on a page.
///
/// Serialized as the bare number of seconds, or `false` for "never".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revalidate {
    Seconds(u64),
    Never,
}

impl Serialize for Revalidate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Revalidate::Seconds(n) => serializer.serialize_u64(*n),
            Revalidate::Never => serializer.serialize_bool(false),
        }
    }
}

impl<'de> Deserialize<'de> for Revalidate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Seconds(u64),
            Flag(bool),
        }
        match Repr::deserialize(deserializer)? {
            Repr::Seconds(n) => Ok(Revalidate::Seconds(n)),
            Repr::Flag(false) => Ok(Revalidate::Never),
            Repr::Flag(true) => Err(serde::de::Error::custom(
                "revalidate must be a number of seconds or false",
            )),
        }
    }
}

impl FromStr for Revalidate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "false" => Ok(Revalidate::Never),
            other => other
                .parse::<u64>()
                .map(Revalidate::Seconds)
                .map_err(|_| format!("expected seconds or false, got {other:?}")),
        }
    }
}

impl fmt::Display for Revalidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Revalidate::Seconds(n) => write!(f, "{n}s"),
            Revalidate::Never => f.write_str("never"),
        }
    }
}

/// `export const dynamic = '...'` on a page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DynamicMode {
    #[default]
    Auto,
    ForceDynamic,
    ForceStatic,
    Error,
}

impl FromStr for DynamicMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(DynamicMode::Auto),
            "force-dynamic" => Ok(DynamicMode::ForceDynamic),
            "force-static" => Ok(DynamicMode::ForceStatic),
            "error" => Ok(DynamicMode::Error),
            other => Err(format!("unknown dynamic mode {other:?}")),
        }
    }
}

impl fmt::Display for DynamicMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DynamicMode::Auto => "auto",
            DynamicMode::ForceDynamic => "force-dynamic",
            DynamicMode::ForceStatic => "force-static",
            DynamicMode::Error => "error",
        })
    }
}

/// Static page configuration, extracted from source text at scan time.
///
/// Each field is `None` when the export is absent or could not be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revalidate: Option<Revalidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic: Option<DynamicMode>,
}

impl PageConfig {
    pub fn dynamic_mode(&self) -> DynamicMode {
        self.dynamic.unwrap_or_default()
    }

    /// `force-dynamic` pages and pages with `revalidate = 0` are never
    /// stored; every request renders them.
    pub fn renders_per_request(&self) -> bool {
        self.dynamic_mode() == DynamicMode::ForceDynamic
            || self.revalidate == Some(Revalidate::Seconds(0))
    }
}

/// One pre-materialized route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Concrete URL, e.g. `/blog/hello`.
    pub route_path: String,
    /// Route pattern the entry was expanded from, e.g. `/blog/[slug]`.
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Params::is_empty")]
    pub params: Params,
    /// HTML document, relative to the output root.
    pub html: String,
    /// Chunk stream, relative to the output root.
    pub flight: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revalidate: Option<Revalidate>,
    pub dynamic: DynamicMode,
    /// SHA-256 of the chunk stream.
    pub etag: String,
}

/// Every route produced by one generation pass, keyed by concrete path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrerenderManifest {
    pub version: u32,
    pub routes: BTreeMap<String, ManifestEntry>,
    /// The root `not-found` page, served for unmatched paths.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_found: Option<ManifestEntry>,
}
