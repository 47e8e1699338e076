//! Centralized segment parsing for the route directory convention.
//!
//! Every directory under the app root is one URL segment, written in one of
//! four forms:
//!
//! - `blog` → static segment, contributes `blog` to the URL
//! - `(marketing)` → route group, shapes layout nesting but is elided from the URL
//! - `[slug]` → dynamic segment, captures exactly one URL segment as `slug`
//! - `[...parts]` → catch-all, captures the remaining URL segments as a sequence
//!
//! Anything that does not cleanly match one of the bracket or group forms
//! (`[]`, `[...]`, `[a.b]`, `[x]y`, `()`) is a static segment. Parsing never fails.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// One parsed directory name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Static(String),
    Group(String),
    Dynamic(String),
    CatchAll(String),
}

impl Segment {
    /// True for `[name]` and `[...name]`.
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Segment::Dynamic(_) | Segment::CatchAll(_))
    }

    pub fn is_catch_all(&self) -> bool {
        matches!(self, Segment::CatchAll(_))
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Segment::Group(_))
    }

    /// Parameter name captured by this segment, if any.
    pub fn param(&self) -> Option<&str> {
        match self {
            Segment::Dynamic(name) | Segment::CatchAll(name) => Some(name),
            _ => None,
        }
    }
}

/// Parse a directory name into a [`Segment`].
///
/// - `"blog"` → `Static("blog")`
/// - `"(shop)"` → `Group("shop")`
/// - `"[slug]"` → `Dynamic("slug")`
/// - `"[...slug]"` → `CatchAll("slug")`
/// - `"[...]"`, `"[a.b]"`, `"()"` → `Static(raw)`
pub fn parse_segment(name: &str) -> Segment {
    if let Some(inner) = name.strip_prefix('(').and_then(|s| s.strip_suffix(')'))
        && !inner.is_empty()
        && !inner.contains(['(', ')', '/'])
    {
        return Segment::Group(inner.to_string());
    }

    if let Some(inner) = name.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        if let Some(rest) = inner.strip_prefix("...") {
            if is_param_name(rest) {
                return Segment::CatchAll(rest.to_string());
            }
        } else if is_param_name(inner) {
            return Segment::Dynamic(inner.to_string());
        }
    }

    Segment::Static(name.to_string())
}

fn is_param_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// A concrete value for one route parameter.
///
/// Dynamic segments take a scalar; catch-all segments take a sequence. On the
/// wire (static-param lists, manifest entries) a scalar is a JSON string and a
/// sequence is a JSON array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    One(String),
    Many(Vec<String>),
}

impl ParamValue {
    pub fn as_segments(&self) -> Vec<&str> {
        match self {
            ParamValue::One(v) => vec![v.as_str()],
            ParamValue::Many(vs) => vs.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::One(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::One(value)
    }
}

impl From<Vec<&str>> for ParamValue {
    fn from(values: Vec<&str>) -> Self {
        ParamValue::Many(values.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(values: Vec<String>) -> Self {
        ParamValue::Many(values)
    }
}

/// Route parameters keyed by name. Ordered so every serialization is stable.
pub type Params = BTreeMap<String, ParamValue>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RouteError {
    #[error("route {pattern} needs parameter `{param}`")]
    MissingParam { pattern: String, param: String },
    #[error("parameter `{param}` of a single dynamic segment cannot be a sequence")]
    ExpectedScalar { param: String },
    #[error("catch-all parameter `{param}` needs at least one value")]
    EmptyCatchAll { param: String },
    #[error("invalid value {value:?} for parameter `{param}`")]
    InvalidValue { param: String, value: String },
}

/// Substitute concrete values into a route pattern.
///
/// `"/blog/[slug]"` with `{slug: "hello"}` → `"/blog/hello"`;
/// `"/docs/[...parts]"` with `{parts: ["a", "b"]}` → `"/docs/a/b"`.
/// A scalar passed for a catch-all is accepted as a one-element sequence.
pub fn build_path_with_params(pattern: &str, params: &Params) -> Result<String, RouteError> {
    let mut out = Vec::new();
    for raw in split_path(pattern) {
        match parse_segment(raw) {
            Segment::Static(s) => out.push(s),
            Segment::Group(_) => {}
            Segment::Dynamic(name) => {
                let value = lookup(pattern, params, &name)?;
                let ParamValue::One(v) = value else {
                    return Err(RouteError::ExpectedScalar { param: name });
                };
                check_value(&name, v)?;
                out.push(v.clone());
            }
            Segment::CatchAll(name) => {
                let values = lookup(pattern, params, &name)?.as_segments();
                if values.is_empty() {
                    return Err(RouteError::EmptyCatchAll { param: name });
                }
                for v in values {
                    check_value(&name, v)?;
                    out.push(v.to_string());
                }
            }
        }
    }
    Ok(format!("/{}", out.join("/")))
}

fn lookup<'a>(pattern: &str, params: &'a Params, name: &str) -> Result<&'a ParamValue, RouteError> {
    params.get(name).ok_or_else(|| RouteError::MissingParam {
        pattern: pattern.to_string(),
        param: name.to_string(),
    })
}

/// Values become path components on disk, so traversal and separators are refused.
fn check_value(param: &str, value: &str) -> Result<(), RouteError> {
    if value.is_empty() || value == "." || value == ".." || value.contains(['/', '\\']) {
        return Err(RouteError::InvalidValue {
            param: param.to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Split a URL path into its non-empty segments.
pub fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Append one URL segment to a canonical parent path.
pub fn join_path(parent: &str, segment: &str) -> String {
    if parent == "/" {
        format!("/{segment}")
    } else {
        format!("{parent}/{segment}")
    }
}

/// True if the pattern contains any dynamic or catch-all segment.
pub fn has_dynamic_segments(pattern: &str) -> bool {
    split_path(pattern).any(|s| parse_segment(s).is_dynamic())
}
