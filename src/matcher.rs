//! Concrete URL → route chain.
//!
//! At every level static segments win over route groups, groups over
//! `[param]` segments, and those over `[...param]`. Route groups consume no
//! URL segment but stay in the chain so their layouts apply. A catch-all needs
//! at least one segment.

use crate::naming::{ParamValue, Params, split_path};
use crate::scan::RouteNode;

#[derive(Debug, Clone, PartialEq)]
pub struct RouteMatch<'a> {
    /// Root to page, groups included.
    pub chain: Vec<&'a RouteNode>,
    pub params: Params,
}

impl<'a> RouteMatch<'a> {
    pub fn node(&self) -> &'a RouteNode {
        self.chain[self.chain.len() - 1]
    }

    /// URL pattern of the matched page, e.g. `/blog/[slug]`.
    pub fn pattern(&self) -> &'a str {
        &self.node().path
    }
}

/// Match a request path (query string allowed) against the route tree.
pub fn match_path<'a>(tree: &'a RouteNode, path: &str) -> Option<RouteMatch<'a>> {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let segments: Vec<&str> = split_path(path).collect();
    let mut chain = vec![tree];
    let mut params = Params::new();
    match_node(tree, &segments, &mut chain, &mut params).then_some(RouteMatch { chain, params })
}

fn rank(node: &RouteNode) -> u8 {
    if node.catch_all {
        3
    } else if node.dynamic {
        2
    } else if node.is_group() {
        1
    } else {
        0
    }
}

fn match_node<'a>(
    node: &'a RouteNode,
    segments: &[&str],
    chain: &mut Vec<&'a RouteNode>,
    params: &mut Params,
) -> bool {
    if segments.is_empty() && node.page.is_some() {
        return true;
    }

    let mut children: Vec<&RouteNode> = node.children.iter().collect();
    children.sort_by_key(|c| rank(c));

    for child in children {
        let (rest, captured) = match (rank(child), segments.split_first()) {
            (0, Some((first, rest))) if *first == child.segment => (rest, None),
            (1, _) => (segments, None),
            (2, Some((first, rest))) => (rest, Some(ParamValue::One(first.to_string()))),
            (3, Some(_)) => (
                &[][..],
                Some(ParamValue::Many(segments.iter().map(|s| s.to_string()).collect())),
            ),
            _ => continue,
        };

        chain.push(child);
        let param = child.param.clone();
        if let (Some(name), Some(value)) = (&param, captured) {
            params.insert(name.clone(), value);
        }
        if match_node(child, rest, chain, params) {
            return true;
        }
        if let Some(name) = &param {
            params.remove(name);
        }
        chain.pop();
    }
    false
}
