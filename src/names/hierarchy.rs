//! Parent/child lookup for pipe-separated IAMC names such as `Energy|Supply|Coal`.
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Separator between the segments of a hierarchical name.
pub const SEPARATOR: char = '|';

/// How far below a name `children_of` should look.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Depth {
    /// At most this many extra levels. `Limited(1)` returns direct children only.
    Limited(usize),
    Unlimited,
}

impl Depth {
    fn allows(&self, extra_levels: usize) -> bool {
        match self {
            Depth::Limited(max) => extra_levels <= *max,
            Depth::Unlimited => true,
        }
    }
}

/// Number of separators in `name`; a top-level name has depth 0.
pub fn depth(name: &str) -> usize {
    name.matches(SEPARATOR).count()
}

/// The name with its last segment removed, without checking that it exists.
pub fn inferred_parent(name: &str) -> Option<&str> {
    name.rsplit_once(SEPARATOR).map(|(parent, _)| parent)
}

/// Checks that `name` is a well-formed hierarchical name.
///
/// Rejects empty names, surrounding whitespace and empty segments (which also
/// covers leading, trailing and doubled separators).
pub fn validate_name(name: &str) -> bool {
    !name.is_empty()
        && name.trim() == name
        && name.split(SEPARATOR).all(|segment| !segment.is_empty())
}

/// A set of known hierarchical names.
///
/// Names are deduplicated by exact string equality; no case folding or
/// whitespace normalisation takes place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespace {
    names: BTreeSet<String>,
}

impl Namespace {
    pub fn new() -> Self { Self::default() }

    pub fn contains(&self, name: &str) -> bool { self.names.contains(name) }
    pub fn len(&self) -> usize { self.names.len() }
    pub fn is_empty(&self) -> bool { self.names.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.names.insert(name.into())
    }

    /// Returns the aggregate `name` belongs to, if it is known.
    ///
    /// With `search_all_ancestor_levels` unset only the direct parent is
    /// considered. Otherwise the hierarchy is walked upwards and the closest
    /// known ancestor wins.
    pub fn parent_of(&self, name: &str, search_all_ancestor_levels: bool) -> Option<&str> {
        let mut candidate = inferred_parent(name);
        while let Some(parent) = candidate {
            if let Some(found) = self.names.get(parent) {
                return Some(found.as_str());
            }
            if !search_all_ancestor_levels {
                return None;
            }
            candidate = inferred_parent(parent);
        }
        None
    }

    /// Returns the known descendants of `name` down to `max_depth` extra levels,
    /// in lexicographic order.
    pub fn children_of(&self, name: &str, max_depth: Depth) -> Vec<&str> {
        let prefix = format!("{}{}", name, SEPARATOR);
        let base_depth = depth(name);

        // Every descendant sorts directly after the prefix, so a range scan
        // that stops at the first non-matching name is sufficient.
        self.names
            .range::<str, _>((std::ops::Bound::Included(prefix.as_str()), std::ops::Bound::Unbounded))
            .take_while(|candidate| candidate.starts_with(&prefix))
            .filter(|candidate| max_depth.allows(depth(candidate) - base_depth))
            .map(String::as_str)
            .collect()
    }
}

impl<S: Into<String>> FromIterator<S> for Namespace {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self { names: iter.into_iter().map(Into::into).collect() }
    }
}
