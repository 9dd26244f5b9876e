//! Directory tree builder
//!
//! Renders the directory index as a navigable hierarchy: every resolved
//! parent path is split into segments and merged into a label-keyed tree.
//! A node whose full segment sequence equals some resolved directory path
//! carries `has_changes`; other nodes exist only as path scaffolding.
//! The tree is rebuilt from scratch on every scan.

use crate::resolve::{ResolvedPath, ResolverCache};
use crate::store::EntryStore;
use std::collections::BTreeMap;

/// Separator the journal's resolved paths use.
pub const PATH_SEPARATOR: char = '\\';

/// One path segment and its children, keyed by label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathNode {
    pub label: String,
    pub children: BTreeMap<String, PathNode>,
    /// Set when some resolved directory path terminates at this node.
    pub has_changes: bool,
}

impl PathNode {
    fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            children: BTreeMap::new(),
            has_changes: false,
        }
    }

    pub fn child(&self, label: &str) -> Option<&PathNode> {
        self.children.get(label)
    }
}

/// The baked directory hierarchy for one scan.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PathTree {
    roots: BTreeMap<String, PathNode>,
    skipped_unresolved: usize,
}

impl PathTree {
    /// Build the tree from every directory index entry whose reference
    /// resolved to a path. Unresolved references are counted and skipped;
    /// they cannot be placed without a path.
    pub fn build(store: &EntryStore, cache: &ResolverCache) -> Self {
        let mut tree = Self::default();

        for list in store.directories() {
            match cache.path_of(list.reference) {
                Some(ResolvedPath::Known(path)) => tree.insert_path(path),
                Some(ResolvedPath::Unknown) | None => tree.skipped_unresolved += 1,
            }
        }

        tree
    }

    fn insert_path(&mut self, path: &str) {
        let mut segments: Vec<&str> = path.split(PATH_SEPARATOR).collect();
        // a bare drive root splits as ["C:", ""]; collapse it to one segment
        if segments.len() == 2 && segments[1].is_empty() {
            segments.truncate(1);
        }

        let mut iter = segments.into_iter();
        let first = match iter.next() {
            Some(segment) => segment,
            None => return,
        };

        let mut node = self
            .roots
            .entry(first.to_string())
            .or_insert_with(|| PathNode::new(first));
        for segment in iter {
            node = node
                .children
                .entry(segment.to_string())
                .or_insert_with(|| PathNode::new(segment));
        }
        node.has_changes = true;
    }

    /// Root nodes in descending label order, so a volume root like "C:"
    /// sorts ahead of deeper labels. Callers rely on this ordering.
    pub fn roots(&self) -> impl Iterator<Item = &PathNode> + '_ {
        self.roots.values().rev()
    }

    pub fn root(&self, label: &str) -> Option<&PathNode> {
        self.roots.get(label)
    }

    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Directory index entries that could not be placed because their
    /// reference never resolved.
    pub fn skipped_unresolved(&self) -> usize {
        self.skipped_unresolved
    }
}
