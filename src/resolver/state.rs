use std::collections::HashMap;

use super::{DependencyNote, Resolution};

#[derive(Debug)]
struct Node {
    name: String,
    resolved: bool,
    in_progress: bool,
}

/// Visited state of one top-level resolve call.
///
/// An arena of names with two marks each: `in_progress` while the name is on
/// the active recursion path, `resolved` once all of its dependencies are
/// resolved. A name is never both.
#[derive(Debug, Default)]
pub struct ResolutionState {
    index: HashMap<String, usize>,
    nodes: Vec<Node>,
    order: Vec<usize>,
    optional: Vec<DependencyNote>,
    recommended: Vec<DependencyNote>,
}

impl ResolutionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_resolved(&self, name: &str) -> bool {
        self.index.get(name).is_some_and(|&id| self.nodes[id].resolved)
    }

    pub fn is_in_progress(&self, name: &str) -> bool {
        self.index
            .get(name)
            .is_some_and(|&id| self.nodes[id].in_progress)
    }

    /// Number of distinct names the walk has touched.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(super) fn slot(&mut self, name: &str) -> usize {
        if let Some(&id) = self.index.get(name) {
            return id;
        }
        let id = self.nodes.len();
        self.nodes.push(Node {
            name: name.to_string(),
            resolved: false,
            in_progress: false,
        });
        self.index.insert(name.to_string(), id);
        id
    }

    pub(super) fn resolved(&self, id: usize) -> bool {
        self.nodes[id].resolved
    }

    pub(super) fn begin(&mut self, id: usize) {
        self.nodes[id].in_progress = true;
    }

    pub(super) fn finish(&mut self, id: usize) {
        let node = &mut self.nodes[id];
        node.in_progress = false;
        node.resolved = true;
        self.order.push(id);
    }

    pub(super) fn note_optional(&mut self, package: &str, dependency: &str) {
        self.optional.push(DependencyNote {
            package: package.to_string(),
            dependency: dependency.to_string(),
            skipped: false,
        });
    }

    pub(super) fn note_recommended(&mut self, package: &str, dependency: &str, skipped: bool) {
        self.recommended.push(DependencyNote {
            package: package.to_string(),
            dependency: dependency.to_string(),
            skipped,
        });
    }

    pub fn into_resolution(self) -> Resolution {
        let ResolutionState {
            mut nodes,
            order,
            optional,
            recommended,
            ..
        } = self;
        Resolution {
            order: order
                .into_iter()
                .map(|id| std::mem::take(&mut nodes[id].name))
                .collect(),
            optional,
            recommended,
        }
    }
}
