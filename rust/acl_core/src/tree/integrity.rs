//! Statistics, integrity diagnostics and flattened views.

use serde::Serialize;
use std::fmt;
use tracing::warn;

use super::traverse::DepthFirst;
use super::{TreeCollection, TreeNode};
use crate::types::ObjectId;

/// Level reported for orphans and their subtrees by
/// [`TreeCollection::flattened_with_levels`].
pub const ORPHAN_LEVEL: i64 = -1;

/// Aggregate shape of a collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeStats {
    pub total_nodes: usize,
    pub root_nodes: usize,
    pub leaf_nodes: usize,
    pub orphan_nodes: usize,
    /// Deepest level reachable from any root; 0 without roots.
    pub max_depth: usize,
    pub average_children_per_node: f64,
}

/// An inconsistency found by [`TreeCollection::validate_integrity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum IntegrityIssue {
    /// Declared parent is not in the collection (the node is an orphan).
    UnresolvedParent { id: ObjectId, parent_id: ObjectId },
    /// Declared parent is present but the node is not linked to it.
    MissingParentLink { id: ObjectId, parent_id: ObjectId },
    /// Resolved link disagrees with the declared parent id.
    ParentMismatch {
        id: ObjectId,
        parent_id: Option<ObjectId>,
        linked_parent: ObjectId,
    },
    /// Resolved link points at an id that is not in the collection.
    DanglingParent { id: ObjectId, linked_parent: ObjectId },
    /// Node is linked to a parent that does not list it as a child.
    NotInParentChildren { id: ObjectId, parent: ObjectId },
    /// Parent lists a child whose link points elsewhere.
    ChildLinkMismatch {
        parent: ObjectId,
        child: ObjectId,
        child_parent: Option<ObjectId>,
    },
    /// Parent lists a child id that is not in the collection.
    DanglingChild { parent: ObjectId, child: ObjectId },
    /// Node's parent chain loops back on itself.
    OnCycle { id: ObjectId },
}

impl fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvedParent { id, parent_id } => {
                write!(f, "node {id} references parent {parent_id} which is not loaded")
            }
            Self::MissingParentLink { id, parent_id } => {
                write!(f, "node {id} declares parent {parent_id} but has no parent link")
            }
            Self::ParentMismatch {
                id,
                parent_id,
                linked_parent,
            } => write!(
                f,
                "node {id} declares parent {parent_id:?} but is linked to {linked_parent}"
            ),
            Self::DanglingParent { id, linked_parent } => {
                write!(f, "node {id} is linked to missing parent {linked_parent}")
            }
            Self::NotInParentChildren { id, parent } => {
                write!(f, "node {id} is missing from children of parent {parent}")
            }
            Self::ChildLinkMismatch {
                parent,
                child,
                child_parent,
            } => write!(
                f,
                "node {parent} lists child {child} whose parent link is {child_parent:?}"
            ),
            Self::DanglingChild { parent, child } => {
                write!(f, "node {parent} lists missing child {child}")
            }
            Self::OnCycle { id } => write!(f, "node {id} sits on a parent cycle"),
        }
    }
}

impl<P> TreeCollection<P> {
    pub fn stats(&self) -> TreeStats {
        let total_nodes = self.nodes.len();
        let leaf_nodes = self.nodes.values().filter(|n| n.is_leaf()).count();
        let max_depth = self.walk_roots().map(|(_, level)| level).max().unwrap_or(0);
        let average_children_per_node = if total_nodes == 0 {
            0.0
        } else {
            let children: usize = self.nodes.values().map(|n| n.children.len()).sum();
            children as f64 / total_nodes as f64
        };

        TreeStats {
            total_nodes,
            root_nodes: self.roots.len(),
            leaf_nodes,
            orphan_nodes: self.orphans.len(),
            max_depth,
            average_children_per_node,
        }
    }

    /// Read-only consistency check. Never fails; findings come back as data,
    /// ordered by node id.
    pub fn validate_integrity(&self) -> Vec<IntegrityIssue> {
        let mut ids: Vec<ObjectId> = self.nodes.keys().copied().collect();
        ids.sort_unstable();

        let mut issues = Vec::new();
        for id in ids {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };

            match (node.parent_id, node.parent) {
                (Some(parent_id), None) => {
                    if self.nodes.contains_key(&parent_id) {
                        issues.push(IntegrityIssue::MissingParentLink { id, parent_id });
                    } else {
                        issues.push(IntegrityIssue::UnresolvedParent { id, parent_id });
                    }
                }
                (declared, Some(linked)) if declared != Some(linked) => {
                    issues.push(IntegrityIssue::ParentMismatch {
                        id,
                        parent_id: declared,
                        linked_parent: linked,
                    });
                }
                _ => {}
            }

            if let Some(linked) = node.parent {
                match self.nodes.get(&linked) {
                    None => issues.push(IntegrityIssue::DanglingParent {
                        id,
                        linked_parent: linked,
                    }),
                    Some(parent) if !parent.children.contains(&id) => {
                        issues.push(IntegrityIssue::NotInParentChildren { id, parent: linked });
                    }
                    Some(_) => {}
                }
            }

            for &child in &node.children {
                match self.nodes.get(&child) {
                    None => issues.push(IntegrityIssue::DanglingChild { parent: id, child }),
                    Some(c) if c.parent != Some(id) => {
                        issues.push(IntegrityIssue::ChildLinkMismatch {
                            parent: id,
                            child,
                            child_parent: c.parent,
                        });
                    }
                    Some(_) => {}
                }
            }

            if self.ancestors(id).any(|step| step.is_err()) {
                issues.push(IntegrityIssue::OnCycle { id });
            }
        }
        issues
    }

    /// Depth-first `(node, level)` pairs from every root, followed by every
    /// orphan subtree at [`ORPHAN_LEVEL`] since its real depth is unknown.
    /// [`level`](Self::level) still reports hops within the loaded chain for
    /// those nodes.
    pub fn flattened_with_levels(&self) -> Vec<(&TreeNode<P>, i64)> {
        let mut out: Vec<(&TreeNode<P>, i64)> = self
            .walk_roots()
            .map(|(node, level)| (node, level as i64))
            .collect();

        for orphan in self.orphans() {
            out.push((orphan, ORPHAN_LEVEL));
            for item in DepthFirst::new(self, orphan.id) {
                match item {
                    Ok((node, _)) => out.push((node, ORPHAN_LEVEL)),
                    Err(err) => {
                        warn!(orphan = orphan.id, error = %err, "stopping walk below orphan");
                        break;
                    }
                }
            }
        }
        out
    }
}
