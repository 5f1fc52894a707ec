//! Tests for tree assembly, traversal and diagnostics.

use proptest::prelude::*;

use super::*;

// ============================================================================
// Helper builders
// ============================================================================

fn root(id: ObjectId) -> TreeNode<&'static str> {
    TreeNode::root(id, "")
}

fn child(id: ObjectId, parent: ObjectId) -> TreeNode<&'static str> {
    TreeNode::child(id, parent, "")
}

fn ids<'a, P: 'a>(nodes: impl IntoIterator<Item = &'a TreeNode<P>>) -> Vec<ObjectId> {
    nodes.into_iter().map(|n| n.id()).collect()
}

/// 1 ─┬─ 2 ─── 4
///    └─ 3
fn small_tree() -> TreeCollection<&'static str> {
    let mut tree = TreeCollection::new();
    tree.add_range([root(1), child(2, 1), child(3, 1), child(4, 2)])
        .unwrap();
    tree
}

/// A ↔ B: 10.parent = 11, 11.parent = 10.
fn two_cycle() -> TreeCollection<&'static str> {
    let mut tree = TreeCollection::new();
    tree.add(child(10, 11)).unwrap();
    tree.add(child(11, 10)).unwrap();
    tree
}

// ============================================================================
// Add / orphan reconciliation
// ============================================================================

#[test]
fn root_then_child_links() {
    let tree = small_tree();
    assert_eq!(tree.root_ids(), &[1]);
    assert_eq!(tree.get(1).unwrap().children(), &[2, 3]);
    assert_eq!(tree.get(4).unwrap().parent(), Some(2));
    assert!(tree.orphan_ids().is_empty());
    assert!(tree.get(1).unwrap().is_root());
    assert!(tree.get(4).unwrap().is_leaf());
}

#[test]
fn insertion_order_is_irrelevant() {
    let mut forward = TreeCollection::new();
    forward.add(root(1)).unwrap();
    forward.add(child(2, 1)).unwrap();

    let mut reverse = TreeCollection::new();
    reverse.add(child(2, 1)).unwrap();
    reverse.add(root(1)).unwrap();

    for tree in [&forward, &reverse] {
        assert_eq!(tree.root_ids(), &[1]);
        assert_eq!(tree.get(1).unwrap().children(), &[2]);
        assert_eq!(tree.get(2).unwrap().parent(), Some(1));
        assert!(tree.orphan_ids().is_empty());
    }
}

#[test]
fn orphan_is_adopted_when_parent_arrives() {
    let mut tree = TreeCollection::new();
    tree.add(child(5, 3)).unwrap();
    assert_eq!(tree.orphan_ids(), &[5]);
    assert!(tree.is_orphan(5));

    tree.add(root(3)).unwrap();
    assert!(tree.orphan_ids().is_empty());
    assert_eq!(tree.get(3).unwrap().children(), &[5]);
    assert_eq!(tree.level(5).unwrap(), 1);
}

#[test]
fn several_orphans_adopted_in_parking_order() {
    let mut tree = TreeCollection::new();
    tree.add(child(7, 1)).unwrap();
    tree.add(child(8, 99)).unwrap();
    tree.add(child(6, 1)).unwrap();
    tree.add(root(1)).unwrap();

    assert_eq!(tree.get(1).unwrap().children(), &[7, 6]);
    assert_eq!(tree.orphan_ids(), &[8]);
}

#[test]
fn orphan_chain_links_below_missing_parent() {
    let mut tree = TreeCollection::new();
    tree.add(child(20, 10)).unwrap();
    tree.add(child(30, 20)).unwrap();
    // 30 hangs under orphan 20; only 20 is an orphan.
    assert_eq!(tree.orphan_ids(), &[20]);
    assert_eq!(tree.get(30).unwrap().parent(), Some(20));

    tree.add(root(10)).unwrap();
    assert!(tree.orphan_ids().is_empty());
    assert_eq!(tree.level(30).unwrap(), 2);
}

#[test]
fn duplicate_id_rejected() {
    let mut tree = small_tree();
    let err = tree.add(root(2)).unwrap_err();
    assert!(matches!(err, AclError::DuplicateId(2)));
    assert_eq!(tree.len(), 4);
}

#[test]
fn self_parent_rejected() {
    let mut tree: TreeCollection<&str> = TreeCollection::new();
    let err = tree.add(child(1, 1)).unwrap_err();
    assert!(matches!(err, AclError::InvalidArgument(_)));
    assert!(tree.is_empty());
}

#[test]
fn add_range_stops_at_first_error() {
    let mut tree = TreeCollection::new();
    let err = tree
        .add_range([root(1), child(2, 1), root(1), child(3, 1)])
        .unwrap_err();
    assert!(matches!(err, AclError::DuplicateId(1)));
    assert_eq!(tree.len(), 2);
    assert!(!tree.contains(3));
}

#[test]
fn cloned_node_links_are_reset_on_add() {
    let tree = small_tree();
    let copy = tree.get(2).unwrap().clone();
    assert_eq!(copy.children(), &[4]);

    let mut other = TreeCollection::new();
    other.add(copy).unwrap();
    assert!(other.get(2).unwrap().children().is_empty());
    assert_eq!(other.orphan_ids(), &[2]);
}

// ============================================================================
// Remove
// ============================================================================

#[test]
fn remove_orphans_children() {
    let mut tree = small_tree();
    assert!(tree.remove(2));

    assert!(!tree.contains(2));
    assert_eq!(tree.get(1).unwrap().children(), &[3]);
    assert_eq!(tree.orphan_ids(), &[4]);
    let orphan = tree.get(4).unwrap();
    assert_eq!(orphan.parent(), None);
    assert_eq!(orphan.parent_id(), Some(2));
}

#[test]
fn remove_root() {
    let mut tree = small_tree();
    assert!(tree.remove(1));
    assert!(tree.root_ids().is_empty());
    assert_eq!(tree.orphan_ids(), &[2, 3]);
    assert_eq!(tree.len(), 3);
}

#[test]
fn remove_missing_is_noop() {
    let mut tree = small_tree();
    assert!(!tree.remove(42));
    assert_eq!(tree.len(), 4);
}

#[test]
fn removed_node_readded_reclaims_children() {
    let mut tree = small_tree();
    let node = tree.take(2).unwrap();
    assert_eq!(tree.orphan_ids(), &[4]);

    tree.add(node).unwrap();
    assert!(tree.orphan_ids().is_empty());
    assert_eq!(tree.get(2).unwrap().children(), &[4]);
    assert_eq!(tree.get(1).unwrap().children(), &[3, 2]);
}

#[test]
fn remove_orphan_drops_it_from_orphans() {
    let mut tree = TreeCollection::new();
    tree.add(child(5, 3)).unwrap();
    assert!(tree.remove(5));
    assert!(tree.orphan_ids().is_empty());
}

#[test]
fn clear_empties_everything() {
    let mut tree = small_tree();
    tree.add(child(9, 100)).unwrap();
    tree.clear();
    assert!(tree.is_empty());
    assert!(tree.root_ids().is_empty());
    assert!(tree.orphan_ids().is_empty());
}

// ============================================================================
// Lookup helpers
// ============================================================================

#[test]
fn parent_children_and_siblings() {
    let mut tree = small_tree();
    tree.add(root(50)).unwrap();
    tree.add(child(60, 77)).unwrap();
    tree.add(child(61, 77)).unwrap();

    assert_eq!(tree.parent_of(4).map(|n| n.id()), Some(2));
    assert!(tree.parent_of(1).is_none());
    assert_eq!(ids(tree.children_of(1)), vec![2, 3]);
    assert!(tree.children_of(404).next().is_none());

    assert_eq!(ids(tree.siblings_of(2)), vec![3]);
    assert_eq!(ids(tree.siblings_of(1)), vec![50]);
    assert_eq!(ids(tree.siblings_of(60)), vec![61]);
    assert!(tree.siblings_of(404).is_empty());
}

#[test]
fn leaves_and_find() {
    let mut tree = TreeCollection::new();
    tree.add(TreeNode::root(1, "folder")).unwrap();
    tree.add(TreeNode::child(2, 1, "doc")).unwrap();
    tree.add(TreeNode::child(3, 1, "doc")).unwrap();

    assert_eq!(ids(tree.leaves()), vec![2, 3]);
    assert_eq!(ids(tree.find(|p| *p == "doc")), vec![2, 3]);
    *tree.get_mut(3).unwrap() = "image";
    assert_eq!(ids(tree.find(|p| *p == "doc")), vec![2]);
}

// ============================================================================
// Traversal
// ============================================================================

#[test]
fn levels_follow_parent_hops() {
    let tree = small_tree();
    assert_eq!(tree.level(1).unwrap(), 0);
    assert_eq!(tree.level(2).unwrap(), 1);
    assert_eq!(tree.level(4).unwrap(), 2);
    assert!(matches!(tree.level(404), Err(AclError::NodeNotFound(404))));
}

#[test]
fn ancestors_walk_to_root() {
    let tree = small_tree();
    let chain: Vec<ObjectId> = tree.ancestors(4).map(|r| r.unwrap().id()).collect();
    assert_eq!(chain, vec![2, 1]);
    assert!(tree.ancestors(1).next().is_none());
    assert_eq!(tree.ancestor_path(4).unwrap(), vec![4, 2, 1]);
    assert_eq!(ids(tree.path_from_root(4).unwrap()), vec![1, 2, 4]);
}

#[test]
fn descendants_are_depth_first_and_restartable() {
    let tree = small_tree();
    let first: Vec<ObjectId> = tree.descendants(1).map(|r| r.unwrap().id()).collect();
    let second: Vec<ObjectId> = tree.descendants(1).map(|r| r.unwrap().id()).collect();
    assert_eq!(first, vec![2, 4, 3]);
    assert_eq!(first, second);
    assert_eq!(ids(tree.subtree(2).unwrap()), vec![2, 4]);
    assert!(tree.descendants(4).next().is_none());
}

#[test]
fn nodes_at_level() {
    let tree = small_tree();
    assert_eq!(ids(tree.nodes_at_level(0)), vec![1]);
    assert_eq!(ids(tree.nodes_at_level(1)), vec![2, 3]);
    assert_eq!(ids(tree.nodes_at_level(2)), vec![4]);
    assert!(tree.nodes_at_level(3).is_empty());
}

// ============================================================================
// Cycle guard
// ============================================================================

#[test]
fn two_node_cycle_fails_level_and_ancestors() {
    let tree = two_cycle();
    // Neither node is a root or an orphan: they adopted each other.
    assert!(tree.root_ids().is_empty());
    assert!(tree.orphan_ids().is_empty());

    let err = tree.level(10).unwrap_err();
    assert!(matches!(err, AclError::CycleDetected { id: 10 }));

    let steps: Vec<_> = tree.ancestors(11).collect();
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].as_ref().unwrap().id(), 10);
    assert!(steps[1].as_ref().unwrap_err().is_cycle());

    assert!(tree.ancestor_path(10).unwrap_err().is_cycle());
}

#[test]
fn cycle_guard_on_descendants() {
    let tree = two_cycle();
    let items: Vec<_> = tree.descendants(10).collect();
    assert_eq!(items.len(), 2);
    assert!(items[0].is_ok());
    assert!(items[1].as_ref().unwrap_err().is_cycle());
}

#[test]
fn depth_bound_treated_as_cycle() {
    let mut tree = TreeCollection::with_max_depth(3);
    tree.add_range([root(1), child(2, 1), child(3, 2), child(4, 3), child(5, 4)])
        .unwrap();
    assert_eq!(tree.level(4).unwrap(), 3);
    assert!(tree.level(5).unwrap_err().is_cycle());
    assert!(tree.descendants(1).any(|r| r.is_err()));
}

#[test]
fn cycle_excluded_from_stats_and_flattening() {
    let mut tree = two_cycle();
    tree.add(root(1)).unwrap();
    let stats = tree.stats();
    assert_eq!(stats.total_nodes, 3);
    assert_eq!(stats.root_nodes, 1);
    assert_eq!(stats.max_depth, 0);

    let flat: Vec<ObjectId> = tree
        .flattened_with_levels()
        .into_iter()
        .map(|(n, _)| n.id())
        .collect();
    assert_eq!(flat, vec![1]);
}

// ============================================================================
// Stats / flattening / integrity
// ============================================================================

#[test]
fn stats_of_small_tree() {
    let mut tree = small_tree();
    tree.add(child(9, 100)).unwrap();
    let stats = tree.stats();
    assert_eq!(stats.total_nodes, 5);
    assert_eq!(stats.root_nodes, 1);
    assert_eq!(stats.leaf_nodes, 3);
    assert_eq!(stats.orphan_nodes, 1);
    assert_eq!(stats.max_depth, 2);
    assert!((stats.average_children_per_node - 3.0 / 5.0).abs() < f64::EPSILON);
}

#[test]
fn stats_of_empty_tree() {
    let tree: TreeCollection<()> = TreeCollection::new();
    let stats = tree.stats();
    assert_eq!(stats.total_nodes, 0);
    assert_eq!(stats.max_depth, 0);
    assert_eq!(stats.average_children_per_node, 0.0);
}

#[test]
fn flattened_lists_roots_then_orphans() {
    let mut tree = small_tree();
    tree.add(child(20, 99)).unwrap();
    tree.add(child(21, 20)).unwrap();

    let flat: Vec<(ObjectId, i64)> = tree
        .flattened_with_levels()
        .into_iter()
        .map(|(n, level)| (n.id(), level))
        .collect();
    assert_eq!(
        flat,
        vec![(1, 0), (2, 1), (4, 2), (3, 1), (20, ORPHAN_LEVEL), (21, ORPHAN_LEVEL)]
    );
}

#[test]
fn orphan_level_counts_loaded_hops_only() {
    let mut tree = small_tree();
    tree.add(child(20, 99)).unwrap();
    tree.add(child(21, 20)).unwrap();

    assert_eq!(tree.level(20).unwrap(), 0);
    assert_eq!(tree.level(21).unwrap(), 1);
    let tagged: Vec<i64> = tree
        .flattened_with_levels()
        .into_iter()
        .filter(|(n, _)| n.id() >= 20)
        .map(|(_, level)| level)
        .collect();
    assert_eq!(tagged, vec![ORPHAN_LEVEL, ORPHAN_LEVEL]);
}

#[test]
fn clean_tree_has_no_issues() {
    assert!(small_tree().validate_integrity().is_empty());
}

#[test]
fn integrity_reports_orphans_and_cycles() {
    let mut tree = two_cycle();
    tree.add(child(5, 3)).unwrap();
    let issues = tree.validate_integrity();
    assert_eq!(
        issues,
        vec![
            IntegrityIssue::UnresolvedParent { id: 5, parent_id: 3 },
            IntegrityIssue::OnCycle { id: 10 },
            IntegrityIssue::OnCycle { id: 11 },
        ]
    );
}

#[test]
fn integrity_reports_broken_links() {
    let mut tree = small_tree();
    // Corrupt links directly; the public API cannot produce these.
    tree.nodes.get_mut(&1).unwrap().children.retain(|c| *c != 3);
    tree.nodes.get_mut(&2).unwrap().children.push(77);
    tree.nodes.get_mut(&4).unwrap().parent = None;

    let issues = tree.validate_integrity();
    assert!(issues.contains(&IntegrityIssue::NotInParentChildren { id: 3, parent: 1 }));
    assert!(issues.contains(&IntegrityIssue::DanglingChild { parent: 2, child: 77 }));
    assert!(issues.contains(&IntegrityIssue::MissingParentLink { id: 4, parent_id: 2 }));
    assert!(issues.contains(&IntegrityIssue::ChildLinkMismatch {
        parent: 2,
        child: 4,
        child_parent: None,
    }));
}

#[test]
fn integrity_reports_parent_mismatch() {
    let mut tree = small_tree();
    tree.nodes.get_mut(&3).unwrap().parent = Some(2);
    let issues = tree.validate_integrity();
    assert!(issues.contains(&IntegrityIssue::ParentMismatch {
        id: 3,
        parent_id: Some(1),
        linked_parent: 2,
    }));
    assert!(issues.contains(&IntegrityIssue::NotInParentChildren { id: 3, parent: 2 }));
}

#[test]
fn integrity_issue_display() {
    let issue = IntegrityIssue::UnresolvedParent { id: 5, parent_id: 3 };
    assert_eq!(issue.to_string(), "node 5 references parent 3 which is not loaded");
}

// ============================================================================
// Property tests
// ============================================================================

/// Random forest: node i (1-based) picks a parent among 1..i or none.
fn forest_strategy() -> impl Strategy<Value = Vec<(ObjectId, Option<ObjectId>)>> {
    (1usize..40).prop_flat_map(|n| {
        let parents: Vec<_> = (0..n)
            .map(|i| {
                if i == 0 {
                    Just(None).boxed()
                } else {
                    prop_oneof![Just(None), (1..=i as ObjectId).prop_map(Some)].boxed()
                }
            })
            .collect();
        parents.prop_map(|ps| {
            ps.into_iter()
                .enumerate()
                .map(|(i, p)| (i as ObjectId + 1, p))
                .collect::<Vec<_>>()
        })
    })
}

fn build(rows: &[(ObjectId, Option<ObjectId>)]) -> TreeCollection<()> {
    let mut tree = TreeCollection::new();
    tree.add_range(rows.iter().map(|(id, p)| TreeNode::new(*id, *p, ())))
        .unwrap();
    tree
}

fn sorted_children(tree: &TreeCollection<()>, id: ObjectId) -> Vec<ObjectId> {
    let mut children = tree.get(id).unwrap().children().to_vec();
    children.sort_unstable();
    children
}

proptest! {
    #[test]
    fn level_is_parent_level_plus_one(rows in forest_strategy()) {
        let tree = build(&rows);
        for node in tree.nodes() {
            let level = tree.level(node.id()).unwrap();
            match node.parent() {
                None => prop_assert_eq!(level, 0),
                Some(parent) => prop_assert_eq!(level, tree.level(parent).unwrap() + 1),
            }
        }
    }

    #[test]
    fn any_insertion_order_builds_same_tree(
        rows in forest_strategy(),
        seed in any::<u64>(),
    ) {
        let forward = build(&rows);

        let mut shuffled = rows.clone();
        // Deterministic Fisher-Yates driven by the seed.
        let mut state = seed | 1;
        for i in (1..shuffled.len()).rev() {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let j = (state % (i as u64 + 1)) as usize;
            shuffled.swap(i, j);
        }
        let shuffled_tree = build(&shuffled);

        prop_assert!(shuffled_tree.orphan_ids().is_empty());
        let mut forward_roots = forward.root_ids().to_vec();
        let mut shuffled_roots = shuffled_tree.root_ids().to_vec();
        forward_roots.sort_unstable();
        shuffled_roots.sort_unstable();
        prop_assert_eq!(forward_roots, shuffled_roots);
        for (id, _) in &rows {
            prop_assert_eq!(sorted_children(&forward, *id), sorted_children(&shuffled_tree, *id));
        }
        prop_assert!(shuffled_tree.validate_integrity().is_empty());
    }

    #[test]
    fn flattening_covers_every_node_once(rows in forest_strategy()) {
        let tree = build(&rows);
        let mut seen: Vec<ObjectId> = tree
            .flattened_with_levels()
            .into_iter()
            .map(|(n, _)| n.id())
            .collect();
        seen.sort_unstable();
        let mut expected: Vec<ObjectId> = rows.iter().map(|(id, _)| *id).collect();
        expected.sort_unstable();
        prop_assert_eq!(seen, expected);
    }
}
