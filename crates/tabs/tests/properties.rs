use proptest::prelude::*;
use tabhierarchy_tabs::{
    RestorePolicy, SerializedTabItem, TabCategory, TabItemId, TabRegistry, TabSnapshot,
    TabTreeError,
};

#[derive(Debug, Clone)]
enum Op {
    Create(u8),
    Attach { parent: usize, child: usize, index: Option<usize> },
    Detach(usize),
    Reparent { child: usize, parent: usize },
    Delete(usize),
    Reverse(usize),
    Recategorize(usize, u8),
}

fn category(seed: u8) -> TabCategory {
    match seed % 3 {
        0 => TabCategory::SavedTabs,
        1 => TabCategory::OpenTabs,
        _ => TabCategory::Unknown,
    }
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => any::<u8>().prop_map(Op::Create),
        4 => (any::<usize>(), any::<usize>(), proptest::option::of(0usize..4))
            .prop_map(|(parent, child, index)| Op::Attach { parent, child, index }),
        1 => any::<usize>().prop_map(Op::Detach),
        2 => (any::<usize>(), any::<usize>()).prop_map(|(child, parent)| Op::Reparent { child, parent }),
        1 => any::<usize>().prop_map(Op::Delete),
        1 => any::<usize>().prop_map(Op::Reverse),
        1 => (any::<usize>(), any::<u8>()).prop_map(|(node, seed)| Op::Recategorize(node, seed)),
    ]
}

/// Replays `ops` against a registry; every id ever issued is kept so stale ids get exercised too.
fn build(ops: &[Op]) -> (TabRegistry, Vec<TabItemId>) {
    let mut registry = TabRegistry::new();
    let mut issued = vec![registry.create_node("seed", TabCategory::OpenTabs)];
    for op in ops {
        match op.clone() {
            Op::Create(seed) => {
                let id = registry.create_node(format!("tab-{seed}"), category(seed));
                issued.push(id);
            }
            Op::Attach { parent, child, index } => {
                let _ = registry.attach_child(pick(&issued, parent), pick(&issued, child), index);
            }
            Op::Detach(node) => {
                let _ = registry.detach_child(pick(&issued, node));
            }
            Op::Reparent { child, parent } => {
                let _ = registry.reparent(pick(&issued, child), pick(&issued, parent), None);
            }
            Op::Delete(node) => {
                let _ = registry.delete_subtree(pick(&issued, node));
            }
            Op::Reverse(node) => {
                let id = pick(&issued, node);
                if let Some(children) = registry.lookup(id).map(|n| n.children().to_vec()) {
                    let reversed: Vec<_> = children.into_iter().rev().collect();
                    registry.reorder_children(id, &reversed).unwrap();
                }
            }
            Op::Recategorize(node, seed) => {
                if let Ok(new_id) = registry.change_category(pick(&issued, node), category(seed)) {
                    issued.push(new_id);
                }
            }
        }
    }
    (registry, issued)
}

fn pick(issued: &[TabItemId], index: usize) -> TabItemId {
    issued[index % issued.len()]
}

fn live(registry: &TabRegistry, issued: &[TabItemId]) -> Vec<TabItemId> {
    issued.iter().copied().filter(|id| registry.contains(*id)).collect()
}

proptest! {
    #[test]
    fn item_count_is_one_plus_flatten(ops in proptest::collection::vec(op_strategy(), 0..60)) {
        let (registry, issued) = build(&ops);
        for id in live(&registry, &issued) {
            prop_assert_eq!(
                registry.item_count(id).unwrap(),
                1 + registry.flatten(id).unwrap().len()
            );
        }
    }

    #[test]
    fn structure_stays_a_forest(ops in proptest::collection::vec(op_strategy(), 0..60)) {
        let (registry, issued) = build(&ops);
        let live = live(&registry, &issued);
        prop_assert_eq!(live.len(), registry.len());

        for id in &live {
            let node = registry.lookup(*id).unwrap();
            // never its own ancestor
            prop_assert!(!registry.ancestors(*id).unwrap().contains(id));
            match node.parent() {
                Some(parent) => {
                    let occurrences = registry
                        .lookup(parent)
                        .unwrap()
                        .children()
                        .iter()
                        .filter(|child| *child == id)
                        .count();
                    prop_assert_eq!(occurrences, 1);
                    prop_assert!(!registry.roots().contains(id));
                }
                None => prop_assert!(registry.roots().contains(id)),
            }
            for child in node.children() {
                prop_assert_eq!(registry.lookup(*child).unwrap().parent(), Some(*id));
            }
        }

        let total = registry.total_tabs(registry.roots()).unwrap();
        prop_assert_eq!(total, registry.len());
    }

    #[test]
    fn encode_decode_round_trips(ops in proptest::collection::vec(op_strategy(), 0..60)) {
        let (registry, _) = build(&ops);
        let mut fresh = TabRegistry::new();
        for root in registry.roots() {
            let form = registry.encode(*root).unwrap();
            let restored = fresh.decode(&form).unwrap();
            prop_assert_eq!(restored, *root);
            prop_assert_eq!(fresh.encode(restored).unwrap(), form);
            prop_assert_eq!(fresh.flatten(restored).unwrap(), registry.flatten(*root).unwrap());
        }
        prop_assert_eq!(fresh.len(), registry.len());
        prop_assert_eq!(fresh.roots(), registry.roots());
    }

    #[test]
    fn json_then_decode_round_trips(ops in proptest::collection::vec(op_strategy(), 0..60)) {
        let (registry, _) = build(&ops);
        let mut fresh = TabRegistry::new();
        for root in registry.roots() {
            let form = registry.encode(*root).unwrap();
            let parsed = SerializedTabItem::from_json(&form.to_json().unwrap()).unwrap();
            prop_assert!(parsed == form);
            let restored = fresh.decode(&parsed).unwrap();
            prop_assert!(fresh.encode(restored).unwrap() == form);
        }
        prop_assert_eq!(fresh.roots(), registry.roots());

        let snapshot = TabSnapshot::capture_all(&registry).unwrap();
        let text = serde_json::to_string(&snapshot).unwrap();
        let reloaded: TabSnapshot = serde_json::from_str(&text).unwrap();
        prop_assert!(reloaded == snapshot);
        let outcome = reloaded.restore(RestorePolicy::Strict).unwrap();
        prop_assert_eq!(outcome.roots.as_slice(), registry.roots());
        prop_assert_eq!(outcome.registry.len(), registry.len());
    }

    #[test]
    fn retired_ids_are_never_decoded(ops in proptest::collection::vec(op_strategy(), 0..60)) {
        let (mut registry, issued) = build(&ops);
        let forms: Vec<_> = registry
            .roots()
            .iter()
            .map(|root| registry.encode(*root).unwrap())
            .collect();
        let roots = registry.roots().to_vec();
        for root in roots {
            registry.delete_subtree(root).unwrap();
        }
        prop_assert!(registry.is_empty());
        for id in &issued {
            prop_assert!(registry.is_retired(*id));
        }
        for form in &forms {
            let err = registry.decode(form).unwrap_err();
            prop_assert!(matches!(err, TabTreeError::MalformedTree(_)));
        }
        prop_assert!(registry.is_empty());
    }

    #[test]
    fn failed_mutations_leave_registry_unchanged(
        ops in proptest::collection::vec(op_strategy(), 0..40),
        parent in any::<usize>(),
        child in any::<usize>(),
    ) {
        let (mut registry, issued) = build(&ops);
        let before: Vec<_> = registry
            .roots()
            .iter()
            .map(|root| registry.encode(*root).unwrap())
            .collect();

        let parent = pick(&issued, parent);
        let child = pick(&issued, child);
        if let Err(err) = registry.attach_child(parent, child, None) {
            let expected_kind = matches!(
                err,
                TabTreeError::InvalidReference(_)
                    | TabTreeError::CycleDetected { .. }
                    | TabTreeError::AlreadyAttached { .. }
            );
            prop_assert!(expected_kind);
            let after: Vec<_> = registry
                .roots()
                .iter()
                .map(|root| registry.encode(*root).unwrap())
                .collect();
            prop_assert_eq!(after, before);
        }
    }
}
