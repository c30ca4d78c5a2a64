//! Durable representation of a tab subtree.
//!
//! Only the parent→children edge is written. Parent back-references are
//! rebuilt from nesting on decode, so encoding never follows a cycle.
//!
//! On disk a subtree is a flat pre-order list of records, each carrying its
//! child count. The nesting is fully determined by that order, and the JSON
//! depth stays constant however deep the tree is. Every walk in this module
//! uses an explicit stack.

use std::collections::HashSet;
use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::error::TabTreeError;
use crate::node::{TabCategory, TabItemId, TabItemNode, TabReference};
use crate::registry::TabRegistry;

/// Persisted record for one tab item and its ordered children.
/// 單一分頁項目及其有序子節點的持久化紀錄。
pub struct SerializedTabItem {
    pub id: TabItemId,
    pub tab_reference: TabReference,
    pub category: TabCategory,
    pub children: Vec<SerializedTabItem>,
}

/// One pre-order entry as written to disk.
#[derive(Serialize)]
struct RecordRef<'a> {
    id: TabItemId,
    tab_reference: &'a TabReference,
    category: TabCategory,
    child_count: usize,
}

#[derive(Deserialize)]
struct Record {
    id: TabItemId,
    tab_reference: TabReference,
    category: TabCategory,
    #[serde(default)]
    child_count: usize,
}

impl SerializedTabItem {
    pub fn leaf(id: TabItemId, tab_reference: TabReference, category: TabCategory) -> Self {
        Self {
            id,
            tab_reference,
            category,
            children: Vec::new(),
        }
    }

    /// Visits this item and its descendants in pre-order.
    /// 以前序走訪此項目及其子孫。
    pub fn pre_order(&self) -> impl Iterator<Item = &SerializedTabItem> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let item = stack.pop()?;
            stack.extend(item.children.iter().rev());
            Some(item)
        })
    }

    /// Number of records in this form, the root included.
    pub fn item_count(&self) -> usize {
        self.pre_order().count()
    }

    pub fn to_json(&self) -> Result<String, TabTreeError> {
        serde_json::to_string_pretty(self)
            .map_err(|err| TabTreeError::MalformedTree(err.to_string()))
    }

    /// Parses a form; missing, null or dangling records surface as `MalformedTree`.
    pub fn from_json(text: &str) -> Result<Self, TabTreeError> {
        serde_json::from_str(text).map_err(|err| TabTreeError::MalformedTree(err.to_string()))
    }

    /// Rebuilds the nesting from pre-order entries of `(leaf, child_count)`.
    ///
    /// Entries are folded from the back: each one adopts the `child_count`
    /// subtrees completed right after it. A well-formed list leaves exactly one tree.
    fn assemble<I>(entries: I) -> Result<Self, String>
    where
        I: DoubleEndedIterator<Item = (SerializedTabItem, usize)>,
    {
        let mut built: Vec<SerializedTabItem> = Vec::new();
        for (mut item, child_count) in entries.rev() {
            if child_count > built.len() {
                return Err(format!(
                    "tab item {} lists {child_count} children but only {} records follow",
                    item.id,
                    built.len()
                ));
            }
            let mut children = built.split_off(built.len() - child_count);
            children.reverse();
            item.children = children;
            built.push(item);
        }
        match built.len() {
            1 => built.pop().ok_or_else(|| "empty record list".to_string()),
            0 => Err("empty record list".to_string()),
            roots => Err(format!("record list describes {roots} separate trees")),
        }
    }

    fn shallow_copy(&self) -> (SerializedTabItem, usize) {
        (
            Self::leaf(self.id, self.tab_reference.clone(), self.category),
            self.children.len(),
        )
    }
}

impl Serialize for SerializedTabItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.pre_order().map(|item| RecordRef {
            id: item.id,
            tab_reference: &item.tab_reference,
            category: item.category,
            child_count: item.children.len(),
        }))
    }
}

impl<'de> Deserialize<'de> for SerializedTabItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let records = Vec::<Record>::deserialize(deserializer)?;
        Self::assemble(records.into_iter().map(|record| {
            (
                Self::leaf(record.id, record.tab_reference, record.category),
                record.child_count,
            )
        }))
        .map_err(D::Error::custom)
    }
}

impl Clone for SerializedTabItem {
    fn clone(&self) -> Self {
        let entries: Vec<_> = self.pre_order().map(Self::shallow_copy).collect();
        match Self::assemble(entries.into_iter()) {
            Ok(copy) => copy,
            Err(err) => unreachable!("entries copied from a well-formed tree: {err}"),
        }
    }
}

impl PartialEq for SerializedTabItem {
    fn eq(&self, other: &Self) -> bool {
        let key = |item: &SerializedTabItem| {
            (item.id, item.tab_reference.clone(), item.category, item.children.len())
        };
        self.pre_order().map(key).eq(other.pre_order().map(key))
    }
}

impl Eq for SerializedTabItem {}

impl fmt::Debug for SerializedTabItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.pre_order().map(|item| {
                (
                    item.id,
                    item.tab_reference.as_str(),
                    item.category,
                    item.children.len(),
                )
            }))
            .finish()
    }
}

impl Drop for SerializedTabItem {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut item) = pending.pop() {
            pending.append(&mut item.children);
        }
    }
}

impl TabRegistry {
    /// Captures the subtree rooted at `root` as a standalone record tree.
    /// 將以 `root` 為根的子樹擷取為獨立的紀錄樹。
    pub fn encode(&self, root: TabItemId) -> Result<SerializedTabItem, TabTreeError> {
        let entries = self
            .subtree(root)?
            .into_iter()
            .filter_map(|id| self.nodes.get(&id))
            .map(|node| {
                (
                    SerializedTabItem::leaf(node.id, node.tab_reference.clone(), node.category),
                    node.children.len(),
                )
            })
            .collect::<Vec<_>>();
        SerializedTabItem::assemble(entries.into_iter()).map_err(TabTreeError::MalformedTree)
    }

    /// Materialises `form` as a new root in this registry and returns its id.
    /// 將 `form` 還原為此登錄表中的新根節點並回傳其識別碼。
    ///
    /// The whole form is validated before anything is inserted: an id repeated
    /// inside the form, one already registered here, or one this registry has
    /// deleted fails with `MalformedTree` and leaves the registry unchanged.
    pub fn decode(&mut self, form: &SerializedTabItem) -> Result<TabItemId, TabTreeError> {
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        let mut stack = vec![(form, None)];
        while let Some((item, parent)) = stack.pop() {
            if !seen.insert(item.id) {
                return Err(TabTreeError::MalformedTree(format!(
                    "duplicate tab item id {}",
                    item.id
                )));
            }
            if self.contains(item.id) {
                return Err(TabTreeError::MalformedTree(format!(
                    "tab item id {} is already registered",
                    item.id
                )));
            }
            if self.is_retired(item.id) {
                return Err(TabTreeError::MalformedTree(format!(
                    "tab item id {} was deleted and cannot be restored",
                    item.id
                )));
            }
            order.push((item, parent));
            stack.extend(item.children.iter().rev().map(|child| (child, Some(item.id))));
        }

        // Reversed pre-order inserts every child before its parent.
        for (item, parent) in order.into_iter().rev() {
            let mut node = TabItemNode::new(item.id, item.tab_reference.clone(), item.category);
            node.children = item.children.iter().map(|child| child.id).collect();
            node.parent = parent;
            self.nodes.insert(item.id, node);
        }
        self.roots.push(form.id);
        debug!(root = %form.id, nodes = seen.len(), "decoded tab subtree");
        Ok(form.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(registry: &mut TabRegistry) -> TabItemId {
        let group = registry.create_node("group", TabCategory::SavedTabs);
        let first = registry.create_node("src/main.rs", TabCategory::SavedTabs);
        let second = registry.create_node("src/lib.rs", TabCategory::SavedTabs);
        registry.attach_child(group, first, None).unwrap();
        registry.attach_child(group, second, None).unwrap();
        group
    }

    #[test]
    fn encoded_form_has_no_parent_field() {
        let mut registry = TabRegistry::new();
        let group = sample(&mut registry);
        let json = registry.encode(group).unwrap().to_json().unwrap();
        assert!(!json.contains("parent"));
        assert!(json.contains("\"saved_tabs\""));
        assert!(json.contains("src/lib.rs"));
        assert!(json.contains("\"child_count\": 2"));
    }

    #[test]
    fn json_keeps_nesting_and_order() {
        let mut registry = TabRegistry::new();
        let group = sample(&mut registry);
        let nested = registry.create_node("nested.rs", TabCategory::OpenTabs);
        let first = registry.lookup(group).unwrap().children()[0];
        registry.attach_child(first, nested, None).unwrap();

        let form = registry.encode(group).unwrap();
        let parsed = SerializedTabItem::from_json(&form.to_json().unwrap()).unwrap();
        assert_eq!(parsed, form);
        assert_eq!(parsed.children.len(), 2);
        assert_eq!(parsed.children[0].children[0].id, nested);
        assert_eq!(parsed.item_count(), 4);
    }

    #[test]
    fn decode_restores_back_references() {
        let mut registry = TabRegistry::new();
        let group = sample(&mut registry);
        let form = registry.encode(group).unwrap();

        let mut restored = TabRegistry::new();
        let root = restored.decode(&form).unwrap();
        assert_eq!(root, group);
        let node = restored.lookup(root).unwrap();
        assert!(node.is_root());
        for child in node.children() {
            assert_eq!(restored.lookup(*child).unwrap().parent(), Some(root));
        }
        assert_eq!(restored.roots(), &[root]);
        assert_eq!(restored.encode(root).unwrap(), form);
    }

    #[test]
    fn decode_into_source_registry_is_rejected() {
        let mut registry = TabRegistry::new();
        let group = sample(&mut registry);
        let form = registry.encode(group).unwrap();
        let before = registry.len();

        let err = registry.decode(&form).unwrap_err();
        assert!(matches!(err, TabTreeError::MalformedTree(_)));
        assert_eq!(registry.len(), before);
    }

    #[test]
    fn deleted_ids_cannot_be_decoded_back() {
        let mut registry = TabRegistry::new();
        let group = sample(&mut registry);
        let form = registry.encode(group).unwrap();
        registry.delete_subtree(group).unwrap();

        let err = registry.decode(&form).unwrap_err();
        assert!(matches!(err, TabTreeError::MalformedTree(ref msg) if msg.contains("deleted")));
        assert!(registry.lookup(group).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn null_record_is_malformed() {
        let json = r#"[
            { "id": "7d8f6c3e-1b2a-4c5d-8e9f-0a1b2c3d4e5f", "tab_reference": "group",
              "category": "saved_tabs", "child_count": 1 },
            null
        ]"#;
        let err = SerializedTabItem::from_json(json).unwrap_err();
        assert!(matches!(err, TabTreeError::MalformedTree(_)));
    }

    #[test]
    fn dangling_child_count_is_malformed() {
        let json = r#"[
            { "id": "7d8f6c3e-1b2a-4c5d-8e9f-0a1b2c3d4e5f", "tab_reference": "group",
              "category": "saved_tabs", "child_count": 2 },
            { "id": "0b7c1d2e-3f40-4a5b-8c6d-7e8f90a1b2c3", "tab_reference": "only",
              "category": "saved_tabs" }
        ]"#;
        let err = SerializedTabItem::from_json(json).unwrap_err();
        assert!(matches!(err, TabTreeError::MalformedTree(ref msg) if msg.contains("lists 2 children")));
    }

    #[test]
    fn trailing_records_are_malformed() {
        let json = r#"[
            { "id": "7d8f6c3e-1b2a-4c5d-8e9f-0a1b2c3d4e5f", "tab_reference": "one",
              "category": "open_tabs", "child_count": 0 },
            { "id": "0b7c1d2e-3f40-4a5b-8c6d-7e8f90a1b2c3", "tab_reference": "two",
              "category": "open_tabs", "child_count": 0 }
        ]"#;
        assert!(SerializedTabItem::from_json(json).is_err());
        assert!(SerializedTabItem::from_json("[]").is_err());
    }
}
