use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::error::TabTreeError;
use crate::node::{TabCategory, TabItemId, TabItemNode, TabReference};

/// Arena owning every tab item, keyed by id.
/// 以識別碼為索引、持有所有分頁項目的登錄表。
///
/// The registry is the only writer of `children`/`parent`. Every mutating call
/// validates first and then applies, so an `Err` leaves the registry unchanged.
/// Mutations need `&mut self`; hosts sharing a registry across threads wrap it
/// in a single lock.
///
/// Ids removed by [`TabRegistry::delete_subtree`] or replaced by
/// [`TabRegistry::change_category`] are remembered as retired and are never
/// admitted again, not even through [`TabRegistry::decode`].
#[derive(Debug, Clone, Default)]
pub struct TabRegistry {
    pub(crate) nodes: HashMap<TabItemId, TabItemNode>,
    pub(crate) roots: Vec<TabItemId>,
    pub(crate) retired: HashSet<TabItemId>,
}

impl TabRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered nodes.
    /// 已登錄的節點數量。
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: TabItemId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Returns `true` when `id` was deleted or replaced and may not be registered again.
    /// 若 `id` 已被刪除或取代、不得再次登錄則回傳 `true`。
    pub fn is_retired(&self, id: TabItemId) -> bool {
        self.retired.contains(&id)
    }

    pub fn retired(&self) -> impl Iterator<Item = TabItemId> + '_ {
        self.retired.iter().copied()
    }

    /// Marks ids as retired without touching live nodes; used when restoring a snapshot.
    pub(crate) fn retire(&mut self, ids: impl IntoIterator<Item = TabItemId>) {
        self.retired.extend(ids);
    }

    /// Current root nodes in creation/detach order.
    /// 目前的根節點，依建立或分離的先後排序。
    pub fn roots(&self) -> &[TabItemId] {
        &self.roots
    }

    /// Read-only access to a node.
    /// 唯讀取得節點。
    pub fn lookup(&self, id: TabItemId) -> Option<&TabItemNode> {
        self.nodes.get(&id)
    }

    /// Creates a childless root node with a fresh id.
    /// 建立一個沒有子節點、擁有新識別碼的根節點。
    pub fn create_node(
        &mut self,
        tab_reference: impl Into<TabReference>,
        category: TabCategory,
    ) -> TabItemId {
        let id = TabItemId::new();
        let node = TabItemNode::new(id, tab_reference.into(), category);
        debug!(%id, tab = %node.tab_reference, %category, "created tab item");
        self.nodes.insert(id, node);
        self.roots.push(id);
        id
    }

    /// Inserts the root `child_id` into `parent_id`'s children (default: at the end).
    /// 將根節點 `child_id` 插入 `parent_id` 的子節點列表（預設附加至末端）。
    ///
    /// A child that already has a parent must be detached first; use
    /// [`TabRegistry::reparent`] for an explicit move.
    pub fn attach_child(
        &mut self,
        parent_id: TabItemId,
        child_id: TabItemId,
        index: Option<usize>,
    ) -> Result<(), TabTreeError> {
        let parent = self.node(parent_id)?;
        let child = self.node(child_id)?;
        if self.is_ancestor(child_id, parent_id) {
            return Err(TabTreeError::CycleDetected {
                parent: parent_id,
                child: child_id,
            });
        }
        if let Some(existing) = child.parent {
            return Err(TabTreeError::AlreadyAttached {
                child: child_id,
                parent: existing,
            });
        }
        let index = checked_index(parent_id, index, parent.children.len())?;

        self.unlink(child_id);
        self.link(parent_id, child_id, index);
        debug!(parent = %parent_id, child = %child_id, index, "attached tab item");
        Ok(())
    }

    /// Removes a node from its parent, turning it into a new root.
    /// 將節點自父節點移除，使其成為新的根節點。
    pub fn detach_child(&mut self, child_id: TabItemId) -> Result<(), TabTreeError> {
        let child = self.node(child_id)?;
        let Some(parent_id) = child.parent else {
            return Err(TabTreeError::NotAttached(child_id));
        };
        self.unlink(child_id);
        self.roots.push(child_id);
        debug!(parent = %parent_id, child = %child_id, "detached tab item");
        Ok(())
    }

    /// Moves a node under `new_parent`, detaching it from its current parent first.
    /// 將節點移至 `new_parent` 之下，必要時先自原父節點分離。
    ///
    /// `index` refers to `new_parent`'s children after the node has been removed
    /// from its old position.
    pub fn reparent(
        &mut self,
        child_id: TabItemId,
        new_parent: TabItemId,
        index: Option<usize>,
    ) -> Result<(), TabTreeError> {
        let parent = self.node(new_parent)?;
        let child = self.node(child_id)?;
        if self.is_ancestor(child_id, new_parent) {
            return Err(TabTreeError::CycleDetected {
                parent: new_parent,
                child: child_id,
            });
        }
        let mut len = parent.children.len();
        if child.parent == Some(new_parent) {
            len -= 1;
        }
        let index = checked_index(new_parent, index, len)?;

        self.unlink(child_id);
        self.link(new_parent, child_id, index);
        debug!(parent = %new_parent, child = %child_id, index, "reparented tab item");
        Ok(())
    }

    /// Removes a node and all of its descendants, returning the removed ids in pre-order.
    /// 刪除節點及其所有子孫，並以前序回傳被刪除的識別碼。
    pub fn delete_subtree(&mut self, id: TabItemId) -> Result<Vec<TabItemId>, TabTreeError> {
        let removed = self.subtree(id)?;
        self.unlink(id);
        for node_id in &removed {
            self.nodes.remove(node_id);
        }
        self.retired.extend(removed.iter().copied());
        debug!(%id, removed = removed.len(), "deleted tab subtree");
        Ok(removed)
    }

    /// Replaces the order of `parent_id`'s children. The new order must be a permutation.
    /// 重新排列 `parent_id` 的子節點；新順序必須恰為原子節點集合的排列。
    pub fn reorder_children(
        &mut self,
        parent_id: TabItemId,
        ordered: &[TabItemId],
    ) -> Result<(), TabTreeError> {
        let parent = self.node(parent_id)?;
        let current: HashSet<TabItemId> = parent.children.iter().copied().collect();
        let requested: HashSet<TabItemId> = ordered.iter().copied().collect();
        if requested.len() != ordered.len() || requested != current {
            return Err(TabTreeError::SetMismatch(parent_id));
        }
        if let Some(parent) = self.nodes.get_mut(&parent_id) {
            parent.children = ordered.to_vec();
        }
        debug!(parent = %parent_id, "reordered tab children");
        Ok(())
    }

    /// Promotes or demotes a node to `category`.
    /// 變更節點分類（升級或降級）。
    ///
    /// A category change is a new identity: the node is re-created with a fresh
    /// id in the same position, keeps its children, and the old id is retired.
    pub fn change_category(
        &mut self,
        id: TabItemId,
        category: TabCategory,
    ) -> Result<TabItemId, TabTreeError> {
        let old = self
            .nodes
            .remove(&id)
            .ok_or(TabTreeError::InvalidReference(id))?;
        let new_id = TabItemId::new();

        let mut node = TabItemNode::new(new_id, old.tab_reference, category);
        node.children = old.children;
        node.parent = old.parent;
        for child_id in &node.children {
            if let Some(child) = self.nodes.get_mut(child_id) {
                child.parent = Some(new_id);
            }
        }
        let slots = match old.parent {
            Some(parent_id) => self
                .nodes
                .get_mut(&parent_id)
                .map(|parent| &mut parent.children),
            None => Some(&mut self.roots),
        };
        if let Some(slot) = slots.and_then(|ids| ids.iter_mut().find(|slot| **slot == id)) {
            *slot = new_id;
        }
        self.nodes.insert(new_id, node);
        self.retired.insert(id);
        debug!(old = %id, new = %new_id, %category, "re-created tab item with new category");
        Ok(new_id)
    }

    /// Parent chain from the nearest parent up to the root.
    /// 由最近的父節點一路到根節點的祖先鏈。
    pub fn ancestors(&self, id: TabItemId) -> Result<Vec<TabItemId>, TabTreeError> {
        let mut chain = Vec::new();
        let mut current = self.node(id)?.parent;
        while let Some(parent_id) = current {
            chain.push(parent_id);
            current = self.nodes.get(&parent_id).and_then(|node| node.parent);
        }
        Ok(chain)
    }

    /// Returns `true` when `ancestor` is `node` itself or lies on its parent chain.
    /// 若 `ancestor` 即為 `node` 本身或位於其祖先鏈上則回傳 `true`。
    pub fn is_ancestor(&self, ancestor: TabItemId, node: TabItemId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(&id).and_then(|node| node.parent);
        }
        false
    }

    pub(crate) fn node(&self, id: TabItemId) -> Result<&TabItemNode, TabTreeError> {
        self.nodes.get(&id).ok_or(TabTreeError::InvalidReference(id))
    }

    /// Removes `id` from its parent's children (or from the root list) and clears its parent.
    fn unlink(&mut self, id: TabItemId) {
        let parent = self.nodes.get_mut(&id).and_then(|node| node.parent.take());
        match parent {
            Some(parent_id) => {
                if let Some(parent) = self.nodes.get_mut(&parent_id) {
                    parent.children.retain(|child| *child != id);
                }
            }
            None => self.roots.retain(|root| *root != id),
        }
    }

    fn link(&mut self, parent_id: TabItemId, child_id: TabItemId, index: usize) {
        if let Some(parent) = self.nodes.get_mut(&parent_id) {
            parent.children.insert(index, child_id);
        }
        if let Some(child) = self.nodes.get_mut(&child_id) {
            child.parent = Some(parent_id);
        }
    }
}

fn checked_index(
    parent: TabItemId,
    index: Option<usize>,
    len: usize,
) -> Result<usize, TabTreeError> {
    match index {
        None => Ok(len),
        Some(index) if index <= len => Ok(index),
        Some(index) => Err(TabTreeError::IndexOutOfRange { parent, index, len }),
    }
}
