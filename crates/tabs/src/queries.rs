//! Aggregate queries over the live registry. Nothing here is cached.
//! 對目前登錄表的彙總查詢，結果不做快取。

use crate::error::TabTreeError;
use crate::node::TabItemId;
use crate::registry::TabRegistry;

impl TabRegistry {
    /// Number of nodes in the subtree rooted at `id`, the root included.
    /// 以 `id` 為根的子樹節點數（含根節點）。
    pub fn item_count(&self, id: TabItemId) -> Result<usize, TabTreeError> {
        let mut count = 0;
        let mut stack = vec![self.node(id)?];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter().filter_map(|child| self.nodes.get(child)));
        }
        Ok(count)
    }

    /// Descendants of `id` in pre-order, left to right. The root itself is excluded.
    /// 以前序、由左至右列出 `id` 的子孫，不含根節點本身。
    pub fn flatten(&self, id: TabItemId) -> Result<Vec<TabItemId>, TabTreeError> {
        let mut flat = self.subtree(id)?;
        flat.remove(0);
        Ok(flat)
    }

    /// Sum of [`item_count`](Self::item_count) over several independent roots.
    /// 多個獨立根節點的 [`item_count`](Self::item_count) 總和。
    pub fn total_tabs(&self, roots: &[TabItemId]) -> Result<usize, TabTreeError> {
        roots.iter().try_fold(0, |total, root| {
            self.item_count(*root).map(|count| total + count)
        })
    }

    /// Pre-order walk of the subtree including `id`.
    pub(crate) fn subtree(&self, id: TabItemId) -> Result<Vec<TabItemId>, TabTreeError> {
        let mut order = Vec::new();
        let mut stack = vec![self.node(id)?];
        while let Some(node) = stack.pop() {
            order.push(node.id);
            stack.extend(
                node.children
                    .iter()
                    .rev()
                    .filter_map(|child| self.nodes.get(child)),
            );
        }
        Ok(order)
    }
}
