use thiserror::Error;

use crate::node::TabItemId;

/// Errors reported by tab-hierarchy operations. A failed call leaves the registry untouched.
/// 分頁階層操作的錯誤；失敗的呼叫不會改變登錄表。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TabTreeError {
    #[error("tab item {0} is not registered")]
    InvalidReference(TabItemId),
    #[error("attaching {child} under {parent} would create a cycle")]
    CycleDetected { parent: TabItemId, child: TabItemId },
    #[error("tab item {child} is already attached to {parent}")]
    AlreadyAttached { child: TabItemId, parent: TabItemId },
    #[error("tab item {0} has no parent")]
    NotAttached(TabItemId),
    #[error("ordered ids do not match the children of {0}")]
    SetMismatch(TabItemId),
    #[error("index {index} is out of range for {parent} with {len} children")]
    IndexOutOfRange {
        parent: TabItemId,
        index: usize,
        len: usize,
    },
    #[error("malformed tab tree: {0}")]
    MalformedTree(String),
}
