use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::codec::SerializedTabItem;
use crate::error::TabTreeError;
use crate::node::TabItemId;
use crate::registry::TabRegistry;

/// Current snapshot format version.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Persisted tab state: every independent group (saved groups and open-tab trees).
/// 持久化的分頁狀態：包含所有獨立群組（已儲存群組與開啟中的分頁樹）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabSnapshot {
    pub format_version: u32,
    #[serde(default)]
    pub metadata: SnapshotMetadata,
    #[serde(default)]
    pub groups: Vec<SerializedTabItem>,
    /// Ids deleted or replaced before the snapshot was taken.
    /// 快照建立前已被刪除或取代的識別碼。
    #[serde(default)]
    pub retired: Vec<TabItemId>,
}

impl TabSnapshot {
    /// Creates a snapshot with the current format version.
    /// 建立採用最新格式版本的快照。
    pub fn new(groups: Vec<SerializedTabItem>) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            metadata: SnapshotMetadata::default(),
            groups,
            retired: Vec::new(),
        }
    }

    /// Encodes the given roots, in order, into a snapshot.
    /// 依序將指定的根節點編碼為快照。
    pub fn capture(registry: &TabRegistry, roots: &[TabItemId]) -> Result<Self, TabTreeError> {
        let groups = roots
            .iter()
            .map(|root| registry.encode(*root))
            .collect::<Result<Vec<_>, _>>()?;
        let mut snapshot = Self::new(groups);
        snapshot.retired = registry.retired().collect();
        snapshot.retired.sort();
        Ok(snapshot)
    }

    /// Encodes every root currently in the registry.
    /// 將登錄表中目前所有的根節點編碼。
    pub fn capture_all(registry: &TabRegistry) -> Result<Self, TabTreeError> {
        Self::capture(registry, registry.roots())
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of tab items across all groups.
    /// 所有群組的分頁項目總數。
    pub fn total_tabs(&self) -> usize {
        self.groups.iter().map(SerializedTabItem::item_count).sum()
    }

    /// Rebuilds a registry from this snapshot.
    /// 由此快照重建登錄表。
    ///
    /// Each group is decoded on its own. A malformed group never yields a
    /// partial subtree: it is dropped and reported ([`RestorePolicy::SkipMalformed`])
    /// or it aborts the whole restore ([`RestorePolicy::Strict`]).
    ///
    /// Retired ids are restored first, so a group holding a deleted id is
    /// rejected like any other malformed group.
    pub fn restore(&self, policy: RestorePolicy) -> Result<RestoreOutcome, TabTreeError> {
        let mut outcome = RestoreOutcome::default();
        if self.format_version > SNAPSHOT_FORMAT_VERSION {
            warn!(
                version = self.format_version,
                supported = SNAPSHOT_FORMAT_VERSION,
                "restoring snapshot written by a newer format"
            );
            outcome.issues.push(RestoreIssue::new(
                None,
                format!(
                    "snapshot format {} is newer than supported format {}",
                    self.format_version, SNAPSHOT_FORMAT_VERSION
                ),
            ));
        }

        outcome.registry.retire(self.retired.iter().copied());
        for (index, group) in self.groups.iter().enumerate() {
            match outcome.registry.decode(group) {
                Ok(root) => outcome.roots.push(root),
                Err(err) => match policy {
                    RestorePolicy::Strict => return Err(err),
                    RestorePolicy::SkipMalformed => {
                        warn!(group = index, error = %err, "skipping malformed tab group");
                        outcome
                            .issues
                            .push(RestoreIssue::new(Some(index), err.to_string()));
                    }
                },
            }
        }
        Ok(outcome)
    }
}

/// Snapshot-level metadata for diagnostics.
/// 快照層級的中繼資料，用於除錯。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    #[serde(default)]
    pub saved_at_unix: Option<i64>,
    #[serde(default)]
    pub application_version: Option<String>,
}

/// How [`TabSnapshot::restore`] treats a group that fails to decode.
/// [`TabSnapshot::restore`] 遇到無法解碼的群組時的處理方式。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestorePolicy {
    /// Drop the group and record a [`RestoreIssue`].
    #[default]
    SkipMalformed,
    /// Fail the whole restore.
    Strict,
}

/// A problem met while restoring; `group` is the index of the dropped group, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreIssue {
    pub group: Option<usize>,
    pub message: String,
}

impl RestoreIssue {
    pub fn new(group: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            group,
            message: message.into(),
        }
    }
}

/// Result of a restore: the rebuilt registry, its restored roots in snapshot order, and issues.
#[derive(Debug, Default)]
pub struct RestoreOutcome {
    pub registry: TabRegistry,
    pub roots: Vec<TabItemId>,
    pub issues: Vec<RestoreIssue>,
}

pub(crate) fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::TabCategory;

    #[test]
    fn capture_all_keeps_root_order() {
        let mut registry = TabRegistry::new();
        let saved = registry.create_node("saved", TabCategory::SavedTabs);
        let open = registry.create_node("open", TabCategory::OpenTabs);
        let child = registry.create_node("child", TabCategory::OpenTabs);
        registry.attach_child(open, child, None).unwrap();

        let snapshot = TabSnapshot::capture_all(&registry).unwrap();
        assert_eq!(snapshot.groups.len(), 2);
        assert_eq!(snapshot.groups[0].id, saved);
        assert_eq!(snapshot.groups[1].id, open);
        assert_eq!(snapshot.total_tabs(), 3);

        let outcome = snapshot.restore(RestorePolicy::Strict).unwrap();
        assert_eq!(outcome.roots, vec![saved, open]);
        assert!(outcome.issues.is_empty());
        assert_eq!(outcome.registry.total_tabs(&outcome.roots).unwrap(), 3);
    }

    #[test]
    fn duplicate_group_is_skipped_or_fatal() {
        let mut registry = TabRegistry::new();
        let group = registry.create_node("group", TabCategory::SavedTabs);
        let form = registry.encode(group).unwrap();
        let snapshot = TabSnapshot::new(vec![form.clone(), form]);

        let outcome = snapshot.restore(RestorePolicy::SkipMalformed).unwrap();
        assert_eq!(outcome.roots, vec![group]);
        assert_eq!(outcome.issues.len(), 1);
        assert_eq!(outcome.issues[0].group, Some(1));

        let err = snapshot.restore(RestorePolicy::Strict).unwrap_err();
        assert!(matches!(err, TabTreeError::MalformedTree(_)));
    }

    #[test]
    fn retired_ids_survive_capture_and_restore() {
        let mut registry = TabRegistry::new();
        let group = registry.create_node("group", TabCategory::SavedTabs);
        let child = registry.create_node("child", TabCategory::SavedTabs);
        registry.attach_child(group, child, None).unwrap();
        let stale = registry.encode(group).unwrap();
        registry.delete_subtree(group).unwrap();
        let kept = registry.create_node("kept", TabCategory::OpenTabs);

        let mut snapshot = TabSnapshot::capture_all(&registry).unwrap();
        let mut expected = vec![group, child];
        expected.sort();
        assert_eq!(snapshot.retired, expected);

        let outcome = snapshot.restore(RestorePolicy::Strict).unwrap();
        assert_eq!(outcome.roots, vec![kept]);
        assert!(outcome.registry.is_retired(group));
        assert!(outcome.registry.is_retired(child));

        snapshot.groups.push(stale);
        let outcome = snapshot.restore(RestorePolicy::SkipMalformed).unwrap();
        assert_eq!(outcome.roots, vec![kept]);
        assert_eq!(outcome.issues.len(), 1);
        assert!(outcome.issues[0].message.contains("was deleted"));
        assert!(outcome.registry.lookup(group).is_none());
    }

    #[test]
    fn snapshot_without_retired_field_still_loads() {
        let snapshot: TabSnapshot =
            serde_json::from_str(r#"{ "format_version": 1, "groups": [] }"#).unwrap();
        assert!(snapshot.retired.is_empty());
        assert!(snapshot.is_empty());
    }

    #[test]
    fn newer_format_is_reported() {
        let mut snapshot = TabSnapshot::new(Vec::new());
        snapshot.format_version = SNAPSHOT_FORMAT_VERSION + 1;
        let outcome = snapshot.restore(RestorePolicy::SkipMalformed).unwrap();
        assert_eq!(outcome.issues.len(), 1);
        assert_eq!(outcome.issues[0].group, None);
    }
}
