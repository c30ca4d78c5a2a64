use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identity of a tab item. Ids are never reused once a node is deleted.
/// 分頁項目的穩定識別碼；節點刪除後不會再被重複使用。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabItemId(Uuid);

impl TabItemId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for TabItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for TabItemId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Opaque token naming the document or view a tab item stands for.
/// 代表分頁所指向文件或檢視的不透明標記。
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabReference(String);

impl TabReference {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TabReference {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TabReference {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for TabReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle class of a tab item.
/// 分頁項目的生命週期分類。
///
/// Persisted as a snake_case string. Unrecognised strings load as
/// [`TabCategory::Unknown`] so that imports from other producers stay readable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum TabCategory {
    SavedTabs,
    OpenTabs,
    #[default]
    Unknown,
}

impl TabCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TabCategory::SavedTabs => "saved_tabs",
            TabCategory::OpenTabs => "open_tabs",
            TabCategory::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TabCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TabCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "saved_tabs" => Ok(TabCategory::SavedTabs),
            "open_tabs" => Ok(TabCategory::OpenTabs),
            "unknown" => Ok(TabCategory::Unknown),
            other => Err(format!("unknown tab category '{other}'")),
        }
    }
}

impl From<String> for TabCategory {
    fn from(value: String) -> Self {
        value.parse().unwrap_or(TabCategory::Unknown)
    }
}

impl From<TabCategory> for String {
    fn from(value: TabCategory) -> Self {
        value.as_str().to_string()
    }
}

/// A single entry in the tab hierarchy.
/// 分頁階層中的單一節點。
///
/// `children` and `parent` are maintained exclusively by
/// [`TabRegistry`](crate::TabRegistry); callers only read them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabItemNode {
    pub(crate) id: TabItemId,
    pub(crate) tab_reference: TabReference,
    pub(crate) category: TabCategory,
    pub(crate) children: Vec<TabItemId>,
    pub(crate) parent: Option<TabItemId>,
}

impl TabItemNode {
    pub(crate) fn new(id: TabItemId, tab_reference: TabReference, category: TabCategory) -> Self {
        Self {
            id,
            tab_reference,
            category,
            children: Vec::new(),
            parent: None,
        }
    }

    pub fn id(&self) -> TabItemId {
        self.id
    }

    pub fn tab_reference(&self) -> &TabReference {
        &self.tab_reference
    }

    pub fn category(&self) -> TabCategory {
        self.category
    }

    /// Child ids in display order.
    /// 依顯示順序排列的子節點識別碼。
    pub fn children(&self) -> &[TabItemId] {
        &self.children
    }

    /// Non-owning back-reference to the parent, `None` for roots.
    /// 指向父節點的非擁有參考；根節點為 `None`。
    pub fn parent(&self) -> Option<TabItemId> {
        self.parent
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}
