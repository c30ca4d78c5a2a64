//! Tab hierarchy store: node registry, serialization codec, aggregate queries and snapshots.
//! 分頁階層儲存：節點登錄表、序列化編解碼、彙總查詢與快照持久化。

mod util;

pub mod codec;
pub mod error;
pub mod node;
pub mod queries;
pub mod registry;
pub mod snapshot;
pub mod store;

pub use codec::SerializedTabItem;
pub use error::TabTreeError;
pub use node::{TabCategory, TabItemId, TabItemNode, TabReference};
pub use registry::TabRegistry;
pub use snapshot::{
    RestoreIssue, RestoreOutcome, RestorePolicy, SnapshotMetadata, TabSnapshot,
    SNAPSHOT_FORMAT_VERSION,
};
pub use store::{TabSnapshotStore, TabStoreError};
pub use util::write_atomic;
