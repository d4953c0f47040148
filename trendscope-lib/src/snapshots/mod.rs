//! Snapshot addressing, durable archival, and per-technology history.

mod archive;
mod history;
mod resource_uri;
mod store;

pub use archive::SnapshotArchive;
pub use history::{HistoryPoint, TechnologyHistory};
pub use resource_uri::ResourceUri;
pub use store::SnapshotStore;
