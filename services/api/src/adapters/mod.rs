pub mod db;
pub mod fs_assets;
pub mod memory;

pub use db::DbAdapter;
pub use fs_assets::FsAssetStore;
pub use memory::MemoryDocumentStore;
