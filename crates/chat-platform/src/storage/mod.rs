pub mod memory;
pub mod local;
pub mod auto;
pub mod events;

pub use memory::MemoryStorage;
pub use local::LocalStorage;
pub use auto::auto_detect_storage;
pub use events::{StorageChangeEvent, StorageListener};
