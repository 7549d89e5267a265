pub mod local;
pub mod memory;
pub mod milvus;

pub use local::LocalStore;
pub use memory::MemoryStore;
pub use milvus::MilvusStore;
