//! Built-in knowledge find/store executors (spec §4.2): thin adapters over
//! `KnowledgeStore`.

pub mod find;
pub mod store;

pub use find::{FindKnowledgeTool, TOOL_FIND_KNOWLEDGE};
pub use store::{StoreKnowledgeTool, TOOL_STORE_KNOWLEDGE};
