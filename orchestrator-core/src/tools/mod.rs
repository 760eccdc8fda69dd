//! Built-in tool executors (spec §4.2) and the `Tool` trait they implement.

pub mod bash;
pub mod file;
pub mod knowledge;
mod r#trait;
pub mod todo;

pub use bash::{BashTool, TOOL_BASH};
pub use file::{
    ApplyPatchTool, CreateDirTool, DeleteFileTool, GlobTool, GrepTool, ListDirectoryTool,
    MoveFileTool, MultieditTool, ReadFileTool, WriteFileTool, TOOL_APPLY_PATCH, TOOL_CREATE_DIR,
    TOOL_DELETE_FILE, TOOL_GLOB, TOOL_GREP, TOOL_LIST_DIRECTORY, TOOL_MOVE_FILE, TOOL_MULTIEDIT,
    TOOL_READ_FILE, TOOL_WRITE_FILE,
};
pub use knowledge::{FindKnowledgeTool, StoreKnowledgeTool, TOOL_FIND_KNOWLEDGE, TOOL_STORE_KNOWLEDGE};
pub use r#trait::Tool;
pub use todo::{TodoReadTool, TodoWriteTool, TOOL_TODO_READ, TOOL_TODO_WRITE};
