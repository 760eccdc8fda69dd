//! Filesystem tools (spec §4.2): every path argument is resolved through
//! [`path::resolve_path_under`] before any I/O.

mod path;

pub mod apply_patch;
pub mod create_dir;
pub mod delete_file;
mod edit_file;
pub mod glob;
pub mod grep;
pub mod list_directory;
pub mod move_file;
pub mod multiedit;
pub mod read_file;
pub mod write_file;

pub use apply_patch::{ApplyPatchTool, TOOL_APPLY_PATCH};
pub use create_dir::{CreateDirTool, TOOL_CREATE_DIR};
pub use delete_file::{DeleteFileTool, TOOL_DELETE_FILE};
pub use glob::{GlobTool, TOOL_GLOB};
pub use grep::{GrepTool, TOOL_GREP};
pub use list_directory::{ListDirectoryTool, TOOL_LIST_DIRECTORY};
pub use move_file::{MoveFileTool, TOOL_MOVE_FILE};
pub use multiedit::{MultieditTool, TOOL_MULTIEDIT};
pub use read_file::{ReadFileTool, TOOL_READ_FILE};
pub use write_file::{TOOL_WRITE_FILE, WriteFileTool};
