//! Todo tools: todo_write, todo_read.
//!
//! A thin adapter over the session, not a global store (spec §4.2): each
//! session/company gets its own todo list, persisted as JSON under XDG state
//! home (e.g. `~/.local/state/orchestrator-core/sessions/<company>/<session>/todos.json`
//! on Linux). Uses the `cross-xdg` crate for cross-platform paths.

mod todo_read;
mod todo_write;

pub use todo_read::{TodoReadTool, TOOL_TODO_READ};
pub use todo_write::{TodoWriteTool, TOOL_TODO_WRITE};

use crate::tool_source::{ToolCallContext, ToolSourceError};

/// Application name used under XDG state_home.
const XDG_APP_NAME: &str = "orchestrator-core";
/// Filename for a session's todo list JSON under its scoped directory.
const TODOS_FILENAME: &str = "todos.json";

/// Returns the path to `ctx`'s todo list file, scoped by company and session
/// id so concurrent sessions never share or clobber one another's list.
///
/// Resolves to `$XDG_STATE_HOME/orchestrator-core/sessions/<company_id>/<session_id>/todos.json`.
/// Fails with [`ToolSourceError::InvalidInput`] if `ctx` carries no session
/// identity, or if XDG base dirs cannot be determined (e.g. no home).
pub fn todo_file_path(
    ctx: Option<&ToolCallContext>,
) -> Result<std::path::PathBuf, ToolSourceError> {
    let ctx = ctx.ok_or_else(|| {
        ToolSourceError::InvalidInput("todo tools require a session context".to_string())
    })?;
    let session_id = ctx
        .session_id
        .as_deref()
        .ok_or_else(|| ToolSourceError::InvalidInput("todo tools require a session id".to_string()))?;
    let company_id = ctx
        .company_id
        .as_deref()
        .ok_or_else(|| ToolSourceError::InvalidInput("todo tools require a company id".to_string()))?;

    let base = cross_xdg::BaseDirs::new().map_err(|e| {
        ToolSourceError::InvalidInput(format!("XDG base dirs unavailable: {}", e))
    })?;
    Ok(base
        .state_home()
        .join(XDG_APP_NAME)
        .join("sessions")
        .join(sanitize_path_segment(company_id))
        .join(sanitize_path_segment(session_id))
        .join(TODOS_FILENAME))
}

/// Collapses anything that isn't alphanumeric/`-`/`_` to `_`, so a
/// company/session id can never smuggle a `..` or path separator into the
/// scoped directory it names.
fn sanitize_path_segment(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

/// Single todo item.
///
/// Used for JSON (de)serialization to/from the XDG todo file.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TodoInfo {
    pub id: String,
    pub content: String,
    pub status: String,
    pub priority: String,
}

#[cfg(test)]
pub(crate) static XDG_TEST_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::{TodoInfo, TODOS_FILENAME, XDG_APP_NAME};
    use crate::tool_source::ToolCallContext;

    fn ctx_for(session_id: &str, company_id: &str) -> ToolCallContext {
        ToolCallContext::new(Vec::new())
            .with_session(session_id)
            .with_owner("u1", company_id)
    }

    /// Given XDG_STATE_HOME is set, todo_file_path scopes the file under
    /// sessions/<company>/<session>/todos.json.
    #[test]
    fn todo_file_path_uses_xdg_state_home_scoped_by_session() {
        let _g = super::XDG_TEST_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("XDG_STATE_HOME", dir.path());
        let ctx = ctx_for("sess-1", "acme");
        let path = super::todo_file_path(Some(&ctx)).unwrap();
        assert!(path.ends_with(
            std::path::Path::new("orchestrator-core").join("sessions/acme/sess-1/todos.json")
        ));
        assert_eq!(path.file_name().unwrap(), "todos.json");
    }

    /// Two different sessions resolve to two different files.
    #[test]
    fn todo_file_path_differs_across_sessions() {
        let _g = super::XDG_TEST_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("XDG_STATE_HOME", dir.path());
        let a = super::todo_file_path(Some(&ctx_for("sess-a", "acme"))).unwrap();
        let b = super::todo_file_path(Some(&ctx_for("sess-b", "acme"))).unwrap();
        assert_ne!(a, b);
    }

    /// A missing context is rejected rather than falling back to a shared file.
    #[test]
    fn todo_file_path_requires_context() {
        let err = super::todo_file_path(None).unwrap_err();
        assert!(matches!(err, crate::tool_source::ToolSourceError::InvalidInput(_)));
    }

    /// A context with no session id attached is rejected.
    #[test]
    fn todo_file_path_requires_session_id() {
        let ctx = ToolCallContext::new(Vec::new()).with_owner("u1", "acme");
        let err = super::todo_file_path(Some(&ctx)).unwrap_err();
        assert!(matches!(err, crate::tool_source::ToolSourceError::InvalidInput(_)));
    }

    /// TodoInfo roundtrip: serialize to JSON and deserialize back.
    #[test]
    fn todo_info_serialize_deserialize_roundtrip() {
        let t = TodoInfo {
            id: "id1".to_string(),
            content: "content".to_string(),
            status: "pending".to_string(),
            priority: "high".to_string(),
        };
        let json = serde_json::to_string(&t).unwrap();
        let back: TodoInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, t.id);
        assert_eq!(back.content, t.content);
        assert_eq!(back.status, t.status);
        assert_eq!(back.priority, t.priority);
    }

    #[test]
    fn constants_match_docs() {
        assert_eq!(XDG_APP_NAME, "orchestrator-core");
        assert_eq!(TODOS_FILENAME, "todos.json");
    }
}
