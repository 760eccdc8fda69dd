//! Per-call context passed into tool execution (spec §4.2's "thin adapter
//! over SessionStore/KnowledgeStore" tools need the owning session/company).
//!
//! `OrchestrationEngine` builds one of these per turn and passes it to
//! `ToolRegistry::invoke`; tools that don't need it (most filesystem tools)
//! simply ignore it.

use tokio_util::sync::CancellationToken;

use crate::message::Message;

#[derive(Debug, Clone, Default)]
pub struct ToolCallContext {
    /// The session's message history as of this turn, for tools that need to
    /// see prior conversation (e.g. a recent-messages lookup tool).
    pub recent_messages: Vec<Message>,

    /// Owning session, for tools that read/write SessionStore.
    pub session_id: Option<String>,

    /// Owning user, for tools that scope KnowledgeStore collections or
    /// SessionStore records.
    pub user_id: Option<String>,

    /// Owning company, for tools that must honor the companyId scoping rule
    /// (spec §4.4: every mutation checks companyId).
    pub company_id: Option<String>,

    /// Cancelled when the client disconnects mid-turn, so long-running tool
    /// executors (and `ToolRegistry::invoke`'s wait) can give up early instead
    /// of running to completion for a socket nobody is listening on.
    pub cancellation: CancellationToken,
}

impl ToolCallContext {
    pub fn new(recent_messages: Vec<Message>) -> Self {
        Self {
            recent_messages,
            session_id: None,
            user_id: None,
            company_id: None,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_owner(mut self, user_id: impl Into<String>, company_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self.company_id = Some(company_id.into());
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }
}
