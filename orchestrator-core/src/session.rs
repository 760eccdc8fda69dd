//! `SessionStore` (spec §4.4): durable, append-only per-session messages,
//! scoped by `companyId` (and `userId` for deletion).
//!
//! Two implementations, matching the teacher's `Checkpointer` pattern of
//! providing both an in-memory and a SQLite-backed store behind the same
//! trait: [`InMemorySessionStore`] (dev/tests, `dashmap`-backed like the
//! teacher's `InMemoryStore`) and [`SqliteSessionStore`] (`rusqlite` +
//! `tokio::task::spawn_blocking`, one connection per operation, exactly as
//! the teacher's `SqliteSaver` does it).

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::error::{ErrorKind, HasErrorKind};
use crate::message::Message;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "companyId")]
    pub company_id: String,
    pub title: String,
    #[serde(rename = "activeSpecialistId")]
    pub active_specialist_id: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PersistedMessage {
    pub id: u64,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(flatten)]
    pub message: Message,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct MessagePage {
    pub messages: Vec<PersistedMessage>,
    pub total: usize,
    #[serde(rename = "hasMore")]
    pub has_more: bool,
}

#[derive(Debug, Error)]
pub enum SessionStoreError {
    /// Unknown or cross-owner session/specialist — surfaced as `NotFound` to
    /// avoid leaking existence (spec §7).
    #[error("not found")]
    NotFound,
    #[error("validation error: {0}")]
    Validation(String),
    #[error("transport error: {0}")]
    Transport(String),
}

impl HasErrorKind for SessionStoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            SessionStoreError::NotFound => ErrorKind::NotFound,
            SessionStoreError::Validation(_) => ErrorKind::ValidationError,
            SessionStoreError::Transport(_) => ErrorKind::TransportError,
        }
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(
        &self,
        user_id: &str,
        company_id: &str,
        title: &str,
    ) -> Result<Session, SessionStoreError>;

    async fn get_session(&self, session_id: &str, company_id: &str) -> Result<Session, SessionStoreError>;

    /// Ordered by `updatedAt` desc.
    async fn list_sessions(&self, user_id: &str, company_id: &str) -> Result<Vec<Session>, SessionStoreError>;

    async fn delete_session(
        &self,
        session_id: &str,
        user_id: &str,
        company_id: &str,
    ) -> Result<(), SessionStoreError>;

    async fn append_message(
        &self,
        session_id: &str,
        company_id: &str,
        message: Message,
    ) -> Result<PersistedMessage, SessionStoreError>;

    async fn list_messages(
        &self,
        session_id: &str,
        company_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<MessagePage, SessionStoreError>;

    async fn set_active_specialist(
        &self,
        session_id: &str,
        company_id: &str,
        specialist_id: Option<&str>,
    ) -> Result<(), SessionStoreError>;

    /// Thin wrapper over `append_message` for tool-call events (spec §4.4).
    async fn append_tool_call(
        &self,
        session_id: &str,
        company_id: &str,
        call_id: &str,
        name: &str,
        args: Value,
    ) -> Result<PersistedMessage, SessionStoreError> {
        self.append_message(
            session_id,
            company_id,
            Message::ToolCall {
                call_id: call_id.to_string(),
                name: name.to_string(),
                args,
            },
        )
        .await
    }

    /// Thin wrapper over `append_message` for tool-result events.
    #[allow(clippy::too_many_arguments)]
    async fn append_tool_result(
        &self,
        session_id: &str,
        company_id: &str,
        call_id: &str,
        name: &str,
        output: Option<Value>,
        error: Option<String>,
        duration_ms: u64,
    ) -> Result<PersistedMessage, SessionStoreError> {
        self.append_message(
            session_id,
            company_id,
            Message::ToolResult {
                call_id: call_id.to_string(),
                name: name.to_string(),
                output,
                error,
                duration_ms,
            },
        )
        .await
    }
}

// ---------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------

struct SessionRecord {
    session: Session,
    messages: Vec<PersistedMessage>,
}

pub struct InMemorySessionStore {
    sessions: DashMap<String, SessionRecord>,
    next_message_id: AtomicU64,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self {
            sessions: DashMap::new(),
            next_message_id: AtomicU64::new(1),
        }
    }
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create_session(
        &self,
        user_id: &str,
        company_id: &str,
        title: &str,
    ) -> Result<Session, SessionStoreError> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            company_id: company_id.to_string(),
            title: title.to_string(),
            active_specialist_id: None,
            created_at: now,
            updated_at: now,
        };
        self.sessions.insert(
            session.id.clone(),
            SessionRecord {
                session: session.clone(),
                messages: Vec::new(),
            },
        );
        Ok(session)
    }

    async fn get_session(&self, session_id: &str, company_id: &str) -> Result<Session, SessionStoreError> {
        let record = self.sessions.get(session_id).ok_or(SessionStoreError::NotFound)?;
        if record.session.company_id != company_id {
            return Err(SessionStoreError::NotFound);
        }
        Ok(record.session.clone())
    }

    async fn list_sessions(&self, user_id: &str, company_id: &str) -> Result<Vec<Session>, SessionStoreError> {
        let mut sessions: Vec<Session> = self
            .sessions
            .iter()
            .map(|entry| entry.session.clone())
            .filter(|s| s.user_id == user_id && s.company_id == company_id)
            .collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    async fn delete_session(
        &self,
        session_id: &str,
        user_id: &str,
        company_id: &str,
    ) -> Result<(), SessionStoreError> {
        let owns = self
            .sessions
            .get(session_id)
            .map(|r| r.session.user_id == user_id && r.session.company_id == company_id)
            .unwrap_or(false);
        if !owns {
            return Err(SessionStoreError::NotFound);
        }
        self.sessions.remove(session_id);
        Ok(())
    }

    async fn append_message(
        &self,
        session_id: &str,
        company_id: &str,
        message: Message,
    ) -> Result<PersistedMessage, SessionStoreError> {
        let mut record = self.sessions.get_mut(session_id).ok_or(SessionStoreError::NotFound)?;
        if record.session.company_id != company_id {
            return Err(SessionStoreError::NotFound);
        }
        let persisted = PersistedMessage {
            id: self.next_message_id.fetch_add(1, Ordering::SeqCst),
            session_id: session_id.to_string(),
            message,
            timestamp: Utc::now(),
        };
        record.messages.push(persisted.clone());
        record.session.updated_at = persisted.timestamp;
        Ok(persisted)
    }

    async fn list_messages(
        &self,
        session_id: &str,
        company_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<MessagePage, SessionStoreError> {
        let record = self.sessions.get(session_id).ok_or(SessionStoreError::NotFound)?;
        if record.session.company_id != company_id {
            return Err(SessionStoreError::NotFound);
        }
        let total = record.messages.len();
        let page: Vec<PersistedMessage> = record.messages.iter().skip(offset).take(limit).cloned().collect();
        let has_more = offset + page.len() < total;
        Ok(MessagePage {
            messages: page,
            total,
            has_more,
        })
    }

    async fn set_active_specialist(
        &self,
        session_id: &str,
        company_id: &str,
        specialist_id: Option<&str>,
    ) -> Result<(), SessionStoreError> {
        let mut record = self.sessions.get_mut(session_id).ok_or(SessionStoreError::NotFound)?;
        if record.session.company_id != company_id {
            return Err(SessionStoreError::NotFound);
        }
        record.session.active_specialist_id = specialist_id.map(str::to_string);
        record.session.updated_at = Utc::now();
        Ok(())
    }
}

// ---------------------------------------------------------------------
// SQLite implementation
// ---------------------------------------------------------------------

pub struct SqliteSessionStore {
    path: std::path::PathBuf,
}

impl SqliteSessionStore {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, SessionStoreError> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
        };
        let conn = rusqlite::Connection::open(&store.path)
            .map_err(|e| SessionStoreError::Transport(format!("open: {e}")))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                company_id TEXT NOT NULL,
                title TEXT NOT NULL,
                active_specialist_id TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS session_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                company_id TEXT NOT NULL,
                payload TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS session_messages_session
                ON session_messages(session_id);",
        )
        .map_err(|e| SessionStoreError::Transport(format!("schema: {e}")))?;
        Ok(store)
    }

    async fn run<T: Send + 'static>(
        &self,
        f: impl FnOnce(&rusqlite::Connection) -> rusqlite::Result<T> + Send + 'static,
    ) -> Result<T, SessionStoreError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = rusqlite::Connection::open(&path)
                .map_err(|e| SessionStoreError::Transport(format!("open: {e}")))?;
            f(&conn).map_err(|e| SessionStoreError::Transport(format!("query: {e}")))
        })
        .await
        .map_err(|e| SessionStoreError::Transport(format!("join: {e}")))?
    }
}

fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        user_id: row.get(1)?,
        company_id: row.get(2)?,
        title: row.get(3)?,
        active_specialist_id: row.get(4)?,
        created_at: row
            .get::<_, String>(5)?
            .parse()
            .unwrap_or_else(|_| Utc::now()),
        updated_at: row
            .get::<_, String>(6)?
            .parse()
            .unwrap_or_else(|_| Utc::now()),
    })
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn create_session(
        &self,
        user_id: &str,
        company_id: &str,
        title: &str,
    ) -> Result<Session, SessionStoreError> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            company_id: company_id.to_string(),
            title: title.to_string(),
            active_specialist_id: None,
            created_at: now,
            updated_at: now,
        };
        let insert = session.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, user_id, company_id, title, active_specialist_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6)",
                rusqlite::params![
                    insert.id,
                    insert.user_id,
                    insert.company_id,
                    insert.title,
                    insert.created_at.to_rfc3339(),
                    insert.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await?;
        Ok(session)
    }

    async fn get_session(&self, session_id: &str, company_id: &str) -> Result<Session, SessionStoreError> {
        let session_id = session_id.to_string();
        let company_id = company_id.to_string();
        let session = self
            .run(move |conn| {
                conn.query_row(
                    "SELECT id, user_id, company_id, title, active_specialist_id, created_at, updated_at
                     FROM sessions WHERE id = ?1",
                    [&session_id],
                    row_to_session,
                )
            })
            .await
            .map_err(|_| SessionStoreError::NotFound)?;
        if session.company_id != company_id {
            return Err(SessionStoreError::NotFound);
        }
        Ok(session)
    }

    async fn list_sessions(&self, user_id: &str, company_id: &str) -> Result<Vec<Session>, SessionStoreError> {
        let user_id = user_id.to_string();
        let company_id = company_id.to_string();
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, company_id, title, active_specialist_id, created_at, updated_at
                 FROM sessions WHERE user_id = ?1 AND company_id = ?2 ORDER BY updated_at DESC",
            )?;
            let rows = stmt.query_map(rusqlite::params![user_id, company_id], row_to_session)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
    }

    async fn delete_session(
        &self,
        session_id: &str,
        user_id: &str,
        company_id: &str,
    ) -> Result<(), SessionStoreError> {
        let session_id_owned = session_id.to_string();
        let user_id = user_id.to_string();
        let company_id = company_id.to_string();
        let deleted = self
            .run(move |conn| {
                let changed = conn.execute(
                    "DELETE FROM sessions WHERE id = ?1 AND user_id = ?2 AND company_id = ?3",
                    rusqlite::params![session_id_owned, user_id, company_id],
                )?;
                Ok(changed)
            })
            .await?;
        if deleted == 0 {
            return Err(SessionStoreError::NotFound);
        }
        let session_id = session_id.to_string();
        self.run(move |conn| {
            conn.execute("DELETE FROM session_messages WHERE session_id = ?1", [session_id])
        })
        .await?;
        Ok(())
    }

    async fn append_message(
        &self,
        session_id: &str,
        company_id: &str,
        message: Message,
    ) -> Result<PersistedMessage, SessionStoreError> {
        let _ = self.get_session(session_id, company_id).await?;
        let payload = serde_json::to_string(&message)
            .map_err(|e| SessionStoreError::Transport(format!("encode: {e}")))?;
        let now = Utc::now();
        let session_id_owned = session_id.to_string();
        let company_id_owned = company_id.to_string();
        let now_str = now.to_rfc3339();
        let id = self
            .run(move |conn| {
                conn.execute(
                    "INSERT INTO session_messages (session_id, company_id, payload, timestamp) VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![session_id_owned, company_id_owned, payload, now_str],
                )?;
                Ok(conn.last_insert_rowid() as u64)
            })
            .await?;

        let session_id_owned = session_id.to_string();
        let now_str = now.to_rfc3339();
        self.run(move |conn| {
            conn.execute(
                "UPDATE sessions SET updated_at = ?1 WHERE id = ?2",
                rusqlite::params![now_str, session_id_owned],
            )
        })
        .await?;

        Ok(PersistedMessage {
            id,
            session_id: session_id.to_string(),
            message,
            timestamp: now,
        })
    }

    async fn list_messages(
        &self,
        session_id: &str,
        company_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<MessagePage, SessionStoreError> {
        let _ = self.get_session(session_id, company_id).await?;
        let session_id_owned = session_id.to_string();
        let total = self
            .run(move |conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM session_messages WHERE session_id = ?1",
                    [session_id_owned],
                    |row| row.get::<_, i64>(0),
                )
            })
            .await? as usize;

        let session_id_owned = session_id.to_string();
        let messages = self
            .run(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, session_id, payload, timestamp FROM session_messages
                     WHERE session_id = ?1 ORDER BY id ASC LIMIT ?2 OFFSET ?3",
                )?;
                let rows = stmt.query_map(
                    rusqlite::params![session_id_owned, limit as i64, offset as i64],
                    |row| {
                        let payload: String = row.get(2)?;
                        let timestamp: String = row.get(3)?;
                        Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, payload, timestamp))
                    },
                )?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
            })
            .await?;

        let messages: Vec<PersistedMessage> = messages
            .into_iter()
            .filter_map(|(id, session_id, payload, timestamp)| {
                let message: Message = serde_json::from_str(&payload).ok()?;
                let timestamp = timestamp.parse().unwrap_or_else(|_| Utc::now());
                Some(PersistedMessage {
                    id: id as u64,
                    session_id,
                    message,
                    timestamp,
                })
            })
            .collect();
        let has_more = offset + messages.len() < total;
        Ok(MessagePage {
            messages,
            total,
            has_more,
        })
    }

    async fn set_active_specialist(
        &self,
        session_id: &str,
        company_id: &str,
        specialist_id: Option<&str>,
    ) -> Result<(), SessionStoreError> {
        let _ = self.get_session(session_id, company_id).await?;
        let session_id_owned = session_id.to_string();
        let specialist_id = specialist_id.map(str::to_string);
        let now = Utc::now().to_rfc3339();
        let changed = self
            .run(move |conn| {
                conn.execute(
                    "UPDATE sessions SET active_specialist_id = ?1, updated_at = ?2 WHERE id = ?3",
                    rusqlite::params![specialist_id, now, session_id_owned],
                )
            })
            .await?;
        if changed == 0 {
            return Err(SessionStoreError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn roundtrip<S: SessionStore>(store: &S) {
        let session = store.create_session("u1", "c1", "My session").await.unwrap();
        assert_eq!(session.user_id, "u1");

        store
            .append_message(&session.id, "c1", Message::User { content: "Hi".into() })
            .await
            .unwrap();
        store
            .append_tool_call(&session.id, "c1", "call-1", "ls", json!({"path": "."}))
            .await
            .unwrap();
        store
            .append_tool_result(&session.id, "c1", "call-1", "ls", Some(json!({"files": []})), None, 5)
            .await
            .unwrap();
        store
            .append_message(&session.id, "c1", Message::Assistant { content: "done".into() })
            .await
            .unwrap();

        let page = store.list_messages(&session.id, "c1", 10, 0).await.unwrap();
        assert_eq!(page.total, 4);
        assert!(!page.has_more);

        store.set_active_specialist(&session.id, "c1", Some("spec-1")).await.unwrap();
        let fetched = store.get_session(&session.id, "c1").await.unwrap();
        assert_eq!(fetched.active_specialist_id.as_deref(), Some("spec-1"));

        assert!(store.get_session(&session.id, "other-company").await.is_err());
        assert!(store.delete_session(&session.id, "wrong-user", "c1").await.is_err());
        store.delete_session(&session.id, "u1", "c1").await.unwrap();
        assert!(store.get_session(&session.id, "c1").await.is_err());
    }

    #[tokio::test]
    async fn in_memory_session_store_roundtrip() {
        roundtrip(&InMemorySessionStore::new()).await;
    }

    #[tokio::test]
    async fn sqlite_session_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteSessionStore::open(dir.path().join("sessions.db")).unwrap();
        roundtrip(&store).await;
    }

    #[tokio::test]
    async fn pagination_is_stable_across_appends() {
        let store = InMemorySessionStore::new();
        let session = store.create_session("u1", "c1", "t").await.unwrap();
        for i in 0..5 {
            store
                .append_message(&session.id, "c1", Message::User { content: format!("m{i}") })
                .await
                .unwrap();
        }
        let first_page = store.list_messages(&session.id, "c1", 2, 0).await.unwrap();
        assert!(first_page.has_more);
        store
            .append_message(&session.id, "c1", Message::User { content: "late".into() })
            .await
            .unwrap();
        let same_page = store.list_messages(&session.id, "c1", 2, 0).await.unwrap();
        assert_eq!(first_page.messages[0].id, same_page.messages[0].id);
    }
}
