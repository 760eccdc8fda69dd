//! `PromptStore` (spec §4.5): per-(userId, companyId) global system prompt,
//! named Specialists ("subagents"), and versioned prompts.
//!
//! Same dual in-memory/SQLite implementation strategy as [`crate::session`],
//! sharing the connection-per-call `spawn_blocking` idiom grounded in the
//! teacher's `SqliteSaver`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::error::{ErrorKind, HasErrorKind};

const MAX_SYSTEM_PROMPT_LEN: usize = 10_000;
const MAX_SPECIALIST_PROMPT_LEN: usize = 10_000;
pub const DEFAULT_VERSION_LABEL: &str = "default";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Specialist {
    pub id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "companyId")]
    pub company_id: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "systemPrompt")]
    pub system_prompt: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PromptVersion {
    pub id: String,
    pub label: String,
    pub text: String,
    pub active: bool,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum PromptStoreError {
    #[error("not found")]
    NotFound,
    #[error("validation error: {0}")]
    Validation(String),
    #[error("name already in use")]
    DuplicateName,
    #[error("transport error: {0}")]
    Transport(String),
}

impl HasErrorKind for PromptStoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            PromptStoreError::NotFound => ErrorKind::NotFound,
            PromptStoreError::Validation(_) | PromptStoreError::DuplicateName => {
                ErrorKind::ValidationError
            }
            PromptStoreError::Transport(_) => ErrorKind::TransportError,
        }
    }
}

fn validate_specialist_name(name: &str) -> Result<(), PromptStoreError> {
    let len = name.chars().count();
    if !(3..=50).contains(&len) {
        return Err(PromptStoreError::Validation(
            "name must be 3-50 characters".to_string(),
        ));
    }
    Ok(())
}

fn validate_specialist_description(description: &str) -> Result<(), PromptStoreError> {
    if description.chars().count() > 200 {
        return Err(PromptStoreError::Validation(
            "description must be at most 200 characters".to_string(),
        ));
    }
    Ok(())
}

fn validate_specialist_prompt(text: &str) -> Result<(), PromptStoreError> {
    if text.len() > MAX_SPECIALIST_PROMPT_LEN {
        return Err(PromptStoreError::Validation(
            "systemPrompt must be at most 10000 characters".to_string(),
        ));
    }
    Ok(())
}

fn validate_system_prompt(text: &str) -> Result<(), PromptStoreError> {
    if text.len() > MAX_SYSTEM_PROMPT_LEN {
        return Err(PromptStoreError::Validation(
            "system prompt must be at most 10000 characters".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
pub trait PromptStore: Send + Sync {
    async fn get_system_prompt(&self, user_id: &str, company_id: &str) -> Result<String, PromptStoreError>;

    async fn upsert_system_prompt(
        &self,
        user_id: &str,
        company_id: &str,
        text: &str,
    ) -> Result<(), PromptStoreError>;

    async fn create_specialist(
        &self,
        user_id: &str,
        company_id: &str,
        name: &str,
        description: &str,
        system_prompt: &str,
    ) -> Result<Specialist, PromptStoreError>;

    async fn get_specialist(&self, id: &str, user_id: &str, company_id: &str) -> Result<Specialist, PromptStoreError>;

    async fn list_specialists(&self, user_id: &str, company_id: &str) -> Result<Vec<Specialist>, PromptStoreError>;

    async fn update_specialist(
        &self,
        id: &str,
        user_id: &str,
        company_id: &str,
        name: Option<&str>,
        description: Option<&str>,
        system_prompt: Option<&str>,
    ) -> Result<Specialist, PromptStoreError>;

    async fn delete_specialist(&self, id: &str, user_id: &str, company_id: &str) -> Result<(), PromptStoreError>;

    async fn list_versions(&self, user_id: &str, company_id: &str) -> Result<Vec<PromptVersion>, PromptStoreError>;

    async fn get_version(
        &self,
        version_id: &str,
        user_id: &str,
        company_id: &str,
    ) -> Result<PromptVersion, PromptStoreError>;

    async fn create_version(
        &self,
        user_id: &str,
        company_id: &str,
        label: &str,
        text: &str,
        activate: bool,
    ) -> Result<PromptVersion, PromptStoreError>;

    async fn activate_version(
        &self,
        version_id: &str,
        user_id: &str,
        company_id: &str,
    ) -> Result<(), PromptStoreError>;

    async fn delete_version(&self, version_id: &str, user_id: &str, company_id: &str) -> Result<(), PromptStoreError>;
}

// ---------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------

struct OwnerPrompts {
    system_prompt: String,
    versions: Vec<PromptVersion>,
}

impl Default for OwnerPrompts {
    fn default() -> Self {
        let default_version = PromptVersion {
            id: DEFAULT_VERSION_LABEL.to_string(),
            label: DEFAULT_VERSION_LABEL.to_string(),
            text: String::new(),
            active: true,
            created_at: Utc::now(),
        };
        Self {
            system_prompt: String::new(),
            versions: vec![default_version],
        }
    }
}

fn owner_key(user_id: &str, company_id: &str) -> String {
    format!("{user_id}\u{0}{company_id}")
}

pub struct InMemoryPromptStore {
    prompts: DashMap<String, OwnerPrompts>,
    specialists: DashMap<String, Specialist>,
}

impl Default for InMemoryPromptStore {
    fn default() -> Self {
        Self {
            prompts: DashMap::new(),
            specialists: DashMap::new(),
        }
    }
}

impl InMemoryPromptStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn owned_specialist(
        &self,
        id: &str,
        user_id: &str,
        company_id: &str,
    ) -> Result<dashmap::mapref::one::RefMut<'_, String, Specialist>, PromptStoreError> {
        let entry = self.specialists.get_mut(id).ok_or(PromptStoreError::NotFound)?;
        if entry.user_id != user_id || entry.company_id != company_id {
            return Err(PromptStoreError::NotFound);
        }
        Ok(entry)
    }
}

#[async_trait]
impl PromptStore for InMemoryPromptStore {
    async fn get_system_prompt(&self, user_id: &str, company_id: &str) -> Result<String, PromptStoreError> {
        Ok(self
            .prompts
            .get(&owner_key(user_id, company_id))
            .map(|p| p.system_prompt.clone())
            .unwrap_or_default())
    }

    async fn upsert_system_prompt(
        &self,
        user_id: &str,
        company_id: &str,
        text: &str,
    ) -> Result<(), PromptStoreError> {
        validate_system_prompt(text)?;
        self.prompts
            .entry(owner_key(user_id, company_id))
            .or_default()
            .system_prompt = text.to_string();
        Ok(())
    }

    async fn create_specialist(
        &self,
        user_id: &str,
        company_id: &str,
        name: &str,
        description: &str,
        system_prompt: &str,
    ) -> Result<Specialist, PromptStoreError> {
        validate_specialist_name(name)?;
        validate_specialist_description(description)?;
        validate_specialist_prompt(system_prompt)?;
        let dup = self
            .specialists
            .iter()
            .any(|s| s.user_id == user_id && s.company_id == company_id && s.name == name);
        if dup {
            return Err(PromptStoreError::DuplicateName);
        }
        let specialist = Specialist {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            company_id: company_id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            system_prompt: system_prompt.to_string(),
        };
        self.specialists.insert(specialist.id.clone(), specialist.clone());
        Ok(specialist)
    }

    async fn get_specialist(&self, id: &str, user_id: &str, company_id: &str) -> Result<Specialist, PromptStoreError> {
        Ok(self.owned_specialist(id, user_id, company_id)?.clone())
    }

    async fn list_specialists(&self, user_id: &str, company_id: &str) -> Result<Vec<Specialist>, PromptStoreError> {
        Ok(self
            .specialists
            .iter()
            .map(|s| s.clone())
            .filter(|s| s.user_id == user_id && s.company_id == company_id)
            .collect())
    }

    async fn update_specialist(
        &self,
        id: &str,
        user_id: &str,
        company_id: &str,
        name: Option<&str>,
        description: Option<&str>,
        system_prompt: Option<&str>,
    ) -> Result<Specialist, PromptStoreError> {
        if let Some(name) = name {
            validate_specialist_name(name)?;
            let dup = self
                .specialists
                .iter()
                .any(|s| s.id != id && s.user_id == user_id && s.company_id == company_id && s.name == name);
            if dup {
                return Err(PromptStoreError::DuplicateName);
            }
        }
        if let Some(description) = description {
            validate_specialist_description(description)?;
        }
        if let Some(system_prompt) = system_prompt {
            validate_specialist_prompt(system_prompt)?;
        }
        let mut entry = self.owned_specialist(id, user_id, company_id)?;
        if let Some(name) = name {
            entry.name = name.to_string();
        }
        if let Some(description) = description {
            entry.description = description.to_string();
        }
        if let Some(system_prompt) = system_prompt {
            entry.system_prompt = system_prompt.to_string();
        }
        Ok(entry.clone())
    }

    async fn delete_specialist(&self, id: &str, user_id: &str, company_id: &str) -> Result<(), PromptStoreError> {
        let _ = self.owned_specialist(id, user_id, company_id)?;
        self.specialists.remove(id);
        Ok(())
    }

    async fn list_versions(&self, user_id: &str, company_id: &str) -> Result<Vec<PromptVersion>, PromptStoreError> {
        Ok(self
            .prompts
            .get(&owner_key(user_id, company_id))
            .map(|p| p.versions.clone())
            .unwrap_or_else(|| OwnerPrompts::default().versions))
    }

    async fn get_version(
        &self,
        version_id: &str,
        user_id: &str,
        company_id: &str,
    ) -> Result<PromptVersion, PromptStoreError> {
        let owner = self.prompts.get(&owner_key(user_id, company_id)).ok_or(PromptStoreError::NotFound)?;
        owner
            .versions
            .iter()
            .find(|v| v.id == version_id)
            .cloned()
            .ok_or(PromptStoreError::NotFound)
    }

    async fn create_version(
        &self,
        user_id: &str,
        company_id: &str,
        label: &str,
        text: &str,
        activate: bool,
    ) -> Result<PromptVersion, PromptStoreError> {
        validate_system_prompt(text)?;
        let mut owner = self.prompts.entry(owner_key(user_id, company_id)).or_default();
        let version = PromptVersion {
            id: Uuid::new_v4().to_string(),
            label: label.to_string(),
            text: text.to_string(),
            active: activate,
            created_at: Utc::now(),
        };
        if activate {
            for v in owner.versions.iter_mut() {
                v.active = false;
            }
            owner.system_prompt = text.to_string();
        }
        owner.versions.push(version.clone());
        Ok(version)
    }

    async fn activate_version(
        &self,
        version_id: &str,
        user_id: &str,
        company_id: &str,
    ) -> Result<(), PromptStoreError> {
        let mut owner = self.prompts.entry(owner_key(user_id, company_id)).or_default();
        let text = owner
            .versions
            .iter()
            .find(|v| v.id == version_id)
            .map(|v| v.text.clone())
            .ok_or(PromptStoreError::NotFound)?;
        for v in owner.versions.iter_mut() {
            v.active = v.id == version_id;
        }
        owner.system_prompt = text;
        Ok(())
    }

    async fn delete_version(&self, version_id: &str, user_id: &str, company_id: &str) -> Result<(), PromptStoreError> {
        let mut owner = self.prompts.entry(owner_key(user_id, company_id)).or_default();
        let target = owner
            .versions
            .iter()
            .find(|v| v.id == version_id)
            .ok_or(PromptStoreError::NotFound)?;
        if target.label == DEFAULT_VERSION_LABEL {
            return Err(PromptStoreError::Validation(
                "the default version cannot be deleted".to_string(),
            ));
        }
        if target.active {
            return Err(PromptStoreError::Validation(
                "the active version cannot be deleted".to_string(),
            ));
        }
        owner.versions.retain(|v| v.id != version_id);
        Ok(())
    }
}

// ---------------------------------------------------------------------
// SQLite implementation
// ---------------------------------------------------------------------

pub struct SqlitePromptStore {
    path: std::path::PathBuf,
}

impl SqlitePromptStore {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, PromptStoreError> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
        };
        let conn = rusqlite::Connection::open(&store.path)
            .map_err(|e| PromptStoreError::Transport(format!("open: {e}")))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS system_prompts (
                user_id TEXT NOT NULL,
                company_id TEXT NOT NULL,
                text TEXT NOT NULL,
                PRIMARY KEY (user_id, company_id)
            );
            CREATE TABLE IF NOT EXISTS specialists (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                company_id TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                system_prompt TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS prompt_versions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                company_id TEXT NOT NULL,
                label TEXT NOT NULL,
                text TEXT NOT NULL,
                active INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );",
        )
        .map_err(|e| PromptStoreError::Transport(format!("schema: {e}")))?;
        Ok(store)
    }

    async fn run<T: Send + 'static>(
        &self,
        f: impl FnOnce(&rusqlite::Connection) -> rusqlite::Result<T> + Send + 'static,
    ) -> Result<T, PromptStoreError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = rusqlite::Connection::open(&path)
                .map_err(|e| PromptStoreError::Transport(format!("open: {e}")))?;
            f(&conn).map_err(|e| PromptStoreError::Transport(format!("query: {e}")))
        })
        .await
        .map_err(|e| PromptStoreError::Transport(format!("join: {e}")))?
    }

    async fn ensure_default_version(&self, user_id: &str, company_id: &str) -> Result<(), PromptStoreError> {
        let user_id_owned = user_id.to_string();
        let company_id_owned = company_id.to_string();
        self.run(move |conn| {
            let exists: i64 = conn.query_row(
                "SELECT COUNT(*) FROM prompt_versions WHERE user_id = ?1 AND company_id = ?2 AND label = 'default'",
                rusqlite::params![user_id_owned, company_id_owned],
                |row| row.get(0),
            )?;
            if exists == 0 {
                conn.execute(
                    "INSERT INTO prompt_versions (id, user_id, company_id, label, text, active, created_at)
                     VALUES ('default', ?1, ?2, 'default', '', 1, ?3)",
                    rusqlite::params![user_id_owned, company_id_owned, Utc::now().to_rfc3339()],
                )?;
            }
            Ok(())
        })
        .await
    }
}

fn row_to_specialist(row: &rusqlite::Row) -> rusqlite::Result<Specialist> {
    Ok(Specialist {
        id: row.get(0)?,
        user_id: row.get(1)?,
        company_id: row.get(2)?,
        name: row.get(3)?,
        description: row.get(4)?,
        system_prompt: row.get(5)?,
    })
}

fn row_to_version(row: &rusqlite::Row) -> rusqlite::Result<PromptVersion> {
    Ok(PromptVersion {
        id: row.get(0)?,
        label: row.get(1)?,
        text: row.get(2)?,
        active: row.get::<_, i64>(3)? != 0,
        created_at: row
            .get::<_, String>(4)?
            .parse()
            .unwrap_or_else(|_| Utc::now()),
    })
}

#[async_trait]
impl PromptStore for SqlitePromptStore {
    async fn get_system_prompt(&self, user_id: &str, company_id: &str) -> Result<String, PromptStoreError> {
        let user_id = user_id.to_string();
        let company_id = company_id.to_string();
        self.run(move |conn| {
            conn.query_row(
                "SELECT text FROM system_prompts WHERE user_id = ?1 AND company_id = ?2",
                rusqlite::params![user_id, company_id],
                |row| row.get(0),
            )
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(String::new()),
                other => Err(other),
            })
        })
        .await
    }

    async fn upsert_system_prompt(
        &self,
        user_id: &str,
        company_id: &str,
        text: &str,
    ) -> Result<(), PromptStoreError> {
        validate_system_prompt(text)?;
        let user_id = user_id.to_string();
        let company_id = company_id.to_string();
        let text = text.to_string();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO system_prompts (user_id, company_id, text) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id, company_id) DO UPDATE SET text = excluded.text",
                rusqlite::params![user_id, company_id, text],
            )?;
            Ok(())
        })
        .await
    }

    async fn create_specialist(
        &self,
        user_id: &str,
        company_id: &str,
        name: &str,
        description: &str,
        system_prompt: &str,
    ) -> Result<Specialist, PromptStoreError> {
        validate_specialist_name(name)?;
        validate_specialist_description(description)?;
        validate_specialist_prompt(system_prompt)?;
        let specialist = Specialist {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            company_id: company_id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            system_prompt: system_prompt.to_string(),
        };
        let insert = specialist.clone();
        let existing_names = self.list_specialists(user_id, company_id).await?;
        if existing_names.iter().any(|s| s.name == name) {
            return Err(PromptStoreError::DuplicateName);
        }
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO specialists (id, user_id, company_id, name, description, system_prompt)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    insert.id,
                    insert.user_id,
                    insert.company_id,
                    insert.name,
                    insert.description,
                    insert.system_prompt,
                ],
            )?;
            Ok(())
        })
        .await?;
        Ok(specialist)
    }

    async fn get_specialist(&self, id: &str, user_id: &str, company_id: &str) -> Result<Specialist, PromptStoreError> {
        let id = id.to_string();
        let specialist = self
            .run(move |conn| {
                conn.query_row(
                    "SELECT id, user_id, company_id, name, description, system_prompt FROM specialists WHERE id = ?1",
                    [&id],
                    row_to_specialist,
                )
            })
            .await
            .map_err(|_| PromptStoreError::NotFound)?;
        if specialist.user_id != user_id || specialist.company_id != company_id {
            return Err(PromptStoreError::NotFound);
        }
        Ok(specialist)
    }

    async fn list_specialists(&self, user_id: &str, company_id: &str) -> Result<Vec<Specialist>, PromptStoreError> {
        let user_id = user_id.to_string();
        let company_id = company_id.to_string();
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, company_id, name, description, system_prompt
                 FROM specialists WHERE user_id = ?1 AND company_id = ?2 ORDER BY name ASC",
            )?;
            let rows = stmt.query_map(rusqlite::params![user_id, company_id], row_to_specialist)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
    }

    async fn update_specialist(
        &self,
        id: &str,
        user_id: &str,
        company_id: &str,
        name: Option<&str>,
        description: Option<&str>,
        system_prompt: Option<&str>,
    ) -> Result<Specialist, PromptStoreError> {
        let mut current = self.get_specialist(id, user_id, company_id).await?;
        if let Some(name) = name {
            validate_specialist_name(name)?;
            let dup = self
                .list_specialists(user_id, company_id)
                .await?
                .into_iter()
                .any(|s| s.id != id && s.name == name);
            if dup {
                return Err(PromptStoreError::DuplicateName);
            }
            current.name = name.to_string();
        }
        if let Some(description) = description {
            validate_specialist_description(description)?;
            current.description = description.to_string();
        }
        if let Some(system_prompt) = system_prompt {
            validate_specialist_prompt(system_prompt)?;
            current.system_prompt = system_prompt.to_string();
        }
        let update = current.clone();
        self.run(move |conn| {
            conn.execute(
                "UPDATE specialists SET name = ?1, description = ?2, system_prompt = ?3 WHERE id = ?4",
                rusqlite::params![update.name, update.description, update.system_prompt, update.id],
            )?;
            Ok(())
        })
        .await?;
        Ok(current)
    }

    async fn delete_specialist(&self, id: &str, user_id: &str, company_id: &str) -> Result<(), PromptStoreError> {
        let _ = self.get_specialist(id, user_id, company_id).await?;
        let id = id.to_string();
        self.run(move |conn| conn.execute("DELETE FROM specialists WHERE id = ?1", [id]))
            .await?;
        Ok(())
    }

    async fn list_versions(&self, user_id: &str, company_id: &str) -> Result<Vec<PromptVersion>, PromptStoreError> {
        self.ensure_default_version(user_id, company_id).await?;
        let user_id = user_id.to_string();
        let company_id = company_id.to_string();
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, label, text, active, created_at FROM prompt_versions
                 WHERE user_id = ?1 AND company_id = ?2 ORDER BY created_at ASC",
            )?;
            let rows = stmt.query_map(rusqlite::params![user_id, company_id], row_to_version)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
    }

    async fn get_version(
        &self,
        version_id: &str,
        user_id: &str,
        company_id: &str,
    ) -> Result<PromptVersion, PromptStoreError> {
        self.list_versions(user_id, company_id)
            .await?
            .into_iter()
            .find(|v| v.id == version_id)
            .ok_or(PromptStoreError::NotFound)
    }

    async fn create_version(
        &self,
        user_id: &str,
        company_id: &str,
        label: &str,
        text: &str,
        activate: bool,
    ) -> Result<PromptVersion, PromptStoreError> {
        validate_system_prompt(text)?;
        self.ensure_default_version(user_id, company_id).await?;
        let version = PromptVersion {
            id: Uuid::new_v4().to_string(),
            label: label.to_string(),
            text: text.to_string(),
            active: activate,
            created_at: Utc::now(),
        };
        let insert = version.clone();
        let user_id_owned = user_id.to_string();
        let company_id_owned = company_id.to_string();
        self.run(move |conn| {
            if insert.active {
                conn.execute(
                    "UPDATE prompt_versions SET active = 0 WHERE user_id = ?1 AND company_id = ?2",
                    rusqlite::params![user_id_owned, company_id_owned],
                )?;
            }
            conn.execute(
                "INSERT INTO prompt_versions (id, user_id, company_id, label, text, active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    insert.id,
                    user_id_owned,
                    company_id_owned,
                    insert.label,
                    insert.text,
                    insert.active as i64,
                    insert.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await?;
        if activate {
            self.upsert_system_prompt(user_id, company_id, text).await?;
        }
        Ok(version)
    }

    async fn activate_version(
        &self,
        version_id: &str,
        user_id: &str,
        company_id: &str,
    ) -> Result<(), PromptStoreError> {
        let target = self.get_version(version_id, user_id, company_id).await?;
        let user_id_owned = user_id.to_string();
        let company_id_owned = company_id.to_string();
        let version_id_owned = version_id.to_string();
        self.run(move |conn| {
            conn.execute(
                "UPDATE prompt_versions SET active = 0 WHERE user_id = ?1 AND company_id = ?2",
                rusqlite::params![user_id_owned, company_id_owned],
            )?;
            conn.execute(
                "UPDATE prompt_versions SET active = 1 WHERE id = ?1",
                [version_id_owned],
            )?;
            Ok(())
        })
        .await?;
        self.upsert_system_prompt(user_id, company_id, &target.text).await?;
        Ok(())
    }

    async fn delete_version(&self, version_id: &str, user_id: &str, company_id: &str) -> Result<(), PromptStoreError> {
        let target = self.get_version(version_id, user_id, company_id).await?;
        if target.label == DEFAULT_VERSION_LABEL {
            return Err(PromptStoreError::Validation(
                "the default version cannot be deleted".to_string(),
            ));
        }
        if target.active {
            return Err(PromptStoreError::Validation(
                "the active version cannot be deleted".to_string(),
            ));
        }
        let version_id = version_id.to_string();
        self.run(move |conn| conn.execute("DELETE FROM prompt_versions WHERE id = ?1", [version_id]))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn roundtrip<S: PromptStore>(store: &S) {
        assert_eq!(store.get_system_prompt("u1", "c1").await.unwrap(), "");
        store.upsert_system_prompt("u1", "c1", "Be concise.").await.unwrap();
        assert_eq!(store.get_system_prompt("u1", "c1").await.unwrap(), "Be concise.");

        let specialist = store
            .create_specialist("u1", "c1", "DevOps", "Kubernetes helper", "You are a Kubernetes expert.")
            .await
            .unwrap();
        assert!(store
            .create_specialist("u1", "c1", "DevOps", "dup", "x")
            .await
            .is_err());
        let listed = store.list_specialists("u1", "c1").await.unwrap();
        assert_eq!(listed.len(), 1);

        let updated = store
            .update_specialist(&specialist.id, "u1", "c1", None, None, Some("Updated prompt."))
            .await
            .unwrap();
        assert_eq!(updated.system_prompt, "Updated prompt.");

        store.delete_specialist(&specialist.id, "u1", "c1").await.unwrap();
        assert!(store.get_specialist(&specialist.id, "u1", "c1").await.is_err());

        let versions = store.list_versions("u1", "c1").await.unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].label, DEFAULT_VERSION_LABEL);
        assert!(store.delete_version(&versions[0].id, "u1", "c1").await.is_err());

        let v2 = store
            .create_version("u1", "c1", "v2", "New system prompt.", true)
            .await
            .unwrap();
        assert_eq!(store.get_system_prompt("u1", "c1").await.unwrap(), "New system prompt.");
        assert!(store.delete_version(&v2.id, "u1", "c1").await.is_err());

        let v3 = store.create_version("u1", "c1", "v3", "Another.", false).await.unwrap();
        store.activate_version(&v3.id, "u1", "c1").await.unwrap();
        assert_eq!(store.get_system_prompt("u1", "c1").await.unwrap(), "Another.");
        store.delete_version(&v2.id, "u1", "c1").await.unwrap();
    }

    #[tokio::test]
    async fn in_memory_prompt_store_roundtrip() {
        roundtrip(&InMemoryPromptStore::new()).await;
    }

    #[tokio::test]
    async fn sqlite_prompt_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqlitePromptStore::open(dir.path().join("prompts.db")).unwrap();
        roundtrip(&store).await;
    }

    #[tokio::test]
    async fn specialist_name_length_is_validated() {
        let store = InMemoryPromptStore::new();
        assert!(store.create_specialist("u1", "c1", "ab", "", "x").await.is_err());
    }
}
