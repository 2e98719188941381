//! Session store trait and its in-memory and SQLite backends.
use super::*;

use super::session_storage::{
    count_session_items, detect_count_shape, initialize_session_sqlite_schema,
    open_session_sqlite_connection,
};

/// Append-only item log for one session id.
pub trait SessionStore: Send + Sync {
    fn session_id(&self) -> &str;
    fn is_persistent(&self) -> bool;
    /// Items in insertion order; with `Some(n)`, only the latest `n`.
    fn get_items(&self, limit: Option<usize>) -> Result<Vec<ConversationItem>>;
    fn add_items(&self, items: &[ConversationItem]) -> Result<()>;
    fn pop_item(&self) -> Result<Option<ConversationItem>>;
    fn clear(&self) -> Result<()>;
    fn count(&self) -> Result<usize>;
}

fn latest(items: &[ConversationItem], limit: Option<usize>) -> Vec<ConversationItem> {
    let skip = limit.map_or(0, |limit| items.len().saturating_sub(limit));
    items[skip..].to_vec()
}

#[derive(Debug)]
pub struct InMemorySessionStore {
    session_id: String,
    items: Mutex<Vec<ConversationItem>>,
}

impl InMemorySessionStore {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            items: Mutex::new(Vec::new()),
        }
    }

    fn items(&self) -> Result<std::sync::MutexGuard<'_, Vec<ConversationItem>>> {
        self.items
            .lock()
            .map_err(|_| anyhow!("session item lock is poisoned"))
    }
}

impl SessionStore for InMemorySessionStore {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn is_persistent(&self) -> bool {
        false
    }

    fn get_items(&self, limit: Option<usize>) -> Result<Vec<ConversationItem>> {
        Ok(latest(&self.items()?, limit))
    }

    fn add_items(&self, items: &[ConversationItem]) -> Result<()> {
        self.items()?.extend_from_slice(items);
        Ok(())
    }

    fn pop_item(&self) -> Result<Option<ConversationItem>> {
        Ok(self.items()?.pop())
    }

    fn clear(&self) -> Result<()> {
        self.items()?.clear();
        Ok(())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.items()?.len())
    }
}

#[derive(Debug, Clone)]
/// Durable store; every operation opens its own connection so the file can be shared.
pub struct SqliteSessionStore {
    path: PathBuf,
    session_id: String,
}

impl SqliteSessionStore {
    pub fn open(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Result<Self> {
        let store = Self {
            path: path.into(),
            session_id: session_id.into(),
        };
        let connection = store.connection()?;
        connection
            .execute(
                "INSERT OR IGNORE INTO agent_sessions (session_id) VALUES (?1)",
                [&store.session_id],
            )
            .with_context(|| format!("failed to register session '{}'", store.session_id))?;
        tracing::debug!(
            session_id = %store.session_id,
            path = %store.path.display(),
            "opened sqlite session store"
        );
        Ok(store)
    }

    fn connection(&self) -> Result<Connection> {
        let connection = open_session_sqlite_connection(&self.path)?;
        initialize_session_sqlite_schema(&connection)?;
        Ok(connection)
    }

    fn decode(&self, id: i64, raw: &str) -> Result<ConversationItem> {
        serde_json::from_str(raw).with_context(|| {
            format!(
                "failed to decode item {id} of session '{}' in {}",
                self.session_id,
                self.path.display()
            )
        })
    }
}

impl SessionStore for SqliteSessionStore {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn is_persistent(&self) -> bool {
        true
    }

    fn get_items(&self, limit: Option<usize>) -> Result<Vec<ConversationItem>> {
        let connection = self.connection()?;
        let limit = limit.map_or(-1, |limit| i64::try_from(limit).unwrap_or(i64::MAX));
        let mut statement = connection.prepare(
            r#"
            SELECT id, message_data FROM (
                SELECT id, message_data
                FROM agent_messages
                WHERE session_id = ?1
                ORDER BY id DESC
                LIMIT ?2
            )
            ORDER BY id ASC
            "#,
        )?;
        let mut rows = statement.query(params![self.session_id, limit])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            let id: i64 = row.get(0)?;
            let raw: String = row.get(1)?;
            items.push(self.decode(id, &raw)?);
        }
        Ok(items)
    }

    fn add_items(&self, items: &[ConversationItem]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let mut connection = self.connection()?;
        let transaction = connection.transaction()?;
        for item in items {
            let raw = serde_json::to_string(item).context("failed to encode conversation item")?;
            transaction.execute(
                "INSERT INTO agent_messages (session_id, message_data) VALUES (?1, ?2)",
                params![self.session_id, raw],
            )?;
        }
        transaction.execute(
            r#"
            INSERT INTO agent_sessions (session_id) VALUES (?1)
            ON CONFLICT (session_id) DO UPDATE SET updated_at = CURRENT_TIMESTAMP
            "#,
            [&self.session_id],
        )?;
        transaction.commit()?;
        Ok(())
    }

    fn pop_item(&self) -> Result<Option<ConversationItem>> {
        let mut connection = self.connection()?;
        let transaction = connection.transaction()?;
        let last = transaction
            .query_row(
                r#"
                SELECT id, message_data FROM agent_messages
                WHERE session_id = ?1
                ORDER BY id DESC
                LIMIT 1
                "#,
                [&self.session_id],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;
        let Some((id, raw)) = last else {
            return Ok(None);
        };
        transaction.execute("DELETE FROM agent_messages WHERE id = ?1", [id])?;
        transaction.commit()?;
        self.decode(id, &raw).map(Some)
    }

    fn clear(&self) -> Result<()> {
        let connection = self.connection()?;
        connection
            .execute(
                "DELETE FROM agent_messages WHERE session_id = ?1",
                [&self.session_id],
            )
            .with_context(|| format!("failed to clear session '{}'", self.session_id))?;
        tracing::debug!(session_id = %self.session_id, "cleared session items");
        Ok(())
    }

    fn count(&self) -> Result<usize> {
        let connection = open_session_sqlite_connection(&self.path)?;
        let shape = detect_count_shape(&connection)?;
        count_session_items(&connection, shape, &self.session_id)
    }
}
