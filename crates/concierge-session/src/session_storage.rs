//! SQLite connection, schema and table-shape helpers.
use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Table layouts a session database may carry, newest first.
pub(super) enum CountShape {
    /// `agent_messages.session_id` holds the session id text.
    DirectMessages,
    /// `agent_messages.session_id` references an integer `agent_sessions.id`.
    JoinedMessages,
    /// Older stores keep one row per item in `items(session_id, ...)`.
    LegacyItems,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingOutcome {
    MessageCount(usize),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionListingEntry {
    pub session_id: String,
    pub outcome: ListingOutcome,
}

pub(super) fn open_session_sqlite_connection(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create session directory {}", parent.display())
            })?;
        }
    }
    let connection = Connection::open(path)
        .with_context(|| format!("failed to open sqlite session store {}", path.display()))?;
    connection.busy_timeout(Duration::from_secs(5))?;
    connection.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        "#,
    )?;
    Ok(connection)
}

pub(super) fn initialize_session_sqlite_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS agent_sessions (
                session_id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS agent_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                message_data TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (session_id) REFERENCES agent_sessions (session_id)
                    ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_agent_messages_session_id
                ON agent_messages (session_id, id);
            "#,
        )
        .context("failed to initialize sqlite session schema")?;
    Ok(())
}

pub(super) fn is_sqlite_file(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    let mut file = fs::File::open(path)
        .with_context(|| format!("failed to inspect session file {}", path.display()))?;
    let mut prefix = [0u8; 16];
    let read = std::io::Read::read(&mut file, &mut prefix)?;
    if read < 16 {
        return Ok(false);
    }
    Ok(&prefix == b"SQLite format 3\0")
}

fn table_names(connection: &Connection) -> Result<Vec<String>> {
    let mut statement =
        connection.prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")?;
    let names = statement
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(names)
}

fn table_columns(connection: &Connection, table: &str) -> Result<Vec<(String, String)>> {
    let mut statement = connection.prepare("SELECT name, type FROM pragma_table_info(?1)")?;
    let columns = statement
        .query_map([table], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

pub(super) fn detect_count_shape(connection: &Connection) -> Result<CountShape> {
    let tables = table_names(connection)?;
    let has_table = |name: &str| tables.iter().any(|table| table == name);

    if has_table("agent_messages") {
        if has_table("agent_sessions") {
            let integer_id = table_columns(connection, "agent_sessions")?
                .iter()
                .any(|(name, kind)| name == "id" && kind.eq_ignore_ascii_case("INTEGER"));
            if integer_id {
                return Ok(CountShape::JoinedMessages);
            }
        }
        return Ok(CountShape::DirectMessages);
    }
    if has_table("items") {
        return Ok(CountShape::LegacyItems);
    }
    Ok(CountShape::Empty)
}

pub(super) fn count_session_items(
    connection: &Connection,
    shape: CountShape,
    session_id: &str,
) -> Result<usize> {
    let sql = match shape {
        CountShape::DirectMessages => "SELECT COUNT(*) FROM agent_messages WHERE session_id = ?1",
        CountShape::JoinedMessages => {
            "SELECT COUNT(*) FROM agent_messages \
             JOIN agent_sessions ON agent_messages.session_id = agent_sessions.id \
             WHERE agent_sessions.session_id = ?1"
        }
        CountShape::LegacyItems => "SELECT COUNT(*) FROM items WHERE session_id = ?1",
        CountShape::Empty => return Ok(0),
    };
    let count: i64 = connection
        .query_row(sql, [session_id], |row| row.get(0))
        .with_context(|| format!("failed to count items for session '{session_id}'"))?;
    Ok(usize::try_from(count).unwrap_or_default())
}

fn session_ids(connection: &Connection) -> Result<Vec<String>> {
    let tables = table_names(connection)?;
    let has_table = |name: &str| tables.iter().any(|table| table == name);
    let sql = if has_table("agent_sessions") {
        "SELECT DISTINCT session_id FROM agent_sessions ORDER BY session_id"
    } else if has_table("items") {
        "SELECT DISTINCT session_id FROM items ORDER BY session_id"
    } else if has_table("sessions") {
        "SELECT DISTINCT CAST(id AS TEXT) FROM sessions ORDER BY 1"
    } else {
        return Ok(Vec::new());
    };

    let mut statement = connection.prepare(sql)?;
    let ids = statement
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
}

/// Enumerates every session id in `path` with its item count. A failed count is reported on its
/// entry and enumeration continues.
pub fn list_sessions(path: &Path) -> Result<Vec<SessionListingEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    if !is_sqlite_file(path)? {
        bail!("{} is not a SQLite session database", path.display());
    }

    let connection = open_session_sqlite_connection(path)?;
    let ids = session_ids(&connection)
        .with_context(|| format!("failed to enumerate sessions in {}", path.display()))?;
    let shape = detect_count_shape(&connection);

    let entries = ids
        .into_iter()
        .map(|session_id| {
            let counted = shape
                .as_ref()
                .map_err(|error| anyhow!("{error:#}"))
                .and_then(|shape| count_session_items(&connection, *shape, &session_id));
            let outcome = match counted {
                Ok(count) => ListingOutcome::MessageCount(count),
                Err(error) => {
                    tracing::debug!(
                        session_id = %session_id,
                        error = %error,
                        "session count failed"
                    );
                    ListingOutcome::Error(format!("{error:#}"))
                }
            };
            SessionListingEntry {
                session_id,
                outcome,
            }
        })
        .collect();
    Ok(entries)
}
