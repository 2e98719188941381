//! `--list-sessions` output and session store selection.
use super::*;

use concierge_session::{list_sessions, InMemorySessionStore, ListingOutcome, SqliteSessionStore};

pub(crate) fn write_session_listing(out: &mut impl Write, db_path: &Path) -> Result<()> {
    let display = db_path.display();
    if !db_path.exists() {
        writeln!(out, "No session database found at {display}")?;
        return Ok(());
    }
    let entries = match list_sessions(db_path) {
        Ok(entries) => entries,
        Err(error) => {
            writeln!(out, "Session error: {error:#}")?;
            return Ok(());
        }
    };
    if entries.is_empty() {
        writeln!(out, "No sessions found in {display}")?;
        return Ok(());
    }

    writeln!(out, "\nSessions in {display}:")?;
    for entry in entries {
        match entry.outcome {
            ListingOutcome::MessageCount(count) => {
                writeln!(out, "  - {}: {count} messages", entry.session_id)?
            }
            ListingOutcome::Error(message) => writeln!(
                out,
                "  - {}: Error retrieving message count: {message}",
                entry.session_id
            )?,
        }
    }
    out.flush().context("failed to flush session listing")?;
    Ok(())
}

pub(crate) fn open_session_store(
    cli: &Cli,
    session_id: &str,
) -> Result<Arc<dyn SessionStore>, AssistantError> {
    if cli.in_memory {
        return Ok(Arc::new(InMemorySessionStore::new(session_id)));
    }
    let store =
        SqliteSessionStore::open(cli.db_path.clone(), session_id).map_err(AssistantError::Session)?;
    Ok(Arc::new(store))
}
