use crate::domain::models::JournalEntry;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::parse_utc_text;
use rusqlite::{params, Connection, Row};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub trait JournalRepository: Send + Sync {
    fn save(&self, entry: &JournalEntry) -> Result<(), InfraError>;
    fn get_for_date(&self, date_key: &str) -> Result<Vec<JournalEntry>, InfraError>;
    fn get_all(&self) -> Result<Vec<JournalEntry>, InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteJournalRepository {
    db_path: PathBuf,
}

impl SqliteJournalRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

fn row_to_journal_entry(row: &Row) -> Result<JournalEntry, InfraError> {
    let created_at: String = row.get("created_at")?;
    Ok(JournalEntry {
        id: row.get("id")?,
        date: row.get("date")?,
        prompt: row.get("prompt")?,
        body: row.get("body")?,
        created_at: parse_utc_text(&created_at, "journal.created_at")?,
    })
}

impl JournalRepository for SqliteJournalRepository {
    fn save(&self, entry: &JournalEntry) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO journal_entries (id, date, prompt, body, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.id,
                entry.date,
                entry.prompt,
                entry.body,
                entry.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn get_for_date(&self, date_key: &str) -> Result<Vec<JournalEntry>, InfraError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(
            "SELECT id, date, prompt, body, created_at FROM journal_entries \
             WHERE date = ?1 ORDER BY created_at",
        )?;
        let rows = statement.query_map(params![date_key], |row| Ok(row_to_journal_entry(row)))?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row??);
        }
        Ok(entries)
    }

    fn get_all(&self) -> Result<Vec<JournalEntry>, InfraError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(
            "SELECT id, date, prompt, body, created_at FROM journal_entries ORDER BY created_at",
        )?;
        let rows = statement.query_map([], |row| Ok(row_to_journal_entry(row)))?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row??);
        }
        Ok(entries)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryJournalRepository {
    entries: Mutex<Vec<JournalEntry>>,
}

impl JournalRepository for InMemoryJournalRepository {
    fn save(&self, entry: &JournalEntry) -> Result<(), InfraError> {
        self.entries
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("journal lock poisoned: {error}")))?
            .push(entry.clone());
        Ok(())
    }

    fn get_for_date(&self, date_key: &str) -> Result<Vec<JournalEntry>, InfraError> {
        let entries = self
            .entries
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("journal lock poisoned: {error}")))?;
        Ok(entries
            .iter()
            .filter(|entry| entry.date == date_key)
            .cloned()
            .collect())
    }

    fn get_all(&self) -> Result<Vec<JournalEntry>, InfraError> {
        let entries = self
            .entries
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("journal lock poisoned: {error}")))?;
        Ok(entries.clone())
    }
}
