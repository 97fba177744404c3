use crate::domain::models::CalendarTimeEntry;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::parse_utc_text;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub trait EntryRepository: Send + Sync {
    fn save(&self, entry: &CalendarTimeEntry) -> Result<(), InfraError>;
    /// Replaces the stored row; `NotFound` when the id does not exist.
    fn update(&self, entry: &CalendarTimeEntry) -> Result<(), InfraError>;
    fn delete(&self, entry_id: &str) -> Result<bool, InfraError>;
    fn get_by_id(&self, entry_id: &str) -> Result<Option<CalendarTimeEntry>, InfraError>;
    fn get_for_date(&self, date_key: &str) -> Result<Vec<CalendarTimeEntry>, InfraError>;
    fn get_in_date_range(
        &self,
        start_key: &str,
        end_key: &str,
    ) -> Result<Vec<CalendarTimeEntry>, InfraError>;
    fn get_all(&self) -> Result<Vec<CalendarTimeEntry>, InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteEntryRepository {
    db_path: PathBuf,
}

impl SqliteEntryRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

const SELECT_COLUMNS: &str = "id, date, activity, category, start_time, end_time, \
     duration_minutes, mood_rating, emotional_tags, reflection, created_at, updated_at";

fn row_to_entry(row: &Row) -> Result<CalendarTimeEntry, InfraError> {
    let start_time: String = row.get("start_time")?;
    let end_time: String = row.get("end_time")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let mood_rating: Option<i64> = row.get("mood_rating")?;
    let emotional_tags: String = row.get("emotional_tags")?;

    Ok(CalendarTimeEntry {
        id: row.get("id")?,
        date: row.get("date")?,
        activity: row.get("activity")?,
        category: row.get("category")?,
        start_time: parse_utc_text(&start_time, "entry.start_time")?,
        end_time: parse_utc_text(&end_time, "entry.end_time")?,
        duration_minutes: row.get("duration_minutes")?,
        mood_rating: mood_rating.map(|value| value as u8),
        emotional_tags: serde_json::from_str(&emotional_tags)?,
        reflection: row.get("reflection")?,
        created_at: parse_utc_text(&created_at, "entry.created_at")?,
        updated_at: parse_utc_text(&updated_at, "entry.updated_at")?,
    })
}

fn entry_params(entry: &CalendarTimeEntry) -> Result<Vec<rusqlite::types::Value>, InfraError> {
    Ok(vec![
        entry.id.clone().into(),
        entry.date.clone().into(),
        entry.activity.clone().into(),
        entry.category.clone().into(),
        entry.start_time.to_rfc3339().into(),
        entry.end_time.to_rfc3339().into(),
        entry.duration_minutes.into(),
        entry
            .mood_rating
            .map(i64::from)
            .map_or(rusqlite::types::Value::Null, Into::into),
        serde_json::to_string(&entry.emotional_tags)?.into(),
        entry
            .reflection
            .clone()
            .map_or(rusqlite::types::Value::Null, Into::into),
        entry.created_at.to_rfc3339().into(),
        entry.updated_at.to_rfc3339().into(),
    ])
}

impl EntryRepository for SqliteEntryRepository {
    fn save(&self, entry: &CalendarTimeEntry) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO calendar_time_entries \
             (id, date, activity, category, start_time, end_time, duration_minutes, \
              mood_rating, emotional_tags, reflection, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            rusqlite::params_from_iter(entry_params(entry)?),
        )?;
        Ok(())
    }

    fn update(&self, entry: &CalendarTimeEntry) -> Result<(), InfraError> {
        let connection = self.connect()?;
        let mut values = entry_params(entry)?;
        let id = values.remove(0);
        values.push(id);
        let changed = connection.execute(
            "UPDATE calendar_time_entries SET \
             date = ?1, activity = ?2, category = ?3, start_time = ?4, end_time = ?5, \
             duration_minutes = ?6, mood_rating = ?7, emotional_tags = ?8, \
             reflection = ?9, created_at = ?10, updated_at = ?11 \
             WHERE id = ?12",
            rusqlite::params_from_iter(values),
        )?;
        if changed == 0 {
            return Err(InfraError::NotFound(format!("entry {}", entry.id)));
        }
        Ok(())
    }

    fn delete(&self, entry_id: &str) -> Result<bool, InfraError> {
        let connection = self.connect()?;
        let removed =
            connection.execute("DELETE FROM calendar_time_entries WHERE id = ?1", params![entry_id])?;
        Ok(removed > 0)
    }

    fn get_by_id(&self, entry_id: &str) -> Result<Option<CalendarTimeEntry>, InfraError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM calendar_time_entries WHERE id = ?1"
        ))?;
        let row = statement
            .query_row(params![entry_id], |row| {
                Ok(row_to_entry(row))
            })
            .optional()?;
        row.transpose()
    }

    fn get_for_date(&self, date_key: &str) -> Result<Vec<CalendarTimeEntry>, InfraError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM calendar_time_entries \
             WHERE date = ?1 ORDER BY start_time"
        ))?;
        collect_entries(statement.query_map(params![date_key], |row| Ok(row_to_entry(row)))?)
    }

    fn get_in_date_range(
        &self,
        start_key: &str,
        end_key: &str,
    ) -> Result<Vec<CalendarTimeEntry>, InfraError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM calendar_time_entries \
             WHERE date >= ?1 AND date <= ?2 ORDER BY start_time"
        ))?;
        collect_entries(
            statement.query_map(params![start_key, end_key], |row| Ok(row_to_entry(row)))?,
        )
    }

    fn get_all(&self) -> Result<Vec<CalendarTimeEntry>, InfraError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM calendar_time_entries ORDER BY start_time"
        ))?;
        collect_entries(statement.query_map([], |row| Ok(row_to_entry(row)))?)
    }
}

fn collect_entries(
    rows: impl Iterator<Item = rusqlite::Result<Result<CalendarTimeEntry, InfraError>>>,
) -> Result<Vec<CalendarTimeEntry>, InfraError> {
    let mut entries = Vec::new();
    for row in rows {
        entries.push(row??);
    }
    Ok(entries)
}

#[derive(Debug, Default)]
pub struct InMemoryEntryRepository {
    entries: Mutex<HashMap<String, CalendarTimeEntry>>,
}

impl InMemoryEntryRepository {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, CalendarTimeEntry>>, InfraError> {
        self.entries
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("entry lock poisoned: {error}")))
    }
}

impl EntryRepository for InMemoryEntryRepository {
    fn save(&self, entry: &CalendarTimeEntry) -> Result<(), InfraError> {
        self.lock()?.insert(entry.id.clone(), entry.clone());
        Ok(())
    }

    fn update(&self, entry: &CalendarTimeEntry) -> Result<(), InfraError> {
        let mut entries = self.lock()?;
        if !entries.contains_key(&entry.id) {
            return Err(InfraError::NotFound(format!("entry {}", entry.id)));
        }
        entries.insert(entry.id.clone(), entry.clone());
        Ok(())
    }

    fn delete(&self, entry_id: &str) -> Result<bool, InfraError> {
        Ok(self.lock()?.remove(entry_id).is_some())
    }

    fn get_by_id(&self, entry_id: &str) -> Result<Option<CalendarTimeEntry>, InfraError> {
        Ok(self.lock()?.get(entry_id).cloned())
    }

    fn get_for_date(&self, date_key: &str) -> Result<Vec<CalendarTimeEntry>, InfraError> {
        let mut entries = self
            .lock()?
            .values()
            .filter(|entry| entry.date == date_key)
            .cloned()
            .collect::<Vec<_>>();
        entries.sort_by(|left, right| left.start_time.cmp(&right.start_time));
        Ok(entries)
    }

    fn get_in_date_range(
        &self,
        start_key: &str,
        end_key: &str,
    ) -> Result<Vec<CalendarTimeEntry>, InfraError> {
        let mut entries = self
            .lock()?
            .values()
            .filter(|entry| entry.date.as_str() >= start_key && entry.date.as_str() <= end_key)
            .cloned()
            .collect::<Vec<_>>();
        entries.sort_by(|left, right| left.start_time.cmp(&right.start_time));
        Ok(entries)
    }

    fn get_all(&self) -> Result<Vec<CalendarTimeEntry>, InfraError> {
        let mut entries = self.lock()?.values().cloned().collect::<Vec<_>>();
        entries.sort_by(|left, right| left.start_time.cmp(&right.start_time));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::initialize_database;
    use chrono::{DateTime, Duration, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_DB: AtomicUsize = AtomicUsize::new(0);

    struct TempDb {
        path: PathBuf,
    }

    impl TempDb {
        fn new() -> Self {
            let sequence = NEXT_TEMP_DB.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "solace-entry-repo-tests-{}-{}.sqlite",
                std::process::id(),
                sequence
            ));
            initialize_database(&path).expect("initialize database");
            Self { path }
        }

        fn repository(&self) -> SqliteEntryRepository {
            SqliteEntryRepository::new(&self.path)
        }
    }

    impl Drop for TempDb {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn sample_entry(id: &str, start: &str, duration: i64) -> CalendarTimeEntry {
        let start_time = fixed_time(start);
        let end_time = start_time + Duration::minutes(duration);
        CalendarTimeEntry {
            id: id.to_string(),
            date: start_time.date_naive().to_string(),
            activity: "Walk".to_string(),
            category: "Movement".to_string(),
            start_time,
            end_time,
            duration_minutes: duration,
            mood_rating: Some(4),
            emotional_tags: vec!["fresh".to_string(), "light".to_string()],
            reflection: None,
            created_at: end_time,
            updated_at: end_time,
        }
    }

    #[test]
    fn sqlite_save_and_read_back_roundtrip() {
        let db = TempDb::new();
        let repository = db.repository();
        let entry = sample_entry("ent-1", "2026-03-02T09:00:00Z", 30);

        repository.save(&entry).expect("save entry");
        let loaded = repository
            .get_by_id("ent-1")
            .expect("read entry")
            .expect("entry exists");

        assert_eq!(loaded, entry);
    }

    #[test]
    fn sqlite_get_for_date_filters_and_sorts() {
        let db = TempDb::new();
        let repository = db.repository();
        repository
            .save(&sample_entry("ent-late", "2026-03-02T14:00:00Z", 30))
            .expect("save late");
        repository
            .save(&sample_entry("ent-early", "2026-03-02T08:00:00Z", 30))
            .expect("save early");
        repository
            .save(&sample_entry("ent-other-day", "2026-03-03T08:00:00Z", 30))
            .expect("save other day");

        let entries = repository.get_for_date("2026-03-02").expect("read day");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "ent-early");
        assert_eq!(entries[1].id, "ent-late");
    }

    #[test]
    fn sqlite_update_missing_entry_is_not_found() {
        let db = TempDb::new();
        let repository = db.repository();
        let entry = sample_entry("ghost", "2026-03-02T09:00:00Z", 30);

        match repository.update(&entry) {
            Err(InfraError::NotFound(_)) => {}
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn sqlite_delete_reports_whether_a_row_was_removed() {
        let db = TempDb::new();
        let repository = db.repository();
        repository
            .save(&sample_entry("ent-1", "2026-03-02T09:00:00Z", 30))
            .expect("save entry");

        assert!(repository.delete("ent-1").expect("delete"));
        assert!(!repository.delete("ent-1").expect("delete again"));
    }

    #[test]
    fn in_memory_behaves_like_sqlite_for_date_queries() {
        let repository = InMemoryEntryRepository::default();
        repository
            .save(&sample_entry("ent-b", "2026-03-02T14:00:00Z", 30))
            .expect("save");
        repository
            .save(&sample_entry("ent-a", "2026-03-02T08:00:00Z", 30))
            .expect("save");

        let entries = repository.get_for_date("2026-03-02").expect("read day");
        assert_eq!(entries[0].id, "ent-a");

        let ranged = repository
            .get_in_date_range("2026-03-01", "2026-03-05")
            .expect("read range");
        assert_eq!(ranged.len(), 2);
    }
}
