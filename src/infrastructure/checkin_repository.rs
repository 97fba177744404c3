use crate::domain::models::CheckIn;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::parse_utc_text;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub trait CheckInRepository: Send + Sync {
    /// One check-in per day: inserting on an existing date updates the
    /// recorded levels and keeps the original id and created_at.
    fn upsert(&self, check_in: &CheckIn) -> Result<(), InfraError>;
    fn get_for_date(&self, date_key: &str) -> Result<Option<CheckIn>, InfraError>;
    fn get_in_date_range(&self, start_key: &str, end_key: &str) -> Result<Vec<CheckIn>, InfraError>;
    fn get_all(&self) -> Result<Vec<CheckIn>, InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteCheckInRepository {
    db_path: PathBuf,
}

impl SqliteCheckInRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

const SELECT_COLUMNS: &str = "id, date, energy_level, positivity_level, focus_level, \
     sleep_quality, emotions, main_goal, created_at, updated_at";

fn row_to_check_in(row: &Row) -> Result<CheckIn, InfraError> {
    let focus_level: Option<i64> = row.get("focus_level")?;
    let sleep_quality: Option<i64> = row.get("sleep_quality")?;
    let emotions: String = row.get("emotions")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let energy_level: i64 = row.get("energy_level")?;
    let positivity_level: i64 = row.get("positivity_level")?;

    Ok(CheckIn {
        id: row.get("id")?,
        date: row.get("date")?,
        energy_level: energy_level as u8,
        positivity_level: positivity_level as u8,
        focus_level: focus_level.map(|value| value as u8),
        sleep_quality: sleep_quality.map(|value| value as u8),
        emotions: serde_json::from_str(&emotions)?,
        main_goal: row.get("main_goal")?,
        created_at: parse_utc_text(&created_at, "check_in.created_at")?,
        updated_at: parse_utc_text(&updated_at, "check_in.updated_at")?,
    })
}

impl CheckInRepository for SqliteCheckInRepository {
    fn upsert(&self, check_in: &CheckIn) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO check_ins \
             (id, date, energy_level, positivity_level, focus_level, sleep_quality, \
              emotions, main_goal, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
             ON CONFLICT(date) DO UPDATE SET \
               energy_level = excluded.energy_level, \
               positivity_level = excluded.positivity_level, \
               focus_level = excluded.focus_level, \
               sleep_quality = excluded.sleep_quality, \
               emotions = excluded.emotions, \
               main_goal = excluded.main_goal, \
               updated_at = excluded.updated_at",
            params![
                check_in.id,
                check_in.date,
                i64::from(check_in.energy_level),
                i64::from(check_in.positivity_level),
                check_in.focus_level.map(i64::from),
                check_in.sleep_quality.map(i64::from),
                serde_json::to_string(&check_in.emotions)?,
                check_in.main_goal,
                check_in.created_at.to_rfc3339(),
                check_in.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn get_for_date(&self, date_key: &str) -> Result<Option<CheckIn>, InfraError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM check_ins WHERE date = ?1"
        ))?;
        let row = statement
            .query_row(params![date_key], |row| Ok(row_to_check_in(row)))
            .optional()?;
        row.transpose()
    }

    fn get_in_date_range(&self, start_key: &str, end_key: &str) -> Result<Vec<CheckIn>, InfraError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM check_ins \
             WHERE date >= ?1 AND date <= ?2 ORDER BY date"
        ))?;
        let rows = statement.query_map(params![start_key, end_key], |row| Ok(row_to_check_in(row)))?;
        let mut check_ins = Vec::new();
        for row in rows {
            check_ins.push(row??);
        }
        Ok(check_ins)
    }

    fn get_all(&self) -> Result<Vec<CheckIn>, InfraError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM check_ins ORDER BY date"
        ))?;
        let rows = statement.query_map([], |row| Ok(row_to_check_in(row)))?;
        let mut check_ins = Vec::new();
        for row in rows {
            check_ins.push(row??);
        }
        Ok(check_ins)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCheckInRepository {
    check_ins: Mutex<HashMap<String, CheckIn>>,
}

impl InMemoryCheckInRepository {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, CheckIn>>, InfraError> {
        self.check_ins
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("check-in lock poisoned: {error}")))
    }
}

impl CheckInRepository for InMemoryCheckInRepository {
    fn upsert(&self, check_in: &CheckIn) -> Result<(), InfraError> {
        let mut check_ins = self.lock()?;
        let stored = match check_ins.get(&check_in.date) {
            Some(existing) => CheckIn {
                id: existing.id.clone(),
                created_at: existing.created_at,
                ..check_in.clone()
            },
            None => check_in.clone(),
        };
        check_ins.insert(check_in.date.clone(), stored);
        Ok(())
    }

    fn get_for_date(&self, date_key: &str) -> Result<Option<CheckIn>, InfraError> {
        Ok(self.lock()?.get(date_key).cloned())
    }

    fn get_in_date_range(&self, start_key: &str, end_key: &str) -> Result<Vec<CheckIn>, InfraError> {
        let mut check_ins = self
            .lock()?
            .values()
            .filter(|check_in| {
                check_in.date.as_str() >= start_key && check_in.date.as_str() <= end_key
            })
            .cloned()
            .collect::<Vec<_>>();
        check_ins.sort_by(|left, right| left.date.cmp(&right.date));
        Ok(check_ins)
    }

    fn get_all(&self) -> Result<Vec<CheckIn>, InfraError> {
        let mut check_ins = self.lock()?.values().cloned().collect::<Vec<_>>();
        check_ins.sort_by(|left, right| left.date.cmp(&right.date));
        Ok(check_ins)
    }
}
