use crate::domain::models::{Insight, InsightType};
use crate::domain::periods::TimePeriod;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::{format_naive_text, parse_naive_text, parse_utc_text};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub trait InsightRepository: Send + Sync {
    /// Swaps the cached set for a period: the previous rows are removed and
    /// the new set inserted together, so readers never see a partial set.
    fn replace_for_period(
        &self,
        period: TimePeriod,
        period_start: NaiveDateTime,
        period_end: NaiveDateTime,
        insights: &[Insight],
    ) -> Result<(), InfraError>;
    fn get_for_period(
        &self,
        period: TimePeriod,
        period_start: NaiveDateTime,
        period_end: NaiveDateTime,
    ) -> Result<Vec<Insight>, InfraError>;
    fn get_by_hash(&self, data_hash: &str, period: TimePeriod) -> Result<Vec<Insight>, InfraError>;
    fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteInsightRepository {
    db_path: PathBuf,
}

impl SqliteInsightRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

const SELECT_COLUMNS: &str = "id, content, insight_type, icon, time_period, period_start, \
     period_end, data_hash, data_version, generated_at, metadata";

fn row_to_insight(row: &Row) -> Result<Insight, InfraError> {
    let insight_type: String = row.get("insight_type")?;
    let time_period: String = row.get("time_period")?;
    let period_start: String = row.get("period_start")?;
    let period_end: String = row.get("period_end")?;
    let generated_at: String = row.get("generated_at")?;
    let data_version: i64 = row.get("data_version")?;
    let metadata: Option<String> = row.get("metadata")?;

    Ok(Insight {
        id: row.get("id")?,
        content: row.get("content")?,
        insight_type: InsightType::parse(&insight_type).ok_or_else(|| {
            InfraError::InvalidConfig(format!("unknown insight_type '{insight_type}'"))
        })?,
        icon: row.get("icon")?,
        time_period: TimePeriod::parse(&time_period).ok_or_else(|| {
            InfraError::InvalidConfig(format!("unknown time_period '{time_period}'"))
        })?,
        period_start: parse_naive_text(&period_start, "insight.period_start")?,
        period_end: parse_naive_text(&period_end, "insight.period_end")?,
        data_hash: row.get("data_hash")?,
        data_version: data_version as u32,
        generated_at: parse_utc_text(&generated_at, "insight.generated_at")?,
        metadata: metadata.map(|raw| serde_json::from_str(&raw)).transpose()?,
    })
}

impl InsightRepository for SqliteInsightRepository {
    fn replace_for_period(
        &self,
        period: TimePeriod,
        period_start: NaiveDateTime,
        period_end: NaiveDateTime,
        insights: &[Insight],
    ) -> Result<(), InfraError> {
        let mut connection = self.connect()?;
        let transaction = connection.transaction()?;
        transaction.execute(
            "DELETE FROM insights \
             WHERE time_period = ?1 AND period_start = ?2 AND period_end = ?3",
            params![
                period.as_str(),
                format_naive_text(period_start),
                format_naive_text(period_end),
            ],
        )?;
        for insight in insights {
            let metadata = insight
                .metadata
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;
            transaction.execute(
                "INSERT INTO insights \
                 (id, content, insight_type, icon, time_period, period_start, period_end, \
                  data_hash, data_version, generated_at, metadata, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    insight.id,
                    insight.content,
                    insight.insight_type.as_str(),
                    insight.icon,
                    insight.time_period.as_str(),
                    format_naive_text(insight.period_start),
                    format_naive_text(insight.period_end),
                    insight.data_hash,
                    i64::from(insight.data_version),
                    insight.generated_at.to_rfc3339(),
                    metadata,
                    insight.generated_at.to_rfc3339(),
                ],
            )?;
        }
        transaction.commit()?;
        Ok(())
    }

    fn get_for_period(
        &self,
        period: TimePeriod,
        period_start: NaiveDateTime,
        period_end: NaiveDateTime,
    ) -> Result<Vec<Insight>, InfraError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM insights \
             WHERE time_period = ?1 AND period_start = ?2 AND period_end = ?3 \
             ORDER BY id"
        ))?;
        let rows = statement.query_map(
            params![
                period.as_str(),
                format_naive_text(period_start),
                format_naive_text(period_end),
            ],
            |row| Ok(row_to_insight(row)),
        )?;
        let mut insights = Vec::new();
        for row in rows {
            insights.push(row??);
        }
        Ok(insights)
    }

    fn get_by_hash(&self, data_hash: &str, period: TimePeriod) -> Result<Vec<Insight>, InfraError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM insights \
             WHERE data_hash = ?1 AND time_period = ?2 ORDER BY id"
        ))?;
        let rows = statement.query_map(params![data_hash, period.as_str()], |row| {
            Ok(row_to_insight(row))
        })?;
        let mut insights = Vec::new();
        for row in rows {
            insights.push(row??);
        }
        Ok(insights)
    }

    fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, InfraError> {
        let connection = self.connect()?;
        let removed = connection.execute(
            "DELETE FROM insights WHERE generated_at < ?1",
            params![cutoff.to_rfc3339()],
        )?;
        Ok(removed)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryInsightRepository {
    insights: Mutex<Vec<Insight>>,
}

impl InMemoryInsightRepository {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Insight>>, InfraError> {
        self.insights
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("insight lock poisoned: {error}")))
    }
}

impl InsightRepository for InMemoryInsightRepository {
    fn replace_for_period(
        &self,
        period: TimePeriod,
        period_start: NaiveDateTime,
        period_end: NaiveDateTime,
        insights: &[Insight],
    ) -> Result<(), InfraError> {
        let mut stored = self.lock()?;
        stored.retain(|insight| {
            !(insight.time_period == period
                && insight.period_start == period_start
                && insight.period_end == period_end)
        });
        stored.extend(insights.iter().cloned());
        Ok(())
    }

    fn get_for_period(
        &self,
        period: TimePeriod,
        period_start: NaiveDateTime,
        period_end: NaiveDateTime,
    ) -> Result<Vec<Insight>, InfraError> {
        Ok(self
            .lock()?
            .iter()
            .filter(|insight| {
                insight.time_period == period
                    && insight.period_start == period_start
                    && insight.period_end == period_end
            })
            .cloned()
            .collect())
    }

    fn get_by_hash(&self, data_hash: &str, period: TimePeriod) -> Result<Vec<Insight>, InfraError> {
        Ok(self
            .lock()?
            .iter()
            .filter(|insight| insight.data_hash == data_hash && insight.time_period == period)
            .cloned()
            .collect())
    }

    fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, InfraError> {
        let mut stored = self.lock()?;
        let before = stored.len();
        stored.retain(|insight| insight.generated_at >= cutoff);
        Ok(before - stored.len())
    }
}
