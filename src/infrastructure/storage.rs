use crate::infrastructure::error::InfraError;
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::Connection;
use std::path::Path;

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

const NAIVE_MILLIS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

pub fn initialize_database(path: &Path) -> Result<(), InfraError> {
    let connection = Connection::open(path)?;
    connection.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

pub(crate) fn parse_utc_text(value: &str, field_name: &str) -> Result<DateTime<Utc>, InfraError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|error| {
            InfraError::InvalidConfig(format!("invalid {field_name} '{value}': {error}"))
        })
}

pub(crate) fn format_naive_text(value: NaiveDateTime) -> String {
    value.format(NAIVE_MILLIS_FORMAT).to_string()
}

pub(crate) fn parse_naive_text(value: &str, field_name: &str) -> Result<NaiveDateTime, InfraError> {
    NaiveDateTime::parse_from_str(value, NAIVE_MILLIS_FORMAT).map_err(|error| {
        InfraError::InvalidConfig(format!("invalid {field_name} '{value}': {error}"))
    })
}
