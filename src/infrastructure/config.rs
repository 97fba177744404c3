use crate::domain::insight_cache::{DataThresholds, DEFAULT_MAX_AGE_HOURS};
use crate::domain::time_grid::GridConfig;
use crate::infrastructure::error::InfraError;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const GRID_JSON: &str = "grid.json";
const INSIGHTS_JSON: &str = "insights.json";
const GOALS_JSON: &str = "goals.json";

#[derive(Debug, Clone, PartialEq)]
pub struct InsightSettings {
    pub max_age_hours: i64,
    pub thresholds: DataThresholds,
    pub retention_days: i64,
    pub api_base: String,
    pub model: String,
    pub timeout_seconds: u64,
}

impl Default for InsightSettings {
    fn default() -> Self {
        Self {
            max_age_hours: DEFAULT_MAX_AGE_HOURS,
            thresholds: DataThresholds::default(),
            retention_days: 90,
            api_base: "https://api.openai.com/v1/".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_seconds: 30,
        }
    }
}

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    HashMap::from([
        (
            APP_JSON,
            serde_json::json!({
                "schema": 1,
                "appName": "Solace",
                "timezone": "UTC"
            }),
        ),
        (
            GRID_JSON,
            serde_json::json!({
                "schema": 1,
                "slotDurationMinutes": 15,
                "gridStartHour": 6,
                "gridEndHour": 23,
                "slotHeightPx": 30.0,
                "dragThresholdPx": 10.0,
                "minCommitDurationMinutes": 15
            }),
        ),
        (
            INSIGHTS_JSON,
            serde_json::json!({
                "schema": 1,
                "maxAgeHours": 24,
                "minCheckIns": 3,
                "minActivities": 5,
                "retentionDays": 90,
                "apiBase": "https://api.openai.com/v1/",
                "model": "gpt-4o-mini",
                "timeoutSeconds": 30
            }),
        ),
        (
            GOALS_JSON,
            serde_json::json!({
                "schema": 1,
                "goals": []
            }),
        ),
    ])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn read_timezone(config_dir: &Path) -> Result<Option<String>, InfraError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    Ok(app
        .get("timezone")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned))
}

/// Grid layout with defaults for anything missing or unreadable.
pub fn load_grid_config(config_dir: &Path) -> GridConfig {
    let mut config = GridConfig::default();
    let Ok(parsed) = read_config(&config_dir.join(GRID_JSON)) else {
        return config;
    };

    if let Some(value) = parsed
        .get("slotDurationMinutes")
        .and_then(serde_json::Value::as_i64)
    {
        config.slot_duration_minutes = value.max(1);
    }
    if let Some(value) = parsed.get("gridStartHour").and_then(serde_json::Value::as_u64) {
        config.grid_start_hour = (value as u32).min(23);
    }
    if let Some(value) = parsed.get("gridEndHour").and_then(serde_json::Value::as_u64) {
        config.grid_end_hour = (value as u32).min(24);
    }
    if let Some(value) = parsed.get("slotHeightPx").and_then(serde_json::Value::as_f64) {
        if value > 0.0 {
            config.slot_height_px = value as f32;
        }
    }
    if let Some(value) = parsed
        .get("dragThresholdPx")
        .and_then(serde_json::Value::as_f64)
    {
        if value >= 0.0 {
            config.drag_threshold_px = value as f32;
        }
    }
    if let Some(value) = parsed
        .get("minCommitDurationMinutes")
        .and_then(serde_json::Value::as_i64)
    {
        config.min_commit_duration_minutes = value.max(1);
    }
    if config.grid_end_hour <= config.grid_start_hour {
        return GridConfig::default();
    }

    config
}

/// Insight cache/summarizer settings with defaults for anything missing.
pub fn load_insight_settings(config_dir: &Path) -> InsightSettings {
    let mut settings = InsightSettings::default();
    let Ok(parsed) = read_config(&config_dir.join(INSIGHTS_JSON)) else {
        return settings;
    };

    if let Some(value) = parsed.get("maxAgeHours").and_then(serde_json::Value::as_i64) {
        settings.max_age_hours = value.max(1);
    }
    if let Some(value) = parsed.get("minCheckIns").and_then(serde_json::Value::as_u64) {
        settings.thresholds.min_check_ins = value as usize;
    }
    if let Some(value) = parsed.get("minActivities").and_then(serde_json::Value::as_u64) {
        settings.thresholds.min_activities = value as usize;
    }
    if let Some(value) = parsed.get("retentionDays").and_then(serde_json::Value::as_i64) {
        settings.retention_days = value.max(1);
    }
    if let Some(value) = parsed
        .get("apiBase")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        settings.api_base = value.to_string();
    }
    if let Some(value) = parsed
        .get("model")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        settings.model = value.to_string();
    }
    if let Some(value) = parsed.get("timeoutSeconds").and_then(serde_json::Value::as_u64) {
        settings.timeout_seconds = value.max(1);
    }

    settings
}

pub fn read_goals(config_dir: &Path) -> Result<Vec<String>, InfraError> {
    let goals = read_config(&config_dir.join(GOALS_JSON))?;
    Ok(goals
        .get("goals")
        .and_then(serde_json::Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(serde_json::Value::as_str)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default())
}

pub fn save_goals(config_dir: &Path, goals: &[String]) -> Result<(), InfraError> {
    let normalized = goals
        .iter()
        .map(|goal| goal.trim())
        .filter(|goal| !goal.is_empty())
        .collect::<Vec<_>>();
    let value = serde_json::json!({
        "schema": 1,
        "goals": normalized,
    });
    let formatted = serde_json::to_string_pretty(&value)?;
    fs::write(config_dir.join(GOALS_JSON), format!("{formatted}\n"))?;
    Ok(())
}
