use crate::application::bootstrap::bootstrap_workspace;
use crate::application::insight_service::{InsightService, InsightSource};
use crate::domain::models::{
    normalize_tags, CalendarTimeEntry, CheckIn, Insight, JournalEntry, DEFAULT_CATEGORY,
};
use crate::domain::periods::{day_key, period_bounds, TimePeriod};
use crate::domain::time_grid::find_conflict;
use crate::infrastructure::api_key_store::{ApiKeyStore, KeychainApiKeyStore};
use crate::infrastructure::checkin_repository::{CheckInRepository, SqliteCheckInRepository};
use crate::infrastructure::config::{
    load_grid_config, load_insight_settings, read_goals, read_timezone, save_goals,
};
use crate::infrastructure::entry_repository::{EntryRepository, SqliteEntryRepository};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::insight_repository::SqliteInsightRepository;
use crate::infrastructure::journal_repository::{JournalRepository, SqliteJournalRepository};
use crate::infrastructure::summarizer_client::ReqwestSummarizerClient;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_id(prefix: &str) -> String {
    let sequence = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{sequence}", Utc::now().timestamp_micros())
}

pub struct AppState {
    config_dir: PathBuf,
    database_path: PathBuf,
    logs_dir: PathBuf,
    api_keys: Arc<dyn ApiKeyStore>,
    log_guard: Mutex<()>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        Ok(Self {
            config_dir: workspace_root.join("config"),
            database_path: bootstrap.database_path,
            logs_dir: workspace_root.join("logs"),
            api_keys: Arc::new(KeychainApiKeyStore::default()),
            log_guard: Mutex::new(()),
        })
    }

    pub fn with_api_key_store(mut self, api_keys: Arc<dyn ApiKeyStore>) -> Self {
        self.api_keys = api_keys;
        self
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }

    fn timezone(&self) -> Tz {
        read_timezone(&self.config_dir)
            .ok()
            .flatten()
            .and_then(|name| name.parse::<Tz>().ok())
            .unwrap_or(chrono_tz::UTC)
    }

    fn entry_repository(&self) -> SqliteEntryRepository {
        SqliteEntryRepository::new(&self.database_path)
    }

    fn check_in_repository(&self) -> SqliteCheckInRepository {
        SqliteCheckInRepository::new(&self.database_path)
    }

    fn journal_repository(&self) -> SqliteJournalRepository {
        SqliteJournalRepository::new(&self.database_path)
    }

    fn summarizer_api_key(&self) -> Option<String> {
        // A missing or unreachable keychain degrades to the fallback path.
        self.api_keys.load_key().unwrap_or(None)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InsightsResponse {
    pub insights: Vec<Insight>,
    pub source: InsightSource,
    pub period_start: String,
    pub period_end: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategorizeResponse {
    pub category: String,
    pub confidence: f32,
}

pub fn save_time_entry_impl(
    state: &AppState,
    activity: String,
    start_time: String,
    end_time: String,
    category: Option<String>,
    mood_rating: Option<u8>,
    emotional_tags: Option<Vec<String>>,
    reflection: Option<String>,
) -> Result<CalendarTimeEntry, InfraError> {
    let activity = activity.trim();
    if activity.is_empty() {
        return Err(InfraError::InvalidInput(
            "activity must not be empty".to_string(),
        ));
    }
    let start = parse_rfc3339_input(&start_time, "start_time")?;
    let end = parse_rfc3339_input(&end_time, "end_time")?;
    if end <= start {
        return Err(InfraError::InvalidInput(
            "end_time must be after start_time".to_string(),
        ));
    }
    let duration_minutes = (end - start).num_minutes();
    let slot_duration = load_grid_config(state.config_dir()).slot_duration_minutes;
    if duration_minutes < slot_duration {
        return Err(InfraError::InvalidInput(format!(
            "entry must span at least one {slot_duration}-minute slot"
        )));
    }

    let timezone = state.timezone();
    let date = day_key(start.with_timezone(&timezone).date_naive());

    let repository = state.entry_repository();
    let same_day = repository.get_for_date(&date)?;
    if let Some(conflicting) = find_conflict(start, end, &same_day, None) {
        return Err(InfraError::Conflict {
            conflicting_id: conflicting.id.clone(),
        });
    }

    let category = category
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_CATEGORY)
        .to_string();
    let now = Utc::now();
    let entry = CalendarTimeEntry {
        id: next_id("ent"),
        date,
        activity: activity.to_string(),
        category,
        start_time: start,
        end_time: end,
        duration_minutes,
        mood_rating,
        emotional_tags: normalize_tags(&emotional_tags.unwrap_or_default()),
        reflection: reflection
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned),
        created_at: now,
        updated_at: now,
    };
    entry
        .validate()
        .map_err(InfraError::InvalidInput)?;
    repository.save(&entry)?;

    state.log_info(
        "save_time_entry",
        &format!("saved entry_id={} date={}", entry.id, entry.date),
    );
    Ok(entry)
}

pub fn update_time_entry_impl(
    state: &AppState,
    entry_id: String,
    activity: Option<String>,
    category: Option<String>,
    mood_rating: Option<u8>,
    emotional_tags: Option<Vec<String>>,
    reflection: Option<String>,
) -> Result<CalendarTimeEntry, InfraError> {
    let entry_id = entry_id.trim();
    if entry_id.is_empty() {
        return Err(InfraError::InvalidInput(
            "entry_id must not be empty".to_string(),
        ));
    }

    let repository = state.entry_repository();
    let mut entry = repository
        .get_by_id(entry_id)?
        .ok_or_else(|| InfraError::NotFound(format!("entry {entry_id}")))?;

    if let Some(activity) = activity {
        let activity = activity.trim();
        if activity.is_empty() {
            return Err(InfraError::InvalidInput(
                "activity must not be empty".to_string(),
            ));
        }
        entry.activity = activity.to_string();
    }
    if let Some(category) = category {
        let category = category.trim();
        entry.category = if category.is_empty() {
            DEFAULT_CATEGORY.to_string()
        } else {
            category.to_string()
        };
    }
    if let Some(rating) = mood_rating {
        entry.mood_rating = Some(rating);
    }
    if let Some(tags) = emotional_tags {
        entry.emotional_tags = normalize_tags(&tags);
    }
    if let Some(reflection) = reflection {
        let reflection = reflection.trim();
        entry.reflection = if reflection.is_empty() {
            None
        } else {
            Some(reflection.to_string())
        };
    }
    entry.updated_at = Utc::now().max(entry.created_at);
    entry
        .validate()
        .map_err(InfraError::InvalidInput)?;
    repository.update(&entry)?;

    state.log_info("update_time_entry", &format!("updated entry_id={entry_id}"));
    Ok(entry)
}

pub fn delete_time_entry_impl(state: &AppState, entry_id: String) -> Result<bool, InfraError> {
    let entry_id = entry_id.trim();
    if entry_id.is_empty() {
        return Err(InfraError::InvalidInput(
            "entry_id must not be empty".to_string(),
        ));
    }
    let removed = state.entry_repository().delete(entry_id)?;
    if removed {
        state.log_info("delete_time_entry", &format!("deleted entry_id={entry_id}"));
    }
    Ok(removed)
}

pub fn list_time_entries_impl(
    state: &AppState,
    date: Option<String>,
) -> Result<Vec<CalendarTimeEntry>, InfraError> {
    let repository = state.entry_repository();
    match normalize_optional(date) {
        Some(date) => {
            parse_date_input(&date, "date")?;
            repository.get_for_date(&date)
        }
        None => repository.get_all(),
    }
}

#[allow(clippy::too_many_arguments)]
pub fn record_check_in_impl(
    state: &AppState,
    date: Option<String>,
    energy_level: u8,
    positivity_level: u8,
    focus_level: Option<u8>,
    sleep_quality: Option<u8>,
    emotions: Option<Vec<String>>,
    main_goal: Option<String>,
) -> Result<CheckIn, InfraError> {
    let timezone = state.timezone();
    let date = match normalize_optional(date) {
        Some(raw) => day_key(parse_date_input(&raw, "date")?),
        None => day_key(Utc::now().with_timezone(&timezone).date_naive()),
    };

    let now = Utc::now();
    let check_in = CheckIn {
        id: next_id("chk"),
        date: date.clone(),
        energy_level,
        positivity_level,
        focus_level,
        sleep_quality,
        emotions: normalize_tags(&emotions.unwrap_or_default()),
        main_goal: main_goal
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string(),
        created_at: now,
        updated_at: now,
    };
    check_in
        .validate()
        .map_err(InfraError::InvalidInput)?;

    let repository = state.check_in_repository();
    repository.upsert(&check_in)?;
    let stored = repository
        .get_for_date(&date)?
        .ok_or_else(|| InfraError::NotFound(format!("check-in for {date}")))?;

    state.log_info("record_check_in", &format!("recorded check-in for {date}"));
    Ok(stored)
}

pub fn list_check_ins_impl(
    state: &AppState,
    start_date: Option<String>,
    end_date: Option<String>,
) -> Result<Vec<CheckIn>, InfraError> {
    let repository = state.check_in_repository();
    match (normalize_optional(start_date), normalize_optional(end_date)) {
        (Some(start), Some(end)) => {
            parse_date_input(&start, "start_date")?;
            parse_date_input(&end, "end_date")?;
            repository.get_in_date_range(&start, &end)
        }
        (None, None) => repository.get_all(),
        _ => Err(InfraError::InvalidInput(
            "start_date and end_date must be provided together".to_string(),
        )),
    }
}

pub fn save_journal_entry_impl(
    state: &AppState,
    prompt: String,
    body: String,
    date: Option<String>,
) -> Result<JournalEntry, InfraError> {
    let timezone = state.timezone();
    let date = match normalize_optional(date) {
        Some(raw) => day_key(parse_date_input(&raw, "date")?),
        None => day_key(Utc::now().with_timezone(&timezone).date_naive()),
    };

    let entry = JournalEntry {
        id: next_id("jrn"),
        date,
        prompt: prompt.trim().to_string(),
        body: body.trim().to_string(),
        created_at: Utc::now(),
    };
    entry
        .validate()
        .map_err(InfraError::InvalidInput)?;
    state.journal_repository().save(&entry)?;

    state.log_info(
        "save_journal_entry",
        &format!("saved journal entry_id={}", entry.id),
    );
    Ok(entry)
}

pub fn list_journal_entries_impl(
    state: &AppState,
    date: Option<String>,
) -> Result<Vec<JournalEntry>, InfraError> {
    let repository = state.journal_repository();
    match normalize_optional(date) {
        Some(date) => {
            parse_date_input(&date, "date")?;
            repository.get_for_date(&date)
        }
        None => repository.get_all(),
    }
}

pub fn get_goals_impl(state: &AppState) -> Result<Vec<String>, InfraError> {
    read_goals(state.config_dir())
}

pub fn set_goals_impl(state: &AppState, goals: Vec<String>) -> Result<Vec<String>, InfraError> {
    save_goals(state.config_dir(), &goals)?;
    let stored = read_goals(state.config_dir())?;
    state.log_info("set_goals", &format!("stored {} goals", stored.len()));
    Ok(stored)
}

pub async fn get_insights_impl(
    state: &AppState,
    period: String,
    reference_date: Option<String>,
) -> Result<InsightsResponse, InfraError> {
    let period = TimePeriod::parse(&period).ok_or_else(|| {
        InfraError::InvalidInput("period must be week, month or quarter".to_string())
    })?;
    let timezone = state.timezone();
    let reference = match normalize_optional(reference_date) {
        Some(raw) => parse_date_input(&raw, "reference_date")?,
        None => Utc::now().with_timezone(&timezone).date_naive(),
    };

    let bounds = period_bounds(reference, period);
    let start_key = day_key(bounds.start.date());
    let end_key = day_key(bounds.end.date());

    let check_ins = state
        .check_in_repository()
        .get_in_date_range(&start_key, &end_key)?;
    let activities = state
        .entry_repository()
        .get_in_date_range(&start_key, &end_key)?;
    let goals = read_goals(state.config_dir())?;

    let settings = load_insight_settings(state.config_dir());
    let summarizer = Arc::new(ReqwestSummarizerClient::new(
        settings.api_base.clone(),
        settings.model.clone(),
    ));
    let insight_repository = Arc::new(SqliteInsightRepository::new(state.database_path()));
    let service = InsightService::new(summarizer, insight_repository, settings);

    let api_key = state.summarizer_api_key();
    let report = service
        .insights_for_period(
            api_key.as_deref(),
            period,
            reference,
            &check_ins,
            &activities,
            &goals,
        )
        .await?;

    state.log_info(
        "get_insights",
        &format!(
            "served {} {} insights (source={:?})",
            report.insights.len(),
            period.as_str(),
            report.source
        ),
    );

    Ok(InsightsResponse {
        insights: report.insights,
        source: report.source,
        period_start: report.period_start.format("%Y-%m-%dT%H:%M:%S%.3f").to_string(),
        period_end: report.period_end.format("%Y-%m-%dT%H:%M:%S%.3f").to_string(),
    })
}

pub async fn categorize_activity_impl(
    state: &AppState,
    activity_text: String,
    context: Option<String>,
) -> Result<CategorizeResponse, InfraError> {
    let activity_text = activity_text.trim().to_string();
    if activity_text.is_empty() {
        return Err(InfraError::InvalidInput(
            "activity_text must not be empty".to_string(),
        ));
    }

    let settings = load_insight_settings(state.config_dir());
    let summarizer = Arc::new(ReqwestSummarizerClient::new(
        settings.api_base.clone(),
        settings.model.clone(),
    ));
    let insight_repository = Arc::new(SqliteInsightRepository::new(state.database_path()));
    let service = InsightService::new(summarizer, insight_repository, settings);

    let api_key = state.summarizer_api_key();
    let suggestion = service
        .categorize(api_key.as_deref(), &activity_text, context.as_deref())
        .await;

    Ok(CategorizeResponse {
        category: suggestion.category,
        confidence: suggestion.confidence,
    })
}

pub fn set_summarizer_api_key_impl(state: &AppState, api_key: String) -> Result<(), InfraError> {
    state.api_keys.save_key(&api_key)?;
    state.log_info("set_summarizer_api_key", "stored summarizer api key");
    Ok(())
}

pub fn clear_summarizer_api_key_impl(state: &AppState) -> Result<(), InfraError> {
    state.api_keys.delete_key()?;
    state.log_info("clear_summarizer_api_key", "removed summarizer api key");
    Ok(())
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

fn parse_rfc3339_input(value: &str, field_name: &str) -> Result<DateTime<Utc>, InfraError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|error| {
            InfraError::InvalidInput(format!("{field_name} must be RFC3339 date-time: {error}"))
        })
}

fn parse_date_input(value: &str, field_name: &str) -> Result<NaiveDate, InfraError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|error| InfraError::InvalidInput(format!("{field_name} must be YYYY-MM-DD: {error}")))
}
