mod application;
mod domain;
mod infrastructure;

use application::bootstrap::bootstrap_workspace;
use application::commands::{
    categorize_activity_impl, clear_summarizer_api_key_impl, delete_time_entry_impl,
    get_goals_impl, get_insights_impl, list_check_ins_impl, list_journal_entries_impl,
    list_time_entries_impl, record_check_in_impl, save_journal_entry_impl, save_time_entry_impl,
    set_goals_impl, set_summarizer_api_key_impl, update_time_entry_impl, AppState,
    CategorizeResponse, InsightsResponse,
};
use domain::models::{CalendarTimeEntry, CheckIn, JournalEntry};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
struct BootstrapResponse {
    workspace_root: String,
    database_path: String,
}

#[tauri::command]
fn bootstrap(root: Option<String>) -> Result<BootstrapResponse, String> {
    let workspace_root = match root {
        Some(path) => PathBuf::from(path),
        None => std::env::current_dir().map_err(|error| error.to_string())?,
    };

    let result = bootstrap_workspace(&workspace_root).map_err(|error| error.to_string())?;
    Ok(BootstrapResponse {
        workspace_root: result.workspace_root.display().to_string(),
        database_path: result.database_path.display().to_string(),
    })
}

#[tauri::command]
fn ping() -> &'static str {
    "pong"
}

#[tauri::command]
#[allow(clippy::too_many_arguments)]
fn save_time_entry(
    state: tauri::State<'_, AppState>,
    activity: String,
    start_time: String,
    end_time: String,
    category: Option<String>,
    mood_rating: Option<u8>,
    emotional_tags: Option<Vec<String>>,
    reflection: Option<String>,
) -> Result<CalendarTimeEntry, String> {
    save_time_entry_impl(
        state.inner(),
        activity,
        start_time,
        end_time,
        category,
        mood_rating,
        emotional_tags,
        reflection,
    )
    .map_err(|error| state.command_error("save_time_entry", &error))
}

#[tauri::command]
fn update_time_entry(
    state: tauri::State<'_, AppState>,
    entry_id: String,
    activity: Option<String>,
    category: Option<String>,
    mood_rating: Option<u8>,
    emotional_tags: Option<Vec<String>>,
    reflection: Option<String>,
) -> Result<CalendarTimeEntry, String> {
    update_time_entry_impl(
        state.inner(),
        entry_id,
        activity,
        category,
        mood_rating,
        emotional_tags,
        reflection,
    )
    .map_err(|error| state.command_error("update_time_entry", &error))
}

#[tauri::command]
fn delete_time_entry(state: tauri::State<'_, AppState>, entry_id: String) -> Result<bool, String> {
    delete_time_entry_impl(state.inner(), entry_id)
        .map_err(|error| state.command_error("delete_time_entry", &error))
}

#[tauri::command]
fn list_time_entries(
    state: tauri::State<'_, AppState>,
    date: Option<String>,
) -> Result<Vec<CalendarTimeEntry>, String> {
    list_time_entries_impl(state.inner(), date)
        .map_err(|error| state.command_error("list_time_entries", &error))
}

#[tauri::command]
#[allow(clippy::too_many_arguments)]
fn record_check_in(
    state: tauri::State<'_, AppState>,
    date: Option<String>,
    energy_level: u8,
    positivity_level: u8,
    focus_level: Option<u8>,
    sleep_quality: Option<u8>,
    emotions: Option<Vec<String>>,
    main_goal: Option<String>,
) -> Result<CheckIn, String> {
    record_check_in_impl(
        state.inner(),
        date,
        energy_level,
        positivity_level,
        focus_level,
        sleep_quality,
        emotions,
        main_goal,
    )
    .map_err(|error| state.command_error("record_check_in", &error))
}

#[tauri::command]
fn list_check_ins(
    state: tauri::State<'_, AppState>,
    start_date: Option<String>,
    end_date: Option<String>,
) -> Result<Vec<CheckIn>, String> {
    list_check_ins_impl(state.inner(), start_date, end_date)
        .map_err(|error| state.command_error("list_check_ins", &error))
}

#[tauri::command]
fn save_journal_entry(
    state: tauri::State<'_, AppState>,
    prompt: String,
    body: String,
    date: Option<String>,
) -> Result<JournalEntry, String> {
    save_journal_entry_impl(state.inner(), prompt, body, date)
        .map_err(|error| state.command_error("save_journal_entry", &error))
}

#[tauri::command]
fn list_journal_entries(
    state: tauri::State<'_, AppState>,
    date: Option<String>,
) -> Result<Vec<JournalEntry>, String> {
    list_journal_entries_impl(state.inner(), date)
        .map_err(|error| state.command_error("list_journal_entries", &error))
}

#[tauri::command]
fn get_goals(state: tauri::State<'_, AppState>) -> Result<Vec<String>, String> {
    get_goals_impl(state.inner()).map_err(|error| state.command_error("get_goals", &error))
}

#[tauri::command]
fn set_goals(state: tauri::State<'_, AppState>, goals: Vec<String>) -> Result<Vec<String>, String> {
    set_goals_impl(state.inner(), goals).map_err(|error| state.command_error("set_goals", &error))
}

#[tauri::command]
async fn get_insights(
    state: tauri::State<'_, AppState>,
    period: String,
    reference_date: Option<String>,
) -> Result<InsightsResponse, String> {
    get_insights_impl(state.inner(), period, reference_date)
        .await
        .map_err(|error| state.command_error("get_insights", &error))
}

#[tauri::command]
async fn categorize_activity(
    state: tauri::State<'_, AppState>,
    activity_text: String,
    context: Option<String>,
) -> Result<CategorizeResponse, String> {
    categorize_activity_impl(state.inner(), activity_text, context)
        .await
        .map_err(|error| state.command_error("categorize_activity", &error))
}

#[tauri::command]
fn set_summarizer_api_key(state: tauri::State<'_, AppState>, api_key: String) -> Result<(), String> {
    set_summarizer_api_key_impl(state.inner(), api_key)
        .map_err(|error| state.command_error("set_summarizer_api_key", &error))
}

#[tauri::command]
fn clear_summarizer_api_key(state: tauri::State<'_, AppState>) -> Result<(), String> {
    clear_summarizer_api_key_impl(state.inner())
        .map_err(|error| state.command_error("clear_summarizer_api_key", &error))
}

pub fn run() {
    let workspace_root = std::env::current_dir().expect("failed to resolve current directory");
    let app_state = AppState::new(workspace_root).expect("failed to initialize app state");

    tauri::Builder::default()
        .manage(app_state)
        .invoke_handler(tauri::generate_handler![
            ping,
            bootstrap,
            save_time_entry,
            update_time_entry,
            delete_time_entry,
            list_time_entries,
            record_check_in,
            list_check_ins,
            save_journal_entry,
            list_journal_entries,
            get_goals,
            set_goals,
            get_insights,
            categorize_activity,
            set_summarizer_api_key,
            clear_summarizer_api_key
        ])
        .run(tauri::generate_context!())
        .expect("failed to run tauri app");
}
