use crate::domain::periods::TimePeriod;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CATEGORY: &str = "General";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InsightType {
    Trend,
    Pattern,
    Correlation,
    Habit,
    Energy,
    Productivity,
}

impl InsightType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trend => "trend",
            Self::Pattern => "pattern",
            Self::Correlation => "correlation",
            Self::Habit => "habit",
            Self::Energy => "energy",
            Self::Productivity => "productivity",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "trend" => Some(Self::Trend),
            "pattern" => Some(Self::Pattern),
            "correlation" => Some(Self::Correlation),
            "habit" => Some(Self::Habit),
            "energy" => Some(Self::Energy),
            "productivity" => Some(Self::Productivity),
            _ => None,
        }
    }
}

/// One tracked activity on the calendar grid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalendarTimeEntry {
    pub id: String,
    pub date: String,
    pub activity: String,
    pub category: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub mood_rating: Option<u8>,
    pub emotional_tags: Vec<String>,
    pub reflection: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CalendarTimeEntry {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "entry.id")?;
        validate_non_empty(&self.activity, "entry.activity")?;
        validate_non_empty(&self.category, "entry.category")?;
        validate_date(&self.date, "entry.date")?;
        if self.end_time <= self.start_time {
            return Err("entry.end_time must be after entry.start_time".to_string());
        }
        let span_minutes = (self.end_time - self.start_time).num_minutes();
        if self.duration_minutes != span_minutes {
            return Err(format!(
                "entry.duration_minutes must equal the interval span ({span_minutes} minutes)"
            ));
        }
        if let Some(rating) = self.mood_rating {
            validate_rating(rating, 1, 6, "entry.mood_rating")?;
        }
        if self.updated_at < self.created_at {
            return Err("entry.updated_at must be >= entry.created_at".to_string());
        }
        Ok(())
    }
}

/// Morning check-in, one per calendar day.
///
/// `focus_level` and `sleep_quality` are optional: the check-in form does not
/// always capture them, but the insight data hash still covers them (absent
/// values hash as the sentinel 0).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckIn {
    pub id: String,
    pub date: String,
    pub energy_level: u8,
    pub positivity_level: u8,
    pub focus_level: Option<u8>,
    pub sleep_quality: Option<u8>,
    pub emotions: Vec<String>,
    pub main_goal: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CheckIn {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "check_in.id")?;
        validate_date(&self.date, "check_in.date")?;
        validate_rating(self.energy_level, 1, 10, "check_in.energy_level")?;
        validate_rating(self.positivity_level, 1, 10, "check_in.positivity_level")?;
        if let Some(level) = self.focus_level {
            validate_rating(level, 1, 10, "check_in.focus_level")?;
        }
        if let Some(quality) = self.sleep_quality {
            validate_rating(quality, 1, 10, "check_in.sleep_quality")?;
        }
        if self.updated_at < self.created_at {
            return Err("check_in.updated_at must be >= check_in.created_at".to_string());
        }
        Ok(())
    }
}

/// Free-form response to a daily journal prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JournalEntry {
    pub id: String,
    pub date: String,
    pub prompt: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl JournalEntry {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "journal.id")?;
        validate_date(&self.date, "journal.date")?;
        validate_non_empty(&self.prompt, "journal.prompt")?;
        validate_non_empty(&self.body, "journal.body")?;
        Ok(())
    }
}

/// One cached observation produced by the summarizer for a period.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Insight {
    pub id: String,
    pub content: String,
    pub insight_type: InsightType,
    pub icon: String,
    pub time_period: TimePeriod,
    pub period_start: NaiveDateTime,
    pub period_end: NaiveDateTime,
    pub data_hash: String,
    pub data_version: u32,
    pub generated_at: DateTime<Utc>,
    pub metadata: Option<serde_json::Value>,
}

impl Insight {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "insight.id")?;
        validate_non_empty(&self.content, "insight.content")?;
        validate_non_empty(&self.data_hash, "insight.data_hash")?;
        if self.period_end <= self.period_start {
            return Err("insight.period_end must be after insight.period_start".to_string());
        }
        Ok(())
    }
}

/// Trims, drops empties, and removes duplicate tags while keeping the first
/// occurrence (tags are displayed in insertion order).
pub fn normalize_tags(raw: &[String]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for tag in raw {
        let tag = tag.trim();
        if tag.is_empty() {
            continue;
        }
        if !seen.iter().any(|existing| existing == tag) {
            seen.push(tag.to_string());
        }
    }
    seen
}

pub fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

pub fn validate_date(value: &str, field_name: &str) -> Result<(), String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("{field_name} must be YYYY-MM-DD"))?;
    Ok(())
}

fn validate_rating(value: u8, min: u8, max: u8, field_name: &str) -> Result<(), String> {
    if value < min || value > max {
        return Err(format!("{field_name} must be within {min}..={max}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn sample_entry() -> CalendarTimeEntry {
        CalendarTimeEntry {
            id: "ent-1".to_string(),
            date: "2026-03-02".to_string(),
            activity: "Deep reading".to_string(),
            category: "Learning".to_string(),
            start_time: fixed_time("2026-03-02T09:00:00Z"),
            end_time: fixed_time("2026-03-02T09:45:00Z"),
            duration_minutes: 45,
            mood_rating: Some(5),
            emotional_tags: vec!["calm".to_string(), "curious".to_string()],
            reflection: Some("good focus".to_string()),
            created_at: fixed_time("2026-03-02T09:45:10Z"),
            updated_at: fixed_time("2026-03-02T09:45:10Z"),
        }
    }

    fn sample_check_in() -> CheckIn {
        CheckIn {
            id: "chk-1".to_string(),
            date: "2026-03-02".to_string(),
            energy_level: 7,
            positivity_level: 8,
            focus_level: None,
            sleep_quality: Some(6),
            emotions: vec!["rested".to_string()],
            main_goal: "ship the draft".to_string(),
            created_at: fixed_time("2026-03-02T07:10:00Z"),
            updated_at: fixed_time("2026-03-02T07:10:00Z"),
        }
    }

    fn sample_insight() -> Insight {
        Insight {
            id: "ins-1".to_string(),
            content: "Energy peaks on mornings with an early check-in".to_string(),
            insight_type: InsightType::Energy,
            icon: "bolt".to_string(),
            time_period: TimePeriod::Week,
            period_start: "2026-03-01T00:00:00".parse().expect("valid period start"),
            period_end: "2026-03-07T23:59:59.999".parse().expect("valid period end"),
            data_hash: "cbf29ce484222325".to_string(),
            data_version: 1,
            generated_at: fixed_time("2026-03-02T08:00:00Z"),
            metadata: None,
        }
    }

    #[test]
    fn entry_validate_accepts_valid_entry() {
        assert!(sample_entry().validate().is_ok());
    }

    #[test]
    fn entry_validate_rejects_reversed_interval() {
        let mut entry = sample_entry();
        entry.end_time = entry.start_time;
        assert!(entry.validate().is_err());
    }

    #[test]
    fn entry_validate_rejects_inconsistent_duration() {
        let mut entry = sample_entry();
        entry.duration_minutes = 30;
        assert!(entry.validate().is_err());
    }

    #[test]
    fn entry_validate_rejects_out_of_range_mood() {
        let mut entry = sample_entry();
        entry.mood_rating = Some(7);
        assert!(entry.validate().is_err());
        entry.mood_rating = Some(0);
        assert!(entry.validate().is_err());
    }

    #[test]
    fn check_in_validate_rejects_out_of_range_levels() {
        let mut check_in = sample_check_in();
        check_in.energy_level = 11;
        assert!(check_in.validate().is_err());

        let mut check_in = sample_check_in();
        check_in.sleep_quality = Some(0);
        assert!(check_in.validate().is_err());
    }

    #[test]
    fn check_in_validate_accepts_absent_optional_levels() {
        let mut check_in = sample_check_in();
        check_in.focus_level = None;
        check_in.sleep_quality = None;
        assert!(check_in.validate().is_ok());
    }

    #[test]
    fn journal_entry_validate_rejects_blank_body() {
        let entry = JournalEntry {
            id: "jrn-1".to_string(),
            date: "2026-03-02".to_string(),
            prompt: "What felt heavy today?".to_string(),
            body: "   ".to_string(),
            created_at: fixed_time("2026-03-02T21:00:00Z"),
        };
        assert!(entry.validate().is_err());
    }

    #[test]
    fn normalize_tags_preserves_first_occurrence_order() {
        let raw = vec![
            " calm ".to_string(),
            "tired".to_string(),
            "calm".to_string(),
            String::new(),
            "hopeful".to_string(),
        ];
        assert_eq!(normalize_tags(&raw), vec!["calm", "tired", "hopeful"]);
    }

    #[test]
    fn insight_type_parse_roundtrip() {
        for insight_type in [
            InsightType::Trend,
            InsightType::Pattern,
            InsightType::Correlation,
            InsightType::Habit,
            InsightType::Energy,
            InsightType::Productivity,
        ] {
            assert_eq!(InsightType::parse(insight_type.as_str()), Some(insight_type));
        }
        assert_eq!(InsightType::parse("unknown"), None);
    }

    #[test]
    fn domain_models_support_serde_roundtrip() {
        let entry = sample_entry();
        let check_in = sample_check_in();
        let insight = sample_insight();

        let entry_roundtrip: CalendarTimeEntry =
            serde_json::from_str(&serde_json::to_string(&entry).expect("serialize entry"))
                .expect("deserialize entry");
        let check_in_roundtrip: CheckIn =
            serde_json::from_str(&serde_json::to_string(&check_in).expect("serialize check-in"))
                .expect("deserialize check-in");
        let insight_roundtrip: Insight =
            serde_json::from_str(&serde_json::to_string(&insight).expect("serialize insight"))
                .expect("deserialize insight");

        assert_eq!(entry_roundtrip, entry);
        assert_eq!(check_in_roundtrip, check_in);
        assert_eq!(insight_roundtrip, insight);
    }
}
