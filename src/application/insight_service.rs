use crate::application::commands::next_id;
use crate::domain::insight_cache::{data_hash, has_enough_data, is_cache_valid, DATA_VERSION};
use crate::domain::models::{CalendarTimeEntry, CheckIn, Insight, InsightType};
use crate::domain::periods::{period_bounds, PeriodBounds, TimePeriod};
use crate::infrastructure::config::InsightSettings;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::insight_repository::InsightRepository;
use crate::infrastructure::summarizer_client::{
    fallback_category, fallback_insights, CategorySuggestion, GeneratedInsight, SummarizerClient,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::time::{timeout, Duration as TokioDuration};

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InsightSource {
    Cached,
    Generated,
    Fallback,
    InsufficientData,
}

#[derive(Debug, Clone)]
pub struct InsightReport {
    pub insights: Vec<Insight>,
    pub source: InsightSource,
    pub period_start: chrono::NaiveDateTime,
    pub period_end: chrono::NaiveDateTime,
}

/// Serves insights for a period, regenerating through the summarizer only
/// when the cached set no longer matches the data or has aged out.
///
/// Summarizer failures never escape: the fixed fallback list is cached and
/// served in their place. The external call is one-shot, bounded by a
/// defensive timeout, with no retry.
pub struct InsightService<S, I>
where
    S: SummarizerClient,
    I: InsightRepository,
{
    summarizer: Arc<S>,
    insight_repository: Arc<I>,
    settings: InsightSettings,
    now_provider: NowProvider,
}

impl<S, I> InsightService<S, I>
where
    S: SummarizerClient,
    I: InsightRepository,
{
    pub fn new(summarizer: Arc<S>, insight_repository: Arc<I>, settings: InsightSettings) -> Self {
        Self {
            summarizer,
            insight_repository,
            settings,
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub async fn insights_for_period(
        &self,
        api_key: Option<&str>,
        period: TimePeriod,
        reference: NaiveDate,
        check_ins: &[CheckIn],
        activities: &[CalendarTimeEntry],
        goals: &[String],
    ) -> Result<InsightReport, InfraError> {
        let bounds = period_bounds(reference, period);

        if !has_enough_data(check_ins.len(), activities.len(), self.settings.thresholds) {
            return Ok(InsightReport {
                insights: Vec::new(),
                source: InsightSource::InsufficientData,
                period_start: bounds.start,
                period_end: bounds.end,
            });
        }

        let current_hash = data_hash(check_ins, activities, goals);
        let now = (self.now_provider)();

        let cached = self
            .insight_repository
            .get_for_period(period, bounds.start, bounds.end)?;
        if let Some(first) = cached.first() {
            if first.data_version == DATA_VERSION
                && is_cache_valid(
                    &first.data_hash,
                    &current_hash,
                    first.generated_at,
                    self.settings.max_age_hours,
                    now,
                )
            {
                return Ok(InsightReport {
                    insights: cached,
                    source: InsightSource::Cached,
                    period_start: bounds.start,
                    period_end: bounds.end,
                });
            }
        }

        let (generated, source) = self
            .generate_once(api_key, check_ins, activities, goals)
            .await;
        let insights = self.materialize(generated, period, bounds, &current_hash, now);

        self.insight_repository
            .replace_for_period(period, bounds.start, bounds.end, &insights)?;
        self.insight_repository
            .delete_older_than(now - Duration::days(self.settings.retention_days))?;

        Ok(InsightReport {
            insights,
            source,
            period_start: bounds.start,
            period_end: bounds.end,
        })
    }

    /// Categorizes an activity label, falling back to the default category on
    /// any failure.
    pub async fn categorize(
        &self,
        api_key: Option<&str>,
        activity_text: &str,
        context: Option<&str>,
    ) -> CategorySuggestion {
        let Some(api_key) = api_key else {
            return fallback_category();
        };
        let call = self.summarizer.categorize(api_key, activity_text, context);
        match timeout(TokioDuration::from_secs(self.settings.timeout_seconds), call).await {
            Ok(Ok(suggestion)) => suggestion,
            Ok(Err(_)) | Err(_) => fallback_category(),
        }
    }

    async fn generate_once(
        &self,
        api_key: Option<&str>,
        check_ins: &[CheckIn],
        activities: &[CalendarTimeEntry],
        goals: &[String],
    ) -> (Vec<GeneratedInsight>, InsightSource) {
        let Some(api_key) = api_key else {
            return (fallback_insights(), InsightSource::Fallback);
        };
        let call = self
            .summarizer
            .generate_insights(api_key, check_ins, activities, goals);
        match timeout(TokioDuration::from_secs(self.settings.timeout_seconds), call).await {
            Ok(Ok(generated)) => (generated, InsightSource::Generated),
            Ok(Err(_)) | Err(_) => (fallback_insights(), InsightSource::Fallback),
        }
    }

    fn materialize(
        &self,
        generated: Vec<GeneratedInsight>,
        period: TimePeriod,
        bounds: PeriodBounds,
        current_hash: &str,
        now: DateTime<Utc>,
    ) -> Vec<Insight> {
        generated
            .into_iter()
            .map(|insight| Insight {
                id: next_id("ins"),
                content: insight.content,
                insight_type: InsightType::parse(&insight.insight_type)
                    .unwrap_or(InsightType::Pattern),
                icon: insight.icon,
                time_period: period,
                period_start: bounds.start,
                period_end: bounds.end,
                data_hash: current_hash.to_string(),
                data_version: DATA_VERSION,
                generated_at: now,
                metadata: None,
            })
            .collect()
    }
}
