use crate::domain::models::{CalendarTimeEntry, CheckIn, DEFAULT_CATEGORY};
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1/";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

const CATEGORIZE_SYSTEM_PROMPT: &str = "You classify a tracked activity into one short category \
     such as Work, Movement, Rest, Social, Learning, Chores or Creative. Respond with JSON: \
     {\"category\": string, \"confidence\": number between 0 and 1}.";

const INSIGHTS_SYSTEM_PROMPT: &str = "You are a gentle wellbeing coach. Given morning check-ins, \
     tracked activities and personal goals, produce 2 to 4 observations about the person's \
     patterns. Respond with a JSON array of objects: {\"content\": string, \"type\": one of \
     trend|pattern|correlation|habit|energy|productivity, \"icon\": short icon name}.";

#[derive(Debug, Clone, PartialEq)]
pub struct CategorySuggestion {
    pub category: String,
    pub confidence: f32,
}

/// Insight as produced by the summarizer; the caching layer supplies id,
/// period bounds, hash, and timestamps.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeneratedInsight {
    pub content: String,
    #[serde(rename = "type")]
    pub insight_type: String,
    pub icon: String,
}

#[async_trait]
pub trait SummarizerClient: Send + Sync {
    async fn categorize(
        &self,
        api_key: &str,
        activity_text: &str,
        context: Option<&str>,
    ) -> Result<CategorySuggestion, InfraError>;

    async fn generate_insights(
        &self,
        api_key: &str,
        check_ins: &[CheckIn],
        activities: &[CalendarTimeEntry],
        goals: &[String],
    ) -> Result<Vec<GeneratedInsight>, InfraError>;
}

/// The recovery value when categorization fails or returns nothing usable.
pub fn fallback_category() -> CategorySuggestion {
    CategorySuggestion {
        category: DEFAULT_CATEGORY.to_string(),
        confidence: 0.0,
    }
}

/// Fixed generic list served whenever insight generation fails.
pub fn fallback_insights() -> Vec<GeneratedInsight> {
    vec![
        GeneratedInsight {
            content: "Keep logging your days. Small, steady records are what patterns \
                      are made of."
                .to_string(),
            insight_type: "habit".to_string(),
            icon: "sprout".to_string(),
        },
        GeneratedInsight {
            content: "Your tracked time is building a picture. Check back once more days \
                      are filled in."
                .to_string(),
            insight_type: "trend".to_string(),
            icon: "chart-line".to_string(),
        },
    ]
}

#[derive(Debug, Clone)]
pub struct ReqwestSummarizerClient {
    client: Client,
    api_base: String,
    model: String,
}

impl Default for ReqwestSummarizerClient {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE, DEFAULT_MODEL)
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CategoryPayload {
    category: String,
    #[serde(default)]
    confidence: f32,
}

impl ReqwestSummarizerClient {
    pub fn new(api_base: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into(),
            model: model.into(),
        }
    }

    fn completions_endpoint(&self) -> Result<Url, InfraError> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|error| InfraError::Summarizer(format!("invalid api base url: {error}")))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| InfraError::Summarizer("api base URL cannot be a base".to_string()))?;
            segments.pop_if_empty();
            segments.push("chat");
            segments.push("completions");
        }
        Ok(url)
    }

    async fn complete(
        &self,
        api_key: &str,
        system_prompt: &str,
        user_payload: &str,
    ) -> Result<String, InfraError> {
        if api_key.trim().is_empty() {
            return Err(InfraError::Summarizer("api key must not be empty".to_string()));
        }

        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_payload,
                },
            ],
            temperature: 0.4,
        };

        let response = self
            .client
            .post(self.completions_endpoint()?)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|error| {
                InfraError::Summarizer(format!("network error while calling summarizer: {error}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            InfraError::Summarizer(format!("failed to read summarizer response: {error}"))
        })?;
        if !status.is_success() {
            return Err(InfraError::Summarizer(format!(
                "summarizer api error: http {}; body={body}",
                status.as_u16()
            )));
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&body).map_err(|error| {
            InfraError::Summarizer(format!("unexpected summarizer response shape: {error}"))
        })?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| InfraError::Summarizer("summarizer returned no content".to_string()))
    }
}

#[async_trait]
impl SummarizerClient for ReqwestSummarizerClient {
    async fn categorize(
        &self,
        api_key: &str,
        activity_text: &str,
        context: Option<&str>,
    ) -> Result<CategorySuggestion, InfraError> {
        let payload = match context {
            Some(context) => format!("Activity: {activity_text}\nContext: {context}"),
            None => format!("Activity: {activity_text}"),
        };
        let content = self
            .complete(api_key, CATEGORIZE_SYSTEM_PROMPT, &payload)
            .await?;
        parse_category_payload(&content)
    }

    async fn generate_insights(
        &self,
        api_key: &str,
        check_ins: &[CheckIn],
        activities: &[CalendarTimeEntry],
        goals: &[String],
    ) -> Result<Vec<GeneratedInsight>, InfraError> {
        let payload = serde_json::to_string(&serde_json::json!({
            "check_ins": check_ins,
            "activities": activities,
            "goals": goals,
        }))?;
        let content = self
            .complete(api_key, INSIGHTS_SYSTEM_PROMPT, &payload)
            .await?;
        parse_insights_payload(&content)
    }
}

fn parse_category_payload(raw: &str) -> Result<CategorySuggestion, InfraError> {
    let payload: CategoryPayload = serde_json::from_str(strip_code_fences(raw)).map_err(|error| {
        InfraError::Summarizer(format!("unexpected categorize payload: {error}"))
    })?;
    let category = payload.category.trim();
    if category.is_empty() {
        return Err(InfraError::Summarizer(
            "categorize payload has an empty category".to_string(),
        ));
    }
    Ok(CategorySuggestion {
        category: category.to_string(),
        confidence: payload.confidence.clamp(0.0, 1.0),
    })
}

fn parse_insights_payload(raw: &str) -> Result<Vec<GeneratedInsight>, InfraError> {
    let insights: Vec<GeneratedInsight> = serde_json::from_str(strip_code_fences(raw))
        .map_err(|error| InfraError::Summarizer(format!("unexpected insights payload: {error}")))?;
    if insights.is_empty() {
        return Err(InfraError::Summarizer(
            "summarizer returned an empty insight list".to_string(),
        ));
    }
    Ok(insights)
}

/// Models often wrap JSON answers in markdown fences; tolerate that.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(without_open) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let without_lang = without_open
        .strip_prefix("json")
        .unwrap_or(without_open)
        .trim_start();
    without_lang.strip_suffix("```").unwrap_or(without_lang).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_payload_parses_and_clamps_confidence() {
        let suggestion =
            parse_category_payload(r#"{"category": " Movement ", "confidence": 1.7}"#)
                .expect("parse category");
        assert_eq!(suggestion.category, "Movement");
        assert_eq!(suggestion.confidence, 1.0);
    }

    #[test]
    fn category_payload_rejects_empty_category() {
        assert!(parse_category_payload(r#"{"category": "  "}"#).is_err());
        assert!(parse_category_payload("not json").is_err());
    }

    #[test]
    fn insights_payload_parses_fenced_json() {
        let raw = "```json\n[{\"content\": \"Mornings look strong\", \"type\": \"energy\", \
                   \"icon\": \"bolt\"}]\n```";
        let insights = parse_insights_payload(raw).expect("parse insights");
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].insight_type, "energy");
    }

    #[test]
    fn insights_payload_rejects_an_empty_list() {
        assert!(parse_insights_payload("[]").is_err());
    }

    #[test]
    fn fallbacks_are_fixed_and_usable() {
        assert_eq!(fallback_category().category, DEFAULT_CATEGORY);
        let insights = fallback_insights();
        assert!(!insights.is_empty());
        assert!(insights.iter().all(|insight| !insight.content.is_empty()));
    }

    #[test]
    fn completions_endpoint_joins_path_segments() {
        let client = ReqwestSummarizerClient::new("https://api.example.test/v1/", "test-model");
        let url = client.completions_endpoint().expect("endpoint");
        assert_eq!(url.as_str(), "https://api.example.test/v1/chat/completions");
    }
}
