//! LLM-based re-ranking of retrieval candidates.
//!
//! One chat-completion request carries the query and the candidate set
//! (scores stripped); the model answers with per-id scores in [0, 1]. A
//! malformed or empty response degrades to "scores unchanged" — re-ranking
//! is a best-effort quality layer, never a blocking dependency.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::config::{ConfigError, RerankConfig};
use crate::embedder::ProviderError;
use crate::store::Candidate;

const SYSTEM_PROMPT: &str = "You re-rank search results. Given a query and candidate passages, \
respond with only a JSON array of objects {\"id\", \"score\"}, one per candidate, where score \
is the passage's relevance to the query as a number between 0 and 1.";

pub struct Reranker {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl Reranker {
    /// Builds a re-ranking client. Fails fast on a missing API key, before
    /// any network call.
    pub fn new(config: &RerankConfig, api_key: &str) -> Result<Self, ConfigError> {
        if api_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential("OPENAI_API_KEY"));
        }

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| ConfigError::Invalid("API key contains invalid characters".into()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
        })
    }

    /// Re-scores candidates with the model and re-sorts them descending.
    ///
    /// Transport and HTTP failures surface as [`ProviderError`]; an
    /// unparseable response body is absorbed and leaves scores and order
    /// unchanged.
    pub async fn rerank(
        &self,
        query: &str,
        candidates: Vec<Candidate>,
    ) -> Result<Vec<Candidate>, ProviderError> {
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let payload = json!({
            "query": query,
            "candidates": candidates
                .iter()
                .map(|c| json!({"id": c.id, "title": c.title, "text": c.text}))
                .collect::<Vec<_>>(),
        });

        let request = ChatRequest {
            model: &self.model,
            temperature: 0.0,
            response_format: ResponseFormat { kind: "json_object" },
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: payload.to_string(),
                },
            ],
        };

        let response = self.client.post(&self.endpoint).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .first()
            .map(|choice| choice.message.content.as_str())
            .unwrap_or("");

        match parse_scores(content) {
            Some(scores) => Ok(apply_scores(candidates, &scores)),
            None => {
                warn!("unparseable re-rank response, keeping original scores");
                Ok(candidates)
            }
        }
    }
}

/// One id/score pair returned by the model. Ids are tolerated as either
/// strings or numbers.
#[derive(Debug, Deserialize)]
pub struct ModelScore {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub score: f32,
}

fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

/// Parses the model output, tolerating the three shapes seen in the wild:
/// a bare array, `{"map": [...]}` or `{"results": [...]}`. Anything else is
/// "no scores returned".
pub fn parse_scores(content: &str) -> Option<Vec<ModelScore>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Shape {
        Bare(Vec<ModelScore>),
        Map { map: Vec<ModelScore> },
        Results { results: Vec<ModelScore> },
    }

    match serde_json::from_str::<Shape>(content) {
        Ok(Shape::Bare(scores))
        | Ok(Shape::Map { map: scores })
        | Ok(Shape::Results { results: scores }) => Some(scores),
        Err(_) => None,
    }
}

/// Overwrites candidate scores by id (candidates the model skipped keep their
/// original score) and re-sorts descending. The sort is stable, so ties keep
/// their prior order.
pub fn apply_scores(mut candidates: Vec<Candidate>, scores: &[ModelScore]) -> Vec<Candidate> {
    let by_id: HashMap<&str, f32> = scores.iter().map(|s| (s.id.as_str(), s.score)).collect();

    for candidate in &mut candidates {
        if let Some(&score) = by_id.get(candidate.id.as_str()) {
            candidate.score = score;
        }
    }

    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    candidates
}

// ── Wire types ───────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    response_format: ResponseFormat,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}
