use cortex_core::config::LlmConfig;
use cortex_core::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// A completed generation call: prompt in, completion text out.
pub struct LanguageModelClient {
    http: reqwest::Client,
    config: LlmConfig,
}

#[derive(Serialize)]
struct GenerateOptions {
    num_ctx: u32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    temperature: f32,
    top_p: f32,
    top_k: u32,
    repeat_penalty: f32,
    num_predict: i32,
    keep_alive: &'a str,
    options: GenerateOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<i64>,
}

/// Either response shape the endpoint may return (§6): the plain-completion
/// `response` field, or the chat-style `message.content`.
#[derive(Deserialize)]
struct GenerateResponse {
    response: Option<String>,
    message: Option<ChatMessagePart>,
}

#[derive(Deserialize)]
struct ChatMessagePart {
    content: String,
}

impl LanguageModelClient {
    pub fn new(config: LlmConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("failed to build reqwest client");
        Self { http, config }
    }

    /// Run one generation call. Maps any transport/parse failure to
    /// `CoreError::LanguageModelUnavailable` so the loop can skip the tick
    /// without crashing.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let body = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            temperature: self.config.temperature,
            top_p: self.config.top_p,
            top_k: self.config.top_k,
            repeat_penalty: self.config.repeat_penalty,
            num_predict: self.config.num_predict,
            keep_alive: &self.config.keep_alive,
            options: GenerateOptions { num_ctx: self.config.num_ctx },
            seed: self.config.seed,
        };

        debug!(model = %self.config.model, "sending generation request");

        let resp = self
            .http
            .post(&self.config.endpoint_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::LanguageModelUnavailable(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            warn!(%status, body = %text, "language model endpoint returned an error");
            return Err(CoreError::LanguageModelUnavailable(format!("{status}: {text}")));
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| CoreError::LanguageModelUnavailable(e.to_string()))?;

        parsed
            .response
            .or_else(|| parsed.message.map(|m| m.content))
            .ok_or_else(|| CoreError::LanguageModelUnavailable("empty response body".to_string()))
    }
}

/// Generates text embeddings for memory-tier storage and retrieval.
pub struct EmbeddingClient {
    http: reqwest::Client,
    endpoint_url: String,
    model: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

impl EmbeddingClient {
    pub fn new(config: &cortex_core::config::EmbeddingConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("failed to build reqwest client");
        Self { http, endpoint_url: config.endpoint_url.clone(), model: config.model.clone() }
    }

    /// On failure the caller proceeds without the embedding (§7): the
    /// corresponding record isn't added to Tier 2, and searches needing it
    /// return empty.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let resp = self
            .http
            .post(&self.endpoint_url)
            .json(&EmbedRequest { model: &self.model, prompt: text })
            .send()
            .await
            .map_err(|e| CoreError::EmbeddingUnavailable(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(CoreError::EmbeddingUnavailable(format!("status {status}")));
        }

        let parsed: EmbedResponse =
            resp.json().await.map_err(|e| CoreError::EmbeddingUnavailable(e.to_string()))?;
        Ok(parsed.embedding)
    }
}

/// Cosine similarity between two equal-length embedding vectors. Returns 0
/// if either is empty or the dimensions mismatch.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Parsed LM output (§6): numbered or single free-form thoughts, an optional
/// `<think>` strategic aside, and a structured action list.
#[derive(Debug, Clone, Default)]
pub struct ParsedOutput {
    pub thoughts: Vec<String>,
    pub think: Option<String>,
    pub actions: Vec<ActionCall>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionCall {
    pub tool: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

/// Parse the raw completion into thoughts/think/actions. Tolerant of missing
/// sections, code-fenced JSON, and trailing commas inside the action list.
pub fn parse_lm_output(raw: &str) -> ParsedOutput {
    let mut out = ParsedOutput::default();

    if let Some(block) = extract_tagged(raw, "thoughts") {
        out.thoughts = parse_thoughts_block(&block);
    }
    out.think = extract_tagged(raw, "think").map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

    if let Some(block) = extract_tagged(raw, "action_list") {
        out.actions = parse_action_list(&block);
    }

    out
}

fn extract_tagged(raw: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = raw.find(&open)? + open.len();
    let end = raw[start..].find(&close)? + start;
    Some(raw[start..end].to_string())
}

fn parse_thoughts_block(block: &str) -> Vec<String> {
    block
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            let without_marker = line
                .strip_prefix('[')
                .and_then(|rest| rest.split_once(']').map(|(_, text)| text.trim()))
                .unwrap_or(line);
            if without_marker.is_empty() {
                None
            } else {
                Some(without_marker.to_string())
            }
        })
        .collect()
}

fn parse_action_list(block: &str) -> Vec<ActionCall> {
    let trimmed = strip_fence(block.trim());
    let cleaned = strip_trailing_commas(trimmed);
    serde_json::from_str(&cleaned).unwrap_or_else(|e| {
        warn!(error = %e, "failed to parse action_list JSON, treating as empty");
        Vec::new()
    })
}

fn strip_fence(s: &str) -> &str {
    let s = s.strip_prefix("```json").or_else(|| s.strip_prefix("```")).unwrap_or(s);
    s.strip_suffix("```").unwrap_or(s).trim()
}

/// Removes commas that appear right before a closing `]` or `}`, tolerating
/// the trailing-comma style some models emit.
fn strip_trailing_commas(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == ',' {
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j < chars.len() && (chars[j] == ']' || chars[j] == '}') {
                i += 1;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// A thought passes the single-thought-mode length gate (§6): 10-300 chars.
pub fn is_acceptable_single_thought(text: &str) -> bool {
    let len = text.trim().chars().count();
    (10..=300).contains(&len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numbered_thoughts_and_actions() {
        let raw = r#"<thoughts>
[1] first thought here
[2] second thought here
</thoughts>
<think>consider the weather tool</think>
<action_list>[{"tool":"weather.current","args":["paris"]}]</action_list>"#;
        let parsed = parse_lm_output(raw);
        assert_eq!(parsed.thoughts.len(), 2);
        assert_eq!(parsed.thoughts[0], "first thought here");
        assert_eq!(parsed.think.as_deref(), Some("consider the weather tool"));
        assert_eq!(parsed.actions.len(), 1);
        assert_eq!(parsed.actions[0].tool, "weather.current");
    }

    #[test]
    fn strips_json_fence_and_trailing_comma() {
        let raw = "<action_list>```json\n[{\"tool\":\"x.y\",\"args\":[\"a\",],}]\n```</action_list>";
        let parsed = parse_lm_output(raw);
        assert_eq!(parsed.actions.len(), 1);
        assert_eq!(parsed.actions[0].tool, "x.y");
    }

    #[test]
    fn empty_action_list_parses_to_empty_vec() {
        let raw = "<action_list>[]</action_list>";
        let parsed = parse_lm_output(raw);
        assert!(parsed.actions.is_empty());
    }

    #[test]
    fn missing_sections_yield_defaults() {
        let parsed = parse_lm_output("no tags here");
        assert!(parsed.thoughts.is_empty());
        assert!(parsed.think.is_none());
        assert!(parsed.actions.is_empty());
    }

    #[test]
    fn single_thought_length_gate() {
        assert!(!is_acceptable_single_thought("short"));
        assert!(is_acceptable_single_thought("this is long enough to pass the gate"));
        assert!(!is_acceptable_single_thought(&"x".repeat(400)));
    }

    #[test]
    fn cosine_similarity_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_mismatched_lengths_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }
}
