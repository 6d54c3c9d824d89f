// =============================================================================
// GEMINI CLIENT - Google AI Studio API Integration
// =============================================================================
//
// Implements `SummaryProvider` against Google's Gemini API
// (https://ai.google.dev/gemini-api/docs).
//
// **Request shape:**
// One `user` content with two parts: the instruction text and the PDF as
// `inlineData` (base64). Gemini reads the PDF natively, charts included, so
// no local text extraction happens.
//
// **Authentication:** the API key travels in the `x-goog-api-key` header so it
// never shows up in a URL (reqwest includes the URL in transport errors).
//
// **Environment Variables:**
// - `GEMINI_API_KEY` - Your API key from https://aistudio.google.com/apikey
// - `GEMINI_MODEL` - Model name, e.g. `gemini-2.5-flash`

use crate::core::summaries::{DocumentPayload, SummaryProvider};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::time::Duration;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const API_KEY_HEADER: &str = "x-goog-api-key";

// =============================================================================
// GEMINI API DATA STRUCTURES
// =============================================================================
//
// See: https://ai.google.dev/api/generate-content

/// A single part of content. Requests use `text` and `inline_data`; responses
/// carry `text` and, for thinking models, `thought`.
#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,

    /// Set on parts that are the model's reasoning rather than its answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    thought: Option<bool>,
}

/// Binary attachment embedded in the request.
#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    /// Base64-encoded bytes.
    data: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

/// See: https://ai.google.dev/api/generate-content#generationconfig
#[derive(Debug, Serialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

impl GenerationConfig {
    fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.max_output_tokens.is_none()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,

    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    /// Missing when the candidate was blocked.
    content: Option<Content>,

    /// Why the model stopped generating (e.g., "STOP", "MAX_TOKENS", "SAFETY").
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
}

/// Error response from the Gemini API.
#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiErrorDetail,
}

// =============================================================================
// GEMINI CLIENT IMPLEMENTATION
// =============================================================================

/// Client bound to one API key and one model.
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    generation: GenerationConfig,
}

impl GeminiClient {
    /// Creates a client whose requests give up after `timeout`.
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: API_BASE.to_string(),
            api_key,
            model,
            generation: GenerationConfig::default(),
        })
    }

    pub fn with_generation_config(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    /// Accepts both `gemini-2.5-flash` and `models/gemini-2.5-flash`.
    fn model_path(&self) -> String {
        if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        }
    }

    fn build_request(&self, prompt: &str, document: &DocumentPayload) -> GenerateContentRequest {
        let parts = vec![
            Part {
                text: Some(prompt.to_string()),
                ..Default::default()
            },
            Part {
                inline_data: Some(InlineData {
                    mime_type: document.mime_type.clone(),
                    data: BASE64.encode(&document.data),
                }),
                ..Default::default()
            },
        ];

        GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts,
            }],
            generation_config: if self.generation.is_empty() {
                None
            } else {
                Some(self.generation.clone())
            },
        }
    }

    fn http_request(&self, request: &GenerateContentRequest) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}/{}:generateContent", self.base_url, self.model_path()))
            .header(API_KEY_HEADER, &self.api_key)
            .json(request)
    }

    /// Joins the answer text of the first candidate, leaving out thought parts.
    fn extract_text(
        response: GenerateContentResponse,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        if let Some(reason) = response
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            return Err(format!("Gemini blocked the request: {}", reason).into());
        }

        let candidate = response
            .candidates
            .and_then(|c| c.into_iter().next())
            .ok_or(
                "No content in Gemini response - the model may have been blocked by safety filters",
            )?;

        let finish_reason = candidate.finish_reason.unwrap_or_default();
        let content = candidate
            .content
            .ok_or_else(|| format!("Gemini returned no content (finish reason: {})", finish_reason))?;

        if finish_reason == "MAX_TOKENS" {
            tracing::warn!("Gemini stopped at the output token limit; summary may be truncated");
        }

        let text: String = content
            .parts
            .into_iter()
            .filter(|p| !p.thought.unwrap_or(false))
            .filter_map(|p| p.text)
            .collect();

        Ok(text)
    }
}

#[async_trait]
impl SummaryProvider for GeminiClient {
    async fn summarize(
        &self,
        prompt: &str,
        document: &DocumentPayload,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        let request = self.build_request(prompt, document);

        // Log request for debugging (be careful not to log the API key!)
        tracing::debug!(
            "Gemini request to {}: {} prompt chars, {} document bytes",
            self.model_path(),
            prompt.len(),
            document.data.len()
        );

        let response = self.http_request(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;

            if let Ok(error_response) = serde_json::from_str::<GeminiErrorResponse>(&error_text) {
                return Err(format!(
                    "Gemini API error ({}): {}",
                    status, error_response.error.message
                )
                .into());
            }

            return Err(format!("Gemini API error: {} - {}", status, error_text).into());
        }

        let response_json: GenerateContentResponse = response.json().await?;

        if let Some(usage) = &response_json.usage_metadata {
            tracing::debug!(
                "Gemini usage: {} prompt tokens, {} output tokens",
                usage.prompt_token_count.unwrap_or(0),
                usage.candidates_token_count.unwrap_or(0)
            );
        }

        Self::extract_text(response_json)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn client(model: &str) -> GeminiClient {
        GeminiClient::new("test-key".to_string(), model.to_string(), Duration::from_secs(5))
            .unwrap()
    }

    #[test]
    fn test_model_path_prefix() {
        assert_eq!(client("gemini-2.5-flash").model_path(), "models/gemini-2.5-flash");
        assert_eq!(
            client("models/gemini-1.5-flash").model_path(),
            "models/gemini-1.5-flash"
        );
    }

    #[test]
    fn test_request_carries_prompt_and_inline_pdf() {
        let document = DocumentPayload::pdf(b"%PDF-1.4".to_vec());
        let request = client("gemini-2.5-flash").build_request("Summarize.", &document);

        let json = serde_json::to_value(&request).unwrap();
        let parts = &json["contents"][0]["parts"];

        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(parts[0]["text"], "Summarize.");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "application/pdf");
        assert_eq!(parts[1]["inlineData"]["data"], "JVBERi0xLjQ=");
        assert!(parts[1].get("text").is_none());
        assert!(json.get("generationConfig").is_none());
    }

    #[test]
    fn test_generation_config_serialization() {
        let client = client("gemini-2.5-flash").with_generation_config(GenerationConfig {
            temperature: Some(0.2),
            max_output_tokens: None,
        });
        let request = client.build_request("p", &DocumentPayload::pdf(Vec::new()));

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"generationConfig\":{\"temperature\":0.2}"));
        assert!(!json.contains("maxOutputTokens"));
    }

    #[test]
    fn test_api_key_sent_as_header_not_in_url() {
        let client = client("gemini-2.5-flash");
        let body = client.build_request("p", &DocumentPayload::pdf(Vec::new()));

        let request = client.http_request(&body).build().unwrap();

        assert_eq!(
            request.url().as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert!(request.url().query().is_none());
        assert_eq!(request.headers()[API_KEY_HEADER], "test-key");
    }

    #[tokio::test]
    async fn test_transport_error_does_not_leak_api_key() {
        // Nothing listens on port 1, so the request fails before any response.
        let client = client("gemini-2.5-flash").with_base_url("http://127.0.0.1:1/v1beta");

        let err = client
            .summarize("p", &DocumentPayload::pdf(b"%PDF".to_vec()))
            .await
            .unwrap_err();

        assert!(!err.to_string().contains("test-key"));
    }

    #[test]
    fn test_extract_text_skips_thoughts() {
        let body = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "thinking...", "thought": true},
                    {"text": "Graded components: "},
                    {"text": "Midterm."}
                ]},
                "finishReason": "STOP"
            }]
        }"#;
        let response: GenerateContentResponse = serde_json::from_str(body).unwrap();

        let text = GeminiClient::extract_text(response).unwrap();
        assert_eq!(text, "Graded components: Midterm.");
    }

    #[test]
    fn test_extract_text_reports_block_reason() {
        let body = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        let response: GenerateContentResponse = serde_json::from_str(body).unwrap();

        let err = GeminiClient::extract_text(response).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn test_extract_text_without_candidates_is_error() {
        let response: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert!(GeminiClient::extract_text(response).is_err());
    }

    #[test]
    fn test_extract_text_candidate_without_content() {
        let body = r#"{"candidates": [{"finishReason": "SAFETY"}]}"#;
        let response: GenerateContentResponse = serde_json::from_str(body).unwrap();

        let err = GeminiClient::extract_text(response).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }
}
