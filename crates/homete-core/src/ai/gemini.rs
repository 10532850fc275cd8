use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, error, instrument};

use crate::config::GatewaySettings;
use crate::gateway::{text_prompt, Gateway, IMAGE_INSTRUCTION};
use crate::imaging::{self, InlineImage};

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Serialize)]
struct GeminiContent {
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum RequestPart {
    Text { text: String },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

impl From<InlineImage> for InlineData {
    fn from(image: InlineImage) -> Self {
        Self {
            mime_type: image.mime_type,
            data: image.data,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate
    fn into_text(self) -> Result<String> {
        let block_reason = self.prompt_feedback.and_then(|f| f.block_reason);
        let candidate = self.candidates.into_iter().next().ok_or_else(|| match block_reason {
            Some(reason) => anyhow!("Prompt blocked: {}", reason),
            None => anyhow!("Response contained no candidates"),
        })?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(anyhow!(
                "Candidate had no text (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            ));
        }
        Ok(text)
    }
}

/// Client for the Gemini `generateContent` endpoint
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    text_model: String,
    vision_model: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("text_model", &self.text_model)
            .field("vision_model", &self.vision_model)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(settings: GatewaySettings) -> Self {
        Self {
            client: Client::new(),
            api_key: settings.api_key,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            text_model: settings.text_model,
            vision_model: settings.vision_model,
        }
    }

    #[instrument(skip(self, parts), fields(part_count = parts.len()))]
    async fn generate(&self, model: &str, parts: Vec<RequestPart>) -> Result<String> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, model);
        let request = GenerateRequest {
            contents: vec![GeminiContent { parts }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .context(format!("Failed to send request to Gemini API at {}", url))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            error!(%status, body = %text, "Gemini API request failed");
            return Err(anyhow!("Gemini API error {}: {}", status, text));
        }

        let gemini_response: GenerateResponse = response
            .json()
            .await
            .context("Failed to parse JSON response from Gemini API")?;
        let text = gemini_response.into_text()?;
        debug!(chars = text.chars().count(), "received Gemini reply");
        Ok(text)
    }
}

impl Gateway for GeminiClient {
    async fn reply_to_text(&self, text: &str) -> Result<String> {
        let parts = vec![RequestPart::Text {
            text: text_prompt(text),
        }];
        self.generate(&self.text_model, parts).await
    }

    async fn reply_to_image(&self, path: &Path) -> Result<String> {
        let owned = path.to_path_buf();
        let image = tokio::task::spawn_blocking(move || imaging::load_inline_image(&owned))
            .await
            .context("Image preprocessing task failed")??;

        let parts = vec![
            RequestPart::Text {
                text: IMAGE_INSTRUCTION.to_string(),
            },
            RequestPart::InlineData {
                inline_data: image.into(),
            },
        ];
        self.generate(&self.vision_model, parts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> GenerateResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_request_serializes_parts() {
        let request = GenerateRequest {
            contents: vec![GeminiContent {
                parts: vec![
                    RequestPart::Text {
                        text: "hi".to_string(),
                    },
                    RequestPart::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/png".to_string(),
                            data: "AAAA".to_string(),
                        },
                    },
                ],
            }],
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "contents": [{
                    "parts": [
                        { "text": "hi" },
                        { "inlineData": { "mimeType": "image/png", "data": "AAAA" } }
                    ]
                }]
            })
        );
    }

    #[test]
    fn test_text_joins_parts_of_first_candidate() {
        let response = parse(json!({
            "candidates": [
                { "content": { "parts": [{ "text": "すごい" }, { "text": "です" }] } },
                { "content": { "parts": [{ "text": "ignored" }] } }
            ]
        }));
        assert_eq!(response.into_text().unwrap(), "すごいです");
    }

    #[test]
    fn test_blocked_prompt_is_an_error() {
        let response = parse(json!({ "promptFeedback": { "blockReason": "SAFETY" } }));
        let err = response.into_text().unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn test_candidate_without_text_is_an_error() {
        let response = parse(json!({
            "candidates": [{ "finishReason": "RECITATION" }]
        }));
        let err = response.into_text().unwrap_err();
        assert!(err.to_string().contains("RECITATION"));
    }
}
