use async_trait::async_trait;
use base64::Engine;
use garde::Validate;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::collaborators::{
    EnrichmentError, ExtractionError, FoodEnricher, MenuExtractor, WineEnricher,
};
use super::prompts;
use crate::models::enrichment::{
    FoodEnrichmentRequest, FoodEnrichmentResponse, WineEnrichmentRequest, WineEnrichmentResponse,
};
use crate::models::extraction::MenuExtraction;

const MAX_TOKENS: u32 = 4096;

/// Model names used for each kind of call.
#[derive(Debug, Clone)]
pub struct OpenAiModels {
    pub extraction: String,
    pub enrichment: String,
    pub image: String,
}

/// Client for the OpenAI chat completion and image generation APIs.
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: String,
    models: OpenAiModels,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'static str,
    quality: &'static str,
    response_format: &'static str,
}

#[derive(Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    b64_json: Option<String>,
    url: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[derive(Deserialize)]
struct FoodEnrichmentEnvelope {
    #[serde(default)]
    items: Vec<FoodEnrichmentResponse>,
}

#[derive(Deserialize)]
struct WineEnrichmentEnvelope {
    #[serde(default)]
    wines: Vec<WineEnrichmentResponse>,
}

impl OpenAiClient {
    pub fn new(
        api_key: String,
        base_url: String,
        models: OpenAiModels,
        timeout: Duration,
    ) -> Result<Self, OpenAiError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(OpenAiError::Http)?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            models,
        })
    }

    /// Ask a vision model about a set of images and decode its JSON answer.
    pub async fn vision_json<T: DeserializeOwned>(
        &self,
        system: &str,
        prompt: &str,
        image_urls: &[String],
    ) -> Result<T, OpenAiError> {
        let mut parts = vec![ContentPart::Text {
            text: prompt.to_string(),
        }];
        parts.extend(image_urls.iter().map(|url| ContentPart::ImageUrl {
            image_url: ImageUrl { url: url.clone() },
        }));

        let request = ChatRequest {
            model: &self.models.extraction,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(system.to_string()),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(parts),
                },
            ],
            max_tokens: MAX_TOKENS,
            response_format: Some(ResponseFormat {
                format_type: "json_object",
            }),
        };

        let content = self.chat(&request).await?;
        decode_json(&content)
    }

    /// Send a system + user prompt in JSON mode and decode the answer.
    pub async fn chat_json<T: DeserializeOwned>(
        &self,
        system: &str,
        user: String,
    ) -> Result<T, OpenAiError> {
        let request = ChatRequest {
            model: &self.models.enrichment,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(system.to_string()),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Text(user),
                },
            ],
            max_tokens: MAX_TOKENS,
            response_format: Some(ResponseFormat {
                format_type: "json_object",
            }),
        };

        let content = self.chat(&request).await?;
        decode_json(&content)
    }

    /// Generate one image and return its raw bytes.
    pub async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>, OpenAiError> {
        let request = ImageRequest {
            model: &self.models.image,
            prompt,
            n: 1,
            size: "1024x1024",
            quality: "standard",
            response_format: "b64_json",
        };

        let body = self
            .post(&format!("{}/images/generations", self.base_url), &request)
            .await?;
        let response: ImageResponse =
            serde_json::from_str(&body).map_err(OpenAiError::Parse)?;

        let image = response
            .data
            .into_iter()
            .next()
            .ok_or(OpenAiError::EmptyResponse)?;

        if let Some(encoded) = image.b64_json {
            return base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| OpenAiError::Decode(e.to_string()));
        }

        let url = image.url.ok_or(OpenAiError::EmptyResponse)?;
        let response = self.http.get(&url).send().await.map_err(OpenAiError::Http)?;
        if !response.status().is_success() {
            return Err(OpenAiError::Api {
                status: response.status().as_u16(),
                message: format!("Failed to download generated image from {}", url),
            });
        }
        let bytes = response.bytes().await.map_err(OpenAiError::Http)?;
        Ok(bytes.to_vec())
    }

    async fn chat(&self, request: &ChatRequest<'_>) -> Result<String, OpenAiError> {
        let body = self
            .post(&format!("{}/chat/completions", self.base_url), request)
            .await?;
        let response: ChatResponse = serde_json::from_str(&body).map_err(OpenAiError::Parse)?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(OpenAiError::EmptyResponse)
    }

    async fn post<B: Serialize>(&self, url: &str, body: &B) -> Result<String, OpenAiError> {
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(OpenAiError::Http)?;

        let status = response.status();
        let text = response.text().await.map_err(OpenAiError::Http)?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|b| b.error.message)
                .unwrap_or_else(|_| format!("API request failed with status {}", status.as_u16()));
            return Err(OpenAiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(text)
    }
}

/// Models sometimes wrap JSON in a Markdown code fence even in JSON mode.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let after_fence = &trimmed[start + 3..];
    let body = after_fence
        .strip_prefix("json")
        .unwrap_or(after_fence);
    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

fn decode_json<T: DeserializeOwned>(content: &str) -> Result<T, OpenAiError> {
    serde_json::from_str(strip_code_fence(content)).map_err(OpenAiError::Parse)
}

#[async_trait]
impl MenuExtractor for OpenAiClient {
    async fn extract(&self, photo_urls: &[String]) -> Result<MenuExtraction, ExtractionError> {
        if photo_urls.is_empty() {
            return Ok(MenuExtraction::default());
        }

        let extraction: MenuExtraction = self
            .vision_json(prompts::EXTRACTION_SYSTEM, prompts::EXTRACTION_PROMPT, photo_urls)
            .await
            .map_err(|e| ExtractionError::Request(e.to_string()))?;

        extraction
            .validate()
            .map_err(|e| ExtractionError::Invalid(e.to_string()))?;

        Ok(extraction)
    }
}

#[async_trait]
impl FoodEnricher for OpenAiClient {
    async fn enrich_food(
        &self,
        items: &[FoodEnrichmentRequest],
    ) -> Result<Vec<FoodEnrichmentResponse>, EnrichmentError> {
        let payload =
            serde_json::to_string(items).map_err(|e| EnrichmentError::Food(e.to_string()))?;
        let user = format!("{}\n\nItems to enrich:\n{}", prompts::FOOD_ENRICHMENT_PROMPT, payload);

        let envelope: FoodEnrichmentEnvelope = self
            .chat_json(prompts::FOOD_ENRICHMENT_SYSTEM, user)
            .await
            .map_err(|e| EnrichmentError::Food(e.to_string()))?;

        for item in &envelope.items {
            item.validate()
                .map_err(|e| EnrichmentError::Food(format!("item {:?}: {}", item.ref_id, e)))?;
        }

        Ok(envelope.items)
    }
}

#[async_trait]
impl WineEnricher for OpenAiClient {
    async fn enrich_wine(
        &self,
        items: &[WineEnrichmentRequest],
    ) -> Result<Vec<WineEnrichmentResponse>, EnrichmentError> {
        let payload =
            serde_json::to_string(items).map_err(|e| EnrichmentError::Wine(e.to_string()))?;
        let user = format!("{}\n\nWines to enrich:\n{}", prompts::WINE_ENRICHMENT_PROMPT, payload);

        let envelope: WineEnrichmentEnvelope = self
            .chat_json(prompts::WINE_ENRICHMENT_SYSTEM, user)
            .await
            .map_err(|e| EnrichmentError::Wine(e.to_string()))?;

        for wine in &envelope.wines {
            wine.validate()
                .map_err(|e| EnrichmentError::Wine(format!("wine {:?}: {}", wine.ref_id, e)))?;
        }

        Ok(envelope.wines)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OpenAiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OpenAI API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse JSON response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to decode image data: {0}")]
    Decode(String),

    #[error("OpenAI returned no content")]
    EmptyResponse,
}
