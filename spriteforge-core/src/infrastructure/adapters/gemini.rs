// spriteforge-core/src/infrastructure/adapters/gemini.rs
//
// Gemini image-edit backend behind the ImageGenerator port. Network-facing
// code lives here and nowhere else; the orchestrator only ever sees
// GeneratorResult / GeneratorError. The API key travels in a request
// header and must never reach a log line or a persisted artifact.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::Rng;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::ports::generator::{
    GeneratorError, GeneratorRequest, GeneratorResult, ImageGenerator, PromptPart,
};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Bounded dependency retries before the error surfaces to the
/// orchestrator. Quality retries are the retry manager's business, not ours.
const TRANSPORT_RETRIES: u32 = 3;

pub struct GeminiImageConnector {
    http: reqwest::Client,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl GeminiImageConnector {
    pub fn new(api_key: String, model: &str, timeout_secs: u64) -> Result<Self, GeneratorError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| GeneratorError::Unavailable(format!("HTTP client init: {e}")))?;

        Ok(Self {
            http,
            api_key,
            model: model.to_string(),
            timeout_secs,
        })
    }

    fn request_body(&self, request: &GeneratorRequest) -> serde_json::Value {
        let parts: Vec<serde_json::Value> = request
            .parts
            .iter()
            .flat_map(|part| match part {
                PromptPart::Text(text) => vec![serde_json::json!({ "text": text })],
                // The label rides as its own text part directly before the
                // image it describes; the backend reads them in order.
                PromptPart::InlinePng { label, bytes } => vec![
                    serde_json::json!({ "text": label }),
                    serde_json::json!({
                        "inline_data": {
                            "mime_type": "image/png",
                            "data": BASE64.encode(bytes),
                        }
                    }),
                ],
            })
            .collect();

        let mut generation_config = serde_json::json!({
            "temperature": request.sampling.temperature,
            "topP": request.sampling.top_p,
            "topK": request.sampling.top_k,
            "responseModalities": ["IMAGE"],
        });
        if let Some(seed) = request.seed {
            generation_config["seed"] = serde_json::json!(seed);
        }

        serde_json::json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": generation_config,
        })
    }

    async fn call_once(&self, body: &serde_json::Value) -> Result<GeneratorResult, GeneratorError> {
        let url = format!("{API_BASE}/models/{}:generateContent", self.model);

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GeneratorError::Timeout(self.timeout_secs)
                } else {
                    // reqwest error strings may embed the URL; the key is
                    // in a header, so the message is safe to propagate.
                    GeneratorError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after_ms = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(2_000);
            return Err(GeneratorError::RateLimited { retry_after_ms });
        }
        if status.is_server_error() {
            return Err(GeneratorError::Unavailable(format!("HTTP {status}")));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GeneratorError::InvalidResponse(format!(
                "HTTP {status}: {}",
                text.chars().take(300).collect::<String>()
            )));
        }

        let payload: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| GeneratorError::InvalidResponse(e.to_string()))?;

        extract_result(payload, &request_sampling(body))
    }
}

fn request_sampling(body: &serde_json::Value) -> crate::ports::generator::SamplingParams {
    let config = &body["generationConfig"];
    crate::ports::generator::SamplingParams {
        temperature: config["temperature"].as_f64().unwrap_or(1.0),
        top_p: config["topP"].as_f64().unwrap_or(0.95),
        top_k: config["topK"].as_u64().unwrap_or(40) as u32,
    }
}

#[async_trait]
impl ImageGenerator for GeminiImageConnector {
    async fn generate(&self, request: GeneratorRequest) -> Result<GeneratorResult, GeneratorError> {
        let body = self.request_body(&request);

        let mut last_error = GeneratorError::Unavailable("no attempt made".to_string());
        for attempt in 1..=TRANSPORT_RETRIES {
            match self.call_once(&body).await {
                Ok(result) => return Ok(result),
                Err(e @ GeneratorError::InvalidResponse(_)) => return Err(e),
                Err(e) => {
                    let backoff_ms = match &e {
                        GeneratorError::RateLimited { retry_after_ms } => *retry_after_ms,
                        _ => 500 * 2u64.pow(attempt - 1),
                    };
                    // Jitter keeps parallel operator machines from thundering.
                    let jitter = rand::thread_rng().gen_range(0..250);
                    warn!(attempt, error = %e, "generator transport error; backing off");
                    last_error = e;
                    if attempt < TRANSPORT_RETRIES {
                        tokio::time::sleep(Duration::from_millis(backoff_ms + jitter)).await;
                    }
                }
            }
        }
        Err(last_error)
    }

    fn describe(&self) -> String {
        format!("gemini:{}", self.model)
    }

    async fn close(&self) {
        debug!("gemini connector closed");
    }
}

// --- RESPONSE SHAPE ---

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(rename = "inlineData", alias = "inline_data")]
    inline_data: Option<InlineData>,
    #[serde(rename = "thoughtSignature", alias = "thought_signature")]
    thought_signature: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    #[serde(rename = "mimeType", alias = "mime_type", default)]
    mime_type: String,
    data: String,
}

fn extract_result(
    payload: GenerateContentResponse,
    sampling: &crate::ports::generator::SamplingParams,
) -> Result<GeneratorResult, GeneratorError> {
    let parts = payload
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts)
        .ok_or_else(|| GeneratorError::InvalidResponse("no candidate content".to_string()))?;

    let mut png_bytes = None;
    let mut thought_signature = None;
    let mut thought_content = None;

    for part in parts {
        if let Some(inline) = part.inline_data {
            if inline.mime_type == "image/png" || png_bytes.is_none() {
                png_bytes = Some(BASE64.decode(inline.data.as_bytes()).map_err(|e| {
                    GeneratorError::InvalidResponse(format!("bad base64 image: {e}"))
                })?);
            }
        }
        if part.thought_signature.is_some() {
            thought_signature = part.thought_signature;
        }
        if part.thought {
            thought_content = part.text;
        }
    }

    let png_bytes = png_bytes
        .ok_or_else(|| GeneratorError::InvalidResponse("response had no image part".to_string()))?;

    Ok(GeneratorResult {
        png_bytes,
        thought_signature,
        thought_content,
        sampling: sampling.clone(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ports::generator::SamplingParams;

    #[test]
    fn test_request_body_shape() {
        let connector =
            GeminiImageConnector::new("key".into(), "gemini-2.5-flash-image", 120).unwrap();
        let request = GeneratorRequest {
            parts: vec![
                PromptPart::InlinePng { label: "[IMAGE 1]".into(), bytes: vec![1, 2, 3] },
                PromptPart::Text("prompt".into()),
            ],
            seed: Some(42),
            sampling: SamplingParams::default(),
        };

        let body = connector.request_body(&request);
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        // Label text + inline image + prompt text.
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0]["text"], "[IMAGE 1]");
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(body["generationConfig"]["seed"], 42);
        assert_eq!(body["generationConfig"]["temperature"], 1.0);
    }

    #[test]
    fn test_unseeded_request_omits_seed() {
        let connector =
            GeminiImageConnector::new("key".into(), "gemini-2.5-flash-image", 120).unwrap();
        let request = GeneratorRequest {
            parts: vec![PromptPart::Text("p".into())],
            seed: None,
            sampling: SamplingParams::default(),
        };
        let body = connector.request_body(&request);
        assert!(body["generationConfig"].get("seed").is_none());
    }

    #[test]
    fn test_extract_result_reads_image_and_thoughts() {
        let json = serde_json::json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "planning the frame", "thought": true },
                        { "thoughtSignature": "sig123" },
                        { "inlineData": { "mimeType": "image/png", "data": BASE64.encode(b"png-bytes") } }
                    ]
                }
            }]
        });
        let payload: GenerateContentResponse = serde_json::from_value(json).unwrap();
        let result = extract_result(payload, &SamplingParams::default()).unwrap();

        assert_eq!(result.png_bytes, b"png-bytes");
        assert_eq!(result.thought_signature.as_deref(), Some("sig123"));
        assert_eq!(result.thought_content.as_deref(), Some("planning the frame"));
    }

    #[test]
    fn test_extract_result_without_image_is_invalid() {
        let json = serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": "sorry" }] } }]
        });
        let payload: GenerateContentResponse = serde_json::from_value(json).unwrap();
        assert!(matches!(
            extract_result(payload, &SamplingParams::default()),
            Err(GeneratorError::InvalidResponse(_))
        ));
    }
}
