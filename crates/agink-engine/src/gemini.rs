use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Map, Value};

use crate::backend::{
    GenerationBackend, ImageAnalysisRequest, InlineImage, TextGenerationRequest,
};
use crate::config::{env_api_key, GatewayConfig};

/// Gemini `generateContent` transport.
pub struct GeminiBackend {
    api_base: String,
    text_model: String,
    vision_model: String,
    timeout: Duration,
    user_api_key: Option<String>,
    http: HttpClient,
}

impl GeminiBackend {
    pub fn new(config: &GatewayConfig, user_api_key: Option<String>) -> Self {
        Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            text_model: config.text_model.clone(),
            vision_model: config.vision_model.clone(),
            timeout: config.request_timeout(),
            user_api_key: user_api_key.filter(|key| !key.trim().is_empty()),
            http: HttpClient::new(),
        }
    }

    fn api_key(&self) -> Option<String> {
        self.user_api_key.clone().or_else(env_api_key)
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    fn post(&self, model: &str, payload: &Value) -> Result<Value> {
        let Some(api_key) = self.api_key() else {
            bail!("GEMINI_API_KEY or GOOGLE_API_KEY not set and no API key saved");
        };
        let endpoint = self.endpoint_for_model(model);
        tracing::debug!(%endpoint, "gemini request");
        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", api_key.as_str())])
            .timeout(self.timeout)
            .json(payload)
            .send()
            .with_context(|| format!("Gemini request failed ({endpoint})"))?;
        response_json_or_error("Gemini", response)
    }
}

impl GenerationBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate_text(&self, request: &TextGenerationRequest) -> Result<String> {
        let payload = text_payload(request);
        let response = self.post(&self.text_model, &payload)?;
        extract_text(&response)
    }

    fn analyze_images(&self, request: &ImageAnalysisRequest) -> Result<String> {
        let payload = analysis_payload(request);
        let response = self.post(&self.vision_model, &payload)?;
        extract_text(&response)
    }

    fn set_api_key(&mut self, api_key: Option<String>) {
        self.user_api_key = api_key.filter(|key| !key.trim().is_empty());
    }
}

fn text_payload(request: &TextGenerationRequest) -> Value {
    let mut payload = Map::new();
    payload.insert(
        "contents".to_string(),
        json!([{
            "role": "user",
            "parts": [{ "text": request.instruction }],
        }]),
    );
    payload.insert(
        "generationConfig".to_string(),
        json!({ "temperature": request.temperature }),
    );
    if request.use_search {
        payload.insert("tools".to_string(), json!([{ "googleSearch": {} }]));
    }
    Value::Object(payload)
}

fn analysis_payload(request: &ImageAnalysisRequest) -> Value {
    let mut parts = request
        .images
        .iter()
        .map(inline_part)
        .collect::<Vec<Value>>();
    parts.push(json!({ "text": request.instruction }));
    json!({
        "contents": [{
            "role": "user",
            "parts": parts,
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": request.response_schema,
        },
    })
}

fn inline_part(image: &InlineImage) -> Value {
    json!({
        "inlineData": {
            "mimeType": image.mime_type,
            "data": image.data,
        }
    })
}

/// Concatenates the text parts of the first candidate.
fn extract_text(response_payload: &Value) -> Result<String> {
    let candidate = response_payload
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|rows| rows.first());
    let Some(candidate) = candidate else {
        let reason = response_payload
            .get("promptFeedback")
            .and_then(|feedback| feedback.get("blockReason"))
            .and_then(Value::as_str)
            .unwrap_or("no candidates");
        bail!("Gemini returned no candidates ({reason})");
    };
    let text = candidate
        .get("content")
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default();
    if text.trim().is_empty() {
        let finish = candidate
            .get("finishReason")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        bail!("Gemini returned an empty response (finishReason={finish})");
    }
    Ok(text)
}

fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("{provider} response body read failed"))?;
    if !status.is_success() {
        bail!(
            "{provider} request failed ({code}): {}",
            truncate_text(&body, 512)
        );
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{provider} returned invalid JSON payload"))?;
    Ok(parsed)
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{analysis_payload, extract_text, text_payload, truncate_text, GeminiBackend};
    use crate::backend::{
        analysis_response_schema, GenerationBackend, ImageAnalysisRequest, InlineImage,
        TextGenerationRequest,
    };
    use crate::config::GatewayConfig;

    #[test]
    fn endpoint_prefixes_models_path_once() {
        let config = GatewayConfig {
            api_base: "https://example.test/v1beta/".to_string(),
            ..GatewayConfig::default()
        };
        let backend = GeminiBackend::new(&config, None);
        assert_eq!(
            backend.endpoint_for_model("gemini-2.5-pro"),
            "https://example.test/v1beta/models/gemini-2.5-pro:generateContent"
        );
        assert_eq!(
            backend.endpoint_for_model("models/gemini-2.5-flash"),
            "https://example.test/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn saved_key_takes_precedence_and_blank_is_ignored() {
        let mut backend = GeminiBackend::new(&GatewayConfig::default(), Some("  ".to_string()));
        assert!(backend.user_api_key.is_none());
        backend.set_api_key(Some("user-key".to_string()));
        assert_eq!(backend.api_key().as_deref(), Some("user-key"));
    }

    #[test]
    fn text_payload_adds_search_tool_only_when_requested() {
        let mut request = TextGenerationRequest {
            instruction: "refine".to_string(),
            use_search: true,
            temperature: 0.7,
        };
        let grounded = text_payload(&request);
        assert_eq!(grounded["tools"], json!([{ "googleSearch": {} }]));
        assert_eq!(grounded["generationConfig"]["temperature"], json!(0.7));
        assert_eq!(grounded["contents"][0]["parts"][0]["text"], json!("refine"));

        request.use_search = false;
        assert!(text_payload(&request).get("tools").is_none());
    }

    #[test]
    fn analysis_payload_puts_images_before_instruction() {
        let payload = analysis_payload(&ImageAnalysisRequest {
            images: vec![InlineImage {
                mime_type: "image/jpeg".to_string(),
                data: "AAAA".to_string(),
            }],
            instruction: "describe".to_string(),
            response_schema: analysis_response_schema(),
        });
        let parts = &payload["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], json!("image/jpeg"));
        assert_eq!(parts[0]["inlineData"]["data"], json!("AAAA"));
        assert_eq!(parts[1]["text"], json!("describe"));
        assert_eq!(
            payload["generationConfig"]["responseMimeType"],
            json!("application/json")
        );
        assert_eq!(
            payload["generationConfig"]["responseSchema"]["required"],
            json!(["summary", "prompt"])
        );
    }

    #[test]
    fn extract_text_joins_parts_of_first_candidate() -> anyhow::Result<()> {
        let response = json!({
            "candidates": [
                {"content": {"parts": [{"text": "Hello, "}, {"text": "world"}]}},
                {"content": {"parts": [{"text": "ignored"}]}}
            ]
        });
        assert_eq!(extract_text(&response)?, "Hello, world");
        Ok(())
    }

    #[test]
    fn extract_text_rejects_blocked_or_empty_responses() {
        let blocked = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let err = extract_text(&blocked).err().map(|err| err.to_string());
        assert_eq!(
            err.as_deref(),
            Some("Gemini returned no candidates (SAFETY)")
        );

        let empty = json!({"candidates": [{"content": {"parts": []}, "finishReason": "MAX_TOKENS"}]});
        assert!(extract_text(&empty).is_err());
    }

    #[test]
    fn truncate_text_marks_cut() {
        assert_eq!(truncate_text("abcdef", 3), "abc…");
        assert_eq!(truncate_text("abc", 3), "abc");
    }
}
