use anyhow::Result;
use serde_json::{json, Value};

/// Text generation call: instruction in, plain text out.
#[derive(Debug, Clone, PartialEq)]
pub struct TextGenerationRequest {
    pub instruction: String,
    /// Enables the provider's real-time search tool.
    pub use_search: bool,
    pub temperature: f64,
}

/// A base64-encoded image part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

/// Multimodal call: images plus instruction in, schema-conforming JSON text out.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAnalysisRequest {
    pub images: Vec<InlineImage>,
    pub instruction: String,
    pub response_schema: Value,
}

/// The remote generative-AI boundary.
pub trait GenerationBackend {
    fn name(&self) -> &str;
    fn generate_text(&self, request: &TextGenerationRequest) -> Result<String>;
    fn analyze_images(&self, request: &ImageAnalysisRequest) -> Result<String>;

    /// Replaces the user-supplied credential; `None` falls back to the ambient one.
    fn set_api_key(&mut self, _api_key: Option<String>) {}
}

/// Response schema for image analysis: an object with required string
/// fields `summary` and `prompt`.
pub fn analysis_response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "summary": {
                "type": "STRING",
                "description": "A concise, natural-language summary of the findings from the images."
            },
            "prompt": {
                "type": "STRING",
                "description": "A consolidated, descriptive prompt ready for use in another AI model."
            }
        },
        "required": ["summary", "prompt"]
    })
}

/// Offline backend producing deterministic placeholder output.
#[derive(Debug, Clone, Default)]
pub struct DryrunBackend;

impl GenerationBackend for DryrunBackend {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate_text(&self, request: &TextGenerationRequest) -> Result<String> {
        let idea = quoted_idea(&request.instruction).unwrap_or("your idea");
        Ok(format!(
            "Write a clear, specific response about {idea}. Include concrete details, state the \
             desired format up front, and ask clarifying questions if anything is ambiguous.{}",
            if request.use_search {
                " Use current, verifiable sources."
            } else {
                ""
            }
        ))
    }

    fn analyze_images(&self, request: &ImageAnalysisRequest) -> Result<String> {
        let mut mime_types = request
            .images
            .iter()
            .map(|image| image.mime_type.as_str())
            .collect::<Vec<&str>>();
        mime_types.sort_unstable();
        mime_types.dedup();
        let payload = json!({
            "summary": format!(
                "Dry run: received {} image(s) ({}).",
                request.images.len(),
                mime_types.join(", ")
            ),
            "prompt": format!(
                "A composition combining the subjects of {} reference image(s), matching their \
                 palette, lighting and framing.",
                request.images.len()
            ),
        });
        Ok(serde_json::to_string(&payload)?)
    }
}

fn quoted_idea(instruction: &str) -> Option<&str> {
    let (_, tail) = instruction.split_once("User's initial idea: \"")?;
    let line = tail.lines().next()?;
    let end = line.rfind('"')?;
    Some(&line[..end])
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::{
        analysis_response_schema, DryrunBackend, GenerationBackend, ImageAnalysisRequest,
        InlineImage, TextGenerationRequest,
    };

    #[test]
    fn schema_requires_summary_and_prompt() {
        let schema = analysis_response_schema();
        assert_eq!(schema["required"], serde_json::json!(["summary", "prompt"]));
        assert_eq!(schema["properties"]["summary"]["type"], "STRING");
        assert_eq!(schema["properties"]["prompt"]["type"], "STRING");
    }

    #[test]
    fn dryrun_text_mentions_quoted_idea() -> anyhow::Result<()> {
        let text = DryrunBackend.generate_text(&TextGenerationRequest {
            instruction: "Plan: Free\nUser's initial idea: \"a cat\"\nInstructions:".to_string(),
            use_search: false,
            temperature: 0.7,
        })?;
        assert!(text.contains("about a cat."));
        Ok(())
    }

    #[test]
    fn dryrun_analysis_is_schema_shaped_json() -> anyhow::Result<()> {
        let raw = DryrunBackend.analyze_images(&ImageAnalysisRequest {
            images: vec![
                InlineImage {
                    mime_type: "image/png".to_string(),
                    data: "AAAA".to_string(),
                },
                InlineImage {
                    mime_type: "image/png".to_string(),
                    data: "BBBB".to_string(),
                },
            ],
            instruction: "analyze".to_string(),
            response_schema: analysis_response_schema(),
        })?;
        let parsed: Value = serde_json::from_str(&raw)?;
        assert_eq!(parsed["summary"], "Dry run: received 2 image(s) (image/png).");
        assert!(parsed["prompt"].as_str().is_some());
        Ok(())
    }

    #[test]
    fn dryrun_analysis_lists_each_mime_type_once() -> anyhow::Result<()> {
        let image = |mime_type: &str| InlineImage {
            mime_type: mime_type.to_string(),
            data: "AAAA".to_string(),
        };
        let raw = DryrunBackend.analyze_images(&ImageAnalysisRequest {
            images: vec![image("image/png"), image("image/jpeg"), image("image/png")],
            instruction: "analyze".to_string(),
            response_schema: analysis_response_schema(),
        })?;
        let parsed: Value = serde_json::from_str(&raw)?;
        assert_eq!(
            parsed["summary"],
            "Dry run: received 3 image(s) (image/jpeg, image/png)."
        );
        Ok(())
    }
}
