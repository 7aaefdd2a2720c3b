use std::path::Path;

use agink_contracts::{AiApp, AnalysisResult, Plan, RefinementOptions};
use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::backend::{
    analysis_response_schema, GenerationBackend, ImageAnalysisRequest, InlineImage,
    TextGenerationRequest,
};
use crate::config::GatewayConfig;

pub const PROMPT_FALLBACK: &str =
    "Sorry, an error occurred while generating the prompt. Please try again later.";
pub const ANALYSIS_FALLBACK_SUMMARY: &str = "Sorry, an error occurred while analyzing the images. Please ensure they are valid image files and try again.";
pub const ANALYSIS_FALLBACK_PROMPT: &str = "Analysis failed.";

/// Raw image bytes with their MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageInput {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Reads an image file, taking the MIME type from the extension and
    /// falling back to sniffing the content.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
        let mime_type = mime_for_path(path)
            .or_else(|| {
                image::guess_format(&bytes)
                    .ok()
                    .map(|format| format.to_mime_type())
            })
            .filter(|mime| mime.starts_with("image/"));
        let Some(mime_type) = mime_type else {
            bail!("{} is not a recognized image file", path.display());
        };
        Ok(Self::new(mime_type, bytes))
    }

    fn to_inline(&self) -> InlineImage {
        InlineImage {
            mime_type: self.mime_type.clone(),
            data: BASE64.encode(&self.bytes),
        }
    }
}

/// Translates typed domain calls into backend requests and folds every
/// backend failure into a fixed, success-shaped fallback value.
pub struct Gateway {
    backend: Box<dyn GenerationBackend>,
    config: GatewayConfig,
}

impl Gateway {
    pub fn new<B: GenerationBackend + 'static>(backend: B, config: GatewayConfig) -> Self {
        Self {
            backend: Box::new(backend),
            config,
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn set_api_key(&mut self, api_key: Option<String>) {
        self.backend.set_api_key(api_key);
    }

    pub fn uses_search(&self, idea: &str) -> bool {
        idea.chars().count() < self.config.grounding_threshold_chars
    }

    pub fn generate_prompt(
        &self,
        app: &AiApp,
        plan: Plan,
        idea: &str,
        options: RefinementOptions,
    ) -> String {
        let request = TextGenerationRequest {
            instruction: prompt_instruction(app, plan, idea, options),
            use_search: self.uses_search(idea),
            temperature: self.config.temperature,
        };
        tracing::debug!(
            backend = self.backend.name(),
            app = %app.id,
            %plan,
            use_search = request.use_search,
            "generating prompt"
        );
        let outcome = self.backend.generate_text(&request).and_then(|text| {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                bail!("empty prompt text");
            }
            Ok(trimmed.to_string())
        });
        match outcome {
            Ok(text) => text,
            Err(err) => {
                tracing::error!("error generating optimized prompt: {err:#}");
                PROMPT_FALLBACK.to_string()
            }
        }
    }

    pub fn analyze_images(&self, images: &[ImageInput]) -> AnalysisResult {
        match self.try_analyze_images(images) {
            Ok(result) => result,
            Err(err) => {
                tracing::error!("error analyzing images: {err:#}");
                analysis_fallback()
            }
        }
    }

    fn try_analyze_images(&self, images: &[ImageInput]) -> Result<AnalysisResult> {
        if images.is_empty() {
            bail!("no images to analyze");
        }
        let request = ImageAnalysisRequest {
            images: images.iter().map(ImageInput::to_inline).collect(),
            instruction: ANALYSIS_INSTRUCTION.to_string(),
            response_schema: analysis_response_schema(),
        };
        tracing::debug!(
            backend = self.backend.name(),
            images = images.len(),
            "analyzing images"
        );
        let raw = self.backend.analyze_images(&request)?;
        let result: AnalysisResult = serde_json::from_str(raw.trim())
            .context("analysis response does not match the summary/prompt schema")?;
        Ok(result)
    }
}

pub fn analysis_fallback() -> AnalysisResult {
    AnalysisResult {
        summary: ANALYSIS_FALLBACK_SUMMARY.to_string(),
        prompt: ANALYSIS_FALLBACK_PROMPT.to_string(),
    }
}

fn prompt_instruction(app: &AiApp, plan: Plan, idea: &str, options: RefinementOptions) -> String {
    format!(
        "You are AG ink, a world-class AI assistant specializing in prompt engineering.
Your task is to refine a user's idea into a highly effective, detailed, and context-aware prompt for a specific AI model.

AI Platform: {name}
Plan: {plan}
Platform Capabilities: {capabilities}

Refinement Parameters:
- Tone: {tone}
- Style: {style}
- Desired Length: {length}

User's initial idea: \"{idea}\"

Instructions:
1. Analyze the user's idea, the target AI platform's capabilities, and the refinement parameters (Tone, Style, Length).
2. If the user's idea is vague, incomplete, or relates to recent events, use your search capabilities to find relevant, up-to-date information to enrich the prompt.
3. Craft a new, optimized prompt that is clear, specific, and structured to elicit the best possible response from the selected AI, adhering strictly to the specified tone, style, and length.
4. The final prompt should be ready to be copied and pasted.
5. Your response must contain ONLY the generated prompt as plain text, with no extra formatting, explanations, or conversational text.
",
        name = app.name,
        capabilities = app.capabilities,
        tone = options.tone,
        style = options.style,
        length = options.length,
    )
}

const ANALYSIS_INSTRUCTION: &str = "You are AG ink, an expert visual analysis AI.
Your task is to analyze a set of user-provided images and generate two things: a human-readable summary and a consolidated, descriptive prompt for another AI model.

Instructions:
1. Carefully examine all the provided images. Identify key objects, scenes, actions, text, colors, and overall composition.
2. Write a concise, natural-language summary of your findings.
3. Create a single, consolidated, and highly descriptive ready-to-use prompt. This prompt should effectively communicate the visual content of all images to an AI model (either text-to-image or a multimodal text model).
4. Your response must be a single, valid JSON object with two keys: summary and prompt.
";

fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use agink_contracts::{AppCatalog, Plan, RefinementOptions, Style, Tone};
    use base64::Engine as _;

    use super::{
        analysis_fallback, Gateway, ImageInput, ANALYSIS_FALLBACK_PROMPT, PROMPT_FALLBACK,
    };
    use crate::config::GatewayConfig;
    use crate::testing::{Reply, ScriptedBackend};

    fn gateway(backend: ScriptedBackend) -> Gateway {
        Gateway::new(backend, GatewayConfig::default())
    }

    #[test]
    fn generate_prompt_trims_success_text() {
        let backend = ScriptedBackend::new().with_text(Reply::Ok("  Refined prompt.\n".into()));
        let catalog = AppCatalog::default();
        let app = catalog.resolve("claude").unwrap();
        let text = gateway(backend.clone()).generate_prompt(
            app,
            Plan::Paid,
            "summarize a paper",
            RefinementOptions {
                tone: Tone::Professional,
                style: Style::Technical,
                ..RefinementOptions::default()
            },
        );
        assert_eq!(text, "Refined prompt.");

        let calls = backend.text_calls();
        assert_eq!(calls.len(), 1);
        let instruction = &calls[0].instruction;
        assert!(instruction.contains("AI Platform: Claude"));
        assert!(instruction.contains("Plan: Paid"));
        assert!(instruction.contains(&app.capabilities));
        assert!(instruction.contains("- Tone: Professional"));
        assert!(instruction.contains("- Style: Technical"));
        assert!(instruction.contains("- Desired Length: Medium"));
        assert!(instruction.contains("User's initial idea: \"summarize a paper\""));
        assert!((calls[0].temperature - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn search_is_enabled_below_threshold_only() {
        let backend = ScriptedBackend::new();
        let gateway = gateway(backend.clone());
        let catalog = AppCatalog::default();
        let app = catalog.first().unwrap();

        gateway.generate_prompt(app, Plan::Free, &"x".repeat(99), RefinementOptions::default());
        gateway.generate_prompt(app, Plan::Free, &"x".repeat(100), RefinementOptions::default());

        let flags = backend
            .text_calls()
            .iter()
            .map(|call| call.use_search)
            .collect::<Vec<bool>>();
        assert_eq!(flags, vec![true, false]);
    }

    #[test]
    fn threshold_counts_characters_and_is_configurable() {
        let gateway = Gateway::new(
            ScriptedBackend::new(),
            GatewayConfig {
                grounding_threshold_chars: 3,
                ..GatewayConfig::default()
            },
        );
        assert!(gateway.uses_search("éé"));
        assert!(!gateway.uses_search("ééé"));
    }

    #[test]
    fn generate_prompt_failure_returns_fallback() {
        let catalog = AppCatalog::default();
        let app = catalog.first().unwrap();
        for reply in [Reply::Err("quota exceeded".into()), Reply::Ok("   ".into())] {
            let backend = ScriptedBackend::new().with_text(reply);
            let text =
                gateway(backend).generate_prompt(app, Plan::Free, "a cat", RefinementOptions::default());
            assert_eq!(text, PROMPT_FALLBACK);
        }
    }

    #[test]
    fn analyze_images_encodes_each_image_in_order() {
        let backend = ScriptedBackend::new().with_analysis(Reply::Ok(
            r#"{"summary": "A red square.", "prompt": "A flat red square on white."}"#.into(),
        ));
        let images = vec![
            ImageInput::new("image/png", vec![1, 2, 3]),
            ImageInput::new("image/jpeg", vec![4, 5]),
        ];
        let result = gateway(backend.clone()).analyze_images(&images);
        assert_eq!(result.summary, "A red square.");
        assert_eq!(result.prompt, "A flat red square on white.");

        let calls = backend.analysis_calls();
        assert_eq!(calls.len(), 1);
        let sent = &calls[0].images;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].mime_type, "image/png");
        assert_eq!(
            sent[0].data,
            base64::engine::general_purpose::STANDARD.encode([1u8, 2, 3])
        );
        assert_eq!(sent[1].mime_type, "image/jpeg");
        assert_eq!(calls[0].response_schema["required"][0], "summary");
    }

    #[test]
    fn analyze_images_failures_return_fallback() {
        let images = vec![ImageInput::new("image/png", vec![0])];
        for reply in [
            Reply::Err("network down".into()),
            Reply::Ok("not json".into()),
            Reply::Ok(r#"{"summary": "only a summary"}"#.into()),
            Reply::Ok(r#"{"summary": 1, "prompt": "p"}"#.into()),
        ] {
            let backend = ScriptedBackend::new().with_analysis(reply);
            let result = gateway(backend).analyze_images(&images);
            assert_eq!(result, analysis_fallback());
            assert_eq!(result.prompt, ANALYSIS_FALLBACK_PROMPT);
        }
    }

    #[test]
    fn analyze_without_images_never_calls_backend() {
        let backend = ScriptedBackend::new();
        let result = gateway(backend.clone()).analyze_images(&[]);
        assert_eq!(result, analysis_fallback());
        assert!(backend.analysis_calls().is_empty());
    }

    #[test]
    fn image_input_resolves_mime_from_extension_or_content() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let named = temp.path().join("photo.JPG");
        std::fs::write(&named, [0xFF, 0xD8, 0xFF, 0xE0])?;
        assert_eq!(ImageInput::from_path(&named)?.mime_type, "image/jpeg");

        let sniffed = temp.path().join("upload.bin");
        std::fs::write(&sniffed, b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR")?;
        assert_eq!(ImageInput::from_path(&sniffed)?.mime_type, "image/png");

        let text = temp.path().join("notes.txt");
        std::fs::write(&text, "hello")?;
        assert!(ImageInput::from_path(&text).is_err());
        assert!(ImageInput::from_path(&temp.path().join("missing.png")).is_err());
        Ok(())
    }
}
