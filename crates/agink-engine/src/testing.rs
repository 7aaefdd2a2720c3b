use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use crate::backend::{GenerationBackend, ImageAnalysisRequest, TextGenerationRequest};

#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Ok(String),
    Err(String),
}

impl Reply {
    fn resolve(&self) -> Result<String> {
        match self {
            Reply::Ok(text) => Ok(text.clone()),
            Reply::Err(message) => Err(anyhow!(message.clone())),
        }
    }
}

#[derive(Debug)]
struct Script {
    text_reply: Reply,
    analysis_reply: Reply,
    text_calls: Vec<TextGenerationRequest>,
    analysis_calls: Vec<ImageAnalysisRequest>,
}

/// Backend double with canned replies that records every request.
#[derive(Debug, Clone)]
pub(crate) struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
}

impl ScriptedBackend {
    pub(crate) fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                text_reply: Reply::Ok("Optimized prompt.".to_string()),
                analysis_reply: Reply::Ok(
                    r#"{"summary": "A cat on a sofa.", "prompt": "A tabby cat curled on a green sofa."}"#
                        .to_string(),
                ),
                text_calls: Vec::new(),
                analysis_calls: Vec::new(),
            })),
        }
    }

    pub(crate) fn with_text(self, reply: Reply) -> Self {
        self.script.lock().unwrap().text_reply = reply;
        self
    }

    pub(crate) fn with_analysis(self, reply: Reply) -> Self {
        self.script.lock().unwrap().analysis_reply = reply;
        self
    }

    pub(crate) fn text_calls(&self) -> Vec<TextGenerationRequest> {
        self.script.lock().unwrap().text_calls.clone()
    }

    pub(crate) fn analysis_calls(&self) -> Vec<ImageAnalysisRequest> {
        self.script.lock().unwrap().analysis_calls.clone()
    }
}

impl GenerationBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn generate_text(&self, request: &TextGenerationRequest) -> Result<String> {
        let mut script = self.script.lock().unwrap();
        script.text_calls.push(request.clone());
        script.text_reply.resolve()
    }

    fn analyze_images(&self, request: &ImageAnalysisRequest) -> Result<String> {
        let mut script = self.script.lock().unwrap();
        script.analysis_calls.push(request.clone());
        script.analysis_reply.resolve()
    }
}
