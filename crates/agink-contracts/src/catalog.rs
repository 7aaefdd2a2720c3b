use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A target AI application a prompt can be tailored for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiApp {
    pub id: String,
    pub name: String,
    pub capabilities: String,
}

#[derive(Debug, Clone)]
pub struct AppCatalog {
    apps: IndexMap<String, AiApp>,
}

impl Default for AppCatalog {
    fn default() -> Self {
        Self::new(None)
    }
}

impl AppCatalog {
    pub fn new(apps: Option<IndexMap<String, AiApp>>) -> Self {
        Self {
            apps: apps.unwrap_or_else(default_apps),
        }
    }

    pub fn get(&self, id: &str) -> Option<&AiApp> {
        let key = id.trim().to_ascii_lowercase();
        self.apps.get(&key)
    }

    /// 1-based position, matching the numbering shown to the user.
    pub fn by_position(&self, position: usize) -> Option<&AiApp> {
        position
            .checked_sub(1)
            .and_then(|idx| self.apps.get_index(idx))
            .map(|(_, app)| app)
    }

    /// Accepts either a catalog id, a display name, or a 1-based position.
    pub fn resolve(&self, selector: &str) -> Option<&AiApp> {
        let trimmed = selector.trim();
        if trimmed.is_empty() {
            return None;
        }
        if let Ok(position) = trimmed.parse::<usize>() {
            return self.by_position(position);
        }
        self.get(trimmed).or_else(|| {
            self.apps
                .values()
                .find(|app| app.name.eq_ignore_ascii_case(trimmed))
        })
    }

    pub fn first(&self) -> Option<&AiApp> {
        self.apps.first().map(|(_, app)| app)
    }

    pub fn list(&self) -> impl Iterator<Item = &AiApp> {
        self.apps.values()
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }
}

fn default_apps() -> IndexMap<String, AiApp> {
    let mut map = IndexMap::new();

    let mut insert = |id: &str, name: &str, capabilities: &str| {
        map.insert(
            id.to_string(),
            AiApp {
                id: id.to_string(),
                name: name.to_string(),
                capabilities: capabilities.to_string(),
            },
        );
    };

    insert(
        "gemini",
        "Gemini",
        "Advanced reasoning, multimodality, and long context understanding.",
    );
    insert(
        "chatgpt",
        "ChatGPT",
        "General-purpose conversation, text generation, and code assistance.",
    );
    insert(
        "claude",
        "Claude",
        "Focus on safety, helpfulness, and large context windows for text analysis.",
    );
    insert(
        "copilot",
        "Copilot",
        "AI-powered code completion and software development assistance.",
    );
    insert(
        "perplexity",
        "Perplexity",
        "Conversational search engine providing cited answers.",
    );
    insert(
        "midjourney",
        "Midjourney",
        "High-quality, artistic text-to-image generation.",
    );
    insert(
        "dalle",
        "DALL·E",
        "Text-to-image generation with a focus on photorealism and creativity.",
    );
    insert(
        "elevenlabs",
        "ElevenLabs",
        "Realistic text-to-speech and voice cloning.",
    );
    insert(
        "runway",
        "Runway",
        "AI-powered video generation and editing tools.",
    );
    insert(
        "mistral",
        "Mistral",
        "High-performance open-source language models.",
    );
    insert(
        "grok",
        "Grok",
        "Real-time information access with a rebellious personality.",
    );
    insert(
        "leonardo",
        "Leonardo",
        "Text-to-image generation for gaming assets and creative content.",
    );

    map
}
