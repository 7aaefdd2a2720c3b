use serde::{Deserialize, Serialize};

use crate::catalog::AiApp;
use crate::refinement::{Length, Plan, RefinementOptions, Style, Tone};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub summary: String,
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptHistoryItem {
    pub id: String,
    pub timestamp: i64,
    pub selected_app: AiApp,
    pub selected_plan: Plan,
    pub user_input: String,
    pub result: String,
    pub tone: Tone,
    pub style: Style,
    pub length: Length,
}

impl PromptHistoryItem {
    pub fn options(&self) -> RefinementOptions {
        RefinementOptions {
            tone: self.tone,
            style: self.style,
            length: self.length,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageHistoryItem {
    pub id: String,
    pub timestamp: i64,
    pub image_count: u32,
    pub result: AnalysisResult,
}

/// A persisted record of one completed generation or analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HistoryItem {
    Prompt(PromptHistoryItem),
    Image(ImageHistoryItem),
}

impl HistoryItem {
    pub fn id(&self) -> &str {
        match self {
            HistoryItem::Prompt(item) => &item.id,
            HistoryItem::Image(item) => &item.id,
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            HistoryItem::Prompt(item) => item.timestamp,
            HistoryItem::Image(item) => item.timestamp,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            HistoryItem::Prompt(_) => "prompt",
            HistoryItem::Image(_) => "image",
        }
    }

    /// One-line label for history listings.
    pub fn title(&self) -> String {
        match self {
            HistoryItem::Prompt(item) => item.user_input.clone(),
            HistoryItem::Image(item) => format!("{} image(s) analyzed", item.image_count),
        }
    }
}

/// Prompt record as produced by a controller, before the cache stamps it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptEntry {
    pub selected_app: AiApp,
    pub selected_plan: Plan,
    pub user_input: String,
    pub result: String,
    pub options: RefinementOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEntry {
    pub image_count: u32,
    pub result: AnalysisResult,
}

/// History payload without `id`/`timestamp`; only the cache assigns those.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewHistoryItem {
    Prompt(PromptEntry),
    Image(ImageEntry),
}

impl NewHistoryItem {
    pub(crate) fn stamp(self, id: String, timestamp: i64) -> HistoryItem {
        match self {
            NewHistoryItem::Prompt(entry) => HistoryItem::Prompt(PromptHistoryItem {
                id,
                timestamp,
                selected_app: entry.selected_app,
                selected_plan: entry.selected_plan,
                user_input: entry.user_input,
                result: entry.result,
                tone: entry.options.tone,
                style: entry.options.style,
                length: entry.options.length,
            }),
            NewHistoryItem::Image(entry) => HistoryItem::Image(ImageHistoryItem {
                id,
                timestamp,
                image_count: entry.image_count,
                result: entry.result,
            }),
        }
    }
}
