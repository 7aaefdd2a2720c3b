mod cache;
mod item;

pub use cache::{HistoryCache, DEFAULT_HISTORY_CAPACITY};
pub use item::{
    AnalysisResult, HistoryItem, ImageEntry, ImageHistoryItem, NewHistoryItem, PromptEntry,
    PromptHistoryItem,
};
