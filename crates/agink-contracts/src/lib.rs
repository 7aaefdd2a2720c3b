pub mod catalog;
pub mod history;
pub mod refinement;
pub mod shell;
pub mod store;

pub use catalog::{AiApp, AppCatalog};
pub use history::{AnalysisResult, HistoryCache, HistoryItem, NewHistoryItem};
pub use refinement::{Length, Plan, RefinementOptions, Style, Tone};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
