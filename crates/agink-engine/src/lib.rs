pub mod analyzer;
pub mod app;
pub mod backend;
pub mod config;
pub mod gateway;
pub mod gemini;
pub mod wizard;

#[cfg(test)]
mod testing;

pub use analyzer::{AnalyzerError, AnalyzerStep, ImageAnalyzer, MAX_IMAGES};
pub use app::{AppShell, Mode, ModeKind, ShellError, Theme};
pub use backend::{DryrunBackend, GenerationBackend};
pub use config::GatewayConfig;
pub use gateway::{Gateway, ImageInput};
pub use gemini::GeminiBackend;
pub use wizard::{BackOutcome, PromptWizard, WizardError, WizardStep};
