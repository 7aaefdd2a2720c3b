use std::fmt;
use std::str::FromStr;

use agink_contracts::store::{API_KEY_KEY, THEME_KEY};
use agink_contracts::{AnalysisResult, AppCatalog, HistoryCache, HistoryItem, KeyValueStore};
use thiserror::Error;

use crate::analyzer::{AnalyzerError, ImageAnalyzer};
use crate::gateway::Gateway;
use crate::wizard::{BackOutcome, PromptWizard, WizardError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("Unknown theme '{other}' (expected light or dark).")),
        }
    }
}

/// The active flow. Switching modes drops whatever session was in progress.
#[derive(Debug, Clone)]
pub enum Mode {
    Home,
    Prompt(PromptWizard),
    Image(ImageAnalyzer),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeKind {
    Prompt,
    Image,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShellError {
    #[error("No history entry matches '{0}'.")]
    NoSuchHistoryItem(String),
    #[error("Open the prompt flow first (/prompt).")]
    NotInPromptMode,
    #[error("Open the image flow first (/image).")]
    NotInImageMode,
    #[error(transparent)]
    Wizard(#[from] WizardError),
    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),
}

/// Application state: mode, history, theme, credential and the history
/// entry the current session was seeded from.
#[derive(Debug)]
pub struct AppShell<S: KeyValueStore + Clone> {
    store: S,
    catalog: AppCatalog,
    history: HistoryCache<S>,
    theme: Theme,
    api_key: Option<String>,
    mode: Mode,
    seeded_from: Option<String>,
}

impl<S: KeyValueStore + Clone> AppShell<S> {
    pub fn load(store: S) -> Self {
        Self::with_catalog(store, AppCatalog::default())
    }

    pub fn with_catalog(store: S, catalog: AppCatalog) -> Self {
        let theme = store
            .get(THEME_KEY)
            .and_then(|raw| raw.parse::<Theme>().ok())
            .unwrap_or_default();
        let api_key = store.get(API_KEY_KEY);
        let history = HistoryCache::load(store.clone());
        tracing::debug!(
            items = history.len(),
            %theme,
            has_api_key = api_key.is_some(),
            "shell state loaded"
        );
        Self {
            store,
            catalog,
            history,
            theme,
            api_key,
            mode: Mode::Home,
            seeded_from: None,
        }
    }

    pub fn catalog(&self) -> &AppCatalog {
        &self.catalog
    }

    pub fn history(&self) -> &HistoryCache<S> {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut HistoryCache<S> {
        &mut self.history
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn mode_mut(&mut self) -> &mut Mode {
        &mut self.mode
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// The saved credential, if any non-blank one was stored.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
    }

    pub fn seeded_item(&self) -> Option<&HistoryItem> {
        self.seeded_from
            .as_deref()
            .and_then(|id| self.history.find(id))
    }

    /// Enters a flow with a fresh controller, dropping any session in progress.
    pub fn select_mode(&mut self, kind: ModeKind) {
        self.seeded_from = None;
        self.mode = match kind {
            ModeKind::Prompt => Mode::Prompt(PromptWizard::new(&self.catalog)),
            ModeKind::Image => Mode::Image(ImageAnalyzer::new()),
        };
        tracing::debug!(?kind, "mode selected");
    }

    pub fn wizard_mut(&mut self) -> Option<&mut PromptWizard> {
        match &mut self.mode {
            Mode::Prompt(wizard) => Some(wizard),
            _ => None,
        }
    }

    pub fn analyzer_mut(&mut self) -> Option<&mut ImageAnalyzer> {
        match &mut self.mode {
            Mode::Image(analyzer) => Some(analyzer),
            _ => None,
        }
    }

    pub fn go_home(&mut self) {
        self.seeded_from = None;
        self.mode = Mode::Home;
    }

    /// Seeds the matching controller from a history entry, selected by 1-based
    /// position or by id.
    pub fn open_history(&mut self, selector: &str) -> Result<&Mode, ShellError> {
        let trimmed = selector.trim();
        let item = trimmed
            .parse::<usize>()
            .ok()
            .and_then(|position| self.history.get(position))
            .or_else(|| self.history.find(trimmed))
            .cloned()
            .ok_or_else(|| ShellError::NoSuchHistoryItem(trimmed.to_string()))?;

        self.mode = match &item {
            HistoryItem::Prompt(prompt) => Mode::Prompt(PromptWizard::from_history(prompt)),
            HistoryItem::Image(image) => Mode::Image(ImageAnalyzer::from_history(image)),
        };
        self.seeded_from = Some(item.id().to_string());
        Ok(&self.mode)
    }

    /// Back from the active controller; leaving it returns to home.
    pub fn back(&mut self) -> BackOutcome {
        let outcome = match &mut self.mode {
            Mode::Home => BackOutcome::Exit,
            Mode::Prompt(wizard) => wizard.back(),
            Mode::Image(analyzer) => analyzer.back(),
        };
        if outcome == BackOutcome::Exit {
            self.go_home();
        }
        outcome
    }

    pub fn generate_prompt(&mut self, gateway: &Gateway) -> Result<&str, ShellError> {
        match &mut self.mode {
            Mode::Prompt(wizard) => Ok(wizard.generate(gateway, &mut self.history)?),
            _ => Err(ShellError::NotInPromptMode),
        }
    }

    pub fn analyze_images(&mut self, gateway: &Gateway) -> Result<&AnalysisResult, ShellError> {
        match &mut self.mode {
            Mode::Image(analyzer) => Ok(analyzer.analyze(gateway, &mut self.history)?),
            _ => Err(ShellError::NotInImageMode),
        }
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
        self.store.set(THEME_KEY, theme.as_str());
    }

    pub fn toggle_theme(&mut self) -> Theme {
        self.set_theme(self.theme.toggled());
        self.theme
    }

    /// Stores the credential verbatim and hands it to the gateway.
    pub fn set_api_key(&mut self, key: &str, gateway: &mut Gateway) {
        self.store.set(API_KEY_KEY, key);
        self.api_key = Some(key.to_string());
        gateway.set_api_key(self.api_key().map(str::to_string));
    }

    pub fn clear_api_key(&mut self, gateway: &mut Gateway) {
        self.store.remove(API_KEY_KEY);
        self.api_key = None;
        gateway.set_api_key(None);
    }
}

#[cfg(test)]
mod tests {
    use agink_contracts::store::{API_KEY_KEY, THEME_KEY};
    use agink_contracts::{KeyValueStore, MemoryStore, Plan};

    use super::{AppShell, Mode, ModeKind, ShellError, Theme};
    use crate::analyzer::AnalyzerStep;
    use crate::config::GatewayConfig;
    use crate::gateway::{Gateway, ImageInput};
    use crate::testing::ScriptedBackend;
    use crate::wizard::{BackOutcome, WizardStep};

    fn gateway() -> (ScriptedBackend, Gateway) {
        let backend = ScriptedBackend::new();
        let gateway = Gateway::new(backend.clone(), GatewayConfig::default());
        (backend, gateway)
    }

    #[test]
    fn theme_defaults_to_light_and_persists_toggles() {
        let store = MemoryStore::new();
        let mut shell = AppShell::load(store.clone());
        assert_eq!(shell.theme(), Theme::Light);
        assert_eq!(shell.toggle_theme(), Theme::Dark);
        assert_eq!(store.get(THEME_KEY).as_deref(), Some("dark"));
        assert_eq!(AppShell::load(store).theme(), Theme::Dark);
    }

    #[test]
    fn unknown_stored_theme_falls_back_to_default() {
        let store = MemoryStore::new();
        store.set(THEME_KEY, "sepia");
        assert_eq!(AppShell::load(store).theme(), Theme::Light);
    }

    #[test]
    fn api_key_is_stored_verbatim_and_clearable() {
        let store = MemoryStore::new();
        let (_, mut gateway) = gateway();
        let mut shell = AppShell::load(store.clone());
        assert!(shell.api_key().is_none());

        shell.set_api_key(" key-123 ", &mut gateway);
        assert_eq!(store.get(API_KEY_KEY).as_deref(), Some(" key-123 "));
        assert_eq!(AppShell::load(store.clone()).api_key(), Some(" key-123 "));

        shell.clear_api_key(&mut gateway);
        assert!(store.get(API_KEY_KEY).is_none());
        assert!(shell.api_key().is_none());
    }

    #[test]
    fn prompt_flow_records_history_and_replays_it() {
        let store = MemoryStore::new();
        let (backend, gateway) = gateway();
        let mut shell = AppShell::load(store.clone());

        let catalog = shell.catalog().clone();
        shell.select_mode(ModeKind::Prompt);
        let wizard = shell.wizard_mut().unwrap();
        wizard.select_app(catalog.resolve("grok").unwrap().clone()).unwrap();
        wizard.select_plan(Plan::Free).unwrap();
        wizard.set_idea("today's tech news").unwrap();
        assert_eq!(shell.generate_prompt(&gateway), Ok("Optimized prompt."));
        assert_eq!(shell.history().len(), 1);

        let mut reopened = AppShell::load(store);
        let Mode::Prompt(wizard) = reopened.open_history("1").unwrap() else {
            panic!("expected prompt mode");
        };
        assert_eq!(wizard.step(), WizardStep::Result);
        assert_eq!(wizard.result(), "Optimized prompt.");
        assert_eq!(
            reopened.seeded_item().map(|item| item.kind()),
            Some("prompt")
        );
        assert_eq!(reopened.back(), BackOutcome::Exit);
        assert!(matches!(reopened.mode(), Mode::Home));
        assert!(reopened.seeded_item().is_none());
        assert_eq!(reopened.history().len(), 1);
        assert_eq!(backend.text_calls().len(), 1);
    }

    #[test]
    fn open_history_by_id_seeds_image_flow() {
        let (_, gateway) = gateway();
        let mut shell = AppShell::load(MemoryStore::new());
        shell.select_mode(ModeKind::Image);
        shell
            .analyzer_mut()
            .unwrap()
            .add_images(vec![ImageInput::new("image/png", vec![1])])
            .unwrap();
        shell.analyze_images(&gateway).unwrap();
        let id = shell.history().items()[0].id().to_string();

        shell.go_home();
        let Mode::Image(analyzer) = shell.open_history(&id).unwrap() else {
            panic!("expected image mode");
        };
        assert_eq!(analyzer.step(), AnalyzerStep::Result);
        assert!(analyzer.is_seeded());
        assert_eq!(shell.history().len(), 1);
    }

    #[test]
    fn switching_modes_discards_progress() {
        let mut shell = AppShell::load(MemoryStore::new());
        let catalog = shell.catalog().clone();
        shell.select_mode(ModeKind::Prompt);
        shell
            .wizard_mut()
            .unwrap()
            .select_app(catalog.first().unwrap().clone())
            .unwrap();

        shell.select_mode(ModeKind::Image);
        assert!(shell.wizard_mut().is_none());
        shell.select_mode(ModeKind::Prompt);
        assert_eq!(shell.wizard_mut().unwrap().step(), WizardStep::SelectApp);
    }

    #[test]
    fn flow_actions_require_matching_mode() {
        let (_, gateway) = gateway();
        let mut shell = AppShell::load(MemoryStore::new());
        assert_eq!(
            shell.generate_prompt(&gateway).err(),
            Some(ShellError::NotInPromptMode)
        );
        assert_eq!(
            shell.analyze_images(&gateway).err(),
            Some(ShellError::NotInImageMode)
        );
        assert_eq!(
            shell.open_history("3").err(),
            Some(ShellError::NoSuchHistoryItem("3".to_string()))
        );
    }
}
