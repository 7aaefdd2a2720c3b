use std::fmt;

use agink_contracts::history::{PromptEntry, PromptHistoryItem};
use agink_contracts::{AiApp, AppCatalog, HistoryCache, KeyValueStore, NewHistoryItem};
use agink_contracts::{Length, Plan, RefinementOptions, Style, Tone};
use thiserror::Error;

use crate::gateway::Gateway;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    SelectApp,
    SelectPlan,
    InputPrompt,
    Generating,
    Result,
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WizardStep::SelectApp => "selecting an app",
            WizardStep::SelectPlan => "selecting a plan",
            WizardStep::InputPrompt => "writing the idea",
            WizardStep::Generating => "generating",
            WizardStep::Result => "showing the result",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WizardError {
    #[error("Please describe your idea before generating.")]
    EmptyIdea,
    #[error("That action is not available while {0}.")]
    WrongStep(WizardStep),
    #[error("This result was opened from history; go back instead of starting over.")]
    SeededSession,
}

/// Where a back action led.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackOutcome {
    Moved(WizardStep),
    /// Leave the controller and return to the shell.
    Exit,
    /// Back is disabled in the current step.
    Blocked,
}

/// Ticket for the one in-flight generation of a wizard session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingGeneration {
    epoch: u64,
    pub app: AiApp,
    pub plan: Plan,
    pub idea: String,
    pub options: RefinementOptions,
}

/// Linear "idea → optimized prompt" wizard:
/// `SelectApp → SelectPlan → InputPrompt → Generating → Result`.
#[derive(Debug, Clone)]
pub struct PromptWizard {
    step: WizardStep,
    default_app: Option<AiApp>,
    app: Option<AiApp>,
    plan: Option<Plan>,
    idea: String,
    options: RefinementOptions,
    result: String,
    seeded: bool,
    epoch: u64,
}

impl PromptWizard {
    pub fn new(catalog: &AppCatalog) -> Self {
        let default_app = catalog.first().cloned();
        Self {
            step: WizardStep::SelectApp,
            app: default_app.clone(),
            default_app,
            plan: None,
            idea: String::new(),
            options: RefinementOptions::default(),
            result: String::new(),
            seeded: false,
            epoch: 0,
        }
    }

    /// Replays a stored prompt: every field comes from `item` and the wizard
    /// opens directly on its result.
    pub fn from_history(item: &PromptHistoryItem) -> Self {
        Self {
            step: WizardStep::Result,
            default_app: Some(item.selected_app.clone()),
            app: Some(item.selected_app.clone()),
            plan: Some(item.selected_plan),
            idea: item.user_input.clone(),
            options: item.options(),
            result: item.result.clone(),
            seeded: true,
            epoch: 0,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn app(&self) -> Option<&AiApp> {
        self.app.as_ref()
    }

    pub fn plan(&self) -> Option<Plan> {
        self.plan
    }

    pub fn idea(&self) -> &str {
        &self.idea
    }

    pub fn options(&self) -> RefinementOptions {
        self.options
    }

    /// Generated text; empty until the wizard reaches `Result`.
    pub fn result(&self) -> &str {
        &self.result
    }

    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    pub fn select_app(&mut self, app: AiApp) -> Result<(), WizardError> {
        self.expect_step(WizardStep::SelectApp)?;
        tracing::debug!(app = %app.id, "wizard app selected");
        self.app = Some(app);
        self.step = WizardStep::SelectPlan;
        Ok(())
    }

    pub fn select_plan(&mut self, plan: Plan) -> Result<(), WizardError> {
        self.expect_step(WizardStep::SelectPlan)?;
        self.plan = Some(plan);
        self.step = WizardStep::InputPrompt;
        Ok(())
    }

    pub fn set_idea(&mut self, idea: impl Into<String>) -> Result<(), WizardError> {
        self.expect_step(WizardStep::InputPrompt)?;
        self.idea = idea.into();
        Ok(())
    }

    pub fn set_tone(&mut self, tone: Tone) -> Result<(), WizardError> {
        self.expect_step(WizardStep::InputPrompt)?;
        self.options.tone = tone;
        Ok(())
    }

    pub fn set_style(&mut self, style: Style) -> Result<(), WizardError> {
        self.expect_step(WizardStep::InputPrompt)?;
        self.options.style = style;
        Ok(())
    }

    pub fn set_length(&mut self, length: Length) -> Result<(), WizardError> {
        self.expect_step(WizardStep::InputPrompt)?;
        self.options.length = length;
        Ok(())
    }

    pub fn can_generate(&self) -> bool {
        self.step == WizardStep::InputPrompt
            && self.app.is_some()
            && self.plan.is_some()
            && !self.idea.trim().is_empty()
    }

    /// Validates the input and enters `Generating` with a fresh ticket epoch.
    /// Nothing changes on error.
    pub fn begin_generation(&mut self) -> Result<PendingGeneration, WizardError> {
        self.expect_step(WizardStep::InputPrompt)?;
        if self.idea.trim().is_empty() {
            return Err(WizardError::EmptyIdea);
        }
        let (Some(app), Some(plan)) = (self.app.clone(), self.plan) else {
            return Err(WizardError::WrongStep(self.step));
        };
        self.epoch += 1;
        self.step = WizardStep::Generating;
        Ok(PendingGeneration {
            epoch: self.epoch,
            app,
            plan,
            idea: self.idea.clone(),
            options: self.options,
        })
    }

    /// Stores the gateway's text, records it in history and enters `Result`.
    ///
    /// Returns `false` without touching anything when the ticket belongs to a
    /// session that has since been reset.
    pub fn complete_generation<S: KeyValueStore>(
        &mut self,
        pending: PendingGeneration,
        text: String,
        history: &mut HistoryCache<S>,
    ) -> bool {
        if pending.epoch != self.epoch || self.step != WizardStep::Generating {
            tracing::debug!("dropping stale prompt generation");
            return false;
        }
        history.append(NewHistoryItem::Prompt(PromptEntry {
            selected_app: pending.app,
            selected_plan: pending.plan,
            user_input: pending.idea,
            result: text.clone(),
            options: pending.options,
        }));
        self.result = text;
        self.step = WizardStep::Result;
        true
    }

    pub fn generate<S: KeyValueStore>(
        &mut self,
        gateway: &Gateway,
        history: &mut HistoryCache<S>,
    ) -> Result<&str, WizardError> {
        let pending = self.begin_generation()?;
        let text = gateway.generate_prompt(&pending.app, pending.plan, &pending.idea, pending.options);
        self.complete_generation(pending, text, history);
        Ok(&self.result)
    }

    pub fn back(&mut self) -> BackOutcome {
        let next = match self.step {
            WizardStep::SelectApp => return BackOutcome::Exit,
            WizardStep::Generating => return BackOutcome::Blocked,
            WizardStep::Result if self.seeded => return BackOutcome::Exit,
            WizardStep::Result => WizardStep::SelectApp,
            WizardStep::SelectPlan => WizardStep::SelectApp,
            WizardStep::InputPrompt => WizardStep::SelectPlan,
        };
        self.step = next;
        BackOutcome::Moved(next)
    }

    /// Clears the session and returns to `SelectApp`. Any generation still in
    /// flight is orphaned.
    pub fn start_over(&mut self) -> Result<(), WizardError> {
        if self.seeded {
            return Err(WizardError::SeededSession);
        }
        self.expect_step(WizardStep::Result)?;
        self.reset();
        Ok(())
    }

    fn reset(&mut self) {
        self.epoch += 1;
        self.step = WizardStep::SelectApp;
        self.app = self.default_app.clone();
        self.plan = None;
        self.idea.clear();
        self.options = RefinementOptions::default();
        self.result.clear();
    }

    fn expect_step(&self, expected: WizardStep) -> Result<(), WizardError> {
        if self.step == expected {
            Ok(())
        } else {
            Err(WizardError::WrongStep(self.step))
        }
    }
}
