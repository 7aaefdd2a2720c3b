use std::fmt;

use agink_contracts::history::{ImageEntry, ImageHistoryItem};
use agink_contracts::{AnalysisResult, HistoryCache, KeyValueStore, NewHistoryItem};
use thiserror::Error;

use crate::gateway::{Gateway, ImageInput};
use crate::wizard::BackOutcome;

pub const MAX_IMAGES: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzerStep {
    Collecting,
    Analyzing,
    Result,
}

impl fmt::Display for AnalyzerStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AnalyzerStep::Collecting => "collecting images",
            AnalyzerStep::Analyzing => "analyzing",
            AnalyzerStep::Result => "showing the result",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalyzerError {
    #[error("You can upload a maximum of 20 images.")]
    TooManyImages,
    #[error("Please upload at least one image.")]
    NoImages,
    #[error("No image at position {0}.")]
    NoSuchImage(usize),
    #[error("That action is not available while {0}.")]
    WrongStep(AnalyzerStep),
    #[error("This result was opened from history; go back instead.")]
    SeededSession,
}

/// Ticket for the one in-flight analysis of an analyzer session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAnalysis {
    epoch: u64,
    pub images: Vec<ImageInput>,
}

/// Two-state image flow: `Collecting → Analyzing → Result`.
#[derive(Debug, Clone)]
pub struct ImageAnalyzer {
    step: AnalyzerStep,
    images: Vec<ImageInput>,
    result: Option<AnalysisResult>,
    last_error: Option<AnalyzerError>,
    seeded: bool,
    epoch: u64,
}

impl Default for ImageAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageAnalyzer {
    pub fn new() -> Self {
        Self {
            step: AnalyzerStep::Collecting,
            images: Vec::new(),
            result: None,
            last_error: None,
            seeded: false,
            epoch: 0,
        }
    }

    pub fn from_history(item: &ImageHistoryItem) -> Self {
        Self {
            step: AnalyzerStep::Result,
            images: Vec::new(),
            result: Some(item.result.clone()),
            last_error: None,
            seeded: true,
            epoch: 0,
        }
    }

    pub fn step(&self) -> AnalyzerStep {
        self.step
    }

    pub fn images(&self) -> &[ImageInput] {
        &self.images
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        self.result.as_ref()
    }

    pub fn last_error(&self) -> Option<&AnalyzerError> {
        self.last_error.as_ref()
    }

    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    /// Adds a whole batch or nothing: a batch that would push the total past
    /// [`MAX_IMAGES`] is rejected in its entirety.
    pub fn add_images(&mut self, batch: Vec<ImageInput>) -> Result<usize, AnalyzerError> {
        self.check(self.expect_step(AnalyzerStep::Collecting))?;
        if self.images.len() + batch.len() > MAX_IMAGES {
            return self.check(Err(AnalyzerError::TooManyImages));
        }
        self.last_error = None;
        self.images.extend(batch);
        Ok(self.images.len())
    }

    /// Removes the image at a 1-based position.
    pub fn remove_image(&mut self, position: usize) -> Result<ImageInput, AnalyzerError> {
        self.check(self.expect_step(AnalyzerStep::Collecting))?;
        if position == 0 || position > self.images.len() {
            return self.check(Err(AnalyzerError::NoSuchImage(position)));
        }
        self.last_error = None;
        Ok(self.images.remove(position - 1))
    }

    pub fn clear_images(&mut self) -> Result<(), AnalyzerError> {
        self.check(self.expect_step(AnalyzerStep::Collecting))?;
        self.images.clear();
        self.last_error = None;
        Ok(())
    }

    pub fn begin_analysis(&mut self) -> Result<PendingAnalysis, AnalyzerError> {
        self.check(self.expect_step(AnalyzerStep::Collecting))?;
        if self.images.is_empty() {
            return self.check(Err(AnalyzerError::NoImages));
        }
        self.last_error = None;
        self.step = AnalyzerStep::Analyzing;
        Ok(PendingAnalysis {
            epoch: self.epoch,
            images: self.images.clone(),
        })
    }

    /// Stores the result, records it in history and enters `Result`.
    /// A ticket from a reset session is ignored and `false` is returned.
    pub fn complete_analysis<S: KeyValueStore>(
        &mut self,
        pending: PendingAnalysis,
        result: AnalysisResult,
        history: &mut HistoryCache<S>,
    ) -> bool {
        if pending.epoch != self.epoch || self.step != AnalyzerStep::Analyzing {
            tracing::debug!("dropping stale image analysis");
            return false;
        }
        history.append(NewHistoryItem::Image(ImageEntry {
            image_count: u32::try_from(pending.images.len()).unwrap_or(u32::MAX),
            result: result.clone(),
        }));
        self.result = Some(result);
        self.step = AnalyzerStep::Result;
        true
    }

    pub fn analyze<S: KeyValueStore>(
        &mut self,
        gateway: &Gateway,
        history: &mut HistoryCache<S>,
    ) -> Result<&AnalysisResult, AnalyzerError> {
        let pending = self.begin_analysis()?;
        let result = gateway.analyze_images(&pending.images);
        self.complete_analysis(pending, result, history);
        self.result
            .as_ref()
            .ok_or(AnalyzerError::WrongStep(self.step))
    }

    /// Starts a new batch after a fresh analysis.
    pub fn analyze_more(&mut self) -> Result<(), AnalyzerError> {
        if self.seeded {
            return Err(AnalyzerError::SeededSession);
        }
        self.expect_step(AnalyzerStep::Result)?;
        self.epoch += 1;
        self.step = AnalyzerStep::Collecting;
        self.images.clear();
        self.result = None;
        self.last_error = None;
        Ok(())
    }

    /// `true` when the controller may be left; `false` while analyzing.
    pub fn can_exit(&self) -> bool {
        self.step != AnalyzerStep::Analyzing
    }

    pub fn back(&self) -> BackOutcome {
        if self.can_exit() {
            BackOutcome::Exit
        } else {
            BackOutcome::Blocked
        }
    }

    fn expect_step(&self, expected: AnalyzerStep) -> Result<(), AnalyzerError> {
        if self.step == expected {
            Ok(())
        } else {
            Err(AnalyzerError::WrongStep(self.step))
        }
    }

    fn check<T>(&mut self, outcome: Result<T, AnalyzerError>) -> Result<T, AnalyzerError> {
        if let Err(err) = &outcome {
            self.last_error = Some(err.clone());
        }
        outcome
    }
}
