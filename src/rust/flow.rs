use std::fmt;

use crate::upload::SelectedFile;

/// One of the two independent upload-and-submit interactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flow {
    Predict,
    Retrain,
}

impl Flow {
    /// Service path the flow posts to
    pub fn path(self) -> &'static str {
        match self {
            Flow::Predict => "/predict",
            Flow::Retrain => "/retrain",
        }
    }

    /// Name of the single multipart field carrying the upload
    pub fn field_name(self) -> &'static str {
        match self {
            Flow::Predict => "file",
            Flow::Retrain => "data_zip",
        }
    }

    /// Advisory file picker filter. Nothing enforces it.
    pub fn accept(self) -> &'static str {
        match self {
            Flow::Predict => "image/*",
            Flow::Retrain => ".zip",
        }
    }

    pub fn missing_file_message(self) -> &'static str {
        match self {
            Flow::Predict => "Please select an image file for prediction.",
            Flow::Retrain => "Please select a ZIP file containing new training data.",
        }
    }

    pub fn generic_failure_message(self) -> &'static str {
        match self {
            Flow::Predict => "Prediction failed",
            Flow::Retrain => "Retraining failed",
        }
    }

    pub fn unexpected_error_message(self) -> &'static str {
        match self {
            Flow::Predict => "An unexpected error occurred during prediction.",
            Flow::Retrain => "An unexpected error occurred during retraining.",
        }
    }

    pub fn in_flight_label(self) -> &'static str {
        match self {
            Flow::Predict => "Predicting...",
            Flow::Retrain => "Retraining...",
        }
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flow::Predict => write!(f, "predict"),
            Flow::Retrain => write!(f, "retrain"),
        }
    }
}

/// The tagged state of a flow after its most recent submission attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Idle,
    InFlight,
    Succeeded(T),
    Failed(String),
}

impl<T> Outcome<T> {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Outcome::InFlight)
    }

    pub fn result(&self) -> Option<&T> {
        match self {
            Outcome::Succeeded(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Outcome::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// Selection plus outcome for a single flow.
///
/// `generation` increases whenever the flow's state is superseded (new
/// selection or new submission). A response tagged with an older
/// generation is stale and must not be applied.
#[derive(Debug, Clone)]
pub struct FlowState<T> {
    pub selected: Option<SelectedFile>,
    pub outcome: Outcome<T>,
    generation: u64,
}

impl<T> Default for FlowState<T> {
    fn default() -> Self {
        Self {
            selected: None,
            outcome: Outcome::Idle,
            generation: 0,
        }
    }
}

impl<T> FlowState<T> {
    /// Replaces the selection and clears any prior result or error.
    ///
    /// A pending request keeps the flow in flight, so no second request can
    /// start until it returns. Its response is stale once it does.
    pub fn select(&mut self, file: SelectedFile) {
        self.selected = Some(file);
        if !self.outcome.is_in_flight() {
            self.outcome = Outcome::Idle;
        }
        self.generation += 1;
    }

    /// Moves the flow to in-flight and returns the generation the pending
    /// response must present to be applied.
    pub fn begin(&mut self) -> u64 {
        self.outcome = Outcome::InFlight;
        self.generation += 1;
        self.generation
    }

    /// Applies a finished response. Returns false when the response is stale,
    /// in which case a flow still marked in flight drops back to idle.
    pub fn finish(&mut self, generation: u64, outcome: Outcome<T>) -> bool {
        if generation != self.generation {
            if self.outcome.is_in_flight() {
                self.outcome = Outcome::Idle;
            }
            return false;
        }
        self.outcome = outcome;
        true
    }
}
