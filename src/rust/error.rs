use std::io;

use crate::flow::Flow;

/// Represents the different types of errors that can occur while driving the dashboard.
#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    /// Submission attempted without a selected file; no request is issued
    #[error("{}", .0.missing_file_message())]
    MissingFile(Flow),
    /// Submission attempted while a request for the same flow is still pending
    #[error("A {0} request is already in flight")]
    InFlight(Flow),
    /// The service answered with a non-success status or an unreadable body
    #[error("{message}")]
    ExternalService {
        status: Option<u16>,
        message: String,
    },
    /// The request never produced a response
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DashboardError {
    /// Text shown to the user in the originating flow's error slot.
    ///
    /// Transport failures collapse to the flow's generic fallback, server
    /// supplied messages are kept verbatim.
    pub fn display_message(&self, flow: Flow) -> String {
        match self {
            Self::Transport(_) => flow.unexpected_error_message().to_string(),
            Self::ExternalService { message, .. } if message.trim().is_empty() => {
                flow.generic_failure_message().to_string()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_messages() {
        assert_eq!(
            DashboardError::MissingFile(Flow::Predict).to_string(),
            "Please select an image file for prediction."
        );
        assert_eq!(
            DashboardError::MissingFile(Flow::Retrain).to_string(),
            "Please select a ZIP file containing new training data."
        );
    }

    #[test]
    fn test_external_message_is_verbatim() {
        let err = DashboardError::ExternalService {
            status: Some(500),
            message: "model unavailable".to_string(),
        };
        assert_eq!(err.display_message(Flow::Predict), "model unavailable");
    }

    #[test]
    fn test_blank_external_message_falls_back() {
        let err = DashboardError::ExternalService {
            status: Some(502),
            message: "  ".to_string(),
        };
        assert_eq!(err.display_message(Flow::Retrain), "Retraining failed");
    }
}
