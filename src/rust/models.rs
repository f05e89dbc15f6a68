//! Response shapes returned by the inference service.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Body of a successful `POST /predict`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub predicted_class: String,
    /// Probability of `predicted_class`, 0.0 to 1.0
    pub confidence: f64,
    /// Raw model output, echoed as received
    #[serde(default)]
    pub raw_predictions: serde_json::Value,
}

/// Body of a successful `POST /retrain`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrainResult {
    pub message: String,
    #[serde(default)]
    pub new_classes: Option<Vec<String>>,
}

/// Error body the service sends along with a non-success status.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

/// Aggregate width/height statistics over the training images.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ImageDimensions {
    pub min_width: f64,
    pub max_width: f64,
    pub avg_width: f64,
    pub min_height: f64,
    pub max_height: f64,
    pub avg_height: f64,
    pub total_images: u64,
}

/// Dataset summary returned by `GET /data-insights`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataInsights {
    #[serde(default)]
    pub class_distribution: HashMap<String, u64>,
    #[serde(default)]
    pub sample_images: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub image_dimensions: Option<ImageDimensions>,
}
