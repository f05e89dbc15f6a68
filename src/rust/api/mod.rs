//! The seam between dashboard state and the inference service.

use std::future::Future;

use crate::error::DashboardError;
use crate::models::{DataInsights, PredictionResult, RetrainResult};
use crate::upload::SelectedFile;

mod client;

pub use client::ApiClient;

pub const INSIGHTS_PATH: &str = "/data-insights";
pub const IMAGES_PATH: &str = "/data-images";

pub(crate) const INSIGHTS_FAILURE: &str = "Failed to load data insights";

/// Operations the dashboard needs from the inference service.
///
/// `ApiClient` talks HTTP; tests plug in fakes.
pub trait InferenceApi: Send + Sync + 'static {
    /// Base URL that relative resources (sample images) resolve against
    fn base_url(&self) -> &str;

    /// Uploads an image under the `file` field and returns the prediction
    fn predict(
        &self,
        file: &SelectedFile,
    ) -> impl Future<Output = Result<PredictionResult, DashboardError>> + Send;

    /// Uploads a training archive under the `data_zip` field
    fn retrain(
        &self,
        file: &SelectedFile,
    ) -> impl Future<Output = Result<RetrainResult, DashboardError>> + Send;

    fn data_insights(&self) -> impl Future<Output = Result<DataInsights, DashboardError>> + Send;

    /// Fetches a sample image by the path listed in `DataInsights::sample_images`
    fn fetch_image(&self, path: &str) -> impl Future<Output = Result<Vec<u8>, DashboardError>> + Send;

    /// Liveness banner served at the service root
    fn status(&self) -> impl Future<Output = Result<String, DashboardError>> + Send;
}

/// Joins a sample image path onto the images endpoint of `base_url`.
pub fn sample_image_url(base_url: &str, path: &str) -> String {
    format!(
        "{}{}/{}",
        base_url.trim_end_matches('/'),
        IMAGES_PATH,
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_image_url() {
        assert_eq!(
            sample_image_url("http://localhost:5000", "cats/1.jpg"),
            "http://localhost:5000/data-images/cats/1.jpg"
        );
        assert_eq!(
            sample_image_url("http://host/", "/dogs/2.png"),
            "http://host/data-images/dogs/2.png"
        );
    }
}
