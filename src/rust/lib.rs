//! Client library and terminal dashboard for an image classification
//! inference/retraining service.
//!
//! The service exposes `POST /predict`, `POST /retrain`, `GET /data-insights`
//! and `GET /data-images/{path}`. This crate keeps the dashboard state for the
//! two upload flows and the dataset insights, and renders it as text.
//!
//! # Basic Usage
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use mlpipe_dashboard::{ApiClient, Dashboard, DashboardConfig, Flow, SelectedFile};
//!
//! let config = DashboardConfig::new("http://localhost:5000")?;
//! let dashboard = Dashboard::open(ApiClient::new(&config)?).await;
//!
//! dashboard
//!     .select_file(Flow::Predict, SelectedFile::from_path("cat.jpg").await?)
//!     .await;
//! let prediction = dashboard.submit_predict().await?;
//! println!("Predicted class: {}", prediction.predicted_class);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod flow;
pub mod load;
pub mod models;
pub mod render;
pub mod upload;

pub use api::{ApiClient, InferenceApi};
pub use config::DashboardConfig;
pub use dashboard::{Dashboard, DashboardSnapshot, InsightsState};
pub use error::DashboardError;
pub use flow::{Flow, FlowState, Outcome};
pub use models::{DataInsights, ImageDimensions, PredictionResult, RetrainResult};
pub use render::ImageSource;
pub use upload::SelectedFile;

pub fn init_logger() {
    env_logger::init();
}
