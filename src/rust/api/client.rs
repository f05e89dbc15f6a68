use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use super::{sample_image_url, InferenceApi, INSIGHTS_FAILURE, INSIGHTS_PATH};
use crate::config::DashboardConfig;
use crate::error::DashboardError;
use crate::flow::Flow;
use crate::models::{DataInsights, ErrorBody, PredictionResult, RetrainResult};
use crate::upload::SelectedFile;

const IMAGE_FAILURE: &str = "Failed to load image";
const STATUS_FAILURE: &str = "Service status check failed";

/// HTTP client for the inference service. Cheap to clone.
#[derive(Clone, Debug)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(config: &DashboardConfig) -> Result<Self, DashboardError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            base_url: config.api_url.clone(),
            http: builder.build()?,
        })
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_file<T: DeserializeOwned>(
        &self,
        flow: Flow,
        file: &SelectedFile,
    ) -> Result<T, DashboardError> {
        let url = self.endpoint(flow.path());
        log::info!("POST {} ({} = {}, {} bytes)", url, flow.field_name(), file.name(), file.len());

        let part = Part::bytes(file.bytes().to_vec()).file_name(file.name().to_string());
        let form = Form::new().part(flow.field_name(), part);
        let response = self.http.post(&url).multipart(form).send().await?;
        log::info!("{} response status: {}", flow, response.status());

        let status = response.status();
        let body = response.bytes().await?;
        decode_body(status, &body, flow.generic_failure_message())
    }
}

impl InferenceApi for ApiClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn predict(&self, file: &SelectedFile) -> Result<PredictionResult, DashboardError> {
        self.post_file(Flow::Predict, file).await
    }

    async fn retrain(&self, file: &SelectedFile) -> Result<RetrainResult, DashboardError> {
        self.post_file(Flow::Retrain, file).await
    }

    async fn data_insights(&self) -> Result<DataInsights, DashboardError> {
        let url = self.endpoint(INSIGHTS_PATH);
        log::info!("GET {}", url);
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        decode_body(status, &body, INSIGHTS_FAILURE)
    }

    async fn fetch_image(&self, path: &str) -> Result<Vec<u8>, DashboardError> {
        let url = sample_image_url(&self.base_url, path);
        log::debug!("GET {}", url);
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(error_from_body(status, &body, IMAGE_FAILURE));
        }
        Ok(body.to_vec())
    }

    async fn status(&self) -> Result<String, DashboardError> {
        let url = self.endpoint("/");
        log::info!("GET {}", url);
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(error_from_body(status, &body, STATUS_FAILURE));
        }
        Ok(String::from_utf8_lossy(&body).trim().to_string())
    }
}

/// Turns a finished response into the expected shape or a service error.
pub(crate) fn decode_body<T: DeserializeOwned>(
    status: StatusCode,
    body: &[u8],
    fallback: &str,
) -> Result<T, DashboardError> {
    if !status.is_success() {
        return Err(error_from_body(status, body, fallback));
    }
    serde_json::from_slice(body).map_err(|e| {
        log::warn!("Could not decode response body: {}", e);
        DashboardError::ExternalService {
            status: Some(status.as_u16()),
            message: fallback.to_string(),
        }
    })
}

/// Prefers the server supplied `error` text, otherwise `fallback`.
pub(crate) fn error_from_body(status: StatusCode, body: &[u8], fallback: &str) -> DashboardError {
    let message = serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| fallback.to_string());
    log::warn!("Service returned {}: {}", status, message);
    DashboardError::ExternalService {
        status: Some(status.as_u16()),
        message,
    }
}
