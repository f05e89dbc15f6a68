use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::api::{sample_image_url, InferenceApi, INSIGHTS_FAILURE};
use crate::error::DashboardError;
use crate::flow::{Flow, FlowState, Outcome};
use crate::models::{DataInsights, PredictionResult, RetrainResult};
use crate::render::ImageSource;
use crate::upload::SelectedFile;

/// Insights section state. Data is only ever replaced wholesale.
#[derive(Debug, Clone, Default)]
pub struct InsightsState {
    pub data: Option<DataInsights>,
    pub error: Option<String>,
    pub loading: bool,
    generation: u64,
}

impl InsightsState {
    /// A settled state holding `data`
    pub fn with_data(data: DataInsights) -> Self {
        Self {
            data: Some(data),
            ..Default::default()
        }
    }
}

/// Everything the presentation layer needs, copied out of the live state.
#[derive(Debug, Clone, Default)]
pub struct DashboardSnapshot {
    pub base_url: String,
    pub prediction: FlowState<PredictionResult>,
    pub retrain: FlowState<RetrainResult>,
    pub insights: InsightsState,
    /// Age of the last successful retrain when the snapshot was taken
    pub last_retrained: Option<Duration>,
}

#[derive(Debug, Default)]
struct DashboardState {
    prediction: FlowState<PredictionResult>,
    retrain: FlowState<RetrainResult>,
    insights: InsightsState,
    last_retrained: Option<Instant>,
}

/// Page-level state for the predict and retrain flows plus dataset insights.
///
/// Clones share state, so a clone can be moved into a spawned task while the
/// first handle keeps rendering. The state lock is never held across a request.
pub struct Dashboard<A: InferenceApi> {
    api: Arc<A>,
    state: Arc<Mutex<DashboardState>>,
    refreshes: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl<A: InferenceApi> Clone for Dashboard<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            state: Arc::clone(&self.state),
            refreshes: Arc::clone(&self.refreshes),
        }
    }
}

impl<A: InferenceApi> Dashboard<A> {
    /// Creates a dashboard without touching the network
    pub fn new(api: A) -> Self {
        Self {
            api: Arc::new(api),
            state: Arc::new(Mutex::new(DashboardState::default())),
            refreshes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Creates a dashboard and starts the initial insights load in the
    /// background. Use [`Dashboard::settle`] to wait for it.
    pub async fn open(api: A) -> Self {
        let dashboard = Self::new(api);
        dashboard.spawn_insights_refresh().await;
        dashboard
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Records a new selection for `flow`, clearing its prior result and error.
    pub async fn select_file(&self, flow: Flow, file: SelectedFile) {
        log::info!("{} file selected: {}", flow, file.name());
        let mut state = self.state.lock().await;
        match flow {
            Flow::Predict => state.prediction.select(file),
            Flow::Retrain => state.retrain.select(file),
        }
    }

    /// Fails with [`DashboardError::MissingFile`] when nothing is selected.
    /// The failure is shown in the flow's error slot.
    pub async fn validate_for_submit(&self, flow: Flow) -> Result<SelectedFile, DashboardError> {
        let mut state = self.state.lock().await;
        match flow {
            Flow::Predict => require_selection(flow, &mut state.prediction),
            Flow::Retrain => require_selection(flow, &mut state.retrain),
        }
    }

    /// Submits the selected image to the prediction endpoint.
    pub async fn submit_predict(&self) -> Result<PredictionResult, DashboardError> {
        let flow = Flow::Predict;
        let (file, generation) = {
            let mut state = self.state.lock().await;
            begin(flow, &mut state.prediction)?
        };

        let result = self.api.predict(&file).await;

        let mut state = self.state.lock().await;
        finish(flow, &mut state.prediction, generation, &result);
        result
    }

    /// Submits the selected archive for retraining. On success an insights
    /// refresh is started in the background and not awaited.
    pub async fn submit_retrain(&self) -> Result<RetrainResult, DashboardError> {
        let flow = Flow::Retrain;
        let (file, generation) = {
            let mut state = self.state.lock().await;
            begin(flow, &mut state.retrain)?
        };

        let result = self.api.retrain(&file).await;

        {
            let mut state = self.state.lock().await;
            finish(flow, &mut state.retrain, generation, &result);
            if result.is_ok() {
                state.last_retrained = Some(Instant::now());
            }
        }
        if result.is_ok() {
            self.spawn_insights_refresh().await;
        }
        result
    }

    /// Submits `flow`, discarding the typed result. Convenient for callers
    /// that render from the snapshot afterwards.
    pub async fn submit(&self, flow: Flow) -> Result<(), DashboardError> {
        match flow {
            Flow::Predict => self.submit_predict().await.map(|_| ()),
            Flow::Retrain => self.submit_retrain().await.map(|_| ()),
        }
    }

    /// Fetches dataset insights. Success replaces the loaded insights, failure
    /// leaves them untouched and records an insights error.
    pub async fn load_insights(&self) -> Result<DataInsights, DashboardError> {
        let generation = {
            let mut state = self.state.lock().await;
            state.insights.loading = true;
            state.insights.generation += 1;
            state.insights.generation
        };

        let result = self.api.data_insights().await;

        let mut state = self.state.lock().await;
        let insights = &mut state.insights;
        if insights.generation != generation {
            log::debug!("Dropping stale insights response (generation {})", generation);
            return result;
        }
        insights.loading = false;
        match &result {
            Ok(data) => {
                log::info!(
                    "Loaded insights: {} classes, {} sampled classes",
                    data.class_distribution.len(),
                    data.sample_images.len()
                );
                insights.data = Some(data.clone());
                insights.error = None;
            }
            Err(e) => {
                log::warn!("Insights load failed: {}", e);
                insights.error = Some(insights_error_message(&e));
            }
        }
        result
    }

    async fn spawn_insights_refresh(&self) {
        let dashboard = self.clone();
        let handle = tokio::spawn(async move {
            // The outcome is recorded in state; nobody waits on it here.
            let _ = dashboard.load_insights().await;
        });
        let mut handles = self.refreshes.lock().await;
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Waits for every background insights refresh started so far.
    pub async fn settle(&self) {
        loop {
            let handles = std::mem::take(&mut *self.refreshes.lock().await);
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    log::error!("Insights refresh task failed: {}", e);
                }
            }
        }
    }

    /// Resolves each loaded sample image to its URL, or to the placeholder
    /// when the image cannot be fetched.
    pub async fn resolve_sample_images(&self) -> Vec<(String, Vec<ImageSource>)> {
        let samples = {
            let state = self.state.lock().await;
            match &state.insights.data {
                Some(data) => data.sample_images.clone(),
                None => return Vec::new(),
            }
        };

        let mut labels: Vec<_> = samples.into_iter().collect();
        labels.sort_by(|a, b| a.0.cmp(&b.0));

        let mut resolved = Vec::with_capacity(labels.len());
        for (label, paths) in labels {
            let mut sources = Vec::with_capacity(paths.len());
            for path in paths {
                let source = match self.api.fetch_image(&path).await {
                    Ok(_) => ImageSource::Remote(sample_image_url(self.api.base_url(), &path)),
                    Err(e) => {
                        log::warn!("Sample image {} unavailable: {}", path, e);
                        ImageSource::Placeholder
                    }
                };
                sources.push(source);
            }
            resolved.push((label, sources));
        }
        resolved
    }

    pub async fn snapshot(&self) -> DashboardSnapshot {
        let state = self.state.lock().await;
        DashboardSnapshot {
            base_url: self.api.base_url().to_string(),
            prediction: state.prediction.clone(),
            retrain: state.retrain.clone(),
            insights: state.insights.clone(),
            last_retrained: state.last_retrained.map(|at| at.elapsed()),
        }
    }
}

/// Prefixes the failure detail unless the service gave none beyond the
/// fallback text itself.
fn insights_error_message(error: &DashboardError) -> String {
    let detail = error.to_string();
    if detail == INSIGHTS_FAILURE {
        detail
    } else {
        format!("{}: {}", INSIGHTS_FAILURE, detail)
    }
}

fn require_selection<T>(flow: Flow, slot: &mut FlowState<T>) -> Result<SelectedFile, DashboardError> {
    match &slot.selected {
        Some(file) => Ok(file.clone()),
        None => {
            slot.outcome = Outcome::Failed(flow.missing_file_message().to_string());
            Err(DashboardError::MissingFile(flow))
        }
    }
}

fn begin<T>(flow: Flow, slot: &mut FlowState<T>) -> Result<(SelectedFile, u64), DashboardError> {
    if slot.outcome.is_in_flight() {
        return Err(DashboardError::InFlight(flow));
    }
    let file = require_selection(flow, slot)?;
    Ok((file, slot.begin()))
}

fn finish<T: Clone>(
    flow: Flow,
    slot: &mut FlowState<T>,
    generation: u64,
    result: &Result<T, DashboardError>,
) {
    let outcome = match result {
        Ok(value) => {
            log::info!("{} request succeeded", flow);
            Outcome::Succeeded(value.clone())
        }
        Err(e) => {
            log::warn!("{} request failed: {}", flow, e);
            Outcome::Failed(e.display_message(flow))
        }
    };
    if !slot.finish(generation, outcome) {
        log::debug!("Dropping stale {} response (generation {})", flow, generation);
    }
}
