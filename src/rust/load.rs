//! Small load generator: concurrent virtual users hitting the prediction and
//! insights endpoints, predictions weighted twice as heavily.

use std::fmt::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::api::InferenceApi;
use crate::upload::SelectedFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadTask {
    Predict,
    Insights,
}

/// Every third step of a user's schedule is an insights fetch.
pub fn task_for(step: usize) -> LoadTask {
    if step % 3 == 2 {
        LoadTask::Insights
    } else {
        LoadTask::Predict
    }
}

/// Pause between two tasks of the same user, drawn uniformly from `min..=max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThinkTime {
    pub min: Duration,
    pub max: Duration,
}

impl ThinkTime {
    pub fn fixed(pause: Duration) -> Self {
        Self::between(pause, pause)
    }

    /// A reversed range is treated as fixed at `min`.
    pub fn between(min: Duration, max: Duration) -> Self {
        Self { min, max: max.max(min) }
    }

    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}

impl Default for ThinkTime {
    fn default() -> Self {
        Self::between(Duration::from_secs(1), Duration::from_secs(3))
    }
}

#[derive(Debug, Clone)]
pub struct LoadPlan {
    pub users: usize,
    pub iterations: usize,
    pub think_time: ThinkTime,
    pub image: SelectedFile,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndpointStats {
    pub requests: usize,
    pub failures: usize,
    pub total_latency: Duration,
}

impl EndpointStats {
    fn record(&mut self, latency: Duration, ok: bool) {
        self.requests += 1;
        if !ok {
            self.failures += 1;
        }
        self.total_latency += latency;
    }

    fn merge(&mut self, other: &EndpointStats) {
        self.requests += other.requests;
        self.failures += other.failures;
        self.total_latency += other.total_latency;
    }

    pub fn mean_latency(&self) -> Option<Duration> {
        if self.requests == 0 {
            None
        } else {
            Some(self.total_latency / self.requests as u32)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub predict: EndpointStats,
    pub insights: EndpointStats,
    pub elapsed: Duration,
}

impl LoadReport {
    pub fn total_requests(&self) -> usize {
        self.predict.requests + self.insights.requests
    }

    pub fn total_failures(&self) -> usize {
        self.predict.failures + self.insights.failures
    }
}

/// Runs `plan.users` users concurrently, each performing `plan.iterations` tasks.
pub async fn run_load<A: InferenceApi>(api: Arc<A>, plan: LoadPlan) -> LoadReport {
    log::info!(
        "Starting load run: {} users x {} iterations, think time {:?}",
        plan.users,
        plan.iterations,
        plan.think_time
    );
    let started = Instant::now();

    let mut handles = Vec::with_capacity(plan.users);
    for user in 0..plan.users {
        let api = Arc::clone(&api);
        let image = plan.image.clone();
        let iterations = plan.iterations;
        let think_time = plan.think_time;
        handles.push(tokio::spawn(async move {
            let mut report = LoadReport::default();
            for i in 0..iterations {
                if i > 0 {
                    let pause = think_time.sample();
                    if !pause.is_zero() {
                        tokio::time::sleep(pause).await;
                    }
                }
                let task = task_for(user + i);
                let start = Instant::now();
                match task {
                    LoadTask::Predict => {
                        let ok = api.predict(&image).await.is_ok();
                        report.predict.record(start.elapsed(), ok);
                    }
                    LoadTask::Insights => {
                        let ok = api.data_insights().await.is_ok();
                        report.insights.record(start.elapsed(), ok);
                    }
                }
            }
            report
        }));
    }

    let mut total = LoadReport::default();
    for handle in handles {
        match handle.await {
            Ok(report) => {
                total.predict.merge(&report.predict);
                total.insights.merge(&report.insights);
            }
            Err(e) => log::error!("Load user task failed: {}", e),
        }
    }
    total.elapsed = started.elapsed();
    log::info!(
        "Load run finished: {} requests, {} failures in {:.2?}",
        total.total_requests(),
        total.total_failures(),
        total.elapsed
    );
    total
}

pub fn render_load_report(report: &LoadReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<16} {:>8} {:>8} {:>12}", "endpoint", "requests", "failures", "mean");
    for (name, stats) in [("POST /predict", &report.predict), ("GET /data-insights", &report.insights)] {
        let mean = stats
            .mean_latency()
            .map(|d| format!("{:.2?}", d))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(out, "{:<16} {:>8} {:>8} {:>12}", name, stats.requests, stats.failures, mean);
    }
    let _ = write!(
        out,
        "total: {} requests, {} failures in {:.2?}",
        report.total_requests(),
        report.total_failures(),
        report.elapsed
    );
    out
}
