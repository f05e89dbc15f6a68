#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;

use mlpipe_dashboard::{
    DashboardError, DataInsights, InferenceApi, PredictionResult, RetrainResult, SelectedFile,
};

pub fn service_error(message: &str) -> DashboardError {
    DashboardError::ExternalService {
        status: Some(500),
        message: message.to_string(),
    }
}

pub fn prediction(class: &str, confidence: f64) -> PredictionResult {
    PredictionResult {
        predicted_class: class.to_string(),
        confidence,
        raw_predictions: serde_json::json!([[confidence, 1.0 - confidence]]),
    }
}

pub fn insights(classes: &[(&str, u64)]) -> DataInsights {
    DataInsights {
        class_distribution: classes.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        ..Default::default()
    }
}

/// In-memory service with canned responses and call counters.
#[derive(Default)]
pub struct FakeApi {
    pub predict_calls: AtomicUsize,
    pub retrain_calls: AtomicUsize,
    pub insights_calls: AtomicUsize,
    pub image_calls: AtomicUsize,
    predictions: Mutex<VecDeque<Result<PredictionResult, DashboardError>>>,
    retrains: Mutex<VecDeque<Result<RetrainResult, DashboardError>>>,
    insights: Mutex<VecDeque<Result<DataInsights, DashboardError>>>,
    missing_images: HashSet<String>,
    /// When set, `predict` waits for a notification before answering
    pub predict_gate: Option<Arc<Notify>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prediction(self, result: Result<PredictionResult, DashboardError>) -> Self {
        self.predictions.lock().unwrap().push_back(result);
        self
    }

    pub fn with_retrain(self, result: Result<RetrainResult, DashboardError>) -> Self {
        self.retrains.lock().unwrap().push_back(result);
        self
    }

    pub fn with_insights(self, result: Result<DataInsights, DashboardError>) -> Self {
        self.insights.lock().unwrap().push_back(result);
        self
    }

    pub fn with_missing_image(mut self, path: &str) -> Self {
        self.missing_images.insert(path.to_string());
        self
    }

    pub fn with_predict_gate(mut self, gate: Arc<Notify>) -> Self {
        self.predict_gate = Some(gate);
        self
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

fn next<T>(queue: &Mutex<VecDeque<Result<T, DashboardError>>>) -> Result<T, DashboardError> {
    queue
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| Err(service_error("no canned response")))
}

impl InferenceApi for FakeApi {
    fn base_url(&self) -> &str {
        "http://fake:5000"
    }

    async fn predict(&self, _file: &SelectedFile) -> Result<PredictionResult, DashboardError> {
        self.predict_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.predict_gate {
            gate.notified().await;
        }
        next(&self.predictions)
    }

    async fn retrain(&self, _file: &SelectedFile) -> Result<RetrainResult, DashboardError> {
        self.retrain_calls.fetch_add(1, Ordering::SeqCst);
        next(&self.retrains)
    }

    async fn data_insights(&self) -> Result<DataInsights, DashboardError> {
        self.insights_calls.fetch_add(1, Ordering::SeqCst);
        next(&self.insights)
    }

    async fn fetch_image(&self, path: &str) -> Result<Vec<u8>, DashboardError> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        if self.missing_images.contains(path) {
            Err(service_error("Failed to load image"))
        } else {
            Ok(vec![0xff, 0xd8])
        }
    }

    async fn status(&self) -> Result<String, DashboardError> {
        Ok("ML Pipeline API is running!".to_string())
    }
}

/// A request as seen by the stub HTTP service.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Clone)]
pub struct Route {
    pub method: &'static str,
    pub path: &'static str,
    pub status: u16,
    pub body: String,
}

impl Route {
    pub fn new(method: &'static str, path: &'static str, status: u16, body: impl Into<String>) -> Self {
        Self {
            method,
            path,
            status,
            body: body.into(),
        }
    }
}

/// Minimal HTTP/1.1 service on a loopback port that answers from fixed routes
/// and records every request.
pub struct StubServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl StubServer {
    pub async fn start(routes: Vec<Route>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);
        let routes = Arc::new(routes);

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let recorded = Arc::clone(&recorded);
                let routes = Arc::clone(&routes);
                tokio::spawn(async move {
                    let _ = handle_connection(stream, &routes, &recorded).await;
                });
            }
        });

        Self {
            base_url: format!("http://{}", addr),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn hits(&self, path: &str) -> usize {
        self.requests().iter().filter(|r| r.path == path).count()
    }
}

/// Returns a loopback URL with nothing listening on it.
pub async fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

async fn handle_connection(
    mut stream: TcpStream,
    routes: &[Route],
    recorded: &Mutex<Vec<RecordedRequest>>,
) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();

    let mut content_length = 0usize;
    let mut chunked = false;
    let mut content_type = None;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match name.trim().to_ascii_lowercase().as_str() {
            "content-length" => content_length = value.parse().unwrap_or(0),
            "transfer-encoding" => chunked = value.eq_ignore_ascii_case("chunked"),
            "content-type" => content_type = Some(value.to_string()),
            _ => {}
        }
    }

    let mut body = buf[header_end..].to_vec();
    if chunked {
        while find(&body, b"0\r\n\r\n").is_none() {
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..n]);
        }
        body = dechunk(&body);
    } else {
        while body.len() < content_length {
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..n]);
        }
    }

    let route = routes
        .iter()
        .find(|r| r.method == method && r.path == path)
        .cloned()
        .unwrap_or_else(|| Route::new("", "", 404, r#"{"error":"not found"}"#));

    recorded.lock().unwrap().push(RecordedRequest {
        method,
        path,
        content_type,
        body,
    });

    let response = format!(
        "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        route.status,
        route.body.len(),
        route.body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn dechunk(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut rest = raw;
    while let Some(line_end) = find(rest, b"\r\n") {
        let size_text = String::from_utf8_lossy(&rest[..line_end]);
        let size = usize::from_str_radix(size_text.trim(), 16).unwrap_or(0);
        if size == 0 {
            break;
        }
        let start = line_end + 2;
        let end = (start + size).min(rest.len());
        out.extend_from_slice(&rest[start..end]);
        rest = &rest[(end + 2).min(rest.len())..];
    }
    out
}
