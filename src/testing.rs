//! In-memory [`AnalysisApi`] that replays a scripted conversation.
//!
//! Used by unit and integration tests, and by `mlexplain demo` to exercise
//! the dashboard without a server.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::api::{AnalysisApi, ApiResult, AssetFile, HealthInfo, TaskStatusReport, UploadReceipt};
use crate::error::TransportError;
use crate::model::{AnalysisResult, AssetKind};
use serde_json::json;

type Step<T> = ApiResult<T>;

/// Replays queued responses; the last queued step repeats once the queue
/// is drained.
#[derive(Debug)]
struct Script<T: Clone> {
    queue: VecDeque<Step<T>>,
    last: Option<Step<T>>,
}

impl<T: Clone> Script<T> {
    fn new() -> Self {
        Self { queue: VecDeque::new(), last: None }
    }

    fn push(&mut self, step: Step<T>) {
        self.queue.push_back(step);
    }

    fn next(&mut self, fallback: impl FnOnce() -> Step<T>) -> Step<T> {
        match self.queue.pop_front() {
            Some(step) => {
                self.last = Some(step.clone());
                step
            }
            None => self.last.clone().unwrap_or_else(fallback),
        }
    }
}

#[derive(Debug)]
pub struct ScriptedApi {
    health: Mutex<Script<HealthInfo>>,
    uploads: Mutex<Script<UploadReceipt>>,
    starts: Mutex<Script<String>>,
    statuses: Mutex<Script<TaskStatusReport>>,
    results: Mutex<Script<AnalysisResult>>,
    status_delay: Mutex<Option<Duration>>,
    health_calls: AtomicU32,
    upload_calls: AtomicU32,
    start_calls: AtomicU32,
    status_calls: AtomicU32,
    result_calls: AtomicU32,
}

impl Default for ScriptedApi {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self {
            health: Mutex::new(Script::new()),
            uploads: Mutex::new(Script::new()),
            starts: Mutex::new(Script::new()),
            statuses: Mutex::new(Script::new()),
            results: Mutex::new(Script::new()),
            status_delay: Mutex::new(None),
            health_calls: AtomicU32::new(0),
            upload_calls: AtomicU32::new(0),
            start_calls: AtomicU32::new(0),
            status_calls: AtomicU32::new(0),
            result_calls: AtomicU32::new(0),
        }
    }

    pub fn with_health(self, step: Step<HealthInfo>) -> Self {
        push(&self.health, step);
        self
    }

    pub fn with_upload(self, step: Step<UploadReceipt>) -> Self {
        push(&self.uploads, step);
        self
    }

    pub fn with_start(self, step: Step<String>) -> Self {
        push(&self.starts, step);
        self
    }

    pub fn with_statuses(self, statuses: &[&str]) -> Self {
        for status in statuses {
            push(
                &self.statuses,
                Ok(TaskStatusReport { status: status.to_string(), progress: None, error: None }),
            );
        }
        self
    }

    pub fn with_status_report(self, report: TaskStatusReport) -> Self {
        push(&self.statuses, Ok(report));
        self
    }

    pub fn with_status_errors(self, count: usize) -> Self {
        for _ in 0..count {
            push(&self.statuses, Err(TransportError::http(503, None)));
        }
        self
    }

    /// Every status response takes `delay` to arrive.
    pub fn with_status_delay(self, delay: Duration) -> Self {
        if let Ok(mut d) = self.status_delay.lock() {
            *d = Some(delay);
        }
        self
    }

    pub fn with_result(self, step: Step<AnalysisResult>) -> Self {
        push(&self.results, step);
        self
    }

    pub fn health_calls(&self) -> u32 {
        self.health_calls.load(Ordering::SeqCst)
    }

    pub fn upload_calls(&self) -> u32 {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn start_calls(&self) -> u32 {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn result_calls(&self) -> u32 {
        self.result_calls.load(Ordering::SeqCst)
    }
}

fn push<T: Clone>(script: &Mutex<Script<T>>, step: Step<T>) {
    if let Ok(mut s) = script.lock() {
        s.push(step);
    }
}

fn next<T: Clone>(script: &Mutex<Script<T>>, op: &str) -> Step<T> {
    let unscripted = || Err(TransportError::network(format!("{}: no scripted response", op)));
    match script.lock() {
        Ok(mut s) => s.next(unscripted),
        Err(_) => unscripted(),
    }
}

#[async_trait]
impl AnalysisApi for ScriptedApi {
    fn base_url(&self) -> &str {
        "scripted://"
    }

    async fn health(&self) -> ApiResult<HealthInfo> {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        next(&self.health, "health")
    }

    async fn upload(&self, kind: AssetKind, file: &AssetFile) -> ApiResult<UploadReceipt> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.uploads.lock().map(|s| !s.queue.is_empty()).unwrap_or(false);
        if scripted {
            return next(&self.uploads, "upload");
        }
        Ok(UploadReceipt {
            id: format!("{}-{}", kind.as_str(), self.upload_calls()),
            filename: file.filename.clone(),
            size_bytes: Some(file.size_bytes()),
            shape: match kind {
                AssetKind::Dataset => Some((100, 5)),
                AssetKind::Model => None,
            },
        })
    }

    async fn start_explanations(&self, _model_id: &str, _dataset_id: &str) -> ApiResult<String> {
        let n = self.start_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let scripted = self.starts.lock().map(|s| !s.queue.is_empty()).unwrap_or(false);
        if scripted {
            return next(&self.starts, "start");
        }
        Ok(format!("task-{}", n))
    }

    async fn task_status(&self, _task_id: &str) -> ApiResult<TaskStatusReport> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.status_delay.lock().ok().and_then(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        next(&self.statuses, "task_status")
    }

    async fn results(&self, _task_id: &str) -> ApiResult<AnalysisResult> {
        self.result_calls.fetch_add(1, Ordering::SeqCst);
        next(&self.results, "results")
    }
}

/// A realistic completed-job payload covering every result section.
pub fn sample_result() -> AnalysisResult {
    let raw = json!({
        "model_info": {"type": "RandomForestClassifier", "n_features": 5},
        "dataset_info": {"processed_samples": 100, "n_features": 5},
        "predictions": {
            "count": 100,
            "statistics": {"mean": 0.482, "std": 0.291, "min": 0.012, "max": 0.987},
            "sample": [0.12, 0.87, 0.45, 0.91, 0.03, 0.66, 0.38, 0.72, 0.55, 0.29]
        },
        "explanations": {
            "shap": {
                "status": "success",
                "global_feature_importance": [0.021, -0.094, 0.088, 0.041, -0.012],
                "feature_names": ["age", "income", "credit_score", "tenure", "region"]
            },
            "lime": {
                "status": "success",
                "explanations": [{"income": -0.31, "credit_score": 0.22, "age": 0.05}]
            },
            "permutation_importance": {
                "status": "success",
                "ranked_features": [
                    {"feature": "income", "importance": 0.152, "std": 0.011},
                    {"feature": "credit_score", "importance": 0.097, "std": 0.008},
                    {"feature": "region", "importance": -0.004, "std": 0.002}
                ]
            },
            "feature_interaction": {
                "status": "success",
                "top_interactions": [
                    {"feature_1": "income", "feature_2": "credit_score", "interaction_strength": 0.42},
                    {"feature_1": "age", "feature_2": "tenure", "interaction_strength": 0.17}
                ]
            }
        },
        "fidelity_scores": {"shap": 0.91, "lime": 0.84, "note": "surrogate"},
        "business_explanation": "## Key drivers\nIncome and credit score dominate the model.\n\n- **income** lowers risk as it grows\n- credit_score raises approval odds"
    });
    serde_json::from_value(raw).unwrap_or_default()
}
