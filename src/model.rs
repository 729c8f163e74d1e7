//! Domain types shared by the upload, job, poll and render layers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{DATASET_MAX_BYTES, MODEL_MAX_BYTES};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Model,
    Dataset,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Model => "model",
            AssetKind::Dataset => "dataset",
        }
    }

    pub fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            AssetKind::Model => &[".pkl", ".joblib"],
            AssetKind::Dataset => &[".csv"],
        }
    }

    pub fn max_bytes(&self) -> u64 {
        match self {
            AssetKind::Model => MODEL_MAX_BYTES,
            AssetKind::Dataset => DATASET_MAX_BYTES,
        }
    }

    pub fn upload_path(&self) -> &'static str {
        match self {
            AssetKind::Model => "/upload-model",
            AssetKind::Dataset => "/upload-dataset",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedAsset {
    pub kind: AssetKind,
    pub id: String,
    pub filename: String,
    pub size_bytes: u64,
    /// `(rows, cols)` for datasets.
    pub shape: Option<(u64, u64)>,
    pub sha256: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisJob {
    pub task_id: String,
    pub status: JobStatus,
    pub progress_detail: Option<String>,
    pub error: Option<String>,
    /// Raw status string from the last poll response, recognized or not.
    pub last_reported: Option<String>,
}

impl AnalysisJob {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            status: JobStatus::Queued,
            progress_detail: None,
            error: None,
            last_reported: None,
        }
    }
}

// =============================================================================
// Result payload
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default)]
    pub model_info: ModelInfo,
    #[serde(default)]
    pub dataset_info: DatasetInfo,
    #[serde(default)]
    pub predictions: Option<Predictions>,
    #[serde(default)]
    pub explanations: Explanations,
    #[serde(default)]
    pub fidelity_scores: Map<String, Value>,
    #[serde(default)]
    pub business_explanation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    #[serde(rename = "type", default)]
    pub model_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetInfo {
    #[serde(default)]
    pub processed_samples: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Predictions {
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub statistics: Option<PredictionStatistics>,
    #[serde(default)]
    pub sample: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionStatistics {
    #[serde(default)]
    pub mean: Option<f64>,
    #[serde(default)]
    pub std: Option<f64>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

/// Explanation sections stay as raw JSON; each renderer decodes its own
/// section so one malformed analysis does not hide the others.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Explanations {
    #[serde(default)]
    pub shap: Option<Value>,
    #[serde(default)]
    pub lime: Option<Value>,
    #[serde(default)]
    pub permutation_importance: Option<Value>,
    #[serde(default)]
    pub feature_interaction: Option<Value>,
}
