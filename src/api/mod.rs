use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TransportError;
use crate::model::{AnalysisResult, AssetKind};

mod http;
pub mod retry;

pub use http::HttpApi;

pub type ApiResult<T> = std::result::Result<T, TransportError>;

/// Response of `GET /`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthInfo {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A file ready to be sent as the multipart `file` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl AssetFile {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { filename: filename.into(), bytes }
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Upload response, normalized across the model and dataset endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub id: String,
    pub filename: String,
    pub size_bytes: Option<u64>,
    pub shape: Option<(u64, u64)>,
}

/// Response of `GET /task-status/{task_id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatusReport {
    pub status: String,
    #[serde(default)]
    pub progress: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// The remote explanation service.
///
/// Implementations normalize every failure (network, non-2xx, undecodable
/// body) into a [`TransportError`].
#[async_trait]
pub trait AnalysisApi: Send + Sync {
    fn base_url(&self) -> &str;
    async fn health(&self) -> ApiResult<HealthInfo>;
    async fn upload(&self, kind: AssetKind, file: &AssetFile) -> ApiResult<UploadReceipt>;
    async fn start_explanations(&self, model_id: &str, dataset_id: &str) -> ApiResult<String>;
    async fn task_status(&self, task_id: &str) -> ApiResult<TaskStatusReport>;
    async fn results(&self, task_id: &str) -> ApiResult<AnalysisResult>;
}
