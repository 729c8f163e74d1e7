use crate::model::{AnalysisJob, AnalysisResult, AssetKind, UploadedAsset};

/// Everything the dashboard remembers between operations.
///
/// Holds at most one asset per kind, one job and one result. Passed
/// explicitly to every operation; there is no process-wide instance.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub model: Option<UploadedAsset>,
    pub dataset: Option<UploadedAsset>,
    pub job: Option<AnalysisJob>,
    pub result: Option<AnalysisResult>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn asset(&self, kind: AssetKind) -> Option<&UploadedAsset> {
        match kind {
            AssetKind::Model => self.model.as_ref(),
            AssetKind::Dataset => self.dataset.as_ref(),
        }
    }

    /// Stores `asset` in its slot, replacing any previous one of that kind.
    pub fn set_asset(&mut self, asset: UploadedAsset) {
        match asset.kind {
            AssetKind::Model => self.model = Some(asset),
            AssetKind::Dataset => self.dataset = Some(asset),
        }
    }

    pub fn clear_asset(&mut self, kind: AssetKind) {
        match kind {
            AssetKind::Model => self.model = None,
            AssetKind::Dataset => self.dataset = None,
        }
    }

    pub fn model_id(&self) -> Option<&str> {
        self.model.as_ref().map(|a| a.id.as_str())
    }

    pub fn dataset_id(&self) -> Option<&str> {
        self.dataset.as_ref().map(|a| a.id.as_str())
    }

    pub fn can_start_job(&self) -> bool {
        self.model.is_some() && self.dataset.is_some()
    }

    /// Starts tracking a new job. Any previous result is discarded.
    pub fn begin_job(&mut self, task_id: impl Into<String>) -> &mut AnalysisJob {
        self.result = None;
        self.job.insert(AnalysisJob::new(task_id))
    }

    pub fn task_id(&self) -> Option<&str> {
        self.job.as_ref().map(|j| j.task_id.as_str())
    }

    /// Drops the job and its result, keeping uploaded assets.
    pub fn clear_job(&mut self) {
        self.job = None;
        self.result = None;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
