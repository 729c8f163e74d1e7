//! Client-side validation and upload of model and dataset files.

use sha2::{Digest, Sha256};
use std::path::Path;

use crate::api::{AnalysisApi, AssetFile};
use crate::error::{DashboardError, Result};
use crate::logging::{self, obj, v_num, v_str, Domain};
use crate::model::{AssetKind, UploadedAsset};
use crate::session::Session;

/// Checks extension and size. Runs before any network call.
pub fn validate_upload(kind: AssetKind, filename: &str, size_bytes: u64) -> Result<()> {
    if !kind.allowed_extensions().iter().any(|ext| filename.ends_with(ext)) {
        let msg = match kind {
            AssetKind::Model => "Please select a .pkl or .joblib file",
            AssetKind::Dataset => "Please select a CSV file",
        };
        return Err(DashboardError::Validation(format!("{}: {}", filename, msg)));
    }
    if size_bytes > kind.max_bytes() {
        let msg = match kind {
            AssetKind::Model => "Model file must be less than 50MB",
            AssetKind::Dataset => "Dataset file must be less than 10MB",
        };
        return Err(DashboardError::Validation(format!(
            "{} ({}): {}",
            filename,
            format_file_size(size_bytes),
            msg
        )));
    }
    Ok(())
}

impl AssetFile {
    /// Reads `path` for upload as `kind`, rejecting it from metadata alone
    /// when the name or size is out of bounds.
    pub fn read(kind: AssetKind, path: &Path) -> Result<Self> {
        let filename = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| DashboardError::Validation(format!("not a file path: {}", path.display())))?
            .to_string();
        let meta = std::fs::metadata(path)
            .map_err(|e| DashboardError::Validation(format!("{}: {}", path.display(), e)))?;
        validate_upload(kind, &filename, meta.len())?;
        let bytes = std::fs::read(path)
            .map_err(|e| DashboardError::Validation(format!("{}: {}", path.display(), e)))?;
        Ok(AssetFile::new(filename, bytes))
    }
}

/// Validates and uploads `file`, storing the resulting asset in `session`.
pub async fn upload_asset<A: AnalysisApi + ?Sized>(
    api: &A,
    session: &mut Session,
    kind: AssetKind,
    file: &AssetFile,
) -> Result<UploadedAsset> {
    validate_upload(kind, &file.filename, file.size_bytes())?;

    let digest = sha256_hex(&file.bytes);
    logging::info(
        Domain::Upload,
        "upload_started",
        obj(&[
            ("asset_kind", v_str(kind.as_str())),
            ("filename", v_str(&file.filename)),
            ("size_bytes", v_num(file.size_bytes() as f64)),
            ("sha256", v_str(&digest)),
        ]),
    );

    let receipt = api.upload(kind, file).await.map_err(|e| {
        logging::error(
            Domain::Upload,
            "upload_failed",
            obj(&[("asset_kind", v_str(kind.as_str())), ("error", v_str(&e.to_string()))]),
        );
        DashboardError::transport(e, "Upload failed")
    })?;

    let asset = UploadedAsset {
        kind,
        id: receipt.id,
        filename: receipt.filename,
        size_bytes: receipt.size_bytes.unwrap_or_else(|| file.size_bytes()),
        shape: receipt.shape,
        sha256: digest,
    };
    logging::info(
        Domain::Upload,
        "upload_completed",
        obj(&[
            ("asset_kind", v_str(kind.as_str())),
            ("asset_id", v_str(&asset.id)),
            ("filename", v_str(&asset.filename)),
        ]),
    );
    session.set_asset(asset.clone());
    Ok(asset)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Human-readable size in base-1024 units, e.g. `1.5 KB`.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    let exp = ((bytes as f64).ln() / 1024f64.ln()).floor() as usize;
    let exp = exp.min(UNITS.len() - 1);
    let value = bytes as f64 / 1024f64.powi(exp as i32);
    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[exp])
}
