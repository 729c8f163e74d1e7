use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::{AnalysisApi, ApiResult, AssetFile, HealthInfo, TaskStatusReport, UploadReceipt};
use crate::config::Config;
use crate::error::TransportError;
use crate::logging::{self, obj, v_num, v_str, Domain, ProfileScope};
use crate::model::{AnalysisResult, AssetKind};

/// `reqwest`-backed client for the explanation service.
pub struct HttpApi {
    client: Client,
    base: String,
}

impl HttpApi {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(cfg.request_timeout()).build()?;
        Ok(Self { client, base: cfg.api_base_url.trim_end_matches('/').to_string() })
    }

    fn endpoint(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = Url::parse(&self.base)
            .map_err(|e| TransportError::network(format!("invalid base url {}: {}", self.base, e)))?;
        url.path_segments_mut()
            .map_err(|_| TransportError::network(format!("base url cannot carry a path: {}", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, op: &'static str, req: reqwest::RequestBuilder) -> ApiResult<Response> {
        let _scope = ProfileScope::with_context("http_request", &[("op", v_str(op))]);
        let resp = req.send().await.map_err(|e| {
            logging::warn(
                Domain::Api,
                "request_failed",
                obj(&[("op", v_str(op)), ("error", v_str(&e.to_string()))]),
            );
            TransportError::network(e.to_string())
        })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        let detail = extract_detail(&body);
        logging::warn(
            Domain::Api,
            "http_error",
            obj(&[
                ("op", v_str(op)),
                ("status", v_num(status.as_u16() as f64)),
                ("detail", logging::v_opt(detail.as_deref())),
            ]),
        );
        Err(TransportError::http(status.as_u16(), detail))
    }

    async fn decode<T: DeserializeOwned>(op: &'static str, resp: Response) -> ApiResult<T> {
        resp.json::<T>()
            .await
            .map_err(|e| TransportError::network(format!("{}: invalid response body: {}", op, e)))
    }
}

/// Pulls a human-readable message out of an error body: JSON `detail`,
/// then JSON `message`, then the raw text.
pub(crate) fn extract_detail(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => ["detail", "message"].iter().find_map(|key| match map.get(*key) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        }),
        Ok(_) => None,
        Err(_) => Some(trimmed.to_string()),
    }
}

#[derive(Deserialize)]
struct ModelUploadWire {
    model_id: String,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    size: Option<u64>,
}

#[derive(Deserialize)]
struct DatasetUploadWire {
    dataset_id: String,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    shape: Option<Vec<u64>>,
}

#[derive(Deserialize)]
struct TaskTicketWire {
    task_id: String,
}

#[async_trait]
impl AnalysisApi for HttpApi {
    fn base_url(&self) -> &str {
        &self.base
    }

    async fn health(&self) -> ApiResult<HealthInfo> {
        let url = self.endpoint(&[])?;
        let resp = self.send("health", self.client.get(url)).await?;
        Self::decode("health", resp).await
    }

    async fn upload(&self, kind: AssetKind, file: &AssetFile) -> ApiResult<UploadReceipt> {
        let path = kind.upload_path().trim_start_matches('/');
        let url = self.endpoint(&[path])?;
        let part = Part::bytes(file.bytes.clone()).file_name(file.filename.clone());
        let form = Form::new().part("file", part);
        let resp = self.send("upload", self.client.post(url).multipart(form)).await?;

        let receipt = match kind {
            AssetKind::Model => {
                let wire: ModelUploadWire = Self::decode("upload_model", resp).await?;
                UploadReceipt {
                    id: wire.model_id,
                    filename: wire.filename.unwrap_or_else(|| file.filename.clone()),
                    size_bytes: wire.size,
                    shape: None,
                }
            }
            AssetKind::Dataset => {
                let wire: DatasetUploadWire = Self::decode("upload_dataset", resp).await?;
                let shape = match wire.shape.as_deref() {
                    Some([rows, cols, ..]) => Some((*rows, *cols)),
                    _ => None,
                };
                UploadReceipt {
                    id: wire.dataset_id,
                    filename: wire.filename.unwrap_or_else(|| file.filename.clone()),
                    size_bytes: None,
                    shape,
                }
            }
        };
        Ok(receipt)
    }

    async fn start_explanations(&self, model_id: &str, dataset_id: &str) -> ApiResult<String> {
        let mut url = self.endpoint(&["generate-explanations"])?;
        url.query_pairs_mut()
            .append_pair("model_id", model_id)
            .append_pair("dataset_id", dataset_id);
        let req = self.client.post(url).header("Content-Type", "application/json");
        let resp = self.send("generate_explanations", req).await?;
        let ticket: TaskTicketWire = Self::decode("generate_explanations", resp).await?;
        Ok(ticket.task_id)
    }

    async fn task_status(&self, task_id: &str) -> ApiResult<TaskStatusReport> {
        let url = self.endpoint(&["task-status", task_id])?;
        let resp = self.send("task_status", self.client.get(url)).await?;
        Self::decode("task_status", resp).await
    }

    async fn results(&self, task_id: &str) -> ApiResult<AnalysisResult> {
        let url = self.endpoint(&["results", task_id])?;
        let resp = self.send("results", self.client.get(url)).await?;
        Self::decode("results", resp).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(base: &str) -> HttpApi {
        let cfg = Config { api_base_url: base.to_string(), ..Config::default() };
        HttpApi::new(&cfg).unwrap()
    }

    #[test]
    fn endpoint_joins_segments() {
        let api = api("http://localhost:8000/");
        assert_eq!(
            api.endpoint(&["task-status", "abc"]).unwrap().as_str(),
            "http://localhost:8000/task-status/abc"
        );
    }

    #[test]
    fn endpoint_escapes_task_ids() {
        let api = api("http://localhost:8000/api");
        assert_eq!(
            api.endpoint(&["results", "a/b c"]).unwrap().as_str(),
            "http://localhost:8000/api/results/a%2Fb%20c"
        );
    }

    #[test]
    fn detail_precedence() {
        assert_eq!(extract_detail(r#"{"detail":"bad file"}"#).as_deref(), Some("bad file"));
        assert_eq!(extract_detail(r#"{"message":"nope"}"#).as_deref(), Some("nope"));
        assert_eq!(
            extract_detail(r#"{"detail":"first","message":"second"}"#).as_deref(),
            Some("first")
        );
        assert_eq!(extract_detail("Internal Server Error").as_deref(), Some("Internal Server Error"));
        assert_eq!(extract_detail("  "), None);
        assert_eq!(extract_detail(r#"{"other":1}"#), None);
    }

    #[test]
    fn structured_detail_is_stringified() {
        let d = extract_detail(r#"{"detail":[{"loc":["query","model_id"]}]}"#).unwrap();
        assert!(d.contains("model_id"));
    }
}
