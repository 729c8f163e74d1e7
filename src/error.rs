use thiserror::Error;

/// Normalized failure of a single HTTP exchange.
///
/// `status` is `None` for network-level failures (connect, timeout, body
/// decode). `detail` is the server-supplied message when the error body
/// carried one.
#[derive(Debug, Clone, Error)]
#[error("{cause}{}", detail_suffix(.detail))]
pub struct TransportError {
    pub status: Option<u16>,
    pub detail: Option<String>,
    pub cause: String,
}

impl TransportError {
    pub fn network(cause: impl Into<String>) -> Self {
        Self { status: None, detail: None, cause: cause.into() }
    }

    pub fn http(status: u16, detail: Option<String>) -> Self {
        Self { status: Some(status), detail, cause: format!("HTTP {}", status) }
    }

    /// Server detail if present, `fallback` for bare non-2xx, the network
    /// cause otherwise.
    pub fn message_or(&self, fallback: &str) -> String {
        match (&self.detail, self.status) {
            (Some(detail), _) => detail.clone(),
            (None, Some(_)) => fallback.to_string(),
            (None, None) => self.cause.clone(),
        }
    }

    /// Like [`message_or`](Self::message_or) with `HTTP <status>` as the
    /// bare non-2xx message.
    pub fn message_or_status(&self) -> String {
        match (&self.detail, self.status) {
            (Some(detail), _) => detail.clone(),
            (None, Some(status)) => format!("HTTP {}", status),
            (None, None) => self.cause.clone(),
        }
    }
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail.as_ref().map(|d| format!(": {}", d)).unwrap_or_default()
}

#[derive(Debug, Clone, Error)]
pub enum DashboardError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("precondition failed: {0}")]
    Precondition(String),
    #[error("{message}")]
    Transport {
        message: String,
        #[source]
        source: TransportError,
    },
    #[error("processing error: {0}")]
    ServerReportedFailure(String),
    #[error("task took too long to complete ({attempts} polls)")]
    Timeout { attempts: u32 },
    #[error("results for task {task_id} could not be loaded: {message}")]
    ResultFetch { task_id: String, message: String },
    #[error("polling cancelled")]
    Cancelled,
}

impl DashboardError {
    pub fn transport(source: TransportError, fallback: &str) -> Self {
        Self::Transport { message: source.message_or(fallback), source }
    }

    /// Transport failure whose bare non-2xx message is the status line.
    pub fn transport_with_status(source: TransportError) -> Self {
        Self::Transport { message: source.message_or_status(), source }
    }

    /// Whether re-issuing the same request can succeed without new input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::ResultFetch { .. } | Self::Timeout { .. })
    }

    /// Short title for toast-style notifications.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Invalid File",
            Self::Precondition(_) => "Missing Files",
            Self::Transport { .. } => "Error",
            Self::ServerReportedFailure(_) => "Processing Error",
            Self::Timeout { .. } => "Timeout Error",
            Self::ResultFetch { .. } => "Results Error",
            Self::Cancelled => "Cancelled",
        }
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_takes_precedence() {
        let e = TransportError::http(422, Some("bad pickle".into()));
        assert_eq!(e.message_or("Upload failed"), "bad pickle");
        assert_eq!(e.to_string(), "HTTP 422: bad pickle");
    }

    #[test]
    fn bare_status_uses_fallback() {
        let e = TransportError::http(500, None);
        assert_eq!(e.message_or("Upload failed"), "Upload failed");
        assert_eq!(e.to_string(), "HTTP 500");
    }

    #[test]
    fn status_fallback_names_the_status() {
        let bare = DashboardError::transport_with_status(TransportError::http(502, None));
        assert_eq!(bare.to_string(), "HTTP 502");
        let detailed = DashboardError::transport_with_status(TransportError::http(404, Some("Model not found".into())));
        assert_eq!(detailed.to_string(), "Model not found");
        let offline = DashboardError::transport_with_status(TransportError::network("connection refused"));
        assert_eq!(offline.to_string(), "connection refused");
    }

    #[test]
    fn network_error_keeps_cause() {
        let e = TransportError::network("connection refused");
        assert_eq!(e.message_or("Upload failed"), "connection refused");
    }

    #[test]
    fn retryable_classification() {
        assert!(!DashboardError::Validation("x".into()).is_retryable());
        assert!(!DashboardError::Precondition("x".into()).is_retryable());
        assert!(DashboardError::ResultFetch { task_id: "t".into(), message: "m".into() }.is_retryable());
        assert!(!DashboardError::ServerReportedFailure("boom".into()).is_retryable());
    }
}
