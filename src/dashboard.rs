//! Dashboard runtime: owns the session, drives the job lifecycle and
//! publishes [`UiEvent`]s for whatever front end is attached.
//!
//! One poll loop runs at a time. Starting a job cancels the previous loop,
//! and [`Dashboard::shutdown`] (also run on drop) stops the poll loop and
//! the background connectivity refresh.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::api::{AnalysisApi, AssetFile};
use crate::config::Config;
use crate::error::{DashboardError, Result};
use crate::job;
use crate::logging::{self, obj, v_num, v_opt, v_str, Domain};
use crate::model::{AssetKind, UploadedAsset};
use crate::poll::{drive, CancelSource, PollOutcome, ProgressUpdate};
use crate::render::{render, DisplayModel};
use crate::session::Session;
use crate::upload::upload_asset;

// =============================================================================
// Events
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    Upload,
    Processing,
    Results,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorTarget {
    Model,
    Dataset,
    Processing,
}

impl From<AssetKind> for IndicatorTarget {
    fn from(kind: AssetKind) -> Self {
        match kind {
            AssetKind::Model => IndicatorTarget::Model,
            AssetKind::Dataset => IndicatorTarget::Dataset,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorState {
    Active,
    Processing,
    Inactive,
}

/// State of the "generate explanations" control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartControl {
    Ready,
    Busy,
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionStatus {
    Unknown,
    Connected { version: Option<String>, checked_at: DateTime<Utc> },
    Offline { reason: String, checked_at: DateTime<Utc> },
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum UiEvent {
    SectionChanged { view: View },
    Toast { level: ToastLevel, title: String, message: String },
    Progress(ProgressUpdate),
    Indicator { target: IndicatorTarget, state: IndicatorState, text: String },
    StartControl { state: StartControl },
    Connection(ConnectionStatus),
    ResultsReady,
}

// =============================================================================
// Cancellation handle
// =============================================================================

/// Cancels whichever poll loop is active when [`Canceller::cancel`] runs.
/// Obtained once; stays valid across job restarts.
#[derive(Debug, Clone, Default)]
pub struct Canceller {
    slot: Arc<Mutex<Option<CancelSource>>>,
}

impl Canceller {
    pub fn cancel(&self) -> bool {
        match self.slot.lock() {
            Ok(slot) => match slot.as_ref() {
                Some(source) if !source.is_cancelled() => {
                    source.cancel();
                    true
                }
                _ => false,
            },
            Err(_) => false,
        }
    }

    fn replace(&self, next: Option<CancelSource>) {
        if let Ok(mut slot) = self.slot.lock() {
            if let Some(prev) = slot.take() {
                prev.cancel();
            }
            *slot = next;
        }
    }

    fn clear_if(&self, source: &CancelSource) {
        if let Ok(mut slot) = self.slot.lock() {
            if slot.as_ref().is_some_and(|s| s.same_as(source)) {
                *slot = None;
            }
        }
    }
}

// =============================================================================
// Dashboard
// =============================================================================

pub struct Dashboard {
    api: Arc<dyn AnalysisApi>,
    config: Config,
    session: Session,
    events: mpsc::UnboundedSender<UiEvent>,
    connection: Arc<watch::Sender<ConnectionStatus>>,
    poll: Canceller,
    timers: CancelSource,
    refresh: Option<JoinHandle<()>>,
    closed: bool,
}

impl Dashboard {
    pub fn new(api: Arc<dyn AnalysisApi>, config: Config) -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let (connection, _) = watch::channel(ConnectionStatus::Unknown);
        logging::info(
            Domain::System,
            "dashboard_created",
            obj(&[
                ("api_base_url", v_str(api.base_url())),
                ("poll_interval_ms", v_num(config.poll_interval_ms as f64)),
                ("max_poll_attempts", v_num(config.max_poll_attempts as f64)),
            ]),
        );
        let dashboard = Self {
            api,
            config,
            session: Session::new(),
            events,
            connection: Arc::new(connection),
            poll: Canceller::default(),
            timers: CancelSource::new(),
            refresh: None,
            closed: false,
        };
        dashboard.emit(UiEvent::SectionChanged { view: View::Upload });
        dashboard.emit(UiEvent::StartControl { state: StartControl::Disabled });
        (dashboard, rx)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Latest connectivity status; updated by [`probe`](Self::probe) and the
    /// background refresh.
    pub fn connection(&self) -> watch::Receiver<ConnectionStatus> {
        self.connection.subscribe()
    }

    pub fn canceller(&self) -> Canceller {
        self.poll.clone()
    }

    fn emit(&self, event: UiEvent) {
        let _ = self.events.send(event);
    }

    fn toast(&self, level: ToastLevel, title: &str, message: impl Into<String>) {
        self.emit(UiEvent::Toast { level, title: title.to_string(), message: message.into() });
    }

    fn notify_error(&self, err: &DashboardError) {
        self.toast(ToastLevel::Error, err.title(), err.to_string());
    }

    fn start_control_idle(&self) {
        let state = if self.session.can_start_job() {
            StartControl::Ready
        } else {
            StartControl::Disabled
        };
        self.emit(UiEvent::StartControl { state });
    }

    fn indicator(&self, target: IndicatorTarget, state: IndicatorState, text: &str) {
        self.emit(UiEvent::Indicator { target, state, text: text.to_string() });
    }

    // -------------------------------------------------------------------------
    // Connectivity
    // -------------------------------------------------------------------------

    pub async fn probe(&self) -> ConnectionStatus {
        probe_once(self.api.as_ref(), &self.connection, &self.events).await
    }

    /// Spawns the periodic connectivity probe. At most one runs; calling
    /// again while it is alive does nothing.
    pub fn start_background_refresh(&mut self) {
        if self.closed || self.refresh.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        let api = Arc::clone(&self.api);
        let connection = Arc::clone(&self.connection);
        let events = self.events.clone();
        let mut cancel = self.timers.signal();
        let period = self.config.system_refresh();

        logging::info(
            Domain::System,
            "refresh_started",
            obj(&[("period_secs", v_num(period.as_secs_f64()))]),
        );
        self.refresh = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = probe_once(api.as_ref(), &connection, &events) => {}
                }
            }
            logging::debug(Domain::System, "refresh_stopped", obj(&[]));
        }));
    }

    // -------------------------------------------------------------------------
    // Uploads
    // -------------------------------------------------------------------------

    pub async fn upload(&mut self, kind: AssetKind, file: AssetFile) -> Result<UploadedAsset> {
        if self.closed {
            return Err(DashboardError::Cancelled);
        }
        let target = IndicatorTarget::from(kind);
        self.indicator(target, IndicatorState::Processing, "Uploading...");
        match upload_asset(self.api.as_ref(), &mut self.session, kind, &file).await {
            Ok(asset) => {
                self.indicator(target, IndicatorState::Active, &asset.filename);
                let title = match kind {
                    AssetKind::Model => "Model Uploaded",
                    AssetKind::Dataset => "Dataset Uploaded",
                };
                self.toast(ToastLevel::Success, title, format!("{} uploaded successfully", asset.filename));
                self.start_control_idle();
                Ok(asset)
            }
            Err(err) => {
                self.indicator(target, IndicatorState::Inactive, "Upload failed");
                self.notify_error(&err);
                Err(err)
            }
        }
    }

    pub async fn upload_path(&mut self, kind: AssetKind, path: &Path) -> Result<UploadedAsset> {
        match AssetFile::read(kind, path) {
            Ok(file) => self.upload(kind, file).await,
            Err(err) => {
                self.indicator(IndicatorTarget::from(kind), IndicatorState::Inactive, "Invalid file");
                self.notify_error(&err);
                Err(err)
            }
        }
    }

    // -------------------------------------------------------------------------
    // Job lifecycle
    // -------------------------------------------------------------------------

    /// Starts a job from the uploaded assets. Any running poll loop is
    /// cancelled first.
    pub async fn generate(&mut self) -> Result<String> {
        if self.closed {
            return Err(DashboardError::Cancelled);
        }
        self.poll.replace(None);
        self.emit(UiEvent::StartControl { state: StartControl::Busy });

        match job::start_job(self.api.as_ref(), &mut self.session).await {
            Ok(task_id) => {
                self.poll.replace(Some(CancelSource::new()));
                self.emit(UiEvent::SectionChanged { view: View::Processing });
                self.indicator(IndicatorTarget::Processing, IndicatorState::Processing, "Processing");
                self.toast(ToastLevel::Info, "Processing Started", "Generating explanations for your model");
                Ok(task_id)
            }
            Err(err) => {
                self.indicator(IndicatorTarget::Processing, IndicatorState::Inactive, "Generation failed");
                self.start_control_idle();
                self.notify_error(&err);
                Err(err)
            }
        }
    }

    /// Polls the current job to a terminal state, fetches its results once
    /// and renders them.
    pub async fn run_job(&mut self) -> Result<DisplayModel> {
        if self.closed {
            return Err(DashboardError::Cancelled);
        }
        let current = self.poll.slot.lock().ok().and_then(|slot| slot.clone());
        let source = match current {
            Some(source) => source,
            None => {
                let source = CancelSource::new();
                self.poll.replace(Some(source.clone()));
                source
            }
        };
        let cfg = self.config.poll();
        let events = self.events.clone();
        let api = Arc::clone(&self.api);
        let Some(job) = self.session.job.as_mut() else {
            self.poll.clear_if(&source);
            return Err(DashboardError::Precondition("no analysis job has been started".to_string()));
        };

        let outcome = drive(api.as_ref(), job, cfg, source.signal(), |update| {
            let _ = events.send(UiEvent::Progress(update.clone()));
        })
        .await;
        self.poll.clear_if(&source);

        match outcome {
            PollOutcome::Completed => self.load_results(false).await,
            PollOutcome::Cancelled => {
                self.start_control_idle();
                Err(DashboardError::Cancelled)
            }
            other => {
                let err = match other.into_result() {
                    Err(err) => err,
                    Ok(()) => DashboardError::Cancelled,
                };
                self.indicator(IndicatorTarget::Processing, IndicatorState::Inactive, "Failed");
                self.start_control_idle();
                self.notify_error(&err);
                Err(err)
            }
        }
    }

    /// Re-issues the result fetch of a completed job with backoff.
    pub async fn refetch_results(&mut self) -> Result<DisplayModel> {
        self.load_results(true).await
    }

    async fn load_results(&mut self, with_retry: bool) -> Result<DisplayModel> {
        let fetched = if with_retry {
            let retry = self.config.fetch_retry();
            job::fetch_results_with_retry(self.api.as_ref(), &mut self.session, &retry)
                .await
                .map(render)
        } else {
            job::fetch_results(self.api.as_ref(), &mut self.session).await.map(render)
        };

        match fetched {
            Ok(model) => {
                self.indicator(IndicatorTarget::Processing, IndicatorState::Active, "Complete");
                self.emit(UiEvent::ResultsReady);
                self.emit(UiEvent::SectionChanged { view: View::Results });
                self.start_control_idle();
                self.toast(ToastLevel::Success, "Analysis Complete", "Explanations generated successfully");
                Ok(model)
            }
            Err(err) => {
                self.start_control_idle();
                self.notify_error(&err);
                Err(err)
            }
        }
    }

    /// Abandons the current job and returns to the upload view. Uploaded
    /// assets are kept.
    pub fn retry(&mut self) {
        self.poll.replace(None);
        job::reset_job(&mut self.session);
        self.indicator(IndicatorTarget::Processing, IndicatorState::Inactive, "Ready");
        self.emit(UiEvent::SectionChanged { view: View::Upload });
        self.start_control_idle();
    }

    /// Cancels the poll loop and background timers. Safe to call twice.
    pub fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.poll.replace(None);
        self.timers.cancel();
        if let Some(handle) = self.refresh.take() {
            handle.abort();
        }
        logging::info(
            Domain::System,
            "dashboard_shutdown",
            obj(&[("task_id", v_opt(self.session.task_id()))]),
        );
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn probe_once(
    api: &dyn AnalysisApi,
    connection: &watch::Sender<ConnectionStatus>,
    events: &mpsc::UnboundedSender<UiEvent>,
) -> ConnectionStatus {
    let checked_at = Utc::now();
    let status = match api.health().await {
        Ok(info) => ConnectionStatus::Connected { version: info.version, checked_at },
        Err(err) => {
            logging::warn(
                Domain::System,
                "api_unreachable",
                obj(&[("base_url", v_str(api.base_url())), ("error", v_str(&err.to_string()))]),
            );
            ConnectionStatus::Offline { reason: err.to_string(), checked_at }
        }
    };
    connection.send_replace(status.clone());
    let _ = events.send(UiEvent::Connection(status.clone()));
    status
}
