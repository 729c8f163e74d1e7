//! Pure poll reducer: (PollMachine, input) -> decision.
//!
//! No I/O and no clock. The async driver feeds it ticks and status
//! reports; everything it decides is observable from the return values,
//! which keeps the sequencing testable without a runtime.

use serde::Serialize;

use crate::model::{AnalysisJob, JobStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollState {
    Idle,
    Polling,
    Completed,
    Failed { error: String },
    TimedOut,
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PollState::Completed | PollState::Failed { .. } | PollState::TimedOut)
    }
}

/// Status string reported by the service, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportedStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    /// Anything else. Treated like `Processing` but kept distinct so it
    /// can be logged.
    Other(String),
}

impl ReportedStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "queued" => ReportedStatus::Queued,
            "processing" => ReportedStatus::Processing,
            "completed" => ReportedStatus::Completed,
            "failed" => ReportedStatus::Failed,
            other => ReportedStatus::Other(other.to_string()),
        }
    }

    pub fn percent(&self) -> u8 {
        match self {
            ReportedStatus::Queued => 10,
            ReportedStatus::Processing => 50,
            ReportedStatus::Completed => 100,
            ReportedStatus::Failed => 0,
            ReportedStatus::Other(_) => 25,
        }
    }

    pub fn text(&self) -> &'static str {
        match self {
            ReportedStatus::Queued => "Task queued for processing...",
            ReportedStatus::Processing => "Generating explanations...",
            ReportedStatus::Completed => "Processing complete!",
            ReportedStatus::Failed => "Processing failed",
            ReportedStatus::Other(_) => "Processing...",
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ReportedStatus::Queued => "queued",
            ReportedStatus::Processing => "processing",
            ReportedStatus::Completed => "completed",
            ReportedStatus::Failed => "failed",
            ReportedStatus::Other(s) => s,
        }
    }
}

/// Progress snapshot derived from one status report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressUpdate {
    pub task_id: String,
    pub attempt: u32,
    pub status: String,
    pub percent: u8,
    pub text: String,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDecision {
    /// Issue one status query.
    Query { attempt: u32 },
    /// The ceiling was exceeded; stop scheduling ticks.
    TimedOut { attempts: u32 },
    /// Already terminal; nothing to do.
    Stopped,
}

pub const DEFAULT_FAILURE_MESSAGE: &str = "Task failed to complete";

#[derive(Debug, Clone)]
pub struct PollMachine {
    state: PollState,
    attempts: u32,
    max_attempts: u32,
}

impl PollMachine {
    pub fn new(max_attempts: u32) -> Self {
        Self { state: PollState::Idle, attempts: 0, max_attempts }
    }

    pub fn state(&self) -> &PollState {
        &self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// `Idle -> Polling`, on a successful job start.
    pub fn start(&mut self) {
        if self.state == PollState::Idle {
            self.state = PollState::Polling;
        }
    }

    pub fn on_tick(&mut self) -> TickDecision {
        if self.state != PollState::Polling {
            return TickDecision::Stopped;
        }
        self.attempts += 1;
        if self.attempts > self.max_attempts {
            self.state = PollState::TimedOut;
            return TickDecision::TimedOut { attempts: self.attempts - 1 };
        }
        TickDecision::Query { attempt: self.attempts }
    }

    /// Applies one successful status report to the machine and the job.
    ///
    /// Ignored unless polling, so a late report can never move a terminal
    /// machine.
    pub fn on_status(
        &mut self,
        job: &mut AnalysisJob,
        status: &str,
        progress: Option<&str>,
        error: Option<&str>,
    ) -> Option<ProgressUpdate> {
        if self.state != PollState::Polling {
            return None;
        }
        let reported = ReportedStatus::parse(status);

        job.last_reported = Some(status.to_string());
        if let Some(detail) = progress {
            job.progress_detail = Some(detail.to_string());
        }
        match &reported {
            ReportedStatus::Queued => job.status = JobStatus::Queued,
            ReportedStatus::Processing => job.status = JobStatus::Processing,
            ReportedStatus::Completed => {
                job.status = JobStatus::Completed;
                self.state = PollState::Completed;
            }
            ReportedStatus::Failed => {
                let msg = error
                    .filter(|e| !e.is_empty())
                    .unwrap_or(DEFAULT_FAILURE_MESSAGE)
                    .to_string();
                job.status = JobStatus::Failed;
                job.error = Some(msg.clone());
                self.state = PollState::Failed { error: msg };
            }
            ReportedStatus::Other(_) => {}
        }

        Some(ProgressUpdate {
            task_id: job.task_id.clone(),
            attempt: self.attempts,
            status: reported.as_str().to_string(),
            percent: reported.percent(),
            text: reported.text().to_string(),
            detail: job.progress_detail.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn polling(max: u32) -> (PollMachine, AnalysisJob) {
        let mut m = PollMachine::new(max);
        m.start();
        (m, AnalysisJob::new("t-1"))
    }

    #[test]
    fn idle_machine_does_not_query() {
        let mut m = PollMachine::new(3);
        assert_eq!(m.on_tick(), TickDecision::Stopped);
        assert_eq!(m.attempts(), 0);
    }

    #[test]
    fn queued_processing_completed() {
        let (mut m, mut job) = polling(10);
        assert_eq!(m.on_tick(), TickDecision::Query { attempt: 1 });
        let p = m.on_status(&mut job, "queued", None, None).unwrap();
        assert_eq!(p.percent, 10);
        assert_eq!(*m.state(), PollState::Polling);

        m.on_tick();
        let p = m.on_status(&mut job, "processing", Some("SHAP 2/4"), None).unwrap();
        assert_eq!(p.percent, 50);
        assert_eq!(p.detail.as_deref(), Some("SHAP 2/4"));
        assert_eq!(job.status, JobStatus::Processing);

        m.on_tick();
        let p = m.on_status(&mut job, "completed", None, None).unwrap();
        assert_eq!(p.percent, 100);
        assert_eq!(*m.state(), PollState::Completed);
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(m.on_tick(), TickDecision::Stopped);
    }

    #[test]
    fn failed_uses_server_text_or_default() {
        let (mut m, mut job) = polling(10);
        m.on_tick();
        m.on_status(&mut job, "failed", None, Some("model incompatible"));
        assert_eq!(*m.state(), PollState::Failed { error: "model incompatible".into() });
        assert_eq!(job.error.as_deref(), Some("model incompatible"));

        let (mut m, mut job) = polling(10);
        m.on_tick();
        m.on_status(&mut job, "failed", None, None);
        assert_eq!(*m.state(), PollState::Failed { error: DEFAULT_FAILURE_MESSAGE.into() });
    }

    #[test]
    fn unknown_status_stays_polling_at_quarter() {
        let (mut m, mut job) = polling(10);
        m.on_tick();
        m.on_status(&mut job, "queued", None, None);
        m.on_tick();
        let p = m.on_status(&mut job, "warming_up", None, None).unwrap();
        assert_eq!(p.percent, 25);
        assert_eq!(p.text, "Processing...");
        assert_eq!(*m.state(), PollState::Polling);
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.last_reported.as_deref(), Some("warming_up"));
    }

    #[test]
    fn ceiling_is_exclusive() {
        let (mut m, _job) = polling(3);
        for i in 1..=3 {
            assert_eq!(m.on_tick(), TickDecision::Query { attempt: i });
        }
        assert_eq!(m.on_tick(), TickDecision::TimedOut { attempts: 3 });
        assert_eq!(*m.state(), PollState::TimedOut);
        assert_eq!(m.on_tick(), TickDecision::Stopped);
    }

    #[test]
    fn terminal_machine_ignores_late_reports() {
        let (mut m, mut job) = polling(10);
        m.on_tick();
        m.on_status(&mut job, "failed", None, Some("boom"));
        assert!(m.on_status(&mut job, "completed", None, None).is_none());
        assert_eq!(job.status, JobStatus::Failed);
    }
}
