use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::cancel::CancelSignal;
use super::machine::{PollMachine, PollState, ProgressUpdate, ReportedStatus, TickDecision};
use crate::api::AnalysisApi;
use crate::config::PollConfig;
use crate::error::DashboardError;
use crate::logging::{self, obj, v_num, v_str, Domain};
use crate::model::AnalysisJob;

/// How a poll loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Completed,
    Failed(String),
    TimedOut { attempts: u32 },
    Cancelled,
}

impl PollOutcome {
    pub fn into_result(self) -> Result<(), DashboardError> {
        match self {
            PollOutcome::Completed => Ok(()),
            PollOutcome::Failed(msg) => Err(DashboardError::ServerReportedFailure(msg)),
            PollOutcome::TimedOut { attempts } => Err(DashboardError::Timeout { attempts }),
            PollOutcome::Cancelled => Err(DashboardError::Cancelled),
        }
    }
}

/// Polls `job` until it reaches a terminal state, the attempt ceiling is
/// exceeded, or `cancel` fires.
///
/// The first query goes out one `period` after the call. Transient errors
/// are logged and skipped; they count toward the ceiling. A response that
/// arrives after cancellation is dropped without touching `job`.
pub async fn drive<A, F>(
    api: &A,
    job: &mut AnalysisJob,
    cfg: PollConfig,
    mut cancel: CancelSignal,
    mut on_progress: F,
) -> PollOutcome
where
    A: AnalysisApi + ?Sized,
    F: FnMut(&ProgressUpdate),
{
    let task_id = job.task_id.clone();
    let mut machine = PollMachine::new(cfg.max_attempts);
    machine.start();

    let mut ticker = interval_at(Instant::now() + cfg.period, cfg.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    logging::info(
        Domain::Poll,
        "poll_started",
        obj(&[
            ("task_id", v_str(&task_id)),
            ("period_ms", v_num(cfg.period.as_millis() as f64)),
            ("max_attempts", v_num(cfg.max_attempts as f64)),
        ]),
    );

    loop {
        if cancel.is_cancelled() {
            return cancelled(&task_id, machine.attempts());
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return cancelled(&task_id, machine.attempts()),
            _ = ticker.tick() => {}
        }

        let attempt = match machine.on_tick() {
            TickDecision::Query { attempt } => attempt,
            TickDecision::TimedOut { attempts } => {
                logging::error(
                    Domain::Poll,
                    "poll_timed_out",
                    obj(&[("task_id", v_str(&task_id)), ("attempts", v_num(attempts as f64))]),
                );
                return PollOutcome::TimedOut { attempts };
            }
            TickDecision::Stopped => return PollOutcome::Cancelled,
        };

        let report = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                logging::debug(
                    Domain::Poll,
                    "in_flight_discarded",
                    obj(&[("task_id", v_str(&task_id)), ("attempt", v_num(attempt as f64))]),
                );
                return cancelled(&task_id, attempt);
            }
            report = api.task_status(&task_id) => report,
        };

        match report {
            Ok(report) => {
                if let Some(update) = machine.on_status(
                    job,
                    &report.status,
                    report.progress.as_deref(),
                    report.error.as_deref(),
                ) {
                    if let ReportedStatus::Other(raw) = ReportedStatus::parse(&report.status) {
                        logging::warn(
                            Domain::Poll,
                            "unrecognized_status",
                            obj(&[("task_id", v_str(&task_id)), ("status", v_str(&raw))]),
                        );
                    }
                    on_progress(&update);
                }
                match machine.state() {
                    PollState::Completed => {
                        logging::info(
                            Domain::Poll,
                            "poll_completed",
                            obj(&[("task_id", v_str(&task_id)), ("attempts", v_num(attempt as f64))]),
                        );
                        return PollOutcome::Completed;
                    }
                    PollState::Failed { error } => {
                        logging::error(
                            Domain::Poll,
                            "task_failed",
                            obj(&[("task_id", v_str(&task_id)), ("error", v_str(error))]),
                        );
                        return PollOutcome::Failed(error.clone());
                    }
                    _ => {}
                }
            }
            Err(err) => {
                logging::debug(
                    Domain::Poll,
                    "poll_error",
                    obj(&[
                        ("task_id", v_str(&task_id)),
                        ("attempt", v_num(attempt as f64)),
                        ("error", v_str(&err.to_string())),
                    ]),
                );
                if attempt % 10 == 0 {
                    logging::warn(
                        Domain::Poll,
                        "polling_degraded",
                        obj(&[
                            ("task_id", v_str(&task_id)),
                            ("attempt", v_num(attempt as f64)),
                            ("msg", v_str("polling issues detected, continuing")),
                        ]),
                    );
                }
            }
        }
    }
}

fn cancelled(task_id: &str, attempts: u32) -> PollOutcome {
    logging::info(
        Domain::Poll,
        "poll_cancelled",
        obj(&[("task_id", v_str(task_id)), ("attempts", v_num(attempts as f64))]),
    );
    PollOutcome::Cancelled
}
