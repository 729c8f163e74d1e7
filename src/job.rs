//! Job orchestration: start a job from the uploaded assets, fetch its
//! results once it completes, and reset the job slot.

use crate::api::retry::{retry_async, RetryConfig};
use crate::api::AnalysisApi;
use crate::error::{DashboardError, Result};
use crate::logging::{self, obj, v_str, Domain};
use crate::model::{AnalysisResult, JobStatus};
use crate::session::Session;

/// Starts an explanation job for the session's model and dataset.
///
/// On success the session tracks a fresh `Queued` job and any previous
/// result is gone.
pub async fn start_job<A: AnalysisApi + ?Sized>(api: &A, session: &mut Session) -> Result<String> {
    let (model_id, dataset_id) = match (session.model_id(), session.dataset_id()) {
        (Some(m), Some(d)) => (m.to_string(), d.to_string()),
        _ => {
            return Err(DashboardError::Precondition(
                "Please upload both a model and dataset".to_string(),
            ))
        }
    };

    logging::info(
        Domain::Job,
        "job_starting",
        obj(&[("model_id", v_str(&model_id)), ("dataset_id", v_str(&dataset_id))]),
    );

    let task_id = api.start_explanations(&model_id, &dataset_id).await.map_err(|e| {
        logging::error(Domain::Job, "job_start_failed", obj(&[("error", v_str(&e.to_string()))]));
        DashboardError::transport_with_status(e)
    })?;

    session.begin_job(task_id.clone());
    logging::info(Domain::Job, "job_started", obj(&[("task_id", v_str(&task_id))]));
    Ok(task_id)
}

fn completed_task_id(session: &Session) -> Result<String> {
    match &session.job {
        Some(job) if job.status == JobStatus::Completed => Ok(job.task_id.clone()),
        Some(job) => Err(DashboardError::Precondition(format!(
            "task {} has not completed (status {:?})",
            job.task_id, job.status
        ))),
        None => Err(DashboardError::Precondition("no analysis job has been started".to_string())),
    }
}

/// Fetches the result payload of the session's completed job.
///
/// A failure leaves the job `Completed`; calling again re-issues the fetch
/// without restarting anything.
pub async fn fetch_results<'s, A: AnalysisApi + ?Sized>(
    api: &A,
    session: &'s mut Session,
) -> Result<&'s AnalysisResult> {
    let task_id = completed_task_id(session)?;
    let result = api.results(&task_id).await.map_err(|e| result_fetch_error(&task_id, e))?;
    Ok(store_result(session, &task_id, result))
}

/// [`fetch_results`] with backoff between attempts.
pub async fn fetch_results_with_retry<'s, A: AnalysisApi + ?Sized>(
    api: &A,
    session: &'s mut Session,
    retry: &RetryConfig,
) -> Result<&'s AnalysisResult> {
    let task_id = completed_task_id(session)?;
    let result = retry_async(retry, "fetch_results", || api.results(&task_id))
        .await
        .map_err(|e| result_fetch_error(&task_id, e))?;
    Ok(store_result(session, &task_id, result))
}

fn result_fetch_error(task_id: &str, err: crate::error::TransportError) -> DashboardError {
    logging::error(
        Domain::Job,
        "results_fetch_failed",
        obj(&[("task_id", v_str(task_id)), ("error", v_str(&err.to_string()))]),
    );
    DashboardError::ResultFetch {
        task_id: task_id.to_string(),
        message: err.message_or("Failed to load results"),
    }
}

fn store_result<'s>(session: &'s mut Session, task_id: &str, result: AnalysisResult) -> &'s AnalysisResult {
    logging::info(Domain::Job, "results_loaded", obj(&[("task_id", v_str(task_id))]));
    session.result.insert(result)
}

/// Forgets the current job and result; uploaded assets stay.
pub fn reset_job(session: &mut Session) {
    if let Some(task_id) = session.task_id() {
        logging::info(Domain::Job, "job_reset", obj(&[("task_id", v_str(task_id))]));
    }
    session.clear_job();
}
