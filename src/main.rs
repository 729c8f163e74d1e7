//! Command-line front end for the explanation service.
//!
//! Usage:
//!   mlexplain <command> [args] [--json]
//!
//! Commands:
//!   probe                         - Check API connectivity
//!   run <model> <dataset>         - Upload, explain, poll and print results
//!   status <task_id>              - Print the current status of a task
//!   results <task_id>             - Fetch and print results of a completed task
//!   demo                          - Full run against a scripted in-memory API
//!
//! Ctrl-C while polling cancels the job loop.

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::sync::Arc;

use mlexplain::api::{AnalysisApi, AssetFile, HttpApi};
use mlexplain::dashboard::{ConnectionStatus, Dashboard, ToastLevel, UiEvent};
use mlexplain::error::DashboardError;
use mlexplain::logging::{self, obj, v_str, Domain};
use mlexplain::model::{AssetKind, JobStatus};
use mlexplain::poll::ReportedStatus;
use mlexplain::render::{render, DisplayModel};
use mlexplain::session::Session;
use mlexplain::testing::{sample_result, ScriptedApi};
use mlexplain::{job, report, Config};

enum Assets {
    Paths { model: PathBuf, dataset: PathBuf },
    InMemory { model: AssetFile, dataset: AssetFile },
}

fn print_usage() {
    eprintln!("Usage: mlexplain <command> [args] [--json]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  probe                    Check API connectivity");
    eprintln!("  run <model> <dataset>    Upload, generate explanations, print results");
    eprintln!("  status <task_id>         Print task status");
    eprintln!("  results <task_id>        Fetch results of a completed task");
    eprintln!("  demo                     Run against a scripted in-memory API");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  API_BASE_URL             Service base URL (default http://127.0.0.1:8000)");
    eprintln!("  POLL_INTERVAL_MS         Poll period (default 2000)");
    eprintln!("  MAX_POLL_ATTEMPTS        Poll ceiling (default 150)");
}

fn print_event(ev: &UiEvent) {
    match ev {
        UiEvent::Progress(p) => eprintln!("  [{:>3}%] {}", p.percent, p.text),
        UiEvent::Toast { level, title, message } => {
            let tag = match level {
                ToastLevel::Info => "info",
                ToastLevel::Success => "ok",
                ToastLevel::Error => "error",
            };
            eprintln!("  ({}) {}: {}", tag, title, message);
        }
        UiEvent::Connection(ConnectionStatus::Connected { version, .. }) => {
            eprintln!("  API connected (version {})", version.as_deref().unwrap_or("unknown"));
        }
        UiEvent::Connection(ConnectionStatus::Offline { reason, .. }) => {
            eprintln!("  API offline: {}", reason);
        }
        _ => {}
    }
}

fn print_model(model: &DisplayModel, as_json: bool) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(model)?);
    } else {
        print!("{}", report::to_text(model));
    }
    Ok(())
}

async fn run_dashboard(api: Arc<dyn AnalysisApi>, cfg: Config, assets: Assets, as_json: bool) -> Result<()> {
    let (mut dash, mut rx) = Dashboard::new(api, cfg);
    let printer = tokio::spawn(async move {
        while let Some(ev) = rx.recv().await {
            print_event(&ev);
        }
    });

    dash.probe().await;
    dash.start_background_refresh();

    let outcome: Result<DisplayModel, DashboardError> = async {
        match assets {
            Assets::Paths { model, dataset } => {
                dash.upload_path(AssetKind::Model, &model).await?;
                dash.upload_path(AssetKind::Dataset, &dataset).await?;
            }
            Assets::InMemory { model, dataset } => {
                dash.upload(AssetKind::Model, model).await?;
                dash.upload(AssetKind::Dataset, dataset).await?;
            }
        }
        let task_id = dash.generate().await?;
        eprintln!("  task {}", task_id);

        let canceller = dash.canceller();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                canceller.cancel();
            }
        });

        match dash.run_job().await {
            Err(DashboardError::ResultFetch { .. }) => dash.refetch_results().await,
            other => other,
        }
    }
    .await;

    dash.shutdown();
    drop(dash);
    let _ = printer.await;

    print_model(&outcome?, as_json)
}

async fn cmd_probe(cfg: Config) -> Result<()> {
    let api: Arc<dyn AnalysisApi> = Arc::new(HttpApi::new(&cfg)?);
    let (dash, _rx) = Dashboard::new(api, cfg);
    match dash.probe().await {
        ConnectionStatus::Connected { version, checked_at } => {
            println!("connected  version={}  at={}", version.as_deref().unwrap_or("unknown"), checked_at);
            Ok(())
        }
        ConnectionStatus::Offline { reason, .. } => bail!("API offline: {}", reason),
        ConnectionStatus::Unknown => bail!("API status unknown"),
    }
}

async fn cmd_status(cfg: Config, task_id: &str, as_json: bool) -> Result<()> {
    let api = HttpApi::new(&cfg)?;
    let report = api
        .task_status(task_id)
        .await
        .map_err(|e| DashboardError::transport(e, "Failed to fetch task status"))?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    let status = ReportedStatus::parse(&report.status);
    println!("{}  {}  {}% {}", task_id, status.as_str(), status.percent(), status.text());
    if let Some(progress) = &report.progress {
        println!("  progress: {}", progress);
    }
    if let Some(error) = &report.error {
        println!("  error: {}", error);
    }
    Ok(())
}

async fn cmd_results(cfg: Config, task_id: &str, as_json: bool) -> Result<()> {
    let api = HttpApi::new(&cfg)?;
    let mut session = Session::new();
    session.begin_job(task_id).status = JobStatus::Completed;
    let result = job::fetch_results_with_retry(&api, &mut session, &cfg.fetch_retry()).await?;
    print_model(&render(result), as_json)
}

async fn cmd_demo(as_json: bool) -> Result<()> {
    let cfg = Config { poll_interval_ms: 300, ..Config::from_env() };
    let api: Arc<dyn AnalysisApi> = Arc::new(
        ScriptedApi::new()
            .with_statuses(&["queued", "processing", "processing", "completed"])
            .with_result(Ok(sample_result())),
    );
    let assets = Assets::InMemory {
        model: AssetFile::new("demo_model.pkl", vec![0x80, 0x04, 0x95]),
        dataset: AssetFile::new("demo_data.csv", b"age,income\n42,51000\n".to_vec()),
    };
    run_dashboard(api, cfg, assets, as_json).await
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let as_json = args.iter().any(|a| a == "--json");
    let positional: Vec<&str> = args
        .iter()
        .skip(1)
        .filter(|a| !a.starts_with("--"))
        .map(String::as_str)
        .collect();

    let cfg = Config::from_env();
    logging::info(
        Domain::System,
        "cli_start",
        obj(&[("command", v_str(positional.first().copied().unwrap_or("")))]),
    );

    match positional.as_slice() {
        ["probe"] => cmd_probe(cfg).await,
        ["run", model, dataset] => {
            let api: Arc<dyn AnalysisApi> = Arc::new(HttpApi::new(&cfg)?);
            let assets = Assets::Paths { model: PathBuf::from(*model), dataset: PathBuf::from(*dataset) };
            run_dashboard(api, cfg, assets, as_json).await
        }
        ["status", task_id] => cmd_status(cfg, task_id, as_json).await,
        ["results", task_id] => cmd_results(cfg, task_id, as_json).await,
        ["demo"] => cmd_demo(as_json).await,
        _ => {
            print_usage();
            std::process::exit(1);
        }
    }
}
