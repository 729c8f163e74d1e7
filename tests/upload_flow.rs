//! Uploads from disk and the rendered report of a full scripted run.

use std::fs;
use std::sync::Arc;

use mlexplain::api::{AssetFile, UploadReceipt};
use mlexplain::config::Config;
use mlexplain::dashboard::{Dashboard, IndicatorState, IndicatorTarget, UiEvent};
use mlexplain::error::{DashboardError, TransportError};
use mlexplain::model::AssetKind;
use mlexplain::render::Section;
use mlexplain::report;
use mlexplain::testing::{sample_result, ScriptedApi};
use mlexplain::upload::sha256_hex;

#[tokio::test]
async fn wrong_extension_never_reaches_network() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.txt");
    fs::write(&path, b"not a pickle").unwrap();

    let api = Arc::new(ScriptedApi::new());
    let (mut dash, _rx) = Dashboard::new(api.clone(), Config::default());

    let err = dash.upload_path(AssetKind::Model, &path).await.unwrap_err();

    assert!(matches!(err, DashboardError::Validation(ref m) if m.contains("Please select a .pkl or .joblib file")));
    assert_eq!(api.upload_calls(), 0);
    assert!(dash.session().model.is_none());
}

#[tokio::test]
async fn oversized_dataset_never_reaches_network() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("huge.csv");
    fs::File::create(&path).unwrap().set_len(10 * 1024 * 1024 + 1).unwrap();

    let api = Arc::new(ScriptedApi::new());
    let (mut dash, _rx) = Dashboard::new(api.clone(), Config::default());

    let err = dash.upload_path(AssetKind::Dataset, &path).await.unwrap_err();

    assert!(matches!(err, DashboardError::Validation(ref m) if m.contains("less than 10MB")));
    assert_eq!(api.upload_calls(), 0);
}

#[tokio::test]
async fn upload_from_disk_records_digest_and_shape() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("train.csv");
    fs::write(&path, "age,income\n40,52000\n").unwrap();

    let api = Arc::new(ScriptedApi::new().with_upload(Ok(UploadReceipt {
        id: "ds-77".into(),
        filename: "train.csv".into(),
        size_bytes: None,
        shape: Some((1, 2)),
    })));
    let (mut dash, _rx) = Dashboard::new(api, Config::default());

    let asset = dash.upload_path(AssetKind::Dataset, &path).await.unwrap();

    assert_eq!(asset.id, "ds-77");
    assert_eq!(asset.shape, Some((1, 2)));
    assert_eq!(asset.size_bytes, 20);
    assert_eq!(asset.sha256, sha256_hex(b"age,income\n40,52000\n"));
    assert_eq!(dash.session().dataset_id(), Some("ds-77"));
}

#[tokio::test]
async fn server_rejection_surfaces_detail_and_clears_indicator() {
    let api = Arc::new(
        ScriptedApi::new().with_upload(Err(TransportError::http(400, Some("Unsupported pickle protocol".into())))),
    );
    let (mut dash, mut rx) = Dashboard::new(api, Config::default());

    let err = dash
        .upload(AssetKind::Model, AssetFile::new("model.pkl", vec![1, 2, 3]))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Unsupported pickle protocol");
    let mut last_indicator = None;
    while let Ok(ev) = rx.try_recv() {
        if let UiEvent::Indicator { target: IndicatorTarget::Model, state, .. } = ev {
            last_indicator = Some(state);
        }
    }
    assert_eq!(last_indicator, Some(IndicatorState::Inactive));
}

#[tokio::test(start_paused = true)]
async fn scripted_run_produces_full_report() {
    let api = Arc::new(
        ScriptedApi::new()
            .with_statuses(&["queued", "processing", "completed"])
            .with_result(Ok(sample_result())),
    );
    let (mut dash, _rx) = Dashboard::new(api, Config::default());
    dash.upload(AssetKind::Model, AssetFile::new("m.pkl", vec![0; 8])).await.unwrap();
    dash.upload(AssetKind::Dataset, AssetFile::new("d.csv", vec![b'x'; 8])).await.unwrap();
    dash.generate().await.unwrap();

    let model = dash.run_job().await.unwrap();

    let shap = model.shap.ready().unwrap();
    let order: Vec<_> = shap.list.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(order, vec!["income", "credit_score", "tenure", "age", "region"]);
    let lime = model.lime.ready().unwrap();
    assert_eq!(lime.list[0].name, "income");
    assert!(matches!(model.interactions, Section::Ready(_)));
    assert_eq!(model.histogram.ready().unwrap().total(), 10);
    assert_eq!(model.summary.avg_fidelity_display, "87.5%");

    let text = report::to_text(&model);
    assert!(text.contains("RandomForestClassifier"));
    assert!(text.contains("income ↔ credit_score"));
    assert!(text.contains("KEY DRIVERS"));
}
