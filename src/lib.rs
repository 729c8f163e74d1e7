//! Client core for a remote model-explainability service: upload a model
//! and dataset, start an explanation job, poll it to completion and shape
//! the result into a display model.

pub mod api;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod job;
pub mod logging;
pub mod model;
pub mod poll;
pub mod render;
pub mod report;
pub mod session;
pub mod testing;
pub mod upload;

pub use api::{AnalysisApi, HttpApi};
pub use config::Config;
pub use dashboard::{Dashboard, UiEvent};
pub use error::DashboardError;
pub use render::{render, DisplayModel};
