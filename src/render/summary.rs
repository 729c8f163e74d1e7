//! Headline cards and the predictions panel.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::model::{AnalysisResult, Predictions};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub model_type: String,
    pub samples: u64,
    pub prediction_count: u64,
    pub avg_fidelity: Option<f64>,
    pub avg_fidelity_display: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionPanel {
    pub count: u64,
    pub mean: String,
    pub std: String,
    pub min: String,
    pub max: String,
    pub sample: Vec<String>,
}

/// Mean of the finite numeric fidelity scores; non-numeric entries are
/// skipped. `None` when nothing numeric remains.
pub fn average_fidelity(scores: &Map<String, Value>) -> Option<f64> {
    let numeric: Vec<f64> = scores
        .values()
        .filter_map(Value::as_f64)
        .filter(|v| v.is_finite())
        .collect();
    if numeric.is_empty() {
        None
    } else {
        Some(numeric.iter().sum::<f64>() / numeric.len() as f64)
    }
}

pub fn summarize(result: &AnalysisResult) -> Summary {
    let avg_fidelity = average_fidelity(&result.fidelity_scores);
    Summary {
        model_type: result
            .model_info
            .model_type
            .clone()
            .unwrap_or_else(|| "Unknown".to_string()),
        samples: result.dataset_info.processed_samples.unwrap_or(0),
        prediction_count: result.predictions.as_ref().and_then(|p| p.count).unwrap_or(0),
        avg_fidelity,
        avg_fidelity_display: match avg_fidelity {
            Some(f) => format!("{:.1}%", f * 100.0),
            None => "N/A".to_string(),
        },
    }
}

fn stat(v: Option<f64>) -> String {
    match v {
        Some(v) => format!("{:.3}", v),
        None => "N/A".to_string(),
    }
}

/// `None` when the payload carries no statistics block.
pub fn prediction_panel(predictions: &Predictions) -> Option<PredictionPanel> {
    let stats = predictions.statistics?;
    Some(PredictionPanel {
        count: predictions.count.unwrap_or(0),
        mean: stat(stats.mean),
        std: stat(stats.std),
        min: stat(stats.min),
        max: stat(stats.max),
        sample: predictions
            .sample
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|v| format!("{:.3}", v))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PredictionStatistics;
    use serde_json::json;

    fn scores(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn fidelity_skips_non_numeric() {
        let avg = average_fidelity(&scores(json!({"a": 0.8, "b": 0.6, "c": "n/a"}))).unwrap();
        assert!((avg - 0.7).abs() < 1e-12);
    }

    #[test]
    fn fidelity_absent_without_numbers() {
        assert_eq!(average_fidelity(&Map::new()), None);
        assert_eq!(average_fidelity(&scores(json!({"x": null, "y": "bad"}))), None);
    }

    #[test]
    fn summary_defaults() {
        let s = summarize(&AnalysisResult::default());
        assert_eq!(s.model_type, "Unknown");
        assert_eq!(s.samples, 0);
        assert_eq!(s.prediction_count, 0);
        assert_eq!(s.avg_fidelity_display, "N/A");
    }

    #[test]
    fn summary_formats_fidelity_as_percent() {
        let mut result = AnalysisResult::default();
        result.fidelity_scores = scores(json!({"lime": 0.9234}));
        assert_eq!(summarize(&result).avg_fidelity_display, "92.3%");
    }

    #[test]
    fn prediction_stats_fall_back_to_na() {
        let p = Predictions {
            count: Some(2),
            statistics: Some(PredictionStatistics { mean: Some(0.51234), ..Default::default() }),
            sample: Some(vec![0.1, 0.9]),
        };
        let panel = prediction_panel(&p).unwrap();
        assert_eq!(panel.mean, "0.512");
        assert_eq!(panel.std, "N/A");
        assert_eq!(panel.sample, vec!["0.100", "0.900"]);
    }

    #[test]
    fn missing_statistics_has_no_panel() {
        let p = Predictions { count: Some(2), statistics: None, sample: None };
        assert!(prediction_panel(&p).is_none());
    }
}
