//! Pure transformation of an [`AnalysisResult`] into a display model.
//!
//! Nothing here performs I/O beyond logging. Each explanation section is
//! decoded independently: a failed or malformed analysis renders its own
//! placeholder and leaves the others intact.

pub mod explanation;
pub mod features;
pub mod histogram;
pub mod summary;

use serde::Serialize;

use crate::logging::{self, obj, v_num, v_str, Domain};
use crate::model::AnalysisResult;

pub use explanation::Block;
pub use features::{FeatureBar, FeaturePanel, FeatureRow, InteractionBar, InteractionPanel, InteractionRow};
pub use histogram::{Histogram, HistogramBin};
pub use summary::{average_fidelity, PredictionPanel, Summary};

/// One renderable section: content, an empty-state message, or the reason
/// the underlying analysis is missing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Section<T> {
    Ready(T),
    Empty { message: String },
    Unavailable { reason: String },
}

impl<T> Section<T> {
    pub fn empty(message: &str) -> Self {
        Section::Empty { message: message.to_string() }
    }

    pub fn unavailable(reason: &str) -> Self {
        Section::Unavailable { reason: reason.to_string() }
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Section::Ready(t) => Some(t),
            _ => None,
        }
    }

    pub fn placeholder(&self) -> Option<&str> {
        match self {
            Section::Ready(_) => None,
            Section::Empty { message } => Some(message.as_str()),
            Section::Unavailable { reason } => Some(reason.as_str()),
        }
    }

    fn state(&self) -> &'static str {
        match self {
            Section::Ready(_) => "ready",
            Section::Empty { .. } => "empty",
            Section::Unavailable { .. } => "unavailable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayModel {
    pub summary: Summary,
    pub predictions: Section<PredictionPanel>,
    pub histogram: Section<Histogram>,
    pub shap: Section<FeaturePanel>,
    pub lime: Section<FeaturePanel>,
    pub permutation: Section<FeaturePanel>,
    pub interactions: Section<InteractionPanel>,
    pub business: Vec<Block>,
}

pub fn render(result: &AnalysisResult) -> DisplayModel {
    let ex = &result.explanations;

    let (predictions, histogram) = match &result.predictions {
        Some(p) => {
            let samples = p.sample.as_deref().unwrap_or_default();
            let histogram = match histogram::build(samples) {
                Some(h) => Section::Ready(h),
                None => Section::empty("No prediction samples available"),
            };
            let panel = match summary::prediction_panel(p) {
                Some(panel) => Section::Ready(panel),
                None => Section::unavailable("Prediction data not available"),
            };
            (panel, histogram)
        }
        None => (
            Section::unavailable("Prediction data not available"),
            Section::unavailable("Prediction data not available"),
        ),
    };

    let model = DisplayModel {
        summary: summary::summarize(result),
        predictions,
        histogram,
        shap: features::shap(ex.shap.as_ref()),
        lime: features::lime(ex.lime.as_ref()),
        permutation: features::permutation(ex.permutation_importance.as_ref()),
        interactions: features::interactions(ex.feature_interaction.as_ref()),
        business: explanation::blocks(result.business_explanation.as_deref()),
    };

    logging::debug(
        Domain::Render,
        "rendered",
        obj(&[
            ("model_type", v_str(&model.summary.model_type)),
            ("samples", v_num(model.summary.samples as f64)),
            ("shap", v_str(model.shap.state())),
            ("lime", v_str(model.lime.state())),
            ("permutation", v_str(model.permutation.state())),
            ("interactions", v_str(model.interactions.state())),
        ]),
    );
    model
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_result() -> AnalysisResult {
        serde_json::from_value(json!({
            "model_info": {"type": "GradientBoostingClassifier"},
            "dataset_info": {"processed_samples": 500},
            "predictions": {
                "count": 500,
                "statistics": {"mean": 0.42, "std": 0.1, "min": 0.0, "max": 1.0},
                "sample": [0.1, 0.2, 0.9, 0.95]
            },
            "explanations": {
                "shap": {"status": "success", "global_feature_importance": [0.02, -0.09, 0.09],
                         "feature_names": ["f1", "f2", "f3"]},
                "lime": {"status": "success", "explanations": [{"error": "boom"}]},
                "permutation_importance": {"status": "error"}
            },
            "fidelity_scores": {"shap": 0.8, "lime": 0.6, "note": "n/a"},
            "business_explanation": "## Summary\nIncome drives approvals."
        }))
        .unwrap()
    }

    #[test]
    fn renders_each_section_independently() {
        let model = render(&sample_result());

        assert_eq!(model.summary.model_type, "GradientBoostingClassifier");
        assert_eq!(model.summary.avg_fidelity_display, "70.0%");

        let shap = model.shap.ready().unwrap();
        let order: Vec<_> = shap.list.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(order, vec!["f3", "f2", "f1"]);

        assert_eq!(model.lime.placeholder(), Some("LIME explanation contains errors."));
        assert!(matches!(model.permutation, Section::Unavailable { .. }));
        assert!(matches!(model.interactions, Section::Unavailable { .. }));
        assert_eq!(model.histogram.ready().unwrap().total(), 4);
        assert_eq!(model.business.len(), 2);
    }

    #[test]
    fn empty_result_renders_placeholders() {
        let model = render(&AnalysisResult::default());
        assert_eq!(model.predictions.placeholder(), Some("Prediction data not available"));
        assert!(model.shap.placeholder().is_some());
        assert_eq!(model.business, vec![Block::Paragraph { text: explanation::NO_EXPLANATION.into() }]);
    }

    #[test]
    fn display_model_serializes_with_section_state() {
        let value = serde_json::to_value(render(&sample_result())).unwrap();
        assert_eq!(value["lime"]["state"], "unavailable");
        assert_eq!(value["shap"]["state"], "ready");
        assert_eq!(value["shap"]["list"][0]["name"], "f3");
    }
}
