//! Feature-importance and interaction sections.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

use super::Section;

pub const LIST_LIMIT: usize = 10;
pub const CHART_LIMIT: usize = 15;
pub const INTERACTION_CHART_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRow {
    pub name: String,
    pub importance: f64,
    pub display: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureBar {
    pub name: String,
    pub importance: f64,
    pub std: Option<f64>,
    pub width_pct: f64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeaturePanel {
    pub list: Vec<FeatureRow>,
    pub chart: Vec<FeatureBar>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionRow {
    pub feature_1: String,
    pub feature_2: String,
    pub strength: f64,
    pub display: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionBar {
    pub pair: String,
    pub strength: f64,
    pub width_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionPanel {
    pub list: Vec<InteractionRow>,
    pub chart: Vec<InteractionBar>,
}

/// A named importance value with its optional spread.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored {
    pub name: String,
    pub value: f64,
    pub std: Option<f64>,
}

/// Orders by descending magnitude. Equal magnitudes put the positive value
/// first; exact duplicates keep their input order.
///
/// The sign tie-break exists so that `{f1: 0.02, f2: -0.09, f3: 0.09}`
/// ranks as `[f3, f2, f1]` regardless of map order. A plain stable sort on
/// magnitude alone would let the incoming key order decide between `f2`
/// and `f3`.
pub fn rank_by_magnitude(items: &mut [Scored]) {
    items.sort_by(|a, b| {
        b.value
            .abs()
            .total_cmp(&a.value.abs())
            .then_with(|| b.value.total_cmp(&a.value))
    });
}

fn width_pct(value: f64, max: f64) -> f64 {
    if max > 0.0 && value.is_finite() {
        (value / max) * 100.0
    } else {
        0.0
    }
}

fn panel(mut items: Vec<Scored>, signed_list: bool, signed_chart: bool) -> FeaturePanel {
    rank_by_magnitude(&mut items);

    let list = items
        .iter()
        .take(LIST_LIMIT)
        .map(|s| {
            let shown = if signed_list { s.value } else { s.value.abs() };
            FeatureRow { name: s.name.clone(), importance: s.value, display: format!("{:.4}", shown) }
        })
        .collect();

    let top = &items[..items.len().min(CHART_LIMIT)];
    let max = top.iter().map(|s| s.value.abs()).fold(0.0, f64::max);
    let chart = top
        .iter()
        .map(|s| {
            let shown = if signed_chart { s.value } else { s.value.abs() };
            let label = match s.std {
                Some(std) => format!("{:.4} ± {:.4}", shown, std),
                None => format!("{:.4}", shown),
            };
            FeatureBar {
                name: s.name.clone(),
                importance: s.value,
                std: s.std,
                width_pct: width_pct(s.value.abs(), max),
                label,
            }
        })
        .collect();

    FeaturePanel { list, chart }
}

fn succeeded(raw: &Value) -> bool {
    raw.get("status").and_then(Value::as_str) == Some("success")
}

// =============================================================================
// SHAP
// =============================================================================

#[derive(Debug, Deserialize)]
struct ShapAnalysis {
    #[serde(default)]
    global_feature_importance: Vec<f64>,
    #[serde(default)]
    feature_names: Vec<String>,
}

pub fn shap(raw: Option<&Value>) -> Section<FeaturePanel> {
    const UNAVAILABLE: &str = "SHAP analysis not available or failed.";
    let Some(raw) = raw.filter(|r| succeeded(r)) else {
        return Section::unavailable(UNAVAILABLE);
    };
    let Ok(shap) = serde_json::from_value::<ShapAnalysis>(raw.clone()) else {
        return Section::unavailable(UNAVAILABLE);
    };
    if shap.global_feature_importance.is_empty() || shap.feature_names.is_empty() {
        return Section::empty("No SHAP feature importance data available.");
    }

    let items = shap
        .global_feature_importance
        .iter()
        .enumerate()
        .map(|(i, v)| Scored {
            name: shap.feature_names.get(i).cloned().unwrap_or_else(|| format!("Feature {}", i)),
            value: *v,
            std: None,
        })
        .collect();
    Section::Ready(panel(items, false, false))
}

// =============================================================================
// Permutation importance
// =============================================================================

#[derive(Debug, Deserialize)]
struct RankedFeature {
    feature: String,
    importance: f64,
    #[serde(default)]
    std: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PermutationAnalysis {
    #[serde(default)]
    ranked_features: Vec<RankedFeature>,
}

pub fn permutation(raw: Option<&Value>) -> Section<FeaturePanel> {
    const UNAVAILABLE: &str = "Permutation importance analysis not available or failed.";
    let Some(raw) = raw.filter(|r| succeeded(r)) else {
        return Section::unavailable(UNAVAILABLE);
    };
    let Ok(perm) = serde_json::from_value::<PermutationAnalysis>(raw.clone()) else {
        return Section::unavailable(UNAVAILABLE);
    };
    if perm.ranked_features.is_empty() {
        return Section::empty("No permutation importance data available.");
    }

    let items = perm
        .ranked_features
        .into_iter()
        .map(|f| Scored { name: f.feature, value: f.importance, std: f.std })
        .collect();
    Section::Ready(panel(items, false, true))
}

// =============================================================================
// LIME
// =============================================================================

pub fn lime(raw: Option<&Value>) -> Section<FeaturePanel> {
    let Some(raw) = raw.filter(|r| succeeded(r)) else {
        return Section::unavailable("LIME analysis not available or failed.");
    };
    let first = raw.get("explanations").and_then(Value::as_array).and_then(|a| a.first());
    let Some(first) = first else {
        return Section::empty("No LIME explanations available.");
    };

    const BROKEN: &str = "LIME explanation contains errors.";
    let Some(weights) = first.as_object() else {
        return Section::unavailable(BROKEN);
    };
    if weights.get("error").is_some_and(|e| !e.is_null()) {
        return Section::unavailable(BROKEN);
    }

    let items: Vec<Scored> = weights
        .iter()
        .filter_map(|(name, v)| v.as_f64().map(|value| Scored { name: name.clone(), value, std: None }))
        .collect();
    if items.is_empty() {
        return Section::empty("No LIME explanations available.");
    }
    Section::Ready(panel(items, true, true))
}

// =============================================================================
// Feature interactions
// =============================================================================

#[derive(Debug, Deserialize)]
struct Interaction {
    feature_1: String,
    feature_2: String,
    interaction_strength: f64,
}

#[derive(Debug, Deserialize)]
struct InteractionAnalysis {
    #[serde(default)]
    top_interactions: Vec<Interaction>,
}

pub fn interactions(raw: Option<&Value>) -> Section<InteractionPanel> {
    const UNAVAILABLE: &str = "Feature interaction analysis not available or failed.";
    let Some(raw) = raw.filter(|r| succeeded(r)) else {
        return Section::unavailable(UNAVAILABLE);
    };
    let Ok(analysis) = serde_json::from_value::<InteractionAnalysis>(raw.clone()) else {
        return Section::unavailable(UNAVAILABLE);
    };
    if analysis.top_interactions.is_empty() {
        return Section::empty("No feature interactions found.");
    }

    let list = analysis
        .top_interactions
        .iter()
        .map(|i| InteractionRow {
            feature_1: i.feature_1.clone(),
            feature_2: i.feature_2.clone(),
            strength: i.interaction_strength,
            display: format!("{:.4}", i.interaction_strength),
        })
        .collect();

    let top = &analysis.top_interactions[..analysis.top_interactions.len().min(INTERACTION_CHART_LIMIT)];
    let max = top
        .iter()
        .map(|i| i.interaction_strength)
        .max_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
        .unwrap_or(0.0);
    let chart = top
        .iter()
        .map(|i| InteractionBar {
            pair: format!("{} ↔ {}", i.feature_1, i.feature_2),
            strength: i.interaction_strength,
            width_pct: width_pct(i.interaction_strength, max),
        })
        .collect();

    Section::Ready(InteractionPanel { list, chart })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names(items: &[Scored]) -> Vec<&str> {
        items.iter().map(|s| s.name.as_str()).collect()
    }

    fn scored(name: &str, value: f64) -> Scored {
        Scored { name: name.to_string(), value, std: None }
    }

    #[test]
    fn magnitude_beats_sign() {
        let mut items = vec![scored("f1", 0.02), scored("f2", -0.09), scored("f3", 0.09)];
        rank_by_magnitude(&mut items);
        assert_eq!(names(&items), vec!["f3", "f2", "f1"]);
    }

    #[test]
    fn sign_tie_break_ignores_input_order() {
        let mut forward = vec![scored("f2", -0.09), scored("f3", 0.09), scored("f1", 0.02)];
        let mut reversed = vec![scored("f1", 0.02), scored("f3", 0.09), scored("f2", -0.09)];
        rank_by_magnitude(&mut forward);
        rank_by_magnitude(&mut reversed);
        assert_eq!(names(&forward), vec!["f3", "f2", "f1"]);
        assert_eq!(names(&reversed), names(&forward));
    }

    #[test]
    fn exact_ties_keep_input_order() {
        let mut items = vec![scored("a", 0.5), scored("b", 0.1), scored("c", 0.5), scored("d", -0.7)];
        rank_by_magnitude(&mut items);
        assert_eq!(names(&items), vec!["d", "a", "c", "b"]);
    }

    #[test]
    fn shap_lists_top_ten_and_charts_top_fifteen() {
        let values: Vec<f64> = (0..20).map(|i| i as f64 / 100.0).collect();
        let names: Vec<String> = (0..20).map(|i| format!("x{}", i)).collect();
        let raw = json!({"status": "success", "global_feature_importance": values, "feature_names": names});

        let Section::Ready(panel) = shap(Some(&raw)) else { panic!("expected ready") };

        assert_eq!(panel.list.len(), 10);
        assert_eq!(panel.chart.len(), 15);
        assert_eq!(panel.list[0].name, "x19");
        assert_eq!(panel.chart[0].width_pct, 100.0);
        assert_eq!(panel.list[0].display, "0.1900");
    }

    #[test]
    fn shap_names_missing_features_by_index() {
        let raw = json!({"status": "success", "global_feature_importance": [-0.3, 0.1], "feature_names": ["age"]});
        let Section::Ready(panel) = shap(Some(&raw)) else { panic!("expected ready") };
        assert_eq!(panel.list[0].name, "age");
        assert_eq!(panel.list[0].display, "0.3000");
        assert_eq!(panel.list[1].name, "Feature 1");
    }

    #[test]
    fn shap_failed_or_missing_is_unavailable() {
        assert!(matches!(shap(None), Section::Unavailable { .. }));
        let raw = json!({"status": "error", "error": "TreeExplainer failed"});
        assert!(matches!(shap(Some(&raw)), Section::Unavailable { .. }));
        let raw = json!({"status": "success", "global_feature_importance": "garbage"});
        assert!(matches!(shap(Some(&raw)), Section::Unavailable { .. }));
        let raw = json!({"status": "success", "global_feature_importance": [], "feature_names": []});
        assert!(matches!(shap(Some(&raw)), Section::Empty { .. }));
    }

    #[test]
    fn permutation_sorts_and_labels_spread() {
        let raw = json!({"status": "success", "ranked_features": [
            {"feature": "a", "importance": 0.01, "std": 0.002},
            {"feature": "b", "importance": -0.2, "std": 0.01},
        ]});
        let Section::Ready(panel) = permutation(Some(&raw)) else { panic!("expected ready") };
        assert_eq!(panel.list[0].name, "b");
        assert_eq!(panel.list[0].display, "0.2000");
        assert_eq!(panel.chart[0].label, "-0.2000 ± 0.0100");
        assert!((panel.chart[1].width_pct - 5.0).abs() < 1e-9);
    }

    #[test]
    fn lime_uses_first_explanation_only() {
        let raw = json!({"status": "success", "explanations": [
            {"age": 0.1, "income": -0.4},
            {"zip": 9.0},
        ]});
        let Section::Ready(panel) = lime(Some(&raw)) else { panic!("expected ready") };
        let names: Vec<_> = panel.list.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["income", "age"]);
        assert_eq!(panel.list[0].display, "-0.4000");
    }

    #[test]
    fn lime_error_marker_fails_despite_success_status() {
        let raw = json!({"status": "success", "explanations": [{"error": "kernel died"}, {"a": 1.0}]});
        assert_eq!(lime(Some(&raw)), Section::unavailable("LIME explanation contains errors."));
        let raw = json!({"status": "success", "explanations": []});
        assert!(matches!(lime(Some(&raw)), Section::Empty { .. }));
    }

    #[test]
    fn interactions_chart_scaled_to_strongest() {
        let raw = json!({"status": "success", "top_interactions": [
            {"feature_1": "a", "feature_2": "b", "interaction_strength": 0.5},
            {"feature_1": "a", "feature_2": "c", "interaction_strength": 0.25},
        ]});
        let Section::Ready(panel) = interactions(Some(&raw)) else { panic!("expected ready") };
        assert_eq!(panel.list.len(), 2);
        assert_eq!(panel.chart[0].pair, "a ↔ b");
        assert_eq!(panel.chart[1].width_pct, 50.0);
        assert!(matches!(interactions(None), Section::Unavailable { .. }));
    }
}
