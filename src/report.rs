//! Plain-text rendering of a [`DisplayModel`] for terminals.

use std::fmt::Write;

use crate::render::{Block, DisplayModel, FeaturePanel, Section};

const BAR_WIDTH: f64 = 30.0;

fn bar(width_pct: f64) -> String {
    let cells = ((width_pct / 100.0) * BAR_WIDTH).round().clamp(0.0, BAR_WIDTH) as usize;
    "█".repeat(cells)
}

fn heading(out: &mut String, title: &str) {
    let _ = writeln!(out, "\n{}\n{}", title, "-".repeat(title.chars().count()));
}

fn section<T>(out: &mut String, title: &str, s: &Section<T>, body: impl FnOnce(&mut String, &T)) {
    heading(out, title);
    match s {
        Section::Ready(t) => body(out, t),
        Section::Empty { message } => {
            let _ = writeln!(out, "  {}", message);
        }
        Section::Unavailable { reason } => {
            let _ = writeln!(out, "  {}", reason);
        }
    }
}

fn feature_chart(out: &mut String, panel: &FeaturePanel) {
    let name_w = panel.chart.iter().map(|b| b.name.chars().count()).max().unwrap_or(0);
    for b in &panel.chart {
        let _ = writeln!(out, "  {:<w$}  {:<30}  {}", b.name, bar(b.width_pct), b.label, w = name_w);
    }
}

fn strip_emphasis(text: &str) -> String {
    text.replace("**", "").replace('`', "")
}

pub fn to_text(model: &DisplayModel) -> String {
    let mut out = String::new();
    let s = &model.summary;

    heading(&mut out, "Summary");
    let _ = writeln!(out, "  Model type:        {}", s.model_type);
    let _ = writeln!(out, "  Samples processed: {}", s.samples);
    let _ = writeln!(out, "  Predictions:       {}", s.prediction_count);
    let _ = writeln!(out, "  Average fidelity:  {}", s.avg_fidelity_display);

    section(&mut out, "Predictions", &model.predictions, |out, p| {
        let _ = writeln!(out, "  count {}  mean {}  std {}  min {}  max {}", p.count, p.mean, p.std, p.min, p.max);
        if !p.sample.is_empty() {
            let _ = writeln!(out, "  sample: {}", p.sample.join(", "));
        }
    });

    section(&mut out, "Prediction distribution", &model.histogram, |out, h| {
        for b in &h.bins {
            let _ = writeln!(out, "  {:>10}  {:<30}  {}", b.label, bar(b.height_pct), b.count);
        }
    });

    section(&mut out, "SHAP feature importance", &model.shap, feature_chart);
    section(&mut out, "LIME local explanation", &model.lime, |out, p| {
        for r in &p.list {
            let _ = writeln!(out, "  {:>9}  {}", r.display, r.name);
        }
    });
    section(&mut out, "Permutation importance", &model.permutation, feature_chart);

    section(&mut out, "Feature interactions", &model.interactions, |out, p| {
        for b in &p.chart {
            let _ = writeln!(out, "  {:<30}  {:.4}  {}", bar(b.width_pct), b.strength, b.pair);
        }
        if p.list.len() > p.chart.len() {
            let _ = writeln!(out, "  ({} more)", p.list.len() - p.chart.len());
        }
    });

    heading(&mut out, "Business explanation");
    for block in &model.business {
        match block {
            Block::Heading { text, .. } => {
                let _ = writeln!(out, "\n  {}", strip_emphasis(text).to_uppercase());
            }
            Block::ListItem { text } => {
                let _ = writeln!(out, "   • {}", strip_emphasis(text));
            }
            Block::Paragraph { text } => {
                let _ = writeln!(out, "  {}", strip_emphasis(text));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AnalysisResult;
    use crate::render::render;
    use serde_json::json;

    #[test]
    fn bars_scale_to_width() {
        assert_eq!(bar(100.0).chars().count(), 30);
        assert_eq!(bar(50.0).chars().count(), 15);
        assert_eq!(bar(0.0), "");
    }

    #[test]
    fn report_lists_sections_and_placeholders() {
        let result: AnalysisResult = serde_json::from_value(json!({
            "model_info": {"type": "LogisticRegression"},
            "explanations": {
                "shap": {"status": "success", "global_feature_importance": [0.4, -0.1],
                         "feature_names": ["income", "age"]}
            },
            "business_explanation": "## Drivers\n- **income** dominates"
        }))
        .unwrap();

        let text = to_text(&render(&result));

        assert!(text.contains("Model type:        LogisticRegression"));
        assert!(text.contains("Average fidelity:  N/A"));
        assert!(text.contains("income"));
        assert!(text.contains("LIME analysis not available or failed."));
        assert!(text.contains("DRIVERS"));
        assert!(text.contains("• income dominates"));
    }
}
