//! Chart descriptions handed to the UI.
//!
//! A [`ChartSpec`] is data, not pixels: the chart kind, axis fields, the
//! series that was computed, and a plotly-style `figure` object the front
//! end can render as-is.

use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
    Scatter,
    Histogram,
}

impl ChartKind {
    /// Picks the chart kind named in a lowercased query; bar by default.
    pub fn from_query(query_lower: &str) -> Self {
        let has = |words: &[&str]| words.iter().any(|w| query_lower.contains(w));
        if has(&["bar", "column"]) {
            ChartKind::Bar
        } else if has(&["line", "trend"]) {
            ChartKind::Line
        } else if has(&["pie"]) {
            ChartKind::Pie
        } else if has(&["scatter"]) {
            ChartKind::Scatter
        } else if has(&["histogram", "distribution"]) {
            ChartKind::Histogram
        } else {
            ChartKind::Bar
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
            ChartKind::Pie => "pie",
            ChartKind::Scatter => "scatter",
            ChartKind::Histogram => "histogram",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartSpec {
    pub chart_type: ChartKind,
    pub title: String,
    pub x_column: Option<String>,
    pub y_column: Option<String>,
    /// Category-axis values (empty for histograms).
    pub labels: Vec<Value>,
    pub values: Vec<Value>,
    pub figure: Value,
}

impl ChartSpec {
    pub fn new(
        chart_type: ChartKind,
        title: String,
        x_column: Option<String>,
        y_column: Option<String>,
        labels: Vec<Value>,
        values: Vec<Value>,
    ) -> Self {
        let x_title = x_column.clone().unwrap_or_else(|| "index".to_string());
        let y_title = y_column.clone().unwrap_or_else(|| "count".to_string());
        let trace = match chart_type {
            ChartKind::Bar => json!({ "type": "bar", "x": labels, "y": values }),
            ChartKind::Line => json!({ "type": "scatter", "mode": "lines", "x": labels, "y": values }),
            ChartKind::Scatter => {
                json!({ "type": "scatter", "mode": "markers", "x": labels, "y": values })
            }
            ChartKind::Pie => json!({ "type": "pie", "labels": labels, "values": values }),
            ChartKind::Histogram => json!({ "type": "histogram", "x": values }),
        };
        let figure = json!({
            "data": [trace],
            "layout": {
                "title": { "text": title },
                "xaxis": { "title": { "text": x_title } },
                "yaxis": { "title": { "text": y_title } },
            }
        });
        Self {
            chart_type,
            title,
            x_column,
            y_column,
            labels,
            values,
            figure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_keywords_in_priority_order() {
        assert_eq!(ChartKind::from_query("bar chart of sales"), ChartKind::Bar);
        assert_eq!(ChartKind::from_query("line plot of revenue"), ChartKind::Line);
        assert_eq!(ChartKind::from_query("pie of region"), ChartKind::Pie);
        assert_eq!(ChartKind::from_query("scatter units"), ChartKind::Scatter);
        assert_eq!(ChartKind::from_query("distribution of age"), ChartKind::Histogram);
        assert_eq!(ChartKind::from_query("plot revenue"), ChartKind::Bar);
    }

    #[test]
    fn pie_figure_uses_labels_and_values() {
        let c = ChartSpec::new(
            ChartKind::Pie,
            "Distribution of Region".into(),
            Some("Region".into()),
            None,
            vec![json!("North"), json!("South")],
            vec![json!(2), json!(1)],
        );
        assert_eq!(c.figure["data"][0]["type"], "pie");
        assert_eq!(c.figure["data"][0]["labels"][0], "North");
        assert_eq!(c.figure["layout"]["title"]["text"], "Distribution of Region");
    }
}
