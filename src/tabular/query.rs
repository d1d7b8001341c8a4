//! Keyword-dispatched queries over a single dataset.
//!
//! The lowercased query is matched against trigger words in a fixed
//! priority order: aggregation, count, visualization, trend, ranking,
//! filter, and finally a general profile answer. Columns are addressed by
//! substring: a column is "mentioned" when its lowercased name occurs
//! anywhere in the query.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use super::chart::{ChartKind, ChartSpec};
use super::dataset::{parse_datetime, Cell, Column, ColumnKind, Dataset, DatasetProfile};
use crate::error::TabularError;

static INTEGER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("static regex"));

const DEFAULT_RANK_N: usize = 5;
const BAR_CATEGORIES: usize = 10;
const PIE_SLICES: usize = 8;
const LINE_ROWS: usize = 100;
const SCATTER_ROWS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    Sum,
    Mean,
    Max,
    Min,
}

impl Aggregate {
    fn from_query(q: &str) -> Option<Self> {
        let has = |words: &[&str]| words.iter().any(|w| q.contains(w));
        if has(&["total", "sum", "add"]) {
            Some(Aggregate::Sum)
        } else if has(&["average", "mean", "avg"]) {
            Some(Aggregate::Mean)
        } else if has(&["maximum", "max", "highest"]) {
            Some(Aggregate::Max)
        } else if has(&["minimum", "min", "lowest"]) {
            Some(Aggregate::Min)
        } else {
            None
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Aggregate::Sum => "sum",
            Aggregate::Mean => "mean",
            Aggregate::Max => "max",
            Aggregate::Min => "min",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            Aggregate::Sum => "Sum",
            Aggregate::Mean => "Mean",
            Aggregate::Max => "Max",
            Aggregate::Min => "Min",
        }
    }
}

/// Result of a tabular query, tagged by `query_type`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "query_type", rename_all = "snake_case")]
pub enum TabularAnswer {
    Aggregation {
        message: String,
        operation: Aggregate,
        #[serde(skip_serializing_if = "Option::is_none")]
        column: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        results: Option<Map<String, Value>>,
    },
    Count {
        message: String,
        result: usize,
    },
    Visualization {
        message: String,
        chart_data: ChartSpec,
    },
    Trend {
        message: String,
        chart_data: ChartSpec,
    },
    Ranking {
        message: String,
        column: String,
        result: Vec<Map<String, Value>>,
    },
    Filter {
        message: String,
        suggestion: String,
    },
    General {
        message: String,
        info: DatasetProfile,
    },
}

impl TabularAnswer {
    pub fn message(&self) -> &str {
        match self {
            TabularAnswer::Aggregation { message, .. }
            | TabularAnswer::Count { message, .. }
            | TabularAnswer::Visualization { message, .. }
            | TabularAnswer::Trend { message, .. }
            | TabularAnswer::Ranking { message, .. }
            | TabularAnswer::Filter { message, .. }
            | TabularAnswer::General { message, .. } => message,
        }
    }
}

/// Answers `query` against `ds`.
pub fn answer(ds: &Dataset, query: &str) -> Result<TabularAnswer, TabularError> {
    let q = query.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| q.contains(w));

    if let Some(op) = Aggregate::from_query(&q) {
        Ok(aggregation(ds, &q, op))
    } else if has(&["count", "number of"]) {
        Ok(count(ds))
    } else if has(&["plot", "chart", "graph", "visualize", "show"]) {
        visualization(ds, &q)
    } else if has(&["trend", "over time", "timeline"]) {
        trend(ds)
    } else if has(&["top", "bottom", "rank"]) {
        ranking(ds, query, &q)
    } else if has(&["filter", "where", "condition"]) {
        Ok(TabularAnswer::Filter {
            message: "Filter functionality would require more specific query parsing".to_string(),
            suggestion: "Please specify exact filter conditions".to_string(),
        })
    } else {
        Ok(TabularAnswer::General {
            message: "Here's general information about your dataset".to_string(),
            info: ds.profile(),
        })
    }
}

fn aggregation(ds: &Dataset, q: &str, op: Aggregate) -> TabularAnswer {
    match ds.mentioned_columns(q).next().filter(|c| c.is_numeric()) {
        Some(col) => {
            let (value, json) = aggregate(col, op);
            TabularAnswer::Aggregation {
                message: format!(
                    "The {} of {} is {}",
                    op.as_str(),
                    col.name,
                    format_number(value)
                ),
                operation: op,
                column: Some(col.name.clone()),
                result: Some(json),
                results: None,
            }
        }
        None => {
            let results = ds
                .columns_of(ColumnKind::Numeric)
                .map(|c| (c.name.clone(), aggregate(c, op).1))
                .collect();
            TabularAnswer::Aggregation {
                message: format!("{} values for all numeric columns", op.title()),
                operation: op,
                column: None,
                result: None,
                results: Some(results),
            }
        }
    }
}

/// Computes `op` over the non-missing values of a numeric column. Integer
/// columns keep integer sums and extremes; empty columns give NaN except for
/// the sum, which is zero.
fn aggregate(col: &Column, op: Aggregate) -> (f64, Value) {
    if col.is_integral() && op != Aggregate::Mean {
        let ints = col.cells.iter().filter_map(|c| match c {
            Cell::Int(i) => Some(*i),
            _ => None,
        });
        let v = match op {
            Aggregate::Sum => Some(ints.fold(0i64, |acc, i| acc.saturating_add(i))),
            Aggregate::Max => ints.max(),
            _ => ints.min(),
        };
        return match v {
            Some(i) => (i as f64, Value::from(i)),
            None => (f64::NAN, Value::Null),
        };
    }

    let values: Vec<f64> = col.numeric_values().map(|(_, v)| v).collect();
    let v: f64 = match op {
        Aggregate::Sum => values.iter().sum(),
        Aggregate::Mean if values.is_empty() => f64::NAN,
        Aggregate::Mean => values.iter().sum::<f64>() / values.len() as f64,
        Aggregate::Max => values.iter().copied().reduce(f64::max).unwrap_or(f64::NAN),
        Aggregate::Min => values.iter().copied().reduce(f64::min).unwrap_or(f64::NAN),
    };
    (v, float_json(v))
}

fn float_json(v: f64) -> Value {
    serde_json::Number::from_f64(v)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn count(ds: &Dataset) -> TabularAnswer {
    TabularAnswer::Count {
        message: format!("Total number of records: {}", group_thousands(&ds.row_count.to_string())),
        result: ds.row_count,
    }
}

fn ranking(ds: &Dataset, query: &str, q: &str) -> Result<TabularAnswer, TabularError> {
    let n = INTEGER
        .find(query)
        .and_then(|m| m.as_str().parse::<usize>().ok())
        .unwrap_or(DEFAULT_RANK_N);
    let ascending = q.contains("bottom") || q.contains("lowest");

    let col = ds
        .mentioned_columns(q)
        .next()
        .or_else(|| ds.columns_of(ColumnKind::Numeric).next())
        .ok_or_else(|| {
            TabularError::ColumnResolution("Could not identify column for ranking".to_string())
        })?;
    if !col.is_numeric() {
        return Err(TabularError::ColumnResolution(format!(
            "Column '{}' is not numeric and cannot be ranked",
            col.name
        )));
    }

    let mut rows: Vec<(usize, f64)> = col.numeric_values().collect();
    // Stable sort: equal values keep first-seen order.
    rows.sort_by(|a, b| {
        let ord = a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal);
        if ascending {
            ord
        } else {
            ord.reverse()
        }
    });
    rows.truncate(n);

    Ok(TabularAnswer::Ranking {
        message: format!(
            "{} {} records by {}",
            if ascending { "Bottom" } else { "Top" },
            n,
            col.name
        ),
        column: col.name.clone(),
        result: rows.iter().map(|(row, _)| ds.record(*row)).collect(),
    })
}

fn visualization(ds: &Dataset, q: &str) -> Result<TabularAnswer, TabularError> {
    let kind = ChartKind::from_query(q);
    let mentioned: Vec<&Column> = ds.mentioned_columns(q).collect();

    let (x, y) = match mentioned.as_slice() {
        [] => {
            let text = ds.columns.iter().find(|c| !c.is_numeric());
            let mut numeric = ds.columns_of(ColumnKind::Numeric);
            match (text, numeric.next(), numeric.next()) {
                (Some(t), Some(n), _) => (Some(t), Some(n)),
                (None, Some(a), Some(b)) => (Some(a), Some(b)),
                _ => {
                    return Err(TabularError::ColumnResolution(
                        "Unable to determine appropriate columns for visualization".to_string(),
                    ))
                }
            }
        }
        [only] if only.is_numeric() => (None, Some(*only)),
        [only] => (Some(*only), None),
        [first, second, ..] => (Some(*first), Some(*second)),
    };

    let chart = build_chart(ds, kind, x, y)?;
    Ok(TabularAnswer::Visualization {
        message: format!("Generated {} chart", kind.as_str()),
        chart_data: chart,
    })
}

fn build_chart(
    ds: &Dataset,
    kind: ChartKind,
    x: Option<&Column>,
    y: Option<&Column>,
) -> Result<ChartSpec, TabularError> {
    let x_name = x.map(|c| c.name.clone());
    let y_name = y.map(|c| c.name.clone());
    let x_label = x_name.clone().unwrap_or_else(|| "index".to_string());

    if kind == ChartKind::Histogram {
        let Some(col) = y.or(x) else {
            return Err(no_columns());
        };
        let values = col
            .cells
            .iter()
            .filter(|c| !c.is_missing())
            .map(Cell::to_json)
            .collect();
        let title = format!("Distribution of {}", col.name);
        return Ok(ChartSpec::new(kind, title, x_name, y_name, Vec::new(), values));
    }

    let Some(y) = y else {
        // Category axis only: plot value counts.
        let Some(x) = x else {
            return Err(no_columns());
        };
        let limit = if kind == ChartKind::Pie { PIE_SLICES } else { BAR_CATEGORIES };
        let (labels, values) = value_counts(x, limit);
        let title = match kind {
            ChartKind::Pie => format!("Distribution of {}", x.name),
            _ => format!("Count of {}", x.name),
        };
        return Ok(ChartSpec::new(kind, title, x_name, None, labels, values));
    };

    if !y.is_numeric() {
        return Err(TabularError::ColumnResolution(format!(
            "Column '{}' is not numeric and cannot be plotted",
            y.name
        )));
    }

    let (labels, values, title) = match kind {
        ChartKind::Bar | ChartKind::Pie => {
            let limit = if kind == ChartKind::Bar { BAR_CATEGORIES } else { PIE_SLICES };
            let (labels, values) = match x {
                Some(x) => group_sum(x, y, limit),
                None => rows_of(ds, None, y, limit),
            };
            let title = if kind == ChartKind::Bar {
                format!("{} by {}", y.name, x_label)
            } else {
                format!("{} distribution by {}", y.name, x_label)
            };
            (labels, values, title)
        }
        ChartKind::Line => {
            let (labels, values) = rows_of(ds, x, y, LINE_ROWS);
            (labels, values, format!("{} over {}", y.name, x_label))
        }
        _ => {
            let (labels, values) = rows_of(ds, x, y, SCATTER_ROWS);
            (labels, values, format!("{} vs {}", y.name, x_label))
        }
    };
    Ok(ChartSpec::new(kind, title, x_name, y_name, labels, values))
}

fn no_columns() -> TabularError {
    TabularError::ColumnResolution("Unable to determine appropriate columns for visualization".to_string())
}

/// First `limit` rows as (x value or row position, y value) pairs.
fn rows_of(ds: &Dataset, x: Option<&Column>, y: &Column, limit: usize) -> (Vec<Value>, Vec<Value>) {
    (0..ds.row_count.min(limit))
        .map(|row| {
            let label = match x {
                Some(x) => x.cells[row].to_json(),
                None => Value::from(row),
            };
            (label, y.cells[row].to_json())
        })
        .unzip()
}

/// Top `limit` values by frequency; ties keep first-seen order.
fn value_counts(col: &Column, limit: usize) -> (Vec<Value>, Vec<Value>) {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<(&Cell, usize)> = Vec::new();
    for cell in col.cells.iter().filter(|c| !c.is_missing()) {
        match seen.get(&cell.display()) {
            Some(&i) => counts[i].1 += 1,
            None => {
                seen.insert(cell.display(), counts.len());
                counts.push((cell, 1));
            }
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .into_iter()
        .take(limit)
        .map(|(cell, n)| (cell.to_json(), Value::from(n)))
        .unzip()
}

/// Sum of `y` per distinct `x`, keys sorted ascending, first `limit` groups.
fn group_sum(x: &Column, y: &Column, limit: usize) -> (Vec<Value>, Vec<Value>) {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(&Cell, f64)> = Vec::new();
    for (key, value) in x.cells.iter().zip(y.cells.iter()) {
        if key.is_missing() {
            continue;
        }
        let idx = *seen.entry(key.display()).or_insert_with(|| {
            groups.push((key, 0.0));
            groups.len() - 1
        });
        if let Some(v) = value.as_f64() {
            groups[idx].1 += v;
        }
    }

    if x.is_numeric() {
        groups.sort_by(|a, b| {
            let (ka, kb) = (a.0.as_f64().unwrap_or(f64::NAN), b.0.as_f64().unwrap_or(f64::NAN));
            ka.partial_cmp(&kb).unwrap_or(Ordering::Equal)
        });
    } else {
        groups.sort_by_key(|(k, _)| k.display());
    }

    let integral = y.is_integral();
    groups
        .into_iter()
        .take(limit)
        .map(|(k, sum)| {
            let v = if integral { Value::from(sum as i64) } else { float_json(sum) };
            (k.to_json(), v)
        })
        .unzip()
}

fn trend(ds: &Dataset) -> Result<TabularAnswer, TabularError> {
    let date_col = ds
        .columns_of(ColumnKind::Datetime)
        .next()
        .ok_or(TabularError::NoTemporalColumn)?;
    let value_col = ds
        .columns_of(ColumnKind::Numeric)
        .next()
        .ok_or(TabularError::NoNumericColumn)?;

    let mut order: Vec<(usize, Option<NaiveDateTime>)> = date_col
        .cells
        .iter()
        .enumerate()
        .map(|(row, c)| match c {
            Cell::Text(s) => (row, parse_datetime(s)),
            _ => (row, None),
        })
        .collect();
    // Unparseable dates sort last; the sort is stable.
    order.sort_by(|a, b| match (a.1, b.1) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    let (labels, values) = order
        .iter()
        .map(|(row, _)| (date_col.cells[*row].to_json(), value_col.cells[*row].to_json()))
        .unzip();

    let chart = ChartSpec::new(
        ChartKind::Line,
        format!("{} Trend Over Time", value_col.name),
        Some(date_col.name.clone()),
        Some(value_col.name.clone()),
        labels,
        values,
    );
    Ok(TabularAnswer::Trend {
        message: format!("Generated trend analysis for {} over time", value_col.name),
        chart_data: chart,
    })
}

/// Formats like `{:,.2f}`: two decimals and comma thousands separators.
pub fn format_number(v: f64) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let fixed = format!("{:.2}", v.abs());
    let (int_part, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let sign = if v.is_sign_negative() { "-" } else { "" };
    format!("{}{}.{}", sign, group_thousands(int_part), frac)
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
