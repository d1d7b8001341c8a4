//! In-memory rectangular datasets and column type inference.
//!
//! Raw cells arrive as strings (from CSV or XLSX). Each column is then
//! classified once:
//!
//! - **numeric**: every non-missing value parses as a number. A column with
//!   no values at all is numeric too.
//! - **datetime**: not numeric, and the non-missing values among the first
//!   five rows (at least one) all parse as dates.
//! - **categorical**: everything else.
//!
//! Missing values are empty cells and the usual NA markers.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::{Map, Value};

const NA_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Rows inspected when deciding whether a text column holds dates.
const DATETIME_SAMPLE: usize = 5;
/// Rows included in a profile's `sample_data`.
const PROFILE_SAMPLE_ROWS: usize = 3;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%m-%d-%Y", "%d.%m.%Y", "%Y%m%d", "%b %d, %Y",
    "%B %d, %Y", "%d %b %Y", "%d %B %Y", "%b %d %Y", "%B %d %Y",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Int(i64),
    Float(f64),
    Text(String),
    Missing,
}

impl Cell {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) if !f.is_nan() => Some(*f),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        match self {
            Cell::Missing => true,
            Cell::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    /// Label used for grouping and chart categories.
    pub fn display(&self) -> String {
        match self {
            Cell::Int(i) => i.to_string(),
            Cell::Float(f) => f.to_string(),
            Cell::Text(s) => s.clone(),
            Cell::Missing => String::new(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Cell::Int(i) => Value::from(*i),
            Cell::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Cell::Text(s) => Value::String(s.clone()),
            Cell::Missing => Value::Null,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Datetime,
    Categorical,
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub cells: Vec<Cell>,
}

impl Column {
    pub fn is_numeric(&self) -> bool {
        self.kind == ColumnKind::Numeric
    }

    pub fn missing_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_missing()).count()
    }

    /// True when every present value is an integer.
    pub fn is_integral(&self) -> bool {
        self.cells
            .iter()
            .all(|c| matches!(c, Cell::Int(_) | Cell::Missing))
    }

    /// Non-missing numeric values with their row positions.
    pub fn numeric_values(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter_map(|(row, c)| c.as_f64().map(|v| (row, v)))
    }
}

/// Column-type partition and preview of a dataset.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DatasetProfile {
    pub file_name: String,
    /// `[rows, columns]`
    pub shape: (usize, usize),
    pub columns: Vec<String>,
    pub numeric_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
    pub datetime_columns: Vec<String>,
    pub missing_values: Map<String, Value>,
    pub sample_data: Vec<Map<String, Value>>,
}

#[derive(Debug, Clone)]
pub struct Dataset {
    pub name: String,
    pub columns: Vec<Column>,
    pub row_count: usize,
}

impl Dataset {
    /// Builds a dataset from a header row and raw string rows.
    ///
    /// Short rows are padded with missing cells and long rows truncated to
    /// the header width.
    pub fn from_raw(name: &str, header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let header = dedupe_headers(header);
        let width = header.len();
        let row_count = rows.len();

        let mut raw_columns: Vec<Vec<String>> = vec![Vec::with_capacity(row_count); width];
        for row in rows {
            let mut row = row.into_iter();
            for col in raw_columns.iter_mut() {
                col.push(row.next().unwrap_or_default());
            }
        }

        let columns = header
            .into_iter()
            .zip(raw_columns)
            .map(|(name, raw)| infer_column(name, raw))
            .collect();

        Self {
            name: name.to_string(),
            columns,
            row_count,
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn columns_of(&self, kind: ColumnKind) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(move |c| c.kind == kind)
    }

    /// Columns whose lowercased name occurs in `query_lower`, in column
    /// order.
    pub fn mentioned_columns<'a>(&'a self, query_lower: &'a str) -> impl Iterator<Item = &'a Column> {
        self.columns
            .iter()
            .filter(move |c| query_lower.contains(&c.name.to_lowercase()))
    }

    /// One row as an ordered `column → value` record.
    pub fn record(&self, row: usize) -> Map<String, Value> {
        self.columns
            .iter()
            .map(|c| {
                let v = c.cells.get(row).map(Cell::to_json).unwrap_or(Value::Null);
                (c.name.clone(), v)
            })
            .collect()
    }

    pub fn profile(&self) -> DatasetProfile {
        let names_of = |kind: ColumnKind| -> Vec<String> {
            self.columns_of(kind).map(|c| c.name.clone()).collect()
        };
        DatasetProfile {
            file_name: self.name.clone(),
            shape: (self.row_count, self.columns.len()),
            columns: self.columns.iter().map(|c| c.name.clone()).collect(),
            numeric_columns: names_of(ColumnKind::Numeric),
            categorical_columns: names_of(ColumnKind::Categorical),
            datetime_columns: names_of(ColumnKind::Datetime),
            missing_values: self
                .columns
                .iter()
                .map(|c| (c.name.clone(), Value::from(c.missing_count())))
                .collect(),
            sample_data: (0..self.row_count.min(PROFILE_SAMPLE_ROWS))
                .map(|row| self.record(row))
                .collect(),
        }
    }
}

/// Empty headers become `Unnamed: {i}`; repeats get `.1`, `.2`, ...
fn dedupe_headers(header: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(header.len());
    for (i, raw) in header.into_iter().enumerate() {
        let base = if raw.trim().is_empty() {
            format!("Unnamed: {}", i)
        } else {
            raw
        };
        let mut candidate = base.clone();
        let mut n = 1;
        while out.contains(&candidate) {
            candidate = format!("{}.{}", base, n);
            n += 1;
        }
        out.push(candidate);
    }
    out
}

pub fn is_na(raw: &str) -> bool {
    NA_MARKERS.contains(&raw.trim())
}

fn parse_number(raw: &str) -> Option<Cell> {
    let s = raw.trim();
    if let Ok(i) = s.parse::<i64>() {
        return Some(Cell::Int(i));
    }
    // Rust accepts "inf"/"infinity"; require a digit so words stay text.
    if !s.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<f64>().ok().map(Cell::Float)
}

/// Parses the date and date-time layouts commonly found in spreadsheets.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

fn infer_column(name: String, raw: Vec<String>) -> Column {
    let present: Vec<&String> = raw.iter().filter(|v| !is_na(v)).collect();

    let numbers: Option<Vec<Cell>> = present.iter().map(|v| parse_number(v)).collect();
    if let Some(numbers) = numbers {
        let all_int = numbers.iter().all(|c| matches!(c, Cell::Int(_)));
        let cells = raw
            .iter()
            .map(|v| match (is_na(v), parse_number(v)) {
                (false, Some(Cell::Int(i))) if !all_int => Cell::Float(i as f64),
                (false, Some(cell)) => cell,
                _ => Cell::Missing,
            })
            .collect();
        return Column {
            name,
            kind: ColumnKind::Numeric,
            cells,
        };
    }

    let head: Vec<&String> = raw
        .iter()
        .take(DATETIME_SAMPLE)
        .filter(|v| !is_na(v))
        .collect();
    let kind = if !head.is_empty() && head.iter().all(|v| parse_datetime(v).is_some()) {
        ColumnKind::Datetime
    } else {
        ColumnKind::Categorical
    };

    let cells = raw
        .into_iter()
        .map(|v| if is_na(&v) { Cell::Missing } else { Cell::Text(v) })
        .collect();
    Column { name, kind, cells }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn sales() -> Dataset {
        Dataset::from_raw(
            "sales.csv",
            strings(&["Date", "Region", "Revenue", "Units"]),
            vec![
                strings(&["2024-01-01", "North", "1200", "3"]),
                strings(&["2024-01-02", "South", "75.5", "NA"]),
                strings(&["2024-01-03", "North", "400", "7"]),
                strings(&["2024-01-04", "", "1200", "1"]),
            ],
        )
    }

    #[test]
    fn infers_numeric_datetime_and_categorical() {
        let p = sales().profile();
        assert_eq!(p.numeric_columns, vec!["Revenue", "Units"]);
        assert_eq!(p.datetime_columns, vec!["Date"]);
        assert_eq!(p.categorical_columns, vec!["Region"]);
        assert_eq!(p.shape, (4, 4));
    }

    #[test]
    fn mixed_int_and_float_becomes_float() {
        let ds = sales();
        let rev = ds.column("Revenue").unwrap();
        assert_eq!(rev.cells[0], Cell::Float(1200.0));
        assert!(!rev.is_integral());
        assert!(ds.column("Units").unwrap().is_integral());
    }

    #[test]
    fn missing_counts_and_sample() {
        let p = sales().profile();
        assert_eq!(p.missing_values["Units"], Value::from(1));
        assert_eq!(p.missing_values["Region"], Value::from(1));
        assert_eq!(p.sample_data.len(), 3);
        assert_eq!(p.sample_data[1]["Units"], Value::Null);
        assert_eq!(p.sample_data[0]["Region"], Value::from("North"));
    }

    #[test]
    fn profiling_twice_is_identical() {
        let ds = sales();
        assert_eq!(ds.profile(), ds.profile());
    }

    #[test]
    fn headers_are_deduplicated() {
        let ds = Dataset::from_raw(
            "x.csv",
            strings(&["a", "a", "", "a"]),
            vec![strings(&["1", "2", "3", "4"])],
        );
        let names: Vec<&str> = ds.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "a.1", "Unnamed: 2", "a.2"]);
    }

    #[test]
    fn ragged_rows_are_padded_and_truncated() {
        let ds = Dataset::from_raw(
            "r.csv",
            strings(&["a", "b"]),
            vec![strings(&["1"]), strings(&["2", "x", "extra"])],
        );
        assert_eq!(ds.column("a").unwrap().cells, vec![Cell::Int(1), Cell::Int(2)]);
        assert_eq!(
            ds.column("b").unwrap().cells,
            vec![Cell::Missing, Cell::Text("x".into())]
        );
    }

    #[test]
    fn date_detection_only_looks_at_first_five_rows() {
        let mut rows: Vec<Vec<String>> = (1..=5).map(|d| vec![format!("2024-02-0{}", d)]).collect();
        rows.push(strings(&["not a date"]));
        let ds = Dataset::from_raw("d.csv", strings(&["when"]), rows);
        assert_eq!(ds.columns[0].kind, ColumnKind::Datetime);
    }

    #[test]
    fn all_missing_text_head_is_categorical() {
        let ds = Dataset::from_raw(
            "m.csv",
            strings(&["label"]),
            vec![strings(&["NA"]), strings(&["hello"])],
        );
        // "hello" is in the head sample and is not a date.
        assert_eq!(ds.columns[0].kind, ColumnKind::Categorical);
    }

    #[test]
    fn words_like_inf_stay_text() {
        let ds = Dataset::from_raw("w.csv", strings(&["w"]), vec![strings(&["inf"]), strings(&["3"])]);
        assert_eq!(ds.columns[0].kind, ColumnKind::Categorical);
    }

    #[test]
    fn parses_common_date_layouts() {
        assert!(parse_datetime("2024-03-05").is_some());
        assert!(parse_datetime("03/05/2024").is_some());
        assert!(parse_datetime("2024-03-05T10:20:30Z").is_some());
        assert!(parse_datetime("Mar 5, 2024").is_some());
        assert!(parse_datetime("North").is_none());
    }
}
