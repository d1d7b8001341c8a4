//! Tabular analyzer: load CSV/XLSX datasets and answer questions about them.
//!
//! Datasets live in an insertion-ordered store behind one `RwLock`. Loads
//! take the write lock; queries take the read lock and run to completion
//! against a borrowed [`Dataset`].
//!
//! | Extension | Reader |
//! |-----------|--------|
//! | `.csv` | `csv` crate, comma delimited, header row, ragged rows allowed |
//! | `.xlsx` | first worksheet via [`xlsx`] |
//! | `.xls` | rejected (legacy binary workbook) |

pub mod chart;
pub mod dataset;
pub mod query;
pub mod xlsx;

use std::path::Path;
use std::sync::RwLock;

use serde::Serialize;

use crate::error::TabularError;
use crate::store::{self, NamedStore};

pub use chart::{ChartKind, ChartSpec};
pub use dataset::{Dataset, DatasetProfile};
pub use query::TabularAnswer;

/// File extensions routed to the tabular analyzer.
pub const TABULAR_EXTENSIONS: &[&str] = &["csv", "xlsx", "xls"];

/// Successful load: the new dataset's profile.
#[derive(Debug, Clone, Serialize)]
pub struct LoadedDataset {
    pub message: String,
    pub info: DatasetProfile,
}

#[derive(Debug, Default)]
pub struct TabularAnalyzer {
    datasets: RwLock<NamedStore<Dataset>>,
}

impl TabularAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a file from disk under its file name.
    pub fn load_file(&self, path: &Path) -> Result<LoadedDataset, TabularError> {
        self.load_file_as(path, &file_name(path))
    }

    /// Loads a file from disk under an explicit name.
    pub fn load_file_as(&self, path: &Path, name: &str) -> Result<LoadedDataset, TabularError> {
        let bytes = std::fs::read(path)
            .map_err(|e| TabularError::Load(format!("{}: {}", path.display(), e)))?;
        self.load_bytes(&bytes, name)
    }

    /// Loads file contents under `name`; the format comes from `name`'s
    /// extension. Reloading a name replaces the dataset.
    pub fn load_bytes(&self, bytes: &[u8], name: &str) -> Result<LoadedDataset, TabularError> {
        let (header, rows) = match extension(name).as_str() {
            "csv" => read_csv(bytes)?,
            "xlsx" => xlsx::read_first_sheet(bytes)?,
            "xls" => {
                return Err(TabularError::Load(
                    "legacy .xls workbooks are not supported; save the file as .xlsx or .csv"
                        .to_string(),
                ))
            }
            "" => return Err(TabularError::UnsupportedFormat(String::new())),
            other => return Err(TabularError::UnsupportedFormat(format!(".{}", other))),
        };
        if header.is_empty() {
            return Err(TabularError::Load("No columns to parse from file".to_string()));
        }

        let dataset = Dataset::from_raw(name, header, rows);
        let info = dataset.profile();
        tracing::info!(
            dataset = name,
            rows = dataset.row_count,
            columns = dataset.columns.len(),
            "dataset loaded"
        );
        if store::write(&self.datasets).insert(name, dataset) {
            tracing::debug!(dataset = name, "replaced existing dataset");
        }

        Ok(LoadedDataset {
            message: format!("Successfully loaded {}", name),
            info,
        })
    }

    /// Answers `text` against the named dataset, or the most recently
    /// loaded one.
    pub fn query(&self, text: &str, dataset: Option<&str>) -> Result<TabularAnswer, TabularError> {
        let store = store::read(&self.datasets);
        let ds = resolve(&store, dataset)?;
        tracing::debug!(dataset = %ds.name, "tabular query");
        query::answer(ds, text)
    }

    /// Profile of the named dataset, or the current one.
    pub fn summary(&self, dataset: Option<&str>) -> Result<DatasetProfile, TabularError> {
        let store = store::read(&self.datasets);
        resolve(&store, dataset).map(Dataset::profile)
    }

    pub fn list(&self) -> Vec<String> {
        store::read(&self.datasets).names()
    }

    pub fn is_empty(&self) -> bool {
        store::read(&self.datasets).is_empty()
    }

    pub fn current(&self) -> Option<String> {
        store::read(&self.datasets)
            .current()
            .map(|(name, _)| name.to_string())
    }

    pub fn remove(&self, name: &str) -> Result<(), TabularError> {
        let removed = store::write(&self.datasets).remove(name);
        match removed {
            Some(_) => {
                tracing::info!(dataset = name, "dataset removed");
                Ok(())
            }
            None => Err(TabularError::DatasetNotFound(name.to_string())),
        }
    }

    pub fn clear(&self) {
        store::write(&self.datasets).clear();
    }

    /// The store lock, for callers that must clear several stores at once.
    pub(crate) fn lock(&self) -> &RwLock<NamedStore<Dataset>> {
        &self.datasets
    }
}

fn resolve<'a>(
    store: &'a NamedStore<Dataset>,
    name: Option<&str>,
) -> Result<&'a Dataset, TabularError> {
    if store.is_empty() {
        return Err(TabularError::NoDataset);
    }
    match name {
        Some(n) => store
            .get(n)
            .ok_or_else(|| TabularError::DatasetNotFound(n.to_string())),
        None => store
            .current()
            .map(|(_, ds)| ds)
            .ok_or(TabularError::NoDataset),
    }
}

fn read_csv(bytes: &[u8]) -> Result<(Vec<String>, Vec<Vec<String>>), TabularError> {
    let load_err = |e: csv::Error| TabularError::Load(e.to_string());
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let header = reader
        .byte_headers()
        .map_err(load_err)?
        .iter()
        .map(|f| String::from_utf8_lossy(f).into_owned())
        .collect();

    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = record.map_err(load_err)?;
        rows.push(
            record
                .iter()
                .map(|f| String::from_utf8_lossy(f).into_owned())
                .collect(),
        );
    }
    Ok((header, rows))
}

/// Lowercased extension without the dot; empty when there is none.
pub fn extension(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SALES: &str = "Date,Region,Revenue\n2024-01-01,North,1200\n2024-01-02,South,75\n\
                         2024-01-03,North,400\n2024-01-04,East,1200\n2024-01-05,South,80\n";

    #[test]
    fn load_then_list_contains_name_once() {
        let t = TabularAnalyzer::new();
        t.load_bytes(SALES.as_bytes(), "sales.csv").unwrap();
        t.load_bytes(SALES.as_bytes(), "sales.csv").unwrap();
        assert_eq!(t.list(), vec!["sales.csv"]);
    }

    #[test]
    fn reload_overwrites_in_place() {
        let t = TabularAnalyzer::new();
        t.load_bytes(SALES.as_bytes(), "a.csv").unwrap();
        t.load_bytes(b"x\n1\n", "b.csv").unwrap();
        t.load_bytes(b"y,z\n1,2\n", "a.csv").unwrap();
        assert_eq!(t.list(), vec!["a.csv", "b.csv"]);
        assert_eq!(t.summary(Some("a.csv")).unwrap().columns, vec!["y", "z"]);
        assert_eq!(t.current().as_deref(), Some("a.csv"));
    }

    #[test]
    fn load_returns_profile() {
        let t = TabularAnalyzer::new();
        let loaded = t.load_bytes(SALES.as_bytes(), "sales.csv").unwrap();
        assert_eq!(loaded.message, "Successfully loaded sales.csv");
        assert_eq!(loaded.info.shape, (5, 3));
        assert_eq!(loaded.info.datetime_columns, vec!["Date"]);
    }

    #[test]
    fn ragged_csv_is_tolerated() {
        let t = TabularAnalyzer::new();
        let loaded = t.load_bytes(b"a,b,c\n1,2\n3,4,5,6\n", "r.csv").unwrap();
        assert_eq!(loaded.info.shape, (2, 3));
        assert_eq!(loaded.info.missing_values["c"], serde_json::Value::from(1));
    }

    #[test]
    fn query_uses_current_dataset() {
        let t = TabularAnalyzer::new();
        t.load_bytes(SALES.as_bytes(), "sales.csv").unwrap();
        let a = t.query("what is the total Revenue", None).unwrap();
        assert_eq!(a.message(), "The sum of Revenue is 2,955.00");
    }

    #[test]
    fn missing_datasets_are_reported() {
        let t = TabularAnalyzer::new();
        assert!(matches!(t.query("count", None), Err(TabularError::NoDataset)));
        t.load_bytes(SALES.as_bytes(), "sales.csv").unwrap();
        let err = t.query("count", Some("other.csv")).unwrap_err();
        assert_eq!(err.code(), "dataset_not_found");
    }

    #[test]
    fn unsupported_and_legacy_formats_fail_to_load() {
        let t = TabularAnalyzer::new();
        assert_eq!(t.load_bytes(b"x", "notes.txt").unwrap_err().code(), "load_error");
        assert_eq!(t.load_bytes(b"x", "old.xls").unwrap_err().code(), "load_error");
        assert!(t.is_empty());
    }

    #[test]
    fn empty_csv_has_no_columns() {
        let t = TabularAnalyzer::new();
        let err = t.load_bytes(b"", "empty.csv").unwrap_err();
        assert!(err.to_string().contains("No columns"));
    }

    #[test]
    fn xlsx_loads_through_the_same_path() {
        let bytes = xlsx::tests::build_xlsx(
            &["Region", "Revenue", "North", "South"],
            r#"<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row>
               <row r="2"><c r="A2" t="s"><v>2</v></c><c r="B2"><v>10</v></c></row>
               <row r="3"><c r="A3" t="s"><v>3</v></c><c r="B3"><v>5.5</v></c></row>"#,
        );
        let t = TabularAnalyzer::new();
        let loaded = t.load_bytes(&bytes, "book.XLSX").unwrap();
        assert_eq!(loaded.info.numeric_columns, vec!["Revenue"]);
        assert_eq!(t.query("sum of revenue", None).unwrap().message(), "The sum of Revenue is 15.50");
    }

    #[test]
    fn remove_and_clear() {
        let t = TabularAnalyzer::new();
        t.load_bytes(SALES.as_bytes(), "a.csv").unwrap();
        t.load_bytes(SALES.as_bytes(), "b.csv").unwrap();
        t.remove("a.csv").unwrap();
        assert_eq!(t.list(), vec!["b.csv"]);
        assert!(t.remove("a.csv").is_err());
        t.clear();
        assert!(t.is_empty());
    }

    #[test]
    fn load_file_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q1.csv");
        std::fs::write(&path, SALES).unwrap();
        let t = TabularAnalyzer::new();
        t.load_file(&path).unwrap();
        assert_eq!(t.list(), vec!["q1.csv"]);
    }
}
