// Tabular data passed between the view and the prediction client: loosely
// typed feature values, input rows parsed from CSV or typed by hand, and the
// result table returned by the service.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::TableError;

/// Column carrying per-row feature impacts, when the service returns them.
pub const FEATURE_IMPACTS_COLUMN: &str = "predictionFeatureImpacts";
pub const PREDICTION_COLUMN: &str = "prediction";

/// Cell contents read as missing, matching common dataframe CSV readers.
const MISSING_TOKENS: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// A single cell sent to the model. Typing beyond this is left to the
/// deployment's schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Null,
    Integer(i64),
    Number(f64),
    Text(String),
}

impl FeatureValue {
    /// Infer a value from a CSV cell: empty cells and missing-value tokens
    /// are null, integers stay integers, other finite numbers are floats,
    /// anything else stays text.
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if MISSING_TOKENS.contains(&trimmed) {
            return FeatureValue::Null;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return FeatureValue::Integer(i);
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => FeatureValue::Number(n),
            _ => FeatureValue::Text(raw.to_string()),
        }
    }

    pub fn display(&self) -> String {
        match self {
            FeatureValue::Null => String::new(),
            FeatureValue::Integer(i) => i.to_string(),
            FeatureValue::Number(n) => n.to_string(),
            FeatureValue::Text(s) => s.clone(),
        }
    }
}

/// Feature name to value, in column order. Serializes as a JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureRow(Vec<(String, FeatureValue)>);

impl FeatureRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a feature, replacing any earlier value under the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: FeatureValue) {
        let name = name.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// One row from manual entry. Text inputs always yield strings, empty
    /// ones included.
    pub fn from_text_inputs<'a, I>(inputs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut row = FeatureRow::new();
        for (name, value) in inputs {
            row.insert(name, FeatureValue::Text(value.to_string()));
        }
        row
    }
}

impl Serialize for FeatureRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Anything the renderer can lay out as a grid.
pub trait Tabular {
    fn columns(&self) -> &[String];
    fn row_count(&self) -> usize;
    fn cell(&self, row: usize, col: usize) -> String;
}

/// Rows parsed from an uploaded CSV file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputTable {
    columns: Vec<String>,
    rows: Vec<Vec<FeatureValue>>,
}

impl InputTable {
    pub fn from_path(path: &Path) -> Result<Self, TableError> {
        let file = File::open(path).map_err(|source| TableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file)
    }

    /// Parse CSV with a header row. Ragged records are rejected by the
    /// parser.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, TableError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);
        let columns = dedupe_columns(rdr.headers()?.iter());
        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            rows.push(record.iter().map(FeatureValue::infer).collect());
        }
        debug!(columns = columns.len(), rows = rows.len(), "parsed CSV upload");
        Ok(InputTable { columns, rows })
    }

    /// The first `n` rows, for the preview.
    pub fn head(&self, n: usize) -> InputTable {
        InputTable {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn feature_rows(&self) -> Vec<FeatureRow> {
        self.rows
            .iter()
            .map(|values| {
                let mut row = FeatureRow::new();
                for (name, value) in self.columns.iter().zip(values) {
                    row.insert(name.clone(), value.clone());
                }
                row
            })
            .collect()
    }
}

/// Repeated header names get a `.N` suffix (`a`, `a.1`, `a.2`) so every
/// column survives into the request.
fn dedupe_columns<'a>(headers: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for name in headers {
        let mut candidate = name.to_string();
        let mut n = 0;
        while columns.contains(&candidate) {
            n += 1;
            candidate = format!("{name}.{n}");
        }
        columns.push(candidate);
    }
    columns
}

impl Tabular for InputTable {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn cell(&self, row: usize, col: usize) -> String {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(FeatureValue::display)
            .unwrap_or_default()
    }
}

/// Predictions as returned by the service, one row per submitted row. The
/// columns are whatever keys the service sent, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictionTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl PredictionTable {
    /// Flatten a list of JSON objects into a table. Keys missing from a row
    /// become nulls.
    pub fn from_records(records: Vec<serde_json::Map<String, Value>>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in &records {
            for key in record.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        let rows = records
            .into_iter()
            .map(|mut record| {
                columns
                    .iter()
                    .map(|c| record.remove(c).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        PredictionTable { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(col)
    }

    /// A copy holding only the named columns that exist, in the given order.
    pub fn select(&self, names: &[&str]) -> PredictionTable {
        let picks: Vec<usize> = names
            .iter()
            .filter_map(|n| self.columns.iter().position(|c| c == n))
            .collect();
        PredictionTable {
            columns: picks.iter().map(|&i| self.columns[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|r| picks.iter().map(|&i| r[i].clone()).collect())
                .collect(),
        }
    }
}

impl Tabular for PredictionTable {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn cell(&self, row: usize, col: usize) -> String {
        match self.rows.get(row).and_then(|r| r.get(col)) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            // Nested values (impact lists, class probabilities) stay as compact JSON.
            Some(other) => other.to_string(),
        }
    }
}
