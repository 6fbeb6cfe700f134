//! Delimited churn table reader (CSV or TSV with a header row).
use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use csv::StringRecord;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::data_handling::Dataset;

/// How categorical columns become numeric features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalEncoding {
    /// One indicator column per category
    OneHot,
    /// A single column holding the category's sorted position
    Ordinal,
}

/// What to do with records holding a missing feature value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    /// Keep the record; the feature transform fills in training means
    ImputeMean,
    /// Exclude the record at load time
    DropRows,
}

/// Configuration for reading churn tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableReaderConfig {
    /// Unique identifier column, dropped from the features.
    pub id_column: Option<String>,
    pub label_column: String,
    /// Label spellings mapped to the positive class (case-insensitive).
    pub positive_labels: Vec<String>,
    /// Label spellings mapped to the negative class (case-insensitive).
    pub negative_labels: Vec<String>,
    /// Columns parsed as numbers; every other column is categorical.
    pub numeric_columns: Vec<String>,
    pub ignore_columns: Vec<String>,
    pub encoding: CategoricalEncoding,
    pub missing_policy: MissingPolicy,
}

impl Default for TableReaderConfig {
    fn default() -> Self {
        Self {
            id_column: Some("customerID".to_string()),
            label_column: "Churn".to_string(),
            positive_labels: vec!["yes".into(), "1".into(), "true".into()],
            negative_labels: vec!["no".into(), "0".into(), "false".into()],
            numeric_columns: vec![
                "SeniorCitizen".to_string(),
                "tenure".to_string(),
                "MonthlyCharges".to_string(),
                "TotalCharges".to_string(),
            ],
            ignore_columns: Vec::new(),
            encoding: CategoricalEncoding::OneHot,
            missing_policy: MissingPolicy::ImputeMean,
        }
    }
}

/// One source column and how it is encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnEncoding {
    Numeric { name: String },
    Categorical { name: String, categories: Vec<String> },
}

impl ColumnEncoding {
    fn source_name(&self) -> &str {
        match self {
            ColumnEncoding::Numeric { name } | ColumnEncoding::Categorical { name, .. } => name,
        }
    }
}

/// Column layout learned from a training table, reused to encode new tables
/// into the same feature space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub columns: Vec<ColumnEncoding>,
    pub encoding: CategoricalEncoding,
}

impl TableSchema {
    /// Encoded feature names, in column order.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for column in &self.columns {
            match column {
                ColumnEncoding::Numeric { name } => names.push(name.clone()),
                ColumnEncoding::Categorical { name, categories } => match self.encoding {
                    CategoricalEncoding::OneHot => {
                        names.extend(categories.iter().map(|c| format!("{}={}", name, c)))
                    }
                    CategoricalEncoding::Ordinal => names.push(name.clone()),
                },
            }
        }
        names
    }

    pub fn n_features(&self) -> usize {
        self.feature_names().len()
    }

    /// Encode one record. Unparseable numbers and unseen or empty categories
    /// become `NaN`; the returned count says how many cells were missing.
    fn encode_row(&self, record: &StringRecord, indices: &[usize], out: &mut Vec<f64>) -> usize {
        let mut missing = 0;
        for (column, &idx) in self.columns.iter().zip(indices) {
            let raw = record.get(idx).unwrap_or("").trim();
            match column {
                ColumnEncoding::Numeric { .. } => match raw.parse::<f64>() {
                    Ok(value) if value.is_finite() => out.push(value),
                    _ => {
                        missing += 1;
                        out.push(f64::NAN);
                    }
                },
                ColumnEncoding::Categorical { categories, .. } => {
                    let position = if raw.is_empty() {
                        None
                    } else {
                        categories.iter().position(|c| c == raw)
                    };
                    if position.is_none() {
                        missing += 1;
                    }
                    match self.encoding {
                        CategoricalEncoding::OneHot => {
                            for i in 0..categories.len() {
                                out.push(match position {
                                    Some(p) if p == i => 1.0,
                                    Some(_) => 0.0,
                                    None => f64::NAN,
                                });
                            }
                        }
                        CategoricalEncoding::Ordinal => {
                            out.push(position.map(|p| p as f64).unwrap_or(f64::NAN))
                        }
                    }
                }
            }
        }
        missing
    }
}

/// Parsed table ready for partitioning, plus the schema that produced it.
#[derive(Debug)]
pub struct LoadedTable {
    pub dataset: Dataset,
    pub schema: TableSchema,
}

/// Features of a table being scored by an exported model.
#[derive(Debug)]
pub struct ScoringTable {
    pub ids: Vec<String>,
    pub x: Array2<f64>,
    /// Present when the table carries the label column.
    pub y: Option<Array1<bool>>,
}

fn open_reader<P: AsRef<Path>>(path: P) -> Result<(StringRecord, Vec<StringRecord>)> {
    let is_tsv = path
        .as_ref()
        .extension()
        .map(|e| e.eq_ignore_ascii_case("tsv"))
        .unwrap_or(false);
    let delimiter = if is_tsv { b'\t' } else { b',' };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_path(&path)
        .with_context(|| format!("Failed to open table: {}", path.as_ref().display()))?;

    let headers = reader
        .headers()
        .context("Failed to read table header row")?
        .clone();

    let mut records = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;
        records.push(record);
    }
    Ok((headers, records))
}

fn find_column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|header| header.trim().eq_ignore_ascii_case(name))
}

fn parse_label(raw: &str, config: &TableReaderConfig, row_idx: usize) -> Result<bool> {
    let value = raw.trim();
    if config
        .positive_labels
        .iter()
        .any(|l| l.eq_ignore_ascii_case(value))
    {
        Ok(true)
    } else if config
        .negative_labels
        .iter()
        .any(|l| l.eq_ignore_ascii_case(value))
    {
        Ok(false)
    } else {
        Err(anyhow!(
            "Unrecognised label '{}' at row {}",
            value,
            row_idx + 1
        ))
    }
}

fn infer_schema(
    headers: &StringRecord,
    records: &[StringRecord],
    config: &TableReaderConfig,
    label_idx: usize,
) -> TableSchema {
    let id_idx = config.id_column.as_deref().and_then(|name| find_column(headers, name));
    let ignore: HashSet<String> = config
        .ignore_columns
        .iter()
        .map(|n| n.to_ascii_lowercase())
        .collect();
    let numeric: HashSet<String> = config
        .numeric_columns
        .iter()
        .map(|n| n.to_ascii_lowercase())
        .collect();

    let mut columns = Vec::new();
    for (idx, header) in headers.iter().enumerate() {
        let name = header.trim();
        if idx == label_idx || Some(idx) == id_idx || ignore.contains(&name.to_ascii_lowercase()) {
            continue;
        }
        if numeric.contains(&name.to_ascii_lowercase()) {
            columns.push(ColumnEncoding::Numeric {
                name: name.to_string(),
            });
        } else {
            let categories: BTreeSet<String> = records
                .iter()
                .filter_map(|r| r.get(idx))
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(|v| v.to_string())
                .collect();
            columns.push(ColumnEncoding::Categorical {
                name: name.to_string(),
                categories: categories.into_iter().collect(),
            });
        }
    }

    TableSchema {
        columns,
        encoding: config.encoding,
    }
}

fn column_indices(headers: &StringRecord, schema: &TableSchema) -> Result<Vec<usize>> {
    schema
        .columns
        .iter()
        .map(|column| {
            find_column(headers, column.source_name())
                .ok_or_else(|| anyhow!("Missing feature column '{}'", column.source_name()))
        })
        .collect()
}

fn read_ids(records: &[StringRecord], id_idx: Option<usize>) -> Vec<String> {
    records
        .iter()
        .enumerate()
        .map(|(row_idx, record)| match id_idx.and_then(|i| record.get(i)) {
            Some(id) => id.trim().to_string(),
            None => format!("row_{}", row_idx + 1),
        })
        .collect()
}

/// Read a churn table, learning the categorical layout from its contents.
pub fn read_churn_table<P: AsRef<Path>>(path: P, config: &TableReaderConfig) -> Result<LoadedTable> {
    let (headers, records) = open_reader(&path)?;
    if records.is_empty() {
        return Err(anyhow!("Table {} has no records", path.as_ref().display()));
    }

    let label_idx = find_column(&headers, &config.label_column)
        .ok_or_else(|| anyhow!("Missing label column '{}'", config.label_column))?;
    let id_idx = config.id_column.as_deref().and_then(|name| find_column(&headers, name));

    let schema = infer_schema(&headers, &records, config, label_idx);
    if schema.columns.is_empty() {
        return Err(anyhow!("No feature columns detected in table header"));
    }
    let indices = column_indices(&headers, &schema)?;
    let n_features = schema.n_features();

    let mut features = Vec::with_capacity(records.len() * n_features);
    let mut labels = Vec::with_capacity(records.len());
    let mut complete = Vec::with_capacity(records.len());
    let mut missing_cells = 0;
    for (row_idx, record) in records.iter().enumerate() {
        let raw_label = record
            .get(label_idx)
            .ok_or_else(|| anyhow!("Missing label value at row {}", row_idx + 1))?;
        labels.push(parse_label(raw_label, config, row_idx)?);

        let missing = schema.encode_row(record, &indices, &mut features);
        missing_cells += missing;
        complete.push(missing == 0);
    }

    if missing_cells > 0 {
        log::warn!(
            "{} cells could not be parsed and were marked missing ({} records affected)",
            missing_cells,
            complete.iter().filter(|c| !**c).count()
        );
    }

    let x = Array2::from_shape_vec((records.len(), n_features), features)
        .context("Failed to build feature matrix")?;
    let dataset = Dataset::with_ids(
        x,
        Array1::from_vec(labels),
        schema.feature_names(),
        read_ids(&records, id_idx),
    )?;

    let dataset = match config.missing_policy {
        MissingPolicy::ImputeMean => dataset,
        MissingPolicy::DropRows => {
            let kept = dataset.filter(&complete);
            log::info!(
                "Dropped {} records with missing values",
                dataset.n_samples() - kept.n_samples()
            );
            kept
        }
    };

    if dataset.is_empty() {
        return Err(anyhow!("No records left after applying the missing value policy"));
    }

    Ok(LoadedTable { dataset, schema })
}

/// Encode a new table with a schema learned at training time.
pub fn read_features_with_schema<P: AsRef<Path>>(
    path: P,
    config: &TableReaderConfig,
    schema: &TableSchema,
) -> Result<ScoringTable> {
    let (headers, records) = open_reader(&path)?;
    let indices = column_indices(&headers, schema)?;
    let id_idx = config.id_column.as_deref().and_then(|name| find_column(&headers, name));
    let label_idx = find_column(&headers, &config.label_column);

    let mut features = Vec::with_capacity(records.len() * schema.n_features());
    let mut labels = Vec::new();
    for (row_idx, record) in records.iter().enumerate() {
        schema.encode_row(record, &indices, &mut features);
        if let Some(idx) = label_idx {
            labels.push(parse_label(record.get(idx).unwrap_or(""), config, row_idx)?);
        }
    }

    let x = Array2::from_shape_vec((records.len(), schema.n_features()), features)
        .context("Failed to build feature matrix")?;
    Ok(ScoringTable {
        ids: read_ids(&records, id_idx),
        x,
        y: label_idx.map(|_| Array1::from_vec(labels)),
    })
}
