//! IO utilities for loading churn tables.

pub mod churn_table;

pub use churn_table::{
    read_churn_table, read_features_with_schema, CategoricalEncoding, LoadedTable, MissingPolicy,
    ScoringTable, TableReaderConfig, TableSchema,
};
