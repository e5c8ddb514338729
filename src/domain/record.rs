use crate::domain::model::{Labels, ResultType};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Map,
    Timestamp,
    Varchar,
    Double,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: &'static str,
    pub column_type: ColumnType,
}

impl Column {
    const fn new(name: &'static str, column_type: ColumnType) -> Self {
        Self { name, column_type }
    }
}

const LOG_COLUMNS: [Column; 3] = [
    Column::new("labels", ColumnType::Map),
    Column::new("timestamp", ColumnType::Timestamp),
    Column::new("line", ColumnType::Varchar),
];

const METRIC_COLUMNS: [Column; 3] = [
    Column::new("labels", ColumnType::Map),
    Column::new("timestamp", ColumnType::Timestamp),
    Column::new("value", ColumnType::Double),
];

/// Table shape of a query: log queries and metric queries differ only in the
/// last column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnLayout {
    pub result_type: ResultType,
    pub columns: Vec<Column>,
}

impl ColumnLayout {
    pub fn for_result_type(result_type: ResultType) -> Self {
        let columns = match result_type {
            ResultType::Streams => LOG_COLUMNS.to_vec(),
            ResultType::Matrix => METRIC_COLUMNS.to_vec(),
        };
        Self {
            result_type,
            columns,
        }
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Row {
    Log {
        labels: Labels,
        timestamp: DateTime<Utc>,
        line: String,
    },
    Sample {
        labels: Labels,
        timestamp: DateTime<Utc>,
        value: f64,
    },
}

impl Row {
    pub fn labels(&self) -> &Labels {
        match self {
            Row::Log { labels, .. } | Row::Sample { labels, .. } => labels,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Row::Log { timestamp, .. } | Row::Sample { timestamp, .. } => *timestamp,
        }
    }
}
