//! Query-engine side of the library: turns Loki queries into typed rows.
//!
//! An engine plans a query by asking for its columns (log queries and metric
//! queries have different value columns), then reads the rows of each split.

use crate::core::client::{LokiClient, RangeQuery};
use crate::core::time::{instant_from_nanos, instant_from_seconds};
use crate::domain::model::{Data, QueryResult};
use crate::domain::ports::RecordSource;
use crate::domain::record::{ColumnLayout, Row};
use crate::utils::error::{LokiError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// One unit of work: a query over a time window.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySplit {
    pub query: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl QuerySplit {
    pub fn new(query: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            query: query.into(),
            start,
            end,
        }
    }
}

pub struct LokiRecordSource {
    client: LokiClient,
    split: QuerySplit,
}

impl LokiRecordSource {
    pub fn new(client: LokiClient, split: QuerySplit) -> Self {
        Self { client, split }
    }

    pub fn split(&self) -> &QuerySplit {
        &self.split
    }
}

#[async_trait]
impl RecordSource for LokiRecordSource {
    async fn columns(&self) -> Result<ColumnLayout> {
        let result_type = self
            .client
            .get_expected_result_type(&self.split.query)
            .await?;
        Ok(ColumnLayout::for_result_type(result_type))
    }

    async fn records(&self) -> Result<Vec<Row>> {
        let request = RangeQuery::new(self.split.query.clone(), self.split.start, self.split.end);
        let result = self.client.range_query_with(&request).await?;
        let rows = rows_from_result(result)?;
        tracing::debug!(
            "Split {:?} [{} .. {}] produced {} rows",
            self.split.query,
            self.split.start,
            self.split.end,
            rows.len()
        );
        Ok(rows)
    }
}

/// Flatten a result into rows, one per log entry or sample, keeping stream
/// and series order.
pub fn rows_from_result(result: QueryResult) -> Result<Vec<Row>> {
    match result.data {
        Data::Streams(streams) => Ok(streams
            .into_iter()
            .flat_map(|stream| {
                let labels = stream.labels;
                stream.values.into_iter().map(move |entry| Row::Log {
                    labels: labels.clone(),
                    timestamp: instant_from_nanos(entry.timestamp),
                    line: entry.line,
                })
            })
            .collect()),
        Data::Matrix(metrics) => {
            let mut rows = Vec::new();
            for metric in metrics {
                for point in metric.values {
                    let timestamp = instant_from_seconds(point.ts)
                        .ok_or(LokiError::SampleTimestampOutOfRange(point.ts))?;
                    rows.push(Row::Sample {
                        labels: metric.labels.clone(),
                        timestamp,
                        value: point.v,
                    });
                }
            }
            Ok(rows)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streams_flatten_to_log_rows() {
        let json = r#"{"status":"success","data":{"resultType":"streams","result":[
            {"stream":{"job":"a"},"values":[["1000000001","first"],["2000000000","second"]]},
            {"stream":{"job":"b"},"values":[["3000000000","third"]]}
        ]}}"#;
        let rows = rows_from_result(QueryResult::from_json(json.as_bytes()).unwrap()).unwrap();

        assert_eq!(rows.len(), 3);
        match &rows[0] {
            Row::Log {
                labels,
                timestamp,
                line,
            } => {
                assert_eq!(labels["job"], "a");
                assert_eq!(timestamp.timestamp(), 1);
                assert_eq!(timestamp.timestamp_subsec_nanos(), 1);
                assert_eq!(line, "first");
            }
            other => panic!("expected a log row, got {:?}", other),
        }
        assert_eq!(rows[2].labels()["job"], "b");
    }

    #[test]
    fn test_matrix_flattens_to_sample_rows() {
        let json = r#"{"status":"success","data":{"resultType":"matrix","result":[
            {"metric":{"level":"info"},"values":[[60,"1"],[120,"2.5"]]}
        ]}}"#;
        let rows = rows_from_result(QueryResult::from_json(json.as_bytes()).unwrap()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].timestamp().timestamp(), 120);
        assert!(matches!(rows[1], Row::Sample { value, .. } if value == 2.5));
    }

    #[test]
    fn test_sample_beyond_date_range_is_a_parse_error() {
        let json = r#"{"data":{"resultType":"matrix","result":[
            {"metric":{},"values":[[10000000000000,"1"]]}
        ]}}"#;
        let err = rows_from_result(QueryResult::from_json(json.as_bytes()).unwrap()).unwrap_err();

        assert!(matches!(err, LokiError::SampleTimestampOutOfRange(10_000_000_000_000)));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_empty_result_has_no_rows() {
        let json = r#"{"data":{"resultType":"matrix","result":[]}}"#;
        let rows = rows_from_result(QueryResult::from_json(json.as_bytes()).unwrap()).unwrap();
        assert!(rows.is_empty());
    }
}
