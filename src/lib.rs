//! Client for the Loki HTTP API.
//!
//! `LokiClient` pushes log lines and runs range and instant queries; the
//! responses are parsed into `QueryResult`, whose `Data` is either log
//! streams or a metric matrix. The `connector` module maps query results to
//! typed rows for query engines.

pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::cli::CliConfig;
pub use crate::config::{toml_config::TomlConfig, BasicAuth, LokiClientConfig};

pub use crate::core::client::{LokiClient, PushRequest, RangeQuery};
pub use crate::core::connector::{rows_from_result, LokiRecordSource, QuerySplit};
pub use crate::core::time::{nanos_from_instant, now_nanos};
pub use crate::domain::model::{
    Data, Labels, LogEntry, Matrix, Metric, MetricPoint, QueryResult, ResultType, Stream, Streams,
};
pub use crate::domain::ports::RecordSource;
pub use crate::domain::record::{Column, ColumnLayout, ColumnType, Row};
pub use crate::utils::error::{ErrorCategory, LokiError, Result};
