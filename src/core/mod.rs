pub mod client;
pub mod connector;
pub mod time;

pub use crate::domain::model::{Data, LogEntry, Metric, MetricPoint, QueryResult, ResultType, Stream};
pub use crate::domain::ports::RecordSource;
pub use crate::utils::error::Result;
