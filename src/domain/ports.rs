use crate::domain::record::{ColumnLayout, Row};
use crate::utils::error::Result;
use async_trait::async_trait;

/// What a query engine needs from a split: the columns it will produce and
/// the rows themselves.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn columns(&self) -> Result<ColumnLayout>;
    async fn records(&self) -> Result<Vec<Row>>;
}
