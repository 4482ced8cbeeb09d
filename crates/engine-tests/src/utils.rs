use crate::mock::MockWarehouse;
use connectors::encoder::DelimitedEncoder;
use engine_config::settings::{TaskConfig, TaskOptions};
use engine_processing::pool::LoadPool;
use model::{
    core::{
        data_type::LogicalType,
        schema::{Column, Schema},
        value::Value,
    },
    records::batch::RecordBatch,
};
use std::sync::Arc;

pub const TABLE: &str = "events";

pub fn schema() -> Schema {
    Schema::new(vec![
        Column::new("id", LogicalType::Long),
        Column::new("name", LogicalType::String),
    ])
}

/// `count` rows with ids `first..first + count`.
pub fn batch(partition: usize, first: i64, count: i64) -> RecordBatch {
    let rows = (first..first + count)
        .map(|id| vec![Value::Long(id), Value::from(format!("row-{id}"))])
        .collect();
    RecordBatch::new(partition, rows)
}

pub fn options(pool: usize) -> TaskOptions {
    TaskOptions {
        user: Some("dbadmin".into()),
        table: Some(TABLE.into()),
        pool: Some(pool),
        ..Default::default()
    }
}

pub fn task_config(options: TaskOptions, partitions: usize) -> Arc<TaskConfig> {
    Arc::new(TaskConfig::from_options(options, partitions).expect("valid options"))
}

pub fn pool(warehouse: &MockWarehouse, config: Arc<TaskConfig>) -> LoadPool {
    let schema = schema();
    let encoder = DelimitedEncoder::new(config.delimiter, schema.len());
    let request = config.load_request(&schema);
    LoadPool::new(config, Arc::new(warehouse.clone()), Arc::new(encoder), request)
}

/// What the encoder writes for `batch(_, first, count)`.
pub fn encoded(first: i64, count: i64) -> String {
    (first..first + count)
        .map(|id| format!("{id}|row-{id}\n"))
        .collect()
}
