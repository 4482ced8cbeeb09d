use connectors::file::csv::{error::FileError, source::CsvPartitionSource};
use engine_core::error::LoadError;
use engine_processing::pool::Dispatcher;
use futures_util::future::try_join_all;
use model::core::schema::Schema;
use tracing::{debug, info};

/// Reads every input file as its own partition and feeds the pool.
pub async fn produce_files(
    dispatcher: Dispatcher,
    inputs: Vec<String>,
    schema: Schema,
    batch_size: usize,
    has_headers: bool,
) -> Result<(), LoadError> {
    let partitions = inputs.into_iter().enumerate().map(|(index, path)| {
        load_partition(
            dispatcher.clone(),
            index,
            path,
            schema.clone(),
            batch_size,
            has_headers,
        )
    });

    let rows = try_join_all(partitions).await?;
    info!(
        partitions = rows.len(),
        rows = rows.iter().sum::<u64>(),
        "All partitions dispatched"
    );
    Ok(())
}

async fn load_partition(
    dispatcher: Dispatcher,
    index: usize,
    path: String,
    schema: Schema,
    batch_size: usize,
    has_headers: bool,
) -> Result<u64, LoadError> {
    let mut source = CsvPartitionSource::open(&path, index, schema, has_headers)
        .map_err(|e| read_error(index, &path, e))?;

    // CSV parsing blocks the current thread.
    while let Some(batch) = tokio::task::block_in_place(|| source.next_batch(batch_size))
        .map_err(|e| read_error(index, &path, e))?
    {
        debug!(partition = index, rows = batch.row_count(), "Dispatching batch");
        dispatcher.dispatch(batch).await?;
    }

    info!(partition = index, path = %path, rows = source.rows_read(), "Partition finished");
    Ok(source.rows_read())
}

fn read_error(index: usize, path: &str, err: FileError) -> LoadError {
    LoadError::Aborted(format!("partition {index} ({path}): {err}"))
}
