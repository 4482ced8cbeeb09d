#[cfg(test)]
mod tests {
    use crate::{
        mock::{MockBehavior, MockWarehouse},
        utils::{batch, encoded, options, pool, task_config},
    };
    use engine_core::error::{LoadError, TimeoutKind};
    use engine_processing::pool::PoolState;
    use model::report::WorkerStatus;
    use std::time::Duration;
    use tracing_test::traced_test;

    #[tokio::test]
    async fn start_opens_one_stream_per_worker() {
        let warehouse = MockWarehouse::new();
        let mut pool = pool(&warehouse, task_config(options(3), 3));

        pool.start().await.unwrap();
        assert_eq!(pool.state(), PoolState::Running);
        assert_eq!(warehouse.open_streams(), vec![0, 1, 2]);
        assert_eq!(pool.worker_statuses(), vec![WorkerStatus::Running; 3]);

        let copy = warehouse.stream(0).copy.unwrap();
        assert_eq!(copy.table, "events");
        assert_eq!(copy.columns, vec!["id".to_string(), "name".to_string()]);

        pool.commit().await.unwrap();
        assert!(warehouse.open_streams().is_empty());
    }

    #[tokio::test]
    async fn failed_start_discards_opened_streams() {
        let warehouse = MockWarehouse::with_behavior(MockBehavior {
            fail_begin_load: Some(2),
            ..Default::default()
        });
        let mut pool = pool(&warehouse, task_config(options(3), 3));

        let err = pool.start().await.unwrap_err();
        assert!(matches!(err, LoadError::StreamFailure { .. }));
        assert_eq!(pool.state(), PoolState::Failed);

        let streams = warehouse.streams();
        assert_eq!(streams.len(), 2);
        assert!(streams.iter().all(|s| s.discarded && !s.open));
        assert_eq!(warehouse.connections_closed(), warehouse.connections_opened());

        // Producers see why the pool never came up.
        let err = pool.dispatch(batch(0, 0, 1)).await.unwrap_err();
        assert!(matches!(err, LoadError::StreamFailure { worker: 2, .. }));
    }

    #[tokio::test]
    async fn partition_batches_keep_dispatch_order() {
        let warehouse = MockWarehouse::new();
        let mut pool = pool(&warehouse, task_config(options(2), 2));
        pool.start().await.unwrap();

        pool.dispatch(batch(1, 0, 2)).await.unwrap();
        pool.dispatch(batch(1, 2, 2)).await.unwrap();
        pool.dispatch(batch(1, 4, 2)).await.unwrap();

        let reports = pool.commit().await.unwrap();
        assert_eq!(
            warehouse.stream(1).chunks,
            vec![encoded(0, 2), encoded(2, 2), encoded(4, 2)]
        );
        assert!(warehouse.stream(0).chunks.is_empty());
        assert_eq!(reports[1].num_input_rows, 6);
        assert_eq!(reports[0].num_input_rows, 0);
        assert!(reports.iter().all(|r| r.status == WorkerStatus::Committed));
    }

    #[tokio::test]
    async fn more_partitions_than_workers_share_streams() {
        let warehouse = MockWarehouse::new();
        let mut pool = pool(&warehouse, task_config(options(2), 5));
        pool.start().await.unwrap();

        for partition in 0..5 {
            pool.dispatch(batch(partition, partition as i64 * 10, 3))
                .await
                .unwrap();
        }

        let reports = pool.commit().await.unwrap();
        // partitions 0, 2, 4 -> worker 0; partitions 1, 3 -> worker 1
        assert_eq!(reports[0].num_input_rows, 9);
        assert_eq!(reports[1].num_input_rows, 6);
        assert_eq!(warehouse.committed_rows(), 15);
    }

    #[tokio::test(start_paused = true)]
    async fn full_queue_times_out_instead_of_hanging() {
        let warehouse = MockWarehouse::with_behavior(MockBehavior {
            write_delay: Some(Duration::from_secs(30)),
            ..Default::default()
        });
        let mut opts = options(1);
        opts.queue_capacity = Some(1);
        opts.write_timeout = Some(0.5);
        let mut pool = pool(&warehouse, task_config(opts, 1));
        pool.start().await.unwrap();

        let mut outcome = Ok(());
        for i in 0..4 {
            outcome = pool.dispatch(batch(0, i * 10, 10)).await;
            if outcome.is_err() {
                break;
            }
        }
        let err = outcome.unwrap_err();
        assert!(err.is_timeout(), "unexpected error: {err}");

        let err = pool.commit().await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(pool.state(), PoolState::Failed);
        assert!(warehouse.open_streams().is_empty());
        assert!(!pool.reports()[0].is_committed());
    }

    #[tokio::test]
    async fn stream_failure_tears_down_every_stream() {
        let warehouse = MockWarehouse::with_behavior(MockBehavior {
            fail_write: Some((1, 0)),
            ..Default::default()
        });
        let mut pool = pool(&warehouse, task_config(options(2), 2));
        pool.start().await.unwrap();

        pool.dispatch(batch(0, 0, 5)).await.unwrap();
        // May already observe the failure of worker 1.
        let _ = pool.dispatch(batch(1, 5, 5)).await;

        let err = pool.commit().await.unwrap_err();
        assert_eq!(
            err,
            LoadError::StreamFailure {
                worker: 1,
                message: "Failed to write chunk to load stream: stream 1 rejected write 0"
                    .to_string(),
            }
        );

        assert!(warehouse.open_streams().is_empty());
        assert!(warehouse.streams().iter().all(|s| s.discarded && !s.finished));
        assert_eq!(warehouse.committed_rows(), 0);

        let reports = pool.reports();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].status, WorkerStatus::Aborted);
        assert_eq!(reports[0].num_input_rows, 5);
        assert_eq!(reports[1].status, WorkerStatus::Failed);
        assert!(reports[1].error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn blocked_dispatch_wakes_when_another_worker_fails() {
        let warehouse = MockWarehouse::with_behavior(MockBehavior {
            slow_stream: Some((0, Duration::from_secs(60))),
            fail_write: Some((1, 0)),
            ..Default::default()
        });
        let mut opts = options(2);
        opts.queue_capacity = Some(1);
        let mut pool = pool(&warehouse, task_config(opts, 2));
        pool.start().await.unwrap();

        // Worker 0 is stuck in its first write, so this producer ends up
        // waiting on a full queue with no enqueue timeout.
        let dispatcher = pool.dispatcher();
        let producer = tokio::spawn(async move {
            for i in 0..5 {
                dispatcher.dispatch(batch(0, i, 1)).await?;
            }
            Ok::<_, LoadError>(())
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!producer.is_finished());

        let _ = pool.dispatch(batch(1, 100, 1)).await;

        let err = producer.await.unwrap().unwrap_err();
        assert_eq!(
            err,
            LoadError::StreamFailure {
                worker: 1,
                message: "Failed to write chunk to load stream: stream 1 rejected write 0"
                    .to_string(),
            }
        );

        pool.abort().await;
        assert!(warehouse.open_streams().is_empty());
        assert_eq!(warehouse.committed_rows(), 0);
        assert_eq!(pool.reports()[1].status, WorkerStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_worker_fails_on_dequeue_timeout() {
        let warehouse = MockWarehouse::new();
        let mut opts = options(1);
        opts.dequeue_timeout = Some(1.0);
        let mut pool = pool(&warehouse, task_config(opts, 1));
        pool.start().await.unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;

        let err = pool.dispatch(batch(0, 0, 1)).await.unwrap_err();
        assert!(matches!(
            err,
            LoadError::Timeout {
                kind: TimeoutKind::Dequeue,
                worker: 0,
                ..
            }
        ));

        assert!(pool.commit().await.is_err());
        assert!(warehouse.open_streams().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_finish_is_a_finish_timeout() {
        let warehouse = MockWarehouse::with_behavior(MockBehavior {
            finish_delay: Some(Duration::from_secs(60)),
            ..Default::default()
        });
        let mut opts = options(2);
        opts.finish_timeout = Some(2.0);
        let mut pool = pool(&warehouse, task_config(opts, 2));
        pool.start().await.unwrap();
        pool.dispatch(batch(0, 0, 3)).await.unwrap();

        let err = pool.commit().await.unwrap_err();
        assert!(matches!(
            err,
            LoadError::Timeout {
                kind: TimeoutKind::Finish,
                ..
            }
        ));
        assert!(warehouse.open_streams().is_empty());
        assert!(pool.reports().iter().all(|r| !r.is_committed()));
    }

    #[tokio::test]
    async fn abort_discards_buffered_batches() {
        let warehouse = MockWarehouse::new();
        let mut pool = pool(&warehouse, task_config(options(2), 2));
        pool.start().await.unwrap();
        pool.dispatch(batch(0, 0, 4)).await.unwrap();

        pool.abort().await;
        assert_eq!(pool.state(), PoolState::Aborted);
        assert!(warehouse.open_streams().is_empty());
        assert!(warehouse.streams().iter().all(|s| s.discarded));
        assert_eq!(warehouse.committed_rows(), 0);
        assert!(
            pool.reports()
                .iter()
                .all(|r| r.status == WorkerStatus::Aborted)
        );

        let err = pool.dispatch(batch(0, 4, 1)).await.unwrap_err();
        assert!(matches!(err, LoadError::Aborted(_) | LoadError::InvalidState(_)));
        assert!(pool.commit().await.is_err());
    }

    #[tokio::test]
    #[traced_test]
    async fn abort_after_commit_is_a_no_op() {
        let warehouse = MockWarehouse::new();
        let mut pool = pool(&warehouse, task_config(options(2), 2));
        pool.start().await.unwrap();
        pool.dispatch(batch(0, 0, 3)).await.unwrap();
        pool.dispatch(batch(1, 3, 3)).await.unwrap();

        let reports = pool.commit().await.unwrap();
        let streams = warehouse.streams();

        pool.abort().await;
        pool.abort().await;

        assert_eq!(pool.state(), PoolState::Committed);
        assert_eq!(pool.reports(), reports.as_slice());
        assert_eq!(warehouse.streams(), streams);
        assert!(streams.iter().all(|s| s.finished && !s.discarded));
        assert!(logs_contain("Load pool committed"));
        assert!(logs_contain("Abort ignored, pool already closed"));
    }

    #[tokio::test]
    async fn commit_twice_is_rejected() {
        let warehouse = MockWarehouse::new();
        let mut pool = pool(&warehouse, task_config(options(1), 1));
        pool.start().await.unwrap();
        pool.commit().await.unwrap();

        let err = pool.commit().await.unwrap_err();
        assert!(matches!(err, LoadError::InvalidState(_)));
        assert_eq!(pool.state(), PoolState::Committed);
    }
}
