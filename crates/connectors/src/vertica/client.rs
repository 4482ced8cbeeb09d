use crate::{
    error::DbError,
    params::ConnectionParams,
    vertica::{
        copy::{copy_statement, resource_pool_statement},
        stream::CopyStream,
    },
    warehouse::{LoadRequest, LoadStream, QueryResult, WarehouseClient, WarehouseConnection},
};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls, SimpleQueryMessage};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct VerticaClient;

impl VerticaClient {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl WarehouseClient for VerticaClient {
    async fn connect(
        &self,
        params: &ConnectionParams,
    ) -> Result<Box<dyn WarehouseConnection>, DbError> {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&params.host)
            .port(params.port)
            .user(&params.user)
            .password(&params.password)
            .dbname(&params.database);

        let (client, connection) =
            config
                .connect(NoTls)
                .await
                .map_err(|e| DbError::Connect {
                    endpoint: params.endpoint(),
                    source: Box::new(e),
                })?;

        let endpoint = params.endpoint();
        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!(endpoint = %endpoint, error = %e, "Warehouse connection terminated");
            }
        });

        debug!(endpoint = %params.endpoint(), "Warehouse connection established");

        let mut conn = VerticaConnection {
            client: Arc::new(client),
            driver: Some(driver),
        };

        if let Some(pool) = &params.resource_pool {
            conn.query(&resource_pool_statement(pool)).await?;
        }

        Ok(Box::new(conn))
    }
}

pub struct VerticaConnection {
    client: Arc<Client>,
    driver: Option<JoinHandle<()>>,
}

#[async_trait]
impl WarehouseConnection for VerticaConnection {
    async fn query(&mut self, sql: &str) -> Result<QueryResult, DbError> {
        if self.driver.is_none() {
            return Err(DbError::Closed);
        }

        info!("{sql}");
        let messages = self.client.simple_query(sql).await?;

        let mut result = QueryResult::default();
        for message in messages {
            if let SimpleQueryMessage::Row(row) = message {
                if result.columns.is_empty() {
                    result.columns = row
                        .columns()
                        .iter()
                        .map(|c| c.name().to_string())
                        .collect();
                }
                result
                    .rows
                    .push((0..row.len()).map(|i| row.get(i).map(str::to_string)).collect());
            }
        }

        Ok(result)
    }

    async fn begin_load(&mut self, request: &LoadRequest) -> Result<Box<dyn LoadStream>, DbError> {
        if self.driver.is_none() {
            return Err(DbError::Closed);
        }

        let statement = copy_statement(request);
        info!("{statement}");

        let sink = self.client.copy_in::<_, Bytes>(statement.as_str()).await?;
        Ok(Box::new(CopyStream::new(
            self.client.clone(),
            sink,
            format!("{}.{}", request.schema, request.table),
        )))
    }

    async fn close(&mut self) -> Result<(), DbError> {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
        Ok(())
    }
}

impl Drop for VerticaConnection {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}
