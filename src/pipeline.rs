use std::time::Duration;

use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::{
    Error, Result,
    catalog::CatalogManager,
    config::WarehouseConfig,
    loader::StagingLoader,
    transform::TransformEngine,
};

/// Owns the warehouse connection pool and sequences the pipeline's two entry
/// points. Everything runs on a single logical connection path: one
/// statement in flight, no retries, first failure wins. The pool releases
/// its connections when the last clone drops, so every exit path returns
/// them.
#[derive(Clone)]
pub struct Pipeline {
    pool: PgPool,
    schema: String,
}

impl Pipeline {
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPool::connect(url).await.map_err(Error::Connect)?;
        Ok(Self {
            pool,
            schema: "public".to_string(),
        })
    }

    /// Connect from typed configuration; credentials never pass through a
    /// URL string.
    pub async fn connect_with(config: &WarehouseConfig) -> Result<Self> {
        let pool = PgPool::connect_with(config.cluster.connect_options())
            .await
            .map_err(Error::Connect)?;
        Ok(Self {
            pool,
            schema: "public".to_string(),
        })
    }

    pub fn builder(url: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder::new(url)
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    pub fn catalog(&self) -> CatalogManager {
        CatalogManager::new(self.pool.clone(), self.schema.clone())
    }

    pub fn loader(&self) -> StagingLoader {
        StagingLoader::new(self.pool.clone(), self.schema.clone())
    }

    pub fn transform(&self) -> TransformEngine {
        TransformEngine::new(self.pool.clone(), self.schema.clone())
    }

    /// Setup entry point: drop list then create list, committing after every
    /// statement. Safe to repeat; drops are `if exists`.
    pub async fn setup_schema(&self) -> Result<()> {
        self.catalog().reset().await
    }

    /// Run entry point: bulk-load staging, then populate the star schema.
    /// Requires a prior [`Pipeline::setup_schema`] and empty targets; errors
    /// propagate to the caller.
    pub async fn run(&self, config: &WarehouseConfig) -> Result<()> {
        self.loader().load_all(config).await?;
        self.transform().run().await
    }

    /// Lightweight liveness check for the connection pool.
    pub async fn pool_health(&self) -> Result<PoolHealth> {
        let one: i32 = sqlx::query_scalar("select 1")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Connect)?;
        Ok(PoolHealth { ok: one == 1 })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PoolHealth {
    pub ok: bool,
}

pub struct PipelineBuilder {
    url: String,
    schema: String,
    max_connections: Option<u32>,
    connect_timeout: Option<Duration>,
}

impl PipelineBuilder {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            schema: "public".to_string(),
            max_connections: None,
            connect_timeout: None,
        }
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = Some(max.max(1));
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub async fn build(self) -> Result<Pipeline> {
        let mut opts = PgPoolOptions::new();
        if let Some(max) = self.max_connections {
            opts = opts.max_connections(max);
        }
        if let Some(t) = self.connect_timeout {
            opts = opts.acquire_timeout(t);
        }
        let pool = opts.connect(&self.url).await.map_err(Error::Connect)?;
        Ok(Pipeline {
            pool,
            schema: self.schema,
        })
    }
}
