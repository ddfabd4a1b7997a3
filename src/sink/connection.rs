// Pooled connection to the PostgreSQL sink.
use crate::config::DatabaseConfig;
use crate::error::Result;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let url = format!(
            "postgresql://{}:{}@{}:{}/{}",
            config.user, config.password, config.host, config.port, config.database
        );

        info!("connecting to sink database at {}:{}", config.host, config.port);

        let pool = PgPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&url)
            .await?;

        info!("sink connection pool established");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        info!("running sink migrations");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("sink migrations completed");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Creates the per-project `raw_<uid>`/`aux_<uid>`/`mart_<uid>` schemas.
    /// Table DDL within those schemas is owned by a separate migration
    /// process, not this engine: `db init` only provisions the namespaces
    /// the catalog's `fq_name` writes into.
    pub async fn ensure_project_schemas(&self, project_uid: &str) -> Result<()> {
        for prefix in ["raw", "aux", "mart"] {
            let schema = format!("{prefix}_{project_uid}");
            info!(schema = %schema, "ensuring sink schema exists");
            sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {schema}"))
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }
}
