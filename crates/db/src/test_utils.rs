//! Throwaway `PostgreSQL` databases for integration tests.

use sea_orm::{ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr, Statement};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use crate::migrations::Migrator;

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Where the test server lives, read from `TEST_DB_*` variables.
#[derive(Debug, Clone)]
pub struct TestDbConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Database to use, or the prefix of per-test databases.
    pub database: String,
}

impl Default for TestDbConfig {
    fn default() -> Self {
        Self {
            host: env_or("TEST_DB_HOST", "localhost"),
            port: std::env::var("TEST_DB_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5433),
            username: env_or("TEST_DB_USER", "formdesk_test"),
            password: env_or("TEST_DB_PASSWORD", "formdesk_test"),
            database: env_or("TEST_DB_NAME", "formdesk_test"),
        }
    }
}

impl TestDbConfig {
    #[must_use]
    pub fn database_url(&self) -> String {
        self.url_for(&self.database)
    }

    /// URL of the maintenance database, used to create and drop test databases.
    #[must_use]
    pub fn postgres_url(&self) -> String {
        self.url_for("postgres")
    }

    fn url_for(&self, database: &str) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{database}",
            self.username, self.password, self.host, self.port
        )
    }
}

async fn run_admin(config: &TestDbConfig, sql: String) -> Result<(), DbErr> {
    let admin = Database::connect(&config.postgres_url()).await?;
    let result = admin
        .execute(Statement::from_string(DatabaseBackend::Postgres, sql))
        .await;
    admin.close().await?;
    result.map(|_| ())
}

/// A migrated test database.
pub struct TestDatabase {
    conn: DatabaseConnection,
    config: TestDbConfig,
}

impl TestDatabase {
    /// Connect to an existing database and bring its schema up to date.
    pub async fn with_config(config: TestDbConfig) -> Result<Self, DbErr> {
        let conn = Database::connect(&config.database_url()).await?;
        Migrator::up(&conn, None).await?;
        info!(database = %config.database, "Connected to test database");
        Ok(Self { conn, config })
    }

    /// Create a fresh database for one test, so tests can run in parallel.
    pub async fn create_unique() -> Result<Self, DbErr> {
        let mut config = TestDbConfig::default();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        config.database = format!("{}_{}", config.database, &suffix[..8]);

        run_admin(&config, format!("CREATE DATABASE \"{}\"", config.database)).await?;

        let db = Self::with_config(config).await?;
        info!(database = %db.config.database, "Created test database");
        Ok(db)
    }

    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Close the connection and drop the database.
    pub async fn drop_database(self) -> Result<(), DbErr> {
        self.conn.close().await?;
        run_admin(
            &self.config,
            format!("DROP DATABASE IF EXISTS \"{}\" WITH (FORCE)", self.config.database),
        )
        .await?;
        info!(database = %self.config.database, "Dropped test database");
        Ok(())
    }
}

