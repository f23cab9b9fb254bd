use crate::error::DbError;
use crate::probe::{
    quote_ident, ColumnSpec, ProbeRow, TableName, ID_COLUMN, NAME_COLUMN, PATH_COLUMN,
    PROBE_EXTENSION,
};
use crate::secrets::Credentials;
use async_trait::async_trait;
use tokio::sync::OnceCell;
use tokio_postgres::{Client, NoTls, Row};
use tracing::{error, info};

#[cfg(test)]
use mockall::automock;

/// A plain connection that can run raw SQL.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RawConnection: Send + Sync {
    async fn query(&self, sql: &str) -> Result<(), DbError>;

    async fn ensure_extension(&self, name: &str) -> Result<(), DbError> {
        self.query(&create_extension_sql(name)).await
    }
}

/// Table-level operations against the probe table.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SchemaBuilder: Send + Sync {
    async fn create_table(&self, table: &TableName, columns: &[ColumnSpec]) -> Result<(), DbError>;

    async fn insert(&self, table: &TableName, row: &ProbeRow) -> Result<u64, DbError>;

    async fn select(
        &self,
        table: &TableName,
        columns: &[ColumnSpec],
    ) -> Result<Vec<ProbeRow>, DbError>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait DatabaseConnector: Send + Sync {
    async fn connect(&self, credentials: &Credentials) -> Result<Box<dyn RawConnection>, DbError>;

    /// Builds a schema client. It does not touch the network until first used.
    fn schema_builder(&self, credentials: &Credentials) -> Box<dyn SchemaBuilder>;
}

pub fn create_extension_sql(name: &str) -> String {
    format!("CREATE EXTENSION IF NOT EXISTS {}", quote_ident(name))
}

pub fn create_table_sql(table: &TableName, columns: &[ColumnSpec]) -> String {
    let definitions = columns
        .iter()
        .map(ColumnSpec::definition)
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE {} ({})", table.quoted(), definitions)
}

pub fn insert_sql(table: &TableName) -> String {
    format!(
        "INSERT INTO {} ({}, {}, {}) VALUES ($1, $2, $3::text::{})",
        table.quoted(),
        quote_ident(ID_COLUMN),
        quote_ident(NAME_COLUMN),
        quote_ident(PATH_COLUMN),
        PROBE_EXTENSION
    )
}

pub fn select_sql(table: &TableName, columns: &[ColumnSpec]) -> String {
    let projection = columns
        .iter()
        .map(ColumnSpec::projection)
        .collect::<Vec<_>>()
        .join(", ");
    format!("SELECT {} FROM {}", projection, table.quoted())
}

fn pg_config(credentials: &Credentials) -> tokio_postgres::Config {
    let mut config = tokio_postgres::Config::new();
    config
        .host(&credentials.host)
        .port(credentials.port)
        .dbname(&credentials.database)
        .user(&credentials.username)
        .password(&credentials.password);
    config
}

async fn open_client(credentials: &Credentials) -> Result<Client, DbError> {
    let (client, connection) = pg_config(credentials).connect(NoTls).await?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!("Database connection error: {}", e);
        }
    });

    Ok(client)
}

fn probe_row_from(row: &Row) -> Result<ProbeRow, DbError> {
    Ok(ProbeRow {
        id: row.try_get(ID_COLUMN)?,
        name: row.try_get(NAME_COLUMN)?,
        test_ltree: row.try_get(PATH_COLUMN)?,
    })
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresConnector;

#[async_trait]
impl DatabaseConnector for PostgresConnector {
    async fn connect(&self, credentials: &Credentials) -> Result<Box<dyn RawConnection>, DbError> {
        info!(
            "Connecting to {}:{}/{}",
            credentials.host, credentials.port, credentials.database
        );
        let client = open_client(credentials).await?;
        Ok(Box::new(PostgresConnection { client }))
    }

    fn schema_builder(&self, credentials: &Credentials) -> Box<dyn SchemaBuilder> {
        Box::new(PostgresSchemaBuilder::new(credentials.clone()))
    }
}

pub struct PostgresConnection {
    client: Client,
}

#[async_trait]
impl RawConnection for PostgresConnection {
    async fn query(&self, sql: &str) -> Result<(), DbError> {
        self.client.batch_execute(sql).await?;
        Ok(())
    }
}

/// Connects on first use, the way a query-builder client does.
pub struct PostgresSchemaBuilder {
    credentials: Credentials,
    client: OnceCell<Client>,
}

impl PostgresSchemaBuilder {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> Result<&Client, DbError> {
        self.client
            .get_or_try_init(|| open_client(&self.credentials))
            .await
    }
}

#[async_trait]
impl SchemaBuilder for PostgresSchemaBuilder {
    async fn create_table(&self, table: &TableName, columns: &[ColumnSpec]) -> Result<(), DbError> {
        let sql = create_table_sql(table, columns);
        self.client().await?.batch_execute(&sql).await?;
        Ok(())
    }

    async fn insert(&self, table: &TableName, row: &ProbeRow) -> Result<u64, DbError> {
        let inserted = self
            .client()
            .await?
            .execute(
                insert_sql(table).as_str(),
                &[&row.id, &row.name, &row.test_ltree],
            )
            .await?;
        Ok(inserted)
    }

    async fn select(
        &self,
        table: &TableName,
        columns: &[ColumnSpec],
    ) -> Result<Vec<ProbeRow>, DbError> {
        let rows = self
            .client()
            .await?
            .query(select_sql(table, columns).as_str(), &[])
            .await?;
        rows.iter().map(probe_row_from).collect()
    }
}
