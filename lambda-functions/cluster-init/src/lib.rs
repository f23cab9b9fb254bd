pub mod config;
pub mod error;
pub mod postgres;
pub mod probe;
pub mod secrets;

pub use config::{Config, SecretId};
pub use error::{DbError, InitError, SecretStoreError};
pub use postgres::{DatabaseConnector, PostgresConnector, RawConnection, SchemaBuilder};
pub use probe::{
    ColumnSpec, ColumnType, ProbeIdGenerator, ProbeRow, RandomProbeIds, TableName, PROBE_COLUMNS,
    PROBE_EXTENSION,
};
pub use secrets::{Credentials, SecretStore, SecretsManagerStore};

use bon::Builder;
use serde::Serialize;
use tracing::{debug, error, info, warn};

pub const SUCCESS_BODY: &str = "Success";

/// What the function hands back to its trigger. Shaped so an API Gateway
/// proxy integration can return it as-is.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResultEnvelope {
    pub status_code: u16,
    pub body: String,
}

impl ResultEnvelope {
    pub fn success() -> Self {
        Self {
            status_code: 200,
            body: SUCCESS_BODY.to_string(),
        }
    }

    pub fn failure(body: impl Into<String>) -> Self {
        Self {
            status_code: 500,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

impl From<InitError> for ResultEnvelope {
    fn from(err: InitError) -> Self {
        Self::failure(err.to_string())
    }
}

/// Checks that exactly the inserted row came back.
pub fn verify_round_trip(expected: &ProbeRow, rows: &[ProbeRow]) -> Result<(), InitError> {
    match rows {
        [only] if only == expected => Ok(()),
        _ => Err(InitError::Verification {
            expected: format!("{:?}", expected),
            found: format!("{:?}", rows),
        }),
    }
}

/// Secret lookup, connectivity probe, probe table creation and a
/// write/read round trip, in that order. The first failing step ends the run.
#[derive(Builder)]
pub struct ClusterInitService<S, C, G> {
    secret_store: S,
    connector: C,
    id_generator: G,
    secret_id: SecretId,
}

impl<S, C, G> ClusterInitService<S, C, G>
where
    S: SecretStore,
    C: DatabaseConnector,
    G: ProbeIdGenerator,
{
    pub async fn resolve_credentials(&self) -> Result<Credentials, InitError> {
        let payload = self
            .secret_store
            .get_secret(&self.secret_id)
            .await
            .map_err(|e| {
                error!("Error fetching secret {}: {}", self.secret_id, e);
                InitError::SecretFetch(e)
            })?;

        let credentials = Credentials::from_secret_json(&payload).map_err(|e| {
            error!("Error parsing secret {}: {}", self.secret_id, e);
            InitError::SecretFetch(e)
        })?;

        debug!("Secret received: {:?}", credentials);
        Ok(credentials)
    }

    /// Runs every step and returns the rows read back from the probe table.
    pub async fn initialize(&self) -> Result<Vec<ProbeRow>, InitError> {
        let credentials = self.resolve_credentials().await?;

        let connection = self
            .connector
            .connect(&credentials)
            .await
            .map_err(InitError::Connection)?;
        info!("DB Client Connected");

        // The extension may already exist; failure here is never fatal.
        if let Err(e) = connection.ensure_extension(PROBE_EXTENSION).await {
            warn!("Ignoring {}", InitError::ExtensionSetup(e));
        }

        let schema = self.connector.schema_builder(&credentials);
        let table = self.id_generator.table_name();

        schema
            .create_table(&table, &PROBE_COLUMNS)
            .await
            .map_err(InitError::SchemaCreation)?;
        info!("Created table {}", table);

        let row = ProbeRow::for_id(self.id_generator.row_id());
        schema
            .insert(&table, &row)
            .await
            .map_err(InitError::Insert)?;

        let rows = schema
            .select(&table, &PROBE_COLUMNS)
            .await
            .map_err(InitError::Select)?;
        info!("Selected rows from {}: {:?}", table, rows);

        verify_round_trip(&row, &rows)?;
        Ok(rows)
    }

    pub async fn run_initialization(&self) -> ResultEnvelope {
        match self.initialize().await {
            Ok(_) => ResultEnvelope::success(),
            Err(e) => {
                error!("Initialization failed: {}", e);
                ResultEnvelope::from(e)
            }
        }
    }
}
