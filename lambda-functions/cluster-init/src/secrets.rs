use crate::config::SecretId;
use crate::error::SecretStoreError;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use aws_sdk_secretsmanager::Client as SecretsManagerClient;
use bon::Builder;
use serde::{Deserialize, Deserializer};
use std::fmt;
use tracing::info;

#[cfg(test)]
use mockall::automock;

const DEFAULT_PORT: u16 = 5432;

/// Connection details stored in the cluster secret.
#[derive(Builder, Deserialize, Clone, PartialEq, Eq)]
#[builder(on(String, into))]
pub struct Credentials {
    pub host: String,

    #[builder(default = DEFAULT_PORT)]
    #[serde(default = "default_port", deserialize_with = "deserialize_port")]
    pub port: u16,

    #[serde(rename = "dbname")]
    pub database: String,

    pub username: String,

    pub password: String,
}

impl Credentials {
    pub fn from_secret_json(payload: &str) -> Result<Self, SecretStoreError> {
        Ok(serde_json::from_str(payload)?)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

// Rotation functions may rewrite the port as a string.
fn deserialize_port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Number(port) => Ok(port),
        Port::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Returns the raw `SecretString` of the secret.
    async fn get_secret(&self, id: &SecretId) -> Result<String, SecretStoreError>;
}

pub struct SecretsManagerStore {
    client: SecretsManagerClient,
}

impl SecretsManagerStore {
    pub fn new(client: SecretsManagerClient) -> Self {
        Self { client }
    }

    pub async fn from_env() -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        Self::new(SecretsManagerClient::new(&config))
    }
}

#[async_trait]
impl SecretStore for SecretsManagerStore {
    async fn get_secret(&self, id: &SecretId) -> Result<String, SecretStoreError> {
        info!("Fetching secret {}", id);

        let output = self
            .client
            .get_secret_value()
            .secret_id(id.as_str())
            .send()
            .await
            .map_err(|e| SecretStoreError::Request(DisplayErrorContext(&e).to_string()))?;

        output
            .secret_string
            .ok_or_else(|| SecretStoreError::MissingSecretString(id.to_string()))
    }
}
