use crate::error::InitError;
use figment::providers::Env;
use figment::Figment;
use serde::Deserialize;
use std::fmt;

pub const SECRET_ARN_VAR: &str = "DB_SECRET_ARN";

/// Identifier of the secret holding the cluster credentials. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretId(String);

impl SecretId {
    pub fn new(id: impl Into<String>) -> Result<Self, InitError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(InitError::Configuration(format!(
                "{} must not be empty",
                SECRET_ARN_VAR
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SecretId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Deserialize)]
struct EnvVars {
    db_secret_arn: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub secret_id: SecretId,
}

impl Config {
    pub fn load() -> Result<Self, InitError> {
        Self::from_figment(Figment::new().merge(Env::raw().only(&[SECRET_ARN_VAR])))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, InitError> {
        let env: EnvVars = figment
            .extract()
            .map_err(|e| InitError::Configuration(e.to_string()))?;

        let secret_arn = env
            .db_secret_arn
            .ok_or_else(|| InitError::Configuration(format!("{} is not set", SECRET_ARN_VAR)))?;

        Ok(Self {
            secret_id: SecretId::new(secret_arn)?,
        })
    }
}
