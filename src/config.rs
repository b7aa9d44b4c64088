use std::fmt;
use std::path::Path;

use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;

use crate::{Error, Result};

/// Everything the pipeline needs to know about the outside world: the
/// warehouse cluster, the two object-storage inputs, and the credential the
/// warehouse assumes when it pulls from storage.
///
/// The config is an explicit value threaded into whichever component needs
/// it; nothing in this crate reads settings at import time.
#[derive(Clone, Debug, Deserialize)]
pub struct WarehouseConfig {
    pub cluster: ClusterConfig,
    pub storage: StorageConfig,
    pub iam: IamConfig,
}

#[derive(Clone, Deserialize)]
pub struct ClusterConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
}

/// Object-storage locations for the two raw inputs. `log_jsonpaths` is the
/// format-mapping descriptor applied to the event files; the song files are
/// parsed with automatic field mapping.
#[derive(Clone, Debug, Deserialize)]
pub struct StorageConfig {
    pub log_data: String,
    pub log_jsonpaths: String,
    pub song_data: String,
    #[serde(default = "default_region")]
    pub region: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct IamConfig {
    pub role_arn: String,
}

fn default_port() -> u16 {
    5439
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl WarehouseConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))
    }
}

impl ClusterConfig {
    /// Typed connect options; credentials never pass through a URL string.
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.dbname)
            .username(&self.user)
            .password(&self.password)
    }
}

impl fmt::Debug for ClusterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [cluster]
        host = "warehouse.example.com"
        dbname = "dev"
        user = "loader"
        password = "hunter2"

        [storage]
        log_data = "s3://bucket/log_data"
        log_jsonpaths = "s3://bucket/log_json_path.json"
        song_data = "s3://bucket/song_data"

        [iam]
        role_arn = "arn:aws:iam::123456789012:role/dwhRole"
    "#;

    #[test]
    fn parses_toml_with_defaults() {
        let config = WarehouseConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.cluster.host, "warehouse.example.com");
        assert_eq!(config.cluster.port, 5439);
        assert_eq!(config.storage.region, "us-east-1");
        assert_eq!(config.iam.role_arn, "arn:aws:iam::123456789012:role/dwhRole");
    }

    #[test]
    fn debug_redacts_password() {
        let config = WarehouseConfig::from_toml(SAMPLE).unwrap();
        let rendered = format!("{:?}", config.cluster);
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn missing_section_is_a_config_error() {
        let err = WarehouseConfig::from_toml("[cluster]\nhost = \"h\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
