use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::str::FromStr;

use crate::adapter::{AdapterOptions, TableAdapter};
use crate::error::Result;
use crate::fields::FieldNamesOverride;

/// Adapter settings read from a config file and `CASBIN_ADAPTER__*` variables
#[derive(Debug, Deserialize, Clone)]
#[allow(unused)]
pub struct AdapterSettings {
    pub database_url: String,
    #[serde(default)]
    pub table_name: Option<String>,
    #[serde(default)]
    pub field_names: FieldNamesOverride,
    pub max_connections: u32,
    pub create_if_missing: bool,
}

impl AdapterSettings {
    pub fn get_environment() -> Environment {
        Environment::default()
            .prefix("CASBIN_ADAPTER")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("field_names.values")
    }

    fn builder() -> Result<ConfigBuilder<DefaultState>> {
        Ok(Config::builder()
            .set_default("database_url", "sqlite::memory:")?
            .set_default("max_connections", 5u32)?
            .set_default("create_if_missing", true)?)
    }

    /// Load from the optional `config/casbin_adapter.{yaml,toml}` file and the
    /// environment
    pub fn new() -> Result<Self> {
        let settings = Self::builder()?
            .add_source(File::with_name("config/casbin_adapter").required(false))
            .add_source(Self::get_environment())
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Load from a specific file, still letting the environment override it
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = Self::builder()?
            .add_source(File::with_name(path))
            .add_source(Self::get_environment())
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn adapter_options(&self) -> AdapterOptions {
        AdapterOptions {
            table_name: self.table_name.clone(),
            field_names: self.field_names.clone(),
        }
    }
}

/// Open a SQLite pool with WAL journaling for the configured database.
#[tracing::instrument(skip(settings), fields(max_connections = settings.max_connections))]
pub async fn create_pool(settings: &AdapterSettings) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&settings.database_url)?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .create_if_missing(settings.create_if_missing);

    let pool = SqlitePoolOptions::new()
        .max_connections(settings.max_connections)
        .connect_with(options)
        .await?;

    tracing::debug!("database pool created");
    Ok(pool)
}

impl TableAdapter {
    /// Open the configured database and build an adapter on top of it
    pub async fn from_settings(settings: &AdapterSettings) -> Result<Self> {
        let pool = create_pool(settings).await?;
        Self::with_options(pool, settings.adapter_options())
    }
}
