//! Handles settings for the application. Configuration is read from an
//! optional `settings.toml` and from `HOUSEMATES__*` environment variables.
//!
//! ```toml
//! [app]
//! level = "debug"
//!
//! [database]
//! sqlite = "./housemates.db"
//! ```
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    pub level: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

impl Database {
    pub fn url(&self) -> String {
        match self {
            Database::Memory => String::from("sqlite::memory:"),
            Database::Sqlite(path) => format!("sqlite:{path}?mode=rwc"),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    pub database: Database,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("app.level", "info")?
            .set_default("database.sqlite", "./housemates.db")?
            .add_source(File::with_name("settings").required(false))
            .add_source(Environment::with_prefix("HOUSEMATES").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}
