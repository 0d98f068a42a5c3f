use std::error::Error;

use clap::Parser;
use migration::{Migrator, MigratorTrait};

mod cli;
mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = cli::Cli::parse();
    let settings = settings::Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "housemates={level},engine={level}",
            level = settings.app.level
        ))
        .with_writer(std::io::stderr)
        .init();

    let url = cli
        .database_url
        .clone()
        .unwrap_or_else(|| settings.database.url());
    tracing::debug!("connecting to {url}");
    let db = connect_db(&url).await?;

    let engine = engine::Engine::builder().database(db).build().await?;
    cli::run(&engine, cli.command).await
}

async fn connect_db(
    database_url: &str,
) -> Result<sea_orm::DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let database = sea_orm::Database::connect(database_url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}
