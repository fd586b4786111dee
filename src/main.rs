// Copyright 2023 Remi Bernotavicius

use clap::Parser;
use clap::Subcommand;
use std::path::PathBuf;

mod api;
mod config;
mod context;
mod database;
mod error;
mod images;
mod ingredients;
mod pagination;
mod recipes;
mod shopping_list;
mod tags;
#[cfg(test)]
mod testing;
mod toggle;
mod users;

pub use error::{Error, Result};

#[derive(Parser, Debug)]
#[command(about = "Recipe sharing service")]
struct Args {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending migrations and serve the HTTP API.
    Serve,
    /// Apply pending migrations and exit.
    Migrate,
}

/// This is where the database and uploaded media live by default. On Linux it should be like:
/// `~/.local/share/recipe_share/`
fn data_path() -> Result<PathBuf> {
    let dirs = directories::BaseDirs::new()
        .ok_or_else(|| Error::Config("failed to get user home directory".into()))?;
    let path = dirs.data_dir().join("recipe_share");
    std::fs::create_dir_all(&path)?;
    Ok(path)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = config::Config::load(data_path()?)?;

    simple_logger::SimpleLogger::new()
        .with_level(config.log_level)
        .env()
        .init()
        .map_err(|e| Error::Config(format!("failed to install logger: {e}")))?;

    match args.commands {
        Commands::Serve => api::serve(config).await?,
        Commands::Migrate => {
            database::establish_pool(&config.database_path, 1)?;
            log::info!("database {:?} is up to date", config.database_path);
        }
    }
    Ok(())
}
