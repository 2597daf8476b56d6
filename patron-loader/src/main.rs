use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::io;

use patron_loader::cli::Cli;
use patron_loader::config::Config;
use patron_loader::loader::Loader;
use patron_loader::shell::Shell;
use patron_loader::spreadsheet::read_rows;
use patron_loader::store::SqliteStore;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine
    dotenvy::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::resolve(Cli::parse())?;
    log::debug!("Resolved config: {:?}", config);

    let store = SqliteStore::connect(&config.database_url).await?;
    log::info!("Connected to {}", config.database_url);

    let rows = read_rows(&config.input)
        .with_context(|| format!("Couldn't load input {}", config.input.display()))?;

    let mut loader = Loader::new(&store, config.load_options());
    let summary = loader.run(&rows).await.context("Reload failed")?;
    summary.log();
    println!("{}", summary.to_string().green());

    if config.run_shell {
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        Shell::new(&store, config.result_limit)
            .run(stdin.lock(), &mut stdout)
            .await?;
    }

    Ok(())
}
