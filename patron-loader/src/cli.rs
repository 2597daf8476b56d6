//! Command-line arguments

use clap::Parser;
use std::path::PathBuf;

use crate::loader::DEFAULT_BATCH_SIZE;
use crate::shell::DEFAULT_RESULT_LIMIT;

/// Environment variable holding the database connection string
pub const DATABASE_URL_ENV: &str = "SFILS_DATABASE_URL";

#[derive(Parser, Debug, Clone)]
#[command(
    name = "patron-loader",
    version,
    about = "Reload the library patron spreadsheet into a database and query it",
    after_help = "\
Runs a full reload (drop, re-index, load) and then opens an interactive shell.

Shell examples:
  patrons|{\"within_sf_county\": true}
  libraries|{\"code\": \"X\"}
  patron_types|{}
  benchmark"
)]
pub struct Cli {
    /// Database connection string (default: sqlite://sfils.db?mode=rwc)
    #[arg(long, env = DATABASE_URL_ENV)]
    pub database_url: Option<String>,

    /// Spreadsheet to load (.xlsx, .xls, .ods or .csv)
    #[arg(long, short = 'i', default_value = "data/sfpl.xlsx")]
    pub input: PathBuf,

    /// Records per bulk insert
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Maximum rows printed per shell query
    #[arg(long, default_value_t = DEFAULT_RESULT_LIMIT)]
    pub limit: usize,

    /// Load and exit without opening the shell
    #[arg(long)]
    pub no_shell: bool,
}
