//! Layered configuration (A1, §4.9, §6.4): CLI flag beats environment
//! variable beats compiled-in default. The CLI surface in §6.4 is the
//! entire configuration surface of this service, so this is a small `clap`
//! struct rather than a file-based layered-config system — that would be
//! more machinery than a two-knob service needs.

use clap::Parser;

const DEFAULT_LISTEN: &str = "0.0.0.0:8000";
const DEFAULT_DB: &str = "./data.sqlite";

/// `server [-l|--listen ADDR] [-d|--db PATH]`
#[derive(Debug, Parser)]
#[command(name = "pqrelay-server", version, about = "PQXDH directory and relay server")]
pub struct Cli {
    /// Address to bind the HTTP/WebSocket listener to.
    #[arg(short, long, env = "PQRELAY_LISTEN")]
    listen: Option<String>,

    /// Path to the SQLite database file.
    #[arg(short, long, env = "PQRELAY_DB")]
    db: Option<String>,
}

/// Resolved configuration: CLI flag > environment variable > default.
/// `clap`'s `env` attribute already folds the first two together; this
/// struct only has to supply the compiled-in default for whichever of the
/// two the user didn't set.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    pub db_path: String,
}

impl Config {
    pub fn resolve() -> Self {
        Self::from_cli(Cli::parse())
    }

    fn from_cli(cli: Cli) -> Self {
        Self {
            listen: cli.listen.unwrap_or_else(|| DEFAULT_LISTEN.to_string()),
            db_path: cli.db.unwrap_or_else(|| DEFAULT_DB.to_string()),
        }
    }
}
