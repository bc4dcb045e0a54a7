//! Entrypoint of the shardroute binary
#![warn(clippy::explicit_iter_loop, clippy::use_self)]

use dotenvy::dotenv;

mod commands {
    pub(crate) mod check;
    pub(crate) mod common;
    pub(crate) mod route;
}
mod logging;

enum ReturnCode {
    Failure = 1,
}

#[derive(Debug, clap::Parser)]
#[clap(
    name = "shardroute",
    version,
    about = "Sharding rule validation and statement routing",
    long_about = r#"Sharding rule validation and statement routing

Examples:
    # Validate a sharding rule file
    shardroute check --rules rules.json

    # Route a bound statement and print one line per route unit
    shardroute route --rules rules.json --statement select.json

    # Route with debug logging, printing the route as JSON
    LOG_FILTER=debug shardroute route --rules rules.json --statement select.json --format json
"#
)]
struct Config {
    #[clap(flatten)]
    logging_config: logging::LoggingConfig,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Load a sharding rule file and report whether it is valid
    Check(commands::check::Config),

    /// Compute the route of a bound statement
    Route(commands::route::Config),
}

fn main() {
    // load all environment variables from .env before doing anything
    load_dotenv();

    let config: Config = clap::Parser::parse();

    if let Err(e) = logging::init_logs(&config.logging_config) {
        eprintln!("Initializing logs failed: {e}");
        std::process::exit(ReturnCode::Failure as _);
    }

    match config.command {
        None => println!("command required, -h/--help for help"),
        Some(Command::Check(config)) => {
            if let Err(e) = commands::check::command(config) {
                eprintln!("Check command failed: {e}");
                std::process::exit(ReturnCode::Failure as _)
            }
        }
        Some(Command::Route(config)) => {
            if let Err(e) = commands::route::command(config) {
                eprintln!("Route command failed: {e}");
                std::process::exit(ReturnCode::Failure as _)
            }
        }
    }
}

/// Source the .env file before initialising the Config struct - this sets
/// any envs in the file, which the Config struct then uses.
///
/// Precedence is given to existing env variables.
fn load_dotenv() {
    match dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            // a missing env file is not an error
        }
        Err(e) => {
            eprintln!("FATAL Error loading config from: {e}");
            eprintln!("Aborting");
            std::process::exit(ReturnCode::Failure as _);
        }
    };
}
