//! db-probe - Connect to a database, run one query, report what happened.

mod cli;
mod logging;

use anyhow::Context;
use cli::Cli;
use db_probe::config::{ConfigSource, Properties};
use db_probe::db::DriverRegistry;
use db_probe::error::EXIT_INTERNAL;
use db_probe::probe;
use std::io;
use tracing::error;

fn main() {
    // Load .env file (optional, ignore if missing)
    let _ = dotenvy::dotenv();

    logging::init_stderr_logging();

    let cli = match Cli::parse_args() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(cli::usage_exit_code(&e));
        }
    };
    let registry = DriverRegistry::with_default_drivers();

    if cli.list_drivers {
        for name in registry.names() {
            println!("{name}");
        }
        return;
    }

    let source = ConfigSource::from_arg(cli.config, || Properties::from_env_vars(std::env::vars()));

    let code = match run(&source, &registry) {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            EXIT_INTERNAL
        }
    };
    std::process::exit(code);
}

fn run(source: &ConfigSource, registry: &DriverRegistry) -> anyhow::Result<i32> {
    // One connection, one statement, one cursor: a single thread is enough
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    let stdout = io::stdout();
    let stderr = io::stderr();
    let code = runtime.block_on(probe::run(
        source,
        registry,
        &mut stdout.lock(),
        &mut stderr.lock(),
    ));
    Ok(code)
}
