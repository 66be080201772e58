//! shadowlink CLI - reconcile source/mirror relationships and inspect links

use clap::Parser;

use shadowlink_cli::config::Settings;
use shadowlink_cli::error::CliError;
use shadowlink_cli::logging::init_logging;
use shadowlink_cli::{run, Cli};

#[tokio::main]
async fn main() {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let result = match Settings::from_env() {
        Ok(settings) => {
            init_logging(cli.verbose, settings.log_format);
            run(cli, settings).await
        }
        Err(e) => Err(CliError::from(e)),
    };

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}
