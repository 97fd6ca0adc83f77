use clap::Parser;
use tracing_subscriber::EnvFilter;

use eb_cli::cli::{self, Cli, Command, ConfigCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    match args.command {
        Command::Call { tool, params, json } => {
            let (config, config_path) = cli::load_valid_config()?;
            init_cli_tracing(&config.logging.filter, args.verbose);
            cli::call::run(&config, &config_path, &tool, &params, json).await
        }
        Command::Catalog { category, json } => cli::catalog::run(category.as_deref(), json),
        Command::Ping => {
            let (config, config_path) = cli::load_valid_config()?;
            init_cli_tracing(&config.logging.filter, args.verbose);
            cli::ping::run(&config, &config_path).await
        }
        Command::Config(ConfigCommand::Validate) => {
            let (config, config_path) = cli::load_config()?;
            if !cli::config::validate(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Show) => {
            let (config, _config_path) = cli::load_config()?;
            cli::config::show(&config)
        }
        Command::Version => {
            println!("editor-bridge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Compact logs on stderr so stdout stays clean for command output.
/// `RUST_LOG` wins over the config file's filter.
fn init_cli_tracing(config_filter: &str, verbose: bool) {
    let default = if verbose { "info" } else { config_filter };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
