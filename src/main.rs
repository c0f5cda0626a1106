use addr_dedupe::cli::{Cli, Command};
use addr_dedupe::config::AppConfig;
use addr_dedupe::error::{ConfigError, exit_code};
use addr_dedupe::logging;
use addr_dedupe::orchestrator::{run_import, run_map, run_reduce};
use addr_dedupe::util::envfile::{load_dotenv_if_present, write_env_template};
use anyhow::Result;
use clap::Parser;
use log::{debug, error, warn};

fn config_or_exit(cfg: Result<AppConfig, ConfigError>) -> AppConfig {
    match cfg {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(2);
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Import(args) => {
            let cfg = config_or_exit(args.to_app_config());
            run_import(&cfg, args.source.as_deref())?;
        }
        Command::Map(args) => {
            let cfg = config_or_exit(args.to_app_config());
            run_map(&cfg, args.by_area.as_deref())?;
        }
        Command::Reduce(args) => {
            let cfg = config_or_exit(args.to_app_config());
            run_reduce(&cfg)?;
        }
        Command::EnvTemplate { path } => {
            write_env_template(&path)?;
            println!(
                "Wrote {}. Copy to .env and edit values as needed.",
                path.display()
            );
        }
    }
    Ok(())
}

fn main() {
    // .env must be applied before clap reads env fallbacks.
    let dotenv = load_dotenv_if_present();
    logging::init();
    match dotenv {
        Ok(n) if n > 0 => debug!("loaded {} variables from .env", n),
        Ok(_) => {}
        Err(e) => warn!("{:#}", e),
    }

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("{:#}", e);
        std::process::exit(exit_code(&e));
    }
}
