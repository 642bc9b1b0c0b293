mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tagscan_config::Config;
use tagscan_core::BackendClient;

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need a backend
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "tagscan", &mut std::io::stdout());
            Ok(())
        }

        cmd => {
            let cfg = resolve_config(&cli.global)?;
            let url = cfg.backend_url()?;
            let transport = cfg.transport_config()?;
            let client = BackendClient::new(url.as_str(), &transport)
                .map_err(tagscan_core::CoreError::from)?;

            tracing::debug!(command = ?cmd, backend = %url, "dispatching command");
            commands::dispatch(cmd, &cfg, &client, &cli.global).await
        }
    }
}

/// Load the config file and environment, then apply CLI flag overrides.
fn resolve_config(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut cfg = tagscan_config::load_config()?;

    if let Some(ref backend) = global.backend {
        cfg.backend.base_url.clone_from(backend);
    }
    if let Some(timeout) = global.timeout {
        cfg.backend.timeout_secs = timeout;
    }
    if global.insecure {
        cfg.backend.insecure = true;
    }

    Ok(cfg)
}
