//! Command dispatch: bridges CLI args -> backend / session calls -> output formatting.

pub mod assign;
pub mod config_cmd;
pub mod health;
pub mod references;
pub mod scan;
pub mod tags;

use tagscan_config::Config;
use tagscan_core::{ApiError, BackendClient, CoreError};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a backend-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    cfg: &Config,
    client: &BackendClient,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Scan(args) => scan::handle(args, cfg, client, global).await,
        Command::Health => health::handle(client, global).await,
        Command::Tags => tags::handle(client, global).await,
        Command::Assign(args) => assign::handle(args, client, global).await,
        Command::References => references::handle(client, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "command does not use the backend".into(),
        )),
    }
}

/// Map a backend failure, naming the URL when the server was never reached.
pub(crate) fn backend_error(client: &BackendClient, err: ApiError) -> CliError {
    match CoreError::from(err) {
        CoreError::BackendUnreachable { reason } => CliError::BackendUnreachable {
            url: client.base_url().to_string(),
            source: reason.into(),
        },
        other => other.into(),
    }
}
