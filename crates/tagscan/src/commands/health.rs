//! Backend health check.

use serde::Serialize;

use tagscan_core::BackendClient;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::backend_error;

#[derive(Serialize)]
struct HealthReport {
    backend: String,
    status: &'static str,
}

pub async fn handle(client: &BackendClient, global: &GlobalOpts) -> Result<(), CliError> {
    client
        .health()
        .await
        .map_err(|e| backend_error(client, e))?;

    let report = HealthReport {
        backend: client.base_url().to_string(),
        status: "ok",
    };
    let out = output::render_single(
        &global.output,
        &report,
        |r| format!("Backend {} is reachable", r.backend),
        |r| r.status.to_owned(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
