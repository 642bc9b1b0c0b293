//! Department / room reference data.

use tagscan_core::{BackendClient, ReferenceData};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::backend_error;

fn detail(refs: &ReferenceData) -> String {
    let mut lines = vec!["Departments:".to_owned()];
    lines.extend(refs.departments.iter().map(|d| format!("  {d}")));
    lines.push("Rooms:".to_owned());
    lines.extend(refs.room_numbers.iter().map(|r| format!("  {r}")));
    lines.join("\n")
}

pub async fn handle(client: &BackendClient, global: &GlobalOpts) -> Result<(), CliError> {
    let refs = client
        .fetch_references()
        .await
        .map_err(|e| backend_error(client, e))?;

    let out = output::render_single(&global.output, &refs, detail, |r| {
        r.departments.join("\n")
    });
    output::print_output(&out, global.quiet);
    Ok(())
}
