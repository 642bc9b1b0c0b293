//! Backend tag listing.

use tabled::Tabled;

use tagscan_core::{BackendClient, TagRecord};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::backend_error;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct TagRecordRow {
    #[tabled(rename = "EPC")]
    epc: String,
    #[tabled(rename = "Reads")]
    reads: String,
    #[tabled(rename = "Last seen")]
    last_seen: String,
    #[tabled(rename = "Department")]
    department: String,
    #[tabled(rename = "Room")]
    room: String,
    #[tabled(rename = "Asset")]
    asset: String,
}

impl From<&TagRecord> for TagRecordRow {
    fn from(t: &TagRecord) -> Self {
        Self {
            epc: t.epc.clone(),
            reads: t.read_count.map(|c| c.to_string()).unwrap_or_default(),
            last_seen: t
                .last_seen
                .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default(),
            department: t.department.clone().unwrap_or_default(),
            room: t.room_number.clone().unwrap_or_default(),
            asset: asset_name(t).unwrap_or_default(),
        }
    }
}

fn asset_name(t: &TagRecord) -> Option<String> {
    t.asset
        .as_ref()?
        .get("name")?
        .as_str()
        .map(ToOwned::to_owned)
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(client: &BackendClient, global: &GlobalOpts) -> Result<(), CliError> {
    let tags = client
        .list_tags()
        .await
        .map_err(|e| backend_error(client, e))?;

    let out = output::render_list(
        &global.output,
        &tags,
        |t| TagRecordRow::from(t),
        |t| t.epc.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
