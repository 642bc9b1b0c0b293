//! Asset assignment, by EPC or to the last tag of a scan session.

use tagscan_core::{Asset, BackendClient, Epc};

use crate::cli::{AssignArgs, GlobalOpts};
use crate::error::CliError;

use super::backend_error;

pub async fn handle(
    args: AssignArgs,
    client: &BackendClient,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let epc = Epc::parse(&args.epc).map_err(|e| CliError::Validation {
        field: "epc".into(),
        reason: e.to_string(),
    })?;
    let asset = build_asset(&args.name, args.description, args.category)?;
    assign(client, &epc, &asset, global.quiet).await
}

/// Validate the name and assemble the asset body.
pub(crate) fn build_asset(
    name: &str,
    description: Option<String>,
    category: Option<String>,
) -> Result<Asset, CliError> {
    if name.trim().is_empty() {
        return Err(CliError::Validation {
            field: "name".into(),
            reason: "asset name cannot be empty".into(),
        });
    }

    let mut asset = Asset::new(name.trim());
    if let Some(description) = description {
        asset = asset.with_description(description);
    }
    if let Some(category) = category {
        asset = asset.with_category(category);
    }
    Ok(asset)
}

/// POST the asset for `epc` and echo the backend's message.
pub(crate) async fn assign(
    client: &BackendClient,
    epc: &Epc,
    asset: &Asset,
    quiet: bool,
) -> Result<(), CliError> {
    let message = client
        .assign_asset(epc.as_str(), asset)
        .await
        .map_err(|e| backend_error(client, e))?;

    tracing::info!(epc = %epc, name = %asset.name, "asset assigned");
    if !quiet {
        eprintln!("{message}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_name_is_rejected() {
        let err = build_asset("   ", None, None).unwrap_err();
        assert!(matches!(err, CliError::Validation { ref field, .. } if field == "name"));
    }

    #[test]
    fn name_is_trimmed() {
        let asset = build_asset("  Infusion pump ", None, Some("pumps".into()))
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(asset.name, "Infusion pump");
    }
}
