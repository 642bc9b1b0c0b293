//! Scan session handler.
//!
//! Runs one session on the simulated reader: backend health check, resume,
//! wait for Ctrl-C / the duration / a reader fault, then pause, drain
//! in-flight reports, destroy, and print what was seen. Optionally assigns
//! an asset to the last scanned tag.

use std::sync::Arc;
use std::time::Duration;

use owo_colors::OwoColorize;
use tabled::Tabled;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use tagscan_config::Config;
use tagscan_core::{
    BackendClient, HostEvent, Notice, SessionController, SessionObserver, SessionState,
    SimulatedDriver, TagPresence,
};

use crate::cli::{GlobalOpts, ScanArgs};
use crate::error::CliError;
use crate::output;

use super::assign;

// ── Console observer ────────────────────────────────────────────────

/// Prints notices to stderr.
struct ConsoleObserver {
    color: bool,
    quiet: bool,
}

impl ConsoleObserver {
    fn paint(&self, notice: &Notice) -> String {
        let text = notice.to_string();
        if !self.color {
            return text;
        }
        match notice {
            Notice::NewTag { .. } => text.cyan().to_string(),
            Notice::ReaderReady { .. } | Notice::BackendOnline { .. } => text.green().to_string(),
            Notice::BackendOffline { .. } => text.yellow().to_string(),
            Notice::UnsupportedDevice { .. }
            | Notice::ReaderFailed { .. }
            | Notice::ScanAborted { .. } => text.red().to_string(),
        }
    }
}

impl SessionObserver for ConsoleObserver {
    fn on_notice(&self, notice: &Notice) {
        if !self.quiet {
            eprintln!("{}", self.paint(notice));
        }
    }
}

// ── Follow view ─────────────────────────────────────────────────────

fn follow_line(presence: &TagPresence) -> String {
    format!(
        "  {}  rssi {:>4}  x{}",
        presence.epc, presence.rssi, presence.count
    )
}

/// Print the cache's latest update as it changes. Bursts coalesce to the
/// newest presence.
fn spawn_follow(mut latest: watch::Receiver<Option<TagPresence>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while latest.changed().await.is_ok() {
            let update = latest.borrow_and_update().clone();
            if let Some(presence) = update {
                eprintln!("{}", follow_line(&presence));
            }
        }
    })
}

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct TagRow {
    #[tabled(rename = "EPC")]
    epc: String,
    #[tabled(rename = "RSSI")]
    rssi: i32,
    #[tabled(rename = "Count")]
    count: u64,
    #[tabled(rename = "First seen")]
    first_seen: String,
    #[tabled(rename = "Last seen")]
    last_seen: String,
}

impl From<&TagPresence> for TagRow {
    fn from(p: &TagPresence) -> Self {
        Self {
            epc: p.epc.to_string(),
            rssi: p.rssi,
            count: p.count,
            first_seen: p.first_seen.format("%H:%M:%S%.3f").to_string(),
            last_seen: p.last_seen.format("%H:%M:%S%.3f").to_string(),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    args: ScanArgs,
    cfg: &Config,
    client: &BackendClient,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if args.simulate == 0 {
        return Err(CliError::Validation {
            field: "simulate".into(),
            reason: "must be at least 1".into(),
        });
    }

    let assign_to_last = args
        .assign_last
        .as_deref()
        .map(|name| assign::build_asset(name, args.description, args.category))
        .transpose()?;

    let mut cfg = cfg.clone();
    if let Some(model) = args.model {
        cfg.reader.device_model = model;
    }
    if args.tx_power.is_some() {
        cfg.reader.tx_power = args.tx_power;
    }
    let session = cfg.session_config()?;
    let drain_timeout = Duration::from_secs(cfg.backend.timeout_secs);

    let observer = Arc::new(ConsoleObserver {
        color: output::should_color(&global.color),
        quiet: global.quiet,
    });

    match client.health().await {
        Ok(()) => observer.on_notice(&Notice::BackendOnline {
            url: client.base_url().to_string(),
        }),
        Err(e) => observer.on_notice(&Notice::BackendOffline {
            reason: e.to_string(),
        }),
    }

    let driver = SimulatedDriver::new(args.simulate).with_allow_list(cfg.allow_list());
    let controller = SessionController::new(
        session,
        Arc::new(driver),
        Arc::new(client.clone()),
        observer,
    )?;

    let follow = (args.follow && !global.quiet)
        .then(|| spawn_follow(controller.cache().subscribe()));

    controller.on_host_event(HostEvent::Resume).await?;
    let reason = wait_for_end(&controller, args.duration).await;
    tracing::info!(reason, "ending scan session");

    let aborted = controller.state() == SessionState::Failed;
    controller.on_host_event(HostEvent::Pause).await?;
    if !controller.reporter().drain(drain_timeout).await {
        tracing::warn!(
            in_flight = controller.reporter().in_flight(),
            "gave up waiting for outstanding reports"
        );
    }

    let seen = controller.cache().snapshot();
    let last = controller.cache().most_recently_seen();
    let stats = controller.reporter().stats();
    controller.on_host_event(HostEvent::Destroy).await?;
    if let Some(task) = follow {
        task.abort();
    }

    let out = output::render_list(
        &global.output,
        &seen,
        |p| TagRow::from(p),
        |p| p.epc.to_string(),
    );
    output::print_output(&out, global.quiet);
    if !global.quiet {
        eprintln!(
            "{} tags seen, {} reports sent ({} delivered, {} failed, {} dropped)",
            seen.len(),
            stats.dispatched,
            stats.delivered,
            stats.failed,
            stats.dropped
        );
        if let Some(ref last) = last {
            eprintln!("Last scanned tag: {}", last.epc);
        }
    }

    if let Some(asset) = assign_to_last {
        let Some(last) = last else {
            return Err(CliError::Validation {
                field: "assign-last".into(),
                reason: "no tag was scanned this session".into(),
            });
        };
        assign::assign(client, &last.epc, &asset, global.quiet).await?;
    }

    if aborted {
        return Err(CliError::Reader {
            message: "scan aborted by a reader fault".into(),
        });
    }
    Ok(())
}

/// Block until Ctrl-C, the optional duration, or the session failing.
async fn wait_for_end(controller: &SessionController, duration: Option<Duration>) -> &'static str {
    let mut states = controller.subscribe_state();
    let deadline = async {
        match duration {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => "interrupted",
        () = deadline => "duration elapsed",
        _ = states.wait_for(|s| *s == SessionState::Failed) => "reader fault",
    }
}
