// ── Scan loop ──
//
// The single producer of a session. Runs on a dedicated blocking thread,
// polling the reader until cancelled or until the reader faults. Sightings
// polled after cancellation are dropped, so a loop that outlives its
// session never writes into the next one.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::hardware::{ReaderError, ReaderHandle};
use crate::model::{Epc, Notice, TagSighting};
use crate::observer::SessionObserver;
use crate::policy::ReportingPolicy;
use crate::reporter::UplinkReporter;
use crate::store::TagPresenceCache;

/// Longest uninterrupted sleep between cancellation checks.
const WAIT_SLICE: Duration = Duration::from_millis(10);

/// Why the loop returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LoopExit {
    Cancelled,
    Faulted(ReaderError),
}

/// Who still owns the reader handle of one session.
///
/// Shared by the scan loop, the controller, and the loop's supervisor.
/// Each flag is claimed at most once.
#[derive(Debug, Default)]
pub(crate) struct ReaderLease {
    detached: AtomicBool,
    released: AtomicBool,
}

impl ReaderLease {
    /// Cut the loop off from the handle. `false` if the loop already
    /// began stopping the reader itself.
    pub(crate) fn detach(&self) -> bool {
        !self.detached.swap(true, Ordering::SeqCst)
    }

    /// Claim the final `stop_continuous_read`. `false` once detached.
    fn claim_stop(&self) -> bool {
        !self.detached.swap(true, Ordering::SeqCst)
    }

    /// `true` for exactly one caller per session.
    pub(crate) fn claim_release(&self) -> bool {
        !self.released.swap(true, Ordering::SeqCst)
    }
}

pub(crate) struct ScanLoop {
    pub(crate) handle: Arc<dyn ReaderHandle>,
    pub(crate) cache: Arc<TagPresenceCache>,
    pub(crate) policy: ReportingPolicy,
    pub(crate) reporter: UplinkReporter,
    pub(crate) observer: Arc<dyn SessionObserver>,
    pub(crate) poll_interval: Duration,
    pub(crate) cancel: CancellationToken,
    pub(crate) lease: Arc<ReaderLease>,
}

impl ScanLoop {
    /// Poll until cancelled or faulted, then stop continuous reading unless
    /// the controller has detached this loop from the handle.
    pub(crate) fn run(self) -> LoopExit {
        info!(poll_ms = self.poll_interval.as_millis(), "scan loop started");

        let exit = loop {
            if self.cancel.is_cancelled() {
                break LoopExit::Cancelled;
            }

            let polled = self.handle.poll_next();
            if self.cancel.is_cancelled() {
                if let Ok(Some(sighting)) = &polled {
                    debug!(raw = %sighting.id, "dropping sighting polled after cancellation");
                }
                break LoopExit::Cancelled;
            }

            match polled {
                Ok(Some(sighting)) => self.handle_sighting(&sighting),
                Ok(None) => {}
                Err(e) if e.is_fatal() => {
                    warn!(error = %e, "reader fault, ending scan loop");
                    break LoopExit::Faulted(e);
                }
                Err(e) => warn!(error = %e, "transient reader error"),
            }

            self.wait_for_next_poll();
        };

        if self.lease.claim_stop() {
            if let Err(e) = self.handle.stop_continuous_read() {
                warn!(error = %e, "failed to stop continuous read");
            }
        } else {
            debug!("loop detached from reader, skipping stop");
        }
        info!(exit = ?exit, "scan loop exited");
        exit
    }

    /// Sleep out the poll interval in short slices, returning early on
    /// cancellation.
    fn wait_for_next_poll(&self) {
        let deadline = Instant::now() + self.poll_interval;
        loop {
            if self.cancel.is_cancelled() {
                return;
            }
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return;
            }
            std::thread::sleep(left.min(WAIT_SLICE));
        }
    }

    fn handle_sighting(&self, sighting: &TagSighting) {
        let epc = match Epc::parse(&sighting.id) {
            Ok(epc) => epc,
            Err(e) => {
                debug!(raw = %sighting.id, error = %e, "discarding invalid tag id");
                return;
            }
        };

        let decision = self
            .cache
            .record(&epc, sighting.rssi, sighting.observed_at, &self.policy);
        trace!(
            epc = %epc,
            rssi = sighting.rssi,
            count = decision.presence.count,
            report = decision.report,
            "tag sighted"
        );

        if decision.presence.is_first_sighting() {
            self.observer.on_notice(&Notice::NewTag { epc });
        }
        self.reporter.dispatch(&decision);
        self.observer.on_tag_updated(&decision.presence);
    }
}
