// ── Uplink reporter ──
//
// Fire-and-forget dispatch of policy-approved sightings. The scan loop calls
// `dispatch` from its blocking thread; the request runs on the tokio runtime
// and its outcome is only logged. Outstanding requests are capped by a
// semaphore: when every permit is taken the report is dropped, never queued.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::future::BoxFuture;
use tagscan_api::{BackendClient, TagReading};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::config::ReportContext;
use crate::model::ReportDecision;

/// Destination for tag readings.
///
/// Implemented by [`BackendClient`]; tests substitute in-memory fakes.
pub trait TagUplink: Send + Sync + 'static {
    fn send_reading(
        &self,
        reading: TagReading,
    ) -> BoxFuture<'static, Result<String, tagscan_api::Error>>;
}

impl TagUplink for BackendClient {
    fn send_reading(
        &self,
        reading: TagReading,
    ) -> BoxFuture<'static, Result<String, tagscan_api::Error>> {
        let client = self.clone();
        Box::pin(async move { client.send_tag_reading(&reading).await })
    }
}

/// Delivery counters since the reporter was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReporterStats {
    pub dispatched: u64,
    pub delivered: u64,
    pub failed: u64,
    /// Reports skipped because the in-flight bound was reached.
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    dispatched: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

/// Sends approved decisions to a [`TagUplink`] without waiting for them.
#[derive(Clone)]
pub struct UplinkReporter {
    uplink: Arc<dyn TagUplink>,
    context: Arc<ReportContext>,
    runtime: Handle,
    in_flight: Arc<Semaphore>,
    capacity: usize,
    counters: Arc<Counters>,
}

impl UplinkReporter {
    pub fn new(
        uplink: Arc<dyn TagUplink>,
        context: ReportContext,
        max_in_flight: usize,
        runtime: Handle,
    ) -> Self {
        let capacity = max_in_flight.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            uplink,
            context: Arc::new(context),
            runtime,
            in_flight: Arc::new(Semaphore::new(capacity)),
            capacity,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Hand `decision` to the uplink if it is marked for reporting.
    ///
    /// Returns once the request is spawned, not when it completes. Returns
    /// `false` when nothing was sent (not reportable, or saturated).
    pub fn dispatch(&self, decision: &ReportDecision) -> bool {
        if !decision.report {
            return false;
        }

        let Ok(permit) = Arc::clone(&self.in_flight).try_acquire_owned() else {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            warn!(
                epc = %decision.presence.epc,
                capacity = self.capacity,
                "uplink saturated, dropping report"
            );
            return false;
        };

        let reading = self.context.reading_for(&decision.presence);
        let epc = decision.presence.epc.clone();
        let count = decision.presence.count;
        let request = self.uplink.send_reading(reading);
        let counters = Arc::clone(&self.counters);
        counters.dispatched.fetch_add(1, Ordering::Relaxed);

        self.runtime.spawn(async move {
            let _permit = permit;
            match request.await {
                Ok(message) => {
                    counters.delivered.fetch_add(1, Ordering::Relaxed);
                    debug!(epc = %epc, count, message = %message, "tag reading delivered");
                }
                Err(e) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(epc = %epc, count, error = %e, "failed to deliver tag reading");
                }
            }
        });
        true
    }

    pub fn stats(&self) -> ReporterStats {
        ReporterStats {
            dispatched: self.counters.dispatched.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }

    /// Number of requests currently outstanding.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.in_flight.available_permits()
    }

    /// Wait up to `timeout` for outstanding requests to finish.
    ///
    /// Returns `true` if nothing is in flight afterwards.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let Ok(permits) = u32::try_from(self.capacity) else {
            return false;
        };
        match tokio::time::timeout(timeout, self.in_flight.acquire_many(permits)).await {
            Ok(Ok(_all)) => true,
            Ok(Err(_closed)) => false,
            Err(_elapsed) => {
                debug!(in_flight = self.in_flight(), "uplink drain timed out");
                false
            }
        }
    }
}
