// ── Host hooks ──
//
// Callbacks from the core into the host shell. Hooks run on whichever
// thread produced the event (tag updates arrive on the scan loop's blocking
// thread) and must return quickly.

use crate::model::{Notice, TagPresence};

/// Receiver for session events. Every method defaults to a no-op.
pub trait SessionObserver: Send + Sync {
    fn on_session_start(&self) {}

    fn on_session_stop(&self) {}

    /// A tag's presence changed. `presence` is the post-update snapshot.
    fn on_tag_updated(&self, presence: &TagPresence) {
        let _ = presence;
    }

    /// Short user-facing message (toast / status line).
    fn on_notice(&self, notice: &Notice) {
        let _ = notice;
    }
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}
