// ── Tag presence cache ──
//
// Concurrent per-EPC sighting state shared between the scan loop (writer)
// and host-facing readers. Each mutation runs under the DashMap shard lock
// for its key, so the post-mutation snapshot, the policy decision, and the
// publish to subscribers happen in the same critical section.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::watch;

use crate::model::{Epc, ReportDecision, TagPresence};
use crate::policy::ReportingPolicy;

/// Per-session map of EPC to [`TagPresence`].
///
/// Cleared in bulk when a session starts; entries are never removed
/// individually. Subscribers of [`subscribe`](Self::subscribe) see the most
/// recently mutated presence (or `None` right after a clear). For any one
/// EPC, publishes follow mutation order. A clear racing a concurrent upsert
/// may publish `None` after that upsert's snapshot; clear only while no
/// producer is running.
pub struct TagPresenceCache {
    entries: DashMap<Epc, TagPresence>,
    latest: watch::Sender<Option<TagPresence>>,
}

impl TagPresenceCache {
    pub fn new() -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            entries: DashMap::new(),
            latest,
        }
    }

    /// Insert or update the entry for `epc`, returning the post-mutation state.
    pub fn upsert(&self, epc: &Epc, rssi: i32, at: DateTime<Utc>) -> TagPresence {
        self.apply(epc, rssi, at, |_| ()).0
    }

    /// Upsert and evaluate `policy` against the result without releasing the
    /// entry lock in between.
    pub fn record(
        &self,
        epc: &Epc,
        rssi: i32,
        at: DateTime<Utc>,
        policy: &ReportingPolicy,
    ) -> ReportDecision {
        self.apply(epc, rssi, at, |p| policy.decide(p.clone())).1
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.clear();
        self.latest.send_replace(None);
    }

    /// The entry with the latest `last_seen`, if any.
    pub fn most_recently_seen(&self) -> Option<TagPresence> {
        self.entries
            .iter()
            .max_by_key(|r| r.value().last_seen)
            .map(|r| r.value().clone())
    }

    pub fn get(&self, epc: &Epc) -> Option<TagPresence> {
        self.entries.get(epc).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, most recently seen first.
    pub fn snapshot(&self) -> Vec<TagPresence> {
        let mut all: Vec<TagPresence> = self.entries.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| {
            b.last_seen
                .cmp(&a.last_seen)
                .then_with(|| a.epc.cmp(&b.epc))
        });
        all
    }

    /// Watch the most recently updated presence.
    pub fn subscribe(&self) -> watch::Receiver<Option<TagPresence>> {
        self.latest.subscribe()
    }

    // ── Private helpers ──────────────────────────────────────────────

    /// Mutate the entry, run `decide` on the result, and publish it, all
    /// while the shard lock is held.
    fn apply<F, R>(
        &self,
        epc: &Epc,
        rssi: i32,
        at: DateTime<Utc>,
        decide: F,
    ) -> (TagPresence, R)
    where
        F: FnOnce(&TagPresence) -> R,
    {
        match self.entries.entry(epc.clone()) {
            Entry::Occupied(mut occupied) => {
                let current = occupied.get_mut();
                current.observe(rssi, at);
                let outcome = decide(&*current);
                self.latest.send_replace(Some(current.clone()));
                (current.clone(), outcome)
            }
            Entry::Vacant(vacant) => {
                let fresh = TagPresence::first(epc.clone(), rssi, at);
                let outcome = decide(&fresh);
                let entry = vacant.insert(fresh);
                self.latest.send_replace(Some(entry.value().clone()));
                (entry.value().clone(), outcome)
            }
        }
    }
}

impl Default for TagPresenceCache {
    fn default() -> Self {
        Self::new()
    }
}
