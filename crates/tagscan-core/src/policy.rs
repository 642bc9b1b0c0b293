// ── Reporting policy ──
//
// Decides which sightings go upstream. Stateless: the decision depends only
// on the presence snapshot it is given.

use std::num::NonZeroU32;

use crate::model::{ReportDecision, TagPresence};

/// Report the first sighting of a tag and every Nth one after that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportingPolicy {
    sampling_interval: NonZeroU32,
}

impl ReportingPolicy {
    pub const DEFAULT_INTERVAL: NonZeroU32 = match NonZeroU32::new(10) {
        Some(n) => n,
        None => unreachable!(),
    };

    pub const fn new(sampling_interval: NonZeroU32) -> Self {
        Self { sampling_interval }
    }

    pub fn sampling_interval(&self) -> NonZeroU32 {
        self.sampling_interval
    }

    /// `true` iff `count == 1` or `count` is a multiple of the interval.
    pub fn should_report(&self, presence: &TagPresence) -> bool {
        presence.count == 1 || presence.count % u64::from(self.sampling_interval.get()) == 0
    }

    pub fn decide(&self, presence: TagPresence) -> ReportDecision {
        ReportDecision {
            report: self.should_report(&presence),
            presence,
        }
    }
}

impl Default for ReportingPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::model::Epc;

    fn presence(count: u64) -> TagPresence {
        let mut p = TagPresence::first(Epc::parse("E2801170").unwrap(), -50, Utc::now());
        p.count = count;
        p
    }

    #[test]
    fn default_interval_is_ten() {
        assert_eq!(ReportingPolicy::default().sampling_interval().get(), 10);
    }

    #[test]
    fn reports_first_and_every_nth() {
        let policy = ReportingPolicy::default();
        let reported: Vec<u64> = (1..=40)
            .filter(|&c| policy.should_report(&presence(c)))
            .collect();
        assert_eq!(reported, vec![1, 10, 20, 30, 40]);
    }

    #[test]
    fn twenty_five_sightings_yield_three_reports() {
        let policy = ReportingPolicy::default();
        let reports = (1..=25)
            .map(|c| policy.decide(presence(c)))
            .filter(|d| d.report)
            .count();
        assert_eq!(reports, 3);
    }

    #[test]
    fn interval_of_one_reports_everything() {
        let policy = ReportingPolicy::new(NonZeroU32::new(1).unwrap());
        assert!((1..=10).all(|c| policy.should_report(&presence(c))));
    }

    #[test]
    fn decide_carries_snapshot_unchanged() {
        let policy = ReportingPolicy::default();
        let p = presence(7);
        let decision = policy.decide(p.clone());
        assert!(!decision.report);
        assert_eq!(decision.presence, p);
    }
}
