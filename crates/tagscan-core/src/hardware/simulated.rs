// ── Simulated reader ──
//
// Deterministic stand-in for the handheld's UHF module. Cycles through a
// fixed tag population with a repeatable RSSI pattern and an empty buffer
// every fourth poll.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tracing::debug;

use super::{ModelAllowList, ReaderDriver, ReaderError, ReaderHandle};
use crate::model::TagSighting;

const DEFAULT_MAX_POWER: u8 = 30;
const EMPTY_EVERY: u64 = 4;

/// Driver producing [`SimulatedHandle`]s.
#[derive(Debug, Clone)]
pub struct SimulatedDriver {
    population: u32,
    max_power: u8,
    allow: ModelAllowList,
}

impl SimulatedDriver {
    /// Simulate `population` distinct tags in the field (at least one).
    pub fn new(population: u32) -> Self {
        Self {
            population: population.max(1),
            max_power: DEFAULT_MAX_POWER,
            allow: ModelAllowList::default(),
        }
    }

    #[must_use]
    pub fn with_allow_list(mut self, allow: ModelAllowList) -> Self {
        self.allow = allow;
        self
    }

    #[must_use]
    pub fn with_max_power(mut self, max_power: u8) -> Self {
        self.max_power = max_power;
        self
    }

    /// EPC of the `index`th simulated tag.
    pub fn epc_for(index: u32) -> String {
        format!("E28011700000020{index:09X}")
    }
}

impl ReaderDriver for SimulatedDriver {
    fn is_supported(&self, model: &str) -> bool {
        self.allow.allows(model)
    }

    fn acquire(&self) -> Result<Arc<dyn ReaderHandle>, ReaderError> {
        debug!(population = self.population, "acquiring simulated reader");
        Ok(Arc::new(SimulatedHandle::new(self.population, self.max_power)))
    }
}

#[derive(Debug, Default)]
struct HandleState {
    reading: bool,
    released: bool,
    polls: u64,
}

/// Handle returned by [`SimulatedDriver::acquire`].
#[derive(Debug)]
pub struct SimulatedHandle {
    population: u32,
    max_power: u8,
    state: Mutex<HandleState>,
}

impl SimulatedHandle {
    fn new(population: u32, max_power: u8) -> Self {
        Self {
            population,
            max_power,
            state: Mutex::new(HandleState::default()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HandleState>, ReaderError> {
        self.state
            .lock()
            .map_err(|_| ReaderError::Fatal("simulated reader state poisoned".into()))
    }

    fn ensure_open(state: &HandleState) -> Result<(), ReaderError> {
        if state.released {
            return Err(ReaderError::Fatal("reader already released".into()));
        }
        Ok(())
    }
}

impl ReaderHandle for SimulatedHandle {
    fn max_power(&self) -> u8 {
        self.max_power
    }

    fn configure(&self, power: u8) -> Result<(), ReaderError> {
        let state = self.lock()?;
        Self::ensure_open(&state)?;
        if power > self.max_power {
            return Err(ReaderError::Fatal(format!(
                "power {power} exceeds module maximum {}",
                self.max_power
            )));
        }
        debug!(power, "simulated reader configured");
        Ok(())
    }

    fn start_continuous_read(&self) -> Result<bool, ReaderError> {
        let mut state = self.lock()?;
        Self::ensure_open(&state)?;
        state.reading = true;
        Ok(true)
    }

    fn poll_next(&self) -> Result<Option<TagSighting>, ReaderError> {
        let mut state = self.lock()?;
        Self::ensure_open(&state)?;
        if !state.reading {
            return Ok(None);
        }

        let n = state.polls;
        state.polls += 1;
        if n % EMPTY_EVERY == EMPTY_EVERY - 1 {
            return Ok(None);
        }

        let index = u32::try_from(n % u64::from(self.population)).unwrap_or(0);
        let rssi = -30 - i32::try_from(n.wrapping_mul(7) % 40).unwrap_or(0);
        Ok(Some(TagSighting::new(
            SimulatedDriver::epc_for(index),
            rssi,
            Utc::now(),
        )))
    }

    fn stop_continuous_read(&self) -> Result<(), ReaderError> {
        let mut state = self.lock()?;
        state.reading = false;
        Ok(())
    }

    fn release(&self) -> Result<(), ReaderError> {
        let mut state = self.lock()?;
        state.reading = false;
        state.released = true;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::Epc;

    #[test]
    fn generated_epcs_are_valid() {
        for i in [0, 1, 255, u32::MAX] {
            let raw = SimulatedDriver::epc_for(i);
            assert_eq!(raw.len(), 24);
            assert!(Epc::parse(&raw).is_ok(), "{raw}");
        }
    }

    #[test]
    fn polls_nothing_until_started() {
        let handle = SimulatedDriver::new(3).acquire().unwrap();
        assert_eq!(handle.poll_next().unwrap(), None);
    }

    #[test]
    fn cycles_population_with_gaps() {
        let handle = SimulatedDriver::new(2).acquire().unwrap();
        handle.configure(handle.max_power()).unwrap();
        assert!(handle.start_continuous_read().unwrap());

        let ids: Vec<Option<String>> = (0..8)
            .map(|_| handle.poll_next().unwrap().map(|s| s.id))
            .collect();

        let a = Some(SimulatedDriver::epc_for(0));
        let b = Some(SimulatedDriver::epc_for(1));
        assert_eq!(
            ids,
            vec![a.clone(), b.clone(), a.clone(), None, a.clone(), b, a, None]
        );
    }

    #[test]
    fn configure_rejects_excess_power() {
        let handle = SimulatedDriver::new(1).with_max_power(20).acquire().unwrap();
        assert!(handle.configure(21).is_err());
        assert!(handle.configure(20).is_ok());
    }

    #[test]
    fn released_handle_faults() {
        let handle = SimulatedDriver::new(1).acquire().unwrap();
        handle.start_continuous_read().unwrap();
        handle.release().unwrap();
        let err = handle.poll_next().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn support_follows_allow_list() {
        let driver = SimulatedDriver::new(1).with_allow_list(ModelAllowList::new(["c72e"]));
        assert!(driver.is_supported("C72E"));
        assert!(!driver.is_supported("Pixel 8"));
    }
}
