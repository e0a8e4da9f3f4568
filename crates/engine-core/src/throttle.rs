use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Parameters of an additive-increase/additive-decrease controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleSettings {
    pub default_size: u64,
    pub increment: u64,
    /// Lower bound. Falls back to `increment` when unset.
    pub min_size: Option<u64>,
    /// Optional upper bound, unlimited when unset.
    pub max_size: Option<u64>,
    pub latency_ceiling_ms: u64,
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self::page_size()
    }
}

impl ThrottleSettings {
    /// Records per fetch/write request.
    pub fn page_size() -> Self {
        Self {
            default_size: 50,
            increment: 5,
            min_size: None,
            max_size: None,
            latency_ceiling_ms: 10_000,
        }
    }

    /// Bytes per file per asset download request.
    pub fn transfer_chunk() -> Self {
        Self {
            default_size: 8_000_000,
            increment: 250_000,
            min_size: None,
            max_size: None,
            latency_ceiling_ms: 10_000,
        }
    }

    pub fn floor(&self) -> u64 {
        self.min_size.unwrap_or(self.increment)
    }

    pub fn latency_ceiling(&self) -> Duration {
        Duration::from_millis(self.latency_ceiling_ms)
    }

    /// Starting value, pulled into `[floor, max]`.
    fn initial(&self) -> u64 {
        let value = self.default_size.max(self.floor());
        match self.max_size {
            Some(max) => value.min(max.max(self.floor())),
            None => value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    Increased,
    Decreased,
    Unchanged,
}

/// Paces a tunable size against observed request latency.
///
/// Below the ceiling the size grows by one increment; above it the size
/// shrinks by one increment unless that would cross the floor. A latency
/// equal to the ceiling leaves the size alone.
#[derive(Debug, Clone)]
pub struct AdaptiveThrottle {
    settings: ThrottleSettings,
    current: u64,
}

impl AdaptiveThrottle {
    pub fn new(settings: ThrottleSettings) -> Self {
        let current = settings.initial();
        Self { settings, current }
    }

    pub fn current(&self) -> u64 {
        self.current
    }

    pub fn settings(&self) -> &ThrottleSettings {
        &self.settings
    }

    pub fn reset(&mut self) {
        self.current = self.settings.initial();
    }

    pub fn observe(&mut self, elapsed: Duration) -> Adjustment {
        let ceiling = self.settings.latency_ceiling();

        if elapsed < ceiling {
            let mut next = self.current.saturating_add(self.settings.increment);
            if let Some(max) = self.settings.max_size {
                next = next.min(max.max(self.current));
            }
            if next > self.current {
                self.current = next;
                return Adjustment::Increased;
            }
            return Adjustment::Unchanged;
        }

        if elapsed > ceiling {
            if let Some(next) = self.current.checked_sub(self.settings.increment) {
                if next >= self.settings.floor() && next < self.current {
                    self.current = next;
                    return Adjustment::Decreased;
                }
            }
        }

        Adjustment::Unchanged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: Duration = Duration::from_millis(120);
    const SLOW: Duration = Duration::from_millis(12_000);
    const EXACT: Duration = Duration::from_millis(10_000);

    #[test]
    fn starts_at_default() {
        let throttle = AdaptiveThrottle::new(ThrottleSettings::page_size());
        assert_eq!(throttle.current(), 50);
        assert_eq!(throttle.settings().floor(), 5);
    }

    #[test]
    fn fast_request_grows_by_increment() {
        let mut throttle = AdaptiveThrottle::new(ThrottleSettings::page_size());
        assert_eq!(throttle.observe(FAST), Adjustment::Increased);
        assert_eq!(throttle.current(), 55);
    }

    #[test]
    fn slow_request_shrinks_by_increment() {
        let mut throttle = AdaptiveThrottle::new(ThrottleSettings::page_size());
        assert_eq!(throttle.observe(SLOW), Adjustment::Decreased);
        assert_eq!(throttle.current(), 45);
    }

    #[test]
    fn latency_at_ceiling_is_neutral() {
        let mut throttle = AdaptiveThrottle::new(ThrottleSettings::page_size());
        assert_eq!(throttle.observe(EXACT), Adjustment::Unchanged);
        assert_eq!(throttle.current(), 50);
    }

    #[test]
    fn never_drops_below_floor() {
        let mut throttle = AdaptiveThrottle::new(ThrottleSettings::page_size());
        for _ in 0..100 {
            throttle.observe(SLOW);
        }
        assert_eq!(throttle.current(), 5);
        assert_eq!(throttle.observe(SLOW), Adjustment::Unchanged);
        assert_eq!(throttle.current(), 5);
    }

    #[test]
    fn explicit_floor_is_respected() {
        let mut throttle = AdaptiveThrottle::new(ThrottleSettings {
            min_size: Some(40),
            ..ThrottleSettings::page_size()
        });
        throttle.observe(SLOW);
        throttle.observe(SLOW);
        assert_eq!(throttle.current(), 40);
        throttle.observe(SLOW);
        assert_eq!(throttle.current(), 40);
    }

    #[test]
    fn cap_saturates_growth() {
        let mut throttle = AdaptiveThrottle::new(ThrottleSettings {
            max_size: Some(57),
            ..ThrottleSettings::page_size()
        });
        assert_eq!(throttle.observe(FAST), Adjustment::Increased);
        assert_eq!(throttle.observe(FAST), Adjustment::Increased);
        assert_eq!(throttle.current(), 57);
        assert_eq!(throttle.observe(FAST), Adjustment::Unchanged);
    }

    #[test]
    fn reset_restores_default() {
        let mut throttle = AdaptiveThrottle::new(ThrottleSettings::transfer_chunk());
        throttle.observe(FAST);
        throttle.observe(FAST);
        assert_eq!(throttle.current(), 8_500_000);
        throttle.reset();
        assert_eq!(throttle.current(), 8_000_000);
    }

    #[test]
    fn default_below_floor_is_lifted() {
        let throttle = AdaptiveThrottle::new(ThrottleSettings {
            default_size: 2,
            ..ThrottleSettings::page_size()
        });
        assert_eq!(throttle.current(), 5);
    }

    #[test]
    fn stays_within_bounds_for_arbitrary_latencies() {
        // deterministic LCG so the sequence is reproducible
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next_latency = || {
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            Duration::from_millis((seed >> 33) % 20_000)
        };

        for settings in [ThrottleSettings::page_size(), ThrottleSettings::transfer_chunk()] {
            let mut throttle = AdaptiveThrottle::new(settings.clone());
            for _ in 0..5_000 {
                let before = throttle.current();
                let latency = next_latency();
                let adjustment = throttle.observe(latency);
                let after = throttle.current();

                assert!(after >= settings.floor());
                match adjustment {
                    Adjustment::Increased => {
                        assert!(latency < settings.latency_ceiling());
                        assert_eq!(after, before + settings.increment);
                    }
                    Adjustment::Decreased => {
                        assert!(latency > settings.latency_ceiling());
                        assert_eq!(after, before - settings.increment);
                    }
                    Adjustment::Unchanged => assert_eq!(after, before),
                }
            }
        }
    }
}
