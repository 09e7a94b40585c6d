//! Free-running clock of the debug scan port.
//!
//! Runs on its own simulated timebase, unrelated to the main bus clock.

use crate::pin::PinValue;

#[derive(Debug, Clone)]
pub struct DebugClock {
    period_ns: u64,
    duty_cycle: f64,
    high_time_ns: u64,
    low_time_ns: u64,
    current_state: PinValue,
    now_ns: u64,
    rising_edges: u64,
}

impl DebugClock {
    pub fn new(period_ns: u64) -> Self {
        let mut clock = DebugClock {
            period_ns: period_ns.max(2),
            duty_cycle: 0.5,
            high_time_ns: 0,
            low_time_ns: 0,
            current_state: PinValue::Low,
            now_ns: 0,
            rising_edges: 0,
        };
        clock.set_duty_cycle(0.5);
        clock
    }

    pub fn set_duty_cycle(&mut self, duty_cycle: f64) {
        self.duty_cycle = duty_cycle.clamp(0.1, 0.9);
        self.update_timing();
    }

    fn update_timing(&mut self) {
        let high = (self.period_ns as f64 * self.duty_cycle).round() as u64;
        self.high_time_ns = high.clamp(1, self.period_ns - 1);
        self.low_time_ns = self.period_ns - self.high_time_ns;
    }

    pub fn period_ns(&self) -> u64 {
        self.period_ns
    }

    pub fn high_time_ns(&self) -> u64 {
        self.high_time_ns
    }

    pub fn low_time_ns(&self) -> u64 {
        self.low_time_ns
    }

    pub fn level(&self) -> PinValue {
        self.current_state
    }

    pub fn now_ns(&self) -> u64 {
        self.now_ns
    }

    pub fn rising_edges(&self) -> u64 {
        self.rising_edges
    }

    /// Advance to the next transition and return the new level
    pub fn perform_transition(&mut self) -> PinValue {
        let (elapsed, next) = match self.current_state {
            PinValue::High => (self.high_time_ns, PinValue::Low),
            PinValue::Low => (self.low_time_ns, PinValue::High),
            PinValue::HighZ => (0, PinValue::Low),
        };
        self.now_ns += elapsed;
        self.current_state = next;
        if next == PinValue::High {
            self.rising_edges += 1;
        }
        next
    }

    /// Run transitions until the clock reaches `level`, reporting each one
    pub fn advance_to(&mut self, level: PinValue, mut drive: impl FnMut(PinValue)) {
        loop {
            let next = self.perform_transition();
            drive(next);
            if next == level {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_duty_cycle() {
        let clock = DebugClock::new(77);
        assert_eq!(clock.high_time_ns() + clock.low_time_ns(), 77);
        assert_eq!(clock.high_time_ns(), 39);
    }

    #[test]
    fn test_duty_cycle_is_clamped() {
        let mut clock = DebugClock::new(100);
        clock.set_duty_cycle(0.99);
        assert_eq!(clock.high_time_ns(), 90);
        clock.set_duty_cycle(0.0);
        assert_eq!(clock.high_time_ns(), 10);
    }

    #[test]
    fn test_transitions_advance_time() {
        let mut clock = DebugClock::new(10);
        assert_eq!(clock.perform_transition(), PinValue::High);
        assert_eq!(clock.now_ns(), 5);
        assert_eq!(clock.perform_transition(), PinValue::Low);
        assert_eq!(clock.now_ns(), 10);
        assert_eq!(clock.rising_edges(), 1);

        let mut seen = Vec::new();
        clock.advance_to(PinValue::Low, |level| seen.push(level));
        assert_eq!(seen, vec![PinValue::High, PinValue::Low]);
        assert_eq!(clock.now_ns(), 20);
    }
}
