//! Main bus clock with discrete, skewed edges.
//!
//! Time is simulated in nanoseconds; nothing here sleeps. One cycle is:
//! wait `setup_ns`, drive the clock to its inactive level, wait `low_ns`,
//! drive the active edge, wait `high_ns`. The host drives its data before a
//! cycle and samples the device after it, so the device always sees stable
//! inputs at the active edge and the host always sees settled outputs.

use crate::pin::PinValue;
use crate::revision_config::{ClockPolarity, ClockTiming, RevisionConfig};

#[derive(Debug, Clone)]
pub struct BitClock {
    polarity: ClockPolarity,
    timing: ClockTiming,
    level: PinValue,
    now_ns: u64,
    edges: u64,
}

impl BitClock {
    pub fn new(polarity: ClockPolarity, timing: ClockTiming) -> Self {
        let mut clock = BitClock {
            polarity,
            timing,
            level: PinValue::Low,
            now_ns: 0,
            edges: 0,
        };
        clock.level = clock.inactive_level();
        clock
    }

    pub fn from_revision(revision: &RevisionConfig) -> Self {
        Self::new(revision.clock_polarity, revision.clock)
    }

    pub fn polarity(&self) -> ClockPolarity {
        self.polarity
    }

    /// Level the clock reaches on the edge the device samples
    pub fn active_level(&self) -> PinValue {
        match self.polarity {
            ClockPolarity::RisingEdge => PinValue::High,
            ClockPolarity::FallingEdge => PinValue::Low,
        }
    }

    pub fn inactive_level(&self) -> PinValue {
        match self.polarity {
            ClockPolarity::RisingEdge => PinValue::Low,
            ClockPolarity::FallingEdge => PinValue::High,
        }
    }

    pub fn level(&self) -> PinValue {
        self.level
    }

    pub fn now_ns(&self) -> u64 {
        self.now_ns
    }

    /// Active edges produced so far
    pub fn edges(&self) -> u64 {
        self.edges
    }

    pub fn period_ns(&self) -> u64 {
        self.timing.setup_ns + self.timing.low_ns + self.timing.high_ns
    }

    /// Advance simulated time without touching the clock line
    pub fn wait_ns(&mut self, ns: u64) {
        self.now_ns += ns;
    }

    /// Setup delay, then park the clock at its inactive level
    pub fn drive_before_edge(&mut self, mut drive: impl FnMut(PinValue)) {
        self.wait_ns(self.timing.setup_ns);
        self.level = self.inactive_level();
        drive(self.level);
        self.wait_ns(self.timing.low_ns);
    }

    /// Produce the active edge
    pub fn edge(&mut self, mut drive: impl FnMut(PinValue)) {
        self.level = self.active_level();
        drive(self.level);
        self.edges += 1;
    }

    /// Hold time after the active edge; device outputs are valid afterwards
    pub fn sample_after_edge(&mut self) {
        self.wait_ns(self.timing.high_ns);
    }

    /// One full clock cycle
    pub fn cycle(&mut self, mut drive: impl FnMut(PinValue)) {
        self.drive_before_edge(&mut drive);
        self.edge(&mut drive);
        self.sample_after_edge();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rising_edge_cycle() {
        let mut clock = BitClock::new(ClockPolarity::RisingEdge, ClockTiming::default());
        let mut levels = Vec::new();
        clock.cycle(|level| levels.push(level));
        assert_eq!(levels, vec![PinValue::Low, PinValue::High]);
        assert_eq!(clock.edges(), 1);
        assert_eq!(clock.now_ns(), 17);
        assert_eq!(clock.period_ns(), 17);
    }

    #[test]
    fn test_falling_edge_polarity() {
        let mut clock = BitClock::new(ClockPolarity::FallingEdge, ClockTiming::default());
        assert_eq!(clock.level(), PinValue::High);
        let mut levels = Vec::new();
        clock.cycle(|level| levels.push(level));
        assert_eq!(levels, vec![PinValue::High, PinValue::Low]);
        assert_eq!(clock.level(), PinValue::Low);
    }

    #[test]
    fn test_split_cycle_timing() {
        let timing = ClockTiming {
            setup_ns: 1,
            low_ns: 2,
            high_ns: 3,
        };
        let mut clock = BitClock::new(ClockPolarity::RisingEdge, timing);
        clock.drive_before_edge(|_| {});
        assert_eq!(clock.now_ns(), 3);
        assert_eq!(clock.edges(), 0);
        clock.edge(|_| {});
        assert_eq!(clock.edges(), 1);
        clock.sample_after_edge();
        clock.wait_ns(10);
        assert_eq!(clock.now_ns(), 16);
    }
}
