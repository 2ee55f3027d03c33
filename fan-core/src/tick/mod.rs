//! Fixed-period tick admission.

/// Admits a tick once per period. Early polls are rejected and a late tick is
/// admitted once without queuing the periods it missed.
#[derive(Clone, Copy, Debug)]
pub struct TickGate {
    period_us: u32,
    last: Option<u32>,
}

impl TickGate {
    #[must_use]
    pub const fn new(period_us: u32) -> Self {
        Self {
            period_us,
            last: None,
        }
    }

    /// Returns `true` when a tick should run at `now_us` (wrapping clock).
    pub fn poll(&mut self, now_us: u32) -> bool {
        let due = match self.last {
            None => true,
            Some(last) => now_us.wrapping_sub(last) >= self.period_us,
        };
        if due {
            self.last = Some(now_us);
        }
        due
    }

    #[must_use]
    pub const fn period_us(&self) -> u32 {
        self.period_us
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_early_ticks() {
        let mut gate = TickGate::new(50_000);
        assert!(gate.poll(1_000));
        assert!(!gate.poll(30_000));
        assert!(gate.poll(51_000));
    }

    #[test]
    fn late_tick_is_not_caught_up() {
        let mut gate = TickGate::new(50_000);
        assert!(gate.poll(0));
        assert!(gate.poll(170_000));
        assert!(!gate.poll(180_000));
        assert!(gate.poll(220_000));
    }

    #[test]
    fn survives_clock_wrap() {
        let mut gate = TickGate::new(50_000);
        assert!(gate.poll(u32::MAX - 10_000));
        assert!(!gate.poll(20_000));
        assert!(gate.poll(40_000));
    }
}
