//! Press counters for the front-panel buttons.

/// Number of monitored buttons.
pub const BUTTON_COUNT: usize = 3;

/// Counters of one button.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ButtonCounts {
    /// Consecutive ticks the button has been held (wrapping).
    pub held_ticks: u16,
    /// Released-to-pressed transitions seen.
    pub presses: u16,
}

/// Tracks held time and rising edges of every button.
#[derive(Clone, Debug, Default)]
pub struct ButtonMonitor {
    previous: [bool; BUTTON_COUNT],
    counts: [ButtonCounts; BUTTON_COUNT],
}

impl ButtonMonitor {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            previous: [false; BUTTON_COUNT],
            counts: [ButtonCounts {
                held_ticks: 0,
                presses: 0,
            }; BUTTON_COUNT],
        }
    }

    /// Folds one tick of button levels (`true` = pressed) into the counters.
    pub fn sample(&mut self, pressed: [bool; BUTTON_COUNT]) {
        for ((level, previous), counts) in pressed
            .into_iter()
            .zip(&mut self.previous)
            .zip(&mut self.counts)
        {
            if level {
                counts.held_ticks = counts.held_ticks.wrapping_add(1);
                if !*previous {
                    counts.presses = counts.presses.wrapping_add(1);
                }
            } else {
                counts.held_ticks = 0;
            }
            *previous = level;
        }
    }

    /// Clears every counter. A button still held at the next sample counts
    /// as a fresh press.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    #[must_use]
    pub const fn counts(&self) -> [ButtonCounts; BUTTON_COUNT] {
        self.counts
    }
}
