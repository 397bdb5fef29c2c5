//! Busy-wait, deadman timer and interrupt masking capability

/// A calibrated wait, in microseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "std", serde(transparent))]
pub struct Delay {
    micros: u32,
}

impl Delay {
    /// A wait of `micros` microseconds
    pub const fn from_micros(micros: u32) -> Self {
        Self { micros }
    }

    /// Length of the wait in microseconds
    pub const fn as_micros(self) -> u32 {
        self.micros
    }
}

/// Which runaway timeout the deadman timer is armed with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeadmanClass {
    /// Long timeout covering one erase pulse
    Erase,
    /// Short timeout covering one program pulse
    Write,
}

/// Busy-wait calibration for a CPU running from a fixed clock
///
/// The wait loop retires one iteration every `cycles_per_loop` CPU cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct Calibration {
    /// CPU clock in MHz
    pub cpu_mhz: u32,
    /// CPU cycles per wait loop iteration
    pub cycles_per_loop: u32,
}

impl Calibration {
    /// Number of loop iterations to spin for `delay`
    ///
    /// Rounds up by one iteration so a wait is never shorter than asked,
    /// and saturates at `u32::MAX` iterations.
    pub const fn loops(&self, delay: Delay) -> u32 {
        let loops =
            delay.micros as u64 * self.cpu_mhz as u64 / self.cycles_per_loop as u64 + 1;
        if loops > u32::MAX as u64 {
            u32::MAX
        } else {
            loops as u32
        }
    }

    /// Actual time spent spinning `loops` iterations, in nanoseconds
    pub const fn loops_to_nanos(&self, loops: u32) -> u64 {
        loops as u64 * self.cycles_per_loop as u64 * 1000 / self.cpu_mhz as u64
    }
}

/// Saved interrupt mask, handed back to [`Timing::restore_interrupts`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterruptMask(pub u32);

/// Timing services the engines need around a pulse
pub trait Timing {
    /// Spin for at least `delay`
    fn wait(&mut self, delay: Delay);

    /// Start the deadman timer; it resets the chip if not disarmed in time
    fn arm_deadman(&mut self, class: DeadmanClass);

    /// Stop the deadman timer
    fn disarm_deadman(&mut self);

    /// Suspend interrupts, returning the previous mask
    fn mask_interrupts(&mut self) -> InterruptMask;

    /// Restore the interrupt mask saved by [`Timing::mask_interrupts`]
    fn restore_interrupts(&mut self, saved: InterruptMask);
}

impl<T: Timing + ?Sized> Timing for &mut T {
    fn wait(&mut self, delay: Delay) {
        (**self).wait(delay)
    }

    fn arm_deadman(&mut self, class: DeadmanClass) {
        (**self).arm_deadman(class)
    }

    fn disarm_deadman(&mut self) {
        (**self).disarm_deadman()
    }

    fn mask_interrupts(&mut self) -> InterruptMask {
        (**self).mask_interrupts()
    }

    fn restore_interrupts(&mut self, saved: InterruptMask) {
        (**self).restore_interrupts(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loops_round_up() {
        let cal = Calibration {
            cpu_mhz: 40,
            cycles_per_loop: 4,
        };
        assert_eq!(cal.loops(Delay::from_micros(0)), 1);
        assert_eq!(cal.loops(Delay::from_micros(1)), 11);
        assert_eq!(cal.loops(Delay::from_micros(10_000)), 100_001);
    }

    #[test]
    fn test_long_waits_do_not_overflow() {
        let cal = Calibration {
            cpu_mhz: 40,
            cycles_per_loop: 4,
        };
        // 200 s: the product overflows 32 bits, the loop count does not
        assert_eq!(cal.loops(Delay::from_micros(200_000_000)), 2_000_000_001);
        assert_eq!(cal.loops(Delay::from_micros(u32::MAX)), u32::MAX);

        let cal = Calibration {
            cpu_mhz: 200,
            cycles_per_loop: 1,
        };
        assert_eq!(cal.loops(Delay::from_micros(30_000_000)), u32::MAX);
    }

    #[test]
    fn test_loops_to_nanos() {
        let cal = Calibration {
            cpu_mhz: 20,
            cycles_per_loop: 4,
        };
        // 5 loops/us at 20 MHz
        assert_eq!(cal.loops_to_nanos(5), 1000);
        let spun = cal.loops_to_nanos(cal.loops(Delay::from_micros(500)));
        assert!(spun >= 500_000);
    }
}
