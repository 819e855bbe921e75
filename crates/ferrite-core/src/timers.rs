//! The four EE timers. 16-bit counters on selectable bus-clock
//! prescales with compare and overflow interrupts.

use log::{trace, warn};

use crate::intc::{IntLine, Intc};

const TIMER_LINES: [IntLine; 4] = [IntLine::Timer0, IntLine::Timer1, IntLine::Timer2, IntLine::Timer3];

/// H-blank approximation in bus cycles (NTSC line rate).
const HBLANK_DIVIDER: u32 = 9370;

#[derive(Clone, Copy, Debug, Default)]
struct Timer {
    count: u32,
    mode: u32,
    comp: u32,
    hold: u32,
    prescale_acc: u32,
}

impl Timer {
    fn divider(&self) -> u32 {
        match self.mode & 0x3 {
            0 => 1,
            1 => 16,
            2 => 256,
            _ => HBLANK_DIVIDER,
        }
    }

    fn enabled(&self) -> bool {
        self.mode & (1 << 7) != 0
    }
}

pub struct Timers {
    timers: [Timer; 4],
}

impl Timers {
    pub fn new() -> Timers {
        Timers { timers: [Timer::default(); 4] }
    }

    pub fn reset(&mut self) {
        self.timers = [Timer::default(); 4];
    }

    /// Advance by a bus-clock slice, raising compare/overflow interrupts.
    pub fn run(&mut self, bus_cycles: u32, intc: &mut Intc) {
        for (index, timer) in self.timers.iter_mut().enumerate() {
            if !timer.enabled() {
                continue;
            }
            timer.prescale_acc += bus_cycles;
            let ticks = timer.prescale_acc / timer.divider();
            timer.prescale_acc %= timer.divider();
            if ticks == 0 {
                continue;
            }
            let old = timer.count;
            timer.count += ticks;

            // Compare.
            if old < timer.comp && timer.count >= timer.comp {
                if timer.mode & (1 << 8) != 0 && timer.mode & (1 << 10) == 0 {
                    timer.mode |= 1 << 10;
                    intc.assert_irq(TIMER_LINES[index]);
                }
                // ZRET: clear on compare.
                if timer.mode & (1 << 6) != 0 {
                    timer.count = 0;
                }
            }

            // Overflow past 16 bits.
            if timer.count > 0xFFFF {
                timer.count &= 0xFFFF;
                if timer.mode & (1 << 9) != 0 && timer.mode & (1 << 11) == 0 {
                    timer.mode |= 1 << 11;
                    intc.assert_irq(TIMER_LINES[index]);
                }
            }
        }
    }

    fn decode(addr: u32) -> Option<(usize, u32)> {
        let index = match addr & 0xFFFF_F800 {
            0x1000_0000 => 0,
            0x1000_0800 => 1,
            0x1000_1000 => 2,
            0x1000_1800 => 3,
            _ => return None,
        };
        Some((index, addr & 0xFF))
    }

    pub fn read32(&mut self, addr: u32) -> u32 {
        match Self::decode(addr) {
            Some((i, 0x00)) => self.timers[i].count & 0xFFFF,
            Some((i, 0x10)) => self.timers[i].mode,
            Some((i, 0x20)) => self.timers[i].comp,
            Some((i, 0x30)) => self.timers[i].hold,
            _ => {
                warn!(target: "timer", "unrecognized read32 from ${addr:08X}");
                0
            }
        }
    }

    pub fn write32(&mut self, addr: u32, value: u32) {
        match Self::decode(addr) {
            Some((i, 0x00)) => self.timers[i].count = value & 0xFFFF,
            Some((i, 0x10)) => {
                trace!(target: "timer", "T{i}_MODE: ${value:08X}");
                // The interrupt flags are write-one-to-clear.
                let flags = self.timers[i].mode & (value & 0xC00);
                self.timers[i].mode = (value & !0xC00) | (self.timers[i].mode & 0xC00 & !flags);
            }
            Some((i, 0x20)) => self.timers[i].comp = value & 0xFFFF,
            Some((i, 0x30)) => self.timers[i].hold = value & 0xFFFF,
            _ => warn!(target: "timer", "unrecognized write32 to ${addr:08X}: ${value:08X}"),
        }
    }
}

impl Default for Timers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_interrupt_fires_once() {
        let mut timers = Timers::new();
        let mut intc = Intc::new();
        intc.write_mask(1 << 9);
        // Enable timer 0, bus clock, compare interrupt armed.
        timers.write32(0x1000_0010, (1 << 7) | (1 << 8));
        timers.write32(0x1000_0020, 100);
        timers.run(150, &mut intc);
        assert!(intc.int_pending());
        intc.write_stat(1 << 9);
        timers.run(150, &mut intc);
        assert!(!intc.int_pending());
    }

    #[test]
    fn prescale_divides_bus_clock() {
        let mut timers = Timers::new();
        let mut intc = Intc::new();
        timers.write32(0x1000_0810, (1 << 7) | 1); // timer 1: /16
        timers.run(64, &mut intc);
        assert_eq!(timers.read32(0x1000_0800), 4);
    }

    #[test]
    fn overflow_wraps_to_16_bits() {
        let mut timers = Timers::new();
        let mut intc = Intc::new();
        timers.write32(0x1000_0010, 1 << 7);
        timers.write32(0x1000_0000, 0xFFF0);
        timers.run(0x20, &mut intc);
        assert_eq!(timers.read32(0x1000_0000), 0x10);
    }
}
