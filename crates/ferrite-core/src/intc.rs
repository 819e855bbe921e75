//! The EE interrupt controller: a status/mask pair driving the INT0
//! line.

use log::trace;

/// INTC_STAT bit positions.
#[derive(Clone, Copy, Debug)]
pub enum IntLine {
    Gs = 0,
    Sbus = 1,
    VblankStart = 2,
    VblankEnd = 3,
    Vif0 = 4,
    Vif1 = 5,
    Vu0 = 6,
    Vu1 = 7,
    Ipu = 8,
    Timer0 = 9,
    Timer1 = 10,
    Timer2 = 11,
    Timer3 = 12,
}

pub struct Intc {
    stat: u32,
    mask: u32,
}

impl Intc {
    pub fn new() -> Intc {
        Intc { stat: 0, mask: 0 }
    }

    pub fn reset(&mut self) {
        self.stat = 0;
        self.mask = 0;
    }

    pub fn assert_irq(&mut self, line: IntLine) {
        trace!(target: "intc", "assert {line:?}");
        self.stat |= 1 << line as u32;
    }

    pub fn read_stat(&self) -> u32 {
        self.stat
    }

    pub fn read_mask(&self) -> u32 {
        self.mask
    }

    /// Writing one clears the status bit.
    pub fn write_stat(&mut self, value: u32) {
        self.stat &= !value;
    }

    /// Writing one toggles the mask bit.
    pub fn write_mask(&mut self, value: u32) {
        self.mask ^= value & 0x7FFF;
    }

    /// INT0 output to the CPU.
    pub fn int_pending(&self) -> bool {
        self.stat & self.mask != 0
    }
}

impl Default for Intc {
    fn default() -> Self {
        Self::new()
    }
}
