//! The console core: one [`Emulator`] owns the EE, the bus and every
//! device on it, the scheduler, and the CDVD drive, and drives the GS
//! worker thread through its handle.

pub mod bus;
pub mod cdvd;
pub mod dmac;
pub mod ee;
pub mod elf;
pub mod gif;
pub mod intc;
pub mod memcard;
pub mod scheduler;
pub mod timers;

use std::path::Path;
use std::sync::{Arc, Mutex};

use log::info;
use thiserror::Error;

use bus::Bus;
use cdvd::CdvdDrive;
use ee::EmotionEngine;
use ferrite_gs::{GsError, GsHandle};
use intc::IntLine;
use scheduler::{EventKind, Scheduler, EE_CLOCK};

/// Fatal emulation failures. Everything here halts the core and is
/// reported to the front-end; guest-visible MIPS exceptions never
/// surface this way.
#[derive(Debug, Error)]
pub enum EmuError {
    #[error("unknown {table} opcode ${op:02X} (instruction ${instr:08X} at ${pc:08X})")]
    Decode { table: &'static str, op: u8, instr: u32, pc: u32 },

    #[error("dma: {0}")]
    Dma(String),

    #[error("graphics: {0}")]
    Gs(#[from] GsError),

    #[error("invalid ELF image")]
    InvalidElf,

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// NTSC frame timing in EE cycles.
pub const CYCLES_PER_FRAME: u64 = EE_CLOCK / 60;
const VBLANK_START_OFFSET: u64 = CYCLES_PER_FRAME * 9 / 10;

/// One frame of scanout: dimensions plus the shared buffer it landed in.
pub struct FrameInfo {
    pub width: u32,
    pub height: u32,
    pub buffer: Arc<Mutex<Vec<u32>>>,
}

pub struct Emulator {
    pub ee: EmotionEngine,
    pub bus: Bus,
    pub scheduler: Scheduler,
    pub cdvd: CdvdDrive,
    frame_count: u64,
    display_buffer: usize,
    frame_complete: bool,
}

impl Emulator {
    pub fn new() -> Emulator {
        Emulator {
            ee: EmotionEngine::new(),
            bus: Bus::new(GsHandle::spawn()),
            scheduler: Scheduler::new(),
            cdvd: CdvdDrive::new(),
            frame_count: 0,
            display_buffer: 0,
            frame_complete: false,
        }
    }

    /// Full reset: every component reinitializes from scratch.
    pub fn reset(&mut self) {
        self.ee.reset();
        self.bus.reset();
        self.scheduler.reset();
        self.cdvd.reset();
        self.frame_count = 0;
        self.display_buffer = 0;
        self.frame_complete = false;
    }

    pub fn load_bios(&mut self, image: &[u8]) {
        self.bus.load_bios(image);
    }

    /// Load an ELF into RAM and point the EE at its entry.
    pub fn load_elf(&mut self, image: &[u8]) -> Result<(), EmuError> {
        let entry = elf::load(&mut self.bus, image)?;
        self.ee.set_pc(entry);
        info!(target: "elf", "booting at ${entry:08X}");
        Ok(())
    }

    pub fn insert_disc(&mut self, path: &Path) -> Result<(), EmuError> {
        self.cdvd.insert(path)?;
        Ok(())
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Run until the next vertical blank completes, then scan the frame
    /// out into the back buffer and flip.
    pub fn run_frame(&mut self) -> Result<FrameInfo, EmuError> {
        self.frame_complete = false;
        self.scheduler.add_event(EventKind::VblankStart, VBLANK_START_OFFSET);
        self.scheduler.add_event(EventKind::FrameEnd, CYCLES_PER_FRAME);

        while !self.frame_complete {
            let cycles = self.scheduler.calculate_run_cycles();
            for _ in 0..cycles {
                self.ee.step(&mut self.bus)?;
            }
            self.ee.cop0.count_up(cycles);

            let (bus_cycles, _iop_cycles) = self.scheduler.update_cycle_counts();
            self.bus.tick_dmac(cycles);
            self.bus.tick_timers(bus_cycles);
            if let Some(error) = self.bus.take_fatal() {
                return Err(error);
            }

            for event in self.scheduler.pop_due() {
                self.process_event(event)?;
            }

            // Interrupt lines are level-sensitive into CAUSE.
            self.ee.cop0.cause.int0_pending = self.bus.intc.int_pending();
            self.ee.cop0.cause.int1_pending = self.bus.dmac.int1_level();
            self.ee.try_interrupt();
        }

        let (width, height) = self.bus.gs.render_crt(self.display_buffer)?;
        let info = FrameInfo {
            width,
            height,
            buffer: self.bus.gs.framebuffer(self.display_buffer),
        };
        self.display_buffer ^= 1;
        self.frame_count += 1;
        Ok(info)
    }

    fn process_event(&mut self, event: EventKind) -> Result<(), EmuError> {
        match event {
            EventKind::VblankStart => {
                if self.bus.gs.set_vblank(true)? {
                    self.bus.intc.assert_irq(IntLine::Gs);
                }
                self.bus.intc.assert_irq(IntLine::VblankStart);
            }
            EventKind::FrameEnd => {
                self.bus.gs.set_vblank(false)?;
                self.bus.intc.assert_irq(IntLine::VblankEnd);
                self.frame_complete = true;
            }
            EventKind::CdvdSeekDone => {
                let Emulator { cdvd, scheduler, .. } = self;
                cdvd.on_seek_done(scheduler);
            }
            EventKind::CdvdReadBlock => {
                let Emulator { cdvd, scheduler, .. } = self;
                cdvd.on_read_block(scheduler);
                // The IOP side of the disc pipe lives outside the core;
                // the freshly buffered sector waits on its request line.
                let _ = cdvd.take_dma_request();
            }
        }
        Ok(())
    }
}

impl Default for Emulator {
    fn default() -> Self {
        Self::new()
    }
}
