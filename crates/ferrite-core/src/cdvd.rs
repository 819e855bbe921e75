//! The CDVD drive: an ISO sector reader behind the mechanical timing
//! model the DMA path depends on (spin-up, seek classes, per-block
//! read rate).

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use log::{debug, info, warn};

use crate::scheduler::{EventKind, Scheduler, IOP_CLOCK};

const SECTOR_SIZE: u32 = 2048;

// Read-rate constants in bytes per second at 1x.
const CD_READ_SPEED: u64 = 153_600;
const DVD_READ_SPEED: u64 = 1_382_400;

/// A byte-addressable 2048-byte-sector image.
pub struct IsoReader {
    file: File,
    sector_count: u32,
}

impl IsoReader {
    pub fn open(path: &Path) -> std::io::Result<IsoReader> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(IsoReader { file, sector_count: (size / SECTOR_SIZE as u64) as u32 })
    }

    pub fn sector_count(&self) -> u32 {
        self.sector_count
    }

    /// Reads past the end of the image return zero bytes and log.
    pub fn read_sector(&mut self, lba: u32, out: &mut [u8; SECTOR_SIZE as usize]) -> std::io::Result<()> {
        if lba >= self.sector_count {
            warn!(target: "cdvd", "read past end of disc: lba {lba} (size {})", self.sector_count);
            out.fill(0);
            return Ok(());
        }
        self.file.seek(SeekFrom::Start(lba as u64 * SECTOR_SIZE as u64))?;
        self.file.read_exact(out)?;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DriveState {
    Stopped,
    Seeking,
    Reading,
    Paused,
}

pub struct CdvdDrive {
    container: Option<IsoReader>,
    speed: u32,
    is_spinning: bool,
    state: DriveState,
    current_sector: u32,
    seek_target: u32,
    sectors_left: u32,
    dvd_mode: bool,
    sector_buffer: [u8; SECTOR_SIZE as usize],
    /// Raised when a block lands in the buffer; the DMA channel drains it.
    dma_request: bool,
    /// Sticky status error, observable by the guest.
    error: bool,
}

impl CdvdDrive {
    pub fn new() -> CdvdDrive {
        CdvdDrive {
            container: None,
            speed: 4,
            is_spinning: false,
            state: DriveState::Stopped,
            current_sector: 0,
            seek_target: 0,
            sectors_left: 0,
            dvd_mode: true,
            sector_buffer: [0; SECTOR_SIZE as usize],
            dma_request: false,
            error: false,
        }
    }

    pub fn reset(&mut self) {
        self.speed = 4;
        self.is_spinning = false;
        self.state = DriveState::Stopped;
        self.current_sector = 0;
        self.seek_target = 0;
        self.sectors_left = 0;
        self.dma_request = false;
        self.error = false;
    }

    pub fn insert(&mut self, path: &Path) -> std::io::Result<()> {
        let reader = IsoReader::open(path)?;
        info!(target: "cdvd", "disc inserted: {} sectors", reader.sector_count());
        self.container = Some(reader);
        self.reset();
        Ok(())
    }

    pub fn disc_present(&self) -> bool {
        self.container.is_some()
    }

    pub fn error_bit(&self) -> bool {
        self.error
    }

    pub fn take_dma_request(&mut self) -> bool {
        std::mem::take(&mut self.dma_request)
    }

    pub fn sector_data(&self) -> &[u8; SECTOR_SIZE as usize] {
        &self.sector_buffer
    }

    /// EE cycles for one block at the current speed.
    fn block_timing(&self) -> u64 {
        let rate = if self.dvd_mode { DVD_READ_SPEED } else { CD_READ_SPEED };
        // Times 8: the scheduler counts EE cycles, timing is in IOP clocks.
        (IOP_CLOCK * SECTOR_SIZE as u64 * 8) / (self.speed as u64 * rate)
    }

    /// Begin a read: seek latency first, then one event per block.
    pub fn start_read(&mut self, sector: u32, count: u32, scheduler: &mut Scheduler) {
        let Some(container) = self.container.as_ref() else {
            warn!(target: "cdvd", "read with no disc");
            self.error = true;
            return;
        };
        let mut target = sector;
        if target >= container.sector_count() {
            // The drive flags the bad seek and parks at the last sector.
            warn!(target: "cdvd", "seek beyond disc: {target}");
            self.error = true;
            target = container.sector_count().saturating_sub(1);
        }
        self.seek_target = target;
        self.sectors_left = count;
        self.state = DriveState::Seeking;

        let seek_cycles = if !self.is_spinning {
            self.is_spinning = true;
            debug!(target: "cdvd", "spinning up");
            IOP_CLOCK * 8 / 3
        } else {
            let delta = self.current_sector.abs_diff(target) as u64;
            let contiguous = if self.dvd_mode { 16 } else { 8 };
            let fast = if self.dvd_mode { 14764 } else { 4371 };
            if delta < contiguous {
                self.block_timing() * delta
            } else if delta < fast {
                debug!(target: "cdvd", "fast seek ({delta} sectors)");
                IOP_CLOCK * 8 * 30 / 1000
            } else {
                debug!(target: "cdvd", "full seek ({delta} sectors)");
                IOP_CLOCK * 8 * 100 / 1000
            }
        };
        scheduler.add_event(EventKind::CdvdSeekDone, seek_cycles.max(1));
    }

    /// Seek latency has elapsed; start the block clock.
    pub fn on_seek_done(&mut self, scheduler: &mut Scheduler) {
        self.current_sector = self.seek_target;
        self.state = DriveState::Reading;
        if self.sectors_left > 0 {
            scheduler.add_event(EventKind::CdvdReadBlock, self.block_timing().max(1));
        } else {
            self.state = DriveState::Paused;
        }
    }

    /// One block arrived: latch it and raise the DMA request line.
    pub fn on_read_block(&mut self, scheduler: &mut Scheduler) {
        let Some(container) = self.container.as_mut() else {
            return;
        };
        if let Err(e) = container.read_sector(self.current_sector, &mut self.sector_buffer) {
            warn!(target: "cdvd", "read error at {}: {e}", self.current_sector);
            self.error = true;
        }
        self.current_sector += 1;
        self.sectors_left = self.sectors_left.saturating_sub(1);
        self.dma_request = true;
        if self.sectors_left > 0 {
            scheduler.add_event(EventKind::CdvdReadBlock, self.block_timing().max(1));
        } else {
            debug!(target: "cdvd", "read complete at sector {}", self.current_sector);
            self.state = DriveState::Paused;
        }
    }

    pub fn reading(&self) -> bool {
        matches!(self.state, DriveState::Seeking | DriveState::Reading)
    }
}

impl Default for CdvdDrive {
    fn default() -> Self {
        Self::new()
    }
}
