//! The Graphics Interface: arbitration between the three GS input
//! paths and the GIFtag state machine that turns quadword streams into
//! GS register traffic.

use heapless::Deque;
use log::{debug, trace, warn};

use ferrite_gs::GsHandle;

use crate::EmuError;

const CTRL: u32 = 0x1000_3000;
const MODE: u32 = 0x1000_3010;
const STAT: u32 = 0x1000_3020;

/// Hardware PATH3 FIFO depth in quadwords.
const FIFO_DEPTH: usize = 16;

const PATH_IDLE: u8 = 0;

#[derive(Clone, Copy, Debug, Default)]
struct GifTag {
    nloop: u16,
    end_of_packet: bool,
    output_prim: bool,
    prim: u16,
    format: u8,
    reg_count: u8,
    regs: u64,
    regs_left: u8,
    data_left: u32,
}

pub struct Gif {
    tag: GifTag,
    /// 0 = idle, else the active path number.
    active_path: u8,
    path3_vif_masked: bool,
    path3_mode_masked: bool,
    fifo: Deque<u128, FIFO_DEPTH>,
}

impl Gif {
    pub fn new() -> Gif {
        Gif {
            tag: GifTag::default(),
            active_path: PATH_IDLE,
            path3_vif_masked: false,
            path3_mode_masked: false,
            fifo: Deque::new(),
        }
    }

    pub fn reset(&mut self) {
        self.tag = GifTag::default();
        self.active_path = PATH_IDLE;
        self.path3_vif_masked = false;
        self.path3_mode_masked = false;
        self.fifo.clear();
    }

    pub fn read32(&mut self, addr: u32) -> u32 {
        match addr {
            STAT => {
                (self.path3_mode_masked as u32)
                    | (self.path3_vif_masked as u32) << 1
                    | ((self.active_path as u32) & 0x7) << 10
                    | ((self.fifo.len() as u32) & 0x1F) << 24
            }
            _ => {
                warn!(target: "gif", "unrecognized read32 from ${addr:08X}");
                0
            }
        }
    }

    pub fn write32(&mut self, addr: u32, value: u32) {
        match addr {
            CTRL => {
                if value & 0x1 != 0 {
                    debug!(target: "gif", "reset via GIF_CTRL");
                    self.reset();
                }
            }
            MODE => {
                self.path3_mode_masked = value & 0x1 != 0;
            }
            _ => warn!(target: "gif", "unrecognized write32 to ${addr:08X}: ${value:08X}"),
        }
    }

    /// VIF's MSKPATH3 line.
    pub fn set_path3_vif_mask(&mut self, masked: bool) {
        self.path3_vif_masked = masked;
    }

    fn path3_masked(&self) -> bool {
        self.path3_vif_masked || self.path3_mode_masked
    }

    /// Whether the DMAC may push another PATH3 quadword without stalling.
    pub fn path3_ready(&self) -> bool {
        !self.path3_masked() || !self.fifo.is_full()
    }

    /// Drain any FIFO'd PATH3 data once the masks drop.
    pub fn flush_path3(&mut self, gs: &mut GsHandle) -> Result<(), EmuError> {
        while !self.path3_masked() {
            match self.fifo.pop_front() {
                Some(quad) => self.feed(3, quad, gs)?,
                None => break,
            }
        }
        Ok(())
    }

    /// PATH1: XGKICK hand-off from VU1 memory. Highest priority; never
    /// queued.
    pub fn send_path1(&mut self, quad: u128, gs: &mut GsHandle) -> Result<(), EmuError> {
        self.feed(1, quad, gs)
    }

    /// PATH2: direct VIF1 register transfer.
    pub fn send_path2(&mut self, quad: u128, gs: &mut GsHandle) -> Result<(), EmuError> {
        self.feed(2, quad, gs)
    }

    /// PATH3: the DMAC's GIF channel. Masked data parks in the FIFO.
    pub fn send_path3(&mut self, quad: u128, gs: &mut GsHandle) -> Result<(), EmuError> {
        self.flush_path3(gs)?;
        if self.path3_masked() {
            if self.fifo.push_back(quad).is_err() {
                warn!(target: "gif", "PATH3 FIFO overflow; quadword dropped");
            }
            return Ok(());
        }
        self.feed(3, quad, gs)
    }

    /// True while no tag is in flight (the next quad starts a packet).
    pub fn expecting_tag(&self) -> bool {
        self.tag.data_left == 0
    }

    fn feed(&mut self, path: u8, quad: u128, gs: &mut GsHandle) -> Result<(), EmuError> {
        let data = [quad as u64, (quad >> 64) as u64];
        if self.tag.data_left == 0 {
            // Arbitration: adopt this path for the packet.
            self.active_path = path;
            self.tag.nloop = (data[0] & 0x7FFF) as u16;
            self.tag.end_of_packet = data[0] & (1 << 15) != 0;
            self.tag.output_prim = data[0] & (1 << 46) != 0;
            self.tag.prim = ((data[0] >> 47) & 0x7FF) as u16;
            self.tag.format = ((data[0] >> 58) & 0x3) as u8;
            self.tag.reg_count = (data[0] >> 60) as u8;
            if self.tag.reg_count == 0 {
                self.tag.reg_count = 16;
            }
            self.tag.regs = data[1];
            self.tag.regs_left = self.tag.reg_count;
            self.tag.data_left = self.tag.nloop as u32;

            trace!(target: "gif",
                "tag on PATH{path}: nloop {} eop {} fmt {} nreg {} regs ${:016X}",
                self.tag.nloop, self.tag.end_of_packet, self.tag.format,
                self.tag.reg_count, self.tag.regs);

            // Q resets at every tag boundary.
            gs.set_q(1.0)?;

            if self.tag.output_prim && self.tag.format != 1 {
                gs.write64(0, self.tag.prim as u64)?;
            }
            if self.tag.data_left == 0 && self.tag.end_of_packet {
                self.active_path = PATH_IDLE;
            }
            return Ok(());
        }

        match self.tag.format {
            0 => {
                self.process_packed(data, gs)?;
                self.tag.regs_left -= 1;
                if self.tag.regs_left == 0 {
                    self.tag.regs_left = self.tag.reg_count;
                    self.tag.data_left -= 1;
                }
            }
            1 => self.process_reglist(data, gs)?,
            2 => {
                gs.write64(0x54, data[0])?;
                gs.write64(0x54, data[1])?;
                self.tag.data_left -= 1;
            }
            _ => {
                // DISABLE: consumed, ignored.
                self.tag.data_left -= 1;
            }
        }

        if self.tag.data_left == 0 && self.tag.end_of_packet {
            self.active_path = PATH_IDLE;
        }
        Ok(())
    }

    fn current_selector(&self) -> u8 {
        let offset = ((self.tag.reg_count - self.tag.regs_left) as u64) << 2;
        ((self.tag.regs >> offset) & 0xF) as u8
    }

    fn process_packed(&mut self, data: [u64; 2], gs: &mut GsHandle) -> Result<(), EmuError> {
        let reg = self.current_selector();
        match reg {
            0x0 => gs.write64(0, data[0])?,
            0x1 => {
                // RGBAQ: Q rides in separately via ST.
                let r = data[0] as u8;
                let g = (data[0] >> 32) as u8;
                let b = data[1] as u8;
                let a = (data[1] >> 32) as u8;
                gs.set_rgba(r, g, b, a)?;
            }
            0x2 => {
                let s = data[0] as u32;
                let t = (data[0] >> 32) as u32;
                let q = data[1] as u32;
                gs.set_stq(s, t, q)?;
            }
            0x3 => {
                let u = (data[0] & 0x3FFF) as u16;
                let v = ((data[0] >> 32) & 0x3FFF) as u16;
                gs.set_uv(u, v)?;
            }
            0x4 => {
                let x = data[0] as u16;
                let y = (data[0] >> 32) as u16;
                let z = ((data[1] >> 4) & 0xFF_FFFF) as u32;
                let fog = ((data[1] >> 36) & 0xFF) as u8;
                let disable = data[1] & (1 << (111 - 64)) != 0;
                gs.set_xyzf(x, y, z, fog, !disable)?;
            }
            0x5 => {
                let x = data[0] as u16;
                let y = (data[0] >> 32) as u16;
                let z = ((data[1] >> 4) & 0xFF_FFFF) as u32;
                let disable = data[1] & (1 << (111 - 64)) != 0;
                gs.set_xyz(x, y, z, !disable)?;
            }
            0x6 | 0x7 => gs.write64(reg as u32, data[0])?,
            0xA => {
                let fog = (data[1] >> 36) & 0xFF;
                gs.write64(0x0A, fog << 56)?;
            }
            0xE => {
                // A+D: value then destination address.
                let addr = (data[1] & 0xFF) as u32;
                gs.write64(addr, data[0])?;
            }
            0xF => {}
            other => {
                warn!(target: "gif", "unrecognized PACKED selector ${other:X}");
            }
        }
        Ok(())
    }

    fn process_reglist(&mut self, data: [u64; 2], gs: &mut GsHandle) -> Result<(), EmuError> {
        for (i, value) in data.iter().enumerate() {
            let reg = self.current_selector();
            gs.write64(reg as u32, *value)?;

            self.tag.regs_left -= 1;
            if self.tag.regs_left == 0 {
                self.tag.regs_left = self.tag.reg_count;
                self.tag.data_left -= 1;
                // An odd NREGS x NLOOP discards the final high doubleword.
                if self.tag.data_left == 0 && i == 0 {
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}

impl Default for Gif {
    fn default() -> Self {
        Self::new()
    }
}
