//! Host↔local transfer machinery: BITBLTBUF/TRXPOS/TRXREG decode and
//! the HWREG unpack paths for each destination format.

use log::{debug, trace};

use crate::state::GsState;
use crate::GsError;

#[derive(Clone, Copy, Debug, Default)]
pub struct BitBltBuf {
    pub source_base: u32,
    pub source_width: u32,
    pub source_format: u8,
    pub dest_base: u32,
    pub dest_width: u32,
    pub dest_format: u8,
}

impl BitBltBuf {
    pub fn decode(value: u64) -> BitBltBuf {
        BitBltBuf {
            source_base: (value as u32 & 0x3FFF) * 64 * 4,
            source_width: ((value >> 16) as u32 & 0x3F) * 64,
            source_format: (value >> 24) as u8 & 0x3F,
            dest_base: ((value >> 32) as u32 & 0x3FFF) * 64 * 4,
            dest_width: ((value >> 48) as u32 & 0x3F) * 64,
            dest_format: (value >> 56) as u8 & 0x3F,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TrxPos {
    pub source_x: u32,
    pub source_y: u32,
    pub dest_x: u32,
    pub dest_y: u32,
    pub trans_order: u8,
    /// Running cursor positions while a transfer is active.
    pub int_source_x: u32,
    pub int_source_y: u32,
    pub int_dest_x: u32,
    pub int_dest_y: u32,
}

impl TrxPos {
    pub fn decode(value: u64) -> TrxPos {
        TrxPos {
            source_x: value as u32 & 0x7FF,
            source_y: (value >> 16) as u32 & 0x7FF,
            dest_x: (value >> 32) as u32 & 0x7FF,
            dest_y: (value >> 48) as u32 & 0x7FF,
            trans_order: (value >> 59) as u8 & 0x3,
            int_source_x: 0,
            int_source_y: 0,
            int_dest_x: 0,
            int_dest_y: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TrxReg {
    pub width: u32,
    pub height: u32,
}

impl GsState {
    /// TRXDIR write: arms (or in the local→local case completes) a
    /// transfer. Direction 3 deactivates.
    pub(crate) fn start_transfer(&mut self, dir: u8) -> Result<(), GsError> {
        self.trxdir = dir;
        if dir == 3 {
            return Ok(());
        }
        self.pixels_transferred = 0;
        self.psmct24_color = 0;
        self.psmct24_unpacked = 0;
        self.trxpos.int_dest_x = self.trxpos.dest_x;
        self.trxpos.int_dest_y = self.trxpos.dest_y;
        self.trxpos.int_source_x = self.trxpos.source_x;
        self.trxpos.int_source_y = self.trxpos.source_y;
        debug!(target: "gs_t",
            "transfer dir {} fmt ${:02X} {}x{} dest ${:08X} (+{},{})",
            dir, self.bitbltbuf.dest_format, self.trxreg.width, self.trxreg.height,
            self.bitbltbuf.dest_base, self.trxpos.dest_x, self.trxpos.dest_y);
        if dir == 2 {
            self.local_to_local()?;
            self.trxdir = 3;
        }
        Ok(())
    }

    fn advance_dest(&mut self) {
        self.pixels_transferred += 1;
        self.trxpos.int_dest_x += 1;
        if self.trxpos.int_dest_x - self.trxpos.dest_x == self.trxreg.width {
            self.trxpos.int_dest_x = self.trxpos.dest_x;
            self.trxpos.int_dest_y += 1;
        }
    }

    /// One 64-bit datum of a host→local transfer. The pixels-per-
    /// doubleword rate depends on the destination format.
    pub(crate) fn write_hwreg(&mut self, data: u64) -> Result<(), GsError> {
        let fmt = self.bitbltbuf.dest_format;
        let ppd: u32 = match fmt {
            0x00 => 2,         // PSMCT32
            0x01 => 3,         // PSMCT24
            0x02 | 0x0A => 4,  // PSMCT16/16S
            0x13 | 0x1B => 8,  // PSMCT8/8H
            0x14 | 0x24 | 0x2C => 16, // PSMCT4/4HL/4HH
            other => return Err(GsError::UnknownTransferFormat(other)),
        };

        let base = self.bitbltbuf.dest_base;
        let width = self.bitbltbuf.dest_width;

        for i in 0..ppd {
            let x = self.trxpos.int_dest_x;
            let y = self.trxpos.int_dest_y;
            match fmt {
                0x00 => {
                    self.mem.write_psmct32(base, width, x, y, (data >> (i * 32)) as u32);
                    self.advance_dest();
                }
                0x01 => self.unpack_psmct24(data, i),
                0x02 => {
                    self.mem.write_psmct16(base, width, x, y, (data >> (i * 16)) as u16);
                    self.advance_dest();
                }
                0x0A => {
                    self.mem.write_psmct16s(base, width, x, y, (data >> (i * 16)) as u16);
                    self.advance_dest();
                }
                0x13 => {
                    self.mem.write_psmct8(base, width, x, y, (data >> (i * 8)) as u8);
                    self.advance_dest();
                }
                0x14 => {
                    let nibble = (data >> (i * 4)) as u8 & 0xF;
                    self.mem.write_psmct4(base, width, x, y, nibble);
                    self.advance_dest();
                }
                0x1B => {
                    // 8-bit data into the alpha byte of a PSMCT32 buffer.
                    let value = ((data >> (i * 8)) as u32 & 0xFF) << 24
                        | (self.mem.read_psmct32(base, width, x, y) & 0x00FF_FFFF);
                    self.mem.write_psmct32(base, width, x, y, value);
                    self.advance_dest();
                }
                0x24 => {
                    let value = ((data >> (i * 4)) as u32 & 0xF) << 24
                        | (self.mem.read_psmct32(base, width, x, y) & 0xF0FF_FFFF);
                    self.mem.write_psmct32(base, width, x, y, value);
                    self.advance_dest();
                }
                0x2C => {
                    let value = ((data >> (i * 4)) as u32 & 0xF) << 28
                        | (self.mem.read_psmct32(base, width, x, y) & 0x0FFF_FFFF);
                    self.mem.write_psmct32(base, width, x, y, value);
                    self.advance_dest();
                }
                _ => unreachable!(),
            }
        }

        let max_pixels = self.trxreg.width * self.trxreg.height;
        if self.pixels_transferred >= max_pixels {
            trace!(target: "gs_t", "HWREG transfer complete ({max_pixels} pixels)");
            self.trxdir = 3;
            self.pixels_transferred = 0;
        }
        Ok(())
    }

    /// PSMCT24 packs three bytes per pixel into the 64-bit stream; a
    /// carry buffer holds the bytes of a pixel that straddles doublewords.
    fn unpack_psmct24(&mut self, data: u64, offset: u32) {
        let mut bytes_unpacked = 0;
        let mut i = offset * 24;
        while bytes_unpacked < 3 && i < 64 {
            self.psmct24_color |= ((data >> i) as u32 & 0xFF) << (self.psmct24_unpacked * 8);
            self.psmct24_unpacked += 1;
            bytes_unpacked += 1;
            i += 8;
            if self.psmct24_unpacked == 3 {
                self.mem.write_psmct32(
                    self.bitbltbuf.dest_base,
                    self.bitbltbuf.dest_width,
                    self.trxpos.int_dest_x,
                    self.trxpos.int_dest_y,
                    self.psmct24_color,
                );
                self.psmct24_color = 0;
                self.psmct24_unpacked = 0;
                self.advance_dest();
            }
        }
    }

    /// Local→local copy, pixel-by-pixel through the format-specific
    /// address helpers of both rectangles. Runs synchronously.
    fn local_to_local(&mut self) -> Result<(), GsError> {
        let bblt = self.bitbltbuf;
        let (sx0, sy0) = (self.trxpos.source_x, self.trxpos.source_y);
        let (dx0, dy0) = (self.trxpos.dest_x, self.trxpos.dest_y);
        for y in 0..self.trxreg.height {
            for x in 0..self.trxreg.width {
                let value = self.read_transfer_pixel(
                    bblt.source_format,
                    bblt.source_base,
                    bblt.source_width,
                    sx0 + x,
                    sy0 + y,
                )?;
                self.write_transfer_pixel(
                    bblt.dest_format,
                    bblt.dest_base,
                    bblt.dest_width,
                    dx0 + x,
                    dy0 + y,
                    value,
                )?;
            }
        }
        self.pixels_transferred = 0;
        Ok(())
    }

    fn read_transfer_pixel(
        &self,
        fmt: u8,
        base: u32,
        width: u32,
        x: u32,
        y: u32,
    ) -> Result<u32, GsError> {
        Ok(match fmt {
            0x00 | 0x01 | 0x1B | 0x24 | 0x2C => self.mem.read_psmct32(base, width, x, y),
            0x02 => self.mem.read_psmct16(base, width, x, y) as u32,
            0x0A => self.mem.read_psmct16s(base, width, x, y) as u32,
            0x13 => self.mem.read_psmct8(base, width, x, y) as u32,
            0x14 => self.mem.read_psmct4(base, width, x, y) as u32,
            0x30 => self.mem.read_psmct32z(base, width, x, y),
            0x32 => self.mem.read_psmct16z(base, width, x, y) as u32,
            0x3A => self.mem.read_psmct16sz(base, width, x, y) as u32,
            other => return Err(GsError::UnknownTransferFormat(other)),
        })
    }

    fn write_transfer_pixel(
        &mut self,
        fmt: u8,
        base: u32,
        width: u32,
        x: u32,
        y: u32,
        value: u32,
    ) -> Result<(), GsError> {
        match fmt {
            0x00 | 0x01 | 0x1B | 0x24 | 0x2C => self.mem.write_psmct32(base, width, x, y, value),
            0x02 => self.mem.write_psmct16(base, width, x, y, value as u16),
            0x0A => self.mem.write_psmct16s(base, width, x, y, value as u16),
            0x13 => self.mem.write_psmct8(base, width, x, y, value as u8),
            0x14 => self.mem.write_psmct4(base, width, x, y, value as u8),
            0x30 => self.mem.write_psmct32z(base, width, x, y, value),
            0x32 => self.mem.write_psmct16z(base, width, x, y, value as u16),
            0x3A => self.mem.write_psmct16sz(base, width, x, y, value as u16),
            other => return Err(GsError::UnknownTransferFormat(other)),
        }
        Ok(())
    }

    /// One quadword of an active local→host transfer (PSMCT32 source).
    /// Returns the packed data and whether the transfer just finished.
    pub(crate) fn local_to_host(&mut self) -> Result<(u128, bool), GsError> {
        if self.trxdir != 1 {
            return Ok((0, true));
        }
        let bblt = self.bitbltbuf;
        let mut quad: u128 = 0;
        for word in 0..4 {
            let value = self.read_transfer_pixel(
                bblt.source_format,
                bblt.source_base,
                bblt.source_width,
                self.trxpos.int_source_x,
                self.trxpos.int_source_y,
            )?;
            quad |= (value as u128) << (word * 32);
            self.pixels_transferred += 1;
            self.trxpos.int_source_x += 1;
            if self.trxpos.int_source_x - self.trxpos.source_x == self.trxreg.width {
                self.trxpos.int_source_x = self.trxpos.source_x;
                self.trxpos.int_source_y += 1;
            }
        }
        let done = self.pixels_transferred >= self.trxreg.width * self.trxreg.height;
        if done {
            trace!(target: "gs_t", "local->host transfer complete");
            self.trxdir = 3;
            self.pixels_transferred = 0;
        }
        Ok((quad, done))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitbltbuf_decode() {
        let value = 0x40u64 | (4 << 16) | (0u64 << 24) | (0x80u64 << 32) | (10u64 << 48) | (0x13u64 << 56);
        let b = BitBltBuf::decode(value);
        assert_eq!(b.source_base, 0x40 * 256);
        assert_eq!(b.source_width, 256);
        assert_eq!(b.dest_base, 0x80 * 256);
        assert_eq!(b.dest_width, 640);
        assert_eq!(b.dest_format, 0x13);
    }

    #[test]
    fn trxpos_decode() {
        let p = TrxPos::decode(16 | (32u64 << 16) | (64u64 << 32) | (128u64 << 48));
        assert_eq!(p.source_x, 16);
        assert_eq!(p.source_y, 32);
        assert_eq!(p.dest_x, 64);
        assert_eq!(p.dest_y, 128);
    }
}
