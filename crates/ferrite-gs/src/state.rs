//! Drawing-side GS state: register file, contexts, vertex queue,
//! transfer machinery. Owned exclusively by the worker thread.

use log::{debug, trace, warn};

use crate::context::GsContext;
use crate::mem::LocalMemory;
use crate::regs::PrivRegisters;
use crate::transfer::{BitBltBuf, TrxPos, TrxReg};
use crate::vertex::{PrimAttrs, PrimType, Rgbaq, St, Uv, Vertex};
use crate::GsError;

/// TEXA expansion values for 16- and 24-bit texels.
#[derive(Clone, Copy, Debug, Default)]
pub struct TexA {
    pub alpha0: u8,
    pub alpha1: u8,
    pub trans_black: bool,
}

/// CSM2 palette strip descriptor.
#[derive(Clone, Copy, Debug, Default)]
pub struct TexClut {
    pub width: u32,
    pub x: u32,
    pub y: u32,
}

pub struct GsState {
    pub regs: PrivRegisters,
    pub mem: LocalMemory,

    pub(crate) contexts: [GsContext; 2],
    /// Active context index, from PRIM bit 9.
    pub(crate) ctx: usize,

    pub(crate) prim_type: u8,
    pub(crate) prim: PrimAttrs,
    pub(crate) prmode: PrimAttrs,
    /// PRMODECNT.AC: take attributes from PRIM rather than PRMODE.
    pub(crate) use_prim_attrs: bool,

    pub(crate) rgbaq: Rgbaq,
    pub(crate) uv: Uv,
    pub(crate) st: St,
    pub(crate) fog: u8,
    pub(crate) texa: TexA,
    pub(crate) texclut: TexClut,
    pub(crate) fogcol: u32,
    /// Dither control is latched but dithering only applies to 16-bit
    /// frame writes, which the pixel pipe does not produce.
    #[allow(dead_code)]
    pub(crate) dthe: bool,
    pub(crate) colclamp: bool,
    pub(crate) pabe: bool,
    pub(crate) scanmsk: u8,
    #[allow(dead_code)]
    pub(crate) dimx: u64,

    pub(crate) bitbltbuf: BitBltBuf,
    pub(crate) trxpos: TrxPos,
    pub(crate) trxreg: TrxReg,
    pub(crate) trxdir: u8,
    pub(crate) pixels_transferred: u32,
    pub(crate) psmct24_color: u32,
    pub(crate) psmct24_unpacked: u8,

    pub(crate) current_vtx: Vertex,
    pub(crate) vtx_queue: [Vertex; 3],
    pub(crate) num_vertices: usize,
}

impl Default for GsState {
    fn default() -> Self {
        Self::new()
    }
}

impl GsState {
    pub fn new() -> GsState {
        let mut gs = GsState {
            regs: PrivRegisters::default(),
            mem: LocalMemory::new(),
            contexts: [GsContext::default(); 2],
            ctx: 0,
            prim_type: 0,
            prim: PrimAttrs::default(),
            prmode: PrimAttrs::default(),
            use_prim_attrs: true,
            rgbaq: Rgbaq::default(),
            uv: Uv::default(),
            st: St::default(),
            fog: 0,
            texa: TexA { alpha0: 0x80, alpha1: 0x80, trans_black: false },
            texclut: TexClut::default(),
            fogcol: 0,
            dthe: false,
            colclamp: false,
            pabe: false,
            scanmsk: 0,
            dimx: 0,
            bitbltbuf: BitBltBuf::default(),
            trxpos: TrxPos::default(),
            trxreg: TrxReg::default(),
            trxdir: 3,
            pixels_transferred: 0,
            psmct24_color: 0,
            psmct24_unpacked: 0,
            current_vtx: Vertex::default(),
            vtx_queue: [Vertex::default(); 3],
            num_vertices: 0,
        };
        gs.reset();
        gs
    }

    pub fn reset(&mut self) {
        self.regs.reset();
        self.contexts[0].reset();
        self.contexts[1].reset();
        self.ctx = 0;
        self.trxdir = 3;
        self.pixels_transferred = 0;
        self.psmct24_color = 0;
        self.psmct24_unpacked = 0;
        self.num_vertices = 0;
        self.use_prim_attrs = true;
    }

    pub(crate) fn context(&self) -> &GsContext {
        &self.contexts[self.ctx]
    }

    /// The live attribute set, per the PRMODECNT selector. The primitive
    /// type itself always comes from PRIM.
    pub(crate) fn attrs(&self) -> PrimAttrs {
        if self.use_prim_attrs {
            self.prim
        } else {
            self.prmode
        }
    }

    pub(crate) fn prim_type(&self) -> Result<PrimType, GsError> {
        PrimType::from_bits(self.prim_type)
    }

    fn select_context(&mut self) {
        self.ctx = if self.attrs().use_context2 { 1 } else { 0 };
    }

    /// Color channels only; Q keeps whatever the last ST/RGBAQ write set.
    /// This is the GIF PACKED path, where Q rides in with ST.
    pub fn set_rgba(&mut self, r: u8, g: u8, b: u8, a: u8) {
        self.rgbaq.r = r as i16;
        self.rgbaq.g = g as i16;
        self.rgbaq.b = b as i16;
        self.rgbaq.a = a as i16;
    }

    pub fn set_rgbaq(&mut self, r: u8, g: u8, b: u8, a: u8, q: f32) {
        self.rgbaq = Rgbaq { r: r as i16, g: g as i16, b: b as i16, a: a as i16, q };
    }

    pub fn set_stq(&mut self, s: u32, t: u32, q: u32) {
        self.st.s = f32::from_bits(s);
        self.st.t = f32::from_bits(t);
        self.rgbaq.q = f32::from_bits(q);
    }

    pub fn set_uv(&mut self, u: u16, v: u16) {
        self.uv = Uv { u, v };
    }

    pub fn set_q(&mut self, q: f32) {
        self.rgbaq.q = q;
    }

    pub fn set_xyz(&mut self, x: u16, y: u16, z: u32, drawing_kick: bool) -> Result<(), GsError> {
        self.current_vtx.x = x as i32;
        self.current_vtx.y = y as i32;
        self.current_vtx.z = z;
        self.vertex_kick(drawing_kick)
    }

    pub fn set_xyzf(
        &mut self,
        x: u16,
        y: u16,
        z: u32,
        fog: u8,
        drawing_kick: bool,
    ) -> Result<(), GsError> {
        self.current_vtx.fog = fog;
        self.set_xyz(x, y, z, drawing_kick)
    }

    /// A 64-bit write to the drawing register file (GIF destination).
    pub fn write64(&mut self, addr: u32, value: u64) -> Result<(), GsError> {
        match addr & 0xFFFF {
            0x0000 => {
                trace!(target: "gs_t", "PRIM: {value:#010X}");
                self.prim_type = value as u8 & 0x7;
                self.prim = PrimAttrs::from_bits(value);
                self.select_context();
                self.num_vertices = 0;
            }
            0x0001 => {
                let q = f32::from_bits((value >> 32) as u32);
                self.set_rgbaq(value as u8, (value >> 8) as u8, (value >> 16) as u8, (value >> 24) as u8, q);
            }
            0x0002 => {
                // The low eight mantissa bits are truncated on write.
                self.st.s = f32::from_bits(value as u32 & 0xFFFF_FF00);
                self.st.t = f32::from_bits((value >> 32) as u32 & 0xFFFF_FF00);
            }
            0x0003 => self.set_uv(value as u16 & 0x3FFF, (value >> 16) as u16 & 0x3FFF),
            0x0004 => {
                let fog = (value >> 56) as u8;
                self.set_xyzf(value as u16, (value >> 16) as u16, (value >> 32) as u32 & 0xFF_FFFF, fog, true)?
            }
            0x0005 => self.set_xyz(value as u16, (value >> 16) as u16, (value >> 32) as u32, true)?,
            0x0006 => self.contexts[0].set_tex0(value),
            0x0007 => self.contexts[1].set_tex0(value),
            0x0008 => self.contexts[0].set_clamp(value),
            0x0009 => self.contexts[1].set_clamp(value),
            0x000A => {
                self.fog = (value >> 56) as u8;
                self.current_vtx.fog = self.fog;
            }
            0x000C => {
                let fog = (value >> 56) as u8;
                self.set_xyzf(value as u16, (value >> 16) as u16, (value >> 32) as u32 & 0xFF_FFFF, fog, false)?
            }
            0x000D => self.set_xyz(value as u16, (value >> 16) as u16, (value >> 32) as u32, false)?,
            0x000E => {} // reserved
            0x000F => {} // NOP
            0x0014 => self.contexts[0].set_tex1(value),
            0x0015 => self.contexts[1].set_tex1(value),
            0x0016 => self.contexts[0].set_tex2(value),
            0x0017 => self.contexts[1].set_tex2(value),
            0x0018 => self.contexts[0].set_xyoffset(value),
            0x0019 => self.contexts[1].set_xyoffset(value),
            0x001A => {
                debug!(target: "gs_t", "PRMODECNT: {value:#X}");
                self.use_prim_attrs = value & 0x1 != 0;
                self.select_context();
            }
            0x001B => {
                debug!(target: "gs_t", "PRMODE: {value:#X}");
                self.prmode = PrimAttrs::from_bits(value);
                self.select_context();
            }
            0x001C => {
                self.texclut.width = (value as u32 & 0x3F) * 64;
                self.texclut.x = ((value >> 6) as u32 & 0x3F) * 16;
                self.texclut.y = (value >> 12) as u32 & 0x3FF;
            }
            0x0022 => self.scanmsk = value as u8 & 0x3,
            0x0034 => self.contexts[0].set_miptbl1(value),
            0x0035 => self.contexts[1].set_miptbl1(value),
            0x0036 => self.contexts[0].set_miptbl2(value),
            0x0037 => self.contexts[1].set_miptbl2(value),
            0x003B => {
                self.texa.alpha0 = value as u8;
                self.texa.trans_black = value & (1 << 15) != 0;
                self.texa.alpha1 = (value >> 32) as u8;
            }
            0x003D => self.fogcol = value as u32 & 0xFF_FFFF,
            0x003F => trace!(target: "gs_t", "TEXFLUSH"),
            0x0040 => self.contexts[0].set_scissor(value),
            0x0041 => self.contexts[1].set_scissor(value),
            0x0042 => self.contexts[0].set_alpha(value),
            0x0043 => self.contexts[1].set_alpha(value),
            0x0044 => self.dimx = value,
            0x0045 => self.dthe = value & 0x1 != 0,
            0x0046 => self.colclamp = value & 0x1 != 0,
            0x0047 => self.contexts[0].set_test(value),
            0x0048 => self.contexts[1].set_test(value),
            0x0049 => self.pabe = value & 0x1 != 0,
            0x004A => self.contexts[0].fba = value & 0x1 != 0,
            0x004B => self.contexts[1].fba = value & 0x1 != 0,
            0x004C => self.contexts[0].set_frame(value),
            0x004D => self.contexts[1].set_frame(value),
            0x004E => self.contexts[0].set_zbuf(value),
            0x004F => self.contexts[1].set_zbuf(value),
            0x0050 => self.bitbltbuf = BitBltBuf::decode(value),
            0x0051 => self.trxpos = TrxPos::decode(value),
            0x0052 => {
                self.trxreg.width = value as u32 & 0xFFF;
                self.trxreg.height = (value >> 32) as u32 & 0xFFF;
            }
            0x0053 => self.start_transfer(value as u8 & 0x3)?,
            0x0054 => {
                if self.trxdir == 0 {
                    self.write_hwreg(value)?;
                }
            }
            0x0060 => {
                self.regs.csr.signal_generated = true;
                self.regs.siglblid.sig_id = value as u32;
            }
            0x0061 => {
                self.regs.assert_finish();
            }
            0x0062 => self.regs.siglblid.lbl_id = value as u32,
            other => {
                warn!(target: "gs_t", "write64 to unknown reg ${other:04X}: {value:#018X}");
                return Err(GsError::UnknownRegister { addr: other, value });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prim_write_resets_queue_and_selects_context() {
        let mut gs = GsState::new();
        gs.write64(0, 3 | (1 << 9)).unwrap();
        assert_eq!(gs.prim_type, 3);
        assert_eq!(gs.ctx, 1);
        assert_eq!(gs.num_vertices, 0);
    }

    #[test]
    fn st_truncates_mantissa() {
        let mut gs = GsState::new();
        let s = 1.5f32.to_bits() | 0xFF;
        gs.write64(0x02, s as u64).unwrap();
        assert_eq!(gs.st.s.to_bits(), 1.5f32.to_bits());
    }

    #[test]
    fn prmode_selector() {
        let mut gs = GsState::new();
        gs.write64(0x00, 3 | (1 << 4)).unwrap(); // PRIM: textured
        gs.write64(0x1B, 0).unwrap(); // PRMODE: nothing
        gs.write64(0x1A, 0).unwrap(); // PRMODECNT: use PRMODE
        assert!(!gs.attrs().texture_mapping);
        gs.write64(0x1A, 1).unwrap(); // PRMODECNT: use PRIM
        assert!(gs.attrs().texture_mapping);
    }

    #[test]
    fn unknown_register_is_fatal() {
        let mut gs = GsState::new();
        assert!(matches!(
            gs.write64(0x0077, 0),
            Err(GsError::UnknownRegister { addr: 0x77, .. })
        ));
    }
}
