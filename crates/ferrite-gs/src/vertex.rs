//! Vertex state and primitive classification.

use crate::context::XyOffset;
use crate::GsError;

/// Current color + Q. Channels are widened to i16 so blend arithmetic can
/// go transiently out of range without wrapping.
#[derive(Clone, Copy, Debug)]
pub struct Rgbaq {
    pub r: i16,
    pub g: i16,
    pub b: i16,
    pub a: i16,
    pub q: f32,
}

impl Default for Rgbaq {
    fn default() -> Self {
        Rgbaq { r: 0, g: 0, b: 0, a: 0, q: 1.0 }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Uv {
    pub u: u16,
    pub v: u16,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct St {
    pub s: f32,
    pub t: f32,
}

/// One entry of the kick queue. X/Y are signed 12.4 subpixels once made
/// relative to the context XYOFFSET.
#[derive(Clone, Copy, Debug, Default)]
pub struct Vertex {
    pub x: i32,
    pub y: i32,
    pub z: u32,
    pub rgbaq: Rgbaq,
    pub uv: Uv,
    pub s: f32,
    pub t: f32,
    pub fog: u8,
}

impl Vertex {
    pub fn to_relative(&mut self, offset: XyOffset) {
        self.x -= offset.x as i32;
        self.y -= offset.y as i32;
    }
}

/// PRIM.type values. Type 7 is prohibited and rejected at the kick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimType {
    Point,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
    TriangleFan,
    Sprite,
}

impl PrimType {
    pub fn from_bits(bits: u8) -> Result<PrimType, GsError> {
        match bits & 0x7 {
            0 => Ok(PrimType::Point),
            1 => Ok(PrimType::LineList),
            2 => Ok(PrimType::LineStrip),
            3 => Ok(PrimType::TriangleList),
            4 => Ok(PrimType::TriangleStrip),
            5 => Ok(PrimType::TriangleFan),
            6 => Ok(PrimType::Sprite),
            _ => Err(GsError::ProhibitedPrimitive),
        }
    }

    /// Vertices needed in the queue before this primitive rasterizes.
    pub fn required_vertices(self) -> usize {
        match self {
            PrimType::Point => 1,
            PrimType::LineList | PrimType::LineStrip | PrimType::Sprite => 2,
            PrimType::TriangleList | PrimType::TriangleStrip | PrimType::TriangleFan => 3,
        }
    }
}

/// The attribute half of PRIM, also the whole of PRMODE. Which copy is
/// live is selected by PRMODECNT.
#[derive(Clone, Copy, Debug, Default)]
pub struct PrimAttrs {
    pub gouraud_shading: bool,
    pub texture_mapping: bool,
    pub fog: bool,
    pub alpha_blend: bool,
    pub antialiasing: bool,
    pub use_uv: bool,
    pub use_context2: bool,
    pub fix_fragment_value: bool,
}

impl PrimAttrs {
    /// Decode bits 3..11 of a PRIM/PRMODE write.
    pub fn from_bits(value: u64) -> PrimAttrs {
        PrimAttrs {
            gouraud_shading: value & (1 << 3) != 0,
            texture_mapping: value & (1 << 4) != 0,
            fog: value & (1 << 5) != 0,
            alpha_blend: value & (1 << 6) != 0,
            antialiasing: value & (1 << 7) != 0,
            use_uv: value & (1 << 8) != 0,
            use_context2: value & (1 << 9) != 0,
            fix_fragment_value: value & (1 << 10) != 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prim_type_decode() {
        assert_eq!(PrimType::from_bits(3).unwrap(), PrimType::TriangleList);
        assert_eq!(PrimType::from_bits(6).unwrap(), PrimType::Sprite);
        assert!(PrimType::from_bits(7).is_err());
    }

    #[test]
    fn required_vertex_counts() {
        assert_eq!(PrimType::Point.required_vertices(), 1);
        assert_eq!(PrimType::LineStrip.required_vertices(), 2);
        assert_eq!(PrimType::TriangleFan.required_vertices(), 3);
        assert_eq!(PrimType::Sprite.required_vertices(), 2);
    }

    #[test]
    fn prim_attrs_decode() {
        let attrs = PrimAttrs::from_bits(0x1B << 3);
        assert!(attrs.gouraud_shading);
        assert!(attrs.texture_mapping);
        assert!(!attrs.fog);
        assert!(attrs.alpha_blend);
        assert!(attrs.antialiasing);
    }
}
