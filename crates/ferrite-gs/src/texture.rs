//! Texel fetch: wrap, format decode, CLUT indirection, and the final
//! texture function against the fragment color.

use crate::context::GsContext;
use crate::mem::LocalMemory;
use crate::state::{TexA, TexClut};
use crate::vertex::Rgbaq;
use crate::GsError;

fn wrap(coord: i32, mode: u8, size: i32, min: u16, max: u16) -> i32 {
    match mode {
        0 => coord.rem_euclid(size.max(1)),
        1 => coord.clamp(0, size - 1),
        2 => coord.clamp(min as i32, max as i32),
        _ => (coord & min as i32) | max as i32,
    }
}

fn expand_16(color: u16, texa: &TexA) -> Rgbaq {
    let alpha = if color & 0x8000 != 0 { texa.alpha1 } else { texa.alpha0 };
    let alpha = if texa.trans_black && color & 0x7FFF == 0 { 0 } else { alpha };
    Rgbaq {
        r: ((color & 0x1F) << 3) as i16,
        g: (((color >> 5) & 0x1F) << 3) as i16,
        b: (((color >> 10) & 0x1F) << 3) as i16,
        a: alpha as i16,
        q: 1.0,
    }
}

fn clut_lookup(
    mem: &LocalMemory,
    ctx: &GsContext,
    texa: &TexA,
    entry: u8,
    eight_bit: bool,
) -> Result<Rgbaq, GsError> {
    // The CSM1 palette is stored as a 16x16 block with an interleaved
    // row order for 8-bit entries.
    let (x, y) = if eight_bit {
        let mut x = (entry & 0x7) as u32;
        if entry & 0x10 != 0 {
            x += 8;
        }
        let mut y = ((entry & 0xE0) / 0x10) as u32;
        if entry & 0x8 != 0 {
            y += 1;
        }
        (x, y)
    } else {
        ((entry & 0x7) as u32, (entry / 8) as u32)
    };

    match ctx.tex0.clut_format {
        0x0 | 0x1 => {
            let color = mem.read_psmct32(ctx.tex0.clut_base, 64, x, y);
            Ok(Rgbaq {
                r: (color & 0xFF) as i16,
                g: ((color >> 8) & 0xFF) as i16,
                b: ((color >> 16) & 0xFF) as i16,
                a: (color >> 24) as i16,
                q: 1.0,
            })
        }
        0x2 => Ok(expand_16(mem.read_psmct16(ctx.tex0.clut_base, 64, x, y), texa)),
        other => Err(GsError::UnknownClutFormat(other)),
    }
}

fn clut_csm2_lookup(
    mem: &LocalMemory,
    ctx: &GsContext,
    texclut: &TexClut,
    texa: &TexA,
    entry: u8,
) -> Rgbaq {
    let color = mem.read_psmct16(
        ctx.tex0.clut_base,
        texclut.width,
        texclut.x + entry as u32,
        texclut.y,
    );
    expand_16(color, texa)
}

/// Fetch and shade one texel at integer (u, v).
pub(crate) fn tex_lookup(
    mem: &LocalMemory,
    ctx: &GsContext,
    texclut: &TexClut,
    texa: &TexA,
    u: i32,
    v: i32,
    vtx_color: Rgbaq,
) -> Result<Rgbaq, GsError> {
    let clamp = ctx.clamp;
    let u = wrap(u, clamp.wrap_s, ctx.tex0.tex_width as i32, clamp.min_u, clamp.max_u) as u32;
    let v = wrap(v, clamp.wrap_t, ctx.tex0.tex_height as i32, clamp.min_v, clamp.max_v) as u32;

    let base = ctx.tex0.texture_base;
    let width = ctx.tex0.width;

    let tex_color = match ctx.tex0.format {
        0x00 => {
            let color = mem.read_psmct32(base, width, u, v);
            Rgbaq {
                r: (color & 0xFF) as i16,
                g: ((color >> 8) & 0xFF) as i16,
                b: ((color >> 16) & 0xFF) as i16,
                a: (color >> 24) as i16,
                q: 1.0,
            }
        }
        0x01 => {
            let color = mem.read_psmct32(base, width, u, v);
            Rgbaq {
                r: (color & 0xFF) as i16,
                g: ((color >> 8) & 0xFF) as i16,
                b: ((color >> 16) & 0xFF) as i16,
                a: texa.alpha0 as i16,
                q: 1.0,
            }
        }
        0x02 => expand_16(mem.read_psmct16(base, width, u, v), texa),
        0x0A => expand_16(mem.read_psmct16s(base, width, u, v), texa),
        0x13 => {
            let entry = mem.read_psmct8(base, width, u, v);
            if ctx.tex0.use_csm2 {
                clut_csm2_lookup(mem, ctx, texclut, texa, entry)
            } else {
                clut_lookup(mem, ctx, texa, entry, true)?
            }
        }
        0x14 => {
            let entry = mem.read_psmct4(base, width, u, v);
            if ctx.tex0.use_csm2 {
                clut_csm2_lookup(mem, ctx, texclut, texa, entry)
            } else {
                clut_lookup(mem, ctx, texa, entry, false)?
            }
        }
        0x1B => {
            let entry = (mem.read_psmct32(base, width, u, v) >> 24) as u8;
            if ctx.tex0.use_csm2 {
                clut_csm2_lookup(mem, ctx, texclut, texa, entry)
            } else {
                clut_lookup(mem, ctx, texa, entry, true)?
            }
        }
        0x24 => {
            let entry = ((mem.read_psmct32(base, width, u, v) >> 24) & 0xF) as u8;
            if ctx.tex0.use_csm2 {
                clut_csm2_lookup(mem, ctx, texclut, texa, entry)
            } else {
                clut_lookup(mem, ctx, texa, entry, false)?
            }
        }
        0x2C => {
            let entry = (mem.read_psmct32(base, width, u, v) >> 28) as u8;
            if ctx.tex0.use_csm2 {
                clut_csm2_lookup(mem, ctx, texclut, texa, entry)
            } else {
                clut_lookup(mem, ctx, texa, entry, false)?
            }
        }
        other => return Err(GsError::UnknownTextureFormat(other)),
    };

    Ok(apply_color_function(ctx, tex_color, vtx_color))
}

fn apply_color_function(ctx: &GsContext, tex: Rgbaq, frag: Rgbaq) -> Rgbaq {
    let modulate = |t: i16, f: i16| -> i16 { (((t as u16 as u32) * (f as u16 as u32)) >> 7).min(255) as i16 };
    match ctx.tex0.color_function {
        0 => Rgbaq {
            r: modulate(tex.r, frag.r),
            g: modulate(tex.g, frag.g),
            b: modulate(tex.b, frag.b),
            a: if ctx.tex0.use_alpha { modulate(tex.a, frag.a) } else { frag.a },
            q: frag.q,
        },
        1 => Rgbaq {
            a: if ctx.tex0.use_alpha { tex.a } else { frag.a },
            q: frag.q,
            ..tex
        },
        hl => {
            // HIGHLIGHT adds the fragment alpha as a glow term.
            let add = |t: i16, f: i16| -> i16 {
                ((modulate(t, f) as i32 + frag.a as i32).min(255)) as i16
            };
            let alpha = if !ctx.tex0.use_alpha {
                frag.a
            } else if hl == 2 {
                (tex.a as i32 + frag.a as i32).min(255) as i16
            } else {
                tex.a
            };
            Rgbaq {
                r: add(tex.r, frag.r),
                g: add(tex.g, frag.g),
                b: add(tex.b, frag.b),
                a: alpha,
                q: frag.q,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_repeat_and_clamp() {
        assert_eq!(wrap(260, 0, 256, 0, 0), 4);
        assert_eq!(wrap(-1, 0, 256, 0, 0), 255);
        assert_eq!(wrap(300, 1, 256, 0, 0), 255);
        assert_eq!(wrap(-5, 1, 256, 0, 0), 0);
        assert_eq!(wrap(90, 2, 256, 10, 64), 64);
    }

    #[test]
    fn sixteen_bit_expansion() {
        let texa = TexA { alpha0: 0, alpha1: 0x80, trans_black: false };
        // Pure red with the MSB set.
        let c = expand_16(0x801F, &texa);
        assert_eq!(c.r, 0xF8);
        assert_eq!(c.g, 0);
        assert_eq!(c.a, 0x80);
    }

    #[test]
    fn trans_black_zeroes_alpha() {
        let texa = TexA { alpha0: 0x80, alpha1: 0x80, trans_black: true };
        assert_eq!(expand_16(0, &texa).a, 0);
        assert_ne!(expand_16(0x1F, &texa).a, 0);
    }

    #[test]
    fn modulate_is_neutral_at_128() {
        let mut ctx = GsContext::default();
        ctx.tex0.color_function = 0;
        ctx.tex0.use_alpha = true;
        let tex = Rgbaq { r: 200, g: 100, b: 50, a: 255, q: 1.0 };
        let frag = Rgbaq { r: 128, g: 128, b: 128, a: 128, q: 1.0 };
        let out = apply_color_function(&ctx, tex, frag);
        assert_eq!(out.r, 200);
        assert_eq!(out.g, 100);
        assert_eq!(out.b, 50);
        assert_eq!(out.a, 255);
    }
}
