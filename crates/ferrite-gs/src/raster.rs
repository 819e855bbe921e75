//! Primitive assembly and rasterization.
//!
//! Triangles use integer barycentric edge functions stepped over
//! block-aligned tiles; blocks whose four corners all fall outside one
//! edge are skipped wholesale. Lines are Bresenham-style with a steep
//! transpose, sprites a linear-interpolated rectangle.

use log::trace;

use crate::math::{clamp_channel, interpolate, interpolate_f32, SUBPIXELS};
use crate::state::GsState;
use crate::texture::tex_lookup;
use crate::vertex::{PrimType, Rgbaq, Vertex};
use crate::GsError;

/// Twice the signed area of (v1, v2, v3); positive for counter-clockwise
/// winding.
fn orient2d(v1: &Vertex, v2: &Vertex, v3: &Vertex) -> i64 {
    (v2.x - v1.x) as i64 * (v3.y - v1.y) as i64 - (v3.x - v1.x) as i64 * (v2.y - v1.y) as i64
}

impl GsState {
    /// Place the working vertex in the queue; when the queue holds a full
    /// primitive, rasterize (unless the kick is marked don't-draw) and
    /// retain vertices per primitive type.
    pub(crate) fn vertex_kick(&mut self, drawing_kick: bool) -> Result<(), GsError> {
        let prim = self.prim_type()?;

        for i in (1..=self.num_vertices.min(2)).rev() {
            self.vtx_queue[i] = self.vtx_queue[i - 1];
        }
        self.current_vtx.rgbaq = self.rgbaq;
        self.current_vtx.uv = self.uv;
        self.current_vtx.s = self.st.s;
        self.current_vtx.t = self.st.t;
        self.vtx_queue[0] = self.current_vtx;
        self.num_vertices += 1;

        match prim {
            PrimType::Point => {
                self.num_vertices = 0;
                if drawing_kick {
                    self.render_primitive()?;
                }
            }
            PrimType::LineList | PrimType::Sprite => {
                if self.num_vertices == 2 {
                    self.num_vertices = 0;
                    if drawing_kick {
                        self.render_primitive()?;
                    }
                }
            }
            PrimType::LineStrip => {
                if self.num_vertices == 2 {
                    self.num_vertices = 1;
                    if drawing_kick {
                        self.render_primitive()?;
                    }
                }
            }
            PrimType::TriangleList => {
                if self.num_vertices == 3 {
                    self.num_vertices = 0;
                    if drawing_kick {
                        self.render_primitive()?;
                    }
                }
            }
            PrimType::TriangleStrip => {
                if self.num_vertices == 3 {
                    self.num_vertices = 2;
                    if drawing_kick {
                        self.render_primitive()?;
                    }
                }
            }
            PrimType::TriangleFan => {
                if self.num_vertices == 3 {
                    self.num_vertices = 2;
                    if drawing_kick {
                        self.render_primitive()?;
                    }
                    // Keep the fan center below the newest vertex.
                    self.vtx_queue[1] = self.vtx_queue[2];
                }
            }
        }
        Ok(())
    }

    fn render_primitive(&mut self) -> Result<(), GsError> {
        match self.prim_type()? {
            PrimType::Point => self.render_point(),
            PrimType::LineList | PrimType::LineStrip => self.render_line(),
            PrimType::TriangleList | PrimType::TriangleStrip | PrimType::TriangleFan => {
                self.render_triangle()
            }
            PrimType::Sprite => self.render_sprite(),
        }
    }

    fn depth_test(&self, x: i32, y: i32, z: u32) -> Result<bool, GsError> {
        let ctx = self.context();
        let pos = (x + y * ctx.frame.width as i32) as u32;
        let stored_32 = || self.mem.read_u32(ctx.zbuf.base_pointer.wrapping_add(pos << 2));
        let stored_16 = || self.mem.read_u16(ctx.zbuf.base_pointer.wrapping_add(pos << 1)) as u32;
        let (incoming, stored) = match ctx.zbuf.format & 0xF {
            0x0 => (z, stored_32()),
            0x1 => (z & 0xFF_FFFF, stored_32() & 0xFF_FFFF),
            0x2 | 0xA => (z & 0xFFFF, stored_16()),
            other => return Err(GsError::UnknownZbufFormat(other)),
        };
        Ok(match ctx.test.depth_method {
            0 => false,
            1 => true,
            2 => incoming >= stored,
            _ => incoming > stored,
        })
    }

    fn write_z(&mut self, x: i32, y: i32, z: u32) {
        let ctx = *self.context();
        let pos = (x + y * ctx.frame.width as i32) as u32;
        match ctx.zbuf.format & 0xF {
            0x0 => self.mem.write_u32(ctx.zbuf.base_pointer.wrapping_add(pos << 2), z),
            0x1 => {
                let addr = ctx.zbuf.base_pointer.wrapping_add(pos << 2);
                let old = self.mem.read_u32(addr) & !0xFF_FFFF;
                self.mem.write_u32(addr, old | (z & 0xFF_FFFF));
            }
            _ => self.mem.write_u16(ctx.zbuf.base_pointer.wrapping_add(pos << 1), z as u16),
        }
    }

    /// The per-pixel pipeline: scissor, alpha test, depth test, alpha
    /// blend, masked framebuffer and z writes. Coordinates arrive in
    /// subpixel space.
    pub(crate) fn draw_pixel(
        &mut self,
        x: i32,
        y: i32,
        z: u32,
        color: Rgbaq,
        alpha_blending: bool,
    ) -> Result<(), GsError> {
        let ctx = *self.context();
        let s = ctx.scissor;
        if x < s.x1 || x > s.x2 || y < s.y1 || y > s.y2 {
            return Ok(());
        }
        let x = x >> 4;
        let y = y >> 4;

        // SCANMSK drops even or odd rows for field rendering.
        if (self.scanmsk == 2 && y & 1 == 0) || (self.scanmsk == 3 && y & 1 == 1) {
            return Ok(());
        }

        // PABE gates blending on the fragment alpha MSB.
        let alpha_blending = alpha_blending && (!self.pabe || color.a & 0x80 != 0);

        // FOG mixes toward FOGCOL by the newest vertex coefficient
        // (0 = full fog).
        let mut color = color;
        if self.attrs().fog {
            let f = self.vtx_queue[0].fog as i32;
            let mix = |c: i16, fc: i32| -> i16 { ((c as i32 * f + fc * (0xFF - f)) >> 8) as i16 };
            color.r = mix(color.r, (self.fogcol & 0xFF) as i32);
            color.g = mix(color.g, ((self.fogcol >> 8) & 0xFF) as i32);
            color.b = mix(color.b, ((self.fogcol >> 16) & 0xFF) as i32);
        }

        let mut update_frame = true;
        let mut update_alpha = true;
        let mut update_z = !ctx.zbuf.no_update;

        if ctx.test.alpha_test {
            let a = color.a as i32;
            let reference = ctx.test.alpha_ref as i32;
            let fail = match ctx.test.alpha_method {
                0 => true,              // NEVER
                1 => false,             // ALWAYS
                2 => a >= reference,    // LESS
                3 => a > reference,     // LEQUAL
                4 => a != reference,    // EQUAL
                5 => a < reference,     // GEQUAL
                6 => a <= reference,    // GREATER
                _ => a == reference,    // NOTEQUAL
            };
            if fail {
                match ctx.test.alpha_fail_method {
                    0 => return Ok(()), // KEEP
                    1 => update_z = false, // FB_ONLY
                    2 => update_frame = false, // ZB_ONLY
                    _ => {
                        // RGB_ONLY
                        update_z = false;
                        update_alpha = false;
                    }
                }
            }
        }

        if ctx.test.depth_test && !self.depth_test(x, y, z)? {
            return Ok(());
        }

        let frame_color = self.mem.read_psmct32(ctx.frame.base_pointer, ctx.frame.width, x as u32, y as u32);

        let mut final_color: u32;
        if alpha_blending {
            let from_selector = |spec: u8| -> (i32, i32, i32) {
                match spec {
                    0 => (color.r as i32, color.g as i32, color.b as i32),
                    1 => (
                        (frame_color & 0xFF) as i32,
                        ((frame_color >> 8) & 0xFF) as i32,
                        ((frame_color >> 16) & 0xFF) as i32,
                    ),
                    _ => (0, 0, 0),
                }
            };
            let (r1, g1, b1) = from_selector(ctx.alpha.spec_a);
            let (r2, g2, b2) = from_selector(ctx.alpha.spec_b);
            let alpha = match ctx.alpha.spec_c {
                0 => color.a as i32,
                1 => (frame_color >> 24) as i32,
                _ => ctx.alpha.fixed_alpha as i32,
            };
            let (cr, cg, cb) = from_selector(ctx.alpha.spec_d);

            final_color = (alpha as u32) << 24;
            final_color |= clamp_channel(((b1 - b2) * alpha >> 7) + cb, self.colclamp) << 16;
            final_color |= clamp_channel(((g1 - g2) * alpha >> 7) + cg, self.colclamp) << 8;
            final_color |= clamp_channel(((r1 - r2) * alpha >> 7) + cr, self.colclamp);
        } else {
            final_color = ((color.a as u32) & 0xFF) << 24;
            final_color |= ((color.b as u32) & 0xFF) << 16;
            final_color |= ((color.g as u32) & 0xFF) << 8;
            final_color |= (color.r as u32) & 0xFF;
        }

        if !update_frame {
            final_color = frame_color;
        }
        let mut alpha_out = frame_color >> 24;
        if update_alpha && ctx.frame.format != 1 {
            alpha_out = final_color >> 24;
        }
        final_color = (final_color & 0x00FF_FFFF) | (alpha_out << 24);
        if ctx.fba {
            final_color |= 0x8000_0000;
        }
        if ctx.frame.mask != 0 {
            final_color = (final_color & !ctx.frame.mask) | (frame_color & ctx.frame.mask);
        }

        self.mem.write_psmct32(ctx.frame.base_pointer, ctx.frame.width, x as u32, y as u32, final_color);
        if update_z {
            self.write_z(x, y, z);
        }
        Ok(())
    }

    fn sample(&self, u: i32, v: i32, vtx_color: Rgbaq) -> Result<Rgbaq, GsError> {
        tex_lookup(&self.mem, self.context(), &self.texclut, &self.texa, u, v, vtx_color)
    }

    fn render_point(&mut self) -> Result<(), GsError> {
        let attrs = self.attrs();
        let mut v1 = self.vtx_queue[0];
        v1.to_relative(self.context().xyoffset);
        trace!(target: "gs_t", "point ({}, {}, {})", v1.x >> 4, v1.y >> 4, v1.z);

        let mut color = v1.rgbaq;
        if attrs.texture_mapping {
            let (u, v) = if attrs.use_uv {
                ((v1.uv.u >> 4) as i32, (v1.uv.v >> 4) as i32)
            } else {
                let ctx = self.context();
                (
                    (v1.s * ctx.tex0.tex_width as f32) as i32,
                    (v1.t * ctx.tex0.tex_height as f32) as i32,
                )
            };
            color = self.sample(u, v, color)?;
        }
        self.draw_pixel(v1.x, v1.y, v1.z, color, attrs.alpha_blend)
    }

    fn render_line(&mut self) -> Result<(), GsError> {
        let attrs = self.attrs();
        let mut v1 = self.vtx_queue[1];
        let mut v2 = self.vtx_queue[0];
        let offset = self.context().xyoffset;
        v1.to_relative(offset);
        v2.to_relative(offset);

        // Transpose if steep, then make the span left-to-right.
        let is_steep = (v2.x - v1.x).abs() < (v2.y - v1.y).abs();
        if is_steep {
            std::mem::swap(&mut v1.x, &mut v1.y);
            std::mem::swap(&mut v2.x, &mut v2.y);
        }
        if v1.x > v2.x {
            std::mem::swap(&mut v1, &mut v2);
        }
        trace!(target: "gs_t", "line ({}, {}) -> ({}, {})", v1.x >> 4, v1.y >> 4, v2.x >> 4, v2.y >> 4);

        let mut color = self.vtx_queue[0].rgbaq;
        let mut x = v1.x;
        while x < v2.x {
            let z = interpolate(x, v1.z as i64, v1.x, v2.z as i64, v2.x) as u32;
            let t = (x - v1.x) as f32 / (v2.x - v1.x) as f32;
            let y = (v1.y as f32 * (1.0 - t) + v2.y as f32 * t) as i32;
            if attrs.gouraud_shading {
                color.r = interpolate(x, v1.rgbaq.r as i64, v1.x, v2.rgbaq.r as i64, v2.x) as i16;
                color.g = interpolate(x, v1.rgbaq.g as i64, v1.x, v2.rgbaq.g as i64, v2.x) as i16;
                color.b = interpolate(x, v1.rgbaq.b as i64, v1.x, v2.rgbaq.b as i64, v2.x) as i16;
                color.a = interpolate(x, v1.rgbaq.a as i64, v1.x, v2.rgbaq.a as i64, v2.x) as i16;
            }
            let mut out = color;
            if attrs.texture_mapping {
                let (u, v) = if attrs.use_uv {
                    (
                        interpolate(x, v1.uv.u as i64, v1.x, v2.uv.u as i64, v2.x) as i32 >> 4,
                        interpolate(y, v1.uv.v as i64, v1.y, v2.uv.v as i64, v2.y) as i32 >> 4,
                    )
                } else {
                    let ctx = self.context();
                    let s = interpolate_f32(x, v1.s, v1.x, v2.s, v2.x);
                    let t = interpolate_f32(y, v1.t, v1.y, v2.t, v2.y);
                    (
                        (s * ctx.tex0.tex_width as f32) as i32,
                        (t * ctx.tex0.tex_height as f32) as i32,
                    )
                };
                out = self.sample(u, v, color)?;
            }
            if is_steep {
                self.draw_pixel(y, x, z, out, attrs.alpha_blend)?;
            } else {
                self.draw_pixel(x, y, z, out, attrs.alpha_blend)?;
            }
            x += SUBPIXELS;
        }
        Ok(())
    }

    fn render_triangle(&mut self) -> Result<(), GsError> {
        let attrs = self.attrs();
        let offset = self.context().xyoffset;
        let mut v1 = self.vtx_queue[2];
        let mut v2 = self.vtx_queue[1];
        let mut v3 = self.vtx_queue[0];
        v1.to_relative(offset);
        v2.to_relative(offset);
        v3.to_relative(offset);

        // Order counter-clockwise.
        if orient2d(&v1, &v2, &v3) < 0 {
            std::mem::swap(&mut v2, &mut v3);
        }
        let divider = orient2d(&v1, &v2, &v3);
        if divider == 0 {
            return Ok(());
        }
        trace!(target: "gs_t", "triangle ({}, {}) ({}, {}) ({}, {})",
            v1.x >> 4, v1.y >> 4, v2.x >> 4, v2.y >> 4, v3.x >> 4, v3.y >> 4);

        if !attrs.gouraud_shading {
            // Flat shading takes the newest vertex's color.
            v1.rgbaq.r = v3.rgbaq.r;
            v2.rgbaq.r = v3.rgbaq.r;
            v1.rgbaq.g = v3.rgbaq.g;
            v2.rgbaq.g = v3.rgbaq.g;
            v1.rgbaq.b = v3.rgbaq.b;
            v2.rgbaq.b = v3.rgbaq.b;
            v1.rgbaq.a = v3.rgbaq.a;
            v2.rgbaq.a = v3.rgbaq.a;
        }

        let min_x = v1.x.min(v2.x).min(v3.x);
        let min_y = v1.y.min(v2.y).min(v3.y);
        let max_x = v1.x.max(v2.x).max(v3.x);
        let max_y = v1.y.max(v2.y).max(v3.y);

        const BLOCKSIZE: i32 = 1 << 4;
        let min_x = min_x & !(BLOCKSIZE - 1);
        let min_y = min_y & !(BLOCKSIZE - 1);

        // Edge-function increments per subpixel step.
        let a12 = (v1.y - v2.y) as i64;
        let b12 = (v2.x - v1.x) as i64;
        let a23 = (v2.y - v3.y) as i64;
        let b23 = (v3.x - v2.x) as i64;
        let a31 = (v3.y - v1.y) as i64;
        let b31 = (v1.x - v3.x) as i64;

        let min_corner = Vertex { x: min_x, y: min_y, ..Vertex::default() };
        let mut w1_row_block = orient2d(&v2, &v3, &min_corner);
        let mut w2_row_block = orient2d(&v3, &v1, &min_corner);
        let mut w3_row_block = orient2d(&v1, &v2, &min_corner);

        let block = BLOCKSIZE as i64;
        let mut y_block = min_y;
        while y_block < max_y {
            let mut w1_block = w1_row_block;
            let mut w2_block = w2_row_block;
            let mut w3_block = w3_row_block;
            let mut x_block = min_x;
            while x_block < max_x {
                // Corner weights of the block; a block with all four
                // corners outside one edge is skipped entirely.
                let corners = |w: i64, a: i64, b: i64| {
                    let tr = w + (block - 1) * a;
                    let bl = w + (block - 1) * b;
                    let br = w + (block - 1) * (a + b);
                    (w > 0) as u8 | ((tr > 0) as u8) << 1 | ((bl > 0) as u8) << 2 | ((br > 0) as u8) << 3
                };
                let w1_mask = corners(w1_block, a23, b23);
                let w2_mask = corners(w2_block, a31, b31);
                let w3_mask = corners(w3_block, a12, b12);

                if w1_mask != 0 && w2_mask != 0 && w3_mask != 0 {
                    let mut w1_row = w1_block;
                    let mut w2_row = w2_block;
                    let mut w3_row = w3_block;
                    let mut y = y_block;
                    while y < y_block + BLOCKSIZE {
                        let mut w1 = w1_row;
                        let mut w2 = w2_row;
                        let mut w3 = w3_row;
                        let mut x = x_block;
                        while x < x_block + BLOCKSIZE {
                            if (w1 | w2 | w3) >= 0 {
                                self.shade_triangle_pixel(
                                    &v1, &v2, &v3, x, y, w1, w2, w3, divider, attrs.gouraud_shading,
                                    attrs.texture_mapping, attrs.use_uv, attrs.alpha_blend,
                                )?;
                            }
                            w1 += a23 << 4;
                            w2 += a31 << 4;
                            w3 += a12 << 4;
                            x += SUBPIXELS;
                        }
                        w1_row += b23 << 4;
                        w2_row += b31 << 4;
                        w3_row += b12 << 4;
                        y += SUBPIXELS;
                    }
                }
                w1_block += block * a23;
                w2_block += block * a31;
                w3_block += block * a12;
                x_block += BLOCKSIZE;
            }
            w1_row_block += block * b23;
            w2_row_block += block * b31;
            w3_row_block += block * b12;
            y_block += BLOCKSIZE;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn shade_triangle_pixel(
        &mut self,
        v1: &Vertex,
        v2: &Vertex,
        v3: &Vertex,
        x: i32,
        y: i32,
        w1: i64,
        w2: i64,
        w3: i64,
        divider: i64,
        _gouraud: bool,
        textured: bool,
        use_uv: bool,
        alpha_blend: bool,
    ) -> Result<(), GsError> {
        let div = divider as f32;
        let (w1f, w2f, w3f) = (w1 as f32, w2 as f32, w3 as f32);

        let z = ((v1.z as f64 * w1 as f64 + v2.z as f64 * w2 as f64 + v3.z as f64 * w3 as f64)
            / divider as f64) as u32;

        let mut color = self.rgbaq;
        color.r = ((v1.rgbaq.r as f32 * w1f + v2.rgbaq.r as f32 * w2f + v3.rgbaq.r as f32 * w3f) / div) as i16;
        color.g = ((v1.rgbaq.g as f32 * w1f + v2.rgbaq.g as f32 * w2f + v3.rgbaq.g as f32 * w3f) / div) as i16;
        color.b = ((v1.rgbaq.b as f32 * w1f + v2.rgbaq.b as f32 * w2f + v3.rgbaq.b as f32 * w3f) / div) as i16;
        color.a = ((v1.rgbaq.a as f32 * w1f + v2.rgbaq.a as f32 * w2f + v3.rgbaq.a as f32 * w3f) / div) as i16;

        if textured {
            let (u, v) = if use_uv {
                let tu = (v1.uv.u as f32 * w1f + v2.uv.u as f32 * w2f + v3.uv.u as f32 * w3f) / div;
                let tv = (v1.uv.v as f32 * w1f + v2.uv.v as f32 * w2f + v3.uv.v as f32 * w3f) / div;
                (tu as i32 >> 4, tv as i32 >> 4)
            } else {
                // Perspective-correct: interpolate S, T and Q, divide out Q.
                let s = (v1.s * w1f + v2.s * w2f + v3.s * w3f) / div;
                let t = (v1.t * w1f + v2.t * w2f + v3.t * w3f) / div;
                let q = (v1.rgbaq.q * w1f + v2.rgbaq.q * w2f + v3.rgbaq.q * w3f) / div;
                let q = if q.abs() < f32::EPSILON { 1.0 } else { q };
                let ctx = self.context();
                (
                    (s / q * ctx.tex0.tex_width as f32) as i32,
                    (t / q * ctx.tex0.tex_height as f32) as i32,
                )
            };
            let tex_color = self.sample(u, v, color)?;
            self.draw_pixel(x, y, z, tex_color, alpha_blend)
        } else {
            self.draw_pixel(x, y, z, color, alpha_blend)
        }
    }

    fn render_sprite(&mut self) -> Result<(), GsError> {
        let attrs = self.attrs();
        let offset = self.context().xyoffset;
        let mut v1 = self.vtx_queue[1];
        let mut v2 = self.vtx_queue[0];
        v1.to_relative(offset);
        v2.to_relative(offset);

        let vtx_color = self.vtx_queue[0].rgbaq;
        trace!(target: "gs_t", "sprite ({}, {}) -> ({}, {})", v1.x >> 4, v1.y >> 4, v2.x >> 4, v2.y >> 4);

        let (x0, x1) = (v1.x.min(v2.x), v1.x.max(v2.x));
        let (y0, y1) = (v1.y.min(v2.y), v1.y.max(v2.y));

        let mut y = y0;
        while y < y1 {
            let pix_t = interpolate_f32(y, v1.t, v1.y, v2.t, v2.y);
            let row_v = interpolate(y, v1.uv.v as i64, v1.y, v2.uv.v as i64, v2.y) as i32 >> 4;
            let mut x = x0;
            while x < x1 {
                let mut out = vtx_color;
                if attrs.texture_mapping {
                    let (u, v) = if attrs.use_uv {
                        let pix_u =
                            interpolate(x, v1.uv.u as i64, v1.x, v2.uv.u as i64, v2.x) as i32 >> 4;
                        (pix_u, row_v)
                    } else {
                        let pix_s = interpolate_f32(x, v1.s, v1.x, v2.s, v2.x);
                        let ctx = self.context();
                        (
                            (pix_s * ctx.tex0.tex_width as f32) as i32,
                            (pix_t * ctx.tex0.tex_height as f32) as i32,
                        )
                    };
                    out = self.sample(u, v, vtx_color)?;
                }
                self.draw_pixel(x, y, v2.z, out, attrs.alpha_blend)?;
                x += SUBPIXELS;
            }
            y += SUBPIXELS;
        }
        Ok(())
    }
}
