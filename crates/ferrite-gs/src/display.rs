//! CRT scanout: flatten the DISPFB2 framebuffer into a linear RGBA
//! buffer for the host.

use log::trace;

use crate::state::GsState;

impl GsState {
    /// Read the circuit-2 display framebuffer out of local memory.
    /// Returns the (width, height) actually produced.
    pub fn render_crt(&self, target: &mut [u32]) -> (u32, u32) {
        let display = self.regs.display2;
        let dispfb = self.regs.dispfb2;
        // DISPLAY width is in video clock units; divide down to pixels.
        let width = (display.width >> 2) as u32;
        let height = display.height as u32;
        if width == 0 || height == 0 {
            return (0, 0);
        }
        trace!(target: "gs_t", "scanout {}x{} from ${:08X}", width, height, dispfb.frame_base * 4);

        for y in 0..height {
            for x in 0..width {
                let mut pixel_y = y;
                // With both interlace fields rendered into one frame the
                // visible height halves; skip alternate lines rather than
                // dropping the mode.
                if self.regs.smode2.frame_mode && self.regs.smode2.interlaced {
                    pixel_y *= 2;
                }
                if pixel_y >= height {
                    continue;
                }
                let mut scaled_x = dispfb.x as u32 + x;
                let scaled_y = dispfb.y as u32 + y;
                scaled_x = scaled_x * dispfb.width / width.max(1);
                let value =
                    self.mem.read_psmct32(dispfb.frame_base * 4, dispfb.width, scaled_x, scaled_y);
                let index = (x + y * width) as usize;
                if index < target.len() {
                    target[index] = value | 0xFF00_0000;
                }
            }
        }
        (width, height)
    }
}

#[cfg(test)]
mod tests {
    use crate::state::GsState;

    #[test]
    fn scanout_reads_back_framebuffer() {
        let mut gs = GsState::new();
        // DISPLAY2: 640x224 (width field in clock units), DISPFB2 at 0, width 640.
        gs.regs.write64(0x00A0, ((640 * 4 - 1) << 32) | (223u64 << 44));
        gs.regs.write64(0x0090, 10 << 9);
        gs.mem.write_psmct32(0, 640, 5, 7, 0x00123456);

        let mut target = vec![0u32; 640 * 224];
        let (w, h) = gs.render_crt(&mut target);
        assert_eq!((w, h), (640, 224));
        assert_eq!(target[5 + 7 * 640], 0xFF123456);
    }

    #[test]
    fn scanout_with_no_display_is_empty() {
        let gs = GsState::new();
        let mut target = vec![0u32; 16];
        // Default DISPLAY2 is all zeroes wide.
        assert_eq!(gs.render_crt(&mut target), (0, 0));
    }
}
