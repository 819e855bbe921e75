//! The full frame path: a GIF packet authored in main RAM, pulled by
//! the DMAC, decoded by the GIF, rasterized by the GS worker, and read
//! back through the CRT scanout.

use ferrite_core::bus::Bus;
use ferrite_gs::GsHandle;

const GIF_CHCR: u32 = 0x1000_A000;
const GIF_MADR: u32 = 0x1000_A010;
const GIF_QWC: u32 = 0x1000_A020;
const D_CTRL: u32 = 0x1000_E000;

fn write_quad(bus: &mut Bus, addr: u32, quad: u128) {
    bus.ram[addr as usize..addr as usize + 16].copy_from_slice(&quad.to_le_bytes());
}

fn packed_tag(nloop: u16, regs: u64, nreg: u8) -> u128 {
    (nloop as u128) | (1u128 << 15) | ((nreg as u128) << 60) | ((regs as u128) << 64)
}

fn a_d(addr: u64, value: u64) -> u128 {
    (value as u128) | ((addr as u128) << 64)
}

#[test]
fn dma_fed_triangle_reaches_the_framebuffer() {
    let mut bus = Bus::new(GsHandle::spawn());
    let packet = 0x4000u32;

    // One A+D slot per loop: draw state, then three kicked vertices.
    let writes: [(u64, u64); 9] = [
        (0x4C, 1 << 16),               // FRAME_1: base 0, width 64
        (0x40, 63 | (63 << 48)),       // SCISSOR_1: full window
        (0x18, 0),                     // XYOFFSET_1
        (0x4E, 1 | (1 << 32)),         // ZBUF_1: out of the way, no update
        (0x00, 3),                     // PRIM: triangle list
        (0x01, 0xFF),                  // RGBAQ: red
        (0x05, 0),                     // XYZ2 (0, 0)
        (0x05, 32 << 4),               // XYZ2 (32, 0)
        (0x05, (32u64 << 4) << 16),    // XYZ2 (0, 32)
    ];
    write_quad(&mut bus, packet, packed_tag(writes.len() as u16, 0xE, 1));
    for (i, (addr, value)) in writes.iter().enumerate() {
        write_quad(&mut bus, packet + 16 + i as u32 * 16, a_d(*addr, *value));
    }

    bus.write32(D_CTRL, 1);
    bus.write32(GIF_MADR, packet);
    bus.write32(GIF_QWC, writes.len() as u32 + 1);
    bus.write32(GIF_CHCR, 0x100);
    bus.tick_dmac(64);
    assert!(bus.take_fatal().is_none());
    assert_eq!(bus.read32(GIF_CHCR) & 0x100, 0);
    assert!(bus.gif.expecting_tag());

    // Point circuit 2 at the frame and scan it out.
    bus.write64(0x1200_0090, 1 << 9); // DISPFB2: base 0, width 64
    bus.write64(0x1200_00A0, (255u64 << 32) | (31u64 << 44)); // DISPLAY2: 64x32
    let (width, height) = bus.gs.render_crt(0).expect("scanout");
    assert_eq!((width, height), (64, 32));

    let buffer = bus.gs.framebuffer(0);
    let pixels = buffer.lock().unwrap();
    // Inside the triangle: red. Outside (far corner): background.
    assert_eq!(pixels[1 + 64] & 0x00FF_FFFF, 0xFF);
    assert_eq!(pixels[31 + 31 * 64] & 0x00FF_FFFF, 0);
}
