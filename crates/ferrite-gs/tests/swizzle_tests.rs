//! Local-memory layout and host-transfer behavior through the public
//! drawing-register interface.

use ferrite_gs::GsState;

/// Arm a host->local transfer of `width`x`height` pixels in `format`
/// into base 0 with buffer width 640.
fn arm_transfer(gs: &mut GsState, format: u64, width: u64, height: u64) {
    // BITBLTBUF: dest base 0, dest width 640 (10 * 64), dest format.
    gs.write64(0x50, (10u64 << 48) | (format << 56)).unwrap();
    gs.write64(0x51, 0).unwrap(); // TRXPOS at (0, 0)
    gs.write64(0x52, width | (height << 32)).unwrap(); // TRXREG
    gs.write64(0x53, 0).unwrap(); // TRXDIR: host -> local
}

#[test]
fn swizzle_round_trip_psmct32() {
    let mut gs = GsState::new();
    gs.mem.write_psmct32(0, 640, 37, 91, 0xDEAD_BEEF);
    assert_eq!(gs.mem.read_psmct32(0, 640, 37, 91), 0xDEAD_BEEF);
}

#[test]
fn hwreg_transfer_psmct32_lands_in_raster_order() {
    let mut gs = GsState::new();
    arm_transfer(&mut gs, 0x00, 4, 2);
    // Eight pixels, two per doubleword.
    for pair in 0u64..4 {
        let low = pair * 2;
        let quad = low | ((low + 1) << 32);
        gs.write64(0x54, quad).unwrap();
    }
    for y in 0..2 {
        for x in 0..4u32 {
            assert_eq!(gs.mem.read_psmct32(0, 640, x, y), y * 4 + x);
        }
    }
}

#[test]
fn hwreg_transfer_ends_and_resets_trxdir() {
    let mut gs = GsState::new();
    arm_transfer(&mut gs, 0x00, 2, 1);
    gs.write64(0x54, 0x1111_2222_3333_4444).unwrap();
    // Transfer is complete; further HWREG data must be ignored.
    gs.write64(0x54, 0x9999_9999_9999_9999).unwrap();
    assert_eq!(gs.mem.read_psmct32(0, 640, 0, 0), 0x3333_4444);
    assert_eq!(gs.mem.read_psmct32(0, 640, 1, 0), 0x1111_2222);
    assert_eq!(gs.mem.read_psmct32(0, 640, 2, 0), 0);
}

#[test]
fn hwreg_transfer_psmct24_uses_carry_across_doublewords() {
    let mut gs = GsState::new();
    arm_transfer(&mut gs, 0x01, 8, 1);
    // Three bytes per pixel: pixels 0..2 fill the first doubleword plus
    // one carry byte.
    let bytes: Vec<u8> = (1..=24).collect();
    for chunk in bytes.chunks(8) {
        let mut quad = [0u8; 8];
        quad.copy_from_slice(chunk);
        gs.write64(0x54, u64::from_le_bytes(quad)).unwrap();
    }
    assert_eq!(gs.mem.read_psmct32(0, 640, 0, 0) & 0xFF_FFFF, 0x03_0201);
    assert_eq!(gs.mem.read_psmct32(0, 640, 1, 0) & 0xFF_FFFF, 0x06_0504);
    assert_eq!(gs.mem.read_psmct32(0, 640, 7, 0) & 0xFF_FFFF, 0x18_1716);
}

#[test]
fn hwreg_transfer_psmt4hh_writes_high_nibbles() {
    let mut gs = GsState::new();
    gs.mem.write_psmct32(0, 640, 0, 0, 0x0123_4567);
    arm_transfer(&mut gs, 0x2C, 16, 1);
    gs.write64(0x54, 0xF).unwrap();
    assert_eq!(gs.mem.read_psmct32(0, 640, 0, 0), 0xF123_4567);
}

#[test]
fn local_to_host_streams_quadwords_back() {
    let mut gs = ferrite_gs::GsHandle::spawn();
    // Upload four PSMCT32 pixels, then read them back out.
    gs.write64(0x50, (10u64 << 16) | (10u64 << 48)).unwrap(); // BITBLTBUF both width 640
    gs.write64(0x51, 0).unwrap();
    gs.write64(0x52, 4 | (1u64 << 32)).unwrap(); // TRXREG 4x1
    gs.write64(0x53, 0).unwrap();
    gs.write64(0x54, 0x1111_1111_0000_0000).unwrap();
    gs.write64(0x54, 0x3333_3333_2222_2222).unwrap();

    gs.write64(0x53, 1).unwrap(); // TRXDIR: local -> host
    let (quad, done) = gs.local_to_host().unwrap();
    assert!(done);
    assert_eq!(quad, 0x3333_3333_2222_2222_1111_1111_0000_0000u128);
    // A drained transfer replies idle data.
    let (_, done) = gs.local_to_host().unwrap();
    assert!(done);
}

#[test]
fn local_to_local_copies_between_rectangles() {
    let mut gs = GsState::new();
    for y in 0..4 {
        for x in 0..4u32 {
            gs.mem.write_psmct32(0, 640, x, y, 0xAB00 + x + y * 16);
        }
    }
    // BITBLTBUF: source base 0 width 640, dest base block 0x100 width 640.
    gs.write64(0x50, (10u64 << 16) | (0x100u64 << 32) | (10u64 << 48)).unwrap();
    gs.write64(0x51, 0).unwrap();
    gs.write64(0x52, 4 | (4u64 << 32)).unwrap();
    gs.write64(0x53, 2).unwrap(); // local -> local, runs synchronously
    for y in 0..4 {
        for x in 0..4u32 {
            assert_eq!(gs.mem.read_psmct32(0x100 * 256, 640, x, y), 0xAB00 + x + y * 16);
        }
    }
}
