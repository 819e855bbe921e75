//! GIFtag state-machine laws: PACKED and REGLIST consumption counts,
//! PATH3 masking, and the A+D register path.

use ferrite_core::bus::Bus;
use ferrite_core::gif::Gif;
use ferrite_gs::GsHandle;

const GIF_MODE: u32 = 0x1000_3010;
const GIF_STAT: u32 = 0x1000_3020;

fn tag(nloop: u16, eop: bool, fmt: u8, nreg: u8, regs: u64) -> u128 {
    (nloop as u128 & 0x7FFF)
        | ((eop as u128) << 15)
        | ((fmt as u128 & 0x3) << 58)
        | ((nreg as u128 & 0xF) << 60)
        | ((regs as u128) << 64)
}

fn prim_tag(nloop: u16, eop: bool, prim: u16, fmt: u8, nreg: u8, regs: u64) -> u128 {
    tag(nloop, eop, fmt, nreg, regs) | (1u128 << 46) | ((prim as u128 & 0x7FF) << 47)
}

#[test]
fn packed_consumes_nloop_times_nreg_quadwords() {
    let mut gif = Gif::new();
    let mut gs = GsHandle::spawn();
    // NLOOP=2, NREG=2, selectors NOP, NOP.
    gif.send_path3(tag(2, true, 0, 2, 0xFF), &mut gs).unwrap();
    for _ in 0..3 {
        gif.send_path3(0, &mut gs).unwrap();
        assert!(!gif.expecting_tag());
    }
    gif.send_path3(0, &mut gs).unwrap();
    assert!(gif.expecting_tag());
}

#[test]
fn packed_a_d_writes_prim_and_returns_to_tag_state() {
    let mut gif = Gif::new();
    let mut gs = GsHandle::spawn();
    // Scenario: NLOOP=1, EOP, FMT=PACKED, NREG=1, REGS=0xE (A+D).
    gif.send_path3(tag(1, true, 0, 1, 0xE), &mut gs).unwrap();
    // Value 1 to address 0 (PRIM).
    gif.send_path3(1u128, &mut gs).unwrap();
    assert!(gif.expecting_tag());
    // PRIM=1 selects line-list; two XYZ2 kicks later the GS is still
    // alive, which a scanout round-trip proves.
    assert!(gs.render_crt(0).is_ok());
}

#[test]
fn reglist_pair_parity_discards_the_odd_tail() {
    let mut gif = Gif::new();
    let mut gs = GsHandle::spawn();
    // NLOOP=3, NREG=1 -> three registers in ceil(3/2) = 2 quadwords.
    gif.send_path3(tag(3, true, 1, 1, 0xF), &mut gs).unwrap();
    gif.send_path3(0, &mut gs).unwrap();
    assert!(!gif.expecting_tag());
    gif.send_path3(0, &mut gs).unwrap();
    assert!(gif.expecting_tag());
}

#[test]
fn pre_bit_loads_prim_except_for_reglist() {
    let mut gif = Gif::new();
    let mut gs = GsHandle::spawn();
    gif.send_path3(prim_tag(0, true, 0x3, 0, 1, 0xF), &mut gs).unwrap();
    assert!(gif.expecting_tag());
    // REGLIST ignores PRE; this only checks it doesn't wedge the tag
    // machinery.
    gif.send_path3(prim_tag(0, true, 0x3, 1, 1, 0xF), &mut gs).unwrap();
    assert!(gif.expecting_tag());
    assert!(gs.render_crt(0).is_ok());
}

#[test]
fn image_format_feeds_hwreg() {
    let mut gif = Gif::new();
    let mut gs = GsHandle::spawn();
    // Arm a 2x1 PSMCT32 host->local transfer at base 0, width 64.
    gif.send_path3(tag(4, false, 0, 1, 0xE), &mut gs).unwrap();
    gif.send_path3((0x50u128 << 64) | (1u128 << 48), &mut gs).unwrap(); // BITBLTBUF
    gif.send_path3(0x51u128 << 64, &mut gs).unwrap(); // TRXPOS
    gif.send_path3((0x52u128 << 64) | 2 | (1u128 << 32), &mut gs).unwrap(); // TRXREG 2x1
    gif.send_path3(0x53u128 << 64, &mut gs).unwrap(); // TRXDIR host->local
    gif.send_path3(tag(1, true, 2, 0, 0), &mut gs).unwrap(); // IMAGE
    gif.send_path3(0xAAAA_AAAA_BBBB_BBBB_u128, &mut gs).unwrap();
    assert!(gif.expecting_tag());
    assert!(gs.render_crt(0).is_ok());
}

#[test]
fn path3_mask_parks_quadwords_in_the_fifo() {
    let mut bus = Bus::new(GsHandle::spawn());
    bus.write32(GIF_MODE, 1); // mask PATH3
    let quad = tag(0, true, 0, 1, 0xF);
    {
        let Bus { gif, gs, .. } = &mut bus;
        gif.send_path3(quad, gs).unwrap();
    }
    // Still queued: the tag has not been decoded.
    assert_eq!((bus.read32(GIF_STAT) >> 24) & 0x1F, 1);
    assert!(bus.gif.expecting_tag());

    bus.write32(GIF_MODE, 0); // unmask
    {
        let Bus { gif, gs, .. } = &mut bus;
        gif.flush_path3(gs).unwrap();
    }
    assert_eq!((bus.read32(GIF_STAT) >> 24) & 0x1F, 0);
}

#[test]
fn q_resets_at_every_tag_boundary() {
    let mut gif = Gif::new();
    let mut gs = GsHandle::spawn();
    // ST packed slot carries Q; a subsequent tag must reset it to 1.0.
    gif.send_path3(tag(1, false, 0, 1, 0x2), &mut gs).unwrap();
    let st = (0.5f32.to_bits() as u128) | ((2.0f32.to_bits() as u128) << 64);
    gif.send_path3(st, &mut gs).unwrap();
    gif.send_path3(tag(0, true, 0, 1, 0xF), &mut gs).unwrap();
    assert!(gif.expecting_tag());
    assert!(gs.render_crt(0).is_ok());
}
