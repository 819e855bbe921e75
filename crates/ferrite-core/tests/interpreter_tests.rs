//! End-to-end interpreter scenarios: programs assembled into RAM and
//! stepped through the real bus.

use ferrite_core::bus::Bus;
use ferrite_core::ee::EmotionEngine;
use ferrite_gs::GsHandle;

fn machine() -> (EmotionEngine, Bus) {
    (EmotionEngine::new(), Bus::new(GsHandle::spawn()))
}

fn load_program(bus: &mut Bus, base: u32, words: &[u32]) {
    for (i, word) in words.iter().enumerate() {
        let addr = base as usize + i * 4;
        bus.ram[addr..addr + 4].copy_from_slice(&word.to_le_bytes());
    }
}

// Encoders for the handful of instructions the scenarios need.
fn ori(rt: u32, rs: u32, imm: u32) -> u32 {
    (0x0D << 26) | (rs << 21) | (rt << 16) | (imm & 0xFFFF)
}

fn addu(rd: u32, rs: u32, rt: u32) -> u32 {
    (rs << 21) | (rt << 16) | (rd << 11) | 0x21
}

fn daddu(rd: u32, rs: u32, rt: u32) -> u32 {
    (rs << 21) | (rt << 16) | (rd << 11) | 0x2D
}

fn beq(rs: u32, rt: u32, offset: i16) -> u32 {
    (0x04 << 26) | (rs << 21) | (rt << 16) | (offset as u16 as u32)
}

fn beql(rs: u32, rt: u32, offset: i16) -> u32 {
    (0x14 << 26) | (rs << 21) | (rt << 16) | (offset as u16 as u32)
}

fn jal(target: u32) -> u32 {
    (0x03 << 26) | ((target >> 2) & 0x03FF_FFFF)
}

fn lq(rt: u32, base: u32, offset: i16) -> u32 {
    (0x1E << 26) | (base << 21) | (rt << 16) | (offset as u16 as u32)
}

fn sq(rt: u32, base: u32, offset: i16) -> u32 {
    (0x1F << 26) | (base << 21) | (rt << 16) | (offset as u16 as u32)
}

fn div(rs: u32, rt: u32) -> u32 {
    (rs << 21) | (rt << 16) | 0x1A
}

fn mflo(rd: u32) -> u32 {
    (rd << 11) | 0x12
}

fn mfhi(rd: u32) -> u32 {
    (rd << 11) | 0x10
}

const SYSCALL: u32 = 0x0C;

#[test]
fn stores_to_register_zero_are_discarded() {
    let (mut ee, mut bus) = machine();
    load_program(&mut bus, 0x1000, &[ori(0, 0, 0x1234), addu(0, 0, 0)]);
    ee.set_pc(0x1000);
    ee.step(&mut bus).unwrap();
    ee.step(&mut bus).unwrap();
    assert_eq!(ee.gpr.get128(0), 0);
}

#[test]
fn addu_wraps_then_sign_extends() {
    let (mut ee, mut bus) = machine();
    ee.gpr.set64(5, 0, 0xFFFF_FFFF);
    ee.gpr.set64(6, 0, 1);
    load_program(&mut bus, 0x1000, &[addu(4, 5, 6)]);
    ee.set_pc(0x1000);
    ee.step(&mut bus).unwrap();
    assert_eq!(ee.gpr.get64(4, 0), 0);
}

#[test]
fn addu_sign_extends_negative_results() {
    let (mut ee, mut bus) = machine();
    ee.gpr.set64(5, 0, 0x7FFF_FFFF);
    ee.gpr.set64(6, 0, 1);
    load_program(&mut bus, 0x1000, &[addu(4, 5, 6)]);
    ee.set_pc(0x1000);
    ee.step(&mut bus).unwrap();
    assert_eq!(ee.gpr.get64(4, 0), 0xFFFF_FFFF_8000_0000);
}

#[test]
fn branch_delay_slot_runs_before_the_branch_lands() {
    let (mut ee, mut bus) = machine();
    load_program(
        &mut bus,
        0x1000,
        &[
            beq(0, 0, 2), // to 0x100C
            ori(4, 0, 0x11),
            ori(4, 0, 0x22),
            ori(4, 0, 0x33),
        ],
    );
    ee.set_pc(0x1000);
    ee.step(&mut bus).unwrap();
    ee.step(&mut bus).unwrap();
    // Delay slot executed.
    assert_eq!(ee.gpr.get64(4, 0), 0x11);
    ee.step(&mut bus).unwrap();
    assert_eq!(ee.pc(), 0x1010);
    assert_eq!(ee.gpr.get64(4, 0), 0x33);
}

#[test]
fn branch_likely_not_taken_skips_the_delay_slot() {
    let (mut ee, mut bus) = machine();
    ee.gpr.set64(1, 0, 1);
    load_program(
        &mut bus,
        0x1000,
        &[
            beql(0, 1, 2),
            ori(4, 0, 0xAA),
            ori(4, 0, 0xBB),
        ],
    );
    ee.set_pc(0x1000);
    ee.step(&mut bus).unwrap();
    ee.step(&mut bus).unwrap();
    assert_eq!(ee.gpr.get64(4, 0), 0xBB);
}

#[test]
fn branch_likely_taken_behaves_like_a_branch() {
    let (mut ee, mut bus) = machine();
    load_program(
        &mut bus,
        0x1000,
        &[
            beql(0, 0, 2),
            ori(4, 0, 0xAA),
            ori(4, 0, 0xBB),
            ori(5, 0, 0xCC),
        ],
    );
    ee.set_pc(0x1000);
    for _ in 0..3 {
        ee.step(&mut bus).unwrap();
    }
    assert_eq!(ee.gpr.get64(4, 0), 0xAA);
    assert_eq!(ee.gpr.get64(5, 0), 0xCC);
}

#[test]
fn jal_links_past_the_delay_slot() {
    let (mut ee, mut bus) = machine();
    load_program(&mut bus, 0x1000, &[jal(0x2000), ori(4, 0, 1)]);
    ee.set_pc(0x1000);
    ee.step(&mut bus).unwrap();
    ee.step(&mut bus).unwrap();
    assert_eq!(ee.gpr.get64(31, 0), 0x1008);
    assert_eq!(ee.gpr.get64(4, 0), 1);
    ee.step(&mut bus).unwrap();
    assert_eq!(ee.pc(), 0x2004);
}

#[test]
fn sq_lq_round_trips_both_halves() {
    let (mut ee, mut bus) = machine();
    ee.gpr.set128(7, 0x0123_4567_89AB_CDEF_1122_3344_5566_7788);
    ee.gpr.set64(8, 0, 0x4000);
    load_program(&mut bus, 0x1000, &[sq(7, 8, 0x10), lq(9, 8, 0x10)]);
    ee.set_pc(0x1000);
    ee.step(&mut bus).unwrap();
    ee.step(&mut bus).unwrap();
    assert_eq!(ee.gpr.get128(9), ee.gpr.get128(7));
}

#[test]
fn scratchpad_window_is_cpu_local() {
    let (mut ee, mut bus) = machine();
    ee.write32(&mut bus, 0x7000_0100, 0xCAFE_F00D);
    assert_eq!(ee.read32(&mut bus, 0x7000_0100), 0xCAFE_F00D);
    assert_eq!(&bus.scratchpad[0x100..0x104], &0xCAFE_F00Du32.to_le_bytes());
    // Main RAM is untouched.
    assert_eq!(&bus.ram[0x100..0x104], &[0, 0, 0, 0]);
}

#[test]
fn tlbwi_identity_mapping_reaches_physical_ram() {
    let (mut ee, mut bus) = machine();
    bus.ram[0x0010_0000..0x0010_0004].copy_from_slice(&0x5555_AAAAu32.to_le_bytes());
    // EntryHi VPN2 for 0xC0000000, EntryLo0 pfn 0x100 valid.
    ee.cop0.gpr[10] = 0xC000_0000;
    ee.cop0.gpr[2] = (0x100 << 6) | 0x2;
    ee.cop0.gpr[3] = 0;
    ee.cop0.gpr[5] = 0;
    ee.cop0.set_tlb(0);
    assert_eq!(ee.read32(&mut bus, 0xC000_0000), 0x5555_AAAA);
}

#[test]
fn syscall_vectors_through_the_bios_handler() {
    let (mut ee, mut bus) = machine();
    load_program(&mut bus, 0x1000, &[SYSCALL]);
    ee.set_pc(0x1000);
    ee.step(&mut bus).unwrap();
    assert_eq!(ee.pc(), 0xBFC0_0380);
    assert_eq!(ee.cop0.epc, 0x1000);
    // Raw CAUSE carries the syscall code in bits 6..2.
    assert_eq!(ee.cop0.mfc(13), 0x20);
    assert!(ee.cop0.status.exception);
}

#[test]
fn divide_by_zero_produces_the_sentinel() {
    let (mut ee, mut bus) = machine();
    ee.gpr.set64(5, 0, 9);
    ee.gpr.set64(6, 0, 0);
    load_program(&mut bus, 0x1000, &[div(5, 6), mflo(4), mfhi(7)]);
    ee.set_pc(0x1000);
    for _ in 0..3 {
        ee.step(&mut bus).unwrap();
    }
    assert_eq!(ee.gpr.get64(4, 0) as i64, -1);
    assert_eq!(ee.gpr.get64(7, 0), 9);
}

#[test]
fn daddu_is_full_width() {
    let (mut ee, mut bus) = machine();
    ee.gpr.set64(5, 0, 0xFFFF_FFFF);
    ee.gpr.set64(6, 0, 1);
    load_program(&mut bus, 0x1000, &[daddu(4, 5, 6)]);
    ee.set_pc(0x1000);
    ee.step(&mut bus).unwrap();
    assert_eq!(ee.gpr.get64(4, 0), 0x1_0000_0000);
}

#[test]
fn unknown_opcode_is_a_typed_fatal_error() {
    let (mut ee, mut bus) = machine();
    load_program(&mut bus, 0x1000, &[0x3B << 26]);
    ee.set_pc(0x1000);
    let err = ee.step(&mut bus).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("primary"), "{message}");
    assert!(message.contains("00001000"), "{message}");
}

#[test]
fn mmi_copy_and_logic_ops() {
    let (mut ee, mut bus) = machine();
    ee.gpr.set128(5, 0xAAAA_AAAA_AAAA_AAAA_1111_1111_1111_1111);
    ee.gpr.set128(6, 0x5555_5555_5555_5555_2222_2222_2222_2222);
    let pcpyld = (0x1C << 26) | (5 << 21) | (6 << 16) | (4 << 11) | (0x0E << 6) | 0x09;
    let por = (0x1C << 26) | (5 << 21) | (6 << 16) | (7 << 11) | (0x12 << 6) | 0x29;
    load_program(&mut bus, 0x1000, &[pcpyld, por]);
    ee.set_pc(0x1000);
    ee.step(&mut bus).unwrap();
    // Low doubleword of rs on top, low doubleword of rt below.
    assert_eq!(ee.gpr.get128(4), 0x1111_1111_1111_1111_2222_2222_2222_2222);
    ee.step(&mut bus).unwrap();
    assert_eq!(
        ee.gpr.get128(7),
        0xFFFF_FFFF_FFFF_FFFF_3333_3333_3333_3333
    );
}

#[test]
fn plzcw_counts_leading_sign_bits() {
    let (mut ee, mut bus) = machine();
    ee.gpr.set32(5, 0, 0x0F00_F000);
    ee.gpr.set32(5, 1, 0x000F_FFFF);
    let plzcw = (0x1C << 26) | (5 << 21) | (4 << 11) | 0x04;
    load_program(&mut bus, 0x1000, &[plzcw]);
    ee.set_pc(0x1000);
    ee.step(&mut bus).unwrap();
    assert_eq!(ee.gpr.get32(4, 0), 3);
    assert_eq!(ee.gpr.get32(4, 1), 11);
}
