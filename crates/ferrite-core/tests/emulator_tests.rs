//! Whole-aggregate behavior: frame pacing, reset, and ELF boot.

use ferrite_core::Emulator;

#[test]
fn run_frame_completes_on_the_frame_clock() {
    let mut emulator = Emulator::new();
    // RAM is zeroed, so the EE nop-sleds through the frame.
    emulator.ee.set_pc(0x0010_0000);
    let info = emulator.run_frame().expect("frame");
    assert_eq!(emulator.frame_count(), 1);
    // No DISPLAY configured yet: scanout is empty but well-formed.
    assert_eq!((info.width, info.height), (0, 0));
    // The field toggled when vblank hit.
    assert_ne!(emulator.bus.gs.read64_privileged(0x1000) & (1 << 13), 0);
}

#[test]
fn elf_boot_points_the_ee_at_the_entry() {
    let mut emulator = Emulator::new();
    let mut image = vec![0u8; 0x54];
    image[0..4].copy_from_slice(&[0x7F, b'E', b'L', b'F']);
    image[0x18..0x1C].copy_from_slice(&0x0020_0000u32.to_le_bytes());
    image[0x1C..0x20].copy_from_slice(&0x34u32.to_le_bytes());
    // Zero program headers: nothing to copy.
    emulator.load_elf(&image).expect("elf");
    assert_eq!(emulator.ee.pc(), 0x0020_0000);
}

#[test]
fn reset_reinitializes_the_core() {
    let mut emulator = Emulator::new();
    emulator.ee.set_pc(0x0010_0000);
    emulator.run_frame().expect("frame");
    emulator.reset();
    assert_eq!(emulator.frame_count(), 0);
    assert_eq!(emulator.ee.pc(), 0xBFC0_0000);
}
