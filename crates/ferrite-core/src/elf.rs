//! Minimal ELF32 loader: validate the magic, copy program segments into
//! physical RAM, hand back the entry point.

use log::{debug, info};

use crate::bus::Bus;
use crate::EmuError;

const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];

fn read_u16(image: &[u8], offset: usize) -> Option<u16> {
    Some(u16::from_le_bytes([*image.get(offset)?, *image.get(offset + 1)?]))
}

fn read_u32(image: &[u8], offset: usize) -> Option<u32> {
    Some(u32::from_le_bytes([
        *image.get(offset)?,
        *image.get(offset + 1)?,
        *image.get(offset + 2)?,
        *image.get(offset + 3)?,
    ]))
}

/// Load every PT segment's file bytes at its physical address.
/// Returns the entry PC.
pub fn load(bus: &mut Bus, image: &[u8]) -> Result<u32, EmuError> {
    if image.len() < 0x34 || image[0..4] != ELF_MAGIC {
        return Err(EmuError::InvalidElf);
    }
    let entry = read_u32(image, 0x18).ok_or(EmuError::InvalidElf)?;
    let ph_offset = read_u32(image, 0x1C).ok_or(EmuError::InvalidElf)? as usize;
    let ph_count = read_u16(image, 0x2C).ok_or(EmuError::InvalidElf)? as usize;
    info!(target: "elf", "entry ${entry:08X}, {ph_count} program headers");

    for i in 0..ph_count {
        let header = ph_offset + i * 0x20;
        let p_offset = read_u32(image, header + 0x04).ok_or(EmuError::InvalidElf)? as usize;
        let p_paddr = read_u32(image, header + 0x0C).ok_or(EmuError::InvalidElf)?;
        let p_filesz = read_u32(image, header + 0x10).ok_or(EmuError::InvalidElf)? as usize;
        debug!(target: "elf", "segment {i}: file ${p_offset:08X}+{p_filesz:X} -> ${p_paddr:08X}");

        if p_filesz == 0 {
            continue;
        }
        let data = image.get(p_offset..p_offset + p_filesz).ok_or(EmuError::InvalidElf)?;
        let base = (p_paddr & 0x01FF_FFFF) as usize;
        if base + data.len() > bus.ram.len() {
            return Err(EmuError::InvalidElf);
        }
        bus.ram[base..base + data.len()].copy_from_slice(data);
    }
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrite_gs::GsHandle;

    fn minimal_elf(entry: u32, paddr: u32, payload: &[u8]) -> Vec<u8> {
        let mut image = vec![0u8; 0x54 + payload.len()];
        image[0..4].copy_from_slice(&ELF_MAGIC);
        image[0x18..0x1C].copy_from_slice(&entry.to_le_bytes());
        image[0x1C..0x20].copy_from_slice(&0x34u32.to_le_bytes()); // phoff
        image[0x2C..0x2E].copy_from_slice(&1u16.to_le_bytes()); // phnum
        // One program header at 0x34: offset 0x54, paddr, filesz.
        image[0x38..0x3C].copy_from_slice(&0x54u32.to_le_bytes());
        image[0x40..0x44].copy_from_slice(&paddr.to_le_bytes());
        image[0x44..0x48].copy_from_slice(&(payload.len() as u32).to_le_bytes());
        image[0x54..].copy_from_slice(payload);
        image
    }

    #[test]
    fn loads_segment_and_entry() {
        let mut bus = Bus::new(GsHandle::spawn());
        let image = minimal_elf(0x0010_0000, 0x0010_0000, &[1, 2, 3, 4]);
        let entry = load(&mut bus, &image).unwrap();
        assert_eq!(entry, 0x0010_0000);
        assert_eq!(&bus.ram[0x10_0000..0x10_0004], &[1, 2, 3, 4]);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bus = Bus::new(GsHandle::spawn());
        assert!(matches!(load(&mut bus, b"NOPE"), Err(EmuError::InvalidElf)));
    }
}
