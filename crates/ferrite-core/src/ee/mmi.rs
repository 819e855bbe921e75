//! MMI: the EE's 128-bit multimedia extension, plus the second
//! multiply/divide accumulator bank.

use super::interpreter::{rd, rs, rt};
use super::EmotionEngine;
use crate::EmuError;

pub(super) fn mmi(cpu: &mut EmotionEngine, instruction: u32) -> Result<(), EmuError> {
    let op = instruction & 0x3F;
    match op {
        0x04 => plzcw(cpu, instruction),
        0x08 => mmi0(cpu, instruction)?,
        0x09 => mmi2(cpu, instruction)?,
        0x10 => cpu.gpr.set64(rd(instruction), 0, cpu.hi1),
        0x11 => cpu.hi1 = cpu.gpr.get64(rs(instruction), 0),
        0x12 => cpu.gpr.set64(rd(instruction), 0, cpu.lo1),
        0x13 => cpu.lo1 = cpu.gpr.get64(rs(instruction), 0),
        0x18 => mult1(cpu, instruction),
        0x1A => div1(cpu, instruction),
        0x1B => divu1(cpu, instruction),
        0x29 => mmi3(cpu, instruction)?,
        _ => {
            return Err(EmuError::Decode {
                table: "mmi",
                op: op as u8,
                instr: instruction,
                pc: cpu.pc(),
            })
        }
    }
    Ok(())
}

/// Per-word count of leading bits equal to the sign bit (sign bit itself
/// excluded), over both words of the low 64 bits.
fn plzcw(cpu: &mut EmotionEngine, instruction: u32) {
    let dest = rd(instruction);
    let reg = rs(instruction);
    for word in 0..2 {
        let value = cpu.gpr.get32(reg, word);
        let bits = if (value as i32) < 0 {
            value.leading_ones() - 1
        } else {
            value.leading_zeros().saturating_sub(1)
        };
        cpu.gpr.set32(dest, word, bits);
    }
}

fn mmi0(cpu: &mut EmotionEngine, instruction: u32) -> Result<(), EmuError> {
    let op = (instruction >> 6) & 0x1F;
    match op {
        0x09 => psubb(cpu, instruction),
        _ => {
            return Err(EmuError::Decode {
                table: "mmi0",
                op: op as u8,
                instr: instruction,
                pc: cpu.pc(),
            })
        }
    }
    Ok(())
}

/// Sixteen parallel byte subtractions across the full register width.
fn psubb(cpu: &mut EmotionEngine, instruction: u32) {
    let reg1 = rs(instruction);
    let reg2 = rt(instruction);
    let dest = rd(instruction);
    for i in 0..16 {
        let byte = cpu.gpr.get8(reg1, i).wrapping_sub(cpu.gpr.get8(reg2, i));
        cpu.gpr.set8(dest, i, byte);
    }
}

fn mmi2(cpu: &mut EmotionEngine, instruction: u32) -> Result<(), EmuError> {
    let op = (instruction >> 6) & 0x1F;
    match op {
        0x0E => pcpyld(cpu, instruction),
        0x12 => pand(cpu, instruction),
        _ => {
            return Err(EmuError::Decode {
                table: "mmi2",
                op: op as u8,
                instr: instruction,
                pc: cpu.pc(),
            })
        }
    }
    Ok(())
}

/// Low doubleword of rs becomes the high half of rd; low doubleword of
/// rt the low half.
fn pcpyld(cpu: &mut EmotionEngine, instruction: u32) {
    let high = cpu.gpr.get64(rs(instruction), 0);
    let low = cpu.gpr.get64(rt(instruction), 0);
    let dest = rd(instruction);
    cpu.gpr.set64(dest, 0, low);
    cpu.gpr.set64(dest, 1, high);
}

fn pand(cpu: &mut EmotionEngine, instruction: u32) {
    let value = cpu.gpr.get128(rs(instruction)) & cpu.gpr.get128(rt(instruction));
    cpu.gpr.set128(rd(instruction), value);
}

fn mult1(cpu: &mut EmotionEngine, instruction: u32) {
    let op1 = cpu.gpr.get32(rs(instruction), 0) as i32 as i64;
    let op2 = cpu.gpr.get32(rt(instruction), 0) as i32 as i64;
    let result = op1 * op2;
    cpu.lo1 = result as i32 as i64 as u64;
    cpu.hi1 = (result >> 32) as i32 as i64 as u64;
    cpu.gpr.set64(rd(instruction), 0, cpu.lo1);
}

fn div1(cpu: &mut EmotionEngine, instruction: u32) {
    let num = cpu.gpr.get32(rs(instruction), 0) as i32;
    let den = cpu.gpr.get32(rt(instruction), 0) as i32;
    let (lo, hi) = if den == 0 {
        (if num >= 0 { -1i32 } else { 1 }, num)
    } else if num == i32::MIN && den == -1 {
        (i32::MIN, 0)
    } else {
        (num / den, num % den)
    };
    cpu.lo1 = lo as i64 as u64;
    cpu.hi1 = hi as i64 as u64;
}

fn divu1(cpu: &mut EmotionEngine, instruction: u32) {
    let num = cpu.gpr.get32(rs(instruction), 0);
    let den = cpu.gpr.get32(rt(instruction), 0);
    let (lo, hi) = if den == 0 { (u32::MAX, num) } else { (num / den, num % den) };
    cpu.lo1 = lo as i32 as i64 as u64;
    cpu.hi1 = hi as i32 as i64 as u64;
}

fn mmi3(cpu: &mut EmotionEngine, instruction: u32) -> Result<(), EmuError> {
    let op = (instruction >> 6) & 0x1F;
    match op {
        0x0E => pcpyud(cpu, instruction),
        0x12 => por(cpu, instruction),
        0x13 => pnor(cpu, instruction),
        _ => {
            return Err(EmuError::Decode {
                table: "mmi3",
                op: op as u8,
                instr: instruction,
                pc: cpu.pc(),
            })
        }
    }
    Ok(())
}

/// High doubleword of rs becomes the low half of rd; high doubleword of
/// rt the high half.
fn pcpyud(cpu: &mut EmotionEngine, instruction: u32) {
    let low = cpu.gpr.get64(rs(instruction), 1);
    let high = cpu.gpr.get64(rt(instruction), 1);
    let dest = rd(instruction);
    cpu.gpr.set64(dest, 0, low);
    cpu.gpr.set64(dest, 1, high);
}

fn por(cpu: &mut EmotionEngine, instruction: u32) {
    let value = cpu.gpr.get128(rs(instruction)) | cpu.gpr.get128(rt(instruction));
    cpu.gpr.set128(rd(instruction), value);
}

fn pnor(cpu: &mut EmotionEngine, instruction: u32) {
    let value = !(cpu.gpr.get128(rs(instruction)) | cpu.gpr.get128(rt(instruction)));
    cpu.gpr.set128(rd(instruction), value);
}
