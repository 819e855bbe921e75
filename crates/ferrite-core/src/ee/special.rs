//! SPECIAL-table instructions (primary opcode zero).

use super::interpreter::{rd, rs, rt, shamt};
use super::EmotionEngine;
use crate::bus::Bus;
use crate::EmuError;

pub(super) fn special(
    cpu: &mut EmotionEngine,
    _bus: &mut Bus,
    instruction: u32,
) -> Result<(), EmuError> {
    let op = instruction & 0x3F;
    match op {
        0x00 => sll(cpu, instruction),
        0x02 => srl(cpu, instruction),
        0x03 => sra(cpu, instruction),
        0x04 => sllv(cpu, instruction),
        0x06 => srlv(cpu, instruction),
        0x07 => srav(cpu, instruction),
        0x08 => jr(cpu, instruction),
        0x09 => jalr(cpu, instruction),
        0x0A => movz(cpu, instruction),
        0x0B => movn(cpu, instruction),
        0x0C => cpu.syscall_exception(),
        0x0F => {} // sync
        0x10 => cpu.gpr.set64(rd(instruction), 0, cpu.hi),
        0x11 => cpu.hi = cpu.gpr.get64(rs(instruction), 0),
        0x12 => cpu.gpr.set64(rd(instruction), 0, cpu.lo),
        0x13 => cpu.lo = cpu.gpr.get64(rs(instruction), 0),
        0x14 => dsllv(cpu, instruction),
        0x16 => dsrlv(cpu, instruction),
        0x17 => dsrav(cpu, instruction),
        0x18 => mult(cpu, instruction),
        0x19 => multu(cpu, instruction),
        0x1A => div(cpu, instruction),
        0x1B => divu(cpu, instruction),
        0x20 => add(cpu, instruction),
        0x21 => addu(cpu, instruction),
        0x22 => sub(cpu, instruction),
        0x23 => subu(cpu, instruction),
        0x24 => and(cpu, instruction),
        0x25 => or(cpu, instruction),
        0x26 => xor(cpu, instruction),
        0x27 => nor(cpu, instruction),
        0x28 => cpu.gpr.set64(rd(instruction), 0, cpu.sa),
        0x29 => cpu.sa = cpu.gpr.get64(rs(instruction), 0),
        0x2A => slt(cpu, instruction),
        0x2B => sltu(cpu, instruction),
        0x2C => dadd(cpu, instruction),
        0x2D => daddu(cpu, instruction),
        0x2E => dsub(cpu, instruction),
        0x2F => dsubu(cpu, instruction),
        0x38 => dsll(cpu, instruction),
        0x3A => dsrl(cpu, instruction),
        0x3B => dsra(cpu, instruction),
        0x3C => dsll32(cpu, instruction),
        0x3E => dsrl32(cpu, instruction),
        0x3F => dsra32(cpu, instruction),
        _ => {
            return Err(EmuError::Decode {
                table: "special",
                op: op as u8,
                instr: instruction,
                pc: cpu.pc(),
            })
        }
    }
    Ok(())
}

// The 32-bit shifts operate on the low word and sign-extend the result
// into the full 64-bit register.
fn sll(cpu: &mut EmotionEngine, instruction: u32) {
    let result = cpu.gpr.get32(rt(instruction), 0) << shamt(instruction);
    cpu.gpr.set64(rd(instruction), 0, result as i32 as i64 as u64);
}

fn srl(cpu: &mut EmotionEngine, instruction: u32) {
    let result = cpu.gpr.get32(rt(instruction), 0) >> shamt(instruction);
    cpu.gpr.set64(rd(instruction), 0, result as i32 as i64 as u64);
}

fn sra(cpu: &mut EmotionEngine, instruction: u32) {
    let result = (cpu.gpr.get32(rt(instruction), 0) as i32) >> shamt(instruction);
    cpu.gpr.set64(rd(instruction), 0, result as i64 as u64);
}

fn sllv(cpu: &mut EmotionEngine, instruction: u32) {
    let shift = cpu.gpr.get8(rs(instruction), 0) & 0x1F;
    let result = cpu.gpr.get32(rt(instruction), 0) << shift;
    cpu.gpr.set64(rd(instruction), 0, result as i32 as i64 as u64);
}

fn srlv(cpu: &mut EmotionEngine, instruction: u32) {
    let shift = cpu.gpr.get8(rs(instruction), 0) & 0x1F;
    let result = cpu.gpr.get32(rt(instruction), 0) >> shift;
    cpu.gpr.set64(rd(instruction), 0, result as i32 as i64 as u64);
}

fn srav(cpu: &mut EmotionEngine, instruction: u32) {
    let shift = cpu.gpr.get8(rs(instruction), 0) & 0x1F;
    let result = (cpu.gpr.get32(rt(instruction), 0) as i32) >> shift;
    cpu.gpr.set64(rd(instruction), 0, result as i64 as u64);
}

fn jr(cpu: &mut EmotionEngine, instruction: u32) {
    let target = cpu.gpr.get32(rs(instruction), 0);
    cpu.jump(target);
}

fn jalr(cpu: &mut EmotionEngine, instruction: u32) {
    let target = cpu.gpr.get32(rs(instruction), 0);
    let link = cpu.pc().wrapping_add(8);
    cpu.jump(target);
    cpu.gpr.set64(rd(instruction), 0, link as u64);
}

fn movz(cpu: &mut EmotionEngine, instruction: u32) {
    if cpu.gpr.get64(rt(instruction), 0) == 0 {
        let value = cpu.gpr.get64(rs(instruction), 0);
        cpu.gpr.set64(rd(instruction), 0, value);
    }
}

fn movn(cpu: &mut EmotionEngine, instruction: u32) {
    if cpu.gpr.get64(rt(instruction), 0) != 0 {
        let value = cpu.gpr.get64(rs(instruction), 0);
        cpu.gpr.set64(rd(instruction), 0, value);
    }
}

fn dsllv(cpu: &mut EmotionEngine, instruction: u32) {
    let shift = cpu.gpr.get8(rs(instruction), 0) & 0x3F;
    let result = cpu.gpr.get64(rt(instruction), 0) << shift;
    cpu.gpr.set64(rd(instruction), 0, result);
}

fn dsrlv(cpu: &mut EmotionEngine, instruction: u32) {
    let shift = cpu.gpr.get8(rs(instruction), 0) & 0x3F;
    let result = cpu.gpr.get64(rt(instruction), 0) >> shift;
    cpu.gpr.set64(rd(instruction), 0, result);
}

fn dsrav(cpu: &mut EmotionEngine, instruction: u32) {
    let shift = cpu.gpr.get8(rs(instruction), 0) & 0x3F;
    let result = (cpu.gpr.get64(rt(instruction), 0) as i64) >> shift;
    cpu.gpr.set64(rd(instruction), 0, result as u64);
}

// MULT/MULTU also write rd, a MIPS-IV extension the EE keeps.
fn mult(cpu: &mut EmotionEngine, instruction: u32) {
    let op1 = cpu.gpr.get32(rs(instruction), 0) as i32 as i64;
    let op2 = cpu.gpr.get32(rt(instruction), 0) as i32 as i64;
    let result = op1 * op2;
    cpu.lo = result as i32 as i64 as u64;
    cpu.hi = (result >> 32) as i32 as i64 as u64;
    cpu.gpr.set64(rd(instruction), 0, cpu.lo);
}

fn multu(cpu: &mut EmotionEngine, instruction: u32) {
    let op1 = cpu.gpr.get32(rs(instruction), 0) as u64;
    let op2 = cpu.gpr.get32(rt(instruction), 0) as u64;
    let result = op1 * op2;
    cpu.lo = result as u32 as i32 as i64 as u64;
    cpu.hi = (result >> 32) as u32 as i32 as i64 as u64;
    cpu.gpr.set64(rd(instruction), 0, cpu.lo);
}

// Divide-by-zero produces the architectural sentinel instead of a trap.
fn div(cpu: &mut EmotionEngine, instruction: u32) {
    let num = cpu.gpr.get32(rs(instruction), 0) as i32;
    let den = cpu.gpr.get32(rt(instruction), 0) as i32;
    let (lo, hi) = if den == 0 {
        (if num >= 0 { -1i32 } else { 1 }, num)
    } else if num == i32::MIN && den == -1 {
        (i32::MIN, 0)
    } else {
        (num / den, num % den)
    };
    cpu.lo = lo as i64 as u64;
    cpu.hi = hi as i64 as u64;
}

fn divu(cpu: &mut EmotionEngine, instruction: u32) {
    let num = cpu.gpr.get32(rs(instruction), 0);
    let den = cpu.gpr.get32(rt(instruction), 0);
    let (lo, hi) = if den == 0 { (u32::MAX, num) } else { (num / den, num % den) };
    cpu.lo = lo as i32 as i64 as u64;
    cpu.hi = hi as i32 as i64 as u64;
}

fn add(cpu: &mut EmotionEngine, instruction: u32) {
    let result =
        (cpu.gpr.get32(rs(instruction), 0) as i32).wrapping_add(cpu.gpr.get32(rt(instruction), 0) as i32);
    cpu.gpr.set64(rd(instruction), 0, result as i64 as u64);
}

fn addu(cpu: &mut EmotionEngine, instruction: u32) {
    let result =
        (cpu.gpr.get32(rs(instruction), 0) as i32).wrapping_add(cpu.gpr.get32(rt(instruction), 0) as i32);
    cpu.gpr.set64(rd(instruction), 0, result as i64 as u64);
}

fn sub(cpu: &mut EmotionEngine, instruction: u32) {
    let result =
        (cpu.gpr.get32(rs(instruction), 0) as i32).wrapping_sub(cpu.gpr.get32(rt(instruction), 0) as i32);
    cpu.gpr.set64(rd(instruction), 0, result as i64 as u64);
}

fn subu(cpu: &mut EmotionEngine, instruction: u32) {
    let result =
        (cpu.gpr.get32(rs(instruction), 0) as i32).wrapping_sub(cpu.gpr.get32(rt(instruction), 0) as i32);
    cpu.gpr.set64(rd(instruction), 0, result as i64 as u64);
}

fn and(cpu: &mut EmotionEngine, instruction: u32) {
    let value = cpu.gpr.get64(rs(instruction), 0) & cpu.gpr.get64(rt(instruction), 0);
    cpu.gpr.set64(rd(instruction), 0, value);
}

fn or(cpu: &mut EmotionEngine, instruction: u32) {
    let value = cpu.gpr.get64(rs(instruction), 0) | cpu.gpr.get64(rt(instruction), 0);
    cpu.gpr.set64(rd(instruction), 0, value);
}

fn xor(cpu: &mut EmotionEngine, instruction: u32) {
    let value = cpu.gpr.get64(rs(instruction), 0) ^ cpu.gpr.get64(rt(instruction), 0);
    cpu.gpr.set64(rd(instruction), 0, value);
}

fn nor(cpu: &mut EmotionEngine, instruction: u32) {
    let value = !(cpu.gpr.get64(rs(instruction), 0) | cpu.gpr.get64(rt(instruction), 0));
    cpu.gpr.set64(rd(instruction), 0, value);
}

fn slt(cpu: &mut EmotionEngine, instruction: u32) {
    let lhs = cpu.gpr.get64(rs(instruction), 0) as i64;
    let rhs = cpu.gpr.get64(rt(instruction), 0) as i64;
    cpu.gpr.set64(rd(instruction), 0, (lhs < rhs) as u64);
}

fn sltu(cpu: &mut EmotionEngine, instruction: u32) {
    let lhs = cpu.gpr.get64(rs(instruction), 0);
    let rhs = cpu.gpr.get64(rt(instruction), 0);
    cpu.gpr.set64(rd(instruction), 0, (lhs < rhs) as u64);
}

fn dadd(cpu: &mut EmotionEngine, instruction: u32) {
    let result =
        (cpu.gpr.get64(rs(instruction), 0) as i64).wrapping_add(cpu.gpr.get64(rt(instruction), 0) as i64);
    cpu.gpr.set64(rd(instruction), 0, result as u64);
}

fn daddu(cpu: &mut EmotionEngine, instruction: u32) {
    let result =
        (cpu.gpr.get64(rs(instruction), 0) as i64).wrapping_add(cpu.gpr.get64(rt(instruction), 0) as i64);
    cpu.gpr.set64(rd(instruction), 0, result as u64);
}

fn dsub(cpu: &mut EmotionEngine, instruction: u32) {
    let result =
        (cpu.gpr.get64(rs(instruction), 0) as i64).wrapping_sub(cpu.gpr.get64(rt(instruction), 0) as i64);
    cpu.gpr.set64(rd(instruction), 0, result as u64);
}

fn dsubu(cpu: &mut EmotionEngine, instruction: u32) {
    let result =
        (cpu.gpr.get64(rs(instruction), 0) as i64).wrapping_sub(cpu.gpr.get64(rt(instruction), 0) as i64);
    cpu.gpr.set64(rd(instruction), 0, result as u64);
}

fn dsll(cpu: &mut EmotionEngine, instruction: u32) {
    let result = cpu.gpr.get64(rt(instruction), 0) << shamt(instruction);
    cpu.gpr.set64(rd(instruction), 0, result);
}

fn dsrl(cpu: &mut EmotionEngine, instruction: u32) {
    let result = cpu.gpr.get64(rt(instruction), 0) >> shamt(instruction);
    cpu.gpr.set64(rd(instruction), 0, result);
}

fn dsra(cpu: &mut EmotionEngine, instruction: u32) {
    let result = (cpu.gpr.get64(rt(instruction), 0) as i64) >> shamt(instruction);
    cpu.gpr.set64(rd(instruction), 0, result as u64);
}

fn dsll32(cpu: &mut EmotionEngine, instruction: u32) {
    let result = cpu.gpr.get64(rt(instruction), 0) << (shamt(instruction) + 32);
    cpu.gpr.set64(rd(instruction), 0, result);
}

fn dsrl32(cpu: &mut EmotionEngine, instruction: u32) {
    let result = cpu.gpr.get64(rt(instruction), 0) >> (shamt(instruction) + 32);
    cpu.gpr.set64(rd(instruction), 0, result);
}

fn dsra32(cpu: &mut EmotionEngine, instruction: u32) {
    let result = (cpu.gpr.get64(rt(instruction), 0) as i64) >> (shamt(instruction) + 32);
    cpu.gpr.set64(rd(instruction), 0, result as u64);
}
