//! Primary opcode decode and dispatch for the EE interpreter.
//!
//! The top six bits select a handler; SPECIAL, REGIMM, the coprocessor
//! blocks, and MMI fan out to their own tables. Unknown encodings are
//! fatal decode errors surfaced to the outer loop.

use log::{trace, warn};

use super::{mmi, special, EmotionEngine};
use crate::bus::Bus;
use crate::EmuError;

pub(super) fn rs(instruction: u32) -> usize {
    ((instruction >> 21) & 0x1F) as usize
}

pub(super) fn rt(instruction: u32) -> usize {
    ((instruction >> 16) & 0x1F) as usize
}

pub(super) fn rd(instruction: u32) -> usize {
    ((instruction >> 11) & 0x1F) as usize
}

pub(super) fn shamt(instruction: u32) -> u32 {
    (instruction >> 6) & 0x1F
}

pub(super) fn imm16(instruction: u32) -> i16 {
    instruction as i16
}

fn branch_offset(instruction: u32) -> i32 {
    ((instruction as i16) as i32) << 2
}

fn effective_address(cpu: &EmotionEngine, instruction: u32) -> u32 {
    cpu.gpr.get32(rs(instruction), 0).wrapping_add(imm16(instruction) as i32 as u32)
}

pub(super) fn interpret(
    cpu: &mut EmotionEngine,
    bus: &mut Bus,
    instruction: u32,
) -> Result<(), EmuError> {
    if instruction == 0 {
        return Ok(()); // nop
    }
    let op = instruction >> 26;
    match op {
        0x00 => special::special(cpu, bus, instruction)?,
        0x01 => regimm(cpu, instruction)?,
        0x02 => j(cpu, instruction),
        0x03 => jal(cpu, instruction),
        0x04 => beq(cpu, instruction),
        0x05 => bne(cpu, instruction),
        0x06 => blez(cpu, instruction),
        0x07 => bgtz(cpu, instruction),
        0x08 => addi(cpu, instruction),
        0x09 => addiu(cpu, instruction),
        0x0A => slti(cpu, instruction),
        0x0B => sltiu(cpu, instruction),
        0x0C => andi(cpu, instruction),
        0x0D => ori(cpu, instruction),
        0x0E => xori(cpu, instruction),
        0x0F => lui(cpu, instruction),
        0x10..=0x13 => cop(cpu, bus, instruction)?,
        0x14 => beql(cpu, instruction),
        0x15 => bnel(cpu, instruction),
        0x16 => blezl(cpu, instruction),
        0x17 => bgtzl(cpu, instruction),
        0x18 => daddi(cpu, instruction),
        0x19 => daddiu(cpu, instruction),
        0x1C => mmi::mmi(cpu, instruction)?,
        0x1E => lq(cpu, bus, instruction),
        0x1F => sq(cpu, bus, instruction),
        0x20 => lb(cpu, bus, instruction),
        0x21 => lh(cpu, bus, instruction),
        0x23 => lw(cpu, bus, instruction),
        0x24 => lbu(cpu, bus, instruction),
        0x25 => lhu(cpu, bus, instruction),
        0x27 => lwu(cpu, bus, instruction),
        0x28 => sb(cpu, bus, instruction),
        0x29 => sh(cpu, bus, instruction),
        0x2B => sw(cpu, bus, instruction),
        0x2F => trace!(target: "ee", "cache"),
        0x31 => lwc1(cpu, bus, instruction),
        0x33 => trace!(target: "ee", "pref"),
        0x37 => ld(cpu, bus, instruction),
        0x39 => swc1(cpu, bus, instruction),
        0x3F => sd(cpu, bus, instruction),
        _ => {
            return Err(EmuError::Decode {
                table: "primary",
                op: op as u8,
                instr: instruction,
                pc: cpu.pc(),
            })
        }
    }
    Ok(())
}

fn regimm(cpu: &mut EmotionEngine, instruction: u32) -> Result<(), EmuError> {
    let op = (instruction >> 16) & 0x1F;
    let offset = branch_offset(instruction);
    let reg = cpu.gpr.get64(rs(instruction), 0) as i64;
    match op {
        0x00 => cpu.branch(reg < 0, offset),
        0x01 => cpu.branch(reg >= 0, offset),
        0x02 => cpu.branch_likely(reg < 0, offset),
        0x03 => cpu.branch_likely(reg >= 0, offset),
        _ => {
            return Err(EmuError::Decode {
                table: "regimm",
                op: op as u8,
                instr: instruction,
                pc: cpu.pc(),
            })
        }
    }
    Ok(())
}

fn jump_target(cpu: &EmotionEngine, instruction: u32) -> u32 {
    ((instruction & 0x03FF_FFFF) << 2) | (cpu.pc().wrapping_add(4) & 0xF000_0000)
}

fn j(cpu: &mut EmotionEngine, instruction: u32) {
    let target = jump_target(cpu, instruction);
    cpu.jump(target);
}

fn jal(cpu: &mut EmotionEngine, instruction: u32) {
    let target = jump_target(cpu, instruction);
    let link = cpu.pc().wrapping_add(8);
    cpu.jump(target);
    cpu.gpr.set64(31, 0, link as u64);
}

fn beq(cpu: &mut EmotionEngine, instruction: u32) {
    let lhs = cpu.gpr.get64(rs(instruction), 0);
    let rhs = cpu.gpr.get64(rt(instruction), 0);
    cpu.branch(lhs == rhs, branch_offset(instruction));
}

fn bne(cpu: &mut EmotionEngine, instruction: u32) {
    let lhs = cpu.gpr.get64(rs(instruction), 0);
    let rhs = cpu.gpr.get64(rt(instruction), 0);
    cpu.branch(lhs != rhs, branch_offset(instruction));
}

fn blez(cpu: &mut EmotionEngine, instruction: u32) {
    let reg = cpu.gpr.get64(rs(instruction), 0) as i64;
    cpu.branch(reg <= 0, branch_offset(instruction));
}

fn bgtz(cpu: &mut EmotionEngine, instruction: u32) {
    let reg = cpu.gpr.get64(rs(instruction), 0) as i64;
    cpu.branch(reg > 0, branch_offset(instruction));
}

fn beql(cpu: &mut EmotionEngine, instruction: u32) {
    let lhs = cpu.gpr.get64(rs(instruction), 0);
    let rhs = cpu.gpr.get64(rt(instruction), 0);
    cpu.branch_likely(lhs == rhs, branch_offset(instruction));
}

fn bnel(cpu: &mut EmotionEngine, instruction: u32) {
    let lhs = cpu.gpr.get64(rs(instruction), 0);
    let rhs = cpu.gpr.get64(rt(instruction), 0);
    cpu.branch_likely(lhs != rhs, branch_offset(instruction));
}

fn blezl(cpu: &mut EmotionEngine, instruction: u32) {
    let reg = cpu.gpr.get64(rs(instruction), 0) as i64;
    cpu.branch_likely(reg <= 0, branch_offset(instruction));
}

fn bgtzl(cpu: &mut EmotionEngine, instruction: u32) {
    let reg = cpu.gpr.get64(rs(instruction), 0) as i64;
    cpu.branch_likely(reg > 0, branch_offset(instruction));
}

// ADDI wraps rather than trapping on signed overflow; commercial code
// never arms the Overflow exception.
fn addi(cpu: &mut EmotionEngine, instruction: u32) {
    let result = (cpu.gpr.get32(rs(instruction), 0) as i32).wrapping_add(imm16(instruction) as i32);
    cpu.gpr.set64(rt(instruction), 0, result as i64 as u64);
}

fn addiu(cpu: &mut EmotionEngine, instruction: u32) {
    let result = (cpu.gpr.get32(rs(instruction), 0) as i32).wrapping_add(imm16(instruction) as i32);
    cpu.gpr.set64(rt(instruction), 0, result as i64 as u64);
}

fn daddi(cpu: &mut EmotionEngine, instruction: u32) {
    let result = (cpu.gpr.get64(rs(instruction), 0) as i64).wrapping_add(imm16(instruction) as i64);
    cpu.gpr.set64(rt(instruction), 0, result as u64);
}

fn daddiu(cpu: &mut EmotionEngine, instruction: u32) {
    let result = (cpu.gpr.get64(rs(instruction), 0) as i64).wrapping_add(imm16(instruction) as i64);
    cpu.gpr.set64(rt(instruction), 0, result as u64);
}

fn slti(cpu: &mut EmotionEngine, instruction: u32) {
    let source = cpu.gpr.get64(rs(instruction), 0) as i64;
    cpu.gpr.set64(rt(instruction), 0, (source < imm16(instruction) as i64) as u64);
}

fn sltiu(cpu: &mut EmotionEngine, instruction: u32) {
    let source = cpu.gpr.get64(rs(instruction), 0);
    cpu.gpr.set64(rt(instruction), 0, (source < (instruction & 0xFFFF) as u64) as u64);
}

fn andi(cpu: &mut EmotionEngine, instruction: u32) {
    let value = cpu.gpr.get64(rs(instruction), 0) & (instruction & 0xFFFF) as u64;
    cpu.gpr.set64(rt(instruction), 0, value);
}

fn ori(cpu: &mut EmotionEngine, instruction: u32) {
    let value = cpu.gpr.get64(rs(instruction), 0) | (instruction & 0xFFFF) as u64;
    cpu.gpr.set64(rt(instruction), 0, value);
}

fn xori(cpu: &mut EmotionEngine, instruction: u32) {
    let value = cpu.gpr.get64(rs(instruction), 0) ^ (instruction & 0xFFFF) as u64;
    cpu.gpr.set64(rt(instruction), 0, value);
}

fn lui(cpu: &mut EmotionEngine, instruction: u32) {
    let value = ((instruction & 0xFFFF) << 16) as i32 as i64;
    cpu.gpr.set64(rt(instruction), 0, value as u64);
}

fn lq(cpu: &mut EmotionEngine, bus: &mut Bus, instruction: u32) {
    let addr = effective_address(cpu, instruction);
    let value = cpu.read128(bus, addr);
    cpu.gpr.set128(rt(instruction), value);
}

fn sq(cpu: &mut EmotionEngine, bus: &mut Bus, instruction: u32) {
    let addr = effective_address(cpu, instruction);
    let value = cpu.gpr.get128(rt(instruction));
    cpu.write128(bus, addr, value);
}

fn lb(cpu: &mut EmotionEngine, bus: &mut Bus, instruction: u32) {
    let addr = effective_address(cpu, instruction);
    let value = cpu.read8(bus, addr) as i8 as i64;
    cpu.gpr.set64(rt(instruction), 0, value as u64);
}

fn lh(cpu: &mut EmotionEngine, bus: &mut Bus, instruction: u32) {
    let addr = effective_address(cpu, instruction);
    let value = cpu.read16(bus, addr) as i16 as i64;
    cpu.gpr.set64(rt(instruction), 0, value as u64);
}

fn lw(cpu: &mut EmotionEngine, bus: &mut Bus, instruction: u32) {
    let addr = effective_address(cpu, instruction);
    let value = cpu.read32(bus, addr) as i32 as i64;
    cpu.gpr.set64(rt(instruction), 0, value as u64);
}

fn lbu(cpu: &mut EmotionEngine, bus: &mut Bus, instruction: u32) {
    let addr = effective_address(cpu, instruction);
    let value = cpu.read8(bus, addr) as u64;
    cpu.gpr.set64(rt(instruction), 0, value);
}

fn lhu(cpu: &mut EmotionEngine, bus: &mut Bus, instruction: u32) {
    let addr = effective_address(cpu, instruction);
    let value = cpu.read16(bus, addr) as u64;
    cpu.gpr.set64(rt(instruction), 0, value);
}

fn lwu(cpu: &mut EmotionEngine, bus: &mut Bus, instruction: u32) {
    let addr = effective_address(cpu, instruction);
    let value = cpu.read32(bus, addr) as u64;
    cpu.gpr.set64(rt(instruction), 0, value);
}

fn ld(cpu: &mut EmotionEngine, bus: &mut Bus, instruction: u32) {
    let addr = effective_address(cpu, instruction);
    let value = cpu.read64(bus, addr);
    cpu.gpr.set64(rt(instruction), 0, value);
}

fn sb(cpu: &mut EmotionEngine, bus: &mut Bus, instruction: u32) {
    let addr = effective_address(cpu, instruction);
    let value = cpu.gpr.get8(rt(instruction), 0);
    cpu.write8(bus, addr, value);
}

fn sh(cpu: &mut EmotionEngine, bus: &mut Bus, instruction: u32) {
    let addr = effective_address(cpu, instruction);
    let value = cpu.gpr.get16(rt(instruction), 0);
    cpu.write16(bus, addr, value);
}

fn sw(cpu: &mut EmotionEngine, bus: &mut Bus, instruction: u32) {
    let addr = effective_address(cpu, instruction);
    let value = cpu.gpr.get32(rt(instruction), 0);
    cpu.write32(bus, addr, value);
}

fn sd(cpu: &mut EmotionEngine, bus: &mut Bus, instruction: u32) {
    let addr = effective_address(cpu, instruction);
    let value = cpu.gpr.get64(rt(instruction), 0);
    cpu.write64(bus, addr, value);
}

fn lwc1(cpu: &mut EmotionEngine, bus: &mut Bus, instruction: u32) {
    let addr = effective_address(cpu, instruction);
    let value = cpu.read32(bus, addr);
    cpu.fpu.mtc(rt(instruction), value);
}

fn swc1(cpu: &mut EmotionEngine, bus: &mut Bus, instruction: u32) {
    let addr = effective_address(cpu, instruction);
    let value = cpu.fpu.get_gpr(rt(instruction));
    cpu.write32(bus, addr, value);
}

fn cop(cpu: &mut EmotionEngine, bus: &mut Bus, instruction: u32) -> Result<(), EmuError> {
    let cop_id = (instruction >> 26) & 0x3;
    let cop_op = (instruction >> 21) & 0x1F;
    match cop_id {
        0 => cop0_op(cpu, bus, instruction, cop_op),
        1 => cop1_op(cpu, instruction, cop_op),
        2 => {
            // VU0 macro mode is outside the core; consume and move on.
            warn!(target: "ee", "COP2 op ${cop_op:02X} ignored at ${:08X}", cpu.pc());
            Ok(())
        }
        _ => Err(EmuError::Decode {
            table: "cop",
            op: cop_id as u8,
            instr: instruction,
            pc: cpu.pc(),
        }),
    }
}

fn cop0_op(
    cpu: &mut EmotionEngine,
    bus: &mut Bus,
    instruction: u32,
    cop_op: u32,
) -> Result<(), EmuError> {
    match cop_op {
        0x00 => {
            let value = cpu.cop0.mfc(rd(instruction)) as i32 as i64;
            cpu.gpr.set64(rt(instruction), 0, value as u64);
        }
        0x04 => cpu.cop0.mtc(rd(instruction), cpu.gpr.get32(rt(instruction), 0)),
        0x08 => {
            // BC0x: the COP0 condition is wired to DMAC completion.
            let condition = bus.dmac.cp0_condition();
            let offset = branch_offset(instruction);
            match (instruction >> 16) & 0x1F {
                0x00 => cpu.branch(!condition, offset),
                0x01 => cpu.branch(condition, offset),
                0x02 => cpu.branch_likely(!condition, offset),
                0x03 => cpu.branch_likely(condition, offset),
                other => {
                    return Err(EmuError::Decode {
                        table: "bc0",
                        op: other as u8,
                        instr: instruction,
                        pc: cpu.pc(),
                    })
                }
            }
        }
        0x10 => match instruction & 0x3F {
            0x02 => {
                let index = cpu.cop0.gpr[0] as usize;
                cpu.cop0.set_tlb(index);
            }
            0x06 => {
                let index = cpu.cop0.gpr[1] as usize;
                cpu.cop0.set_tlb(index);
            }
            0x18 => cpu.eret(),
            0x38 => {
                if cpu.cop0.status.edi || cpu.cop0.status.mode == 0 {
                    cpu.cop0.status.master_int_enable = true;
                }
            }
            0x39 => {
                if cpu.cop0.status.edi || cpu.cop0.status.mode == 0 {
                    cpu.cop0.status.master_int_enable = false;
                }
            }
            other => {
                return Err(EmuError::Decode {
                    table: "cop0.c0",
                    op: other as u8,
                    instr: instruction,
                    pc: cpu.pc(),
                })
            }
        },
        other => {
            return Err(EmuError::Decode {
                table: "cop0",
                op: other as u8,
                instr: instruction,
                pc: cpu.pc(),
            })
        }
    }
    Ok(())
}

fn cop1_op(cpu: &mut EmotionEngine, instruction: u32, cop_op: u32) -> Result<(), EmuError> {
    let ft = rt(instruction);
    let fs = rd(instruction);
    let fd = shamt(instruction) as usize;
    match cop_op {
        0x00 => {
            let value = cpu.fpu.get_gpr(fs) as i32 as i64;
            cpu.gpr.set64(ft, 0, value as u64);
        }
        0x02 => {
            let value = cpu.fpu.cfc(fs) as i32 as i64;
            cpu.gpr.set64(ft, 0, value as u64);
        }
        0x04 => cpu.fpu.mtc(fs, cpu.gpr.get32(ft, 0)),
        0x06 => cpu.fpu.ctc(fs, cpu.gpr.get32(ft, 0)),
        0x08 => {
            let selector = (instruction >> 16) & 0x1F;
            let taken_if = selector & 1 != 0;
            let likely = selector & 2 != 0;
            let condition = cpu.fpu.condition == taken_if;
            let offset = branch_offset(instruction);
            if likely {
                cpu.branch_likely(condition, offset);
            } else {
                cpu.branch(condition, offset);
            }
        }
        0x10 => {
            // S-format arithmetic.
            match instruction & 0x3F {
                0x00 => cpu.fpu.add_s(fd, fs, ft),
                0x01 => cpu.fpu.sub_s(fd, fs, ft),
                0x02 => cpu.fpu.mul_s(fd, fs, ft),
                0x03 => cpu.fpu.div_s(fd, fs, ft),
                0x05 => cpu.fpu.abs_s(fd, fs),
                0x06 => cpu.fpu.mov_s(fd, fs),
                0x07 => cpu.fpu.neg_s(fd, fs),
                0x18 => cpu.fpu.adda_s(fs, ft),
                0x1C => cpu.fpu.madd_s(fd, fs, ft),
                0x24 => cpu.fpu.cvt_w_s(fd, fs),
                0x32 => cpu.fpu.c_eq_s(fs, ft),
                0x34 => cpu.fpu.c_lt_s(fs, ft),
                other => {
                    return Err(EmuError::Decode {
                        table: "fpu.s",
                        op: other as u8,
                        instr: instruction,
                        pc: cpu.pc(),
                    })
                }
            }
        }
        0x14 => match instruction & 0x3F {
            0x20 => cpu.fpu.cvt_s_w(fd, fs),
            other => {
                return Err(EmuError::Decode {
                    table: "fpu.w",
                    op: other as u8,
                    instr: instruction,
                    pc: cpu.pc(),
                })
            }
        },
        other => {
            return Err(EmuError::Decode {
                table: "cop1",
                op: other as u8,
                instr: instruction,
                pc: cpu.pc(),
            })
        }
    }
    Ok(())
}
