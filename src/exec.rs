//! Instruction semantics: operand addressing, branch conditions, one handler
//! per opcode and the dispatcher tying them together.
//!
//! Handlers validate every address before touching state, so an instruction
//! that faults leaves registers and memory as they were.

use crate::error::{ErrorKind, Fault, Warning};
use crate::instruction::{Condition, Instruction, Opcode, Word};
use crate::machine::{ConditionCode, Machine};

/// Effective address of an absolute or indexed operand.
///
/// Indexed addresses read the index register as a signed word and may come
/// out negative or past the end of a segment; the caller range-checks.
pub fn resolve(machine: &Machine, instr: Instruction) -> i64 {
    if instr.is_indexed() {
        machine.registers[instr.rindex()] as i32 as i64 + instr.offset() as i64
    } else {
        instr.address() as i64
    }
}

/// Decide whether BRANCH/CALL with condition bits `cond` transfers control.
///
/// Anything but NC needs a known condition code.
pub fn should_jump(cc: ConditionCode, cond: u8) -> Result<bool, ErrorKind> {
    let cond = Condition::try_from(cond).map_err(|_| ErrorKind::Condition)?;
    if cond != Condition::Nc && cc == ConditionCode::Unknown {
        return Err(ErrorKind::Condition);
    }
    Ok(match cond {
        Condition::Nc => true,
        Condition::Eq => cc == ConditionCode::Zero,
        Condition::Ne => cc != ConditionCode::Zero,
        Condition::Gt => cc == ConditionCode::Positive,
        Condition::Ge => matches!(cc, ConditionCode::Positive | ConditionCode::Zero),
        Condition::Lt => cc == ConditionCode::Negative,
        Condition::Le => matches!(cc, ConditionCode::Negative | ConditionCode::Zero),
    })
}

fn data_index(machine: &Machine, addr: i64) -> Result<usize, ErrorKind> {
    if (0..machine.datasize() as i64).contains(&addr) {
        Ok(addr as usize)
    } else {
        Err(ErrorKind::SegData)
    }
}

fn forbid_immediate(instr: Instruction) -> Result<(), ErrorKind> {
    if instr.is_immediate() {
        Err(ErrorKind::Immediate)
    } else {
        Ok(())
    }
}

/// Literal value or the data word the operand designates.
fn operand_value(machine: &Machine, instr: Instruction) -> Result<Word, ErrorKind> {
    if instr.is_immediate() {
        Ok(instr.value() as Word)
    } else {
        let addr = data_index(machine, resolve(machine, instr))?;
        Ok(machine.data[addr])
    }
}

/// Slot a push writes to. The stack pointer must stay in range once decremented.
fn push_slot(machine: &Machine) -> Result<usize, ErrorKind> {
    let sp = machine.sp() as usize;
    if sp == 0 || sp >= machine.datasize() {
        return Err(ErrorKind::SegStack);
    }
    Ok(sp)
}

/// Slot a pop reads from, one above the stack pointer.
fn pop_slot(machine: &Machine) -> Result<usize, ErrorKind> {
    match (machine.sp() as usize).checked_add(1) {
        Some(slot) if slot < machine.datasize() => Ok(slot),
        _ => Err(ErrorKind::SegStack),
    }
}

fn illop(_machine: &mut Machine, _instr: Instruction, _at: u32) -> Result<bool, ErrorKind> {
    Err(ErrorKind::Illegal)
}

fn nop(_machine: &mut Machine, _instr: Instruction, _at: u32) -> Result<bool, ErrorKind> {
    Ok(true)
}

fn load(machine: &mut Machine, instr: Instruction, _at: u32) -> Result<bool, ErrorKind> {
    let value = operand_value(machine, instr)?;
    machine.registers[instr.register()] = value;
    machine.set_cc(value);
    Ok(true)
}

fn store(machine: &mut Machine, instr: Instruction, _at: u32) -> Result<bool, ErrorKind> {
    forbid_immediate(instr)?;
    let addr = data_index(machine, resolve(machine, instr))?;
    machine.data[addr] = machine.registers[instr.register()];
    Ok(true)
}

fn add(machine: &mut Machine, instr: Instruction, _at: u32) -> Result<bool, ErrorKind> {
    let value = operand_value(machine, instr)?;
    let r = instr.register();
    machine.registers[r] = machine.registers[r].wrapping_add(value);
    machine.set_cc(machine.registers[r]);
    Ok(true)
}

fn sub(machine: &mut Machine, instr: Instruction, _at: u32) -> Result<bool, ErrorKind> {
    let value = operand_value(machine, instr)?;
    let r = instr.register();
    machine.registers[r] = machine.registers[r].wrapping_sub(value);
    machine.set_cc(machine.registers[r]);
    Ok(true)
}

/// Jump target of a BRANCH or CALL, as a text address.
///
/// Out-of-range targets are not an error here: the next fetch reports SEGTEXT.
fn jump_target(machine: &Machine, instr: Instruction) -> u32 {
    resolve(machine, instr) as u32
}

fn branch(machine: &mut Machine, instr: Instruction, _at: u32) -> Result<bool, ErrorKind> {
    forbid_immediate(instr)?;
    if should_jump(machine.cc, instr.reg_or_cond())? {
        machine.pc = jump_target(machine, instr);
    }
    Ok(true)
}

fn call(machine: &mut Machine, instr: Instruction, _at: u32) -> Result<bool, ErrorKind> {
    forbid_immediate(instr)?;
    if should_jump(machine.cc, instr.reg_or_cond())? {
        let slot = push_slot(machine)?;
        machine.data[slot] = machine.pc;
        machine.set_sp(slot as Word - 1);
        machine.pc = jump_target(machine, instr);
    }
    Ok(true)
}

fn ret(machine: &mut Machine, _instr: Instruction, _at: u32) -> Result<bool, ErrorKind> {
    let slot = pop_slot(machine)?;
    machine.set_sp(slot as Word);
    machine.pc = machine.data[slot];
    Ok(true)
}

fn push(machine: &mut Machine, instr: Instruction, at: u32) -> Result<bool, ErrorKind> {
    let slot = push_slot(machine)?;
    if slot < machine.dataend {
        machine.warn(Warning::PushStatic, at);
    }
    let value = operand_value(machine, instr)?;
    machine.data[slot] = value;
    machine.set_sp(slot as Word - 1);
    Ok(true)
}

fn pop(machine: &mut Machine, instr: Instruction, _at: u32) -> Result<bool, ErrorKind> {
    forbid_immediate(instr)?;
    let slot = pop_slot(machine)?;
    let addr = data_index(machine, resolve(machine, instr))?;
    machine.set_sp(slot as Word);
    machine.data[addr] = machine.data[slot];
    Ok(true)
}

fn halt(machine: &mut Machine, _instr: Instruction, at: u32) -> Result<bool, ErrorKind> {
    machine.warn(Warning::Halt, at);
    Ok(false)
}

/// Decode `instr` and run its handler.
///
/// `pc` must already point past `instr`: faults and warnings are reported at
/// `pc - 1`, and CALL saves `pc` as its return address. Returns `false` once
/// the program has halted normally.
pub fn decode_execute(machine: &mut Machine, instr: Instruction) -> Result<bool, Fault> {
    let at = machine.pc.wrapping_sub(1);
    let Some(opcode) = instr.opcode() else {
        return Err(ErrorKind::Illegal.at(at));
    };
    let result = match opcode {
        Opcode::Illop => illop(machine, instr, at),
        Opcode::Nop => nop(machine, instr, at),
        Opcode::Load => load(machine, instr, at),
        Opcode::Store => store(machine, instr, at),
        Opcode::Add => add(machine, instr, at),
        Opcode::Sub => sub(machine, instr, at),
        Opcode::Branch => branch(machine, instr, at),
        Opcode::Call => call(machine, instr, at),
        Opcode::Ret => ret(machine, instr, at),
        Opcode::Push => push(machine, instr, at),
        Opcode::Pop => pop(machine, instr, at),
        Opcode::Halt => halt(machine, instr, at),
    };
    result.map_err(|kind| kind.at(at))
}
