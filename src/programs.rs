//! Built-in example programs, used when no binary file is given.

use crate::instruction::{Condition, Instruction, Opcode, Word};
use crate::machine::{Machine, SP};

/// Size of the data segment of the built-in programs.
const DATASIZE: usize = 20;

fn data_segment(prefix: &[Word]) -> Vec<Word> {
    let mut data = vec![0; DATASIZE];
    data[..prefix.len()].copy_from_slice(prefix);
    data
}

/// Multiply data[0] by data[1] by repeated addition and store the product in data[2].
///
/// ```text
/// 0  LOAD   R00, @0x0000
/// 1  LOAD   R01, @0x0001
/// 2  SUB    R01, #1
/// 3  BRANCH LE, @0x0007
/// 4  ADD    R00, @0x0000
/// 5  SUB    R01, #1
/// 6  BRANCH NC, @0x0003
/// 7  STORE  R00, @0x0002
/// 8  HALT
/// ```
pub fn simple() -> Machine {
    let le = Condition::Le as u8;
    let nc = Condition::Nc as u8;
    let text = vec![
        Instruction::absolute(Opcode::Load, 0, 0),
        Instruction::absolute(Opcode::Load, 1, 1),
        Instruction::immediate(Opcode::Sub, 1, 1),
        Instruction::absolute(Opcode::Branch, le, 7),
        Instruction::absolute(Opcode::Add, 0, 0),
        Instruction::immediate(Opcode::Sub, 1, 1),
        Instruction::absolute(Opcode::Branch, nc, 3),
        Instruction::absolute(Opcode::Store, 0, 2),
        Instruction::generic(Opcode::Halt),
        Instruction::generic(Opcode::Illop),
        Instruction::generic(Opcode::Illop),
        Instruction::generic(Opcode::Illop),
    ];
    Machine::load(text, data_segment(&[10, 5, 20, 0]), 5)
}

/// Same product as [`simple`], computed by a subroutine taking its operands on the stack.
///
/// The caller pushes data[2] and data[3], calls the routine at 10, drops the
/// two arguments and stores the result (left in R00) in data[1].
pub fn subroutine() -> Machine {
    let le = Condition::Le as u8;
    let nc = Condition::Nc as u8;
    let sp = SP as u8;
    let text = vec![
        Instruction::absolute(Opcode::Push, 0, 2),
        Instruction::absolute(Opcode::Push, 0, 3),
        Instruction::absolute(Opcode::Call, nc, 10),
        Instruction::immediate(Opcode::Add, sp, 2),
        Instruction::absolute(Opcode::Store, 0, 1),
        Instruction::generic(Opcode::Halt),
        Instruction::generic(Opcode::Nop),
        Instruction::generic(Opcode::Nop),
        Instruction::generic(Opcode::Nop),
        Instruction::generic(Opcode::Nop),
        // 10: return address at 1[SP], second argument at 2[SP], first at 3[SP].
        Instruction::indexed(Opcode::Load, 0, sp, 3),
        Instruction::indexed(Opcode::Load, 1, sp, 2),
        Instruction::immediate(Opcode::Sub, 1, 1),
        Instruction::absolute(Opcode::Branch, le, 17),
        Instruction::indexed(Opcode::Add, 0, sp, 3),
        Instruction::immediate(Opcode::Sub, 1, 1),
        Instruction::absolute(Opcode::Branch, nc, 13),
        Instruction::generic(Opcode::Ret),
    ];
    Machine::load(text, data_segment(&[0, 0, 20, 5]), 10)
}
