use std::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::{ErrorKind, Fault};

/// A data word. Instructions are the same width.
pub type Word = u32;

/// Operation codes of the processor.
///
/// The discriminants are the on-disk encoding: they occupy the low six bits
/// of an instruction word.
#[derive(TryFromPrimitive, IntoPrimitive, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Illop = 0,
    Nop,
    Load,
    Store,
    Add,
    Sub,
    Branch,
    Call,
    Ret,
    Push,
    Pop,
    Halt,
}

/// Highest valid opcode value.
pub const LAST_OPCODE: u8 = Opcode::Halt as u8;

impl Opcode {
    pub const ALL: [Opcode; 12] = [
        Opcode::Illop,
        Opcode::Nop,
        Opcode::Load,
        Opcode::Store,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Branch,
        Opcode::Call,
        Opcode::Ret,
        Opcode::Push,
        Opcode::Pop,
        Opcode::Halt,
    ];

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Illop => "ILLOP",
            Opcode::Nop => "NOP",
            Opcode::Load => "LOAD",
            Opcode::Store => "STORE",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Branch => "BRANCH",
            Opcode::Call => "CALL",
            Opcode::Ret => "RET",
            Opcode::Push => "PUSH",
            Opcode::Pop => "POP",
            Opcode::Halt => "HALT",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Branch conditions carried by BRANCH and CALL in place of a register number.
#[derive(TryFromPrimitive, IntoPrimitive, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Condition {
    /// No condition: always taken.
    Nc = 0,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

/// Highest valid condition value.
pub const LAST_CONDITION: u8 = Condition::Le as u8;

impl Condition {
    pub fn name(self) -> &'static str {
        match self {
            Condition::Nc => "NC",
            Condition::Eq => "EQ",
            Condition::Ne => "NE",
            Condition::Gt => "GT",
            Condition::Ge => "GE",
            Condition::Lt => "LT",
            Condition::Le => "LE",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// Field layout, low bits first:
// [opcode:6][immediate:1][indexed:1][reg_or_cond:4][operand:20]
// The indexed operand splits into [rindex:4][offset:16].
const OPCODE_MASK: u32 = 0x3F;
const IMMEDIATE_BIT: u32 = 1 << 6;
const INDEXED_BIT: u32 = 1 << 7;
const REGCOND_SHIFT: u32 = 8;
const REGCOND_MASK: u32 = 0xF;
const OPERAND_SHIFT: u32 = 12;
const OPERAND_MASK: u32 = 0xF_FFFF;
const RINDEX_MASK: u32 = 0xF;
const OFFSET_SHIFT: u32 = 16;
const OFFSET_MASK: u32 = 0xFFFF;

/// How the trailing 20 bits of an instruction are read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operand {
    /// Unsigned absolute address (data or text segment).
    Absolute(u32),
    /// Signed 20-bit literal.
    Immediate(i32),
    /// `registers[rindex] + offset`.
    Indexed { rindex: u8, offset: i16 },
}

/// A 32-bit instruction word.
///
/// The word is kept raw so that text segments round-trip bit for bit through
/// the binary file format; fields are read with accessors.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Instruction(Word);

impl Instruction {
    pub const fn from_raw(word: Word) -> Self {
        Instruction(word)
    }

    pub const fn raw(self) -> Word {
        self.0
    }

    const fn header(opcode: Opcode, immediate: bool, indexed: bool, reg_or_cond: u8) -> Word {
        (opcode as u32 & OPCODE_MASK)
            | if immediate { IMMEDIATE_BIT } else { 0 }
            | if indexed { INDEXED_BIT } else { 0 }
            | ((reg_or_cond as u32 & REGCOND_MASK) << REGCOND_SHIFT)
    }

    /// An instruction with no operand (RET, HALT, NOP, ILLOP).
    pub const fn generic(opcode: Opcode) -> Self {
        Instruction(Self::header(opcode, false, false, 0))
    }

    /// Absolute addressing: `reg_or_cond` is a register or a condition depending on `opcode`.
    pub const fn absolute(opcode: Opcode, reg_or_cond: u8, address: u32) -> Self {
        Instruction(
            Self::header(opcode, false, false, reg_or_cond)
                | ((address & OPERAND_MASK) << OPERAND_SHIFT),
        )
    }

    /// Immediate operand, truncated to 20 bits.
    pub const fn immediate(opcode: Opcode, reg_or_cond: u8, value: i32) -> Self {
        Instruction(
            Self::header(opcode, true, false, reg_or_cond)
                | (((value as u32) & OPERAND_MASK) << OPERAND_SHIFT),
        )
    }

    /// Indexed addressing through register `rindex`.
    pub const fn indexed(opcode: Opcode, reg_or_cond: u8, rindex: u8, offset: i16) -> Self {
        Instruction(
            Self::header(opcode, false, true, reg_or_cond)
                | ((rindex as u32 & RINDEX_MASK) << OPERAND_SHIFT)
                | (((offset as u16) as u32) << OFFSET_SHIFT),
        )
    }

    /// Raw opcode field, possibly outside the instruction table.
    pub const fn opcode_bits(self) -> u8 {
        (self.0 & OPCODE_MASK) as u8
    }

    pub fn opcode(self) -> Option<Opcode> {
        Opcode::try_from(self.opcode_bits()).ok()
    }

    pub const fn is_immediate(self) -> bool {
        self.0 & IMMEDIATE_BIT != 0
    }

    pub const fn is_indexed(self) -> bool {
        self.0 & INDEXED_BIT != 0
    }

    /// Register number or branch condition, depending on the opcode.
    pub const fn reg_or_cond(self) -> u8 {
        ((self.0 >> REGCOND_SHIFT) & REGCOND_MASK) as u8
    }

    pub fn register(self) -> usize {
        self.reg_or_cond() as usize
    }

    pub fn condition(self) -> Option<Condition> {
        Condition::try_from(self.reg_or_cond()).ok()
    }

    /// Trailing field read as an unsigned absolute address.
    pub const fn address(self) -> u32 {
        (self.0 >> OPERAND_SHIFT) & OPERAND_MASK
    }

    /// Trailing field read as a sign-extended 20-bit value.
    pub const fn value(self) -> i32 {
        // The field ends at bit 31, so an arithmetic shift sign-extends it.
        (self.0 as i32) >> OPERAND_SHIFT
    }

    pub const fn rindex(self) -> usize {
        ((self.0 >> OPERAND_SHIFT) & RINDEX_MASK) as usize
    }

    pub const fn offset(self) -> i16 {
        ((self.0 >> OFFSET_SHIFT) & OFFSET_MASK) as u16 as i16
    }

    /// The operand as selected by the mode flags. Immediate wins over indexed.
    pub fn operand(self) -> Operand {
        if self.is_immediate() {
            Operand::Immediate(self.value())
        } else if self.is_indexed() {
            Operand::Indexed {
                rindex: self.rindex() as u8,
                offset: self.offset(),
            }
        } else {
            Operand::Absolute(self.address())
        }
    }

    /// Symbolic form of the instruction found at text address `addr`.
    ///
    /// Fails with `Unknown` for an opcode outside the table and with
    /// `Condition` for a BRANCH/CALL carrying an invalid condition.
    pub fn disassemble(self, addr: u32) -> Result<String, Fault> {
        let op = self.opcode().ok_or(ErrorKind::Unknown.at(addr))?;
        let mut out = String::from(op.mnemonic());

        match op {
            Opcode::Ret | Opcode::Halt | Opcode::Nop | Opcode::Illop => return Ok(out),
            Opcode::Branch | Opcode::Call => {
                let cond = self.condition().ok_or(ErrorKind::Condition.at(addr))?;
                out.push_str(&format!(" {cond}, "));
            }
            Opcode::Push => out.push(' '),
            _ => out.push_str(&format!(" R{:02}, ", self.reg_or_cond())),
        }

        match self.operand() {
            Operand::Immediate(value) => out.push_str(&format!("#{value}")),
            Operand::Indexed { rindex, offset } => out.push_str(&format!("{offset}[R{rindex:02}]")),
            Operand::Absolute(address) => out.push_str(&format!("@0x{address:04x}")),
        }
        Ok(out)
    }

    /// Like [`Instruction::disassemble`], naming the error kind in place of undecodable words.
    pub fn symbolic(self, addr: u32) -> String {
        self.disassemble(addr)
            .unwrap_or_else(|fault| format!("<{}>", fault.kind))
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instruction(0x{:08x})", self.0)
    }
}

impl From<Word> for Instruction {
    fn from(word: Word) -> Self {
        Instruction(word)
    }
}

impl From<Instruction> for Word {
    fn from(instr: Instruction) -> Self {
        instr.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_positions() {
        let instr = Instruction::absolute(Opcode::Load, 0xA, 0x12345);
        assert_eq!(instr.raw() & 0x3F, Opcode::Load as u32);
        assert_eq!((instr.raw() >> 8) & 0xF, 0xA);
        assert_eq!(instr.raw() >> 12, 0x12345);
        assert!(!instr.is_immediate());
        assert!(!instr.is_indexed());
    }

    #[test]
    fn test_immediate_sign_extension() {
        let instr = Instruction::immediate(Opcode::Sub, 1, -1);
        assert!(instr.is_immediate());
        assert_eq!(instr.value(), -1);
        assert_eq!(instr.address(), 0xF_FFFF);

        let min = Instruction::immediate(Opcode::Load, 0, -(1 << 19));
        assert_eq!(min.value(), -(1 << 19));
        let max = Instruction::immediate(Opcode::Load, 0, (1 << 19) - 1);
        assert_eq!(max.value(), (1 << 19) - 1);
    }

    #[test]
    fn test_indexed_fields() {
        let instr = Instruction::indexed(Opcode::Load, 1, 15, -3);
        assert!(instr.is_indexed());
        assert_eq!(instr.rindex(), 15);
        assert_eq!(instr.offset(), -3);
        assert_eq!(instr.register(), 1);
        assert_eq!(
            instr.operand(),
            Operand::Indexed {
                rindex: 15,
                offset: -3
            }
        );
    }

    #[test]
    fn test_opcode_out_of_table() {
        let instr = Instruction::from_raw(0x3F);
        assert_eq!(instr.opcode_bits(), 63);
        assert_eq!(instr.opcode(), None);
        assert_eq!(Instruction::from_raw(LAST_OPCODE as u32).opcode(), Some(Opcode::Halt));
    }

    #[test]
    fn test_condition_decode() {
        let instr = Instruction::absolute(Opcode::Branch, Condition::Le as u8, 7);
        assert_eq!(instr.condition(), Some(Condition::Le));
        let bad = Instruction::absolute(Opcode::Branch, LAST_CONDITION + 1, 7);
        assert_eq!(bad.condition(), None);
    }

    #[test]
    fn test_disassemble_forms() {
        let cases = [
            (Instruction::absolute(Opcode::Load, 0, 0), "LOAD R00, @0x0000"),
            (Instruction::immediate(Opcode::Sub, 1, 1), "SUB R01, #1"),
            (Instruction::immediate(Opcode::Add, 2, -4), "ADD R02, #-4"),
            (Instruction::indexed(Opcode::Load, 1, 15, 2), "LOAD R01, 2[R15]"),
            (Instruction::absolute(Opcode::Branch, Condition::Le as u8, 7), "BRANCH LE, @0x0007"),
            (Instruction::absolute(Opcode::Call, Condition::Nc as u8, 10), "CALL NC, @0x000a"),
            (Instruction::absolute(Opcode::Push, 0, 2), "PUSH @0x0002"),
            (Instruction::immediate(Opcode::Push, 0, 9), "PUSH #9"),
            (Instruction::generic(Opcode::Ret), "RET"),
            (Instruction::generic(Opcode::Halt), "HALT"),
            (Instruction::generic(Opcode::Nop), "NOP"),
            (Instruction::generic(Opcode::Illop), "ILLOP"),
        ];
        for (instr, expected) in cases {
            assert_eq!(instr.disassemble(0).unwrap(), expected);
        }
    }

    #[test]
    fn test_disassemble_errors() {
        let unknown = Instruction::from_raw(40);
        assert_eq!(unknown.disassemble(3), Err(ErrorKind::Unknown.at(3)));

        let bad_cond = Instruction::absolute(Opcode::Call, 9, 0);
        assert_eq!(bad_cond.disassemble(5), Err(ErrorKind::Condition.at(5)));
    }
}
