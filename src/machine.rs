use std::fmt::Write;

use log::warn;

use crate::error::{Warning, WarningReport};
use crate::instruction::{Instruction, Word};

/// Number of general registers.
pub const NREGISTERS: usize = 16;

/// Register aliased as the stack pointer.
pub const SP: usize = NREGISTERS - 1;

/// Minimum number of words between the end of static data and the end of the data segment.
pub const MINSTACKSIZE: usize = 10;

/// Sign of the last value written back by LOAD, ADD or SUB.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ConditionCode {
    /// Nothing computed yet. Only ever set by a fresh load.
    #[default]
    Unknown,
    Zero,
    Positive,
    Negative,
}

impl ConditionCode {
    /// Condition code for a result, read as a signed word.
    pub fn of(value: Word) -> Self {
        match (value as i32).signum() {
            -1 => ConditionCode::Negative,
            0 => ConditionCode::Zero,
            _ => ConditionCode::Positive,
        }
    }

    pub fn letter(self) -> char {
        match self {
            ConditionCode::Unknown => 'U',
            ConditionCode::Zero => 'Z',
            ConditionCode::Positive => 'P',
            ConditionCode::Negative => 'N',
        }
    }
}

/// Processor registers and the two memory segments.
///
/// Addresses are word indices and each segment starts at 0. The data segment
/// holds static data in `[0, dataend)` and the execution stack above it,
/// growing down from the last word. Register 15 is the stack pointer and
/// always designates the next free stack slot.
#[derive(Clone, Debug)]
pub struct Machine {
    /// Instructions. Never written during execution.
    pub text: Vec<Instruction>,
    pub data: Vec<Word>,
    /// First address past the static data.
    pub dataend: usize,
    pub pc: u32,
    pub cc: ConditionCode,
    pub registers: [Word; NREGISTERS],
    /// Warnings raised so far, in order.
    pub warnings: Vec<WarningReport>,
}

impl Machine {
    /// Build a machine ready to run `text` against `data`.
    ///
    /// The data segment is grown with zero words if it leaves fewer than
    /// [`MINSTACKSIZE`] words above `dataend`.
    pub fn load(text: Vec<Instruction>, mut data: Vec<Word>, dataend: usize) -> Self {
        let min_size = dataend + MINSTACKSIZE;
        if data.len() < min_size {
            data.resize(min_size, 0);
        }
        let mut registers = [0; NREGISTERS];
        registers[SP] = (data.len() - 1) as Word;
        Machine {
            text,
            data,
            dataend,
            pc: 0,
            cc: ConditionCode::Unknown,
            registers,
            warnings: Vec::new(),
        }
    }

    pub fn textsize(&self) -> usize {
        self.text.len()
    }

    pub fn datasize(&self) -> usize {
        self.data.len()
    }

    pub fn sp(&self) -> Word {
        self.registers[SP]
    }

    pub fn set_sp(&mut self, sp: Word) {
        self.registers[SP] = sp;
    }

    /// Set CC from the sign of `value`.
    pub fn set_cc(&mut self, value: Word) {
        self.cc = ConditionCode::of(value);
    }

    /// Log a warning and keep a record of it.
    pub fn warn(&mut self, warning: Warning, addr: u32) {
        let report = WarningReport { warning, addr };
        warn!("{report}");
        self.warnings.push(report);
    }

    /// Text segment, one instruction per line with its address, raw word and disassembly.
    pub fn program_listing(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "*** PROGRAM (size: {}) ***", self.textsize());
        for (addr, instr) in self.text.iter().enumerate() {
            let symbolic = instr.symbolic(addr as u32);
            let _ = writeln!(out, "0x{addr:04x}: 0x{:08x}\t {symbolic}", instr.raw());
        }
        out
    }

    /// Data segment, three words per line in hex and decimal.
    pub fn data_listing(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "*** DATA (size: {}, end = 0x{:08x} ({})) ***",
            self.datasize(),
            self.dataend,
            self.dataend
        );
        for (addr, word) in self.data.iter().enumerate() {
            let _ = write!(out, "0x{addr:04x}: 0x{word:08x} {:<10}", *word as i32);
            out.push(if addr % 3 == 2 { '\n' } else { '\t' });
        }
        if self.datasize() % 3 != 0 {
            out.push('\n');
        }
        out
    }

    /// Program counter, condition code and registers.
    pub fn cpu_listing(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "*** CPU ***");
        let _ = writeln!(out, "PC:  0x{:08x}   CC: {}", self.pc, self.cc.letter());
        out.push('\n');
        for (r, word) in self.registers.iter().enumerate() {
            let _ = write!(out, "R{r:02}: 0x{word:08x} {:<10}", *word as i32);
            out.push(if r % 3 == 2 { '\n' } else { '\t' });
        }
        if NREGISTERS % 3 != 0 {
            out.push('\n');
        }
        out
    }
}
