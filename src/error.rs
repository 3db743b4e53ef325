use std::fmt;

use thiserror::Error;

/// The kinds of fatal error a simulated program can run into.
///
/// All of them stop the simulation. The execution loop is the only place
/// that turns one into process termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Opcode outside the instruction table, found while disassembling.
    Unknown,
    /// ILLOP executed, or an opcode out of range reached the dispatcher.
    Illegal,
    /// Branch condition out of range, or tested while CC is unknown.
    Condition,
    /// Immediate addressing on an instruction that forbids it.
    Immediate,
    /// Program counter outside the text segment.
    SegText,
    /// Data address outside the data segment.
    SegData,
    /// Stack pointer outside the data segment.
    SegStack,
}

impl ErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Unknown => "UNKNOWN",
            ErrorKind::Illegal => "ILLEGAL",
            ErrorKind::Condition => "CONDITION",
            ErrorKind::Immediate => "IMMEDIATE",
            ErrorKind::SegText => "SEGTEXT",
            ErrorKind::SegData => "SEGDATA",
            ErrorKind::SegStack => "SEGSTACK",
        }
    }

    /// Attach the address of the faulting instruction.
    pub fn at(self, addr: u32) -> Fault {
        Fault { kind: self, addr }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fatal error together with the text address of the instruction that raised it.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("ERROR: {kind} reached at address 0x{addr:x}")]
pub struct Fault {
    pub kind: ErrorKind,
    pub addr: u32,
}

/// Informational conditions. Execution carries on (or ends normally on HALT).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Warning {
    Halt,
    PushStatic,
}

impl Warning {
    pub fn name(self) -> &'static str {
        match self {
            Warning::Halt => "HALT",
            Warning::PushStatic => "PUSH_STATIC",
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A warning raised at a given text address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarningReport {
    pub warning: Warning,
    pub addr: u32,
}

impl fmt::Display for WarningReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WARNING: {} reached at address 0x{:x}", self.warning, self.addr)
    }
}

/// Errors surfaced while reading or writing a binary program file.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("program file too short for its header: {0} bytes")]
    MissingHeader(usize),
    #[error("program file holds {actual} bytes, header announces {expected}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("static data end {dataend} lies past the data segment ({datasize} words)")]
    DataEnd { dataend: u32, datasize: u32 },
    #[error("segment sizes overflow the address space (text {textsize}, data {datasize})")]
    TooLarge { textsize: u32, datasize: u32 },
}
