//! The fetch / dispatch loop.

use log::info;

use crate::error::{ErrorKind, Fault};
use crate::exec::decode_execute;
use crate::instruction::Instruction;
use crate::machine::Machine;

/// What the debug hook wants after looking at the machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebugAction {
    /// Execute the next instruction and ask again before the one after.
    Step,
    /// Stop asking for the rest of the run.
    Resume,
}

/// Consulted before each instruction is dispatched, while enabled.
///
/// Implementations may block, e.g. waiting on an operator.
pub trait DebugHook {
    fn ask(&mut self, machine: &Machine) -> DebugAction;
}

/// Per-run settings.
#[derive(Clone, Debug)]
pub struct RunOptions {
    /// Log each instruction before it executes.
    pub trace: bool,
    /// Stop after this many dispatched instructions.
    pub step_limit: Option<u64>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            trace: true,
            step_limit: None,
        }
    }
}

/// Why a run stopped without a fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum End {
    /// HALT executed at `addr`.
    Halted { addr: u32 },
    /// The step limit ran out first.
    StepLimit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Outcome {
    /// Instructions dispatched, including the last one.
    pub steps: u64,
    pub end: End,
}

/// Log an instruction with its address.
pub fn trace(msg: &str, instr: Instruction, addr: u32) {
    info!("TRACE: {msg}: 0x{addr:04x}: {}", instr.symbolic(addr));
}

/// Run `machine` from its current `pc` until HALT, a fault or the step limit.
///
/// `pc` is advanced before the instruction is dispatched, so branch targets
/// are absolute and CALL saves the address of the following instruction.
pub fn simul(
    machine: &mut Machine,
    options: &RunOptions,
    mut hook: Option<&mut dyn DebugHook>,
) -> Result<Outcome, Fault> {
    let mut steps: u64 = 0;
    loop {
        if options.step_limit.is_some_and(|limit| steps >= limit) {
            return Ok(Outcome {
                steps,
                end: End::StepLimit,
            });
        }

        let at = machine.pc;
        let instr = *machine
            .text
            .get(at as usize)
            .ok_or(ErrorKind::SegText.at(at))?;

        if options.trace {
            trace("Executing", instr, at);
        }

        let resume = match hook.as_deref_mut() {
            Some(hook) => hook.ask(machine) == DebugAction::Resume,
            None => false,
        };
        if resume {
            hook = None;
        }

        machine.pc = at.wrapping_add(1);
        steps += 1;
        if !decode_execute(machine, instr)? {
            return Ok(Outcome {
                steps,
                end: End::Halted { addr: at },
            });
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::instruction::Opcode;
    use crate::machine::SP;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn random_programs_never_panic(
            words in prop::collection::vec(any::<u32>(), 1..64),
            data in prop::collection::vec(any::<u32>(), 0..32),
            dataend in 0usize..32,
        ) {
            let text = words.into_iter().map(Instruction::from_raw).collect();
            let mut m = Machine::load(text, data, dataend);
            let options = RunOptions { trace: false, step_limit: Some(500) };
            if let Ok(outcome) = simul(&mut m, &options, None) {
                prop_assert!(outcome.steps <= 500);
            }
        }

        #[test]
        fn sp_stays_in_range(
            words in prop::collection::vec(any::<u32>(), 1..64),
            dataend in 0usize..16,
        ) {
            let text = words.into_iter().map(Instruction::from_raw).collect();
            let mut m = Machine::load(text, vec![0; 24], dataend);
            let options = RunOptions { trace: false, step_limit: Some(500) };
            let datasize = m.datasize();
            // Only the stack discipline is checked: LOAD/ADD/SUB may still write R15 directly.
            let writes_sp = m.text.iter().any(|i| {
                matches!(i.opcode(), Some(Opcode::Load | Opcode::Add | Opcode::Sub)) && i.register() == SP
            });
            let _ = simul(&mut m, &options, None);
            if !writes_sp {
                prop_assert!((m.sp() as usize) < datasize);
            }
        }
    }
}
