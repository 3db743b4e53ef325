//! Interactive step debugger for the `-d` option.

use std::io::{self, BufRead, StdinLock, Stdout, Write};

use crate::machine::Machine;
use crate::simul::{DebugAction, DebugHook};

const USAGE: &str = "Available commands:
\th\thelp
\tc\tcontinue (exit interactive debug mode)
\ts\tstep by step (next instruction)
\tRET\tstep by step (next instruction)
\tr\tprint registers
\td\tprint data memory
\tt\tprint text (program) memory
\tp\tprint text (program) memory
\tm\tprint registers and data memory
";

/// Prompts on `output` and reads one-letter commands from `input`.
///
/// Only the first character of a line is looked at. End of input leaves
/// interactive mode, as `c` does.
pub struct Debugger<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Debugger<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn print(&mut self, text: &str) {
        let _ = self.output.write_all(text.as_bytes());
    }
}

impl Debugger<StdinLock<'static>, Stdout> {
    /// Debugger on the process's terminal.
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> DebugHook for Debugger<R, W> {
    fn ask(&mut self, machine: &Machine) -> DebugAction {
        loop {
            self.print("DEBUG? ");
            let _ = self.output.flush();

            let mut line = String::new();
            match self.input.read_line(&mut line) {
                Ok(0) | Err(_) => {
                    self.print("\n");
                    return DebugAction::Resume;
                }
                Ok(_) => {}
            }

            match line.trim().chars().next() {
                None | Some('s') => return DebugAction::Step,
                Some('c') => return DebugAction::Resume,
                Some('h') => self.print(USAGE),
                Some('r') => self.print(&machine.cpu_listing()),
                Some('d') => self.print(&machine.data_listing()),
                Some('t' | 'p') => self.print(&machine.program_listing()),
                Some('m') => {
                    self.print(&machine.cpu_listing());
                    self.print(&machine.data_listing());
                }
                Some(_) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::programs;
    use crate::simul::{RunOptions, simul};

    fn debugger(script: &str) -> Debugger<&[u8], Vec<u8>> {
        Debugger::new(script.as_bytes(), Vec::new())
    }

    fn output(d: Debugger<&[u8], Vec<u8>>) -> String {
        String::from_utf8(d.into_output()).unwrap()
    }

    #[test]
    fn test_empty_line_steps() {
        let m = programs::simple();
        let mut d = debugger("\n");
        assert_eq!(d.ask(&m), DebugAction::Step);
        assert_eq!(output(d), "DEBUG? ");
    }

    #[test]
    fn test_step_and_continue() {
        let m = programs::simple();
        let mut d = debugger("s\nc\n");
        assert_eq!(d.ask(&m), DebugAction::Step);
        assert_eq!(d.ask(&m), DebugAction::Resume);
    }

    #[test]
    fn test_eof_resumes() {
        let m = programs::simple();
        let mut d = debugger("");
        assert_eq!(d.ask(&m), DebugAction::Resume);
    }

    #[test]
    fn test_print_commands_then_step() {
        let m = programs::simple();
        let mut d = debugger("h\nr\nd\nt\nx\n\n");
        assert_eq!(d.ask(&m), DebugAction::Step);
        let out = output(d);
        assert!(out.contains("Available commands:"));
        assert!(out.contains("*** CPU ***"));
        assert!(out.contains("*** DATA"));
        assert!(out.contains("*** PROGRAM"));
        assert_eq!(out.matches("DEBUG? ").count(), 6);
    }

    #[test]
    fn test_memory_command() {
        let m = programs::simple();
        let mut d = debugger("m\ns\n");
        assert_eq!(d.ask(&m), DebugAction::Step);
        let out = output(d);
        assert!(out.contains("*** CPU ***"));
        assert!(out.contains("*** DATA"));
    }

    #[test]
    fn test_drives_a_run() {
        let mut m = programs::simple();
        let mut d = debugger("s\ns\nc\n");
        let options = RunOptions {
            trace: false,
            step_limit: None,
        };
        simul(&mut m, &options, Some(&mut d)).unwrap();
        assert_eq!(m.data[2], 50);
        assert_eq!(output(d).matches("DEBUG? ").count(), 3);
    }
}
