use std::path::PathBuf;
use std::process;

use clap::{Parser, ValueEnum};
use minisim::debug::Debugger;
use minisim::machine::Machine;
use minisim::program;
use minisim::programs;
use minisim::simul::{DebugHook, End, RunOptions, simul};

#[derive(Parser)]
#[command(name = "minisim", about = "Simulator for a small word-addressed processor")]
struct Cli {
    /// Debug mode (interactive execution).
    #[arg(short = 'd')]
    debug: bool,

    /// Binary program file to run instead of the built-in example.
    #[arg(short = 'b', value_name = "FILE")]
    binfile: Option<PathBuf>,

    /// Do not execute; just display the listing.
    #[arg(short = 'l')]
    list: bool,

    /// Built-in program used when no binary file is given.
    #[arg(long, value_enum, default_value_t = Example::Simple)]
    example: Example,

    /// Also save the loaded program in binary format to this file.
    #[arg(long, value_name = "FILE")]
    dump: Option<PathBuf>,

    /// Stop after this many instructions.
    #[arg(long)]
    step_limit: Option<u64>,

    /// Do not trace each instruction.
    #[arg(long)]
    no_trace: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Example {
    Simple,
    Subroutine,
}

fn load(cli: &Cli) -> Machine {
    let Some(path) = &cli.binfile else {
        return match cli.example {
            Example::Simple => programs::simple(),
            Example::Subroutine => programs::subroutine(),
        };
    };
    match program::read_program(path) {
        Ok(machine) => machine,
        Err(e) => {
            eprintln!("{}: {e}", path.display());
            process::exit(1);
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut machine = load(&cli);

    if let Some(path) = &cli.dump {
        println!("\n*** Saving program and initial data in binary format ***\n");
        print!("{}", program::hex_dump(&machine));
        if let Err(e) = program::save_program(&machine, path) {
            eprintln!("{}: {e}", path.display());
            process::exit(1);
        }
    }

    println!("\n*** Machine state before execution ***");
    print!("{}", machine.program_listing());
    print!("{}", machine.data_listing());
    print!("{}", machine.cpu_listing());

    if cli.list {
        return;
    }

    println!("\n*** Execution trace ***\n");
    let options = RunOptions {
        trace: !cli.no_trace,
        step_limit: cli.step_limit,
    };
    let mut debugger = Debugger::stdio();
    let hook: Option<&mut dyn DebugHook> = if cli.debug { Some(&mut debugger) } else { None };

    match simul(&mut machine, &options, hook) {
        Ok(outcome) => {
            match outcome.end {
                End::Halted { .. } => println!("\nNormal termination after {} instructions", outcome.steps),
                End::StepLimit => println!("\nStep limit reached after {} instructions", outcome.steps),
            }
            println!("\n*** Machine state after execution ***");
            print!("{}", machine.cpu_listing());
            print!("{}", machine.data_listing());
        }
        Err(fault) => {
            eprintln!("{fault}");
            drop(machine);
            process::exit(1);
        }
    }
}
