pub mod error;
pub mod instruction;
pub mod machine;
pub mod exec;
pub mod simul;
pub mod debug;
pub mod program;
pub mod programs;
