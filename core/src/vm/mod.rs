//! Bytecode subsystem: the instruction set, the recursive-descent compiler
//! that emits it, and the cooperative machine that executes it.

mod bytecode;
mod compiler;
mod machine;
mod program;

pub use bytecode::{Block, BlockId, BlockKind, Instr, Op};
pub use machine::ScriptMachine;
pub use program::ScriptProgram;

#[cfg(test)]
mod vm_test;
