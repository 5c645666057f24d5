//! Weft: an embeddable scripting language with a cooperative bytecode VM.
//!
//! A host compiles source text together with a table of native functions
//! into a [`vm::ScriptProgram`], then drives the result with a
//! [`vm::ScriptMachine`]: `run()` to execute the top level, `call(name)` to
//! invoke a declared `@event`, `resume()` to continue after a native
//! requested a stop. Script values are copy-on-write handles ([`val::Val`])
//! shared freely between the machine's cooperative microthreads.

pub mod ops;
pub mod perf;
pub mod token;
pub mod util;
pub mod val;
pub mod vm;
