//! Script scenarios shared by the criterion benches.

use std::sync::Arc;

use anyhow::{Result, bail};

use crate::vm::{ScriptMachine, ScriptProgram};

pub struct Scenario {
    pub name: &'static str,
    pub source: &'static str,
}

pub fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            name: "count_loop",
            source: "let n = 0; loop (1000) { n += 1; }",
        },
        Scenario {
            name: "fib_recursive",
            source: "function fib(n) {
                if (n < 2) { return n; }
                return fib(n - 1) + fib(n - 2);
            }
            let r = fib(15);",
        },
        Scenario {
            name: "string_build",
            source: "let s = \"\"; loop (100) { s = s ~ \"ab\"; }",
        },
        Scenario {
            name: "microthreads",
            source: "let n = 0;
            task worker(rounds) {
                loop (rounds) { n += 1; yield; }
            }
            worker(50); worker(50);
            loop (120) { yield; }",
        },
    ]
}

pub fn run_scenario(scenario: &Scenario) -> Result<ScriptMachine> {
    let program = Arc::new(ScriptProgram::compile(scenario.source, &[]));
    if program.has_error() {
        bail!(
            "scenario {} failed to compile: line {}: {}",
            scenario.name,
            program.error_line(),
            program.error_message()
        );
    }
    let mut machine = ScriptMachine::new(program);
    machine.run();
    if machine.has_error() {
        bail!(
            "scenario {} failed: line {}: {}",
            scenario.name,
            machine.error_line(),
            machine.error_message()
        );
    }
    Ok(machine)
}
