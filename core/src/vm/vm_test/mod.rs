use std::sync::Arc;

use crate::ops::NativeFunction;
use crate::val::Val;
use crate::vm::{ScriptMachine, ScriptProgram};

fn emit(machine: &mut ScriptMachine, args: &[Val]) -> Val {
    let value = args[0].clone();
    if let Some(log) = machine.host_data_mut::<Vec<Val>>() {
        log.push(value);
    }
    Val::default()
}

/// Stops the machine once, then records its re-execution on resume.
fn wait(machine: &mut ScriptMachine, _args: &[Val]) -> Val {
    if machine.resuming() {
        if let Some(log) = machine.host_data_mut::<Vec<Val>>() {
            log.push(Val::string("resumed"));
        }
    } else {
        machine.stop();
    }
    Val::default()
}

pub(super) const HOST: &[NativeFunction] = &[
    NativeFunction { name: "emit", func: emit, arity: 1 },
    NativeFunction { name: "wait", func: wait, arity: 0 },
];

pub(super) fn compile(source: &str) -> Arc<ScriptProgram> {
    let program = ScriptProgram::compile(source, HOST);
    assert!(
        !program.has_error(),
        "compile failed: line {}: {}",
        program.error_line(),
        program.error_message()
    );
    Arc::new(program)
}

pub(super) fn machine_for(source: &str) -> ScriptMachine {
    let mut machine = ScriptMachine::new(compile(source));
    machine.set_host_data(Box::new(Vec::<Val>::new()));
    machine
}

pub(super) fn run_script(source: &str) -> ScriptMachine {
    let mut machine = machine_for(source);
    machine.run();
    assert!(
        !machine.has_error(),
        "script failed: line {}: {}",
        machine.error_line(),
        machine.error_message()
    );
    machine
}

pub(super) fn run_script_err(source: &str) -> ScriptMachine {
    let mut machine = machine_for(source);
    machine.run();
    assert!(machine.has_error(), "expected a runtime error");
    machine
}

pub(super) fn emitted(machine: &ScriptMachine) -> &[Val] {
    machine.host_data::<Vec<Val>>().expect("host log")
}

pub(super) fn emitted_reals(machine: &ScriptMachine) -> Vec<f64> {
    emitted(machine).iter().map(Val::as_real).collect()
}

pub(super) fn emitted_strings(machine: &ScriptMachine) -> Vec<String> {
    emitted(machine).iter().map(Val::as_string).collect()
}

mod control_flow;
mod driving;
mod functions;
mod semantics;
mod threads;
