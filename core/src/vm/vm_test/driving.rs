//! Host-facing driving surface: run/resume/call, stop semantics, events,
//! diagnostics.

use super::*;

#[test]
fn test_run_is_idempotent_once_started() {
    let mut machine = machine_for("emit(1);");
    machine.run();
    machine.run();
    assert_eq!(emitted_reals(&machine), [1.0]);
    assert!(machine.finished());
}

#[test]
fn test_empty_program_finishes_cleanly() {
    let mut machine = ScriptMachine::new(compile(""));
    machine.run();
    assert!(machine.finished());
    assert!(!machine.has_error());
    assert!(!machine.stopped());
}

#[test]
fn test_native_stop_and_resume() {
    let mut machine = machine_for("emit(1); wait(); emit(2);");
    machine.run();
    assert!(machine.stopped());
    assert!(machine.finished());
    assert_eq!(emitted_reals(&machine), [1.0]);
    // The instruction pointer was rewound onto the interrupted call.
    assert_eq!(machine.current_line(), 1);

    // The interrupted native re-executes with the resuming flag set.
    machine.resume();
    assert!(!machine.stopped());
    assert_eq!(emitted_strings(&machine), ["1", "resumed", "2"]);
}

#[test]
fn test_event_calls_run_synchronously_and_repeat() {
    let mut machine = machine_for("@boom { emit(9); } emit(1);");
    assert!(machine.has_event("boom"));
    assert!(!machine.has_event("missing"));

    machine.call("boom");
    assert_eq!(emitted_reals(&machine), [1.0, 9.0]);

    machine.call("boom");
    assert_eq!(emitted_reals(&machine), [1.0, 9.0, 9.0]);

    // An unknown event is a quiet no-op.
    machine.call("missing");
    assert_eq!(emitted_reals(&machine), [1.0, 9.0, 9.0]);
}

#[test]
fn test_event_with_control_flow() {
    let mut machine = machine_for(
        "let hits = 0;
        @tick {
            hits++;
            if (hits == 2) { emit(hits); }
        }",
    );
    machine.call("tick");
    machine.call("tick");
    machine.call("tick");
    assert_eq!(emitted_reals(&machine), [2.0]);
}

#[test]
fn test_runtime_error_reports_line_and_finishes() {
    let machine = run_script_err("let x = 1;\nx = 'a';");
    assert_eq!(machine.error_message(), "the assignment would change the variable's type");
    assert_eq!(machine.error_line(), 2);
    assert!(machine.finished());
}

#[test]
fn test_error_in_event_call() {
    let mut machine = machine_for("@bad { let y; emit(y); }");
    machine.call("bad");
    assert!(machine.has_error());
    assert_eq!(machine.error_message(), "an uninitialized variable was used");
}

#[test]
fn test_host_assert_failure_is_fatal() {
    let machine = run_script_err("assert(1 == 2, \"one is not two\");");
    assert_eq!(machine.error_message(), "one is not two");

    let machine = run_script("assert(1 == 1, \"fine\"); emit(1);");
    assert_eq!(emitted_reals(&machine), [1.0]);
}

#[test]
fn test_program_accessors() {
    let program = compile("@a { } @b { } emit(0);");
    let mut names: Vec<&str> = program.event_names().collect();
    names.sort_unstable();
    assert_eq!(names, ["a", "b"]);
    assert!(!program.blocks().is_empty());
}
