use super::*;

#[test]
fn test_if_else_chain() {
    let m = run_script(
        "let x = 2;
        if (x == 1) { emit(\"a\"); }
        else if (x == 2) { emit(\"b\"); }
        else { emit(\"c\"); }",
    );
    assert_eq!(emitted_strings(&m), ["b"]);

    let m = run_script("if (1 == 2) { emit(\"a\"); } else { emit(\"c\"); }");
    assert_eq!(emitted_strings(&m), ["c"]);

    let m = run_script("if (1 == 1) { emit(\"a\"); }");
    assert_eq!(emitted_strings(&m), ["a"]);
}

#[test]
fn test_while_loop() {
    let m = run_script("let n = 0; while (n < 3) { emit(n); n++; }");
    assert_eq!(emitted_reals(&m), [0.0, 1.0, 2.0]);
}

#[test]
fn test_counted_loops() {
    let m = run_script("loop (3) { emit(1); }");
    assert_eq!(emitted_reals(&m), [1.0, 1.0, 1.0]);

    let m = run_script("times (2) loop { emit(5); }");
    assert_eq!(emitted_reals(&m), [5.0, 5.0]);

    let m = run_script("loop (0) { emit(1); } emit(2);");
    assert_eq!(emitted_reals(&m), [2.0]);
}

#[test]
fn test_break_leaves_innermost_loop() {
    let m = run_script(
        "let n = 0;
        loop {
            n++;
            if (n > 2) { break; }
        }
        emit(n);",
    );
    assert_eq!(emitted_reals(&m), [3.0]);

    let m = run_script(
        "for (i in 0..1) {
            let n = 0;
            loop { n++; if (n == 2) { break; } }
            emit(n);
        }",
    );
    assert_eq!(emitted_reals(&m), [2.0, 2.0]);
}

#[test]
fn test_for_range_is_inclusive() {
    let m = run_script("for (x in 0..3) { emit(x); }");
    assert_eq!(emitted_reals(&m), [0.0, 1.0, 2.0, 3.0]);

    let m = run_script("for reverse (x in 0..3) { emit(x); }");
    assert_eq!(emitted_reals(&m), [3.0, 2.0, 1.0, 0.0]);
}

#[test]
fn test_for_range_with_variable_bounds() {
    let m = run_script("let lo = 1; let hi = 3; for (x in lo..hi) { emit(x); }");
    assert_eq!(emitted_reals(&m), [1.0, 2.0, 3.0]);
}

#[test]
fn test_for_over_array_walks_indexes() {
    let m = run_script("let a = [10, 20, 30]; for (i in a) { emit(a[i]); }");
    assert_eq!(emitted_reals(&m), [10.0, 20.0, 30.0]);

    let m = run_script("let a = \"\"; for (i in a) { emit(i); } emit(99);");
    assert_eq!(emitted_reals(&m), [99.0]);

    let m = run_script("let a = [7, 8]; for reverse (i in a) { emit(a[i]); }");
    assert_eq!(emitted_reals(&m), [8.0, 7.0]);
}

#[test]
fn test_events_dispatch() {
    let source = |x: i32| {
        format!(
            "let x = {x};
            events (x) =>
            on (0, 1) {{ emit(\"low\"); }}
            on (2) {{ emit(\"two\"); }}
            else {{ emit(\"other\"); }}"
        )
    };
    assert_eq!(emitted_strings(&run_script(&source(0))), ["low"]);
    assert_eq!(emitted_strings(&run_script(&source(1))), ["low"]);
    assert_eq!(emitted_strings(&run_script(&source(2))), ["two"]);
    assert_eq!(emitted_strings(&run_script(&source(9))), ["other"]);
}

#[test]
fn test_short_circuit_evaluation() {
    let m = run_script(
        "function mark(v, r) { emit(v); return r; }
        if (mark(1, false) && mark(2, true)) { emit(99); } else { emit(3); }
        if (mark(4, true) || mark(5, true)) { emit(6); }",
    );
    assert_eq!(emitted_reals(&m), [1.0, 3.0, 4.0, 6.0]);
}

#[test]
fn test_local_scope_runs_inline() {
    let m = run_script("let x = 1; local { let y = 2; emit(x + y); } emit(x);");
    assert_eq!(emitted_reals(&m), [3.0, 1.0]);
}

#[test]
fn test_yield_on_a_single_thread_is_harmless() {
    let m = run_script("emit(1); yield; emit(2);");
    assert_eq!(emitted_reals(&m), [1.0, 2.0]);
}

#[test]
fn test_exit_halts_the_machine() {
    let mut machine = machine_for("emit(1); exit; emit(2);");
    machine.run();
    assert!(!machine.has_error());
    assert!(machine.stopped());
    assert_eq!(emitted_reals(&machine), [1.0]);
}
