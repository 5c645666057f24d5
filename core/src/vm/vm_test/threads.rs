use super::*;

#[test]
fn test_spawn_adjacent_round_robin_interleaving() {
    // Both tasks are spawned before either reaches its yield. A full round
    // visits every live thread once; the later spawn sits closer to the
    // spawner, so the a/b order repeats across rounds.
    let m = run_script(
        "task a() { emit(1); yield; emit(2); }
        task b() { emit(3); yield; emit(4); }
        a();
        b();
        loop (4) { yield; }",
    );
    assert_eq!(emitted_reals(&m), [1.0, 3.0, 2.0, 4.0]);
}

#[test]
fn test_task_arguments_are_seeded_at_spawn() {
    let m = run_script("task t(v) { emit(v); } t(42); loop (2) { yield; }");
    assert_eq!(emitted_reals(&m), [42.0]);
}

#[test]
fn test_spawner_continues_without_waiting() {
    // The spawned thread runs first (it sits after the spawner in the
    // schedule), parks on its yield, and the main thread proceeds.
    let m = run_script(
        "task t() { emit(1); yield; emit(3); }
        t();
        emit(2);
        yield;
        emit(4);",
    );
    assert_eq!(emitted_reals(&m), [1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn test_task_loops_cooperatively() {
    let m = run_script(
        "task t() { loop { emit(1); yield; } }
        t();
        yield;
        emit(0);",
    );
    assert_eq!(emitted_reals(&m), [1.0, 1.0, 0.0]);
}

#[test]
fn test_finished_task_is_removed_from_the_schedule() {
    // After t ends, main's yields have no other thread to visit.
    let m = run_script(
        "task t() { emit(1); }
        t();
        yield;
        yield;
        emit(2);",
    );
    assert_eq!(emitted_reals(&m), [1.0, 2.0]);
}

#[test]
fn test_tasks_share_values_through_the_frame_chain() {
    let m = run_script(
        "let n = 0;
        task bump() { n += 10; yield; n += 100; }
        bump();
        emit(n);
        yield;
        emit(n);",
    );
    assert_eq!(emitted_reals(&m), [10.0, 110.0]);
}

#[test]
fn test_main_finishing_abandons_live_tasks() {
    let m = run_script(
        "task t() { emit(1); yield; emit(2); yield; emit(3); }
        t();
        yield;
        emit(0);",
    );
    // t's third emit never runs: the machine finishes with main.
    assert_eq!(emitted_reals(&m), [1.0, 2.0, 0.0]);
}
