use super::*;

#[test]
fn test_forward_reference_compiles_and_runs() {
    let m = run_script("sub a { b(); } sub b { emit(1); } a();");
    assert_eq!(emitted_reals(&m), [1.0]);
}

#[test]
fn test_mutual_recursion() {
    let m = run_script(
        "function even(n) { if (n == 0) { return true; } return odd(n - 1); }
        function odd(n) { if (n == 0) { return false; } return even(n - 1); }
        emit(even(4));
        emit(odd(4));",
    );
    assert_eq!(emitted(&m), [Val::boolean(true), Val::boolean(false)]);
}

#[test]
fn test_recursive_function_result() {
    let m = run_script(
        "function fact(n) {
            if (n <= 1) { return 1; }
            return n * fact(n - 1);
        }
        emit(fact(5));",
    );
    assert_eq!(emitted_reals(&m), [120.0]);
}

#[test]
fn test_arguments_bind_in_declaration_order() {
    let m = run_script("function pair(a, b) { emit(a); emit(b); } pair(1, 2);");
    assert_eq!(emitted_reals(&m), [1.0, 2.0]);
}

#[test]
fn test_parameter_declaration_prefixes() {
    let m = run_script("function f(let a, real b) { return a + b; } emit(f(2, 3));");
    assert_eq!(emitted_reals(&m), [5.0]);
}

#[test]
fn test_sub_returns_early_without_value() {
    let m = run_script("sub s { emit(1); return; emit(2); } s();");
    assert_eq!(emitted_reals(&m), [1.0]);
}

#[test]
fn test_return_unwinds_through_loops() {
    let m = run_script("function f() { loop { return 7; } } emit(f());");
    assert_eq!(emitted_reals(&m), [7.0]);

    let m = run_script(
        "function g() {
            for (i in 0..9) {
                if (i == 2) { return i; }
            }
            return -1;
        }
        emit(g());",
    );
    assert_eq!(emitted_reals(&m), [2.0]);
}

#[test]
fn test_function_called_as_statement_discards_result() {
    let m = run_script("function f() { return 1; } f(); emit(9);");
    assert_eq!(emitted_reals(&m), [9.0]);
}

#[test]
fn test_nested_function_shadows_builtin_operation() {
    let m = run_script(
        "local {
            function add(a, b) { return 100; }
            emit(1 + 2);
        }
        emit(1 + 2);",
    );
    assert_eq!(emitted_reals(&m), [100.0, 3.0]);
}

#[test]
fn test_routine_declared_inside_routine() {
    let m = run_script(
        "sub outer {
            function double(n) { return n * 2; }
            emit(double(21));
        }
        outer();",
    );
    assert_eq!(emitted_reals(&m), [42.0]);
}

#[test]
fn test_string_rendering_of_results() {
    let m = run_script("function greet(name) { return \"hi \" ~ name; } emit(greet(\"ana\"));");
    assert_eq!(emitted_strings(&m), ["hi ana"]);
}
