//! Value semantics observed through scripts: copy-on-write sharing, the
//! type discipline on assignment, and the operation table.

use super::*;

#[test]
fn test_copy_on_write_isolation() {
    let m = run_script("let a = [1, 2]; let b = a; b[0] = 5; emit(a[0]); emit(b[0]);");
    assert_eq!(emitted_reals(&m), [1.0, 5.0]);
}

#[test]
fn test_slice_is_independent_of_later_mutation() {
    let m = run_script("let a = \"abcd\"; let s = a[1..3]; a[0] = 'z'; emit(s); emit(a);");
    assert_eq!(emitted_strings(&m), ["bc", "zbcd"]);
}

#[test]
fn test_slice_length_and_bounds() {
    let m = run_script("let a = [1, 2, 3, 4]; emit(length(a[1..3])); emit(a[0..0]);");
    assert_eq!(emitted_strings(&m), ["2", "[]"]);

    let m = run_script_err("let a = [1, 2]; let s = a[1..5];");
    assert_eq!(m.error_message(), "the slice range exceeds the array");
}

#[test]
fn test_compare_total_order() {
    let m = run_script(
        "emit(compare(\"12\", \"123\"));
        emit(compare(\"123\", \"12\"));
        emit(compare(\"abc\", \"abc\"));",
    );
    assert_eq!(emitted_reals(&m), [-1.0, 1.0, 0.0]);
}

#[test]
fn test_compare_rejects_mixed_types() {
    let m = run_script_err("let x = compare(1, \"a\");");
    assert_eq!(
        m.error_message(),
        "an attempt was made to compare values of different types"
    );
}

#[test]
fn test_comparison_operators() {
    let m = run_script("emit(2 < 3); emit(\"ab\" < \"b\"); emit(3 >= 3); emit(1 != 2);");
    assert_eq!(
        emitted(&m),
        [
            Val::boolean(true),
            Val::boolean(true),
            Val::boolean(true),
            Val::boolean(true)
        ]
    );
}

#[test]
fn test_assignment_may_not_change_type() {
    let m = run_script_err("let x = 1; x = 'a';");
    assert_eq!(m.error_message(), "the assignment would change the variable's type");

    let m = run_script_err("let x = true(); x = 0;");
    assert_eq!(m.error_message(), "the assignment would change the variable's type");
}

#[test]
fn test_empty_array_adopts_element_type() {
    let m = run_script("let a = []; a = [1, 2]; emit(a[1]);");
    assert_eq!(emitted_reals(&m), [2.0]);

    // Once populated, the element type is fixed.
    let m = run_script_err("let a = [1]; a = [\"x\"];");
    assert_eq!(m.error_message(), "the assignment would change the variable's type");
}

#[test]
fn test_indexed_store_keeps_element_type() {
    let m = run_script_err("let a = [1, 2]; a[0] = 'c';");
    assert_eq!(m.error_message(), "the assignment would change the variable's type");
}

#[test]
fn test_uninitialized_read_is_fatal() {
    let m = run_script_err("let x; let y = x + 1;");
    assert_eq!(m.error_message(), "an uninitialized variable was used");
}

#[test]
fn test_index_errors() {
    let m = run_script_err("let a = [1]; emit(a[2]);");
    assert_eq!(m.error_message(), "the array index is out of range");

    let m = run_script_err("let a = [1, 2]; emit(a[0.5]);");
    assert_eq!(m.error_message(), "the array index has a fractional part");

    let m = run_script_err("let n = 5; emit(n[0]);");
    assert_eq!(m.error_message(), "cannot index a non-array value");
}

#[test]
fn test_string_concatenation() {
    let m = run_script("emit(\"foo\" ~ \"bar\"); emit(1 ~ \"x\"); emit(length(\"abc\"));");
    assert_eq!(emitted_strings(&m), ["foobar", "1x", "3"]);
}

#[test]
fn test_adjacent_literals_concatenate() {
    let m = run_script("emit(\"a\" \"b\" 'c'); emit(\"x\\ty\");");
    assert_eq!(emitted_strings(&m), ["abc", "x\ty"]);
}

#[test]
fn test_compound_assignment_and_steps() {
    let m = run_script("let n = 3; n += 2; n *= 2; n--; emit(n);");
    assert_eq!(emitted_reals(&m), [9.0]);

    let m = run_script("let s = \"a\"; s ~= \"b\"; emit(s);");
    assert_eq!(emitted_strings(&m), ["ab"]);
}

#[test]
fn test_arithmetic_precedence() {
    let m = run_script("emit(1 + 2 * 3); emit((1 + 2) * 3); emit(7 % 4); emit(2 ^ 3 ^ 2);");
    assert_eq!(emitted_reals(&m), [7.0, 9.0, 3.0, 512.0]);
}

#[test]
fn test_unary_and_absolute_value() {
    let m = run_script("emit(-3 + 1); emit(!false()); emit((|2 - 7|));");
    assert_eq!(emitted_strings(&m), ["-2", "true", "5"]);
}

#[test]
fn test_array_arithmetic_is_elementwise() {
    let m = run_script("emit([1, 2] + [10, 20]); emit([5, 6] - [1, 2]);");
    assert_eq!(emitted_strings(&m), ["[11,22]", "[4,4]"]);

    let m = run_script_err("let x = [1] + [1, 2];");
    assert_eq!(
        m.error_message(),
        "cannot apply arithmetic to arrays of different lengths"
    );
}

#[test]
fn test_append_and_erase_operations() {
    let m = run_script("let a = [1, 2, 3]; emit(erase(a, 1)); emit(append(a, 4)); emit(a);");
    assert_eq!(emitted_strings(&m), ["[1,3]", "[1,2,3,4]", "[1,2,3]"]);

    let m = run_script_err("let a = [1]; let b = append(a, 'c');");
    assert_eq!(
        m.error_message(),
        "the appended value does not match the array's element type"
    );
}

#[test]
fn test_numeric_builtins() {
    let m = run_script(
        "emit(round(1.5)); emit(trunc(-1.7)); emit(ceil(1.2)); emit(floor(-1.2)); emit(absolute(-3));",
    );
    assert_eq!(emitted_reals(&m), [2.0, -1.0, 2.0, -2.0, 3.0]);
}

#[test]
fn test_loop_count_must_be_a_number() {
    let m = run_script_err("loop (\"x\") { emit(1); }");
    assert_eq!(m.error_message(), "the loop count must be a number");
    assert!(emitted(&m).is_empty());
}

#[test]
fn test_nested_array_copy_on_write() {
    let m = run_script(
        "let grid = [[1, 2], [3, 4]];
        let row = grid[0];
        row[1] = 9;
        emit(grid[0]);
        emit(row);",
    );
    assert_eq!(emitted_strings(&m), ["[1,2]", "[1,9]"]);
}
