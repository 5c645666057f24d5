//! The builtin operation table.
//!
//! Operators are not special-cased in the bytecode: `a + b` compiles to a
//! call of the `add` block resolved through ordinary identifier scope, so
//! every entry here is a plain native function that a host table (or a
//! nested user function) can override.

use crate::val::{Type, TypeKind, Val, types};
use crate::vm::ScriptMachine;

/// A host-callable: receives the running machine and the call's arguments,
/// returns a value (possibly "no value"). It may raise the machine's fatal
/// error or request a stop.
pub type NativeFn = fn(&mut ScriptMachine, &[Val]) -> Val;

/// One entry of a native function table: name, callable, declared arity.
#[derive(Clone, Copy)]
pub struct NativeFunction {
    pub name: &'static str,
    pub func: NativeFn,
    pub arity: usize,
}

pub const OPERATIONS: &[NativeFunction] = &[
    NativeFunction { name: "true", func: true_, arity: 0 },
    NativeFunction { name: "false", func: false_, arity: 0 },
    NativeFunction { name: "pi", func: pi, arity: 0 },
    NativeFunction { name: "length", func: length, arity: 1 },
    NativeFunction { name: "not", func: not_, arity: 1 },
    NativeFunction { name: "negative", func: negative, arity: 1 },
    NativeFunction { name: "predecessor", func: predecessor, arity: 1 },
    NativeFunction { name: "successor", func: successor, arity: 1 },
    NativeFunction { name: "round", func: round, arity: 1 },
    NativeFunction { name: "trunc", func: truncate, arity: 1 },
    NativeFunction { name: "truncate", func: truncate, arity: 1 },
    NativeFunction { name: "ceil", func: ceil, arity: 1 },
    NativeFunction { name: "floor", func: floor, arity: 1 },
    NativeFunction { name: "absolute", func: absolute, arity: 1 },
    NativeFunction { name: "add", func: add, arity: 2 },
    NativeFunction { name: "subtract", func: subtract, arity: 2 },
    NativeFunction { name: "multiply", func: multiply, arity: 2 },
    NativeFunction { name: "divide", func: divide, arity: 2 },
    NativeFunction { name: "remainder", func: remainder, arity: 2 },
    NativeFunction { name: "power", func: power, arity: 2 },
    NativeFunction { name: "index", func: index, arity: 2 },
    NativeFunction { name: "slice", func: slice, arity: 3 },
    NativeFunction { name: "erase", func: erase, arity: 2 },
    NativeFunction { name: "append", func: append, arity: 2 },
    NativeFunction { name: "concatenate", func: concatenate, arity: 2 },
    NativeFunction { name: "compare", func: compare, arity: 2 },
    NativeFunction { name: "assert", func: assert_, arity: 2 },
];

/// Apply a numeric binary op, or recurse elementwise when the left side is
/// an array (`add`/`subtract` accept same-type, same-length arrays).
fn elementwise(
    machine: &mut ScriptMachine,
    args: &[Val],
    op: NativeFn,
    scalar: fn(f64, f64) -> f64,
) -> Val {
    debug_assert_eq!(args.len(), 2);
    if args[0].kind() == Some(TypeKind::Array) {
        if args[0].ty() != args[1].ty() {
            machine.raise_error("cannot apply arithmetic to arrays of different types");
            return Val::default();
        }
        if args[0].length_as_array() != args[1].length_as_array() {
            machine.raise_error("cannot apply arithmetic to arrays of different lengths");
            return Val::default();
        }
        let Some(ty) = args[1].ty() else {
            return Val::default();
        };
        let mut result = Val::default();
        for i in 0..args[1].length_as_array() {
            let pair = [args[0].index_as_array(i), args[1].index_as_array(i)];
            let element = op(machine, &pair);
            if machine.has_error() {
                return Val::default();
            }
            result.append(ty, element);
        }
        result
    } else {
        Val::real(scalar(args[0].as_real(), args[1].as_real()))
    }
}

fn add(machine: &mut ScriptMachine, args: &[Val]) -> Val {
    elementwise(machine, args, add, |a, b| a + b)
}

fn subtract(machine: &mut ScriptMachine, args: &[Val]) -> Val {
    elementwise(machine, args, subtract, |a, b| a - b)
}

fn multiply(_machine: &mut ScriptMachine, args: &[Val]) -> Val {
    Val::real(args[0].as_real() * args[1].as_real())
}

fn divide(_machine: &mut ScriptMachine, args: &[Val]) -> Val {
    Val::real(args[0].as_real() / args[1].as_real())
}

fn remainder(_machine: &mut ScriptMachine, args: &[Val]) -> Val {
    Val::real(args[0].as_real() % args[1].as_real())
}

fn negative(_machine: &mut ScriptMachine, args: &[Val]) -> Val {
    Val::real(-args[0].as_real())
}

fn power(_machine: &mut ScriptMachine, args: &[Val]) -> Val {
    Val::real(args[0].as_real().powf(args[1].as_real()))
}

/// Three-way total order: 0 for equal, -1/+1 otherwise. Arrays compare
/// elementwise with length as the tiebreaker ("12" < "123"). Comparing
/// values of different types is a fatal error.
fn compare(machine: &mut ScriptMachine, args: &[Val]) -> Val {
    debug_assert_eq!(args.len(), 2);
    let (Some(left), Some(right)) = (args[0].ty(), args[1].ty()) else {
        machine.raise_error("an attempt was made to compare values of different types");
        return Val::default();
    };
    if left != right {
        machine.raise_error("an attempt was made to compare values of different types");
        return Val::default();
    }
    let ordering: i32 = match left.kind() {
        TypeKind::Real => three_way(args[0].as_real(), args[1].as_real()),
        TypeKind::Char => three_way(args[0].as_char(), args[1].as_char()),
        TypeKind::Boolean => three_way(args[0].as_boolean(), args[1].as_boolean()),
        TypeKind::Array => {
            let left_len = args[0].length_as_array();
            let right_len = args[1].length_as_array();
            let mut r = 0;
            for i in 0..left_len {
                if i >= right_len {
                    r = 1;
                    break;
                }
                let pair = [args[0].index_as_array(i), args[1].index_as_array(i)];
                r = compare(machine, &pair).as_real() as i32;
                if machine.has_error() {
                    return Val::default();
                }
                if r != 0 {
                    break;
                }
            }
            if r == 0 && left_len < right_len {
                r = -1;
            }
            r
        }
        TypeKind::Object => {
            machine.raise_error("objects cannot be ordered");
            return Val::default();
        }
    };
    Val::real(ordering as f64)
}

fn three_way<T: PartialOrd>(a: T, b: T) -> i32 {
    if a == b {
        0
    } else if a < b {
        -1
    } else {
        1
    }
}

fn predecessor(machine: &mut ScriptMachine, args: &[Val]) -> Val {
    debug_assert_eq!(args.len(), 1);
    match args[0].kind() {
        Some(TypeKind::Real) => Val::real(args[0].as_real() - 1.0),
        Some(TypeKind::Char) => {
            Val::character(char::from_u32((args[0].as_char() as u32).wrapping_sub(1)).unwrap_or('\0'))
        }
        Some(TypeKind::Boolean) => Val::boolean(false),
        _ => {
            machine.raise_error("the predecessor of this type cannot be taken");
            Val::default()
        }
    }
}

fn successor(machine: &mut ScriptMachine, args: &[Val]) -> Val {
    debug_assert_eq!(args.len(), 1);
    match args[0].kind() {
        Some(TypeKind::Real) => Val::real(args[0].as_real() + 1.0),
        Some(TypeKind::Char) => {
            Val::character(char::from_u32(args[0].as_char() as u32 + 1).unwrap_or('\0'))
        }
        Some(TypeKind::Boolean) => Val::boolean(true),
        _ => {
            machine.raise_error("the successor of this type cannot be taken");
            Val::default()
        }
    }
}

fn true_(_machine: &mut ScriptMachine, _args: &[Val]) -> Val {
    Val::boolean(true)
}

fn false_(_machine: &mut ScriptMachine, _args: &[Val]) -> Val {
    Val::boolean(false)
}

fn not_(_machine: &mut ScriptMachine, args: &[Val]) -> Val {
    Val::boolean(!args[0].as_boolean())
}

fn pi(_machine: &mut ScriptMachine, _args: &[Val]) -> Val {
    Val::real(std::f64::consts::PI)
}

fn length(machine: &mut ScriptMachine, args: &[Val]) -> Val {
    debug_assert_eq!(args.len(), 1);
    if args[0].kind() != Some(TypeKind::Array) {
        machine.raise_error("cannot take the length of a non-array value");
        return Val::default();
    }
    Val::real(args[0].length_as_array() as f64)
}

/// Check one index/position argument: must be a whole number inside
/// `0..bound`. Returns the usize index or raises.
fn check_position(machine: &mut ScriptMachine, v: &Val, bound: usize, what: &str) -> Option<usize> {
    let pos = v.as_real();
    if pos.fract() != 0.0 {
        machine.raise_error(format!("the {what} has a fractional part"));
        return None;
    }
    if pos < 0.0 || pos >= bound as f64 {
        machine.raise_error(format!("the {what} is out of range"));
        return None;
    }
    Some(pos as usize)
}

fn index(machine: &mut ScriptMachine, args: &[Val]) -> Val {
    debug_assert_eq!(args.len(), 2);
    if args[0].kind() != Some(TypeKind::Array) {
        machine.raise_error("cannot index a non-array value");
        return Val::default();
    }
    let Some(i) = check_position(machine, &args[1], args[0].length_as_array(), "array index") else {
        return Val::default();
    };
    args[0].index_as_array(i)
}

fn slice(machine: &mut ScriptMachine, args: &[Val]) -> Val {
    debug_assert_eq!(args.len(), 3);
    if args[0].kind() != Some(TypeKind::Array) {
        machine.raise_error("cannot slice a non-array value");
        return Val::default();
    }
    let start = args[1].as_real();
    let end = args[2].as_real();
    if start.fract() != 0.0 || end.fract() != 0.0 {
        machine.raise_error("a slice bound has a fractional part");
        return Val::default();
    }
    let len = args[0].length_as_array();
    if start < 0.0 || start > end || end > len as f64 {
        machine.raise_error("the slice range exceeds the array");
        return Val::default();
    }
    let Some(ty) = args[0].ty() else {
        return Val::default();
    };
    let mut result = Val::empty_array(ty);
    for i in start as usize..end as usize {
        result.append(ty, args[0].index_as_array(i));
    }
    result
}

fn erase(machine: &mut ScriptMachine, args: &[Val]) -> Val {
    debug_assert_eq!(args.len(), 2);
    if args[0].kind() != Some(TypeKind::Array) {
        machine.raise_error("cannot erase from a non-array value");
        return Val::default();
    }
    let len = args[0].length_as_array();
    let Some(at) = check_position(machine, &args[1], len, "erase position") else {
        return Val::default();
    };
    let Some(ty) = args[0].ty() else {
        return Val::default();
    };
    let mut result = Val::empty_array(ty);
    for i in (0..len).filter(|&i| i != at) {
        result.append(ty, args[0].index_as_array(i));
    }
    result
}

fn append(machine: &mut ScriptMachine, args: &[Val]) -> Val {
    debug_assert_eq!(args.len(), 2);
    if args[0].kind() != Some(TypeKind::Array) {
        machine.raise_error("cannot append to a non-array value");
        return Val::default();
    }
    let Some(item_ty) = args[1].ty() else {
        machine.raise_error("cannot append a void value");
        return Val::default();
    };
    if args[0].length_as_array() > 0 && args[0].ty().and_then(Type::element) != Some(item_ty) {
        machine.raise_error("the appended value does not match the array's element type");
        return Val::default();
    }
    let mut result = args[0].clone();
    result.append(types::array_type(item_ty), args[1].clone());
    result
}

fn concatenate(machine: &mut ScriptMachine, args: &[Val]) -> Val {
    debug_assert_eq!(args.len(), 2);
    let mut result = args[0].clone();
    let mut tail = args[1].clone();
    // Non-arrays concatenate through their string rendering: 1 ~ "s" -> "1s".
    if result.kind() != Some(TypeKind::Array) {
        result = Val::string(&result.as_string());
    }
    if tail.kind() != Some(TypeKind::Array) {
        tail = Val::string(&tail.as_string());
    }
    if result.length_as_array() > 0 && tail.length_as_array() > 0 && result.ty() != tail.ty() {
        machine.raise_error("cannot concatenate arrays of different types");
        return Val::default();
    }
    result.concatenate(&tail);
    result
}

fn round(_machine: &mut ScriptMachine, args: &[Val]) -> Val {
    Val::real((args[0].as_real() + 0.5).floor())
}

fn truncate(_machine: &mut ScriptMachine, args: &[Val]) -> Val {
    Val::real(args[0].as_real().trunc())
}

fn ceil(_machine: &mut ScriptMachine, args: &[Val]) -> Val {
    Val::real(args[0].as_real().ceil())
}

fn floor(_machine: &mut ScriptMachine, args: &[Val]) -> Val {
    Val::real(args[0].as_real().floor())
}

fn absolute(_machine: &mut ScriptMachine, args: &[Val]) -> Val {
    Val::real(args[0].as_real().abs())
}

fn assert_(machine: &mut ScriptMachine, args: &[Val]) -> Val {
    debug_assert_eq!(args.len(), 2);
    if !args[0].as_boolean() {
        machine.raise_error(args[1].as_string());
    }
    Val::default()
}
