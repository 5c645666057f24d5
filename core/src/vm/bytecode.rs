use std::fmt;

use crate::ops::NativeFn;
use crate::val::Val;

/// Index of a [`Block`] in its program's block arena. Blocks are appended
/// during compilation and never move, so an id stays valid for the life of
/// the program.
pub type BlockId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// The program root or a free-standing inline scope.
    Normal,
    /// A loop body; `break` unwinds to the first enclosing frame of this kind.
    Loop,
    Sub,
    Function,
    /// A microthread entry: invocation spawns a new scheduled thread.
    Task,
}

/// One compiled unit: the program root, an inline scope or loop body, a
/// routine, or a microthread entry. Builtin and host functions are blocks
/// with no code and a native callable instead.
pub struct Block {
    /// Nesting depth, used at run time to locate the frame owning a
    /// variable slot.
    pub level: u32,
    pub arguments: usize,
    pub name: String,
    pub native: Option<NativeFn>,
    pub kind: BlockKind,
    pub codes: Vec<Instr>,
}

impl Block {
    pub(crate) fn new(level: u32, kind: BlockKind) -> Self {
        Block {
            level,
            arguments: 0,
            name: String::new(),
            native: None,
            kind,
            codes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Instr {
    pub line: u32,
    pub op: Op,
}

#[derive(Clone)]
pub enum Op {
    /// Pop a value into the slot at (level, index), growing the frame's
    /// slot array as needed.
    Assign { level: u32, slot: usize },
    /// Pop value then index; store into an element of the array held by the
    /// slot, copy-on-write.
    AssignIndex { level: u32, slot: usize },
    BreakLoop,
    BreakRoutine,
    Call { block: BlockId, argc: usize },
    /// Call that delivers the callee's result to this frame's stack.
    CallPush { block: BlockId, argc: usize },
    CaseBegin,
    CaseEnd,
    /// Pop a boolean; if true, scan forward past the next same-depth
    /// `CaseNext` (or to the region's `CaseEnd`).
    CaseIf,
    /// As `CaseIf` with the condition negated.
    CaseIfNot,
    /// Unconditionally scan forward to the region's `CaseEnd`.
    CaseNext,
    CompareEq,
    CompareGt,
    CompareGe,
    CompareLt,
    CompareLe,
    CompareNe,
    Dup,
    Dup2,
    /// Pop a comparison result; leave the loop if it is negative.
    LoopAscent,
    LoopBack { target: usize },
    /// Decrement the counter on top of the stack; leave the loop at zero.
    LoopCount,
    /// Pop a comparison result; leave the loop if it is positive.
    LoopDescent,
    /// Pop a boolean; leave the loop if it is false.
    LoopIf,
    Pop,
    PushValue(Val),
    PushVariable { level: u32, slot: usize },
    Swap,
    Yield,
    Exit,
}

impl fmt::Debug for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Assign { level, slot } => write!(f, "Assign l{level}, v{slot}"),
            Op::AssignIndex { level, slot } => write!(f, "AssignIndex l{level}, v{slot}"),
            Op::BreakLoop => write!(f, "BreakLoop"),
            Op::BreakRoutine => write!(f, "BreakRoutine"),
            Op::Call { block, argc } => write!(f, "Call b{block}, argc={argc}"),
            Op::CallPush { block, argc } => write!(f, "CallPush b{block}, argc={argc}"),
            Op::CaseBegin => write!(f, "CaseBegin"),
            Op::CaseEnd => write!(f, "CaseEnd"),
            Op::CaseIf => write!(f, "CaseIf"),
            Op::CaseIfNot => write!(f, "CaseIfNot"),
            Op::CaseNext => write!(f, "CaseNext"),
            Op::CompareEq => write!(f, "CompareEq"),
            Op::CompareGt => write!(f, "CompareGt"),
            Op::CompareGe => write!(f, "CompareGe"),
            Op::CompareLt => write!(f, "CompareLt"),
            Op::CompareLe => write!(f, "CompareLe"),
            Op::CompareNe => write!(f, "CompareNe"),
            Op::Dup => write!(f, "Dup"),
            Op::Dup2 => write!(f, "Dup2"),
            Op::LoopAscent => write!(f, "LoopAscent"),
            Op::LoopBack { target } => write!(f, "LoopBack {target}"),
            Op::LoopCount => write!(f, "LoopCount"),
            Op::LoopDescent => write!(f, "LoopDescent"),
            Op::LoopIf => write!(f, "LoopIf"),
            Op::Pop => write!(f, "Pop"),
            Op::PushValue(v) => write!(f, "PushValue {v}"),
            Op::PushVariable { level, slot } => write!(f, "PushVariable l{level}, v{slot}"),
            Op::Swap => write!(f, "Swap"),
            Op::Yield => write!(f, "Yield"),
            Op::Exit => write!(f, "Exit"),
        }
    }
}
