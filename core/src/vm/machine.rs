use std::any::Any;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::val::{TypeKind, Val};
use crate::vm::bytecode::{BlockKind, Op};
use crate::vm::program::ScriptProgram;

pub(crate) type EnvId = usize;

/// One activation of a block. `parent` is the frame that invoked this one;
/// `ref_count` counts the frames and threads still reaching this frame
/// through their parent chains.
struct Environment {
    parent: Option<EnvId>,
    ref_count: u32,
    block: usize,
    ip: usize,
    variables: Vec<Val>,
    stack: Vec<Val>,
    has_result: bool,
}

/// Pooled frame storage. Retired frames keep their buffers, so re-invoking
/// a block does not allocate once the pool is warm.
struct EnvArena {
    slots: Vec<Environment>,
    free: Vec<EnvId>,
}

impl EnvArena {
    fn new() -> Self {
        EnvArena {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    fn alloc(&mut self, parent: Option<EnvId>, block: usize, has_result: bool) -> EnvId {
        if let Some(id) = self.free.pop() {
            let env = &mut self.slots[id];
            env.parent = parent;
            env.ref_count = 1;
            env.block = block;
            env.ip = 0;
            env.variables.clear();
            env.stack.clear();
            env.has_result = has_result;
            id
        } else {
            self.slots.push(Environment {
                parent,
                ref_count: 1,
                block,
                ip: 0,
                variables: Vec::new(),
                stack: Vec::new(),
                has_result,
            });
            self.slots.len() - 1
        }
    }

    fn retire(&mut self, id: EnvId) {
        debug_assert_eq!(self.slots[id].ref_count, 0);
        self.free.push(id);
    }
}

impl std::ops::Index<EnvId> for EnvArena {
    type Output = Environment;

    fn index(&self, id: EnvId) -> &Environment {
        &self.slots[id]
    }
}

impl std::ops::IndexMut<EnvId> for EnvArena {
    fn index_mut(&mut self, id: EnvId) -> &mut Environment {
        &mut self.slots[id]
    }
}

/// Executes a compiled program: a pool of call frames, a list of
/// cooperatively scheduled frame chains ("threads", the main program being
/// thread 0), and the stepping loop.
///
/// Run-time errors are fatal: they set the sticky error state and finish
/// the machine. Check [`ScriptMachine::has_error`] after every `run`,
/// `resume` or `call`.
pub struct ScriptMachine {
    program: Arc<ScriptProgram>,
    envs: EnvArena,
    threads: Vec<EnvId>,
    current_thread: usize,
    started: bool,
    finished: bool,
    stopped: bool,
    resuming: bool,
    error: bool,
    error_message: String,
    error_line: u32,
    host_data: Option<Box<dyn Any>>,
}

impl ScriptMachine {
    /// The program must have compiled cleanly; constructing a machine from
    /// an erroneous program is a host bug.
    pub fn new(program: Arc<ScriptProgram>) -> ScriptMachine {
        assert!(
            !program.has_error(),
            "cannot construct a machine from a program with a compile error"
        );
        ScriptMachine {
            program,
            envs: EnvArena::new(),
            threads: Vec::new(),
            current_thread: 0,
            started: false,
            finished: false,
            stopped: false,
            resuming: false,
            error: false,
            error_message: String::new(),
            error_line: 0,
            host_data: None,
        }
    }

    pub fn program(&self) -> &ScriptProgram {
        &self.program
    }

    /// Execute the top-level program until it finishes, stops or errors.
    /// A no-op once the machine has started.
    pub fn run(&mut self) {
        assert!(!self.error, "run on an errored machine");
        if self.started {
            return;
        }
        self.started = true;
        self.error_line = 0;
        self.threads.clear();
        let main = self.envs.alloc(None, self.program.main_block, false);
        self.threads.push(main);
        self.current_thread = 0;
        self.finished = false;
        self.stopped = false;
        self.resuming = false;
        debug!("machine started");
        while !self.finished {
            self.advance();
        }
    }

    /// Continue after a native function requested a stop. The interrupted
    /// call re-executes with the resuming flag set.
    pub fn resume(&mut self) {
        assert!(!self.error, "resume on an errored machine");
        assert!(self.stopped, "resume on a machine that is not stopped");
        self.stopped = false;
        self.finished = false;
        self.resuming = true;
        while !self.finished {
            self.advance();
        }
    }

    /// Run the named event subroutine to completion, synchronously. Runs
    /// the top level first if it has not started yet. Not valid while the
    /// machine is stopped.
    pub fn call(&mut self, event_name: &str) {
        assert!(!self.error, "call on an errored machine");
        assert!(!self.stopped, "call on a stopped machine");
        let Some(event) = self.program.event(event_name) else {
            return;
        };
        self.run();
        if self.error {
            return;
        }
        let root = self.threads[0];
        self.envs[root].ref_count += 1;
        let env = self.envs.alloc(Some(root), event, false);
        self.threads[0] = env;
        trace!(event = event_name, "event call");
        self.finished = false;
        while !self.finished {
            self.advance();
        }
    }

    pub fn has_event(&self, event_name: &str) -> bool {
        self.program.has_event(event_name)
    }

    /// Halt the machine in the resumable "stopped" state.
    pub fn stop(&mut self) {
        self.finished = true;
        self.stopped = true;
    }

    pub fn stopped(&self) -> bool {
        self.stopped
    }

    pub fn finished(&self) -> bool {
        self.finished
    }

    /// True while the first native call after `resume` re-executes.
    pub fn resuming(&self) -> bool {
        self.resuming
    }

    pub fn has_error(&self) -> bool {
        self.error
    }

    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    pub fn error_line(&self) -> u32 {
        self.error_line
    }

    /// Report a fatal error: the machine finishes immediately, with no
    /// recovery path.
    pub fn raise_error(&mut self, message: impl Into<String>) {
        self.error = true;
        self.error_message = message.into();
        self.finished = true;
        debug!(line = self.error_line, message = %self.error_message, "fatal script error");
    }

    /// Source line of the instruction about to execute on the selected
    /// thread, for host-side diagnostics.
    pub fn current_line(&self) -> u32 {
        let Some(&env) = self.threads.get(self.current_thread) else {
            return self.error_line;
        };
        let env = &self.envs[env];
        self.program
            .block(env.block)
            .codes
            .get(env.ip)
            .map(|c| c.line)
            .unwrap_or(self.error_line)
    }

    /// Attach host state reachable from native functions.
    pub fn set_host_data(&mut self, data: Box<dyn Any>) {
        self.host_data = Some(data);
    }

    pub fn host_data<T: 'static>(&self) -> Option<&T> {
        self.host_data.as_ref().and_then(|d| d.downcast_ref())
    }

    pub fn host_data_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.host_data.as_mut().and_then(|d| d.downcast_mut())
    }

    /// Move the selected thread one step backwards, wrapping to the end of
    /// the list. Round-robin-by-decrement keeps a newly spawned microthread
    /// (inserted after its spawner) next in line.
    fn yield_next(&mut self) {
        if self.current_thread > 0 {
            self.current_thread -= 1;
        } else {
            self.current_thread = self.threads.len() - 1;
        }
    }

    /// Walk outward from `from` to the frame whose block sits at `level`.
    fn locate(&self, from: EnvId, level: u32) -> Option<EnvId> {
        let mut walk = Some(from);
        while let Some(id) = walk {
            if self.program.block(self.envs[id].block).level == level {
                return Some(id);
            }
            walk = self.envs[id].parent;
        }
        None
    }

    fn pop(&mut self, env: EnvId) -> Val {
        debug_assert!(!self.envs[env].stack.is_empty());
        self.envs[env].stack.pop().unwrap_or_default()
    }

    /// Advance `env`'s pointer just past the next `LoopBack`.
    fn skip_to_loop_end(&mut self, env: EnvId) {
        let program = Arc::clone(&self.program);
        let codes = &program.block(self.envs[env].block).codes;
        loop {
            let at = self.envs[env].ip;
            self.envs[env].ip += 1;
            match codes.get(at) {
                Some(instr) if matches!(instr.op, Op::LoopBack { .. }) => break,
                Some(_) => {}
                None => break,
            }
        }
    }

    /// The frame at `removing` has run off the end of its block: deliver
    /// its effects to the parent, then release the chain's references.
    fn complete_frame(&mut self, removing: EnvId) {
        let Some(parent) = self.envs[removing].parent else {
            self.finished = true;
            return;
        };
        self.threads[self.current_thread] = parent;

        if self.envs[removing].has_result {
            let result = self.envs[removing].variables.first().cloned().unwrap_or_default();
            self.envs[parent].stack.push(result);
        } else if self.program.block(self.envs[removing].block).kind == BlockKind::Task {
            self.threads.remove(self.current_thread);
            trace!(threads = self.threads.len(), "microthread finished");
            self.yield_next();
        }
        debug_assert!(self.envs[removing].stack.is_empty());

        let mut frame = removing;
        loop {
            self.envs[frame].ref_count -= 1;
            if self.envs[frame].ref_count > 0 {
                break;
            }
            let next = self.envs[frame].parent;
            self.envs.retire(frame);
            match next {
                Some(n) => frame = n,
                None => break,
            }
        }
    }

    /// Unwind for `break`/`return`: mark frames complete walking outward;
    /// `break` stops at the first loop frame and skips its parent past the
    /// loop's back edge, `return` stops at the first routine frame.
    fn unwind(&mut self, to_loop: bool, from: EnvId) {
        let mut walk = Some(from);
        while let Some(id) = walk {
            let kind = self.program.block(self.envs[id].block).kind;
            self.envs[id].ip = self.program.block(self.envs[id].block).codes.len();
            // Whatever the discarded frames had mid-evaluation is dead.
            self.envs[id].stack.clear();
            if to_loop {
                if kind == BlockKind::Loop {
                    if let Some(parent) = self.envs[id].parent {
                        self.skip_to_loop_end(parent);
                    }
                    break;
                }
            } else {
                if matches!(kind, BlockKind::Sub | BlockKind::Function | BlockKind::Task) {
                    break;
                }
                // Loop bookkeeping (counters, bounds) lives on the parent
                // frame's stack; returning across the loop discards it.
                if kind == BlockKind::Loop {
                    if let Some(parent) = self.envs[id].parent {
                        self.envs[parent].stack.clear();
                    }
                }
            }
            walk = self.envs[id].parent;
        }
    }

    /// Perform exactly one scheduling step: complete the selected thread's
    /// frame if it has ended, otherwise execute one instruction.
    pub fn advance(&mut self) {
        let Some(&cur) = self.threads.get(self.current_thread) else {
            return;
        };
        let program = Arc::clone(&self.program);
        let block = program.block(self.envs[cur].block);
        let ip = self.envs[cur].ip;

        if ip >= block.codes.len() {
            self.complete_frame(cur);
            return;
        }

        let instr = &block.codes[ip];
        self.error_line = instr.line;
        self.envs[cur].ip += 1;

        match &instr.op {
            Op::Assign { level, slot } => {
                let src = self.pop(cur);
                let Some(target) = self.locate(cur, *level) else {
                    self.raise_error("internal error: no frame at the assignment's level");
                    return;
                };
                if self.envs[target].variables.len() <= *slot {
                    self.envs[target].variables.resize(slot + 1, Val::default());
                }
                let dest = &self.envs[target].variables[*slot];
                if assignment_changes_type(dest, &src) {
                    self.raise_error("the assignment would change the variable's type");
                    return;
                }
                self.envs[target].variables[*slot] = src;
            }

            Op::AssignIndex { level, slot } => {
                let src = self.pop(cur);
                let index = self.pop(cur);
                let Some(target) = self.locate(cur, *level) else {
                    self.raise_error("internal error: no frame at the assignment's level");
                    return;
                };
                let Some(dest) = self.envs[target].variables.get(*slot).filter(|v| v.has_data())
                else {
                    self.raise_error("an uninitialized variable was used");
                    return;
                };
                if dest.kind() != Some(TypeKind::Array) {
                    self.raise_error("cannot index a non-array value");
                    return;
                }
                let at = index.as_real();
                if at.fract() != 0.0 {
                    self.raise_error("the array index has a fractional part");
                    return;
                }
                if at < 0.0 || at >= dest.length_as_array() as f64 {
                    self.raise_error("the array index is out of range");
                    return;
                }
                let at = at as usize;
                let element = dest.index_as_array(at);
                if assignment_changes_type(&element, &src) {
                    self.raise_error("the assignment would change the variable's type");
                    return;
                }
                self.envs[target].variables[*slot].set_index(at, src);
            }

            Op::BreakLoop => self.unwind(true, cur),
            Op::BreakRoutine => self.unwind(false, cur),

            op @ (Op::Call { block: callee, argc } | Op::CallPush { block: callee, argc }) => {
                let push_result = matches!(op, Op::CallPush { .. });
                let callee_block = program.block(*callee);
                if let Some(func) = callee_block.native {
                    let stack_len = self.envs[cur].stack.len();
                    debug_assert!(stack_len >= *argc);
                    let base = stack_len.saturating_sub(*argc);
                    let args: Vec<Val> = self.envs[cur].stack[base..].to_vec();
                    let ret = func(self, &args);
                    if self.stopped {
                        // Re-execute this call on resume().
                        self.envs[cur].ip -= 1;
                    } else {
                        self.resuming = false;
                        self.envs[cur].stack.truncate(base);
                        if push_result {
                            self.envs[cur].stack.push(ret);
                        }
                    }
                } else if callee_block.kind == BlockKind::Task {
                    self.envs[cur].ref_count += 1;
                    let env = self.envs.alloc(Some(cur), *callee, false);
                    self.current_thread += 1;
                    self.threads.insert(self.current_thread, env);
                    for _ in 0..*argc {
                        let v = self.pop(cur);
                        self.envs[env].stack.push(v);
                    }
                    trace!(block = %callee_block.name, threads = self.threads.len(), "microthread spawned");
                } else {
                    self.envs[cur].ref_count += 1;
                    let env = self.envs.alloc(Some(cur), *callee, push_result);
                    self.threads[self.current_thread] = env;
                    for _ in 0..*argc {
                        let v = self.pop(cur);
                        self.envs[env].stack.push(v);
                    }
                }
            }

            Op::CaseBegin | Op::CaseEnd => {}

            op @ (Op::CaseIf | Op::CaseIfNot | Op::CaseNext) => {
                let mut skip = true;
                if !matches!(op, Op::CaseNext) {
                    let v = self.pop(cur);
                    skip = v.as_boolean();
                    if matches!(op, Op::CaseIfNot) {
                        skip = !skip;
                    }
                }
                if skip {
                    let is_case_next = matches!(op, Op::CaseNext);
                    let mut nested = 0i32;
                    loop {
                        let Some(ahead) = block.codes.get(self.envs[cur].ip) else {
                            break;
                        };
                        match ahead.op {
                            Op::CaseBegin => nested += 1,
                            Op::CaseEnd => {
                                nested -= 1;
                                if nested < 0 {
                                    break;
                                }
                            }
                            Op::CaseNext if nested == 0 && !is_case_next => {
                                self.envs[cur].ip += 1;
                                break;
                            }
                            _ => {}
                        }
                        self.envs[cur].ip += 1;
                    }
                }
            }

            op @ (Op::CompareEq
            | Op::CompareGt
            | Op::CompareGe
            | Op::CompareLt
            | Op::CompareLe
            | Op::CompareNe) => {
                let r = self.envs[cur].stack.last().map(Val::as_real).unwrap_or(0.0);
                let b = match op {
                    Op::CompareEq => r == 0.0,
                    Op::CompareGt => r > 0.0,
                    Op::CompareGe => r >= 0.0,
                    Op::CompareLt => r < 0.0,
                    Op::CompareLe => r <= 0.0,
                    _ => r != 0.0,
                };
                if let Some(top) = self.envs[cur].stack.last_mut() {
                    top.set_boolean(b);
                }
            }

            Op::Dup => {
                let Some(top) = self.envs[cur].stack.last().cloned() else {
                    return;
                };
                self.envs[cur].stack.push(top);
            }

            Op::Dup2 => {
                let len = self.envs[cur].stack.len();
                debug_assert!(len >= 2);
                if len >= 2 {
                    let a = self.envs[cur].stack[len - 2].clone();
                    let b = self.envs[cur].stack[len - 1].clone();
                    self.envs[cur].stack.push(a);
                    self.envs[cur].stack.push(b);
                }
            }

            Op::LoopBack { target } => {
                self.envs[cur].ip = *target;
            }

            Op::LoopAscent => {
                let v = self.pop(cur);
                if v.as_real() < 0.0 {
                    self.skip_to_loop_end(cur);
                }
            }

            Op::LoopDescent => {
                let v = self.pop(cur);
                if v.as_real() > 0.0 {
                    self.skip_to_loop_end(cur);
                }
            }

            Op::LoopCount => {
                let Some(top) = self.envs[cur].stack.last() else {
                    return;
                };
                if top.kind() != Some(TypeKind::Real) {
                    self.raise_error("the loop count must be a number");
                    return;
                }
                let r = top.as_real();
                if r > 0.0 {
                    if let Some(top) = self.envs[cur].stack.last_mut() {
                        top.set_real(r - 1.0);
                    }
                } else {
                    self.skip_to_loop_end(cur);
                }
            }

            Op::LoopIf => {
                let v = self.pop(cur);
                if !v.as_boolean() {
                    self.skip_to_loop_end(cur);
                }
            }

            Op::Pop => {
                self.pop(cur);
            }

            Op::PushValue(v) => {
                let v = v.clone();
                self.envs[cur].stack.push(v);
            }

            Op::PushVariable { level, slot } => {
                let Some(target) = self.locate(cur, *level) else {
                    self.raise_error("internal error: no frame at the variable's level");
                    return;
                };
                match self.envs[target].variables.get(*slot) {
                    Some(v) if v.has_data() => {
                        let v = v.clone();
                        self.envs[cur].stack.push(v);
                    }
                    _ => self.raise_error("an uninitialized variable was used"),
                }
            }

            Op::Swap => {
                let len = self.envs[cur].stack.len();
                debug_assert!(len >= 2);
                if len >= 2 {
                    self.envs[cur].stack.swap(len - 1, len - 2);
                }
            }

            Op::Yield => self.yield_next(),

            Op::Exit => self.stop(),
        }
    }
}

/// A populated variable may not change type, except that an empty array is
/// compatible with any array.
fn assignment_changes_type(dest: &Val, src: &Val) -> bool {
    dest.has_data()
        && src.has_data()
        && dest.ty() != src.ty()
        && !(dest.kind() == Some(TypeKind::Array)
            && src.kind() == Some(TypeKind::Array)
            && (dest.length_as_array() == 0 || src.length_as_array() == 0))
}
