//! Recursive-descent compiler: statement and expression parsing fused with
//! code generation, plus the two-pass scope resolution that registers every
//! declaration in a scope before its body compiles (so forward references
//! and mutual recursion work).

use tracing::debug;

use crate::ops::{NativeFunction, OPERATIONS};
use crate::token::{ParseError, Scanner, Token};
use crate::util::fast_map::{FastHashMap, fast_hash_map_with_capacity};
use crate::vm::bytecode::{BlockId, BlockKind, Instr, Op};
use crate::vm::program::ScriptProgram;

mod expr;
mod stmt;

/// A resolved name: a routine block, or a variable slot at a scope level.
#[derive(Clone)]
pub(crate) struct Symbol {
    pub(crate) level: u32,
    pub(crate) block: Option<BlockId>,
    pub(crate) slot: Option<usize>,
}

struct Scope {
    kind: BlockKind,
    symbols: FastHashMap<String, Symbol>,
}

impl Scope {
    fn new(kind: BlockKind) -> Self {
        Scope {
            kind,
            symbols: fast_hash_map_with_capacity(16),
        }
    }
}

pub(crate) struct Compiler<'p, 's> {
    program: &'p mut ScriptProgram,
    lex: Scanner<'s>,
    scopes: Vec<Scope>,
}

impl<'p, 's> Compiler<'p, 's> {
    pub(crate) fn new(program: &'p mut ScriptProgram, lex: Scanner<'s>) -> Self {
        Compiler {
            program,
            lex,
            scopes: vec![Scope::new(BlockKind::Normal)],
        }
    }

    /// Compile the whole source into the program's main block. Host entries
    /// register after the builtins, so a same-name host entry wins.
    pub(crate) fn compile(mut self, host_fns: &[NativeFunction]) -> Result<(), ParseError> {
        for op in OPERATIONS {
            self.register_function(op);
        }
        for func in host_fns {
            self.register_function(func);
        }
        self.scan_current_scope(0, &[], false)?;
        let main = self.program.main_block;
        self.parse_statements(main)?;
        if self.lex.token != Token::End {
            return Err(self.err("cannot be interpreted (did you forget \";\"?)"));
        }
        debug!(blocks = self.program.blocks.len(), "code generation finished");
        Ok(())
    }

    fn register_function(&mut self, func: &NativeFunction) {
        let block = self.program.new_block(0, BlockKind::Function);
        let b = &mut self.program.blocks[block];
        b.arguments = func.arity;
        b.name = func.name.to_string();
        b.native = Some(func.func);
        self.scopes[0].symbols.insert(
            func.name.to_string(),
            Symbol {
                level: 0,
                block: Some(block),
                slot: None,
            },
        );
    }

    pub(super) fn err(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.lex.line)
    }

    pub(super) fn emit(&mut self, block: BlockId, op: Op) {
        let line = self.lex.line;
        self.program.blocks[block].codes.push(Instr { line, op });
    }

    pub(super) fn code_len(&self, block: BlockId) -> usize {
        self.program.blocks[block].codes.len()
    }

    pub(super) fn expect(&mut self, token: Token, message: &str) -> Result<(), ParseError> {
        if self.lex.token == token {
            self.lex.advance()
        } else {
            Err(self.err(message))
        }
    }

    pub(super) fn search(&self, name: &str) -> Option<Symbol> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.symbols.get(name).cloned())
    }

    /// Find the `result` slot of the innermost function; `sub` and `task`
    /// bodies fence the search off.
    pub(super) fn search_result(&self) -> Option<Symbol> {
        for scope in self.scopes.iter().rev() {
            if let Some(sym) = scope.symbols.get("result") {
                return Some(sym.clone());
            }
            if matches!(scope.kind, BlockKind::Sub | BlockKind::Task) {
                return None;
            }
        }
        None
    }

    pub(super) fn check_break_context(&self) -> Result<(), ParseError> {
        for scope in self.scopes.iter().rev() {
            match scope.kind {
                BlockKind::Loop => return Ok(()),
                BlockKind::Sub | BlockKind::Function | BlockKind::Task => break,
                _ => {}
            }
        }
        Err(self.err("\"break\" is not inside a loop"))
    }

    pub(super) fn check_return_context(&self) -> Result<(), ParseError> {
        for scope in self.scopes.iter().rev() {
            if matches!(scope.kind, BlockKind::Sub | BlockKind::Function | BlockKind::Task) {
                return Ok(());
            }
        }
        Err(self.err("\"return\" is not inside a routine"))
    }

    /// Pre-register every declaration at the current brace depth on a
    /// throwaway cursor, before any code is generated for the scope body.
    /// Declarations inside nested braces belong to deeper scopes and are
    /// skipped.
    pub(super) fn scan_current_scope(
        &mut self,
        level: u32,
        args: &[String],
        adding_result: bool,
    ) -> Result<(), ParseError> {
        let mut cursor = self.lex.clone();
        let scope = self.scopes.len() - 1;
        let mut depth = 0i32;
        let mut var = 0usize;

        if adding_result {
            self.scopes[scope].symbols.insert(
                "result".to_string(),
                Symbol {
                    level,
                    block: None,
                    slot: Some(var),
                },
            );
            var += 1;
        }
        for name in args {
            self.scopes[scope].symbols.insert(
                name.clone(),
                Symbol {
                    level,
                    block: None,
                    slot: Some(var),
                },
            );
            var += 1;
        }

        while depth >= 0 && !matches!(cursor.token, Token::End | Token::Invalid) {
            match &cursor.token {
                Token::OpenCur => {
                    depth += 1;
                    cursor.advance()?;
                }
                Token::CloseCur => {
                    depth -= 1;
                    cursor.advance()?;
                }
                Token::At | Token::Sub | Token::Function | Token::Task => {
                    let kind = match cursor.token {
                        Token::At | Token::Sub => BlockKind::Sub,
                        Token::Function => BlockKind::Function,
                        _ => BlockKind::Task,
                    };
                    cursor.advance()?;
                    if depth != 0 {
                        continue;
                    }
                    let Token::Word(name) = &cursor.token else {
                        continue;
                    };
                    let name = name.clone();
                    if self.scopes[scope].symbols.contains_key(&name) {
                        return Err(ParseError::new(
                            format!("a routine named {name} is already declared in this scope"),
                            cursor.line,
                        ));
                    }
                    let block = self.program.new_block(level + 1, kind);
                    self.program.blocks[block].name = name.clone();
                    self.scopes[scope].symbols.insert(
                        name,
                        Symbol {
                            level,
                            block: Some(block),
                            slot: None,
                        },
                    );
                    cursor.advance()?;
                    if kind != BlockKind::Sub && cursor.token == Token::OpenPar {
                        cursor.advance()?;
                        while matches!(cursor.token, Token::Word(_) | Token::Let | Token::Real) {
                            self.program.blocks[block].arguments += 1;
                            if matches!(cursor.token, Token::Let | Token::Real) {
                                cursor.advance()?;
                            }
                            if matches!(cursor.token, Token::Word(_)) {
                                cursor.advance()?;
                            }
                            if cursor.token != Token::Comma {
                                break;
                            }
                            cursor.advance()?;
                        }
                    }
                }
                Token::Let | Token::Real => {
                    cursor.advance()?;
                    if depth != 0 {
                        continue;
                    }
                    if let Token::Word(name) = &cursor.token {
                        let name = name.clone();
                        if self.scopes[scope].symbols.contains_key(&name) {
                            return Err(ParseError::new(
                                format!("a variable named {name} is already declared in this scope"),
                                cursor.line,
                            ));
                        }
                        self.scopes[scope].symbols.insert(
                            name,
                            Symbol {
                                level,
                                block: None,
                                slot: Some(var),
                            },
                        );
                        var += 1;
                        cursor.advance()?;
                    }
                }
                _ => cursor.advance()?,
            }
        }
        Ok(())
    }

    /// Compile an operator as a call to its named operation, resolved
    /// through ordinary identifier scope (so user functions can shadow it).
    pub(super) fn write_operation(
        &mut self,
        block: BlockId,
        name: &str,
        clauses: usize,
    ) -> Result<(), ParseError> {
        let Some(Symbol {
            block: Some(target), ..
        }) = self.search(name)
        else {
            return Err(self.err(format!("internal error: operation {name} is not registered")));
        };
        if self.program.blocks[target].arguments != clauses {
            return Err(self.err(format!(
                "the function shadowing operation {name} takes a different number of arguments"
            )));
        }
        self.emit(block, Op::CallPush { block: target, argc: clauses });
        Ok(())
    }

    /// Parse `{ ... }` into `block`, binding `args` (and the `result` slot
    /// for functions) ahead of the body's own declarations. Arguments
    /// arrive on the new frame's stack in reverse order, so the prologue
    /// assigns them first-to-last.
    pub(super) fn parse_block(
        &mut self,
        block: BlockId,
        args: &[String],
        adding_result: bool,
    ) -> Result<(), ParseError> {
        self.expect(Token::OpenCur, "\"{\" is required")?;
        let (level, kind) = {
            let b = &self.program.blocks[block];
            (b.level, b.kind)
        };
        self.scopes.push(Scope::new(kind));
        self.scan_current_scope(level, args, adding_result)?;
        for name in args {
            let Some(Symbol { slot: Some(slot), level, .. }) = self.search(name) else {
                return Err(self.err(format!("internal error: argument {name} is unregistered")));
            };
            self.emit(block, Op::Assign { level, slot });
        }
        self.parse_statements(block)?;
        self.scopes.pop();
        self.expect(Token::CloseCur, "\"}\" is required")?;
        Ok(())
    }

    /// Compile a brace block as a fresh inline frame invoked in place.
    pub(super) fn parse_inline_block(
        &mut self,
        block: BlockId,
        kind: BlockKind,
    ) -> Result<(), ParseError> {
        let level = self.program.blocks[block].level;
        let inner = self.program.new_block(level + 1, kind);
        self.parse_block(inner, &[], false)?;
        self.emit(block, Op::Call { block: inner, argc: 0 });
        Ok(())
    }
}
