//! Statement and control-structure parsing. Branches, loops and event
//! dispatch all compile to the linear case/loop marker shape the machine
//! scans at run time; loop bodies become separate loop-kind blocks invoked
//! as inline frames.

use crate::token::{ParseError, Token};
use crate::val::Val;
use crate::vm::bytecode::{BlockId, BlockKind, Op};

use super::{Compiler, Symbol};

impl Compiler<'_, '_> {
    pub(super) fn parse_statements(&mut self, block: BlockId) -> Result<(), ParseError> {
        loop {
            let mut need_semicolon = true;
            match self.lex.token.clone() {
                Token::Word(name) => self.parse_word_statement(block, &name)?,
                Token::Let | Token::Real => self.parse_declaration(block)?,
                Token::Local => {
                    self.lex.advance()?;
                    self.parse_inline_block(block, BlockKind::Normal)?;
                    need_semicolon = false;
                }
                Token::Loop => {
                    self.parse_loop(block)?;
                    need_semicolon = false;
                }
                Token::Times => {
                    self.parse_times(block)?;
                    need_semicolon = false;
                }
                Token::While => {
                    self.parse_while(block)?;
                    need_semicolon = false;
                }
                Token::For => {
                    self.parse_for(block)?;
                    need_semicolon = false;
                }
                Token::If => {
                    self.parse_if(block)?;
                    need_semicolon = false;
                }
                Token::Events => {
                    self.parse_events(block)?;
                    need_semicolon = false;
                }
                Token::Break => {
                    self.lex.advance()?;
                    self.check_break_context()?;
                    self.emit(block, Op::BreakLoop);
                }
                Token::Return => self.parse_return(block)?,
                Token::Yield => {
                    self.lex.advance()?;
                    self.emit(block, Op::Yield);
                }
                Token::Exit => {
                    self.lex.advance()?;
                    self.emit(block, Op::Exit);
                }
                tok @ (Token::At | Token::Sub | Token::Function | Token::Task) => {
                    self.parse_routine(block, tok == Token::At)?;
                    need_semicolon = false;
                }
                _ => {}
            }

            // No continuation without a semicolon.
            if need_semicolon && self.lex.token != Token::Semicolon {
                break;
            }
            if self.lex.token == Token::Semicolon {
                self.lex.advance()?;
            }
        }
        Ok(())
    }

    fn variable_target(&self, sym: &Symbol, name: &str) -> Result<(u32, usize), ParseError> {
        match sym.slot {
            Some(slot) => Ok((sym.level, slot)),
            None => Err(self.err(format!("{name} is not a variable"))),
        }
    }

    /// A statement led by an identifier: assignment (plain, indexed,
    /// compound, increment/decrement) or a call.
    fn parse_word_statement(&mut self, block: BlockId, name: &str) -> Result<(), ParseError> {
        let Some(sym) = self.search(name) else {
            return Err(self.err(format!("{name} is an undeclared identifier")));
        };
        self.lex.advance()?;
        match self.lex.token {
            Token::Assign => {
                let (level, slot) = self.variable_target(&sym, name)?;
                self.lex.advance()?;
                self.parse_expression(block)?;
                self.emit(block, Op::Assign { level, slot });
            }
            Token::OpenBra => {
                let (level, slot) = self.variable_target(&sym, name)?;
                self.lex.advance()?;
                self.parse_expression(block)?;
                self.expect(Token::CloseBra, "\"]\" is required")?;
                self.expect(Token::Assign, "\"=\" is required")?;
                self.parse_expression(block)?;
                self.emit(block, Op::AssignIndex { level, slot });
            }
            Token::AddAssign
            | Token::SubtractAssign
            | Token::MultiplyAssign
            | Token::DivideAssign
            | Token::RemainderAssign
            | Token::PowerAssign
            | Token::ConcatAssign => {
                let operation = match self.lex.token {
                    Token::AddAssign => "add",
                    Token::SubtractAssign => "subtract",
                    Token::MultiplyAssign => "multiply",
                    Token::DivideAssign => "divide",
                    Token::RemainderAssign => "remainder",
                    Token::PowerAssign => "power",
                    _ => "concatenate",
                };
                let (level, slot) = self.variable_target(&sym, name)?;
                self.lex.advance()?;
                self.emit(block, Op::PushVariable { level, slot });
                self.parse_expression(block)?;
                self.write_operation(block, operation, 2)?;
                self.emit(block, Op::Assign { level, slot });
            }
            Token::Inc | Token::Dec => {
                let operation = if self.lex.token == Token::Inc {
                    "successor"
                } else {
                    "predecessor"
                };
                let (level, slot) = self.variable_target(&sym, name)?;
                self.lex.advance()?;
                self.emit(block, Op::PushVariable { level, slot });
                self.write_operation(block, operation, 1)?;
                self.emit(block, Op::Assign { level, slot });
            }
            _ => {
                let Some(target) = sym.block else {
                    return Err(self.err("a variable cannot be called like a sub or function"));
                };
                let argc = self.parse_arguments(block)?;
                if argc != self.program.blocks[target].arguments {
                    return Err(self.err(format!("wrong number of arguments for {name}")));
                }
                self.emit(block, Op::Call { block: target, argc });
            }
        }
        Ok(())
    }

    fn parse_declaration(&mut self, block: BlockId) -> Result<(), ParseError> {
        self.lex.advance()?;
        let Token::Word(name) = self.lex.token.clone() else {
            return Err(self.err("an identifier is required"));
        };
        let Some(sym) = self.search(&name) else {
            return Err(self.err(format!("internal error: {name} was not pre-registered")));
        };
        self.lex.advance()?;
        if self.lex.token == Token::Assign {
            let (level, slot) = self.variable_target(&sym, &name)?;
            self.lex.advance()?;
            self.parse_expression(block)?;
            self.emit(block, Op::Assign { level, slot });
        }
        Ok(())
    }

    fn parse_loop(&mut self, block: BlockId) -> Result<(), ParseError> {
        self.lex.advance()?;
        if self.lex.token == Token::OpenPar {
            self.parse_parentheses(block)?;
            let head = self.code_len(block);
            self.emit(block, Op::LoopCount);
            self.parse_inline_block(block, BlockKind::Loop)?;
            self.emit(block, Op::LoopBack { target: head });
            self.emit(block, Op::Pop);
        } else {
            let head = self.code_len(block);
            self.parse_inline_block(block, BlockKind::Loop)?;
            self.emit(block, Op::LoopBack { target: head });
        }
        Ok(())
    }

    fn parse_times(&mut self, block: BlockId) -> Result<(), ParseError> {
        self.lex.advance()?;
        self.parse_parentheses(block)?;
        let head = self.code_len(block);
        if self.lex.token == Token::Loop {
            self.lex.advance()?;
        }
        self.emit(block, Op::LoopCount);
        self.parse_inline_block(block, BlockKind::Loop)?;
        self.emit(block, Op::LoopBack { target: head });
        self.emit(block, Op::Pop);
        Ok(())
    }

    fn parse_while(&mut self, block: BlockId) -> Result<(), ParseError> {
        self.lex.advance()?;
        let head = self.code_len(block);
        self.parse_parentheses(block)?;
        if self.lex.token == Token::Loop {
            self.lex.advance()?;
        }
        self.emit(block, Op::LoopIf);
        self.parse_inline_block(block, BlockKind::Loop)?;
        self.emit(block, Op::LoopBack { target: head });
        Ok(())
    }

    /// `for [reverse] (x in a..b)` walks the range inclusive on both ends;
    /// `for [reverse] (x in arr)` walks indexes 0..=length-1. Both compile
    /// to the check -> body -> step shape with the bounds kept on the
    /// operand stack.
    fn parse_for(&mut self, block: BlockId) -> Result<(), ParseError> {
        self.lex.advance()?;
        let reverse = self.lex.token == Token::Reverse;
        if reverse {
            self.lex.advance()?;
        }
        self.expect(Token::OpenPar, "\"(\" is required")?;
        if matches!(self.lex.token, Token::Let | Token::Real) {
            self.lex.advance()?;
        }
        let Token::Word(counter) = self.lex.token.clone() else {
            return Err(self.err("an identifier is required"));
        };
        self.lex.advance()?;
        self.expect(Token::In, "\"in\" is required")?;

        // A lone identifier before ")" iterates an array; anything else is
        // a range expression.
        let array_walk = if matches!(self.lex.token, Token::Word(_)) {
            let mut peek = self.lex.clone();
            peek.advance()?;
            peek.token == Token::ClosePar
        } else {
            false
        };
        if array_walk {
            self.emit(block, Op::PushValue(Val::real(0.0)));
            self.parse_expression(block)?;
            self.write_operation(block, "length", 1)?;
            self.write_operation(block, "predecessor", 1)?;
        } else {
            self.parse_expression(block)?;
            self.expect(Token::Range, "\"..\" is required")?;
            self.parse_expression(block)?;
        }
        self.expect(Token::ClosePar, "\")\" is required")?;

        // Stack: ascending keeps the moving bound on top, descending walks
        // the end bound down toward the start.
        if !reverse {
            self.emit(block, Op::Swap);
        }
        let head = self.code_len(block);
        self.emit(block, Op::Dup2);
        self.write_operation(block, "compare", 2)?;
        self.emit(block, if reverse { Op::LoopDescent } else { Op::LoopAscent });

        let level = self.program.blocks[block].level;
        let body = self.program.new_block(level + 1, BlockKind::Loop);
        self.parse_block(body, std::slice::from_ref(&counter), false)?;
        self.emit(block, Op::Dup);
        self.emit(block, Op::Call { block: body, argc: 1 });
        self.write_operation(block, if reverse { "predecessor" } else { "successor" }, 1)?;
        self.emit(block, Op::LoopBack { target: head });
        self.emit(block, Op::Pop);
        self.emit(block, Op::Pop);
        Ok(())
    }

    fn parse_if(&mut self, block: BlockId) -> Result<(), ParseError> {
        self.lex.advance()?;
        self.emit(block, Op::CaseBegin);
        self.parse_parentheses(block)?;
        self.emit(block, Op::CaseIfNot);
        self.parse_inline_block(block, BlockKind::Normal)?;
        while self.lex.token == Token::Else {
            self.lex.advance()?;
            self.emit(block, Op::CaseNext);
            if self.lex.token == Token::If {
                self.lex.advance()?;
                self.parse_parentheses(block)?;
                self.emit(block, Op::CaseIfNot);
                self.parse_inline_block(block, BlockKind::Normal)?;
            } else {
                self.parse_inline_block(block, BlockKind::Normal)?;
                break;
            }
        }
        self.emit(block, Op::CaseEnd);
        Ok(())
    }

    /// `events (x) => on (a, b) { } ... else { }`: dispatch on equality of
    /// the scrutinee against each `on` value list.
    fn parse_events(&mut self, block: BlockId) -> Result<(), ParseError> {
        self.lex.advance()?;
        self.parse_parentheses(block)?;
        self.expect(Token::Arrow, "\"=>\" is required")?;
        self.emit(block, Op::CaseBegin);
        while self.lex.token == Token::On {
            self.lex.advance()?;
            if self.lex.token != Token::OpenPar {
                return Err(self.err("\"(\" is required"));
            }
            // Inner region: leave `true` as soon as one value matches.
            self.emit(block, Op::CaseBegin);
            loop {
                self.lex.advance()?;
                self.emit(block, Op::Dup);
                self.parse_expression(block)?;
                self.write_operation(block, "compare", 2)?;
                self.emit(block, Op::CompareEq);
                self.emit(block, Op::Dup);
                self.emit(block, Op::CaseIf);
                self.emit(block, Op::Pop);
                if self.lex.token != Token::Comma {
                    break;
                }
            }
            self.emit(block, Op::PushValue(Val::boolean(false)));
            self.emit(block, Op::CaseEnd);
            self.expect(Token::ClosePar, "\")\" is required")?;
            self.emit(block, Op::CaseIfNot);
            self.emit(block, Op::Pop);
            self.parse_inline_block(block, BlockKind::Normal)?;
            self.emit(block, Op::CaseNext);
        }
        if self.lex.token != Token::Else {
            return Err(self.err("an events dispatch must end with an \"else\" clause"));
        }
        self.lex.advance()?;
        self.emit(block, Op::Pop);
        self.parse_inline_block(block, BlockKind::Normal)?;
        self.emit(block, Op::CaseEnd);
        Ok(())
    }

    fn parse_return(&mut self, block: BlockId) -> Result<(), ParseError> {
        self.lex.advance()?;
        self.check_return_context()?;
        match self.lex.token {
            Token::End | Token::Invalid | Token::Semicolon | Token::CloseCur => {}
            _ => {
                self.parse_expression(block)?;
                let Some(Symbol { level, slot: Some(slot), .. }) = self.search_result() else {
                    return Err(self.err("only a function can return a value"));
                };
                self.emit(block, Op::Assign { level, slot });
            }
        }
        self.emit(block, Op::BreakRoutine);
        Ok(())
    }

    /// A routine declaration. The block itself was created by the
    /// pre-scan; this parses the parameter list and the body. `@name`
    /// additionally records a top-level event.
    fn parse_routine(&mut self, block: BlockId, is_event: bool) -> Result<(), ParseError> {
        self.lex.advance()?;
        let Token::Word(name) = self.lex.token.clone() else {
            return Err(self.err("an identifier is required"));
        };
        let Some(Symbol {
            block: Some(target), ..
        }) = self.search(&name)
        else {
            return Err(self.err(format!("internal error: routine {name} is unregistered")));
        };
        if is_event {
            if self.program.blocks[target].level > 1 {
                return Err(self.err("events cannot be declared below the top level"));
            }
            self.program.events.insert(name.clone(), target);
        }
        self.lex.advance()?;

        let kind = self.program.blocks[target].kind;
        let mut args: Vec<String> = Vec::new();
        if kind != BlockKind::Sub {
            if self.lex.token == Token::OpenPar {
                self.lex.advance()?;
                while matches!(self.lex.token, Token::Word(_) | Token::Let | Token::Real) {
                    if matches!(self.lex.token, Token::Let | Token::Real) {
                        self.lex.advance()?;
                        if !matches!(self.lex.token, Token::Word(_)) {
                            return Err(self.err("a parameter name is required"));
                        }
                    }
                    if let Token::Word(param) = &self.lex.token {
                        args.push(param.clone());
                    }
                    self.lex.advance()?;
                    if self.lex.token != Token::Comma {
                        break;
                    }
                    self.lex.advance()?;
                }
                self.expect(Token::ClosePar, "\")\" is required")?;
            }
        } else {
            // Tolerate an empty parameter list on subs.
            if self.lex.token == Token::OpenPar {
                self.lex.advance()?;
                self.expect(Token::ClosePar, "a sub does not take parameters")?;
            }
        }
        self.parse_block(target, &args, kind == BlockKind::Function)
    }
}
