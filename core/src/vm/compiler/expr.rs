//! Expression parsing: precedence climbing, each operator compiled as a
//! call to its named operation.

use crate::token::{ParseError, Token};
use crate::val::Val;
use crate::vm::bytecode::{BlockId, BlockKind, Op};

use super::Compiler;

impl Compiler<'_, '_> {
    pub(super) fn parse_expression(&mut self, block: BlockId) -> Result<(), ParseError> {
        self.parse_logic(block)
    }

    /// `&&` / `||` reuse the conditional-region machinery: duplicate the
    /// left operand, conditionally skip the right one.
    fn parse_logic(&mut self, block: BlockId) -> Result<(), ParseError> {
        self.parse_comparison(block)?;
        while matches!(self.lex.token, Token::AndThen | Token::OrElse) {
            let guard = if self.lex.token == Token::AndThen {
                Op::CaseIfNot
            } else {
                Op::CaseIf
            };
            self.lex.advance()?;
            self.emit(block, Op::Dup);
            self.emit(block, Op::CaseBegin);
            self.emit(block, guard);
            self.emit(block, Op::Pop);
            self.parse_comparison(block)?;
            self.emit(block, Op::CaseEnd);
        }
        Ok(())
    }

    fn parse_comparison(&mut self, block: BlockId) -> Result<(), ParseError> {
        self.parse_sum(block)?;
        let op = match self.lex.token {
            Token::Assign => return Err(self.err("did you mistake \"=\" for \"==\"?")),
            Token::Eq => Op::CompareEq,
            Token::Gt => Op::CompareGt,
            Token::Ge => Op::CompareGe,
            Token::Lt => Op::CompareLt,
            Token::Le => Op::CompareLe,
            Token::Ne => Op::CompareNe,
            _ => return Ok(()),
        };
        self.lex.advance()?;
        self.parse_sum(block)?;
        self.write_operation(block, "compare", 2)?;
        self.emit(block, op);
        Ok(())
    }

    fn parse_sum(&mut self, block: BlockId) -> Result<(), ParseError> {
        self.parse_product(block)?;
        loop {
            let name = match self.lex.token {
                Token::Tilde => "concatenate",
                Token::Plus => "add",
                Token::Minus => "subtract",
                _ => return Ok(()),
            };
            self.lex.advance()?;
            self.parse_product(block)?;
            self.write_operation(block, name, 2)?;
        }
    }

    fn parse_product(&mut self, block: BlockId) -> Result<(), ParseError> {
        self.parse_prefix(block)?;
        loop {
            let name = match self.lex.token {
                Token::Asterisk => "multiply",
                Token::Slash => "divide",
                Token::Percent => "remainder",
                _ => return Ok(()),
            };
            self.lex.advance()?;
            self.parse_prefix(block)?;
            self.write_operation(block, name, 2)?;
        }
    }

    fn parse_prefix(&mut self, block: BlockId) -> Result<(), ParseError> {
        match self.lex.token {
            Token::Plus => {
                self.lex.advance()?;
                self.parse_prefix(block)
            }
            Token::Minus => {
                self.lex.advance()?;
                self.parse_prefix(block)?;
                self.write_operation(block, "negative", 1)
            }
            Token::Exclamation => {
                self.lex.advance()?;
                self.parse_prefix(block)?;
                self.write_operation(block, "not", 1)
            }
            _ => self.parse_suffix(block),
        }
    }

    /// Power is right-associative by self-recursion; otherwise indexing and
    /// slicing postfixes apply.
    fn parse_suffix(&mut self, block: BlockId) -> Result<(), ParseError> {
        self.parse_clause(block)?;
        if self.lex.token == Token::Caret {
            self.lex.advance()?;
            self.parse_suffix(block)?;
            self.write_operation(block, "power", 2)?;
        } else {
            while self.lex.token == Token::OpenBra {
                self.lex.advance()?;
                self.parse_expression(block)?;
                if self.lex.token == Token::Range {
                    self.lex.advance()?;
                    self.parse_expression(block)?;
                    self.write_operation(block, "slice", 3)?;
                } else {
                    self.write_operation(block, "index", 2)?;
                }
                self.expect(Token::CloseBra, "\"]\" is required")?;
            }
        }
        Ok(())
    }

    fn parse_clause(&mut self, block: BlockId) -> Result<(), ParseError> {
        match self.lex.token.clone() {
            Token::Number(v) => {
                self.emit(block, Op::PushValue(Val::real(v)));
                self.lex.advance()
            }
            Token::Char(c) => {
                self.emit(block, Op::PushValue(Val::character(c)));
                self.lex.advance()
            }
            Token::Str(s) => {
                let mut text = s;
                self.lex.advance()?;
                // Adjacent string/char literals concatenate.
                loop {
                    match &self.lex.token {
                        Token::Str(more) => text.push_str(more),
                        Token::Char(c) => text.push(*c),
                        _ => break,
                    }
                    self.lex.advance()?;
                }
                self.emit(block, Op::PushValue(Val::string(&text)));
                Ok(())
            }
            Token::Word(name) => {
                let Some(sym) = self.search(&name) else {
                    return Err(self.err(format!("{name} is an undeclared identifier")));
                };
                self.lex.advance()?;
                match sym.block {
                    Some(target) => {
                        if self.program.blocks[target].kind != BlockKind::Function {
                            return Err(
                                self.err("a sub or task cannot be called inside an expression")
                            );
                        }
                        let argc = self.parse_arguments(block)?;
                        if argc != self.program.blocks[target].arguments {
                            return Err(self.err(format!("wrong number of arguments for {name}")));
                        }
                        self.emit(block, Op::CallPush { block: target, argc });
                    }
                    None => {
                        let Some(slot) = sym.slot else {
                            return Err(self.err(format!("{name} cannot be used as a value")));
                        };
                        self.emit(block, Op::PushVariable { level: sym.level, slot });
                    }
                }
                Ok(())
            }
            Token::OpenBra => {
                // Array literal: start from an empty string-typed array and
                // append; the first element fixes the type.
                self.lex.advance()?;
                self.emit(block, Op::PushValue(Val::string("")));
                while self.lex.token != Token::CloseBra {
                    self.parse_expression(block)?;
                    self.write_operation(block, "append", 2)?;
                    if self.lex.token != Token::Comma {
                        break;
                    }
                    self.lex.advance()?;
                }
                self.expect(Token::CloseBra, "\"]\" is required")
            }
            Token::OpenAbs => {
                self.lex.advance()?;
                self.parse_expression(block)?;
                self.write_operation(block, "absolute", 1)?;
                self.expect(Token::CloseAbs, "\"|)\" is required")
            }
            Token::OpenPar => self.parse_parentheses(block),
            _ => Err(self.err("not a valid expression term")),
        }
    }

    pub(super) fn parse_parentheses(&mut self, block: BlockId) -> Result<(), ParseError> {
        self.expect(Token::OpenPar, "\"(\" is required")?;
        self.parse_expression(block)?;
        self.expect(Token::ClosePar, "\")\" is required")?;
        Ok(())
    }

    /// A parenthesized argument list; absent parentheses mean zero
    /// arguments.
    pub(super) fn parse_arguments(&mut self, block: BlockId) -> Result<usize, ParseError> {
        let mut argc = 0;
        if self.lex.token == Token::OpenPar {
            self.lex.advance()?;
            while self.lex.token != Token::ClosePar {
                argc += 1;
                self.parse_expression(block)?;
                if self.lex.token != Token::Comma {
                    break;
                }
                self.lex.advance()?;
            }
            self.expect(Token::ClosePar, "\")\" is required")?;
        }
        Ok(argc)
    }
}
