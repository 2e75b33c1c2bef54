use super::Parser;
use crate::ast::*;
use crate::error::CompileError;
use crate::lexer::Token;

impl<'a> Parser<'a> {
    pub(super) fn parse_function(&mut self) -> Result<FunctionDecl, CompileError> {
        let pos = self.cur_pos();
        self.advance();
        let name = self.take_word()?;
        self.expect_lparen()?;
        self.expect_rparen()?;
        let body = self.parse_block()?;
        Ok(FunctionDecl {
            name,
            body,
            pos,
            implicit: false,
        })
    }

    /// `obj a, b("minecraft.custom:minecraft.jump")`
    pub(super) fn parse_objectives(&mut self, pos: Position) -> Result<Stmt, CompileError> {
        let mut decls = Vec::new();
        loop {
            let decl_pos = self.cur_pos();
            let name = self.take_word()?;
            let criteria = if self.peek() == &Token::LParen {
                self.advance();
                let c = match self.peek().clone() {
                    Token::Word(w) | Token::Str(w) => {
                        self.advance();
                        w
                    }
                    other => {
                        return Err(self.err(format!("expected objective criteria, got {:?}", other)))
                    }
                };
                self.expect_rparen()?;
                c
            } else {
                "dummy".to_owned()
            };
            decls.push(ObjectiveDecl {
                name,
                criteria,
                pos: decl_pos,
            });
            if self.peek() == &Token::Comma {
                self.advance();
                continue;
            }
            break;
        }
        self.end_stmt()?;
        Ok(Stmt {
            kind: StmtKind::Objectives(decls),
            pos,
        })
    }

    /// `var a:x, a:y`
    pub(super) fn parse_vars(&mut self, pos: Position) -> Result<Stmt, CompileError> {
        let mut refs = vec![self.parse_score_ref()?];
        while self.peek() == &Token::Comma {
            self.advance();
            refs.push(self.parse_score_ref()?);
        }
        self.end_stmt()?;
        Ok(Stmt {
            kind: StmtKind::Vars(refs),
            pos,
        })
    }

    /// `const NAME = 10` or `const NAME = "text"`
    pub(super) fn parse_const(&mut self, pos: Position) -> Result<Stmt, CompileError> {
        let name = self.take_word()?;
        self.expect(Token::Assign, "=")?;
        let value = match self.peek().clone() {
            Token::Str(s) => {
                self.advance();
                ConstValue::Str(s)
            }
            Token::Int(_) | Token::Minus => ConstValue::Int(self.parse_int_literal()?.0),
            Token::VStr(_) => {
                return Err(self.err("constant values cannot be interpolated strings"));
            }
            other => {
                return Err(self.err(format!(
                    "expected integer or string constant value, got {:?}",
                    other
                )))
            }
        };
        self.end_stmt()?;
        Ok(Stmt {
            kind: StmtKind::Const { name, value },
            pos,
        })
    }
}
