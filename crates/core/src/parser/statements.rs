use super::Parser;
use crate::ast::*;
use crate::error::CompileError;
use crate::lexer::Token;

impl<'a> Parser<'a> {
    pub(super) fn parse_block(&mut self) -> Result<Vec<Stmt>, CompileError> {
        self.expect_lbrace()?;
        let mut body = Vec::new();
        loop {
            match self.peek() {
                Token::RBrace => break,
                Token::Semi => {
                    self.advance();
                }
                Token::Eof => return Err(self.err("expected '}', got end of input")),
                _ => body.push(self.parse_stmt()?),
            }
        }
        self.expect_rbrace()?;
        Ok(body)
    }

    pub(super) fn parse_stmt(&mut self) -> Result<Stmt, CompileError> {
        let pos = self.cur_pos();
        let word = match self.peek().clone() {
            Token::Word(w) => w,
            other => return Err(self.err(format!("expected statement, got {:?}", other))),
        };
        if self.peek_next() == &Token::Colon {
            return self.parse_assign(pos);
        }
        match word.as_str() {
            "func" => Err(self.err("functions may only be defined at top level")),
            "obj" => {
                self.advance();
                self.parse_objectives(pos)
            }
            "var" => {
                self.advance();
                self.parse_vars(pos)
            }
            "const" => {
                self.advance();
                self.parse_const(pos)
            }
            "if" | "while" => {
                self.advance();
                let cond = self.parse_condition()?;
                let slot = self.parse_slot()?;
                let body = self.parse_block()?;
                let kind = if word == "if" {
                    StmtKind::If { cond, slot, body }
                } else {
                    StmtKind::While { cond, slot, body }
                };
                Ok(Stmt { kind, pos })
            }
            "call" => {
                self.advance();
                let target = self.take_word()?;
                self.expect_lparen()?;
                self.expect_rparen()?;
                let slot = self.parse_slot()?;
                self.end_stmt()?;
                Ok(Stmt {
                    kind: StmtKind::Call { target, slot },
                    pos,
                })
            }
            "run" | "show" => {
                self.advance();
                self.expect_lparen()?;
                let text = self.parse_text()?;
                self.expect_rparen()?;
                self.end_stmt()?;
                let kind = if word == "run" {
                    StmtKind::Run(text)
                } else {
                    StmtKind::Show(text)
                };
                Ok(Stmt { kind, pos })
            }
            "title" => {
                self.advance();
                self.expect_lparen()?;
                let kind_word = self.take_word()?;
                let kind = TitleKind::from_word(&kind_word).ok_or_else(|| {
                    CompileError::parse(
                        self.tokens[self.pos - 1].pos(),
                        format!(
                            "unknown title kind '{}': expected title, subtitle or actionbar",
                            kind_word
                        ),
                    )
                })?;
                self.expect(Token::Comma, ",")?;
                let text = self.parse_text()?;
                self.expect_rparen()?;
                self.end_stmt()?;
                Ok(Stmt {
                    kind: StmtKind::Title { kind, text },
                    pos,
                })
            }
            "rand" => {
                self.advance();
                self.expect_lparen()?;
                let target = self.parse_score_ref()?;
                let range = if self.peek() == &Token::Comma {
                    self.advance();
                    let lo = self.parse_operand()?;
                    self.expect(Token::Comma, ",")?;
                    let hi = self.parse_operand()?;
                    Some((lo, hi))
                } else {
                    None
                };
                self.expect_rparen()?;
                self.end_stmt()?;
                Ok(Stmt {
                    kind: StmtKind::Rand { target, range },
                    pos,
                })
            }
            "runs" => {
                self.advance();
                match self.peek().clone() {
                    Token::RawBlock(lines) => {
                        self.advance();
                        Ok(Stmt {
                            kind: StmtKind::Raw(lines),
                            pos,
                        })
                    }
                    other => Err(self.err(format!("expected '{{' after 'runs', got {:?}", other))),
                }
            }
            _ => Err(self.err(format!("unexpected token '{}'", word))),
        }
    }

    fn parse_assign(&mut self, pos: Position) -> Result<Stmt, CompileError> {
        let target = self.parse_score_ref()?;
        let op = match self.peek() {
            Token::Assign => AssignOp::Set,
            Token::PlusAssign => AssignOp::Add,
            Token::MinusAssign => AssignOp::Sub,
            other => {
                return Err(self.err(format!(
                    "expected '=', '+=' or '-=' after score reference, got {:?}",
                    other
                )))
            }
        };
        self.advance();
        let value = match op {
            AssignOp::Set => self.parse_expr()?,
            AssignOp::Add | AssignOp::Sub => {
                let operand = self.parse_operand()?;
                if matches!(self.peek(), Token::Plus | Token::Minus)
                    && self.cur().line == self.prev_line()
                {
                    return Err(self.err("compound assignment takes a single operand"));
                }
                Expr::Operand(operand)
            }
        };
        self.end_stmt()?;
        Ok(Stmt {
            kind: StmtKind::Assign { target, op, value },
            pos,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::error::{CompileError, Stage};
    use crate::lexer;
    use crate::parser::parse;

    fn body(src: &str) -> Result<Vec<Stmt>, CompileError> {
        let tokens = lexer::lex(src)?;
        let file = parse(&tokens, "main")?;
        Ok(file.functions[0].body.clone())
    }

    #[test]
    fn wait_bearing_constructs_carry_their_slot() {
        let stmts = body(
            "if(a:x==2)[Q1]{ runs{ say hi } }\nwhile(a:x < 5)[W] { a:x += 1 }\ncall worker()[Q2];",
        )
        .unwrap();
        let slots: Vec<&str> = stmts
            .iter()
            .map(|s| s.kind.slot().map(|q| q.name.as_str()).unwrap_or(""))
            .collect();
        assert_eq!(slots, vec!["Q1", "W", "Q2"]);
        match &stmts[0].kind {
            StmtKind::If { body, .. } => {
                assert_eq!(
                    body[0].kind,
                    StmtKind::Raw(vec![RawLine {
                        text: "say hi".into(),
                        line: 1
                    }])
                );
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn slot_position_points_at_the_name() {
        let stmts = body("call worker() [Q2]").unwrap();
        assert_eq!(
            stmts[0].kind.slot().unwrap().pos,
            Position::new(1, 16)
        );
    }

    #[test]
    fn output_statements() {
        let stmts = body(
            "run(\"say hi\")\nshow(v\"[a:x] left\")\ntitle(actionbar, \"go\")\nrand(a:x)\nrand(a:x, 1, MAX)",
        )
        .unwrap();
        assert!(matches!(&stmts[0].kind, StmtKind::Run(t) if !t.interpolated));
        assert!(matches!(&stmts[1].kind, StmtKind::Show(t) if t.interpolated));
        assert!(matches!(
            &stmts[2].kind,
            StmtKind::Title {
                kind: TitleKind::Actionbar,
                ..
            }
        ));
        assert!(matches!(&stmts[3].kind, StmtKind::Rand { range: None, .. }));
        assert!(matches!(
            &stmts[4].kind,
            StmtKind::Rand {
                range: Some((Operand::Literal { value: 1, .. }, Operand::Const { .. })),
                ..
            }
        ));
    }

    #[test]
    fn unknown_title_kind() {
        let err = body("title(bossbar, \"x\")").unwrap_err();
        assert_eq!(err.stage, Stage::Parse);
        assert_eq!(err.position, Some(Position::new(1, 7)));
    }

    #[test]
    fn compound_assignment_rejects_expressions() {
        let err = body("a:x += a:y + 1").unwrap_err();
        assert!(err.message.contains("single operand"), "{}", err.message);
    }

    #[test]
    fn unclosed_block() {
        let err = body("if(a:x) {\n a:x = 1\n").unwrap_err();
        assert_eq!(err.stage, Stage::Parse);
        assert!(err.message.contains("end of input"));
    }

    #[test]
    fn runs_without_block() {
        let err = body("runs say hi").unwrap_err();
        assert!(err.message.contains("after 'runs'"), "{}", err.message);
    }

    #[test]
    fn unknown_keyword() {
        let err = body("repeat(a:x) { }").unwrap_err();
        assert_eq!(err.message, "unexpected token 'repeat'");
        assert_eq!(err.position, Some(Position::new(1, 1)));
    }
}
