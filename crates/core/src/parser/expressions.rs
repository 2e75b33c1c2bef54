use super::Parser;
use crate::ast::*;
use crate::error::CompileError;
use crate::lexer::Token;

impl<'a> Parser<'a> {
    /// `objective:name`
    pub(super) fn parse_score_ref(&mut self) -> Result<ScoreRef, CompileError> {
        let pos = self.cur_pos();
        let objective = self.take_word()?;
        if self.peek() != &Token::Colon {
            return Err(self.err(format!(
                "expected ':' in score reference '{}:<name>', got {:?}",
                objective,
                self.peek()
            )));
        }
        self.advance();
        let name = self.take_word()?;
        Ok(ScoreRef {
            objective,
            name,
            pos,
        })
    }

    /// `-`? INT, range-checked to i32.
    pub(super) fn parse_int_literal(&mut self) -> Result<(i32, Position), CompileError> {
        let pos = self.cur_pos();
        let negative = if self.peek() == &Token::Minus {
            self.advance();
            true
        } else {
            false
        };
        let magnitude = match self.peek() {
            Token::Int(n) => *n,
            other => return Err(self.err(format!("expected integer, got {:?}", other))),
        };
        self.advance();
        let value = if negative { -magnitude } else { magnitude };
        let value = i32::try_from(value).map_err(|_| {
            CompileError::parse(pos, format!("integer literal {} out of range", value))
        })?;
        Ok((value, pos))
    }

    pub(super) fn parse_operand(&mut self) -> Result<Operand, CompileError> {
        match self.peek().clone() {
            Token::Word(_) if self.peek_next() == &Token::Colon => {
                Ok(Operand::Score(self.parse_score_ref()?))
            }
            Token::Word(name) => {
                let pos = self.cur_pos();
                self.advance();
                Ok(Operand::Const { name, pos })
            }
            Token::Int(_) | Token::Minus => {
                let (value, pos) = self.parse_int_literal()?;
                Ok(Operand::Literal { value, pos })
            }
            other => Err(self.err(format!(
                "expected score reference, integer or constant, got {:?}",
                other
            ))),
        }
    }

    fn arith_op(&self) -> Option<ArithOp> {
        // An operator on a later line starts a new statement.
        if self.cur().line != self.prev_line() {
            return None;
        }
        match self.peek() {
            Token::Plus => Some(ArithOp::Add),
            Token::Minus => Some(ArithOp::Sub),
            _ => None,
        }
    }

    /// `operand (('+' | '-') operand)?` with a score reference on at least one side.
    pub(super) fn parse_expr(&mut self) -> Result<Expr, CompileError> {
        let left = self.parse_operand()?;
        let Some(op) = self.arith_op() else {
            return Ok(Expr::Operand(left));
        };
        let op_pos = self.cur_pos();
        self.advance();
        let right = self.parse_operand()?;
        if !matches!(left, Operand::Score(_)) && !matches!(right, Operand::Score(_)) {
            return Err(CompileError::parse(
                op_pos,
                "score arithmetic needs a score reference on at least one side",
            ));
        }
        if self.arith_op().is_some() {
            return Err(self.err("score arithmetic takes at most one '+' or '-' per statement"));
        }
        Ok(Expr::Binary { op, left, right })
    }

    /// `( ref (cmp operand)? )`
    pub(super) fn parse_condition(&mut self) -> Result<Condition, CompileError> {
        self.expect_lparen()?;
        let lhs = self.parse_score_ref()?;
        let op = match self.peek() {
            Token::Eq => Some(CmpOp::Eq),
            Token::Neq => Some(CmpOp::Ne),
            Token::Lt => Some(CmpOp::Lt),
            Token::Lte => Some(CmpOp::Le),
            Token::Gt => Some(CmpOp::Gt),
            Token::Gte => Some(CmpOp::Ge),
            Token::RParen => None,
            Token::Assign => return Err(self.err("expected comparison operator, got '=' (use '==')")),
            other => return Err(self.err(format!("expected comparison operator, got {:?}", other))),
        };
        let test = match op {
            Some(op) => {
                self.advance();
                Some((op, self.parse_operand()?))
            }
            None => None,
        };
        self.expect_rparen()?;
        Ok(Condition { lhs, test })
    }

    /// Optional `[Q]` after a wait-capable construct.
    pub(super) fn parse_slot(&mut self) -> Result<Option<SlotName>, CompileError> {
        if self.peek() != &Token::LBracket {
            return Ok(None);
        }
        self.advance();
        let pos = self.cur_pos();
        let name = self.take_word()?;
        self.expect(Token::RBracket, "]")?;
        Ok(Some(SlotName { name, pos }))
    }

    pub(super) fn parse_text(&mut self) -> Result<Text, CompileError> {
        let pos = self.cur_pos();
        let (value, interpolated) = match self.peek().clone() {
            Token::Str(s) => (s, false),
            Token::VStr(s) => (s, true),
            other => return Err(self.err(format!("expected string literal, got {:?}", other))),
        };
        self.advance();
        Ok(Text {
            value,
            interpolated,
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

    fn first_stmt(src: &str) -> Result<StmtKind, CompileError> {
        let tokens = lexer::lex(src)?;
        let file = parse(&tokens, "main")?;
        Ok(file.functions[0].body[0].kind.clone())
    }

    fn assigned(src: &str) -> Expr {
        match first_stmt(src).unwrap() {
            StmtKind::Assign { value, .. } => value,
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn binary_forms() {
        assert!(matches!(
            assigned("a:x = a:y + a:z"),
            Expr::Binary {
                op: ArithOp::Add,
                left: Operand::Score(_),
                right: Operand::Score(_)
            }
        ));
        assert!(matches!(
            assigned("a:x = a:y - 3"),
            Expr::Binary {
                op: ArithOp::Sub,
                right: Operand::Literal { value: 3, .. },
                ..
            }
        ));
        assert!(matches!(
            assigned("a:x = 10 - a:y"),
            Expr::Binary {
                left: Operand::Literal { value: 10, .. },
                ..
            }
        ));
        assert!(matches!(
            assigned("a:x = a:y + STEP"),
            Expr::Binary {
                right: Operand::Const { .. },
                ..
            }
        ));
    }

    #[test]
    fn negative_literals() {
        assert!(matches!(
            assigned("a:x = -2147483648"),
            Expr::Operand(Operand::Literal {
                value: i32::MIN,
                ..
            })
        ));
        let err = first_stmt("a:x = 2147483648").unwrap_err();
        assert_eq!(err.stage, Stage::Parse);
        assert!(err.message.contains("out of range"));
    }

    #[test]
    fn literal_plus_literal_is_rejected() {
        let err = first_stmt("a:x = 1 + 2").unwrap_err();
        assert_eq!(err.stage, Stage::Parse);
        assert_eq!(err.position, Some(Position::new(1, 9)));
    }

    #[test]
    fn chained_arithmetic_is_rejected() {
        let err = first_stmt("a:x = a:y + 1 + 2").unwrap_err();
        assert!(err.message.contains("at most one"), "{}", err.message);
    }

    #[test]
    fn operator_on_next_line_starts_a_new_statement() {
        let err = first_stmt("a:x = a:y\n+ 1").unwrap_err();
        assert_eq!(err.position, Some(Position::new(2, 1)));
    }

    #[test]
    fn conditions() {
        match first_stmt("if(a:x != b:y) { }").unwrap() {
            StmtKind::If { cond, slot, .. } => {
                assert!(slot.is_none());
                assert!(matches!(cond.test, Some((CmpOp::Ne, Operand::Score(_)))));
            }
            other => panic!("expected if, got {:?}", other),
        }
        match first_stmt("while(a:x) { }").unwrap() {
            StmtKind::While { cond, .. } => assert!(cond.test.is_none()),
            other => panic!("expected while, got {:?}", other),
        }
    }

    #[test]
    fn single_equals_in_condition_is_explained() {
        let err = first_stmt("if(a:x = 1) { }").unwrap_err();
        assert!(err.message.contains("'=='"), "{}", err.message);
    }
}
