/// Recursive-descent parser: tokens -> [`SourceFile`].
/// All nodes carry the position of their first token.
/// Parsing fails fast: the first grammar violation aborts.
use crate::ast::{FunctionDecl, Position, SourceFile, StmtKind};
use crate::error::CompileError;
use crate::lexer::{Spanned, Token};

mod declarations;
mod expressions;
mod statements;

// ──────────────────────────────────────────────
// Parser
// ──────────────────────────────────────────────

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Spanned]) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn cur(&self) -> &Spanned {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        &self.cur().token
    }

    fn peek_next(&self) -> &Token {
        let i = (self.pos + 1).min(self.tokens.len() - 1);
        &self.tokens[i].token
    }

    fn cur_pos(&self) -> Position {
        self.cur().pos()
    }

    /// Line of the most recently consumed token.
    fn prev_line(&self) -> u32 {
        match self.pos.checked_sub(1) {
            Some(i) => self.tokens[i].line,
            None => 0,
        }
    }

    fn advance(&mut self) -> &Spanned {
        let t = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, expected: Token, shown: &str) -> Result<Position, CompileError> {
        if self.peek() == &expected {
            let pos = self.cur_pos();
            self.advance();
            Ok(pos)
        } else {
            Err(self.err(format!("expected '{}', got {:?}", shown, self.peek())))
        }
    }

    fn expect_lparen(&mut self) -> Result<Position, CompileError> {
        self.expect(Token::LParen, "(")
    }

    fn expect_rparen(&mut self) -> Result<Position, CompileError> {
        self.expect(Token::RParen, ")")
    }

    fn expect_lbrace(&mut self) -> Result<Position, CompileError> {
        self.expect(Token::LBrace, "{")
    }

    fn expect_rbrace(&mut self) -> Result<Position, CompileError> {
        self.expect(Token::RBrace, "}")
    }

    fn err(&self, msg: impl Into<String>) -> CompileError {
        CompileError::parse(self.cur_pos(), msg)
    }

    fn is_word(&self, w: &str) -> bool {
        matches!(self.peek(), Token::Word(x) if x == w)
    }

    fn take_word(&mut self) -> Result<String, CompileError> {
        if let Token::Word(w) = self.peek().clone() {
            self.advance();
            Ok(w)
        } else {
            Err(self.err(format!("expected identifier, got {:?}", self.peek())))
        }
    }

    /// Statement terminator: `;`, a line break, a closing `}` or end of input.
    fn end_stmt(&mut self) -> Result<(), CompileError> {
        match self.peek() {
            Token::Semi => {
                self.advance();
                Ok(())
            }
            Token::RBrace | Token::Eof => Ok(()),
            _ if self.cur().line > self.prev_line() => Ok(()),
            other => Err(self.err(format!(
                "expected ';' or line break after statement, got {:?}",
                other
            ))),
        }
    }

    // -- File level ------------------------------------------------

    fn parse_file(&mut self, entry: &str) -> Result<SourceFile, CompileError> {
        let mut file = SourceFile::default();
        let mut top_level = Vec::new();
        let mut entry_pos: Option<Position> = None;

        while self.peek() != &Token::Eof {
            if self.peek() == &Token::Semi {
                self.advance();
                continue;
            }
            if self.is_word("func") {
                let func = self.parse_function()?;
                file.functions.push(func);
                continue;
            }
            let stmt = self.parse_stmt()?;
            if matches!(stmt.kind, StmtKind::Const { .. }) {
                file.constants.push(stmt);
            } else {
                entry_pos.get_or_insert(stmt.pos);
                top_level.push(stmt);
            }
        }

        if let Some(pos) = entry_pos {
            file.functions.insert(
                0,
                FunctionDecl {
                    name: entry.to_owned(),
                    body: top_level,
                    pos,
                    implicit: true,
                },
            );
        }
        Ok(file)
    }
}

/// Parse a token stream. Top-level statements other than `const` are
/// collected into an implicit function named `entry`. The stream must end
/// with [`Token::Eof`], as [`lex`](crate::lexer::lex) produces it.
pub fn parse(tokens: &[Spanned], entry: &str) -> Result<SourceFile, CompileError> {
    match tokens.last() {
        Some(last) if last.token == Token::Eof => {}
        Some(last) => {
            return Err(CompileError::parse(
                last.pos(),
                "token stream does not end with end of input",
            ))
        }
        None => {
            return Err(CompileError::parse(
                Position::new(1, 1),
                "empty token stream, expected at least end of input",
            ))
        }
    }
    let mut p = Parser::new(tokens);
    let file = p.parse_file(entry)?;
    tracing::debug!(functions = file.functions.len(), "parsed source");
    Ok(file)
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
