use crate::ast::{Position, RawLine};
use crate::error::CompileError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifiers and keywords; the parser tells them apart
    Word(String),
    /// Quoted string literal (content without quotes, escapes resolved)
    Str(String),
    /// `v"..."` interpolated string literal
    VStr(String),
    /// Unsigned integer literal; sign and range are the parser's concern
    Int(i64),
    /// Verbatim lines captured after `runs {`
    RawBlock(Vec<RawLine>),
    // Punctuation
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Colon,
    Comma,
    Semi,
    // Comparison operators
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    // Assignment
    Assign,      // =
    PlusAssign,  // +=
    MinusAssign, // -=
    // Arithmetic operators
    Plus,
    Minus,
    // End of input
    Eof,
}

#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    pub line: u32,
    pub column: u32,
}

impl Spanned {
    pub fn pos(&self) -> Position {
        Position::new(self.line, self.column)
    }
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
}

impl Lexer {
    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn here(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek_at(0) {
            if c == '/' && self.peek_at(1) == Some('/') {
                while self.peek_at(0).is_some_and(|c| c != '\n') {
                    self.bump();
                }
            } else if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    /// Body of a quoted literal; the opening quote is already consumed.
    fn string_body(&mut self, start: Position) -> Result<String, CompileError> {
        let mut s = String::new();
        loop {
            let Some(sc) = self.bump() else {
                return Err(CompileError::lex(start, "unterminated string literal"));
            };
            match sc {
                '"' => return Ok(s),
                '\n' => return Err(CompileError::lex(start, "unterminated string literal")),
                '\\' => {
                    let Some(esc) = self.bump() else {
                        return Err(CompileError::lex(start, "unterminated escape in string"));
                    };
                    match esc {
                        '"' => s.push('"'),
                        '\\' => s.push('\\'),
                        'n' => s.push('\n'),
                        't' => s.push('\t'),
                        '\n' => {
                            return Err(CompileError::lex(start, "unterminated string literal"))
                        }
                        other => {
                            s.push('\\');
                            s.push(other);
                        }
                    }
                }
                _ => s.push(sc),
            }
        }
    }

    /// Capture a `runs` block; the opening brace is already consumed.
    ///
    /// Brace depth and `//` comments are only recognized outside quoted text.
    fn raw_block(&mut self, open: Position) -> Result<Vec<RawLine>, CompileError> {
        let mut lines = Vec::new();
        let mut current = String::new();
        let mut current_line = self.line;
        let mut depth = 1u32;
        let mut in_str = false;
        let mut in_comment = false;

        fn finish(lines: &mut Vec<RawLine>, current: &mut String, line: u32) {
            let text = current.trim();
            if !text.is_empty() {
                lines.push(RawLine {
                    text: text.to_owned(),
                    line,
                });
            }
            current.clear();
        }

        loop {
            let at = self.here();
            let Some(c) = self.bump() else {
                return Err(CompileError::lex(open, "unterminated runs block"));
            };
            if c == '\n' {
                finish(&mut lines, &mut current, current_line);
                current_line = self.line;
                in_str = false;
                in_comment = false;
                continue;
            }
            if in_comment || c == '\r' {
                continue;
            }
            if in_str {
                current.push(c);
                if c == '\\' {
                    if let Some(next) = self.peek_at(0).filter(|n| *n != '\n') {
                        self.bump();
                        current.push(next);
                    }
                } else if c == '"' {
                    in_str = false;
                }
                continue;
            }
            match c {
                '"' => {
                    in_str = true;
                    current.push(c);
                }
                '/' if self.peek_at(0) == Some('/') => in_comment = true,
                'v' if self.peek_at(0) == Some('"')
                    && !current.chars().last().is_some_and(is_ident_char) =>
                {
                    return Err(CompileError::lex(
                        at,
                        "interpolated string literal is not allowed inside a runs block",
                    ));
                }
                '{' => {
                    depth += 1;
                    current.push(c);
                }
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        finish(&mut lines, &mut current, current_line);
                        return Ok(lines);
                    }
                    current.push(c);
                }
                _ => current.push(c),
            }
        }
    }

    /// After the `runs` keyword: is the next significant character a `{`?
    fn brace_follows(&self) -> bool {
        self.chars[self.pos..]
            .iter()
            .find(|c| !c.is_whitespace())
            .is_some_and(|c| *c == '{')
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

pub fn lex(src: &str) -> Result<Vec<Spanned>, CompileError> {
    let mut lx = Lexer {
        chars: src.chars().collect(),
        pos: 0,
        line: 1,
        column: 1,
    };
    let mut tokens = Vec::new();

    loop {
        lx.skip_trivia();
        let start = lx.here();
        let Some(c) = lx.peek_at(0) else {
            break;
        };
        let push = |tokens: &mut Vec<Spanned>, token: Token| {
            tokens.push(Spanned {
                token,
                line: start.line,
                column: start.column,
            });
        };

        // Interpolated string literal
        if c == 'v' && lx.peek_at(1) == Some('"') {
            lx.bump();
            lx.bump();
            let s = lx.string_body(start)?;
            push(&mut tokens, Token::VStr(s));
            continue;
        }

        // String literal
        if c == '"' {
            lx.bump();
            let s = lx.string_body(start)?;
            push(&mut tokens, Token::Str(s));
            continue;
        }

        // Number
        if c.is_ascii_digit() {
            let mut digits = String::new();
            while let Some(d) = lx.peek_at(0).filter(char::is_ascii_digit) {
                digits.push(d);
                lx.bump();
            }
            let n: i64 = digits
                .parse()
                .map_err(|_| CompileError::lex(start, format!("invalid integer '{}'", digits)))?;
            push(&mut tokens, Token::Int(n));
            continue;
        }

        // Identifier / keyword
        if c.is_alphabetic() || c == '_' {
            let mut word = String::new();
            while let Some(w) = lx.peek_at(0).filter(|w| is_ident_char(*w)) {
                word.push(w);
                lx.bump();
            }
            if word == "runs" && lx.brace_follows() {
                push(&mut tokens, Token::Word(word));
                lx.skip_trivia();
                let open = lx.here();
                lx.bump();
                let lines = lx.raw_block(open)?;
                tokens.push(Spanned {
                    token: Token::RawBlock(lines),
                    line: open.line,
                    column: open.column,
                });
            } else {
                push(&mut tokens, Token::Word(word));
            }
            continue;
        }

        // Operators and punctuation
        let next = lx.peek_at(1);
        let (token, width) = match (c, next) {
            ('=', Some('=')) => (Token::Eq, 2),
            ('=', _) => (Token::Assign, 1),
            ('!', Some('=')) => (Token::Neq, 2),
            ('<', Some('=')) => (Token::Lte, 2),
            ('<', _) => (Token::Lt, 1),
            ('>', Some('=')) => (Token::Gte, 2),
            ('>', _) => (Token::Gt, 1),
            ('+', Some('=')) => (Token::PlusAssign, 2),
            ('+', _) => (Token::Plus, 1),
            ('-', Some('=')) => (Token::MinusAssign, 2),
            ('-', _) => (Token::Minus, 1),
            ('{', _) => (Token::LBrace, 1),
            ('}', _) => (Token::RBrace, 1),
            ('[', _) => (Token::LBracket, 1),
            (']', _) => (Token::RBracket, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            (':', _) => (Token::Colon, 1),
            (',', _) => (Token::Comma, 1),
            (';', _) => (Token::Semi, 1),
            _ => {
                return Err(CompileError::lex(
                    start,
                    format!("unexpected character '{}'", c),
                ))
            }
        };
        for _ in 0..width {
            lx.bump();
        }
        push(&mut tokens, token);
    }

    tokens.push(Spanned {
        token: Token::Eof,
        line: lx.line,
        column: lx.column,
    });
    tracing::debug!(tokens = tokens.len(), "lexed source");
    Ok(tokens)
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Stage;

    fn kinds(src: &str) -> Vec<Token> {
        lex(src)
            .expect("lex should succeed")
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn operators_and_punctuation() {
        assert_eq!(
            kinds("a:x += 1; b:y -= c:z == != <= >= < > = + -"),
            vec![
                Token::Word("a".into()),
                Token::Colon,
                Token::Word("x".into()),
                Token::PlusAssign,
                Token::Int(1),
                Token::Semi,
                Token::Word("b".into()),
                Token::Colon,
                Token::Word("y".into()),
                Token::MinusAssign,
                Token::Word("c".into()),
                Token::Colon,
                Token::Word("z".into()),
                Token::Eq,
                Token::Neq,
                Token::Lte,
                Token::Gte,
                Token::Lt,
                Token::Gt,
                Token::Assign,
                Token::Plus,
                Token::Minus,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn positions_are_one_based() {
        let toks = lex("obj a\n  var a:x").unwrap();
        assert_eq!((toks[0].line, toks[0].column), (1, 1));
        assert_eq!((toks[1].line, toks[1].column), (1, 5));
        assert_eq!((toks[2].line, toks[2].column), (2, 3));
        assert_eq!((toks[5].line, toks[5].column), (2, 9));
    }

    #[test]
    fn strings_and_interpolated_strings() {
        assert_eq!(
            kinds(r#"run("say \"hi\"") show(v"[a:x] pts")"#),
            vec![
                Token::Word("run".into()),
                Token::LParen,
                Token::Str("say \"hi\"".into()),
                Token::RParen,
                Token::Word("show".into()),
                Token::LParen,
                Token::VStr("[a:x] pts".into()),
                Token::RParen,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn identifier_ending_in_v_is_not_interpolation() {
        assert_eq!(
            kinds(r#"nav"x""#),
            vec![
                Token::Word("nav".into()),
                Token::Str("x".into()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("// header\nvar a:x // trailing\n"),
            vec![
                Token::Word("var".into()),
                Token::Word("a".into()),
                Token::Colon,
                Token::Word("x".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn raw_block_captures_trimmed_lines() {
        let toks = kinds("runs {\n    say hi // greet\n\n    tellraw @a {\"text\":\"}\"}\n}\nvar a:x");
        assert_eq!(toks[0], Token::Word("runs".into()));
        match &toks[1] {
            Token::RawBlock(lines) => {
                let text: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
                assert_eq!(text, vec!["say hi", "tellraw @a {\"text\":\"}\"}"]);
                assert_eq!(lines[0].line, 2);
                assert_eq!(lines[1].line, 4);
            }
            other => panic!("expected raw block, got {:?}", other),
        }
        assert_eq!(toks[2], Token::Word("var".into()));
    }

    #[test]
    fn raw_block_on_one_line() {
        let toks = kinds("runs{ say hi }");
        match &toks[1] {
            Token::RawBlock(lines) => {
                assert_eq!(lines.len(), 1);
                assert_eq!(lines[0].text, "say hi");
            }
            other => panic!("expected raw block, got {:?}", other),
        }
    }

    #[test]
    fn raw_block_keeps_urls_inside_quotes() {
        let toks = kinds("runs { tellraw @a \"https://example.org\" }");
        match &toks[1] {
            Token::RawBlock(lines) => {
                assert_eq!(lines[0].text, "tellraw @a \"https://example.org\"");
            }
            other => panic!("expected raw block, got {:?}", other),
        }
    }

    #[test]
    fn interpolation_inside_raw_block_is_rejected() {
        let err = lex("runs {\n  tellraw @a v\"[a:x]\"\n}").unwrap_err();
        assert_eq!(err.stage, Stage::Lex);
        assert_eq!(err.position, Some(Position::new(2, 14)));
    }

    #[test]
    fn unterminated_raw_block() {
        let err = lex("runs {\n say hi\n").unwrap_err();
        assert_eq!(err.stage, Stage::Lex);
        assert_eq!(err.position, Some(Position::new(1, 6)));
    }

    #[test]
    fn unterminated_string() {
        let err = lex("run(\"abc\n)").unwrap_err();
        assert_eq!(err.stage, Stage::Lex);
        assert!(err.message.contains("unterminated string"));
    }

    #[test]
    fn unknown_character() {
        let err = lex("var a:x\n  @").unwrap_err();
        assert_eq!(err.position, Some(Position::new(2, 3)));
        assert_eq!(err.message, "unexpected character '@'");
    }

    #[test]
    fn crlf_line_endings() {
        let toks = lex("var a:x\r\nvar a:y").unwrap();
        assert_eq!(toks[4].line, 2);
        assert_eq!(toks[4].column, 1);
    }
}
