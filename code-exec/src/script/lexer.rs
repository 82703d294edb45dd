use super::error::{ScriptError, ScriptResult};
use super::token::{Keyword, Operator, Position, Punct, Token, TokenKind};

#[derive(Debug, Clone)]
struct Cursor<'a> {
    source: &'a str,
    offset: usize,
    line: u32,
    column: u32,
}

impl<'a> Cursor<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    #[inline]
    fn position(&self) -> Position {
        Position::new(self.line, self.column, self.offset)
    }

    #[inline]
    fn peek(&self) -> Option<char> {
        self.source[self.offset..].chars().next()
    }

    #[inline]
    fn peek_second(&self) -> Option<char> {
        self.source[self.offset..].chars().nth(1)
    }

    #[inline]
    fn peek_is(&self, ch: char) -> bool {
        self.peek() == Some(ch)
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.offset += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn eat(&mut self, ch: char) -> bool {
        if self.peek_is(ch) {
            self.advance();
            true
        } else {
            false
        }
    }

    #[inline]
    fn slice_from(&self, start: usize) -> &'a str {
        &self.source[start..self.offset]
    }

    fn take_while<F>(&mut self, mut pred: F)
    where
        F: FnMut(char) -> bool,
    {
        while let Some(ch) = self.peek() {
            if pred(ch) {
                self.advance();
            } else {
                break;
            }
        }
    }
}

/// Tokenize custom-language source. The returned sequence always ends with
/// an [`TokenKind::Eof`] token.
pub fn tokenize(source: &str) -> ScriptResult<Vec<Token>> {
    let mut cursor = Cursor::new(source);
    let mut tokens = Vec::new();

    loop {
        skip_trivia(&mut cursor)?;
        let start = cursor.position();

        let Some(ch) = cursor.peek() else {
            tokens.push(Token::new(TokenKind::Eof, "", start));
            return Ok(tokens);
        };

        let kind = match ch {
            '"' => TokenKind::Str(read_string(&mut cursor)?),
            '0'..='9' => TokenKind::Number(read_number(&mut cursor)?),
            c if c.is_ascii_alphabetic() || c == '_' => {
                cursor.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
                let ident = cursor.slice_from(start.offset);
                match Keyword::from_ident(ident) {
                    Some(keyword) => TokenKind::Keyword(keyword),
                    None => TokenKind::Identifier(ident.to_string()),
                }
            }
            _ => {
                cursor.advance();
                match ch {
                    '+' => TokenKind::Operator(Operator::Plus),
                    '-' => TokenKind::Operator(Operator::Minus),
                    '*' => TokenKind::Operator(Operator::Star),
                    '/' => TokenKind::Operator(Operator::Slash),
                    '%' => TokenKind::Operator(Operator::Percent),
                    '=' if cursor.eat('=') => TokenKind::Operator(Operator::EqualEqual),
                    '=' => TokenKind::Operator(Operator::Assign),
                    '!' if cursor.eat('=') => TokenKind::Operator(Operator::BangEqual),
                    '!' => TokenKind::Operator(Operator::Bang),
                    '<' if cursor.eat('=') => TokenKind::Operator(Operator::LessEqual),
                    '<' => TokenKind::Operator(Operator::Less),
                    '>' if cursor.eat('=') => TokenKind::Operator(Operator::GreaterEqual),
                    '>' => TokenKind::Operator(Operator::Greater),
                    '&' if cursor.eat('&') => TokenKind::Operator(Operator::AndAnd),
                    '|' if cursor.eat('|') => TokenKind::Operator(Operator::OrOr),
                    '&' | '|' => {
                        return Err(ScriptError::lex(
                            format!("unexpected character '{ch}', did you mean '{ch}{ch}'?"),
                            start,
                        ));
                    }
                    '(' => TokenKind::Punct(Punct::LeftParen),
                    ')' => TokenKind::Punct(Punct::RightParen),
                    '{' => TokenKind::Punct(Punct::LeftBrace),
                    '}' => TokenKind::Punct(Punct::RightBrace),
                    '[' => TokenKind::Punct(Punct::LeftBracket),
                    ']' => TokenKind::Punct(Punct::RightBracket),
                    ',' => TokenKind::Punct(Punct::Comma),
                    ';' => TokenKind::Punct(Punct::Semicolon),
                    other => {
                        return Err(ScriptError::lex(
                            format!("unexpected character '{other}'"),
                            start,
                        ));
                    }
                }
            }
        };

        tokens.push(Token::new(kind, cursor.slice_from(start.offset), start));
    }
}

/// Skip whitespace, `// line` and `/* block */` comments.
fn skip_trivia(cursor: &mut Cursor<'_>) -> ScriptResult<()> {
    loop {
        cursor.take_while(char::is_whitespace);

        match (cursor.peek(), cursor.peek_second()) {
            (Some('/'), Some('/')) => cursor.take_while(|c| c != '\n'),
            (Some('/'), Some('*')) => {
                let start = cursor.position();
                cursor.advance();
                cursor.advance();
                loop {
                    match cursor.advance() {
                        Some('*') if cursor.eat('/') => break,
                        Some(_) => {}
                        None => {
                            return Err(ScriptError::lex("unterminated block comment", start));
                        }
                    }
                }
            }
            _ => return Ok(()),
        }
    }
}

fn read_string(cursor: &mut Cursor<'_>) -> ScriptResult<String> {
    let start = cursor.position();
    cursor.advance();
    let mut value = String::new();

    loop {
        let escape_at = cursor.position();
        match cursor.advance() {
            Some('"') => return Ok(value),
            Some('\\') => {
                let escaped = match cursor.advance() {
                    Some('n') => '\n',
                    Some('t') => '\t',
                    Some('r') => '\r',
                    Some('0') => '\0',
                    Some('\\') => '\\',
                    Some('"') => '"',
                    Some(other) => {
                        return Err(ScriptError::lex(
                            format!("invalid escape sequence '\\{other}'"),
                            escape_at,
                        ));
                    }
                    None => return Err(ScriptError::lex("unterminated string literal", start)),
                };
                value.push(escaped);
            }
            Some(ch) => value.push(ch),
            None => return Err(ScriptError::lex("unterminated string literal", start)),
        }
    }
}

fn read_number(cursor: &mut Cursor<'_>) -> ScriptResult<f64> {
    let start = cursor.position();
    cursor.take_while(|c| c.is_ascii_digit());

    if cursor.peek_is('.') {
        cursor.advance();
        if !cursor.peek().is_some_and(|c| c.is_ascii_digit()) {
            return Err(ScriptError::lex(
                format!(
                    "malformed number literal '{}': expected digits after '.'",
                    cursor.slice_from(start.offset)
                ),
                start,
            ));
        }
        cursor.take_while(|c| c.is_ascii_digit());
    }

    let text = cursor.slice_from(start.offset);
    text.parse::<f64>()
        .map_err(|_| ScriptError::lex(format!("malformed number literal '{text}'"), start))
}
