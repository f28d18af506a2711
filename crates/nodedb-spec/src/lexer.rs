//! Tokenizer for node bodies.
//!
//! Comments and quoted strings become single tokens, so keywords inside
//! them can never start a new field span.

/// Value substituted for `pi` and its common fractions.
const PI_CONSTANTS: &[(&str, &str)] = &[
    ("pi/12", "0.26179938779914941"),
    ("pi/2", "1.5707963267948966"),
    ("pi/4", "0.78539816339744828"),
    ("pi", "3.1415926535897931"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    /// Double-quoted string; the token text keeps quotes and escapes.
    Str,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
    Pipe,
    /// `#` to end of line; the token text is the trimmed remainder.
    Comment,
    /// Any other single character.
    Punct,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// Byte offsets into the source.
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    pub fn is_ident(&self, text: &str) -> bool {
        self.kind == TokenKind::Ident && self.text == text
    }
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat_while(&mut self, mut pred: impl FnMut(char) -> bool) {
        while self.peek().is_some_and(&mut pred) {
            self.bump();
        }
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token {
        Token {
            kind,
            text: self.src[start..self.pos].to_string(),
            start,
            end: self.pos,
        }
    }

    fn starts_number(&self, c: char) -> bool {
        if c.is_ascii_digit() {
            return true;
        }
        match (c, self.peek_nth(1), self.peek_nth(2)) {
            ('+' | '-', Some(d), _) if d.is_ascii_digit() => true,
            ('+' | '-', Some('.'), Some(d)) if d.is_ascii_digit() => true,
            ('.', Some(d), _) if d.is_ascii_digit() => true,
            _ => false,
        }
    }

    fn number(&mut self, start: usize) -> Token {
        self.bump();
        let mut prev = ' ';
        while let Some(c) = self.peek() {
            let exponent_sign = matches!(c, '+' | '-')
                && matches!(prev, 'e' | 'E')
                && !self.src[start..self.pos].contains(['x', 'X']);
            if c.is_ascii_alphanumeric() || c == '.' || exponent_sign {
                prev = c;
                self.bump();
            } else {
                break;
            }
        }
        self.token(TokenKind::Number, start)
    }

    fn string(&mut self, start: usize) -> Token {
        self.bump();
        while let Some(c) = self.bump() {
            match c {
                '"' => break,
                '\\' => {
                    self.bump();
                }
                _ => {}
            }
        }
        self.token(TokenKind::Str, start)
    }

    fn ident(&mut self, start: usize) -> Token {
        self.eat_while(|c| c.is_ascii_alphanumeric() || c == '_');
        if &self.src[start..self.pos] == "pi" {
            return self.pi_constant(start);
        }
        self.token(TokenKind::Ident, start)
    }

    fn pi_constant(&mut self, start: usize) -> Token {
        let rest = &self.src[start..];
        let (matched, value) = PI_CONSTANTS
            .iter()
            .copied()
            .find(|(text, _)| {
                rest.starts_with(text)
                    && !rest[text.len()..].starts_with(|c: char| c.is_ascii_digit())
            })
            .unwrap_or(("pi", "3.1415926535897931"));
        self.pos = start + matched.len();
        Token {
            kind: TokenKind::Number,
            text: value.to_string(),
            start,
            end: self.pos,
        }
    }

    fn comment(&mut self, start: usize) -> Token {
        self.bump();
        self.eat_while(|c| c != '\n');
        Token {
            kind: TokenKind::Comment,
            text: self.src[start + 1..self.pos].trim().to_string(),
            start,
            end: self.pos,
        }
    }

    fn next_token(&mut self) -> Option<Token> {
        self.eat_while(char::is_whitespace);
        let start = self.pos;
        let c = self.peek()?;
        let token = match c {
            '#' => self.comment(start),
            '"' => self.string(start),
            c if self.starts_number(c) => self.number(start),
            c if c.is_ascii_alphabetic() || c == '_' => self.ident(start),
            _ => {
                self.bump();
                let kind = match c {
                    '[' => TokenKind::LBracket,
                    ']' => TokenKind::RBracket,
                    '(' => TokenKind::LParen,
                    ')' => TokenKind::RParen,
                    ',' => TokenKind::Comma,
                    '|' => TokenKind::Pipe,
                    _ => TokenKind::Punct,
                };
                self.token(kind, start)
            }
        };
        Some(token)
    }
}

/// Split `src` into tokens, skipping whitespace.
pub fn tokenize(src: &str) -> Vec<Token> {
    let mut lexer = Lexer { src, pos: 0 };
    std::iter::from_fn(|| lexer.next_token()).collect()
}
