mod token;
mod tokens;

pub use self::token::*;
pub use self::tokens::*;

use std::{error::Error, fmt::Display, iter::Peekable, str::Chars};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexerError {
    pub message: String,
    pub line: usize,
}

impl Display for LexerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[line {}] Lexer error: {}", self.line, self.message)
    }
}

impl Error for LexerError {}

/// Scanner for Lox source text. Produces the full token stream in one pass,
/// collecting lexical errors along the way instead of aborting on the first
/// one. The stream always ends with a single EOF token on the last observed
/// line.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    tokens: Vec<Token>,
    errors: Vec<LexerError>,
    line: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            tokens: vec![],
            errors: vec![],
            line: 1,
        }
    }

    pub fn lex(mut self) -> (Vec<Token>, Vec<LexerError>) {
        while let Some(next) = self.next() {
            self.scan(next);
        }

        self.tokens.push(Token::new(TokenKind::Eof, "", self.line));
        (self.tokens, self.errors)
    }

    fn scan(&mut self, next: char) {
        match next {
            '(' => self.push(TokenKind::LeftParen, "("),
            ')' => self.push(TokenKind::RightParen, ")"),
            '{' => self.push(TokenKind::LeftBrace, "{"),
            '}' => self.push(TokenKind::RightBrace, "}"),
            ',' => self.push(TokenKind::Comma, ","),
            '.' => self.push(TokenKind::Dot, "."),
            '-' => self.push(TokenKind::Minus, "-"),
            '+' => self.push(TokenKind::Plus, "+"),
            ';' => self.push(TokenKind::Semicolon, ";"),
            '*' => self.push(TokenKind::Star, "*"),
            '/' => self.lex_slash(),
            '!' => self.lex_operator('=', TokenKind::BangEqual, "!=", TokenKind::Bang, "!"),
            '=' => self.lex_operator('=', TokenKind::EqualEqual, "==", TokenKind::Equal, "="),
            '<' => self.lex_operator('=', TokenKind::LessEqual, "<=", TokenKind::Less, "<"),
            '>' => self.lex_operator('=', TokenKind::GreaterEqual, ">=", TokenKind::Greater, ">"),
            '"' => self.lex_string(),
            '0'..='9' => self.lex_number(next),
            'a'..='z' | 'A'..='Z' | '_' => self.lex_identifier(next),
            ' ' | '\t' | '\r' => {}
            '\n' => self.line += 1,
            _ => self.error(format!("Unknown token: {next}")),
        }
    }

    /// Operators that may combine with a trailing `=` into their two
    /// character form.
    fn lex_operator(
        &mut self,
        trailing: char,
        long_kind: TokenKind,
        long_lexeme: &str,
        short_kind: TokenKind,
        short_lexeme: &str,
    ) {
        if self.next_if_eq(trailing) {
            self.push(long_kind, long_lexeme);
        } else {
            self.push(short_kind, short_lexeme);
        }
    }

    /// A `/` is either a line comment, a block comment, or plain division.
    fn lex_slash(&mut self) {
        if self.next_if_eq('/') {
            // leave the newline in place so the main loop counts it
            while self.next_if(|item| *item != '\n').is_some() {}
        } else if self.next_if_eq('*') {
            // block comments do not nest; the first */ closes the comment
            loop {
                let Some(next) = self.next() else {
                    self.error("Unterminated block comment".to_string());
                    break;
                };

                if next == '\n' {
                    self.line += 1;
                } else if next == '*' && self.next_if_eq('/') {
                    break;
                }
            }
        } else {
            self.push(TokenKind::Slash, "/");
        }
    }

    fn lex_string(&mut self) {
        let mut value = String::new();

        loop {
            let Some(next) = self.next() else {
                self.error("Unterminated string".to_string());
                return;
            };

            match next {
                '"' => break,
                '\n' => {
                    self.line += 1;
                    value.push(next);
                }
                _ => value.push(next),
            }
        }

        self.tokens.push(Token::with_literal(
            TokenKind::String,
            format!("\"{value}\""),
            Literal::String(value),
            self.line,
        ));
    }

    fn lex_number(&mut self, first: char) {
        let mut stack = vec![first];

        while let Some(next) = self.next_if(|item| item.is_ascii_digit()) {
            stack.push(next);
        }

        // a fractional part needs at least one digit after the dot
        if self.peek() == Some(&'.') && self.peek_second().is_some_and(|c| c.is_ascii_digit()) {
            stack.push(self.next().unwrap_or('.'));
            while let Some(next) = self.next_if(|item| item.is_ascii_digit()) {
                stack.push(next);
            }
        }

        let read = stack.iter().collect::<String>();
        match read.parse::<f64>() {
            Ok(value) => self.tokens.push(Token::with_literal(
                TokenKind::Number,
                read,
                Literal::Number(value),
                self.line,
            )),
            Err(_) => self.error(format!("Failed to parse number '{read}'")),
        }
    }

    fn lex_identifier(&mut self, first: char) {
        let mut stack = vec![first];

        while let Some(next) = self.next_if(|item| item.is_ascii_alphanumeric() || *item == '_') {
            stack.push(next);
        }

        let read = stack.iter().collect::<String>();

        match KEYWORDS.get(read.as_str()) {
            Some(kind) => self.push(*kind, read),
            None => self.tokens.push(Token::with_literal(
                TokenKind::Identifier,
                read.clone(),
                Literal::String(read),
                self.line,
            )),
        }
    }

    fn push(&mut self, kind: TokenKind, lexeme: impl Into<String>) {
        self.tokens.push(Token::new(kind, lexeme, self.line));
    }

    fn error(&mut self, message: String) {
        self.errors.push(LexerError {
            message,
            line: self.line,
        });
    }

    fn peek(&mut self) -> Option<&char> {
        self.chars.peek()
    }

    fn peek_second(&self) -> Option<char> {
        self.chars.clone().nth(1)
    }

    fn next(&mut self) -> Option<char> {
        self.chars.next()
    }

    fn next_if(&mut self, func: impl FnOnce(&char) -> bool) -> Option<char> {
        self.chars.next_if(func)
    }

    fn next_if_eq(&mut self, expected: char) -> bool {
        self.chars.next_if_eq(&expected).is_some()
    }
}
