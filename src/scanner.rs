//! One-pass lexer for Lox source text.
//!
//! [`Scanner`] is a fused iterator over `Result<Token>`.  A lexical error is
//! yielded in place of a token and scanning resumes right after the offending
//! input, so a single pass surfaces every lexical error.  The stream always
//! ends with exactly one `EOF` token.
//!
//! # Recognised input
//!
//! - Punctuation `( ) { } , . ;` and operators `- + / * ! != = == > >= < <=`
//!   (the two-byte forms need one byte of lookahead).
//! - `"…"` strings, which may span lines and have no escapes.
//! - Numbers: digits with an optional `.digits` part.  A trailing `.` is not
//!   part of the number.
//! - Identifiers `[A-Za-z_][A-Za-z0-9_]*`, looked up in a perfect-hash keyword table.
//! - `//` comments up to the end of the line.
//!
//! # Example
//!
//! ```rust
//! use rox::scanner::Scanner;
//!
//! for result in Scanner::new("print 123; // example") {
//!     match result {
//!         Ok(token) => println!("{}", token),
//!         Err(err) => eprintln!("{}", err),
//!     }
//! }
//! ```

use std::iter::FusedIterator;

use log::{info, trace};
use memchr::memchr;
use phf::phf_map;

use crate::error::{LoxError, Result};
use crate::report::Reporter;
use crate::token::{Token, TokenType};

static KEYWORDS: phf::Map<&'static str, TokenType> = phf_map! {
    "and"    => TokenType::AND,
    "class"  => TokenType::CLASS,
    "else"   => TokenType::ELSE,
    "false"  => TokenType::FALSE,
    "for"    => TokenType::FOR,
    "fun"    => TokenType::FUN,
    "if"     => TokenType::IF,
    "nil"    => TokenType::NIL,
    "or"     => TokenType::OR,
    "print"  => TokenType::PRINT,
    "return" => TokenType::RETURN,
    "super"  => TokenType::SUPER,
    "this"   => TokenType::THIS,
    "true"   => TokenType::TRUE,
    "var"    => TokenType::VAR,
    "while"  => TokenType::WHILE,
};

pub struct Scanner<'a> {
    text: &'a str,
    bytes: &'a [u8],
    start: usize, // first byte of the lexeme being scanned
    pos: usize,   // next byte to examine
    line: usize,
    finished: bool, // EOF has been yielded
}

impl<'a> Scanner<'a> {
    pub fn new(text: &'a str) -> Self {
        info!("Scanner created over {} bytes", text.len());

        Self {
            text,
            bytes: text.as_bytes(),
            start: 0,
            pos: 0,
            line: 1,
            finished: false,
        }
    }

    // ───────────────────────────── cursor ──────────────────────────────

    #[inline(always)]
    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    /// Consume one byte.  Callers check [`at_end`](Self::at_end) first.
    #[inline(always)]
    fn bump(&mut self) -> u8 {
        let b: u8 = self.bytes[self.pos];
        self.pos += 1;
        b
    }

    /// The byte `offset` places ahead, or `0` past the end.
    #[inline(always)]
    fn look(&self, offset: usize) -> u8 {
        self.bytes.get(self.pos + offset).copied().unwrap_or(0)
    }

    #[inline(always)]
    fn eat(&mut self, expected: u8) -> bool {
        if self.look(0) == expected && !self.at_end() {
            self.pos += 1;
            return true;
        }

        false
    }

    /// `long` if the next byte is `=`, `short` otherwise.
    fn with_equal(&mut self, long: TokenType, short: TokenType) -> TokenType {
        if self.eat(b'=') {
            long
        } else {
            short
        }
    }

    // ──────────────────────────── lexemes ──────────────────────────────

    /// Scan one lexeme.  `Ok(None)` for whitespace and comments.
    fn scan_token(&mut self) -> Result<Option<TokenType>> {
        let kind: TokenType = match self.bump() {
            b'(' => TokenType::LEFT_PAREN,
            b')' => TokenType::RIGHT_PAREN,
            b'{' => TokenType::LEFT_BRACE,
            b'}' => TokenType::RIGHT_BRACE,
            b',' => TokenType::COMMA,
            b'.' => TokenType::DOT,
            b';' => TokenType::SEMICOLON,
            b'-' => TokenType::MINUS,
            b'+' => TokenType::PLUS,
            b'*' => TokenType::STAR,

            b'!' => self.with_equal(TokenType::BANG_EQUAL, TokenType::BANG),
            b'=' => self.with_equal(TokenType::EQUAL_EQUAL, TokenType::EQUAL),
            b'<' => self.with_equal(TokenType::LESS_EQUAL, TokenType::LESS),
            b'>' => self.with_equal(TokenType::GREATER_EQUAL, TokenType::GREATER),

            b'/' => {
                if !self.eat(b'/') {
                    return Ok(Some(TokenType::SLASH));
                }

                // Stop on the newline so the line counter still sees it.
                self.pos = match memchr(b'\n', &self.bytes[self.pos..]) {
                    Some(offset) => self.pos + offset,
                    None => self.bytes.len(),
                };

                return Ok(None);
            }

            b' ' | b'\r' | b'\t' => return Ok(None),

            b'\n' => {
                self.line += 1;
                return Ok(None);
            }

            b'"' => self.string()?,

            b'0'..=b'9' => self.number()?,

            b if b.is_ascii_alphabetic() || b == b'_' => self.identifier(),

            _ => return Err(self.unexpected()),
        };

        Ok(Some(kind))
    }

    /// Error for the character starting at `self.start`, stepping over all of
    /// its bytes so a multi-byte character is reported once.
    fn unexpected(&mut self) -> LoxError {
        let c: char = self.text[self.start..].chars().next().unwrap_or('\u{FFFD}');
        self.pos = self.start + c.len_utf8();

        LoxError::lex(self.line, format!("Unexpected character: {}", c))
    }

    fn string(&mut self) -> Result<TokenType> {
        while !self.at_end() && self.look(0) != b'"' {
            if self.bump() == b'\n' {
                self.line += 1;
            }
        }

        if self.at_end() {
            return Err(LoxError::lex(self.line, "Unterminated string."));
        }

        self.pos += 1; // closing quote

        let contents: &str = &self.text[self.start + 1..self.pos - 1];

        Ok(TokenType::STRING(contents.to_owned()))
    }

    fn number(&mut self) -> Result<TokenType> {
        while self.look(0).is_ascii_digit() {
            self.pos += 1;
        }

        if self.look(0) == b'.' && self.look(1).is_ascii_digit() {
            self.pos += 1;

            while self.look(0).is_ascii_digit() {
                self.pos += 1;
            }
        }

        let digits: &str = &self.text[self.start..self.pos];

        digits
            .parse::<f64>()
            .map(TokenType::NUMBER)
            .map_err(|e| LoxError::lex(self.line, format!("Invalid number '{}': {}", digits, e)))
    }

    fn identifier(&mut self) -> TokenType {
        while self.look(0).is_ascii_alphanumeric() || self.look(0) == b'_' {
            self.pos += 1;
        }

        let word: &str = &self.text[self.start..self.pos];

        KEYWORDS
            .get(word)
            .cloned()
            .unwrap_or(TokenType::IDENTIFIER)
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            self.start = self.pos;

            if self.at_end() {
                self.finished = true;
                return Some(Ok(Token::new(TokenType::EOF, "", self.line)));
            }

            match self.scan_token() {
                Ok(Some(kind)) => {
                    let lexeme: &str = &self.text[self.start..self.pos];
                    trace!("Scanned {} '{}' on line {}", kind.name(), lexeme, self.line);

                    return Some(Ok(Token::new(kind, lexeme, self.line)));
                }
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

impl<'a> FusedIterator for Scanner<'a> {}

/// Scan all of `src`, forwarding lexical errors to `report` and returning the
/// tokens that were recognised.  The result always ends with `EOF`.
pub fn scan(src: &str, report: &mut dyn Reporter) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();

    for result in Scanner::new(src) {
        match result {
            Ok(token) => tokens.push(token),
            Err(e) => report.report(e),
        }
    }

    info!("Scanned {} tokens", tokens.len());

    tokens
}
