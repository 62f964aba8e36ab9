use std::fmt::Display;

use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Eof,

    // Literal passthrough outside of code regions
    Text,

    // Literals
    Variable,
    Number,
    String,

    // Operators and punctuation
    Operator,
    Assign,
    Semicolon,
    Comma,
    LeftParen,
    RightParen,

    // Keywords
    Print,
    Query,
    Request,
}

impl Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenType::Eof => write!(f, "end of file"),
            TokenType::Text => write!(f, "text"),
            TokenType::Variable => write!(f, "variable"),
            TokenType::Number => write!(f, "number"),
            TokenType::String => write!(f, "string"),
            TokenType::Operator => write!(f, "operator"),
            TokenType::Assign => write!(f, "="),
            TokenType::Semicolon => write!(f, ";"),
            TokenType::Comma => write!(f, ","),
            TokenType::LeftParen => write!(f, "("),
            TokenType::RightParen => write!(f, ")"),
            TokenType::Print => write!(f, "print"),
            TokenType::Query => write!(f, "query"),
            TokenType::Request => write!(f, "request"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub lexeme: String,
    pub span: Span,
}

impl Token {
    pub fn token_type(&self) -> &TokenType {
        &self.token_type
    }
}

/// Fatal marker mismatch. Scanning stopped at `span`; `tokens` holds what was
/// collected up to that point and has no trailing [`TokenType::Eof`].
#[derive(Debug, thiserror::Error)]
#[error("{kind} at {span}")]
pub struct TokenizeError {
    pub kind: TokenizeErrorKind,
    pub span: Span,
    pub tokens: Vec<Token>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenizeErrorKind {
    #[error("Unexpected \"?>\" without opening \"<?php\"")]
    UnexpectedCloseTag,
    #[error("Unexpected \"<?php\" without closing \"?>\"")]
    UnexpectedOpenTag,
}

pub fn tokens(source: &str) -> Result<Vec<Token>, TokenizeError> {
    Tokenizer::new(source).tokenize()
}

pub struct Tokenizer<'a> {
    remaining: &'a str,
    line: usize,
    column: usize,
    in_code: bool,
    pending: String,
    pending_start: Option<(usize, usize)>,
    tokens: Vec<Token>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            remaining: source,
            line: 1,
            column: 1,
            in_code: false,
            pending: String::new(),
            pending_start: None,
            tokens: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, TokenizeError> {
        while !self.remaining.is_empty() {
            let step = if self.in_code {
                self.code_step()
            } else {
                self.text_step()
            };

            if let Err((kind, span)) = step {
                return Err(TokenizeError {
                    kind,
                    span,
                    tokens: self.tokens,
                });
            }
        }

        self.flush_pending();
        self.tokens.push(Token {
            token_type: TokenType::Eof,
            lexeme: String::new(),
            span: Span::point(self.line, self.column),
        });

        Ok(self.tokens)
    }

    fn text_step(&mut self) -> Result<(), (TokenizeErrorKind, Span)> {
        if let Some(rest) = open_tag(self.remaining) {
            self.flush_pending();
            self.advance_to(rest);
            self.in_code = true;
        } else if let Some(rest) = close_tag(self.remaining) {
            let span = self.advance_to(rest);
            return Err((TokenizeErrorKind::UnexpectedCloseTag, span));
        } else if let Some(rest) = boundary(self.remaining) {
            // A `<` that does not open a code region is held back and glued to
            // the following text run.
            if self.pending_start.is_none() {
                self.pending_start = Some((self.line, self.column));
            }
            self.pending.push('<');
            self.advance_to(rest);
        } else if let Some(rest) = text(self.remaining) {
            let consumed = self.consumed(rest);
            let mut span = self.advance_to(rest);
            if let Some((line, column)) = self.pending_start.take() {
                span.start_line = line;
                span.start_column = column;
            }
            let lexeme = std::mem::take(&mut self.pending) + consumed;
            self.push(TokenType::Text, lexeme, span);
        } else {
            self.skip_char();
        }
        Ok(())
    }

    fn code_step(&mut self) -> Result<(), (TokenizeErrorKind, Span)> {
        if let Some(rest) = close_tag(self.remaining) {
            self.advance_to(rest);
            self.in_code = false;
            return Ok(());
        }

        if let Some(rest) = open_tag(self.remaining) {
            let span = self.advance_to(rest);
            return Err((TokenizeErrorKind::UnexpectedOpenTag, span));
        }

        if let Some(((), rest)) = first(&[line_comment, block_comment], self.remaining) {
            self.advance_to(rest);
            return Ok(());
        }

        let matched = first(
            &[
                // keywords
                print_,
                echo,
                query,
                db,
                request,
                http,
                // literals
                variable,
                number,
                operator,
                assign,
                string,
                // punctuation
                semicolon,
                comma,
                left_paren,
                right_paren,
            ],
            self.remaining,
        );

        match matched {
            Some((token_type, rest)) => {
                let lexeme = self.consumed(rest).to_string();
                let span = self.advance_to(rest);
                self.push(token_type, lexeme, span);
            }
            None => self.skip_unknown(),
        }
        Ok(())
    }

    fn push(&mut self, token_type: TokenType, lexeme: String, span: Span) {
        self.tokens.push(Token {
            token_type,
            lexeme,
            span,
        });
    }

    fn flush_pending(&mut self) {
        if let Some((line, column)) = self.pending_start.take() {
            let lexeme = std::mem::take(&mut self.pending);
            let span = Span {
                start_line: line,
                start_column: column,
                end_line: self.line,
                end_column: self.column,
            };
            self.push(TokenType::Text, lexeme, span);
        }
    }

    fn consumed(&self, rest: &'a str) -> &'a str {
        let remaining = self.remaining;
        &remaining[..remaining.len() - rest.len()]
    }

    fn advance_to(&mut self, rest: &'a str) -> Span {
        let (start_line, start_column) = (self.line, self.column);
        for c in self.consumed(rest).chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.remaining = rest;

        Span {
            start_line,
            start_column,
            end_line: self.line,
            end_column: self.column,
        }
    }

    // Unknown words are dropped whole so that keywords are never matched in
    // the middle of an identifier.
    fn skip_unknown(&mut self) {
        let remaining = self.remaining;
        let len = remaining
            .chars()
            .take_while(|c| is_identifier_char(*c))
            .count();
        if len > 0 {
            self.advance_to(&remaining[len..]);
        } else {
            self.skip_char();
        }
    }

    fn skip_char(&mut self) {
        let remaining = self.remaining;
        let len = remaining.chars().next().map_or(0, char::len_utf8);
        self.advance_to(&remaining[len..]);
    }
}

fn first<'a, T>(
    parsers: &[fn(&str) -> Option<(T, &str)>],
    source: &'a str,
) -> Option<(T, &'a str)> {
    parsers.iter().find_map(|parser| parser(source))
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn leading_digits(source: &str) -> usize {
    source.chars().take_while(|c| c.is_ascii_digit()).count()
}

fn open_tag(source: &str) -> Option<&str> {
    let rest = source.strip_prefix("<?php")?;
    if rest.starts_with(is_identifier_char) {
        None
    } else {
        Some(rest)
    }
}

fn close_tag(source: &str) -> Option<&str> {
    source.strip_prefix("?>")
}

fn boundary(source: &str) -> Option<&str> {
    source.strip_prefix('<')
}

fn text(source: &str) -> Option<&str> {
    let len = source
        .char_indices()
        .find(|(i, c)| *c == '<' || source[*i..].starts_with("?>"))
        .map_or(source.len(), |(i, _)| i);
    if len > 0 {
        Some(&source[len..])
    } else {
        None
    }
}

fn line_comment(source: &str) -> Option<((), &str)> {
    let body = source.strip_prefix("//")?;
    for (i, c) in body.char_indices() {
        if c == '\n' {
            return Some(((), &body[i + 1..]));
        }
        if body[i..].starts_with("?>") {
            return Some(((), &body[i..]));
        }
    }
    Some(((), ""))
}

fn block_comment(source: &str) -> Option<((), &str)> {
    let body = source.strip_prefix("/*")?;
    for (i, _) in body.char_indices() {
        if body[i..].starts_with("*/") {
            return Some(((), &body[i + 2..]));
        }
        if body[i..].starts_with("?>") {
            return Some(((), &body[i..]));
        }
    }
    Some(((), ""))
}

macro_rules! match_literal {
    ($name:ident, $word:literal, $token:expr) => {
        fn $name(source: &str) -> Option<(TokenType, &str)> {
            source.strip_prefix($word).map(|rest| ($token, rest))
        }
    };
}

macro_rules! match_keyword {
    ($name:ident, $word:literal, $token:expr) => {
        fn $name(source: &str) -> Option<(TokenType, &str)> {
            let rest = source.strip_prefix($word)?;
            if rest.starts_with(is_identifier_char) {
                None
            } else {
                Some(($token, rest))
            }
        }
    };
}

match_literal! { assign, "=", TokenType::Assign }
match_literal! { semicolon, ";", TokenType::Semicolon }
match_literal! { comma, ",", TokenType::Comma }
match_literal! { left_paren, "(", TokenType::LeftParen }
match_literal! { right_paren, ")", TokenType::RightParen }
match_keyword! { print_, "print", TokenType::Print }
match_keyword! { echo, "echo", TokenType::Print }
match_keyword! { query, "query", TokenType::Query }
match_keyword! { db, "db", TokenType::Query }
match_keyword! { request, "request", TokenType::Request }
match_keyword! { http, "http", TokenType::Request }

fn variable(source: &str) -> Option<(TokenType, &str)> {
    let name = source.strip_prefix('$')?;
    let mut chars = name.chars();

    let first = chars.next()?;
    if !first.is_ascii_alphabetic() && first != '_' {
        return None;
    }

    let len = 1
        + first.len_utf8()
        + chars
            .take_while(|c| is_identifier_char(*c))
            .map(char::len_utf8)
            .sum::<usize>();

    Some((TokenType::Variable, &source[len..]))
}

fn number(source: &str) -> Option<(TokenType, &str)> {
    let mut len = leading_digits(source);
    if len == 0 {
        return None;
    }

    if let Some(fraction) = source[len..].strip_prefix('.') {
        let fraction_len = leading_digits(fraction);
        if fraction_len > 0 {
            len += 1 + fraction_len;
        }
    }

    Some((TokenType::Number, &source[len..]))
}

fn operator(source: &str) -> Option<(TokenType, &str)> {
    match source.chars().next()? {
        '+' | '-' | '*' | '/' | '.' => Some((TokenType::Operator, &source[1..])),
        _ => None,
    }
}

fn string(source: &str) -> Option<(TokenType, &str)> {
    let body = source.strip_prefix('"')?;
    let end = body.find('"')?;
    Some((TokenType::String, &body[end + 1..]))
}
