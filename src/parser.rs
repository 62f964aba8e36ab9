use std::cell::RefCell;

use crate::{
    ast::{unquote, Expression, HttpRequest, InfixOperator, Literal, Program, Statement, VariableRef},
    tokenizer::{Token, TokenType},
};

#[derive(Debug, Default)]
pub struct ParseErrors(pub Vec<ParseErrorWithContext>);

impl ParseErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParseErrorWithContext> {
        self.0.iter()
    }
}

impl std::error::Error for ParseErrors {}

impl std::fmt::Display for ParseErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Found {} errors during parsing", self.0.len())?;
        for error in &self.0 {
            writeln!(f, "{}", error)?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct ParseErrorWithContext {
    pub error: ParseError,
    context: ParseContext,
    pub token: Option<Token>,
    remaining: usize,
}

impl std::error::Error for ParseErrorWithContext {}

impl std::fmt::Display for ParseErrorWithContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "While parsing {}",
            self.context.stack.borrow().join(" > ")
        )?;
        write!(f, "{}", self.error)?;
        match &self.token {
            Some(token) if token.lexeme.is_empty() => {
                write!(f, " at {} but found {}", token.span, token.token_type)?
            }
            Some(token) => write!(f, " at {} but found \"{}\"", token.span, token.lexeme)?,
            None => write!(f, " but the input ended")?,
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("Expected \"{0}\"")]
    Expected(TokenType),
    #[error("Expected one of {0:?}")]
    ExpectedOneOf(Vec<TokenType>),
    #[error("Unexpected \"{0}\"")]
    Unexpected(TokenType),
    #[error("Expected {0}")]
    ExpectedField(&'static str),
}

#[derive(Debug, Clone)]
struct ParseContext {
    stack: RefCell<Vec<&'static str>>,
}

impl ParseContext {
    fn new() -> Self {
        Self {
            stack: RefCell::new(Vec::new()),
        }
    }

    fn push(&self, name: &'static str) -> ParseContextGuard {
        self.stack.borrow_mut().push(name);
        ParseContextGuard::new(self)
    }

    fn pop(&self) {
        self.stack.borrow_mut().pop();
    }

    fn error(&self, error: ParseError, tokens: &[Token]) -> ParseErrorWithContext {
        ParseErrorWithContext {
            error,
            context: self.clone(),
            token: tokens.first().cloned(),
            remaining: tokens.len(),
        }
    }
}

struct ParseContextGuard<'a> {
    context: &'a ParseContext,
}

impl<'a> ParseContextGuard<'a> {
    fn new(context: &'a ParseContext) -> Self {
        Self { context }
    }
}

impl<'a> Drop for ParseContextGuard<'a> {
    fn drop(&mut self) {
        self.context.pop();
    }
}

/// Parses a whole token stream.
///
/// Parsing never stops at the first error: a statement that fails to parse
/// is reported and skipped, and the statements around it are still returned.
/// A stream without a trailing [`TokenType::Eof`] (truncated by the
/// tokenizer) is parsed up to its end and reported as incomplete.
pub fn program(tokens: &[Token]) -> (Program, ParseErrors) {
    let context = ParseContext::new();
    let mut statements = Vec::new();
    let mut tokens = tokens;
    let mut errors = Vec::new();

    let _guard = context.push("program");

    while let Some(token) = tokens.first() {
        if token.token_type() == &TokenType::Eof {
            break;
        }

        match statement(&context, tokens, &mut errors) {
            Ok((stmt, rest)) => {
                statements.push(stmt);
                tokens = rest;
            }
            Err(err) => {
                tokens = recover(tokens, &err);
                errors.push(err);
            }
        }
    }

    if tokens.is_empty() {
        errors.push(context.error(ParseError::Expected(TokenType::Eof), tokens));
    }

    (Program(statements), ParseErrors(errors))
}

fn starts_statement(token_type: &TokenType) -> bool {
    matches!(
        token_type,
        TokenType::Print | TokenType::Query | TokenType::Request | TokenType::Variable
    )
}

// A statement that only lacks its `;` resumes at the token found in its
// place. Any other failure is skipped by `synchronize`.
fn recover<'a>(tokens: &'a [Token], error: &ParseErrorWithContext) -> &'a [Token] {
    let consumed = tokens.len().saturating_sub(error.remaining);
    if consumed > 0 && error.error == ParseError::Expected(TokenType::Semicolon) {
        &tokens[consumed..]
    } else {
        synchronize(tokens)
    }
}

// Skips the statement that failed to parse. Always consumes at least one
// token; stops after a `;` or before anything that begins a new statement
// on its own.
fn synchronize(tokens: &[Token]) -> &[Token] {
    let Some((first, mut rest)) = tokens.split_first() else {
        return tokens;
    };

    if !starts_statement(first.token_type()) {
        return rest;
    }

    while let Some((token, after)) = rest.split_first() {
        match token.token_type() {
            TokenType::Semicolon => return after,
            TokenType::Text
            | TokenType::Eof
            | TokenType::Print
            | TokenType::Query
            | TokenType::Request => return rest,
            _ => rest = after,
        }
    }
    rest
}

fn statement<'a>(
    context: &ParseContext,
    tokens: &'a [Token],
    diagnostics: &mut Vec<ParseErrorWithContext>,
) -> Result<(Statement, &'a [Token]), ParseErrorWithContext> {
    let _guard = context.push("statement");
    match tokens.first().map(Token::token_type) {
        Some(TokenType::Text) => Ok((Statement::Text(tokens[0].lexeme.clone()), &tokens[1..])),
        Some(TokenType::Print) => print_statement(context, &tokens[1..]),
        Some(TokenType::Query) => query_statement(context, &tokens[1..]),
        Some(TokenType::Request) => request_statement(context, &tokens[1..], diagnostics),
        Some(TokenType::Variable) => assignment(context, tokens),
        Some(token_type) => Err(context.error(ParseError::Unexpected(*token_type), tokens)),
        None => Err(context.error(ParseError::Unexpected(TokenType::Eof), tokens)),
    }
}

fn print_statement<'a>(
    context: &ParseContext,
    tokens: &'a [Token],
) -> Result<(Statement, &'a [Token]), ParseErrorWithContext> {
    let _guard = context.push("print_statement");
    let (expr, rest) = expression(context, tokens)?;
    let tokens = consume(context, rest, TokenType::Semicolon)?;
    Ok((Statement::Print(expr), tokens))
}

fn query_statement<'a>(
    context: &ParseContext,
    tokens: &'a [Token],
) -> Result<(Statement, &'a [Token]), ParseErrorWithContext> {
    let _guard = context.push("query_statement");
    let (query, tokens) = match_string(context, tokens)?;
    let tokens = consume(context, tokens, TokenType::Semicolon)?;
    Ok((Statement::DbQuery(unquote(&query).to_string()), tokens))
}

fn request_statement<'a>(
    context: &ParseContext,
    tokens: &'a [Token],
    diagnostics: &mut Vec<ParseErrorWithContext>,
) -> Result<(Statement, &'a [Token]), ParseErrorWithContext> {
    let _guard = context.push("request_statement");
    let mut tokens = consume(context, tokens, TokenType::LeftParen)?;
    let mut request = HttpRequest::default();

    request.variable = field(context, &mut tokens, TokenType::Variable, "variable", diagnostics);
    tokens = consume(context, tokens, TokenType::Comma)?;
    request.url = field(context, &mut tokens, TokenType::String, "url", diagnostics);
    tokens = consume(context, tokens, TokenType::Comma)?;
    request.data = field(context, &mut tokens, TokenType::String, "data", diagnostics);
    tokens = consume(context, tokens, TokenType::Comma)?;
    request.header = field(context, &mut tokens, TokenType::String, "header", diagnostics);

    let tokens = match tokens.first().map(Token::token_type) {
        Some(TokenType::Comma) => {
            let mut rest = &tokens[1..];
            request.kind = field(context, &mut rest, TokenType::String, "type", diagnostics);
            consume(context, rest, TokenType::RightParen)?
        }
        Some(TokenType::RightParen) => &tokens[1..],
        _ => {
            return Err(context.error(
                ParseError::ExpectedOneOf(vec![TokenType::Comma, TokenType::RightParen]),
                tokens,
            ))
        }
    };
    let tokens = consume(context, tokens, TokenType::Semicolon)?;
    Ok((Statement::HttpRequestAssign(request), tokens))
}

// One positional request argument. A missing or mistyped argument is
// reported without failing the statement and yields an empty string; a
// mistyped value is consumed, a missing one leaves the separator in place.
fn field(
    context: &ParseContext,
    tokens: &mut &[Token],
    token_type: TokenType,
    name: &'static str,
    diagnostics: &mut Vec<ParseErrorWithContext>,
) -> String {
    let _guard = context.push(name);
    let current: &[Token] = tokens;
    match current.first() {
        Some(token) if token.token_type() == &token_type => {
            *tokens = &current[1..];
            match token_type {
                TokenType::String => unquote(&token.lexeme).to_string(),
                _ => token.lexeme.clone(),
            }
        }
        token => {
            diagnostics.push(context.error(ParseError::ExpectedField(name), current));
            if let Some(token) = token {
                if !matches!(
                    token.token_type(),
                    TokenType::Comma
                        | TokenType::RightParen
                        | TokenType::Semicolon
                        | TokenType::Text
                        | TokenType::Eof
                ) {
                    *tokens = &current[1..];
                }
            }
            String::new()
        }
    }
}

fn assignment<'a>(
    context: &ParseContext,
    tokens: &'a [Token],
) -> Result<(Statement, &'a [Token]), ParseErrorWithContext> {
    let _guard = context.push("assignment");
    let (target, tokens) = match_variable(context, tokens)?;
    let tokens = consume(context, tokens, TokenType::Assign)?;
    let (expr, tokens) = expression(context, tokens)?;
    let tokens = consume(context, tokens, TokenType::Semicolon)?;
    Ok((Statement::Assignment(target, expr), tokens))
}

fn expression<'a>(
    context: &ParseContext,
    tokens: &'a [Token],
) -> Result<(Expression, &'a [Token]), ParseErrorWithContext> {
    let _guard = context.push("expression");
    binary(
        context,
        term,
        |token| match infix_operator(token) {
            Some(op @ (InfixOperator::Plus | InfixOperator::Minus | InfixOperator::Concat)) => {
                Some(op)
            }
            _ => None,
        },
        tokens,
    )
}

fn term<'a>(
    context: &ParseContext,
    tokens: &'a [Token],
) -> Result<(Expression, &'a [Token]), ParseErrorWithContext> {
    let _guard = context.push("term");
    binary(
        context,
        factor,
        |token| match infix_operator(token) {
            Some(op @ (InfixOperator::Multiply | InfixOperator::Divide)) => Some(op),
            _ => None,
        },
        tokens,
    )
}

fn infix_operator(token: &Token) -> Option<InfixOperator> {
    match token.token_type() {
        TokenType::Operator => InfixOperator::from_lexeme(&token.lexeme),
        _ => None,
    }
}

fn binary<'a>(
    context: &ParseContext,
    precedence: impl Fn(
        &ParseContext,
        &'a [Token],
    ) -> Result<(Expression, &'a [Token]), ParseErrorWithContext>,
    operator: impl Fn(&Token) -> Option<InfixOperator>,
    tokens: &'a [Token],
) -> Result<(Expression, &'a [Token]), ParseErrorWithContext> {
    let (mut expr, mut tokens) = precedence(context, tokens)?;

    while let Some(token) = tokens.first() {
        let op = match operator(token) {
            Some(op) => op,
            None => break,
        };
        tokens = &tokens[1..];
        let (right, rest) = precedence(context, tokens)?;
        expr = Expression::Binary(Box::new(expr), op, Box::new(right));
        tokens = rest;
    }

    Ok((expr, tokens))
}

fn factor<'a>(
    context: &ParseContext,
    tokens: &'a [Token],
) -> Result<(Expression, &'a [Token]), ParseErrorWithContext> {
    let _guard = context.push("factor");
    let Some(token) = tokens.first() else {
        return Err(context.error(ParseError::Unexpected(TokenType::Eof), tokens));
    };

    match token.token_type() {
        TokenType::Number => Ok((
            Expression::Literal(Literal::Number(token.lexeme.clone())),
            &tokens[1..],
        )),
        TokenType::String => Ok((
            Expression::Literal(Literal::String(token.lexeme.clone())),
            &tokens[1..],
        )),
        TokenType::Variable => Ok((
            Expression::Variable(VariableRef {
                name: token.lexeme.clone(),
                span: token.span.clone(),
            }),
            &tokens[1..],
        )),
        TokenType::LeftParen => {
            let (expr, rest) = expression(context, &tokens[1..])?;
            let tokens = consume(context, rest, TokenType::RightParen)?;
            Ok((expr, tokens))
        }
        token_type => Err(context.error(ParseError::Unexpected(*token_type), tokens)),
    }
}

fn consume<'a>(
    context: &ParseContext,
    tokens: &'a [Token],
    token_type: TokenType,
) -> Result<&'a [Token], ParseErrorWithContext> {
    match tokens.first().map(Token::token_type) {
        Some(t) if t == &token_type => Ok(&tokens[1..]),
        _ => Err(context.error(ParseError::Expected(token_type), tokens)),
    }
}

fn match_variable<'a>(
    context: &ParseContext,
    tokens: &'a [Token],
) -> Result<(VariableRef, &'a [Token]), ParseErrorWithContext> {
    match tokens.first() {
        Some(token) if token.token_type() == &TokenType::Variable => Ok((
            VariableRef {
                name: token.lexeme.clone(),
                span: token.span.clone(),
            },
            &tokens[1..],
        )),
        _ => Err(context.error(ParseError::Expected(TokenType::Variable), tokens)),
    }
}

fn match_string<'a>(
    context: &ParseContext,
    tokens: &'a [Token],
) -> Result<(String, &'a [Token]), ParseErrorWithContext> {
    match tokens.first() {
        Some(token) if token.token_type() == &TokenType::String => {
            Ok((token.lexeme.clone(), &tokens[1..]))
        }
        _ => Err(context.error(ParseError::Expected(TokenType::String), tokens)),
    }
}
