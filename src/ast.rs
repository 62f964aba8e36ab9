use std::fmt::Display;

use crate::span::Span;

#[derive(Debug, Default)]
pub struct Program(pub Vec<Statement>);

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Text(String),
    Print(Expression),
    DbQuery(String),
    HttpRequestAssign(HttpRequest),
    Assignment(VariableRef, Expression),
}

/// `request($variable, "url", "data", "header"[, "kind"]);`
///
/// String fields are stored without their quotes. `kind` is empty when the
/// argument is omitted and is not used when the request is issued.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HttpRequest {
    pub variable: String,
    pub url: String,
    pub data: String,
    pub header: String,
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableRef {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Variable(VariableRef),
    Literal(Literal),
    Binary(Box<Expression>, InfixOperator, Box<Expression>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Source text of the number, printed as written.
    Number(String),
    /// Source text of the string, delimiting quotes included.
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOperator {
    Plus,
    Minus,
    Multiply,
    Divide,
    Concat,
}

impl InfixOperator {
    pub fn from_lexeme(lexeme: &str) -> Option<Self> {
        match lexeme {
            "+" => Some(InfixOperator::Plus),
            "-" => Some(InfixOperator::Minus),
            "*" => Some(InfixOperator::Multiply),
            "/" => Some(InfixOperator::Divide),
            "." => Some(InfixOperator::Concat),
            _ => None,
        }
    }
}

/// Strips the delimiting quotes from a string literal's source text.
pub fn unquote(raw: &str) -> &str {
    raw.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw)
}

impl Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for statement in &self.0 {
            writeln!(f, "{}", statement)?;
        }
        Ok(())
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Statement::Text(text) => write!(f, "text {:?}", text),
            Statement::Print(expr) => write!(f, "print {};", expr),
            Statement::DbQuery(query) => write!(f, "query \"{}\";", query),
            Statement::HttpRequestAssign(request) => write!(f, "{}", request),
            Statement::Assignment(target, expr) => write!(f, "{} = {};", target, expr),
        }
    }
}

impl Display for HttpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "request({}, \"{}\", \"{}\", \"{}\"",
            self.variable, self.url, self.data, self.header
        )?;
        if !self.kind.is_empty() {
            write!(f, ", \"{}\"", self.kind)?;
        }
        write!(f, ");")
    }
}

impl Display for VariableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::Variable(variable) => write!(f, "{}", variable),
            Expression::Literal(literal) => write!(f, "{}", literal),
            Expression::Binary(left, op, right) => write!(f, "({} {} {})", left, op, right),
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{}", n),
            Literal::String(s) => write!(f, "{}", s),
        }
    }
}

impl Display for InfixOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InfixOperator::Plus => write!(f, "+"),
            InfixOperator::Minus => write!(f, "-"),
            InfixOperator::Multiply => write!(f, "*"),
            InfixOperator::Divide => write!(f, "/"),
            InfixOperator::Concat => write!(f, "."),
        }
    }
}
