mod environment;

use std::{
    cell::RefCell,
    fmt::{Debug, Display},
    io::Write,
    rc::Rc,
};

use crate::{
    ast::{unquote, Expression, HttpRequest, InfixOperator, Literal, Program, Statement},
    shell::{quote, ShellError, ShellExecutor, SystemShell},
    span::Span,
};

pub use self::environment::Environment;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    String(String),
}

impl Value {
    fn to_number(&self, operator: InfixOperator) -> Result<f64, ExecutionErrorKind> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::String(s) => s
                .trim()
                .parse()
                .map_err(|_| ExecutionErrorKind::NotANumber {
                    value: s.clone(),
                    operator,
                }),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Clone)]
pub struct Interpreter {
    environment: Environment,
    stdout: Rc<RefCell<dyn Write>>,
    diagnostics: Rc<RefCell<dyn Write>>,
    shell: Rc<RefCell<dyn ShellExecutor>>,
}

impl Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("environment", &self.environment)
            .finish()
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(
            Rc::new(RefCell::new(std::io::stdout())),
            Rc::new(RefCell::new(std::io::stderr())),
            Rc::new(RefCell::new(SystemShell)),
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("Error executing statement: {current_statement} - {kind}")]
    Execution {
        kind: ExecutionErrorKind,
        environment: Environment,
        current_statement: Statement,
    },
}

impl ExecutionError {
    pub fn kind(&self) -> &ExecutionErrorKind {
        match self {
            ExecutionError::Execution { kind, .. } => kind,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutionErrorKind {
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
    #[error(transparent)]
    Shell(#[from] ShellError),
    #[error("Not a number: \"{value}\" used as an operand of \"{operator}\"")]
    NotANumber {
        value: String,
        operator: InfixOperator,
    },
}

/// Recoverable runtime problems. They are written to the diagnostic channel
/// and execution carries on.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Warning {
    #[error("Undefined variable {name} at {span}")]
    UndefinedVariable { name: String, span: Span },
    #[error("Number out of range for variable assignment: {name} = {value}")]
    NumberOutOfRange { name: String, value: String },
}

impl Interpreter {
    pub fn new(
        stdout: Rc<RefCell<dyn Write>>,
        diagnostics: Rc<RefCell<dyn Write>>,
        shell: Rc<RefCell<dyn ShellExecutor>>,
    ) -> Self {
        Self {
            environment: Environment::new(),
            stdout,
            diagnostics,
            shell,
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Writes a lexical or syntax diagnostic to the diagnostic channel.
    pub fn report(&self, error: &dyn Display) -> std::io::Result<()> {
        writeln!(self.diagnostics.borrow_mut(), "error: {}", error)
    }

    pub fn interpret(&mut self, program: &Program) -> Result<(), ExecutionError> {
        for stmt in program.0.iter() {
            if let Err(kind) = self.execute(stmt) {
                return Err(ExecutionError::Execution {
                    kind,
                    environment: self.environment.clone(),
                    current_statement: stmt.clone(),
                });
            }
        }

        Ok(())
    }

    fn execute(&mut self, stmt: &Statement) -> Result<(), ExecutionErrorKind> {
        #[cfg(feature = "trace")]
        writeln!(self.diagnostics.borrow_mut(), "[trace] {}", stmt)?;

        match stmt {
            Statement::Text(text) => {
                write!(self.stdout.borrow_mut(), "{}", text)?;
            }
            Statement::Print(expression) => {
                let value = self.evaluate(expression)?;
                writeln!(self.stdout.borrow_mut(), "{}", value)?;
            }
            Statement::DbQuery(query) => {
                let command = format!("echo {}", quote(&format!("Database query: {}", query)));
                let output = self.shell.borrow_mut().execute(&command)?;
                writeln!(self.stdout.borrow_mut(), "{}", output)?;
            }
            Statement::HttpRequestAssign(request) => {
                let output = self.shell.borrow_mut().execute(&request_command(request))?;
                self.environment
                    .assign(request.variable.clone(), Value::String(output));
            }
            Statement::Assignment(target, expression) => {
                let value = self.evaluate(expression)?;
                match assigned_value(value) {
                    Ok(value) => {
                        self.environment.assign(target.name.clone(), value);
                    }
                    Err(value) => self.warn(Warning::NumberOutOfRange {
                        name: target.name.clone(),
                        value,
                    })?,
                }
            }
        }

        Ok(())
    }

    fn evaluate(&self, expression: &Expression) -> Result<Value, ExecutionErrorKind> {
        let value = match expression {
            Expression::Literal(Literal::String(raw)) => Value::String(unquote(raw).to_string()),
            // Kept as written; coerced when used as an operand or assigned.
            Expression::Literal(Literal::Number(raw)) => Value::String(raw.clone()),
            Expression::Variable(variable) => match self.environment.get(&variable.name) {
                Some(value) => value.clone(),
                None => {
                    self.warn(Warning::UndefinedVariable {
                        name: variable.name.clone(),
                        span: variable.span.clone(),
                    })?;
                    Value::Number(0.0)
                }
            },
            Expression::Binary(left, op, right) => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                match op {
                    InfixOperator::Concat => Value::String(format!("{}{}", left, right)),
                    InfixOperator::Plus => {
                        Value::Number(left.to_number(*op)? + right.to_number(*op)?)
                    }
                    InfixOperator::Minus => {
                        Value::Number(left.to_number(*op)? - right.to_number(*op)?)
                    }
                    InfixOperator::Multiply => {
                        Value::Number(left.to_number(*op)? * right.to_number(*op)?)
                    }
                    // IEEE-754: x / 0 is inf, -inf or NaN
                    InfixOperator::Divide => {
                        Value::Number(left.to_number(*op)? / right.to_number(*op)?)
                    }
                }
            }
        };

        Ok(value)
    }

    fn warn(&self, warning: Warning) -> Result<(), ExecutionErrorKind> {
        writeln!(self.diagnostics.borrow_mut(), "warning: {}", warning)?;
        Ok(())
    }
}

// Text that reads as a number is stored as one. Text whose number overflows
// is rejected so the caller keeps the previous binding.
fn assigned_value(value: Value) -> Result<Value, String> {
    match value {
        Value::Number(n) => Ok(Value::Number(n)),
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(n) if n.is_infinite() && !spells_infinity(s.trim()) => Err(s),
            Ok(n) => Ok(Value::Number(n)),
            Err(_) => Ok(Value::String(s)),
        },
    }
}

fn spells_infinity(s: &str) -> bool {
    s.trim_start_matches(['+', '-'])
        .to_ascii_lowercase()
        .starts_with("inf")
}

fn request_command(request: &HttpRequest) -> String {
    format!(
        "curl -X GET --data {} -H {} {}",
        quote(&request.data),
        quote(&request.header),
        quote(&request.url)
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_assigned_value() {
        assert_eq!(
            assigned_value(Value::String("5".to_string())),
            Ok(Value::Number(5.0))
        );
        assert_eq!(
            assigned_value(Value::String("5 apples".to_string())),
            Ok(Value::String("5 apples".to_string()))
        );
        assert_eq!(
            assigned_value(Value::String("-inf".to_string())),
            Ok(Value::Number(f64::NEG_INFINITY))
        );
        assert_eq!(
            assigned_value(Value::String("1e999".to_string())),
            Err("1e999".to_string())
        );
        assert_eq!(
            assigned_value(Value::String(" 5\n".to_string())),
            Ok(Value::Number(5.0))
        );
        let digits = "9".repeat(400);
        assert_eq!(assigned_value(Value::String(digits.clone())), Err(digits));
    }

    #[test]
    fn test_request_command() {
        let request = HttpRequest {
            variable: "$r".to_string(),
            url: "http://example.com".to_string(),
            data: "a=1".to_string(),
            header: "X-Name: it's".to_string(),
            kind: "POST".to_string(),
        };
        assert_eq!(
            request_command(&request),
            r"curl -X GET --data 'a=1' -H 'X-Name: it'\''s' 'http://example.com'"
        );
    }

    #[test]
    fn test_string_operand_must_be_numeric() {
        let value = Value::String(" 42\n".to_string());
        assert_eq!(value.to_number(InfixOperator::Plus).unwrap(), 42.0);

        let value = Value::String("abc".to_string());
        assert!(matches!(
            value.to_number(InfixOperator::Minus),
            Err(ExecutionErrorKind::NotANumber { .. })
        ));
    }
}
