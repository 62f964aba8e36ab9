pub mod ast;
pub mod interpreter;
pub mod parser;
pub mod shell;
pub mod span;
pub mod tokenizer;

use interpreter::{ExecutionError, Interpreter};

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

/// Tokenizes, parses and executes `source`.
///
/// Lexical and syntax errors are written to the interpreter's diagnostic
/// channel and whatever could be recovered still runs. Only fatal execution
/// errors are returned.
pub fn run(source: &str, interpreter: &mut Interpreter) -> Result<(), RunError> {
    let tokens = match tokenizer::tokens(source) {
        Ok(tokens) => tokens,
        Err(error) => {
            interpreter.report(&error)?;
            error.tokens
        }
    };

    let (program, errors) = parser::program(&tokens);
    for error in errors.iter() {
        interpreter.report(error)?;
    }

    interpreter.interpret(&program)?;
    Ok(())
}
