use std::{io::Write, path::PathBuf};

use clap::{error::ErrorKind, Parser};
use phplite::{interpreter::Interpreter, tokenizer::Token};

#[derive(Debug, Parser)]
#[command(version, about = "Runs a phplite template")]
struct Cli {
    /// Source file to run
    file: PathBuf,

    /// Print the token stream instead of running
    #[arg(long, conflicts_with = "ast")]
    tokens: bool,

    /// Print the parsed program instead of running
    #[arg(long)]
    ast: bool,
}

fn main() {
    let args = match Cli::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            eprint!("{}", e.render());
            std::process::exit(1);
        }
    };

    let source = match std::fs::read_to_string(&args.file) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Unable to open file: {}: {}", args.file.display(), e);
            std::process::exit(1);
        }
    };

    if args.tokens {
        tokens_command(&source);
    } else if args.ast {
        ast_command(&source);
    } else if let Err(e) = run_command(&source) {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn run_command(source: &str) -> Result<(), phplite::RunError> {
    let mut interpreter = Interpreter::default();
    let result = phplite::run(source, &mut interpreter);
    std::io::stdout().flush()?;
    result
}

fn tokens_command(source: &str) {
    let tokens = tokenize(source);
    let mut line = 0;
    for token in &tokens {
        if token.span.start_line != line {
            print!("{:4} ", token.span.start_line);
            line = token.span.start_line;
        } else {
            print!("   | ");
        }

        println!("{:<10} {:?}", format!("{:?}", token.token_type), token.lexeme);
    }
}

fn ast_command(source: &str) {
    let tokens = tokenize(source);
    let (program, errors) = phplite::parser::program(&tokens);
    for error in errors.iter() {
        eprintln!("error: {error}");
    }
    print!("{program}");
}

fn tokenize(source: &str) -> Vec<Token> {
    match phplite::tokenizer::tokens(source) {
        Ok(tokens) => tokens,
        Err(e) => {
            eprintln!("error: {e}");
            e.tokens
        }
    }
}
