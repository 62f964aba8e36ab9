use std::process::{Command, Stdio};

#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error("Failed to launch `{command}`: {source}")]
    Launch {
        command: String,
        source: std::io::Error,
    },
}

/// Runs a command line synchronously and returns what it wrote to stdout.
pub trait ShellExecutor {
    fn execute(&mut self, command: &str) -> Result<String, ShellError>;
}

/// Executes commands through `sh -c`.
///
/// The child's stderr is inherited and its exit status is ignored; only a
/// failure to spawn it is an error.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShell;

impl ShellExecutor for SystemShell {
    fn execute(&mut self, command: &str) -> Result<String, ShellError> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .map_err(|source| ShellError::Launch {
                command: command.to_string(),
                source,
            })?;

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Quotes `argument` as a single POSIX shell word.
pub fn quote(argument: &str) -> String {
    format!("'{}'", argument.replace('\'', r"'\''"))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_quote() {
        assert_eq!(quote("plain"), "'plain'");
        assert_eq!(quote(""), "''");
        assert_eq!(quote("it's $HOME"), r"'it'\''s $HOME'");
    }

    #[cfg(unix)]
    #[test]
    fn test_system_shell_captures_stdout() {
        let output = SystemShell
            .execute(&format!("echo {}", quote("a b")))
            .expect("sh should be available");
        assert_eq!(output, "a b\n");
    }
}
