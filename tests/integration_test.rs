use std::{cell::RefCell, rc::Rc};

use phplite::{
    interpreter::{ExecutionErrorKind, Interpreter, Value},
    shell::{ShellError, ShellExecutor},
    RunError,
};

#[derive(Default)]
struct RecordingShell {
    commands: Vec<String>,
    response: String,
}

impl RecordingShell {
    fn responding(response: &str) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            commands: Vec::new(),
            response: response.to_string(),
        }))
    }
}

impl ShellExecutor for RecordingShell {
    fn execute(&mut self, command: &str) -> Result<String, ShellError> {
        self.commands.push(command.to_string());
        Ok(self.response.clone())
    }
}

struct FailingShell;

impl ShellExecutor for FailingShell {
    fn execute(&mut self, command: &str) -> Result<String, ShellError> {
        Err(ShellError::Launch {
            command: command.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "sh not found"),
        })
    }
}

struct Outcome {
    output: String,
    diagnostics: String,
    result: Result<(), RunError>,
    interpreter: Interpreter,
}

fn run_program(source: &str, shell: Rc<RefCell<dyn ShellExecutor>>) -> Outcome {
    let output = Rc::new(RefCell::new(Vec::new()));
    let diagnostics = Rc::new(RefCell::new(Vec::new()));
    let mut interpreter = Interpreter::new(output.clone(), diagnostics.clone(), shell);
    let result = phplite::run(source, &mut interpreter);
    Outcome {
        output: String::from_utf8(output.take()).expect("Output should be valid UTF-8"),
        diagnostics: String::from_utf8(diagnostics.take())
            .expect("Diagnostics should be valid UTF-8"),
        result,
        interpreter,
    }
}

fn test_valid_program(source: &str, expected_output: &str) {
    let outcome = run_program(source, RecordingShell::responding(""));
    outcome
        .result
        .expect("Interpret should work on valid program");
    assert_eq!(outcome.diagnostics, "");
    assert_eq!(outcome.output, expected_output);
}

#[test]
fn test_text_passes_through_verbatim() {
    let source = "<html>\n  <p>1 < 2 && 3 > 2</p>\n</html>\n<";
    test_valid_program(source, source);
}

#[test]
fn test_multiplication_binds_tighter() {
    test_valid_program("<?php print 2 + 3 * 4; ?>", "14\n");
}

#[test]
fn test_concatenation() {
    test_valid_program(r#"<?php print "a" . "b"; ?>"#, "ab\n");
    test_valid_program(r#"<?php print 1 + 2 . "x" . 3 * 2; ?>"#, "3x6\n");
}

#[test]
fn test_numeric_string_in_arithmetic() {
    test_valid_program(r#"<?php $x = "5"; print $x + 1; ?>"#, "6\n");
}

#[test]
fn test_number_formatting() {
    test_valid_program("<?php print 7 / 2; print 10 - 2.5 * 2; ?>", "3.5\n5\n");
    test_valid_program(r#"<?php $a = 2.50; print $a . "x"; ?>"#, "2.5x\n");
}

#[test]
fn test_number_literals_print_as_written() {
    test_valid_program(
        r#"<?php print 2.50; print "v" . 007; print 007 + 1; ?>"#,
        "2.50\nv007\n8\n",
    );
}

#[test]
fn test_division_by_zero_follows_ieee() {
    test_valid_program(
        "<?php print 1 / 0; print 0 / 0; print 0 - 1 / 0; ?>",
        "inf\nNaN\n-inf\n",
    );
}

#[test]
fn test_template() {
    let source = r#"<h1><?php
    // the title
    $title = "Report";
    echo $title;
?></h1>
<?php /* totals */ $n = 3; $price = 2.5; ?>Total: <?php print $n * $price . " EUR"; ?>"#;
    let expected = "<h1>Report\n</h1>\nTotal: 7.5 EUR\n";
    test_valid_program(source, expected);
}

#[test]
fn test_reassignment_changes_type() {
    let outcome = run_program(
        r#"<?php $v = 1; $v = "one"; print $v; ?>"#,
        RecordingShell::responding(""),
    );
    outcome.result.expect("program should run");
    assert_eq!(outcome.output, "one\n");
    assert_eq!(
        outcome.interpreter.environment().get("$v"),
        Some(&Value::String("one".to_string()))
    );
}

#[test]
fn test_undefined_variable_is_zero() {
    let outcome = run_program("<?php print $nope; ?>", RecordingShell::responding(""));
    outcome.result.expect("program should run");
    assert_eq!(outcome.output, "0\n");
    assert_eq!(
        outcome.diagnostics,
        "warning: Undefined variable $nope at 1:13\n"
    );
}

#[test]
fn test_overflowing_assignment_keeps_previous_value() {
    let outcome = run_program(
        r#"<?php $x = 1; $x = "1e999"; print $x; ?>"#,
        RecordingShell::responding(""),
    );
    outcome.result.expect("program should run");
    assert_eq!(outcome.output, "1\n");
    assert!(outcome
        .diagnostics
        .contains("Number out of range for variable assignment: $x = 1e999"));
}

#[test]
fn test_overflowing_literal_keeps_previous_value() {
    let digits = "9".repeat(400);
    let source = format!("<?php $x = 1; $x = {}; print $x; ?>", digits);
    let outcome = run_program(&source, RecordingShell::responding(""));
    outcome.result.expect("program should run");
    assert_eq!(outcome.output, "1\n");
    assert!(outcome
        .diagnostics
        .starts_with("warning: Number out of range for variable assignment: $x = 999"));
    assert_eq!(
        outcome.interpreter.environment().get("$x"),
        Some(&Value::Number(1.0))
    );
}

#[test]
fn test_non_numeric_operand_aborts() {
    let outcome = run_program(
        r#"<?php $x = "abc"; print "before"; print $x + 1; print "after"; ?>"#,
        RecordingShell::responding(""),
    );
    assert_eq!(outcome.output, "before\n");
    match outcome.result {
        Err(RunError::Execution(error)) => {
            assert!(matches!(
                error.kind(),
                ExecutionErrorKind::NotANumber { value, .. } if value == "abc"
            ));
        }
        other => panic!("expected an execution error, got {:?}", other),
    }
}

#[test]
fn test_close_tag_without_open_tag_truncates() {
    let outcome = run_program(
        "first ?> <?php print 1; ?>",
        RecordingShell::responding(""),
    );
    outcome.result.expect("recovered program should run");
    assert_eq!(outcome.output, "first ");
    assert!(outcome
        .diagnostics
        .contains("error: Unexpected \"?>\" without opening \"<?php\" at 1:7"));
    assert!(outcome.diagnostics.contains("Expected \"end of file\""));
}

#[test]
fn test_syntax_errors_do_not_stop_the_run() {
    let outcome = run_program(
        "<?php print 1 print 2; $a = ; ?>done",
        RecordingShell::responding(""),
    );
    outcome.result.expect("recovered program should run");
    assert_eq!(outcome.output, "2\ndone");
    assert_eq!(outcome.diagnostics.matches("error: ").count(), 2);
}

#[test]
fn test_missing_semicolon_resumes_at_next_statement() {
    let outcome = run_program(
        "<?php print 1 $x = 2; print $x; ?>",
        RecordingShell::responding(""),
    );
    outcome.result.expect("recovered program should run");
    assert_eq!(outcome.output, "2\n");
    assert_eq!(outcome.diagnostics.matches("error: ").count(), 1);
    assert!(!outcome.diagnostics.contains("warning: "));
}

#[test]
fn test_db_query() {
    let shell = RecordingShell::responding("Database query: SELECT 1\n");
    let outcome = run_program(r#"<?php db "SELECT 1"; ?>"#, shell.clone());
    outcome.result.expect("program should run");
    assert_eq!(
        shell.borrow().commands,
        vec!["echo 'Database query: SELECT 1'".to_string()]
    );
    assert_eq!(outcome.output, "Database query: SELECT 1\n\n");
}

#[test]
fn test_http_request_assigns_text() {
    let shell = RecordingShell::responding("42\n");
    let outcome = run_program(
        r#"<?php http($r, "http://localhost/n", "q=1", "Accept: text/plain", "GET");
print $r . "!";
print $r + 1; ?>"#,
        shell.clone(),
    );
    outcome.result.expect("program should run");
    assert_eq!(
        shell.borrow().commands,
        vec![
            "curl -X GET --data 'q=1' -H 'Accept: text/plain' 'http://localhost/n'".to_string()
        ]
    );
    assert_eq!(outcome.output, "42\n!\n43\n");
    assert_eq!(
        outcome.interpreter.environment().get("$r"),
        Some(&Value::String("42\n".to_string()))
    );
}

#[test]
fn test_assigning_request_output_stores_a_number() {
    let shell = RecordingShell::responding("5\n");
    let outcome = run_program(
        r#"<?php http($r, "u", "d", "h"); $y = $r; print $y . "!"; ?>"#,
        shell,
    );
    outcome.result.expect("program should run");
    assert_eq!(outcome.output, "5!\n");
    assert_eq!(
        outcome.interpreter.environment().get("$y"),
        Some(&Value::Number(5.0))
    );
}

#[test]
fn test_shell_launch_failure_is_fatal() {
    let outcome = run_program(
        r#"<?php db "x"; print 1; ?>"#,
        Rc::new(RefCell::new(FailingShell)),
    );
    assert_eq!(outcome.output, "");
    match outcome.result {
        Err(RunError::Execution(error)) => {
            assert!(matches!(error.kind(), ExecutionErrorKind::Shell(_)));
        }
        other => panic!("expected an execution error, got {:?}", other),
    }
}

#[test]
fn test_runs_are_deterministic() {
    let source = r#"a<?php $x = 2; print $x * $x . "-" . $y; ?>b"#;
    let first = run_program(source, RecordingShell::responding(""));
    let second = run_program(source, RecordingShell::responding(""));
    assert_eq!(first.output, "a4-0\nb");
    assert_eq!(first.output, second.output);
    assert_eq!(first.diagnostics, second.diagnostics);
}
