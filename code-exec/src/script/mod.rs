//! Front end and evaluator for the small scripting language accepted under
//! the `custom` language selector.
//!
//! The pipeline is `lexer::tokenize` → `parser::parse` → [`evaluate`]. Every
//! stage reports failures as a [`ScriptError`]; nothing here panics on user
//! input or touches process-level stdout.

pub mod ast;
pub mod budget;
pub mod env;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod token;
pub mod value;

pub use budget::{Budget, CancelFlag, ScriptLimits};
pub use error::{RuntimeError, ScriptError, ScriptResult};

use ast::Program;
use interpreter::Interpreter;

/// What one evaluation produced, successful or not.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptReport {
    /// Program result on success: captured stdout, or the display of the
    /// final expression when nothing was printed.
    pub outcome: ScriptResult<String>,
    /// Everything printed before evaluation ended.
    pub stdout: String,
    /// Highest value of the retained-memory meter, in bytes.
    pub peak_memory: u64,
}

/// Evaluate an already parsed program against a running budget.
pub fn evaluate(program: &Program, limits: &ScriptLimits, budget: Budget) -> ScriptReport {
    let mut interpreter = Interpreter::new(limits, budget);
    let result = interpreter.run(program);
    let peak_memory = interpreter.peak_memory();
    let stdout = interpreter.into_stdout();

    let outcome = result.map(|last| match last {
        Some(value) if stdout.is_empty() => value.to_string(),
        _ => stdout.clone(),
    });

    ScriptReport {
        outcome,
        stdout,
        peak_memory,
    }
}

/// Lex, parse and evaluate `source`. The time budget starts here and covers
/// all three stages.
pub fn run(source: &str, limits: &ScriptLimits, cancel: CancelFlag) -> ScriptReport {
    let budget = Budget::new(limits, cancel);

    let program = lexer::tokenize(source)
        .and_then(|tokens| {
            budget.check_clock()?;
            parser::parse(tokens)
        })
        .and_then(|program| {
            budget.check_clock()?;
            Ok(program)
        });

    match program {
        Ok(program) => evaluate(&program, limits, budget),
        Err(err) => ScriptReport {
            outcome: Err(err),
            stdout: String::new(),
            peak_memory: 0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn run_default(source: &str) -> ScriptReport {
        run(source, &ScriptLimits::default(), CancelFlag::new())
    }

    #[test]
    fn test_result_is_captured_stdout() {
        let report = run_default(r#"println("hello"); println(1 + 2);"#);
        assert_eq!(report.outcome, Ok("hello\n3\n".to_string()));
        assert!(report.peak_memory > 0);
    }

    #[test]
    fn test_result_falls_back_to_last_expression() {
        assert_eq!(run_default("let a = 2; a * 21").outcome, Ok("42".to_string()));
        assert_eq!(run_default("let a = 2;").outcome, Ok(String::new()));
    }

    #[test]
    fn test_stage_errors_are_reported() {
        assert!(matches!(
            run_default("§").outcome,
            Err(ScriptError::Lex { .. })
        ));
        assert!(matches!(
            run_default("println((1 + 2);").outcome,
            Err(ScriptError::Parse { .. })
        ));
        assert!(matches!(
            run_default("println(1 / 0);").outcome,
            Err(ScriptError::Runtime {
                error: RuntimeError::DivisionByZero,
                ..
            })
        ));
    }

    #[test]
    fn test_partial_stdout_kept_on_failure() {
        let report = run_default(r#"println("before"); println(missing);"#);
        assert!(report.outcome.is_err());
        assert_eq!(report.stdout, "before\n");
    }

    #[test]
    fn test_cancelled_before_start_times_out() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let limits = ScriptLimits {
            time_limit: Duration::from_secs(1),
            ..ScriptLimits::default()
        };
        assert_eq!(
            run("println(1);", &limits, cancel).outcome,
            Err(ScriptError::Timeout(1000))
        );
    }
}
