//! Language-specific executor implementations

mod c;
mod cpp;
mod go;
mod javascript;
mod python;
mod rust;

pub use c::CExecutor;
pub use cpp::CppExecutor;
pub use go::GoExecutor;
pub use javascript::JavaScriptExecutor;
pub use python::PythonExecutor;
pub use rust::RustExecutor;

use crate::{error::Error, types::ErrorType};
use regex::Regex;
use which::which;

pub trait ToolCheck {
    fn required_tools(&self) -> Vec<&str>;

    fn check_tools(&self) -> Result<(), Error> {
        let missing: Vec<_> = self
            .required_tools()
            .iter()
            .filter(|tool| which(tool).is_err())
            .map(|s| (*s).to_string())
            .collect();

        if !missing.is_empty() {
            return Err(Error::ToolMissing(missing.join(", ")));
        }
        Ok(())
    }
}

/// Diagnostic patterns for one toolchain.
///
/// `lexical` recognises complaints about individual characters or literals;
/// `syntax` recognises any other front-end rejection. Compile steps that fail
/// without matching either are still treated as syntax errors.
pub(crate) struct DiagnosticRules {
    pub lexical: Regex,
    pub syntax: Regex,
}

impl DiagnosticRules {
    /// Patterns are literals owned by each runner.
    pub fn new(lexical: &str, syntax: &str) -> Self {
        Self {
            lexical: Regex::new(lexical).expect("lexical diagnostic pattern"),
            syntax: Regex::new(syntax).expect("syntax diagnostic pattern"),
        }
    }

    pub fn classify(&self, diagnostics: &str) -> Option<ErrorType> {
        if self.lexical.is_match(diagnostics) {
            Some(ErrorType::LexerError)
        } else if self.syntax.is_match(diagnostics) {
            Some(ErrorType::ParserError)
        } else {
            None
        }
    }

    pub fn classify_compile(&self, diagnostics: &str) -> ErrorType {
        self.classify(diagnostics).unwrap_or(ErrorType::ParserError)
    }
}

#[cfg(test)]
pub(crate) fn skip_if_not_available(tools: &[&str]) -> bool {
    let missing: Vec<_> = tools
        .iter()
        .filter(|tool| which(**tool).is_err())
        .map(|s| (*s).to_string())
        .collect();

    if !missing.is_empty() {
        eprintln!("Skipping test: {} not available", missing.join(", "));
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fake(Vec<&'static str>);

    impl ToolCheck for Fake {
        fn required_tools(&self) -> Vec<&str> {
            self.0.clone()
        }
    }

    #[test]
    fn test_missing_tool_reported() {
        let err = Fake(vec!["definitely-not-a-real-tool-xyz"])
            .check_tools()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ToolMissing(tool) if tool == "definitely-not-a-real-tool-xyz"
        ));
        assert!(Fake(vec![]).check_tools().is_ok());
    }

    #[test]
    fn test_diagnostic_rules_order() {
        let rules = DiagnosticRules::new("bad char", "error");
        assert_eq!(rules.classify("error: bad char"), Some(ErrorType::LexerError));
        assert_eq!(rules.classify("error: oops"), Some(ErrorType::ParserError));
        assert_eq!(rules.classify("panic"), None);
        assert_eq!(rules.classify_compile("linker failed"), ErrorType::ParserError);
    }
}
