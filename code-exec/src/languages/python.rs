use std::path::Path;

use crate::{
    executor::{Invocation, LanguageExecutor},
    languages::{DiagnosticRules, ToolCheck},
    types::{ErrorType, Language},
};

pub struct PythonExecutor {
    interpreter: String,
    rules: DiagnosticRules,
}

impl PythonExecutor {
    pub fn new(interpreter: Option<String>) -> Self {
        Self {
            interpreter: interpreter.unwrap_or_else(|| "python3".to_string()),
            rules: DiagnosticRules::new(
                concat!(
                    r"(?m)^SyntaxError: (invalid character|invalid non-printable character",
                    r"|unterminated (triple-quoted )?string literal",
                    r"|invalid decimal literal|invalid hexadecimal literal",
                    r"|EOL while scanning|EOF while scanning)",
                ),
                r"(?m)^(SyntaxError|IndentationError|TabError):",
            ),
        }
    }
}

impl ToolCheck for PythonExecutor {
    fn required_tools(&self) -> Vec<&str> {
        vec![self.interpreter.as_str()]
    }
}

impl LanguageExecutor for PythonExecutor {
    fn language(&self) -> Language {
        Language::Python
    }

    fn source_file(&self) -> &str {
        "main.py"
    }

    /// Byte-compile without running, so syntax errors are told apart from a
    /// `SyntaxError` the program raises itself (`exec`, `compile`).
    fn compile_step(&self, _sandbox_dir: &Path) -> Option<Invocation> {
        Some(Invocation::new(
            &self.interpreter,
            ["-I", "-m", "py_compile", self.source_file()],
        ))
    }

    fn run_step(&self, _sandbox_dir: &Path) -> Invocation {
        // -I: ignore PYTHON* variables and the user site directory
        Invocation::new(&self.interpreter, ["-B", "-I", self.source_file()])
    }

    fn classify_compile_failure(&self, diagnostics: &str) -> ErrorType {
        self.rules.classify_compile(diagnostics)
    }
}
