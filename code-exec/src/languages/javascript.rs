use std::path::Path;

use crate::{
    executor::{Invocation, LanguageExecutor},
    languages::{DiagnosticRules, ToolCheck},
    types::{ErrorType, Language},
};

pub struct JavaScriptExecutor {
    runtime: String,
    rules: DiagnosticRules,
}

impl JavaScriptExecutor {
    pub fn new(runtime: Option<String>) -> Self {
        Self {
            runtime: runtime.unwrap_or_else(|| "node".to_string()),
            rules: DiagnosticRules::new(
                concat!(
                    r"(?m)^SyntaxError: (Invalid or unexpected token",
                    r"|Unterminated (string constant|template literal|regular expression)",
                    r"|Invalid (hexadecimal|Unicode) escape sequence",
                    r"|Numeric separators are not allowed)",
                ),
                r"(?m)^SyntaxError:",
            ),
        }
    }
}

impl ToolCheck for JavaScriptExecutor {
    fn required_tools(&self) -> Vec<&str> {
        vec![self.runtime.as_str()]
    }
}

impl LanguageExecutor for JavaScriptExecutor {
    fn language(&self) -> Language {
        Language::JavaScript
    }

    fn source_file(&self) -> &str {
        "main.js"
    }

    /// Syntax check only. A `SyntaxError` thrown later by `JSON.parse` or
    /// `eval` belongs to the running program.
    fn compile_step(&self, _sandbox_dir: &Path) -> Option<Invocation> {
        Some(Invocation::new(&self.runtime, ["--check", self.source_file()]))
    }

    fn run_step(&self, _sandbox_dir: &Path) -> Invocation {
        Invocation::new(&self.runtime, [self.source_file()])
    }

    fn classify_compile_failure(&self, diagnostics: &str) -> ErrorType {
        self.rules.classify_compile(diagnostics)
    }
}
