use std::path::Path;

use crate::{
    executor::{Invocation, LanguageExecutor},
    languages::{DiagnosticRules, ToolCheck},
    types::{ErrorType, Language},
};

/// Diagnostics shared by the GCC front ends.
pub(crate) fn gcc_rules() -> DiagnosticRules {
    DiagnosticRules::new(
        concat!(
            r"stray '.*' in program|missing terminating ['\x22] character|unterminated comment",
            r"|invalid suffix .* on (integer|floating) constant|exponent has no digits",
        ),
        r"error:",
    )
}

pub struct CExecutor {
    std_version: String,
    rules: DiagnosticRules,
}

impl CExecutor {
    pub fn new(std_version: Option<String>) -> Self {
        Self {
            std_version: std_version.unwrap_or_else(|| "c99".to_string()),
            rules: gcc_rules(),
        }
    }
}

impl ToolCheck for CExecutor {
    fn required_tools(&self) -> Vec<&str> {
        vec!["gcc"]
    }
}

impl LanguageExecutor for CExecutor {
    fn language(&self) -> Language {
        Language::C
    }

    fn source_file(&self) -> &str {
        "main.c"
    }

    fn compile_step(&self, _sandbox_dir: &Path) -> Option<Invocation> {
        let std = format!("-std={}", self.std_version);
        Some(
            Invocation::new(
                "gcc",
                [std.as_str(), "-Wall", "-O2", "-o", "main", self.source_file(), "-lm"],
            )
            .env("LC_ALL", "C"),
        )
    }

    fn run_step(&self, _sandbox_dir: &Path) -> Invocation {
        Invocation::new("./main", Vec::<String>::new())
    }

    fn classify_compile_failure(&self, diagnostics: &str) -> ErrorType {
        self.rules.classify_compile(diagnostics)
    }
}
