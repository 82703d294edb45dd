use std::path::Path;

use crate::{
    executor::{Invocation, LanguageExecutor},
    languages::{c::gcc_rules, DiagnosticRules, ToolCheck},
    types::{ErrorType, Language},
};

pub struct CppExecutor {
    std_version: String,
    compiler: String,
    rules: DiagnosticRules,
}

impl CppExecutor {
    pub fn new(std_version: Option<String>, compiler: Option<String>) -> Self {
        Self {
            std_version: std_version.unwrap_or_else(|| "17".to_string()),
            compiler: compiler.unwrap_or_else(|| "g++".to_string()),
            rules: gcc_rules(),
        }
    }
}

impl ToolCheck for CppExecutor {
    fn required_tools(&self) -> Vec<&str> {
        vec![self.compiler.as_str()]
    }
}

impl LanguageExecutor for CppExecutor {
    fn language(&self) -> Language {
        Language::Cpp
    }

    fn source_file(&self) -> &str {
        "main.cpp"
    }

    fn compile_step(&self, _sandbox_dir: &Path) -> Option<Invocation> {
        let std = format!("-std=c++{}", self.std_version);
        Some(
            Invocation::new(
                &self.compiler,
                [std.as_str(), "-Wall", "-O2", "-o", "main", self.source_file()],
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
