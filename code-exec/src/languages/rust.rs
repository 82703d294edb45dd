use std::path::{Path, PathBuf};

use crate::{
    executor::{Invocation, LanguageExecutor},
    languages::{DiagnosticRules, ToolCheck},
    types::{ErrorType, Language},
};

/// Variables a rustup-managed `rustc` needs to find its toolchain once the
/// sandbox has replaced `HOME`.
const TOOLCHAIN_VARS: [&str; 3] = ["RUSTUP_HOME", "CARGO_HOME", "RUSTUP_TOOLCHAIN"];

pub struct RustExecutor {
    edition: String,
    toolchain_env: Vec<(String, String)>,
    rules: DiagnosticRules,
}

impl RustExecutor {
    pub fn new(edition: Option<String>) -> Self {
        Self {
            edition: edition.unwrap_or_else(|| "2021".to_string()),
            toolchain_env: toolchain_env(),
            rules: DiagnosticRules::new(
                concat!(
                    r"unknown start of token",
                    r"|unterminated (double quote string|block comment",
                    r"|character literal|raw string)",
                    r"|unknown character escape|invalid digit for a base|no valid digits found",
                ),
                r"(?m)^error(\[E\d{4}\])?:",
            ),
        }
    }
}

fn toolchain_env() -> Vec<(String, String)> {
    let mut env: Vec<(String, String)> = TOOLCHAIN_VARS
        .iter()
        .filter_map(|key| std::env::var(key).ok().map(|value| (key.to_string(), value)))
        .collect();

    if !env.iter().any(|(key, _)| key == "RUSTUP_HOME") {
        let default_home = std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".rustup"));
        if let Some(home) = default_home.filter(|path| path.is_dir()) {
            env.push(("RUSTUP_HOME".to_string(), home.display().to_string()));
        }
    }
    env
}

impl ToolCheck for RustExecutor {
    fn required_tools(&self) -> Vec<&str> {
        vec!["rustc"]
    }
}

impl LanguageExecutor for RustExecutor {
    fn language(&self) -> Language {
        Language::Rust
    }

    fn source_file(&self) -> &str {
        "main.rs"
    }

    /// Snippets without an entry point are wrapped in `fn main`.
    fn prepare_source(&self, code: &str) -> String {
        if code.contains("fn main") {
            code.to_string()
        } else {
            format!("fn main() {{\n{}\n}}\n", code)
        }
    }

    fn compile_step(&self, _sandbox_dir: &Path) -> Option<Invocation> {
        let edition = format!("--edition={}", self.edition);
        let invocation = Invocation::new(
            "rustc",
            [
                edition.as_str(),
                "--crate-name",
                "user_code",
                "-A",
                "warnings",
                "-o",
                "main",
                self.source_file(),
            ],
        );
        Some(
            self.toolchain_env
                .iter()
                .fold(invocation, |invocation, (key, value)| invocation.env(key, value)),
        )
    }

    fn run_step(&self, _sandbox_dir: &Path) -> Invocation {
        Invocation::new("./main", Vec::<String>::new())
    }

    fn classify_compile_failure(&self, diagnostics: &str) -> ErrorType {
        self.rules.classify_compile(diagnostics)
    }
}
