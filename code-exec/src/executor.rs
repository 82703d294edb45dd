use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::{
    error::Error,
    languages::{
        CExecutor, CppExecutor, GoExecutor, JavaScriptExecutor, PythonExecutor, RustExecutor,
        ToolCheck,
    },
    sandbox::Sandbox,
    types::{ErrorType, Language},
};

/// One toolchain command run inside a sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Tool name looked up on `PATH`, or `./name` for a file in the sandbox
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment on top of the sandbox's minimal one
    pub env: Vec<(String, String)>,
}

impl Invocation {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            env: Vec::new(),
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Recipe for running one external language.
///
/// A runner stages the source into the sandbox, optionally names a compile
/// step, always names a run step, and says how to read its toolchain's
/// diagnostics. Adding a language means implementing this trait and
/// registering it in [`create_executor`].
#[async_trait]
pub trait LanguageExecutor: ToolCheck + Send + Sync {
    fn language(&self) -> Language;

    /// File name the source is written to, relative to the sandbox root
    fn source_file(&self) -> &str;

    /// Source text as it should be written to disk
    fn prepare_source(&self, code: &str) -> String {
        code.to_string()
    }

    /// Write the source into the sandbox
    async fn stage(&self, sandbox: &Sandbox, code: &str) -> Result<PathBuf, Error> {
        sandbox
            .write_file(self.source_file(), &self.prepare_source(code))
            .await
    }

    /// Compile command, for languages that have one
    fn compile_step(&self, _sandbox_dir: &Path) -> Option<Invocation> {
        None
    }

    fn run_step(&self, sandbox_dir: &Path) -> Invocation;

    /// Classify diagnostics from a failed compile step
    fn classify_compile_failure(&self, _diagnostics: &str) -> ErrorType {
        ErrorType::ParserError
    }

    /// Classify diagnostics from a failed run step. `None` means an ordinary
    /// runtime failure.
    fn classify_run_failure(&self, _diagnostics: &str) -> Option<ErrorType> {
        None
    }
}

/// Runner for `language`, or `None` for the in-process scripting language.
pub fn create_executor(language: Language) -> Option<Box<dyn LanguageExecutor>> {
    match language {
        Language::Custom => None,
        Language::Python => Some(Box::new(PythonExecutor::new(None))),
        Language::JavaScript => Some(Box::new(JavaScriptExecutor::new(None))),
        Language::Rust => Some(Box::new(RustExecutor::new(None))),
        Language::C => Some(Box::new(CExecutor::new(None))),
        Language::Cpp => Some(Box::new(CppExecutor::new(None, None))),
        Language::Go => Some(Box::new(GoExecutor::new(None))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_external_language_has_a_runner() {
        for language in Language::ALL {
            match create_executor(language) {
                Some(executor) => assert_eq!(executor.language(), language),
                None => assert_eq!(language, Language::Custom),
            }
        }
    }

    #[test]
    fn test_invocation_display() {
        let invocation = Invocation::new("gcc", ["-o", "main", "main.c"]).env("LC_ALL", "C");
        assert_eq!(invocation.to_string(), "gcc -o main main.c");
        assert_eq!(invocation.env, vec![("LC_ALL".to_string(), "C".to_string())]);
    }
}
