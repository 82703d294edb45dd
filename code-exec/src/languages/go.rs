use std::path::{Path, PathBuf};

use crate::{
    executor::{Invocation, LanguageExecutor},
    languages::{DiagnosticRules, ToolCheck},
    types::{ErrorType, Language},
};

pub struct GoExecutor {
    /// Build cache shared across sandboxes; a cold cache rebuilds the
    /// standard library on every request.
    cache_dir: PathBuf,
    rules: DiagnosticRules,
}

impl GoExecutor {
    pub fn new(cache_dir: Option<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir
                .unwrap_or_else(|| std::env::temp_dir().join("code-exec-go-cache")),
            rules: DiagnosticRules::new(
                concat!(
                    r"invalid character|newline in string|string literal not terminated",
                    r"|rune literal not terminated|raw string literal not terminated",
                    r"|comment not terminated|invalid radix point",
                ),
                r"syntax error|(?m)^\./main\.go:\d+:\d+:",
            ),
        }
    }
}

impl ToolCheck for GoExecutor {
    fn required_tools(&self) -> Vec<&str> {
        vec!["go"]
    }
}

impl LanguageExecutor for GoExecutor {
    fn language(&self) -> Language {
        Language::Go
    }

    fn source_file(&self) -> &str {
        "main.go"
    }

    fn compile_step(&self, sandbox_dir: &Path) -> Option<Invocation> {
        Some(
            Invocation::new("go", ["build", "-o", "main", self.source_file()])
                .env("GOCACHE", self.cache_dir.display().to_string())
                .env("GOPATH", sandbox_dir.join("tmp").join("go").display().to_string())
                .env("GOTOOLCHAIN", "local")
                .env("GOPROXY", "off"),
        )
    }

    fn run_step(&self, _sandbox_dir: &Path) -> Invocation {
        Invocation::new("./main", Vec::<String>::new())
    }

    fn classify_compile_failure(&self, diagnostics: &str) -> ErrorType {
        self.rules.classify_compile(diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_go_diagnostics() {
        let executor = GoExecutor::new(None);
        let lexical = "# command-line-arguments\n./main.go:4:14: invalid character U+00A7 '§'\n";
        assert_eq!(executor.classify_compile_failure(lexical), ErrorType::LexerError);

        let syntax = "# command-line-arguments\n\
                      ./main.go:5:1: syntax error: unexpected }, expected expression\n";
        assert_eq!(executor.classify_compile_failure(syntax), ErrorType::ParserError);
    }

    #[test]
    fn test_go_build_uses_shared_cache() {
        let cache = PathBuf::from("/var/cache/go-build");
        let executor = GoExecutor::new(Some(cache));
        let compile = executor.compile_step(Path::new("/sandbox")).unwrap();
        assert!(compile
            .env
            .contains(&("GOCACHE".to_string(), "/var/cache/go-build".to_string())));
        assert!(compile
            .env
            .contains(&("GOPATH".to_string(), "/sandbox/tmp/go".to_string())));
    }
}
