use super::*;
use crate::tests::fixtures::{
    broken_samples::{PYTHON_LEXICAL, PYTHON_SYNTAX},
    code_samples::PYTHON_HELLO,
    test_scenarios::*,
};

const TOOLS: &[&str] = &["python3"];

#[tokio::test]
async fn test_python_basic() {
    test_language_execution(&setup_test_service(1), Language::Python, TOOLS, PYTHON_HELLO).await
}

#[tokio::test]
async fn test_python_multiline() {
    if skip_if_not_available(TOOLS) {
        return;
    }
    let outcome = execute(&setup_test_service(1), Language::Python, PYTHON_MULTILINE).await;
    assert_eq!(outcome.stdout, "Factorial of 5 is 120\n");
}

#[tokio::test]
async fn test_python_syntax_errors() {
    let service = setup_test_service(1);
    for (code, expected) in [
        (PYTHON_SYNTAX, ErrorType::ParserError),
        (PYTHON_LEXICAL, ErrorType::LexerError),
    ] {
        test_language_rejects(&service, Language::Python, TOOLS, code, expected).await;
    }
}

#[tokio::test]
async fn test_python_runtime_error() {
    if skip_if_not_available(TOOLS) {
        return;
    }
    let outcome = execute(&setup_test_service(1), Language::Python, PYTHON_ZERO_DIVISION).await;
    assert_eq!(outcome.error_type, Some(ErrorType::RuntimeError));
    assert_eq!(outcome.stdout, "before\n");
    assert!(outcome.message.unwrap().contains("ZeroDivisionError"));
}

#[tokio::test]
async fn test_python_syntax_error_raised_while_running() {
    if skip_if_not_available(TOOLS) {
        return;
    }
    let service = setup_test_service(1);
    let outcome = execute(&service, Language::Python, PYTHON_RAISES_SYNTAX_ERROR).await;
    assert_eq!(outcome.error_type, Some(ErrorType::RuntimeError));
    assert_eq!(outcome.stdout, "before\n");
    assert!(outcome.message.unwrap().contains("SyntaxError"));
}

#[tokio::test]
async fn test_python_timeout() {
    test_language_timeout(Language::Python, TOOLS, PYTHON_SLEEP).await
}

#[tokio::test]
async fn test_python_memory_limit() {
    if skip_if_not_available(TOOLS) {
        return;
    }
    let outcome = execute(&setup_test_service(1), Language::Python, PYTHON_RESOURCE_HEAVY).await;
    assert_eq!(outcome.status, ExecutionStatus::MemoryLimit);
    assert!(outcome.peak_memory.is_some());
}
