use super::*;
use crate::tests::fixtures::{
    broken_samples::C_SYNTAX, code_samples::C_HELLO, test_scenarios::C_CRASH,
};

const TOOLS: &[&str] = &["gcc"];

#[tokio::test]
async fn test_c_basic() {
    test_language_execution(&setup_compiled_service(), Language::C, TOOLS, C_HELLO).await
}

#[tokio::test]
async fn test_c_syntax_error() {
    test_language_rejects(
        &setup_compiled_service(),
        Language::C,
        TOOLS,
        C_SYNTAX,
        ErrorType::ParserError,
    )
    .await
}

#[tokio::test]
async fn test_c_stray_character_is_lexical() {
    test_language_rejects(
        &setup_compiled_service(),
        Language::C,
        TOOLS,
        "int main(void) { int x = 1 @ 2; return x; }",
        ErrorType::LexerError,
    )
    .await
}

#[tokio::test]
async fn test_c_abort_is_runtime_error() {
    if skip_if_not_available(TOOLS) {
        return;
    }
    let outcome = execute(&setup_compiled_service(), Language::C, C_CRASH).await;
    assert_eq!(outcome.status, ExecutionStatus::Error);
    assert_eq!(outcome.error_type, Some(ErrorType::RuntimeError));
}
