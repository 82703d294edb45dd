use super::*;
use crate::tests::fixtures::{
    broken_samples::JS_SYNTAX,
    code_samples::JS_HELLO,
    test_scenarios::{JS_BAD_JSON, JS_THROW, JS_WITH_TIMEOUT},
};

const TOOLS: &[&str] = &["node"];

#[tokio::test]
async fn test_javascript_basic() {
    test_language_execution(&setup_test_service(1), Language::JavaScript, TOOLS, JS_HELLO).await
}

#[tokio::test]
async fn test_javascript_syntax_error() {
    test_language_rejects(
        &setup_test_service(1),
        Language::JavaScript,
        TOOLS,
        JS_SYNTAX,
        ErrorType::ParserError,
    )
    .await
}

#[tokio::test]
async fn test_javascript_uncaught_exception() {
    if skip_if_not_available(TOOLS) {
        return;
    }
    let outcome = execute(&setup_test_service(1), Language::JavaScript, JS_THROW).await;
    assert_eq!(outcome.error_type, Some(ErrorType::RuntimeError));
    assert!(outcome.message.unwrap().contains("boom"));
}

#[tokio::test]
async fn test_javascript_syntax_error_thrown_while_running() {
    if skip_if_not_available(TOOLS) {
        return;
    }
    let outcome = execute(&setup_test_service(1), Language::JavaScript, JS_BAD_JSON).await;
    assert_eq!(outcome.error_type, Some(ErrorType::RuntimeError));
    assert_eq!(outcome.stdout, "before\n");
    assert!(outcome.message.unwrap().contains("SyntaxError"));
}

#[tokio::test]
async fn test_javascript_timeout() {
    test_language_timeout(Language::JavaScript, TOOLS, JS_WITH_TIMEOUT).await
}
