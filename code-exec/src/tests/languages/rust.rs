use super::*;
use crate::tests::fixtures::{
    broken_samples::RUST_SYNTAX,
    code_samples::{RUST_HELLO, RUST_WITHOUT_MAIN},
};

const TOOLS: &[&str] = &["rustc"];

#[tokio::test]
async fn test_rust_basic() {
    test_language_execution(&setup_compiled_service(), Language::Rust, TOOLS, RUST_HELLO).await
}

#[tokio::test]
async fn test_rust_without_main() {
    test_language_execution(&setup_compiled_service(), Language::Rust, TOOLS, RUST_WITHOUT_MAIN)
        .await
}

#[tokio::test]
async fn test_rust_syntax_error() {
    test_language_rejects(
        &setup_compiled_service(),
        Language::Rust,
        TOOLS,
        RUST_SYNTAX,
        ErrorType::ParserError,
    )
    .await
}

#[tokio::test]
async fn test_rust_panic_is_runtime_error() {
    if skip_if_not_available(TOOLS) {
        return;
    }
    let outcome = execute(
        &setup_compiled_service(),
        Language::Rust,
        r#"fn main() { println!("partial"); panic!("boom"); }"#,
    )
    .await;
    assert_eq!(outcome.error_type, Some(ErrorType::RuntimeError));
    assert_eq!(outcome.stdout, "partial\n");
}
