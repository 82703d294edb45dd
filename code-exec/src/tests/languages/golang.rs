use super::*;
use crate::tests::fixtures::{broken_samples::GO_SYNTAX, code_samples::GO_HELLO};

const TOOLS: &[&str] = &["go"];

#[tokio::test]
async fn test_go_basic() {
    test_language_execution(&setup_compiled_service(), Language::Go, TOOLS, GO_HELLO).await
}

#[tokio::test]
async fn test_go_syntax_error() {
    test_language_rejects(
        &setup_compiled_service(),
        Language::Go,
        TOOLS,
        GO_SYNTAX,
        ErrorType::ParserError,
    )
    .await
}
