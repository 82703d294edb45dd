use super::*;
use crate::tests::fixtures::{broken_samples::CPP_SYNTAX, code_samples::CPP_HELLO};

const TOOLS: &[&str] = &["g++"];

#[tokio::test]
async fn test_cpp_basic() {
    test_language_execution(&setup_compiled_service(), Language::Cpp, TOOLS, CPP_HELLO).await
}

#[tokio::test]
async fn test_cpp_syntax_error() {
    test_language_rejects(
        &setup_compiled_service(),
        Language::Cpp,
        TOOLS,
        CPP_SYNTAX,
        ErrorType::ParserError,
    )
    .await
}
