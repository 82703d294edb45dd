use super::utils::defaults::*;
use crate::{
    languages::skip_if_not_available, CodeExecutionService, ErrorType, ExecutionOutcome,
    ExecutionRequest, ExecutionStatus, Language,
};

mod c;
mod cpp;
mod golang;
mod javascript;
mod python;
mod rust;

async fn execute(
    service: &CodeExecutionService,
    language: Language,
    code: &str,
) -> ExecutionOutcome {
    service
        .execute(ExecutionRequest::new(code, language.as_str()))
        .await
}

// Common test utilities for language tests
pub(crate) async fn test_language_execution(
    service: &CodeExecutionService,
    language: Language,
    tools: &[&str],
    code: &str,
) {
    if skip_if_not_available(tools) {
        return;
    }
    let outcome = execute(service, language, code).await;
    assert_eq!(outcome.status, ExecutionStatus::Success, "{:?}", outcome.message);
    assert!(outcome.stdout.contains("Hello from"));
    assert!(outcome.elapsed.is_some());
}

pub(crate) async fn test_language_rejects(
    service: &CodeExecutionService,
    language: Language,
    tools: &[&str],
    code: &str,
    expected: ErrorType,
) {
    if skip_if_not_available(tools) {
        return;
    }
    let outcome = execute(service, language, code).await;
    assert_eq!(outcome.status, ExecutionStatus::Error);
    assert_eq!(outcome.error_type, Some(expected), "{:?}", outcome.message);
    assert!(outcome.message.is_some_and(|m| !m.is_empty()));
}

pub(crate) async fn test_language_timeout(language: Language, tools: &[&str], code: &str) {
    if skip_if_not_available(tools) {
        return;
    }
    let outcome = execute(&setup_test_service(1), language, code).await;
    assert_eq!(outcome.status, ExecutionStatus::Timeout);
    assert!(outcome.elapsed.unwrap() < default_timeout() * 2);
}
