use super::{fixtures::script_samples::*, utils::defaults::*};
use crate::{
    encode, CodeExecutionService, ErrorType, ExecutionRequest, ExecutionStatus, ResourceLimits,
    ServiceConfig,
};
use tokio::time::{Duration, Instant};

async fn run_custom(code: &str) -> crate::ExecutionOutcome {
    setup_test_service(1)
        .execute(ExecutionRequest::new(code, "custom"))
        .await
}

#[tokio::test]
async fn test_fibonacci_end_to_end() {
    let service = setup_test_service(1);
    let response = service
        .compile(ExecutionRequest::new(FIBONACCI, "custom"))
        .await;
    assert_eq!(response.result.as_deref(), Some("55\n"));
    assert_eq!(response.error, None);
    assert!(response.execution_time_ms.is_some());
}

#[tokio::test]
async fn test_parse_error_is_classified() {
    let outcome = run_custom(UNBALANCED_PARENS).await;
    assert_eq!(outcome.status, ExecutionStatus::Error);
    assert_eq!(outcome.error_type, Some(ErrorType::ParserError));
    assert!(outcome.message.unwrap().contains("parser error"));
}

#[tokio::test]
async fn test_lex_error_is_classified() {
    let outcome = run_custom(STRAY_CHARACTER).await;
    assert_eq!(outcome.error_type, Some(ErrorType::LexerError));
    assert!(outcome.message.unwrap().contains("unexpected character '§'"));
}

#[tokio::test]
async fn test_runtime_error_keeps_partial_output() {
    let outcome = run_custom(DIVISION_BY_ZERO).await;
    assert_eq!(outcome.error_type, Some(ErrorType::RuntimeError));
    assert_eq!(outcome.stdout, "before\n");

    let response = encode(&outcome);
    assert_eq!(response.result, None);
    assert!(response.error.unwrap().contains("division by zero"));
}

#[tokio::test]
async fn test_infinite_loop_times_out_near_the_limit() {
    let limit = Duration::from_secs(2);
    let service = CodeExecutionService::new(ServiceConfig {
        limits: ResourceLimits {
            time_limit: limit,
            ..default_test_limits()
        },
        ..ServiceConfig::default()
    });

    let started = Instant::now();
    let outcome = service
        .execute(ExecutionRequest::new(INFINITE_LOOP, "custom"))
        .await;
    let waited = started.elapsed();

    assert_eq!(outcome.status, ExecutionStatus::Timeout);
    assert!(outcome.elapsed.unwrap() >= limit);
    assert!(waited < limit + Duration::from_secs(1));
}

#[tokio::test]
async fn test_output_flood_is_cut_off() {
    let outcome = run_custom(PRINT_FOREVER).await;
    assert_eq!(outcome.error_type, Some(ErrorType::RuntimeError));
    assert!(outcome.stdout.len() <= default_test_limits().output_limit);
    assert!(outcome.message.unwrap().contains("output limit exceeded"));
}

#[tokio::test]
async fn test_memory_ceiling() {
    let service = CodeExecutionService::new(ServiceConfig {
        limits: ResourceLimits {
            memory: 1024 * 1024,
            ..default_test_limits()
        },
        ..ServiceConfig::default()
    });
    let outcome = service
        .execute(ExecutionRequest::new(GROW_STRING, "custom"))
        .await;
    assert_eq!(outcome.status, ExecutionStatus::MemoryLimit);
    assert_eq!(outcome.error_type, None);
}

#[tokio::test]
async fn test_unsupported_language_never_runs() {
    let outcome = setup_test_service(1)
        .execute(ExecutionRequest::new(FIBONACCI, "cobol"))
        .await;
    assert_eq!(outcome.error_type, Some(ErrorType::ApiError));
    assert_eq!(outcome.elapsed, None);
    assert_eq!(outcome.message.as_deref(), Some("Unsupported language: cobol"));
}

#[tokio::test]
async fn test_repeated_runs_agree() {
    let service = setup_test_service(2);
    let first = service
        .compile(ExecutionRequest::new(FIBONACCI, "custom"))
        .await;
    let second = service
        .compile(ExecutionRequest::new(FIBONACCI, "custom"))
        .await;
    assert_eq!(first.result, second.result);
    assert_eq!(first.error, second.error);
}

#[tokio::test]
async fn test_for_loops_and_arrays() {
    let outcome = run_custom(FOR_AND_ARRAYS).await;
    assert_eq!(outcome.status, ExecutionStatus::Success);
    assert_eq!(outcome.stdout, "[1, 4, 9, 16, 25] 5 25\n");
}

#[tokio::test]
async fn test_deep_expression_recursion_is_a_runtime_error() {
    let service = setup_test_service(1);
    let outcome = service
        .execute(ExecutionRequest::new(nested_recursion(200), "custom"))
        .await;
    assert_eq!(outcome.status, ExecutionStatus::Error);
    assert_eq!(outcome.error_type, Some(ErrorType::RuntimeError));
    assert!(outcome.message.unwrap().contains("stack overflow"));

    // The engine is still serving afterwards.
    let response = service
        .compile(ExecutionRequest::new(FIBONACCI, "custom"))
        .await;
    assert_eq!(response.result.as_deref(), Some("55\n"));
}

#[tokio::test]
async fn test_concurrent_programs_are_isolated() {
    let service = setup_test_service(4);

    let mut handles = vec![];
    for n in 0..8 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            let code = format!("let x = {n}; fn show() {{ println(x); }} show();");
            (n, service.execute(ExecutionRequest::new(code, "custom")).await)
        }));
    }

    for handle in handles {
        let (n, outcome) = handle.await.unwrap();
        assert_eq!(outcome.stdout, format!("{n}\n"));
    }
}

#[tokio::test]
async fn test_runaway_programs_do_not_starve_neighbours() {
    let limit = Duration::from_secs(2);
    let service = CodeExecutionService::new(ServiceConfig {
        max_concurrent: 8,
        limits: ResourceLimits {
            time_limit: limit,
            memory: 16 * 1024 * 1024,
            ..default_test_limits()
        },
        ..ServiceConfig::default()
    });

    let hungry = [INFINITE_LOOP, GROW_STRING, PRINT_FOREVER];
    let mut runaway = vec![];
    for code in hungry {
        let service = service.clone();
        runaway.push(tokio::spawn(async move {
            service.execute(ExecutionRequest::new(code, "custom")).await
        }));
    }

    let mut handles = vec![];
    for n in 0..4 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            let code = format!(
                "let total = 0; \
                 for (let i = 0; i < 100; i = i + 1) {{ total = total + {n}; }} \
                 println(total);"
            );
            (n, service.execute(ExecutionRequest::new(code, "custom")).await)
        }));
    }

    for handle in handles {
        let (n, outcome) = handle.await.unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Success);
        assert_eq!(outcome.stdout, format!("{}\n", n * 100));
        assert!(outcome.elapsed.unwrap() < limit / 2);
    }

    let mut statuses = vec![];
    for handle in runaway {
        statuses.push(handle.await.unwrap().status);
    }
    assert_eq!(
        statuses,
        vec![
            ExecutionStatus::Timeout,
            ExecutionStatus::MemoryLimit,
            ExecutionStatus::Error,
        ]
    );
}
