use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::{self, Duration};
use tracing::{debug, info, warn};

use crate::{
    dispatcher::Dispatcher,
    encoder::{encode, CompileResponse, ErrorLogRecord, ExecutionRecord},
    types::{ErrorType, ExecutionOutcome, ExecutionRequest, Language, ResourceLimits},
};

/// Admission and resource settings for the engine.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Executions allowed to run at once
    pub max_concurrent: usize,
    /// How long a request may wait for a free slot before it is turned away
    pub queue_timeout: Duration,
    pub limits: ResourceLimits,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            queue_timeout: Duration::from_secs(5),
            limits: ResourceLimits::default(),
        }
    }
}

#[derive(Clone)]
pub struct CodeExecutionService {
    dispatcher: Arc<Dispatcher>,
    semaphore: Arc<Semaphore>,
    config: ServiceConfig,
}

impl CodeExecutionService {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            dispatcher: Arc::new(Dispatcher::new(config.limits.clone())),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
            config,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Run one request to its terminal outcome.
    ///
    /// Malformed requests are rejected before a slot is taken. If no slot
    /// frees up within `queue_timeout` the request fails with `SYSTEM_ERROR`.
    pub async fn execute(&self, request: ExecutionRequest) -> ExecutionOutcome {
        let language = match self
            .dispatcher
            .validate(&request.code, request.language.as_deref())
        {
            Ok(language) => language,
            Err(rejection) => {
                debug!(
                    language = ?request.language,
                    message = ?rejection.message,
                    "Request rejected"
                );
                return rejection;
            }
        };

        let permit = match time::timeout(
            self.config.queue_timeout,
            Arc::clone(&self.semaphore).acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            _ => {
                warn!(%language, "No execution slot available");
                return ExecutionOutcome::error(ErrorType::SystemError, "engine at capacity");
            }
        };

        let outcome = self.dispatcher.run(language, &request.code).await;
        drop(permit);

        info!(
            %language,
            status = %outcome.status,
            error_type = ?outcome.error_type,
            elapsed_ms = ?outcome.elapsed_ms(),
            peak_memory = ?outcome.peak_memory,
            "Code execution completed"
        );

        outcome
    }

    /// Run a request and encode the outcome for the wire.
    pub async fn compile(&self, request: ExecutionRequest) -> CompileResponse {
        encode(&self.execute(request).await)
    }

    /// Run a request and produce the rows the persistence collaborator
    /// stores: the completed execution and, for failures, its error log.
    pub async fn execute_recorded(
        &self,
        request: ExecutionRequest,
    ) -> (ExecutionRecord, Option<ErrorLogRecord>) {
        let language = match request.language.as_deref().map(str::trim) {
            None | Some("") => Some(Language::Custom),
            Some(selector) => selector.parse().ok(),
        };
        let mut record = ExecutionRecord::pending(language);
        let outcome = self.execute(request).await;
        record.complete(&outcome);
        let log = ErrorLogRecord::from_outcome(&record, &outcome);
        (record, log)
    }

    pub fn get_available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExecutionStatus;

    #[tokio::test]
    async fn test_concurrent_executions() {
        let service = Arc::new(CodeExecutionService::new(ServiceConfig {
            max_concurrent: 3,
            ..ServiceConfig::default()
        }));

        let mut handles = vec![];
        for n in 0..6 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                let code = format!("let n = {n}; println(n * n);");
                (n, service.execute(ExecutionRequest::new(code, "custom")).await)
            }));
        }

        for handle in handles {
            let (n, outcome) = handle.await.unwrap();
            assert_eq!(outcome.status, ExecutionStatus::Success);
            assert_eq!(outcome.stdout, format!("{}\n", n * n));
        }
        assert_eq!(service.get_available_slots(), 3);
    }

    #[tokio::test]
    async fn test_execution_limit() {
        let service = CodeExecutionService::new(ServiceConfig {
            max_concurrent: 2,
            ..ServiceConfig::default()
        });
        assert_eq!(service.get_available_slots(), 2);
    }

    #[tokio::test]
    async fn test_rejects_when_at_capacity() {
        let service = CodeExecutionService::new(ServiceConfig {
            max_concurrent: 1,
            queue_timeout: Duration::from_millis(50),
            ..ServiceConfig::default()
        });
        let _held = service.semaphore.clone().acquire_owned().await.unwrap();

        let outcome = service
            .execute(ExecutionRequest::new("println(1);", "custom"))
            .await;
        assert_eq!(outcome.error_type, Some(ErrorType::SystemError));
        assert_eq!(outcome.elapsed, None);
    }

    #[tokio::test]
    async fn test_unknown_language_skips_admission() {
        let service = CodeExecutionService::new(ServiceConfig {
            max_concurrent: 1,
            queue_timeout: Duration::from_secs(30),
            ..ServiceConfig::default()
        });
        let _held = service.semaphore.clone().acquire_owned().await.unwrap();

        let outcome = service
            .execute(ExecutionRequest::new("DISPLAY 'HI'.", "cobol"))
            .await;
        assert_eq!(outcome.error_type, Some(ErrorType::ApiError));
    }

    #[tokio::test]
    async fn test_execute_recorded() {
        let service = CodeExecutionService::new(ServiceConfig::default());
        let (record, log) = service
            .execute_recorded(ExecutionRequest::new("println(missing);", "custom"))
            .await;
        assert_eq!(record.status, ExecutionStatus::Error);
        assert!(record.result.is_none());
        let log = log.unwrap();
        assert_eq!(log.error_type, ErrorType::RuntimeError);
        assert!(log.message.contains("undefined variable `missing`"));
    }
}
