//! Wire and record shapes produced from an [`ExecutionOutcome`].

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::types::{ErrorType, ExecutionOutcome, ExecutionStatus, Language};

/// What callers see instead of infrastructure details.
pub const GENERIC_SYSTEM_ERROR: &str = "Internal error while executing code";

/// Response body of `POST /compile`.
///
/// At most one of `result` and `error` is set: `result` only on success,
/// `error` on every other status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileResponse {
    pub result: Option<String>,
    pub error: Option<String>,
    pub execution_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_usage: Option<u64>,
}

pub fn encode(outcome: &ExecutionOutcome) -> CompileResponse {
    let (result, error) = if outcome.is_success() {
        (Some(outcome.stdout.clone()), None)
    } else {
        (None, Some(user_message(outcome)))
    };

    CompileResponse {
        result,
        error,
        execution_time_ms: outcome.elapsed_ms(),
        memory_usage: outcome.peak_memory,
    }
}

/// Error text shown to the caller. System errors are masked.
pub fn user_message(outcome: &ExecutionOutcome) -> String {
    if outcome.error_type == Some(ErrorType::SystemError) {
        return GENERIC_SYSTEM_ERROR.to_string();
    }
    match (&outcome.message, outcome.status) {
        (Some(message), _) if !message.trim().is_empty() => message.clone(),
        (_, ExecutionStatus::Timeout) => "Execution timed out".to_string(),
        (_, ExecutionStatus::MemoryLimit) => "Memory limit exceeded".to_string(),
        _ => match outcome.error_type {
            Some(error_type) => format!("Execution failed ({})", error_type),
            None => "Execution failed".to_string(),
        },
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// One row of the `executions` table kept by the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: String,
    pub language: Option<Language>,
    pub status: ExecutionStatus,
    pub execution_time_ms: Option<u64>,
    pub memory_usage: Option<u64>,
    pub result: Option<String>,
    pub error: Option<String>,
    pub created_at_ms: u64,
    pub completed_at_ms: Option<u64>,
}

impl ExecutionRecord {
    /// A record for a request that has not finished yet.
    pub fn pending(language: Option<Language>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            language,
            status: ExecutionStatus::Pending,
            execution_time_ms: None,
            memory_usage: None,
            result: None,
            error: None,
            created_at_ms: now_ms(),
            completed_at_ms: None,
        }
    }

    /// Move the record to its terminal state.
    pub fn complete(&mut self, outcome: &ExecutionOutcome) {
        let response = encode(outcome);
        self.status = outcome.status;
        self.execution_time_ms = response.execution_time_ms;
        self.memory_usage = response.memory_usage;
        self.result = response.result;
        self.error = response.error;
        self.completed_at_ms = Some(now_ms());
    }
}

/// One row of the `error_logs` table. Carries the unmasked diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorLogRecord {
    pub error_type: ErrorType,
    pub message: String,
    pub metadata: serde_json::Value,
}

impl ErrorLogRecord {
    /// `None` unless the outcome carries an error type.
    pub fn from_outcome(record: &ExecutionRecord, outcome: &ExecutionOutcome) -> Option<Self> {
        let error_type = outcome.error_type?;
        Some(Self {
            error_type,
            message: outcome.message.clone().unwrap_or_default(),
            metadata: json!({
                "executionId": record.id,
                "language": record.language,
                "status": outcome.status,
                "executionTimeMs": outcome.elapsed_ms(),
            }),
        })
    }
}
