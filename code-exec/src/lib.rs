//! # Code Execution Engine
//!
//! Accepts source text plus a language selector and runs it under time,
//! memory and output ceilings. Programs in the built-in scripting language
//! are evaluated in-process; the other languages are compiled and run with
//! their host toolchains inside a throwaway sandbox.

pub mod script;

mod dispatcher;
mod encoder;
mod error;
mod executor;
mod languages;
mod sandbox;
mod service;
mod supervisor;
mod types;

#[cfg(test)]
mod tests;

pub use dispatcher::Dispatcher;
pub use encoder::{
    encode, user_message, CompileResponse, ErrorLogRecord, ExecutionRecord, GENERIC_SYSTEM_ERROR,
};
pub use error::Error;
pub use executor::{create_executor, Invocation, LanguageExecutor};
pub use languages::{
    CExecutor, CppExecutor, GoExecutor, JavaScriptExecutor, PythonExecutor, RustExecutor,
    ToolCheck,
};
pub use sandbox::{ProcessOutput, Sandbox, Termination};
pub use service::{CodeExecutionService, ServiceConfig};
pub use supervisor::Supervisor;
pub use types::{
    ErrorType, ExecutionOutcome, ExecutionRequest, ExecutionStatus, Language, ResourceLimits,
};

/// Result type for code execution operations
pub type Result<T> = std::result::Result<T, Error>;
