use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::script::ScriptLimits;

/// Languages the engine can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// The built-in scripting language, evaluated in-process
    Custom,
    Python,
    JavaScript,
    Rust,
    C,
    Cpp,
    Go,
}

impl Language {
    pub const ALL: [Language; 7] = [
        Language::Custom,
        Language::Python,
        Language::JavaScript,
        Language::Rust,
        Language::C,
        Language::Cpp,
        Language::Go,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Custom => "custom",
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::Rust => "rust",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Go => "go",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    /// Selectors are matched case-insensitively after trimming.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "custom" => Ok(Language::Custom),
            "python" | "python3" | "py" => Ok(Language::Python),
            "javascript" | "js" | "node" => Ok(Language::JavaScript),
            "rust" | "rs" => Ok(Language::Rust),
            "c" => Ok(Language::C),
            "cpp" | "c++" => Ok(Language::Cpp),
            "go" | "golang" => Ok(Language::Go),
            _ => Err(format!("Unsupported language: {}", s.trim())),
        }
    }
}

/// Body of `POST /compile`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Source code to execute
    pub code: String,
    /// Language selector; unset means `custom`
    #[serde(default)]
    pub language: Option<String>,
}

impl ExecutionRequest {
    pub fn new(code: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            language: Some(language.into()),
        }
    }
}

/// Lifecycle status of an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    /// Only ever seen on a persisted record before the outcome is known
    Pending,
    Success,
    Error,
    Timeout,
    MemoryLimit,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExecutionStatus::Pending => "PENDING",
            ExecutionStatus::Success => "SUCCESS",
            ExecutionStatus::Error => "ERROR",
            ExecutionStatus::Timeout => "TIMEOUT",
            ExecutionStatus::MemoryLimit => "MEMORY_LIMIT",
        })
    }
}

/// Classification attached to `ERROR` outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorType {
    LexerError,
    ParserError,
    RuntimeError,
    SystemError,
    ApiError,
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorType::LexerError => "LEXER_ERROR",
            ErrorType::ParserError => "PARSER_ERROR",
            ErrorType::RuntimeError => "RUNTIME_ERROR",
            ErrorType::SystemError => "SYSTEM_ERROR",
            ErrorType::ApiError => "API_ERROR",
        })
    }
}

/// Terminal result of one execution request.
///
/// Built once by whichever component decides the final state and handed to
/// the encoder unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub status: ExecutionStatus,
    pub error_type: Option<ErrorType>,
    /// Captured standard output
    pub stdout: String,
    /// Captured stderr or a synthesized diagnostic
    pub message: Option<String>,
    /// Wall-clock time spent executing; `None` when the request was rejected
    /// before anything ran
    #[serde(with = "duration_millis")]
    pub elapsed: Option<Duration>,
    /// Peak memory in bytes, when it could be measured
    pub peak_memory: Option<u64>,
}

impl ExecutionOutcome {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Success,
            error_type: None,
            stdout: stdout.into(),
            message: None,
            elapsed: None,
            peak_memory: None,
        }
    }

    pub fn error(error_type: ErrorType, message: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Error,
            error_type: Some(error_type),
            stdout: String::new(),
            message: Some(message.into()),
            elapsed: None,
            peak_memory: None,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::limit_exceeded(ExecutionStatus::Timeout, message)
    }

    pub fn memory_limit(message: impl Into<String>) -> Self {
        Self::limit_exceeded(ExecutionStatus::MemoryLimit, message)
    }

    /// Resource violations pre-empt error classification, so they carry no
    /// error type.
    fn limit_exceeded(status: ExecutionStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            error_type: None,
            stdout: String::new(),
            message: Some(message.into()),
            elapsed: None,
            peak_memory: None,
        }
    }

    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = Some(elapsed);
        self
    }

    pub fn with_peak_memory(mut self, peak_memory: Option<u64>) -> Self {
        self.peak_memory = peak_memory;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    pub fn elapsed_ms(&self) -> Option<u64> {
        self.elapsed.map(|elapsed| elapsed.as_millis() as u64)
    }
}

/// Resource limits for one execution
#[derive(Debug, Clone)]
pub struct ResourceLimits {
    /// Wall-clock budget for the whole request, compile step included
    pub time_limit: Duration,
    /// Maximum CPU seconds per spawned process (RLIMIT_CPU)
    pub cpu_time: u64,
    /// Maximum memory (bytes)
    pub memory: u64,
    /// Maximum bytes captured from each of stdout and stderr
    pub output_limit: usize,
    /// Maximum file size a process may write (bytes)
    pub file_size: u64,
    /// Processes and threads the sandboxed program may have (RLIMIT_NPROC).
    /// The kernel counts these per user, so the engine should run under an
    /// account of its own.
    pub processes: u64,
    /// Call-depth ceiling for the scripting language
    pub max_call_depth: usize,
    /// Largest accepted source text (bytes)
    pub max_code_size: usize,
    /// Run toolchain processes in fresh user and network namespaces
    pub isolate_network: bool,
    /// Interval between samples of a process's resident memory
    pub memory_poll_interval: Duration,
}

impl ResourceLimits {
    /// Limits for the in-process interpreter derived from these.
    pub fn script_limits(&self) -> ScriptLimits {
        ScriptLimits {
            time_limit: self.time_limit,
            memory_limit: self.memory,
            output_limit: self.output_limit,
            max_call_depth: self.max_call_depth,
            ..ScriptLimits::default()
        }
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            time_limit: Duration::from_secs(10),
            cpu_time: 10,
            memory: 256 * 1024 * 1024,   // 256MB
            output_limit: 10_000,
            file_size: 10 * 1024 * 1024, // 10MB
            processes: 256,
            max_call_depth: 1_000,
            max_code_size: 50_000,
            isolate_network: true,
            memory_poll_interval: Duration::from_millis(10),
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(duration) => serializer.serialize_some(&(duration.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}
