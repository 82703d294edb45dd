use std::thread;
use tokio::sync::oneshot;
use tokio::time::{self, Duration, Instant};
use tracing::{debug, error, warn};

use crate::{
    error::Error,
    executor::LanguageExecutor,
    sandbox::{ProcessOutput, Sandbox, Termination},
    script::{self, CancelFlag, ScriptError, ScriptReport},
    types::{ErrorType, ExecutionOutcome, ResourceLimits},
};

/// Native stack for the evaluation thread. Parser nesting and call depth are
/// bounded well below what this holds.
const EVAL_STACK_SIZE: usize = 64 * 1024 * 1024;

/// Extra time the async side waits for a cooperative timeout before giving
/// up on the evaluation thread.
const BACKSTOP_GRACE: Duration = Duration::from_millis(250);

/// Runs one request's code under the configured limits and turns whatever
/// happened into an [`ExecutionOutcome`].
#[derive(Debug, Clone)]
pub struct Supervisor {
    limits: ResourceLimits,
}

impl Supervisor {
    pub fn new(limits: ResourceLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Evaluate a custom-language program on its own thread.
    ///
    /// The interpreter enforces the time budget cooperatively; if it fails to
    /// report back shortly after the deadline the evaluation is cancelled and
    /// abandoned.
    pub async fn run_script(&self, code: String) -> ExecutionOutcome {
        let started = Instant::now();
        let limits = self.limits.script_limits();
        let cancel = CancelFlag::new();
        let (tx, rx) = oneshot::channel();

        let spawned = thread::Builder::new()
            .name("script-eval".to_string())
            .stack_size(EVAL_STACK_SIZE)
            .spawn({
                let cancel = cancel.clone();
                move || {
                    let report = script::run(&code, &limits, cancel);
                    let _ = tx.send(report);
                }
            });
        if let Err(e) = spawned {
            return system_error(Error::Worker(e.to_string())).with_elapsed(started.elapsed());
        }

        let backstop = self.limits.time_limit + BACKSTOP_GRACE;
        let outcome = match time::timeout(backstop, rx).await {
            Ok(Ok(report)) => script_outcome(report),
            Ok(Err(_)) => system_error(Error::Worker(
                "evaluation thread exited without a result".to_string(),
            )),
            Err(_) => {
                cancel.cancel();
                warn!("Evaluation missed its deadline; cancelled");
                ExecutionOutcome::timeout(timeout_message(self.limits.time_limit))
            }
        };

        outcome.with_elapsed(started.elapsed())
    }

    /// Stage, compile and run `code` with `executor` inside a fresh sandbox.
    pub async fn run_recipe(
        &self,
        executor: &dyn LanguageExecutor,
        code: &str,
    ) -> ExecutionOutcome {
        let started = Instant::now();
        let deadline = started + self.limits.time_limit;

        let mut peak_rss = None;
        let outcome = match self
            .run_recipe_steps(executor, code, deadline, &mut peak_rss)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => system_error(e),
        };

        outcome
            .with_elapsed(started.elapsed())
            .with_peak_memory(peak_rss)
    }

    async fn run_recipe_steps(
        &self,
        executor: &dyn LanguageExecutor,
        code: &str,
        deadline: Instant,
        peak_rss: &mut Option<u64>,
    ) -> Result<ExecutionOutcome, Error> {
        executor.check_tools()?;

        let sandbox = Sandbox::new(self.limits.clone()).await?;
        executor.stage(&sandbox, code).await?;

        if let Some(compile) = executor.compile_step(sandbox.root_dir()) {
            debug!(sandbox = sandbox.id(), step = %compile, "Compiling");
            let output = sandbox.execute(&compile, deadline).await?;
            *peak_rss = max_peak(*peak_rss, output.peak_rss);

            if let Some(outcome) = self.limit_outcome(&output) {
                return Ok(outcome);
            }
            if !output.success() {
                let diagnostics = diagnostics_of(&output);
                return Ok(ExecutionOutcome::error(
                    executor.classify_compile_failure(&diagnostics),
                    diagnostics,
                ));
            }
        }

        let run = executor.run_step(sandbox.root_dir());
        debug!(sandbox = sandbox.id(), step = %run, "Running");
        let output = sandbox.execute(&run, deadline).await?;
        *peak_rss = max_peak(*peak_rss, output.peak_rss);

        if let Some(outcome) = self.limit_outcome(&output) {
            return Ok(outcome.with_stdout(output.stdout));
        }
        if output.success() {
            return Ok(ExecutionOutcome::success(output.stdout));
        }

        let diagnostics = diagnostics_of(&output);
        let error_type = executor
            .classify_run_failure(&output.stderr)
            .unwrap_or(ErrorType::RuntimeError);
        Ok(ExecutionOutcome::error(error_type, diagnostics).with_stdout(output.stdout))
    }

    /// Outcome for a process stopped by one of the supervisor's ceilings.
    fn limit_outcome(&self, output: &ProcessOutput) -> Option<ExecutionOutcome> {
        match output.termination {
            Termination::TimedOut => Some(ExecutionOutcome::timeout(timeout_message(
                self.limits.time_limit,
            ))),
            Termination::MemoryExceeded(rss) => Some(ExecutionOutcome::memory_limit(format!(
                "memory limit exceeded: {} bytes resident, limit is {} bytes",
                rss, self.limits.memory
            ))),
            Termination::OutputExceeded => Some(ExecutionOutcome::error(
                ErrorType::RuntimeError,
                format!(
                    "output limit exceeded ({} bytes)",
                    self.limits.output_limit
                ),
            )),
            Termination::Exited(_) | Termination::Signaled(_) => None,
        }
    }
}

fn script_outcome(report: ScriptReport) -> ExecutionOutcome {
    let ScriptReport {
        outcome,
        stdout,
        peak_memory,
    } = report;

    let outcome = match outcome {
        Ok(result) => ExecutionOutcome::success(result),
        Err(err) => {
            let message = err.to_string();
            let outcome = match err {
                ScriptError::Lex { .. } => ExecutionOutcome::error(ErrorType::LexerError, message),
                ScriptError::Parse { .. } => {
                    ExecutionOutcome::error(ErrorType::ParserError, message)
                }
                ScriptError::Runtime { .. } => {
                    ExecutionOutcome::error(ErrorType::RuntimeError, message)
                }
                ScriptError::Timeout(_) => ExecutionOutcome::timeout(message),
                ScriptError::MemoryLimit { .. } => ExecutionOutcome::memory_limit(message),
            };
            outcome.with_stdout(stdout)
        }
    };
    outcome.with_peak_memory(Some(peak_memory))
}

fn system_error(err: Error) -> ExecutionOutcome {
    error!("Supervisor failure: {}", err);
    ExecutionOutcome::error(ErrorType::SystemError, err.to_string())
}

fn timeout_message(limit: Duration) -> String {
    format!("execution timed out after {} ms", limit.as_millis())
}

/// stderr when the tool wrote any, otherwise a description of how it ended.
fn diagnostics_of(output: &ProcessOutput) -> String {
    if !output.stderr.trim().is_empty() {
        return output.stderr.clone();
    }
    match output.termination {
        Termination::Exited(code) => format!("process exited with status {}", code),
        Termination::Signaled(signal) => format!("process terminated by signal {}", signal),
        other => format!("process stopped: {:?}", other),
    }
}

fn max_peak(current: Option<u64>, sample: Option<u64>) -> Option<u64> {
    match (current, sample) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}
