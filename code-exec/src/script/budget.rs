use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::error::{ScriptError, ScriptResult};

/// Resource ceilings for one evaluation of a custom-language program.
#[derive(Debug, Clone)]
pub struct ScriptLimits {
    /// Wall-clock budget covering lexing, parsing and evaluation.
    pub time_limit: Duration,
    /// Approximate retained memory ceiling in bytes.
    pub memory_limit: u64,
    /// Maximum bytes `print`/`println` may write.
    pub output_limit: usize,
    pub max_call_depth: usize,
    /// Ceiling on nested evaluation frames (expressions, blocks and calls
    /// together). Keeps native recursion bounded whatever the program shape.
    pub max_nesting: usize,
    /// Evaluation steps between two clock reads.
    pub check_interval: u32,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            time_limit: Duration::from_secs(10),
            memory_limit: 256 * 1024 * 1024,
            output_limit: 10_000,
            max_call_depth: 1_000,
            max_nesting: 10_000,
            check_interval: 1_024,
        }
    }
}

/// Shared flag the supervisor raises to abandon an evaluation.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Cooperative time and memory accounting threaded through evaluation.
#[derive(Debug)]
pub struct Budget {
    deadline: Instant,
    time_limit: Duration,
    cancel: CancelFlag,
    steps: u32,
    check_interval: u32,
    memory_used: u64,
    memory_peak: u64,
    memory_limit: u64,
}

impl Budget {
    pub fn new(limits: &ScriptLimits, cancel: CancelFlag) -> Self {
        Self {
            deadline: Instant::now() + limits.time_limit,
            time_limit: limits.time_limit,
            cancel,
            steps: 0,
            check_interval: limits.check_interval.max(1),
            memory_used: 0,
            memory_peak: 0,
            memory_limit: limits.memory_limit,
        }
    }

    /// Count one evaluation step, reading the clock every `check_interval`.
    #[inline]
    pub fn tick(&mut self) -> ScriptResult<()> {
        self.steps += 1;
        if self.steps >= self.check_interval {
            self.steps = 0;
            self.check_clock()?;
        }
        Ok(())
    }

    pub fn check_clock(&self) -> ScriptResult<()> {
        if self.cancel.is_cancelled() || Instant::now() >= self.deadline {
            return Err(ScriptError::Timeout(self.time_limit.as_millis() as u64));
        }
        Ok(())
    }

    /// Account for `bytes` of newly retained memory.
    pub fn charge(&mut self, bytes: u64) -> ScriptResult<()> {
        let used = self.memory_used.saturating_add(bytes);
        if used > self.memory_limit {
            return Err(self.exhausted(bytes));
        }
        self.memory_used = used;
        self.memory_peak = self.memory_peak.max(used);
        Ok(())
    }

    pub fn release(&mut self, bytes: u64) {
        self.memory_used = self.memory_used.saturating_sub(bytes);
    }

    /// Reject a single allocation that could never fit, before making it.
    pub fn check_allocation(&self, bytes: u64) -> ScriptResult<()> {
        if bytes > self.available_memory() {
            return Err(self.exhausted(bytes));
        }
        Ok(())
    }

    /// Bytes that can still be retained under the ceiling.
    pub fn available_memory(&self) -> u64 {
        self.memory_limit.saturating_sub(self.memory_used)
    }

    /// The error for an allocation of `bytes` that does not fit.
    pub fn exhausted(&self, bytes: u64) -> ScriptError {
        ScriptError::MemoryLimit {
            used: self.memory_used.saturating_add(bytes),
            limit: self.memory_limit,
        }
    }

    pub fn peak_memory(&self) -> u64 {
        self.memory_peak
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_reports_timeout_after_deadline() {
        let limits = ScriptLimits {
            time_limit: Duration::ZERO,
            check_interval: 4,
            ..ScriptLimits::default()
        };
        let mut budget = Budget::new(&limits, CancelFlag::new());
        for _ in 0..3 {
            assert!(budget.tick().is_ok());
        }
        assert_eq!(budget.tick(), Err(ScriptError::Timeout(0)));
    }

    #[test]
    fn test_cancel_flag_stops_evaluation() {
        let cancel = CancelFlag::new();
        let budget = Budget::new(&ScriptLimits::default(), cancel.clone());
        assert!(budget.check_clock().is_ok());
        cancel.cancel();
        assert!(matches!(budget.check_clock(), Err(ScriptError::Timeout(_))));
    }

    #[test]
    fn test_memory_meter_tracks_peak() {
        let limits = ScriptLimits {
            memory_limit: 100,
            ..ScriptLimits::default()
        };
        let mut budget = Budget::new(&limits, CancelFlag::new());
        budget.charge(60).unwrap();
        budget.release(50);
        budget.charge(30).unwrap();
        assert_eq!(budget.peak_memory(), 60);
        assert_eq!(
            budget.charge(80),
            Err(ScriptError::MemoryLimit {
                used: 120,
                limit: 100
            })
        );
    }
}
