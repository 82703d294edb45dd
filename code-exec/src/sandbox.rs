use crate::{error::Error, executor::Invocation, types::ResourceLimits};
use nix::sched::{unshare, CloneFlags};
use nix::sys::resource::{setrlimit, Resource};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

/// Directories searched by sandboxed processes, after the tool's own.
const SANDBOX_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// How long to wait for output pipes to drain once the process is gone.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Memory samples between two scans of the whole process group.
const GROUP_SCAN_EVERY: u32 = 5;

/// Why a sandboxed process stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Exited(i32),
    Signaled(i32),
    /// Wall-clock deadline passed or the CPU-time rlimit fired
    TimedOut,
    /// Resident memory rose above the ceiling; carries the last sample
    MemoryExceeded(u64),
    /// stdout or stderr grew past the output ceiling
    OutputExceeded,
}

/// Everything observed about one process run.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub termination: Termination,
    /// Peak resident set size in bytes, if it could be sampled
    pub peak_rss: Option<u64>,
    pub elapsed: Duration,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.termination == Termination::Exited(0)
    }
}

#[derive(Debug, Clone, Copy)]
enum Violation {
    Output,
    Memory(u64),
}

/// Sandbox environment for secure code execution.
///
/// Owns a private scratch directory that is removed when the sandbox is
/// dropped. Processes run with a cleared environment, in their own process
/// group, under CPU-time, file-size and process-count rlimits and,
/// optionally, inside fresh user and network namespaces. Memory is measured
/// over the whole process group.
pub struct Sandbox {
    root: TempDir,
    limits: ResourceLimits,
    id: String,
}

impl Sandbox {
    /// Create a new sandbox environment
    pub async fn new(limits: ResourceLimits) -> Result<Self, Error> {
        let id = Uuid::new_v4().to_string();
        let root = tempfile::Builder::new()
            .prefix(&format!("sandbox-{}-", id))
            .tempdir()
            .map_err(|e| Error::Sandbox(format!("Failed to create sandbox directory: {}", e)))?;

        for dir in &["tmp", "home"] {
            tokio::fs::create_dir_all(root.path().join(dir))
                .await
                .map_err(|e| {
                    Error::Sandbox(format!("Failed to create {} directory: {}", dir, e))
                })?;
        }

        debug!(sandbox = %id, root = %root.path().display(), "Created sandbox");
        Ok(Sandbox { root, limits, id })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn root_dir(&self) -> &Path {
        self.root.path()
    }

    /// Write `contents` to `name` inside the sandbox root.
    pub async fn write_file(&self, name: &str, contents: &str) -> Result<PathBuf, Error> {
        let path = self.root_dir().join(name);
        tokio::fs::write(&path, contents)
            .await
            .map_err(|e| Error::Sandbox(format!("Failed to write {}: {}", name, e)))?;
        Ok(path)
    }

    /// Run one invocation to completion or until a limit is hit.
    ///
    /// `deadline` is shared by every step of a request so a slow compile
    /// leaves less time for the run. Limit violations are reported through
    /// [`Termination`]; `Err` is reserved for failures of the sandbox itself.
    pub async fn execute(
        &self,
        invocation: &Invocation,
        deadline: Instant,
    ) -> Result<ProcessOutput, Error> {
        let started = Instant::now();
        let program = self.resolve_program(&invocation.program)?;

        debug!(
            sandbox = %self.id,
            program = %program.display(),
            args = ?invocation.args,
            "Sandbox execute"
        );

        let search_path = match program.parent() {
            Some(dir) if !dir.starts_with(self.root_dir()) => {
                format!("{}:{}", dir.display(), SANDBOX_PATH)
            }
            _ => SANDBOX_PATH.to_string(),
        };

        let mut command = Command::new(&program);
        command
            .args(&invocation.args)
            .env_clear()
            .env("PATH", search_path)
            .env("HOME", self.root_dir().join("home"))
            .env("TMPDIR", self.root_dir().join("tmp"))
            .env("LANG", "C.UTF-8")
            .envs(invocation.env.iter().map(|(k, v)| (k, v)))
            .current_dir(self.root_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);

        let file_size = self.limits.file_size;
        let cpu_time = self.limits.cpu_time;
        let processes = self.limits.processes;
        let isolate_network = self.limits.isolate_network;

        // SAFETY: the hook only makes async-signal-safe syscalls between fork
        // and exec.
        unsafe {
            command.pre_exec(move || {
                setrlimit(Resource::RLIMIT_FSIZE, file_size, file_size)?;
                // SIGXCPU at the soft limit, SIGKILL one second later.
                setrlimit(Resource::RLIMIT_CPU, cpu_time, cpu_time + 1)?;
                setrlimit(Resource::RLIMIT_NPROC, processes, processes)?;
                if isolate_network {
                    unshare(CloneFlags::CLONE_NEWUSER | CloneFlags::CLONE_NEWNET)?;
                }
                Ok(())
            });
        }

        let mut child = command.spawn().map_err(|source| Error::Spawn {
            command: invocation.program.clone(),
            source,
        })?;
        let pid = child.id();

        let (violations_tx, mut violations) = mpsc::channel(4);
        let limit = self.limits.output_limit;
        let stdout = child
            .stdout
            .take()
            .map(|pipe| tokio::spawn(read_capped(pipe, limit, violations_tx.clone())));
        let stderr = child
            .stderr
            .take()
            .map(|pipe| tokio::spawn(read_capped(pipe, limit, violations_tx.clone())));

        let peak = Arc::new(AtomicU64::new(0));
        let watcher = pid.map(|pid| {
            tokio::spawn(watch_memory(
                pid,
                self.limits.memory,
                self.limits.memory_poll_interval,
                violations_tx.clone(),
                Arc::clone(&peak),
            ))
        });
        drop(violations_tx);

        let mut termination = tokio::select! {
            biased;
            Some(violation) = violations.recv() => {
                kill_group(pid);
                child.wait().await?;
                match violation {
                    Violation::Output => Termination::OutputExceeded,
                    Violation::Memory(rss) => Termination::MemoryExceeded(rss),
                }
            }
            status = child.wait() => termination_of(status?),
            _ = time::sleep_until(deadline) => {
                kill_group(pid);
                child.wait().await?;
                Termination::TimedOut
            }
        };

        // Take down anything the program left behind in its group so the
        // pipes reach EOF.
        kill_group(pid);
        if let Some(watcher) = watcher {
            watcher.abort();
        }

        let stdout = drain(stdout).await;
        let stderr = drain(stderr).await;

        // A process can overflow its output and exit before the violation is
        // picked up above.
        if matches!(termination, Termination::Exited(_) | Termination::Signaled(_)) {
            if let Ok(Violation::Output) = violations.try_recv() {
                termination = Termination::OutputExceeded;
            }
        }

        let peak_rss = match peak.load(Ordering::Relaxed) {
            0 => None,
            bytes => Some(bytes),
        };
        let elapsed = started.elapsed();

        debug!(
            sandbox = %self.id,
            ?termination,
            ?peak_rss,
            elapsed_ms = elapsed.as_millis() as u64,
            "Process finished"
        );

        Ok(ProcessOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            termination,
            peak_rss,
            elapsed,
        })
    }

    /// Binaries produced inside the sandbox are addressed as `./name`;
    /// everything else must be an installed tool.
    fn resolve_program(&self, program: &str) -> Result<PathBuf, Error> {
        if let Some(local) = program.strip_prefix("./") {
            return Ok(self.root_dir().join(local));
        }
        which::which(program).map_err(|_| Error::ToolMissing(program.to_string()))
    }
}

fn termination_of(status: ExitStatus) -> Termination {
    match (status.code(), status.signal()) {
        (Some(code), _) => Termination::Exited(code),
        (None, Some(signal)) if signal == Signal::SIGXCPU as i32 => Termination::TimedOut,
        (None, Some(signal)) => Termination::Signaled(signal),
        (None, None) => Termination::Exited(-1),
    }
}

fn kill_group(pid: Option<u32>) {
    let Some(pid) = pid else { return };
    // ESRCH just means the group is already gone.
    if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        if e != nix::errno::Errno::ESRCH {
            warn!("Failed to kill process group {}: {}", pid, e);
        }
    }
}

async fn read_capped<R>(mut reader: R, limit: usize, violations: mpsc::Sender<Violation>) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let mut captured = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let n = match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        let room = limit.saturating_sub(captured.len());
        captured.extend_from_slice(&chunk[..n.min(room)]);
        if n > room {
            let _ = violations.send(Violation::Output).await;
            break;
        }
    }
    captured
}

async fn drain(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    let Some(mut handle) = reader else {
        return Vec::new();
    };
    match time::timeout(DRAIN_GRACE, &mut handle).await {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(_)) => Vec::new(),
        Err(_) => {
            warn!("Output pipe still open after process exit; discarding");
            handle.abort();
            Vec::new()
        }
    }
}

/// Sample the resident memory of the process group led by `pid` until the
/// leader exits or the group crosses `limit`.
///
/// The leader is sampled every tick. The rest of the group (forked children,
/// compiler back ends) is rescanned every `GROUP_SCAN_EVERY` ticks and its
/// last total carried in between.
async fn watch_memory(
    pid: u32,
    limit: u64,
    interval: Duration,
    violations: mpsc::Sender<Violation>,
    peak: Arc<AtomicU64>,
) {
    let status_path = PathBuf::from(format!("/proc/{}/status", pid));
    let mut ticker = time::interval(interval);
    let mut members = 0;
    let mut samples: u32 = 0;
    loop {
        ticker.tick().await;
        let Ok(status) = tokio::fs::read_to_string(&status_path).await else {
            break;
        };
        let Some(leader) = parse_peak_rss(&status) else {
            break;
        };
        if samples % GROUP_SCAN_EVERY == 0 {
            if let Ok(total) = tokio::task::spawn_blocking(move || group_rss(pid)).await {
                members = total;
            }
        }
        samples = samples.wrapping_add(1);

        let rss = leader.saturating_add(members);
        peak.fetch_max(rss, Ordering::Relaxed);
        if rss > limit {
            let _ = violations.send(Violation::Memory(rss)).await;
            break;
        }
    }
}

/// Current resident memory of every process in group `pgid` other than its
/// leader, in bytes.
fn group_rss(pgid: u32) -> u64 {
    let Ok(entries) = std::fs::read_dir("/proc") else {
        return 0;
    };
    entries
        .filter_map(|entry| entry.ok()?.file_name().to_str()?.parse::<u32>().ok())
        .filter(|&pid| pid != pgid)
        .filter(|pid| {
            std::fs::read_to_string(format!("/proc/{}/stat", pid))
                .ok()
                .and_then(|stat| parse_pgrp(&stat))
                == Some(pgid)
        })
        .filter_map(|pid| std::fs::read_to_string(format!("/proc/{}/status", pid)).ok())
        .filter_map(|status| status_kb(&status, "VmRSS:"))
        .map(|kb| kb * 1024)
        .sum()
}

/// Process group from a `/proc/<pid>/stat` line. The command name can hold
/// spaces and parentheses, so fields are counted from the last `)`.
pub(crate) fn parse_pgrp(stat: &str) -> Option<u32> {
    let (_, fields) = stat.rsplit_once(')')?;
    // state, ppid, pgrp
    fields.split_whitespace().nth(2)?.parse().ok()
}

/// Highest of `VmHWM` and `VmRSS` from a `/proc/<pid>/status` dump, in
/// bytes. Zombies have neither line.
pub(crate) fn parse_peak_rss(status: &str) -> Option<u64> {
    let hwm = status_kb(status, "VmHWM:");
    let rss = status_kb(status, "VmRSS:");
    hwm.max(rss).map(|kb| kb * 1024)
}

fn status_kb(status: &str, key: &str) -> Option<u64> {
    status.lines().find_map(|line| {
        let kb = line.strip_prefix(key)?.trim().trim_end_matches("kB").trim();
        kb.parse().ok()
    })
}
