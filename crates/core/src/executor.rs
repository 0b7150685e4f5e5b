//! Runs a config's pipeline as child processes

use std::ffi::OsString;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::{
    command::Stage,
    config::DEFAULT_ENV_ALLOWLIST,
    error::{Error, Result},
    types::{ExecutionResult, TestConfig},
};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Spawns pipelines with a per-process environment overlay and a timeout.
///
/// Children start from an empty environment, receive the allow-listed
/// variables of the current process, then the config's own assignments.
/// The current process environment is never modified.
///
/// Each stage leads its own process group. The timeout covers both the
/// stages exiting and their output pipes closing, and every group is killed
/// before `execute` returns, so background grandchildren never outlive a run.
#[derive(Debug, Clone)]
pub struct Executor {
    timeout: Duration,
    env_allowlist: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl Executor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            env_allowlist: DEFAULT_ENV_ALLOWLIST.iter().map(|v| v.to_string()).collect(),
            working_dir: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_env_allowlist(mut self, vars: Vec<String>) -> Self {
        self.env_allowlist = vars;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn execute(&self, config: &TestConfig) -> Result<ExecutionResult> {
        let timeout = config.timeout.unwrap_or(self.timeout);
        let inherited = self.inherited_env();
        let stages = config.run.stages();
        debug!(
            "Executing config '{}': {} (timeout {:?})",
            config.name,
            config.run.to_shell_command(),
            timeout
        );

        let start = Instant::now();
        let deadline = start + timeout;
        let mut running = RunningPipeline::new(stages.len());
        let mut upstream = None;

        for (index, stage) in stages.iter().enumerate() {
            let mut cmd = self.command_for(stage, &inherited, &config.env);
            cmd.stdin(match upstream.take() {
                Some(previous) => Stdio::from(previous),
                None => Stdio::null(),
            });

            let mut child = cmd.spawn().map_err(|source| Error::SpawnFailure {
                program: stage.program.clone(),
                source,
            })?;

            running.capture(index, child.stderr.take());
            if index + 1 < stages.len() {
                upstream = child.stdout.take();
            } else {
                running.capture(running.stdout_slot(), child.stdout.take());
            }
            running.children.push(child);
        }
        running.close_senders();

        let Some(statuses) = running.wait_until(deadline)? else {
            return Err(running.timed_out(&config.name, timeout));
        };
        if !running.collect_until(deadline) {
            return Err(running.timed_out(&config.name, timeout));
        }

        let mut outputs = std::mem::take(&mut running.outputs);
        let stdout = decode(outputs.pop().flatten());
        let stderr = outputs.into_iter().map(decode).collect::<Vec<_>>().concat();
        let exit_code = statuses.last().map(exit_code).unwrap_or(-1);

        Ok(ExecutionResult {
            stdout,
            stderr,
            exit_code,
            duration: start.elapsed(),
        })
    }

    fn inherited_env(&self) -> Vec<(String, OsString)> {
        self.env_allowlist
            .iter()
            .filter_map(|key| std::env::var_os(key).map(|value| (key.clone(), value)))
            .collect()
    }

    fn command_for(
        &self,
        stage: &Stage,
        inherited: &[(String, OsString)],
        overlay: &[(String, String)],
    ) -> Command {
        let mut cmd = Command::new(&stage.program);
        cmd.args(&stage.args)
            .env_clear()
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        for (key, value) in inherited {
            cmd.env(key, value);
        }
        for (key, value) in overlay {
            cmd.env(key, value);
        }
        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        cmd
    }
}

/// Children of one pipeline and the threads draining their pipes.
///
/// Output slots are one per stage for stderr, plus a last one for the final
/// stage's stdout. Every process group is killed and reaped on drop.
struct RunningPipeline {
    children: Vec<Child>,
    outputs: Vec<Option<Vec<u8>>>,
    pending: usize,
    sender: Option<Sender<(usize, Vec<u8>)>>,
    receiver: Receiver<(usize, Vec<u8>)>,
}

impl RunningPipeline {
    fn new(stages: usize) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            children: Vec::with_capacity(stages),
            outputs: vec![None; stages + 1],
            pending: 0,
            sender: Some(sender),
            receiver,
        }
    }

    fn stdout_slot(&self) -> usize {
        self.outputs.len() - 1
    }

    /// Drain `reader` on its own thread into `slot`
    fn capture<R: Read + Send + 'static>(&mut self, slot: usize, reader: Option<R>) {
        let (Some(mut reader), Some(sender)) = (reader, self.sender.clone()) else {
            return;
        };
        self.pending += 1;
        thread::spawn(move || {
            let mut buffer = Vec::new();
            let _ = reader.read_to_end(&mut buffer);
            let _ = sender.send((slot, buffer));
        });
    }

    /// Drop the spawning side so the channel disconnects once every reader is done
    fn close_senders(&mut self) {
        self.sender = None;
    }

    /// Wait for every stage, returning `None` once `deadline` passes
    fn wait_until(&mut self, deadline: Instant) -> Result<Option<Vec<ExitStatus>>> {
        let mut statuses: Vec<Option<ExitStatus>> = vec![None; self.children.len()];

        loop {
            for (child, status) in self.children.iter_mut().zip(statuses.iter_mut()) {
                if status.is_none() {
                    *status = child.try_wait()?;
                }
            }

            if statuses.iter().all(Option::is_some) {
                return Ok(Some(statuses.into_iter().flatten().collect()));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }

    /// Wait for every captured pipe to close; false when `deadline` passes first
    fn collect_until(&mut self, deadline: Instant) -> bool {
        while self.pending > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok((slot, bytes)) => {
                    self.outputs[slot] = Some(bytes);
                    self.pending -= 1;
                }
                Err(RecvTimeoutError::Timeout) => return false,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        true
    }

    fn timed_out(&mut self, name: &str, timeout: Duration) -> Error {
        warn!("Config '{}' timed out after {:?}", name, timeout);
        self.kill_all();
        Error::ExecutionTimeout { timeout }
    }

    fn kill_all(&mut self) {
        for child in &mut self.children {
            kill_group(child.id());
            if let Ok(None) = child.try_wait() {
                if let Err(e) = child.kill() {
                    debug!("Failed to kill child {}: {}", child.id(), e);
                }
            }
            let _ = child.wait();
        }
        self.children.clear();
    }
}

impl Drop for RunningPipeline {
    fn drop(&mut self) {
        self.kill_all();
    }
}

fn decode(bytes: Option<Vec<u8>>) -> String {
    bytes
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

// --- Unix process group bindings ---

#[cfg(unix)]
const SIGKILL: i32 = 9;

#[cfg(unix)]
unsafe extern "C" {
    fn kill(pid: i32, sig: i32) -> i32;
}

/// SIGKILL the process group led by `pid`, reaching any grandchildren
#[cfg(unix)]
fn kill_group(pid: u32) {
    let Ok(pgid) = i32::try_from(pid) else {
        return;
    };
    // A negative pid addresses the whole group; ESRCH once it is empty is fine
    if unsafe { kill(-pgid, SIGKILL) } != 0 {
        debug!("Process group {} already gone", pgid);
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: u32) {}

#[cfg(unix)]
fn exit_code(status: &ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: &ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}
