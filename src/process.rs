//! External command execution with line-oriented output streaming.
//!
//! Every interaction with git and with module builds goes through the
//! [`CommandRunner`] trait so the pipeline can be driven by a scripted runner
//! in tests.

use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{AutopublishError, Result};

/// Exit code reported for a process that was terminated by a signal.
pub const SIGNAL_EXIT_CODE: i32 = -1;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Consumer of one output stream of a child process.
///
/// The sink receives a single-pass iterator over the lines of the stream as
/// they are produced. Lines it leaves unconsumed are drained by the runner.
pub type LineSink<'a> =
    Box<dyn FnOnce(&mut dyn Iterator<Item = String>) -> Result<()> + Send + 'a>;

/// Optional sinks for the stdout and stderr streams of a command.
#[derive(Default)]
pub struct OutputSinks<'a> {
    stdout: Option<LineSink<'a>>,
    stderr: Option<LineSink<'a>>,
    stop_on_stderr: bool,
}

impl<'a> OutputSinks<'a> {
    /// No sinks: both streams are drained and discarded.
    pub fn none() -> Self {
        Self::default()
    }

    /// Route stdout lines to `sink`.
    pub fn stdout<F>(mut self, sink: F) -> Self
    where
        F: FnOnce(&mut dyn Iterator<Item = String>) -> Result<()> + Send + 'a,
    {
        self.stdout = Some(Box::new(sink));
        self
    }

    /// Route stderr lines to `sink`.
    pub fn stderr<F>(mut self, sink: F) -> Self
    where
        F: FnOnce(&mut dyn Iterator<Item = String>) -> Result<()> + Send + 'a,
    {
        self.stderr = Some(Box::new(sink));
        self
    }

    /// Kill the command as soon as it writes its first stderr line.
    ///
    /// Lines already written, and whatever is still buffered in the pipe,
    /// reach the stderr sink. The run then reports the exit code of the
    /// killed process.
    pub fn stop_on_stderr(mut self) -> Self {
        self.stop_on_stderr = true;
        self
    }

    pub fn stops_on_stderr(&self) -> bool {
        self.stop_on_stderr
    }

    pub(crate) fn into_parts(self) -> (Option<LineSink<'a>>, Option<LineSink<'a>>) {
        (self.stdout, self.stderr)
    }
}

/// Runs external commands.
///
/// Implementations must block until the command exits, fully drain both
/// output streams and allow a sink to call [`CommandRunner::run`] again.
/// A timeout or [`OutputSinks::stop_on_stderr`] terminates everything the
/// command started, not just the command itself.
pub trait CommandRunner: Send + Sync {
    /// Run `command` (program followed by its arguments) inside
    /// `working_dir` and return its exit code.
    ///
    /// # Errors
    ///
    /// - [`AutopublishError::SpawnError`] if the process could not start
    /// - [`AutopublishError::CommandTimedOut`] if a timeout elapsed
    /// - any error returned by one of the sinks
    fn run(&self, command: &[String], working_dir: &Path, sinks: OutputSinks<'_>) -> Result<i32>;
}

/// [`CommandRunner`] backed by real OS processes.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill any command that runs longer than `timeout`.
    ///
    /// `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Wait until the child exited and both readers hit end of stream.
    ///
    /// The child is terminated when `stop` is raised or the timeout elapses.
    fn supervise(
        &self,
        child: &mut Child,
        program: &str,
        dir: &Path,
        stop: &AtomicBool,
        drained: impl Fn() -> bool,
    ) -> Result<ExitStatus> {
        let io_error = |source| AutopublishError::IoError {
            path: dir.to_path_buf(),
            source,
        };
        let deadline = self.timeout.map(|timeout| (Instant::now() + timeout, timeout));

        let mut status = None;
        let mut stopped = false;
        loop {
            if !stopped && stop.load(Ordering::Acquire) {
                // Whether or not the child already exited, the rest of its
                // group may still be running.
                stopped = true;
                let terminated = terminate(child).map_err(io_error)?;
                status.get_or_insert(terminated);
            }
            if status.is_none() {
                status = child.try_wait().map_err(io_error)?;
            }
            if let Some(status) = status {
                if drained() {
                    return Ok(status);
                }
            }

            if let Some((deadline, timeout)) = deadline {
                if Instant::now() >= deadline {
                    // Also reaches descendants still holding the pipes after
                    // the child itself exited.
                    let _ = terminate(child);
                    return Err(AutopublishError::CommandTimedOut {
                        program: program.to_string(),
                        dir: dir.to_path_buf(),
                        timeout,
                    });
                }
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, command: &[String], working_dir: &Path, sinks: OutputSinks<'_>) -> Result<i32> {
        let (program, args) = command.split_first().ok_or_else(|| {
            AutopublishError::ConfigError("Cannot run an empty command".to_string())
        })?;

        let mut process = Command::new(program);
        process
            .args(args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Own process group, so termination reaches grandchildren too.
            process.process_group(0);
        }

        let mut child = process.spawn().map_err(|source| AutopublishError::SpawnError {
            program: program.clone(),
            dir: working_dir.to_path_buf(),
            source,
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stop_on_stderr = sinks.stops_on_stderr();
        let (stdout_sink, stderr_sink) = sinks.into_parts();
        let stop = AtomicBool::new(false);
        let stderr_seen = stop_on_stderr.then_some(&stop);

        thread::scope(|scope| {
            let stdout_reader = scope.spawn(move || consume(stdout, stdout_sink, None));
            let stderr_reader = scope.spawn(move || consume(stderr, stderr_sink, stderr_seen));

            let status = self.supervise(&mut child, program, working_dir, &stop, || {
                stdout_reader.is_finished() && stderr_reader.is_finished()
            });

            let stdout_result = join(stdout_reader);
            let stderr_result = join(stderr_reader);

            let status = status?;
            stdout_result?;
            stderr_result?;

            Ok(status.code().unwrap_or(SIGNAL_EXIT_CODE))
        })
    }
}

/// Kill the child and, on unix, its whole process group, then reap it.
fn terminate(child: &mut Child) -> std::io::Result<ExitStatus> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        if let Ok(pid) = i32::try_from(child.id()) {
            // ESRCH only means the whole group is already gone.
            let _ = killpg(Pid::from_raw(pid), Signal::SIGKILL);
        }
    }
    let _ = child.kill();
    child.wait()
}

fn join(handle: thread::ScopedJoinHandle<'_, Result<()>>) -> Result<()> {
    match handle.join() {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

/// Feed the stream to the sink, then drain whatever the sink left behind.
///
/// `seen` is raised as soon as the first line is read.
fn consume(
    stream: Option<impl Read>,
    sink: Option<LineSink<'_>>,
    seen: Option<&AtomicBool>,
) -> Result<()> {
    let Some(stream) = stream else {
        return Ok(());
    };

    let mut lines = read_lines(stream).inspect(|_| {
        if let Some(seen) = seen {
            seen.store(true, Ordering::Release);
        }
    });
    let result = match sink {
        Some(sink) => sink(&mut lines),
        None => Ok(()),
    };
    lines.for_each(drop);

    result
}

/// Split a byte stream into lines, tolerating invalid UTF-8 and CRLF endings.
fn read_lines(stream: impl Read) -> impl Iterator<Item = String> {
    BufReader::new(stream)
        .split(b'\n')
        .map_while(|line| line.ok())
        .map(|mut line| {
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            String::from_utf8_lossy(&line).into_owned()
        })
}
